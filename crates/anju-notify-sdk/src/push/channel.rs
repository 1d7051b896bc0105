//! 推送通道客户端
//!
//! 单条长连接的状态机：idle → connecting → open → closed。
//! 卡在 connecting 超过 connect_timeout 视为失败：放弃该连接，
//! 先做一次纠正性快照拉取，再按固定间隔重连（不做额外退避）。
//! 通道的任何错误只降级到轮询兜底，不向上抛出。

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use futures_util::StreamExt;
use parking_lot::RwLock;
use tokio::sync::watch;
use tokio::time::{sleep, timeout};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::counters::{CounterStore, UpdateSource};
use crate::events::{EventManager, SdkEvent};
use crate::gateway::{ContactGateway, EventByteStream};
use crate::push::event::{PushEvent, SseFrameDecoder};
use crate::snapshot::SnapshotFetcher;

/// 推送通道状态
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PushChannelState {
    /// 未启动
    Idle,
    /// 连接建立中
    Connecting,
    /// 已建立，接收事件中
    Open,
    /// 已关闭（主动取消、传输错误或服务端关闭）
    Closed,
}

impl fmt::Display for PushChannelState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PushChannelState::Idle => write!(f, "idle"),
            PushChannelState::Connecting => write!(f, "connecting"),
            PushChannelState::Open => write!(f, "open"),
            PushChannelState::Closed => write!(f, "closed"),
        }
    }
}

/// 推送通道配置
#[derive(Debug, Clone)]
pub struct PushChannelConfig {
    /// 连接建立超时（卡在 connecting 超过此时长按失败处理）
    pub connect_timeout: Duration,
    /// 重连间隔（text/event-stream 客户端的默认 retry）
    pub reconnect_delay: Duration,
}

impl Default for PushChannelConfig {
    fn default() -> Self {
        Self {
            connect_timeout: Duration::from_secs(10),
            reconnect_delay: Duration::from_secs(3),
        }
    }
}

/// 推送通道客户端
///
/// 一个 SDK 实例同一时刻至多持有一条连接；上一条流总是在
/// 下一轮连接开始前被丢弃，连接不泄漏。
pub struct PushChannel {
    gateway: Arc<dyn ContactGateway>,
    store: Arc<CounterStore>,
    fetcher: Arc<SnapshotFetcher>,
    events: Arc<EventManager>,
    config: PushChannelConfig,
    state: RwLock<PushChannelState>,
    /// 最近一次收到任何推送事件的时间（UTC 毫秒时间戳）
    last_event_at: RwLock<Option<i64>>,
}

impl PushChannel {
    /// 创建推送通道
    pub fn new(
        gateway: Arc<dyn ContactGateway>,
        store: Arc<CounterStore>,
        fetcher: Arc<SnapshotFetcher>,
        events: Arc<EventManager>,
        config: PushChannelConfig,
    ) -> Self {
        Self {
            gateway,
            store,
            fetcher,
            events,
            config,
            state: RwLock::new(PushChannelState::Idle),
            last_event_at: RwLock::new(None),
        }
    }

    /// 当前状态快照
    pub fn state(&self) -> PushChannelState {
        *self.state.read()
    }

    /// 最近一次收到推送事件的时间（含 keep-alive）
    pub fn last_event_at(&self) -> Option<i64> {
        *self.last_event_at.read()
    }

    fn set_state(&self, next: PushChannelState) {
        {
            let mut state = self.state.write();
            if *state == next {
                return;
            }
            *state = next;
        }
        debug!("推送通道状态: {}", next);
        self.events.emit(SdkEvent::PushStateChanged { state: next });
    }

    /// 连接循环：收到停止信号才退出
    ///
    /// 每轮：建立连接（有界超时）→ 读流直到断开 → 固定间隔后重试。
    pub async fn run(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) {
        loop {
            if *shutdown.borrow() {
                break;
            }

            let attempt = Uuid::new_v4().simple().to_string();
            let attempt_id = &attempt[..8];
            self.set_state(PushChannelState::Connecting);
            debug!("🔌 建立推送连接: attempt={}", attempt_id);

            let connected = tokio::select! {
                _ = shutdown.changed() => break,
                result = timeout(self.config.connect_timeout, self.gateway.open_event_stream()) => result,
            };

            match connected {
                // 卡在 connecting：放弃本次连接，先做一次纠正性快照拉取
                Err(_elapsed) => {
                    warn!(
                        "⚠️ 推送连接超时 ({}s)，转快照纠正: attempt={}",
                        self.config.connect_timeout.as_secs(),
                        attempt_id
                    );
                    self.set_state(PushChannelState::Closed);
                    let _ = self.fetcher.refresh().await;
                }
                Ok(Err(e)) => {
                    warn!("⚠️ 推送连接失败，轮询兜底继续生效: {}", e);
                    self.set_state(PushChannelState::Closed);
                }
                Ok(Ok(mut stream)) => {
                    self.set_state(PushChannelState::Open);
                    info!("✅ 推送连接已建立: attempt={}", attempt_id);
                    self.read_stream(&mut stream, &mut shutdown).await;
                    self.set_state(PushChannelState::Closed);
                }
            }

            // 停止信号可能已在读流阶段被消费，先查一次再进入重连等待
            if *shutdown.borrow() {
                break;
            }

            // 固定重连间隔；期间收到停止信号立即退出
            tokio::select! {
                _ = shutdown.changed() => break,
                _ = sleep(self.config.reconnect_delay) => {}
            }
        }

        self.set_state(PushChannelState::Closed);
        debug!("推送通道任务退出");
    }

    /// 读流直到断开或收到停止信号
    async fn read_stream(&self, stream: &mut EventByteStream, shutdown: &mut watch::Receiver<bool>) {
        let mut decoder = SseFrameDecoder::new();
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!("收到停止信号，关闭推送连接");
                    break;
                }
                chunk = stream.next() => {
                    match chunk {
                        Some(Ok(bytes)) => {
                            for event in decoder.feed(&bytes) {
                                self.dispatch(event);
                            }
                        }
                        Some(Err(e)) => {
                            warn!("⚠️ 推送流传输错误: {}", e);
                            break;
                        }
                        None => {
                            info!("推送流被服务端关闭");
                            break;
                        }
                    }
                }
            }
        }
    }

    /// 分发单条推送事件（同步完成，三元组一次性写入）
    fn dispatch(&self, event: PushEvent) {
        *self.last_event_at.write() = Some(chrono::Utc::now().timestamp_millis());
        match event {
            PushEvent::ConnectionEstablished => debug!("推送连接握手完成"),
            PushEvent::KeepAlive => debug!("推送 keep-alive"),
            PushEvent::NotificationsUpdate(counters) => {
                self.store.replace(counters, UpdateSource::Push);
                self.events.emit(SdkEvent::CountersReplaced {
                    counters,
                    source: UpdateSource::Push,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::NotificationCounters;
    use crate::push::event::encode_sse;
    use crate::test_support::MockGateway;

    fn counters(new: u64, recent: u64, weekly: u64) -> NotificationCounters {
        NotificationCounters {
            new,
            recent,
            weekly,
        }
    }

    fn channel_with(gateway: Arc<MockGateway>, config: PushChannelConfig) -> Arc<PushChannel> {
        let store = Arc::new(CounterStore::new());
        let events = Arc::new(EventManager::new(16));
        let fetcher = Arc::new(SnapshotFetcher::new(
            gateway.clone(),
            store.clone(),
            events.clone(),
        ));
        Arc::new(PushChannel::new(gateway, store, fetcher, events, config))
    }

    #[test]
    fn test_state_display() {
        assert_eq!(PushChannelState::Idle.to_string(), "idle");
        assert_eq!(PushChannelState::Connecting.to_string(), "connecting");
        assert_eq!(PushChannelState::Open.to_string(), "open");
        assert_eq!(PushChannelState::Closed.to_string(), "closed");
    }

    #[test]
    fn test_dispatch_replaces_regardless_of_prior_state() {
        let gateway = Arc::new(MockGateway::new(counters(0, 0, 0)));
        let channel = channel_with(gateway, PushChannelConfig::default());

        channel.store.replace(counters(100, 100, 100), UpdateSource::Snapshot);
        channel.dispatch(PushEvent::NotificationsUpdate(counters(4, 9, 20)));
        assert_eq!(channel.store.current(), counters(4, 9, 20));

        // keep-alive 与握手事件不碰计数，但会刷新活动时间
        channel.dispatch(PushEvent::KeepAlive);
        channel.dispatch(PushEvent::ConnectionEstablished);
        assert_eq!(channel.store.current(), counters(4, 9, 20));
        assert!(channel.last_event_at().is_some());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stuck_connect_triggers_corrective_fetch() {
        let gateway = Arc::new(MockGateway::new(counters(7, 8, 9)));
        gateway.set_hang_stream(true);
        let channel = channel_with(gateway.clone(), PushChannelConfig::default());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(channel.clone().run(shutdown_rx));

        // 模拟时钟越过连接超时，卡死的连接被放弃并触发快照纠正
        tokio::time::sleep(Duration::from_secs(11)).await;
        assert!(gateway.snapshot_calls() >= 1);
        assert_eq!(channel.store.current(), counters(7, 8, 9));

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(channel.state(), PushChannelState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_events_flow_from_stream_to_store() {
        let gateway = Arc::new(MockGateway::new(counters(0, 0, 0)));
        let channel = channel_with(gateway.clone(), PushChannelConfig::default());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(channel.clone().run(shutdown_rx));

        // 等连接建立
        while channel.state() != PushChannelState::Open {
            tokio::task::yield_now().await;
        }

        gateway.push_chunk(encode_sse(&PushEvent::ConnectionEstablished).as_bytes());
        gateway.push_chunk(encode_sse(&PushEvent::NotificationsUpdate(counters(4, 9, 20))).as_bytes());

        while channel.store.current() != counters(4, 9, 20) {
            tokio::task::yield_now().await;
        }

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
        assert_eq!(channel.state(), PushChannelState::Closed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_server_close_leads_to_reconnect() {
        let gateway = Arc::new(MockGateway::new(counters(0, 0, 0)));
        let channel = channel_with(gateway.clone(), PushChannelConfig::default());

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let handle = tokio::spawn(channel.clone().run(shutdown_rx));

        while channel.state() != PushChannelState::Open {
            tokio::task::yield_now().await;
        }
        assert_eq!(gateway.stream_opens(), 1);

        // 服务端关闭后按固定间隔重连
        gateway.close_stream();
        tokio::time::sleep(Duration::from_secs(4)).await;

        while channel.state() != PushChannelState::Open {
            tokio::task::yield_now().await;
        }
        assert!(gateway.stream_opens() >= 2);

        shutdown_tx.send(true).unwrap();
        handle.await.unwrap();
    }
}
