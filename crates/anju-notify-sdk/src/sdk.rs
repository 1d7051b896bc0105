//! 统一 SDK 接口 - AnjuNotifySDK 主入口
//!
//! 分层架构：
//! ```text
//! AnjuNotifySDK (生命周期编排)
//!   ├── CounterStore (本地计数缓存)
//!   ├── SnapshotFetcher (权威快照拉取)
//!   ├── PushChannel (服务端推送通道)
//!   ├── PollingTimer (轮询兜底)
//!   ├── OptimisticMutator (乐观更新)
//!   └── EventManager (事件广播)
//! ```
//!
//! 设计原则：
//! - 显式生命周期：start() 对应 UI 挂载，stop() 对应卸载，stop 幂等
//! - 依赖注入：计数存储归实例所有，不用模块级单例
//! - 降级优先：任何通道错误都回落到"上一份已知计数 + 轮询兜底"

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::contact::ContactStatus;
use crate::counters::{CounterStore, NotificationCounters};
use crate::error::{AnjuNotifyError, Result};
use crate::events::{EventManager, SdkEvent};
use crate::gateway::{ContactGateway, HttpContactGateway, HttpGatewayConfig};
use crate::mutator::{OptimisticMutator, PersistFailureHook};
use crate::poller::PollingTimer;
use crate::push::channel::{PushChannel, PushChannelConfig, PushChannelState};
use crate::snapshot::SnapshotFetcher;

/// SDK 配置
#[derive(Debug, Clone)]
pub struct AnjuNotifyConfig {
    /// 后台 API 基础 URL
    pub base_url: String,
    /// Bearer token（可选）
    pub auth_token: Option<String>,
    /// 轮询周期（秒）
    pub poll_interval_secs: u64,
    /// 推送连接建立超时（秒）
    pub connect_timeout_secs: u64,
    /// 推送重连间隔（秒）
    pub reconnect_delay_secs: u64,
    /// 普通 HTTP 请求超时（秒）
    pub request_timeout_secs: u64,
    /// 事件广播通道容量
    pub event_capacity: usize,
}

impl Default for AnjuNotifyConfig {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            auth_token: None,
            poll_interval_secs: 120,
            connect_timeout_secs: 10,
            reconnect_delay_secs: 3,
            request_timeout_secs: 30,
            event_capacity: 64,
        }
    }
}

impl AnjuNotifyConfig {
    /// 创建配置构建器
    pub fn builder() -> AnjuNotifyConfigBuilder {
        AnjuNotifyConfigBuilder::default()
    }
}

/// 配置构建器
#[derive(Debug, Clone, Default)]
pub struct AnjuNotifyConfigBuilder {
    config: AnjuNotifyConfig,
}

impl AnjuNotifyConfigBuilder {
    /// 后台 API 基础 URL
    pub fn base_url(mut self, base_url: impl Into<String>) -> Self {
        self.config.base_url = base_url.into();
        self
    }

    /// Bearer token
    pub fn auth_token(mut self, token: impl Into<String>) -> Self {
        self.config.auth_token = Some(token.into());
        self
    }

    /// 轮询周期（秒）
    pub fn poll_interval_secs(mut self, secs: u64) -> Self {
        self.config.poll_interval_secs = secs;
        self
    }

    /// 推送连接建立超时（秒）
    pub fn connect_timeout_secs(mut self, secs: u64) -> Self {
        self.config.connect_timeout_secs = secs;
        self
    }

    /// 推送重连间隔（秒）
    pub fn reconnect_delay_secs(mut self, secs: u64) -> Self {
        self.config.reconnect_delay_secs = secs;
        self
    }

    /// 普通 HTTP 请求超时（秒）
    pub fn request_timeout_secs(mut self, secs: u64) -> Self {
        self.config.request_timeout_secs = secs;
        self
    }

    /// 事件广播通道容量
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// 构建配置
    pub fn build(self) -> AnjuNotifyConfig {
        self.config
    }
}

/// 运行期任务句柄（start 时创建，stop 时取出并等待退出）
struct RunningTasks {
    shutdown_tx: watch::Sender<bool>,
    poller: JoinHandle<()>,
    push: JoinHandle<()>,
}

/// Anju 后台联系通知 SDK
///
/// 维护 new / recent / weekly 三个联系计数的本地缓存投影，
/// 通过推送通道 + 轮询兜底 + 乐观扣减三路更新保持与服务端一致。
pub struct AnjuNotifySDK {
    config: AnjuNotifyConfig,
    store: Arc<CounterStore>,
    events: Arc<EventManager>,
    fetcher: Arc<SnapshotFetcher>,
    mutator: OptimisticMutator,
    push_channel: Arc<PushChannel>,
    running: Mutex<Option<RunningTasks>>,
}

impl AnjuNotifySDK {
    /// 用 HTTP 网关创建 SDK
    pub fn new(config: AnjuNotifyConfig) -> Result<Arc<Self>> {
        if config.base_url.is_empty() {
            return Err(AnjuNotifyError::Config("base_url 不能为空".to_string()));
        }
        let gateway: Arc<dyn ContactGateway> = Arc::new(HttpContactGateway::new(HttpGatewayConfig {
            base_url: config.base_url.clone(),
            auth_token: config.auth_token.clone(),
            request_timeout_secs: config.request_timeout_secs,
        })?);
        Ok(Self::with_gateway(config, gateway))
    }

    /// 用自定义网关创建 SDK（测试或自定义传输层）
    pub fn with_gateway(config: AnjuNotifyConfig, gateway: Arc<dyn ContactGateway>) -> Arc<Self> {
        let store = Arc::new(CounterStore::new());
        let events = Arc::new(EventManager::new(config.event_capacity));
        let fetcher = Arc::new(SnapshotFetcher::new(
            gateway.clone(),
            store.clone(),
            events.clone(),
        ));
        let push_channel = Arc::new(PushChannel::new(
            gateway.clone(),
            store.clone(),
            fetcher.clone(),
            events.clone(),
            PushChannelConfig {
                connect_timeout: Duration::from_secs(config.connect_timeout_secs),
                reconnect_delay: Duration::from_secs(config.reconnect_delay_secs),
            },
        ));
        let mutator = OptimisticMutator::new(store.clone(), gateway, events.clone());

        Arc::new(Self {
            config,
            store,
            events,
            fetcher,
            mutator,
            push_channel,
            running: Mutex::new(None),
        })
    }

    /// 启动 SDK（对应 UI 挂载）
    ///
    /// 启动轮询兜底（首个 tick 立即拉取一次快照）并打开推送通道。
    /// 必须在 tokio 运行时内调用；重复 start 返回错误。
    pub fn start(&self) -> Result<()> {
        let mut running = self.running.lock();
        if running.is_some() {
            return Err(AnjuNotifyError::InvalidOperation("SDK 已启动".to_string()));
        }

        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        // 轮询任务（interval 首个 tick 即挂载时的首次快照拉取）
        let poller = PollingTimer::new(
            self.fetcher.clone(),
            Duration::from_secs(self.config.poll_interval_secs),
        );
        let poller_handle = tokio::spawn(poller.run(shutdown_rx.clone()));

        // 推送通道任务
        let push_handle = tokio::spawn(self.push_channel.clone().run(shutdown_rx));

        *running = Some(RunningTasks {
            shutdown_tx,
            poller: poller_handle,
            push: push_handle,
        });
        info!(
            "🚀 通知 SDK 已启动: poll={}s, connect_timeout={}s",
            self.config.poll_interval_secs, self.config.connect_timeout_secs
        );
        Ok(())
    }

    /// 停止 SDK（对应 UI 卸载，幂等）
    ///
    /// 关闭推送连接、取消未决的连接超时、清除轮询定时器。
    /// 未启动或已停止时调用是空操作；与进行中的连接建立竞争也安全。
    pub async fn stop(&self) {
        let tasks = self.running.lock().take();
        let Some(RunningTasks {
            shutdown_tx,
            poller,
            push,
        }) = tasks
        else {
            debug!("SDK 未在运行，stop 为空操作");
            return;
        };

        // 置位停止信号；任务早已退出导致 send 失败也无妨
        let _ = shutdown_tx.send(true);
        if let Err(e) = poller.await {
            warn!("⚠️ 轮询任务退出异常: {}", e);
        }
        if let Err(e) = push.await {
            warn!("⚠️ 推送任务退出异常: {}", e);
        }
        info!("🛑 通知 SDK 已停止");
    }

    /// SDK 是否在运行
    pub fn is_running(&self) -> bool {
        self.running.lock().is_some()
    }

    /// 当前计数（用于渲染）
    pub fn counters(&self) -> NotificationCounters {
        self.store.current()
    }

    /// 当前计数是否可能过期（最近一次快照拉取失败）
    pub fn is_stale(&self) -> bool {
        self.store.is_stale()
    }

    /// 计数存储句柄（供补偿回调等高级用法）
    pub fn counter_store(&self) -> Arc<CounterStore> {
        self.store.clone()
    }

    /// 订阅计数变更
    pub fn subscribe(&self) -> watch::Receiver<NotificationCounters> {
        self.store.subscribe()
    }

    /// 订阅 SDK 事件
    pub fn events(&self) -> broadcast::Receiver<SdkEvent> {
        self.events.subscribe()
    }

    /// 推送通道当前状态
    pub fn push_state(&self) -> PushChannelState {
        self.push_channel.state()
    }

    /// 手动触发一次快照拉取
    pub async fn refresh_now(&self) -> Result<()> {
        self.fetcher.refresh().await
    }

    /// 标记单条联系为已读（本地计数即时扣减）
    pub async fn mark_contact_read(
        &self,
        contact_id: u64,
        previous_status: ContactStatus,
    ) -> Result<()> {
        self.mutator.mark_one_as_read(contact_id, previous_status).await
    }

    /// 批量标记联系为已读（整批计数一次性扣减）
    pub async fn mark_contacts_read(
        &self,
        contact_ids: &[u64],
        previous_status: ContactStatus,
    ) -> Result<()> {
        self.mutator
            .mark_many_as_read(contact_ids, previous_status)
            .await
    }

    /// 注入落库失败补偿回调（默认不回滚）
    pub fn set_persist_failure_hook(&self, hook: PersistFailureHook) {
        self.mutator.set_persist_failure_hook(hook);
    }
}
