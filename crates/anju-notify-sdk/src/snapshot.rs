//! 快照拉取模块
//!
//! 从权威联系数据拉取计数三元组并整体写入本地存储。
//! 拉取失败时保留上一份计数并置 stale 标记，绝不清零。

use std::sync::Arc;

use tracing::{debug, warn};

use crate::counters::{CounterStore, UpdateSource};
use crate::error::Result;
use crate::events::{EventManager, SdkEvent};
use crate::gateway::ContactGateway;

/// 快照拉取器
pub struct SnapshotFetcher {
    gateway: Arc<dyn ContactGateway>,
    store: Arc<CounterStore>,
    events: Arc<EventManager>,
}

impl SnapshotFetcher {
    /// 创建快照拉取器
    pub fn new(
        gateway: Arc<dyn ContactGateway>,
        store: Arc<CounterStore>,
        events: Arc<EventManager>,
    ) -> Self {
        Self {
            gateway,
            store,
            events,
        }
    }

    /// 拉取一次权威快照并整体替换本地计数
    ///
    /// 失败时打日志、置 stale、发事件，上一份计数保持不动。
    /// 返回值仅供关心结果的调用方观察；后台任务把失败视为终点，
    /// 不再向上抛。
    pub async fn refresh(&self) -> Result<()> {
        match self.gateway.fetch_snapshot().await {
            Ok(counters) => {
                self.store.replace(counters, UpdateSource::Snapshot);
                self.events.emit(SdkEvent::CountersReplaced {
                    counters,
                    source: UpdateSource::Snapshot,
                });
                debug!("快照同步完成: {}", counters);
                Ok(())
            }
            Err(e) => {
                warn!("⚠️ 快照拉取失败，保留上一份计数: {}", e);
                self.store.mark_stale();
                self.events.emit(SdkEvent::SnapshotFetchFailed {
                    error: e.to_string(),
                });
                Err(e)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::counters::NotificationCounters;
    use crate::test_support::MockGateway;

    fn counters(new: u64, recent: u64, weekly: u64) -> NotificationCounters {
        NotificationCounters {
            new,
            recent,
            weekly,
        }
    }

    fn fetcher_with(gateway: Arc<MockGateway>) -> (SnapshotFetcher, Arc<CounterStore>) {
        let store = Arc::new(CounterStore::new());
        let events = Arc::new(EventManager::new(16));
        let fetcher = SnapshotFetcher::new(gateway, store.clone(), events);
        (fetcher, store)
    }

    #[tokio::test]
    async fn test_refresh_replaces_wholesale() {
        let gateway = Arc::new(MockGateway::new(counters(4, 9, 20)));
        let (fetcher, store) = fetcher_with(gateway);

        store.replace(counters(3, 5, 10), UpdateSource::Push);
        fetcher.refresh().await.unwrap();

        assert_eq!(store.current(), counters(4, 9, 20));
        assert!(!store.is_stale());
    }

    #[tokio::test]
    async fn test_refresh_failure_keeps_previous_counters() {
        let gateway = Arc::new(MockGateway::new(counters(4, 9, 20)));
        let (fetcher, store) = fetcher_with(gateway.clone());

        fetcher.refresh().await.unwrap();
        assert_eq!(store.current(), counters(4, 9, 20));

        // 拉取失败不清零，只置 stale
        gateway.set_fail_snapshot(true);
        assert!(fetcher.refresh().await.is_err());
        assert_eq!(store.current(), counters(4, 9, 20));
        assert!(store.is_stale());

        // 恢复后下一次替换清除 stale
        gateway.set_fail_snapshot(false);
        gateway.set_snapshot(counters(1, 1, 2));
        fetcher.refresh().await.unwrap();
        assert_eq!(store.current(), counters(1, 1, 2));
        assert!(!store.is_stale());
    }
}
