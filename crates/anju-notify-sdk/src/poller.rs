//! 轮询兜底模块
//!
//! 与推送通道健康与否无关的正确性兜底：启动时立即拉取一次快照，
//! 之后按固定周期重复，直到实例销毁。推送正常时也照常轮询，
//! 双通道互为保险；后台管理端规模下多出的网络开销可接受。

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::debug;

use crate::snapshot::SnapshotFetcher;

/// 轮询定时器
///
/// 一个 SDK 实例恰好持有一个活动定时器，销毁时恰好清除一次。
pub struct PollingTimer {
    fetcher: Arc<SnapshotFetcher>,
    period: Duration,
}

impl PollingTimer {
    /// 默认轮询周期（2 分钟）
    pub const DEFAULT_PERIOD: Duration = Duration::from_secs(120);

    /// 创建轮询定时器
    pub fn new(fetcher: Arc<SnapshotFetcher>, period: Duration) -> Self {
        Self { fetcher, period }
    }

    /// 轮询循环：interval 的首个 tick 立即触发，即挂载时的首次拉取
    pub async fn run(self, mut shutdown: watch::Receiver<bool>) {
        let mut interval = tokio::time::interval(self.period);
        loop {
            tokio::select! {
                _ = shutdown.changed() => {
                    debug!("轮询定时器已停止");
                    break;
                }
                _ = interval.tick() => {
                    // 失败已在拉取器内部降级处理，这里不关心结果
                    let _ = self.fetcher.refresh().await;
                }
            }
        }
    }
}
