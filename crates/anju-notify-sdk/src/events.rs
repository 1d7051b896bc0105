//! 事件系统模块 - SDK 内部状态变化的统一广播
//!
//! 功能包括：
//! - 计数替换 / 扣减事件
//! - 推送通道状态变化事件
//! - 快照拉取失败事件
//! - 按类型的事件计数统计

use std::collections::HashMap;

use chrono::Utc;
use parking_lot::RwLock;
use tokio::sync::broadcast;
use tracing::debug;

use crate::counters::{NotificationCounters, UpdateSource};
use crate::push::channel::PushChannelState;

/// SDK 事件
#[derive(Debug, Clone)]
pub enum SdkEvent {
    /// 计数被权威来源整体替换
    CountersReplaced {
        counters: NotificationCounters,
        source: UpdateSource,
    },
    /// 计数被乐观扣减
    CountersAdjusted { delta: u64 },
    /// 推送通道状态变化
    PushStateChanged { state: PushChannelState },
    /// 快照拉取失败（旧计数保留）
    SnapshotFetchFailed { error: String },
}

impl SdkEvent {
    /// 事件类型标签（用于统计与日志）
    pub fn event_type(&self) -> &'static str {
        match self {
            SdkEvent::CountersReplaced { .. } => "counters_replaced",
            SdkEvent::CountersAdjusted { .. } => "counters_adjusted",
            SdkEvent::PushStateChanged { .. } => "push_state_changed",
            SdkEvent::SnapshotFetchFailed { .. } => "snapshot_fetch_failed",
        }
    }
}

/// 事件统计信息
#[derive(Debug, Clone, Default)]
pub struct EventStats {
    /// 总事件数
    pub total_events: u64,
    /// 按类型分组的事件数
    pub events_by_type: HashMap<String, u64>,
    /// 最后事件时间（UTC 毫秒时间戳）
    pub last_event_at: Option<i64>,
}

/// 事件管理器
pub struct EventManager {
    /// 广播发送器
    sender: broadcast::Sender<SdkEvent>,
    /// 事件统计
    stats: RwLock<EventStats>,
}

impl EventManager {
    /// 创建新的事件管理器
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self {
            sender,
            stats: RwLock::new(EventStats::default()),
        }
    }

    /// 发布事件
    ///
    /// 无订阅者时 send 会失败，属正常场景（无 UI 订阅），仅打 debug。
    pub fn emit(&self, event: SdkEvent) {
        {
            let mut stats = self.stats.write();
            stats.total_events += 1;
            *stats
                .events_by_type
                .entry(event.event_type().to_string())
                .or_insert(0) += 1;
            stats.last_event_at = Some(Utc::now().timestamp_millis());
        }

        if let Err(e) = self.sender.send(event) {
            debug!("Failed to broadcast event (no active receivers): {}", e);
        }
    }

    /// 订阅事件
    pub fn subscribe(&self) -> broadcast::Receiver<SdkEvent> {
        self.sender.subscribe()
    }

    /// 获取统计信息
    pub fn stats(&self) -> EventStats {
        self.stats.read().clone()
    }
}
