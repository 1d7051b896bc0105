//! 通知计数存储模块
//!
//! 功能包括：
//! - 持有 new / recent / weekly 三个联系计数的本地缓存投影
//! - 权威来源（快照 / 推送）整体替换，乐观更新有界扣减
//! - 计数变更的 watch 订阅

use std::fmt;

use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::debug;

/// 通知计数三元组
///
/// 约定语义上 new ≤ recent ≤ weekly（各时间窗口是更窄窗口的超集），
/// 但不做强制校验：三类更新来自相互独立的异步源，允许瞬时乱序。
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationCounters {
    /// status = new 的联系总数
    pub new: u64,
    /// status = new 且 24 小时内创建
    pub recent: u64,
    /// status = new 且 7 天内创建
    pub weekly: u64,
}

impl NotificationCounters {
    /// 全零计数（子系统启动时的初始值）
    pub fn zero() -> Self {
        Self::default()
    }

    /// 三个计数同时饱和扣减，下限为零
    pub fn saturating_sub(self, count: u64) -> Self {
        Self {
            new: self.new.saturating_sub(count),
            recent: self.recent.saturating_sub(count),
            weekly: self.weekly.saturating_sub(count),
        }
    }
}

impl fmt::Display for NotificationCounters {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "new={}, recent={}, weekly={}",
            self.new, self.recent, self.weekly
        )
    }
}

/// 计数更新来源（用于日志与事件标注）
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateSource {
    /// 快照拉取（轮询或纠正性拉取）
    Snapshot,
    /// 服务端推送事件
    Push,
    /// 本地乐观扣减
    Optimistic,
}

impl fmt::Display for UpdateSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateSource::Snapshot => write!(f, "snapshot"),
            UpdateSource::Push => write!(f, "push"),
            UpdateSource::Optimistic => write!(f, "optimistic"),
        }
    }
}

/// 存储内部状态
#[derive(Debug, Clone)]
struct CounterState {
    counters: NotificationCounters,
    /// 最近一次权威同步时间（UTC 毫秒时间戳）
    last_synced_at: Option<i64>,
    /// 快照拉取失败后置位，下一次权威替换时清除
    stale: bool,
}

/// 计数存储（线程安全）
///
/// 一个挂载的 UI 实例独占一个存储，不跨实例共享。
///
/// 合并策略：权威来源整体替换三元组，乐观更新只做有界扣减；
/// 不做字段级合并，因此无需版本号或向量时钟。代价是过期快照
/// 晚到时计数可能"弹回"，后台管理场景可接受。
#[derive(Debug)]
pub struct CounterStore {
    state: RwLock<CounterState>,
    tx: watch::Sender<NotificationCounters>,
}

impl CounterStore {
    /// 创建新的计数存储（全零初始值）
    pub fn new() -> Self {
        let (tx, _) = watch::channel(NotificationCounters::zero());
        Self {
            state: RwLock::new(CounterState {
                counters: NotificationCounters::zero(),
                last_synced_at: None,
                stale: false,
            }),
            tx,
        }
    }

    /// 用权威快照整体替换（来自快照拉取或推送事件）
    ///
    /// 可能覆盖尚未被服务端确认的乐观扣减；乐观更新只是尽力平滑，
    /// 以下一次权威读取为准。
    pub fn replace(&self, counters: NotificationCounters, source: UpdateSource) {
        {
            let mut state = self.state.write();
            state.counters = counters;
            state.last_synced_at = Some(Utc::now().timestamp_millis());
            state.stale = false;
        }
        debug!("计数已替换: source={}, {}", source, counters);
        self.tx.send_replace(counters);
    }

    /// 乐观扣减：count 个联系离开 new 状态，三个计数同时扣减
    ///
    /// 下限为零，任何 count 都不会把计数扣成负数。
    pub fn apply_left_new_delta(&self, count: u64) {
        if count == 0 {
            return;
        }
        let counters = {
            let mut state = self.state.write();
            state.counters = state.counters.saturating_sub(count);
            state.counters
        };
        debug!("计数已扣减: delta={}, {}", count, counters);
        self.tx.send_replace(counters);
    }

    /// 当前计数快照（用于渲染）
    pub fn current(&self) -> NotificationCounters {
        self.state.read().counters
    }

    /// 快照拉取失败时置位；保留旧值，绝不清零
    pub fn mark_stale(&self) {
        self.state.write().stale = true;
    }

    /// 当前计数是否来自已失败的拉取之前
    pub fn is_stale(&self) -> bool {
        self.state.read().stale
    }

    /// 最近一次权威同步时间（UTC 毫秒时间戳）
    pub fn last_synced_at(&self) -> Option<i64> {
        self.state.read().last_synced_at
    }

    /// 订阅计数变更（watch 通道，随时可读到最新值）
    pub fn subscribe(&self) -> watch::Receiver<NotificationCounters> {
        self.tx.subscribe()
    }
}

impl Default for CounterStore {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counters(new: u64, recent: u64, weekly: u64) -> NotificationCounters {
        NotificationCounters {
            new,
            recent,
            weekly,
        }
    }

    #[test]
    fn test_starts_at_zero() {
        let store = CounterStore::new();
        assert_eq!(store.current(), NotificationCounters::zero());
        assert_eq!(store.last_synced_at(), None);
        assert!(!store.is_stale());
    }

    #[test]
    fn test_delta_floors_at_zero() {
        let store = CounterStore::new();
        store.replace(counters(1, 2, 3), UpdateSource::Snapshot);

        // 扣减量大于当前值时全部钳到零
        store.apply_left_new_delta(5);
        assert_eq!(store.current(), counters(0, 0, 0));

        // 已经为零后继续扣减仍然安全
        store.apply_left_new_delta(100);
        assert_eq!(store.current(), counters(0, 0, 0));
    }

    #[test]
    fn test_replace_is_wholesale() {
        let store = CounterStore::new();
        store.replace(counters(3, 5, 10), UpdateSource::Snapshot);

        // 替换不做字段级合并，三个字段全部以新快照为准
        store.replace(counters(0, 0, 2), UpdateSource::Push);
        assert_eq!(store.current(), counters(0, 0, 2));
    }

    #[test]
    fn test_replace_clears_stale() {
        let store = CounterStore::new();
        store.replace(counters(3, 4, 5), UpdateSource::Snapshot);

        store.mark_stale();
        assert!(store.is_stale());
        // 置 stale 不清零计数
        assert_eq!(store.current(), counters(3, 4, 5));

        store.replace(counters(6, 7, 8), UpdateSource::Snapshot);
        assert!(!store.is_stale());
    }

    #[test]
    fn test_zero_delta_is_noop() {
        let store = CounterStore::new();
        store.replace(counters(2, 3, 4), UpdateSource::Snapshot);
        store.apply_left_new_delta(0);
        assert_eq!(store.current(), counters(2, 3, 4));
    }

    #[tokio::test]
    async fn test_subscribe_sees_latest_value() {
        let store = CounterStore::new();
        let mut rx = store.subscribe();

        store.replace(counters(4, 9, 20), UpdateSource::Push);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), counters(4, 9, 20));

        store.apply_left_new_delta(1);
        rx.changed().await.unwrap();
        assert_eq!(*rx.borrow(), counters(3, 8, 19));
    }
}
