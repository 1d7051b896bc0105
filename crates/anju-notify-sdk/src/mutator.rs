//! 乐观更新模块
//!
//! 管理端操作（标记已读 / 批量标记已读）先行扣减本地计数，
//! 不等服务端确认；扣减与 UI 可见的状态变化同步完成，
//! 严格先于落库请求发出，计数徽标不落后于状态徽标。
//!
//! 落库失败不自动回滚，下一次快照或推送会纠正漂移；
//! 更严格的场景可注入 on_persist_failure 回调自行补偿。

use std::sync::Arc;

use futures::future::join_all;
use parking_lot::RwLock;
use tracing::{debug, warn};

use crate::contact::ContactStatus;
use crate::counters::CounterStore;
use crate::error::Result;
use crate::events::{EventManager, SdkEvent};
use crate::gateway::ContactGateway;

/// 落库失败补偿回调：参数为本批失败的条数
pub type PersistFailureHook = Arc<dyn Fn(&CounterStore, u64) + Send + Sync>;

/// 乐观更新器
pub struct OptimisticMutator {
    store: Arc<CounterStore>,
    gateway: Arc<dyn ContactGateway>,
    events: Arc<EventManager>,
    on_persist_failure: RwLock<Option<PersistFailureHook>>,
}

impl OptimisticMutator {
    /// 创建乐观更新器（默认不回滚）
    pub fn new(
        store: Arc<CounterStore>,
        gateway: Arc<dyn ContactGateway>,
        events: Arc<EventManager>,
    ) -> Self {
        Self {
            store,
            gateway,
            events,
            on_persist_failure: RwLock::new(None),
        }
    }

    /// 注入落库失败补偿回调
    pub fn set_persist_failure_hook(&self, hook: PersistFailureHook) {
        *self.on_persist_failure.write() = Some(hook);
    }

    /// 单条标记已读
    ///
    /// previous_status 为 new 时三个计数各扣 1；read / responded /
    /// archived 之间的迁移与计数无关，不扣减。
    pub async fn mark_one_as_read(
        &self,
        contact_id: u64,
        previous_status: ContactStatus,
    ) -> Result<()> {
        // 1. 先行扣减（严格先于网络请求）
        self.apply_optimistic_delta(previous_status, 1);

        // 2. 落库
        if let Err(e) = self
            .gateway
            .update_contact_status(contact_id, ContactStatus::Read)
            .await
        {
            warn!("⚠️ 联系状态落库失败，计数不回滚: id={}, error={}", contact_id, e);
            self.handle_persist_failure(previous_status, 1);
            return Err(e);
        }
        Ok(())
    }

    /// 批量标记已读
    ///
    /// 整批一次性扣减（不在循环里逐条扣减），之后并发落库。
    pub async fn mark_many_as_read(
        &self,
        contact_ids: &[u64],
        previous_status: ContactStatus,
    ) -> Result<()> {
        if contact_ids.is_empty() {
            return Ok(());
        }

        // 1. 整批一次性扣减
        self.apply_optimistic_delta(previous_status, contact_ids.len() as u64);

        // 2. 并发落库
        let results = join_all(
            contact_ids
                .iter()
                .map(|&id| self.gateway.update_contact_status(id, ContactStatus::Read)),
        )
        .await;

        let mut failed = 0u64;
        let mut first_error = None;
        for result in results {
            if let Err(e) = result {
                failed += 1;
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        if failed > 0 {
            warn!(
                "⚠️ 批量落库部分失败，计数不回滚: total={}, failed={}",
                contact_ids.len(),
                failed
            );
            self.handle_persist_failure(previous_status, failed);
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// previous_status 离开 new 才扣减；其余迁移与计数无关
    fn apply_optimistic_delta(&self, previous_status: ContactStatus, count: u64) {
        if !ContactStatus::leaves_new(previous_status, ContactStatus::Read) {
            debug!("非 new 状态迁移，计数不变: previous={}", previous_status);
            return;
        }
        self.store.apply_left_new_delta(count);
        self.events.emit(SdkEvent::CountersAdjusted { delta: count });
    }

    fn handle_persist_failure(&self, previous_status: ContactStatus, failed: u64) {
        if !previous_status.is_new() {
            return;
        }
        if let Some(hook) = self.on_persist_failure.read().as_ref() {
            hook(&self.store, failed);
        }
    }
}
