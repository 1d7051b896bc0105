//! 测试辅助：可编程的内存网关

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

use async_trait::async_trait;
use bytes::Bytes;
use futures::channel::mpsc;
use futures_util::StreamExt;
use parking_lot::Mutex;

use crate::contact::ContactStatus;
use crate::counters::NotificationCounters;
use crate::error::{AnjuNotifyError, Result};
use crate::gateway::{ContactGateway, EventByteStream};

/// 内存网关：快照 / 落库 / 推送流的行为都可按测试需要编程
pub(crate) struct MockGateway {
    snapshot: Mutex<NotificationCounters>,
    fail_snapshot: AtomicBool,
    fail_patch: AtomicBool,
    fail_stream: AtomicBool,
    hang_stream: AtomicBool,
    snapshot_calls: AtomicUsize,
    stream_opens: AtomicUsize,
    patched: Mutex<Vec<(u64, ContactStatus)>>,
    stream_tx: Mutex<Option<mpsc::UnboundedSender<Result<Bytes>>>>,
}

impl MockGateway {
    pub(crate) fn new(snapshot: NotificationCounters) -> Self {
        Self {
            snapshot: Mutex::new(snapshot),
            fail_snapshot: AtomicBool::new(false),
            fail_patch: AtomicBool::new(false),
            fail_stream: AtomicBool::new(false),
            hang_stream: AtomicBool::new(false),
            snapshot_calls: AtomicUsize::new(0),
            stream_opens: AtomicUsize::new(0),
            patched: Mutex::new(Vec::new()),
            stream_tx: Mutex::new(None),
        }
    }

    pub(crate) fn set_snapshot(&self, counters: NotificationCounters) {
        *self.snapshot.lock() = counters;
    }

    pub(crate) fn set_fail_snapshot(&self, fail: bool) {
        self.fail_snapshot.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_patch(&self, fail: bool) {
        self.fail_patch.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_fail_stream(&self, fail: bool) {
        self.fail_stream.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_hang_stream(&self, hang: bool) {
        self.hang_stream.store(hang, Ordering::SeqCst);
    }

    pub(crate) fn snapshot_calls(&self) -> usize {
        self.snapshot_calls.load(Ordering::SeqCst)
    }

    pub(crate) fn stream_opens(&self) -> usize {
        self.stream_opens.load(Ordering::SeqCst)
    }

    pub(crate) fn patched(&self) -> Vec<(u64, ContactStatus)> {
        self.patched.lock().clone()
    }

    /// 向当前打开的推送流写入一块字节
    pub(crate) fn push_chunk(&self, chunk: &[u8]) {
        if let Some(tx) = self.stream_tx.lock().as_ref() {
            let _ = tx.unbounded_send(Ok(Bytes::copy_from_slice(chunk)));
        }
    }

    /// 模拟服务端主动断开当前推送流
    pub(crate) fn close_stream(&self) {
        *self.stream_tx.lock() = None;
    }
}

#[async_trait]
impl ContactGateway for MockGateway {
    async fn fetch_snapshot(&self) -> Result<NotificationCounters> {
        self.snapshot_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_snapshot.load(Ordering::SeqCst) {
            return Err(AnjuNotifyError::Transport("mock snapshot failure".to_string()));
        }
        Ok(*self.snapshot.lock())
    }

    async fn update_contact_status(&self, contact_id: u64, status: ContactStatus) -> Result<()> {
        if self.fail_patch.load(Ordering::SeqCst) {
            return Err(AnjuNotifyError::Transport("mock patch failure".to_string()));
        }
        self.patched.lock().push((contact_id, status));
        Ok(())
    }

    async fn open_event_stream(&self) -> Result<EventByteStream> {
        if self.hang_stream.load(Ordering::SeqCst) {
            futures::future::pending::<()>().await;
        }
        if self.fail_stream.load(Ordering::SeqCst) {
            return Err(AnjuNotifyError::Transport("mock stream failure".to_string()));
        }
        self.stream_opens.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = mpsc::unbounded();
        *self.stream_tx.lock() = Some(tx);
        Ok(rx.boxed())
    }
}
