//! Anju Notify SDK - 安居后台联系通知 SDK
//!
//! 为安居后台管理端维护 new / recent / weekly 三个联系计数的
//! 本地缓存投影，保持与服务端一致。功能包括：
//!
//! - 🔔 计数存储：权威整体替换 + 有界乐观扣减的合并策略
//! - 📡 推送通道：text/event-stream 长连接，低延迟计数更新
//! - ⏰ 轮询兜底：固定周期快照拉取，与推送健康与否无关
//! - ⚡ 乐观更新：标记已读即时扣减，不等服务端确认
//! - ⚙️ 事件系统：统一的事件广播与统计
//! - 🧵 并发安全：异步优先设计，显式 start/stop 生命周期
//!
//! # 快速开始
//!
//! ```rust,no_run
//! use anju_notify_sdk::{AnjuNotifyConfig, AnjuNotifySDK, ContactStatus};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // 配置 SDK
//!     let config = AnjuNotifyConfig::builder()
//!         .base_url("https://admin.anju.homes/api")
//!         .poll_interval_secs(120)
//!         .build();
//!
//!     // 创建并启动（对应 UI 挂载）
//!     let sdk = AnjuNotifySDK::new(config)?;
//!     sdk.start()?;
//!
//!     // 读取当前计数 / 订阅变更
//!     let counters = sdk.counters();
//!     println!("未读联系: {}", counters.new);
//!
//!     // 标记已读（本地计数即时扣减，不等服务端确认）
//!     sdk.mark_contact_read(1001, ContactStatus::New).await?;
//!
//!     // 停止（对应 UI 卸载）
//!     sdk.stop().await;
//!     Ok(())
//! }
//! ```

// 导出核心模块
pub mod contact;
pub mod counters;
pub mod error;
pub mod events;
pub mod gateway;
pub mod mutator;
pub mod poller;
pub mod push;
pub mod sdk;
pub mod snapshot;
pub mod version;

#[cfg(test)]
pub(crate) mod test_support;

// 重新导出核心类型，方便使用
pub use contact::{count_unread, ContactRecord, ContactStatus};
pub use counters::{CounterStore, NotificationCounters, UpdateSource};
pub use error::{AnjuNotifyError, Result};
pub use events::{EventManager, EventStats, SdkEvent};
pub use gateway::{ContactGateway, EventByteStream, HttpContactGateway, HttpGatewayConfig};
pub use mutator::{OptimisticMutator, PersistFailureHook};
pub use poller::PollingTimer;
pub use push::channel::{PushChannel, PushChannelConfig, PushChannelState};
pub use push::event::{encode_sse, PushEvent, SseFrameDecoder, KEEP_ALIVE_INTERVAL};
pub use sdk::{AnjuNotifyConfig, AnjuNotifyConfigBuilder, AnjuNotifySDK};
pub use snapshot::SnapshotFetcher;
