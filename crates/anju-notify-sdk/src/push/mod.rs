//! 推送通道模块
//!
//! 服务端到客户端的单向 text/event-stream 通道：
//! - event: 线格式与事件模型（客户端与嵌入服务端共用）
//! - channel: 客户端连接状态机与事件分发

pub mod channel;
pub mod event;

pub use channel::{PushChannel, PushChannelConfig, PushChannelState};
pub use event::{encode_sse, PushEvent, SseFrameDecoder, KEEP_ALIVE_INTERVAL};
