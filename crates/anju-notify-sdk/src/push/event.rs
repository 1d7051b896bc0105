//! 推送事件线格式
//!
//! SSE 约定：每个事件一行 `data: ` 前缀 + JSON 对象，空行结尾。
//! 事件以 type 字段区分；notifications_update 的计数字段平铺在
//! 事件对象里：
//!
//! ```text
//! data: {"type":"notifications_update","new":4,"recent":9,"weekly":20}
//!
//! ```

use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::counters::NotificationCounters;

/// 服务端 keep-alive 间隔（30 秒），服务端契约常量
///
/// 用于探测死连接并防止中间设备把空闲长连接掐断。
pub const KEEP_ALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// 推送事件
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PushEvent {
    /// 连接建立后服务端发送一次，仅作通知
    ConnectionEstablished,
    /// 固定间隔心跳，无需任何动作
    KeepAlive,
    /// 携带完整计数三元组，收到后整体替换本地计数
    NotificationsUpdate(NotificationCounters),
}

impl PushEvent {
    /// 事件类型标签
    pub fn event_type(&self) -> &'static str {
        match self {
            PushEvent::ConnectionEstablished => "connection_established",
            PushEvent::KeepAlive => "keep_alive",
            PushEvent::NotificationsUpdate(_) => "notifications_update",
        }
    }
}

/// 编码为 SSE 帧（data 行 + 空行）
pub fn encode_sse(event: &PushEvent) -> String {
    // 本枚举序列化不会失败，保底给空对象
    let json = serde_json::to_string(event).unwrap_or_else(|_| "{}".to_string());
    format!("data: {}\n\n", json)
}

/// SSE 帧解码器（增量）
///
/// 按块累积字节，空行作为帧边界；只消费 `data:` 行，
/// `event:` / `id:` / `retry:` 与 `:` 开头的注释行一律忽略。
/// 单条 JSON 解析失败只丢弃该条并打日志，不关闭连接。
#[derive(Debug, Default)]
pub struct SseFrameDecoder {
    buffer: String,
}

impl SseFrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 喂入一块字节，返回其中完整帧解出的事件
    pub fn feed(&mut self, chunk: &[u8]) -> Vec<PushEvent> {
        // SSE 规定 UTF-8 编码；非法字节按替换字符处理
        self.buffer.push_str(&String::from_utf8_lossy(chunk));

        let mut events = Vec::new();
        while let Some(frame) = self.take_frame() {
            if let Some(event) = Self::parse_frame(&frame) {
                events.push(event);
            }
        }
        events
    }

    /// 取出一个完整帧（LF 与 CRLF 两种空行边界都接受）
    fn take_frame(&mut self) -> Option<String> {
        let lf = self.buffer.find("\n\n");
        let crlf = self.buffer.find("\r\n\r\n");
        let (pos, sep_len) = match (lf, crlf) {
            (Some(l), Some(c)) => {
                if c < l {
                    (c, 4)
                } else {
                    (l, 2)
                }
            }
            (Some(l), None) => (l, 2),
            (None, Some(c)) => (c, 4),
            (None, None) => return None,
        };

        let frame = self.buffer[..pos].to_string();
        self.buffer.drain(..pos + sep_len);
        Some(frame)
    }

    /// 解析单个帧；帧里没有 data 行或负载非法时返回 None
    fn parse_frame(frame: &str) -> Option<PushEvent> {
        let mut data = String::new();
        for line in frame.lines() {
            let line = line.strip_suffix('\r').unwrap_or(line);
            if let Some(rest) = line.strip_prefix("data:") {
                if !data.is_empty() {
                    data.push('\n');
                }
                data.push_str(rest.strip_prefix(' ').unwrap_or(rest));
            }
            // event: / id: / retry: / 注释行不参与解析
        }
        if data.is_empty() {
            return None;
        }

        match serde_json::from_str::<PushEvent>(&data) {
            Ok(event) => Some(event),
            Err(_) => {
                // 兼容裸三元组负载（不带 type 字段的计数更新）
                match serde_json::from_str::<NotificationCounters>(&data) {
                    Ok(counters) => Some(PushEvent::NotificationsUpdate(counters)),
                    Err(e) => {
                        warn!("⚠️ 推送负载解析失败，丢弃该条: {} (data: {})", e, data);
                        None
                    }
                }
            }
        }
    }
}
