//! HTTP 网关模块 - 通知子系统与后台 CRUD/API 层的边界
//!
//! 本模块提供快照拉取、联系状态提交和 SSE 推送流三个边界操作，
//! 使用 reqwest 作为底层 HTTP 客户端。后台资源层（房源 CRUD、
//! 报表、模板等）不属于本 SDK，只通过这些接口协作。

use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use futures_util::StreamExt;
use reqwest::Client;
use serde::Serialize;
use tracing::{error, info};

use crate::contact::ContactStatus;
use crate::counters::NotificationCounters;
use crate::error::{AnjuNotifyError, Result};

/// 推送流的字节流类型（连接建立后逐块产出）
pub type EventByteStream = BoxStream<'static, Result<Bytes>>;

/// 联系资源网关
///
/// SDK 与后台 API 之间的接缝；测试用内存实现替换，
/// 生产使用 [`HttpContactGateway`]。
#[async_trait]
pub trait ContactGateway: Send + Sync {
    /// 拉取权威计数快照（GET）
    async fn fetch_snapshot(&self) -> Result<NotificationCounters>;

    /// 提交联系状态变更（PATCH，body 为 `{ id, status }`）
    async fn update_contact_status(&self, contact_id: u64, status: ContactStatus) -> Result<()>;

    /// 打开服务端推送流（text/event-stream）
    ///
    /// 返回时连接已建立；后续断开由流本身的错误 / 结束表达。
    async fn open_event_stream(&self) -> Result<EventByteStream>;
}

/// 状态提交请求体
#[derive(Debug, Serialize)]
struct UpdateStatusBody {
    id: u64,
    status: ContactStatus,
}

/// HTTP 网关配置
#[derive(Debug, Clone)]
pub struct HttpGatewayConfig {
    /// 后台 API 基础 URL（如 https://admin.anju.homes/api）
    pub base_url: String,
    /// Bearer token（可选）
    pub auth_token: Option<String>,
    /// 普通请求超时（秒）
    pub request_timeout_secs: u64,
}

/// HTTP 联系网关
pub struct HttpContactGateway {
    client: Client,
    /// 推送流专用 client：长连接不能设整体超时，否则会被固定时长掐断
    stream_client: Client,
    config: HttpGatewayConfig,
}

impl HttpContactGateway {
    /// 创建新的 HTTP 网关
    pub fn new(config: HttpGatewayConfig) -> Result<Self> {
        if config.base_url.is_empty() {
            return Err(AnjuNotifyError::Config("base_url 不能为空".to_string()));
        }

        let client = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .build()
            .map_err(|e| AnjuNotifyError::Other(format!("创建 HTTP 客户端失败: {}", e)))?;

        let stream_client = Client::builder()
            .build()
            .map_err(|e| AnjuNotifyError::Other(format!("创建推送流客户端失败: {}", e)))?;

        info!("✅ HTTP 网关已创建 (base_url: {})", config.base_url);

        Ok(Self {
            client,
            stream_client,
            config,
        })
    }

    fn url(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.base_url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    fn authorize(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.auth_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

#[async_trait]
impl ContactGateway for HttpContactGateway {
    async fn fetch_snapshot(&self) -> Result<NotificationCounters> {
        let url = self.url("contacts/notifications");

        // 1. 发送请求
        let response = self
            .authorize(self.client.get(&url))
            .send()
            .await
            .map_err(|e| AnjuNotifyError::Transport(format!("拉取计数快照失败: {}", e)))?;

        // 2. 检查响应状态（非 2xx 视为拉取失败，调用方保留旧计数）
        let status = response.status();
        if !status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误信息".to_string());
            error!("❌ 快照拉取失败，HTTP 状态码: {}, 错误: {}", status, error_text);
            return Err(AnjuNotifyError::ServerError(format!(
                "快照拉取失败，HTTP 状态码: {} ({})",
                status, error_text
            )));
        }

        // 3. 解析响应
        let counters: NotificationCounters = response
            .json()
            .await
            .map_err(|e| AnjuNotifyError::Serialization(format!("解析计数快照失败: {}", e)))?;

        Ok(counters)
    }

    async fn update_contact_status(&self, contact_id: u64, status: ContactStatus) -> Result<()> {
        let url = self.url("contacts/status");
        let body = UpdateStatusBody {
            id: contact_id,
            status,
        };

        // 1. 发送请求
        let response = self
            .authorize(self.client.patch(&url))
            .json(&body)
            .send()
            .await
            .map_err(|e| AnjuNotifyError::Transport(format!("提交联系状态失败: {}", e)))?;

        // 2. 检查响应状态
        let http_status = response.status();
        if !http_status.is_success() {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "无法读取错误信息".to_string());
            error!(
                "❌ 状态提交失败，HTTP 状态码: {}, 错误: {}",
                http_status, error_text
            );
            return Err(AnjuNotifyError::ServerError(format!(
                "状态提交失败，HTTP 状态码: {} ({})",
                http_status, error_text
            )));
        }

        Ok(())
    }

    async fn open_event_stream(&self) -> Result<EventByteStream> {
        let url = self.url("contacts/notifications/stream");

        // 1. 建立长连接（收到响应头即视为连接建立）
        let response = self
            .authorize(self.stream_client.get(&url))
            .header(reqwest::header::ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| AnjuNotifyError::Transport(format!("打开推送流失败: {}", e)))?;

        // 2. 检查响应状态
        let status = response.status();
        if !status.is_success() {
            return Err(AnjuNotifyError::ServerError(format!(
                "打开推送流失败，HTTP 状态码: {}",
                status
            )));
        }

        // 3. 转为字节流，传输错误映射到领域错误
        let stream = response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| AnjuNotifyError::Transport(format!("读取推送流失败: {}", e))));

        Ok(stream.boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joining_tolerates_slashes() {
        let gateway = HttpContactGateway::new(HttpGatewayConfig {
            base_url: "http://127.0.0.1:8080/api/".to_string(),
            auth_token: None,
            request_timeout_secs: 30,
        })
        .unwrap();

        assert_eq!(
            gateway.url("/contacts/notifications"),
            "http://127.0.0.1:8080/api/contacts/notifications"
        );
        assert_eq!(
            gateway.url("contacts/status"),
            "http://127.0.0.1:8080/api/contacts/status"
        );
    }

    #[test]
    fn test_empty_base_url_is_config_error() {
        let result = HttpContactGateway::new(HttpGatewayConfig {
            base_url: String::new(),
            auth_token: None,
            request_timeout_secs: 30,
        });
        assert!(matches!(result, Err(AnjuNotifyError::Config(_))));
    }

    #[test]
    fn test_update_status_body_shape() {
        let body = UpdateStatusBody {
            id: 42,
            status: ContactStatus::Read,
        };
        let json = serde_json::to_value(&body).unwrap();
        assert_eq!(json, serde_json::json!({ "id": 42, "status": "read" }));
    }
}
