use std::fmt;

#[derive(Debug)]
pub enum AnjuNotifyError {
    Config(String),         // 配置错误
    Transport(String),      // 传输层错误
    Serialization(String),  // 序列化错误
    Timeout(String),        // 超时
    InvalidOperation(String),
    ServerError(String),    // 服务端错误（非 2xx 响应）
    IO(String),
    Other(String),
}

impl fmt::Display for AnjuNotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AnjuNotifyError::Config(e) => write!(f, "Config error: {}", e),
            AnjuNotifyError::Transport(e) => write!(f, "Transport error: {}", e),
            AnjuNotifyError::Serialization(e) => write!(f, "Serialization error: {}", e),
            AnjuNotifyError::Timeout(e) => write!(f, "Timeout: {}", e),
            AnjuNotifyError::InvalidOperation(e) => write!(f, "Invalid operation: {}", e),
            AnjuNotifyError::ServerError(e) => write!(f, "Server error: {}", e),
            AnjuNotifyError::IO(e) => write!(f, "IO error: {}", e),
            AnjuNotifyError::Other(e) => write!(f, "Other error: {}", e),
        }
    }
}

impl std::error::Error for AnjuNotifyError {}

impl From<serde_json::Error> for AnjuNotifyError {
    fn from(error: serde_json::Error) -> Self {
        AnjuNotifyError::Serialization(error.to_string())
    }
}

impl From<reqwest::Error> for AnjuNotifyError {
    fn from(error: reqwest::Error) -> Self {
        if error.is_timeout() {
            AnjuNotifyError::Timeout(error.to_string())
        } else {
            AnjuNotifyError::Transport(error.to_string())
        }
    }
}

impl From<std::io::Error> for AnjuNotifyError {
    fn from(error: std::io::Error) -> Self {
        AnjuNotifyError::IO(error.to_string())
    }
}

pub type Result<T> = std::result::Result<T, AnjuNotifyError>;
