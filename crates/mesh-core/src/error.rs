//! 统一错误处理
//!
//! 桥接服务的错误只携带可读消息：单个样本丢失的代价很低，
//! 观测依赖日志而非带类型的错误通道。

use thiserror::Error;

/// 核心错误类型
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CoreError {
    // === 载荷解码 ===
    #[error("Decode failed: {message}")]
    Decode { message: String },

    // === NATS 连接与订阅 ===
    #[error("NATS error: {message}")]
    Nats { message: String },

    // === 快照存储（KV）访问 ===
    #[error("Snapshot store error: {message}")]
    Store { message: String },

    // === 指标导出 ===
    #[error("Export failed: {message}")]
    Export { message: String },

    // === 配置 ===
    #[error("Config error: {message}")]
    Config { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl CoreError {
    pub fn decode(message: impl Into<String>) -> Self {
        CoreError::Decode {
            message: message.into(),
        }
    }

    pub fn nats(message: impl Into<String>) -> Self {
        CoreError::Nats {
            message: message.into(),
        }
    }

    pub fn store(message: impl Into<String>) -> Self {
        CoreError::Store {
            message: message.into(),
        }
    }

    pub fn export(message: impl Into<String>) -> Self {
        CoreError::Export {
            message: message.into(),
        }
    }

    pub fn config_error(message: impl Into<String>) -> Self {
        CoreError::Config {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CoreError::Internal {
            message: message.into(),
        }
    }
}

/// Core 操作的 Result 类型别名
pub type Result<T> = std::result::Result<T, CoreError>;

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Decode {
            message: err.to_string(),
        }
    }
}

impl From<std::str::Utf8Error> for CoreError {
    fn from(err: std::str::Utf8Error) -> Self {
        CoreError::Decode {
            message: format!("payload is not valid UTF-8: {}", err),
        }
    }
}

impl From<async_nats::Error> for CoreError {
    fn from(err: async_nats::Error) -> Self {
        CoreError::Nats {
            message: err.to_string(),
        }
    }
}

impl From<figment::Error> for CoreError {
    fn from(err: figment::Error) -> Self {
        CoreError::Config {
            message: err.to_string(),
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Internal {
            message: err.to_string(),
        }
    }
}
