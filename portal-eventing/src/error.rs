//! 事件核心统一错误定义
//!
//! 覆盖解析、订阅管理、队列处理与配置校验的最小必要集合。
//! 处理器自身的失败使用 `anyhow::Error`，由总线捕获并计数，不在此枚举中传播。
//!
use thiserror::Error;

/// 统一错误类型
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum EventingError {
    // --- 解析 ---
    #[error("parse error: {reason}")]
    Parse { reason: String },

    // --- 事件总线 ---
    #[error("duplicate subscription id: {id}")]
    DuplicateSubscription { id: String },

    // --- 队列处理 ---
    #[error("event handlers failed: message={message_id}, failed={failed}/{matched}")]
    HandlersFailed {
        message_id: String,
        failed: usize,
        matched: usize,
    },
    #[error("processing timed out: message={message_id}, timeout_ms={timeout_ms}")]
    ProcessingTimeout { message_id: String, timeout_ms: u128 },
    #[error("message not found: {id}")]
    MessageNotFound { id: String },

    // --- 配置/运行时 ---
    #[error("invalid config: {reason}")]
    InvalidConfig { reason: String },
    #[error("no tokio runtime available: {reason}")]
    NoRuntime { reason: String },
}

impl EventingError {
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
        }
    }

    pub fn invalid_config(reason: impl Into<String>) -> Self {
        Self::InvalidConfig {
            reason: reason.into(),
        }
    }
}

/// 统一 Result 类型别名
pub type EventingResult<T> = Result<T, EventingError>;
