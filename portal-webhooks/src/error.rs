//! Webhook 错误定义
//!
use thiserror::Error;

/// 单次传输的失败原因
#[non_exhaustive]
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("delivery timed out after {timeout_ms}ms")]
    Timeout { timeout_ms: u128 },
    #[error("network error: {reason}")]
    Network { reason: String },
    #[error("payload error: {reason}")]
    Payload { reason: String },
    #[error("transport configuration error: {reason}")]
    Configuration { reason: String },
}

impl TransportError {
    pub fn network(reason: impl Into<String>) -> Self {
        Self::Network {
            reason: reason.into(),
        }
    }

    pub fn payload(reason: impl Into<String>) -> Self {
        Self::Payload {
            reason: reason.into(),
        }
    }
}

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook not found: {id}")]
    NotFound { id: String },
    #[error("webhook is inactive: {id}")]
    Inactive { id: String },
    #[error("invalid webhook registration: {reason}")]
    InvalidRegistration { reason: String },
    #[error("signature error: {reason}")]
    Signature { reason: String },
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl WebhookError {
    pub fn invalid_registration(reason: impl Into<String>) -> Self {
        Self::InvalidRegistration {
            reason: reason.into(),
        }
    }

    pub fn signature(reason: impl Into<String>) -> Self {
        Self::Signature {
            reason: reason.into(),
        }
    }
}

pub type WebhookResult<T> = Result<T, WebhookError>;
