use portal_eventing::EventingError;
use portal_webhooks::WebhookError;
use thiserror::Error;

#[non_exhaustive]
#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error("config error: {reason}")]
    Config { reason: String },
    #[error("io error: {source}")]
    Io {
        #[from]
        source: std::io::Error,
    },
    #[error("serialization error: {source}")]
    Serde {
        #[from]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Eventing(#[from] EventingError),
    #[error(transparent)]
    Webhook(#[from] WebhookError),
}

impl RuntimeError {
    pub fn config(reason: impl Into<String>) -> Self {
        Self::Config {
            reason: reason.into(),
        }
    }
}

pub type RuntimeResult<T> = Result<T, RuntimeError>;
