//! 门户 Webhook 投递（portal-webhooks）
//!
//! 将事件总线上的部分领域事件推送给外部注册的端点：
//! - 注册表（`model`）：Webhook 配置、注册/更新请求、投递结果；
//! - 传输层（`transport`）：`WebhookTransport` 抽象，HTTP 实现（`http` 特性）与模拟实现；
//! - 签名（`signature`）：HMAC-SHA256 请求体签名与校验；
//! - 分发器（`dispatcher`）：订阅总线，按 Webhook 独立地带退避重试投递，并记录每次尝试。
//!
//! Webhook 的重试策略与 `PriorityRetryQueue` 相互独立。
//!
pub mod config;
pub mod dispatcher;
pub mod error;
#[cfg(feature = "http")]
pub mod http;
pub mod model;
pub mod signature;
pub mod simulated;
pub mod transport;

pub use config::WebhookDispatcherConfig;
pub use dispatcher::{WEBHOOK_EVENT_TYPES, WebhookDispatcher};
pub use error::{TransportError, WebhookError, WebhookResult};
#[cfg(feature = "http")]
pub use http::HttpTransport;
pub use model::{
    DeliveryHistoryFilter, WebhookConfig, WebhookDeliveryResult, WebhookRegistration,
    WebhookUpdate,
};
pub use simulated::SimulatedTransport;
pub use transport::{DeliveryResponse, WebhookTransport};
