use crate::error::TransportError;
use crate::model::WebhookConfig;
use async_trait::async_trait;
use portal_eventing::Event;
use serde::{Deserialize, Serialize};

/// 端点的应答
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeliveryResponse {
    pub status_code: u16,
}

impl DeliveryResponse {
    /// 仅 2xx 视为成功
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}

/// 对外投递的传输层
///
/// 实现方只负责一次请求；超时、重试与结果记录由分发器负责。
#[async_trait]
pub trait WebhookTransport: Send + Sync {
    async fn deliver(
        &self,
        webhook: &WebhookConfig,
        event: &Event,
    ) -> Result<DeliveryResponse, TransportError>;
}
