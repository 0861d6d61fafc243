//! 基于 reqwest 的 HTTP 传输
//!
//! 以 JSON 请求体 POST 事件，附带 Webhook id、事件类型与事件 id 头；
//! 配置了密钥时附带 `X-Webhook-Signature`。
//!
use crate::error::TransportError;
use crate::model::WebhookConfig;
use crate::signature::{
    HEADER_DELIVERY, HEADER_EVENT, HEADER_SIGNATURE, HEADER_WEBHOOK_ID, sign_payload,
};
use crate::transport::{DeliveryResponse, WebhookTransport};
use async_trait::async_trait;
use portal_eventing::Event;
use reqwest::header::CONTENT_TYPE;
use std::time::Duration;
use tracing::{debug, warn};

pub const DEFAULT_USER_AGENT: &str = "portal-events/0.1";

#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(user_agent: &str, connect_timeout: Duration) -> Result<Self, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(user_agent)
            .connect_timeout(connect_timeout)
            .build()
            .map_err(|err| TransportError::Configuration {
                reason: format!("failed to build HTTP client: {err}"),
            })?;
        Ok(Self { client })
    }

    pub fn with_defaults() -> Result<Self, TransportError> {
        Self::new(DEFAULT_USER_AGENT, Duration::from_secs(10))
    }
}

#[async_trait]
impl WebhookTransport for HttpTransport {
    async fn deliver(
        &self,
        webhook: &WebhookConfig,
        event: &Event,
    ) -> Result<DeliveryResponse, TransportError> {
        let body = serde_json::to_vec(event).map_err(|err| TransportError::payload(err.to_string()))?;

        let mut request = self
            .client
            .post(&webhook.url)
            .timeout(webhook.timeout)
            .header(CONTENT_TYPE, "application/json")
            .header(HEADER_WEBHOOK_ID, webhook.id.as_str())
            .header(HEADER_EVENT, event.event_type().as_str())
            .header(HEADER_DELIVERY, event.id());
        if let Some(secret) = &webhook.secret {
            let signature =
                sign_payload(secret, &body).map_err(|err| TransportError::payload(err.to_string()))?;
            request = request.header(HEADER_SIGNATURE, signature);
        }

        let response = request.body(body).send().await.map_err(|err| {
            warn!(webhook_id = %webhook.id, error = %err, "webhook request failed");
            if err.is_timeout() {
                TransportError::Timeout {
                    timeout_ms: webhook.timeout.as_millis(),
                }
            } else {
                TransportError::network(err.to_string())
            }
        })?;

        let status_code = response.status().as_u16();
        debug!(webhook_id = %webhook.id, event_id = event.id(), status_code, "webhook responded");
        Ok(DeliveryResponse { status_code })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::WebhookRegistration;
    use portal_eventing::EventType;
    use serde_json::json;

    #[tokio::test]
    async fn refused_connection_is_a_network_error() {
        let transport = HttpTransport::new("test", Duration::from_secs(2)).unwrap();
        let webhook = WebhookRegistration::builder()
            .url("http://127.0.0.1:9/hook")
            .events([EventType::TicketCreated])
            .timeout(Duration::from_secs(2))
            .build()
            .into_config()
            .unwrap();
        let event = Event::new(EventType::TicketCreated, json!({}), "test");

        let err = transport.deliver(&webhook, &event).await.unwrap_err();
        assert!(matches!(
            err,
            TransportError::Network { .. } | TransportError::Timeout { .. }
        ));
    }
}
