use crate::error::TransportError;
use crate::model::WebhookConfig;
use crate::transport::{DeliveryResponse, WebhookTransport};
use async_trait::async_trait;
use portal_eventing::Event;
use rand::Rng;
use std::time::Duration;
use tracing::debug;

/// 模拟传输：等待固定延迟后，以给定概率成功，否则返回 500
#[derive(Debug, Clone)]
pub struct SimulatedTransport {
    success_rate: f64,
    latency: Duration,
}

impl Default for SimulatedTransport {
    fn default() -> Self {
        Self::new(0.9, Duration::from_millis(100))
    }
}

impl SimulatedTransport {
    /// `success_rate` 会被截断到 `[0, 1]`
    pub fn new(success_rate: f64, latency: Duration) -> Self {
        let success_rate = if success_rate.is_nan() {
            0.0
        } else {
            success_rate.clamp(0.0, 1.0)
        };
        Self {
            success_rate,
            latency,
        }
    }

    pub fn success_rate(&self) -> f64 {
        self.success_rate
    }

    pub fn latency(&self) -> Duration {
        self.latency
    }
}

#[async_trait]
impl WebhookTransport for SimulatedTransport {
    async fn deliver(
        &self,
        webhook: &WebhookConfig,
        event: &Event,
    ) -> Result<DeliveryResponse, TransportError> {
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        let succeeded = rand::thread_rng().gen_bool(self.success_rate);
        let status_code = if succeeded { 200 } else { 500 };
        debug!(
            webhook_id = %webhook.id,
            event_id = event.id(),
            status_code,
            "simulated delivery"
        );
        Ok(DeliveryResponse { status_code })
    }
}
