//! 事件服务容器
//!
//! 显式构造总线、队列与 Webhook 分发器，并以引用方式传递给调用方。
//!
use crate::config::{RuntimeConfig, TransportConfig};
use crate::error::RuntimeResult;
use bon::bon;
use portal_eventing::{EventBus, PriorityRetryQueue};
use portal_webhooks::{SimulatedTransport, WebhookDispatcher, WebhookTransport};
use std::sync::Arc;
use tracing::info;

pub struct EventingServices {
    bus: Arc<EventBus>,
    queue: PriorityRetryQueue,
    webhooks: WebhookDispatcher,
    config: RuntimeConfig,
}

#[bon]
impl EventingServices {
    /// 需在 Tokio 运行时内调用；未指定 `transport` 时按配置构造
    #[builder]
    pub fn new(
        #[builder(default)] config: RuntimeConfig,
        transport: Option<Arc<dyn WebhookTransport>>,
    ) -> RuntimeResult<Self> {
        config.validate()?;
        let transport = match transport {
            Some(transport) => transport,
            None => build_transport(&config.transport)?,
        };

        let bus = Arc::new(EventBus::new(config.bus));
        let queue = PriorityRetryQueue::new(bus.clone(), config.queue.clone())?;
        let webhooks = WebhookDispatcher::new(bus.clone(), transport, config.webhooks);
        info!(
            max_concurrent = config.queue.max_concurrent,
            history_capacity = config.bus.history_capacity,
            "eventing services started"
        );
        Ok(Self {
            bus,
            queue,
            webhooks,
            config,
        })
    }

    pub fn bus(&self) -> &Arc<EventBus> {
        &self.bus
    }

    pub fn queue(&self) -> &PriorityRetryQueue {
        &self.queue
    }

    pub fn webhooks(&self) -> &WebhookDispatcher {
        &self.webhooks
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    /// 停止队列循环，再关闭分发器并等待在途投递
    pub async fn shutdown(&self) {
        self.queue.shutdown();
        self.webhooks.shutdown().await;
        info!("eventing services stopped");
    }
}

fn build_transport(config: &TransportConfig) -> RuntimeResult<Arc<dyn WebhookTransport>> {
    match config {
        TransportConfig::Simulated {
            success_rate,
            latency,
        } => Ok(Arc::new(SimulatedTransport::new(*success_rate, *latency))),
        #[cfg(feature = "http")]
        TransportConfig::Http {
            user_agent,
            connect_timeout,
        } => {
            let transport = portal_webhooks::HttpTransport::new(user_agent, *connect_timeout)
                .map_err(portal_webhooks::WebhookError::from)?;
            Ok(Arc::new(transport))
        }
        #[cfg(not(feature = "http"))]
        TransportConfig::Http { .. } => Err(crate::error::RuntimeError::config(
            "http transport requires the `http` feature",
        )),
    }
}
