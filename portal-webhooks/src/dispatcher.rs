//! Webhook 分发器
//!
//! 构造时向总线订阅一次固定的事件类型集合。匹配事件到达后，
//! 为每个启用且订阅了该类型的 Webhook 启动一个独立的投递任务，总线处理器立即返回。
//!
//! 每次尝试（无论成败）都写入有界投递历史；失败且未用尽重试次数时，
//! 等待 `backoff_unit × 2^retry_count` 后重试。
//!
use crate::config::WebhookDispatcherConfig;
use crate::error::{TransportError, WebhookError, WebhookResult};
use crate::model::{
    DeliveryHistoryFilter, WebhookConfig, WebhookDeliveryResult, WebhookRegistration,
    WebhookUpdate,
};
use crate::transport::WebhookTransport;
use async_trait::async_trait;
use dashmap::DashMap;
use portal_eventing::retry::exponential_backoff;
use portal_eventing::{BoundedHistory, Event, EventBus, EventHandler, EventType};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{Instrument, debug, info, info_span, warn};

/// 分发器在总线上关注的事件类型
pub const WEBHOOK_EVENT_TYPES: [EventType; 10] = [
    EventType::TicketCreated,
    EventType::TicketAssigned,
    EventType::TicketResolved,
    EventType::TicketClosed,
    EventType::CourseCompleted,
    EventType::RequisitionCreated,
    EventType::RequisitionApproved,
    EventType::RequisitionCompleted,
    EventType::AssessmentCreated,
    EventType::SkillGapIdentified,
];

struct DispatcherState {
    webhooks: DashMap<String, WebhookConfig>,
    history: Mutex<BoundedHistory<WebhookDeliveryResult>>,
    transport: Arc<dyn WebhookTransport>,
    config: WebhookDispatcherConfig,
    tracker: TaskTracker,
    cancel: CancellationToken,
}

pub struct WebhookDispatcher {
    state: Arc<DispatcherState>,
    bus: Arc<EventBus>,
    subscription_id: String,
}

/// 总线处理器：只负责派生投递任务
struct WebhookFanout {
    state: Arc<DispatcherState>,
}

#[async_trait]
impl EventHandler for WebhookFanout {
    fn handler_name(&self) -> &str {
        "webhook-fanout"
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        DispatcherState::fan_out(&self.state, event);
        Ok(())
    }
}

impl WebhookDispatcher {
    pub fn new(
        bus: Arc<EventBus>,
        transport: Arc<dyn WebhookTransport>,
        config: WebhookDispatcherConfig,
    ) -> Self {
        let state = Arc::new(DispatcherState {
            webhooks: DashMap::new(),
            history: Mutex::new(BoundedHistory::new(config.history_capacity)),
            transport,
            config,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
        });
        let fanout = WebhookFanout {
            state: Arc::clone(&state),
        };
        let subscription_id = bus.on(WEBHOOK_EVENT_TYPES.to_vec(), Arc::new(fanout));
        debug!(subscription_id = %subscription_id, "webhook dispatcher subscribed");
        Self {
            state,
            bus,
            subscription_id,
        }
    }

    pub fn config(&self) -> &WebhookDispatcherConfig {
        &self.state.config
    }

    pub fn register_webhook(&self, registration: WebhookRegistration) -> WebhookResult<WebhookConfig> {
        let config = registration.into_config()?;
        self.state.webhooks.insert(config.id.clone(), config.clone());
        info!(webhook_id = %config.id, url = %config.url, "webhook registered");
        Ok(config)
    }

    pub fn unregister_webhook(&self, id: &str) -> bool {
        let removed = self.state.webhooks.remove(id).is_some();
        if removed {
            info!(webhook_id = id, "webhook unregistered");
        }
        removed
    }

    pub fn update_webhook(&self, id: &str, update: WebhookUpdate) -> WebhookResult<WebhookConfig> {
        let mut entry = self
            .state
            .webhooks
            .get_mut(id)
            .ok_or_else(|| WebhookError::NotFound { id: id.to_string() })?;
        let merged = update.apply(&entry)?;
        *entry = merged.clone();
        debug!(webhook_id = id, "webhook updated");
        Ok(merged)
    }

    pub fn set_webhook_active(&self, id: &str, active: bool) -> WebhookResult<WebhookConfig> {
        self.update_webhook(id, WebhookUpdate::builder().active(active).build())
    }

    pub fn webhook(&self, id: &str) -> Option<WebhookConfig> {
        self.state.webhooks.get(id).map(|entry| entry.value().clone())
    }

    /// 按创建时间排序
    pub fn webhooks(&self) -> Vec<WebhookConfig> {
        let mut all: Vec<WebhookConfig> = self
            .state
            .webhooks
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        all.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        all
    }

    /// 按需投递到指定 Webhook
    ///
    /// Webhook 不存在或未启用时返回失败结果，不写入历史。
    pub async fn deliver_to_webhook(&self, id: &str, event: &Event) -> WebhookDeliveryResult {
        let webhook = match self.webhook(id) {
            None => {
                let err = WebhookError::NotFound { id: id.to_string() };
                return WebhookDeliveryResult::failed(id, event.id(), None, err, 0);
            }
            Some(webhook) if !webhook.active => {
                let err = WebhookError::Inactive { id: id.to_string() };
                return WebhookDeliveryResult::failed(id, event.id(), None, err, 0);
            }
            Some(webhook) => webhook,
        };
        self.state.attempt_delivery(&webhook, event, 0).await
    }

    /// 投递历史（时间顺序）
    pub fn delivery_history(&self, filter: &DeliveryHistoryFilter) -> Vec<WebhookDeliveryResult> {
        self.state.history().select(
            |r| {
                filter
                    .webhook_id
                    .as_deref()
                    .is_none_or(|id| r.webhook_id == id)
            },
            filter.limit,
        )
    }

    /// 等待目前已启动的投递任务全部结束
    pub async fn drain(&self) {
        let tracker = &self.state.tracker;
        tracker.close();
        tracker.wait().await;
        tracker.reopen();
    }

    /// 退订总线、取消退避等待并等待在途任务结束
    pub async fn shutdown(&self) {
        self.bus.unsubscribe(&self.subscription_id);
        self.state.cancel.cancel();
        self.drain().await;
        info!("webhook dispatcher shut down");
    }
}

impl Drop for WebhookDispatcher {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.subscription_id);
        self.state.cancel.cancel();
    }
}

impl DispatcherState {
    fn history(&self) -> MutexGuard<'_, BoundedHistory<WebhookDeliveryResult>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn fan_out(self: &Arc<Self>, event: &Event) {
        if self.cancel.is_cancelled() {
            return;
        }
        let targets: Vec<WebhookConfig> = self
            .webhooks
            .iter()
            .filter(|entry| entry.wants(event.event_type()))
            .map(|entry| entry.value().clone())
            .collect();
        if targets.is_empty() {
            debug!(event_id = event.id(), event_type = %event.event_type(), "no webhooks want event");
            return;
        }

        for webhook in targets {
            let state = Arc::clone(self);
            let event = event.clone();
            self.tracker.spawn(async move {
                state.attempt_delivery(&webhook, &event, 0).await;
            });
        }
    }

    /// 从第 `retry_count` 次尝试开始投递，返回最后一次尝试的结果
    async fn attempt_delivery(
        &self,
        webhook: &WebhookConfig,
        event: &Event,
        retry_count: u32,
    ) -> WebhookDeliveryResult {
        let mut attempt = retry_count;
        loop {
            let span = info_span!(
                "webhook_attempt",
                webhook_id = %webhook.id,
                event_id = event.id(),
                attempt
            );
            let result = self.deliver_once(webhook, event, attempt).instrument(span).await;
            self.history().push(result.clone());

            if result.success || attempt >= webhook.retry_count {
                return result;
            }

            let delay = exponential_backoff(self.config.backoff_unit, attempt);
            tokio::select! {
                _ = self.cancel.cancelled() => {
                    debug!(webhook_id = %webhook.id, "webhook backoff cancelled");
                    return result;
                }
                _ = tokio::time::sleep(delay) => {}
            }
            attempt += 1;
        }
    }

    async fn deliver_once(
        &self,
        webhook: &WebhookConfig,
        event: &Event,
        attempt: u32,
    ) -> WebhookDeliveryResult {
        let outcome =
            tokio::time::timeout(webhook.timeout, self.transport.deliver(webhook, event)).await;
        let result = match outcome {
            Ok(Ok(response)) if response.is_success() => WebhookDeliveryResult::succeeded(
                &webhook.id,
                event.id(),
                response.status_code,
                attempt,
            ),
            Ok(Ok(response)) => WebhookDeliveryResult::failed(
                &webhook.id,
                event.id(),
                Some(response.status_code),
                format!("unexpected status code {}", response.status_code),
                attempt,
            ),
            Ok(Err(err)) => WebhookDeliveryResult::failed(&webhook.id, event.id(), None, err, attempt),
            Err(_) => {
                let err = TransportError::Timeout {
                    timeout_ms: webhook.timeout.as_millis(),
                };
                WebhookDeliveryResult::failed(&webhook.id, event.id(), None, err, attempt)
            }
        };

        if result.success {
            debug!(status_code = ?result.status_code, "webhook delivered");
        } else {
            warn!(
                status_code = ?result.status_code,
                error = result.error.as_deref().unwrap_or_default(),
                "webhook delivery failed"
            );
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulated::SimulatedTransport;
    use serde_json::json;
    use std::time::Duration;

    fn dispatcher(bus: &Arc<EventBus>) -> WebhookDispatcher {
        WebhookDispatcher::new(
            bus.clone(),
            Arc::new(SimulatedTransport::new(1.0, Duration::ZERO)),
            WebhookDispatcherConfig::default(),
        )
    }

    #[tokio::test]
    async fn subscribes_once_and_unsubscribes_on_drop() {
        let bus = Arc::new(EventBus::default());
        let dispatcher = dispatcher(&bus);
        assert_eq!(bus.subscription_count(), 1);
        drop(dispatcher);
        assert_eq!(bus.subscription_count(), 0);
    }

    #[tokio::test]
    async fn webhooks_are_listed_by_creation_time() {
        let bus = Arc::new(EventBus::default());
        let dispatcher = dispatcher(&bus);
        let first = dispatcher
            .register_webhook(
                WebhookRegistration::builder()
                    .url("https://a.example.com")
                    .events([EventType::TicketCreated])
                    .build(),
            )
            .unwrap();
        tokio::time::sleep(Duration::from_millis(2)).await;
        let second = dispatcher
            .register_webhook(
                WebhookRegistration::builder()
                    .url("https://b.example.com")
                    .events([EventType::TicketClosed])
                    .build(),
            )
            .unwrap();

        let ids: Vec<String> = dispatcher.webhooks().into_iter().map(|w| w.id).collect();
        assert_eq!(ids, vec![first.id.clone(), second.id]);

        assert!(dispatcher.unregister_webhook(&first.id));
        assert!(dispatcher.webhook(&first.id).is_none());
        assert!(!dispatcher.unregister_webhook(&first.id));
    }

    #[tokio::test]
    async fn on_demand_delivery_to_missing_or_inactive_webhook() {
        let bus = Arc::new(EventBus::default());
        let dispatcher = dispatcher(&bus);
        let event = Event::new(EventType::TicketCreated, json!({}), "test");

        let missing = dispatcher.deliver_to_webhook("wh-missing", &event).await;
        assert!(!missing.success);
        assert!(missing.error.as_deref().unwrap().contains("not found"));

        let webhook = dispatcher
            .register_webhook(
                WebhookRegistration::builder()
                    .url("https://a.example.com")
                    .events([EventType::TicketCreated])
                    .active(false)
                    .build(),
            )
            .unwrap();
        let inactive = dispatcher.deliver_to_webhook(&webhook.id, &event).await;
        assert!(!inactive.success);
        assert!(inactive.error.as_deref().unwrap().contains("inactive"));

        assert!(
            dispatcher
                .delivery_history(&DeliveryHistoryFilter::default())
                .is_empty()
        );

        dispatcher.set_webhook_active(&webhook.id, true).unwrap();
        let delivered = dispatcher.deliver_to_webhook(&webhook.id, &event).await;
        assert!(delivered.success);
        assert_eq!(delivered.status_code, Some(200));
        assert_eq!(
            dispatcher
                .delivery_history(&DeliveryHistoryFilter::default())
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn update_unknown_webhook_is_not_found() {
        let bus = Arc::new(EventBus::default());
        let dispatcher = dispatcher(&bus);
        let err = dispatcher
            .set_webhook_active("wh-missing", false)
            .unwrap_err();
        assert!(matches!(err, WebhookError::NotFound { .. }));
    }
}
