use async_trait::async_trait;
use portal_eventing::{Event, EventBus, EventType};
use portal_webhooks::{
    DeliveryHistoryFilter, DeliveryResponse, TransportError, WebhookConfig, WebhookDispatcher,
    WebhookDispatcherConfig, WebhookRegistration, WebhookTransport,
};
use serde_json::json;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// 记录调用并按预设返回状态码的传输
struct SpyTransport {
    calls: AtomicUsize,
    targets: Mutex<Vec<String>>,
    status_code: u16,
    delay: Duration,
}

impl SpyTransport {
    fn answering(status_code: u16) -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            targets: Mutex::new(Vec::new()),
            status_code,
            delay: Duration::ZERO,
        })
    }

    fn hanging() -> Arc<Self> {
        Arc::new(Self {
            calls: AtomicUsize::new(0),
            targets: Mutex::new(Vec::new()),
            status_code: 200,
            delay: Duration::from_secs(5),
        })
    }

    fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl WebhookTransport for SpyTransport {
    async fn deliver(
        &self,
        webhook: &WebhookConfig,
        _event: &Event,
    ) -> Result<DeliveryResponse, TransportError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.targets.lock().unwrap().push(webhook.id.clone());
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        Ok(DeliveryResponse {
            status_code: self.status_code,
        })
    }
}

fn fast_config() -> WebhookDispatcherConfig {
    WebhookDispatcherConfig {
        backoff_unit: Duration::from_millis(1),
        ..Default::default()
    }
}

fn registration(url: &str, events: Vec<EventType>) -> WebhookRegistration {
    WebhookRegistration::builder().url(url).events(events).build()
}

#[tokio::test(flavor = "multi_thread")]
async fn failing_webhook_records_every_attempt() -> anyhow::Result<()> {
    let bus = Arc::new(EventBus::default());
    let transport = SpyTransport::answering(503);
    let dispatcher = WebhookDispatcher::new(bus.clone(), transport.clone(), fast_config());

    let webhook = dispatcher.register_webhook(registration(
        "https://hooks.example.com/tickets",
        vec![EventType::TicketCreated],
    ))?;
    assert_eq!(webhook.retry_count, 3);

    let event = bus
        .emit(EventType::TicketCreated, json!({"ticketId": "T-9"}), "helpdesk")
        .await;
    dispatcher.drain().await;

    let results = dispatcher.delivery_history(
        &DeliveryHistoryFilter::builder()
            .webhook_id(webhook.id.clone())
            .build(),
    );
    assert_eq!(results.len(), 4);
    assert_eq!(transport.calls(), 4);
    assert_eq!(
        results.iter().map(|r| r.retry_count).collect::<Vec<_>>(),
        vec![0, 1, 2, 3]
    );
    assert!(results.iter().all(|r| r.event_id == event.id()));
    assert!(results.iter().all(|r| r.status_code == Some(503)));
    assert!(!results.last().unwrap().success);

    let tail = dispatcher.delivery_history(&DeliveryHistoryFilter::builder().limit(2).build());
    assert_eq!(tail.len(), 2);
    assert_eq!(tail[1].retry_count, 3);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn successful_delivery_stops_after_first_attempt() -> anyhow::Result<()> {
    let bus = Arc::new(EventBus::default());
    let transport = SpyTransport::answering(204);
    let dispatcher = WebhookDispatcher::new(bus.clone(), transport.clone(), fast_config());

    let a = dispatcher.register_webhook(registration(
        "https://a.example.com",
        vec![EventType::RequisitionApproved],
    ))?;
    let b = dispatcher.register_webhook(registration(
        "https://b.example.com",
        vec![EventType::RequisitionApproved, EventType::TicketClosed],
    ))?;

    bus.emit(EventType::RequisitionApproved, json!({}), "hiring").await;
    dispatcher.drain().await;

    assert_eq!(transport.calls(), 2);
    let mut targets = transport.targets.lock().unwrap().clone();
    targets.sort();
    let mut expected = vec![a.id, b.id];
    expected.sort();
    assert_eq!(targets, expected);

    let history = dispatcher.delivery_history(&DeliveryHistoryFilter::default());
    assert!(history.iter().all(|r| r.success && r.retry_count == 0));
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn inactive_or_uninterested_webhooks_are_skipped() -> anyhow::Result<()> {
    let bus = Arc::new(EventBus::default());
    let transport = SpyTransport::answering(200);
    let dispatcher = WebhookDispatcher::new(bus.clone(), transport.clone(), fast_config());

    dispatcher.register_webhook(
        WebhookRegistration::builder()
            .url("https://inactive.example.com")
            .events([EventType::TicketCreated])
            .active(false)
            .build(),
    )?;
    dispatcher.register_webhook(registration(
        "https://courses.example.com",
        vec![EventType::CourseCompleted],
    ))?;
    // shift.scheduled 不在分发器关注的事件类型中
    dispatcher.register_webhook(registration(
        "https://roster.example.com",
        vec![EventType::ShiftScheduled],
    ))?;

    bus.emit(EventType::TicketCreated, json!({}), "helpdesk").await;
    bus.emit(EventType::ShiftScheduled, json!({}), "roster").await;
    dispatcher.drain().await;

    assert_eq!(transport.calls(), 0);
    assert!(
        dispatcher
            .delivery_history(&DeliveryHistoryFilter::default())
            .is_empty()
    );
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn deactivated_webhook_stops_receiving() -> anyhow::Result<()> {
    let bus = Arc::new(EventBus::default());
    let transport = SpyTransport::answering(200);
    let dispatcher = WebhookDispatcher::new(bus.clone(), transport.clone(), fast_config());

    let webhook = dispatcher.register_webhook(registration(
        "https://skills.example.com",
        vec![EventType::SkillGapIdentified],
    ))?;

    bus.emit(EventType::SkillGapIdentified, json!({}), "skills").await;
    dispatcher.drain().await;
    assert_eq!(transport.calls(), 1);

    let updated = dispatcher.set_webhook_active(&webhook.id, false)?;
    assert!(!updated.active);
    assert!(updated.updated_at >= webhook.updated_at);

    bus.emit(EventType::SkillGapIdentified, json!({}), "skills").await;
    dispatcher.drain().await;
    assert_eq!(transport.calls(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn attempt_timeout_is_recorded_as_failure() -> anyhow::Result<()> {
    let bus = Arc::new(EventBus::default());
    let transport = SpyTransport::hanging();
    let dispatcher = WebhookDispatcher::new(bus.clone(), transport.clone(), fast_config());

    let webhook = dispatcher.register_webhook(
        WebhookRegistration::builder()
            .url("https://slow.example.com")
            .events([EventType::AssessmentCreated])
            .retry_count(0)
            .timeout(Duration::from_millis(20))
            .build(),
    )?;

    let event = Event::new(EventType::AssessmentCreated, json!({}), "skills");
    let result = dispatcher.deliver_to_webhook(&webhook.id, &event).await;

    assert!(!result.success);
    assert_eq!(result.status_code, None);
    assert!(result.error.unwrap().contains("timed out"));
    assert_eq!(transport.calls(), 1);
    Ok(())
}

#[tokio::test(flavor = "multi_thread")]
async fn shutdown_detaches_from_bus() -> anyhow::Result<()> {
    let bus = Arc::new(EventBus::default());
    let transport = SpyTransport::answering(200);
    let dispatcher = WebhookDispatcher::new(bus.clone(), transport.clone(), fast_config());
    dispatcher.register_webhook(registration(
        "https://a.example.com",
        vec![EventType::TicketResolved],
    ))?;

    dispatcher.shutdown().await;
    assert_eq!(bus.subscription_count(), 0);

    bus.emit(EventType::TicketResolved, json!({}), "helpdesk").await;
    dispatcher.drain().await;
    assert_eq!(transport.calls(), 0);
    Ok(())
}
