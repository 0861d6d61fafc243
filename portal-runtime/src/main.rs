use anyhow::Context;
use portal_eventing::eventing::handler_fn;
use portal_eventing::{Event, EventType, HandledEventType};
use portal_runtime::{EventingServices, RuntimeConfig};
use portal_webhooks::{DeliveryHistoryFilter, WebhookRegistration};
use serde_json::json;
use std::time::Duration;
use tracing::info;
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info,portal_eventing=debug";

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    init_tracing();

    let config = RuntimeConfig::load().context("failed to load runtime config")?;
    let services = EventingServices::builder()
        .config(config)
        .build()
        .context("failed to start eventing services")?;

    services.bus().on(
        HandledEventType::All,
        handler_fn("audit-log", |event: Event| async move {
            info!(
                event_id = event.id(),
                event_type = %event.event_type(),
                source = event.source(),
                "audit"
            );
            anyhow::Ok(())
        }),
    );

    let webhook = services.webhooks().register_webhook(
        WebhookRegistration::builder()
            .url("https://hooks.example.com/portal")
            .events([EventType::TicketCreated, EventType::RequisitionApproved])
            .secret("demo-secret")
            .build(),
    )?;

    let queue = services.queue();
    queue.enqueue(
        Event::new(EventType::CourseEnrolled, json!({"courseId": "RUST-101"}), "learning"),
        0,
    );
    queue.enqueue(
        Event::new(EventType::TicketCreated, json!({"ticketId": "T-1", "priority": "urgent"}), "helpdesk"),
        10,
    );
    queue.schedule(
        Event::new(EventType::RequisitionApproved, json!({"requisitionId": "R-7"}), "hiring"),
        Duration::from_millis(200),
        5,
    );
    services
        .bus()
        .emit(EventType::AttendanceRecorded, json!({"employeeId": "E-3"}), "roster")
        .await;

    let settle = async {
        loop {
            let stats = queue.stats();
            if stats.pending == 0 && stats.processing == 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(50)).await;
        }
    };
    tokio::select! {
        _ = settle => {}
        _ = tokio::signal::ctrl_c() => info!("interrupted"),
        _ = tokio::time::sleep(Duration::from_secs(30)) => info!("gave up waiting for the queue"),
    }
    services.webhooks().drain().await;

    let deliveries = services.webhooks().delivery_history(
        &DeliveryHistoryFilter::builder()
            .webhook_id(webhook.id.clone())
            .build(),
    );
    let summary = json!({
        "queue": queue.stats(),
        "deadLetter": queue.dead_letter_messages(),
        "deliveries": deliveries,
    });
    println!("{}", serde_json::to_string_pretty(&summary)?);

    services.shutdown().await;
    Ok(())
}
