//! 事件处理器（EventHandler）
//!
//! 定义消费事件的处理逻辑，以及订阅所匹配的事件类型（单个/多个/全部）。
//!
use crate::event::{Event, EventType};
use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum HandledEventType {
    One(EventType),
    Many(Vec<EventType>),
    All,
}

impl HandledEventType {
    pub fn matches(&self, event_type: EventType) -> bool {
        match self {
            HandledEventType::One(t) => *t == event_type,
            HandledEventType::Many(ts) => ts.contains(&event_type),
            HandledEventType::All => true,
        }
    }
}

impl From<EventType> for HandledEventType {
    fn from(value: EventType) -> Self {
        HandledEventType::One(value)
    }
}

impl From<Vec<EventType>> for HandledEventType {
    fn from(value: Vec<EventType>) -> Self {
        HandledEventType::Many(value)
    }
}

impl From<&[EventType]> for HandledEventType {
    fn from(value: &[EventType]) -> Self {
        HandledEventType::Many(value.to_vec())
    }
}

/// 事件处理器：失败以 `Err` 返回，由总线捕获并隔离
#[async_trait]
pub trait EventHandler: Send + Sync {
    /// 处理器名称（用于日志与审计）
    fn handler_name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    /// 处理事件
    async fn handle(&self, event: &Event) -> anyhow::Result<()>;
}

/// 基于闭包的处理器
pub struct FnHandler<F> {
    name: String,
    f: F,
}

/// 将异步闭包包装为处理器
///
/// ```
/// use portal_eventing::eventing::handler_fn;
///
/// let handler = handler_fn("audit", |event| async move {
///     println!("seen {}", event.id());
///     anyhow::Ok(())
/// });
/// # let _ = handler;
/// ```
pub fn handler_fn<F, Fut>(name: impl Into<String>, f: F) -> Arc<FnHandler<F>>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    Arc::new(FnHandler {
        name: name.into(),
        f,
    })
}

#[async_trait]
impl<F, Fut> EventHandler for FnHandler<F>
where
    F: Fn(Event) -> Fut + Send + Sync + 'static,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    fn handler_name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        (self.f)(event.clone()).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_rules() {
        assert!(HandledEventType::One(EventType::TicketCreated).matches(EventType::TicketCreated));
        assert!(!HandledEventType::One(EventType::TicketCreated).matches(EventType::TicketClosed));

        let many: HandledEventType = vec![EventType::CourseEnrolled, EventType::CourseDropped].into();
        assert!(many.matches(EventType::CourseDropped));
        assert!(!many.matches(EventType::CourseCompleted));

        assert!(HandledEventType::All.matches(EventType::AttendanceRecorded));
    }

    #[tokio::test]
    async fn fn_handler_reports_name_and_result() {
        let h = handler_fn("always-fails", |_event| async {
            Err::<(), _>(anyhow::anyhow!("nope"))
        });
        assert_eq!(h.handler_name(), "always-fails");

        let event = Event::new(EventType::TicketCreated, serde_json::json!({}), "test");
        assert!(h.handle(&event).await.is_err());
    }
}
