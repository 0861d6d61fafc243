use crate::event::Event;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// 消息状态
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    DeadLetter,
}

/// 队列消息：由队列独占，对外只提供快照
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueMessage {
    pub(crate) id: String,
    pub(crate) event: Event,
    pub(crate) priority: i32,
    pub(crate) retry_count: u32,
    pub(crate) max_retries: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) scheduled_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub(crate) processed_at: Option<DateTime<Utc>>,
    pub(crate) status: MessageStatus,
}

impl QueueMessage {
    pub(crate) fn new(
        event: Event,
        priority: i32,
        max_retries: u32,
        scheduled_at: Option<DateTime<Utc>>,
    ) -> Self {
        Self {
            id: format!("msg-{}", Uuid::new_v4()),
            event,
            priority,
            retry_count: 0,
            max_retries,
            scheduled_at,
            processed_at: None,
            status: MessageStatus::Pending,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event(&self) -> &Event {
        &self.event
    }

    pub fn priority(&self) -> i32 {
        self.priority
    }

    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    pub fn scheduled_at(&self) -> Option<&DateTime<Utc>> {
        self.scheduled_at.as_ref()
    }

    pub fn processed_at(&self) -> Option<&DateTime<Utc>> {
        self.processed_at.as_ref()
    }

    pub fn status(&self) -> MessageStatus {
        self.status
    }

    /// 未设置调度时间，或调度时间已到
    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.scheduled_at.is_none_or(|at| at <= now)
    }

    pub(crate) fn reset_for_retry(&mut self) {
        self.retry_count = 0;
        self.status = MessageStatus::Pending;
        self.scheduled_at = None;
        self.processed_at = None;
    }
}

/// 插入到第一个优先级严格更低的消息之前，同优先级保持先进先出
pub(crate) fn insert_by_priority(pending: &mut Vec<QueueMessage>, message: QueueMessage) {
    let index = pending
        .iter()
        .position(|m| m.priority < message.priority)
        .unwrap_or(pending.len());
    pending.insert(index, message);
}

/// 入队选项
#[derive(Debug, Clone, Default, Builder)]
pub struct EnqueueOptions {
    /// 优先级，越大越紧急
    #[builder(default)]
    pub priority: i32,
    /// 不早于该时间处理
    pub scheduled_at: Option<DateTime<Utc>>,
    /// 覆盖队列默认的重试上限
    pub max_retries: Option<u32>,
}

/// 队列统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStats {
    pub pending: usize,
    pub processing: usize,
    pub completed: u64,
    pub failed: u64,
    pub dead_letter: usize,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::EventType;
    use serde_json::json;

    fn message(priority: i32) -> QueueMessage {
        let event = Event::new(EventType::TicketCreated, json!({}), "test");
        QueueMessage::new(event, priority, 3, None)
    }

    #[test]
    fn higher_priority_goes_first_and_ties_keep_order() {
        let mut pending = Vec::new();
        let low_a = message(1);
        let high = message(5);
        let low_b = message(1);
        let ids = [
            high.id().to_string(),
            low_a.id().to_string(),
            low_b.id().to_string(),
        ];

        insert_by_priority(&mut pending, low_a);
        insert_by_priority(&mut pending, high);
        insert_by_priority(&mut pending, low_b);

        let order: Vec<&str> = pending.iter().map(QueueMessage::id).collect();
        assert_eq!(order, ids);
    }

    #[test]
    fn negative_priorities_sort_after_default() {
        let mut pending = Vec::new();
        insert_by_priority(&mut pending, message(-1));
        insert_by_priority(&mut pending, message(0));
        assert_eq!(pending[0].priority(), 0);
        assert_eq!(pending[1].priority(), -1);
    }

    #[test]
    fn readiness_follows_schedule() {
        let now = Utc::now();
        let mut m = message(0);
        assert!(m.is_ready(now));
        m.scheduled_at = Some(now + chrono::Duration::seconds(5));
        assert!(!m.is_ready(now));
        assert!(m.is_ready(now + chrono::Duration::seconds(5)));
    }

    #[test]
    fn serializes_status_and_camel_case_fields() {
        let mut m = message(2);
        m.status = MessageStatus::DeadLetter;
        m.retry_count = 3;
        let value = serde_json::to_value(&m).unwrap();
        assert_eq!(value["status"], "dead_letter");
        assert_eq!(value["retryCount"], 3);
        assert_eq!(value["maxRetries"], 3);
        assert_eq!(value["event"]["type"], "ticket.created");
        assert!(value.get("scheduledAt").is_none());
    }

    #[test]
    fn stats_use_wire_names() {
        let stats = QueueStats {
            dead_letter: 2,
            ..Default::default()
        };
        let value = serde_json::to_value(stats).unwrap();
        assert_eq!(value["deadLetter"], 2);
    }
}
