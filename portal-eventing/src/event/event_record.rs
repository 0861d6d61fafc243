use super::EventType;
use bon::Builder;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

/// 领域事件：创建后不可变，字段仅通过 getter 暴露
///
/// 线上格式使用 camelCase 字段名（`type`、`correlationId` 等），
/// 与路由层和前端状态存储保持一致。
#[derive(Debug, Clone, PartialEq, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    /// 事件唯一标识，缺省时生成 UUID v4
    #[builder(into, default = Uuid::new_v4().to_string())]
    id: String,
    /// 事件类型
    #[serde(rename = "type")]
    event_type: EventType,
    /// 事件发生时间
    #[builder(default = Utc::now())]
    timestamp: DateTime<Utc>,
    /// 事件来源（产生事件的模块或服务）
    #[builder(into)]
    source: String,
    /// 关联 ID，用于串联同一业务操作产生的多个事件
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    correlation_id: Option<String>,
    /// 开放键值元数据
    #[serde(default, skip_serializing_if = "Option::is_none")]
    metadata: Option<Map<String, Value>>,
    /// 事件负载，始终为 JSON 对象
    #[builder(default)]
    #[serde(default)]
    payload: Map<String, Value>,
}

impl Event {
    /// 以生成的 id 与当前时间构造事件
    ///
    /// 对象负载原样保存；`null` 视为空对象；其他值包装为 `{"value": ...}`。
    pub fn new(event_type: EventType, payload: Value, source: impl Into<String>) -> Self {
        Self::builder()
            .event_type(event_type)
            .payload(into_object(payload))
            .source(source)
            .build()
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_type(&self) -> EventType {
        self.event_type
    }

    pub fn timestamp(&self) -> &DateTime<Utc> {
        &self.timestamp
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.correlation_id.as_deref()
    }

    pub fn metadata(&self) -> Option<&Map<String, Value>> {
        self.metadata.as_ref()
    }

    pub fn payload(&self) -> &Map<String, Value> {
        &self.payload
    }
}

fn into_object(payload: Value) -> Map<String, Value> {
    match payload {
        Value::Object(map) => map,
        Value::Null => Map::new(),
        other => Map::from_iter([("value".to_string(), other)]),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn new_generates_distinct_ids() {
        let a = Event::new(EventType::TicketCreated, json!({"ticketId": 1}), "helpdesk");
        let b = Event::new(EventType::TicketCreated, json!({"ticketId": 1}), "helpdesk");
        assert_ne!(a.id(), b.id());
        assert_eq!(a.source(), "helpdesk");
        assert_eq!(a.payload().get("ticketId"), Some(&json!(1)));
    }

    fn object(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn serializes_with_wire_field_names() {
        let event = Event::builder()
            .id("evt-1")
            .event_type(EventType::CourseCompleted)
            .source("lms")
            .correlation_id("cor-9")
            .metadata(object(json!({"actor": "u-1"})))
            .payload(object(json!({"courseId": "c-42"})))
            .build();

        let value = serde_json::to_value(&event).unwrap();
        assert_eq!(value["id"], "evt-1");
        assert_eq!(value["type"], "course.completed");
        assert_eq!(value["correlationId"], "cor-9");
        assert_eq!(value["metadata"]["actor"], "u-1");
        assert_eq!(value["payload"]["courseId"], "c-42");
        assert!(value.get("timestamp").is_some());

        let back: Event = serde_json::from_value(value).unwrap();
        assert_eq!(back, event);
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let event = Event::new(EventType::ShiftScheduled, json!({}), "roster");
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("correlationId").is_none());
        assert!(value.get("metadata").is_none());
    }

    #[test]
    fn non_object_payload_is_wrapped() {
        let scalar = Event::new(EventType::AttendanceRecorded, json!(42), "roster");
        assert_eq!(scalar.payload().get("value"), Some(&json!(42)));
        assert_eq!(scalar.payload().len(), 1);

        let empty = Event::new(EventType::AttendanceRecorded, Value::Null, "roster");
        assert!(empty.payload().is_empty());

        let value = serde_json::to_value(&scalar).unwrap();
        assert!(value["payload"].is_object());
    }

    #[test]
    fn non_object_metadata_is_rejected_on_decode() {
        let raw = json!({
            "id": "evt-2",
            "type": "ticket.created",
            "timestamp": "2026-01-05T08:00:00Z",
            "source": "helpdesk",
            "metadata": "not-a-map",
            "payload": {}
        });
        assert!(serde_json::from_value::<Event>(raw).is_err());
    }
}
