use crate::error::EventingError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 门户业务事件类型（封闭枚举）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum EventType {
    #[serde(rename = "ticket.created")]
    TicketCreated,
    #[serde(rename = "ticket.assigned")]
    TicketAssigned,
    #[serde(rename = "ticket.resolved")]
    TicketResolved,
    #[serde(rename = "ticket.closed")]
    TicketClosed,
    #[serde(rename = "course.enrolled")]
    CourseEnrolled,
    #[serde(rename = "course.completed")]
    CourseCompleted,
    #[serde(rename = "course.dropped")]
    CourseDropped,
    #[serde(rename = "requisition.created")]
    RequisitionCreated,
    #[serde(rename = "requisition.approved")]
    RequisitionApproved,
    #[serde(rename = "requisition.completed")]
    RequisitionCompleted,
    #[serde(rename = "assessment.created")]
    AssessmentCreated,
    #[serde(rename = "skill_gap.identified")]
    SkillGapIdentified,
    #[serde(rename = "shift.scheduled")]
    ShiftScheduled,
    #[serde(rename = "attendance.recorded")]
    AttendanceRecorded,
}

impl EventType {
    /// 全部事件类型，按声明顺序
    pub const ALL: [EventType; 14] = [
        EventType::TicketCreated,
        EventType::TicketAssigned,
        EventType::TicketResolved,
        EventType::TicketClosed,
        EventType::CourseEnrolled,
        EventType::CourseCompleted,
        EventType::CourseDropped,
        EventType::RequisitionCreated,
        EventType::RequisitionApproved,
        EventType::RequisitionCompleted,
        EventType::AssessmentCreated,
        EventType::SkillGapIdentified,
        EventType::ShiftScheduled,
        EventType::AttendanceRecorded,
    ];

    pub const fn as_str(&self) -> &'static str {
        match self {
            EventType::TicketCreated => "ticket.created",
            EventType::TicketAssigned => "ticket.assigned",
            EventType::TicketResolved => "ticket.resolved",
            EventType::TicketClosed => "ticket.closed",
            EventType::CourseEnrolled => "course.enrolled",
            EventType::CourseCompleted => "course.completed",
            EventType::CourseDropped => "course.dropped",
            EventType::RequisitionCreated => "requisition.created",
            EventType::RequisitionApproved => "requisition.approved",
            EventType::RequisitionCompleted => "requisition.completed",
            EventType::AssessmentCreated => "assessment.created",
            EventType::SkillGapIdentified => "skill_gap.identified",
            EventType::ShiftScheduled => "shift.scheduled",
            EventType::AttendanceRecorded => "attendance.recorded",
        }
    }
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EventType {
    type Err = EventingError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        EventType::ALL
            .into_iter()
            .find(|t| t.as_str() == s)
            .ok_or_else(|| EventingError::parse(format!("unknown event type: {s}")))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_and_parse_agree_for_every_variant() {
        for ty in EventType::ALL {
            let parsed: EventType = ty.to_string().parse().unwrap();
            assert_eq!(parsed, ty);
        }
    }

    #[test]
    fn serde_uses_dotted_names() {
        let json = serde_json::to_string(&EventType::SkillGapIdentified).unwrap();
        assert_eq!(json, "\"skill_gap.identified\"");

        let back: EventType = serde_json::from_str("\"requisition.approved\"").unwrap();
        assert_eq!(back, EventType::RequisitionApproved);
    }

    #[test]
    fn unknown_type_is_a_parse_error() {
        let err = "invoice.paid".parse::<EventType>().unwrap_err();
        assert!(matches!(err, EventingError::Parse { .. }));
    }
}
