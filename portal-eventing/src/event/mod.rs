//! 领域事件（Event）与事件类型（EventType）
//!
//! `Event` 为创建后不可变的事实记录；`EventType` 为门户业务事件的封闭枚举，
//! 序列化为点分小写字符串（如 `ticket.created`）。

mod event_record;
mod event_type;

pub use event_record::Event;
pub use event_type::EventType;
