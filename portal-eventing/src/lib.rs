//! 门户事件处理核心（portal-eventing）
//!
//! 提供进程内事件子系统的基础构件：
//! - 领域事件模型（`event`）：不可变的 `Event` 与封闭的 `EventType` 枚举；
//! - 事件总线（`eventing`）：发布/订阅、处理器隔离、并发扇出与完整汇合；
//! - 优先级重试队列（`queue`）：优先级排序、并发准入、指数退避重试与死信；
//! - 有界历史（`history`）与退避计算（`retry`）等通用工具。
//!
//! 本 crate 只关心单进程内存实现，不涉及持久化与跨进程协调；
//! 对外投递（Webhook）位于 `portal-webhooks`，装配位于 `portal-runtime`。
//!
//! 典型用法：
//! 1. 构造 `EventBus` 并通过 `on/subscribe` 注册处理器；
//! 2. 直接 `publish` 做即时扇出，或交给 `PriorityRetryQueue` 延迟/重试投递；
//! 3. 通过 `history` / `stats` 查询审计轨迹与队列状态。
//!
pub mod error;
pub mod event;
pub mod eventing;
pub mod history;
pub mod queue;
pub mod retry;

pub use error::{EventingError, EventingResult};
pub use event::{Event, EventType};
pub use eventing::{
    EventBus, EventBusConfig, EventHandler, EventPublisher, HandledEventType, PublishReport,
    Subscription,
};
pub use history::{BoundedHistory, EventHistoryFilter};
pub use queue::{
    EnqueueOptions, MessageStatus, PriorityRetryQueue, QueueConfig, QueueMessage, QueueStats,
};
