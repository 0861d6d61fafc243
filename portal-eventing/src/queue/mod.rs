//! 优先级重试队列（queue）
//!
//! 将事件的产生与消费解耦：
//! - 按优先级降序排列待处理消息，同优先级保持入队顺序；
//! - `max_concurrent` 限制同时在途的投递数（背压）；
//! - 失败（处理器报错或超时）按 `retry_delay × 2^retry_count` 指数退避重试；
//! - 重试耗尽后移入死信列表，可人工查看或重新入队。
//!
pub mod config;
pub mod message;
pub mod retry_queue;

pub use config::QueueConfig;
pub use message::{EnqueueOptions, MessageStatus, QueueMessage, QueueStats};
pub use retry_queue::PriorityRetryQueue;
