//! 事件子系统（eventing）
//!
//! 提供进程内事件发布/订阅的基础抽象与实现：
//! - `EventBus`：发布/订阅中枢，并发扇出到匹配的订阅，等待全部处理器结束后返回；
//! - `EventPublisher`：发布端协议，供队列等组件以 trait object 形式依赖；
//! - `EventHandler`：对事件进行消费处理，失败被总线捕获与隔离；
//! - `Subscription`：事件类型匹配 + 处理器 + 可选过滤谓词。
//!
pub mod bus;
pub mod handler;
pub mod subscription;

pub use bus::{EventBus, EventBusConfig, EventPublisher, PublishReport};
pub use handler::{EventHandler, FnHandler, HandledEventType, handler_fn};
pub use subscription::{EventFilterFn, Subscription};
