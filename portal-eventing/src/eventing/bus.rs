//! 事件总线（EventBus）
//!
//! 进程内发布/订阅中枢：
//! - `publish`：记录历史，计算匹配订阅，并发调用处理器并等待全部结束（扇出/汇合）；
//! - 单个处理器的错误或 panic 被捕获、记录并计数，不影响其他处理器，也不向发布方传播；
//! - `stream`：基于 `tokio::sync::broadcast` 的 `'static` 事件流，便于在 `tokio::spawn` 中消费。
//!
use super::subscription::{OnceHandler, SubscriptionRegistry, new_subscription_id};
use super::{EventHandler, HandledEventType, Subscription};
use crate::error::EventingResult;
use crate::event::{Event, EventType};
use crate::history::{BoundedHistory, EventHistoryFilter};
use async_trait::async_trait;
use futures_core::stream::BoxStream;
use futures_util::{FutureExt, StreamExt, stream};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::broadcast;
use tokio_stream::wrappers::BroadcastStream;
use tracing::{debug, error, warn};

/// 单次发布的处理结果
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PublishReport {
    /// 匹配到的订阅数
    pub matched: usize,
    /// 返回错误或 panic 的处理器数
    pub failed: usize,
}

impl PublishReport {
    pub fn is_success(&self) -> bool {
        self.failed == 0
    }
}

/// 发布端协议：发布事件并等待所有匹配的处理器结束
#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &Event) -> PublishReport;
}

/// 事件总线配置
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EventBusConfig {
    /// 事件历史容量
    pub history_capacity: usize,
    /// `stream()` 广播缓冲容量
    pub stream_capacity: usize,
}

impl Default for EventBusConfig {
    fn default() -> Self {
        Self {
            history_capacity: 1000,
            stream_capacity: 256,
        }
    }
}

pub struct EventBus {
    registry: SubscriptionRegistry,
    history: Mutex<BoundedHistory<Event>>,
    tap: broadcast::Sender<Event>,
    config: EventBusConfig,
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(EventBusConfig::default())
    }
}

impl EventBus {
    pub fn new(config: EventBusConfig) -> Self {
        let (tap, _rx) = broadcast::channel(config.stream_capacity.max(1));
        Self {
            registry: SubscriptionRegistry::default(),
            history: Mutex::new(BoundedHistory::new(config.history_capacity)),
            tap,
            config,
        }
    }

    pub fn config(&self) -> &EventBusConfig {
        &self.config
    }

    fn history_guard(&self) -> MutexGuard<'_, BoundedHistory<Event>> {
        self.history.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 发布事件，返回时所有匹配的处理器均已结束
    pub async fn publish(&self, event: &Event) -> PublishReport {
        self.history_guard().push(event.clone());
        if self.tap.receiver_count() > 0 {
            let _ = self.tap.send(event.clone());
        }

        let matched = self.registry.matching(event);
        if matched.is_empty() {
            debug!(event_id = event.id(), event_type = %event.event_type(), "no subscribers matched");
            return PublishReport::default();
        }

        let total = matched.len();
        let failed = AtomicUsize::new(0);
        let failed_ref = &failed;

        stream::iter(matched)
            .for_each_concurrent(None, move |sub| async move {
                let outcome = AssertUnwindSafe(sub.handler().handle(event))
                    .catch_unwind()
                    .await;
                match outcome {
                    Ok(Ok(())) => {}
                    Ok(Err(err)) => {
                        failed_ref.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            subscription_id = sub.id(),
                            handler = sub.handler().handler_name(),
                            event_id = event.id(),
                            event_type = %event.event_type(),
                            error = %err,
                            "event handler failed"
                        );
                    }
                    Err(_panic) => {
                        failed_ref.fetch_add(1, Ordering::Relaxed);
                        error!(
                            subscription_id = sub.id(),
                            handler = sub.handler().handler_name(),
                            event_id = event.id(),
                            event_type = %event.event_type(),
                            "event handler panicked"
                        );
                    }
                }
            })
            .await;

        let report = PublishReport {
            matched: total,
            failed: failed.load(Ordering::Relaxed),
        };
        debug!(
            event_id = event.id(),
            event_type = %event.event_type(),
            matched = report.matched,
            failed = report.failed,
            "event published"
        );
        report
    }

    /// 注册订阅，返回订阅 id；调用方指定的 id 已存在时返回错误
    pub fn subscribe(&self, subscription: Subscription) -> EventingResult<String> {
        let id = self.registry.insert(subscription)?;
        debug!(subscription_id = %id, "subscription registered");
        Ok(id)
    }

    /// 注销订阅；不存在时返回 `false`
    pub fn unsubscribe(&self, id: &str) -> bool {
        let removed = self.registry.remove(id);
        if removed {
            debug!(subscription_id = id, "subscription removed");
        }
        removed
    }

    /// 当前订阅的快照
    pub fn subscriptions(&self) -> Vec<Subscription> {
        self.registry.snapshot()
    }

    pub fn subscription_count(&self) -> usize {
        self.registry.len()
    }

    /// 按条件查询事件历史（时间顺序）
    pub fn history(&self, filter: &EventHistoryFilter) -> Vec<Event> {
        filter.apply(&self.history_guard())
    }

    /// 订阅的简写形式
    pub fn on(
        &self,
        event_types: impl Into<HandledEventType>,
        handler: Arc<dyn EventHandler>,
    ) -> String {
        let event_types = event_types.into();
        self.insert_generated(new_subscription_id, |id| {
            Subscription::builder()
                .id(id)
                .event_types(event_types.clone())
                .handler(handler.clone())
                .build()
        })
    }

    /// 一次性订阅：首次匹配时先注销自身，再执行处理器
    ///
    /// 注销发生在处理器运行之前，之后开始的发布不会再调用它；
    /// 但若两次发布在注销生效前都已完成匹配，处理器可能被调用两次。
    pub fn once(
        &self,
        event_types: impl Into<HandledEventType>,
        handler: Arc<dyn EventHandler>,
    ) -> String {
        let event_types = event_types.into();
        self.insert_generated(new_subscription_id, |id| {
            let wrapper = OnceHandler {
                subscription_id: id.clone(),
                registry: self.registry.downgrade(),
                inner: handler.clone(),
            };
            Subscription::builder()
                .id(id)
                .event_types(event_types.clone())
                .handler(Arc::new(wrapper))
                .build()
        })
    }

    /// 注册成功后才返回 id；冲突时换一个新 id 重试
    fn insert_generated(
        &self,
        mut next_id: impl FnMut() -> String,
        make: impl Fn(String) -> Subscription,
    ) -> String {
        loop {
            match self.registry.insert(make(next_id())) {
                Ok(id) => return id,
                Err(err) => warn!(error = %err, "generated subscription id collided, retrying"),
            }
        }
    }

    /// 以生成的 id 与当前时间构造事件并发布
    pub async fn emit(
        &self,
        event_type: EventType,
        payload: Value,
        source: impl Into<String>,
    ) -> Event {
        let event = Event::new(event_type, payload, source);
        self.publish(&event).await;
        event
    }

    /// 所有已发布事件的 `'static` 事件流；落后过多的消费者会跳过旧事件
    pub fn stream(&self) -> BoxStream<'static, Event> {
        let stream = BroadcastStream::new(self.tap.subscribe()).filter_map(|r| async move {
            match r {
                Ok(event) => Some(event),
                Err(err) => {
                    warn!(error = %err, "event stream lagged");
                    None
                }
            }
        });
        Box::pin(stream)
    }
}

#[async_trait]
impl EventPublisher for EventBus {
    async fn publish(&self, event: &Event) -> PublishReport {
        EventBus::publish(self, event).await
    }
}
