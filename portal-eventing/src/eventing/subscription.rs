//! 订阅（Subscription）与订阅注册表
//!
//! 订阅 = 事件类型匹配 + 处理器 + 可选过滤谓词。
//! 注册表以订阅 id 为键，保证任一时刻 id 唯一。
//!
use super::{EventHandler, HandledEventType};
use crate::error::{EventingError, EventingResult};
use crate::event::Event;
use async_trait::async_trait;
use bon::Builder;
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard, Weak};
use uuid::Uuid;

/// 事件过滤谓词：返回 `false` 的事件不会交给处理器
pub type EventFilterFn = Arc<dyn Fn(&Event) -> bool + Send + Sync>;

pub(crate) fn new_subscription_id() -> String {
    format!("sub-{}", Uuid::new_v4())
}

#[derive(Clone, Builder)]
pub struct Subscription {
    /// 订阅 id；未指定时自动生成
    #[builder(into, default = new_subscription_id())]
    id: String,
    /// 匹配的事件类型
    #[builder(into)]
    event_types: HandledEventType,
    handler: Arc<dyn EventHandler>,
    filter: Option<EventFilterFn>,
}

impl Subscription {
    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn event_types(&self) -> &HandledEventType {
        &self.event_types
    }

    pub fn handler(&self) -> &Arc<dyn EventHandler> {
        &self.handler
    }

    pub fn has_filter(&self) -> bool {
        self.filter.is_some()
    }

    /// 类型匹配且过滤谓词（若有）接受该事件
    pub fn matches(&self, event: &Event) -> bool {
        self.event_types.matches(event.event_type())
            && self.filter.as_ref().is_none_or(|accept| accept(event))
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("event_types", &self.event_types)
            .field("handler", &self.handler.handler_name())
            .field("filter", &self.filter.is_some())
            .finish()
    }
}

type SubscriptionMap = RwLock<HashMap<String, Subscription>>;

#[derive(Clone, Default)]
pub(crate) struct SubscriptionRegistry {
    inner: Arc<SubscriptionMap>,
}

impl SubscriptionRegistry {
    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Subscription>> {
        self.inner.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Subscription>> {
        self.inner.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn insert(&self, subscription: Subscription) -> EventingResult<String> {
        let mut map = self.write();
        if map.contains_key(subscription.id()) {
            return Err(EventingError::DuplicateSubscription {
                id: subscription.id().to_string(),
            });
        }
        let id = subscription.id().to_string();
        map.insert(id.clone(), subscription);
        Ok(id)
    }

    pub(crate) fn remove(&self, id: &str) -> bool {
        self.write().remove(id).is_some()
    }

    pub(crate) fn matching(&self, event: &Event) -> Vec<Subscription> {
        self.read()
            .values()
            .filter(|s| s.matches(event))
            .cloned()
            .collect()
    }

    pub(crate) fn snapshot(&self) -> Vec<Subscription> {
        self.read().values().cloned().collect()
    }

    pub(crate) fn len(&self) -> usize {
        self.read().len()
    }

    pub(crate) fn downgrade(&self) -> Weak<SubscriptionMap> {
        Arc::downgrade(&self.inner)
    }
}

/// 一次性处理器：首次被调用时先注销自身，再执行用户处理逻辑
///
/// 注销与执行之间不做互斥：同一时刻已完成匹配的并发发布仍可能各自调用一次。
pub(crate) struct OnceHandler {
    pub(crate) subscription_id: String,
    pub(crate) registry: Weak<SubscriptionMap>,
    pub(crate) inner: Arc<dyn EventHandler>,
}

#[async_trait]
impl EventHandler for OnceHandler {
    fn handler_name(&self) -> &str {
        self.inner.handler_name()
    }

    async fn handle(&self, event: &Event) -> anyhow::Result<()> {
        if let Some(map) = self.registry.upgrade() {
            map.write()
                .unwrap_or_else(PoisonError::into_inner)
                .remove(&self.subscription_id);
        }
        self.inner.handle(event).await
    }
}
