//! 有界历史（BoundedHistory）
//!
//! 固定容量的环形缓冲：超出容量时淘汰最早的条目。
//! 事件总线、队列完成轨迹与 Webhook 投递记录共用此结构。
//!
use crate::event::{Event, EventType};
use bon::Builder;
use std::collections::VecDeque;

#[derive(Debug, Clone)]
pub struct BoundedHistory<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> BoundedHistory<T> {
    /// `capacity` 为 0 时不保留任何条目
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    pub fn push(&mut self, entry: T) {
        if self.capacity == 0 {
            return;
        }
        while self.entries.len() >= self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 先按谓词过滤，再取最近 `limit` 条，保持时间顺序
    pub fn select<P>(&self, predicate: P, limit: Option<usize>) -> Vec<T>
    where
        P: Fn(&T) -> bool,
    {
        let matched: Vec<&T> = self.entries.iter().filter(|e| predicate(e)).collect();
        let skip = match limit {
            Some(n) => matched.len().saturating_sub(n),
            None => 0,
        };
        matched.into_iter().skip(skip).cloned().collect()
    }

    pub fn snapshot(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}

/// 事件历史查询条件
#[derive(Debug, Clone, Default, Builder)]
pub struct EventHistoryFilter {
    /// 仅返回该类型的事件
    pub event_type: Option<EventType>,
    /// 仅返回最近的 N 条
    pub limit: Option<usize>,
}

impl EventHistoryFilter {
    pub(crate) fn apply(&self, history: &BoundedHistory<Event>) -> Vec<Event> {
        history.select(
            |e| self.event_type.is_none_or(|t| e.event_type() == t),
            self.limit,
        )
    }
}
