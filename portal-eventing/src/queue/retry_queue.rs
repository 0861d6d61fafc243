//! 优先级重试队列的调度实现
//!
//! 所有状态迁移都在同一把互斥锁内完成，工作循环的启停判断与入队互斥；
//! 锁从不跨越 `.await` 持有。等待使用 `Notify` 唤醒与定时器竞速，不做忙轮询。
//!
use super::config::QueueConfig;
use super::message::{EnqueueOptions, MessageStatus, QueueMessage, QueueStats, insert_by_priority};
use crate::error::{EventingError, EventingResult};
use crate::event::Event;
use crate::eventing::{EventPublisher, PublishReport};
use crate::history::BoundedHistory;
use crate::retry::{deadline_after, exponential_backoff};
use chrono::Utc;
use futures_util::future::join_all;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Notify;
use tokio::time::error::Elapsed;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

struct QueueState {
    pending: Vec<QueueMessage>,
    dead_letter: Vec<QueueMessage>,
    completed_trail: BoundedHistory<QueueMessage>,
    in_flight: HashSet<String>,
    completed: u64,
    failed: u64,
    active: bool,
    running: bool,
}

struct QueueInner {
    publisher: Arc<dyn EventPublisher>,
    config: QueueConfig,
    state: Mutex<QueueState>,
    wakeup: Notify,
    shutdown: CancellationToken,
    runtime: Handle,
}

enum Step {
    Stop,
    Wait(Duration),
    Dispatch(Vec<(String, Event)>),
}

/// 优先级重试队列
///
/// 句柄可廉价克隆，所有克隆共享同一个队列。必须在 Tokio 运行时内构造。
#[derive(Clone)]
pub struct PriorityRetryQueue {
    inner: Arc<QueueInner>,
}

impl PriorityRetryQueue {
    pub fn new(publisher: Arc<dyn EventPublisher>, config: QueueConfig) -> EventingResult<Self> {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|err| EventingError::NoRuntime {
            reason: err.to_string(),
        })?;
        let state = QueueState {
            pending: Vec::new(),
            dead_letter: Vec::new(),
            completed_trail: BoundedHistory::new(config.completed_history_capacity),
            in_flight: HashSet::new(),
            completed: 0,
            failed: 0,
            active: true,
            running: false,
        };
        Ok(Self {
            inner: Arc::new(QueueInner {
                publisher,
                config,
                state: Mutex::new(state),
                wakeup: Notify::new(),
                shutdown: CancellationToken::new(),
                runtime,
            }),
        })
    }

    pub fn config(&self) -> &QueueConfig {
        &self.inner.config
    }

    /// 入队，返回消息 id
    pub fn enqueue(&self, event: Event, priority: i32) -> String {
        self.enqueue_with(event, EnqueueOptions::builder().priority(priority).build())
    }

    /// 带调度时间与重试上限覆盖的入队
    pub fn enqueue_with(&self, event: Event, options: EnqueueOptions) -> String {
        let max_retries = options.max_retries.unwrap_or(self.inner.config.max_retries);
        let message = QueueMessage::new(event, options.priority, max_retries, options.scheduled_at);
        let id = message.id.clone();
        debug!(
            message_id = %id,
            event_id = message.event.id(),
            priority = message.priority,
            "message enqueued"
        );

        let mut state = self.inner.state();
        insert_by_priority(&mut state.pending, message);
        self.inner.kick(&mut state);
        id
    }

    /// 延迟 `delay` 后处理
    pub fn schedule(&self, event: Event, delay: Duration, priority: i32) -> String {
        let options = EnqueueOptions::builder()
            .priority(priority)
            .scheduled_at(deadline_after(Utc::now(), delay))
            .build();
        self.enqueue_with(event, options)
    }

    /// 停止派发新批次；在途的投递照常完成
    pub fn pause(&self) {
        self.inner.state().active = false;
        info!("queue paused");
    }

    pub fn resume(&self) {
        let mut state = self.inner.state();
        state.active = true;
        self.inner.kick(&mut state);
        info!("queue resumed");
    }

    pub fn is_paused(&self) -> bool {
        !self.inner.state().active
    }

    /// 工作循环是否在运行
    pub fn is_running(&self) -> bool {
        self.inner.state().running
    }

    pub fn stats(&self) -> QueueStats {
        let state = self.inner.state();
        QueueStats {
            pending: state
                .pending
                .iter()
                .filter(|m| m.status == MessageStatus::Pending)
                .count(),
            processing: state.in_flight.len(),
            completed: state.completed,
            failed: state.failed,
            dead_letter: state.dead_letter.len(),
        }
    }

    /// 待处理列表快照（含处理中的消息），按派发顺序排列
    pub fn pending_messages(&self) -> Vec<QueueMessage> {
        self.inner.state().pending.clone()
    }

    pub fn dead_letter_messages(&self) -> Vec<QueueMessage> {
        self.inner.state().dead_letter.clone()
    }

    /// 最近完成的消息，按完成顺序排列
    pub fn completed_messages(&self, limit: Option<usize>) -> Vec<QueueMessage> {
        self.inner.state().completed_trail.select(|_| true, limit)
    }

    /// 将死信消息重新放回待处理列表，重试计数清零
    pub fn retry_dead_letter(&self, id: &str) -> EventingResult<()> {
        let mut state = self.inner.state();
        let index = state
            .dead_letter
            .iter()
            .position(|m| m.id == id)
            .ok_or_else(|| EventingError::MessageNotFound { id: id.to_string() })?;
        let mut message = state.dead_letter.remove(index);
        message.reset_for_retry();
        insert_by_priority(&mut state.pending, message);
        self.inner.kick(&mut state);
        info!(message_id = id, "dead letter requeued");
        Ok(())
    }

    /// 清空死信列表，返回被清除的条数
    pub fn clear_dead_letter(&self) -> usize {
        let mut state = self.inner.state();
        let cleared = state.dead_letter.len();
        state.dead_letter.clear();
        cleared
    }

    /// 清空待处理列表与在途记录；死信与累计计数不受影响
    pub fn clear(&self) {
        let mut state = self.inner.state();
        state.pending.clear();
        state.in_flight.clear();
        info!("queue cleared");
    }

    /// 永久停止工作循环
    pub fn shutdown(&self) {
        self.inner.shutdown.cancel();
        self.inner.wakeup.notify_one();
        info!("queue shut down");
    }
}

impl QueueInner {
    fn state(&self) -> MutexGuard<'_, QueueState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// 唤醒运行中的循环，或在空闲时启动新的循环
    fn kick(self: &Arc<Self>, state: &mut QueueState) {
        if state.running {
            self.wakeup.notify_one();
            return;
        }
        if !state.active || state.pending.is_empty() || self.shutdown.is_cancelled() {
            return;
        }
        state.running = true;
        self.runtime.spawn(Self::run(Arc::clone(self)));
    }

    async fn run(self: Arc<Self>) {
        debug!("queue worker started");
        loop {
            match self.next_step() {
                Step::Stop => break,
                Step::Wait(duration) => {
                    tokio::select! {
                        _ = self.shutdown.cancelled() => {}
                        _ = self.wakeup.notified() => {}
                        _ = tokio::time::sleep(duration) => {}
                    }
                }
                Step::Dispatch(batch) => {
                    debug!(batch = batch.len(), "dispatching batch");
                    join_all(
                        batch
                            .into_iter()
                            .map(|(id, event)| self.process_message(id, event)),
                    )
                    .await;
                }
            }
        }
        debug!("queue worker stopped");
    }

    fn next_step(&self) -> Step {
        let mut guard = self.state();
        let state = &mut *guard;

        if self.shutdown.is_cancelled() || !state.active || state.pending.is_empty() {
            state.running = false;
            return Step::Stop;
        }

        let slots = self
            .config
            .max_concurrent
            .saturating_sub(state.in_flight.len());
        if slots == 0 {
            return Step::Wait(self.config.idle_recheck);
        }

        let now = Utc::now();
        let mut batch = Vec::with_capacity(slots);
        for message in state.pending.iter_mut() {
            if batch.len() == slots {
                break;
            }
            if state.in_flight.contains(&message.id) || !message.is_ready(now) {
                continue;
            }
            message.status = MessageStatus::Processing;
            state.in_flight.insert(message.id.clone());
            batch.push((message.id.clone(), message.event.clone()));
        }
        if !batch.is_empty() {
            return Step::Dispatch(batch);
        }

        let wait = state
            .pending
            .iter()
            .filter(|m| !state.in_flight.contains(&m.id))
            .filter_map(|m| m.scheduled_at)
            .min()
            .map(|at| (at - now).to_std().unwrap_or(Duration::ZERO))
            .unwrap_or(self.config.idle_recheck);
        Step::Wait(wait)
    }

    async fn process_message(&self, id: String, event: Event) {
        let outcome =
            tokio::time::timeout(self.config.processing_timeout, self.publisher.publish(&event))
                .await;
        self.settle(&id, outcome);
    }

    fn settle(&self, id: &str, outcome: Result<PublishReport, Elapsed>) {
        let failure = match outcome {
            Ok(report) if report.is_success() => None,
            Ok(report) => Some(EventingError::HandlersFailed {
                message_id: id.to_string(),
                failed: report.failed,
                matched: report.matched,
            }),
            Err(_) => Some(EventingError::ProcessingTimeout {
                message_id: id.to_string(),
                timeout_ms: self.config.processing_timeout.as_millis(),
            }),
        };

        let mut guard = self.state();
        let state = &mut *guard;
        state.in_flight.remove(id);

        let Some(index) = state.pending.iter().position(|m| m.id == id) else {
            debug!(message_id = id, "settled message is no longer queued");
            return;
        };
        let now = Utc::now();

        match failure {
            None => {
                let mut message = state.pending.remove(index);
                message.status = MessageStatus::Completed;
                message.processed_at = Some(now);
                state.completed += 1;
                debug!(message_id = id, retry_count = message.retry_count, "message completed");
                state.completed_trail.push(message);
            }
            Some(err) => {
                let message = &mut state.pending[index];
                message.retry_count += 1;
                if message.retry_count >= message.max_retries {
                    let mut message = state.pending.remove(index);
                    message.status = MessageStatus::DeadLetter;
                    state.failed += 1;
                    warn!(
                        message_id = id,
                        retry_count = message.retry_count,
                        error = %err,
                        "message moved to dead letter"
                    );
                    state.dead_letter.push(message);
                } else {
                    let delay = exponential_backoff(self.config.retry_delay, message.retry_count);
                    message.status = MessageStatus::Pending;
                    message.scheduled_at = Some(deadline_after(now, delay));
                    warn!(
                        message_id = id,
                        retry_count = message.retry_count,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "message will be retried"
                    );
                }
            }
        }
        drop(guard);
        self.wakeup.notify_one();
    }
}
