use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use std::time::Duration;

/// 分发器配置
#[serde_as]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebhookDispatcherConfig {
    /// 投递结果历史容量
    pub history_capacity: usize,
    /// 退避单位：第 n 次重试前等待 `backoff_unit × 2^n`
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub backoff_unit: Duration,
}

impl Default for WebhookDispatcherConfig {
    fn default() -> Self {
        Self {
            history_capacity: 1000,
            backoff_unit: Duration::from_millis(1000),
        }
    }
}
