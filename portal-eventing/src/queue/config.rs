use crate::error::{EventingError, EventingResult};
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use std::time::Duration;

/// 队列配置（构造时固定）
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct QueueConfig {
    /// 同时在途的最大投递数
    pub max_concurrent: usize,
    /// 退避基准时长
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub retry_delay: Duration,
    /// 默认的单条消息重试上限
    pub max_retries: u32,
    /// 单次投递的超时时间
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub processing_timeout: Duration,
    /// 无就绪消息且无定时消息时的最长等待
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub idle_recheck: Duration,
    /// 已完成消息轨迹的容量
    pub completed_history_capacity: usize,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 5,
            retry_delay: Duration::from_millis(1000),
            max_retries: 3,
            processing_timeout: Duration::from_millis(30_000),
            idle_recheck: Duration::from_millis(100),
            completed_history_capacity: 100,
        }
    }
}

impl QueueConfig {
    pub fn validate(&self) -> EventingResult<()> {
        if self.max_concurrent == 0 {
            return Err(EventingError::invalid_config("maxConcurrent must be >= 1"));
        }
        if self.processing_timeout.is_zero() {
            return Err(EventingError::invalid_config(
                "processingTimeout must be greater than zero",
            ));
        }
        if self.idle_recheck.is_zero() {
            return Err(EventingError::invalid_config(
                "idleRecheck must be greater than zero",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        QueueConfig::default().validate().unwrap();
    }

    #[test]
    fn zero_concurrency_is_rejected() {
        let config = QueueConfig {
            max_concurrent: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(EventingError::InvalidConfig { .. })
        ));
    }

    #[test]
    fn durations_are_milliseconds_on_the_wire() {
        let config: QueueConfig =
            serde_json::from_str(r#"{"maxConcurrent": 2, "retryDelay": 250}"#).unwrap();
        assert_eq!(config.max_concurrent, 2);
        assert_eq!(config.retry_delay, Duration::from_millis(250));
        assert_eq!(config.max_retries, 3);

        let value = serde_json::to_value(&config).unwrap();
        assert_eq!(value["processingTimeout"], 30_000);
    }
}
