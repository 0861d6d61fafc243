//! 运行时配置
//!
//! 加载顺序：默认值 → `PORTAL_EVENTS_CONFIG` 指向的 JSON 文件（可选）→ 环境变量覆盖 → 校验。
//!
use crate::error::{RuntimeError, RuntimeResult};
use portal_eventing::{EventBusConfig, QueueConfig};
use portal_webhooks::WebhookDispatcherConfig;
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::debug;

pub const CONFIG_PATH_ENV: &str = "PORTAL_EVENTS_CONFIG";
pub const QUEUE_MAX_CONCURRENT_ENV: &str = "PORTAL_QUEUE_MAX_CONCURRENT";
pub const QUEUE_MAX_RETRIES_ENV: &str = "PORTAL_QUEUE_MAX_RETRIES";
pub const WEBHOOK_BACKOFF_MS_ENV: &str = "PORTAL_WEBHOOK_BACKOFF_MS";

fn default_success_rate() -> f64 {
    0.9
}

fn default_latency() -> Duration {
    Duration::from_millis(100)
}

fn default_user_agent() -> String {
    "portal-events/0.1".to_string()
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(10)
}

/// Webhook 传输选择
#[serde_as]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase", rename_all_fields = "camelCase")]
pub enum TransportConfig {
    Simulated {
        #[serde(default = "default_success_rate")]
        success_rate: f64,
        #[serde_as(as = "DurationMilliSeconds<u64>")]
        #[serde(default = "default_latency")]
        latency: Duration,
    },
    Http {
        #[serde(default = "default_user_agent")]
        user_agent: String,
        #[serde_as(as = "DurationMilliSeconds<u64>")]
        #[serde(default = "default_connect_timeout")]
        connect_timeout: Duration,
    },
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self::Simulated {
            success_rate: default_success_rate(),
            latency: default_latency(),
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RuntimeConfig {
    pub bus: EventBusConfig,
    pub queue: QueueConfig,
    pub webhooks: WebhookDispatcherConfig,
    pub transport: TransportConfig,
}

impl RuntimeConfig {
    /// 从环境加载完整配置
    pub fn load() -> RuntimeResult<Self> {
        let mut config = match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => {
                debug!(path = %path, "loading runtime config file");
                Self::from_file(path)?
            }
            Err(_) => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(path: impl AsRef<Path>) -> RuntimeResult<Self> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> RuntimeResult<Self> {
        Ok(serde_json::from_str(raw)?)
    }

    /// 以 `lookup` 查询覆盖项；值无法解析时返回配置错误
    pub fn apply_overrides<F>(&mut self, lookup: F) -> RuntimeResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(v) = parse_override::<usize>(&lookup, QUEUE_MAX_CONCURRENT_ENV)? {
            self.queue.max_concurrent = v;
        }
        if let Some(v) = parse_override::<u32>(&lookup, QUEUE_MAX_RETRIES_ENV)? {
            self.queue.max_retries = v;
        }
        if let Some(v) = parse_override::<u64>(&lookup, WEBHOOK_BACKOFF_MS_ENV)? {
            self.webhooks.backoff_unit = Duration::from_millis(v);
        }
        Ok(())
    }

    pub fn validate(&self) -> RuntimeResult<()> {
        self.queue.validate()?;
        if let TransportConfig::Simulated { success_rate, .. } = &self.transport
            && !(0.0..=1.0).contains(success_rate)
        {
            return Err(RuntimeError::config(format!(
                "transport.successRate must be within [0, 1], got {success_rate}"
            )));
        }
        Ok(())
    }
}

fn parse_override<T>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> RuntimeResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    raw.trim()
        .parse::<T>()
        .map(Some)
        .map_err(|err| RuntimeError::config(format!("{key}={raw:?}: {err}")))
}
