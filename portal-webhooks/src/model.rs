//! Webhook 注册与投递结果模型
//!
use crate::error::{WebhookError, WebhookResult};
use bon::Builder;
use chrono::{DateTime, Utc};
use portal_eventing::EventType;
use serde::{Deserialize, Serialize};
use serde_with::{DurationMilliSeconds, serde_as};
use std::time::Duration;
use uuid::Uuid;

pub const DEFAULT_RETRY_COUNT: u32 = 3;
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

fn default_active() -> bool {
    true
}

fn default_retry_count() -> u32 {
    DEFAULT_RETRY_COUNT
}

fn default_timeout() -> Duration {
    DEFAULT_TIMEOUT
}

/// 已注册的 Webhook
#[serde_as]
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookConfig {
    pub id: String,
    pub url: String,
    pub events: Vec<EventType>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    pub active: bool,
    /// 首次尝试之后的最大重试次数
    pub retry_count: u32,
    /// 单次尝试的超时
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub timeout: Duration,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl WebhookConfig {
    /// 处于启用状态且订阅了该事件类型
    pub fn wants(&self, event_type: EventType) -> bool {
        self.active && self.events.contains(&event_type)
    }
}

/// 注册请求
#[serde_as]
#[derive(Debug, Clone, Builder, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookRegistration {
    #[builder(into)]
    pub url: String,
    #[builder(into)]
    pub events: Vec<EventType>,
    #[builder(into)]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret: Option<String>,
    #[builder(default = true)]
    #[serde(default = "default_active")]
    pub active: bool,
    #[builder(default = DEFAULT_RETRY_COUNT)]
    #[serde(default = "default_retry_count")]
    pub retry_count: u32,
    #[builder(default = DEFAULT_TIMEOUT)]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    #[serde(default = "default_timeout")]
    pub timeout: Duration,
}

impl WebhookRegistration {
    pub(crate) fn into_config(self) -> WebhookResult<WebhookConfig> {
        validate_target(&self.url, &self.events, self.timeout)?;
        let now = Utc::now();
        Ok(WebhookConfig {
            id: format!("wh-{}", Uuid::new_v4()),
            url: self.url,
            events: self.events,
            secret: self.secret,
            active: self.active,
            retry_count: self.retry_count,
            timeout: self.timeout,
            created_at: now,
            updated_at: now,
        })
    }
}

/// 局部更新：仅覆盖出现的字段
#[serde_as]
#[derive(Debug, Clone, Default, Builder, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct WebhookUpdate {
    #[builder(into)]
    pub url: Option<String>,
    #[builder(into)]
    pub events: Option<Vec<EventType>>,
    #[builder(into)]
    pub secret: Option<String>,
    pub active: Option<bool>,
    pub retry_count: Option<u32>,
    #[serde_as(as = "Option<DurationMilliSeconds<u64>>")]
    pub timeout: Option<Duration>,
}

impl WebhookUpdate {
    /// 在副本上合并并校验，成功后才替换原配置
    pub(crate) fn apply(self, current: &WebhookConfig) -> WebhookResult<WebhookConfig> {
        let mut merged = current.clone();
        if let Some(url) = self.url {
            merged.url = url;
        }
        if let Some(events) = self.events {
            merged.events = events;
        }
        if let Some(secret) = self.secret {
            merged.secret = Some(secret);
        }
        if let Some(active) = self.active {
            merged.active = active;
        }
        if let Some(retry_count) = self.retry_count {
            merged.retry_count = retry_count;
        }
        if let Some(timeout) = self.timeout {
            merged.timeout = timeout;
        }
        validate_target(&merged.url, &merged.events, merged.timeout)?;
        merged.updated_at = Utc::now();
        Ok(merged)
    }
}

fn validate_target(url: &str, events: &[EventType], timeout: Duration) -> WebhookResult<()> {
    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| WebhookError::invalid_registration(format!("url must be http(s): {url}")))?;
    if rest.is_empty() || rest.starts_with('/') {
        return Err(WebhookError::invalid_registration(format!(
            "url has no host: {url}"
        )));
    }
    if events.is_empty() {
        return Err(WebhookError::invalid_registration(
            "at least one event type is required",
        ));
    }
    if timeout.is_zero() {
        return Err(WebhookError::invalid_registration(
            "timeout must be greater than zero",
        ));
    }
    Ok(())
}

/// 单次投递尝试的结果
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookDeliveryResult {
    pub webhook_id: String,
    pub event_id: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// 本次尝试的序号，首次为 0
    pub retry_count: u32,
    pub delivered_at: DateTime<Utc>,
}

impl WebhookDeliveryResult {
    pub(crate) fn succeeded(
        webhook_id: &str,
        event_id: &str,
        status_code: u16,
        retry_count: u32,
    ) -> Self {
        Self {
            webhook_id: webhook_id.to_string(),
            event_id: event_id.to_string(),
            success: true,
            status_code: Some(status_code),
            error: None,
            retry_count,
            delivered_at: Utc::now(),
        }
    }

    pub(crate) fn failed(
        webhook_id: &str,
        event_id: &str,
        status_code: Option<u16>,
        error: impl ToString,
        retry_count: u32,
    ) -> Self {
        Self {
            webhook_id: webhook_id.to_string(),
            event_id: event_id.to_string(),
            success: false,
            status_code,
            error: Some(error.to_string()),
            retry_count,
            delivered_at: Utc::now(),
        }
    }
}

/// 投递历史查询条件
#[derive(Debug, Clone, Default, Builder)]
pub struct DeliveryHistoryFilter {
    #[builder(into)]
    pub webhook_id: Option<String>,
    /// 只取最近的 N 条
    pub limit: Option<usize>,
}
