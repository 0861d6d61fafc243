//! 指数退避（Backoff）
//!
//! 第 `exponent` 次重试前的等待时间为 `base × 2^exponent`，溢出时饱和。
//!
use chrono::{DateTime, Utc};
use std::time::Duration;

/// 计算指数退避时长
pub fn exponential_backoff(base: Duration, exponent: u32) -> Duration {
    let factor = 2u32.checked_pow(exponent).unwrap_or(u32::MAX);
    base.saturating_mul(factor)
}

/// `now + delay`，超出可表示范围时取最大时间
pub fn deadline_after(now: DateTime<Utc>, delay: Duration) -> DateTime<Utc> {
    chrono::Duration::from_std(delay)
        .ok()
        .and_then(|d| now.checked_add_signed(d))
        .unwrap_or(DateTime::<Utc>::MAX_UTC)
}
