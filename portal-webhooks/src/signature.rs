//! 请求体签名
//!
//! 签名格式为 `sha256=<hex>`，内容为以 Webhook 密钥计算的请求体 HMAC-SHA256。
//! 接收方可用 `verify_signature` 以常量时间比较校验。
//!
use crate::error::{WebhookError, WebhookResult};
use hmac::{Hmac, Mac};
use sha2::Sha256;

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_PREFIX: &str = "sha256=";

pub const HEADER_WEBHOOK_ID: &str = "X-Webhook-Id";
pub const HEADER_EVENT: &str = "X-Webhook-Event";
pub const HEADER_DELIVERY: &str = "X-Webhook-Delivery";
pub const HEADER_SIGNATURE: &str = "X-Webhook-Signature";

fn mac(secret: &str) -> WebhookResult<HmacSha256> {
    HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|err| WebhookError::signature(format!("invalid secret: {err}")))
}

/// 计算签名头的值
pub fn sign_payload(secret: &str, body: &[u8]) -> WebhookResult<String> {
    let mut mac = mac(secret)?;
    mac.update(body);
    let digest = mac.finalize().into_bytes();
    Ok(format!("{SIGNATURE_PREFIX}{}", hex::encode(digest)))
}

/// 校验签名头；接受带或不带 `sha256=` 前缀的十六进制串
pub fn verify_signature(secret: &str, body: &[u8], signature: &str) -> WebhookResult<()> {
    let encoded = signature
        .strip_prefix(SIGNATURE_PREFIX)
        .unwrap_or(signature)
        .trim();
    let expected = hex::decode(encoded)
        .map_err(|err| WebhookError::signature(format!("malformed signature: {err}")))?;

    let mut mac = mac(secret)?;
    mac.update(body);
    mac.verify_slice(&expected)
        .map_err(|_| WebhookError::signature("signature mismatch"))
}
