//! Signed webhook deliveries from the voice platform.

use axum::{
    body::Bytes,
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::{json, Value};
use sha2::Sha256;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::AppState;

/// Header carrying `v=<unix_ms>,d=<hex hmac>`.
pub const SIGNATURE_HEADER: &str = "x-retell-signature";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum WebhookError {
    #[error("webhook secret is not configured")]
    NotConfigured,

    #[error("missing signature header")]
    MissingSignature,

    #[error("malformed signature header")]
    MalformedSignature,

    #[error("signature timestamp is outside the accepted window")]
    Expired,

    #[error("signature does not match")]
    BadSignature,

    #[error("Invalid JSON format")]
    InvalidJson,

    #[error("Missing required fields: event and data")]
    MissingFields,
}

impl IntoResponse for WebhookError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::InvalidJson | Self::MissingFields => (StatusCode::BAD_REQUEST, self.to_string()),
            Self::NotConfigured
            | Self::MissingSignature
            | Self::MalformedSignature
            | Self::Expired
            | Self::BadSignature => {
                tracing::warn!(reason = %self, "rejected webhook delivery");
                (StatusCode::UNAUTHORIZED, "Unauthorized".to_string())
            }
        };
        (status, Json(json!({ "message": message }))).into_response()
    }
}

/// Checks `X-Retell-Signature` against the shared secret.
#[derive(Clone)]
pub struct WebhookVerifier {
    secret: Option<String>,
    tolerance: Duration,
}

impl fmt::Debug for WebhookVerifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WebhookVerifier")
            .field("secret", &self.secret.as_ref().map(|_| "<redacted>"))
            .field("tolerance", &self.tolerance)
            .finish()
    }
}

impl WebhookVerifier {
    pub fn new(secret: Option<String>, tolerance: Duration) -> Self {
        Self {
            secret: secret.filter(|secret| !secret.is_empty()),
            tolerance,
        }
    }

    pub fn is_configured(&self) -> bool {
        self.secret.is_some()
    }

    /// Verifies `header` for the raw `body` at wall-clock time `now_ms`.
    ///
    /// # Errors
    ///
    /// Returns the reason the delivery must be rejected.
    pub fn verify(&self, body: &[u8], header: Option<&str>, now_ms: i64) -> Result<(), WebhookError> {
        let secret = self.secret.as_deref().ok_or(WebhookError::NotConfigured)?;
        let header = header.ok_or(WebhookError::MissingSignature)?;
        let (timestamp, digest) = parse_header(header)?;

        let timestamp_ms: i64 = timestamp
            .parse()
            .map_err(|_| WebhookError::MalformedSignature)?;
        let age_ms = u128::from(now_ms.abs_diff(timestamp_ms));
        if age_ms > self.tolerance.as_millis() {
            return Err(WebhookError::Expired);
        }

        let provided = hex::decode(digest).map_err(|_| WebhookError::MalformedSignature)?;
        mac(secret, body, timestamp)?
            .verify_slice(&provided)
            .map_err(|_| WebhookError::BadSignature)
    }
}

/// Produces the header value for `body` signed at `timestamp_ms`.
///
/// # Errors
///
/// Fails only if the HMAC cannot be keyed with `secret`.
pub fn sign(secret: &str, body: &[u8], timestamp_ms: i64) -> Result<String, WebhookError> {
    let timestamp = timestamp_ms.to_string();
    let digest = mac(secret, body, &timestamp)?.finalize().into_bytes();
    Ok(format!("v={timestamp},d={}", hex::encode(digest)))
}

/// HMAC-SHA256 over the body bytes followed by the decimal timestamp.
fn mac(secret: &str, body: &[u8], timestamp: &str) -> Result<HmacSha256, WebhookError> {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| WebhookError::NotConfigured)?;
    mac.update(body);
    mac.update(timestamp.as_bytes());
    Ok(mac)
}

fn parse_header(header: &str) -> Result<(&str, &str), WebhookError> {
    let mut timestamp = None;
    let mut digest = None;
    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("v", value)) => timestamp = Some(value),
            Some(("d", value)) => digest = Some(value),
            _ => {}
        }
    }
    match (timestamp, digest) {
        (Some(timestamp), Some(digest)) if !timestamp.is_empty() && !digest.is_empty() => {
            Ok((timestamp, digest))
        }
        _ => Err(WebhookError::MalformedSignature),
    }
}

#[derive(Debug, Deserialize)]
struct Delivery {
    event: String,
    data: Value,
}

/// `POST /webhook`: logs call lifecycle events.
pub async fn webhook_handler(
    Extension(state): Extension<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> Result<Json<Value>, WebhookError> {
    let signature = headers
        .get(SIGNATURE_HEADER)
        .and_then(|value| value.to_str().ok());
    state
        .webhook
        .verify(&body, signature, chrono::Utc::now().timestamp_millis())?;

    let payload: Value = serde_json::from_slice(&body).map_err(|_| WebhookError::InvalidJson)?;
    let delivery: Delivery =
        serde_json::from_value(payload).map_err(|_| WebhookError::MissingFields)?;

    let call_id = delivery
        .data
        .get("call_id")
        .and_then(Value::as_str)
        .unwrap_or("unknown");
    match delivery.event.as_str() {
        "call_started" => tracing::info!(%call_id, "call started"),
        "call_ended" => tracing::info!(%call_id, "call ended"),
        "call_analyzed" => tracing::info!(%call_id, "call analyzed"),
        other => tracing::debug!(%call_id, event = other, "ignoring unknown webhook event"),
    }

    Ok(Json(json!({ "received": true })))
}
