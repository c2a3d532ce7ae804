//! Route handlers: health check and the webhook POST endpoint.

use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Json};
use hmac::{Hmac, Mac};
use serde::Serialize;
use sha2::Sha256;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use liquidator_core::handler::{self, HandlerContext, LogResult};

type HmacSha256 = Hmac<Sha256>;

const SIGNATURE_HEADER: &str = "x-alchemy-signature";

#[derive(Clone)]
pub struct AppState {
    pub ctx: std::sync::Arc<HandlerContext>,
    pub hmac_secret: String,
}

#[derive(Serialize)]
struct HealthResponse {
    status: &'static str,
    service: &'static str,
    ts: i64,
    trace_id: String,
}

pub async fn health() -> impl IntoResponse {
    let trace_id = Uuid::new_v4();
    Json(HealthResponse {
        status: "ok",
        service: "liquidator",
        ts: chrono::Utc::now().timestamp(),
        trace_id: trace_id.to_string(),
    })
}

#[derive(Serialize)]
struct WebhookOkResponse {
    ok: bool,
    processed: usize,
    results: Vec<LogResult>,
    trace_id: String,
}

#[derive(Serialize)]
struct WebhookErrResponse {
    ok: bool,
    error: &'static str,
    trace_id: String,
}

#[instrument(skip(state, headers, body))]
pub async fn webhook(
    State(state): State<AppState>,
    headers: HeaderMap,
    body: String,
) -> axum::response::Response {
    let trace_id = Uuid::new_v4();

    let Some(signature) = headers.get(SIGNATURE_HEADER).and_then(|v| v.to_str().ok()) else {
        warn!(%trace_id, "missing signature header");
        return (
            StatusCode::UNAUTHORIZED,
            Json(WebhookErrResponse { ok: false, error: "missing_signature", trace_id: trace_id.to_string() }),
        ).into_response();
    };

    if !verify_signature(&state.hmac_secret, body.as_bytes(), signature) {
        warn!(%trace_id, "signature mismatch");
        return (
            StatusCode::UNAUTHORIZED,
            Json(WebhookErrResponse { ok: false, error: "signature_mismatch", trace_id: trace_id.to_string() }),
        ).into_response();
    }

    let parsed: serde_json::Value = serde_json::from_str(&body).unwrap_or(serde_json::Value::Null);
    let result = handler::handle_webhook(&parsed, &state.ctx).await;

    info!(%trace_id, processed = result.processed, "webhook processed");

    (
        StatusCode::OK,
        Json(WebhookOkResponse { ok: true, processed: result.processed, results: result.results, trace_id: trace_id.to_string() }),
    ).into_response()
}

/// Constant-time HMAC-SHA256 verification over the raw body, against a
/// hex-encoded signature header. Uses the `hmac` crate's
/// `verify_slice`, which compares in constant time, directly — no
/// hand-rolled byte comparison.
fn verify_signature(secret: &str, body: &[u8], signature_hex: &str) -> bool {
    let Ok(mut mac) = HmacSha256::new_from_slice(secret.as_bytes()) else {
        return false;
    };
    let Ok(expected) = hex::decode(signature_hex.trim_start_matches("0x")) else {
        return false;
    };
    mac.update(body);
    mac.verify_slice(&expected).is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_mismatch_rejected() {
        assert!(!verify_signature("secret", b"body", "deadbeef"));
    }

    #[test]
    fn valid_signature_accepted() {
        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(b"body");
        let sig = hex::encode(mac.finalize().into_bytes());
        assert!(verify_signature("secret", b"body", &sig));
    }

    #[test]
    fn one_byte_off_signature_rejected() {
        let mut mac = HmacSha256::new_from_slice(b"secret").unwrap();
        mac.update(b"body");
        let mut sig = hex::encode(mac.finalize().into_bytes());
        sig.replace_range(0..2, "ff");
        assert!(!verify_signature("secret", b"body", &sig));
    }
}
