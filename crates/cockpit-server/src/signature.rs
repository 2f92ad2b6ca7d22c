use axum::body::{to_bytes, Body};
use axum::extract::{Request, State};
use axum::http::{Method, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use cockpit_core::webhook::{verify_signature, SIGNATURE_HEADER};

use crate::state::AppState;

/// Webhook bodies are small JSON documents; anything larger is refused.
pub const MAX_WEBHOOK_BODY: usize = 1024 * 1024;

fn unauthorized(reason: &str) -> Response {
    let body = serde_json::json!({ "error": reason });
    (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
}

/// Axum middleware that checks `X-Hub-Signature-256` against the raw body.
///
/// Only `POST` deliveries are signed; the `GET` subscription handshake and
/// every request when no app secret is configured pass straight through.
pub async fn require_signature(State(app): State<AppState>, req: Request, next: Next) -> Response {
    if req.method() != Method::POST {
        return next.run(req).await;
    }
    let Some(secret) = app.app_secret.as_deref() else {
        return next.run(req).await;
    };

    let (parts, body) = req.into_parts();
    let Some(header) = parts
        .headers
        .get(SIGNATURE_HEADER)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
    else {
        tracing::warn!("webhook rejected: missing signature header");
        return unauthorized("missing signature");
    };

    let bytes = match to_bytes(body, MAX_WEBHOOK_BODY).await {
        Ok(bytes) => bytes,
        Err(e) => {
            tracing::warn!(error = %e, "webhook rejected: unreadable body");
            let body = serde_json::json!({ "error": "body too large or unreadable" });
            return (StatusCode::PAYLOAD_TOO_LARGE, axum::Json(body)).into_response();
        }
    };

    if !verify_signature(&bytes, &header, secret) {
        tracing::warn!("webhook rejected: signature mismatch");
        return unauthorized("invalid signature");
    }

    next.run(Request::from_parts(parts, Body::from(bytes))).await
}
