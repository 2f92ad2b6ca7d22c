use axum::body::Bytes;
use axum::extract::{Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::Utc;
use cockpit_core::webhook::{parse_incoming, verify_handshake, Handshake, VerifyQuery, WebhookPayload};
use tracing::Instrument;

use crate::error::AppError;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// GET /webhook
// ---------------------------------------------------------------------------

/// Meta's subscription handshake: echo `hub.challenge` when the token matches.
pub async fn verify(State(app): State<AppState>, Query(query): Query<VerifyQuery>) -> Response {
    match verify_handshake(&query, app.verify_token.as_deref()) {
        Handshake::Accepted(challenge) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "text/plain")],
            challenge,
        )
            .into_response(),
        Handshake::Rejected => (StatusCode::FORBIDDEN, "Verification failed").into_response(),
        Handshake::Malformed => {
            (StatusCode::BAD_REQUEST, "Missing verification parameters").into_response()
        }
    }
}

// ---------------------------------------------------------------------------
// POST /webhook
// ---------------------------------------------------------------------------

/// Acknowledge immediately and process the message in the background.
pub async fn receive(
    State(app): State<AppState>,
    body: Bytes,
) -> Result<Json<serde_json::Value>, AppError> {
    let payload: WebhookPayload = serde_json::from_slice(&body)
        .map_err(|e| AppError::bad_request(format!("invalid webhook payload: {e}")))?;

    let Some(message) = parse_incoming(payload, Utc::now()) else {
        tracing::debug!("non-message webhook acknowledged");
        return Ok(Json(serde_json::json!({ "status": "ignored" })));
    };

    let message_id = message.id.clone();
    let span = tracing::info_span!(
        "webhook",
        request_id = %uuid::Uuid::new_v4(),
        user = %message.from,
        message_id = %message.id,
    );
    let pipeline = app.pipeline.clone();
    tokio::spawn(
        async move {
            if let Err(e) = pipeline.handle(message).await {
                tracing::error!(error = %e, "message processing failed");
            }
        }
        .instrument(span),
    );

    Ok(Json(serde_json::json!({
        "status": "accepted",
        "message_id": message_id,
    })))
}
