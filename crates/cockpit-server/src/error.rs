use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use cockpit_core::CockpitError;

/// Carries an explicit 400 through the `anyhow::Error` chain.
#[derive(Debug)]
struct BadRequest(String);

impl std::fmt::Display for BadRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl std::error::Error for BadRequest {}

// ---------------------------------------------------------------------------
// AppError
// ---------------------------------------------------------------------------

/// Unified error type for HTTP responses.
#[derive(Debug)]
pub struct AppError(pub anyhow::Error);

impl AppError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self(BadRequest(msg.into()).into())
    }

    pub fn join(e: tokio::task::JoinError) -> Self {
        Self(anyhow::anyhow!("task join error: {e}"))
    }
}

fn status_for(e: &CockpitError) -> StatusCode {
    match e {
        CockpitError::AgentNotFound(_) | CockpitError::QuickActionNotFound { .. } => {
            StatusCode::NOT_FOUND
        }
        CockpitError::CollaborationAgentInvalid(_) | CockpitError::EmptyOrUnsupportedMessage(_) => {
            StatusCode::BAD_REQUEST
        }
        CockpitError::AgentInvalid { .. } | CockpitError::QuickActionInvalid { .. } => {
            StatusCode::UNPROCESSABLE_ENTITY
        }
        CockpitError::Unauthorized(_) => StatusCode::FORBIDDEN,
        CockpitError::ConfigurationMissing { .. } => StatusCode::SERVICE_UNAVAILABLE,
        CockpitError::UpstreamUnavailable { .. }
        | CockpitError::Claude(_)
        | CockpitError::Http(_) => StatusCode::BAD_GATEWAY,
        CockpitError::Store(_)
        | CockpitError::Io(_)
        | CockpitError::Yaml(_)
        | CockpitError::Json(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = if self.0.downcast_ref::<BadRequest>().is_some() {
            StatusCode::BAD_REQUEST
        } else if let Some(e) = self.0.downcast_ref::<CockpitError>() {
            status_for(e)
        } else {
            StatusCode::INTERNAL_SERVER_ERROR
        };

        if status.is_server_error() {
            tracing::error!(error = %format!("{:#}", self.0), "request failed");
        }
        let body = serde_json::json!({ "error": self.0.to_string() });
        (status, axum::Json(body)).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        Self(err.into())
    }
}
