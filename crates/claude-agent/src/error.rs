use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClaudeAgentError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Claude API error ({status}): {body}")]
    Api { status: u16, body: String },

    #[error("Failed to parse Messages API response: {source}\n  body: {body}")]
    Parse {
        body: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("Claude returned no text content (model: {model})")]
    EmptyResponse { model: String },
}

impl ClaudeAgentError {
    /// Upstream HTTP status, when the API answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ClaudeAgentError::Api { status, .. } => Some(*status),
            ClaudeAgentError::Http(e) => e.status().map(|s| s.as_u16()),
            _ => None,
        }
    }
}
