//! Voice-note transcription through the OpenAI audio API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::multipart::{Form, Part};
use serde::Deserialize;

use crate::config::{Credentials, TranscriptionConfig};
use crate::error::{CockpitError, Result};
use crate::whatsapp::Media;

const SERVICE: &str = "transcription API";

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

#[derive(Debug, Clone)]
pub struct Transcriber {
    http: reqwest::Client,
    base_url: String,
    model: String,
    credentials: Arc<Credentials>,
}

impl Transcriber {
    pub fn new(config: &TranscriptionConfig, credentials: Arc<Credentials>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            credentials,
        })
    }

    /// Transcribe one audio attachment. Blank transcripts are an error.
    pub async fn transcribe(&self, media: Media) -> Result<String> {
        let key = self.credentials.openai_api_key()?;
        let mime = media.mime_type.unwrap_or_else(|| "audio/ogg".to_string());
        let bytes = media.bytes.len();

        let file = Part::bytes(media.bytes)
            .file_name("audio.ogg")
            .mime_str(&mime)?;
        let form = Form::new()
            .part("file", file)
            .text("model", self.model.clone());

        let response = self
            .http
            .post(format!("{}/v1/audio/transcriptions", self.base_url))
            .bearer_auth(key)
            .multipart(form)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(CockpitError::UpstreamUnavailable {
                service: SERVICE,
                status: Some(status.as_u16()),
                detail: response.text().await.unwrap_or_default(),
            });
        }

        let parsed: TranscriptionResponse = response.json().await?;
        let text = parsed.text.trim().to_string();
        if text.is_empty() {
            return Err(CockpitError::EmptyOrUnsupportedMessage(
                "empty transcription".to_string(),
            ));
        }
        tracing::info!(bytes, chars = text.chars().count(), "voice message transcribed");
        Ok(text)
    }
}
