//! WhatsApp Cloud API client: outbound text and inbound media download.

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::config::{Credentials, WhatsAppConfig};
use crate::error::{CockpitError, Result};

const SERVICE: &str = "WhatsApp API";

#[derive(Debug, Serialize)]
struct TextBody<'a> {
    body: &'a str,
}

#[derive(Debug, Serialize)]
struct SendTextRequest<'a> {
    messaging_product: &'static str,
    to: &'a str,
    #[serde(rename = "type")]
    kind: &'static str,
    text: TextBody<'a>,
}

#[derive(Debug, Deserialize)]
struct SendResponse {
    #[serde(default)]
    messages: Vec<SentMessage>,
}

#[derive(Debug, Deserialize)]
struct SentMessage {
    id: String,
}

#[derive(Debug, Deserialize)]
struct MediaInfo {
    url: String,
    #[serde(default)]
    mime_type: Option<String>,
}

/// Raw bytes of a downloaded attachment.
#[derive(Debug, Clone)]
pub struct Media {
    pub bytes: Vec<u8>,
    pub mime_type: Option<String>,
}

#[derive(Debug, Clone)]
pub struct WhatsAppClient {
    http: reqwest::Client,
    graph_base_url: String,
    api_version: String,
    credentials: Arc<Credentials>,
}

async fn upstream_error(response: reqwest::Response, what: &str) -> CockpitError {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    tracing::warn!(status = status.as_u16(), body = %body, "{what} failed");
    CockpitError::UpstreamUnavailable {
        service: SERVICE,
        status: Some(status.as_u16()),
        detail: format!("{what} returned {status}"),
    }
}

impl WhatsAppClient {
    pub fn new(config: &WhatsAppConfig, credentials: Arc<Credentials>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            graph_base_url: config.graph_base_url.trim_end_matches('/').to_string(),
            api_version: config.api_version.clone(),
            credentials,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}/{path}", self.graph_base_url, self.api_version)
    }

    /// Send one text message. Returns the WhatsApp message id when the API
    /// reports one.
    pub async fn send_text(&self, to: &str, body: &str) -> Result<Option<String>> {
        let token = self.credentials.whatsapp_token()?;
        let phone_number_id = self.credentials.whatsapp_phone_number_id()?;

        let request = SendTextRequest {
            messaging_product: "whatsapp",
            to,
            kind: "text",
            text: TextBody { body },
        };
        let response = self
            .http
            .post(self.endpoint(&format!("{phone_number_id}/messages")))
            .bearer_auth(token)
            .json(&request)
            .send()
            .await
            .map_err(|e| CockpitError::UpstreamUnavailable {
                service: SERVICE,
                status: None,
                detail: e.to_string(),
            })?;

        if !response.status().is_success() {
            return Err(upstream_error(response, "send message").await);
        }

        let sent: SendResponse = response.json().await.unwrap_or(SendResponse {
            messages: Vec::new(),
        });
        let id = sent.messages.into_iter().next().map(|m| m.id);
        tracing::info!(to, chars = body.chars().count(), message_id = ?id, "whatsapp message sent");
        Ok(id)
    }

    /// Resolve a media id and download its bytes with the bearer token.
    pub async fn download_media(&self, media_id: &str) -> Result<Media> {
        let token = self.credentials.whatsapp_token()?;

        let response = self
            .http
            .get(self.endpoint(media_id))
            .bearer_auth(token)
            .send()
            .await?;
        if !response.status().is_success() {
            return Err(upstream_error(response, "media lookup").await);
        }
        let info: MediaInfo = response.json().await?;

        let response = self.http.get(&info.url).bearer_auth(token).send().await?;
        if !response.status().is_success() {
            return Err(upstream_error(response, "media download").await);
        }
        let bytes = response.bytes().await?.to_vec();
        tracing::debug!(media_id, bytes = bytes.len(), "media downloaded");
        Ok(Media {
            bytes,
            mime_type: info.mime_type,
        })
    }
}
