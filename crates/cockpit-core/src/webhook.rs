//! WhatsApp webhook payloads, verification handshake and signatures.

use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use serde::Deserialize;
use sha2::Sha256;

use crate::types::{IncomingMessage, MessageKind};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "x-hub-signature-256";

// ---------------------------------------------------------------------------
// Payload
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, Deserialize)]
pub struct WebhookPayload {
    #[serde(default)]
    pub object: Option<String>,
    #[serde(default)]
    pub entry: Vec<Entry>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entry {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub changes: Vec<Change>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Change {
    #[serde(default)]
    pub field: Option<String>,
    #[serde(default)]
    pub value: ChangeValue,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChangeValue {
    #[serde(default)]
    pub messaging_product: Option<String>,
    #[serde(default)]
    pub messages: Vec<WireMessage>,
    /// Delivery/read receipts; acknowledged and ignored.
    #[serde(default)]
    pub statuses: Vec<serde_json::Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMessage {
    pub from: String,
    pub id: String,
    #[serde(default)]
    pub timestamp: String,
    #[serde(rename = "type", default)]
    pub message_type: String,
    #[serde(default)]
    pub text: Option<WireText>,
    #[serde(default)]
    pub audio: Option<WireMedia>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireText {
    #[serde(default)]
    pub body: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WireMedia {
    pub id: String,
    #[serde(default)]
    pub mime_type: Option<String>,
}

impl WireMessage {
    fn into_incoming(self, received_at: DateTime<Utc>) -> IncomingMessage {
        let kind = match (self.message_type.as_str(), self.text, self.audio) {
            ("text", Some(text), _) => MessageKind::Text { body: text.body },
            ("text", None, _) => MessageKind::Text {
                body: String::new(),
            },
            ("audio", _, Some(audio)) => MessageKind::Audio { media_id: audio.id },
            (other, _, _) => MessageKind::Unsupported {
                message_type: other.to_string(),
            },
        };
        IncomingMessage {
            from: self.from,
            id: self.id,
            timestamp: self.timestamp,
            kind,
            received_at,
        }
    }
}

/// The first message of the first change of the first entry, if any.
///
/// Status-only deliveries yield `None`.
pub fn parse_incoming(payload: WebhookPayload, received_at: DateTime<Utc>) -> Option<IncomingMessage> {
    let message = payload
        .entry
        .into_iter()
        .next()?
        .changes
        .into_iter()
        .next()?
        .value
        .messages
        .into_iter()
        .next()?;
    Some(message.into_incoming(received_at))
}

// ---------------------------------------------------------------------------
// Verification handshake
// ---------------------------------------------------------------------------

/// Query parameters Meta sends when registering the webhook.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VerifyQuery {
    #[serde(rename = "hub.mode")]
    pub mode: Option<String>,
    #[serde(rename = "hub.verify_token")]
    pub verify_token: Option<String>,
    #[serde(rename = "hub.challenge")]
    pub challenge: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Handshake {
    /// Echo this challenge back with 200.
    Accepted(String),
    /// Mode or token mismatch (403).
    Rejected,
    /// Required parameters missing (400).
    Malformed,
}

pub fn verify_handshake(query: &VerifyQuery, expected_token: Option<&str>) -> Handshake {
    let (Some(mode), Some(token), Some(challenge)) =
        (&query.mode, &query.verify_token, &query.challenge)
    else {
        return Handshake::Malformed;
    };
    match expected_token {
        Some(expected) if mode == "subscribe" && constant_time_eq(token.as_bytes(), expected.as_bytes()) => {
            tracing::info!("webhook verification succeeded");
            Handshake::Accepted(challenge.clone())
        }
        _ => {
            tracing::warn!(mode = %mode, "webhook verification failed");
            Handshake::Rejected
        }
    }
}

// ---------------------------------------------------------------------------
// Signatures
// ---------------------------------------------------------------------------

/// Check an `X-Hub-Signature-256: sha256=<hex>` header against the raw body.
pub fn verify_signature(body: &[u8], header: &str, app_secret: &str) -> bool {
    let Some(expected) = header.trim().strip_prefix("sha256=") else {
        tracing::warn!("signature header missing sha256= prefix");
        return false;
    };
    let Ok(mut mac) = HmacSha256::new_from_slice(app_secret.as_bytes()) else {
        return false;
    };
    mac.update(body);
    let computed = hex::encode(mac.finalize().into_bytes());
    constant_time_eq(computed.as_bytes(), expected.to_ascii_lowercase().as_bytes())
}

/// `sha256=<hex>` for `body`, as WhatsApp would send it.
pub fn sign(body: &[u8], app_secret: &str) -> String {
    let mut mac = match HmacSha256::new_from_slice(app_secret.as_bytes()) {
        Ok(mac) => mac,
        Err(_) => return String::new(),
    };
    mac.update(body);
    format!("sha256={}", hex::encode(mac.finalize().into_bytes()))
}

fn constant_time_eq(a: &[u8], b: &[u8]) -> bool {
    if a.len() != b.len() {
        return false;
    }
    a.iter().zip(b).fold(0u8, |acc, (x, y)| acc | (x ^ y)) == 0
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(json: serde_json::Value) -> WebhookPayload {
        serde_json::from_value(json).unwrap()
    }

    fn text_payload(body: &str) -> serde_json::Value {
        serde_json::json!({
            "object": "whatsapp_business_account",
            "entry": [{
                "id": "WABA",
                "changes": [{
                    "field": "messages",
                    "value": {
                        "messaging_product": "whatsapp",
                        "metadata": {"display_phone_number": "15550001111", "phone_number_id": "1234"},
                        "contacts": [{"profile": {"name": "Brian"}, "wa_id": "15551234567"}],
                        "messages": [{
                            "from": "15551234567",
                            "id": "wamid.ABC",
                            "timestamp": "1760000000",
                            "type": "text",
                            "text": {"body": body}
                        }]
                    }
                }]
            }]
        })
    }

    #[test]
    fn parses_text_message() {
        let msg = parse_incoming(payload(text_payload("@growth hi")), Utc::now()).unwrap();
        assert_eq!(msg.from, "15551234567");
        assert_eq!(msg.id, "wamid.ABC");
        assert_eq!(msg.timestamp, "1760000000");
        assert_eq!(
            msg.kind,
            MessageKind::Text {
                body: "@growth hi".into()
            }
        );
    }

    #[test]
    fn parses_audio_and_unsupported() {
        let mut json = text_payload("");
        json["entry"][0]["changes"][0]["value"]["messages"][0] = serde_json::json!({
            "from": "1", "id": "2", "timestamp": "3", "type": "audio",
            "audio": {"id": "media-1", "mime_type": "audio/ogg; codecs=opus"}
        });
        let msg = parse_incoming(payload(json.clone()), Utc::now()).unwrap();
        assert_eq!(
            msg.kind,
            MessageKind::Audio {
                media_id: "media-1".into()
            }
        );

        json["entry"][0]["changes"][0]["value"]["messages"][0] = serde_json::json!({
            "from": "1", "id": "2", "timestamp": "3", "type": "image", "image": {"id": "x"}
        });
        let msg = parse_incoming(payload(json), Utc::now()).unwrap();
        assert_eq!(msg.message_type(), "image");
    }

    #[test]
    fn status_updates_have_no_message() {
        let json = serde_json::json!({
            "entry": [{"changes": [{"field": "messages", "value": {
                "statuses": [{"id": "wamid.1", "status": "delivered"}]
            }}]}]
        });
        assert!(parse_incoming(payload(json), Utc::now()).is_none());
        assert!(parse_incoming(WebhookPayload::default(), Utc::now()).is_none());
    }

    fn query(mode: &str, token: &str, challenge: &str) -> VerifyQuery {
        VerifyQuery {
            mode: Some(mode.into()),
            verify_token: Some(token.into()),
            challenge: Some(challenge.into()),
        }
    }

    #[test]
    fn handshake_echoes_challenge() {
        assert_eq!(
            verify_handshake(&query("subscribe", "secret", "1158201444"), Some("secret")),
            Handshake::Accepted("1158201444".into())
        );
    }

    #[test]
    fn handshake_rejects_bad_token_or_mode() {
        assert_eq!(
            verify_handshake(&query("subscribe", "wrong", "1"), Some("secret")),
            Handshake::Rejected
        );
        assert_eq!(
            verify_handshake(&query("unsubscribe", "secret", "1"), Some("secret")),
            Handshake::Rejected
        );
        assert_eq!(
            verify_handshake(&query("subscribe", "secret", "1"), None),
            Handshake::Rejected
        );
    }

    #[test]
    fn handshake_without_params_is_malformed() {
        assert_eq!(
            verify_handshake(&VerifyQuery::default(), Some("secret")),
            Handshake::Malformed
        );
    }

    #[test]
    fn signature_round_trip() {
        let body = br#"{"entry":[]}"#;
        let header = sign(body, "app-secret");
        assert!(header.starts_with("sha256="));
        assert!(verify_signature(body, &header, "app-secret"));
        assert!(!verify_signature(body, &header, "other-secret"));
        assert!(!verify_signature(b"tampered", &header, "app-secret"));
    }

    #[test]
    fn signature_requires_prefix() {
        let header = sign(b"x", "s");
        let bare = header.trim_start_matches("sha256=");
        assert!(!verify_signature(b"x", bare, "s"));
    }
}
