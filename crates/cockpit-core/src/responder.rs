//! Outbound reply shaping and delivery.

use crate::whatsapp::WhatsAppClient;

/// WhatsApp's text body limit, in characters.
pub const MAX_MESSAGE_CHARS: usize = 4096;

pub const TRUNCATION_SUFFIX: &str = "\n\n...(message truncated due to length limit)";

/// Cap `text` at [`MAX_MESSAGE_CHARS`] characters, suffix included.
pub fn truncate_for_channel(text: &str) -> String {
    if text.chars().count() <= MAX_MESSAGE_CHARS {
        return text.to_string();
    }
    let keep = MAX_MESSAGE_CHARS - TRUNCATION_SUFFIX.chars().count();
    let mut out: String = text.chars().take(keep).collect();
    out.push_str(TRUNCATION_SUFFIX);
    out
}

/// Truncate and send. Delivery failures are logged, never raised.
pub async fn deliver(whatsapp: &WhatsAppClient, to: &str, text: &str) -> bool {
    let body = truncate_for_channel(text);
    match whatsapp.send_text(to, &body).await {
        Ok(_) => true,
        Err(e) => {
            tracing::error!(to, error = %e, "failed to deliver reply");
            false
        }
    }
}
