//! Threading header extraction from a provider envelope.

use super::types::{EmailIdentifiers, IncomingEmail, RawMessage};

fn header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

/// Pull the threading identifiers out of a raw message.
///
/// `In-Reply-To` is kept verbatim; `References` is split on whitespace.
/// The envelope's internet message id wins over a `Message-ID` header.
pub fn extract_threading_headers(raw: &RawMessage) -> EmailIdentifiers {
    let references = header(&raw.headers, "References")
        .map(|value| value.split_whitespace().map(str::to_string).collect())
        .unwrap_or_default();

    let internet_message_id = raw
        .internet_message_id
        .clone()
        .or_else(|| header(&raw.headers, "Message-ID").map(str::to_string));

    EmailIdentifiers {
        provider_message_id: raw.provider_message_id.clone(),
        internet_message_id,
        conversation_id: raw.conversation_id.clone(),
        in_reply_to: header(&raw.headers, "In-Reply-To").map(str::to_string),
        references,
    }
}

impl IncomingEmail {
    pub fn from_raw(raw: &RawMessage) -> Self {
        Self {
            identifiers: extract_threading_headers(raw),
            subject: raw.subject.clone(),
        }
    }
}
