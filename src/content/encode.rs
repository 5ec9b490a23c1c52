//! Operation result encoding.
//!
//! # Data Flow
//! ```text
//! Payload ──┬─ preset content type  → encode_preset (bytes as-is, text in charset)
//!           ├─ raw bytes            → encode_binary (sniff → Accept → octet-stream)
//!           └─ structured           → encode (JSON / JSONP / XML / text)
//! ```

use bytes::Bytes;
use thiserror::Error;
use tracing::warn;

use super::charset::{canonical_name, encode_text};
use super::kind::ContentKind;
use super::negotiate::{accepts, first_concrete};
use super::sniff::sniff;
use super::xml::json_to_xml;
use super::Payload;
use crate::error::GatewayError;

const OCTET_STREAM: &str = "application/octet-stream";

/// An encoded response body and its `Content-Type`.
#[derive(Debug, Clone, PartialEq)]
pub struct Encoded {
    pub content_type: String,
    pub body: Bytes,
}

#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("cannot write a structured result as {0:?}")]
    NotRepresentable(ContentKind),
}

impl From<EncodeError> for GatewayError {
    fn from(_: EncodeError) -> Self {
        GatewayError::UnsupportedContent
    }
}

/// Encode a structured result in `kind`.
///
/// `callback` wraps JSON output as JSONP. The declared charset is the one
/// the body was actually written in.
pub fn encode(
    result: &Payload,
    kind: ContentKind,
    charset: &str,
    callback: Option<&str>,
) -> Result<Encoded, EncodeError> {
    let Some(mime) = kind.response_mime() else {
        return Err(EncodeError::NotRepresentable(kind));
    };
    let charset = canonical_name(charset);

    let text = match kind {
        ContentKind::Xml => format!(
            "<?xml version=\"1.0\" encoding=\"{charset}\"?>\n{}",
            json_to_xml(&result.to_json())
        ),
        ContentKind::Text => result.as_text(),
        _ => {
            let json = if result.is_null() { String::new() } else { result.to_json().to_string() };
            match callback {
                Some(cb) => format!("{cb}({json})"),
                None => json,
            }
        }
    };

    Ok(Encoded {
        content_type: format!("{mime};charset={charset}"),
        body: Bytes::from(encode_text(&text, charset)),
    })
}

/// Encode a result whose content type was set by the operation itself.
///
/// Raw bytes are sent untouched; anything else is written in the form the
/// preset type asks for, falling back to the text form.
pub fn encode_preset(result: &Payload, preset: &str, charset: &str) -> Encoded {
    let body = match result {
        Payload::Bytes(bytes) => bytes.clone(),
        other => {
            let text = match ContentKind::from_header(Some(preset)) {
                ContentKind::Xml => json_to_xml(&other.to_json()),
                ContentKind::Json => {
                    if other.is_null() {
                        String::new()
                    } else {
                        other.to_json().to_string()
                    }
                }
                _ => other.as_text(),
            };
            Bytes::from(encode_text(&text, charset))
        }
    };
    Encoded { content_type: preset.to_string(), body }
}

/// Type a raw byte result.
///
/// Magic-number sniffing first, then the first concrete `Accept` entry,
/// then `application/octet-stream`. A type the client did not ask for is
/// still sent, with a warning.
pub fn encode_binary(bytes: Bytes, accept: Option<&str>) -> Encoded {
    let sniffed = sniff(&bytes);
    let content_type = match accept {
        None => sniffed.unwrap_or(OCTET_STREAM).to_string(),
        Some(accept) => {
            let chosen = match sniffed {
                Some(mime) => mime.to_string(),
                None => match first_concrete(accept) {
                    Some(first) => {
                        if accept.contains(',') {
                            warn!(content_type = %first, accept = %accept, "Could not sniff byte result type, using Accept entry");
                        }
                        first.to_string()
                    }
                    None => OCTET_STREAM.to_string(),
                },
            };
            if !accepts(accept, &chosen) {
                warn!(content_type = %chosen, accept = %accept, "Byte result type not in Accept header");
            }
            chosen
        }
    };
    Encoded { content_type, body: bytes }
}
