//! Content detection, decoding and encoding.
//!
//! # Data Flow
//! ```text
//! Request body:
//!     Content-Type header + bytes
//!     → kind.rs (classify by header, sniff first byte as fallback)
//!     → decode.rs (bytes → Payload; xml.rs for XML → JSON tree)
//!
//! Operation result:
//!     Payload
//!     → encode.rs (Payload → bytes in the negotiated kind + charset)
//!     → sniff.rs / negotiate.rs (content type of raw byte results)
//! ```
//!
//! # Design Decisions
//! - Structured values are `serde_json::Value` trees; XML goes through JSON
//! - Raw bytes are never re-encoded, only typed
//! - Multipart is request-only; responses degrade to JSON

pub mod charset;
pub mod decode;
pub mod encode;
pub mod kind;
pub mod negotiate;
pub mod sniff;
pub mod xml;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use bytes::Bytes;
use serde_json::{Map, Value};

pub use decode::{decode, DecodeError};
pub use encode::{Encoded, EncodeError};
pub use kind::{classify, header_param, ContentKind};

/// Charset used when none was negotiated.
pub const CHARSET_DEFAULT: &str = "UTF-8";

/// A decoded request body or an operation result.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// Structured value (object, array, string, number, boolean, null).
    Value(Value),
    /// Raw bytes.
    Bytes(Bytes),
    /// Multipart or form-post fields, in received order.
    Fields(Vec<MultipartField>),
}

impl Payload {
    pub fn null() -> Self {
        Payload::Value(Value::Null)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Payload::Value(Value::Null))
    }

    pub fn is_false(&self) -> bool {
        matches!(self, Payload::Value(Value::Bool(false)))
    }

    /// `null`, `false`, `0` and `""`.
    pub fn is_falsy(&self) -> bool {
        match self {
            Payload::Value(Value::Null) | Payload::Value(Value::Bool(false)) => true,
            Payload::Value(Value::Number(n)) => n.as_f64() == Some(0.0),
            Payload::Value(Value::String(s)) => s.is_empty(),
            _ => false,
        }
    }

    /// JSON view of the payload. Raw bytes become base64 strings.
    pub fn to_json(&self) -> Value {
        match self {
            Payload::Value(v) => v.clone(),
            Payload::Bytes(b) => Value::String(STANDARD.encode(b)),
            Payload::Fields(fields) => Value::Array(fields.iter().map(MultipartField::to_json).collect()),
        }
    }

    /// Plain string form, as used for `text/plain` responses.
    pub fn as_text(&self) -> String {
        match self {
            Payload::Value(Value::Null) => String::new(),
            Payload::Value(Value::String(s)) => s.clone(),
            Payload::Bytes(b) => String::from_utf8_lossy(b).into_owned(),
            other => other.to_json().to_string(),
        }
    }
}

impl From<Value> for Payload {
    fn from(value: Value) -> Self {
        Payload::Value(value)
    }
}

impl From<String> for Payload {
    fn from(value: String) -> Self {
        Payload::Value(Value::String(value))
    }
}

impl From<&str> for Payload {
    fn from(value: &str) -> Self {
        Payload::Value(Value::String(value.to_string()))
    }
}

impl From<Vec<u8>> for Payload {
    fn from(value: Vec<u8>) -> Self {
        Payload::Bytes(Bytes::from(value))
    }
}

impl From<Bytes> for Payload {
    fn from(value: Bytes) -> Self {
        Payload::Bytes(value)
    }
}

/// One part of a multipart body, or one pair of a url-encoded form.
#[derive(Debug, Clone, PartialEq)]
pub struct MultipartField {
    pub name: Option<String>,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    /// Only set when the part declared a charset.
    pub charset: Option<String>,
    pub value: Payload,
}

impl MultipartField {
    pub fn to_json(&self) -> Value {
        let mut map = Map::new();
        if let Some(name) = &self.name {
            map.insert("name".into(), Value::String(name.clone()));
        }
        if let Some(file_name) = &self.file_name {
            map.insert("fileName".into(), Value::String(file_name.clone()));
        }
        if let Some(content_type) = &self.content_type {
            map.insert("contentType".into(), Value::String(content_type.clone()));
        }
        if let Some(charset) = &self.charset {
            map.insert("charset".into(), Value::String(charset.clone()));
        }
        map.insert("value".into(), self.value.to_json());
        Value::Object(map)
    }
}
