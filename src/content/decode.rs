//! Request body decoding.
//!
//! # Responsibilities
//! - Turn a classified body into a [`Payload`]
//! - Split multipart bodies, decoding each part with the same rules
//! - Expand url-encoded form posts into one field per pair
//!
//! # Design Decisions
//! - XML is converted to a JSON tree so both formats look identical to
//!   the invoked operation
//! - A part without a declared charset is read as UTF-8, but the field
//!   does not report a charset
//! - Parts are classified by their header only; an untyped part is text,
//!   an unrecognised type is kept as raw bytes

use std::convert::Infallible;

use axum::http::header::CONTENT_TYPE;
use bytes::Bytes;
use futures_util::future::BoxFuture;
use futures_util::stream;
use multer::Multipart;
use thiserror::Error;

use super::charset::decode_text;
use super::kind::{header_param, media_type, ContentKind};
use super::xml::{xml_to_json, XmlError};
use super::{MultipartField, Payload, CHARSET_DEFAULT};
use crate::error::GatewayError;

#[derive(Debug, Error)]
pub enum DecodeError {
    #[error("unsupported content type")]
    Unsupported,

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("invalid xml: {0}")]
    Xml(#[from] XmlError),

    #[error("invalid multipart body: {0}")]
    Multipart(#[from] multer::Error),
}

impl From<DecodeError> for GatewayError {
    fn from(err: DecodeError) -> Self {
        match err {
            DecodeError::Unsupported => GatewayError::UnsupportedContent,
            other => GatewayError::MalformedContent(other.to_string()),
        }
    }
}

/// Decode a request body of `kind`.
///
/// `content_type` is the raw header value; multipart needs its boundary.
pub async fn decode(
    kind: ContentKind,
    content_type: Option<&str>,
    body: Bytes,
    charset: &str,
) -> Result<Payload, DecodeError> {
    match kind {
        ContentKind::Multipart => {
            let boundary = multer::parse_boundary(content_type.unwrap_or_default())?;
            decode_multipart(boundary, body).await
        }
        other => decode_simple(other, &body, charset),
    }
}

fn decode_simple(kind: ContentKind, body: &[u8], charset: &str) -> Result<Payload, DecodeError> {
    match kind {
        ContentKind::Json => {
            let text = decode_text(body, charset);
            Ok(Payload::Value(serde_json::from_str(&text)?))
        }
        ContentKind::Xml => {
            let text = decode_text(body, charset);
            Ok(Payload::Value(xml_to_json(&text)?))
        }
        ContentKind::Text => Ok(Payload::from(decode_text(body, charset))),
        ContentKind::FormPost => Ok(decode_form(&decode_text(body, charset))),
        ContentKind::Binary => Ok(Payload::Bytes(Bytes::copy_from_slice(body))),
        ContentKind::Multipart | ContentKind::Other => Err(DecodeError::Unsupported),
    }
}

fn decode_form(query: &str) -> Payload {
    let fields = url::form_urlencoded::parse(query.as_bytes())
        .map(|(name, value)| MultipartField {
            name: Some(name.into_owned()),
            file_name: None,
            content_type: Some("text/plain".to_string()),
            charset: None,
            value: Payload::from(value.into_owned()),
        })
        .collect();
    Payload::Fields(fields)
}

// Boxed so nested multipart parts can recurse.
fn decode_multipart(boundary: String, body: Bytes) -> BoxFuture<'static, Result<Payload, DecodeError>> {
    Box::pin(async move {
        let stream = stream::once(async move { Ok::<Bytes, Infallible>(body) });
        let mut multipart = Multipart::new(stream, boundary);
        let mut fields = Vec::new();

        while let Some(field) = multipart.next_field().await? {
            let raw_type = field
                .headers()
                .get(CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);
            let declared_charset = raw_type.as_deref().and_then(|t| header_param(t, "charset"));
            let name = field.name().map(str::to_string);
            let file_name = field.file_name().map(str::to_string);
            let bytes = field.bytes().await?;

            let kind = match raw_type.as_deref() {
                None => ContentKind::Text,
                Some(t) => match ContentKind::from_header(Some(t)) {
                    ContentKind::Other => ContentKind::Binary,
                    kind => kind,
                },
            };
            let charset = declared_charset.as_deref().unwrap_or(CHARSET_DEFAULT);

            let value = if bytes.is_empty() {
                Payload::null()
            } else if kind == ContentKind::Multipart {
                let nested = multer::parse_boundary(raw_type.as_deref().unwrap_or_default())?;
                decode_multipart(nested, bytes).await?
            } else {
                decode_simple(kind, &bytes, charset)?
            };

            fields.push(MultipartField {
                name,
                file_name,
                content_type: raw_type.as_deref().map(|t| media_type(t).to_string()),
                charset: declared_charset,
                value,
            });
        }

        Ok(Payload::Fields(fields))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_json_body() {
        let body = Bytes::from_static(br#"{"a":1}"#);
        let payload = decode(ContentKind::Json, Some("application/json"), body, "UTF-8").await.unwrap();
        assert_eq!(payload, Payload::from(json!({"a": 1})));
    }

    #[tokio::test]
    async fn test_xml_body_matches_json() {
        let xml = Bytes::from_static(b"<r><a>1</a></r>");
        let json = Bytes::from_static(br#"{"r":{"a":1}}"#);
        let from_xml = decode(ContentKind::Xml, None, xml, "UTF-8").await.unwrap();
        let from_json = decode(ContentKind::Json, None, json, "UTF-8").await.unwrap();
        assert_eq!(from_xml, from_json);
    }

    #[tokio::test]
    async fn test_malformed_json() {
        let err = decode(ContentKind::Json, None, Bytes::from_static(b"{nope"), "UTF-8").await.unwrap_err();
        assert!(matches!(GatewayError::from(err), GatewayError::MalformedContent(_)));
    }

    #[tokio::test]
    async fn test_other_is_unsupported() {
        let err = decode(ContentKind::Other, None, Bytes::from_static(b"x"), "UTF-8").await.unwrap_err();
        assert!(matches!(GatewayError::from(err), GatewayError::UnsupportedContent));
    }

    #[tokio::test]
    async fn test_form_post_keeps_order() {
        let body = Bytes::from_static(b"b=2&a=hello+world&b=3");
        let payload = decode(ContentKind::FormPost, None, body, "UTF-8").await.unwrap();
        assert_eq!(
            payload.to_json(),
            json!([
                {"name": "b", "contentType": "text/plain", "value": "2"},
                {"name": "a", "contentType": "text/plain", "value": "hello world"},
                {"name": "b", "contentType": "text/plain", "value": "3"},
            ])
        );
    }

    #[tokio::test]
    async fn test_multipart_parts() {
        let body = concat!(
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"meta\"\r\n",
            "Content-Type: application/json; charset=ISO-8859-1\r\n",
            "\r\n",
            "{\"k\":true}\r\n",
            "--XyZ\r\n",
            "Content-Disposition: form-data; name=\"myFile\"; filename=\"SomeRandomFile.txt\"\r\n",
            "\r\n",
            "plain text\r\n",
            "--XyZ--\r\n",
        );
        let payload = decode(
            ContentKind::Multipart,
            Some("multipart/form-data; boundary=XyZ"),
            Bytes::from(body),
            "UTF-8",
        )
        .await
        .unwrap();

        let Payload::Fields(fields) = payload else {
            panic!("expected fields");
        };
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].name.as_deref(), Some("meta"));
        assert_eq!(fields[0].content_type.as_deref(), Some("application/json"));
        assert_eq!(fields[0].charset.as_deref(), Some("ISO-8859-1"));
        assert_eq!(fields[0].value, Payload::from(json!({"k": true})));

        assert_eq!(fields[1].file_name.as_deref(), Some("SomeRandomFile.txt"));
        assert_eq!(fields[1].content_type, None);
        assert_eq!(fields[1].charset, None);
        assert_eq!(fields[1].value, Payload::from("plain text"));
    }
}
