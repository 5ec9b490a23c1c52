//! Content kind classification.
//!
//! # Responsibilities
//! - Map a `Content-Type`/`Accept` header onto a [`ContentKind`]
//! - Fall back to sniffing the first significant byte of a body
//! - Extract `key=value` parameters from header values
//!
//! # Design Decisions
//! - Substring matching in a fixed priority order; first hit wins
//! - The Office Open XML marker is checked before "xml" (it is not XML)
//! - Deterministic: no scoring, no q-value weighting

/// Wire format of a request or response body.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ContentKind {
    Json,
    Xml,
    Binary,
    Multipart,
    Text,
    FormPost,
    /// Unclassified. Only ever produced for requests, and always rejected.
    Other,
}

const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

impl ContentKind {
    /// Classify by header substring matching.
    pub fn from_header(header: Option<&str>) -> Self {
        let Some(header) = header else {
            return ContentKind::Other;
        };
        let header = header.to_ascii_lowercase();

        if header.contains("openxml") {
            return ContentKind::Binary;
        }
        if header.contains("json") {
            return ContentKind::Json;
        }
        if header.contains("xml") {
            return ContentKind::Xml;
        }
        if header.contains("text") {
            return ContentKind::Text;
        }
        if header.contains("multipart") {
            return ContentKind::Multipart;
        }
        if media_type(&header) == FORM_URLENCODED {
            return ContentKind::FormPost;
        }
        if header.contains("octet-stream") || header.contains("application") {
            return ContentKind::Binary;
        }
        ContentKind::Other
    }

    /// `self`, or `default` when unclassified.
    pub fn or(self, default: ContentKind) -> ContentKind {
        if self == ContentKind::Other {
            default
        } else {
            self
        }
    }

    /// Media type written for structured responses of this kind.
    ///
    /// Multipart and form posts are answered as JSON.
    pub fn response_mime(self) -> Option<&'static str> {
        match self {
            ContentKind::Json | ContentKind::Multipart | ContentKind::FormPost => Some("application/json"),
            ContentKind::Xml => Some("application/xml"),
            ContentKind::Text => Some("text/plain"),
            ContentKind::Binary | ContentKind::Other => None,
        }
    }
}

/// Classify a body, sniffing its first significant byte when the header is
/// absent or unclassified.
pub fn classify(header: Option<&str>, body: Option<&[u8]>, default: ContentKind) -> ContentKind {
    let kind = ContentKind::from_header(header);
    if kind != ContentKind::Other {
        return kind;
    }
    match body {
        Some(bytes) => guess(bytes, default),
        None => default,
    }
}

/// `<` means XML, `{` means JSON, anything else is `default`.
pub fn guess(bytes: &[u8], default: ContentKind) -> ContentKind {
    let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
    match bytes.iter().find(|b| !b.is_ascii_whitespace()) {
        Some(b'<') => ContentKind::Xml,
        Some(b'{') => ContentKind::Json,
        _ => default,
    }
}

/// Read a parameter from a header value.
///
/// `Content-Disposition: form-data; name="myFile"; filename="a.txt"` with
/// key `name` yields `myFile`. Key matching is case-insensitive; one pair
/// of surrounding double quotes is removed.
pub fn header_param(header: &str, key: &str) -> Option<String> {
    header.split(';').map(str::trim_start).find_map(|element| {
        let (k, value) = element.split_once('=')?;
        if !k.eq_ignore_ascii_case(key) {
            return None;
        }
        let value = value.trim_end();
        let value = if value.len() > 1 && value.starts_with('"') && value.ends_with('"') {
            &value[1..value.len() - 1]
        } else {
            value
        };
        Some(value.to_string())
    })
}

/// The `type/subtype` part of a header value, without parameters.
pub fn media_type(header: &str) -> &str {
    header.split(';').next().unwrap_or_default().trim()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_header_priority() {
        let k = |h: &str| ContentKind::from_header(Some(h));
        assert_eq!(k("application/json;charset=UTF-8"), ContentKind::Json);
        assert_eq!(k("application/xml"), ContentKind::Xml);
        assert_eq!(k("text/xml"), ContentKind::Xml);
        assert_eq!(k("text/plain"), ContentKind::Text);
        assert_eq!(k("multipart/form-data; boundary=x"), ContentKind::Multipart);
        assert_eq!(k("application/x-www-form-urlencoded"), ContentKind::FormPost);
        assert_eq!(k("application/x-www-form-urlencoded; charset=UTF-8"), ContentKind::FormPost);
        assert_eq!(k("application/octet-stream"), ContentKind::Binary);
        assert_eq!(k("application/pdf"), ContentKind::Binary);
        assert_eq!(k("image/png"), ContentKind::Other);
        assert_eq!(k("*/*"), ContentKind::Other);
        assert_eq!(ContentKind::from_header(None), ContentKind::Other);
    }

    #[test]
    fn test_openxml_is_binary() {
        let header = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";
        assert!(header.contains("xml"));
        assert_eq!(ContentKind::from_header(Some(header)), ContentKind::Binary);
    }

    #[test]
    fn test_sniff_fallback() {
        assert_eq!(classify(None, Some(b"  <a/>"), ContentKind::Other), ContentKind::Xml);
        assert_eq!(classify(None, Some(b"\n{\"a\":1}"), ContentKind::Other), ContentKind::Json);
        assert_eq!(classify(Some("image/png"), Some(b"{}"), ContentKind::Other), ContentKind::Json);
        assert_eq!(classify(None, Some(b"plain"), ContentKind::Text), ContentKind::Text);
        assert_eq!(classify(None, None, ContentKind::Json), ContentKind::Json);
        // header wins over content
        assert_eq!(classify(Some("text/plain"), Some(b"{}"), ContentKind::Other), ContentKind::Text);
    }

    #[test]
    fn test_header_param() {
        let cd = r#"form-data; name="myFile"; filename="SomeRandomFile.txt""#;
        assert_eq!(header_param(cd, "name").as_deref(), Some("myFile"));
        assert_eq!(header_param(cd, "filename").as_deref(), Some("SomeRandomFile.txt"));
        assert_eq!(header_param("text/plain; Charset=ISO-8859-1", "charset").as_deref(), Some("ISO-8859-1"));
        assert_eq!(header_param("text/plain", "charset"), None);
        assert_eq!(header_param("text/plain;charset=\"", "charset").as_deref(), Some("\""));
    }
}
