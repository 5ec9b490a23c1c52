//! Charset transcoding for text bodies.
//!
//! Only the charsets a browser realistically sends are handled natively.
//! Anything else is treated as UTF-8 and logged.

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Charset {
    Utf8,
    Latin1,
    Ascii,
}

impl Charset {
    fn name(self) -> &'static str {
        match self {
            Charset::Utf8 => "UTF-8",
            Charset::Latin1 => "ISO-8859-1",
            Charset::Ascii => "US-ASCII",
        }
    }
}

fn lookup(name: &str) -> Charset {
    match name.trim().to_ascii_lowercase().as_str() {
        "utf-8" | "utf8" => Charset::Utf8,
        "iso-8859-1" | "iso8859-1" | "latin1" | "latin-1" | "l1" => Charset::Latin1,
        "us-ascii" | "ascii" => Charset::Ascii,
        other => {
            warn!(charset = %other, "Unsupported charset, using UTF-8");
            Charset::Utf8
        }
    }
}

/// Canonical name of the charset text is actually written in for `name`.
pub fn canonical_name(name: &str) -> &'static str {
    lookup(name).name()
}

/// Decode `bytes` as text in `charset`. Invalid sequences are replaced.
pub fn decode_text(bytes: &[u8], charset: &str) -> String {
    match lookup(charset) {
        Charset::Utf8 => {
            let bytes = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]).unwrap_or(bytes);
            String::from_utf8_lossy(bytes).into_owned()
        }
        Charset::Latin1 => bytes.iter().map(|&b| b as char).collect(),
        Charset::Ascii => bytes
            .iter()
            .map(|&b| if b.is_ascii() { b as char } else { char::REPLACEMENT_CHARACTER })
            .collect(),
    }
}

/// Encode `text` in `charset`. Unmappable characters become `?`.
pub fn encode_text(text: &str, charset: &str) -> Vec<u8> {
    match lookup(charset) {
        Charset::Utf8 => text.as_bytes().to_vec(),
        Charset::Latin1 => text
            .chars()
            .map(|c| u8::try_from(u32::from(c)).unwrap_or(b'?'))
            .collect(),
        Charset::Ascii => text
            .chars()
            .map(|c| if c.is_ascii() { c as u8 } else { b'?' })
            .collect(),
    }
}
