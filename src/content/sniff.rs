//! Magic-number sniffing for raw byte results.
//!
//! A closed, ordered table of byte signatures. The first eleven bytes of
//! the buffer are compared (shorter buffers are zero-padded), first match
//! wins, and `None` means "no idea".

/// Number of leading bytes considered.
const HEADER_LEN: usize = 11;

struct Signature {
    /// `None` matches any byte.
    prefix: &'static [Option<u8>],
    mime: &'static str,
}

macro_rules! sig {
    (@byte _) => { None };
    (@byte $b:expr) => { Some($b) };
    ($mime:expr => [$($b:tt),* $(,)?]) => {
        Signature { prefix: &[$(sig!(@byte $b)),*], mime: $mime }
    };
}

static SIGNATURES: &[Signature] = &[
    sig!("application/java-vm" => [0xCA, 0xFE, 0xBA, 0xBE]),
    sig!("application/msword" => [0xD0, 0xCF, 0x11, 0xE0, 0xA1, 0xB1, 0x1A, 0xE1]),
    sig!("application/pdf" => [0x25, 0x50, 0x44, 0x46, 0x2D, 0x31, 0x2E]),
    sig!("image/photoshop" => [0x38, 0x42, 0x50, 0x53, 0x00, 0x01]),
    sig!("application/postscript" => [0x25, 0x21, 0x50, 0x53]),
    sig!("audio/mp3" => [0xFF, 0xFB, 0x30]),
    sig!("audio/mp3" => [0x49, 0x44, 0x33]),
    sig!("application/x-java-serialized-object" => [0xAC, 0xED]),
    sig!("text/html" => [b'<', b'!']),
    sig!("text/html" => [b'<', b'h', b't', b'm', b'l']),
    sig!("text/html" => [b'<', b'h', b'e', b'a', b'd']),
    sig!("text/html" => [b'<', b'b', b'o', b'd', b'y']),
    sig!("text/html" => [b'<', b'H', b'T', b'M', b'L']),
    sig!("text/html" => [b'<', b'H', b'E', b'A', b'D']),
    sig!("text/html" => [b'<', b'B', b'O', b'D', b'Y']),
    sig!("application/xml" => [b'<', b'?', b'x', b'm', b'l', b' ']),
    // UTF-16 with byte order mark, big then little endian
    sig!("application/xml" => [0xFE, 0xFF, 0x00, b'<', 0x00, b'?', 0x00, b'x']),
    sig!("application/xml" => [0xFF, 0xFE, b'<', 0x00, b'?', 0x00, b'x', 0x00]),
    sig!("image/bmp" => [b'B', b'M']),
    sig!("image/tiff" => [0x49, 0x49, 0x2A, 0x00]),
    sig!("image/tiff" => [0x4D, 0x4D, 0x00, 0x2A]),
    sig!("image/gif" => [b'G', b'I', b'F', b'8']),
    sig!("image/x-bitmap" => [b'#', b'd', b'e', b'f']),
    sig!("image/x-pixmap" => [b'!', b' ', b'X', b'P', b'M', b'2']),
    sig!("image/png" => [0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]),
    sig!("image/jpeg" => [0xFF, 0xD8, 0xFF, 0xE0]),
    sig!("image/jpeg" => [0xFF, 0xD8, 0xFF, 0xE1, _, _, b'E', b'x', b'i', b'f', 0x00]),
    sig!("image/jpg" => [0xFF, 0xD8, 0xFF, 0xEE]),
    // AutoCAD: "AC1018" style version then five zero bytes
    sig!("application/acad" => [0x41, 0x43, _, _, _, _, 0x00, 0x00, 0x00, 0x00, 0x00]),
    sig!("audio/basic" => [0x2E, 0x73, 0x6E, 0x64]),
    sig!("audio/basic" => [0x64, 0x6E, 0x73, 0x2E]),
    sig!("audio/x-wav" => [b'R', b'I', b'F', b'F']),
    sig!("application/zip" => [b'P', b'K']),
];

/// Guess the MIME type of `data` from its leading bytes.
pub fn sniff(data: &[u8]) -> Option<&'static str> {
    let mut header = [0u8; HEADER_LEN];
    let n = data.len().min(HEADER_LEN);
    header[..n].copy_from_slice(&data[..n]);

    SIGNATURES
        .iter()
        .find(|sig| {
            sig.prefix
                .iter()
                .zip(header.iter())
                .all(|(expected, actual)| expected.map_or(true, |b| b == *actual))
        })
        .map(|sig| sig.mime)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canonical_signatures() {
        assert_eq!(sniff(&[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A]), Some("image/png"));
        assert_eq!(sniff(&[0x47, 0x49, 0x46, 0x38]), Some("image/gif"));
        assert_eq!(sniff(&[0x25, 0x50, 0x44, 0x46, 0x2D, 0x31, 0x2E]), Some("application/pdf"));
        assert_eq!(sniff(b"PK\x03\x04rest"), Some("application/zip"));
        assert_eq!(sniff(b"<?xml version=\"1.0\"?>"), Some("application/xml"));
        assert_eq!(sniff(b"<HTML><BODY>"), Some("text/html"));
    }

    #[test]
    fn test_nothing_matches() {
        assert_eq!(sniff(&[]), None);
        assert_eq!(sniff(&[0u8; 32]), None);
        assert_eq!(sniff(b"hello world"), None);
    }

    #[test]
    fn test_jpeg_variants() {
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE0, 0x00, 0x10]), Some("image/jpeg"));
        let exif = [0xFF, 0xD8, 0xFF, 0xE1, 0x12, 0x34, b'E', b'x', b'i', b'f', 0x00];
        assert_eq!(sniff(&exif), Some("image/jpeg"));
        // E1 without the Exif marker is not recognised
        assert_eq!(sniff(&[0xFF, 0xD8, 0xFF, 0xE1, 0x00, 0x00, b'X']), None);
    }

    #[test]
    fn test_short_buffer_is_zero_padded() {
        // "AC" followed by padding satisfies the trailing zero bytes
        assert_eq!(sniff(b"AC1018"), Some("application/acad"));
    }
}
