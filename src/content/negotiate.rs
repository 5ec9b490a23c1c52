//! `Accept` header matching for raw byte results.

/// Whether `content_type` satisfies `pattern` (`type/subtype`, `*` allowed
/// in either component, case-insensitive).
pub fn match_content_type(pattern: &str, content_type: &str) -> bool {
    let (Some((p_type, p_sub)), Some((c_type, c_sub))) =
        (split_media(pattern), split_media(content_type))
    else {
        return false;
    };
    (p_type == "*" || p_type.eq_ignore_ascii_case(c_type))
        && (p_sub == "*" || p_sub.eq_ignore_ascii_case(c_sub))
}

/// The first entry of an `Accept` list without a wildcard component.
pub fn first_concrete(accept: &str) -> Option<&str> {
    accept_entries(accept).find(|entry| {
        split_media(entry).is_some_and(|(t, s)| t != "*" && s != "*")
    })
}

/// Whether any entry of an `Accept` list matches `content_type`.
pub fn accepts(accept: &str, content_type: &str) -> bool {
    accept_entries(accept).any(|entry| match_content_type(entry, content_type))
}

/// Media types of an `Accept` list, parameters stripped.
fn accept_entries(accept: &str) -> impl Iterator<Item = &str> {
    accept
        .split(',')
        .map(|entry| entry.trim().split(';').next().unwrap_or_default().trim())
}

fn split_media(media: &str) -> Option<(&str, &str)> {
    let (t, s) = media.split_once('/')?;
    if s.contains('/') {
        return None;
    }
    Some((t, s))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_wildcards() {
        assert!(match_content_type("*/*", "image/png"));
        assert!(match_content_type("image/*", "image/png"));
        assert!(match_content_type("IMAGE/PNG", "image/png"));
        assert!(!match_content_type("image/*", "application/pdf"));
        assert!(!match_content_type("image", "image/png"));
    }

    #[test]
    fn test_first_concrete() {
        assert_eq!(first_concrete("*/*, image/*;q=0.8, image/png"), Some("image/png"));
        assert_eq!(first_concrete("application/pdf;q=1, */*"), Some("application/pdf"));
        assert_eq!(first_concrete("*/*"), None);
    }

    #[test]
    fn test_accepts() {
        assert!(accepts("text/html, image/*", "image/gif"));
        assert!(!accepts("text/html", "image/gif"));
    }
}
