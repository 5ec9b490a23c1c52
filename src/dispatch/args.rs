//! Argument list for an invoked operation.
//!
//! Order: the decoded body (if any), the positional path segments, then a
//! map of query parameters. The map slot is only added when there is a
//! query or the authentication hook handed back a value; the hook's value
//! lands in the map under [`AUTHENTICATE_KEY`].

use serde_json::{Map, Value};

use crate::content::Payload;

/// Query-map key carrying the authentication hook's result.
pub const AUTHENTICATE_KEY: &str = "ws_authenticate";

/// Query parameters as name → list of values, in first-seen order.
pub fn query_map(query: &str) -> Map<String, Value> {
    let mut map = Map::new();
    for (name, value) in url::form_urlencoded::parse(query.as_bytes()) {
        let slot = map.entry(name.into_owned()).or_insert_with(|| Value::Array(Vec::new()));
        if let Value::Array(values) = slot {
            values.push(Value::String(value.into_owned()));
        }
    }
    map
}

/// First non-empty value of a query parameter.
pub fn query_param(query: Option<&str>, key: &str) -> Option<String> {
    url::form_urlencoded::parse(query?.as_bytes())
        .find(|(name, _)| name == key)
        .map(|(_, value)| value.into_owned())
        .filter(|value| !value.is_empty())
}

pub fn build_args(
    body: Option<Payload>,
    positional: &[String],
    query: Option<&str>,
    auth_extra: Option<Payload>,
) -> Vec<Payload> {
    let mut args = Vec::with_capacity(positional.len() + 2);
    args.extend(body);
    args.extend(positional.iter().map(|segment| Payload::from(segment.as_str())));

    let query = query.filter(|q| !q.is_empty());
    if query.is_some() || auth_extra.is_some() {
        let mut map = query.map(query_map).unwrap_or_default();
        if let Some(extra) = auth_extra {
            map.insert(AUTHENTICATE_KEY.to_string(), Value::Array(vec![extra.to_json()]));
        }
        args.push(Payload::Value(Value::Object(map)));
    }
    args
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_positional_only() {
        let args = build_args(None, &["7".into(), "lines".into()], None, None);
        assert_eq!(args, vec![Payload::from("7"), Payload::from("lines")]);
    }

    #[test]
    fn test_body_first_then_query() {
        let body = Payload::from(json!({"a": 1}));
        let args = build_args(Some(body.clone()), &["7".into()], Some("q=x&q=y&limit=5"), None);
        assert_eq!(args.len(), 3);
        assert_eq!(args[0], body);
        assert_eq!(args[1], Payload::from("7"));
        assert_eq!(args[2].to_json(), json!({"q": ["x", "y"], "limit": ["5"]}));
    }

    #[test]
    fn test_auth_extra_without_query() {
        let args = build_args(None, &[], None, Some(Payload::from(json!({"uid": 9}))));
        assert_eq!(args, vec![Payload::from(json!({"ws_authenticate": [{"uid": 9}]}))]);
    }

    #[test]
    fn test_empty_query_adds_no_slot() {
        assert!(build_args(None, &[], Some(""), None).is_empty());
    }

    #[test]
    fn test_query_param() {
        assert_eq!(query_param(Some("callback=cb&x=1"), "callback").as_deref(), Some("cb"));
        assert_eq!(query_param(Some("callback="), "callback"), None);
        assert_eq!(query_param(None, "callback"), None);
        assert_eq!(query_param(Some("a=b%20c"), "a").as_deref(), Some("b c"));
    }
}
