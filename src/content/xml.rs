//! XML ⇄ JSON value conversion.
//!
//! XML bodies are never handed to operations as documents. They are turned
//! into the same `serde_json::Value` tree a JSON body would produce, and
//! structured results are written back out by walking that tree.
//!
//! # Mapping
//! - An element becomes a key in its parent object
//! - Repeated sibling elements collapse into an array
//! - Attributes become keys next to child elements
//! - Text beside attributes or children is stored under `content`
//! - Scalar text is coerced: `true`/`false`/`null`, integers, decimals
//! - An empty element is the empty string

use quick_xml::escape::escape;
use quick_xml::events::Event;
use quick_xml::Reader;
use serde_json::{Map, Number, Value};
use thiserror::Error;

/// Key holding an element's text when it also has attributes or children.
pub const CONTENT_KEY: &str = "content";

/// Element name used for array items that have no enclosing key.
const ARRAY_TAG: &str = "array";

#[derive(Debug, Error)]
pub enum XmlError {
    #[error("{0}")]
    Parse(#[from] quick_xml::Error),

    #[error("unclosed element <{0}>")]
    Unclosed(String),
}

struct Frame {
    name: String,
    map: Map<String, Value>,
}

/// Convert an XML document into a JSON object.
pub fn xml_to_json(text: &str) -> Result<Value, XmlError> {
    let mut reader = Reader::from_str(text);
    reader.config_mut().trim_text(true);

    let mut stack = vec![Frame { name: String::new(), map: Map::new() }];

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let mut frame = Frame {
                    name: String::from_utf8_lossy(e.name().as_ref()).into_owned(),
                    map: Map::new(),
                };
                read_attributes(&e, &mut frame.map)?;
                stack.push(frame);
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).into_owned();
                let mut map = Map::new();
                read_attributes(&e, &mut map)?;
                if let Some(parent) = stack.last_mut() {
                    accumulate(&mut parent.map, name, element_value(map));
                }
            }
            Event::Text(t) => {
                let text = t.unescape().map_err(quick_xml::Error::from)?;
                if let Some(frame) = stack.last_mut() {
                    accumulate(&mut frame.map, CONTENT_KEY.to_string(), coerce(&text));
                }
            }
            Event::CData(c) => {
                let text = String::from_utf8_lossy(&c.into_inner()).into_owned();
                if let Some(frame) = stack.last_mut() {
                    accumulate(&mut frame.map, CONTENT_KEY.to_string(), Value::String(text));
                }
            }
            Event::End(_) => {
                if stack.len() > 1 {
                    if let Some(frame) = stack.pop() {
                        if let Some(parent) = stack.last_mut() {
                            accumulate(&mut parent.map, frame.name, element_value(frame.map));
                        }
                    }
                }
            }
            Event::Eof => break,
            // declarations, comments, processing instructions, doctype
            _ => {}
        }
    }

    if stack.len() > 1 {
        let name = stack.pop().map(|f| f.name).unwrap_or_default();
        return Err(XmlError::Unclosed(name));
    }

    let mut root = stack.pop().map(|f| f.map).unwrap_or_default();
    // stray top-level text is not part of any element
    root.remove(CONTENT_KEY);
    Ok(Value::Object(root))
}

fn read_attributes(
    e: &quick_xml::events::BytesStart<'_>,
    map: &mut Map<String, Value>,
) -> Result<(), XmlError> {
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value().map_err(quick_xml::Error::from)?;
        accumulate(map, key, coerce(&value));
    }
    Ok(())
}

fn element_value(mut map: Map<String, Value>) -> Value {
    if map.is_empty() {
        return Value::String(String::new());
    }
    if map.len() == 1 {
        if let Some(content) = map.remove(CONTENT_KEY) {
            return content;
        }
    }
    Value::Object(map)
}

fn accumulate(map: &mut Map<String, Value>, key: String, value: Value) {
    match map.get_mut(&key) {
        None => {
            map.insert(key, value);
        }
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
    }
}

/// Guess the scalar type of element text.
fn coerce(text: &str) -> Value {
    if text.eq_ignore_ascii_case("true") {
        return Value::Bool(true);
    }
    if text.eq_ignore_ascii_case("false") {
        return Value::Bool(false);
    }
    if text.eq_ignore_ascii_case("null") {
        return Value::Null;
    }
    if looks_numeric(text) {
        if let Ok(n) = text.parse::<i64>() {
            return Value::Number(n.into());
        }
        if let Some(n) = text.parse::<f64>().ok().and_then(Number::from_f64) {
            return Value::Number(n);
        }
    }
    Value::String(text.to_string())
}

/// Leading digit or minus, and no leading zeros that would be lost.
fn looks_numeric(text: &str) -> bool {
    let digits = text.strip_prefix('-').unwrap_or(text);
    let Some(first) = digits.chars().next() else {
        return false;
    };
    if !first.is_ascii_digit() {
        return false;
    }
    !(first == '0' && digits.len() > 1 && digits.as_bytes()[1].is_ascii_digit())
}

/// Convert a JSON value into an XML fragment.
///
/// Objects write one element per key; a top-level array is written as
/// repeated `<array>` elements.
pub fn json_to_xml(value: &Value) -> String {
    let mut out = String::new();
    write_value(&mut out, value, None);
    out
}

fn write_value(out: &mut String, value: &Value, tag: Option<&str>) {
    match value {
        Value::Object(map) => {
            if let Some(tag) = tag {
                out.push('<');
                out.push_str(tag);
                out.push('>');
            }
            write_object_body(out, map);
            if let Some(tag) = tag {
                out.push_str("</");
                out.push_str(tag);
                out.push('>');
            }
        }
        Value::Array(items) => {
            let tag = tag.unwrap_or(ARRAY_TAG);
            for item in items {
                write_value(out, item, Some(tag));
            }
        }
        scalar => {
            let text = scalar_text(scalar);
            let text = escape(text.as_str());
            match tag {
                None => {
                    out.push('"');
                    out.push_str(&text);
                    out.push('"');
                }
                Some(tag) if text.is_empty() => {
                    out.push('<');
                    out.push_str(tag);
                    out.push_str("/>");
                }
                Some(tag) => {
                    out.push('<');
                    out.push_str(tag);
                    out.push('>');
                    out.push_str(&text);
                    out.push_str("</");
                    out.push_str(tag);
                    out.push('>');
                }
            }
        }
    }
}

fn write_object_body(out: &mut String, map: &Map<String, Value>) {
    for (key, value) in map {
        if key == CONTENT_KEY {
            match value {
                Value::Array(items) => {
                    let joined: Vec<String> = items.iter().map(scalar_text).collect();
                    out.push_str(&escape(joined.join("\n").as_str()));
                }
                other => out.push_str(&escape(scalar_text(other).as_str())),
            }
            continue;
        }
        match value {
            Value::Array(items) => {
                for item in items {
                    if let Value::Array(_) = item {
                        out.push('<');
                        out.push_str(key);
                        out.push('>');
                        write_value(out, item, None);
                        out.push_str("</");
                        out.push_str(key);
                        out.push('>');
                    } else {
                        write_value(out, item, Some(key));
                    }
                }
            }
            Value::String(s) if s.is_empty() => {
                out.push('<');
                out.push_str(key);
                out.push_str("/>");
            }
            other => write_value(out, other, Some(key)),
        }
    }
}

fn scalar_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}
