//! Attribute value classification
//!
//! Profile attributes arrive in several physical shapes: native lists,
//! strings that hold a JSON-encoded list, comma-delimited strings, and
//! plain scalars. Classification happens at evaluation time; nothing about
//! the shape is stored.

use serde_json::Value;

/// Comparison-ready shape of a profile attribute
#[derive(Debug, Clone, PartialEq)]
pub enum ValueShape {
    /// A native list, or a string that decoded to a JSON list
    List(Vec<Value>),
    /// A plain string treated as a comma-delimited scalar list
    Delimited(String),
    /// Anything else, carried as its string form
    Scalar(String),
}

/// Classify a raw attribute value for comparison.
///
/// Strings are probed as JSON first; a parse failure is the normal signal
/// that the value is a delimited list, not an error. Strings that parse to
/// non-list JSON (a bare number, an object) are treated as delimited too.
pub fn classify(value: &Value) -> ValueShape {
    match value {
        Value::Array(items) => ValueShape::List(items.clone()),
        Value::String(raw) => match serde_json::from_str::<Value>(raw) {
            Ok(Value::Array(items)) => ValueShape::List(items),
            _ => ValueShape::Delimited(raw.clone()),
        },
        other => ValueShape::Scalar(display_string(other)),
    }
}

/// String form of an attribute value, used for equality comparisons.
/// Strings compare verbatim; lists join their elements with commas.
pub fn display_string(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        Value::Number(number) => number.to_string(),
        Value::Bool(flag) => flag.to_string(),
        Value::Null => "null".to_string(),
        Value::Array(items) => items
            .iter()
            .map(display_string)
            .collect::<Vec<_>>()
            .join(","),
        Value::Object(_) => value.to_string(),
    }
}

/// Decode the HTML entities that rich authoring fields leave in rule values
/// (named forms plus `&#NN;` / `&#xNN;` numeric references). Unknown
/// entities pass through unchanged.
pub(crate) fn decode_html_entities(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut rest = raw;

    while let Some(start) = rest.find('&') {
        out.push_str(&rest[..start]);
        let tail = &rest[start..];
        match tail.find(';') {
            Some(end) => match decode_entity(&tail[1..end]) {
                Some(decoded) => {
                    out.push(decoded);
                    rest = &tail[end + 1..];
                }
                None => {
                    out.push('&');
                    rest = &tail[1..];
                }
            },
            None => {
                out.push_str(tail);
                return out;
            }
        }
    }

    out.push_str(rest);
    out
}

fn decode_entity(entity: &str) -> Option<char> {
    match entity {
        "amp" => Some('&'),
        "lt" => Some('<'),
        "gt" => Some('>'),
        "quot" => Some('"'),
        "apos" => Some('\''),
        "nbsp" => Some(' '),
        _ => {
            let code = if let Some(hex) = entity.strip_prefix("#x").or_else(|| entity.strip_prefix("#X")) {
                u32::from_str_radix(hex, 16).ok()?
            } else {
                entity.strip_prefix('#')?.parse().ok()?
            };
            char::from_u32(code)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_classify_native_list() {
        assert_eq!(
            classify(&json!([1, 2, 3])),
            ValueShape::List(vec![json!(1), json!(2), json!(3)])
        );
    }

    #[test]
    fn test_classify_json_encoded_list() {
        assert_eq!(
            classify(&json!("[\"a\", \"b\"]")),
            ValueShape::List(vec![json!("a"), json!("b")])
        );
    }

    #[test]
    fn test_classify_plain_string_is_delimited() {
        assert_eq!(
            classify(&json!("a, b, c")),
            ValueShape::Delimited("a, b, c".to_string())
        );
    }

    #[test]
    fn test_classify_json_scalar_string_is_delimited() {
        // "42" parses as JSON, but not as a list
        assert_eq!(classify(&json!("42")), ValueShape::Delimited("42".to_string()));
    }

    #[test]
    fn test_classify_scalar() {
        assert_eq!(classify(&json!(42)), ValueShape::Scalar("42".to_string()));
        assert_eq!(classify(&json!(true)), ValueShape::Scalar("true".to_string()));
    }

    #[test]
    fn test_display_string_forms() {
        assert_eq!(display_string(&json!("text")), "text");
        assert_eq!(display_string(&json!(7)), "7");
        assert_eq!(display_string(&json!(false)), "false");
        assert_eq!(display_string(&json!([1, "two", 3])), "1,two,3");
        assert_eq!(display_string(&json!(null)), "null");
    }

    #[test]
    fn test_decode_named_entities() {
        assert_eq!(decode_html_entities("a &amp; b"), "a & b");
        assert_eq!(decode_html_entities("&lt;tag&gt;"), "<tag>");
        assert_eq!(decode_html_entities("&quot;x&quot;"), "\"x\"");
    }

    #[test]
    fn test_decode_numeric_entities() {
        assert_eq!(decode_html_entities("&#39;quoted&#39;"), "'quoted'");
        assert_eq!(decode_html_entities("&#x27;hex&#x27;"), "'hex'");
    }

    #[test]
    fn test_unknown_entities_pass_through() {
        assert_eq!(decode_html_entities("&unknown;"), "&unknown;");
        assert_eq!(decode_html_entities("a & b"), "a & b");
        assert_eq!(decode_html_entities("trailing &"), "trailing &");
    }
}
