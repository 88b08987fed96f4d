//! Response normalization.
//!
//! The platform wraps payloads as `{"result": ...}` or `{"error": ...}` and
//! nests record lists under an operation-specific key. [`extract`] unwraps
//! the envelope; [`flatten`] turns a result into a flat record sequence.

use serde_json::{Map, Value};

/// Result envelope field.
pub const RESULT_FIELD: &str = "result";

/// Error envelope field.
pub const ERROR_FIELD: &str = "error";

/// Pagination cursor field.
pub const LIMITED_BY_FIELD: &str = "LimitedBy";

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

/// Unwrap a response body.
///
/// A mapping yields its `result`, else its `error`; any other value is
/// returned as-is. Empty or missing payloads become an empty mapping.
pub fn extract(body: Value) -> Value {
    let payload = match body {
        Value::Object(mut map) => map
            .remove(RESULT_FIELD)
            .filter(is_truthy)
            .or_else(|| map.remove(ERROR_FIELD)),
        other => Some(other),
    };

    payload
        .filter(is_truthy)
        .unwrap_or_else(|| Value::Object(Map::new()))
}

/// Offset of the next page, if the result carries a pagination cursor.
pub fn cursor(result: &Value) -> Option<Value> {
    result.get(LIMITED_BY_FIELD).cloned()
}

/// Flatten a result into records keyed by `key`.
///
/// Mappings holding `key` are unwrapped, lists are yielded item by item and
/// everything else (mappings without `key`, scalars) is yielded whole.
pub fn flatten(data: Value, key: &str) -> Flatten<'_> {
    Flatten {
        key,
        pending: Some(data),
        items: Vec::new().into_iter(),
    }
}

/// Lazy iterator returned by [`flatten`].
#[derive(Debug)]
pub struct Flatten<'k> {
    key: &'k str,
    pending: Option<Value>,
    items: std::vec::IntoIter<Value>,
}

impl Iterator for Flatten<'_> {
    type Item = Value;

    fn next(&mut self) -> Option<Value> {
        if let Some(item) = self.items.next() {
            return Some(item);
        }

        let mut current = self.pending.take()?;
        loop {
            match current {
                Value::Object(mut map) if map.contains_key(self.key) => {
                    current = map.remove(self.key).unwrap_or(Value::Null);
                }
                Value::Array(list) => {
                    self.items = list.into_iter();
                    return self.items.next();
                }
                other => return Some(other),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_extract_prefers_result() {
        assert_eq!(
            extract(json!({"result": {"a": 1}, "error": {"b": 2}})),
            json!({"a": 1})
        );
        assert_eq!(
            extract(json!({"error": {"error_code": 52}})),
            json!({"error_code": 52})
        );
    }

    #[test]
    fn test_extract_empty_result_falls_back_to_error() {
        assert_eq!(
            extract(json!({"result": {}, "error": {"error_code": 1000}})),
            json!({"error_code": 1000})
        );
    }

    #[test]
    fn test_extract_raw_and_empty_values() {
        assert_eq!(extract(json!("OK")), json!("OK"));
        assert_eq!(extract(json!({"result": "OK"})), json!("OK"));
        assert_eq!(extract(json!({"something": 1})), json!({}));
        assert_eq!(extract(json!("")), json!({}));
        assert_eq!(extract(Value::Null), json!({}));
    }

    #[test]
    fn test_flatten_unwraps_key() {
        let data = json!({"KeywordBids": [{"KeywordId": 1}, {"KeywordId": 2}], "LimitedBy": 2});
        let records: Vec<Value> = flatten(data, "KeywordBids").collect();
        assert_eq!(records, vec![json!({"KeywordId": 1}), json!({"KeywordId": 2})]);
    }

    #[test]
    fn test_flatten_nested_key() {
        let data = json!({"SetResults": {"SetResults": [1, 2, 3]}});
        assert_eq!(flatten(data, "SetResults").count(), 3);
    }

    #[test]
    fn test_flatten_mapping_without_key_is_one_record() {
        let data = json!({"LimitedBy": 10000});
        let records: Vec<Value> = flatten(data.clone(), "KeywordBids").collect();
        assert_eq!(records, vec![data]);
    }

    #[test]
    fn test_flatten_scalars_and_lists() {
        assert_eq!(flatten(json!("OK"), "Ads").collect::<Vec<_>>(), vec![json!("OK")]);
        assert_eq!(flatten(json!([]), "Ads").count(), 0);
        assert_eq!(flatten(json!([[1], 2]), "Ads").collect::<Vec<_>>(), vec![json!([1]), json!(2)]);
    }

    #[test]
    fn test_cursor() {
        assert_eq!(cursor(&json!({"LimitedBy": 10000})), Some(json!(10000)));
        assert_eq!(cursor(&json!({"KeywordBids": []})), None);
        assert_eq!(cursor(&json!("OK")), None);
    }
}
