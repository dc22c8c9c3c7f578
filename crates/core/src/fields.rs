//! Wire-field helpers: empty-value stripping and query-string encoding.

use serde_json::Value;
use url::form_urlencoded;

use crate::types::Fields;

/// `null` and `""` never reach the wire.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(s) => s.is_empty(),
        _ => false,
    }
}

/// Drop every top-level field whose value is empty.
pub fn strip_empty(mut fields: Fields) -> Fields {
    fields.retain(|_, value| !is_empty_value(value));
    fields
}

/// Text form of a field for a query string: strings verbatim, everything
/// else as its JSON text.
pub fn query_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `application/x-www-form-urlencoded` encoding of the fields, in map order.
pub fn to_query_string(fields: &Fields) -> String {
    let mut serializer = form_urlencoded::Serializer::new(String::new());
    for (key, value) in fields {
        serializer.append_pair(key, &query_text(value));
    }
    serializer.finish()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_strip_empty() {
        let fields = json!({
            "type": "click",
            "eventValue": "",
            "token": null,
            "time": 0,
            "flag": false
        });
        let stripped = strip_empty(fields.as_object().unwrap().clone());
        assert_eq!(stripped.len(), 3);
        assert!(stripped.contains_key("type"));
        assert!(stripped.contains_key("time"));
        assert!(stripped.contains_key("flag"));
        assert!(!stripped.contains_key("eventValue"));
        assert!(!stripped.contains_key("token"));
    }

    #[test]
    fn test_query_string_encoding() {
        let fields = json!({"type": "click", "pathName": "[\"a b\"]", "time": 17});
        let query = to_query_string(fields.as_object().unwrap());
        assert!(query.contains("type=click"));
        assert!(query.contains("time=17"));
        assert!(query.contains("pathName=%5B%22a+b%22%5D"));
    }
}
