//! JSON drivers — `json_encode`, `json_decode`, plus the `Value` ↔
//! `serde_json::Value` conversion they're built on.

use super::{expect_string, field, op_error};
use blueprint_kernel::error::NodeError;
use blueprint_kernel::value::MapKey;
use blueprint_kernel::Value;

/// Converts a Blueprint `Value` into a `serde_json::Value`.
///
/// `Map` keys that are integers are stringified — JSON objects have no
/// integer-keyed representation, so this direction is lossy for that one
/// case; round-tripping through `json_decode` always yields string keys.
pub fn to_json(value: &Value) -> Result<serde_json::Value, NodeError> {
    Ok(match value {
        Value::Null => serde_json::Value::Null,
        Value::Bool(b) => serde_json::Value::Bool(*b),
        Value::Int(i) => serde_json::Value::from(*i),
        Value::Float(f) => serde_json::Number::from_f64(*f)
            .map(serde_json::Value::Number)
            .unwrap_or(serde_json::Value::Null),
        Value::String(s) => serde_json::Value::String(s.clone()),
        Value::Bytes(b) => serde_json::Value::Array(b.iter().map(|byte| serde_json::Value::from(*byte)).collect()),
        Value::List(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(to_json(item)?);
            }
            serde_json::Value::Array(out)
        }
        Value::Map(entries) => {
            let mut map = serde_json::Map::new();
            for (k, v) in entries {
                map.insert(k.to_string(), to_json(v)?);
            }
            serde_json::Value::Object(map)
        }
        Value::Struct(fields) => {
            let mut map = serde_json::Map::new();
            for (k, v) in fields {
                map.insert(k.clone(), to_json(v)?);
            }
            serde_json::Value::Object(map)
        }
        Value::Deferred(id) => {
            return Err(op_error(format!("json_encode: node {id} has an unresolved deferred value")));
        }
    })
}

/// Converts a `serde_json::Value` into a Blueprint `Value`. JSON objects
/// always decode into `Value::Map` with string keys, never `Struct` —
/// struct shape is a Blueprint-internal distinction with no JSON
/// counterpart.
pub fn from_json(value: &serde_json::Value) -> Value {
    match value {
        serde_json::Value::Null => Value::Null,
        serde_json::Value::Bool(b) => Value::Bool(*b),
        serde_json::Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Value::Int(i)
            } else {
                Value::Float(n.as_f64().unwrap_or(f64::NAN))
            }
        }
        serde_json::Value::String(s) => Value::String(s.clone()),
        serde_json::Value::Array(items) => Value::List(items.iter().map(from_json).collect()),
        serde_json::Value::Object(fields) => {
            let mut map = std::collections::BTreeMap::new();
            for (k, v) in fields {
                map.insert(MapKey::String(k.clone()), from_json(v));
            }
            Value::Map(map)
        }
    }
}

pub fn json_encode(args: Value) -> Result<Value, NodeError> {
    let value = field(&args, "value").cloned().unwrap_or(Value::Null);
    let json = to_json(&value)?;
    Ok(Value::String(json.to_string()))
}

pub fn json_decode(args: Value) -> Result<Value, NodeError> {
    let text = expect_string("json_decode", "text", field(&args, "text").unwrap_or(&Value::Null))?;
    let parsed: serde_json::Value = serde_json::from_str(&text).map_err(|e| op_error(format!("json_decode: {e}")))?;
    Ok(from_json(&parsed))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    fn struct_args(fields: Vec<(&str, Value)>) -> Value {
        let mut map = BTreeMap::new();
        for (k, v) in fields {
            map.insert(k.to_string(), v);
        }
        Value::Struct(map)
    }

    #[test]
    fn encode_then_decode_preserves_list_and_map_shape() {
        let mut fields = BTreeMap::new();
        fields.insert("a".to_string(), Value::Int(1));
        let original = Value::List(vec![Value::Struct(fields), Value::String("x".into())]);

        let encoded = json_encode(struct_args(vec![("value", original)])).unwrap();
        let Value::String(text) = &encoded else { panic!("expected string") };

        let decoded = json_decode(struct_args(vec![("text", Value::String(text.clone()))])).unwrap();
        let Value::List(items) = decoded else { panic!("expected list") };
        assert_eq!(items.len(), 2);
        assert_eq!(items[1], Value::String("x".into()));
    }

    #[test]
    fn json_decode_rejects_malformed_text() {
        let err = json_decode(struct_args(vec![("text", Value::String("{not json".into()))])).unwrap_err();
        assert!(matches!(err, NodeError::Operation(_)));
    }
}
