//! Scalar value model
//!
//! [`Value`] is the closed set of scalars a result cell or a bound parameter
//! can hold. The engine driver maps its native types onto these variants; the
//! JSON layer maps them onto JSON scalars.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt::{self, Write};

/// A single scalar cell or parameter value
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    /// SQL NULL, never conflated with `""` or `0`
    Null,

    /// Any integer type the engine reports
    Integer(i64),

    /// Any floating point type the engine reports
    Float(f64),

    /// Character data
    Text(String),

    Boolean(bool),

    /// Raw bytes (serialized as `\x`-prefixed hex, like PostgreSQL's bytea output)
    Binary(Vec<u8>),

    /// Any other engine type, carried as its text rendering
    /// (numerics, timestamps, UUIDs, JSON documents, enums, ...)
    Other(String),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Short name of the variant, used in logs
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Integer(_) => "integer",
            Value::Float(_) => "float",
            Value::Text(_) => "text",
            Value::Boolean(_) => "boolean",
            Value::Binary(_) => "binary",
            Value::Other(_) => "other",
        }
    }
}

/// PostgreSQL's spelling of a non-finite float, `None` for finite values
fn non_finite_name(value: f64) -> Option<&'static str> {
    if value.is_nan() {
        Some("NaN")
    } else if value.is_infinite() {
        Some(if value > 0.0 { "Infinity" } else { "-Infinity" })
    } else {
        None
    }
}

fn hex_encode(bytes: &[u8]) -> String {
    let mut output = String::with_capacity(2 + bytes.len() * 2);
    output.push_str("\\x");
    for byte in bytes {
        // Writing to a String cannot fail
        let _ = write!(output, "{:02x}", byte);
    }
    output
}

impl fmt::Display for Value {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => write!(formatter, "NULL"),
            Value::Integer(value) => write!(formatter, "{}", value),
            Value::Float(value) => match non_finite_name(*value) {
                Some(name) => write!(formatter, "{}", name),
                None => write!(formatter, "{}", value),
            },
            Value::Text(value) | Value::Other(value) => write!(formatter, "{}", value),
            Value::Boolean(value) => write!(formatter, "{}", value),
            Value::Binary(bytes) => write!(formatter, "{}", hex_encode(bytes)),
        }
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Boolean(value),
            serde_json::Value::Number(number) => {
                if let Some(integer) = number.as_i64() {
                    Value::Integer(integer)
                } else if number.is_f64() {
                    number.as_f64().map(Value::Float).unwrap_or(Value::Null)
                } else {
                    // u64 beyond i64::MAX
                    Value::Other(number.to_string())
                }
            }
            serde_json::Value::String(text) => Value::Text(text),
            composite @ (serde_json::Value::Array(_) | serde_json::Value::Object(_)) => {
                Value::Other(composite.to_string())
            }
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::Text(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::Text(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Value::Integer(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Boolean(value)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl Serialize for Value {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Value::Null => serializer.serialize_none(),
            Value::Integer(value) => serializer.serialize_i64(*value),
            // JSON has no non-finite numbers
            Value::Float(value) => match non_finite_name(*value) {
                Some(name) => serializer.serialize_str(name),
                None => serializer.serialize_f64(*value),
            },
            Value::Text(value) | Value::Other(value) => serializer.serialize_str(value),
            Value::Boolean(value) => serializer.serialize_bool(*value),
            Value::Binary(bytes) => serializer.serialize_str(&hex_encode(bytes)),
        }
    }
}

impl<'de> Deserialize<'de> for Value {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        serde_json::Value::deserialize(deserializer).map(Value::from)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_null_is_distinct_from_empty_and_zero() {
        assert_eq!(serde_json::to_value(Value::Null).unwrap(), json!(null));
        assert_eq!(serde_json::to_value(Value::Text(String::new())).unwrap(), json!(""));
        assert_eq!(serde_json::to_value(Value::Integer(0)).unwrap(), json!(0));
        assert_ne!(Value::Null, Value::Text(String::new()));
    }

    #[test]
    fn test_serialize_scalars() {
        let row = vec![
            Value::Integer(42),
            Value::Float(1.5),
            Value::Text("hello".into()),
            Value::Boolean(true),
            Value::Binary(vec![0xde, 0xad, 0x01]),
            Value::Other("2024-01-02T03:04:05".into()),
        ];
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!([42, 1.5, "hello", true, "\\xdead01", "2024-01-02T03:04:05"])
        );
    }

    #[test]
    fn test_deserialize_from_json() {
        let values: Vec<Value> =
            serde_json::from_str(r#"[null, 7, -3, 2.25, "x", false, [1, 2], {"a": 1}]"#).unwrap();
        assert_eq!(
            values,
            vec![
                Value::Null,
                Value::Integer(7),
                Value::Integer(-3),
                Value::Float(2.25),
                Value::Text("x".into()),
                Value::Boolean(false),
                Value::Other("[1,2]".into()),
                Value::Other("{\"a\":1}".into()),
            ]
        );
    }

    #[test]
    fn test_large_unsigned_becomes_other() {
        let value: Value = serde_json::from_str("18446744073709551615").unwrap();
        assert_eq!(value, Value::Other("18446744073709551615".into()));
    }

    #[test]
    fn test_display() {
        assert_eq!(Value::Null.to_string(), "NULL");
        assert_eq!(Value::from("john").to_string(), "john");
        assert_eq!(Value::from(Some(3_i64)).to_string(), "3");
        assert_eq!(Value::from(None::<i64>), Value::Null);
    }

    #[test]
    fn test_non_finite_floats_are_not_null() {
        let row = vec![
            Value::Float(f64::NAN),
            Value::Float(f64::INFINITY),
            Value::Float(f64::NEG_INFINITY),
            Value::Null,
        ];
        assert_eq!(
            serde_json::to_value(&row).unwrap(),
            json!(["NaN", "Infinity", "-Infinity", null])
        );
        assert_eq!(Value::Float(f64::NEG_INFINITY).to_string(), "-Infinity");
        assert_eq!(Value::Float(2.5).to_string(), "2.5");
    }
}
