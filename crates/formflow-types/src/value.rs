use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Raw submission data: field name → submitted value
pub type SubmissionData = HashMap<String, FieldValue>;

/// A value bound to a field name while a submission is evaluated.
///
/// Values travel as plain JSON (`"abc"`, `12`, `1.5`, `true`, `[...]`, `{...}`, `null`);
/// the serde representation goes through `serde_json::Value` so submissions can be
/// deserialized straight from request bodies and outcomes written back unchanged.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(into = "serde_json::Value", from = "serde_json::Value")]
pub enum FieldValue {
    /// UTF-8 text
    String(String),
    /// Whole number
    Integer(i64),
    /// Floating point number
    Float(f64),
    /// Boolean flag
    Boolean(bool),
    /// Ordered list, e.g. the selections of a `multiselect` field
    Array(Vec<FieldValue>),
    /// Nested object
    Object(HashMap<String, FieldValue>),
    /// Explicit `null`
    Null,
}

impl FieldValue {
    /// Numeric view of the value. Only `Integer` and `Float` qualify.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            FieldValue::Integer(i) => Some(*i as f64),
            FieldValue::Float(f) => Some(*f),
            _ => None,
        }
    }

    /// String view of the value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            FieldValue::String(s) => Some(s),
            _ => None,
        }
    }

    /// List view of the value
    pub fn as_array(&self) -> Option<&[FieldValue]> {
        match self {
            FieldValue::Array(items) => Some(items),
            _ => None,
        }
    }

    /// True for `Integer` and `Float`
    pub fn is_numeric(&self) -> bool {
        matches!(self, FieldValue::Integer(_) | FieldValue::Float(_))
    }

    /// True for `Null`
    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    /// Blank values fail a `required` check: `null` and the empty string.
    pub fn is_blank(&self) -> bool {
        match self {
            FieldValue::Null => true,
            FieldValue::String(s) => s.is_empty(),
            _ => false,
        }
    }

    /// Natural truthiness: `false`, zero, `""`, empty collections and `null` are falsy.
    pub fn is_truthy(&self) -> bool {
        match self {
            FieldValue::Boolean(b) => *b,
            FieldValue::Integer(i) => *i != 0,
            FieldValue::Float(f) => *f != 0.0,
            FieldValue::String(s) => !s.is_empty(),
            FieldValue::Array(items) => !items.is_empty(),
            FieldValue::Object(map) => !map.is_empty(),
            FieldValue::Null => false,
        }
    }

    /// Short type name used in diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            FieldValue::String(_) => "string",
            FieldValue::Integer(_) => "integer",
            FieldValue::Float(_) => "float",
            FieldValue::Boolean(_) => "boolean",
            FieldValue::Array(_) => "list",
            FieldValue::Object(_) => "object",
            FieldValue::Null => "null",
        }
    }
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", serde_json::Value::from(self))
    }
}

impl From<FieldValue> for serde_json::Value {
    fn from(value: FieldValue) -> Self {
        match value {
            FieldValue::String(s) => serde_json::Value::String(s),
            FieldValue::Integer(i) => serde_json::Value::Number(serde_json::Number::from(i)),
            FieldValue::Float(f) => serde_json::Number::from_f64(f)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            FieldValue::Boolean(b) => serde_json::Value::Bool(b),
            FieldValue::Array(items) => {
                serde_json::Value::Array(items.into_iter().map(Into::into).collect())
            }
            FieldValue::Object(map) => serde_json::Value::Object(
                map.into_iter().map(|(k, v)| (k, v.into())).collect(),
            ),
            FieldValue::Null => serde_json::Value::Null,
        }
    }
}

impl From<&FieldValue> for serde_json::Value {
    fn from(value: &FieldValue) -> Self {
        value.clone().into()
    }
}

impl From<serde_json::Value> for FieldValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) => FieldValue::String(s),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => FieldValue::Integer(i),
                None => n.as_f64().map_or(FieldValue::Null, FieldValue::Float),
            },
            serde_json::Value::Bool(b) => FieldValue::Boolean(b),
            serde_json::Value::Array(items) => {
                FieldValue::Array(items.into_iter().map(FieldValue::from).collect())
            }
            serde_json::Value::Object(map) => FieldValue::Object(
                map.into_iter().map(|(k, v)| (k, FieldValue::from(v))).collect(),
            ),
            serde_json::Value::Null => FieldValue::Null,
        }
    }
}

impl From<&str> for FieldValue {
    fn from(value: &str) -> Self {
        FieldValue::String(value.to_string())
    }
}

impl From<String> for FieldValue {
    fn from(value: String) -> Self {
        FieldValue::String(value)
    }
}

impl From<i64> for FieldValue {
    fn from(value: i64) -> Self {
        FieldValue::Integer(value)
    }
}

impl From<f64> for FieldValue {
    fn from(value: f64) -> Self {
        FieldValue::Float(value)
    }
}

impl From<bool> for FieldValue {
    fn from(value: bool) -> Self {
        FieldValue::Boolean(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_json_round_trip_keeps_plain_shape() {
        let raw = r#"{"income":"50000","age":42,"ratio":0.5,"tags":["a","b"],"ok":true,"none":null}"#;
        let data: SubmissionData = serde_json::from_str(raw).unwrap();

        assert_eq!(data["income"], FieldValue::String("50000".to_string()));
        assert_eq!(data["age"], FieldValue::Integer(42));
        assert_eq!(data["ratio"], FieldValue::Float(0.5));
        assert_eq!(
            data["tags"],
            FieldValue::Array(vec![FieldValue::from("a"), FieldValue::from("b")])
        );
        assert_eq!(data["ok"], FieldValue::Boolean(true));
        assert_eq!(data["none"], FieldValue::Null);

        let back = serde_json::to_value(&data["tags"]).unwrap();
        assert_eq!(back, serde_json::json!(["a", "b"]));
    }

    #[test]
    fn test_non_finite_float_serializes_as_null() {
        let json: serde_json::Value = FieldValue::Float(f64::NAN).into();
        assert_eq!(json, serde_json::Value::Null);
    }

    #[test]
    fn test_truthiness() {
        assert!(!FieldValue::Integer(0).is_truthy());
        assert!(!FieldValue::Float(0.0).is_truthy());
        assert!(!FieldValue::String(String::new()).is_truthy());
        assert!(!FieldValue::Array(vec![]).is_truthy());
        assert!(!FieldValue::Null.is_truthy());
        assert!(FieldValue::String("0".to_string()).is_truthy());
        assert!(FieldValue::Float(-0.5).is_truthy());
    }

    #[test]
    fn test_blank_values() {
        assert!(FieldValue::Null.is_blank());
        assert!(FieldValue::from("").is_blank());
        assert!(!FieldValue::from(" ").is_blank());
        assert!(!FieldValue::Integer(0).is_blank());
        assert!(!FieldValue::Array(vec![]).is_blank());
    }
}
