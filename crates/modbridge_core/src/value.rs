//! Tagged value model for data crossing the script/native boundary.
//!
//! # Responsibility
//! - Represent loosely-typed script values as one closed sum type.
//! - Keep the JSON mapping untagged so envelopes read like plain script data.
//!
//! # Invariants
//! - Map keys are unique and iterate in sorted order.
//! - Integral JSON numbers that fit `i64` decode as `Int`, everything else as `Float`.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Constants exported by one module, keyed by constant name.
pub type ConstantsMap = BTreeMap<String, BridgeValue>;

/// One value as seen by script code.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum BridgeValue {
    #[default]
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    String(String),
    Array(Vec<BridgeValue>),
    Map(BTreeMap<String, BridgeValue>),
}

impl BridgeValue {
    /// Stable kind label used in argument error messages.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Array(_) => "array",
            Self::Map(_) => "map",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns an integer for `Int` and for integral, in-range `Float` values.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            Self::Float(value)
                if value.fract() == 0.0 && *value >= i64::MIN as f64 && *value <= i64::MAX as f64 =>
            {
                Some(*value as i64)
            }
            _ => None,
        }
    }

    /// Returns a float for any numeric variant.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(value) => Some(*value as f64),
            Self::Float(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value.as_str()),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[BridgeValue]> {
        match self {
            Self::Array(values) => Some(values.as_slice()),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, BridgeValue>> {
        match self {
            Self::Map(entries) => Some(entries),
            _ => None,
        }
    }

    /// Serializes this value as compact JSON text.
    pub fn to_json_string(&self) -> String {
        serde_json::Value::from(self.clone()).to_string()
    }
}

impl From<bool> for BridgeValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i32> for BridgeValue {
    fn from(value: i32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<i64> for BridgeValue {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<u32> for BridgeValue {
    fn from(value: u32) -> Self {
        Self::Int(i64::from(value))
    }
}

impl From<f64> for BridgeValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for BridgeValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for BridgeValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<Vec<BridgeValue>> for BridgeValue {
    fn from(values: Vec<BridgeValue>) -> Self {
        Self::Array(values)
    }
}

impl From<BTreeMap<String, BridgeValue>> for BridgeValue {
    fn from(entries: BTreeMap<String, BridgeValue>) -> Self {
        Self::Map(entries)
    }
}

impl<T: Into<BridgeValue>> From<Option<T>> for BridgeValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Null, Into::into)
    }
}

impl From<serde_json::Value> for BridgeValue {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(flag) => Self::Bool(flag),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(int) => Self::Int(int),
                None => Self::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(text) => Self::String(text),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(entries) => Self::Map(
                entries
                    .into_iter()
                    .map(|(key, item)| (key, Self::from(item)))
                    .collect(),
            ),
        }
    }
}

impl From<BridgeValue> for serde_json::Value {
    fn from(value: BridgeValue) -> Self {
        match value {
            BridgeValue::Null => Self::Null,
            BridgeValue::Bool(flag) => Self::Bool(flag),
            BridgeValue::Int(int) => Self::from(int),
            // Why: JSON has no NaN/Infinity; non-finite floats degrade to null.
            BridgeValue::Float(float) => {
                serde_json::Number::from_f64(float).map_or(Self::Null, Self::Number)
            }
            BridgeValue::String(text) => Self::String(text),
            BridgeValue::Array(items) => Self::Array(items.into_iter().map(Self::from).collect()),
            BridgeValue::Map(entries) => Self::Object(
                entries
                    .into_iter()
                    .map(|(key, item)| (key, Self::from(item)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::BridgeValue;
    use std::collections::BTreeMap;

    #[test]
    fn decodes_json_numbers_into_int_or_float() {
        let decoded: Vec<BridgeValue> = serde_json::from_str("[1, 1.5, -3, 2.0]").unwrap();
        assert_eq!(
            decoded,
            vec![
                BridgeValue::Int(1),
                BridgeValue::Float(1.5),
                BridgeValue::Int(-3),
                BridgeValue::Float(2.0),
            ]
        );
    }

    #[test]
    fn decodes_nested_maps_and_null() {
        let decoded: BridgeValue =
            serde_json::from_str(r#"{"a": null, "b": [true, "x"]}"#).unwrap();
        let map = decoded.as_map().expect("map value");
        assert!(map["a"].is_null());
        assert_eq!(
            map["b"],
            BridgeValue::Array(vec![BridgeValue::Bool(true), BridgeValue::from("x")])
        );
    }

    #[test]
    fn numeric_accessors_coerce_only_lossless_values() {
        assert_eq!(BridgeValue::Int(3).as_f64(), Some(3.0));
        assert_eq!(BridgeValue::Float(4.0).as_i64(), Some(4));
        assert_eq!(BridgeValue::Float(4.5).as_i64(), None);
        assert_eq!(BridgeValue::from("4").as_i64(), None);
    }

    #[test]
    fn non_finite_float_encodes_as_null() {
        assert_eq!(BridgeValue::Float(f64::NAN).to_json_string(), "null");
    }

    #[test]
    fn converts_from_serde_json_value() {
        let json = serde_json::json!({"count": 2, "ratio": 0.5, "tags": ["a"]});
        let mut expected = BTreeMap::new();
        expected.insert("count".to_string(), BridgeValue::Int(2));
        expected.insert("ratio".to_string(), BridgeValue::Float(0.5));
        expected.insert(
            "tags".to_string(),
            BridgeValue::Array(vec![BridgeValue::from("a")]),
        );
        assert_eq!(BridgeValue::from(json), BridgeValue::Map(expected));
    }

    #[test]
    fn type_names_are_stable() {
        assert_eq!(BridgeValue::Null.type_name(), "null");
        assert_eq!(BridgeValue::from(Some(1)).type_name(), "int");
        assert_eq!(BridgeValue::from(None::<i64>).type_name(), "null");
    }
}
