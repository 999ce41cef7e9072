use std::{
    borrow::Cow,
    collections::BTreeMap,
    fmt::{self, Display, Formatter},
};

use itertools::Itertools;

/// A variable value as seen by filter expressions.
///
/// `Undefined` marks data that is absent for the current action, while `Null`
/// is kept for comparisons that historically treated missing data as null.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Value {
    Int(i64),
    Float(f64),
    String(String),
    Bool(bool),
    Array(Vec<Value>),
    Dict(BTreeMap<String, Value>),
    Undefined,
    #[default]
    Null,
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::String(s)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::String(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(n: i64) -> Self {
        Value::Int(n)
    }
}

impl From<i32> for Value {
    fn from(n: i32) -> Self {
        Value::Int(n.into())
    }
}

impl From<u64> for Value {
    fn from(n: u64) -> Self {
        Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<usize> for Value {
    fn from(n: usize) -> Self {
        Value::Int(i64::try_from(n).unwrap_or(i64::MAX))
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Float(n)
    }
}

impl From<Vec<Value>> for Value {
    fn from(arr: Vec<Value>) -> Self {
        Value::Array(arr)
    }
}

impl From<Vec<String>> for Value {
    fn from(arr: Vec<String>) -> Self {
        Value::Array(arr.into_iter().map(Value::String).collect())
    }
}

impl From<BTreeMap<String, Value>> for Value {
    fn from(map: BTreeMap<String, Value>) -> Self {
        Value::Dict(map)
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(b) => Value::Bool(b),
            serde_json::Value::Number(n) => match n.as_i64() {
                Some(i) => Value::Int(i),
                None => Value::Float(n.as_f64().unwrap_or_default()),
            },
            serde_json::Value::String(s) => Value::String(s),
            serde_json::Value::Array(a) => Value::Array(a.into_iter().map(Into::into).collect()),
            serde_json::Value::Object(o) => {
                Value::Dict(o.into_iter().map(|(k, v)| (k, v.into())).collect())
            }
        }
    }
}

impl From<Value> for serde_json::Value {
    fn from(value: Value) -> Self {
        value.to_native()
    }
}

impl Display for Value {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.string())
    }
}

impl Value {
    pub const NULL: Value = Self::Null;
    pub const UNDEFINED: Value = Self::Undefined;
    pub const TRUE: Value = Self::Bool(true);
    pub const FALSE: Value = Self::Bool(false);

    pub fn name(&self) -> &'static str {
        match self {
            Value::Int(_) => "int",
            Value::Float(_) => "float",
            Value::String(_) => "string",
            Value::Bool(_) => "bool",
            Value::Array(_) => "array",
            Value::Dict(_) => "dict",
            Value::Undefined => "undefined",
            Value::Null => "null",
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn is_undefined(&self) -> bool {
        matches!(self, Value::Undefined)
    }

    /// String form used by filters: booleans render as `"1"`/`""`, lists one
    /// element per line, and the absent sentinels as the empty string.
    pub fn string(&self) -> Cow<'_, str> {
        match self {
            Value::Int(n) => Cow::Owned(n.to_string()),
            Value::Float(n) => Cow::Owned(n.to_string()),
            Value::String(s) => Cow::Borrowed(s),
            Value::Bool(true) => Cow::Borrowed("1"),
            Value::Bool(false) => Cow::Borrowed(""),
            Value::Array(a) => Cow::Owned(a.iter().map(|v| v.string()).join("\n")),
            Value::Dict(d) => Cow::Owned(
                d.iter()
                    .map(|(k, v)| format!("{}: {}", k, v.string()))
                    .join("\n"),
            ),
            Value::Undefined | Value::Null => Cow::Borrowed(""),
        }
    }

    /// Integer form: strings use their leading integer prefix, lists their
    /// length, and everything unparseable becomes `0`.
    pub fn to_int(&self) -> i64 {
        match self {
            Value::Int(n) => *n,
            Value::Float(n) => *n as i64,
            Value::String(s) => leading_int(s),
            Value::Bool(b) => i64::from(*b),
            Value::Array(a) => a.len() as i64,
            Value::Dict(d) => d.len() as i64,
            Value::Undefined | Value::Null => 0,
        }
    }

    pub fn to_native(&self) -> serde_json::Value {
        match self {
            Value::Int(n) => serde_json::Value::from(*n),
            Value::Float(n) => serde_json::Number::from_f64(*n)
                .map(serde_json::Value::Number)
                .unwrap_or(serde_json::Value::Null),
            Value::String(s) => serde_json::Value::String(s.clone()),
            Value::Bool(b) => serde_json::Value::Bool(*b),
            Value::Array(a) => serde_json::Value::Array(a.iter().map(Value::to_native).collect()),
            Value::Dict(d) => serde_json::Value::Object(
                d.iter().map(|(k, v)| (k.clone(), v.to_native())).collect(),
            ),
            Value::Undefined | Value::Null => serde_json::Value::Null,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(a) => Some(a),
            _ => None,
        }
    }
}

/// Parses the leading integer of `s`, saturating at the `i64` bounds.
fn leading_int(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, s.strip_prefix('+').unwrap_or(s)),
    };

    digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .map(|b| i64::from(b - b'0'))
        .fold(0i64, |acc, digit| {
            let acc = acc.saturating_mul(10);
            if negative {
                acc.saturating_sub(digit)
            } else {
                acc.saturating_add(digit)
            }
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;
    use serde_json::json;

    #[rstest]
    #[case::int(Value::Int(42), "42")]
    #[case::float(Value::Float(1.5), "1.5")]
    #[case::bool_true(Value::TRUE, "1")]
    #[case::bool_false(Value::FALSE, "")]
    #[case::array(Value::from(vec!["a".to_string(), "b".to_string()]), "a\nb")]
    #[case::null(Value::NULL, "")]
    #[case::undefined(Value::UNDEFINED, "")]
    fn test_string(#[case] value: Value, #[case] expected: &str) {
        assert_eq!(value.string(), expected);
        assert_eq!(value.to_string(), expected);
    }

    #[rstest]
    #[case::int(Value::Int(-7), -7)]
    #[case::float(Value::Float(3.9), 3)]
    #[case::numeric_string(Value::from("12"), 12)]
    #[case::prefixed_string(Value::from("  34abc"), 34)]
    #[case::negative_string(Value::from("-5"), -5)]
    #[case::garbage_string(Value::from("abc"), 0)]
    #[case::overflowing_string(Value::from("99999999999999999999"), i64::MAX)]
    #[case::underflowing_string(Value::from("-99999999999999999999"), i64::MIN)]
    #[case::min_string(Value::from("-9223372036854775808"), i64::MIN)]
    #[case::bool(Value::TRUE, 1)]
    #[case::array(Value::Array(vec![Value::Int(1), Value::Int(2)]), 2)]
    #[case::null(Value::NULL, 0)]
    fn test_to_int(#[case] value: Value, #[case] expected: i64) {
        assert_eq!(value.to_int(), expected);
    }

    #[test]
    fn test_from_native_nested() {
        let value = Value::from(json!({"a": [1, 2.5, "x"], "b": null, "c": true}));
        let Value::Dict(map) = &value else {
            panic!("expected dict, got {}", value.name());
        };
        assert_eq!(
            map.get("a"),
            Some(&Value::Array(vec![
                Value::Int(1),
                Value::Float(2.5),
                Value::from("x")
            ]))
        );
        assert_eq!(map.get("b"), Some(&Value::NULL));
        assert_eq!(map.get("c"), Some(&Value::TRUE));
    }

    #[test]
    fn test_absent_sentinels_export_as_null() {
        assert_eq!(Value::UNDEFINED.to_native(), serde_json::Value::Null);
        assert_eq!(Value::NULL.to_native(), serde_json::Value::Null);
        assert_eq!(Value::Float(f64::NAN).to_native(), serde_json::Value::Null);
    }

    #[test]
    fn test_from_option() {
        assert_eq!(Value::from(Some(3_i64)), Value::Int(3));
        assert_eq!(Value::from(None::<String>), Value::NULL);
    }
}
