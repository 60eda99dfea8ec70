use crate::protocol::types::Value;
use serde::{Deserialize, Serialize};

/// Caller-supplied bind value, before any native conversion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParamValue {
    Null,
    Integer(i64),
    Double(f64),
    String(String),
    Binary(Vec<u8>),
    Array(Vec<ParamValue>),
}

impl ParamValue {
    /// Empty means no payload: NULL, "", no bytes or no elements.
    pub fn is_empty(&self) -> bool {
        match self {
            ParamValue::Null => true,
            ParamValue::String(s) => s.is_empty(),
            ParamValue::Binary(b) => b.is_empty(),
            ParamValue::Array(items) => items.is_empty(),
            ParamValue::Integer(_) | ParamValue::Double(_) => false,
        }
    }

    /// Truthiness of a flag-like value.
    pub fn is_truthy(&self) -> bool {
        match self {
            ParamValue::Null => false,
            ParamValue::Integer(n) => *n != 0,
            ParamValue::Double(f) => *f != 0.0,
            ParamValue::String(s) => !s.is_empty() && s != "0",
            ParamValue::Binary(b) => !b.is_empty(),
            ParamValue::Array(items) => !items.is_empty(),
        }
    }

    /// Integer coercion: strings keep their leading signed digits (saturating),
    /// anything unparsable becomes 0, doubles truncate toward zero.
    pub fn coerce_integer(&self) -> Option<i64> {
        match self {
            ParamValue::Integer(n) => Some(*n),
            ParamValue::Double(f) => Some(f.trunc() as i64),
            ParamValue::String(s) => Some(leading_integer(s)),
            _ => None,
        }
    }

    /// Text form used for character binds.
    pub fn to_text(&self) -> Option<String> {
        match self {
            ParamValue::Null | ParamValue::Array(_) => None,
            ParamValue::String(s) => Some(s.clone()),
            ParamValue::Integer(n) => Some(n.to_string()),
            ParamValue::Double(f) => Some(f.to_string()),
            ParamValue::Binary(b) => Some(String::from_utf8_lossy(b).into_owned()),
        }
    }

    /// Scalar conversion used for collection elements.
    pub fn to_value(&self) -> Value {
        match self {
            ParamValue::Null | ParamValue::Array(_) => Value::Null,
            ParamValue::Integer(n) => Value::Integer(*n),
            ParamValue::Double(f) => Value::Float(*f),
            ParamValue::String(s) => Value::Text(s.clone()),
            ParamValue::Binary(b) => Value::Binary(b.clone()),
        }
    }
}

fn leading_integer(s: &str) -> i64 {
    let s = s.trim_start();
    let (negative, digits) = match s.as_bytes().first() {
        Some(b'-') => (true, &s[1..]),
        Some(b'+') => (false, &s[1..]),
        _ => (false, s),
    };
    // Saturates at the i64 bounds instead of wrapping.
    digits
        .bytes()
        .take_while(u8::is_ascii_digit)
        .map(|b| i64::from(b - b'0'))
        .fold(0i64, |acc, digit| {
            if negative {
                acc.saturating_mul(10).saturating_sub(digit)
            } else {
                acc.saturating_mul(10).saturating_add(digit)
            }
        })
}

impl From<&str> for ParamValue {
    fn from(s: &str) -> Self {
        ParamValue::String(s.to_string())
    }
}

impl From<String> for ParamValue {
    fn from(s: String) -> Self {
        ParamValue::String(s)
    }
}

impl From<i64> for ParamValue {
    fn from(n: i64) -> Self {
        ParamValue::Integer(n)
    }
}

impl From<i32> for ParamValue {
    fn from(n: i32) -> Self {
        ParamValue::Integer(n as i64)
    }
}

impl From<f64> for ParamValue {
    fn from(f: f64) -> Self {
        ParamValue::Double(f)
    }
}

impl From<Vec<u8>> for ParamValue {
    fn from(b: Vec<u8>) -> Self {
        ParamValue::Binary(b)
    }
}

impl<T: Into<ParamValue>> From<Option<T>> for ParamValue {
    fn from(v: Option<T>) -> Self {
        v.map(Into::into).unwrap_or(ParamValue::Null)
    }
}

/// Declared semantic type of a bound parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Errata {
    String,
    Integer,
    Double,
    Binary,
    Null,
    Lob,
    Cursor,
    NumberArray,
    CharArray,
    /// Tag the engine does not recognise.
    Other(String),
}

impl Errata {
    pub fn from_tag(tag: &str) -> Self {
        match tag.trim().to_ascii_lowercase().as_str() {
            "string" => Self::String,
            "integer" => Self::Integer,
            "double" => Self::Double,
            "binary" => Self::Binary,
            "null" => Self::Null,
            "lob" => Self::Lob,
            "cursor" => Self::Cursor,
            "array_num" => Self::NumberArray,
            "array_char" => Self::CharArray,
            _ => Self::Other(tag.to_string()),
        }
    }

    pub fn is_known(&self) -> bool {
        !matches!(self, Errata::Other(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_integer_from_strings() {
        assert_eq!(ParamValue::from("42").coerce_integer(), Some(42));
        assert_eq!(ParamValue::from("  -17 ").coerce_integer(), Some(-17));
        assert_eq!(ParamValue::from("12abc").coerce_integer(), Some(12));
        assert_eq!(ParamValue::from("abc").coerce_integer(), Some(0));
        assert_eq!(ParamValue::from("").coerce_integer(), Some(0));
    }

    #[test]
    fn test_coerce_integer_saturates_on_overflow() {
        assert_eq!(
            ParamValue::from("99999999999999999999").coerce_integer(),
            Some(i64::MAX)
        );
        assert_eq!(
            ParamValue::from("-99999999999999999999").coerce_integer(),
            Some(i64::MIN)
        );
        assert_eq!(
            ParamValue::from("-9223372036854775808").coerce_integer(),
            Some(i64::MIN)
        );
        assert_eq!(ParamValue::Double(1e30).coerce_integer(), Some(i64::MAX));
    }

    #[test]
    fn test_coerce_integer_from_numbers() {
        assert_eq!(ParamValue::Integer(5).coerce_integer(), Some(5));
        assert_eq!(ParamValue::Double(3.9).coerce_integer(), Some(3));
        assert_eq!(ParamValue::Double(-3.9).coerce_integer(), Some(-3));
        assert_eq!(ParamValue::Null.coerce_integer(), None);
    }

    #[test]
    fn test_is_empty() {
        assert!(ParamValue::Null.is_empty());
        assert!(ParamValue::from("").is_empty());
        assert!(ParamValue::Array(vec![]).is_empty());
        assert!(!ParamValue::from("x").is_empty());
        assert!(!ParamValue::Integer(0).is_empty());
    }

    #[test]
    fn test_is_truthy() {
        assert!(ParamValue::Integer(1).is_truthy());
        assert!(ParamValue::from("yes").is_truthy());
        assert!(!ParamValue::from("0").is_truthy());
        assert!(!ParamValue::Null.is_truthy());
    }

    #[test]
    fn test_errata_from_tag() {
        assert_eq!(Errata::from_tag("STRING"), Errata::String);
        assert_eq!(Errata::from_tag("array_num"), Errata::NumberArray);
        assert_eq!(Errata::from_tag("Cursor"), Errata::Cursor);
        assert_eq!(
            Errata::from_tag("geometry"),
            Errata::Other("geometry".to_string())
        );
        assert!(!Errata::from_tag("geometry").is_known());
    }

    #[test]
    fn test_param_value_from_option() {
        let none: Option<i64> = None;
        assert_eq!(ParamValue::from(none), ParamValue::Null);
        assert_eq!(ParamValue::from(Some("a")), ParamValue::from("a"));
    }
}
