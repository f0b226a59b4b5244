//! Provides the runtime value used by the in-process renderer.
//!
//! Compiled templates are JavaScript, so the renderer follows JavaScript
//! rules for the handful of operations a template can perform: string
//! conversion, truthiness, loose equality, `+` as string concatenation and
//! attribute access.  Values borrow from the [`serde_json::Value`] the
//! template is rendered with and from the parsed template itself.
//!
//! ```
//! use serde_json::json;
//! use soyjs::Value;
//!
//! let data = json!({"age": 20, "tags": ["a", "b"]});
//! let value = Value::from(&data);
//! assert_eq!(value.get_attr("age").unwrap().to_string(), "20");
//! assert_eq!(value.get_attr("tags").unwrap().to_string(), "a,b");
//! assert_eq!(value.get_attr("missing").unwrap().to_string(), "undefined");
//! ```
use std::borrow::Cow;
use std::fmt;

use serde_json::{Map, Value as Json};

use crate::error::{Error, ErrorKind};

pub(crate) mod ops;

/// Describes the kind of value.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ValueKind {
    /// The value is `undefined`.
    Undefined,
    /// The value is `null`.
    Null,
    /// The value is a boolean.
    Bool,
    /// The value is a number.
    Number,
    /// The value is a string.
    String,
    /// The value is an array.
    Array,
    /// The value is an object.
    Object,
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match *self {
            ValueKind::Undefined => "undefined",
            ValueKind::Null => "null",
            ValueKind::Bool => "bool",
            ValueKind::Number => "number",
            ValueKind::String => "string",
            ValueKind::Array => "array",
            ValueKind::Object => "object",
        })
    }
}

/// A value with JavaScript semantics.
#[derive(Debug, Clone)]
pub enum Value<'v> {
    /// JavaScript's `undefined`, the result of missing lookups.
    Undefined,
    /// `null`
    Null,
    /// `true` or `false`
    Bool(bool),
    /// All numbers are doubles.
    Number(f64),
    /// A borrowed or computed string.
    String(Cow<'v, str>),
    /// An array of the render data.
    Array(&'v [Json]),
    /// An object of the render data.
    Object(&'v Map<String, Json>),
}

impl<'v> From<&'v Json> for Value<'v> {
    fn from(value: &'v Json) -> Self {
        match value {
            Json::Null => Value::Null,
            Json::Bool(val) => Value::Bool(*val),
            Json::Number(num) => Value::Number(num.as_f64().unwrap_or(f64::NAN)),
            Json::String(s) => Value::String(Cow::Borrowed(s)),
            Json::Array(items) => Value::Array(items),
            Json::Object(map) => Value::Object(map),
        }
    }
}

impl From<bool> for Value<'_> {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

impl From<f64> for Value<'_> {
    fn from(value: f64) -> Self {
        Value::Number(value)
    }
}

impl From<String> for Value<'_> {
    fn from(value: String) -> Self {
        Value::String(Cow::Owned(value))
    }
}

impl<'v> From<&'v str> for Value<'v> {
    fn from(value: &'v str) -> Self {
        Value::String(Cow::Borrowed(value))
    }
}

impl<'v> Value<'v> {
    /// Returns the kind of the value.
    pub fn kind(&self) -> ValueKind {
        match self {
            Value::Undefined => ValueKind::Undefined,
            Value::Null => ValueKind::Null,
            Value::Bool(_) => ValueKind::Bool,
            Value::Number(_) => ValueKind::Number,
            Value::String(_) => ValueKind::String,
            Value::Array(_) => ValueKind::Array,
            Value::Object(_) => ValueKind::Object,
        }
    }

    /// Is this value true in a JavaScript condition?
    pub fn is_true(&self) -> bool {
        match self {
            Value::Undefined | Value::Null => false,
            Value::Bool(val) => *val,
            Value::Number(val) => *val != 0.0 && !val.is_nan(),
            Value::String(s) => !s.is_empty(),
            Value::Array(_) | Value::Object(_) => true,
        }
    }

    /// Returns the string if the value is a string.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(s) => Some(s),
            _ => None,
        }
    }

    /// Converts the value into a number (JavaScript's `Number(value)`).
    pub fn to_number(&self) -> f64 {
        match self {
            Value::Undefined => f64::NAN,
            Value::Null => 0.0,
            Value::Bool(val) => *val as u8 as f64,
            Value::Number(val) => *val,
            Value::String(s) => string_to_number(s),
            Value::Array(_) => string_to_number(&self.to_string()),
            Value::Object(_) => f64::NAN,
        }
    }

    /// Converts objects and arrays into their string form, keeps everything
    /// else as it is.
    pub fn to_primitive(&self) -> Value<'v> {
        match self {
            Value::Array(_) | Value::Object(_) => Value::String(Cow::Owned(self.to_string())),
            other => other.clone(),
        }
    }

    /// Looks up an attribute (`value.name`).
    ///
    /// Missing attributes are `undefined`, looking up an attribute of
    /// `undefined` or `null` fails.
    pub fn get_attr(&self, name: &str) -> Result<Value<'v>, Error> {
        Ok(match self {
            Value::Undefined | Value::Null => {
                return Err(Error::new(
                    ErrorKind::InvalidOperation,
                    format!("cannot read property `{}` of {}", name, self.kind()),
                ))
            }
            Value::Object(map) => map.get(name).map_or(Value::Undefined, Value::from),
            Value::Array(items) if name == "length" => Value::Number(items.len() as f64),
            Value::String(s) if name == "length" => Value::Number(s.encode_utf16().count() as f64),
            _ => Value::Undefined,
        })
    }

    /// Looks up an item (`value[key]`).
    pub fn get_item(&self, key: &Value<'_>) -> Result<Value<'v>, Error> {
        if let (Value::Array(items), Value::Number(idx)) = (self, key) {
            if idx.fract() == 0.0 && *idx >= 0.0 {
                return Ok(items
                    .get(*idx as usize)
                    .map_or(Value::Undefined, Value::from));
            }
        }
        if let (Value::String(s), Value::Number(idx)) = (self, key) {
            if idx.fract() == 0.0 && *idx >= 0.0 {
                return Ok(s
                    .chars()
                    .nth(*idx as usize)
                    .map_or(Value::Undefined, |c| Value::String(Cow::Owned(c.to_string()))));
            }
        }
        self.get_attr(&key.to_string())
    }
}

fn string_to_number(s: &str) -> f64 {
    let s = s.trim();
    if s.is_empty() {
        return 0.0;
    }
    match s {
        "Infinity" | "+Infinity" => f64::INFINITY,
        "-Infinity" => f64::NEG_INFINITY,
        _ if s.starts_with(|c: char| c.is_ascii_digit() || c == '.' || c == '-' || c == '+') => {
            s.parse().unwrap_or(f64::NAN)
        }
        _ => f64::NAN,
    }
}

/// Formats a number the way JavaScript converts numbers to strings.
pub fn format_number(f: &mut fmt::Formatter<'_>, num: f64) -> fmt::Result {
    if num.is_nan() {
        f.write_str("NaN")
    } else if num.is_infinite() {
        f.write_str(if num > 0.0 { "Infinity" } else { "-Infinity" })
    } else if num == 0.0 {
        f.write_str("0")
    } else if num.abs() >= 1e21 || num.abs() < 1e-6 {
        let formatted = format!("{:e}", num);
        match formatted.split_once('e') {
            Some((mantissa, exp)) if !exp.starts_with('-') => write!(f, "{}e+{}", mantissa, exp),
            _ => f.write_str(&formatted),
        }
    } else {
        write!(f, "{}", num)
    }
}

impl fmt::Display for Value<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Undefined => f.write_str("undefined"),
            Value::Null => f.write_str("null"),
            Value::Bool(val) => write!(f, "{}", val),
            Value::Number(num) => format_number(f, *num),
            Value::String(s) => f.write_str(s),
            Value::Array(items) => {
                for (idx, item) in items.iter().enumerate() {
                    if idx > 0 {
                        ok!(f.write_str(","));
                    }
                    if !item.is_null() {
                        ok!(fmt::Display::fmt(&Value::from(item), f));
                    }
                }
                Ok(())
            }
            Value::Object(_) => f.write_str("[object Object]"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    #[test]
    fn test_string_conversion() {
        let data = json!({
            "int": 20,
            "float": 1.5,
            "neg": -3.0,
            "big": 1e21,
            "small": 1e-7,
            "nested": [1, [2, 3], null, "x"],
            "obj": {}
        });
        let v = Value::from(&data);
        let s = |name: &str| v.get_attr(name).unwrap().to_string();
        assert_eq!(s("int"), "20");
        assert_eq!(s("float"), "1.5");
        assert_eq!(s("neg"), "-3");
        assert_eq!(s("big"), "1e+21");
        assert_eq!(s("small"), "1e-7");
        assert_eq!(s("nested"), "1,2,3,,x");
        assert_eq!(s("obj"), "[object Object]");
        assert_eq!(s("missing"), "undefined");
        assert_eq!(Value::Null.to_string(), "null");
    }

    #[test]
    fn test_truthiness() {
        assert!(!Value::Undefined.is_true());
        assert!(!Value::Null.is_true());
        assert!(!Value::from("").is_true());
        assert!(Value::from("0").is_true());
        assert!(!Value::Number(0.0).is_true());
        assert!(!Value::Number(f64::NAN).is_true());
        let data = json!([]);
        assert!(Value::from(&data).is_true());
    }

    #[test]
    fn test_lookups() {
        let data = json!({"items": ["a", "b"], "name": "héllo"});
        let v = Value::from(&data);
        let items = v.get_attr("items").unwrap();
        assert_eq!(items.get_item(&Value::Number(1.0)).unwrap().to_string(), "b");
        assert_eq!(items.get_item(&Value::Number(5.0)).unwrap().kind(), ValueKind::Undefined);
        assert_eq!(items.get_attr("length").unwrap().to_string(), "2");
        assert_eq!(
            v.get_item(&Value::from("name")).unwrap().get_attr("length").unwrap().to_string(),
            "5"
        );
        let err = v.get_attr("missing").unwrap().get_attr("x").unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidOperation);
        assert_eq!(
            err.to_string(),
            "invalid operation: cannot read property `x` of undefined"
        );
    }

    #[test]
    fn test_to_number() {
        assert_eq!(Value::from(" 42 ").to_number(), 42.0);
        assert_eq!(Value::from("").to_number(), 0.0);
        assert!(Value::from("abc").to_number().is_nan());
        assert_eq!(Value::Bool(true).to_number(), 1.0);
        assert_eq!(Value::Null.to_number(), 0.0);
        assert!(Value::Undefined.to_number().is_nan());
    }
}
