use std::borrow::Cow;
use std::cmp::Ordering;

use crate::value::Value;

/// Implements JavaScript's loose equality (`==`).
pub fn loose_eq(a: &Value<'_>, b: &Value<'_>) -> bool {
    match (a, b) {
        (Value::Undefined | Value::Null, Value::Undefined | Value::Null) => true,
        (Value::Undefined | Value::Null, _) | (_, Value::Undefined | Value::Null) => false,
        (Value::Bool(a), Value::Bool(b)) => a == b,
        (Value::Number(a), Value::Number(b)) => a == b,
        (Value::String(a), Value::String(b)) => a == b,
        (Value::Array(a), Value::Array(b)) => std::ptr::eq(*a, *b),
        (Value::Object(a), Value::Object(b)) => std::ptr::eq(*a, *b),
        (Value::Array(_) | Value::Object(_), Value::Array(_) | Value::Object(_)) => false,
        (Value::Bool(_), _) => loose_eq(&Value::Number(a.to_number()), b),
        (_, Value::Bool(_)) => loose_eq(a, &Value::Number(b.to_number())),
        (Value::Array(_) | Value::Object(_), _) => loose_eq(&a.to_primitive(), b),
        (_, Value::Array(_) | Value::Object(_)) => loose_eq(a, &b.to_primitive()),
        (Value::Number(_), Value::String(_)) | (Value::String(_), Value::Number(_)) => {
            a.to_number() == b.to_number()
        }
    }
}

/// Compares two values for the relational operators.
///
/// Returns `None` where every comparison is false (eg: `NaN`).
pub fn compare(a: &Value<'_>, b: &Value<'_>) -> Option<Ordering> {
    let a = a.to_primitive();
    let b = b.to_primitive();
    match (&a, &b) {
        (Value::String(a), Value::String(b)) => Some(a.encode_utf16().cmp(b.encode_utf16())),
        _ => a.to_number().partial_cmp(&b.to_number()),
    }
}

/// Implements `+`: concatenation if either side is a string.
pub fn add<'v>(a: &Value<'v>, b: &Value<'v>) -> Value<'v> {
    let a = a.to_primitive();
    let b = b.to_primitive();
    if matches!(a, Value::String(_)) || matches!(b, Value::String(_)) {
        Value::String(Cow::Owned(format!("{}{}", a, b)))
    } else {
        Value::Number(a.to_number() + b.to_number())
    }
}

pub fn sub<'v>(a: &Value<'_>, b: &Value<'_>) -> Value<'v> {
    Value::Number(a.to_number() - b.to_number())
}

pub fn mul<'v>(a: &Value<'_>, b: &Value<'_>) -> Value<'v> {
    Value::Number(a.to_number() * b.to_number())
}

pub fn div<'v>(a: &Value<'_>, b: &Value<'_>) -> Value<'v> {
    Value::Number(a.to_number() / b.to_number())
}

pub fn rem<'v>(a: &Value<'_>, b: &Value<'_>) -> Value<'v> {
    Value::Number(a.to_number() % b.to_number())
}

pub fn neg<'v>(a: &Value<'_>) -> Value<'v> {
    Value::Number(-a.to_number())
}
