//! Message formatting.
//!
//! Compiled templates hand translated messages to a formatting primitive
//! (`goog.getMsg` in the generated JavaScript).  When rendering in process
//! the same job is done by a [`MsgFormatter`] that is injected into the
//! [`Compiler`](crate::Compiler).
use std::collections::BTreeMap;

/// Formats a message by substituting its placeholders.
///
/// The text carries placeholders as `{$name}`, `values` maps placeholder
/// names to the already stringified runtime values.  This is implemented
/// for all functions with a matching signature:
///
/// ```
/// use std::collections::BTreeMap;
/// use soyjs::Compiler;
///
/// let mut compiler = Compiler::new();
/// compiler.set_msg_formatter(|text: &str, values: &BTreeMap<String, String>| {
///     soyjs::get_msg(&text.to_uppercase(), values)
/// });
/// ```
pub trait MsgFormatter: Send + Sync {
    /// Returns the formatted message.
    fn format_msg(&self, text: &str, values: &BTreeMap<String, String>) -> String;
}

impl<F> MsgFormatter for F
where
    F: Fn(&str, &BTreeMap<String, String>) -> String + Send + Sync,
{
    fn format_msg(&self, text: &str, values: &BTreeMap<String, String>) -> String {
        (self)(text, values)
    }
}

/// The default message primitive.
///
/// Replaces every `{$name}` marker whose name matches a key of `values`
/// (ignoring ASCII case) with the value.  Values are inserted literally,
/// `$` has no special meaning, and inserted text is not scanned again.
/// Markers without a value are left in place.
pub fn get_msg(text: &str, values: &BTreeMap<String, String>) -> String {
    let mut rv = String::with_capacity(text.len());
    let mut rest = text;
    while let Some(start) = rest.find("{$") {
        rv.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let value = after.find('}').and_then(|end| {
            let key = &after[..end];
            values
                .get(key)
                .or_else(|| {
                    values
                        .iter()
                        .find(|(k, _)| k.eq_ignore_ascii_case(key))
                        .map(|(_, v)| v)
                })
                .map(|value| (value, end))
        });
        match value {
            Some((value, end)) => {
                rv.push_str(value);
                rest = &after[end + 1..];
            }
            None => {
                rv.push_str("{$");
                rest = after;
            }
        }
    }
    rv.push_str(rest);
    rv
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    fn values(items: &[(&str, &str)]) -> BTreeMap<String, String> {
        items
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_get_msg() {
        let values = values(&[("name", "Matt"), ("startLink", "<a href=\"#\">"), ("endLink", "</a>")]);
        assert_eq!(
            get_msg("I am {$name}. {$startLink}profile{$endLink}", &values),
            "I am Matt. <a href=\"#\">profile</a>"
        );
        assert_eq!(get_msg("{$NAME} and {$name}", &values), "Matt and Matt");
        assert_eq!(get_msg("{$missing} {$", &values), "{$missing} {$");
    }

    #[test]
    fn test_dollar_is_literal() {
        let values = values(&[("price", "$$1 $&"), ("other", "{$price}")]);
        assert_eq!(get_msg("{$price}", &values), "$$1 $&");
        assert_eq!(get_msg("{$other}", &values), "{$price}");
    }

    #[test]
    fn test_closure_formatter() {
        let formatter = |text: &str, _: &BTreeMap<String, String>| text.to_uppercase();
        assert_eq!(formatter.format_msg("hi", &BTreeMap::new()), "HI");
    }
}
