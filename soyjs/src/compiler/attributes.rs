use std::collections::BTreeMap;
use std::fmt;

use crate::compiler::tokens::Token;
use crate::error::{Error, ErrorKind};

/// The `name="value"` attributes of a command.
///
/// Keys are unique, a later duplicate overrides an earlier one.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct ParsedAttributes {
    map: BTreeMap<String, String>,
}

impl ParsedAttributes {
    /// Looks up an attribute by name.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.map.get(name).map(|x| x.as_str())
    }

    /// Returns the number of attributes.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Returns `true` if the command carried no attributes.
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    /// Iterates over the attributes sorted by name.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.map.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl fmt::Debug for ParsedAttributes {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map().entries(self.map.iter()).finish()
    }
}

fn attribute_name_len(s: &str) -> usize {
    s.as_bytes()
        .iter()
        .take_while(|&&c| c.is_ascii_alphanumeric() || c == b'_' || c == b'-')
        .count()
}

/// Splits a quoted value off the front of `s` (which starts with the quote).
///
/// Returns the unescaped value and the remaining input, or `None` if the
/// closing quote is missing.
fn split_quoted(s: &str) -> Option<(String, &str)> {
    let quote = some!(s.chars().next());
    let mut value = String::new();
    let mut chars = s[1..].char_indices();
    while let Some((idx, c)) = chars.next() {
        match c {
            '\\' => value.push(some!(chars.next()).1),
            c if c == quote => return Some((value, &s[idx + 2..])),
            c => value.push(c),
        }
    }
    None
}

/// Skips a bare word (which may contain quoted parts) at the front of `s`.
fn skip_word(s: &str) -> Option<&str> {
    let mut rest = s;
    while let Some(c) = rest.chars().next() {
        if c.is_whitespace() {
            break;
        } else if c == '"' || c == '\'' {
            rest = some!(split_quoted(rest)).1;
        } else {
            rest = &rest[c.len_utf8()..];
        }
    }
    Some(rest)
}

/// Parses the attributes from the body of a command (without braces).
fn parse_attribute_pairs(body: &str) -> Result<ParsedAttributes, &'static str> {
    let mut attrs = ParsedAttributes::default();

    // the directive name is not an attribute
    let body = body.trim_start();
    let body = body.strip_prefix('/').unwrap_or(body);
    let mut rest = &body[attribute_name_len(body)..];

    loop {
        rest = rest.trim_start();
        if rest.is_empty() {
            break;
        }
        let name_len = attribute_name_len(rest);
        let after_name = rest[name_len..].trim_start();
        if name_len > 0 {
            if let Some(value_part) = after_name.strip_prefix('=') {
                let value_part = value_part.trim_start();
                if value_part.starts_with(['"', '\'']) {
                    let (value, new_rest) = match split_quoted(value_part) {
                        Some(rv) => rv,
                        None => return Err("unterminated quote in command attribute"),
                    };
                    attrs.map.insert(rest[..name_len].to_string(), value);
                    rest = new_rest;
                    continue;
                }
            }
        }
        // not an attribute (eg: the template name or an expression)
        rest = match skip_word(rest) {
            Some(rest) => rest,
            None => return Err("unterminated quote in command attribute"),
        };
    }

    Ok(attrs)
}

/// Parses the `name="value"` attributes of a command token.
///
/// The attributes are read from the token's `source` so that this works on
/// any token that spans a full `{...}` command.  A command without
/// attributes yields an empty mapping; a quote that is never closed is a
/// syntax error.
pub fn parse_command_attributes(token: &Token<'_>) -> Result<ParsedAttributes, Error> {
    let source = token.source.trim();
    let body = source
        .strip_prefix('{')
        .map(|x| x.strip_suffix('}').unwrap_or(x))
        .unwrap_or(source);
    parse_attribute_pairs(body)
        .map_err(|msg| Error::new(ErrorKind::SyntaxError, msg).with_token(token.source, token.span))
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::compiler::tokens::{Span, Token};

    fn attrs(source: &str) -> Result<ParsedAttributes, Error> {
        parse_command_attributes(&Token::code(source, Span::default()))
    }

    #[test]
    fn test_basic() {
        let rv = attrs(r#"{msg meaning="test" desc="Lorem ipsum."}"#).unwrap();
        assert_eq!(rv.len(), 2);
        assert_eq!(rv.get("meaning"), Some("test"));
        assert_eq!(rv.get("desc"), Some("Lorem ipsum."));
    }

    #[test]
    fn test_empty() {
        assert!(attrs("{msg}").unwrap().is_empty());
        assert!(attrs("{/msg}").unwrap().is_empty());
    }

    #[test]
    fn test_order_independent() {
        assert_eq!(
            attrs(r#"{msg a="x" b="y"}"#).unwrap(),
            attrs(r#"{msg b="y" a="x"}"#).unwrap()
        );
    }

    #[test]
    fn test_mixed_words() {
        let rv = attrs(r#"{template .Foo private="true" kind='html'}"#).unwrap();
        assert_eq!(rv.len(), 2);
        assert_eq!(rv.get("private"), Some("true"));
        assert_eq!(rv.get("kind"), Some("html"));
    }

    #[test]
    fn test_escapes_and_braces() {
        let rv = attrs(r#"{msg desc="say \"hi\" {now}"}"#).unwrap();
        assert_eq!(rv.get("desc"), Some(r#"say "hi" {now}"#));
    }

    #[test]
    fn test_unterminated() {
        let err = attrs(r#"{msg desc="oops}"#).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::SyntaxError);
    }
}
