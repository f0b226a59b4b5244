use std::borrow::Cow;
use std::fmt;

/// Helper to write a string as a single quoted JavaScript string literal.
pub struct JsStr<'a>(pub &'a str);

impl fmt::Display for JsStr<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ok!(f.write_str("'"));
        let mut start = 0;
        for (idx, c) in self.0.char_indices() {
            let escaped = match c {
                '\\' => "\\\\",
                '\'' => "\\'",
                '\n' => "\\n",
                '\r' => "\\r",
                '\t' => "\\t",
                '\u{2028}' => "\\u2028",
                '\u{2029}' => "\\u2029",
                // keeps `</script>` from terminating an inline script
                '<' if self.0[idx..].starts_with("</") => "\\x3c",
                c if (c as u32) < 0x20 || c == '\u{7f}' => {
                    ok!(f.write_str(&self.0[start..idx]));
                    ok!(write!(f, "\\x{:02x}", c as u32));
                    start = idx + c.len_utf8();
                    continue;
                }
                _ => continue,
            };
            ok!(f.write_str(&self.0[start..idx]));
            ok!(f.write_str(escaped));
            start = idx + c.len_utf8();
        }
        ok!(f.write_str(&self.0[start..]));
        f.write_str("'")
    }
}

/// Applies template line joining to a run of literal text.
///
/// Text without line breaks is returned unchanged.  Otherwise the first
/// line loses its trailing whitespace, the last line its leading whitespace
/// and inner lines are trimmed on both ends.  Lines that end up empty are
/// dropped and the remaining ones are joined with a single space, or
/// without any if the join borders an HTML tag.
pub fn join_lines(text: &str) -> Cow<'_, str> {
    if !text.contains(['\n', '\r']) {
        return Cow::Borrowed(text);
    }
    let lines: Vec<&str> = text.split('\n').collect();
    let last = lines.len() - 1;
    let mut rv = String::with_capacity(text.len());
    for (idx, line) in lines.into_iter().enumerate() {
        let line = line.trim_end_matches('\r');
        let line = match idx {
            0 => line.trim_end(),
            idx if idx == last => line.trim_start(),
            _ => line.trim(),
        };
        if line.is_empty() {
            continue;
        }
        if !rv.is_empty() && !rv.ends_with('>') && !line.starts_with('<') {
            rv.push(' ');
        }
        rv.push_str(line);
    }
    Cow::Owned(rv)
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    #[test]
    fn test_js_string() {
        assert_eq!(JsStr("I am ").to_string(), "'I am '");
        assert_eq!(JsStr("What's up").to_string(), r"'What\'s up'");
        assert_eq!(JsStr("a\\b\nc").to_string(), r"'a\\b\nc'");
        assert_eq!(JsStr("\u{1}\u{2028}").to_string(), r"'\x01\u2028'");
        assert_eq!(JsStr("</script>").to_string(), r"'\x3c/script>'");
        assert_eq!(JsStr("ünïcödé").to_string(), "'ünïcödé'");
    }

    #[test]
    fn test_join_lines() {
        assert_eq!(join_lines("I am "), "I am ");
        assert_eq!(join_lines("\n  I am "), "I am ");
        assert_eq!(join_lines(" years old.\n  And you?\n"), " years old. And you?");
        assert_eq!(join_lines("a\n\n   \n b"), "a b");
        assert_eq!(join_lines("<div>\n  text\n</div>"), "<div>text</div>");
        assert_eq!(join_lines("\r\n  x\r\n"), "x");
        assert_eq!(join_lines("\n"), "");
    }
}
