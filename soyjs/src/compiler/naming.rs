use std::borrow::Cow;

/// HTML elements that never have a closing tag.
const VOID_ELEMENTS: [&str; 8] = ["br", "hr", "img", "input", "wbr", "meta", "link", "source"];

/// Converts a snake_case identifier to lowerCamelCase.
///
/// A single leading and a single trailing underscore are kept as they are.
pub fn to_lower_camel_case(ident: &str) -> String {
    let (prefix, core) = match ident.strip_prefix('_') {
        Some(rest) => ("_", rest),
        None => ("", ident),
    };
    let (core, suffix) = match core.strip_suffix('_') {
        Some(rest) => (rest, "_"),
        None => (core, ""),
    };
    let mut rv = String::with_capacity(ident.len());
    rv.push_str(prefix);
    for (idx, segment) in core.split('_').filter(|x| !x.is_empty()).enumerate() {
        if idx == 0 {
            rv.push_str(segment);
        } else {
            let mut chars = segment.chars();
            if let Some(first) = chars.next() {
                rv.extend(first.to_uppercase());
                rv.push_str(chars.as_str());
            }
        }
    }
    rv.push_str(suffix);
    rv
}

/// Returns `true` if `s` is a plain identifier (`[A-Za-z_][A-Za-z0-9_]*`).
pub fn is_identifier(s: &str) -> bool {
    let mut bytes = s.bytes();
    match bytes.next() {
        Some(c) if c.is_ascii_alphabetic() || c == b'_' => {}
        _ => return false,
    }
    bytes.all(|c| c.is_ascii_alphanumeric() || c == b'_')
}

/// Derives the name of a simple variable reference.
///
/// `$message_description` becomes `messageDescription`.  Anything that is
/// not a single bare `$identifier` (operators, several operands, attribute
/// access, ...) yields `None`.
pub fn get_variable_name(exp: &str) -> Option<String> {
    let ident = some!(exp.trim().strip_prefix('$'));
    if !is_identifier(ident) || !ident.bytes().any(|c| c.is_ascii_alphanumeric()) {
        return None;
    }
    Some(to_lower_camel_case(ident))
}

/// Describes how an HTML tag is represented inside a message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TagPlaceholder {
    /// A tag that opens or closes an element; carries the capitalized base
    /// name (`Link` for `a`).
    Paired(Cow<'static, str>),
    /// A void element with its full placeholder name (`break` for `br`).
    Void(Cow<'static, str>),
}

/// Picks the placeholder base name for an HTML tag.
pub fn tag_placeholder(tag: &str, self_closing: bool) -> TagPlaceholder {
    let tag = tag.to_ascii_lowercase();
    let is_void = self_closing || VOID_ELEMENTS.contains(&tag.as_str());
    let base: Cow<'static, str> = match tag.as_str() {
        "a" => "Link".into(),
        "b" => "Bold".into(),
        "i" => "Italic".into(),
        "u" => "Underline".into(),
        "em" => "Emphasis".into(),
        "strong" => "Strong".into(),
        "p" => "Paragraph".into(),
        "span" => "Span".into(),
        "div" => "Div".into(),
        "ul" => "UnorderedList".into(),
        "ol" => "OrderedList".into(),
        "li" => "ListItem".into(),
        "code" => "Code".into(),
        "br" => "Break".into(),
        "img" => "Image".into(),
        "hr" => "HorizontalRule".into(),
        "input" => "Input".into(),
        other => {
            let camel = to_lower_camel_case(&other.replace('-', "_"));
            let mut chars = camel.chars();
            match chars.next() {
                Some(first) => format!("{}{}", first.to_ascii_uppercase(), chars.as_str()).into(),
                None => "Tag".into(),
            }
        }
    };
    if is_void {
        let mut chars = base.chars();
        let lower = match chars.next() {
            Some(first) => format!("{}{}", first.to_ascii_lowercase(), chars.as_str()),
            None => String::from("tag"),
        };
        TagPlaceholder::Void(lower.into())
    } else {
        TagPlaceholder::Paired(base)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_variable_names() {
        assert_eq!(get_variable_name("$name").as_deref(), Some("name"));
        assert_eq!(
            get_variable_name("$message_description").as_deref(),
            Some("messageDescription")
        );
        assert_eq!(
            get_variable_name("$_description").as_deref(),
            Some("_description")
        );
        assert_eq!(
            get_variable_name("$description_").as_deref(),
            Some("description_")
        );
        assert_eq!(get_variable_name("$name && $surname"), None);
    }

    #[test]
    fn test_not_simple() {
        assert_eq!(get_variable_name("name"), None);
        assert_eq!(get_variable_name("$"), None);
        assert_eq!(get_variable_name("$_"), None);
        assert_eq!(get_variable_name("$1abc"), None);
        assert_eq!(get_variable_name("$config.supportEmail"), None);
        assert_eq!(get_variable_name("$a + 1"), None);
        assert_eq!(get_variable_name(" $padded ").as_deref(), Some("padded"));
    }

    #[test]
    fn test_camel_case() {
        assert_eq!(to_lower_camel_case("agency_id"), "agencyId");
        assert_eq!(to_lower_camel_case("a_b_c"), "aBC");
        assert_eq!(to_lower_camel_case("userID"), "userID");
        assert_eq!(to_lower_camel_case("_x_y_"), "_xY_");
    }

    #[test]
    fn test_tag_placeholders() {
        assert_eq!(tag_placeholder("a", false), TagPlaceholder::Paired("Link".into()));
        assert_eq!(tag_placeholder("A", false), TagPlaceholder::Paired("Link".into()));
        assert_eq!(tag_placeholder("br", false), TagPlaceholder::Void("break".into()));
        assert_eq!(tag_placeholder("img", true), TagPlaceholder::Void("image".into()));
        assert_eq!(
            tag_placeholder("my-widget", false),
            TagPlaceholder::Paired("MyWidget".into())
        );
    }
}
