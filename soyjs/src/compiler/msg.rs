use std::borrow::Cow;

use crate::compiler::ast::{Expr, Fragment, Msg, Placeholder};
use crate::compiler::attributes::parse_command_attributes;
use crate::compiler::expression::parse_expr;
use crate::compiler::naming::{get_variable_name, tag_placeholder, to_lower_camel_case, TagPlaceholder};
use crate::compiler::tokens::{Token, TokenKind};
use crate::error::{Error, ErrorKind};
use crate::utils::join_lines;

/// Returns the literal text of a special character command.
pub(crate) fn special_char(command: &str) -> Option<&'static str> {
    Some(match command {
        "sp" => " ",
        "nil" => "",
        "lb" => "{",
        "rb" => "}",
        "\\n" => "\n",
        "\\r" => "\r",
        "\\t" => "\t",
        _ => return None,
    })
}

/// A piece of message content before placeholders are assigned.
enum Part<'a> {
    Text(Cow<'a, str>),
    Print(Expr<'a>, &'a str),
}

fn compile_error(msg: String, token: &Token<'_>) -> Error {
    Error::new(ErrorKind::CompileError, msg).with_token(token.source, token.span)
}

/// Turns the body tokens of a message into text and print parts.
fn collect_parts<'a>(body: &[Token<'a>]) -> Result<Vec<Part<'a>>, Error> {
    let mut parts = Vec::new();
    let mut code_start = None;

    macro_rules! flush_code {
        ($end:expr) => {
            if let Some(start) = code_start.take() {
                let text = join_code(&body[start..$end]);
                if !text.is_empty() {
                    parts.push(Part::Text(text));
                }
            }
        };
    }

    for (idx, token) in body.iter().enumerate() {
        if token.kind != TokenKind::Command {
            if token.kind == TokenKind::Code && code_start.is_none() {
                code_start = Some(idx);
            }
            continue;
        }
        flush_code!(idx);
        let command = token.command.unwrap_or("");
        if token.closing {
            return Err(compile_error(
                format!("unexpected closing command `{}` in msg", command),
                token,
            ));
        }
        match command {
            "msg" => return Err(compile_error("msg blocks cannot be nested".into(), token)),
            "print" => {
                let exp = match token.exp {
                    Some(exp) => exp,
                    None => return Err(compile_error("print requires an expression".into(), token)),
                };
                let expr = ok!(parse_expr(exp).map_err(|err| err.with_token(token.source, token.span)));
                parts.push(Part::Print(expr, exp));
            }
            other => match special_char(other) {
                Some(text) => parts.push(Part::Text(Cow::Borrowed(text))),
                None => {
                    return Err(compile_error(
                        format!("command `{}` is not allowed in msg", other),
                        token,
                    ))
                }
            },
        }
    }
    flush_code!(body.len());
    Ok(parts)
}

/// Concatenates a run of code tokens and joins its lines.
pub(crate) fn join_code<'a>(tokens: &[Token<'a>]) -> Cow<'a, str> {
    let mut code = tokens.iter().filter(|x| x.kind == TokenKind::Code);
    match (code.next(), code.next()) {
        (None, _) => Cow::Borrowed(""),
        (Some(token), None) => join_lines(token.source),
        _ => {
            let merged: String = tokens
                .iter()
                .filter(|x| x.kind == TokenKind::Code)
                .map(|x| x.source)
                .collect();
            Cow::Owned(join_lines(&merged).into_owned())
        }
    }
}

/// Derives the placeholder base name for a printed expression.
fn print_placeholder_name(expr: &Expr<'_>, exp: &str) -> String {
    if let Some(name) = get_variable_name(exp) {
        return name;
    }
    match expr.path_tail() {
        Some(tail) if tail.bytes().any(|c| c.is_ascii_alphanumeric()) => to_lower_camel_case(tail),
        _ => "value".to_string(),
    }
}

/// Assigns unique placeholder names.
///
/// Equal values share a name, a different value with an already used name
/// gets a numeric suffix starting at 2.  Names are compared ignoring ASCII
/// case as the message function substitutes placeholders that way.  End
/// tags reuse the suffix of the start tag they close.
#[derive(Default)]
struct PlaceholderNames<'a> {
    placeholders: Vec<Placeholder<'a>>,
    open_tags: Vec<(String, String)>,
}

impl<'a> PlaceholderNames<'a> {
    fn allocate(&mut self, base: &str, value: Vec<Fragment<'a>>) -> (String, usize) {
        let mut n = 1;
        loop {
            let name = if n == 1 {
                base.to_string()
            } else {
                format!("{}{}", base, n)
            };
            match self.find(&name) {
                Some(existing) if existing.name == name && existing.value == value => {
                    return (name, n)
                }
                Some(_) => n += 1,
                None => {
                    self.placeholders.push(Placeholder {
                        name: name.clone(),
                        value,
                    });
                    return (name, n);
                }
            }
        }
    }

    fn find(&self, name: &str) -> Option<&Placeholder<'a>> {
        self.placeholders
            .iter()
            .find(|x| x.name.eq_ignore_ascii_case(name))
    }

    fn allocate_exact(&mut self, name: String, value: Vec<Fragment<'a>>) -> String {
        match self.find(&name) {
            Some(existing) if existing.name == name && existing.value == value => name,
            Some(_) => self.allocate(&name, value).0,
            None => {
                self.placeholders.push(Placeholder {
                    name: name.clone(),
                    value,
                });
                name
            }
        }
    }

    fn print(&mut self, expr: Expr<'a>, exp: &str) -> String {
        let base = print_placeholder_name(&expr, exp);
        self.allocate(&base, vec![Fragment::Expr(expr)]).0
    }

    fn tag(&mut self, tag: HtmlTag<'a>) -> String {
        match tag_placeholder(&tag.name, tag.self_closing) {
            TagPlaceholder::Void(name) => self.allocate(&name, tag.fragments).0,
            TagPlaceholder::Paired(base) if tag.closing => {
                let name = tag.name.to_ascii_lowercase();
                let suffix = match self.open_tags.iter().rposition(|x| x.0 == name) {
                    Some(pos) => self.open_tags.remove(pos).1,
                    None => String::new(),
                };
                self.allocate_exact(format!("end{}{}", base, suffix), tag.fragments)
            }
            TagPlaceholder::Paired(base) => {
                let (name, n) = self.allocate(&format!("start{}", base), tag.fragments);
                let suffix = if n == 1 { String::new() } else { n.to_string() };
                self.open_tags.push((tag.name.to_ascii_lowercase(), suffix));
                name
            }
        }
    }
}

/// An HTML tag found in message text.
struct HtmlTag<'a> {
    name: String,
    closing: bool,
    self_closing: bool,
    fragments: Vec<Fragment<'a>>,
}

/// Collects the pieces of an HTML tag while it is being scanned.
#[derive(Default)]
struct TagBuilder<'a> {
    fragments: Vec<Fragment<'a>>,
    quote: Option<char>,
}

impl<'a> TagBuilder<'a> {
    fn push_text(&mut self, text: &str) {
        if let Some(Fragment::Text(prev)) = self.fragments.last_mut() {
            prev.to_mut().push_str(text);
        } else {
            self.fragments.push(Fragment::Text(Cow::Owned(text.to_string())));
        }
    }

    /// Returns the byte length of `text` consumed up to and including the
    /// closing `>` if the tag ends within it.
    fn scan(&mut self, text: &str) -> Option<usize> {
        for (idx, c) in text.char_indices() {
            match (self.quote, c) {
                (Some(q), c) if q == c => self.quote = None,
                (Some(_), _) => {}
                (None, '"' | '\'') => self.quote = Some(c),
                (None, '>') => {
                    self.push_text(&text[..idx + 1]);
                    return Some(idx + 1);
                }
                (None, _) => {}
            }
        }
        self.push_text(text);
        None
    }

    fn finish(self) -> HtmlTag<'a> {
        let head = match self.fragments.first() {
            Some(Fragment::Text(text)) => text.to_string(),
            _ => String::new(),
        };
        let body = head.trim_start_matches('<');
        let (closing, body) = match body.strip_prefix('/') {
            Some(rest) => (true, rest),
            None => (false, body),
        };
        let name: String = body
            .chars()
            .take_while(|c| c.is_ascii_alphanumeric() || *c == '-')
            .collect();
        let self_closing = match self.fragments.last() {
            Some(Fragment::Text(text)) => text.trim_end_matches('>').trim_end().ends_with('/'),
            _ => false,
        };
        HtmlTag {
            name,
            closing,
            self_closing,
            fragments: self.fragments,
        }
    }
}

/// Returns the offset of the next `<` that starts an HTML tag.
fn find_tag_start(text: &str) -> Option<usize> {
    let bytes = text.as_bytes();
    bytes.iter().enumerate().position(|(idx, &c)| {
        c == b'<'
            && match bytes.get(idx + 1) {
                Some(b'/') => bytes.get(idx + 2).map_or(false, |c| c.is_ascii_alphabetic()),
                Some(c) => c.is_ascii_alphabetic(),
                None => false,
            }
    })
}

/// Creates a message from the tokens of a `msg` block.
///
/// The slice has to start with the opening `msg` command and may end with
/// the matching `/msg`.  Literal text becomes message text, prints and
/// HTML tags become named placeholders (`{$name}`, `{$startLink}`, ...)
/// whose runtime values are recorded in the returned [`Msg`].
pub fn create_msg_from_tokens<'a>(tokens: &[Token<'a>]) -> Result<Msg<'a>, Error> {
    let opening = match tokens.first() {
        Some(token) if token.is_opening("msg") => token,
        Some(token) => return Err(compile_error("expected a msg command".into(), token)),
        None => return Err(Error::new(ErrorKind::CompileError, "expected a msg command")),
    };
    let attributes = ok!(parse_command_attributes(opening));
    let body = match tokens.split_last() {
        Some((last, _)) if tokens.len() > 1 && last.is_closing("msg") => &tokens[1..tokens.len() - 1],
        _ => &tokens[1..],
    };

    let mut names = PlaceholderNames::default();
    let mut text = String::new();
    let mut tag: Option<TagBuilder<'a>> = None;

    for part in ok!(collect_parts(body)) {
        match part {
            Part::Print(expr, exp) => match tag {
                Some(ref mut tag) => tag.fragments.push(Fragment::Expr(expr)),
                None => {
                    let name = names.print(expr, exp);
                    push_placeholder(&mut text, &name);
                }
            },
            Part::Text(part_text) => {
                let mut rest: &str = &part_text;
                while !rest.is_empty() {
                    match tag.as_mut() {
                        Some(builder) => match builder.scan(rest) {
                            Some(len) => {
                                rest = &rest[len..];
                                if let Some(builder) = tag.take() {
                                    let name = names.tag(builder.finish());
                                    push_placeholder(&mut text, &name);
                                }
                            }
                            None => rest = "",
                        },
                        None => match find_tag_start(rest) {
                            Some(pos) => {
                                text.push_str(&rest[..pos]);
                                rest = &rest[pos..];
                                tag = Some(TagBuilder::default());
                            }
                            None => {
                                text.push_str(rest);
                                rest = "";
                            }
                        },
                    }
                }
            }
        }
    }

    if tag.is_some() {
        return Err(compile_error("unterminated HTML tag in msg".into(), opening));
    }

    tracing::trace!(
        placeholders = names.placeholders.len(),
        "created message from tokens"
    );

    Ok(Msg {
        text,
        placeholders: names.placeholders,
        meaning: attributes.get("meaning").map(|x| x.to_string()),
        desc: attributes.get("desc").map(|x| x.to_string()),
        attributes,
    })
}

fn push_placeholder(text: &mut String, name: &str) {
    text.push_str("{$");
    text.push_str(name);
    text.push('}');
}
