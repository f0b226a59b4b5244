use crate::compiler::tokens::{Span, Token, TokenKind};
use crate::error::{Error, ErrorKind};

/// The states of the command scanner.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum ScanState {
    /// Accumulating literal template text.
    Text,
    /// Inside `{ ... }`, tracking nested braces.
    InCommand { depth: usize },
    /// Inside a quoted value of a command where braces have no meaning.
    InQuotedValue { quote: u8, depth: usize },
}

/// Outcome of running the scanner from the current position.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
enum Scan {
    /// Text that ends at the given byte offset.
    Text(usize),
    /// A command ending (inclusive of `}`) at the given byte offset.
    Command(usize),
    /// End of input was reached in the given state.
    Unterminated(ScanState),
}

/// Tokenizes Soy templates.
pub struct Tokenizer<'s> {
    source: &'s str,
    filename: &'s str,
    offset: usize,
    current_line: u32,
    current_col: u32,
    literal_start: Option<Span>,
}

fn lex_identifier(s: &str) -> usize {
    s.as_bytes()
        .iter()
        .enumerate()
        .take_while(|&(idx, &c)| {
            if c == b'_' {
                true
            } else if idx == 0 {
                c.is_ascii_alphabetic()
            } else {
                c.is_ascii_alphanumeric()
            }
        })
        .count()
}

/// Runs the scanner over `rest`, starting in text mode.
///
/// Text stops at the first `{` or at the first comment start.  Commands
/// stop at the `}` matching the opening brace; braces inside quoted values
/// are not counted.
fn scan(rest: &[u8]) -> Scan {
    let mut state = ScanState::Text;
    let mut idx = 0;
    while let Some(&c) = rest.get(idx) {
        state = match state {
            ScanState::Text => match c {
                b'{' if idx == 0 => ScanState::InCommand { depth: 0 },
                b'{' => return Scan::Text(idx),
                b'/' if idx > 0 && comment_len(rest, idx, false).is_some() => {
                    return Scan::Text(idx)
                }
                _ => ScanState::Text,
            },
            ScanState::InCommand { depth } => match c {
                b'}' if depth == 0 => return Scan::Command(idx + 1),
                b'}' => ScanState::InCommand { depth: depth - 1 },
                b'{' => ScanState::InCommand { depth: depth + 1 },
                b'"' | b'\'' => ScanState::InQuotedValue { quote: c, depth },
                _ => state,
            },
            ScanState::InQuotedValue { quote, depth } => match c {
                b'\\' => {
                    idx += 1;
                    state
                }
                c if c == quote => ScanState::InCommand { depth },
                _ => state,
            },
        };
        idx += 1;
    }
    match state {
        ScanState::Text => Scan::Text(rest.len()),
        state => Scan::Unterminated(state),
    }
}

/// If a comment starts at `idx` returns its length.
///
/// `/* */` comments may start anywhere, `//` comments need to be preceded
/// by whitespace so that URLs like `http://` stay text.  `after_ws` tells
/// if the byte before `rest` was whitespace (or the start of the input).
fn comment_len(rest: &[u8], idx: usize, after_ws: bool) -> Option<Result<usize, ()>> {
    match rest.get(idx..idx + 2) {
        Some(b"/*") => Some(
            rest[idx + 2..]
                .windows(2)
                .position(|w| w == b"*/")
                .map(|end| end + 4)
                .ok_or(()),
        ),
        Some(b"//") => {
            let preceded_by_ws = match idx.checked_sub(1).and_then(|prev| rest.get(prev)) {
                Some(prev) => prev.is_ascii_whitespace(),
                None => after_ws,
            };
            if preceded_by_ws {
                Some(Ok(rest[idx..]
                    .iter()
                    .position(|&c| c == b'\n' || c == b'\r')
                    .unwrap_or(rest.len() - idx)))
            } else {
                None
            }
        }
        _ => None,
    }
}

impl<'s> Tokenizer<'s> {
    /// Creates a new tokenizer.
    ///
    /// The filename is only used for error reporting.
    pub fn new(source: &'s str, filename: &'s str) -> Tokenizer<'s> {
        Tokenizer {
            source,
            filename,
            offset: 0,
            current_line: 1,
            current_col: 0,
            literal_start: None,
        }
    }

    /// Produces the next token from the tokenizer.
    pub fn next_token(&mut self) -> Result<Option<Token<'s>>, Error> {
        if self.rest().is_empty() {
            return match self.literal_start.take() {
                Some(span) => Err(self.syntax_error("unclosed literal block", span)),
                None => Ok(None),
            };
        }
        if self.literal_start.is_some() {
            return self.tokenize_literal().map(Some);
        }
        if let Some(len) = comment_len(self.rest().as_bytes(), 0, self.after_whitespace()) {
            let old_loc = self.loc();
            return match len {
                Ok(len) => {
                    let source = self.advance(len);
                    Ok(Some(Token::comment(source, self.span(old_loc))))
                }
                Err(()) => {
                    let source = self.advance(2);
                    let span = self.span(old_loc);
                    Err(self.syntax_error("unclosed comment, missing `*/`", span)
                        .with_token(source, span))
                }
            };
        }

        let old_loc = self.loc();
        match scan(self.rest().as_bytes()) {
            Scan::Text(len) => {
                let source = self.advance(len);
                Ok(Some(Token::code(source, self.span(old_loc))))
            }
            Scan::Command(len) => {
                let source = self.advance(len);
                let span = self.span(old_loc);
                let token = ok!(self.make_command(source, span));
                if token.is_opening("literal") {
                    self.literal_start = Some(span);
                }
                Ok(Some(token))
            }
            Scan::Unterminated(state) => {
                let source = self.advance(1);
                let span = self.span(old_loc);
                let msg = match state {
                    ScanState::InQuotedValue { .. } => "unterminated quoted value in command",
                    _ => "unclosed command, missing `}`",
                };
                Err(self.syntax_error(msg, span).with_token(source, span))
            }
        }
    }

    #[inline]
    fn rest(&self) -> &'s str {
        &self.source[self.offset..]
    }

    fn after_whitespace(&self) -> bool {
        match self.offset.checked_sub(1) {
            Some(prev) => self.source.as_bytes()[prev].is_ascii_whitespace(),
            None => true,
        }
    }

    fn advance(&mut self, bytes: usize) -> &'s str {
        let skipped = &self.source[self.offset..self.offset + bytes];
        for c in skipped.chars() {
            match c {
                '\n' => {
                    self.current_line += 1;
                    self.current_col = 0;
                }
                _ => self.current_col += 1,
            }
        }
        self.offset += bytes;
        skipped
    }

    #[inline]
    fn loc(&self) -> (u32, u32, u32) {
        (self.current_line, self.current_col, self.offset as u32)
    }

    #[inline]
    fn span(&self, (start_line, start_col, start_offset): (u32, u32, u32)) -> Span {
        Span {
            start_line,
            start_col,
            start_offset,
            end_line: self.current_line,
            end_col: self.current_col,
            end_offset: self.offset as u32,
        }
    }

    fn syntax_error(&self, msg: &'static str, span: Span) -> Error {
        let mut err = Error::new(ErrorKind::SyntaxError, msg);
        err.set_filename(self.filename);
        err.set_span(span);
        err
    }

    fn tokenize_literal(&mut self) -> Result<Token<'s>, Error> {
        const END_LITERAL: &str = "{/literal}";
        let old_loc = self.loc();
        match self.rest().find(END_LITERAL) {
            Some(0) => {
                self.literal_start = None;
                let source = self.advance(END_LITERAL.len());
                Ok(Token::command(
                    source,
                    &source[2..END_LITERAL.len() - 1],
                    true,
                    None,
                    self.span(old_loc),
                ))
            }
            Some(end) => {
                let source = self.advance(end);
                Ok(Token::code(source, self.span(old_loc)))
            }
            None => {
                let span = self.literal_start.take().unwrap_or_default();
                self.advance(self.rest().len());
                Err(self.syntax_error("unclosed literal block", span))
            }
        }
    }

    /// Classifies the contents of a `{...}` span.
    fn make_command(&self, source: &'s str, span: Span) -> Result<Token<'s>, Error> {
        let body = source[1..source.len() - 1].trim();
        let fail = |msg| Err(self.syntax_error(msg, span).with_token(source, span));

        if body.is_empty() {
            return fail("empty command");
        }

        // {$name} is shorthand for {print $name}
        if body.starts_with('$') {
            return Ok(Token::command(source, "print", false, Some(body), span));
        }

        // special characters: {\n}, {\r}, {\t}
        if body.starts_with('\\') {
            return match body {
                "\\n" | "\\r" | "\\t" => Ok(Token::command(source, body, false, None, span)),
                _ => fail("unknown special character command"),
            };
        }

        let (closing, body) = match body.strip_prefix('/') {
            Some(rest) => (true, rest.trim_start()),
            None => (false, body),
        };
        let name_len = lex_identifier(body);
        if name_len == 0 {
            return fail("expected a command name");
        }
        let (name, rest) = body.split_at(name_len);
        if !rest.is_empty() && !rest.starts_with(|c: char| c.is_whitespace()) {
            return fail("unexpected character after command name");
        }
        let exp = Some(rest.trim()).filter(|x| !x.is_empty());
        Ok(Token::command(source, name, closing, exp, span))
    }
}

/// Utility function to tokenize into an iterator.
pub fn tokenize<'s>(
    source: &'s str,
    filename: &'s str,
) -> impl Iterator<Item = Result<Token<'s>, Error>> {
    let mut tokenizer = Tokenizer::new(source, filename);
    let mut failed = false;
    std::iter::from_fn(move || {
        if failed {
            return None;
        }
        let rv = tokenizer.next_token().transpose();
        failed = matches!(rv, Some(Err(_)));
        rv
    })
}

/// Tokenizes a template source into a list of tokens.
///
/// Every character of the source is covered by exactly one token so
/// concatenating the `source` of the returned tokens gives back the input.
/// The filename is only used for error reporting.
pub fn tokenize_source<'s>(source: &'s str, filename: &'s str) -> Result<Vec<Token<'s>>, Error> {
    let rv = tokenize(source, filename).collect::<Result<Vec<_>, _>>();
    if let Ok(ref tokens) = rv {
        tracing::trace!(filename, tokens = tokens.len(), "tokenized template source");
    }
    rv
}

/// Removes tokens that have no effect on the rendered output.
///
/// This drops comments, `{nil}` commands and whitespace-only text between
/// template blocks.  The remaining tokens are kept as they are; adjacent
/// code tokens are not merged.
pub fn filter_tokens<'s>(tokens: &[Token<'s>]) -> Vec<Token<'s>> {
    let mut depth = 0usize;
    tokens
        .iter()
        .filter(|token| match token.kind {
            TokenKind::Comment => false,
            TokenKind::Command => {
                if token.is_opening("template") {
                    depth += 1;
                } else if token.is_closing("template") {
                    depth = depth.saturating_sub(1);
                }
                token.command != Some("nil")
            }
            TokenKind::Code => depth > 0 || !token.source.trim().is_empty(),
        })
        .copied()
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    fn kinds(source: &str) -> Vec<(TokenKind, &str)> {
        tokenize_source(source, "<test>")
            .unwrap()
            .into_iter()
            .map(|x| (x.kind, x.source))
            .collect()
    }

    #[test]
    fn test_scan() {
        assert_eq!(scan(b"hello"), Scan::Text(5));
        assert_eq!(scan(b"hello {x}"), Scan::Text(6));
        assert_eq!(scan(b"{x} tail"), Scan::Command(3));
        assert_eq!(scan(b"{a {b} c}"), Scan::Command(9));
        assert_eq!(scan(br#"{msg desc="}"}"#), Scan::Command(14));
        assert_eq!(scan(br#"{msg desc="a\"}"}"#), Scan::Command(17));
        assert_eq!(
            scan(b"{msg"),
            Scan::Unterminated(ScanState::InCommand { depth: 0 })
        );
        assert_eq!(
            scan(b"{msg desc='oops}"),
            Scan::Unterminated(ScanState::InQuotedValue {
                quote: b'\'',
                depth: 0
            })
        );
    }

    #[test]
    fn test_comment_detection() {
        assert_eq!(comment_len(b"/* x */ y", 0, false), Some(Ok(7)));
        assert_eq!(comment_len(b"/* x", 0, false), Some(Err(())));
        assert_eq!(comment_len(b"// x\ny", 0, true), Some(Ok(4)));
        assert_eq!(comment_len(b"// x\ny", 0, false), None);
        assert_eq!(comment_len(b"a // x", 2, false), Some(Ok(4)));
        assert_eq!(comment_len(b"http://x", 5, false), None);
    }

    #[test]
    fn test_text_and_commands() {
        assert_eq!(
            kinds("Hello {$name}!"),
            vec![
                (TokenKind::Code, "Hello "),
                (TokenKind::Command, "{$name}"),
                (TokenKind::Code, "!"),
            ]
        );
    }

    #[test]
    fn test_comments() {
        assert_eq!(
            kinds("/** doc */\na // line\nb http://x"),
            vec![
                (TokenKind::Comment, "/** doc */"),
                (TokenKind::Code, "\na "),
                (TokenKind::Comment, "// line"),
                (TokenKind::Code, "\nb http://x"),
            ]
        );
    }

    #[test]
    fn test_literal() {
        let tokens = tokenize_source("{literal}{x} /* y */{/literal}", "<test>").unwrap();
        assert_eq!(tokens.len(), 3);
        assert!(tokens[0].is_opening("literal"));
        assert_eq!(tokens[1].kind, TokenKind::Code);
        assert_eq!(tokens[1].source, "{x} /* y */");
        assert!(tokens[2].is_closing("literal"));
    }

    #[test]
    fn test_command_classification() {
        let tokens = tokenize_source(
            r#"{msg meaning="a" desc="b c"}{/msg}{print $x}{\n}"#,
            "<test>",
        )
        .unwrap();
        assert_eq!(tokens[0].command, Some("msg"));
        assert_eq!(tokens[0].exp, Some(r#"meaning="a" desc="b c""#));
        assert!(!tokens[0].closing);
        assert_eq!(tokens[1].command, Some("msg"));
        assert!(tokens[1].closing);
        assert_eq!(tokens[1].exp, None);
        assert_eq!(tokens[2].command, Some("print"));
        assert_eq!(tokens[2].exp, Some("$x"));
        assert_eq!(tokens[3].command, Some("\\n"));
    }

    #[test]
    fn test_filter() {
        let tokens = tokenize_source(
            "{namespace a}\n\n/** x */\n{template .A}\n  {nil}hi // there\n{/template}\n",
            "<test>",
        )
        .unwrap();
        let filtered = filter_tokens(&tokens);
        let sources: Vec<_> = filtered.iter().map(|x| x.source).collect();
        assert_eq!(
            sources,
            vec![
                "{namespace a}",
                "{template .A}",
                "\n  ",
                "hi ",
                "\n",
                "{/template}"
            ]
        );
    }
}
