use std::fmt;

/// The classification of a [`Token`].
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum TokenKind {
    /// Literal output text.
    Code,
    /// A `{...}` delimited language directive.
    Command,
    /// A `/* ... */` or `// ...` comment.  Removed by
    /// [`filter_tokens`](crate::compiler::lexer::filter_tokens).
    Comment,
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TokenKind::Code => f.write_str("code"),
            TokenKind::Command => f.write_str("command"),
            TokenKind::Comment => f.write_str("comment"),
        }
    }
}

/// Represents a token in the stream.
///
/// Tokens borrow from the template source.  The `source` of a token is the
/// exact text it spans so that concatenating all tokens of a stream yields
/// the original input.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Token<'s> {
    /// The exact substring of the input this token covers.
    pub source: &'s str,
    /// Code, command or comment.
    pub kind: TokenKind,
    /// The directive name of a command (`template`, `print`, `msg`, ...).
    pub command: Option<&'s str>,
    /// `true` for commands closing a block (`{/msg}`).
    pub closing: bool,
    /// The expression or attribute string following the directive name.
    pub exp: Option<&'s str>,
    /// Where the token is located in the input.
    pub span: Span,
}

impl<'s> Token<'s> {
    /// Creates a code token.
    pub fn code(source: &'s str, span: Span) -> Token<'s> {
        Token {
            source,
            kind: TokenKind::Code,
            command: None,
            closing: false,
            exp: None,
            span,
        }
    }

    /// Creates a comment token.
    pub fn comment(source: &'s str, span: Span) -> Token<'s> {
        Token {
            kind: TokenKind::Comment,
            ..Token::code(source, span)
        }
    }

    /// Creates a command token.
    pub fn command(
        source: &'s str,
        command: &'s str,
        closing: bool,
        exp: Option<&'s str>,
        span: Span,
    ) -> Token<'s> {
        Token {
            source,
            kind: TokenKind::Command,
            command: Some(command),
            closing,
            exp,
            span,
        }
    }

    /// Returns `true` if this is an opening command with the given name.
    pub fn is_opening(&self, name: &str) -> bool {
        self.kind == TokenKind::Command && !self.closing && self.command == Some(name)
    }

    /// Returns `true` if this is a closing command with the given name.
    pub fn is_closing(&self, name: &str) -> bool {
        self.kind == TokenKind::Command && self.closing && self.command == Some(name)
    }
}

impl fmt::Debug for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind {
            TokenKind::Command => {
                ok!(write!(
                    f,
                    "Command({}{:?}",
                    if self.closing { "/" } else { "" },
                    self.command.unwrap_or("")
                ));
                if let Some(exp) = self.exp {
                    ok!(write!(f, ", {:?}", exp));
                }
                ok!(f.write_str(")"));
            }
            TokenKind::Code => ok!(write!(f, "Code({:?})", self.source)),
            TokenKind::Comment => ok!(write!(f, "Comment({:?})", self.source)),
        }
        fmt::Debug::fmt(&self.span, f)
    }
}

/// Token span information
#[derive(Clone, Copy, Default, PartialEq, Eq)]
pub struct Span {
    pub start_line: u32,
    pub start_col: u32,
    pub start_offset: u32,
    pub end_line: u32,
    pub end_col: u32,
    pub end_offset: u32,
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            " @ {}:{}-{}:{}",
            self.start_line, self.start_col, self.end_line, self.end_col
        )
    }
}
