use std::borrow::Cow;
use std::fmt;

use crate::compiler::tokens::Span;

/// Represents template errors.
///
/// Errors carry the kind of failure, an optional detail message and, where
/// available, the filename, position and the source fragment of the token
/// that caused the failure.  If the template source is known the error can
/// render an excerpt of it with the alternative formatting
/// (``format!("{:#}", err)``).
///
/// # Example
///
/// ```rust
/// let compiler = soyjs::Compiler::new();
/// match compiler.compile_source("{template .Broken}{if $x}", "broken.soy") {
///     Ok(js) => println!("{}", js),
///     Err(err) => {
///         eprintln!("Could not compile template:");
///         eprintln!("  {:#}", err);
///     }
/// }
/// ```
pub struct Error {
    repr: Box<ErrorRepr>,
}

struct ErrorRepr {
    kind: ErrorKind,
    detail: Option<Cow<'static, str>>,
    name: Option<String>,
    lineno: usize,
    span: Option<Span>,
    fragment: Option<String>,
    template_source: Option<String>,
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut err = f.debug_struct("Error");
        err.field("kind", &self.kind());
        if let Some(ref detail) = self.repr.detail {
            err.field("detail", detail);
        }
        if let Some(ref name) = self.name() {
            err.field("name", name);
        }
        if let Some(line) = self.line() {
            err.field("line", &line);
        }
        if let Some(ref fragment) = self.repr.fragment {
            err.field("fragment", fragment);
        }
        if let Some(ref source) = self.repr.source {
            err.field("source", source);
        }
        ok!(err.finish());

        // so that `unwrap()` on a result shows the excerpt as well
        if !f.alternate() && self.repr.template_source.is_some() {
            ok!(writeln!(f));
            ok!(writeln!(f, "{}", self.display_debug_info()));
        }
        Ok(())
    }
}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.kind() == other.kind()
    }
}

impl Eq for Error {}

/// An enum describing the error kind.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ErrorKind {
    /// Malformed delimiters, quotes or comments at the lexical level.
    SyntaxError,
    /// Structural problems: unmatched blocks, unknown commands, bad nesting.
    CompileError,
    /// A template was requested that the compiled unit does not define.
    UnknownTemplate,
    /// An operation failed while rendering (eg: attribute of `undefined`).
    InvalidOperation,
}

impl ErrorKind {
    fn description(self) -> &'static str {
        match self {
            ErrorKind::SyntaxError => "syntax error",
            ErrorKind::CompileError => "compile error",
            ErrorKind::UnknownTemplate => "unknown template",
            ErrorKind::InvalidOperation => "invalid operation",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(ref detail) = self.repr.detail {
            ok!(write!(f, "{}: {}", self.kind(), detail));
        } else {
            ok!(write!(f, "{}", self.kind()));
        }
        if let Some(ref fragment) = self.repr.fragment {
            ok!(write!(f, " at `{}`", fragment));
        }
        match (self.name(), self.line()) {
            (Some(name), Some(line)) => ok!(write!(f, " (in {}:{})", name, line)),
            (Some(name), None) => ok!(write!(f, " (in {})", name)),
            (None, Some(line)) => ok!(write!(f, " (on line {})", line)),
            (None, None) => {}
        }
        if f.alternate() && self.repr.template_source.is_some() {
            ok!(write!(f, "\n{}", self.display_debug_info()));
        }
        Ok(())
    }
}

impl Error {
    /// Creates a new error with kind and detail.
    pub fn new<D: Into<Cow<'static, str>>>(kind: ErrorKind, detail: D) -> Error {
        Error {
            repr: Box::new(ErrorRepr {
                kind,
                detail: Some(detail.into()),
                name: None,
                lineno: 0,
                span: None,
                fragment: None,
                template_source: None,
                source: None,
            }),
        }
    }

    pub(crate) fn set_filename(&mut self, filename: &str) {
        if self.repr.name.is_none() {
            self.repr.name = Some(filename.into());
        }
    }

    pub(crate) fn set_span(&mut self, span: Span) {
        if self.repr.span.is_none() {
            self.repr.lineno = span.start_line as usize;
            self.repr.span = Some(span);
        }
    }

    pub(crate) fn set_fragment(&mut self, fragment: &str) {
        if self.repr.fragment.is_none() {
            self.repr.fragment = Some(fragment.into());
        }
    }

    pub(crate) fn set_template_source(&mut self, source: &str) {
        self.repr.template_source = Some(source.into());
    }

    /// Attaches the span and source fragment of a token to the error.
    pub(crate) fn with_token(mut self, fragment: &str, span: Span) -> Error {
        self.set_span(span);
        self.set_fragment(fragment);
        self
    }

    /// Attaches another error as source to this error.
    pub fn with_source<E: std::error::Error + Send + Sync + 'static>(mut self, source: E) -> Self {
        self.repr.source = Some(Box::new(source));
        self
    }

    /// Returns the error kind
    pub fn kind(&self) -> ErrorKind {
        self.repr.kind
    }

    /// Returns the error detail
    ///
    /// The detail is an error message that provides further details about
    /// the error kind.
    pub fn detail(&self) -> Option<&str> {
        self.repr.detail.as_deref()
    }

    /// Returns the filename of the template that caused the error.
    pub fn name(&self) -> Option<&str> {
        self.repr.name.as_deref()
    }

    /// Returns the line number where the error occurred.
    pub fn line(&self) -> Option<usize> {
        self.repr.span.map(|_| self.repr.lineno)
    }

    /// Returns the byte range of where the error occurred if available.
    pub fn range(&self) -> Option<std::ops::Range<usize>> {
        self.repr
            .span
            .map(|span| span.start_offset as usize..span.end_offset as usize)
    }

    /// Returns the source fragment of the offending token.
    pub fn fragment(&self) -> Option<&str> {
        self.repr.fragment.as_deref()
    }

    /// Returns the template source if it was attached.
    ///
    /// The source is only known when the error was produced by
    /// [`Compiler::compile_source`](crate::Compiler::compile_source) or
    /// [`Compiler::compile_unit_from_source`](crate::Compiler::compile_unit_from_source).
    pub fn template_source(&self) -> Option<&str> {
        self.repr.template_source.as_deref()
    }

    /// Helper function that renders the source excerpt around the error.
    pub fn display_debug_info(&self) -> impl fmt::Display + '_ {
        struct Proxy<'a>(&'a Error);

        impl fmt::Display for Proxy<'_> {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                render_excerpt(f, self.0)
            }
        }

        Proxy(self)
    }
}

fn render_excerpt(f: &mut fmt::Formatter<'_>, err: &Error) -> fmt::Result {
    let source = match err.template_source() {
        Some(source) => source,
        None => return Ok(()),
    };
    let title = match err.name() {
        Some(name) => format!(" {} ", name),
        None => " Template Source ".to_string(),
    };
    ok!(writeln!(f, "{:-^1$}", title, 79));
    let lines: Vec<_> = source.lines().enumerate().collect();
    let idx = err.line().unwrap_or(1).saturating_sub(1);
    let skip = idx.saturating_sub(3);
    for (lineno, line) in lines.iter().skip(skip).take(idx - skip) {
        ok!(writeln!(f, "{:>4} | {}", lineno + 1, line));
    }
    if let Some((lineno, line)) = lines.get(idx) {
        ok!(writeln!(f, "{:>4} > {}", lineno + 1, line));
        if let Some(span) = err.repr.span {
            if span.start_line == span.end_line {
                ok!(writeln!(
                    f,
                    "       {}{} {}",
                    " ".repeat(span.start_col as usize),
                    "^".repeat((span.end_col.saturating_sub(span.start_col) as usize).max(1)),
                    err.kind(),
                ));
            }
        }
    }
    for (lineno, line) in lines.iter().skip(idx + 1).take(3) {
        ok!(writeln!(f, "{:>4} | {}", lineno + 1, line));
    }
    write!(f, "{:~^1$}", "", 79)
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.repr.source.as_ref().map(|err| err.as_ref() as _)
    }
}

impl From<fmt::Error> for Error {
    fn from(err: fmt::Error) -> Self {
        Error::new(ErrorKind::InvalidOperation, "formatting failed").with_source(err)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_with_location() {
        let mut err = Error::new(ErrorKind::CompileError, "unknown command `foo`");
        err.set_filename("hello.soy");
        err.set_span(Span {
            start_line: 3,
            start_col: 2,
            start_offset: 20,
            end_line: 3,
            end_col: 7,
            end_offset: 25,
        });
        err.set_fragment("{foo}");
        assert_eq!(
            err.to_string(),
            "compile error: unknown command `foo` at `{foo}` (in hello.soy:3)"
        );
        assert_eq!(err.range(), Some(20..25));
    }

    #[test]
    fn test_excerpt() {
        let mut err = Error::new(ErrorKind::SyntaxError, "unclosed command");
        err.set_span(Span {
            start_line: 2,
            start_col: 4,
            start_offset: 8,
            end_line: 2,
            end_col: 5,
            end_offset: 9,
        });
        err.set_template_source("line1\nabc {oops\nline3");
        let rendered = format!("{:#}", err);
        assert!(rendered.contains("   2 > abc {oops"));
        assert!(rendered.contains("   1 | line1"));
        assert!(rendered.contains("   3 | line3"));
    }
}
