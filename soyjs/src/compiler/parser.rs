use std::borrow::Cow;

use crate::compiler::ast::{self, Spanned, Stmt};
use crate::compiler::attributes::{parse_command_attributes, ParsedAttributes};
use crate::compiler::expression::parse_expr;
use crate::compiler::msg::{create_msg_from_tokens, join_code, special_char};
use crate::compiler::tokens::{Span, Token, TokenKind};
use crate::error::{Error, ErrorKind};

/// Maximum depth of nested blocks, including the template itself.
const MAX_RECURSION: usize = 100;

fn compile_error<D: Into<Cow<'static, str>>>(msg: D, token: &Token<'_>) -> Error {
    Error::new(ErrorKind::CompileError, msg).with_token(token.source, token.span)
}

macro_rules! compile_error {
    ($token:expr, $msg:expr) => {{
        return Err(compile_error($msg, $token));
    }};
    ($token:expr, $msg:expr, $($tt:tt)*) => {{
        return Err(compile_error(format!($msg, $($tt)*), $token));
    }};
}

fn expand_span(start: Span, end: Span) -> Span {
    Span {
        end_line: end.end_line,
        end_col: end.end_col,
        end_offset: end.end_offset,
        ..start
    }
}

/// An open block on the parser stack.  An empty stack means the parser is
/// outside of any template.
enum Frame<'a> {
    Template {
        token: Token<'a>,
        name: String,
        local_name: &'a str,
        attributes: ParsedAttributes,
        body: Vec<Stmt<'a>>,
    },
    If {
        token: Token<'a>,
        branches: Vec<ast::IfBranch<'a>>,
        /// The condition of the branch being collected, `None` in `else`.
        cond: Option<ast::Expr<'a>>,
        body: Vec<Stmt<'a>>,
    },
    Literal {
        token: Token<'a>,
        body: Vec<Stmt<'a>>,
    },
}

impl<'a> Frame<'a> {
    fn token(&self) -> &Token<'a> {
        match self {
            Frame::Template { token, .. } | Frame::If { token, .. } | Frame::Literal { token, .. } => {
                token
            }
        }
    }

    fn body_mut(&mut self) -> &mut Vec<Stmt<'a>> {
        match self {
            Frame::Template { body, .. } | Frame::If { body, .. } | Frame::Literal { body, .. } => {
                body
            }
        }
    }

    fn block_name(&self) -> &'static str {
        match self {
            Frame::Template { .. } => "template",
            Frame::If { .. } => "if",
            Frame::Literal { .. } => "literal",
        }
    }
}

struct Parser<'a, 't> {
    tokens: &'t [Token<'a>],
    pos: usize,
    unit: ast::Unit<'a>,
    stack: Vec<Frame<'a>>,
    code_start: Option<usize>,
}

impl<'a, 't> Parser<'a, 't> {
    fn new(tokens: &'t [Token<'a>]) -> Parser<'a, 't> {
        Parser {
            tokens,
            pos: 0,
            unit: ast::Unit::default(),
            stack: Vec::new(),
            code_start: None,
        }
    }

    fn parse(mut self) -> Result<ast::Unit<'a>, Error> {
        let tokens = self.tokens;
        while let Some(token) = tokens.get(self.pos) {
            match token.kind {
                TokenKind::Code => {
                    if matches!(self.stack.last(), Some(Frame::Literal { .. })) {
                        self.push_stmt(Stmt::EmitRaw(Spanned::new(
                            ast::EmitRaw {
                                raw: Cow::Borrowed(token.source),
                            },
                            token.span,
                        )));
                    } else if self.code_start.is_none() {
                        self.code_start = Some(self.pos);
                    }
                    self.pos += 1;
                }
                TokenKind::Comment => self.pos += 1,
                TokenKind::Command => {
                    ok!(self.flush_code());
                    ok!(self.parse_command(token));
                }
            }
        }
        ok!(self.flush_code());

        if let Some(frame) = self.stack.last() {
            compile_error!(
                frame.token(),
                "unexpected end of input, `{}` block was never closed",
                frame.block_name()
            );
        }

        tracing::debug!(
            namespace = self.unit.namespace,
            templates = self.unit.templates.len(),
            "parsed template unit"
        );
        Ok(self.unit)
    }

    fn push_stmt(&mut self, stmt: Stmt<'a>) {
        if let Some(frame) = self.stack.last_mut() {
            frame.body_mut().push(stmt);
        }
    }

    /// Emits the pending run of code tokens as one joined text node.
    fn flush_code(&mut self) -> Result<(), Error> {
        let start = match self.code_start.take() {
            Some(start) => start,
            None => return Ok(()),
        };
        let tokens = self.tokens;
        let run = &tokens[start..self.pos];
        let text = join_code(run);
        if text.is_empty() {
            return Ok(());
        }
        let span = expand_span(run[0].span, run[run.len() - 1].span);
        if self.stack.is_empty() {
            // whitespace between declarations of an unfiltered stream
            if text.trim().is_empty() {
                return Ok(());
            }
            let token = run
                .iter()
                .find(|x| x.kind == TokenKind::Code && !x.source.trim().is_empty())
                .unwrap_or(&run[0]);
            compile_error!(token, "text outside of template");
        }
        self.push_stmt(Stmt::EmitRaw(Spanned::new(ast::EmitRaw { raw: text }, span)));
        Ok(())
    }

    fn parse_command(&mut self, token: &'t Token<'a>) -> Result<(), Error> {
        let command = token.command.unwrap_or("");

        if let Some(Frame::Literal { .. }) = self.stack.last() {
            if !token.is_closing("literal") {
                compile_error!(token, "unexpected command in literal block");
            }
        }

        if token.closing {
            return self.parse_closing(token, command);
        }

        match command {
            "namespace" => return self.parse_namespace(token),
            "template" => return self.parse_template(token),
            _ => {}
        }
        if self.stack.is_empty() {
            compile_error!(token, "command `{}` outside of template", command);
        }

        match command {
            "print" => {
                let expr = ok!(self.parse_expression(token));
                self.push_stmt(Stmt::EmitExpr(Spanned::new(
                    ast::EmitExpr {
                        expr,
                        source: token.exp.unwrap_or(""),
                    },
                    token.span,
                )));
                self.pos += 1;
            }
            "if" => {
                let cond = ok!(self.parse_expression(token));
                ok!(self.check_depth(token));
                self.stack.push(Frame::If {
                    token: *token,
                    branches: Vec::new(),
                    cond: Some(cond),
                    body: Vec::new(),
                });
                self.pos += 1;
            }
            "elseif" => {
                let expr = ok!(self.parse_expression(token));
                match self.stack.last_mut() {
                    Some(Frame::If {
                        branches,
                        cond,
                        body,
                        ..
                    }) => match cond.take() {
                        Some(prev) => {
                            branches.push(ast::IfBranch {
                                expr: prev,
                                body: std::mem::take(body),
                            });
                            *cond = Some(expr);
                        }
                        None => compile_error!(token, "`elseif` after `else`"),
                    },
                    _ => compile_error!(token, "`elseif` outside of `if` block"),
                }
                self.pos += 1;
            }
            "else" => {
                match self.stack.last_mut() {
                    Some(Frame::If {
                        branches,
                        cond,
                        body,
                        ..
                    }) => match cond.take() {
                        Some(prev) => branches.push(ast::IfBranch {
                            expr: prev,
                            body: std::mem::take(body),
                        }),
                        None => compile_error!(token, "duplicate `else` in `if` block"),
                    },
                    _ => compile_error!(token, "`else` outside of `if` block"),
                }
                self.pos += 1;
            }
            "msg" => ok!(self.parse_msg(token)),
            "literal" => {
                ok!(self.check_depth(token));
                self.stack.push(Frame::Literal {
                    token: *token,
                    body: Vec::new(),
                });
                self.pos += 1;
            }
            other => match special_char(other) {
                Some(text) => {
                    if !text.is_empty() {
                        self.push_stmt(Stmt::EmitRaw(Spanned::new(
                            ast::EmitRaw {
                                raw: Cow::Borrowed(text),
                            },
                            token.span,
                        )));
                    }
                    self.pos += 1;
                }
                None => compile_error!(token, "unknown command `{}`", other),
            },
        }
        Ok(())
    }

    fn check_depth(&self, token: &Token<'a>) -> Result<(), Error> {
        if self.stack.len() >= MAX_RECURSION {
            compile_error!(token, "template blocks are nested too deeply");
        }
        Ok(())
    }

    fn parse_expression(&self, token: &Token<'a>) -> Result<ast::Expr<'a>, Error> {
        let exp = match token.exp {
            Some(exp) => exp,
            None => compile_error!(
                token,
                "`{}` requires an expression",
                token.command.unwrap_or("")
            ),
        };
        parse_expr(exp).map_err(|err| err.with_token(token.source, token.span))
    }

    fn parse_namespace(&mut self, token: &Token<'a>) -> Result<(), Error> {
        if !self.stack.is_empty() {
            compile_error!(token, "namespace must be declared outside of templates");
        }
        if self.unit.namespace.is_some() {
            compile_error!(token, "namespace was already declared");
        }
        let name = match token.exp.and_then(|x| x.split_whitespace().next()) {
            Some(name) => name,
            None => compile_error!(token, "namespace requires a name"),
        };
        if !is_dotted_name(name) {
            compile_error!(token, "invalid namespace `{}`", name);
        }
        self.unit.namespace = Some(name);
        self.pos += 1;
        Ok(())
    }

    fn parse_template(&mut self, token: &Token<'a>) -> Result<(), Error> {
        if !self.stack.is_empty() {
            compile_error!(token, "templates cannot be nested");
        }
        let local_name = match token.exp.and_then(|x| x.split_whitespace().next()) {
            Some(name) => name,
            None => compile_error!(token, "template requires a name"),
        };
        let name = match local_name.strip_prefix('.') {
            Some(short) if is_dotted_name(short) && !short.contains('.') => {
                match self.unit.namespace {
                    Some(ns) => format!("{}.{}", ns, short),
                    None => compile_error!(
                        token,
                        "template `{}` needs a namespace declaration",
                        local_name
                    ),
                }
            }
            None if is_dotted_name(local_name) && local_name.contains('.') => local_name.to_string(),
            _ => compile_error!(token, "invalid template name `{}`", local_name),
        };
        if self.unit.templates.iter().any(|x| x.name == name) {
            compile_error!(token, "duplicate template `{}`", name);
        }
        let attributes = ok!(parse_command_attributes(token));
        self.stack.push(Frame::Template {
            token: *token,
            name,
            local_name,
            attributes,
            body: Vec::new(),
        });
        self.pos += 1;
        Ok(())
    }

    fn parse_msg(&mut self, token: &Token<'a>) -> Result<(), Error> {
        let end = match self.tokens[self.pos..].iter().position(|x| x.is_closing("msg")) {
            Some(offset) => self.pos + offset,
            None => compile_error!(token, "unexpected end of input, `msg` block was never closed"),
        };
        let msg = ok!(create_msg_from_tokens(&self.tokens[self.pos..=end]));
        let span = expand_span(token.span, self.tokens[end].span);
        self.push_stmt(Stmt::Msg(Spanned::new(msg, span)));
        self.pos = end + 1;
        Ok(())
    }

    fn parse_closing(&mut self, token: &Token<'a>, command: &str) -> Result<(), Error> {
        match self.stack.last().map(|x| x.block_name()) {
            Some(expected) if expected == command => {}
            Some(expected) => compile_error!(
                token,
                "unexpected `/{}`, expected `/{}`",
                command,
                expected
            ),
            None => compile_error!(token, "unexpected closing command `/{}`", command),
        }
        let frame = self.stack.pop();
        self.pos += 1;

        match frame {
            Some(Frame::Template {
                token: start,
                name,
                local_name,
                attributes,
                body,
            }) => {
                tracing::trace!(template = %name, "parsed template");
                self.unit.templates.push(Spanned::new(
                    ast::Template {
                        name,
                        local_name,
                        attributes,
                        body,
                    },
                    expand_span(start.span, token.span),
                ));
            }
            Some(Frame::If {
                token: start,
                mut branches,
                cond,
                body,
            }) => {
                let else_body = match cond {
                    Some(expr) => {
                        branches.push(ast::IfBranch { expr, body });
                        None
                    }
                    None => Some(body),
                };
                self.push_stmt(Stmt::IfCond(Spanned::new(
                    ast::IfCond {
                        branches,
                        else_body,
                    },
                    expand_span(start.span, token.span),
                )));
            }
            Some(Frame::Literal { body, .. }) => {
                for stmt in body {
                    self.push_stmt(stmt);
                }
            }
            None => {}
        }
        Ok(())
    }
}

fn is_dotted_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .split('.')
            .all(|part| crate::compiler::naming::is_identifier(part))
}

/// Parses a token stream into a template unit.
///
/// The tokens may be filtered or not; comments are skipped.
pub fn parse<'a>(tokens: &[Token<'a>]) -> Result<ast::Unit<'a>, Error> {
    Parser::new(tokens).parse()
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::compiler::lexer::tokenize_source;

    fn parse_source(source: &str) -> Result<ast::Unit<'_>, Error> {
        parse(&tokenize_source(source, "<test>").unwrap())
    }

    fn raw_texts<'a>(body: &'a [Stmt<'_>]) -> Vec<&'a str> {
        body.iter()
            .filter_map(|x| match x {
                Stmt::EmitRaw(raw) => Some(&*raw.raw),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn test_templates() {
        let unit = parse_source(
            "{namespace test.templates}\n\n/** doc */\n{template .A}\n  Hello\n  world!\n{/template}\n{template other.B private=\"true\"}{/template}\n",
        )
        .unwrap();
        assert_eq!(unit.namespace, Some("test.templates"));
        assert_eq!(unit.templates.len(), 2);
        assert_eq!(unit.templates[0].name, "test.templates.A");
        assert_eq!(unit.templates[0].local_name, ".A");
        assert_eq!(raw_texts(&unit.templates[0].body), vec!["Hello world!"]);
        assert_eq!(unit.templates[1].name, "other.B");
        assert_eq!(unit.templates[1].attributes.get("private"), Some("true"));
    }

    #[test]
    fn test_if_chain() {
        let unit = parse_source(
            "{namespace a}{template .A}{if $x}1{elseif $y}2{elseif $z}3{else}4{/if}{if $q}5{/if}{/template}",
        )
        .unwrap();
        let body = &unit.templates[0].body;
        assert_eq!(body.len(), 2);
        match &body[0] {
            Stmt::IfCond(cond) => {
                assert_eq!(cond.branches.len(), 3);
                assert_eq!(cond.branches[1].expr, ast::Expr::Var("y"));
                assert_eq!(raw_texts(cond.else_body.as_deref().unwrap()), vec!["4"]);
            }
            other => panic!("unexpected {:?}", other),
        }
        match &body[1] {
            Stmt::IfCond(cond) => {
                assert_eq!(cond.branches.len(), 1);
                assert!(cond.else_body.is_none());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_literal_and_specials() {
        let unit = parse_source(
            "{namespace a}{template .A}{literal}{x}\n  y{/literal}{sp}{nil}{lb}{rb}{\\n}{/template}",
        )
        .unwrap();
        assert_eq!(
            raw_texts(&unit.templates[0].body),
            vec!["{x}\n  y", " ", "{", "}", "\n"]
        );
    }

    #[test]
    fn test_errors() {
        for (source, detail) in [
            ("{template .A}{/template}", "needs a namespace"),
            ("{namespace a}{template .A}", "never closed"),
            ("{namespace a}{template .A}{if $x}{/template}", "expected `/if`"),
            ("{namespace a}{template .A}{else}{/template}", "outside of `if`"),
            ("{namespace a}{template .A}{if $x}{else}{else}{/if}{/template}", "duplicate `else`"),
            ("{namespace a}{template .A}{if $x}{else}{elseif $y}{/if}{/template}", "after `else`"),
            ("{namespace a}{template .A}{if}{/if}{/template}", "requires an expression"),
            ("{namespace a}{template .A}{template .B}{/template}{/template}", "cannot be nested"),
            ("{namespace a}{template .A}{/template}{template .A}{/template}", "duplicate template"),
            ("{namespace a}{template .A}{foreach $x in $y}{/foreach}{/template}", "unknown command"),
            ("{namespace a}{template .A}{msg}x{/template}", "never closed"),
            ("{namespace a}hello{template .A}{/template}", "outside of template"),
            ("{namespace a}{print $x}", "outside of template"),
            ("{/if}", "unexpected closing"),
            ("{namespace a}{namespace b}", "already declared"),
        ] {
            let err = parse_source(source).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CompileError, "{}", source);
            let msg = err.to_string();
            assert!(msg.contains(detail), "{}: {}", source, msg);
        }
    }

    #[test]
    fn test_unfiltered_whitespace_between_declarations() {
        let unit = parse_source("{namespace a} {template .A}x{/template} \t{template .B}{/template} ")
            .unwrap();
        assert_eq!(unit.templates.len(), 2);
        assert_eq!(raw_texts(&unit.templates[0].body), vec!["x"]);
    }

    #[test]
    fn test_nesting_limit() {
        let nested = |depth: usize| {
            format!(
                "{{namespace a}}{{template .A}}{}x{}{{/template}}",
                "{if $x}".repeat(depth),
                "{/if}".repeat(depth)
            )
        };
        assert!(parse_source(&nested(MAX_RECURSION - 1)).is_ok());
        let err = parse_source(&nested(5000)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::CompileError);
        assert!(err.to_string().contains("nested too deeply"));
        assert_eq!(err.fragment(), Some("{if $x}"));
    }

    #[test]
    fn test_error_location() {
        let err = parse_source("{namespace a}\n{template .A}\n  {bogus}\n{/template}").unwrap_err();
        assert_eq!(err.line(), Some(3));
        assert_eq!(err.fragment(), Some("{bogus}"));
    }
}
