use std::borrow::Cow;
use std::fmt;

use crate::compiler::ast::{self, BinOpKind, Const, Expr, UnaryOpKind};
use crate::error::{Error, ErrorKind};

const MAX_RECURSION: usize = 100;

/// A token of the expression language used by `print`, `if` and `elseif`.
#[derive(Debug, Clone, PartialEq)]
enum ExprToken<'a> {
    Var(&'a str),
    Ident(&'a str),
    Str(Cow<'a, str>),
    Int(i64),
    Float(f64),
    Dot,
    BracketOpen,
    BracketClose,
    ParenOpen,
    ParenClose,
    Question,
    Colon,
    Bang,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    AndAnd,
    OrOr,
    Plus,
    Minus,
    Mul,
    Div,
    Mod,
}

impl fmt::Display for ExprToken<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExprToken::Var(name) => write!(f, "`${}`", name),
            ExprToken::Ident(name) => write!(f, "`{}`", name),
            ExprToken::Str(_) => f.write_str("string"),
            ExprToken::Int(_) | ExprToken::Float(_) => f.write_str("number"),
            ExprToken::Dot => f.write_str("`.`"),
            ExprToken::BracketOpen => f.write_str("`[`"),
            ExprToken::BracketClose => f.write_str("`]`"),
            ExprToken::ParenOpen => f.write_str("`(`"),
            ExprToken::ParenClose => f.write_str("`)`"),
            ExprToken::Question => f.write_str("`?`"),
            ExprToken::Colon => f.write_str("`:`"),
            ExprToken::Bang => f.write_str("`!`"),
            ExprToken::Eq => f.write_str("`==`"),
            ExprToken::Ne => f.write_str("`!=`"),
            ExprToken::Lt => f.write_str("`<`"),
            ExprToken::Lte => f.write_str("`<=`"),
            ExprToken::Gt => f.write_str("`>`"),
            ExprToken::Gte => f.write_str("`>=`"),
            ExprToken::AndAnd => f.write_str("`&&`"),
            ExprToken::OrOr => f.write_str("`||`"),
            ExprToken::Plus => f.write_str("`+`"),
            ExprToken::Minus => f.write_str("`-`"),
            ExprToken::Mul => f.write_str("`*`"),
            ExprToken::Div => f.write_str("`/`"),
            ExprToken::Mod => f.write_str("`%`"),
        }
    }
}

fn expression_error<D: Into<Cow<'static, str>>>(msg: D) -> Error {
    Error::new(ErrorKind::CompileError, msg)
}

fn unexpected<D: fmt::Display>(unexpected: D, expected: &str) -> Error {
    expression_error(format!(
        "unexpected {unexpected} in expression, expected {expected}"
    ))
}

fn lex_identifier(s: &str) -> usize {
    s.as_bytes()
        .iter()
        .enumerate()
        .take_while(|&(idx, &c)| c == b'_' || c.is_ascii_alphabetic() || (idx > 0 && c.is_ascii_digit()))
        .count()
}

fn lex_number(s: &str) -> Result<(ExprToken<'static>, usize), Error> {
    let bytes = s.as_bytes();
    let mut len = bytes.iter().take_while(|c| c.is_ascii_digit()).count();
    let mut is_float = false;
    if bytes.get(len) == Some(&b'.') && bytes.get(len + 1).map_or(false, |c| c.is_ascii_digit()) {
        is_float = true;
        len += 1 + bytes[len + 1..].iter().take_while(|c| c.is_ascii_digit()).count();
    }
    if matches!(bytes.get(len), Some(b'e' | b'E')) {
        let mut exp_len = 1;
        if matches!(bytes.get(len + 1), Some(b'+' | b'-')) {
            exp_len += 1;
        }
        let digits = bytes[(len + exp_len).min(bytes.len())..]
            .iter()
            .take_while(|c| c.is_ascii_digit())
            .count();
        if digits > 0 {
            is_float = true;
            len += exp_len + digits;
        }
    }
    let num = &s[..len];
    if is_float {
        match num.parse() {
            Ok(val) => Ok((ExprToken::Float(val), len)),
            Err(_) => Err(expression_error(format!("invalid number `{}`", num))),
        }
    } else {
        match num.parse() {
            Ok(val) => Ok((ExprToken::Int(val), len)),
            // too large for an integer, JS numbers are floats anyways
            Err(_) => match num.parse() {
                Ok(val) => Ok((ExprToken::Float(val), len)),
                Err(_) => Err(expression_error(format!("invalid number `{}`", num))),
            },
        }
    }
}

fn lex_string(s: &str) -> Result<(ExprToken<'_>, usize), Error> {
    let quote = s.as_bytes()[0];
    let mut has_escapes = false;
    let mut idx = 1;
    let bytes = s.as_bytes();
    loop {
        match bytes.get(idx) {
            Some(b'\\') => {
                has_escapes = true;
                idx += 2;
            }
            Some(&c) if c == quote => break,
            Some(_) => idx += 1,
            None => return Err(expression_error("unterminated string in expression")),
        }
    }
    let raw = &s[1..idx];
    let value = if has_escapes {
        Cow::Owned(ok!(unescape(raw)))
    } else {
        Cow::Borrowed(raw)
    };
    Ok((ExprToken::Str(value), idx + 1))
}

fn unescape(s: &str) -> Result<String, Error> {
    let mut rv = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            rv.push(c);
            continue;
        }
        match chars.next() {
            Some('n') => rv.push('\n'),
            Some('r') => rv.push('\r'),
            Some('t') => rv.push('\t'),
            Some('b') => rv.push('\x08'),
            Some('f') => rv.push('\x0c'),
            Some('u') => {
                let hex: String = chars.by_ref().take(4).collect();
                let c = u32::from_str_radix(&hex, 16)
                    .ok()
                    .and_then(char::from_u32)
                    .ok_or_else(|| expression_error("invalid unicode escape in string"))?;
                rv.push(c);
            }
            Some(c @ ('\\' | '\'' | '"' | '/')) => rv.push(c),
            _ => return Err(expression_error("invalid escape in string")),
        }
    }
    Ok(rv)
}

/// Splits an expression into tokens.
fn tokenize_expr(source: &str) -> Result<Vec<ExprToken<'_>>, Error> {
    let mut rv = Vec::new();
    let mut rest = source;
    loop {
        rest = rest.trim_start();
        let c = match rest.chars().next() {
            Some(c) => c,
            None => break,
        };
        macro_rules! op {
            ($len:expr, $tok:expr) => {{
                rv.push($tok);
                rest = &rest[$len..];
                continue;
            }};
        }
        match rest.get(..2) {
            Some("==") => op!(2, ExprToken::Eq),
            Some("!=") => op!(2, ExprToken::Ne),
            Some("<=") => op!(2, ExprToken::Lte),
            Some(">=") => op!(2, ExprToken::Gte),
            Some("&&") => op!(2, ExprToken::AndAnd),
            Some("||") => op!(2, ExprToken::OrOr),
            _ => {}
        }
        match c {
            '.' => op!(1, ExprToken::Dot),
            '[' => op!(1, ExprToken::BracketOpen),
            ']' => op!(1, ExprToken::BracketClose),
            '(' => op!(1, ExprToken::ParenOpen),
            ')' => op!(1, ExprToken::ParenClose),
            '?' => op!(1, ExprToken::Question),
            ':' => op!(1, ExprToken::Colon),
            '!' => op!(1, ExprToken::Bang),
            '<' => op!(1, ExprToken::Lt),
            '>' => op!(1, ExprToken::Gt),
            '+' => op!(1, ExprToken::Plus),
            '-' => op!(1, ExprToken::Minus),
            '*' => op!(1, ExprToken::Mul),
            '/' => op!(1, ExprToken::Div),
            '%' => op!(1, ExprToken::Mod),
            '$' => {
                let len = lex_identifier(&rest[1..]);
                if len == 0 {
                    return Err(expression_error("expected a variable name after `$`"));
                }
                rv.push(ExprToken::Var(&rest[1..len + 1]));
                rest = &rest[len + 1..];
            }
            '"' | '\'' => {
                let (tok, len) = ok!(lex_string(rest));
                rv.push(tok);
                rest = &rest[len..];
            }
            c if c.is_ascii_digit() => {
                let (tok, len) = ok!(lex_number(rest));
                rv.push(tok);
                rest = &rest[len..];
            }
            c if c == '_' || c.is_ascii_alphabetic() => {
                let len = lex_identifier(rest);
                rv.push(ExprToken::Ident(&rest[..len]));
                rest = &rest[len..];
            }
            c => {
                return Err(expression_error(format!(
                    "unexpected character `{}` in expression",
                    c
                )))
            }
        }
    }
    Ok(rv)
}

macro_rules! binop {
    ($func:ident, $next:ident, { $($tok:tt)* }) => {
        fn $func(&mut self) -> Result<Expr<'a>, Error> {
            let mut left = ok!(self.$next());
            loop {
                let op = match self.current() {
                    $($tok)*
                    _ => break,
                };
                self.next();
                let right = ok!(self.$next());
                left = Expr::BinOp(Box::new(ast::BinOp { op, left, right }));
            }
            Ok(left)
        }
    };
}

struct ExprParser<'a> {
    tokens: std::vec::IntoIter<ExprToken<'a>>,
    current: Option<ExprToken<'a>>,
    depth: usize,
}

impl<'a> ExprParser<'a> {
    fn new(tokens: Vec<ExprToken<'a>>) -> ExprParser<'a> {
        let mut tokens = tokens.into_iter();
        let current = tokens.next();
        ExprParser {
            tokens,
            current,
            depth: 0,
        }
    }

    fn current(&self) -> Option<&ExprToken<'a>> {
        self.current.as_ref()
    }

    fn next(&mut self) -> Option<ExprToken<'a>> {
        std::mem::replace(&mut self.current, self.tokens.next())
    }

    fn expect(&mut self, expected: ExprToken<'a>, what: &str) -> Result<(), Error> {
        match self.next() {
            Some(tok) if tok == expected => Ok(()),
            Some(tok) => Err(unexpected(tok, what)),
            None => Err(unexpected("end of expression", what)),
        }
    }

    fn parse_expr(&mut self) -> Result<Expr<'a>, Error> {
        self.depth += 1;
        if self.depth > MAX_RECURSION {
            return Err(expression_error("expression is nested too deeply"));
        }
        let rv = self.parse_ifexpr();
        self.depth -= 1;
        rv
    }

    fn parse_ifexpr(&mut self) -> Result<Expr<'a>, Error> {
        let test_expr = ok!(self.parse_or());
        if !matches!(self.current(), Some(ExprToken::Question)) {
            return Ok(test_expr);
        }
        self.next();
        let true_expr = ok!(self.parse_expr());
        ok!(self.expect(ExprToken::Colon, "`:`"));
        let false_expr = ok!(self.parse_expr());
        Ok(Expr::IfExpr(Box::new(ast::IfExpr {
            test_expr,
            true_expr,
            false_expr,
        })))
    }

    binop!(parse_or, parse_and, {
        Some(ExprToken::OrOr | ExprToken::Ident("or")) => BinOpKind::ScOr,
    });
    binop!(parse_and, parse_equality, {
        Some(ExprToken::AndAnd | ExprToken::Ident("and")) => BinOpKind::ScAnd,
    });
    binop!(parse_equality, parse_compare, {
        Some(ExprToken::Eq) => BinOpKind::Eq,
        Some(ExprToken::Ne) => BinOpKind::Ne,
    });
    binop!(parse_compare, parse_additive, {
        Some(ExprToken::Lt) => BinOpKind::Lt,
        Some(ExprToken::Lte) => BinOpKind::Lte,
        Some(ExprToken::Gt) => BinOpKind::Gt,
        Some(ExprToken::Gte) => BinOpKind::Gte,
    });
    binop!(parse_additive, parse_multiplicative, {
        Some(ExprToken::Plus) => BinOpKind::Add,
        Some(ExprToken::Minus) => BinOpKind::Sub,
    });
    binop!(parse_multiplicative, parse_unary, {
        Some(ExprToken::Mul) => BinOpKind::Mul,
        Some(ExprToken::Div) => BinOpKind::Div,
        Some(ExprToken::Mod) => BinOpKind::Rem,
    });

    fn parse_unary(&mut self) -> Result<Expr<'a>, Error> {
        let op = match self.current() {
            Some(ExprToken::Bang | ExprToken::Ident("not")) => UnaryOpKind::Not,
            Some(ExprToken::Minus) => UnaryOpKind::Neg,
            _ => return self.parse_postfix(),
        };
        self.next();
        self.depth += 1;
        if self.depth > MAX_RECURSION {
            return Err(expression_error("expression is nested too deeply"));
        }
        let expr = self.parse_unary();
        self.depth -= 1;
        Ok(Expr::UnaryOp(Box::new(ast::UnaryOp {
            op,
            expr: ok!(expr),
        })))
    }

    fn parse_postfix(&mut self) -> Result<Expr<'a>, Error> {
        let mut expr = ok!(self.parse_primary());
        loop {
            match self.current() {
                Some(ExprToken::Dot) => {
                    self.next();
                    let name = match self.next() {
                        Some(ExprToken::Ident(name)) => name,
                        Some(tok) => return Err(unexpected(tok, "attribute name")),
                        None => return Err(unexpected("end of expression", "attribute name")),
                    };
                    expr = Expr::GetAttr(Box::new(ast::GetAttr { expr, name }));
                }
                Some(ExprToken::BracketOpen) => {
                    self.next();
                    let subscript_expr = ok!(self.parse_expr());
                    ok!(self.expect(ExprToken::BracketClose, "`]`"));
                    expr = Expr::GetItem(Box::new(ast::GetItem {
                        expr,
                        subscript_expr,
                    }));
                }
                _ => break,
            }
        }
        Ok(expr)
    }

    fn parse_primary(&mut self) -> Result<Expr<'a>, Error> {
        match self.next() {
            Some(ExprToken::Var(name)) => Ok(Expr::Var(name)),
            Some(ExprToken::Ident("true")) => Ok(Expr::Const(Const::Bool(true))),
            Some(ExprToken::Ident("false")) => Ok(Expr::Const(Const::Bool(false))),
            Some(ExprToken::Ident("null")) => Ok(Expr::Const(Const::Null)),
            Some(ExprToken::Str(val)) => Ok(Expr::Const(Const::Str(val))),
            Some(ExprToken::Int(val)) => Ok(Expr::Const(Const::Int(val))),
            Some(ExprToken::Float(val)) => Ok(Expr::Const(Const::Float(val))),
            Some(ExprToken::ParenOpen) => {
                let expr = ok!(self.parse_expr());
                ok!(self.expect(ExprToken::ParenClose, "`)`"));
                Ok(expr)
            }
            Some(ExprToken::Ident(name)) => Err(expression_error(format!(
                "unknown name `{}` in expression (data is referenced as `${}`)",
                name, name
            ))),
            Some(tok) => Err(unexpected(tok, "expression")),
            None => Err(unexpected("end of expression", "expression")),
        }
    }
}

/// Parses the expression of a `print`, `if` or `elseif` command.
///
/// Failures are compile errors without location; the caller attaches the
/// command token.
pub fn parse_expr(source: &str) -> Result<Expr<'_>, Error> {
    let tokens = ok!(tokenize_expr(source));
    if tokens.is_empty() {
        return Err(expression_error("expected an expression"));
    }
    let mut parser = ExprParser::new(tokens);
    let expr = ok!(parser.parse_expr());
    match parser.next() {
        None => Ok(expr),
        Some(tok) => Err(unexpected(tok, "end of expression")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    fn var(name: &str) -> Expr<'_> {
        Expr::Var(name)
    }

    fn binop<'a>(op: BinOpKind, left: Expr<'a>, right: Expr<'a>) -> Expr<'a> {
        Expr::BinOp(Box::new(ast::BinOp { op, left, right }))
    }

    #[test]
    fn test_tokenize() {
        assert_eq!(
            tokenize_expr("$a.b[0] >= 'x\\'y' && !$c").unwrap(),
            vec![
                ExprToken::Var("a"),
                ExprToken::Dot,
                ExprToken::Ident("b"),
                ExprToken::BracketOpen,
                ExprToken::Int(0),
                ExprToken::BracketClose,
                ExprToken::Gte,
                ExprToken::Str(Cow::Owned("x'y".into())),
                ExprToken::AndAnd,
                ExprToken::Bang,
                ExprToken::Var("c"),
            ]
        );
        assert_eq!(
            tokenize_expr("1.5 2e3 42").unwrap(),
            vec![
                ExprToken::Float(1.5),
                ExprToken::Float(2000.0),
                ExprToken::Int(42)
            ]
        );
    }

    #[test]
    fn test_precedence() {
        assert_eq!(
            parse_expr("$a or $b and $c").unwrap(),
            binop(
                BinOpKind::ScOr,
                var("a"),
                binop(BinOpKind::ScAnd, var("b"), var("c"))
            )
        );
        assert_eq!(
            parse_expr("1 + 2 * 3 == 7").unwrap(),
            binop(
                BinOpKind::Eq,
                binop(
                    BinOpKind::Add,
                    Expr::Const(Const::Int(1)),
                    binop(
                        BinOpKind::Mul,
                        Expr::Const(Const::Int(2)),
                        Expr::Const(Const::Int(3))
                    )
                ),
                Expr::Const(Const::Int(7))
            )
        );
    }

    #[test]
    fn test_paths() {
        let expr = parse_expr("$config.supportEmail").unwrap();
        assert_eq!(expr.path_tail(), Some("supportEmail"));
        let expr = parse_expr("$items[0].name").unwrap();
        assert_eq!(expr.path_tail(), None);
    }

    #[test]
    fn test_ternary() {
        let expr = parse_expr("$gender == 'f' ? 'girl' : 'boy'").unwrap();
        assert!(matches!(expr, Expr::IfExpr(_)));
    }

    #[test]
    fn test_errors() {
        for source in ["", "$", "$a +", "foo", "$a b", "($a", "'abc", "$a ? 1", "#"] {
            let err = parse_expr(source).unwrap_err();
            assert_eq!(err.kind(), ErrorKind::CompileError, "{}", source);
        }
    }
}
