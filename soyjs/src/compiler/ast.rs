use std::borrow::Cow;
use std::fmt;
use std::ops::Deref;

use crate::compiler::attributes::ParsedAttributes;
use crate::compiler::tokens::Span;

/// Container for nodes with location info.
///
/// This container fulfills two purposes: it adds location information
/// to nodes, but it also ensures the nodes is heap allocated.  The
/// latter is useful to ensure that enum variants do not cause the enum
/// to become too large.
pub struct Spanned<T> {
    inner: Box<(T, Span)>,
}

impl<T> Spanned<T> {
    /// Creates a new spanned node.
    pub fn new(node: T, span: Span) -> Spanned<T> {
        Spanned {
            inner: Box::new((node, span)),
        }
    }

    /// Accesses the span.
    pub fn span(&self) -> Span {
        self.inner.1
    }
}

impl<T> Deref for Spanned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.inner.0
    }
}

impl<T: fmt::Debug> fmt::Debug for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        ok!(fmt::Debug::fmt(&self.inner.0, f));
        write!(f, "{:?}", self.inner.1)
    }
}

/// All templates of one source unit.
#[derive(Debug, Default)]
pub struct Unit<'a> {
    pub namespace: Option<&'a str>,
    pub templates: Vec<Spanned<Template<'a>>>,
}

/// A `{template}` block.
#[derive(Debug)]
pub struct Template<'a> {
    /// The fully qualified name (`test.templates.Simple`).
    pub name: String,
    /// The name as written in the command (`.Simple`).
    pub local_name: &'a str,
    pub attributes: ParsedAttributes,
    pub body: Vec<Stmt<'a>>,
}

/// A statement node.
pub enum Stmt<'a> {
    EmitRaw(Spanned<EmitRaw<'a>>),
    EmitExpr(Spanned<EmitExpr<'a>>),
    IfCond(Spanned<IfCond<'a>>),
    Msg(Spanned<Msg<'a>>),
}

impl fmt::Debug for Stmt<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Stmt::EmitRaw(s) => fmt::Debug::fmt(s, f),
            Stmt::EmitExpr(s) => fmt::Debug::fmt(s, f),
            Stmt::IfCond(s) => fmt::Debug::fmt(s, f),
            Stmt::Msg(s) => fmt::Debug::fmt(s, f),
        }
    }
}

/// Outputs the template source verbatim.
#[derive(Debug)]
pub struct EmitRaw<'a> {
    pub raw: Cow<'a, str>,
}

/// Outputs the result of an expression.
#[derive(Debug)]
pub struct EmitExpr<'a> {
    pub expr: Expr<'a>,
    /// The expression as written in the template.
    pub source: &'a str,
}

/// An `if`/`elseif`/`else` chain.
#[derive(Debug)]
pub struct IfCond<'a> {
    pub branches: Vec<IfBranch<'a>>,
    pub else_body: Option<Vec<Stmt<'a>>>,
}

/// One `if` or `elseif` branch of a chain.
#[derive(Debug)]
pub struct IfBranch<'a> {
    pub expr: Expr<'a>,
    pub body: Vec<Stmt<'a>>,
}

/// A translatable message.
#[derive(Debug, Clone, PartialEq)]
pub struct Msg<'a> {
    /// The message text with `{$name}` placeholder markers.
    pub text: String,
    /// The placeholders in order of first appearance.
    pub placeholders: Vec<Placeholder<'a>>,
    /// Translator context (`meaning="..."`).
    pub meaning: Option<String>,
    /// Translator description (`desc="..."`).
    pub desc: Option<String>,
    /// All attributes of the opening `msg` command.
    pub attributes: ParsedAttributes,
}

impl<'a> Msg<'a> {
    /// Looks up a placeholder by name.
    pub fn placeholder(&self, name: &str) -> Option<&Placeholder<'a>> {
        self.placeholders.iter().find(|x| x.name == name)
    }
}

/// A named placeholder and the runtime value that replaces it.
#[derive(Debug, Clone, PartialEq)]
pub struct Placeholder<'a> {
    pub name: String,
    /// The value is the concatenation of all fragments.
    pub value: Vec<Fragment<'a>>,
}

/// A piece of a placeholder value.
#[derive(Debug, Clone, PartialEq)]
pub enum Fragment<'a> {
    Text(Cow<'a, str>),
    Expr(Expr<'a>),
}

/// An expression node.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr<'a> {
    /// A data reference (`$name`), without the dollar sign.
    Var(&'a str),
    Const(Const<'a>),
    GetAttr(Box<GetAttr<'a>>),
    GetItem(Box<GetItem<'a>>),
    UnaryOp(Box<UnaryOp<'a>>),
    BinOp(Box<BinOp<'a>>),
    IfExpr(Box<IfExpr<'a>>),
}

impl<'a> Expr<'a> {
    /// If this is a pure data path (`$a.b.c`) returns the last segment.
    pub fn path_tail(&self) -> Option<&'a str> {
        match self {
            Expr::Var(name) => Some(name),
            Expr::GetAttr(attr) => attr.expr.path_tail().map(|_| attr.name),
            _ => None,
        }
    }
}

/// A literal value.
#[derive(Debug, Clone, PartialEq)]
pub enum Const<'a> {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Cow<'a, str>),
}

/// Looks up an attribute (`$a.b`).
#[derive(Debug, Clone, PartialEq)]
pub struct GetAttr<'a> {
    pub expr: Expr<'a>,
    pub name: &'a str,
}

/// Looks up an item (`$a[0]`).
#[derive(Debug, Clone, PartialEq)]
pub struct GetItem<'a> {
    pub expr: Expr<'a>,
    pub subscript_expr: Expr<'a>,
}

/// A kind of unary operator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum UnaryOpKind {
    Not,
    Neg,
}

/// An unary operator expression.
#[derive(Debug, Clone, PartialEq)]
pub struct UnaryOp<'a> {
    pub op: UnaryOpKind,
    pub expr: Expr<'a>,
}

/// A kind of binary operator.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum BinOpKind {
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    ScAnd,
    ScOr,
    Add,
    Sub,
    Mul,
    Div,
    Rem,
}

/// A binary operator expression.
#[derive(Debug, Clone, PartialEq)]
pub struct BinOp<'a> {
    pub op: BinOpKind,
    pub left: Expr<'a>,
    pub right: Expr<'a>,
}

/// A conditional expression (`test ? a : b`).
#[derive(Debug, Clone, PartialEq)]
pub struct IfExpr<'a> {
    pub test_expr: Expr<'a>,
    pub true_expr: Expr<'a>,
    pub false_expr: Expr<'a>,
}
