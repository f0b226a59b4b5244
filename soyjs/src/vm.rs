use std::borrow::Cow;
use std::cmp::Ordering;
use std::collections::BTreeMap;

use serde_json::Value as Json;

use crate::compiler::ast::{self, BinOpKind, Const, Expr, Fragment, Stmt, UnaryOpKind};
use crate::error::Error;
use crate::message::MsgFormatter;
use crate::value::{ops, Value};

/// Evaluates parsed templates against render data.
///
/// The rendering mirrors what the generated JavaScript does: the render
/// data is `opt_data`, every statement appends to the output and messages
/// go through the message formatter.
pub struct Vm<'x> {
    root: Value<'x>,
    formatter: &'x dyn MsgFormatter,
}

impl<'x> Vm<'x> {
    /// Creates a virtual machine for one render call.
    pub fn new(data: &'x Json, formatter: &'x dyn MsgFormatter) -> Vm<'x> {
        Vm {
            root: Value::from(data),
            formatter,
        }
    }

    /// Renders a statement list into `out`.
    pub fn eval(&self, body: &'x [Stmt<'_>], out: &mut String) -> Result<(), Error> {
        for stmt in body {
            match stmt {
                Stmt::EmitRaw(raw) => out.push_str(&raw.raw),
                Stmt::EmitExpr(emit) => {
                    let value = ok!(self.eval_expr(&emit.expr).map_err(|mut err| {
                        err.set_span(emit.span());
                        err
                    }));
                    out.push_str(&value.to_string());
                }
                Stmt::IfCond(cond) => {
                    let mut taken = false;
                    for branch in &cond.branches {
                        let test = ok!(self.eval_expr(&branch.expr).map_err(|mut err| {
                            err.set_span(cond.span());
                            err
                        }));
                        if test.is_true() {
                            ok!(self.eval(&branch.body, out));
                            taken = true;
                            break;
                        }
                    }
                    if !taken {
                        if let Some(ref else_body) = cond.else_body {
                            ok!(self.eval(else_body, out));
                        }
                    }
                }
                Stmt::Msg(msg) => {
                    let text = ok!(self.eval_msg(msg).map_err(|mut err| {
                        err.set_span(msg.span());
                        err
                    }));
                    out.push_str(&text);
                }
            }
        }
        Ok(())
    }

    fn eval_msg(&self, msg: &'x ast::Msg<'_>) -> Result<String, Error> {
        let mut values = BTreeMap::new();
        for placeholder in &msg.placeholders {
            let mut value = String::new();
            for fragment in &placeholder.value {
                match fragment {
                    Fragment::Text(text) => value.push_str(text),
                    Fragment::Expr(expr) => value.push_str(&ok!(self.eval_expr(expr)).to_string()),
                }
            }
            values.insert(placeholder.name.clone(), value);
        }
        Ok(self.formatter.format_msg(&msg.text, &values))
    }

    /// Evaluates an expression.
    pub fn eval_expr(&self, expr: &'x Expr<'_>) -> Result<Value<'x>, Error> {
        Ok(match expr {
            Expr::Var(name) => match self.root {
                // `opt_data || {}`
                ref root if !root.is_true() => Value::Undefined,
                ref root => ok!(root.get_attr(name)),
            },
            Expr::Const(value) => match value {
                Const::Null => Value::Null,
                Const::Bool(val) => Value::Bool(*val),
                Const::Int(val) => Value::Number(*val as f64),
                Const::Float(val) => Value::Number(*val),
                Const::Str(s) => Value::String(Cow::Borrowed(s)),
            },
            Expr::GetAttr(attr) => ok!(ok!(self.eval_expr(&attr.expr)).get_attr(attr.name)),
            Expr::GetItem(item) => {
                let value = ok!(self.eval_expr(&item.expr));
                let key = ok!(self.eval_expr(&item.subscript_expr));
                ok!(value.get_item(&key))
            }
            Expr::UnaryOp(op) => {
                let value = ok!(self.eval_expr(&op.expr));
                match op.op {
                    UnaryOpKind::Not => Value::Bool(!value.is_true()),
                    UnaryOpKind::Neg => ops::neg(&value),
                }
            }
            Expr::BinOp(op) => ok!(self.eval_binop(op)),
            Expr::IfExpr(expr) => {
                if ok!(self.eval_expr(&expr.test_expr)).is_true() {
                    ok!(self.eval_expr(&expr.true_expr))
                } else {
                    ok!(self.eval_expr(&expr.false_expr))
                }
            }
        })
    }

    fn eval_binop(&self, op: &'x ast::BinOp<'_>) -> Result<Value<'x>, Error> {
        let left = ok!(self.eval_expr(&op.left));
        // short circuiting operators return one of their operands
        match op.op {
            BinOpKind::ScAnd if !left.is_true() => return Ok(left),
            BinOpKind::ScOr if left.is_true() => return Ok(left),
            BinOpKind::ScAnd | BinOpKind::ScOr => return self.eval_expr(&op.right),
            _ => {}
        }
        let right = ok!(self.eval_expr(&op.right));
        Ok(match op.op {
            BinOpKind::Eq => Value::Bool(ops::loose_eq(&left, &right)),
            BinOpKind::Ne => Value::Bool(!ops::loose_eq(&left, &right)),
            BinOpKind::Lt => Value::Bool(ops::compare(&left, &right) == Some(Ordering::Less)),
            BinOpKind::Lte => Value::Bool(matches!(
                ops::compare(&left, &right),
                Some(Ordering::Less | Ordering::Equal)
            )),
            BinOpKind::Gt => Value::Bool(ops::compare(&left, &right) == Some(Ordering::Greater)),
            BinOpKind::Gte => Value::Bool(matches!(
                ops::compare(&left, &right),
                Some(Ordering::Greater | Ordering::Equal)
            )),
            BinOpKind::Add => ops::add(&left, &right),
            BinOpKind::Sub => ops::sub(&left, &right),
            BinOpKind::Mul => ops::mul(&left, &right),
            BinOpKind::Div => ops::div(&left, &right),
            BinOpKind::Rem => ops::rem(&left, &right),
            BinOpKind::ScAnd | BinOpKind::ScOr => unreachable!(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use serde_json::json;

    use crate::compiler::expression::parse_expr;
    use crate::message::get_msg;

    fn eval(source: &str, data: &Json) -> String {
        let expr = parse_expr(source).unwrap();
        let vm = Vm::new(data, &get_msg);
        let rv = vm.eval_expr(&expr).unwrap().to_string();
        rv
    }

    #[test]
    fn test_expressions() {
        let data = json!({"a": 1, "b": "x", "items": [1, 2], "user": {"name": "Matt"}});
        assert_eq!(eval("$a + 1", &data), "2");
        assert_eq!(eval("$b + $a", &data), "x1");
        assert_eq!(eval("$missing", &data), "undefined");
        assert_eq!(eval("$user.name", &data), "Matt");
        assert_eq!(eval("$items[1] * 10", &data), "20");
        assert_eq!(eval("$a == '1'", &data), "true");
        assert_eq!(eval("not $a", &data), "false");
        assert_eq!(eval("$missing or 'default'", &data), "default");
        assert_eq!(eval("$a and $b", &data), "x");
        assert_eq!(eval("$a > 2 ? 'big' : 'small'", &data), "small");
        assert_eq!(eval("-$a - 1", &data), "-2");
        assert_eq!(eval("7 % 4 + 0.5", &data), "3.5");
    }

    #[test]
    fn test_null_data() {
        assert_eq!(eval("$name", &Json::Null), "undefined");
    }

    #[test]
    fn test_invalid_access() {
        let data = json!({});
        let expr = parse_expr("$config.supportEmail").unwrap();
        let vm = Vm::new(&data, &get_msg);
        let err = vm.eval_expr(&expr).unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::InvalidOperation);
    }
}
