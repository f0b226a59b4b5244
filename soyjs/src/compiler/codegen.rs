use std::fmt::{self, Write};

use crate::compiler::ast::{self, BinOpKind, Const, Expr, Fragment, Stmt, UnaryOpKind};
use crate::environment::CompilerConfig;
use crate::utils::JsStr;
use crate::value::format_number;

/// Writes a number as JavaScript literal.
struct JsNumber(f64);

impl fmt::Display for JsNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        format_number(f, self.0)
    }
}

/// Makes comment text safe to put into a `/** */` block.
fn comment_safe(s: &str) -> String {
    s.replace("*/", "*\\/").replace('\n', " ")
}

/// Generates JavaScript for a parsed unit.
pub struct CodeGenerator<'c> {
    config: &'c CompilerConfig,
    out: String,
    depth: usize,
    msg_id: usize,
}

impl<'c> CodeGenerator<'c> {
    /// Creates a new code generator.
    pub fn new(config: &'c CompilerConfig) -> CodeGenerator<'c> {
        CodeGenerator {
            config,
            out: String::new(),
            depth: 0,
            msg_id: 0,
        }
    }

    /// Writes an indented line.
    fn line(&mut self, args: fmt::Arguments<'_>) -> fmt::Result {
        for _ in 0..self.depth * self.config.indent {
            ok!(self.out.write_char(' '));
        }
        ok!(self.out.write_fmt(args));
        self.out.write_char('\n')
    }

    /// Compiles all templates of a unit.
    pub fn compile_unit(mut self, unit: &ast::Unit<'_>) -> Result<String, fmt::Error> {
        let config = self.config;
        let mut namespaces: Vec<&str> = Vec::new();
        if let Some(ns) = unit.namespace {
            namespaces.push(ns);
        }
        for template in &unit.templates {
            if let Some((ns, _)) = template.name.rsplit_once('.') {
                if !namespaces.contains(&ns) {
                    namespaces.push(ns);
                }
            }
        }

        for ns in &namespaces {
            ok!(self.line(format_args!(
                "{}({});",
                config.provide_function,
                JsStr(ns)
            )));
        }
        if !namespaces.is_empty() {
            ok!(self.line(format_args!("")));
        }
        for require in &config.requires {
            ok!(self.line(format_args!(
                "{}({});",
                config.require_function,
                JsStr(require)
            )));
        }

        for template in &unit.templates {
            ok!(self.line(format_args!("")));
            ok!(self.compile_template(template));
        }
        Ok(self.out)
    }

    fn compile_template(&mut self, template: &ast::Template<'_>) -> fmt::Result {
        let config = self.config;
        let data = config.data_param.as_str();
        ok!(self.line(format_args!("/**")));
        ok!(self.line(format_args!(" * @param {{Object<string, *>=}} {}", data)));
        ok!(self.line(format_args!(" * @return {{string}}")));
        ok!(self.line(format_args!(" */")));
        ok!(self.line(format_args!("{} = function({}) {{", template.name, data)));
        self.depth += 1;
        ok!(self.line(format_args!("{} = {} || {{}};", data, data)));
        ok!(self.line(format_args!("var output = '';")));
        ok!(self.compile_body(&template.body));
        ok!(self.line(format_args!("return output;")));
        self.depth -= 1;
        self.line(format_args!("}};"))
    }

    fn compile_body(&mut self, body: &[Stmt<'_>]) -> fmt::Result {
        let mut pending_raw = String::new();
        for stmt in body {
            if let Stmt::EmitRaw(raw) = stmt {
                pending_raw.push_str(&raw.raw);
                continue;
            }
            ok!(self.flush_raw(&mut pending_raw));
            match stmt {
                Stmt::EmitRaw(_) => {}
                Stmt::EmitExpr(emit) => {
                    let expr = ok!(self.expr_to_string(&emit.expr));
                    ok!(self.line(format_args!("output += {};", expr)));
                }
                Stmt::IfCond(cond) => ok!(self.compile_if(cond)),
                Stmt::Msg(msg) => ok!(self.compile_msg(msg)),
            }
        }
        self.flush_raw(&mut pending_raw)
    }

    fn flush_raw(&mut self, pending: &mut String) -> fmt::Result {
        if pending.is_empty() {
            return Ok(());
        }
        ok!(self.line(format_args!("output += {};", JsStr(pending))));
        pending.clear();
        Ok(())
    }

    fn compile_if(&mut self, cond: &ast::IfCond<'_>) -> fmt::Result {
        for (idx, branch) in cond.branches.iter().enumerate() {
            let test = ok!(self.expr_to_string(&branch.expr));
            if idx == 0 {
                ok!(self.line(format_args!("if ({}) {{", test)));
            } else {
                self.depth -= 1;
                ok!(self.line(format_args!("}} else if ({}) {{", test)));
            }
            self.depth += 1;
            ok!(self.compile_body(&branch.body));
        }
        if let Some(ref else_body) = cond.else_body {
            self.depth -= 1;
            ok!(self.line(format_args!("}} else {{")));
            self.depth += 1;
            ok!(self.compile_body(else_body));
        }
        self.depth -= 1;
        self.line(format_args!("}}"))
    }

    fn compile_msg(&mut self, msg: &ast::Msg<'_>) -> fmt::Result {
        self.msg_id += 1;
        let var = format!("MSG_UNNAMED_{}", self.msg_id);

        ok!(self.line(format_args!("/**")));
        ok!(self.line(format_args!(
            " * @desc {}",
            comment_safe(msg.desc.as_deref().unwrap_or(""))
        )));
        if let Some(ref meaning) = msg.meaning {
            ok!(self.line(format_args!(" * @meaning {}", comment_safe(meaning))));
        }
        ok!(self.line(format_args!(" */")));

        let mut call = String::new();
        ok!(write!(call, "{}({}", self.config.msg_function, JsStr(&msg.text)));
        if !msg.placeholders.is_empty() {
            ok!(call.write_str(", {"));
            for (idx, placeholder) in msg.placeholders.iter().enumerate() {
                if idx > 0 {
                    ok!(call.write_str(", "));
                }
                ok!(write!(call, "{}: ", JsStr(&placeholder.name)));
                ok!(self.write_fragments(&mut call, &placeholder.value));
            }
            ok!(call.write_str("}"));
        }
        ok!(call.write_str(")"));

        ok!(self.line(format_args!("var {} = {};", var, call)));
        self.line(format_args!("output += {};", var))
    }

    fn write_fragments(&self, w: &mut String, fragments: &[Fragment<'_>]) -> fmt::Result {
        if fragments.is_empty() {
            return w.write_str("''");
        }
        // make sure `+` concatenates when the value starts with an expression
        if fragments.len() > 1 && matches!(fragments[0], Fragment::Expr(_)) {
            ok!(w.write_str("'' + "));
        }
        for (idx, fragment) in fragments.iter().enumerate() {
            if idx > 0 {
                ok!(w.write_str(" + "));
            }
            match fragment {
                Fragment::Text(text) => ok!(write!(w, "{}", JsStr(text))),
                Fragment::Expr(expr) => ok!(self.write_operand(w, expr)),
            }
        }
        Ok(())
    }

    fn expr_to_string(&self, expr: &Expr<'_>) -> Result<String, fmt::Error> {
        let mut rv = String::new();
        ok!(self.write_expr(&mut rv, expr));
        Ok(rv)
    }

    /// Writes an expression, parenthesized unless it is atomic.
    fn write_operand(&self, w: &mut String, expr: &Expr<'_>) -> fmt::Result {
        match expr {
            Expr::BinOp(_) | Expr::IfExpr(_) | Expr::UnaryOp(_) => {
                ok!(w.write_char('('));
                ok!(self.write_expr(w, expr));
                w.write_char(')')
            }
            _ => self.write_expr(w, expr),
        }
    }

    /// Translates an expression into JavaScript.
    pub fn write_expr(&self, w: &mut String, expr: &Expr<'_>) -> fmt::Result {
        match expr {
            Expr::Var(name) => write!(w, "{}.{}", self.config.data_param, name),
            Expr::Const(value) => match value {
                Const::Null => w.write_str("null"),
                Const::Bool(val) => write!(w, "{}", val),
                Const::Int(val) => write!(w, "{}", val),
                Const::Float(val) => write!(w, "{}", JsNumber(*val)),
                Const::Str(s) => write!(w, "{}", JsStr(s)),
            },
            Expr::GetAttr(attr) => {
                ok!(self.write_target(w, &attr.expr));
                write!(w, ".{}", attr.name)
            }
            Expr::GetItem(item) => {
                ok!(self.write_target(w, &item.expr));
                ok!(w.write_char('['));
                ok!(self.write_expr(w, &item.subscript_expr));
                w.write_char(']')
            }
            Expr::UnaryOp(op) => {
                ok!(w.write_str(match op.op {
                    UnaryOpKind::Not => "!",
                    UnaryOpKind::Neg => "-",
                }));
                self.write_operand(w, &op.expr)
            }
            Expr::BinOp(op) => {
                ok!(self.write_operand(w, &op.left));
                ok!(write!(w, " {} ", binop_symbol(op.op)));
                self.write_operand(w, &op.right)
            }
            Expr::IfExpr(expr) => {
                ok!(self.write_operand(w, &expr.test_expr));
                ok!(w.write_str(" ? "));
                ok!(self.write_operand(w, &expr.true_expr));
                ok!(w.write_str(" : "));
                self.write_operand(w, &expr.false_expr)
            }
        }
    }

    /// Writes the object of a member access.
    fn write_target(&self, w: &mut String, expr: &Expr<'_>) -> fmt::Result {
        match expr {
            Expr::Var(_) | Expr::GetAttr(_) | Expr::GetItem(_) | Expr::Const(Const::Str(_)) => {
                self.write_expr(w, expr)
            }
            _ => {
                ok!(w.write_char('('));
                ok!(self.write_expr(w, expr));
                w.write_char(')')
            }
        }
    }
}

fn binop_symbol(op: BinOpKind) -> &'static str {
    match op {
        BinOpKind::Eq => "==",
        BinOpKind::Ne => "!=",
        BinOpKind::Lt => "<",
        BinOpKind::Lte => "<=",
        BinOpKind::Gt => ">",
        BinOpKind::Gte => ">=",
        BinOpKind::ScAnd => "&&",
        BinOpKind::ScOr => "||",
        BinOpKind::Add => "+",
        BinOpKind::Sub => "-",
        BinOpKind::Mul => "*",
        BinOpKind::Div => "/",
        BinOpKind::Rem => "%",
    }
}

/// Generates the JavaScript source for a parsed unit.
pub fn generate(unit: &ast::Unit<'_>, config: &CompilerConfig) -> Result<String, fmt::Error> {
    CodeGenerator::new(config).compile_unit(unit)
}

#[cfg(test)]
mod tests {
    use super::*;

    use similar_asserts::assert_eq;

    use crate::compiler::expression::parse_expr;
    use crate::compiler::lexer::{filter_tokens, tokenize_source};
    use crate::compiler::parser::parse;

    fn js_expr(source: &str) -> String {
        let config = CompilerConfig::default();
        let expr = parse_expr(source).unwrap();
        let mut rv = String::new();
        CodeGenerator::new(&config).write_expr(&mut rv, &expr).unwrap();
        rv
    }

    fn compile(source: &str) -> String {
        let tokens = filter_tokens(&tokenize_source(source, "<test>").unwrap());
        generate(&parse(&tokens).unwrap(), &CompilerConfig::default()).unwrap()
    }

    #[test]
    fn test_expressions() {
        assert_eq!(js_expr("$name"), "opt_data.name");
        assert_eq!(js_expr("$a.b[0]"), "opt_data.a.b[0]");
        assert_eq!(js_expr("$a and not $b"), "opt_data.a && (!opt_data.b)");
        assert_eq!(js_expr("$a or $b == 'x'"), "opt_data.a || (opt_data.b == 'x')");
        assert_eq!(js_expr("($a + 1) * 2"), "(opt_data.a + 1) * 2");
        assert_eq!(js_expr("- -1"), "-(-1)");
        assert_eq!(js_expr("$x ? 1.5 : null"), "opt_data.x ? 1.5 : null");
        assert_eq!(js_expr("'a\\'b'.length"), r"'a\'b'.length");
    }

    #[test]
    fn test_template() {
        let js = compile(
            "{namespace test.templates}\n\n{template .Simple}\n  I am {$name},\n  {$age} years\n  old.\n{/template}\n",
        );
        assert_eq!(
            js,
            "goog.provide('test.templates');\n\
             \n\
             goog.require('soy');\n\
             \n\
             /**\n \
             * @param {Object<string, *>=} opt_data\n \
             * @return {string}\n \
             */\n\
             test.templates.Simple = function(opt_data) {\n  \
             opt_data = opt_data || {};\n  \
             var output = '';\n  \
             output += 'I am ';\n  \
             output += opt_data.name;\n  \
             output += ',';\n  \
             output += opt_data.age;\n  \
             output += ' years old.';\n  \
             return output;\n\
             };\n"
        );
    }

    #[test]
    fn test_if_chain() {
        let js = compile(
            "{namespace a}{template .A}{if $x}1{elseif $y}2{else}3{/if}{/template}",
        );
        assert!(js.contains(
            "  if (opt_data.x) {\n    output += '1';\n  } else if (opt_data.y) {\n    output += '2';\n  } else {\n    output += '3';\n  }\n"
        ));
    }

    #[test]
    fn test_msg() {
        let js = compile(
            r##"{namespace a}{template .A}{msg meaning="intro" desc="Introduction"}Hi {$name}, see <a href="{$url}">this</a>.{/msg}{/template}"##,
        );
        assert!(js.contains("  /**\n   * @desc Introduction\n   * @meaning intro\n   */\n"));
        assert!(js.contains(
            r#"  var MSG_UNNAMED_1 = goog.getMsg('Hi {$name}, see {$startLink}this{$endLink}.', {'name': opt_data.name, 'startLink': '<a href="' + opt_data.url + '">', 'endLink': '\x3c/a>'});"#
        ));
        assert!(js.contains("  output += MSG_UNNAMED_1;\n"));
    }
}
