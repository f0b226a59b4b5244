//! soyjs compiles Soy-style templates into JavaScript render functions.
//!
//! A template source holds one or more `{template}` blocks below a
//! `{namespace}` declaration.  Blocks contain literal markup, `$variable`
//! interpolation, `if`/`elseif`/`else` conditionals and translatable
//! `{msg}` blocks:
//!
//! ```soy
//! {namespace test.templates}
//!
//! {template .Intro}
//!   {msg desc="Introduction"}
//!     I am {$name}. Check out my <a href="{$url}">profile</a>.
//!   {/msg}
//! {/template}
//! ```
//!
//! Every template becomes a function assigned to its fully qualified name.
//! Messages are handed to a formatting primitive (`goog.getMsg` by default)
//! with variables and markup turned into named placeholders, so the text a
//! translator sees is `I am {$name}. Check out my {$startLink}profile{$endLink}.`
//!
//! # Compiling
//!
//! Compilation happens in three steps which are also available on their
//! own: [`tokenize_source`] splits the source into [`Token`]s,
//! [`filter_tokens`] drops comments and whitespace between templates and
//! [`Compiler::compile_tokens`] produces the JavaScript.
//! [`Compiler::compile_source`] runs all of them:
//!
//! ```
//! use soyjs::{filter_tokens, tokenize_source, Compiler};
//!
//! let source = "{namespace demo}\n{template .Hello}Hello {$name}!{/template}";
//! let tokens = filter_tokens(&tokenize_source(source, "hello.soy").unwrap());
//! let js = Compiler::new().compile_tokens(&tokens).unwrap();
//! assert!(js.starts_with("goog.provide('demo');"));
//! ```
//!
//! # Rendering
//!
//! For testing and tooling the parsed templates can also be rendered in
//! process with [`CompiledUnit::render`].  The renderer follows the
//! semantics of the generated JavaScript and formats messages through the
//! [`MsgFormatter`] configured on the [`Compiler`].
//!
//! # Logging
//!
//! The crate reports what it does through [`tracing`] events at debug and
//! trace level.  It never installs a subscriber.
#![allow(clippy::new_without_default)]
#![deny(missing_docs)]

#[macro_use]
mod macros;

mod compiler;
mod environment;
mod error;
mod message;
mod template;
mod utils;
mod vm;

pub mod value;

pub use self::compiler::attributes::{parse_command_attributes, ParsedAttributes};
pub use self::compiler::lexer::{filter_tokens, tokenize, tokenize_source};
pub use self::compiler::msg::create_msg_from_tokens;
pub use self::compiler::naming::get_variable_name;
pub use self::compiler::tokens::{Span, Token, TokenKind};
pub use self::environment::{Compiler, CompilerConfig};
pub use self::error::{Error, ErrorKind};
pub use self::message::{get_msg, MsgFormatter};
pub use self::template::{CompiledTemplate, CompiledUnit};

/// Re-export for convenience.
pub use self::value::Value;

/// This module gives access to the low level machinery.
///
/// It exposes the syntax tree and the individual compiler stages.  The
/// interface is not stable; it mostly exists for tooling and debugging.
pub mod machinery {
    #![allow(missing_docs)]
    pub use crate::compiler::ast;
    pub use crate::compiler::codegen::{generate, CodeGenerator};
    pub use crate::compiler::expression::parse_expr;
    pub use crate::compiler::lexer::Tokenizer;
    pub use crate::compiler::naming::{tag_placeholder, to_lower_camel_case, TagPlaceholder};
    pub use crate::compiler::parser::parse;
    pub use crate::utils::{join_lines, JsStr};
    pub use crate::vm::Vm;
}
