use std::fmt;
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::compiler::codegen::generate;
use crate::compiler::lexer::{filter_tokens, tokenize_source};
use crate::compiler::parser::parse;
use crate::compiler::tokens::Token;
use crate::error::Error;
use crate::message::{get_msg, MsgFormatter};
use crate::template::CompiledUnit;

/// Controls the names used in the generated JavaScript.
///
/// The configuration can be deserialized (the CLI reads it from TOML), keys
/// are in kebab case and every key is optional:
///
/// ```toml
/// msg-function = "goog.getMsg"
/// requires = ["soy"]
/// indent = 2
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case", deny_unknown_fields)]
pub struct CompilerConfig {
    /// The message formatting primitive.
    pub msg_function: String,
    /// The function that declares a namespace.
    pub provide_function: String,
    /// The function that imports a dependency.
    pub require_function: String,
    /// Namespaces to require at the top of every unit.
    pub requires: Vec<String>,
    /// The name of the render function's data parameter.
    pub data_param: String,
    /// Spaces per indentation level.
    pub indent: usize,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            msg_function: "goog.getMsg".into(),
            provide_function: "goog.provide".into(),
            require_function: "goog.require".into(),
            requires: vec!["soy".into()],
            data_param: "opt_data".into(),
            indent: 2,
        }
    }
}

/// The compiler turns template tokens into JavaScript.
///
/// It holds the [`CompilerConfig`] and the [`MsgFormatter`] used when
/// templates are rendered in process.  A compiler is cheap to clone and can
/// be shared between threads.
///
/// ```
/// let compiler = soyjs::Compiler::new();
/// let js = compiler.compile_source(
///     "{namespace demo}\n{template .Hello}Hello {$name}!{/template}",
///     "hello.soy",
/// ).unwrap();
/// assert!(js.contains("demo.Hello = function(opt_data) {"));
/// assert!(js.contains("output += opt_data.name;"));
/// ```
#[derive(Clone)]
pub struct Compiler {
    config: CompilerConfig,
    formatter: Arc<dyn MsgFormatter>,
}

impl Default for Compiler {
    fn default() -> Self {
        Compiler::new()
    }
}

impl fmt::Debug for Compiler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Compiler")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl Compiler {
    /// Creates a compiler with the default configuration.
    pub fn new() -> Compiler {
        Compiler::with_config(CompilerConfig::default())
    }

    /// Creates a compiler with a custom configuration.
    pub fn with_config(config: CompilerConfig) -> Compiler {
        Compiler {
            config,
            formatter: Arc::new(get_msg),
        }
    }

    /// Returns the configuration.
    pub fn config(&self) -> &CompilerConfig {
        &self.config
    }

    /// Replaces the message formatter used for in-process rendering.
    ///
    /// The default is [`get_msg`].
    pub fn set_msg_formatter<F: MsgFormatter + 'static>(&mut self, formatter: F) {
        self.formatter = Arc::new(formatter);
    }

    /// Returns the current message formatter.
    pub fn msg_formatter(&self) -> &dyn MsgFormatter {
        &*self.formatter
    }

    /// Compiles a token stream into JavaScript source.
    ///
    /// The tokens are usually the result of [`tokenize_source`] passed
    /// through [`filter_tokens`].  Errors carry the position of the
    /// offending token but no filename.
    pub fn compile_tokens(&self, tokens: &[Token<'_>]) -> Result<String, Error> {
        let unit = ok!(parse(tokens));
        let js = ok!(generate(&unit, &self.config).map_err(Error::from));
        tracing::debug!(templates = unit.templates.len(), bytes = js.len(), "compiled tokens");
        Ok(js)
    }

    /// Compiles a token stream into a [`CompiledUnit`] that can be rendered.
    pub fn compile_unit<'s>(&self, tokens: &[Token<'s>]) -> Result<CompiledUnit<'_, 's>, Error> {
        let unit = ok!(parse(tokens));
        Ok(CompiledUnit::new(self, unit, None))
    }

    /// Tokenizes, filters and compiles template source into JavaScript.
    ///
    /// The filename is used for error reporting.  Errors carry the source so
    /// that the alternative display (`{:#}`) shows an excerpt.
    pub fn compile_source(&self, source: &str, filename: &str) -> Result<String, Error> {
        let rv = tokenize_source(source, filename)
            .and_then(|tokens| self.compile_tokens(&filter_tokens(&tokens)));
        rv.map_err(|err| attach_source(err, source, filename))
    }

    /// Like [`compile_source`](Self::compile_source) but returns a
    /// [`CompiledUnit`].
    pub fn compile_unit_from_source<'s>(
        &self,
        source: &'s str,
        filename: &'s str,
    ) -> Result<CompiledUnit<'_, 's>, Error> {
        let rv = tokenize_source(source, filename)
            .and_then(|tokens| parse(&filter_tokens(&tokens)))
            .map(|unit| CompiledUnit::new(self, unit, Some(filename)));
        rv.map_err(|err| attach_source(err, source, filename))
    }
}

fn attach_source(mut err: Error, source: &str, filename: &str) -> Error {
    err.set_filename(filename);
    err.set_template_source(source);
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_from_toml_style_keys() {
        let config: CompilerConfig = serde_json::from_value(serde_json::json!({
            "msg-function": "myMsg",
            "requires": [],
        }))
        .unwrap();
        assert_eq!(config.msg_function, "myMsg");
        assert!(config.requires.is_empty());
        assert_eq!(config.provide_function, "goog.provide");
        assert_eq!(config.indent, 2);
    }

    #[test]
    fn test_compiler_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<Compiler>();
    }

    #[test]
    fn test_custom_config() {
        let compiler = Compiler::with_config(CompilerConfig {
            msg_function: "i18n.msg".into(),
            requires: vec![],
            data_param: "data".into(),
            indent: 4,
            ..CompilerConfig::default()
        });
        let js = compiler
            .compile_source(
                "{namespace a}{template .B}{msg desc=\"x\"}{$n}{/msg}{/template}",
                "b.soy",
            )
            .unwrap();
        assert!(!js.contains("goog.require"));
        assert!(js.contains("a.B = function(data) {\n    data = data || {};"));
        assert!(js.contains("var MSG_UNNAMED_1 = i18n.msg('{$n}', {'n': data.n});"));
    }
}
