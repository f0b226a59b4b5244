use std::fmt;

use serde_json::Value as Json;

use crate::compiler::ast::{self, Spanned};
use crate::compiler::codegen::generate;
use crate::environment::Compiler;
use crate::error::{Error, ErrorKind};
use crate::vm::Vm;

/// A parsed template unit (one source file).
///
/// The unit keeps the parsed templates so they can be turned into
/// JavaScript with [`to_js`](Self::to_js) or rendered right away with
/// [`render`](Self::render).  Rendering follows the semantics of the
/// generated JavaScript.
///
/// ```
/// use serde_json::json;
///
/// let compiler = soyjs::Compiler::new();
/// let unit = compiler.compile_unit_from_source(
///     "{namespace demo}{template .Hello}Hello {$name}!{/template}",
///     "hello.soy",
/// ).unwrap();
/// let rv = unit.render("demo.Hello", &json!({"name": "World"})).unwrap();
/// assert_eq!(rv, "Hello World!");
/// ```
pub struct CompiledUnit<'env, 'source> {
    compiler: &'env Compiler,
    unit: ast::Unit<'source>,
    filename: Option<&'source str>,
}

impl fmt::Debug for CompiledUnit<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledUnit")
            .field("filename", &self.filename)
            .field("namespace", &self.unit.namespace)
            .field("templates", &self.template_names().collect::<Vec<_>>())
            .finish()
    }
}

impl<'env, 'source> CompiledUnit<'env, 'source> {
    pub(crate) fn new(
        compiler: &'env Compiler,
        unit: ast::Unit<'source>,
        filename: Option<&'source str>,
    ) -> CompiledUnit<'env, 'source> {
        CompiledUnit {
            compiler,
            unit,
            filename,
        }
    }

    /// Returns the filename of the unit if it is known.
    pub fn filename(&self) -> Option<&'source str> {
        self.filename
    }

    /// Returns the declared namespace.
    pub fn namespace(&self) -> Option<&'source str> {
        self.unit.namespace
    }

    /// Iterates over the fully qualified names of all templates.
    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.unit.templates.iter().map(|x| x.name.as_str())
    }

    /// Returns the parsed unit.
    pub fn ast(&self) -> &ast::Unit<'source> {
        &self.unit
    }

    /// Looks up a template.
    ///
    /// The name can be fully qualified (`test.templates.Simple`) or relative
    /// to the namespace (`.Simple` or `Simple`).
    pub fn get_template(&self, name: &str) -> Result<CompiledTemplate<'_, 'source>, Error> {
        let local = name.strip_prefix('.').unwrap_or(name);
        let found = self.unit.templates.iter().find(|x| {
            x.name == name
                || x.local_name.strip_prefix('.') == Some(local)
        });
        match found {
            Some(template) => Ok(CompiledTemplate {
                unit: self,
                template,
            }),
            None => {
                let mut err = Error::new(
                    ErrorKind::UnknownTemplate,
                    format!("template `{}` is not defined", name),
                );
                if let Some(filename) = self.filename {
                    err.set_filename(filename);
                }
                Err(err)
            }
        }
    }

    /// Renders a template with the given data.
    pub fn render(&self, name: &str, data: &Json) -> Result<String, Error> {
        ok!(self.get_template(name)).render(data)
    }

    /// Generates the JavaScript source of the unit.
    pub fn to_js(&self) -> Result<String, Error> {
        generate(&self.unit, self.compiler.config()).map_err(Error::from)
    }
}

/// A single template of a [`CompiledUnit`].
#[derive(Clone, Copy)]
pub struct CompiledTemplate<'unit, 'source> {
    unit: &'unit CompiledUnit<'unit, 'source>,
    template: &'unit Spanned<ast::Template<'source>>,
}

impl fmt::Debug for CompiledTemplate<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompiledTemplate")
            .field("name", &self.name())
            .finish()
    }
}

impl<'unit, 'source> CompiledTemplate<'unit, 'source> {
    /// Returns the fully qualified name.
    pub fn name(&self) -> &'unit str {
        &self.template.name
    }

    /// Returns an attribute of the `{template}` command.
    pub fn attribute(&self, name: &str) -> Option<&'unit str> {
        self.template.attributes.get(name)
    }

    /// Renders the template.
    ///
    /// `data` is what the generated function receives as `opt_data`.
    pub fn render(&self, data: &Json) -> Result<String, Error> {
        let vm = Vm::new(data, self.unit.compiler.msg_formatter());
        let mut rv = String::new();
        tracing::debug!(template = self.name(), "rendering template");
        match vm.eval(&self.template.body, &mut rv) {
            Ok(()) => Ok(rv),
            Err(mut err) => {
                if let Some(filename) = self.unit.filename {
                    err.set_filename(filename);
                }
                Err(err)
            }
        }
    }
}
