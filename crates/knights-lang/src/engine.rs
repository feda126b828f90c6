use std::{fmt, sync::Arc};

use smol_str::SmolStr;

use crate::error::Error;
use crate::library::Library;
use crate::library::resolver::{LibraryResolver, StaticLibraryResolver};
use crate::parser::Parser;
use crate::statement::Statement;
use crate::template::Template;
use crate::value::Value;

#[derive(Debug, Clone)]
pub struct Options {
    /// How deep method renders may nest before rendering fails.
    pub max_render_depth: u32,
}

impl Default for Options {
    fn default() -> Self {
        Self { max_render_depth: 1024 }
    }
}

/// Compiles templates against a base library and a library resolver.
///
/// The engine itself holds no per-template state: every compiled
/// [`Template`] is independent and can be shared across threads.
#[derive(Clone)]
pub struct Engine {
    library: Library,
    resolver: Arc<dyn LibraryResolver>,
    options: Options,
}

impl Default for Engine {
    fn default() -> Self {
        Self {
            library: Library::default(),
            resolver: Arc::new(StaticLibraryResolver::new()),
            options: Options::default(),
        }
    }
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("library", &self.library)
            .field("options", &self.options)
            .finish()
    }
}

impl Engine {
    pub fn new(library: Library) -> Self {
        Self {
            library,
            ..Self::default()
        }
    }

    pub fn set_resolver(&mut self, resolver: impl LibraryResolver + 'static) -> &mut Self {
        self.resolver = Arc::new(resolver);
        self
    }

    pub fn set_max_render_depth(&mut self, max_render_depth: u32) -> &mut Self {
        self.options.max_render_depth = max_render_depth;
        self
    }

    pub fn options(&self) -> &Options {
        &self.options
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    pub fn register_tag_fn<F>(&mut self, name: impl Into<SmolStr>, f: F) -> &mut Self
    where
        F: Fn(&mut Parser<'_>, &str) -> Result<Option<Statement>, crate::ParseError>
            + Send
            + Sync
            + 'static,
    {
        self.library.register_tag_fn(name, f);
        self
    }

    pub fn register_tag(&mut self, name: impl Into<SmolStr>, tag: impl crate::Tag + 'static) -> &mut Self {
        self.library.register_tag(name, tag);
        self
    }

    pub fn register_helper(&mut self, name: impl Into<SmolStr>, value: impl Into<Value>) -> &mut Self {
        self.library.register_helper(name, value);
        self
    }

    /// Resolves `path` and merges the library into the base library, so that
    /// every template compiled afterwards sees it.
    #[allow(clippy::result_large_err)]
    pub fn load_library(&mut self, path: &str) -> Result<&mut Self, Error> {
        let library = self
            .resolver
            .resolve(path)
            .map_err(|e| Error::from_error("", e))?;

        log::debug!("Loaded library `{}` into the engine", path);
        self.library.merge(&library);
        Ok(self)
    }

    #[allow(clippy::result_large_err)]
    pub fn compile(&self, source: &str) -> Result<Template, Error> {
        self.compile_named("<template>", source)
    }

    /// Compiles `source` into a template named `name`.
    #[allow(clippy::result_large_err)]
    pub fn compile_named(&self, name: &str, source: &str) -> Result<Template, Error> {
        let definition = Parser::new(name, source, self.library.clone(), self.resolver.as_ref())
            .parse()
            .map_err(|e| Error::from_error(source, e))?;

        Ok(Template::assemble(definition, self.options.max_render_depth))
    }

    pub const fn version() -> &'static str {
        env!("CARGO_PKG_VERSION")
    }
}
