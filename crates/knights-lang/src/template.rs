use std::sync::Arc;

use itertools::Itertools;
use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::context::{Context, Helpers};
use crate::eval::EvalError;
use crate::render::{Render, Renderer};
use crate::statement::Statement;

/// Name of the method holding a template's top-level body.
pub const ROOT: &str = "_root";

/// A named sequence of statements, together with the helper table of the
/// template that defined it.
#[derive(Debug)]
pub struct Method {
    name: SmolStr,
    body: Vec<Statement>,
    helpers: Helpers,
}

impl Method {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn body(&self) -> &[Statement] {
        &self.body
    }

    pub fn helpers(&self) -> &Helpers {
        &self.helpers
    }
}

/// Everything the parser collected for one template.
#[derive(Debug)]
pub(crate) struct Definition {
    pub name: SmolStr,
    pub parent: Option<Arc<Template>>,
    pub root: Vec<Statement>,
    pub methods: FxHashMap<SmolStr, Vec<Statement>>,
    pub helpers: Helpers,
}

/// A compiled template. Immutable, and safe to render from many threads at
/// once.
#[derive(Debug)]
pub struct Template {
    name: SmolStr,
    parent: Option<Arc<Template>>,
    /// Definitions per method name, most derived first.
    table: FxHashMap<SmolStr, Vec<Arc<Method>>>,
    helpers: Helpers,
    max_render_depth: u32,
}

impl Template {
    pub(crate) fn assemble(definition: Definition, max_render_depth: u32) -> Self {
        let Definition {
            name,
            parent,
            root,
            methods,
            helpers,
        } = definition;

        let mut table = parent
            .as_ref()
            .map(|parent| parent.table.clone())
            .unwrap_or_default();

        let method = |name: SmolStr, body: Vec<Statement>| {
            Arc::new(Method {
                name,
                body,
                helpers: helpers.clone(),
            })
        };

        // A child template renders through its parent's top-level body.
        if parent.is_none() {
            table.insert(SmolStr::new_static(ROOT), vec![method(SmolStr::new_static(ROOT), root)]);
        }

        for (method_name, body) in methods {
            let chain = table.entry(method_name.clone()).or_default();
            chain.insert(0, method(method_name, body));
        }

        log::debug!(
            "Assembled template `{}` with methods {}",
            name,
            table.keys().sorted().join(", ")
        );

        Self {
            name,
            parent,
            table,
            helpers,
            max_render_depth,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn parent(&self) -> Option<&Arc<Template>> {
        self.parent.as_ref()
    }

    pub fn helpers(&self) -> &Helpers {
        &self.helpers
    }

    pub fn max_render_depth(&self) -> u32 {
        self.max_render_depth
    }

    /// The definition of `name` that renders for this template.
    pub fn method(&self, name: &str) -> Option<&Arc<Method>> {
        self.chain(name).first()
    }

    /// Every definition of `name`, from this template up through its parents.
    pub fn chain(&self, name: &str) -> &[Arc<Method>] {
        self.table.get(name).map(Vec::as_slice).unwrap_or_default()
    }

    pub fn method_names(&self) -> Vec<&str> {
        self.table.keys().map(SmolStr::as_str).sorted().collect()
    }

    /// Renders the entry method against `context`.
    ///
    /// Fragments are produced lazily; the iterator ends after the first error.
    pub fn render(&self, context: &Context) -> Render<'_> {
        self.render_method(ROOT, context)
    }

    pub fn render_method(&self, name: &str, context: &Context) -> Render<'_> {
        Render::new(Renderer::new(self).render_method(name, context))
    }

    pub fn render_to_string(&self, context: &Context) -> Result<String, EvalError> {
        self.render(context).into_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn definition(name: &str, parent: Option<Arc<Template>>, methods: &[(&str, &str)]) -> Definition {
        Definition {
            name: name.into(),
            parent,
            root: vec![Statement::Text(format!("{} root", name))],
            methods: methods
                .iter()
                .map(|(name, text)| (SmolStr::new(name), vec![Statement::Text(text.to_string())]))
                .collect(),
            helpers: Helpers::default(),
        }
    }

    #[test]
    fn test_assemble_without_parent() {
        let template = Template::assemble(definition("page", None, &[("title", "Title")]), 16);

        assert_eq!(template.method_names(), vec!["_root", "title"]);
        assert_eq!(template.chain("title").len(), 1);
        assert!(template.method("missing").is_none());
        assert!(template.chain("missing").is_empty());
    }

    #[test]
    fn test_assemble_with_parent() {
        let parent = Arc::new(Template::assemble(
            definition("base", None, &[("title", "Base"), ("footer", "Footer")]),
            16,
        ));
        let child = Template::assemble(
            definition("child", Some(Arc::clone(&parent)), &[("title", "Child"), ("extra", "Extra")]),
            16,
        );

        assert_eq!(child.method_names(), vec!["_root", "extra", "footer", "title"]);
        assert_eq!(child.chain("title").len(), 2);
        assert!(Arc::ptr_eq(&child.chain("title")[1], &parent.chain("title")[0]));
        assert!(Arc::ptr_eq(&child.chain(ROOT)[0], &parent.chain(ROOT)[0]));
        assert_eq!(child.parent().map(|p| p.name()), Some("base"));
    }
}
