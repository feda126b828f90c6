use std::borrow::Cow;
use std::iter;

use crate::context::{Context, Helpers};
use crate::eval::EvalError;
use crate::expr::Expression;
use crate::statement::Statement;
use crate::template::{ROOT, Template};
use crate::value::Value;

/// A piece of rendered output.
pub type Fragment<'a> = Cow<'a, str>;

/// A lazy stream of fragments borrowing from the template being rendered.
pub type Fragments<'a> = Box<dyn Iterator<Item = Result<Fragment<'a>, EvalError>> + 'a>;

/// Rendering state handed to statements.
///
/// Tracks which method definition is currently rendering, so that a node can
/// render the next definition up the chain, and the helper table of the
/// template that defined it.
#[derive(Debug, Clone, Copy)]
pub struct Renderer<'a> {
    template: &'a Template,
    method: &'a str,
    position: usize,
    helpers: &'a Helpers,
    depth: u32,
}

impl<'a> Renderer<'a> {
    pub(crate) fn new(template: &'a Template) -> Self {
        Self {
            template,
            method: ROOT,
            position: 0,
            helpers: template.helpers(),
            depth: 0,
        }
    }

    pub fn template(&self) -> &'a Template {
        self.template
    }

    pub fn helpers(&self) -> &'a Helpers {
        self.helpers
    }

    /// Name of the method currently rendering.
    pub fn method(&self) -> &'a str {
        self.method
    }

    pub fn depth(&self) -> u32 {
        self.depth
    }

    pub fn evaluate(&self, expr: &Expression, context: &Context) -> Result<Value, EvalError> {
        expr.evaluate(context, self.helpers)
    }

    /// Renders a statement list against its own copy of `context`.
    pub fn render_statements(self, statements: &'a [Statement], context: &Context) -> Fragments<'a> {
        let context = context.clone();

        Box::new(
            statements
                .iter()
                .flat_map(move |statement| self.render_statement(statement, &context)),
        )
    }

    /// Renders the most derived definition of the method `name`.
    pub fn render_method(self, name: &str, context: &Context) -> Fragments<'a> {
        match self.template.chain(name).first() {
            Some(method) => self.enter(method.name(), 0, context),
            None => failure(EvalError::MethodNotFound(name.into())),
        }
    }

    /// Renders the definition the current method overrides.
    pub fn render_super(self, context: &Context) -> Fragments<'a> {
        let position = self.position + 1;

        if position < self.template.chain(self.method).len() {
            self.enter(self.method, position, context)
        } else {
            failure(EvalError::NoParentMethod(self.method.into()))
        }
    }

    fn enter(self, name: &'a str, position: usize, context: &Context) -> Fragments<'a> {
        let max_depth = self.template.max_render_depth();
        if self.depth >= max_depth {
            return failure(EvalError::RecursionError(max_depth));
        }

        let Some(method) = self.template.chain(name).get(position) else {
            return failure(EvalError::MethodNotFound(name.into()));
        };

        log::trace!("Rendering `{}` #{} at depth {}", name, position, self.depth + 1);

        Renderer {
            method: name,
            position,
            helpers: method.helpers(),
            depth: self.depth + 1,
            ..self
        }
        .render_statements(method.body(), context)
    }

    fn render_statement(self, statement: &'a Statement, context: &Context) -> Fragments<'a> {
        match statement {
            Statement::Text(text) => Box::new(iter::once(Ok(Cow::Borrowed(text.as_str())))),
            Statement::Expr(expr) => {
                let fragment = self
                    .evaluate(expr, context)
                    .map(|value| Cow::Owned(value.to_string()));
                Box::new(iter::once(fragment))
            }
            Statement::External(node) => node.render(self, context),
        }
    }
}

fn failure<'a>(err: EvalError) -> Fragments<'a> {
    Box::new(iter::once(Err(err)))
}

/// The output of rendering a template.
///
/// Yields fragments in document order and stops after the first error.
pub struct Render<'a> {
    fragments: Fragments<'a>,
    failed: bool,
}

impl<'a> Render<'a> {
    pub(crate) fn new(fragments: Fragments<'a>) -> Self {
        Self {
            fragments,
            failed: false,
        }
    }

    /// Concatenates every fragment, or returns the first error.
    pub fn into_string(self) -> Result<String, EvalError> {
        self.collect()
    }
}

impl<'a> Iterator for Render<'a> {
    type Item = Result<Fragment<'a>, EvalError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        let next = self.fragments.next();
        self.failed = matches!(next, Some(Err(_)));
        next
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::compile_expression;
    use crate::template::Definition;
    use rustc_hash::FxHashMap;

    fn template(root: Vec<Statement>) -> Template {
        Template::assemble(
            Definition {
                name: "test".into(),
                parent: None,
                root,
                methods: FxHashMap::default(),
                helpers: Helpers::default(),
            },
            8,
        )
    }

    fn expr(source: &str) -> Statement {
        Statement::Expr(compile_expression(source).unwrap())
    }

    #[test]
    fn test_render_fragments_in_order() {
        let template = template(vec![Statement::Text("a".to_string()), expr("1 + 1"), expr("none")]);
        let context = Context::new();

        let fragments = template
            .render(&context)
            .collect::<Result<Vec<_>, _>>()
            .unwrap();

        assert_eq!(fragments, vec!["a", "2", ""]);
        assert!(matches!(fragments[0], Cow::Borrowed(_)));
    }

    #[test]
    fn test_render_stops_after_first_error() {
        let template = template(vec![
            Statement::Text("a".to_string()),
            expr("missing"),
            Statement::Text("b".to_string()),
        ]);
        let context = Context::new();

        let mut render = template.render(&context);
        assert_eq!(render.next(), Some(Ok(Cow::Borrowed("a"))));
        assert_eq!(render.next(), Some(Err(EvalError::Undefined("missing".into()))));
        assert_eq!(render.next(), None);
    }

    #[test]
    fn test_render_is_lazy() {
        let template = template(vec![Statement::Text("a".to_string()), expr("1 // 0")]);
        let context = Context::new();

        let first = template.render(&context).next();
        assert_eq!(first, Some(Ok(Cow::Borrowed("a"))));
        assert_eq!(template.render_to_string(&context), Err(EvalError::ZeroDivision));
    }

    #[test]
    fn test_render_missing_method() {
        let template = template(Vec::new());
        let context = Context::new();

        assert_eq!(
            template.render_method("title", &context).into_string(),
            Err(EvalError::MethodNotFound("title".into()))
        );
    }

    #[derive(Debug)]
    struct Super;

    impl crate::statement::Node for Super {
        fn render<'a>(&'a self, renderer: Renderer<'a>, context: &Context) -> Fragments<'a> {
            renderer.render_super(context)
        }
    }

    #[test]
    fn test_render_super_without_parent() {
        let template = template(vec![Statement::external(Super)]);
        let context = Context::new();

        assert_eq!(
            template.render_to_string(&context),
            Err(EvalError::NoParentMethod("_root".into()))
        );
    }

    #[derive(Debug)]
    struct Recurse;

    impl crate::statement::Node for Recurse {
        fn render<'a>(&'a self, renderer: Renderer<'a>, context: &Context) -> Fragments<'a> {
            renderer.render_method(renderer.method(), context)
        }
    }

    #[test]
    fn test_render_recursion_limit() {
        let template = template(vec![Statement::Text(".".to_string()), Statement::external(Recurse)]);
        let context = Context::new();

        let fragments = template.render(&context).collect::<Vec<_>>();

        assert_eq!(fragments.len(), 9);
        assert_eq!(fragments.last(), Some(&Err(EvalError::RecursionError(8))));
    }
}
