use std::fmt::Debug;

use crate::context::Context;
use crate::expr::Expression;
use crate::render::{Fragments, Renderer};

/// A statement handed out by a tag handler.
///
/// The node is rendered lazily: it may render nested statement lists or
/// named methods through the renderer any number of times, and may narrow
/// the context for those renders only. Any state the returned fragments
/// need from `context` must be cloned into them.
pub trait Node: Debug + Send + Sync {
    fn render<'a>(&'a self, renderer: Renderer<'a>, context: &Context) -> Fragments<'a>;
}

#[derive(Debug)]
pub enum Statement {
    /// Literal text, emitted verbatim.
    Text(String),
    /// An interpolated expression, emitted as its string form.
    Expr(Expression),
    External(Box<dyn Node>),
}

impl Statement {
    pub fn external(node: impl Node + 'static) -> Self {
        Statement::External(Box::new(node))
    }
}
