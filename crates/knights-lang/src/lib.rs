//! `knights-lang` compiles text templates once and renders them many times.
//!
//! A template mixes literal text with `{{ expression }}` interpolation,
//! `{% tag args %}` blocks, `{# comments #}` and `{! library !}` loads. Block
//! tags are supplied by the caller through a [`Library`]; the core only
//! knows how to drive them.
//!
//! ## Examples
//!
//! ```rust
//! use knights_lang::{Context, Engine};
//!
//! let engine = Engine::default();
//! let template = engine.compile("Hello {{ name }}!").unwrap();
//!
//! let context = Context::from_iter([("name", "World")]);
//! assert_eq!(template.render_to_string(&context).unwrap(), "Hello World!");
//! ```
//!
//! Tags receive the [`Parser`] and drive it themselves:
//!
//! ```rust
//! use knights_lang::{Context, Engine, Statement};
//!
//! let mut engine = Engine::default();
//! engine.register_tag_fn("shout", |parser, _args| {
//!     let (body, _) = parser.parse_until(&["endshout"])?;
//!     body.into_iter().for_each(|statement| parser.emit(statement));
//!     parser.emit(Statement::Text("!".to_string()));
//!     Ok(None)
//! });
//!
//! let template = engine.compile("{% shout %}hey{% endshout %}").unwrap();
//! assert_eq!(template.render_to_string(&Context::new()).unwrap(), "hey!");
//! ```
mod compiler;
mod context;
mod engine;
mod error;
mod eval;
mod expr;
mod lexer;
mod library;
mod number;
mod parser;
mod range;
mod render;
mod statement;
mod template;
mod value;

pub use context::{Context, Helpers};
pub use engine::{Engine, Options};
pub use error::{Error, InnerError};
pub use eval::EvalError;
pub use expr::error::ExprError;
pub use expr::{Arguments, Expression, compile_expression, parse_arguments};
pub use lexer::Lexer;
pub use lexer::token::{Token, TokenKind};
pub use library::error::LoadError;
pub use library::resolver::{LibraryResolver, StaticLibraryResolver};
pub use library::{Library, Tag};
pub use number::Number;
pub use parser::Parser;
pub use parser::error::ParseError;
pub use range::{Position, Range};
pub use render::{Fragment, Fragments, Render, Renderer};
pub use statement::{Node, Statement};
pub use template::{Method, ROOT, Template};
pub use value::{Function, Value};

/// Scans `source` into a lazy stream of tokens.
///
/// The tokens partition the source: concatenating their `raw` slices gives
/// back the input.
pub fn tokenize(source: &str) -> Lexer<'_> {
    Lexer::new(source)
}
