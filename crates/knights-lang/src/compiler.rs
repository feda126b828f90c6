//! Closure compiler for template expressions.
//!
//! Every expression node becomes a closure over an [`Env`](crate::eval::Env).
//! Free identifiers turn into context lookups resolved at render time, so a
//! template is parsed once and evaluated against any number of contexts.
//!
//! ```rust
//! use knights_lang::{Context, Helpers, compile_expression};
//!
//! let expr = compile_expression("[n * 2 for n in numbers if n > 1]").unwrap();
//! let context = Context::from_json(r#"{"numbers": [1, 2, 3]}"#).unwrap();
//!
//! assert_eq!(expr.free_names(), ["numbers"]);
//! assert_eq!(expr.evaluate(&context, &Helpers::default()).unwrap().to_string(), "[4, 6]");
//! ```

mod compile;
pub(crate) mod compiled;

pub(crate) use compile::Compiler;
pub(crate) use compiled::CompiledExpr;
