//! Compiled expression types.

use std::sync::Arc;

use crate::eval::{Env, EvalError};
use crate::value::Value;

/// An expression compiled into a closure.
///
/// Lambda values hold a clone of their compiled body, which may outlive the
/// template that defined it.
pub type CompiledExpr = Arc<dyn Fn(&Env<'_>) -> Result<Value, EvalError> + Send + Sync>;

/// One `for ... in ... if ...` clause of a compiled list comprehension.
pub(crate) struct CompiledClause {
    /// Number of names the clause binds per item.
    pub arity: usize,
    pub iter: CompiledExpr,
    pub conditions: Vec<CompiledExpr>,
}
