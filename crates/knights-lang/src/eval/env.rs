use smol_str::SmolStr;

use super::EvalError;
use crate::context::{Context, Helpers};
use crate::value::Value;

/// Everything a compiled expression can read while it runs.
///
/// `locals` holds the values of names bound inside the expression itself
/// (lambda parameters and comprehension targets), addressed by slot.
#[derive(Debug, Clone, Copy)]
pub struct Env<'a> {
    pub context: &'a Context,
    pub helpers: &'a Helpers,
    pub locals: &'a [Value],
}

impl<'a> Env<'a> {
    pub fn new(context: &'a Context, helpers: &'a Helpers) -> Self {
        Self {
            context,
            helpers,
            locals: &[],
        }
    }

    pub fn with_locals<'b>(&self, locals: &'b [Value]) -> Env<'b>
    where
        'a: 'b,
    {
        Env {
            context: self.context,
            helpers: self.helpers,
            locals,
        }
    }

    #[inline(always)]
    pub fn resolve(&self, name: &SmolStr) -> Result<Value, EvalError> {
        self.context
            .get(name)
            .cloned()
            .ok_or_else(|| EvalError::Undefined(name.clone()))
    }

    #[inline(always)]
    pub fn local(&self, slot: usize, name: &SmolStr) -> Result<Value, EvalError> {
        self.locals
            .get(slot)
            .cloned()
            .ok_or_else(|| EvalError::Undefined(name.clone()))
    }
}
