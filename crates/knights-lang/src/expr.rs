pub mod error;
pub mod lexer;
pub mod node;
pub mod parser;
pub mod token;

use std::{fmt, sync::Arc};

use smol_str::SmolStr;

use crate::compiler::{CompiledExpr, Compiler};
use crate::context::{Context, Helpers};
use crate::eval::{Env, EvalError};
use crate::value::Value;
use error::ExprError;
use node::Node;
use parser::Parser;

/// A compiled expression, ready to be evaluated against any context.
#[derive(Clone)]
pub struct Expression {
    source: SmolStr,
    compiled: CompiledExpr,
    free_names: Arc<[SmolStr]>,
}

impl Expression {
    fn from_node(source: &str, node: &Node) -> Self {
        let (compiled, free_names) = Compiler::new().compile(node);

        Self {
            source: SmolStr::new(source),
            compiled,
            free_names: free_names.into(),
        }
    }

    pub fn source(&self) -> &str {
        &self.source
    }

    /// Context names the expression reads, in order of first use.
    pub fn free_names(&self) -> &[SmolStr] {
        &self.free_names
    }

    #[inline(always)]
    pub fn evaluate(&self, context: &Context, helpers: &Helpers) -> Result<Value, EvalError> {
        (self.compiled)(&Env::new(context, helpers))
    }
}

impl fmt::Debug for Expression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Expression")
            .field("source", &self.source)
            .field("free_names", &self.free_names)
            .finish()
    }
}

/// Compiles a single expression.
pub fn compile_expression(source: &str) -> Result<Expression, ExprError> {
    let tokens = lexer::tokenize(source)?;
    let node = Parser::new(tokens).parse()?;

    Ok(Expression::from_node(source.trim(), &node))
}

/// Positional and keyword arguments of a tag, in source order.
#[derive(Debug, Clone, Default)]
pub struct Arguments {
    pub positional: Vec<Expression>,
    pub keywords: Vec<(SmolStr, Expression)>,
}

impl Arguments {
    pub fn keyword(&self, name: &str) -> Option<&Expression> {
        self.keywords
            .iter()
            .find_map(|(keyword, expr)| (keyword == name).then_some(expr))
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.keywords.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Parses `a, b, key=value` into compiled arguments.
pub fn parse_arguments(source: &str) -> Result<Arguments, ExprError> {
    let tokens = lexer::tokenize(source)?;
    let mut arguments = Arguments::default();

    for arg in Parser::new(tokens).parse_arguments()? {
        let expr = Expression::from_node(source.get(arg.span).unwrap_or(source), &arg.node);

        match arg.keyword {
            Some(keyword) if arguments.keyword(&keyword).is_some() => {
                return Err(ExprError::DuplicateKeyword(keyword));
            }
            Some(keyword) => arguments.keywords.push((keyword, expr)),
            None => arguments.positional.push(expr),
        }
    }

    Ok(arguments)
}
