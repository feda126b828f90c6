use smol_str::SmolStr;
use thiserror::Error;

type Name = SmolStr;
type ArgType = Vec<SmolStr>;

/// Errors raised while rendering a compiled template.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum EvalError {
    #[error("\"{0}\" is not defined")]
    Undefined(Name),
    #[error("Key {0} not found")]
    KeyNotFound(String),
    #[error("\"{ty}\" has no attribute \"{name}\"")]
    AttributeNotFound { ty: Name, name: Name },
    #[error("Index out of bounds {0}")]
    IndexOutOfBounds(i64),
    #[error(r#"Invalid types for "{}", got {}"#, name, args.join(", "))]
    InvalidTypes { name: Name, args: ArgType },
    #[error("Invalid number of arguments in \"{0}\", expected {1}, got {2}")]
    InvalidNumberOfArguments(Name, usize, usize),
    #[error("\"{0}\" is not callable")]
    NotCallable(Name),
    #[error("Divided by 0")]
    ZeroDivision,
    #[error("Method \"{0}\" is not defined")]
    MethodNotFound(Name),
    #[error("Method \"{0}\" has no parent definition")]
    NoParentMethod(Name),
    #[error("Maximum render depth exceeded \"{0}\"")]
    RecursionError(u32),
    #[error("Runtime error: {0}")]
    Runtime(String),
}

impl EvalError {
    pub fn invalid_types(name: &str, args: &[&crate::Value]) -> Self {
        EvalError::InvalidTypes {
            name: SmolStr::new(name),
            args: args.iter().map(|arg| SmolStr::new(arg.name())).collect(),
        }
    }
}
