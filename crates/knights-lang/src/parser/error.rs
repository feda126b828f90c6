use itertools::Itertools;
use smol_str::SmolStr;
use thiserror::Error;

use crate::expr::error::ExprError;
use crate::library::error::LoadError;
use crate::range::Range;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ParseError {
    #[error("Unknown tag `{name}`")]
    UnknownTag { name: SmolStr, range: Range },
    #[error(
        "Unterminated block, expected {} but found {found}",
        .expected.iter().map(|tag| format!("`{}`", tag)).join(" or ")
    )]
    UnterminatedBlock {
        expected: Vec<SmolStr>,
        found: SmolStr,
        range: Range,
    },
    #[error("Malformed expression `{expression}`: {cause}")]
    MalformedExpression {
        expression: String,
        cause: ExprError,
        range: Range,
    },
    #[error("Method `{name}` is already defined")]
    DuplicateMethod { name: SmolStr, range: Range },
    #[error("Parent template is already set")]
    ParentAlreadySet { range: Range },
    #[error("Invalid arguments for `{tag}`: {message}")]
    InvalidArguments {
        tag: SmolStr,
        message: String,
        range: Range,
    },
    #[error("{cause}")]
    Load { cause: LoadError, range: Range },
}

impl ParseError {
    /// The template range of the directive the error was raised at.
    pub fn range(&self) -> Range {
        match self {
            ParseError::UnknownTag { range, .. }
            | ParseError::UnterminatedBlock { range, .. }
            | ParseError::MalformedExpression { range, .. }
            | ParseError::DuplicateMethod { range, .. }
            | ParseError::ParentAlreadySet { range }
            | ParseError::InvalidArguments { range, .. }
            | ParseError::Load { range, .. } => *range,
        }
    }

    pub(crate) fn code(&self) -> &'static str {
        match self {
            ParseError::UnknownTag { .. } => "ParseError::UnknownTag",
            ParseError::UnterminatedBlock { .. } => "ParseError::UnterminatedBlock",
            ParseError::MalformedExpression { .. } => "ParseError::MalformedExpression",
            ParseError::DuplicateMethod { .. } => "ParseError::DuplicateMethod",
            ParseError::ParentAlreadySet { .. } => "ParseError::ParentAlreadySet",
            ParseError::InvalidArguments { .. } => "ParseError::InvalidArguments",
            ParseError::Load { .. } => "ParseError::Load",
        }
    }
}
