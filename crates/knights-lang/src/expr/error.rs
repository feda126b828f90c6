use smol_str::SmolStr;
use thiserror::Error;

use super::token::Token;
use crate::range::{Position, Range};

#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExprError {
    #[error("Unexpected character `{0}`")]
    UnexpectedCharacter(char, Position),
    #[error("Unexpected token `{0}`")]
    UnexpectedToken(Token),
    #[error("Unexpected end of expression")]
    UnexpectedEof,
    #[error("Duplicate parameter `{0}`")]
    DuplicateParameter(SmolStr),
    #[error("Duplicate keyword argument `{0}`")]
    DuplicateKeyword(SmolStr),
    #[error("Expression is empty")]
    Empty,
    #[error("Expression is nested more than {0} levels deep")]
    TooDeeplyNested(usize, Position),
}

impl ExprError {
    /// Range of the offending input, relative to the expression source.
    pub fn range(&self) -> Option<Range> {
        match self {
            ExprError::UnexpectedCharacter(_, position) | ExprError::TooDeeplyNested(_, position) => Some(
                Range::new(*position, Position::new(position.line, position.column + 1)),
            ),
            ExprError::UnexpectedToken(token) => Some(token.range),
            _ => None,
        }
    }
}
