use miette::{Diagnostic, SourceOffset, SourceSpan};

use crate::{eval::EvalError, library::error::LoadError, parser::error::ParseError, range::Range};

#[allow(clippy::useless_conversion)]
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum InnerError {
    #[error(transparent)]
    Parse(#[from] ParseError),
    #[error(transparent)]
    Load(#[from] LoadError),
    #[error(transparent)]
    Eval(#[from] EvalError),
}

/// Represents a high-level error with diagnostic information for the user.
#[derive(PartialEq, Debug, thiserror::Error)]
#[error("{cause}")]
pub struct Error {
    /// The underlying cause of the error.
    pub cause: InnerError,
    /// The template source the error refers to.
    pub source_code: String,
    /// The location in the source code for diagnostics.
    pub location: SourceSpan,
}

impl Error {
    pub fn from_error(source_code: impl Into<String>, cause: impl Into<InnerError>) -> Self {
        let source_code = source_code.into();
        let cause = cause.into();

        let location = match &cause {
            InnerError::Parse(err) => span(&source_code, err.range()),
            InnerError::Load(_) | InnerError::Eval(_) => {
                SourceSpan::new(SourceOffset::from_location(&source_code, 0, 0), 1)
            }
        };

        Self {
            cause,
            source_code,
            location,
        }
    }
}

fn span(source_code: &str, range: Range) -> SourceSpan {
    let start = SourceOffset::from_location(source_code, range.start.line as usize, range.start.column);
    let end = SourceOffset::from_location(source_code, range.end.line as usize, range.end.column);

    SourceSpan::new(start, std::cmp::max(end.offset().saturating_sub(start.offset()), 1))
}

impl Diagnostic for Error {
    fn code<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let code = match &self.cause {
            InnerError::Parse(err) => err.code(),
            InnerError::Load(LoadError::NotFound(_)) => "LoadError::NotFound",
            InnerError::Eval(err) => match err {
                EvalError::Undefined(_) => "EvalError::Undefined",
                EvalError::KeyNotFound(_) => "EvalError::KeyNotFound",
                EvalError::AttributeNotFound { .. } => "EvalError::AttributeNotFound",
                EvalError::IndexOutOfBounds(_) => "EvalError::IndexOutOfBounds",
                EvalError::InvalidTypes { .. } => "EvalError::InvalidTypes",
                EvalError::InvalidNumberOfArguments(_, _, _) => "EvalError::InvalidNumberOfArguments",
                EvalError::NotCallable(_) => "EvalError::NotCallable",
                EvalError::ZeroDivision => "EvalError::ZeroDivision",
                EvalError::MethodNotFound(_) => "EvalError::MethodNotFound",
                EvalError::NoParentMethod(_) => "EvalError::NoParentMethod",
                EvalError::RecursionError(_) => "EvalError::RecursionError",
                EvalError::Runtime(_) => "EvalError::Runtime",
            },
        };

        Some(Box::new(code))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn std::fmt::Display + 'a>> {
        let msg = match &self.cause {
            InnerError::Parse(ParseError::UnknownTag { name, .. }) => Some(format!(
                "Tag `{name}` is not registered. Did you forget to load its library?"
            )),
            InnerError::Parse(ParseError::UnterminatedBlock { .. }) => {
                Some("Close the block with its end tag.".to_string())
            }
            InnerError::Load(LoadError::NotFound(path)) => Some(format!(
                "Library `{path}` could not be resolved. Check the path passed to the resolver."
            )),
            InnerError::Eval(EvalError::Undefined(name)) => {
                Some(format!("'{name}' is not defined. Did you forget to pass it in the context?"))
            }
            InnerError::Eval(EvalError::RecursionError(depth)) => Some(format!(
                "Methods rendered more than {depth} levels deep. Check for a method that renders itself."
            )),
            _ => None,
        };

        msg.map(|m| Box::new(m) as Box<dyn std::fmt::Display>)
    }

    fn labels(&self) -> Option<Box<dyn Iterator<Item = miette::LabeledSpan> + '_>> {
        Some(Box::new(std::iter::once(miette::LabeledSpan::new_with_span(
            Some(format!("{}", self.cause)),
            self.location,
        ))))
    }

    fn source_code(&self) -> Option<&dyn miette::SourceCode> {
        Some(&self.source_code)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::range::Position;
    use rstest::rstest;

    #[rstest]
    #[case::unknown_tag(
        "line\n{% bogus %}",
        ParseError::UnknownTag {
            name: "bogus".into(),
            range: Range::new(Position::new(2, 1), Position::new(2, 12)),
        },
        5,
        11
    )]
    #[case::empty_range(
        "abc",
        ParseError::ParentAlreadySet {
            range: Range::new(Position::new(1, 2), Position::new(1, 2)),
        },
        1,
        1
    )]
    fn test_parse_error_location(
        #[case] source: &str,
        #[case] cause: ParseError,
        #[case] offset: usize,
        #[case] len: usize,
    ) {
        let err = Error::from_error(source, cause);

        assert_eq!(err.location.offset(), offset);
        assert_eq!(err.location.len(), len);
    }

    #[rstest]
    #[case::parse(
        InnerError::Parse(ParseError::UnknownTag { name: "x".into(), range: Range::default() }),
        "ParseError::UnknownTag"
    )]
    #[case::load(InnerError::Load(LoadError::NotFound("std".to_string())), "LoadError::NotFound")]
    #[case::eval(InnerError::Eval(EvalError::ZeroDivision), "EvalError::ZeroDivision")]
    fn test_code(#[case] cause: InnerError, #[case] expected: &str) {
        let err = Error::from_error("", cause);

        assert_eq!(err.code().map(|code| code.to_string()), Some(expected.to_string()));
    }

    #[test]
    fn test_display() {
        let err = Error::from_error("{{ x }}", EvalError::Undefined("x".into()));

        assert_eq!(err.to_string(), "\"x\" is not defined");
    }
}
