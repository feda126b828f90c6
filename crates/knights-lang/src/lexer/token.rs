use std::fmt::{self, Display, Formatter};

use crate::range::Range;

#[derive(PartialEq, Eq, Debug, Clone, Copy, Hash)]
pub enum TokenKind {
    Text,
    Var,
    Block,
    Comment,
    Load,
}

impl TokenKind {
    /// Opening and closing delimiters of a directive, `None` for text.
    pub fn delimiters(&self) -> Option<(&'static str, &'static str)> {
        match self {
            TokenKind::Text => None,
            TokenKind::Load => Some(("{!", "!}")),
            TokenKind::Block => Some(("{%", "%}")),
            TokenKind::Var => Some(("{{", "}}")),
            TokenKind::Comment => Some(("{#", "#}")),
        }
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self {
            TokenKind::Text => write!(f, "text"),
            TokenKind::Var => write!(f, "var"),
            TokenKind::Block => write!(f, "block"),
            TokenKind::Comment => write!(f, "comment"),
            TokenKind::Load => write!(f, "load"),
        }
    }
}

/// A single lexical unit of a template.
///
/// `content` is the trimmed directive body (or the verbatim text), while
/// `raw` is the exact slice of the source the token was scanned from,
/// delimiters included.
#[derive(PartialEq, Eq, Debug, Clone)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub content: &'a str,
    pub raw: &'a str,
    pub range: Range,
}

impl Display for Token<'_> {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match self.kind.delimiters() {
            Some((open, close)) => write!(f, "{} {} {}", open, self.content, close),
            None => write!(f, "{}", self.content),
        }
    }
}
