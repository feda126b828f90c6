use std::fmt::{self, Display, Formatter};

use smol_str::SmolStr;

use crate::{number::Number, range::Range};

#[derive(PartialEq, Debug, Clone)]
pub struct Token {
    pub range: Range,
    /// Byte offsets of the token within the expression source.
    pub span: std::ops::Range<usize>,
    pub kind: TokenKind,
}

impl Token {
    #[inline(always)]
    pub fn is_eof(&self) -> bool {
        matches!(self.kind, TokenKind::Eof)
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum TokenKind {
    And,
    Colon,
    Comma,
    Dot,
    DoubleSlash,
    DoubleStar,
    Else,
    Eof,
    EqEq,
    Equal,
    False,
    For,
    Gt,
    Gte,
    Ident(SmolStr),
    If,
    In,
    LBrace,
    LBracket,
    LParen,
    Lambda,
    Lt,
    Lte,
    Minus,
    NeEq,
    None,
    Not,
    NumberLiteral(Number),
    Or,
    Percent,
    Plus,
    RBrace,
    RBracket,
    RParen,
    Slash,
    Star,
    StringLiteral(String),
    True,
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        write!(f, "{}", self.kind)
    }
}

impl Display for TokenKind {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result<(), fmt::Error> {
        match &self {
            TokenKind::And => write!(f, "and"),
            TokenKind::Colon => write!(f, ":"),
            TokenKind::Comma => write!(f, ","),
            TokenKind::Dot => write!(f, "."),
            TokenKind::DoubleSlash => write!(f, "//"),
            TokenKind::DoubleStar => write!(f, "**"),
            TokenKind::Else => write!(f, "else"),
            TokenKind::Eof => write!(f, "end of expression"),
            TokenKind::EqEq => write!(f, "=="),
            TokenKind::Equal => write!(f, "="),
            TokenKind::False => write!(f, "False"),
            TokenKind::For => write!(f, "for"),
            TokenKind::Gt => write!(f, ">"),
            TokenKind::Gte => write!(f, ">="),
            TokenKind::Ident(ident) => write!(f, "{}", ident),
            TokenKind::If => write!(f, "if"),
            TokenKind::In => write!(f, "in"),
            TokenKind::LBrace => write!(f, "{{"),
            TokenKind::LBracket => write!(f, "["),
            TokenKind::LParen => write!(f, "("),
            TokenKind::Lambda => write!(f, "lambda"),
            TokenKind::Lt => write!(f, "<"),
            TokenKind::Lte => write!(f, "<="),
            TokenKind::Minus => write!(f, "-"),
            TokenKind::NeEq => write!(f, "!="),
            TokenKind::None => write!(f, "None"),
            TokenKind::Not => write!(f, "not"),
            TokenKind::NumberLiteral(n) => write!(f, "{}", n),
            TokenKind::Or => write!(f, "or"),
            TokenKind::Percent => write!(f, "%"),
            TokenKind::Plus => write!(f, "+"),
            TokenKind::RBrace => write!(f, "}}"),
            TokenKind::RBracket => write!(f, "]"),
            TokenKind::RParen => write!(f, ")"),
            TokenKind::Slash => write!(f, "/"),
            TokenKind::Star => write!(f, "*"),
            TokenKind::StringLiteral(s) => write!(f, "{:?}", s),
            TokenKind::True => write!(f, "True"),
        }
    }
}
