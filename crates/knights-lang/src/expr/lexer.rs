use nom::Parser;
use nom::{
    IResult,
    branch::alt,
    bytes::complete::{escaped_transform, tag, take_while, take_while_m_n, take_while1},
    character::complete::{char, digit1, multispace0, none_of},
    combinator::{map, map_opt, map_res, opt, recognize, value},
    multi::many0,
    sequence::{delimited, pair, preceded, terminated},
};
use nom_locate::position;
use smol_str::SmolStr;

use super::error::ExprError;
use super::token::{Token, TokenKind};
use crate::number::Number;
use crate::range::{Range, Span};

macro_rules! define_token_parser {
    ($name:ident, $tag:expr, $kind:expr) => {
        fn $name(input: Span) -> IResult<Span, Token> {
            map(tag($tag), |span: Span| Token {
                range: span.into(),
                span: offsets(span),
                kind: $kind,
            })
            .parse(input)
        }
    };
}

/// Splits an expression into tokens, always terminated by an `Eof` token.
pub fn tokenize(input: &str) -> Result<Vec<Token>, ExprError> {
    match terminated(many0(preceded(multispace0, token)), multispace0).parse(Span::new(input)) {
        Ok((rest, tokens)) => match rest.fragment().chars().next() {
            Some(c) => Err(ExprError::UnexpectedCharacter(c, rest.into())),
            None => Ok([
                tokens,
                vec![Token {
                    range: Range::new(rest.into(), rest.into()),
                    span: offsets(rest),
                    kind: TokenKind::Eof,
                }],
            ]
            .concat()),
        },
        Err(nom::Err::Error(e)) | Err(nom::Err::Failure(e)) => match e.input.fragment().chars().next() {
            Some(c) => Err(ExprError::UnexpectedCharacter(c, e.input.into())),
            None => Err(ExprError::UnexpectedEof),
        },
        Err(nom::Err::Incomplete(_)) => Err(ExprError::UnexpectedEof),
    }
}

fn offsets(span: Span) -> std::ops::Range<usize> {
    span.location_offset()..span.location_offset() + span.fragment().len()
}

define_token_parser!(l_paren, "(", TokenKind::LParen);
define_token_parser!(r_paren, ")", TokenKind::RParen);
define_token_parser!(l_bracket, "[", TokenKind::LBracket);
define_token_parser!(r_bracket, "]", TokenKind::RBracket);
define_token_parser!(l_brace, "{", TokenKind::LBrace);
define_token_parser!(r_brace, "}", TokenKind::RBrace);
define_token_parser!(comma, ",", TokenKind::Comma);
define_token_parser!(colon, ":", TokenKind::Colon);
define_token_parser!(dot, ".", TokenKind::Dot);
define_token_parser!(double_star, "**", TokenKind::DoubleStar);
define_token_parser!(star, "*", TokenKind::Star);
define_token_parser!(double_slash, "//", TokenKind::DoubleSlash);
define_token_parser!(slash, "/", TokenKind::Slash);
define_token_parser!(percent, "%", TokenKind::Percent);
define_token_parser!(plus, "+", TokenKind::Plus);
define_token_parser!(minus, "-", TokenKind::Minus);
define_token_parser!(eq_eq, "==", TokenKind::EqEq);
define_token_parser!(ne_eq, "!=", TokenKind::NeEq);
define_token_parser!(lte, "<=", TokenKind::Lte);
define_token_parser!(lt, "<", TokenKind::Lt);
define_token_parser!(gte, ">=", TokenKind::Gte);
define_token_parser!(gt, ">", TokenKind::Gt);
define_token_parser!(equal, "=", TokenKind::Equal);

fn punctuations(input: Span) -> IResult<Span, Token> {
    alt((
        l_paren, r_paren, l_bracket, r_bracket, l_brace, r_brace, comma, colon, dot,
    ))
    .parse(input)
}

fn operators(input: Span) -> IResult<Span, Token> {
    alt((
        double_star,
        star,
        double_slash,
        slash,
        percent,
        plus,
        minus,
        eq_eq,
        ne_eq,
        lte,
        lt,
        gte,
        gt,
        equal,
    ))
    .parse(input)
}

fn number_literal(input: Span) -> IResult<Span, Token> {
    map_res(
        recognize(pair(digit1, opt(pair(char('.'), digit1)))),
        |span: Span| {
            str::parse::<f64>(span.fragment()).map(|n| Token {
                range: span.into(),
                span: offsets(span),
                kind: TokenKind::NumberLiteral(Number::new(n)),
            })
        },
    )
    .parse(input)
}

fn unicode(input: Span) -> IResult<Span, char> {
    map_opt(
        map_res(
            preceded(
                char('u'),
                delimited(
                    char('{'),
                    take_while_m_n(1, 6, |c: char| c.is_ascii_hexdigit()),
                    char('}'),
                ),
            ),
            |span: Span| u32::from_str_radix(span.fragment(), 16),
        ),
        char::from_u32,
    )
    .parse(input)
}

fn quoted<'a>(quote: char, normal: &'static str) -> impl Parser<Span<'a>, Output = String, Error = nom::error::Error<Span<'a>>> {
    delimited(
        char(quote),
        map(
            opt(escaped_transform(
                none_of(normal),
                '\\',
                alt((
                    value('\\', char('\\')),
                    value('\"', char('\"')),
                    value('\'', char('\'')),
                    value('\r', char('r')),
                    value('\n', char('n')),
                    value('\t', char('t')),
                    unicode,
                )),
            )),
            |s: Option<String>| s.unwrap_or_default(),
        ),
        char(quote),
    )
}

fn string_literal(input: Span) -> IResult<Span, Token> {
    let (span, start) = position(input)?;
    let (span, s) = alt((quoted('"', "\"\\"), quoted('\'', "'\\"))).parse(span)?;
    let (span, end) = position(span)?;

    Ok((
        span,
        Token {
            range: Range::new(start.into(), end.into()),
            span: start.location_offset()..end.location_offset(),
            kind: TokenKind::StringLiteral(s),
        },
    ))
}

fn ident(input: Span) -> IResult<Span, Token> {
    map(
        recognize(pair(
            take_while1(|c: char| c.is_alphabetic() || c == '_'),
            take_while(|c: char| c.is_alphanumeric() || c == '_'),
        )),
        |span: Span| {
            let kind = match *span.fragment() {
                "and" => TokenKind::And,
                "or" => TokenKind::Or,
                "not" => TokenKind::Not,
                "in" => TokenKind::In,
                "if" => TokenKind::If,
                "else" => TokenKind::Else,
                "for" => TokenKind::For,
                "lambda" => TokenKind::Lambda,
                "True" | "true" => TokenKind::True,
                "False" | "false" => TokenKind::False,
                "None" | "none" => TokenKind::None,
                name => TokenKind::Ident(SmolStr::new(name)),
            };

            Token {
                range: span.into(),
                span: offsets(span),
                kind,
            }
        },
    )
    .parse(input)
}

fn token(input: Span) -> IResult<Span, Token> {
    alt((number_literal, string_literal, ident, operators, punctuations)).parse(input)
}
