pub mod token;

use nom::Parser;
use nom::{
    IResult, Input,
    branch::alt,
    bytes::complete::{tag, take_until},
    character::complete::anychar,
    combinator::{map, recognize},
    sequence::{delimited, pair},
};
use nom_locate::position;
use token::{Token, TokenKind};

use crate::range::{Range, Span};

/// Scans template source into a lazy stream of tokens.
///
/// Every byte of the source ends up in exactly one token: concatenating the
/// `raw` slice of each token reproduces the input. A directive whose closing
/// delimiter never appears is not a directive at all and is emitted as text.
#[derive(Debug, Clone)]
pub struct Lexer<'a> {
    rest: Span<'a>,
    pending: Option<Token<'a>>,
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            rest: Span::new(source),
            pending: None,
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = Token<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        if let Some(token) = self.pending.take() {
            return Some(token);
        }

        let fragment: &'a str = *self.rest.fragment();
        if fragment.is_empty() {
            return None;
        }

        let mut search = 0;
        while let Some(found) = fragment[search..].find('{') {
            let at = search + found;
            let (candidate, text) = self.rest.take_split(at);

            if let Ok((rest, token)) = directive(candidate) {
                log::trace!("{} token at {:?}", token.kind, token.range.start);
                self.rest = rest;

                if text.fragment().is_empty() {
                    return Some(token);
                }

                self.pending = Some(token);
                return Some(text_token(text, candidate));
            }

            search = at + 1;
        }

        let (rest, text) = self.rest.take_split(fragment.len());
        self.rest = rest;
        Some(text_token(text, rest))
    }
}

fn text_token<'a>(text: Span<'a>, next: Span<'a>) -> Token<'a> {
    let content: &'a str = *text.fragment();
    Token {
        kind: TokenKind::Text,
        content,
        raw: content,
        range: Range::new(text.into(), next.into()),
    }
}

fn delimited_body<'a>(
    open: &'static str,
    close: &'static str,
) -> impl Parser<Span<'a>, Output = Span<'a>, Error = nom::error::Error<Span<'a>>> {
    // The body is non-greedy and holds at least one character.
    delimited(tag(open), recognize(pair(anychar, take_until(close))), tag(close))
}

fn directive(input: Span) -> IResult<Span, Token> {
    let (span, start) = position(input)?;
    let (span, (kind, body)) = alt((
        map(delimited_body("{!", "!}"), |body| (TokenKind::Load, body)),
        map(delimited_body("{%", "%}"), |body| (TokenKind::Block, body)),
        map(delimited_body("{{", "}}"), |body| (TokenKind::Var, body)),
        map(delimited_body("{#", "#}"), |body| (TokenKind::Comment, body)),
    ))
    .parse(span)?;
    let (span, end) = position(span)?;

    let source: &str = *input.fragment();
    let body: &str = *body.fragment();
    let consumed = span.location_offset() - input.location_offset();

    Ok((
        span,
        Token {
            kind,
            content: body.trim(),
            raw: &source[..consumed],
            range: Range::new(start.into(), end.into()),
        },
    ))
}
