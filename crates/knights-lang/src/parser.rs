pub mod error;

use std::sync::Arc;

use rustc_hash::FxHashMap;
use smol_str::SmolStr;

use crate::expr::{self, Arguments, Expression};
use crate::lexer::Lexer;
use crate::lexer::token::TokenKind;
use crate::library::Library;
use crate::library::resolver::LibraryResolver;
use crate::range::{Position, Range};
use crate::statement::Statement;
use crate::template::{Definition, ROOT, Template};
use error::ParseError;

const END_OF_INPUT: &str = "end of input";

/// Drives the token stream of one template.
///
/// Tag handlers receive the parser while their tag is being handled and use
/// it to consume nested statement lists, define methods and set the parent
/// template.
pub struct Parser<'a> {
    name: SmolStr,
    lexer: Lexer<'a>,
    library: Library,
    resolver: &'a dyn LibraryResolver,
    buffers: Vec<Vec<Statement>>,
    methods: FxHashMap<SmolStr, Vec<Statement>>,
    pending: Vec<SmolStr>,
    parent: Option<Arc<Template>>,
    range: Range,
    directive: &'a str,
}

impl<'a> Parser<'a> {
    pub(crate) fn new(
        name: impl Into<SmolStr>,
        source: &'a str,
        library: Library,
        resolver: &'a dyn LibraryResolver,
    ) -> Self {
        Self {
            name: name.into(),
            lexer: Lexer::new(source),
            library,
            resolver,
            buffers: Vec::new(),
            methods: FxHashMap::default(),
            pending: Vec::new(),
            parent: None,
            range: Range::default(),
            directive: "",
        }
    }

    pub(crate) fn parse(mut self) -> Result<Definition, ParseError> {
        log::debug!("Parsing template `{}`", self.name);

        let (root, _) = self.parse_statements(&[])?;

        Ok(Definition {
            name: self.name,
            parent: self.parent,
            root,
            methods: self.methods,
            helpers: self.library.to_helpers(),
        })
    }

    /// Parses statements until one of `end_tags` closes the current scope.
    ///
    /// Returns the statements together with the end tag that was found. An
    /// empty `end_tags` consumes the rest of the template and returns an
    /// empty end tag.
    pub fn parse_until(&mut self, end_tags: &[&str]) -> Result<(Vec<Statement>, SmolStr), ParseError> {
        let (statements, end_tag) = self.parse_statements(end_tags)?;
        Ok((statements, end_tag.unwrap_or_default()))
    }

    /// Appends a statement to the scope currently being parsed.
    pub fn emit(&mut self, statement: Statement) {
        if let Some(buffer) = self.buffers.last_mut() {
            buffer.push(statement);
        }
    }

    /// Parses a method body up to one of `end_tags` and stores it under
    /// `name`. Returns the end tag that closed the body.
    pub fn build_method(&mut self, name: &str, end_tags: &[&str]) -> Result<SmolStr, ParseError> {
        if name == ROOT
            || self.methods.contains_key(name)
            || self.pending.iter().any(|pending| pending == name)
        {
            return Err(ParseError::DuplicateMethod {
                name: name.into(),
                range: self.range,
            });
        }

        self.pending.push(name.into());
        let result = self.parse_until(end_tags);
        self.pending.pop();

        let (body, end_tag) = result?;
        log::trace!("Defined method `{}` in `{}`", name, self.name);
        self.methods.insert(name.into(), body);

        Ok(end_tag)
    }

    pub fn set_parent(&mut self, parent: Arc<Template>) -> Result<(), ParseError> {
        if self.parent.is_some() {
            return Err(ParseError::ParentAlreadySet { range: self.range });
        }

        log::trace!("Template `{}` extends `{}`", self.name, parent.name());
        self.parent = Some(parent);
        Ok(())
    }

    pub fn has_parent(&self) -> bool {
        self.parent.is_some()
    }

    pub fn template_name(&self) -> &str {
        &self.name
    }

    pub fn library(&self) -> &Library {
        &self.library
    }

    /// Range of the directive currently being handled.
    pub fn range(&self) -> Range {
        self.range
    }

    pub fn compile_expression(&self, source: &str) -> Result<Expression, ParseError> {
        expr::compile_expression(source).map_err(|cause| self.malformed(source, cause))
    }

    pub fn parse_args(&self, source: &str) -> Result<Arguments, ParseError> {
        expr::parse_arguments(source).map_err(|cause| self.malformed(source, cause))
    }

    pub fn invalid_arguments(&self, tag: &str, message: impl Into<String>) -> ParseError {
        ParseError::InvalidArguments {
            tag: tag.into(),
            message: message.into(),
            range: self.range,
        }
    }

    fn malformed(&self, source: &str, cause: expr::error::ExprError) -> ParseError {
        let range = match (cause.range(), self.origin_of(source)) {
            (Some(range), Some(origin)) => {
                Range::new(range.start.offset_by(&origin), range.end.offset_by(&origin))
            }
            _ => self.range,
        };

        ParseError::MalformedExpression {
            expression: source.to_string(),
            cause,
            range,
        }
    }

    /// Template position where `source` starts inside the current directive.
    fn origin_of(&self, source: &str) -> Option<Position> {
        let start = self.directive.as_ptr() as usize;
        let offset = (source.as_ptr() as usize)
            .checked_sub(start)
            .filter(|offset| offset + source.len() <= self.directive.len())
            .or_else(|| self.directive.find(source))?;

        let prefix = self.directive.get(..offset)?;
        let relative = match prefix.rfind('\n') {
            Some(i) => Position::new(
                1 + prefix.matches('\n').count() as u32,
                prefix[i + 1..].chars().count() + 1,
            ),
            None => Position::new(1, prefix.chars().count() + 1),
        };

        Some(relative.offset_by(&self.range.start))
    }

    fn parse_statements(
        &mut self,
        end_tags: &[&str],
    ) -> Result<(Vec<Statement>, Option<SmolStr>), ParseError> {
        self.buffers.push(Vec::new());
        let result = self.parse_scope(end_tags);
        let statements = self.buffers.pop().unwrap_or_default();

        result.map(|end_tag| (statements, end_tag))
    }

    fn parse_scope(&mut self, end_tags: &[&str]) -> Result<Option<SmolStr>, ParseError> {
        while let Some(token) = self.lexer.next() {
            self.range = token.range;
            self.directive = token.raw;

            match token.kind {
                TokenKind::Text => self.emit(Statement::Text(token.content.to_string())),
                TokenKind::Var => {
                    let expr = self.compile_expression(token.content)?;
                    self.emit(Statement::Expr(expr));
                }
                TokenKind::Comment => {}
                TokenKind::Load => self.load(token.content)?,
                TokenKind::Block => {
                    let (name, args) = split_tag(token.content);

                    if end_tags.contains(&name) {
                        return Ok(Some(name.into()));
                    }

                    let tag = self.library.tag(name).ok_or_else(|| ParseError::UnknownTag {
                        name: name.into(),
                        range: token.range,
                    })?;

                    if let Some(statement) = tag.parse(self, args)? {
                        self.emit(statement);
                    }
                }
            }
        }

        if end_tags.is_empty() {
            Ok(None)
        } else {
            Err(ParseError::UnterminatedBlock {
                expected: end_tags.iter().map(SmolStr::new).collect(),
                found: SmolStr::new_static(END_OF_INPUT),
                range: Range::new(self.range.end, self.range.end),
            })
        }
    }

    fn load(&mut self, path: &str) -> Result<(), ParseError> {
        let library = self.resolver.resolve(path).map_err(|cause| ParseError::Load {
            cause,
            range: self.range,
        })?;

        log::debug!("Loaded library `{}` into `{}`", path, self.name);
        self.library.merge(&library);
        Ok(())
    }
}

/// Splits `name rest of args` at the first whitespace.
fn split_tag(content: &str) -> (&str, &str) {
    match content.split_once(char::is_whitespace) {
        Some((name, args)) => (name, args.trim()),
        None => (content, ""),
    }
}
