use std::iter::Peekable;

use smol_str::SmolStr;

use super::error::ExprError;
use super::node::{BinaryOp, Comprehension, Expr, Literal, Node, UnaryOp};
use super::token::{Token, TokenKind};
use crate::range::{Position, Range};

/// Deepest syntax tree a single expression may build.
pub const MAX_NESTING_DEPTH: usize = 128;

const COMPARISON_PRECEDENCE: u8 = 1;

/// An argument of a tag argument list: `value` or `name=value`.
#[derive(PartialEq, Debug, Clone)]
pub struct Argument {
    pub keyword: Option<SmolStr>,
    pub node: Node,
    /// Byte offsets of the value expression within the argument source.
    pub span: std::ops::Range<usize>,
}

pub struct Parser {
    tokens: Peekable<std::vec::IntoIter<Token>>,
    last_end: Position,
    last_offset: usize,
    depth: usize,
}

impl Parser {
    pub fn new(tokens: Vec<Token>) -> Self {
        Self {
            tokens: tokens.into_iter().peekable(),
            last_end: Position::default(),
            last_offset: 0,
            depth: 0,
        }
    }

    /// Parses a single expression spanning the whole token stream.
    pub fn parse(&mut self) -> Result<Node, ExprError> {
        if self.peek_is(&TokenKind::Eof) {
            return Err(ExprError::Empty);
        }

        let node = self.parse_expr()?;
        self.expect_eof()?;
        Ok(node)
    }

    /// Parses a comma separated list of positional and `name=value` arguments.
    pub fn parse_arguments(&mut self) -> Result<Vec<Argument>, ExprError> {
        let mut args = Vec::new();

        while !self.peek_is(&TokenKind::Eof) {
            let start = self.peek_offset();
            let node = self.parse_expr()?;

            let arg = match node.expr {
                Expr::Ident(name) if self.consume(&TokenKind::Equal) => {
                    let value_start = self.peek_offset();
                    let value = self.parse_expr()?;
                    Argument {
                        keyword: Some(name),
                        node: value,
                        span: value_start..self.last_offset,
                    }
                }
                expr => Argument {
                    keyword: None,
                    node: Node::new(expr, node.range),
                    span: start..self.last_offset,
                },
            };
            args.push(arg);

            if !self.consume(&TokenKind::Comma) {
                break;
            }
        }

        self.expect_eof()?;
        Ok(args)
    }

    fn parse_expr(&mut self) -> Result<Node, ExprError> {
        self.nested(Self::parse_conditional)
    }

    fn nested(&mut self, parse: fn(&mut Self) -> Result<Node, ExprError>) -> Result<Node, ExprError> {
        let depth = self.depth;
        self.enter()?;
        let result = parse(self);
        self.depth = depth;
        result
    }

    /// Accounts for one more level of the tree being built.
    fn enter(&mut self) -> Result<(), ExprError> {
        if self.depth >= MAX_NESTING_DEPTH {
            return Err(ExprError::TooDeeplyNested(MAX_NESTING_DEPTH, self.peek_start()));
        }

        self.depth += 1;
        Ok(())
    }

    fn parse_conditional(&mut self) -> Result<Node, ExprError> {
        let start = self.peek_start();

        if self.consume(&TokenKind::Lambda) {
            return self.parse_lambda(start);
        }

        let then = self.parse_or()?;

        if self.consume(&TokenKind::If) {
            let cond = self.parse_or()?;
            self.expect(TokenKind::Else)?;
            let otherwise = self.parse_expr()?;

            return Ok(Node::new(
                Expr::Conditional {
                    then: Box::new(then),
                    cond: Box::new(cond),
                    otherwise: Box::new(otherwise),
                },
                self.range_from(start),
            ));
        }

        Ok(then)
    }

    fn parse_lambda(&mut self, start: Position) -> Result<Node, ExprError> {
        let mut params: Vec<SmolStr> = Vec::new();

        if !self.peek_is(&TokenKind::Colon) {
            loop {
                let param = self.expect_ident()?;
                if params.contains(&param) {
                    return Err(ExprError::DuplicateParameter(param));
                }
                params.push(param);

                if !self.consume(&TokenKind::Comma) {
                    break;
                }
            }
        }

        self.expect(TokenKind::Colon)?;
        let body = self.parse_expr()?;

        Ok(Node::new(
            Expr::Lambda(params, Box::new(body)),
            self.range_from(start),
        ))
    }

    fn parse_or(&mut self) -> Result<Node, ExprError> {
        let depth = self.depth;
        let mut lhs = self.parse_and()?;

        while self.consume(&TokenKind::Or) {
            self.enter()?;
            let rhs = self.parse_and()?;
            let range = Range::new(lhs.range.start, rhs.range.end);
            lhs = Node::new(Expr::Or(Box::new(lhs), Box::new(rhs)), range);
        }

        self.depth = depth;
        Ok(lhs)
    }

    fn parse_and(&mut self) -> Result<Node, ExprError> {
        let depth = self.depth;
        let mut lhs = self.parse_not()?;

        while self.consume(&TokenKind::And) {
            self.enter()?;
            let rhs = self.parse_not()?;
            let range = Range::new(lhs.range.start, rhs.range.end);
            lhs = Node::new(Expr::And(Box::new(lhs), Box::new(rhs)), range);
        }

        self.depth = depth;
        Ok(lhs)
    }

    fn parse_not(&mut self) -> Result<Node, ExprError> {
        let start = self.peek_start();

        if self.consume(&TokenKind::Not) {
            let operand = self.nested(Self::parse_not)?;
            return Ok(Node::new(
                Expr::Unary(UnaryOp::Not, Box::new(operand)),
                self.range_from(start),
            ));
        }

        self.parse_comparison()
    }

    /// `a < b < c` folds into `a < b and b < c`.
    fn parse_comparison(&mut self) -> Result<Node, ExprError> {
        let depth = self.depth;
        let mut lhs = self.parse_arithmetic()?;
        let mut chain: Option<Node> = None;

        while self.peek_precedence() == COMPARISON_PRECEDENCE {
            self.enter()?;
            let operator = self.next_token()?;
            let op = self.binary_op(operator)?;
            let rhs = self.parse_arithmetic()?;

            let range = Range::new(lhs.range.start, rhs.range.end);
            let comparison = Node::new(Expr::Binary(op, Box::new(lhs), Box::new(rhs.clone())), range);

            chain = Some(match chain {
                Some(prev) => {
                    let range = Range::new(prev.range.start, comparison.range.end);
                    Node::new(Expr::And(Box::new(prev), Box::new(comparison)), range)
                }
                None => comparison,
            });
            lhs = rhs;
        }

        self.depth = depth;
        Ok(chain.unwrap_or(lhs))
    }

    fn parse_arithmetic(&mut self) -> Result<Node, ExprError> {
        let lhs = self.parse_unary()?;
        self.parse_binary_op(COMPARISON_PRECEDENCE + 1, lhs)
    }

    #[inline(always)]
    fn binary_op_precedence(kind: &TokenKind) -> u8 {
        match kind {
            TokenKind::EqEq
            | TokenKind::NeEq
            | TokenKind::Lt
            | TokenKind::Lte
            | TokenKind::Gt
            | TokenKind::Gte
            | TokenKind::In
            | TokenKind::Not => COMPARISON_PRECEDENCE,
            TokenKind::Plus | TokenKind::Minus => 2,
            TokenKind::Star | TokenKind::Slash | TokenKind::DoubleSlash | TokenKind::Percent => 3,
            _ => 0,
        }
    }

    fn binary_op(&mut self, token: Token) -> Result<BinaryOp, ExprError> {
        Ok(match token.kind {
            TokenKind::EqEq => BinaryOp::Eq,
            TokenKind::NeEq => BinaryOp::Ne,
            TokenKind::Lt => BinaryOp::Lt,
            TokenKind::Lte => BinaryOp::Lte,
            TokenKind::Gt => BinaryOp::Gt,
            TokenKind::Gte => BinaryOp::Gte,
            TokenKind::In => BinaryOp::In,
            // After an operand `not` can only start `not in`.
            TokenKind::Not => {
                self.expect(TokenKind::In)?;
                BinaryOp::NotIn
            }
            TokenKind::Plus => BinaryOp::Add,
            TokenKind::Minus => BinaryOp::Sub,
            TokenKind::Star => BinaryOp::Mul,
            TokenKind::Slash => BinaryOp::Div,
            TokenKind::DoubleSlash => BinaryOp::FloorDiv,
            TokenKind::Percent => BinaryOp::Mod,
            _ => return Err(ExprError::UnexpectedToken(token)),
        })
    }

    fn parse_binary_op(&mut self, min_prec: u8, mut lhs: Node) -> Result<Node, ExprError> {
        let depth = self.depth;

        loop {
            let prec = self.peek_precedence();
            if prec == 0 || prec < min_prec {
                break;
            }

            self.enter()?;
            let operator = self.next_token()?;
            let op = self.binary_op(operator)?;
            let mut rhs = self.parse_unary()?;

            loop {
                let next_prec = self.peek_precedence();
                if next_prec > prec {
                    rhs = self.parse_binary_op(next_prec, rhs)?;
                } else {
                    break;
                }
            }

            let range = Range::new(lhs.range.start, rhs.range.end);
            lhs = Node::new(Expr::Binary(op, Box::new(lhs), Box::new(rhs)), range);
        }

        self.depth = depth;
        Ok(lhs)
    }

    fn parse_unary(&mut self) -> Result<Node, ExprError> {
        let start = self.peek_start();

        let op = if self.consume(&TokenKind::Minus) {
            UnaryOp::Neg
        } else if self.consume(&TokenKind::Plus) {
            UnaryOp::Pos
        } else {
            return self.parse_power();
        };

        let operand = self.nested(Self::parse_unary)?;
        Ok(Node::new(
            Expr::Unary(op, Box::new(operand)),
            self.range_from(start),
        ))
    }

    fn parse_power(&mut self) -> Result<Node, ExprError> {
        let base = self.parse_postfix()?;

        if self.consume(&TokenKind::DoubleStar) {
            // Right associative: the exponent may itself be a power.
            let exponent = self.nested(Self::parse_unary)?;
            let range = Range::new(base.range.start, exponent.range.end);
            return Ok(Node::new(
                Expr::Binary(BinaryOp::Pow, Box::new(base), Box::new(exponent)),
                range,
            ));
        }

        Ok(base)
    }

    fn parse_postfix(&mut self) -> Result<Node, ExprError> {
        let start = self.peek_start();
        let depth = self.depth;
        let mut node = self.parse_primary()?;

        loop {
            if self.consume(&TokenKind::Dot) {
                self.enter()?;
                let name = self.expect_ident()?;
                node = Node::new(Expr::Attribute(Box::new(node), name), self.range_from(start));
            } else if self.consume(&TokenKind::LBracket) {
                self.enter()?;
                let index = self.parse_expr()?;
                self.expect(TokenKind::RBracket)?;
                node = Node::new(
                    Expr::Index(Box::new(node), Box::new(index)),
                    self.range_from(start),
                );
            } else if self.consume(&TokenKind::LParen) {
                self.enter()?;
                let args = self.parse_sequence(TokenKind::RParen)?;
                node = Node::new(Expr::Call(Box::new(node), args), self.range_from(start));
            } else {
                break;
            }
        }

        self.depth = depth;
        Ok(node)
    }

    fn parse_primary(&mut self) -> Result<Node, ExprError> {
        let token = self.next_token()?;
        let start = token.range.start;

        let expr = match token.kind {
            TokenKind::NumberLiteral(n) => Expr::Literal(Literal::Number(n)),
            TokenKind::StringLiteral(s) => Expr::Literal(Literal::String(s)),
            TokenKind::True => Expr::Literal(Literal::Bool(true)),
            TokenKind::False => Expr::Literal(Literal::Bool(false)),
            TokenKind::None => Expr::Literal(Literal::None),
            TokenKind::Ident(name) => Expr::Ident(name),
            TokenKind::LParen => {
                let inner = self.parse_expr()?;
                self.expect(TokenKind::RParen)?;
                inner.expr
            }
            TokenKind::LBracket => return self.parse_list(start),
            TokenKind::LBrace => return self.parse_dict(start),
            TokenKind::Eof => return Err(ExprError::UnexpectedEof),
            _ => return Err(ExprError::UnexpectedToken(token)),
        };

        Ok(Node::new(expr, self.range_from(start)))
    }

    fn parse_list(&mut self, start: Position) -> Result<Node, ExprError> {
        if self.consume(&TokenKind::RBracket) {
            return Ok(Node::new(Expr::List(Vec::new()), self.range_from(start)));
        }

        let first = self.parse_expr()?;

        if self.peek_is(&TokenKind::For) {
            let clauses = self.parse_comprehension()?;
            self.expect(TokenKind::RBracket)?;
            return Ok(Node::new(
                Expr::ListComp(Box::new(first), clauses),
                self.range_from(start),
            ));
        }

        let mut items = vec![first];
        if self.consume(&TokenKind::Comma) {
            items.extend(self.parse_sequence(TokenKind::RBracket)?);
        } else {
            self.expect(TokenKind::RBracket)?;
        }

        Ok(Node::new(Expr::List(items), self.range_from(start)))
    }

    fn parse_comprehension(&mut self) -> Result<Vec<Comprehension>, ExprError> {
        let mut clauses = Vec::new();

        while self.consume(&TokenKind::For) {
            let mut targets = vec![self.expect_ident()?];
            while self.consume(&TokenKind::Comma) {
                targets.push(self.expect_ident()?);
            }

            self.expect(TokenKind::In)?;
            let iter = self.parse_or()?;

            let mut conditions = Vec::new();
            while self.consume(&TokenKind::If) {
                conditions.push(self.parse_or()?);
            }

            clauses.push(Comprehension {
                targets,
                iter: Box::new(iter),
                conditions,
            });
        }

        Ok(clauses)
    }

    fn parse_dict(&mut self, start: Position) -> Result<Node, ExprError> {
        let mut pairs = Vec::new();

        loop {
            if self.consume(&TokenKind::RBrace) {
                break;
            }

            let key = self.parse_expr()?;
            self.expect(TokenKind::Colon)?;
            let value = self.parse_expr()?;
            pairs.push((key, value));

            if !self.consume(&TokenKind::Comma) {
                self.expect(TokenKind::RBrace)?;
                break;
            }
        }

        Ok(Node::new(Expr::Dict(pairs), self.range_from(start)))
    }

    /// Parses `a, b, c` up to and including `close`; a trailing comma is allowed.
    fn parse_sequence(&mut self, close: TokenKind) -> Result<Vec<Node>, ExprError> {
        let mut items = Vec::new();

        loop {
            if self.consume(&close) {
                break;
            }

            items.push(self.parse_expr()?);

            if !self.consume(&TokenKind::Comma) {
                self.expect(close)?;
                break;
            }
        }

        Ok(items)
    }

    fn next_token(&mut self) -> Result<Token, ExprError> {
        let token = self.tokens.next().ok_or(ExprError::UnexpectedEof)?;
        self.last_end = token.range.end;
        self.last_offset = token.span.end;
        Ok(token)
    }

    fn expect(&mut self, kind: TokenKind) -> Result<Token, ExprError> {
        let token = self.next_token()?;

        if token.kind == kind {
            Ok(token)
        } else if token.is_eof() {
            Err(ExprError::UnexpectedEof)
        } else {
            Err(ExprError::UnexpectedToken(token))
        }
    }

    fn expect_ident(&mut self) -> Result<SmolStr, ExprError> {
        let token = self.next_token()?;

        match token.kind {
            TokenKind::Ident(name) => Ok(name),
            TokenKind::Eof => Err(ExprError::UnexpectedEof),
            _ => Err(ExprError::UnexpectedToken(token)),
        }
    }

    fn expect_eof(&mut self) -> Result<(), ExprError> {
        let token = self.next_token()?;

        if token.is_eof() {
            Ok(())
        } else {
            Err(ExprError::UnexpectedToken(token))
        }
    }

    fn consume(&mut self, kind: &TokenKind) -> bool {
        self.peek_is(kind) && self.next_token().is_ok()
    }

    #[inline(always)]
    fn peek_is(&mut self, kind: &TokenKind) -> bool {
        self.tokens.peek().is_some_and(|token| &token.kind == kind)
    }

    #[inline(always)]
    fn peek_precedence(&mut self) -> u8 {
        self.tokens
            .peek()
            .map(|token| Self::binary_op_precedence(&token.kind))
            .unwrap_or(0)
    }

    fn peek_start(&mut self) -> Position {
        self.tokens
            .peek()
            .map(|token| token.range.start)
            .unwrap_or(self.last_end)
    }

    fn peek_offset(&mut self) -> usize {
        self.tokens
            .peek()
            .map(|token| token.span.start)
            .unwrap_or(self.last_offset)
    }

    fn range_from(&self, start: Position) -> Range {
        Range::new(start, self.last_end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::lexer::tokenize;
    use itertools::Itertools;
    use rstest::rstest;

    /// Prints a node as an s-expression so precedence is easy to assert.
    fn sexp(node: &Node) -> String {
        match &node.expr {
            Expr::Literal(Literal::None) => "None".to_string(),
            Expr::Literal(Literal::Bool(b)) => b.to_string(),
            Expr::Literal(Literal::Number(n)) => n.to_string(),
            Expr::Literal(Literal::String(s)) => format!("{:?}", s),
            Expr::Ident(name) => name.to_string(),
            Expr::List(items) => format!("[{}]", items.iter().map(sexp).join(" ")),
            Expr::Dict(pairs) => format!(
                "{{{}}}",
                pairs.iter().map(|(k, v)| format!("{}:{}", sexp(k), sexp(v))).join(" ")
            ),
            Expr::Attribute(value, name) => format!("(. {} {})", sexp(value), name),
            Expr::Index(value, index) => format!("([] {} {})", sexp(value), sexp(index)),
            Expr::Call(callee, args) => {
                format!("(call {}{})", sexp(callee), args.iter().map(|a| format!(" {}", sexp(a))).join(""))
            }
            Expr::Unary(op, operand) => format!("({:?} {})", op, sexp(operand)),
            Expr::Binary(op, lhs, rhs) => format!("({} {} {})", op.symbol(), sexp(lhs), sexp(rhs)),
            Expr::And(lhs, rhs) => format!("(and {} {})", sexp(lhs), sexp(rhs)),
            Expr::Or(lhs, rhs) => format!("(or {} {})", sexp(lhs), sexp(rhs)),
            Expr::Conditional { then, cond, otherwise } => {
                format!("(if {} {} {})", sexp(cond), sexp(then), sexp(otherwise))
            }
            Expr::Lambda(params, body) => format!("(lambda ({}) {})", params.join(" "), sexp(body)),
            Expr::ListComp(elt, clauses) => format!(
                "(comp {}{})",
                sexp(elt),
                clauses
                    .iter()
                    .map(|c| format!(
                        " (for ({}) {}{})",
                        c.targets.join(" "),
                        sexp(&c.iter),
                        c.conditions.iter().map(|n| format!(" (if {})", sexp(n))).join("")
                    ))
                    .join("")
            ),
        }
    }

    fn parse(source: &str) -> Result<String, ExprError> {
        let tokens = tokenize(source)?;
        Parser::new(tokens).parse().map(|node| sexp(&node))
    }

    #[rstest]
    #[case::ident("name", "name")]
    #[case::precedence("1 + 2 * 3", "(+ 1 (* 2 3))")]
    #[case::left_assoc("1 - 2 - 3", "(- (- 1 2) 3)")]
    #[case::parens("(1 + 2) * 3", "(* (+ 1 2) 3)")]
    #[case::power_right_assoc("2 ** 3 ** 2", "(** 2 (** 3 2))")]
    #[case::power_binds_tighter_than_neg("-2 ** 2", "(Neg (** 2 2))")]
    #[case::comparison("a + 1 < b * 2", "(< (+ a 1) (* b 2))")]
    #[case::not_in("a not in b", "(not in a b)")]
    #[case::chained_comparison("a < b <= c", "(and (< a b) (<= b c))")]
    #[case::chained_comparison_three("a == b != c > d", "(and (and (== a b) (!= b c)) (> c d))")]
    #[case::chained_membership("a in b not in c", "(and (in a b) (not in b c))")]
    #[case::boolean("not a or b and c", "(or (Not a) (and b c))")]
    #[case::conditional("a if b else c", "(if b a c)")]
    #[case::nested_conditional("a if b else c if d else e", "(if b a (if d c e))")]
    #[case::postfix("user.tags[0].name", "(. ([] (. user tags) 0) name)")]
    #[case::call("helpers.upper(name, 'x')", r#"(call (. helpers upper) name "x")"#)]
    #[case::call_trailing_comma("f(a,)", "(call f a)")]
    #[case::negative_index("items[-1]", "([] items (Neg 1))")]
    #[case::list("[1, 'a', None]", r#"[1 "a" None]"#)]
    #[case::empty_list("[]", "[]")]
    #[case::dict("{'a': 1, 'b': [2]}", r#"{"a":1 "b":[2]}"#)]
    #[case::lambda("lambda x, y: x + y", "(lambda (x y) (+ x y))")]
    #[case::lambda_no_params("lambda: 1", "(lambda () 1)")]
    #[case::comprehension("[x * 2 for x in xs if x > 1]", "(comp (* x 2) (for (x) xs (if (> x 1))))")]
    #[case::tuple_target("[k for k, v in pairs]", "(comp k (for (k v) pairs))")]
    #[case::nested_comprehension("[x for xs in xss for x in xs]", "(comp x (for (xs) xss) (for (x) xs))")]
    fn test_parse(#[case] source: &str, #[case] expected: &str) {
        assert_eq!(parse(source), Ok(expected.to_string()));
    }

    #[rstest]
    #[case::empty("", ExprError::Empty)]
    #[case::dangling_operator("1 +", ExprError::UnexpectedEof)]
    #[case::unclosed_paren("(1", ExprError::UnexpectedEof)]
    #[case::missing_else("a if b", ExprError::UnexpectedEof)]
    #[case::duplicate_param("lambda x, x: x", ExprError::DuplicateParameter("x".into()))]
    #[case::nested_parens(
        &format!("{}1{}", "(".repeat(2000), ")".repeat(2000)),
        ExprError::TooDeeplyNested(MAX_NESTING_DEPTH, Position::new(1, MAX_NESTING_DEPTH + 1))
    )]
    #[case::nested_negation(
        &format!("{}1", "-".repeat(2000)),
        ExprError::TooDeeplyNested(MAX_NESTING_DEPTH, Position::new(1, MAX_NESTING_DEPTH + 1))
    )]
    fn test_parse_error(#[case] source: &str, #[case] expected: ExprError) {
        assert_eq!(parse(source), Err(expected));
    }

    #[rstest]
    #[case::parens(&format!("{}1{}", "(".repeat(100), ")".repeat(100)))]
    #[case::long_sum(&vec!["1"; 100].join(" + "))]
    #[case::long_chain(&format!("a{}", ".b".repeat(100)))]
    fn test_parse_within_nesting_limit(#[case] source: &str) {
        assert!(parse(source).is_ok());
    }

    #[rstest]
    #[case::long_sum(&vec!["1"; 1000].join(" + "))]
    #[case::long_chain(&format!("a{}", "[0]".repeat(1000)))]
    #[case::long_or(&vec!["a"; 1000].join(" or "))]
    #[case::nested_lists(&format!("{}{}", "[".repeat(1000), "]".repeat(1000)))]
    fn test_parse_beyond_nesting_limit(#[case] source: &str) {
        assert!(matches!(parse(source), Err(ExprError::TooDeeplyNested(MAX_NESTING_DEPTH, _))));
    }

    #[test]
    fn test_parse_error_trailing_token() {
        let err = parse("a b").unwrap_err();
        assert!(matches!(err, ExprError::UnexpectedToken(Token { kind: TokenKind::Ident(_), .. })));
    }

    #[test]
    fn test_parse_arguments() {
        let source = "item, items[0], sep=', '";
        let args = Parser::new(tokenize(source).unwrap()).parse_arguments().unwrap();

        assert_eq!(args.len(), 3);
        assert_eq!(args[0].keyword, None);
        assert_eq!(&source[args[1].span.clone()], "items[0]");
        assert_eq!(args[2].keyword, Some("sep".into()));
        assert_eq!(&source[args[2].span.clone()], "', '");
    }

    #[rstest]
    #[case::empty("", 0)]
    #[case::trailing_comma("a, b,", 2)]
    fn test_parse_arguments_count(#[case] source: &str, #[case] expected: usize) {
        let args = Parser::new(tokenize(source).unwrap()).parse_arguments().unwrap();
        assert_eq!(args.len(), expected);
    }
}
