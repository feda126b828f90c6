use smol_str::SmolStr;

use crate::{number::Number, range::Range};

#[derive(PartialEq, Debug, Clone)]
pub struct Node {
    pub range: Range,
    pub expr: Expr,
}

impl Node {
    pub fn new(expr: Expr, range: Range) -> Self {
        Self { range, expr }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub enum Literal {
    None,
    Bool(bool),
    Number(Number),
    String(String),
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum UnaryOp {
    Neg,
    Pos,
    Not,
}

#[derive(PartialEq, Debug, Clone, Copy)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    FloorDiv,
    Mod,
    Pow,
    Eq,
    Ne,
    Lt,
    Lte,
    Gt,
    Gte,
    In,
    NotIn,
}

impl BinaryOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::FloorDiv => "//",
            BinaryOp::Mod => "%",
            BinaryOp::Pow => "**",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::Lt => "<",
            BinaryOp::Lte => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Gte => ">=",
            BinaryOp::In => "in",
            BinaryOp::NotIn => "not in",
        }
    }
}

/// One `for targets in iter if cond ...` clause of a list comprehension.
#[derive(PartialEq, Debug, Clone)]
pub struct Comprehension {
    pub targets: Vec<SmolStr>,
    pub iter: Box<Node>,
    pub conditions: Vec<Node>,
}

#[derive(PartialEq, Debug, Clone)]
pub enum Expr {
    Literal(Literal),
    Ident(SmolStr),
    List(Vec<Node>),
    Dict(Vec<(Node, Node)>),
    Attribute(Box<Node>, SmolStr),
    Index(Box<Node>, Box<Node>),
    Call(Box<Node>, Vec<Node>),
    Unary(UnaryOp, Box<Node>),
    Binary(BinaryOp, Box<Node>, Box<Node>),
    And(Box<Node>, Box<Node>),
    Or(Box<Node>, Box<Node>),
    Conditional {
        then: Box<Node>,
        cond: Box<Node>,
        otherwise: Box<Node>,
    },
    Lambda(Vec<SmolStr>, Box<Node>),
    ListComp(Box<Node>, Vec<Comprehension>),
}
