//! Transforms expression nodes into compiled closures.

use std::sync::Arc;

use smol_str::SmolStr;

use super::compiled::{CompiledClause, CompiledExpr};
use crate::eval::{Env, EvalError, ops};
use crate::expr::node::{BinaryOp, Comprehension, Expr, Literal, Node, UnaryOp};
use crate::value::Value;

type Namespace = fn(&Env<'_>) -> Value;

/// Identifiers that are never rewritten into context lookups.
const RESERVED_NAMESPACES: &[(&str, Namespace)] = &[("helpers", helpers_namespace)];

fn helpers_namespace(env: &Env<'_>) -> Value {
    env.helpers.as_value()
}

/// Compiles one expression tree.
///
/// The compiler tracks the names bound inside the expression (lambda
/// parameters and comprehension targets) as a stack of slots. A bound name
/// compiles to a slot read, a reserved namespace to its table, and every
/// other identifier to a context lookup that is recorded as a free name.
#[derive(Debug, Default)]
pub struct Compiler {
    scope: Vec<SmolStr>,
    free_names: Vec<SmolStr>,
}

impl Compiler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compiles `node`, returning the closure and the context names it reads.
    pub fn compile(mut self, node: &Node) -> (CompiledExpr, Vec<SmolStr>) {
        let compiled = self.compile_node(node);
        (compiled, self.free_names)
    }

    fn compile_node(&mut self, node: &Node) -> CompiledExpr {
        match &node.expr {
            Expr::Literal(literal) => {
                let value = literal_value(literal);
                Arc::new(move |_| Ok(value.clone()))
            }
            Expr::Ident(name) => self.compile_ident(name),
            Expr::List(items) => {
                let items = self.compile_all(items);
                Arc::new(move |env| {
                    items
                        .iter()
                        .map(|item| item(env))
                        .collect::<Result<Vec<_>, _>>()
                        .map(Value::from)
                })
            }
            Expr::Dict(pairs) => {
                let pairs = pairs
                    .iter()
                    .map(|(key, value)| (self.compile_node(key), self.compile_node(value)))
                    .collect::<Vec<_>>();
                Arc::new(move |env| {
                    pairs
                        .iter()
                        .map(|(key, value)| Ok((key(env)?.to_string(), value(env)?)))
                        .collect::<Result<Vec<_>, EvalError>>()
                        .map(Value::dict)
                })
            }
            Expr::Attribute(value, name) => {
                let value = self.compile_node(value);
                let name = name.clone();
                Arc::new(move |env| ops::attribute(&value(env)?, &name))
            }
            Expr::Index(value, index) => {
                let value = self.compile_node(value);
                let index = self.compile_node(index);
                Arc::new(move |env| ops::index(&value(env)?, &index(env)?))
            }
            Expr::Call(callee, args) => {
                let callee = self.compile_node(callee);
                let args = self.compile_all(args);
                Arc::new(move |env| {
                    let function = callee(env)?;
                    let args = args.iter().map(|arg| arg(env)).collect::<Result<Vec<_>, _>>()?;
                    ops::call(&function, &args)
                })
            }
            Expr::Unary(op, operand) => {
                let operand = self.compile_node(operand);
                match op {
                    UnaryOp::Neg => Arc::new(move |env| ops::neg(&operand(env)?)),
                    UnaryOp::Pos => Arc::new(move |env| ops::pos(&operand(env)?)),
                    UnaryOp::Not => Arc::new(move |env| Ok(Value::Bool(!operand(env)?.is_truthy()))),
                }
            }
            Expr::Binary(op, lhs, rhs) => {
                let op = *op;
                let lhs = self.compile_node(lhs);
                let rhs = self.compile_node(rhs);
                Arc::new(move |env| binary(op, &lhs(env)?, &rhs(env)?))
            }
            // `and` and `or` short-circuit and return the deciding operand.
            Expr::And(lhs, rhs) => {
                let lhs = self.compile_node(lhs);
                let rhs = self.compile_node(rhs);
                Arc::new(move |env| {
                    let value = lhs(env)?;
                    if value.is_truthy() { rhs(env) } else { Ok(value) }
                })
            }
            Expr::Or(lhs, rhs) => {
                let lhs = self.compile_node(lhs);
                let rhs = self.compile_node(rhs);
                Arc::new(move |env| {
                    let value = lhs(env)?;
                    if value.is_truthy() { Ok(value) } else { rhs(env) }
                })
            }
            Expr::Conditional { then, cond, otherwise } => {
                let then = self.compile_node(then);
                let cond = self.compile_node(cond);
                let otherwise = self.compile_node(otherwise);
                Arc::new(move |env| {
                    if cond(env)?.is_truthy() {
                        then(env)
                    } else {
                        otherwise(env)
                    }
                })
            }
            Expr::Lambda(params, body) => self.compile_lambda(params, body),
            Expr::ListComp(elt, clauses) => self.compile_comprehension(elt, clauses),
        }
    }

    fn compile_all(&mut self, nodes: &[Node]) -> Vec<CompiledExpr> {
        nodes.iter().map(|node| self.compile_node(node)).collect()
    }

    fn compile_ident(&mut self, name: &SmolStr) -> CompiledExpr {
        let name = name.clone();

        // Innermost binding wins.
        if let Some(slot) = self.scope.iter().rposition(|bound| *bound == name) {
            return Arc::new(move |env| env.local(slot, &name));
        }

        if let Some((_, namespace)) = RESERVED_NAMESPACES.iter().find(|(reserved, _)| name.as_str() == *reserved) {
            let namespace = *namespace;
            return Arc::new(move |env| Ok(namespace(env)));
        }

        if !self.free_names.contains(&name) {
            self.free_names.push(name.clone());
        }

        Arc::new(move |env| env.resolve(&name))
    }

    fn compile_lambda(&mut self, params: &[SmolStr], body: &Node) -> CompiledExpr {
        let arity = params.len();
        let depth = self.scope.len();

        self.scope.extend(params.iter().cloned());
        let body = self.compile_node(body);
        self.scope.truncate(depth);

        Arc::new(move |env| {
            let captured = env.locals.to_vec();
            let context = env.context.clone();
            let helpers = env.helpers.clone();
            let body = Arc::clone(&body);

            Ok(Value::function("lambda", move |args: &[Value]| {
                if args.len() != arity {
                    return Err(EvalError::InvalidNumberOfArguments(
                        "lambda".into(),
                        arity,
                        args.len(),
                    ));
                }

                let locals = captured.iter().chain(args).cloned().collect::<Vec<_>>();
                body(&Env {
                    context: &context,
                    helpers: &helpers,
                    locals: &locals,
                })
            }))
        })
    }

    fn compile_comprehension(&mut self, elt: &Node, clauses: &[Comprehension]) -> CompiledExpr {
        let depth = self.scope.len();

        // Each clause sees the targets of the clauses before it.
        let clauses = clauses
            .iter()
            .map(|clause| {
                let iter = self.compile_node(&clause.iter);
                self.scope.extend(clause.targets.iter().cloned());
                let conditions = self.compile_all(&clause.conditions);

                CompiledClause {
                    arity: clause.targets.len(),
                    iter,
                    conditions,
                }
            })
            .collect::<Vec<_>>();
        let elt = self.compile_node(elt);
        self.scope.truncate(depth);

        let clauses: Arc<[CompiledClause]> = clauses.into();
        Arc::new(move |env| {
            let mut locals = env.locals.to_vec();
            let mut items = Vec::new();
            comprehend(&clauses, &elt, env, &mut locals, &mut items)?;
            Ok(items.into())
        })
    }
}

fn comprehend(
    clauses: &[CompiledClause],
    elt: &CompiledExpr,
    env: &Env<'_>,
    locals: &mut Vec<Value>,
    out: &mut Vec<Value>,
) -> Result<(), EvalError> {
    let Some((clause, rest)) = clauses.split_first() else {
        out.push(elt(&env.with_locals(locals))?);
        return Ok(());
    };

    let items = (clause.iter)(&env.with_locals(locals))?.iter_items()?;
    let depth = locals.len();

    for item in items {
        bind_targets(clause.arity, item, locals)?;

        let mut matched = true;
        for condition in &clause.conditions {
            if !condition(&env.with_locals(locals))?.is_truthy() {
                matched = false;
                break;
            }
        }

        if matched {
            comprehend(rest, elt, env, locals, out)?;
        }

        locals.truncate(depth);
    }

    Ok(())
}

fn bind_targets(arity: usize, item: Value, locals: &mut Vec<Value>) -> Result<(), EvalError> {
    if arity == 1 {
        locals.push(item);
        return Ok(());
    }

    match item {
        Value::Array(values) if values.len() == arity => {
            locals.extend(values.iter().cloned());
            Ok(())
        }
        Value::Array(values) => Err(EvalError::Runtime(format!(
            "expected {} values to unpack, got {}",
            arity,
            values.len()
        ))),
        a => Err(EvalError::invalid_types("unpack", &[&a])),
    }
}

fn literal_value(literal: &Literal) -> Value {
    match literal {
        Literal::None => Value::None,
        Literal::Bool(b) => Value::Bool(*b),
        Literal::Number(n) => Value::Number(*n),
        Literal::String(s) => Value::String(s.clone()),
    }
}

fn binary(op: BinaryOp, lhs: &Value, rhs: &Value) -> Result<Value, EvalError> {
    match op {
        BinaryOp::Add => ops::add(lhs, rhs),
        BinaryOp::Sub => ops::sub(lhs, rhs),
        BinaryOp::Mul => ops::mul(lhs, rhs),
        BinaryOp::Div => ops::div(lhs, rhs),
        BinaryOp::FloorDiv => ops::floor_div(lhs, rhs),
        BinaryOp::Mod => ops::modulo(lhs, rhs),
        BinaryOp::Pow => ops::pow(lhs, rhs),
        BinaryOp::Eq => Ok(Value::Bool(lhs == rhs)),
        BinaryOp::Ne => Ok(Value::Bool(lhs != rhs)),
        BinaryOp::Lt => ops::ordering(op.symbol(), lhs, rhs).map(|o| Value::Bool(o.is_lt())),
        BinaryOp::Lte => ops::ordering(op.symbol(), lhs, rhs).map(|o| Value::Bool(o.is_le())),
        BinaryOp::Gt => ops::ordering(op.symbol(), lhs, rhs).map(|o| Value::Bool(o.is_gt())),
        BinaryOp::Gte => ops::ordering(op.symbol(), lhs, rhs).map(|o| Value::Bool(o.is_ge())),
        BinaryOp::In => ops::contains(rhs, lhs).map(Value::Bool),
        BinaryOp::NotIn => ops::contains(rhs, lhs).map(|found| Value::Bool(!found)),
    }
}
