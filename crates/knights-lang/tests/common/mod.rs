//! A small tag library used by the integration tests.
//!
//! Provides `if/else/endif`, `for/endfor`, `block/endblock`, `extends`,
//! `super`, `call` and `with/endwith` on top of the parser capabilities.
#![allow(dead_code)]

use std::{collections::HashMap, iter, sync::Arc};

use knights_lang::{
    Context, Engine, EvalError, Expression, Fragments, Library, Node, ParseError, Parser, Renderer,
    Statement, Template, Value,
};
use smol_str::SmolStr;

fn failure<'a>(err: EvalError) -> Fragments<'a> {
    Box::new(iter::once(Err(err)))
}

#[derive(Debug)]
struct If {
    condition: Expression,
    then: Vec<Statement>,
    otherwise: Vec<Statement>,
}

impl Node for If {
    fn render<'a>(&'a self, renderer: Renderer<'a>, context: &Context) -> Fragments<'a> {
        match renderer.evaluate(&self.condition, context) {
            Ok(value) if value.is_truthy() => renderer.render_statements(&self.then, context),
            Ok(_) => renderer.render_statements(&self.otherwise, context),
            Err(err) => failure(err),
        }
    }
}

fn parse_if(parser: &mut Parser<'_>, args: &str) -> Result<Option<Statement>, ParseError> {
    let condition = parser.compile_expression(args)?;
    let (then, end_tag) = parser.parse_until(&["else", "endif"])?;
    let otherwise = if end_tag == "else" {
        parser.parse_until(&["endif"])?.0
    } else {
        Vec::new()
    };

    Ok(Some(Statement::external(If {
        condition,
        then,
        otherwise,
    })))
}

#[derive(Debug)]
struct For {
    targets: Vec<SmolStr>,
    iter: Expression,
    body: Vec<Statement>,
}

impl For {
    fn bind(&self, item: Value) -> Result<Vec<(SmolStr, Value)>, EvalError> {
        match self.targets.as_slice() {
            [target] => Ok(vec![(target.clone(), item)]),
            targets => match item {
                Value::Array(values) if values.len() == targets.len() => {
                    Ok(targets.iter().cloned().zip(values.iter().cloned()).collect())
                }
                _ => Err(EvalError::Runtime(format!(
                    "expected {} values to unpack",
                    targets.len()
                ))),
            },
        }
    }
}

impl Node for For {
    fn render<'a>(&'a self, renderer: Renderer<'a>, context: &Context) -> Fragments<'a> {
        let items = match renderer
            .evaluate(&self.iter, context)
            .and_then(|value| value.iter_items())
        {
            Ok(items) => items,
            Err(err) => return failure(err),
        };
        let context = context.clone();

        Box::new(items.into_iter().flat_map(move |item| match self.bind(item) {
            Ok(bindings) => renderer.render_statements(&self.body, &context.scope(bindings)),
            Err(err) => failure(err),
        }))
    }
}

fn parse_for(parser: &mut Parser<'_>, args: &str) -> Result<Option<Statement>, ParseError> {
    let Some((targets, iter)) = args.split_once(" in ") else {
        return Err(parser.invalid_arguments("for", "expected `for <names> in <expression>`"));
    };
    let targets = targets
        .split(',')
        .map(|target| SmolStr::new(target.trim()))
        .collect::<Vec<_>>();
    if targets.iter().any(|target| target.is_empty()) {
        return Err(parser.invalid_arguments("for", "empty loop variable"));
    }

    let iter = parser.compile_expression(iter)?;
    let (body, _) = parser.parse_until(&["endfor"])?;

    Ok(Some(Statement::external(For { targets, iter, body })))
}

/// Renders a method by name at the point it appears.
#[derive(Debug)]
struct Call(SmolStr);

impl Node for Call {
    fn render<'a>(&'a self, renderer: Renderer<'a>, context: &Context) -> Fragments<'a> {
        renderer.render_method(&self.0, context)
    }
}

fn parse_block(parser: &mut Parser<'_>, args: &str) -> Result<Option<Statement>, ParseError> {
    if args.is_empty() {
        return Err(parser.invalid_arguments("block", "missing block name"));
    }

    parser.build_method(args, &["endblock"])?;
    Ok(Some(Statement::external(Call(args.into()))))
}

fn parse_call(parser: &mut Parser<'_>, args: &str) -> Result<Option<Statement>, ParseError> {
    if args.is_empty() {
        return Err(parser.invalid_arguments("call", "missing method name"));
    }

    Ok(Some(Statement::external(Call(args.into()))))
}

#[derive(Debug)]
struct Super;

impl Node for Super {
    fn render<'a>(&'a self, renderer: Renderer<'a>, context: &Context) -> Fragments<'a> {
        renderer.render_super(context)
    }
}

#[derive(Debug)]
struct With {
    bindings: Vec<(SmolStr, Expression)>,
    body: Vec<Statement>,
}

impl Node for With {
    fn render<'a>(&'a self, renderer: Renderer<'a>, context: &Context) -> Fragments<'a> {
        let bindings = self
            .bindings
            .iter()
            .map(|(name, expr)| renderer.evaluate(expr, context).map(|value| (name.clone(), value)))
            .collect::<Result<Vec<_>, EvalError>>();

        match bindings {
            Ok(bindings) => renderer.render_statements(&self.body, &context.scope(bindings)),
            Err(err) => failure(err),
        }
    }
}

fn parse_with(parser: &mut Parser<'_>, args: &str) -> Result<Option<Statement>, ParseError> {
    let arguments = parser.parse_args(args)?;
    if !arguments.positional.is_empty() {
        return Err(parser.invalid_arguments("with", "only keyword arguments are allowed"));
    }

    let (body, _) = parser.parse_until(&["endwith"])?;

    Ok(Some(Statement::external(With {
        bindings: arguments.keywords,
        body,
    })))
}

/// The test tag library. `extends` resolves parent names against `parents`.
pub fn library(parents: HashMap<String, Arc<Template>>) -> Library {
    let mut library = Library::new();
    library
        .register_tag_fn("if", parse_if)
        .register_tag_fn("for", parse_for)
        .register_tag_fn("block", parse_block)
        .register_tag_fn("call", parse_call)
        .register_tag_fn("super", |_, _| Ok(Some(Statement::external(Super))))
        .register_tag_fn("with", parse_with)
        .register_tag_fn("extends", move |parser, args| {
            let name = args.trim_matches(['"', '\'']);
            let parent = parents
                .get(name)
                .cloned()
                .ok_or_else(|| parser.invalid_arguments("extends", format!("unknown template `{}`", name)))?;

            parser.set_parent(parent)?;
            Ok(None)
        });
    library
}

pub fn engine() -> Engine {
    Engine::new(library(HashMap::new()))
}

/// An engine whose `extends` tag knows the given, already compiled, templates.
pub fn engine_with_parents(parents: &[(&str, Arc<Template>)]) -> Engine {
    Engine::new(library(
        parents
            .iter()
            .map(|(name, template)| (name.to_string(), Arc::clone(template)))
            .collect(),
    ))
}

pub fn render(source: &str, context: &Context) -> Result<String, knights_lang::Error> {
    let template = engine().compile(source)?;
    template
        .render_to_string(context)
        .map_err(|err| knights_lang::Error::from_error(source, err))
}
