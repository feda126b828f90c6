mod common;

use std::{sync::Arc, thread};

use knights_lang::{
    Context, Engine, EvalError, InnerError, Library, LoadError, ParseError, StaticLibraryResolver, Template,
    TokenKind, Value,
};
use rstest::{fixture, rstest};

#[fixture]
fn engine() -> Engine {
    common::engine()
}

fn context(json: &str) -> Context {
    Context::from_json(json).unwrap()
}

#[rstest]
#[case::empty("")]
#[case::plain("plain text")]
#[case::multiline("line 1\nline 2\n\n")]
#[case::lone_braces("{ } { x } %} }} #}")]
#[case::unterminated_var("{{ name")]
#[case::unterminated_block("{% if x")]
#[case::empty_directive("{{}}")]
#[case::unicode("こんにちは {世界}")]
fn test_directive_free_round_trip(engine: Engine, #[case] source: &str) {
    let template = engine.compile(source).unwrap();

    assert_eq!(template.render_to_string(&Context::new()).unwrap(), source);
    assert_eq!(template.render_to_string(&context(r#"{"name": "x"}"#)).unwrap(), source);
}

#[rstest]
#[case::string(r#"{"name": "World"}"#, "World")]
#[case::integer(r#"{"name": 42}"#, "42")]
#[case::decimal(r#"{"name": 1.5}"#, "1.5")]
#[case::null(r#"{"name": null}"#, "")]
#[case::array(r#"{"name": [1, "a"]}"#, r#"[1, "a"]"#)]
#[case::many_digits(r#"{"name": 1.23456789}"#, "1.23456789")]
#[case::beyond_i64(r#"{"name": 1e20}"#, "100000000000000000000")]
fn test_interpolation(engine: Engine, #[case] json: &str, #[case] expected: &str) {
    let template = engine.compile("{{ name }}").unwrap();

    assert_eq!(template.render_to_string(&context(json)).unwrap(), expected);
}

#[rstest]
fn test_undefined_name(engine: Engine) {
    let template = engine.compile("{{ name }}").unwrap();

    assert_eq!(
        template.render_to_string(&Context::new()),
        Err(EvalError::Undefined("name".into()))
    );
}

#[rstest]
fn test_hello_world(engine: Engine) {
    let template = engine.compile("Hello {{ name }}!").unwrap();

    assert_eq!(
        template.render_to_string(&context(r#"{"name": "World"}"#)).unwrap(),
        "Hello World!"
    );
}

#[rstest]
#[case::partition("a{{ b }}c{% d %}e{# f #}g{! h !}i")]
#[case::multiline_body("x{{\n  a +\n  b\n}}y")]
#[case::adjacent("{{a}}{{b}}{%c%}")]
#[case::nested_looking("{{ '{{' }}}}")]
fn test_lexing_partitions_source(#[case] source: &str) {
    let tokens = knights_lang::tokenize(source).collect::<Vec<_>>();

    assert_eq!(tokens.iter().map(|token| token.raw).collect::<String>(), source);
    assert!(tokens.iter().all(|token| !token.raw.is_empty()));
    assert!(
        tokens
            .windows(2)
            .all(|pair| !(pair[0].kind == TokenKind::Text && pair[1].kind == TokenKind::Text))
    );
}

#[rstest]
#[case::text("a{# note #}b", "ab")]
#[case::looks_like_tag("a{# {% bogus %} #}b", "ab")]
#[case::looks_like_end_tag("{% if cond %}yes{# {% endif %} #}{% endif %}", "yes")]
#[case::looks_like_var("{# {{ missing }} #}ok", "ok")]
#[case::multiline("a{#\n{% for x in y %}\n#}b", "ab")]
fn test_comments_are_inert(#[case] source: &str, #[case] expected: &str) {
    let result = common::render(source, &context(r#"{"cond": true}"#)).unwrap();

    assert_eq!(result, expected);
}

#[rstest]
#[case::truthy(r#"{"cond": true}"#, "Yes")]
#[case::falsy(r#"{"cond": false}"#, "")]
fn test_if(engine: Engine, #[case] json: &str, #[case] expected: &str) {
    let template = engine.compile("{% if cond %}Yes{% endif %}").unwrap();

    assert_eq!(template.render_to_string(&context(json)).unwrap(), expected);
}

#[rstest]
#[case::if_else("{% if n > 1 %}many{% else %}one{% endif %}", r#"{"n": 1}"#, "one")]
#[case::nested_if("{% if a %}{% if b %}ab{% else %}a{% endif %}{% endif %}", r#"{"a": 1, "b": 0}"#, "a")]
#[case::for_loop("{% for x in items %}<{{ x }}>{% endfor %}", r#"{"items": [1, 2, 3]}"#, "<1><2><3>")]
#[case::for_unpack(
    "{% for k, v in pairs %}{{ k }}={{ v }};{% endfor %}",
    r#"{"pairs": [["a", 1], ["b", 2]]}"#,
    "a=1;b=2;"
)]
#[case::for_dict_keys("{% for k in d %}{{ k }}{% endfor %}", r#"{"d": {"b": 1, "a": 2}}"#, "ab")]
#[case::loop_variable_is_scoped("{% for x in items %}{{ x }}{% endfor %}{{ x }}", r#"{"items": [1], "x": "outer"}"#, "1outer")]
#[case::with("{% with greeting='hi', n=2 %}{{ greeting * n }}{% endwith %}", "{}", "hihi")]
#[case::comprehension(
    "{{ helpers.join([x * 2 for x in items if x > 1]) }}",
    r#"{"items": [1, 2, 3]}"#,
    "46"
)]
#[case::lambda_param_shadows_context("{{ (lambda name: name + '!')('hey') }}", r#"{"name": "ctx"}"#, "hey!")]
#[case::conditional_expression("{{ 'yes' if ok else 'no' }}", r#"{"ok": false}"#, "no")]
#[case::small_fraction("{{ 1 / 10000000 }}", "{}", "0.0000001")]
#[case::large_power("{{ 10 ** 20 }}", "{}", "100000000000000000000")]
#[case::unicode_name("{{ 名前 }}さん", r#"{"名前": "太郎"}"#, "太郎さん")]
#[case::chained_comparison("{{ 1 < 2 < 3 }} {{ 1 < 3 < 2 }}", "{}", "true false")]
#[case::chained_equality("{{ a == b == 1 }}", r#"{"a": 1, "b": 1}"#, "true")]
#[case::attribute_and_index("{{ user.name }} {{ user.tags[-1] }}", r#"{"user": {"name": "ann", "tags": ["a", "b"]}}"#, "ann b")]
fn test_render(#[case] source: &str, #[case] json: &str, #[case] expected: &str) {
    let mut engine = common::engine();
    engine.register_helper(
        "join",
        Value::function("join", |args| {
            Ok(args
                .first()
                .map(|items| items.iter_items())
                .transpose()?
                .unwrap_or_default()
                .iter()
                .map(ToString::to_string)
                .collect::<String>()
                .into())
        }),
    );

    let template = engine.compile(source).unwrap();

    assert_eq!(template.render_to_string(&context(json)).unwrap(), expected);
}

#[rstest]
#[case::unknown_tag("{% bogus %}")]
#[case::unknown_tag_with_args("text {% bogus 1, 2 %} text")]
fn test_unknown_tag(engine: Engine, #[case] source: &str) {
    let err = engine.compile(source).unwrap_err();

    assert!(matches!(
        err.cause,
        InnerError::Parse(ParseError::UnknownTag { ref name, .. }) if name == "bogus"
    ));
}

#[rstest]
#[case::if_without_end("{% if cond %}Yes", &["else", "endif"])]
#[case::else_without_end("{% if cond %}Yes{% else %}No", &["endif"])]
#[case::for_without_end("{% for x in y %}{{ x }}", &["endfor"])]
#[case::inner_unterminated("{% if a %}{% for x in y %}", &["endfor"])]
fn test_unterminated_block(engine: Engine, #[case] source: &str, #[case] expected: &[&str]) {
    let err = engine.compile(source).unwrap_err();

    match err.cause {
        InnerError::Parse(ParseError::UnterminatedBlock { expected: tags, found, .. }) => {
            assert_eq!(tags, expected.to_vec());
            assert_eq!(found, "end of input");
        }
        cause => panic!("unexpected error {:?}", cause),
    }
}

#[rstest]
fn test_mismatched_end_tag(engine: Engine) {
    let err = engine.compile("{% for x in y %}{% endif %}").unwrap_err();

    assert!(matches!(
        err.cause,
        InnerError::Parse(ParseError::UnknownTag { ref name, .. }) if name == "endif"
    ));
}

#[rstest]
#[case::malformed_var("{{ 1 + }}", "ParseError::MalformedExpression")]
#[case::whitespace_var("{{   }}", "ParseError::MalformedExpression")]
#[case::malformed_tag_args("{% if 1 + %}{% endif %}", "ParseError::MalformedExpression")]
#[case::bad_for("{% for x of y %}{% endfor %}", "ParseError::InvalidArguments")]
#[case::positional_with("{% with 1 %}{% endwith %}", "ParseError::InvalidArguments")]
#[case::duplicate_block("{% block a %}{% endblock %}{% block a %}{% endblock %}", "ParseError::DuplicateMethod")]
#[case::missing_library("{! nowhere !}", "ParseError::Load")]
fn test_compile_error_code(engine: Engine, #[case] source: &str, #[case] expected: &str) {
    use miette::Diagnostic;

    let err = engine.compile(source).unwrap_err();

    assert_eq!(err.code().map(|code| code.to_string()), Some(expected.to_string()));
}

fn greetings() -> Library {
    let mut library = Library::new();
    library
        .register_helper("greeting", "Hello")
        .register_tag_fn("shout", |parser, args| {
            let expr = parser.compile_expression(args)?;
            Ok(Some(knights_lang::Statement::Expr(expr)))
        });
    library
}

#[test]
fn test_load_library() {
    let mut resolver = StaticLibraryResolver::new();
    resolver.insert("greetings", greetings());

    let mut engine = common::engine();
    engine.set_resolver(resolver);

    let template = engine
        .compile("{! greetings !}{{ helpers.greeting }}, {% shout name %}")
        .unwrap();

    assert_eq!(
        template.render_to_string(&context(r#"{"name": "Ann"}"#)).unwrap(),
        "Hello, Ann"
    );
}

#[test]
fn test_load_library_twice_is_idempotent() {
    let mut resolver = StaticLibraryResolver::new();
    resolver.insert("greetings", greetings());

    let mut engine = common::engine();
    engine.set_resolver(resolver);

    let once = engine.compile("{! greetings !}").unwrap();
    let twice = engine.compile("{! greetings !}{! greetings !}").unwrap();

    assert_eq!(once.helpers(), twice.helpers());
    assert_eq!(once.helpers().len(), 1);
}

#[test]
fn test_later_load_overrides_helpers() {
    let mut other = Library::new();
    other.register_helper("greeting", "Howdy");

    let mut resolver = StaticLibraryResolver::new();
    resolver.insert("greetings", greetings()).insert("other", other);

    let mut engine = common::engine();
    engine.set_resolver(resolver);

    let template = engine
        .compile("{! greetings !}{! other !}{{ helpers.greeting }}")
        .unwrap();

    assert_eq!(template.render_to_string(&Context::new()).unwrap(), "Howdy");
}

#[test]
fn test_load_with_closure_resolver() {
    let mut engine = common::engine();
    engine.set_resolver(|path: &str| match path {
        "greetings" => Ok(greetings()),
        _ => Err(LoadError::NotFound(path.to_string())),
    });

    assert!(engine.compile("{! greetings !}").is_ok());
    assert!(engine.compile("{! other !}").is_err());
}

#[test]
fn test_helpers_namespace_is_reserved() {
    let mut engine = common::engine();
    engine.register_helper("greeting", "from helpers");

    let template = engine.compile("{{ helpers.greeting }}").unwrap();
    let context = context(r#"{"helpers": {"greeting": "from context"}}"#);

    assert_eq!(template.render_to_string(&context).unwrap(), "from helpers");
}

const BASE: &str = "<title>{% block title %}Base title{% endblock %}</title>\
<main>{% block content %}Base content{% endblock %}</main>\
<footer>{{ year }}</footer>";

fn base() -> Arc<Template> {
    Arc::new(common::engine().compile_named("base", BASE).unwrap())
}

#[rstest]
#[case::year_2024(r#"{"year": 2024, "name": "Ann"}"#, "2024", "Ann")]
#[case::year_2025(r#"{"year": 2025, "name": "Bob"}"#, "2025", "Bob")]
fn test_child_overrides_block(#[case] json: &str, #[case] year: &str, #[case] name: &str) {
    let engine = common::engine_with_parents(&[("base", base())]);
    let child = engine
        .compile_named(
            "child",
            "{% extends 'base' %}ignored{% block content %}Hi {{ name }}{% endblock %}",
        )
        .unwrap();

    assert_eq!(
        child.render_to_string(&context(json)).unwrap(),
        format!(
            "<title>Base title</title><main>Hi {}</main><footer>{}</footer>",
            name, year
        )
    );
}

#[test]
fn test_super() {
    let engine = common::engine_with_parents(&[("base", base())]);
    let child = engine
        .compile(r#"{% extends "base" %}{% block title %}{% super %} | Child{% endblock %}"#)
        .unwrap();

    assert_eq!(
        child.render_to_string(&context(r#"{"year": 1}"#)).unwrap(),
        "<title>Base title | Child</title><main>Base content</main><footer>1</footer>"
    );
}

#[test]
fn test_three_level_inheritance() {
    let base = base();
    let middle = Arc::new(
        common::engine_with_parents(&[("base", Arc::clone(&base))])
            .compile_named("middle", "{% extends 'base' %}{% block title %}[{% super %}]{% endblock %}")
            .unwrap(),
    );
    let leaf = common::engine_with_parents(&[("middle", middle)])
        .compile("{% extends 'middle' %}{% block title %}({% super %}){% endblock %}")
        .unwrap();

    assert_eq!(leaf.chain("title").len(), 3);
    assert_eq!(
        leaf.render_to_string(&context(r#"{"year": 1}"#)).unwrap(),
        "<title>([Base title])</title><main>Base content</main><footer>1</footer>"
    );
}

#[test]
fn test_method_uses_defining_template_helpers() {
    let mut base_engine = common::engine();
    base_engine.register_helper("label", "base");
    let base = Arc::new(
        base_engine
            .compile_named("base", "{% block a %}{{ helpers.label }}{% endblock %}|{% block b %}{% endblock %}")
            .unwrap(),
    );

    let mut child_engine = common::engine_with_parents(&[("base", base)]);
    child_engine.register_helper("label", "child");
    let child = child_engine
        .compile("{% extends 'base' %}{% block b %}{{ helpers.label }}{% endblock %}")
        .unwrap();

    assert_eq!(child.render_to_string(&Context::new()).unwrap(), "base|child");
}

#[test]
fn test_super_without_parent_definition() {
    let template = common::engine()
        .compile("{% block title %}{% super %}{% endblock %}")
        .unwrap();

    assert_eq!(
        template.render_to_string(&Context::new()),
        Err(EvalError::NoParentMethod("title".into()))
    );
}

#[test]
fn test_extends_twice() {
    let engine = common::engine_with_parents(&[("base", base())]);
    let err = engine
        .compile("{% extends 'base' %}{% extends 'base' %}")
        .unwrap_err();

    assert!(matches!(err.cause, InnerError::Parse(ParseError::ParentAlreadySet { .. })));
}

#[test]
fn test_recursion_limit() {
    let mut engine = common::engine();
    engine.set_max_render_depth(16);

    let template = engine
        .compile("{% block loop %}.{% call loop %}{% endblock %}")
        .unwrap();

    assert_eq!(
        template.render_to_string(&Context::new()),
        Err(EvalError::RecursionError(16))
    );
}

#[rstest]
#[case::string("{{ 'ab' * 10 ** 19 }}")]
#[case::array("{{ [1, 2] * 10 ** 19 }}")]
#[case::string_on_left("{{ 2 ** 62 * 'ab' }}")]
fn test_oversized_repeat_is_a_render_error(engine: Engine, #[case] source: &str) {
    let template = engine.compile(source).unwrap();

    assert_eq!(
        template.render_to_string(&Context::new()),
        Err(EvalError::Runtime("repeat count too large".to_string()))
    );
    assert_eq!(engine.compile("{{ 'ab' * 2 }}").unwrap().render_to_string(&Context::new()).unwrap(), "abab");
}

#[rstest]
#[case::parens(format!("{{{{ {}1{} }}}}", "(".repeat(2000), ")".repeat(2000)))]
#[case::sum(format!("{{{{ {} }}}}", vec!["1"; 2000].join(" + ")))]
#[case::tag_arguments(format!("{{% if {}x %}}{{% endif %}}", "not ".repeat(2000)))]
fn test_deeply_nested_expression_is_a_compile_error(engine: Engine, #[case] source: String) {
    use miette::Diagnostic;

    let err = engine.compile(&source).unwrap_err();

    assert_eq!(
        err.code().map(|code| code.to_string()),
        Some("ParseError::MalformedExpression".to_string())
    );
}

#[test]
fn test_render_error_keeps_template_usable() {
    let template = common::engine().compile("{{ 10 // n }}").unwrap();

    assert_eq!(
        template.render_to_string(&context(r#"{"n": 0}"#)),
        Err(EvalError::ZeroDivision)
    );
    assert_eq!(template.render_to_string(&context(r#"{"n": 5}"#)).unwrap(), "2");
}

#[test]
fn test_stop_pulling_fragments() {
    let template = common::engine()
        .compile("{% for x in items %}{{ 10 // x }},{% endfor %}")
        .unwrap();
    let context = context(r#"{"items": [1, 2, 0]}"#);

    let fragments = template
        .render(&context)
        .take(4)
        .collect::<Result<Vec<_>, _>>()
        .unwrap();

    assert_eq!(fragments, vec!["10", ",", "5", ","]);
}

#[test]
fn test_concurrent_renders() {
    fn assert_send_sync<T: Send + Sync>() {}
    assert_send_sync::<Template>();

    let template = Arc::new(
        common::engine()
            .compile("{% for x in items %}{{ x * n }} {% endfor %}")
            .unwrap(),
    );

    let handles = (1..=8)
        .map(|n| {
            let template = Arc::clone(&template);
            thread::spawn(move || {
                let context = Context::from_iter([
                    ("items", Value::from(vec![Value::from(1), Value::from(2)])),
                    ("n", Value::from(n)),
                ]);
                template.render_to_string(&context)
            })
        })
        .collect::<Vec<_>>();

    for (n, handle) in (1..=8).zip(handles) {
        assert_eq!(handle.join().unwrap().unwrap(), format!("{} {} ", n, n * 2));
    }
}
