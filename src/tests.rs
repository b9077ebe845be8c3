//! End-to-end merge tests

use crate::{
    Namespace, Template, TemplateError, Value, assert_err, assert_matches,
    test_util::MapLoader,
};
use pretty_assertions::assert_eq;
use proptest::{prop_assert_eq, proptest};
use rstest::rstest;

/// Templates merged against a namespace produce the expected output
#[rstest]
#[case::identity("<html></html>", ns([]), "<html></html>")]
#[case::substitution(
    "Hello $name",
    ns([("name", "Chris".into())]),
    "Hello Chris",
)]
#[case::undefined_verbatim("Hello $name", ns([]), "Hello $name")]
#[case::null_verbatim(
    "Hello $name",
    ns([("name", Value::Null)]),
    "Hello $name",
)]
#[case::lone_dollars("Hello $ \nHello $", ns([]), "Hello $ \nHello $")]
#[case::silent_defined(
    "Hello $!name",
    ns([("name", "world".into())]),
    "Hello world",
)]
#[case::silent_undefined("Hello $!name", ns([]), "Hello ")]
#[case::silent_null("Hello $!name", ns([("name", Value::Null)]), "Hello ")]
#[case::braced(
    "Hello ${name}.",
    ns([("name", "World".into())]),
    "Hello World.",
)]
#[case::trailing_brace_preserved(
    "Hello $name}.",
    ns([("name", "World".into())]),
    "Hello World}.",
)]
#[case::member(
    "Hello $name.first_name",
    ns([("name", vec![("first_name", "Chris")].into())]),
    "Hello Chris",
)]
#[case::undefined_chain_verbatim("$a.b.c", ns([]), "$a.b.c")]
#[case::if_true(
    "Hello #if ($name)your name is ${name}#end Good to see you",
    ns([("name", "Steve".into())]),
    "Hello your name is Steve Good to see you",
)]
#[case::if_false(
    "Hello #if ($show_greeting)your name is ${name}#end Good to see you",
    ns([("name", "Steve".into()), ("show_greeting", false.into())]),
    "Hello  Good to see you",
)]
#[case::if_nested_outer_false(
    "Hello #if ($show_greeting)your name is ${name}.\
        #if ($is_birthday) Happy Birthday.#end#end Good to see you",
    ns([("name", "Steve".into()), ("show_greeting", false.into())]),
    "Hello  Good to see you",
)]
#[case::if_nested_outer_true(
    "Hello #if ($show_greeting)your name is ${name}.\
        #if ($is_birthday) Happy Birthday.#end#end Good to see you",
    ns([("name", "Steve".into()), ("show_greeting", true.into())]),
    "Hello your name is Steve. Good to see you",
)]
#[case::if_nested_both_true(
    "Hello #if ($show_greeting)your name is ${name}.\
        #if ($is_birthday) Happy Birthday.#end#end Good to see you",
    ns([
        ("name", "Steve".into()),
        ("show_greeting", true.into()),
        ("is_birthday", true.into()),
    ]),
    "Hello your name is Steve. Happy Birthday. Good to see you",
)]
#[case::if_with_newlines(
    "hello #if ($show_greeting)${name}.\n#if($is_birthday)Happy Birthday\n#end.\n#endOff out later?",
    ns([
        ("name", "Steve".into()),
        ("show_greeting", true.into()),
        ("is_birthday", true.into()),
    ]),
    "hello Steve.\nHappy Birthday\n.\nOff out later?",
)]
#[case::else_taken("#if ($value) true #else false #end", ns([]), " false ")]
#[case::elseif_first(
    "#if ($a)A#elseif ($b)B#elseif ($c)C#else D#end",
    ns([("a", true.into())]),
    "A",
)]
#[case::elseif_second(
    "#if ($a)A#elseif ($b)B#elseif ($c)C#else D#end",
    ns([("b", true.into())]),
    "B",
)]
#[case::elseif_third(
    "#if ($a)A#elseif ($b)B#elseif ($c)C#else D#end",
    ns([("c", true.into())]),
    "C",
)]
#[case::elseif_none(
    "#if ($a)A#elseif ($b)B#elseif ($c)C#else D#end",
    ns([]),
    " D",
)]
#[case::greater("#if (2 > 1)yes#end", ns([]), "yes")]
#[case::greater_equal_false(
    "#if (1 >= 2)yes#else no#end",
    ns([]),
    " no",
)]
#[case::equal("#if ($n == 3)eq#end", ns([("n", 3.into())]), "eq")]
#[case::not_equal("#if (\"a\" != \"b\")ne#end", ns([]), "ne")]
#[case::less_strings(
    "#if ($w < \"b\")first#end",
    ns([("w", "a".into())]),
    "first",
)]
#[case::unary_zero_falsey("#if (0)a#else b#end", ns([]), " b")]
#[case::unary_empty_string_falsey("#if (\"\")a#else b#end", ns([]), " b")]
#[case::foreach_plain(
    "#foreach ($name in $names)Hello you. #end",
    ns([("names", vec!["Chris", "Steve"].into())]),
    "Hello you. Hello you. ",
)]
#[case::foreach_skipped_in_failing_if(
    "#if ($false_value)#foreach ($name in $names)Hello you. #end#end",
    ns([
        ("false_value", false.into()),
        ("names", vec!["Chris", "Steve"].into()),
    ]),
    "",
)]
#[case::foreach_outer_reference(
    "#foreach ($name in $names)Hello $you. #end",
    ns([
        ("you", "You".into()),
        ("names", vec!["Chris", "Steve"].into()),
    ]),
    "Hello You. Hello You. ",
)]
#[case::foreach_loop_variable(
    "#foreach ($name in $names)Hello $name. #end",
    ns([("names", vec!["Chris", "Steve"].into())]),
    "Hello Chris. Hello Steve. ",
)]
#[case::foreach_variable_scoped_to_loop(
    "#foreach ($name in $names)Hello $name. #end$name",
    ns([("names", vec!["Chris", "Steve"].into())]),
    "Hello Chris. Hello Steve. $name",
)]
#[case::foreach_nested(
    "#foreach ($word in $greetings)$word to#foreach ($word in $names) $word#end. #end",
    ns([
        ("greetings", vec!["Hello", "Goodbye"].into()),
        ("names", vec!["Chris", "Steve"].into()),
    ]),
    "Hello to Chris Steve. Goodbye to Chris Steve. ",
)]
#[case::foreach_counter(
    "#foreach ($word in $greetings)$velocityCount,#end",
    ns([("greetings", vec!["Hello", "Goodbye"].into())]),
    "1,2,",
)]
#[case::foreach_nested_counters(
    "#foreach ($word in $greetings)Outer $velocityCount\
        #foreach ($word in $names), inner $velocityCount#end. #end",
    ns([
        ("greetings", vec!["Hello", "Goodbye"].into()),
        ("names", vec!["Chris", "Steve"].into()),
    ]),
    "Outer 1, inner 1, inner 2. Outer 2, inner 1, inner 2. ",
)]
#[case::set_integer("#set ($value = 10)$value", ns([]), "10")]
#[case::set_string("#set ($value = \"Steve\")$value", ns([]), "Steve")]
#[case::set_reference(
    "#set ($copy = $original)$copy",
    ns([("original", "x".into())]),
    "x",
)]
#[case::set_eats_own_newline("#set ($x = 1)\n$x", ns([]), "1")]
#[case::set_escaped_quotes(
    "#set ($name = \"\\\"batman\\\"\")$name",
    ns([]),
    "\"batman\"",
)]
#[case::set_escaped_backslash_newline(
    "#set ($name = \"\\\\batman\\nand robin\")$name",
    ns([]),
    "\\batman\nand robin",
)]
#[case::line_comments(
    "## comment\nStuff\nMore stuff## more comments $blah",
    ns([]),
    "Stuff\nMore stuff",
)]
#[case::block_comment(
    "Stuff#*\n more comments *#\n and more stuff",
    ns([]),
    "Stuff and more stuff",
)]
#[case::macro_basic(
    "#macro ( greet $who )Hello $who.#end#greet(\"Chris\") #greet(\"Steve\")",
    ns([]),
    "Hello Chris. Hello Steve.",
)]
#[case::macro_no_args("#macro ( bar )===#end#bar()#bar()", ns([]), "======")]
#[case::macro_case_insensitive(
    "#macro ( GREET $who )Hi $who#end#Greet(\"X\")",
    ns([]),
    "Hi X",
)]
#[case::macro_sees_enclosing_scope(
    "#set ($tail = \"!\")#macro ( shout $w )$w$tail#end#shout(\"hey\")",
    ns([]),
    "hey!",
)]
#[case::macro_reference_argument(
    "#macro ( greet $who )Hi $who#end#greet($name)",
    ns([("name", "Chris".into())]),
    "Hi Chris",
)]
fn test_merge(
    #[case] source: &str,
    #[case] namespace: Namespace,
    #[case] expected: &str,
) {
    let template = Template::new(source);
    assert_eq!(template.merge(&namespace).unwrap(), expected);
}

/// Caller-supplied functions are callable from references, with arguments
/// evaluated in the caller's namespace
#[rstest]
#[case::literal_argument("$squared(8)", vec![], "64")]
#[case::reference_argument(
    "$squared($some_var)",
    vec![("some_var", 6.into())],
    "36",
)]
#[case::nested_calls(
    "$squared($squared($some_var))",
    vec![("some_var", 6.into())],
    "1296",
)]
#[case::two_arguments("$multiply(2, 4)", vec![], "8")]
#[case::argument_whitespace("$multiply( 2 , 4 )", vec![], "8")]
#[case::two_references(
    "$multiply($value1,$value2)",
    vec![("value1", 4.into()), ("value2", 12.into())],
    "48",
)]
fn test_function_calls(
    #[case] source: &str,
    #[case] extra: Vec<(&'static str, Value)>,
    #[case] expected: &str,
) {
    let mut namespace = functions();
    for (name, value) in extra {
        namespace.insert(name, value);
    }
    let template = Template::new(source);
    assert_eq!(template.merge(&namespace).unwrap(), expected);
}

/// A member holding a function can be called as a method
#[test]
fn test_member_call() {
    let person: Value =
        vec![("first_name", Value::function(|_| Ok("Chris".into())))].into();
    let namespace = ns([("name", person)]);
    let template = Template::new("Hello $name.first_name()");
    assert_eq!(template.merge(&namespace).unwrap(), "Hello Chris");
}

/// `#include` copies raw loader text to the output without parsing it
#[rstest]
#[case::literal_name("A#include ( \"header.txt\" )B")]
#[case::reference_name("A#include ( $file )B")]
fn test_include(#[case] source: &str) {
    let loader = MapLoader::new([("header.txt", "<head>$notparsed</head>")]);
    let namespace = ns([("file", "header.txt".into())]);
    let template = Template::new(source);
    assert_eq!(
        template.merge_with_loader(&namespace, &loader).unwrap(),
        "A<head>$notparsed</head>B"
    );
}

/// Output can be written directly to any string sink
#[test]
fn test_merge_to_sink() {
    let template = Template::new("Hello $name!");
    let mut output = String::new();
    template
        .merge_to(&ns([("name", "Chris".into())]), &mut output)
        .unwrap();
    assert_eq!(output, "Hello Chris!");
}

/// The caller's namespace is byte-identical before and after a merge that
/// assigns and loops
#[test]
fn test_namespace_not_modified() {
    let namespace = ns([("names", vec!["a", "b"].into())]);
    let before = namespace.clone();
    Template::new("#set ($v = 10)#foreach ($n in $names)$v$n#end")
        .merge(&namespace)
        .unwrap();
    assert_eq!(namespace, before);
}

/// A template can be merged repeatedly, including ones that define macros
#[test]
fn test_repeated_merge() {
    let template =
        Template::new("#macro ( greet $who )Hi $who#end#greet($name)");
    assert_eq!(
        template.merge(&ns([("name", "Chris".into())])).unwrap(),
        "Hi Chris"
    );
    assert_eq!(
        template.merge(&ns([("name", "Steve".into())])).unwrap(),
        "Hi Steve"
    );
}

/// Evaluation error cases
#[rstest]
#[case::undefined_macro("#nope()", ns([]), "no such macro `nope`")]
#[case::redefined_macro(
    "#macro ( m )x#end#macro ( m )y#end",
    ns([]),
    "cannot redefine macro `m`",
)]
#[case::macro_arity(
    "#macro ( m $a )x#end#m()",
    ns([]),
    "macro `m` expected 1 argument(s), got 0",
)]
#[case::null_loader(
    "#include ( \"missing.txt\" )",
    ns([]),
    "no loader available for `missing.txt`",
)]
#[case::not_iterable(
    "#foreach ($x in 5)y#end",
    ns([]),
    "value `5` is not iterable",
)]
#[case::not_callable(
    "$name()",
    ns([("name", "Chris".into())]),
    "`name` is not callable",
)]
#[case::invalid_include_name(
    "#include ( $flag )",
    ns([("flag", true.into())]),
    "template name must be a string",
)]
#[case::extra_end("#if (1)true!#end #end ", ns([]), "a template element")]
fn test_merge_error(
    #[case] source: &str,
    #[case] namespace: Namespace,
    #[case] expected_error: &str,
) {
    let template = Template::new(source);
    assert_err!(template.merge(&namespace), expected_error);
}

/// Syntax errors pinpoint the failure with line, column, source line, and
/// caret
#[test]
fn test_syntax_error_position() {
    let template = Template::new("ok line\n#set (broken)");
    let error = template.merge(&Namespace::new()).unwrap_err();
    let error = assert_matches!(error, TemplateError::Syntax(error) => error);
    assert_eq!(error.line(), 2);
    assert_eq!(error.column(), 7);
    assert_eq!(error.source_line(), "#set (broken)");
    assert_eq!(error.caret(), "      ^");
    assert_eq!(error.position_strings(), ["#set (broken)", "      ^"]);
    assert_eq!(
        error.to_string(),
        "line 2, column 7: expected assignment, got: broken)"
    );
}

/// Long unparsed input is truncated in the error message
#[test]
fn test_syntax_error_truncation() {
    let trailer = "x".repeat(60);
    let template = Template::new(format!("#set ({trailer}"));
    let error = template.merge(&Namespace::new()).unwrap_err();
    let error = assert_matches!(error, TemplateError::Syntax(error) => error);
    let message = error.to_string();
    assert!(
        message.ends_with(" ..."),
        "expected truncated message, got: {message}"
    );
}

proptest! {
    /// A template with no references or directives renders to itself
    #[test]
    fn test_identity_prop(source in r"[^$#\\]{0,60}") {
        let rendered = Template::new(source.as_str())
            .merge(&Namespace::new())
            .unwrap();
        prop_assert_eq!(rendered, source);
    }

    /// An undefined reference appears verbatim in the output
    #[test]
    fn test_undefined_verbatim_prop(name in "[a-z]{1,8}") {
        let source = format!("<${name}>");
        let rendered = Template::new(source.as_str())
            .merge(&Namespace::new())
            .unwrap();
        prop_assert_eq!(rendered, source);
    }
}

/// Shorthand for building a namespace from (name, value) pairs
fn ns<const N: usize>(entries: [(&str, Value); N]) -> Namespace {
    entries.into_iter().collect()
}

/// A namespace holding the callable values used by function-call tests
fn functions() -> Namespace {
    let mut namespace = Namespace::new();
    namespace.insert(
        "squared",
        Value::function(|arguments| match arguments {
            [Value::Integer(n)] => Ok(Value::Integer(n * n)),
            _ => Err(TemplateError::other("expected one integer")),
        }),
    );
    namespace.insert(
        "multiply",
        Value::function(|arguments| match arguments {
            [Value::Integer(a), Value::Integer(b)] => {
                Ok(Value::Integer(a * b))
            }
            _ => Err(TemplateError::other("expected two integers")),
        }),
    );
    namespace
}
