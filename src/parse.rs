//! Template parsing
//!
//! Every rule is a parser anchored at the shared cursor. A failure is either
//! a backtrack (the element dispatcher tries the next candidate) or, past a
//! rule's commit point, a fatal error via [cut_err] that surfaces as a
//! [TemplateSyntaxError]. Commit points sit just after a rule's
//! discriminating prefix: `#macro` commits once the keyword has matched,
//! `${` commits to a closing brace, and so on.

use crate::{
    directive::{
        Assignment, Block, Element, ForeachDirective, IfDirective,
        IncludeDirective, MacroCall, MacroDefinition, Placeholder,
        SetDirective, TemplateName, Text,
    },
    error::TemplateSyntaxError,
    expression::{
        Comparison, Condition, Expression, Identifier, NameOrCall, Reference,
    },
};
use std::sync::Arc;
use winnow::{
    ModalParser, ModalResult, Parser,
    ascii::{Caseless, digit1, multispace0},
    combinator::{
        alt, cut_err, delimited, eof, fail, not, opt, preceded, repeat,
        terminated,
    },
    error::{ContextError, StrContext, StrContextValue},
    token::{one_of, take_till, take_until, take_while},
};

/// Directive names that can never be macro names
const RESERVED_NAMES: [&str; 10] = [
    "if", "else", "elseif", "set", "macro", "foreach", "parse", "include",
    "stop", "end",
];

/// Parse a complete template body: a block that must consume all input
pub(crate) fn template_body(
    source: &str,
) -> Result<Block, TemplateSyntaxError> {
    terminated(block, eof.context(ctx_expected("a template element")))
        .parse(source)
        .map_err(TemplateSyntaxError::from_parse)
}

/// Parse a block: a greedy sequence of elements. Stops (successfully) at the
/// first position where no element matches, e.g. an `#end` owned by an
/// enclosing directive.
fn block(input: &mut &str) -> ModalResult<Block> {
    repeat(0.., element)
        .map(|elements: Vec<Element>| Block { elements })
        .parse_next(input)
}

fn element(input: &mut &str) -> ModalResult<Element> {
    alt((
        text.map(Element::Text),
        placeholder.map(Element::Placeholder),
        comment.map(|()| Element::Comment),
        if_directive.map(Element::If),
        set_directive.map(Element::Set),
        foreach_directive.map(Element::Foreach),
        include_directive.map(Element::Include),
        macro_definition.map(Element::MacroDefinition),
        macro_call.map(Element::MacroCall),
    ))
    .parse_next(input)
}

/// Parse a maximal run of literal text, reducing the `\$`, `\#`, and `\\`
/// escapes as we go
fn text(input: &mut &str) -> ModalResult<Text> {
    repeat(1.., text_fragment).map(Text).parse_next(input)
}

fn text_fragment<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    alt((
        take_till(1.., ['\\', '$', '#']),
        // Escape sequences reduce to the escaped character
        preceded('\\', alt(("\\", "$", "#"))),
        // Any other backslash is literal
        "\\",
        lone_dollar,
    ))
    .parse_next(input)
}

/// A `$` that cannot open a reference is literal text: at end of input, or
/// followed by a character that cannot start a reference (in which case both
/// characters are consumed verbatim)
fn lone_dollar<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    alt((
        terminated("$", eof),
        ("$", one_of(|c: char| !is_reference_start(c))).take(),
    ))
    .parse_next(input)
}

/// Parse a `##` line comment (consuming its terminating newline) or a
/// `#* *#` block comment (consuming one optional trailing `[ \t]*\n`)
fn comment(input: &mut &str) -> ModalResult<()> {
    alt((
        ("##", take_till(0.., '\n'), opt('\n')).void(),
        (
            "#*",
            take_until(0.., "*#"),
            "*#",
            opt((take_while(0.., [' ', '\t']), '\n')),
        )
            .void(),
    ))
    .parse_next(input)
}

/// Parse a reference embedded in text: `$name`, `$!name`, `${name}`,
/// `$!{name}`. The matched source text is kept for undefined-reference
/// fallback.
fn placeholder(input: &mut &str) -> ModalResult<Placeholder> {
    placeholder_parts
        .with_taken()
        .map(|((silent, reference), source): ((bool, Reference), &str)| {
            Placeholder {
                reference,
                silent,
                source: source.to_owned(),
            }
        })
        .parse_next(input)
}

fn placeholder_parts(input: &mut &str) -> ModalResult<(bool, Reference)> {
    '$'.parse_next(input)?;
    let silent = opt('!').parse_next(input)?.is_some();
    let braced = opt('{').parse_next(input)?.is_some();
    // `$` followed by a reference-starting character can only be a
    // reference, so a malformed one is fatal
    let reference =
        cut_err(reference.context(ctx_expected("expression"))).parse_next(input)?;
    if braced {
        cut_err('}'.context(ctx_expected("`}`"))).parse_next(input)?;
    }
    Ok((silent, reference))
}

/// Parse a variable reference: a name followed by any number of `.member`
/// accesses. A trailing `.` that doesn't open another member backtracks and
/// is left for the surrounding text.
fn reference(input: &mut &str) -> ModalResult<Reference> {
    (name_or_call, repeat(0.., preceded('.', name_or_call)))
        .map(|(head, tail): (NameOrCall, Vec<NameOrCall>)| Reference {
            head,
            tail,
        })
        .parse_next(input)
}

fn name_or_call(input: &mut &str) -> ModalResult<NameOrCall> {
    (identifier, opt(parameter_list))
        .map(|(name, arguments)| NameOrCall { name, arguments })
        .parse_next(input)
}

fn identifier(input: &mut &str) -> ModalResult<Identifier> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., is_identifier_char),
    )
        .take()
        .map(|name: &str| Identifier(name.to_owned()))
        .parse_next(input)
}

/// Parse a parenthesized, comma-separated argument list. The opening paren
/// commits the list: everything after it must be arguments and a closing
/// paren.
fn parameter_list(input: &mut &str) -> ModalResult<Vec<Expression>> {
    ('(', multispace0).parse_next(input)?;
    let mut values = Vec::new();
    if let Some(first) = opt(expression).parse_next(input)? {
        values.push(first);
        while opt((multispace0, ',', multispace0))
            .parse_next(input)?
            .is_some()
        {
            let value = cut_err(expression.context(ctx_expected("value")))
                .parse_next(input)?;
            values.push(value);
        }
    }
    cut_err((multispace0, ')').context(ctx_expected("`)`")))
        .parse_next(input)?;
    Ok(values)
}

/// Parse a value expression: `$reference`, integer literal, or string
/// literal
fn expression(input: &mut &str) -> ModalResult<Expression> {
    alt((
        simple_reference.map(Expression::Reference),
        integer_literal.map(Expression::Integer),
        string_literal.map(Expression::String),
    ))
    .parse_next(input)
}

/// A bare `$reference` where only a reference is allowed (arguments,
/// `#foreach` iterables, `#include` names). No silent or brace forms here.
fn simple_reference(input: &mut &str) -> ModalResult<Reference> {
    preceded('$', cut_err(reference.context(ctx_expected("name"))))
        .parse_next(input)
}

fn integer_literal(input: &mut &str) -> ModalResult<i64> {
    digit1.parse_to().parse_next(input)
}

/// Parse a double-quoted string literal. Recognized escapes are `\"`, `\\`,
/// `\n`, `\r`, `\b`, `\t`; any other backslash sequence or a raw newline
/// fails the whole literal (as a backtrack, so the caller reports the error
/// in its own terms).
fn string_literal(input: &mut &str) -> ModalResult<String> {
    delimited('"', repeat(0.., string_fragment), '"').parse_next(input)
}

fn string_fragment<'a>(input: &mut &'a str) -> ModalResult<&'a str> {
    alt((
        take_till(1.., ['"', '\\', '\n', '\r']),
        preceded(
            '\\',
            alt((
                '"'.value("\""),
                '\\'.value("\\"),
                'n'.value("\n"),
                'r'.value("\r"),
                'b'.value("\u{8}"),
                't'.value("\t"),
            )),
        ),
    ))
    .parse_next(input)
}

/// Parse a comparison operator with optional surrounding whitespace. Longer
/// operators first, so `>=` isn't eaten as `>`.
fn binary_operator(input: &mut &str) -> ModalResult<Comparison> {
    delimited(
        multispace0,
        alt((
            ">=".value(Comparison::GreaterEqual),
            "<=".value(Comparison::LessEqual),
            "==".value(Comparison::Equal),
            "!=".value(Comparison::NotEqual),
            ">".value(Comparison::Greater),
            "<".value(Comparison::Less),
        )),
        multispace0,
    )
    .parse_next(input)
}

/// Parse `( value [operator value] )`. A missing value backtracks (the
/// surrounding directive is then not an `#if` at all); once a value has
/// matched, the closing paren is required.
fn condition(input: &mut &str) -> ModalResult<Condition> {
    ('(', multispace0).parse_next(input)?;
    let left = expression.parse_next(input)?;
    let comparison: Option<(Comparison, Expression)> = opt((
        binary_operator,
        cut_err(expression.context(ctx_expected("value"))),
    ))
    .parse_next(input)?;
    cut_err(
        (multispace0, ')')
            .context(ctx_expected("`)` or a comparison operator")),
    )
    .parse_next(input)?;
    Ok(Condition { left, comparison })
}

/// Match a `#keyword` directive opener, case-insensitively. The keyword must
/// end at a word boundary so that e.g. `#iffy` stays available as a macro
/// call.
fn keyword<'a>(
    word: &'static str,
) -> impl ModalParser<&'a str, (), ContextError> {
    (preceded('#', Caseless(word)), not(one_of(is_identifier_char))).void()
}

/// Match `#end`. No word boundary, matching `#else` handling: `#endX`
/// terminates the block and leaves `X` to the enclosing one.
fn end(input: &mut &str) -> ModalResult<()> {
    ('#', Caseless("end")).void().parse_next(input)
}

fn if_directive(input: &mut &str) -> ModalResult<IfDirective> {
    (keyword("if"), multispace0).parse_next(input)?;
    let condition = condition.parse_next(input)?;
    let then_block = block.parse_next(input)?;
    let elseifs: Vec<(Condition, Block)> =
        repeat(0.., elseif_block).parse_next(input)?;
    let else_block = opt(else_block).parse_next(input)?;
    cut_err(end.context(ctx_expected("#else, #elseif or #end")))
        .parse_next(input)?;
    Ok(IfDirective {
        condition,
        then_block,
        elseifs,
        else_block,
    })
}

fn elseif_block(input: &mut &str) -> ModalResult<(Condition, Block)> {
    preceded(
        (keyword("elseif"), multispace0),
        cut_err((condition.context(ctx_expected("condition")), block)),
    )
    .parse_next(input)
}

fn else_block(input: &mut &str) -> ModalResult<Block> {
    preceded(('#', Caseless("else")), block).parse_next(input)
}

fn set_directive(input: &mut &str) -> ModalResult<SetDirective> {
    preceded(
        keyword("set"),
        cut_err(assignment.context(ctx_expected("assignment"))),
    )
    .map(|assignment| SetDirective { assignment })
    .parse_next(input)
}

fn assignment(input: &mut &str) -> ModalResult<Assignment> {
    (multispace0, '(', multispace0, '$').parse_next(input)?;
    let target = identifier.parse_next(input)?;
    (multispace0, '=', multispace0).parse_next(input)?;
    let value = expression.parse_next(input)?;
    cut_err((multispace0, ')').context(ctx_expected("`)`")))
        .parse_next(input)?;
    // An assignment on a line of its own leaves no blank line behind
    opt((take_while(0.., [' ', '\t']), opt('\r'), '\n'))
        .void()
        .parse_next(input)?;
    Ok(Assignment { target, value })
}

fn foreach_directive(input: &mut &str) -> ModalResult<ForeachDirective> {
    ('#', Caseless("foreach"), multispace0, '(', multispace0, '$')
        .parse_next(input)?;
    let variable = identifier.parse_next(input)?;
    (multispace0, Caseless("in"), multispace0).parse_next(input)?;
    let iterable = expression.parse_next(input)?;
    cut_err((multispace0, ')').context(ctx_expected("`)`")))
        .parse_next(input)?;
    let body = block.parse_next(input)?;
    cut_err(end.context(ctx_expected("#end"))).parse_next(input)?;
    Ok(ForeachDirective {
        variable,
        iterable,
        body,
    })
}

fn include_directive(input: &mut &str) -> ModalResult<IncludeDirective> {
    keyword("include").parse_next(input)?;
    cut_err(
        (take_while(0.., [' ', '\t']), '(', multispace0)
            .context(ctx_expected("`(`")),
    )
    .parse_next(input)?;
    let name = cut_err(template_name.context(ctx_expected("template name")))
        .parse_next(input)?;
    cut_err(
        (take_while(0.., [' ', '\t']), ')').context(ctx_expected("`)`")),
    )
    .parse_next(input)?;
    Ok(IncludeDirective { name })
}

fn template_name(input: &mut &str) -> ModalResult<TemplateName> {
    alt((
        string_literal.map(TemplateName::Literal),
        simple_reference.map(TemplateName::Reference),
    ))
    .parse_next(input)
}

fn macro_definition(input: &mut &str) -> ModalResult<MacroDefinition> {
    keyword("macro").parse_next(input)?;
    cut_err(
        (take_while(0.., [' ', '\t']), '(').context(ctx_expected("`(`")),
    )
    .parse_next(input)?;
    let name = cut_err(
        preceded(multispace0, macro_name)
            .context(ctx_expected("macro name")),
    )
    .parse_next(input)?;
    if RESERVED_NAMES.contains(&name.to_ascii_lowercase().as_str()) {
        return cut_err(fail.context(ctx_expected("non-reserved name")))
            .parse_next(input);
    }
    let params: Vec<Identifier> =
        repeat(0.., macro_param).parse_next(input)?;
    cut_err(
        (take_while(0.., [' ', '\t']), ')')
            .context(ctx_expected("`)` or an argument name")),
    )
    .parse_next(input)?;
    let body = block.parse_next(input)?;
    cut_err(end.context(ctx_expected("#end"))).parse_next(input)?;
    Ok(MacroDefinition {
        name,
        params,
        body: Arc::new(body),
    })
}

/// Macro names start with a letter; the leading underscore allowed in
/// variable names is not allowed here
fn macro_name(input: &mut &str) -> ModalResult<Identifier> {
    (
        one_of(|c: char| c.is_ascii_alphabetic()),
        take_while(0.., is_identifier_char),
    )
        .take()
        .map(|name: &str| Identifier(name.to_owned()))
        .parse_next(input)
}

fn macro_param(input: &mut &str) -> ModalResult<Identifier> {
    preceded((take_while(1.., [' ', '\t']), '$'), macro_name)
        .parse_next(input)
}

/// Parse a macro call: `#name(arg arg ...)`, whitespace-separated
/// arguments. A reserved name or one starting with `end` backtracks so the
/// matching directive (or an enclosing `#end`) can claim it; any other name
/// followed by `(` commits the call.
fn macro_call(input: &mut &str) -> ModalResult<MacroCall> {
    let name = preceded('#', macro_name).parse_next(input)?;
    let name = name.to_ascii_lowercase();
    if RESERVED_NAMES.contains(&name.as_str()) || name.starts_with("end") {
        return fail.parse_next(input);
    }
    cut_err(
        (take_while(0.., [' ', '\t']), '(').context(ctx_expected("`(`")),
    )
    .parse_next(input)?;
    multispace0.parse_next(input)?;
    let mut arguments = Vec::new();
    loop {
        match opt(expression).parse_next(input)? {
            Some(value) => arguments.push(value),
            None => break,
        }
        if opt(take_while(1.., [' ', '\t']))
            .parse_next(input)?
            .is_none()
        {
            break;
        }
    }
    cut_err(
        (take_while(0.., [' ', '\t']), ')')
            .context(ctx_expected("an argument value or `)`")),
    )
    .parse_next(input)?;
    Ok(MacroCall { name, arguments })
}

fn is_identifier_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

/// Characters that can start a reference after `$`: the silent marker, an
/// opening brace, or an identifier-ish character. A digit counts here (and
/// then fails to parse as a reference) rather than falling back to text.
fn is_reference_start(c: char) -> bool {
    c == '!' || c == '{' || c == '_' || c.is_ascii_alphanumeric()
}

/// Create a [StrContext::Expected]
fn ctx_expected(expected: &'static str) -> StrContext {
    StrContext::Expected(StrContextValue::Description(expected))
}
