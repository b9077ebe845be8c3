//! Parse and evaluation errors

use crate::value::Value;
use itertools::Itertools;
use std::fmt;
use thiserror::Error;
use winnow::error::{ContextError, ParseError, StrContext};

/// Longest excerpt of remaining input shown in a syntax error message
const EXCERPT_MAX: usize = 40;
/// Excerpt length after truncation
const EXCERPT_TRUNCATED: usize = 36;

/// An error raised while parsing a template. Parsing is lazy, so this
/// surfaces from the first merge of a malformed template.
///
/// The error pinpoints where parsing stopped: a 1-based line and column
/// (counted in characters), the offending source line, and a caret string
/// that positions the error beneath that line.
#[derive(Debug, Error)]
#[error("line {line}, column {column}: expected {expected}, got: {got}")]
pub struct TemplateSyntaxError {
    line: usize,
    column: usize,
    source_line: String,
    caret: String,
    expected: String,
    got: String,
}

impl TemplateSyntaxError {
    /// Convert winnow's error into ours, resolving the failure offset into
    /// line/column coordinates and an excerpt of the unparsed input
    pub(crate) fn from_parse(error: ParseError<&str, ContextError>) -> Self {
        let input: &str = *error.input();
        let offset = error.offset();
        let parsed = &input[..offset];
        let rest = &input[offset..];

        let line = 1 + parsed.matches('\n').count();
        let line_start = parsed.rfind('\n').map_or(0, |index| index + 1);
        let column = parsed[line_start..].chars().count() + 1;
        let line_end = rest.find('\n').map_or(input.len(), |index| offset + index);
        let source_line = input[line_start..line_end].to_owned();
        let caret = format!("{}^", " ".repeat(column - 1));

        let expected = error
            .inner()
            .context()
            .filter_map(|context| match context {
                StrContext::Expected(expected) => Some(expected.to_string()),
                _ => None,
            })
            .unique()
            .join(" or ");
        let expected = if expected.is_empty() {
            "valid syntax".to_owned()
        } else {
            expected
        };

        let got = if rest.is_empty() {
            "end of input".to_owned()
        } else if rest.chars().count() > EXCERPT_MAX {
            let prefix: String = rest.chars().take(EXCERPT_TRUNCATED).collect();
            format!("{prefix} ...")
        } else {
            rest.to_owned()
        };

        Self {
            line,
            column,
            source_line,
            caret,
            expected,
            got,
        }
    }

    /// 1-based line number of the error
    pub fn line(&self) -> usize {
        self.line
    }

    /// 1-based column number, counted in characters from the last newline
    /// before the error
    pub fn column(&self) -> usize {
        self.column
    }

    /// Full text of the line the error occurred on
    pub fn source_line(&self) -> &str {
        &self.source_line
    }

    /// Whitespace padding ending in `^`, aligned under [Self::source_line]
    pub fn caret(&self) -> &str {
        &self.caret
    }

    /// The offending line and the caret line positioning the error beneath it
    pub fn position_strings(&self) -> [&str; 2] {
        [&self.source_line, &self.caret]
    }
}

/// Any error that can occur while merging a template. Syntax errors are
/// raised by the lazy parse on first merge; everything else is raised during
/// evaluation. Nothing is caught internally; all variants propagate to the
/// caller.
#[derive(Debug, Error)]
pub enum TemplateError {
    /// The template failed to parse
    #[error(transparent)]
    Syntax(#[from] TemplateSyntaxError),

    /// A macro call named a macro that no definition has bound
    #[error("no such macro `{name}`")]
    UndefinedMacro { name: String },

    /// A `#macro` directive re-bound a name already defined in its scope
    #[error("cannot redefine macro `{name}`")]
    RedefinedMacro { name: String },

    /// A macro call passed the wrong number of arguments
    #[error("macro `{name}` expected {expected} argument(s), got {actual}")]
    MacroArity {
        name: String,
        expected: usize,
        actual: usize,
    },

    /// `#foreach` was given a value that cannot be iterated
    #[error("value `{value}` is not iterable")]
    NotIterable { value: Value },

    /// A reference with a parameter list resolved to a non-callable value
    #[error("`{name}` is not callable")]
    NotCallable { name: String },

    /// `#include` resolved its name expression to a non-string value
    #[error("template name must be a string, got `{value}`")]
    InvalidTemplateName { value: Value },

    /// The operands of a comparison have no defined ordering
    #[error("cannot compare `{left}` {operator} `{right}`")]
    Comparison {
        operator: &'static str,
        left: Value,
        right: Value,
    },

    /// The loader (or the default null loader) refused a template name
    #[error("no loader available for `{name}`")]
    NoLoader { name: String },

    /// The output sink failed to accept a fragment
    #[error("error writing rendered output")]
    Sink(#[from] fmt::Error),

    /// External error type, e.g. from a caller-supplied function
    #[error(transparent)]
    Other(Box<dyn std::error::Error + Send + Sync>),
}

impl TemplateError {
    /// Create a [TemplateError::Other] from another error
    pub fn other(
        error: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self::Other(error.into())
    }
}
