//! Runtime template values

use crate::{directive::Block, error::TemplateError, expression::Identifier};
use derive_more::From;
use indexmap::IndexMap;
use itertools::Itertools;
use std::{
    fmt::{self, Debug, Display},
    sync::Arc,
};

/// A runtime template value. This is similar to a JSON value, with two
/// additions: values can be callable, and a macro definition is itself a
/// value so it can live in the namespace alongside ordinary bindings.
#[derive(Clone, Debug, Default, From, PartialEq)]
pub enum Value {
    #[default]
    Null,
    Boolean(bool),
    Integer(i64),
    Float(f64),
    String(String),
    #[from(skip)] // We use a generic impl instead
    Array(Vec<Self>),
    Object(IndexMap<String, Self>),
    /// A caller-supplied function, invoked by a reference with a parameter
    /// list such as `$squared(4)`
    Function(Function),
    /// A macro bound by a `#macro` directive. Stored under a `#`-prefixed
    /// key, which no identifier can collide with
    Macro(MacroBinding),
}

impl Value {
    /// The truthiness of a value, as used by the bare `#if (value)` form.
    /// Null and `false` are falsey, and so are zero numbers and empty
    /// strings, arrays, and objects. Everything else, including callables
    /// and macro bindings, is truthy.
    pub fn to_bool(&self) -> bool {
        match self {
            Self::Null | Self::Boolean(false) => false,
            Self::Boolean(true) | Self::Function(_) | Self::Macro(_) => true,
            Self::Integer(i) => *i != 0,
            Self::Float(f) => *f != 0.0,
            Self::String(s) => !s.is_empty(),
            Self::Array(array) => !array.is_empty(),
            Self::Object(object) => !object.is_empty(),
        }
    }

    /// Convert this value to its rendered output form. Strings pass through
    /// unquoted; null renders as empty; everything else uses the display
    /// impl.
    pub fn into_string(self) -> String {
        match self {
            Self::Null => String::new(),
            Self::String(s) => s,
            other => other.to_string(),
        }
    }

    /// Build a template value from JSON data, e.g. to fill a namespace from
    /// a configuration file. Every JSON value has a template counterpart,
    /// so the conversion is total.
    pub fn from_json(json: serde_json::Value) -> Self {
        json.into()
    }

    /// Wrap a Rust closure as a callable template value
    pub fn function(
        function: impl Fn(&[Value]) -> Result<Value, TemplateError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self::Function(Function::new(function))
    }
}

impl Display for Value {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Null => write!(fmt, "null"),
            Self::Boolean(b) => write!(fmt, "{b}"),
            Self::Integer(i) => write!(fmt, "{i}"),
            Self::Float(f) => write!(fmt, "{f}"),
            Self::String(s) => write!(fmt, "\"{s}\""),
            Self::Array(array) => {
                write!(fmt, "[{}]", array.iter().format(", "))
            }
            Self::Object(object) => {
                write!(
                    fmt,
                    "{{{}}}",
                    object.iter().format_with(", ", |(k, v), f| f(
                        &format_args!("{k}: {v}")
                    ))
                )
            }
            Self::Function(_) => write!(fmt, "<function>"),
            Self::Macro(_) => write!(fmt, "<macro>"),
        }
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_owned())
    }
}

/// A list of anything convertible becomes an array
impl<T> From<Vec<T>> for Value
where
    Value: From<T>,
{
    fn from(items: Vec<T>) -> Self {
        let items = items.into_iter().map(Into::into).collect();
        Self::Array(items)
    }
}

/// A list of (name, value) pairs becomes an object
impl<K, V> From<Vec<(K, V)>> for Value
where
    String: From<K>,
    Value: From<V>,
{
    fn from(entries: Vec<(K, V)>) -> Self {
        let members = entries
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .collect();
        Self::Object(members)
    }
}

impl From<serde_json::Value> for Value {
    fn from(json: serde_json::Value) -> Self {
        match json {
            serde_json::Value::Null => Self::Null,
            serde_json::Value::Bool(b) => Self::Boolean(b),
            // Integral numbers stay integers; anything else (including a
            // u64 too big for i64) is carried as a float
            serde_json::Value::Number(number) => number.as_i64().map_or_else(
                || number.as_f64().map_or(Self::Null, Self::Float),
                Self::Integer,
            ),
            serde_json::Value::String(s) => Self::String(s),
            serde_json::Value::Array(items) => {
                Self::Array(items.into_iter().map(Self::from).collect())
            }
            serde_json::Value::Object(members) => Self::Object(
                members
                    .into_iter()
                    .map(|(name, value)| (name, Self::from(value)))
                    .collect(),
            ),
        }
    }
}

/// A callable value. Arguments are evaluated by the engine in the caller's
/// namespace and passed in lexical order; the function decides what counts
/// as a valid argument list.
#[derive(Clone)]
pub struct Function(
    Arc<dyn Fn(&[Value]) -> Result<Value, TemplateError> + Send + Sync>,
);

impl Function {
    pub fn new(
        function: impl Fn(&[Value]) -> Result<Value, TemplateError>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        Self(Arc::new(function))
    }

    pub(crate) fn call(
        &self,
        arguments: &[Value],
    ) -> Result<Value, TemplateError> {
        (self.0)(arguments)
    }
}

impl Debug for Function {
    fn fmt(&self, fmt: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(fmt, "<function>")
    }
}

// Closures have no meaningful equality, so compare identity
impl PartialEq for Function {
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// A macro bound into a namespace by a `#macro` definition. The body block
/// is shared with the AST, so bindings are cheap to clone.
#[derive(Clone, Debug)]
pub struct MacroBinding {
    pub(crate) params: Vec<Identifier>,
    pub(crate) body: Arc<Block>,
}

impl PartialEq for MacroBinding {
    fn eq(&self, other: &Self) -> bool {
        self.params == other.params && Arc::ptr_eq(&self.body, &other.body)
    }
}
