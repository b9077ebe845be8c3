//! Name-to-value bindings for template evaluation

use crate::value::Value;
use indexmap::IndexMap;

/// The caller-supplied mapping a template is merged against. Evaluation
/// never mutates it: every merge wraps it in a child scope that absorbs all
/// writes, so the namespace can be reused across merges.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Namespace(IndexMap<String, Value>);

impl Namespace {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a name, replacing any previous binding
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(name.into(), value.into());
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl From<IndexMap<String, Value>> for Namespace {
    fn from(map: IndexMap<String, Value>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<Value>> FromIterator<(K, V)> for Namespace {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

/// One level of the evaluation scope chain. Reads walk the chain outward;
/// writes land in the innermost scope only. A child scope is created at each
/// template body entry, each `#foreach` iteration, and each macro
/// invocation.
#[derive(Debug)]
pub(crate) struct Scope<'a> {
    locals: IndexMap<String, Value>,
    parent: Parent<'a>,
}

#[derive(Clone, Copy, Debug)]
enum Parent<'a> {
    Namespace(&'a Namespace),
    Scope(&'a Scope<'a>),
}

impl<'a> Scope<'a> {
    /// Create the outermost scope of a merge, wrapping the caller's
    /// namespace
    pub fn root(namespace: &'a Namespace) -> Self {
        Self {
            locals: IndexMap::new(),
            parent: Parent::Namespace(namespace),
        }
    }

    /// Create a scope that shadows this one
    pub fn child(&self) -> Scope<'_> {
        Scope {
            locals: IndexMap::new(),
            parent: Parent::Scope(self),
        }
    }

    pub fn get(&self, name: &str) -> Option<&Value> {
        self.locals.get(name).or_else(|| match self.parent {
            Parent::Namespace(namespace) => namespace.get(name),
            Parent::Scope(scope) => scope.get(name),
        })
    }

    pub fn set(&mut self, name: impl Into<String>, value: Value) {
        self.locals.insert(name.into(), value);
    }

    /// Whether the name is bound in this scope itself, ignoring parents
    pub fn contains_local(&self, name: &str) -> bool {
        self.locals.contains_key(name)
    }
}
