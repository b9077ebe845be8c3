//! Render text from Velocity-style templates and dynamic data. A template
//! interleaves literal text with references (`$name`, `${user.name}`,
//! `$!quiet`) and directives (`#if`, `#foreach`, `#set`, `#macro`,
//! `#include`, comments). Merging a template with a [Namespace] of values
//! produces a string, or writes to any sink of string fragments.
//!
//! ```
//! use slipstream::{Namespace, Template};
//!
//! let template = Template::new("Hello $name");
//! let mut namespace = Namespace::new();
//! namespace.insert("name", "Chris");
//! assert_eq!(template.merge(&namespace).unwrap(), "Hello Chris");
//! ```
//!
//! Undefined references are not errors: `$missing` renders as itself, and
//! the silent form `$!missing` renders as nothing. Writes made by `#set`,
//! `#foreach`, and macros land in scopes owned by the merge, so the caller's
//! namespace is never modified.

mod directive;
mod error;
mod expression;
mod loader;
mod namespace;
mod parse;
mod value;

#[cfg(test)]
mod test_util;
#[cfg(test)]
mod tests;

pub use crate::{
    error::{TemplateError, TemplateSyntaxError},
    loader::{Loader, NullLoader},
    namespace::Namespace,
    value::{Function, MacroBinding, Value},
};

use crate::{directive::Block, namespace::Scope};
use std::{fmt, sync::OnceLock};
use tracing::trace;

/// A template, created from its source text. The text is parsed into a tree
/// on first merge and the tree is reused by every later merge, so parsing
/// cost is paid once. A parsed template is immutable; merging it against
/// distinct namespaces and sinks is safe from multiple threads.
#[derive(Debug)]
pub struct Template {
    content: String,
    body: OnceLock<Block>,
}

impl Template {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            body: OnceLock::new(),
        }
    }

    /// The raw source text this template was created from
    pub fn source(&self) -> &str {
        &self.content
    }

    /// Render the template against a namespace, returning the output as a
    /// string. `#include` fails because no loader is available; use
    /// [Self::merge_with_loader] to supply one.
    pub fn merge(
        &self,
        namespace: &Namespace,
    ) -> Result<String, TemplateError> {
        self.merge_with_loader(namespace, &NullLoader)
    }

    /// Render the template against a namespace, resolving `#include` through
    /// the given loader
    pub fn merge_with_loader(
        &self,
        namespace: &Namespace,
        loader: &dyn Loader,
    ) -> Result<String, TemplateError> {
        let mut output = String::new();
        self.merge_to_with_loader(namespace, &mut output, loader)?;
        Ok(output)
    }

    /// Render the template against a namespace, writing fragments to the
    /// sink in document order
    pub fn merge_to(
        &self,
        namespace: &Namespace,
        sink: &mut dyn fmt::Write,
    ) -> Result<(), TemplateError> {
        self.merge_to_with_loader(namespace, sink, &NullLoader)
    }

    /// Render the template to a sink, resolving `#include` through the given
    /// loader
    pub fn merge_to_with_loader(
        &self,
        namespace: &Namespace,
        sink: &mut dyn fmt::Write,
        loader: &dyn Loader,
    ) -> Result<(), TemplateError> {
        let body = self.body()?;
        // All writes land in a scope owned by this merge, so the caller's
        // namespace comes back unchanged
        let mut scope = Scope::root(namespace);
        body.evaluate(&mut scope, sink, loader)
    }

    /// Get the parsed body, parsing the source on first use
    fn body(&self) -> Result<&Block, TemplateError> {
        if let Some(body) = self.body.get() {
            return Ok(body);
        }
        trace!(bytes = self.content.len(), "Parsing template");
        let body = parse::template_body(&self.content)?;
        // If another thread won the race, its identical result is kept
        Ok(self.body.get_or_init(|| body))
    }
}
