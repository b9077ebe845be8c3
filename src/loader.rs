//! Template resolution for `#include`

use crate::{Template, error::TemplateError};
use std::fmt;

/// A source of template text, supplied by the caller. `#include` asks the
/// loader to copy raw text into the output; [load_template](Self::load_template)
/// returns a parseable template for directives that evaluate their target.
pub trait Loader {
    /// Write the raw, unparsed text of the named template to the sink
    fn merge_text(
        &self,
        name: &str,
        sink: &mut dyn fmt::Write,
    ) -> Result<(), TemplateError>;

    /// Return a fresh template for the named resource
    fn load_template(&self, name: &str) -> Result<Template, TemplateError>;
}

/// The default loader, used when a merge is given no loader. It refuses
/// every request.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullLoader;

impl Loader for NullLoader {
    fn merge_text(
        &self,
        name: &str,
        _sink: &mut dyn fmt::Write,
    ) -> Result<(), TemplateError> {
        Err(TemplateError::NoLoader {
            name: name.to_owned(),
        })
    }

    fn load_template(&self, name: &str) -> Result<Template, TemplateError> {
        Err(TemplateError::NoLoader {
            name: name.to_owned(),
        })
    }
}
