//! Helpers shared between test modules

use crate::{Loader, Template, error::TemplateError};
use indexmap::IndexMap;
use std::fmt;

/// Assert a result is the `Err` variant and that the error mentions the
/// given fragment. Both error types here keep their detail in `Display`
/// output, so the check walks the error and its `source` chain as one
/// string.
#[macro_export]
macro_rules! assert_err {
    ($result:expr, $fragment:expr) => {{
        let fragment = $fragment;
        let error = $result.unwrap_err();
        let mut message = error.to_string();
        let mut source = std::error::Error::source(&error);
        while let Some(cause) = source {
            message.push_str(": ");
            message.push_str(&cause.to_string());
            source = cause.source();
        }
        assert!(
            message.contains(fragment),
            "error {message:?} does not mention {fragment:?}"
        );
    }};
}

/// Assert the given expression matches a pattern, and evaluate an expression
/// using the bound pattern. Used to extract bound values for subsequent
/// assertions.
#[macro_export]
macro_rules! assert_matches {
    ($expr:expr, $pattern:pat $(if $condition:expr)? $(,)?) => {
        $crate::assert_matches!($expr, $pattern $(if $condition)? => ());
    };
    ($expr:expr, $pattern:pat $(if $condition:expr)? => $output:expr $(,)?) => {
        match $expr {
            $pattern $(if $condition)? => $output,
            value => panic!(
                "Unexpected value {value:?} does not match pattern {expected}",
                expected = stringify!($pattern),
            ),
        }
    };
}

/// An in-memory loader backed by a name->text map
pub(crate) struct MapLoader {
    templates: IndexMap<String, String>,
}

impl MapLoader {
    pub fn new<const N: usize>(
        templates: [(&str, &str); N],
    ) -> Self {
        Self {
            templates: templates
                .into_iter()
                .map(|(name, text)| (name.to_owned(), text.to_owned()))
                .collect(),
        }
    }
}

impl Loader for MapLoader {
    fn merge_text(
        &self,
        name: &str,
        sink: &mut dyn fmt::Write,
    ) -> Result<(), TemplateError> {
        let text = self.templates.get(name).ok_or_else(|| {
            TemplateError::NoLoader {
                name: name.to_owned(),
            }
        })?;
        sink.write_str(text)?;
        Ok(())
    }

    fn load_template(&self, name: &str) -> Result<Template, TemplateError> {
        let text = self.templates.get(name).ok_or_else(|| {
            TemplateError::NoLoader {
                name: name.to_owned(),
            }
        })?;
        Ok(Template::new(text.clone()))
    }
}
