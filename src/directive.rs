//! Directive and block AST, and the tree-walking evaluator

use crate::{
    error::TemplateError,
    expression::{Condition, Expression, Identifier, Reference},
    loader::Loader,
    namespace::Scope,
    value::{MacroBinding, Value},
};
use std::{fmt, sync::Arc};
use tracing::{debug, trace};

/// Name of the 1-based iteration counter bound inside each `#foreach`
/// iteration
const LOOP_COUNTER: &str = "velocityCount";

/// A contiguous run of template content: text, placeholders, comments, and
/// directives, evaluated in document order
#[derive(Clone, Debug, Default, PartialEq)]
pub(crate) struct Block {
    pub elements: Vec<Element>,
}

impl Block {
    pub(crate) fn evaluate(
        &self,
        scope: &mut Scope,
        sink: &mut dyn fmt::Write,
        loader: &dyn Loader,
    ) -> Result<(), TemplateError> {
        for element in &self.elements {
            element.evaluate(scope, sink, loader)?;
        }
        Ok(())
    }
}

/// A single parsed piece of a block
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Element {
    Text(Text),
    Placeholder(Placeholder),
    Comment,
    If(IfDirective),
    Set(SetDirective),
    Foreach(ForeachDirective),
    Include(IncludeDirective),
    MacroDefinition(MacroDefinition),
    MacroCall(MacroCall),
}

impl Element {
    fn evaluate(
        &self,
        scope: &mut Scope,
        sink: &mut dyn fmt::Write,
        loader: &dyn Loader,
    ) -> Result<(), TemplateError> {
        match self {
            Self::Text(text) => Ok(sink.write_str(&text.0)?),
            Self::Placeholder(placeholder) => {
                placeholder.evaluate(scope, sink)
            }
            Self::Comment => Ok(()),
            Self::If(directive) => directive.evaluate(scope, sink, loader),
            Self::Set(directive) => directive.assignment.evaluate(scope),
            Self::Foreach(directive) => {
                directive.evaluate(scope, sink, loader)
            }
            Self::Include(directive) => {
                directive.evaluate(scope, sink, loader)
            }
            Self::MacroDefinition(directive) => directive.evaluate(scope),
            Self::MacroCall(call) => call.evaluate(scope, sink, loader),
        }
    }
}

/// Literal text, with escape sequences already reduced
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Text(pub String);

/// A `$` reference embedded in text: `$name`, `$!name`, `${name}`,
/// `$!{name}`. The raw source text is kept so an undefined reference can be
/// re-emitted verbatim.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Placeholder {
    pub reference: Reference,
    pub silent: bool,
    pub source: String,
}

impl Placeholder {
    fn evaluate(
        &self,
        scope: &mut Scope,
        sink: &mut dyn fmt::Write,
    ) -> Result<(), TemplateError> {
        let value = self.reference.evaluate(scope)?;
        if let Value::Null = value {
            if !self.silent {
                sink.write_str(&self.source)?;
            }
            Ok(())
        } else {
            Ok(sink.write_str(&value.into_string())?)
        }
    }
}

/// `#if (cond) ... [#elseif (cond) ...]* [#else ...] #end`
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct IfDirective {
    pub condition: Condition,
    pub then_block: Block,
    pub elseifs: Vec<(Condition, Block)>,
    pub else_block: Option<Block>,
}

impl IfDirective {
    fn evaluate(
        &self,
        scope: &mut Scope,
        sink: &mut dyn fmt::Write,
        loader: &dyn Loader,
    ) -> Result<(), TemplateError> {
        if self.condition.test(scope)? {
            return self.then_block.evaluate(scope, sink, loader);
        }
        for (condition, block) in &self.elseifs {
            if condition.test(scope)? {
                return block.evaluate(scope, sink, loader);
            }
        }
        match &self.else_block {
            Some(block) => block.evaluate(scope, sink, loader),
            None => Ok(()),
        }
    }
}

/// `( $name = value )`, the body of a `#set` directive
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Assignment {
    pub target: Identifier,
    pub value: Expression,
}

impl Assignment {
    fn evaluate(&self, scope: &mut Scope) -> Result<(), TemplateError> {
        let value = self.value.evaluate(scope)?;
        scope.set(self.target.as_str(), value);
        Ok(())
    }
}

/// `#set ( $name = value )`
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct SetDirective {
    pub assignment: Assignment,
}

/// `#foreach ( $var in value ) ... #end`
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct ForeachDirective {
    pub variable: Identifier,
    pub iterable: Expression,
    pub body: Block,
}

impl ForeachDirective {
    /// Run the body once per element. Each iteration gets a fresh child
    /// scope with the loop variable and counter bound, so neither is visible
    /// after the loop and nested loops cannot clobber each other.
    fn evaluate(
        &self,
        scope: &mut Scope,
        sink: &mut dyn fmt::Write,
        loader: &dyn Loader,
    ) -> Result<(), TemplateError> {
        let items = match self.iterable.evaluate(scope)? {
            Value::Array(items) => items,
            value => return Err(TemplateError::NotIterable { value }),
        };
        for (index, item) in items.into_iter().enumerate() {
            let mut iteration = scope.child();
            iteration.set(LOOP_COUNTER, Value::Integer(index as i64 + 1));
            iteration.set(self.variable.as_str(), item);
            self.body.evaluate(&mut iteration, sink, loader)?;
        }
        Ok(())
    }
}

/// The target of an `#include`: a string literal or a reference that must
/// resolve to a name
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum TemplateName {
    Literal(String),
    Reference(Reference),
}

/// `#include ( "name" )`. Asks the loader to copy the named template's raw
/// text to the sink; the text is not parsed.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct IncludeDirective {
    pub name: TemplateName,
}

impl IncludeDirective {
    fn evaluate(
        &self,
        scope: &mut Scope,
        sink: &mut dyn fmt::Write,
        loader: &dyn Loader,
    ) -> Result<(), TemplateError> {
        let name = match &self.name {
            TemplateName::Literal(name) => name.clone(),
            TemplateName::Reference(reference) => {
                match reference.evaluate(scope)? {
                    Value::String(name) => name,
                    Value::Integer(i) => i.to_string(),
                    value => {
                        return Err(TemplateError::InvalidTemplateName {
                            value,
                        });
                    }
                }
            }
        };
        debug!(name = %name, "Including template");
        loader.merge_text(&name, sink)
    }
}

/// `#macro ( name $arg... ) ... #end`. The body is behind an `Arc` so the
/// namespace binding created at evaluation time shares it with the AST.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct MacroDefinition {
    pub name: Identifier,
    pub params: Vec<Identifier>,
    pub body: Arc<Block>,
}

impl MacroDefinition {
    /// Bind the macro into the current scope under its reserved `#` key.
    /// Binding happens when the definition is evaluated, not when it is
    /// parsed, so a definition inside a skipped branch binds nothing.
    fn evaluate(&self, scope: &mut Scope) -> Result<(), TemplateError> {
        let key = macro_key(&self.name);
        if scope.contains_local(&key) {
            return Err(TemplateError::RedefinedMacro {
                name: self.name.to_string(),
            });
        }
        trace!(name = %self.name, "Defining macro");
        scope.set(
            key,
            Value::Macro(MacroBinding {
                params: self.params.clone(),
                body: Arc::clone(&self.body),
            }),
        );
        Ok(())
    }
}

/// `#name(arg arg ...)`. The name is stored lowercased; definitions bind
/// lowercased keys, so call and definition case never have to agree.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct MacroCall {
    pub name: String,
    pub arguments: Vec<Expression>,
}

impl MacroCall {
    fn evaluate(
        &self,
        scope: &mut Scope,
        sink: &mut dyn fmt::Write,
        loader: &dyn Loader,
    ) -> Result<(), TemplateError> {
        let binding = match scope.get(&macro_key(&self.name)) {
            Some(Value::Macro(binding)) => binding.clone(),
            _ => {
                return Err(TemplateError::UndefinedMacro {
                    name: self.name.clone(),
                });
            }
        };
        if self.arguments.len() != binding.params.len() {
            return Err(TemplateError::MacroArity {
                name: self.name.clone(),
                expected: binding.params.len(),
                actual: self.arguments.len(),
            });
        }
        trace!(name = %self.name, "Calling macro");

        // Arguments evaluate in the caller's scope; the body runs in a child
        // of it with the parameters bound
        let mut arguments = Vec::with_capacity(self.arguments.len());
        for argument in &self.arguments {
            arguments.push(argument.evaluate(scope)?);
        }
        let mut macro_scope = scope.child();
        for (param, value) in binding.params.iter().zip(arguments) {
            macro_scope.set(param.as_str(), value);
        }
        binding.body.evaluate(&mut macro_scope, sink, loader)
    }
}

/// Namespace key for a macro binding. The `#` prefix keeps macro names out
/// of the identifier space.
fn macro_key(name: &str) -> String {
    format!("#{}", name.to_ascii_lowercase())
}
