//! Expression AST and evaluation

use crate::{error::TemplateError, namespace::Scope, value::Value};
use derive_more::{Deref, Display};
use std::cmp::Ordering;

/// A value-producing expression: a `$reference`, an integer literal, or a
/// string literal. This is what appears in parameter lists, conditions,
/// assignments, and `#foreach` headers.
#[derive(Clone, Debug, PartialEq)]
pub(crate) enum Expression {
    Reference(Reference),
    Integer(i64),
    String(String),
}

impl Expression {
    pub(crate) fn evaluate(
        &self,
        scope: &Scope,
    ) -> Result<Value, TemplateError> {
        match self {
            Self::Reference(reference) => reference.evaluate(scope),
            Self::Integer(i) => Ok(Value::Integer(*i)),
            Self::String(s) => Ok(Value::String(s.clone())),
        }
    }
}

/// A variable reference: a name followed by zero or more `.member` accesses,
/// any of which may carry a parameter list. `$a.b(1).c` has head `a` and
/// tail `b(1)`, `c`.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Reference {
    pub head: NameOrCall,
    pub tail: Vec<NameOrCall>,
}

impl Reference {
    /// Resolve the reference against the scope. The head is looked up in the
    /// scope chain; each tail part is looked up as a member of the preceding
    /// value. A null at any step makes the whole reference null without
    /// evaluating further parts.
    pub(crate) fn evaluate(
        &self,
        scope: &Scope,
    ) -> Result<Value, TemplateError> {
        let mut value = self.head.evaluate_root(scope)?;
        for part in &self.tail {
            if let Value::Null = value {
                return Ok(Value::Null);
            }
            value = part.evaluate_member(&value, scope)?;
        }
        Ok(value)
    }
}

/// One segment of a reference: an identifier, optionally called with
/// arguments
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct NameOrCall {
    pub name: Identifier,
    pub arguments: Option<Vec<Expression>>,
}

impl NameOrCall {
    /// Evaluate as the head of a reference, against the scope chain
    fn evaluate_root(&self, scope: &Scope) -> Result<Value, TemplateError> {
        let value = scope.get(&self.name).cloned().unwrap_or(Value::Null);
        self.apply_arguments(value, scope)
    }

    /// Evaluate as a member of the preceding value. Only objects have
    /// members; anything else resolves to null.
    fn evaluate_member(
        &self,
        object: &Value,
        scope: &Scope,
    ) -> Result<Value, TemplateError> {
        let value = match object {
            Value::Object(map) => {
                map.get(self.name.as_str()).cloned().unwrap_or(Value::Null)
            }
            _ => Value::Null,
        };
        self.apply_arguments(value, scope)
    }

    /// If this segment has a parameter list, call the resolved value.
    /// Arguments always evaluate against the top-level scope, not the object
    /// being traversed. A null value is never called; it stays null.
    fn apply_arguments(
        &self,
        value: Value,
        scope: &Scope,
    ) -> Result<Value, TemplateError> {
        let Some(arguments) = &self.arguments else {
            return Ok(value);
        };
        match value {
            Value::Null => Ok(Value::Null),
            Value::Function(function) => {
                let arguments = arguments
                    .iter()
                    .map(|argument| argument.evaluate(scope))
                    .collect::<Result<Vec<_>, _>>()?;
                function.call(&arguments)
            }
            _ => Err(TemplateError::NotCallable {
                name: self.name.to_string(),
            }),
        }
    }
}

/// A parsed variable or macro name
#[derive(Clone, Debug, Deref, Display, Eq, Hash, PartialEq)]
pub(crate) struct Identifier(pub(crate) String);

/// The parenthesized condition of `#if`/`#elseif`: a value, optionally
/// compared to a second value
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct Condition {
    pub left: Expression,
    pub comparison: Option<(Comparison, Expression)>,
}

impl Condition {
    /// Evaluate the condition to a boolean. Without an operator the value's
    /// own truthiness decides.
    pub(crate) fn test(&self, scope: &Scope) -> Result<bool, TemplateError> {
        let left = self.left.evaluate(scope)?;
        match &self.comparison {
            None => Ok(left.to_bool()),
            Some((operator, right)) => {
                operator.apply(left, right.evaluate(scope)?)
            }
        }
    }
}

/// A binary comparison operator
#[derive(Clone, Copy, Debug, PartialEq)]
pub(crate) enum Comparison {
    Greater,
    GreaterEqual,
    Less,
    LessEqual,
    Equal,
    NotEqual,
}

impl Comparison {
    /// Apply the comparison. Equality is structural and defined for all
    /// values; ordering is defined for numbers and for string pairs, and is
    /// an error for anything else.
    pub(crate) fn apply(
        self,
        left: Value,
        right: Value,
    ) -> Result<bool, TemplateError> {
        match self {
            Self::Equal => return Ok(left == right),
            Self::NotEqual => return Ok(left != right),
            Self::Greater
            | Self::GreaterEqual
            | Self::Less
            | Self::LessEqual => {}
        }
        let Some(ordering) = compare(&left, &right) else {
            return Err(TemplateError::Comparison {
                operator: self.symbol(),
                left,
                right,
            });
        };
        Ok(match self {
            Self::Greater => ordering.is_gt(),
            Self::GreaterEqual => ordering.is_ge(),
            Self::Less => ordering.is_lt(),
            Self::LessEqual => ordering.is_le(),
            // Handled by the early returns above
            Self::Equal | Self::NotEqual => false,
        })
    }

    pub(crate) fn symbol(self) -> &'static str {
        match self {
            Self::Greater => ">",
            Self::GreaterEqual => ">=",
            Self::Less => "<",
            Self::LessEqual => "<=",
            Self::Equal => "==",
            Self::NotEqual => "!=",
        }
    }
}

/// Ordering between two values, where one exists. Mixed int/float pairs
/// compare numerically.
fn compare(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Integer(l), Value::Integer(r)) => Some(l.cmp(r)),
        (Value::Float(l), Value::Float(r)) => l.partial_cmp(r),
        (Value::Integer(l), Value::Float(r)) => (*l as f64).partial_cmp(r),
        (Value::Float(l), Value::Integer(r)) => l.partial_cmp(&(*r as f64)),
        (Value::String(l), Value::String(r)) => Some(l.cmp(r)),
        _ => None,
    }
}
