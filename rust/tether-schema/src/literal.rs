//! Literal descriptors: exact values, enumerations and the unchecked `any`

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tether_common::ConditionalSync;

use crate::{
    Data, Description, Descriptor, Input, Output, SchemaError, SchemaResult, Selection, Shape,
    required,
};

#[derive(Debug, Clone)]
enum Literal {
    Exact(Value),
    OneOf(Vec<Value>),
    Any,
}

impl Literal {
    fn check(&self, value: &Value) -> Result<(), String> {
        match self {
            Literal::Exact(expected) if same(expected, value) => Ok(()),
            Literal::Exact(expected) => Err(format!("expected {expected}, got {value}")),
            Literal::OneOf(allowed) if allowed.iter().any(|allowed| same(allowed, value)) => Ok(()),
            Literal::OneOf(allowed) => {
                let allowed = allowed
                    .iter()
                    .map(Value::to_string)
                    .collect::<Vec<_>>()
                    .join(", ");
                Err(format!("expected one of {allowed}, got {value}"))
            }
            Literal::Any => Ok(()),
        }
    }

    fn shape(&self) -> Shape {
        match self {
            Literal::Exact(value) => Shape::Exact(value.clone()),
            Literal::OneOf(values) => Shape::OneOf(values.clone()),
            Literal::Any => Shape::Any,
        }
    }
}

/// Deep equality that compares numbers by value, so `1` and `1.0` are equal
fn same(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(left), Value::Number(right)) => match (left.as_i64(), right.as_i64()) {
            (Some(left), Some(right)) => left == right,
            _ => left.as_f64() == right.as_f64(),
        },
        (Value::Array(left), Value::Array(right)) => {
            left.len() == right.len() && left.iter().zip(right).all(|(left, right)| same(left, right))
        }
        (Value::Object(left), Value::Object(right)) => {
            left.len() == right.len()
                && left
                    .iter()
                    .all(|(key, left)| right.get(key).is_some_and(|right| same(left, right)))
        }
        (left, right) => left == right,
    }
}

impl Input for Literal {
    fn validate(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Value>> {
        let value = required(raw, path)?;
        self.check(value)
            .map_err(|message| SchemaError::validation(path, message))?;
        Ok(Some(value.clone()))
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<C> Output<C> for Literal
where
    C: ConditionalSync,
{
    async fn resolve(
        &self,
        data: Data,
        path: &str,
        _selection: Option<&Selection>,
        _context: &C,
    ) -> SchemaResult<Option<Value>> {
        let value = data.into_value(path)?;
        self.check(&value)
            .map_err(|message| SchemaError::resolution(path, message))?;
        Ok(Some(value))
    }
}

fn literal<C: ConditionalSync + 'static>(literal: Literal) -> Descriptor<C> {
    let description = Description::new(literal.shape());
    let literal = Arc::new(literal);
    Descriptor::new(description, Some(literal.clone()), Some(literal))
}

/// Exactly `value`
pub fn exact<C: ConditionalSync + 'static>(value: impl Into<Value>) -> Descriptor<C> {
    literal(Literal::Exact(value.into()))
}

/// Any one of `values`
pub fn one_of<C, I, V>(values: I) -> Descriptor<C>
where
    C: ConditionalSync + 'static,
    I: IntoIterator<Item = V>,
    V: Into<Value>,
{
    literal(Literal::OneOf(values.into_iter().map(Into::into).collect()))
}

/// Any present JSON value, `null` included
pub fn any<C: ConditionalSync + 'static>() -> Descriptor<C> {
    literal(Literal::Any)
}
