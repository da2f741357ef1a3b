//! Primitive leaves: strings, numbers, booleans and UUIDs

use std::sync::Arc;

use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use tether_common::ConditionalSync;

use crate::{
    Data, Description, Descriptor, Input, Output, PrimitiveKind, SchemaError, SchemaResult,
    Selection, Shape, required, value_kind,
};

/// Constraints on a string primitive
#[derive(Debug, Clone, Default)]
pub struct StringOptions {
    min: Option<usize>,
    max: Option<usize>,
    pattern: Option<Pattern>,
}

/// A regular expression that has to match the whole string
#[derive(Debug, Clone)]
struct Pattern {
    source: String,
    whole: Regex,
}

impl StringOptions {
    /// Require at least `min` characters
    pub fn min(mut self, min: usize) -> Self {
        self.min = Some(min);
        self
    }

    /// Allow at most `max` characters
    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }

    /// Require the whole string to match the regular expression `pattern`.
    /// Fails if `pattern` is not a valid expression.
    pub fn pattern(mut self, pattern: &str) -> Result<Self, regex::Error> {
        let whole = Regex::new(&format!(r"\A(?:{pattern})\z"))?;
        self.pattern = Some(Pattern {
            source: pattern.to_string(),
            whole,
        });
        Ok(self)
    }
}

/// Inclusive bounds on a numeric primitive
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct NumberOptions<N> {
    min: Option<N>,
    max: Option<N>,
}

impl<N> NumberOptions<N> {
    /// Require at least `min`
    pub fn min(mut self, min: N) -> Self {
        self.min = Some(min);
        self
    }

    /// Allow at most `max`
    pub fn max(mut self, max: N) -> Self {
        self.max = Some(max);
        self
    }
}

impl<N: PartialOrd + std::fmt::Display + Copy> NumberOptions<N> {
    fn check(&self, number: N) -> Result<(), String> {
        if let Some(min) = self.min
            && number < min
        {
            return Err(format!("expected at least {min}, got {number}"));
        }
        if let Some(max) = self.max
            && number > max
        {
            return Err(format!("expected at most {max}, got {number}"));
        }
        Ok(())
    }
}

/// A primitive leaf together with its constraints
#[derive(Debug, Clone)]
pub enum Primitive {
    /// UTF-8 text
    String(StringOptions),
    /// Whole number
    Int(NumberOptions<i64>),
    /// Any number
    Float(NumberOptions<f64>),
    /// `true` or `false`
    Boolean,
    /// Textual UUID
    Uuid,
}

impl Primitive {
    /// The kind of leaf, without constraints
    pub fn kind(&self) -> PrimitiveKind {
        match self {
            Primitive::String(_) => PrimitiveKind::String,
            Primitive::Int(_) => PrimitiveKind::Int,
            Primitive::Float(_) => PrimitiveKind::Float,
            Primitive::Boolean => PrimitiveKind::Boolean,
            Primitive::Uuid => PrimitiveKind::Uuid,
        }
    }

    fn check(&self, value: &Value) -> Result<(), String> {
        match (self, value) {
            (Primitive::String(options), Value::String(text)) => {
                let length = text.chars().count();
                if let Some(min) = options.min
                    && length < min
                {
                    return Err(format!("expected at least {min} characters, got {length}"));
                }
                if let Some(max) = options.max
                    && length > max
                {
                    return Err(format!("expected at most {max} characters, got {length}"));
                }
                if let Some(pattern) = &options.pattern
                    && !pattern.whole.is_match(text)
                {
                    return Err(format!("expected a string matching {}", pattern.source));
                }
                Ok(())
            }
            (Primitive::Int(options), Value::Number(number)) => match whole(number) {
                Some(number) => options.check(number),
                None => Err(format!("expected an integer, got {number}")),
            },
            (Primitive::Float(options), Value::Number(number)) => match number.as_f64() {
                Some(number) => options.check(number),
                None => Err(format!("expected a float, got {number}")),
            },
            (Primitive::Boolean, Value::Bool(_)) => Ok(()),
            (Primitive::Uuid, Value::String(text)) => uuid::Uuid::parse_str(text)
                .map(|_| ())
                .map_err(|_| format!("expected a UUID, got \"{text}\"")),
            (primitive, other) => Err(format!(
                "expected {}, got {}",
                primitive.expectation(),
                value_kind(other)
            )),
        }
    }

    fn expectation(&self) -> &'static str {
        match self {
            Primitive::String(_) => "a string",
            Primitive::Int(_) => "an integer",
            Primitive::Float(_) => "a float",
            Primitive::Boolean => "a boolean",
            Primitive::Uuid => "a UUID string",
        }
    }
}

fn whole(number: &serde_json::Number) -> Option<i64> {
    if let Some(number) = number.as_i64() {
        return Some(number);
    }
    number
        .as_f64()
        .filter(|float| float.fract() == 0.0 && *float >= i64::MIN as f64 && *float <= i64::MAX as f64)
        .map(|float| float as i64)
}

impl Input for Primitive {
    fn validate(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Value>> {
        let value = required(raw, path)?;
        self.check(value)
            .map_err(|message| SchemaError::validation(path, message))?;
        Ok(Some(value.clone()))
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<C> Output<C> for Primitive
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

/// A primitive leaf. Validation enforces the kind and constraints; resolution
/// checks the same and passes the value through unchanged.
pub fn primitive<C>(primitive: Primitive) -> Descriptor<C>
where
    C: ConditionalSync + 'static,
{
    let description = Description::new(Shape::Primitive(primitive.kind()));
    let leaf = Arc::new(primitive);
    Descriptor::new(description, Some(leaf.clone()), Some(leaf))
}

/// Any string
pub fn string<C: ConditionalSync + 'static>() -> Descriptor<C> {
    primitive(Primitive::String(StringOptions::default()))
}

/// A constrained string
pub fn string_with<C: ConditionalSync + 'static>(options: StringOptions) -> Descriptor<C> {
    primitive(Primitive::String(options))
}

/// Any whole number
pub fn int<C: ConditionalSync + 'static>() -> Descriptor<C> {
    primitive(Primitive::Int(NumberOptions::default()))
}

/// A bounded whole number
pub fn int_with<C: ConditionalSync + 'static>(options: NumberOptions<i64>) -> Descriptor<C> {
    primitive(Primitive::Int(options))
}

/// Any number
pub fn float<C: ConditionalSync + 'static>() -> Descriptor<C> {
    primitive(Primitive::Float(NumberOptions::default()))
}

/// A bounded number
pub fn float_with<C: ConditionalSync + 'static>(options: NumberOptions<f64>) -> Descriptor<C> {
    primitive(Primitive::Float(options))
}

/// `true` or `false`
pub fn boolean<C: ConditionalSync + 'static>() -> Descriptor<C> {
    primitive(Primitive::Boolean)
}

/// A textual UUID
pub fn uuid<C: ConditionalSync + 'static>() -> Descriptor<C> {
    primitive(Primitive::Uuid)
}
