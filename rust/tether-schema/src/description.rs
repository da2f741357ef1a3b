//! Introspectable metadata of descriptors

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::Value;

/// The primitive leaves
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum PrimitiveKind {
    /// UTF-8 text
    String,
    /// Whole number
    Int,
    /// Any number
    Float,
    /// `true` or `false`
    Boolean,
    /// Textual UUID
    Uuid,
}

/// The structural part of a [Description]
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum Shape {
    /// A primitive leaf
    Primitive(PrimitiveKind),
    /// Exactly one allowed value
    Exact(Value),
    /// One of a fixed set of values
    OneOf(Vec<Value>),
    /// Any JSON value
    Any,
    /// A type registered under a name
    Alias(String),
    /// A user-supplied type, described by an opaque definition
    Custom(String),
    /// A list of the described items
    ArrayOf(Box<Description>),
    /// A record of the described fields
    ObjectOf(IndexMap<String, Description>),
}

/// Metadata carried by every descriptor. It is consumed by introspection and
/// code generation; the only flag that influences resolution is
/// `output_extendable`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Description {
    /// What the value looks like
    #[serde(rename = "type")]
    pub shape: Shape,
    /// Human readable documentation
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// `null` is allowed
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub nullable: bool,
    /// The input may be left out
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub input_optional: bool,
    /// The output is omitted unless selected
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    pub output_extendable: bool,
}

impl Description {
    /// Metadata with the given shape and no flags set
    pub fn new(shape: Shape) -> Self {
        Self {
            shape,
            description: None,
            nullable: false,
            input_optional: false,
            output_extendable: false,
        }
    }
}
