//! User-defined leaves built from plain functions

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tether_common::ConditionalSync;

use crate::{Data, Description, Descriptor, Input, Output, SchemaResult, Selection, Shape};

struct Validator<F>(F);

impl<F> Input for Validator<F>
where
    F: Fn(Option<&Value>, &str) -> SchemaResult<Option<Value>> + ConditionalSync,
{
    fn validate(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Value>> {
        (self.0)(raw, path)
    }
}

/// An input capability backed by a validation function
pub fn validator<F>(validate: F) -> Arc<dyn Input>
where
    F: Fn(Option<&Value>, &str) -> SchemaResult<Option<Value>> + ConditionalSync + 'static,
{
    Arc::new(Validator(validate))
}

struct Resolver<F>(F);

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<C, F> Output<C> for Resolver<F>
where
    C: ConditionalSync,
    F: Fn(Value, &str) -> SchemaResult<Value> + ConditionalSync,
{
    async fn resolve(
        &self,
        data: Data,
        path: &str,
        _selection: Option<&Selection>,
        _context: &C,
    ) -> SchemaResult<Option<Value>> {
        let value = data.into_value(path)?;
        (self.0)(value, path).map(Some)
    }
}

/// An output capability backed by a function that converts the plain value
/// produced by the server into its wire form
pub fn resolver<C, F>(resolve: F) -> Arc<dyn Output<C>>
where
    C: ConditionalSync + 'static,
    F: Fn(Value, &str) -> SchemaResult<Value> + ConditionalSync + 'static,
{
    Arc::new(Resolver(resolve))
}

/// A leaf with hand-written capabilities. `definition` is an opaque
/// description of the wire type for introspection consumers.
pub fn custom<C>(
    definition: impl Into<String>,
    input: Option<Arc<dyn Input>>,
    output: Option<Arc<dyn Output<C>>>,
) -> Descriptor<C> {
    Descriptor::new(Description::new(Shape::Custom(definition.into())), input, output)
}
