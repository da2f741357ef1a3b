//! Modifiers that wrap a single descriptor

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tether_common::ConditionalSync;

use crate::{Data, Descriptor, Input, Output, SchemaResult, Selection};

struct NullableInput(Arc<dyn Input>);

impl Input for NullableInput {
    fn validate(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Value>> {
        match raw {
            Some(Value::Null) => Ok(Some(Value::Null)),
            raw => self.0.validate(raw, path),
        }
    }
}

struct NullableOutput<C> {
    inner: Arc<dyn Output<C>>,
    extendable: bool,
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<C> Output<C> for NullableOutput<C>
where
    C: ConditionalSync,
{
    async fn resolve(
        &self,
        data: Data,
        path: &str,
        selection: Option<&Selection>,
        context: &C,
    ) -> SchemaResult<Option<Value>> {
        // An unselected extendable value is omitted even when it is null
        if self.extendable && selection.is_none() {
            return Ok(None);
        }
        if data.is_null() {
            return Ok(Some(Value::Null));
        }
        self.inner.resolve(data, path, selection, context).await
    }

    fn selectable(&self) -> bool {
        self.inner.selectable()
    }

    fn check_selection(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Selection>> {
        self.inner.check_selection(raw, path)
    }
}

/// Accept `null` in addition to whatever `descriptor` accepts, and resolve a
/// `null` value without consulting `descriptor`.
pub fn nullable<C>(descriptor: Descriptor<C>) -> Descriptor<C>
where
    C: ConditionalSync + 'static,
{
    let extendable = descriptor.is_extendable();
    let input = descriptor
        .input()
        .cloned()
        .map(|input| Arc::new(NullableInput(input)) as Arc<dyn Input>);
    let output = descriptor.output().cloned().map(|inner| {
        Arc::new(NullableOutput { inner, extendable }) as Arc<dyn Output<C>>
    });

    Descriptor::new(descriptor.description().clone(), input, output)
        .map_description(|description| description.nullable = true)
}

struct OptionalInput(Arc<dyn Input>);

impl Input for OptionalInput {
    fn validate(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Value>> {
        match raw {
            None => Ok(None),
            raw => self.0.validate(raw, path),
        }
    }
}

/// Let the input be left out. The result has no output capability.
pub fn optional<C>(descriptor: Descriptor<C>) -> Descriptor<C> {
    let input = descriptor
        .input()
        .cloned()
        .map(|input| Arc::new(OptionalInput(input)) as Arc<dyn Input>);

    Descriptor::new(descriptor.description().clone(), input, None)
        .map_description(|description| description.input_optional = true)
}

struct DefaultInput {
    value: Value,
    inner: Arc<dyn Input>,
}

impl Input for DefaultInput {
    fn validate(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Value>> {
        match raw {
            None => Ok(Some(self.value.clone())),
            raw => self.inner.validate(raw, path),
        }
    }
}

/// Substitute `value` when the input is left out. The default is taken as is
/// and not validated. The result has no output capability.
pub fn default_value<C>(value: impl Into<Value>, descriptor: Descriptor<C>) -> Descriptor<C> {
    let value = value.into();
    let input = descriptor
        .input()
        .cloned()
        .map(|inner| Arc::new(DefaultInput { value, inner }) as Arc<dyn Input>);

    Descriptor::new(descriptor.description().clone(), input, None)
        .map_description(|description| description.input_optional = true)
}

/// Attach documentation to `descriptor`
pub fn describe<C>(descriptor: Descriptor<C>, text: impl Into<String>) -> Descriptor<C> {
    let text = text.into();
    descriptor.map_description(|description| description.description = Some(text))
}
