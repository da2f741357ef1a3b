//! Homogeneous lists

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use serde_json::Value;
use tether_common::ConditionalSync;

use crate::{
    Data, Description, Descriptor, Input, Output, SchemaError, SchemaResult, Selection, Shape,
    required, value_kind,
};

/// Length bounds of an array
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ArrayOptions {
    min: Option<usize>,
    max: Option<usize>,
}

impl ArrayOptions {
    /// Require at least `min` items
    pub fn min(mut self, min: usize) -> Self {
        self.min = Some(min);
        self
    }

    /// Allow at most `max` items
    pub fn max(mut self, max: usize) -> Self {
        self.max = Some(max);
        self
    }
}

struct ArrayInput {
    item: Arc<dyn Input>,
    options: ArrayOptions,
}

impl Input for ArrayInput {
    fn validate(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Value>> {
        let items = match required(raw, path)? {
            Value::Array(items) => items,
            other => {
                return Err(SchemaError::validation(
                    path,
                    format!("expected an array, got {}", value_kind(other)),
                ));
            }
        };

        if let Some(min) = self.options.min
            && items.len() < min
        {
            return Err(SchemaError::validation(
                path,
                format!("expected at least {min} items, got {}", items.len()),
            ));
        }
        if let Some(max) = self.options.max
            && items.len() > max
        {
            return Err(SchemaError::validation(
                path,
                format!("expected at most {max} items, got {}", items.len()),
            ));
        }

        items
            .iter()
            .enumerate()
            .map(|(index, item)| {
                let value = self.item.validate(Some(item), &format!("{path}[{index}]"))?;
                Ok(value.unwrap_or(Value::Null))
            })
            .collect::<SchemaResult<Vec<_>>>()
            .map(|items| Some(Value::Array(items)))
    }
}

struct ArrayOutput<C> {
    item: Arc<dyn Output<C>>,
    extendable: bool,
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<C> Output<C> for ArrayOutput<C>
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
        if self.extendable && selection.is_none() {
            return Ok(None);
        }

        let items = data.into_items(path)?;
        let resolutions = items.into_iter().enumerate().map(|(index, item)| {
            let path = format!("{path}[{index}]");
            async move { self.item.resolve(item, &path, selection, context).await }
        });

        let resolved = try_join_all(resolutions).await?;
        Ok(Some(Value::Array(
            resolved
                .into_iter()
                .map(|item| item.unwrap_or(Value::Null))
                .collect(),
        )))
    }

    fn selectable(&self) -> bool {
        self.item.selectable()
    }

    fn check_selection(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Selection>> {
        self.item.check_selection(raw, path)
    }
}

/// A list of `item`s
pub fn array_of<C>(item: Descriptor<C>) -> Descriptor<C>
where
    C: ConditionalSync + 'static,
{
    array_of_with(item, ArrayOptions::default())
}

/// A list of `item`s with length bounds. Every item is resolved
/// concurrently against the same entry of the extend query, and the order of
/// the list is kept.
pub fn array_of_with<C>(item: Descriptor<C>, options: ArrayOptions) -> Descriptor<C>
where
    C: ConditionalSync + 'static,
{
    let extendable = item.is_extendable();
    let input = item
        .input()
        .cloned()
        .map(|item| Arc::new(ArrayInput { item, options }) as Arc<dyn Input>);
    let output = item
        .output()
        .cloned()
        .map(|item| Arc::new(ArrayOutput { item, extendable }) as Arc<dyn Output<C>>);

    let description = Description::new(Shape::ArrayOf(Box::new(item.description().clone())));
    Descriptor::new(description, input, output)
}
