//! Fields that are looked up by id

use std::{future::Future, marker::PhantomData, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;
use tether_common::{ConditionalSend, ConditionalSync};

use crate::{
    Data, Descriptor, Output, SchemaError, SchemaResult, Selection, check_leaf_selection,
    value_kind,
};

/// How a [relation] treats missing values and selection
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RelationOptions {
    /// A `null` id or a missing record resolves to `null` instead of failing
    pub nullable: bool,
    /// The record is loaded even when the extend query does not select it
    pub auto: bool,
}

impl RelationOptions {
    /// Allow `null`
    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    /// Load without being selected
    pub fn auto(mut self) -> Self {
        self.auto = true;
        self
    }
}

struct RelationOutput<C, F, Fut> {
    target: Arc<dyn Output<C>>,
    load: F,
    options: RelationOptions,
    future: PhantomData<fn() -> Fut>,
}

impl<C, F, Fut> RelationOutput<C, F, Fut> {
    fn id(&self, data: Data, path: &str) -> SchemaResult<Option<String>> {
        match data.into_value(path)? {
            Value::Null if self.options.nullable => Ok(None),
            Value::Null => Err(SchemaError::resolution(
                path,
                "Nullable is not allowed but null is passed as id",
            )),
            Value::String(id) => Ok(Some(id)),
            Value::Number(id) => Ok(Some(id.to_string())),
            other => Err(SchemaError::resolution(
                path,
                format!("expected an id, got {}", value_kind(&other)),
            )),
        }
    }
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<C, F, Fut> Output<C> for RelationOutput<C, F, Fut>
where
    C: ConditionalSync,
    F: Fn(String, &C) -> Fut + ConditionalSync,
    Fut: Future<Output = SchemaResult<Option<Data>>> + ConditionalSend,
{
    async fn resolve(
        &self,
        data: Data,
        path: &str,
        selection: Option<&Selection>,
        context: &C,
    ) -> SchemaResult<Option<Value>> {
        if !self.options.auto && selection.is_none() {
            return Ok(None);
        }

        let Some(id) = self.id(data, path)? else {
            return Ok(Some(Value::Null));
        };

        match (self.load)(id, context).await? {
            Some(record) => self.target.resolve(record, path, selection, context).await,
            None if self.options.nullable => Ok(Some(Value::Null)),
            None => Err(SchemaError::not_found(
                path,
                "Nullable is not allowed but no record found",
            )),
        }
    }

    fn selectable(&self) -> bool {
        true
    }

    fn check_selection(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Selection>> {
        if self.target.selectable() {
            self.target.check_selection(raw, path)
        } else {
            check_leaf_selection(raw, path)
        }
    }
}

/// A field whose value is an id (a string or a number) that `load` turns into
/// the record described by `target`.
///
/// Unless the relation is `auto` it is extendable: it is omitted unless
/// selected. The loaded record is resolved with the same selection and path.
/// `load` receives the request context, which is where a per-request
/// batching loader usually lives.
pub fn relation<C, F, Fut>(
    target: Descriptor<C>,
    load: F,
    options: RelationOptions,
) -> Descriptor<C>
where
    C: ConditionalSync + 'static,
    F: Fn(String, &C) -> Fut + ConditionalSync + 'static,
    Fut: Future<Output = SchemaResult<Option<Data>>> + ConditionalSend + 'static,
{
    let output = target.output().cloned().map(|target| {
        Arc::new(RelationOutput {
            target,
            load,
            options,
            future: PhantomData,
        }) as Arc<dyn Output<C>>
    });

    let mut description = target.description().clone();
    description.output_extendable = !options.auto;
    description.nullable = options.nullable;
    Descriptor::new(description, None, output)
}
