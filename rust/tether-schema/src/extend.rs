//! Extendable fields

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tether_common::ConditionalSync;

use crate::{Data, Descriptor, Output, SchemaResult, Selection, check_leaf_selection};

struct Extend<C> {
    inner: Arc<dyn Output<C>>,
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<C> Output<C> for Extend<C>
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
        if selection.is_none() {
            return Ok(None);
        }
        let data = match data {
            Data::Deferred(deferred) => deferred.produce().await?,
            data => data,
        };
        self.inner.resolve(data, path, selection, context).await
    }

    fn selectable(&self) -> bool {
        true
    }

    fn check_selection(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Selection>> {
        if self.inner.selectable() {
            self.inner.check_selection(raw, path)
        } else {
            check_leaf_selection(raw, path)
        }
    }
}

/// Make `descriptor` an extendable output: it is omitted unless the extend
/// query selects it. When selected, a [Data::Deferred] value is produced
/// first and then resolved by `descriptor`; plain values are resolved as
/// they are. The result has no input capability.
pub fn extend<C>(descriptor: Descriptor<C>) -> Descriptor<C>
where
    C: ConditionalSync + 'static,
{
    let output = descriptor
        .output()
        .cloned()
        .map(|inner| Arc::new(Extend { inner }) as Arc<dyn Output<C>>);

    Descriptor::new(descriptor.description().clone(), None, output)
        .map_description(|description| description.output_extendable = true)
}
