//! The two capabilities a descriptor can offer

use async_trait::async_trait;
use serde_json::Value;
use tether_common::ConditionalSync;

use crate::{Data, SchemaResult, Selection, check_leaf_selection};

/// Validates raw (untrusted) input.
pub trait Input: ConditionalSync {
    /// Validate `raw`, where `None` means the value was left out entirely.
    /// Returns the validated value, or `None` if the value is legitimately
    /// absent (see [crate::optional]).
    fn validate(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Value>>;
}

/// Resolves server-side [Data] into an output tree, computing extendable
/// fields only where the [Selection] asks for them.
#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
pub trait Output<C>: ConditionalSync {
    /// Resolve `data` at `path`. `selection` is the entry of the extend query
    /// for this position, `None` when it is not selected. Returns `None` when
    /// the value must be omitted from its parent (as opposed to `null`).
    async fn resolve(
        &self,
        data: Data,
        path: &str,
        selection: Option<&Selection>,
        context: &C,
    ) -> SchemaResult<Option<Value>>;

    /// Whether this position may carry an entry in the extend query.
    fn selectable(&self) -> bool {
        false
    }

    /// Validate the raw extend query entry for this position.
    fn check_selection(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Selection>> {
        check_leaf_selection(raw, path)
    }
}
