//! The composable type descriptor

use std::sync::Arc;

use serde_json::Value;
use tether_common::ConditionalSync;

use crate::{
    Capability, Data, Description, Input, Output, SchemaError, SchemaResult, Selection, Shape,
};

/// Root path of every output tree
pub const OUTPUT_PATH: &str = "output";

/// A composable description of a value that may know how to validate it as
/// input, how to resolve it as output, or both.
///
/// Combinators such as [crate::object] or [crate::nullable] produce a
/// descriptor with a capability exactly when all of their operands have it.
/// `C` is the request context threaded through every resolution.
pub struct Descriptor<C = ()> {
    description: Description,
    input: Option<Arc<dyn Input>>,
    output: Option<Arc<dyn Output<C>>>,
}

impl<C> Clone for Descriptor<C> {
    fn clone(&self) -> Self {
        Self {
            description: self.description.clone(),
            input: self.input.clone(),
            output: self.output.clone(),
        }
    }
}

impl<C> std::fmt::Debug for Descriptor<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Descriptor")
            .field("description", &self.description)
            .field("input", &self.input.is_some())
            .field("output", &self.output.is_some())
            .finish()
    }
}

impl<C> Descriptor<C> {
    /// Assemble a descriptor out of its metadata and capabilities
    pub fn new(
        description: Description,
        input: Option<Arc<dyn Input>>,
        output: Option<Arc<dyn Output<C>>>,
    ) -> Self {
        Self {
            description,
            input,
            output,
        }
    }

    /// Introspectable metadata
    pub fn description(&self) -> &Description {
        &self.description
    }

    /// The input capability, if any
    pub fn input(&self) -> Option<&Arc<dyn Input>> {
        self.input.as_ref()
    }

    /// The output capability, if any
    pub fn output(&self) -> Option<&Arc<dyn Output<C>>> {
        self.output.as_ref()
    }

    /// Whether the descriptor offers `capability`
    pub fn has(&self, capability: Capability) -> bool {
        match capability {
            Capability::Input => self.input.is_some(),
            Capability::Output => self.output.is_some(),
        }
    }

    /// Whether the output is omitted unless it is selected
    pub fn is_extendable(&self) -> bool {
        self.description.output_extendable
    }

    /// The same descriptor, published under `name`. Flags that affect
    /// behavior are kept; only the shape is replaced by the alias.
    pub fn aliased(&self, name: impl Into<String>) -> Self {
        self.clone()
            .map_description(|description| description.shape = Shape::Alias(name.into()))
    }

    pub(crate) fn map_description(mut self, update: impl FnOnce(&mut Description)) -> Self {
        update(&mut self.description);
        self
    }

    fn input_capability(&self) -> SchemaResult<&Arc<dyn Input>> {
        self.input.as_ref().ok_or(SchemaError::MissingCapability {
            capability: Capability::Input,
        })
    }

    fn output_capability(&self) -> SchemaResult<&Arc<dyn Output<C>>> {
        self.output.as_ref().ok_or(SchemaError::MissingCapability {
            capability: Capability::Output,
        })
    }

    /// Validate raw input
    pub fn validate(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Value>> {
        self.input_capability()?.validate(raw, path)
    }

    /// Validate a raw extend query against this descriptor
    pub fn check_selection(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Selection>> {
        self.output_capability()?.check_selection(raw, path)
    }

    /// Whether this position may carry an entry in the extend query
    pub fn selectable(&self) -> bool {
        self.output
            .as_ref()
            .is_some_and(|output| output.selectable())
    }
}

impl<C> Descriptor<C>
where
    C: ConditionalSync,
{
    /// Resolve `data` into an output tree. Returns `None` when the value is
    /// omitted because it was not selected.
    pub async fn resolve(
        &self,
        data: Data,
        path: &str,
        selection: Option<&Selection>,
        context: &C,
    ) -> SchemaResult<Option<Value>> {
        self.output_capability()?
            .resolve(data, path, selection, context)
            .await
    }

    /// Resolve a whole response rooted at [OUTPUT_PATH]. An omitted root is
    /// returned as `null`.
    pub async fn resolve_root(
        &self,
        data: Data,
        selection: Option<&Selection>,
        context: &C,
    ) -> SchemaResult<Value> {
        Ok(self
            .resolve(data, OUTPUT_PATH, selection, context)
            .await?
            .unwrap_or(Value::Null))
    }
}

/// Unwrap raw input that must be present.
pub(crate) fn required<'a>(raw: Option<&'a Value>, path: &str) -> SchemaResult<&'a Value> {
    raw.ok_or_else(|| SchemaError::validation(path, "value is required"))
}
