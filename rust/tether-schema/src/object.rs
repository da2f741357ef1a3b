//! Records of named fields

use std::sync::Arc;

use async_trait::async_trait;
use futures_util::future::try_join_all;
use indexmap::IndexMap;
use serde_json::{Map, Value};
use tether_common::ConditionalSync;

use crate::{
    Data, Description, Descriptor, Input, Output, RawSelection, SchemaError, SchemaResult,
    Selection, Shape, check_leaf_selection, required, value_kind,
};

struct ObjectInput {
    fields: IndexMap<String, Arc<dyn Input>>,
}

impl Input for ObjectInput {
    fn validate(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Value>> {
        let raw = match required(raw, path)? {
            Value::Object(raw) => raw,
            other => {
                return Err(SchemaError::validation(
                    path,
                    format!("expected an object, got {}", value_kind(other)),
                ));
            }
        };

        if let Some(key) = raw.keys().find(|key| !self.fields.contains_key(*key)) {
            return Err(SchemaError::validation(
                &format!("{path}.{key}"),
                format!("unknown property \"{key}\""),
            ));
        }

        let mut validated = Map::new();
        for (key, input) in &self.fields {
            if let Some(value) = input.validate(raw.get(key), &format!("{path}.{key}"))? {
                validated.insert(key.clone(), value);
            }
        }
        Ok(Some(Value::Object(validated)))
    }
}

struct ObjectOutput<C> {
    fields: IndexMap<String, Arc<dyn Output<C>>>,
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<C> Output<C> for ObjectOutput<C>
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
        let mut record = data.into_fields(path)?;

        let resolutions = self.fields.iter().map(|(key, output)| {
            let value = record.swap_remove(key).unwrap_or_default();
            let path = format!("{path}.{key}");
            let selection = selection.and_then(|selection| selection.get(key));
            async move {
                let resolved = output.resolve(value, &path, selection, context).await?;
                Ok::<_, SchemaError>((key, resolved))
            }
        });

        let mut resolved = Map::new();
        for (key, value) in try_join_all(resolutions).await? {
            if let Some(value) = value {
                resolved.insert(key.clone(), value);
            }
        }
        Ok(Some(Value::Object(resolved)))
    }

    fn selectable(&self) -> bool {
        self.fields.values().any(|output| output.selectable())
    }

    fn check_selection(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Selection>> {
        if !self.selectable() {
            return check_leaf_selection(raw, path);
        }

        match RawSelection::classify(raw, path)? {
            RawSelection::Absent => Ok(None),
            RawSelection::Empty => Ok(Some(Selection::new())),
            RawSelection::Fields(entries) => {
                let mut selection = Selection::new();
                for (key, raw) in entries {
                    let path = format!("{path}.{key}");
                    let output = self
                        .fields
                        .get(key)
                        .filter(|output| output.selectable())
                        .ok_or_else(|| {
                            SchemaError::validation(&path, format!("unknown property \"{key}\""))
                        })?;
                    if let Some(nested) = output.check_selection(Some(raw), &path)? {
                        selection.insert(key.clone(), nested);
                    }
                }
                Ok(Some(selection))
            }
        }
    }
}

/// A record of named fields, kept in declaration order.
///
/// As input, every declared field is validated (left-out fields are only
/// accepted when they are [crate::optional]) and undeclared keys are
/// rejected. As output, all fields are resolved concurrently, each against
/// its own entry of the extend query, and omitted fields are left out of the
/// record. Only fields that can be extended are legal keys of the extend
/// query.
pub fn object<C, I, K>(fields: I) -> Descriptor<C>
where
    C: ConditionalSync + 'static,
    I: IntoIterator<Item = (K, Descriptor<C>)>,
    K: Into<String>,
{
    let fields = fields
        .into_iter()
        .map(|(key, descriptor)| (key.into(), descriptor))
        .collect::<IndexMap<String, Descriptor<C>>>();

    let description = Description::new(Shape::ObjectOf(
        fields
            .iter()
            .map(|(key, descriptor)| (key.clone(), descriptor.description().clone()))
            .collect(),
    ));

    let input = fields
        .iter()
        .map(|(key, descriptor)| Some((key.clone(), descriptor.input()?.clone())))
        .collect::<Option<IndexMap<_, _>>>()
        .map(|fields| Arc::new(ObjectInput { fields }) as Arc<dyn Input>);

    let output = fields
        .iter()
        .map(|(key, descriptor)| Some((key.clone(), descriptor.output()?.clone())))
        .collect::<Option<IndexMap<_, _>>>()
        .map(|fields| Arc::new(ObjectOutput { fields }) as Arc<dyn Output<C>>);

    Descriptor::new(description, input, output)
}
