//! Validated extend queries

use std::collections::BTreeMap;

use serde_json::{Map, Value};

use crate::{SchemaError, SchemaResult, value_kind};

/// A validated extend query: the tree of extendable fields the caller asked
/// for. A field is selected when it has an entry, even an empty one; absence
/// means "not selected".
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Selection {
    fields: BTreeMap<String, Selection>,
}

impl Selection {
    /// An empty selection ("selected, with nothing nested")
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a selected field
    pub fn with(mut self, field: impl Into<String>, selection: Selection) -> Self {
        self.fields.insert(field.into(), selection);
        self
    }

    /// Add a selected field in place
    pub fn insert(&mut self, field: impl Into<String>, selection: Selection) {
        self.fields.insert(field.into(), selection);
    }

    /// The sub-selection of `field`, if it is selected
    pub fn get(&self, field: &str) -> Option<&Selection> {
        self.fields.get(field)
    }

    /// Whether nothing is nested in this selection
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Iterate over selected fields and their sub-selections
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Selection)> {
        self.fields.iter()
    }

    /// Convert a raw extend query into a selection without checking it
    /// against any descriptor.
    pub fn parse(raw: Option<&Value>, path: &str) -> SchemaResult<Option<Self>> {
        match RawSelection::classify(raw, path)? {
            RawSelection::Absent => Ok(None),
            RawSelection::Empty => Ok(Some(Selection::new())),
            RawSelection::Fields(fields) => {
                let mut selection = Selection::new();
                for (key, value) in fields {
                    if let Some(nested) = Selection::parse(Some(value), &format!("{path}.{key}"))? {
                        selection.insert(key.clone(), nested);
                    }
                }
                Ok(Some(selection))
            }
        }
    }

    /// Render the selection back into its wire shape
    pub fn to_value(&self) -> Value {
        Value::Object(
            self.fields
                .iter()
                .map(|(key, nested)| (key.clone(), nested.to_value()))
                .collect(),
        )
    }
}

/// How a raw extend query entry reads on the wire.
///
/// `{}` and `true` select a field with nothing nested. A missing entry,
/// `null` and `false` leave it unselected. An object with keys selects nested
/// fields. Anything else is malformed.
pub(crate) enum RawSelection<'a> {
    Absent,
    Empty,
    Fields(&'a Map<String, Value>),
}

impl<'a> RawSelection<'a> {
    pub(crate) fn classify(raw: Option<&'a Value>, path: &str) -> SchemaResult<Self> {
        match raw {
            None | Some(Value::Null) | Some(Value::Bool(false)) => Ok(RawSelection::Absent),
            Some(Value::Bool(true)) => Ok(RawSelection::Empty),
            Some(Value::Object(fields)) if fields.is_empty() => Ok(RawSelection::Empty),
            Some(Value::Object(fields)) => Ok(RawSelection::Fields(fields)),
            Some(other) => Err(SchemaError::validation(
                path,
                format!("expected an extend query object, got {}", value_kind(other)),
            )),
        }
    }
}

/// The selection check of descriptors that have nothing to select inside:
/// accepts an absent or empty selection only.
pub fn check_leaf_selection(raw: Option<&Value>, path: &str) -> SchemaResult<Option<Selection>> {
    match RawSelection::classify(raw, path)? {
        RawSelection::Absent => Ok(None),
        RawSelection::Empty => Ok(Some(Selection::new())),
        RawSelection::Fields(fields) => {
            let key = fields.keys().next().map(String::as_str).unwrap_or_default();
            Err(SchemaError::validation(
                &format!("{path}.{key}"),
                format!("\"{key}\" can not be extended"),
            ))
        }
    }
}
