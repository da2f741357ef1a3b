use indexmap::IndexMap;
use serde::Serialize;
use tether_schema::Description;

/// Introspectable summary of a registered method
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodDescription {
    /// Metadata of the input descriptor, if the method takes input
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<Description>,
    /// Metadata of the output descriptor
    pub output: Description,
}

/// Introspectable summary of an [crate::Api], consumed by documentation and
/// client generators
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ApiDescription {
    /// Named types (aliases, entities and custom types)
    pub types: IndexMap<String, Description>,
    /// Methods by name
    pub methods: IndexMap<String, MethodDescription>,
}
