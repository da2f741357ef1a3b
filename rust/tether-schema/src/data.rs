//! Source values handed to output descriptors

use std::{future::Future, sync::Arc};

use indexmap::IndexMap;
use serde::Serialize;
use serde_json::{Map, Value};
use tether_common::{BoxedFuture, ConditionalSend, ConditionalSync, boxed};

use crate::{SchemaError, SchemaResult};

/// Fields of a [Data::Record], in declaration order
pub type Record = IndexMap<String, Data>;

/// Something that can compute a value on demand. Used for extendable fields,
/// whose (possibly expensive) value is only produced when selected.
pub trait Produce: ConditionalSync {
    /// Compute the value
    fn produce(&self) -> BoxedFuture<'static, SchemaResult<Data>>;
}

impl<F, Fut> Produce for F
where
    F: Fn() -> Fut + ConditionalSync,
    Fut: Future<Output = SchemaResult<Data>> + ConditionalSend + 'static,
{
    fn produce(&self) -> BoxedFuture<'static, SchemaResult<Data>> {
        boxed(self())
    }
}

/// A producer of a value that has not been computed yet
#[derive(Clone)]
pub struct Deferred(Arc<dyn Produce>);

impl Deferred {
    /// Wrap a producer
    pub fn new<F, Fut>(producer: F) -> Self
    where
        F: Fn() -> Fut + ConditionalSync + 'static,
        Fut: Future<Output = SchemaResult<Data>> + ConditionalSend + 'static,
    {
        Self(Arc::new(producer))
    }

    /// Run the producer
    pub async fn produce(&self) -> SchemaResult<Data> {
        self.0.produce().await
    }
}

impl std::fmt::Debug for Deferred {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("Deferred")
    }
}

/// The raw value an output descriptor resolves.
///
/// Handlers build a [Data] tree out of plain JSON, nested records and lists,
/// and [Deferred] producers for extendable fields. Output descriptors walk it
/// and turn it into the JSON response.
#[derive(Clone, Debug)]
pub enum Data {
    /// A plain JSON value
    Value(Value),
    /// A list of items that may themselves contain deferred values
    List(Vec<Data>),
    /// A record whose fields may themselves contain deferred values
    Record(Record),
    /// A value that will be computed only if it is selected
    Deferred(Deferred),
}

impl Default for Data {
    fn default() -> Self {
        Data::Value(Value::Null)
    }
}

impl Data {
    /// JSON `null`
    pub fn null() -> Self {
        Self::default()
    }

    /// A value computed on demand by `producer`
    pub fn deferred<F, Fut>(producer: F) -> Self
    where
        F: Fn() -> Fut + ConditionalSync + 'static,
        Fut: Future<Output = SchemaResult<Data>> + ConditionalSend + 'static,
    {
        Data::Deferred(Deferred::new(producer))
    }

    /// Serialize any value into plain JSON data
    pub fn serialized<T: Serialize>(value: &T) -> SchemaResult<Self> {
        Ok(Data::Value(serde_json::to_value(value)?))
    }

    /// Whether this is JSON `null`
    pub fn is_null(&self) -> bool {
        matches!(self, Data::Value(Value::Null))
    }

    /// Split a record (or a JSON object) into its fields.
    pub fn into_fields(self, path: &str) -> SchemaResult<Record> {
        match self {
            Data::Record(record) => Ok(record),
            Data::Value(Value::Object(map)) => Ok(map
                .into_iter()
                .map(|(key, value)| (key, Data::Value(value)))
                .collect()),
            other => Err(SchemaError::resolution(
                path,
                format!("expected an object, got {}", other.kind()),
            )),
        }
    }

    /// Split a list (or a JSON array) into its items.
    pub fn into_items(self, path: &str) -> SchemaResult<Vec<Data>> {
        match self {
            Data::List(items) => Ok(items),
            Data::Value(Value::Array(items)) => Ok(items.into_iter().map(Data::Value).collect()),
            other => Err(SchemaError::resolution(
                path,
                format!("expected an array, got {}", other.kind()),
            )),
        }
    }

    /// Convert into plain JSON. Fails if the tree still contains a deferred
    /// value, since only an extendable descriptor may run a producer.
    pub fn into_value(self, path: &str) -> SchemaResult<Value> {
        match self {
            Data::Value(value) => Ok(value),
            Data::List(items) => items
                .into_iter()
                .enumerate()
                .map(|(index, item)| item.into_value(&format!("{path}[{index}]")))
                .collect::<SchemaResult<Vec<_>>>()
                .map(Value::Array),
            Data::Record(record) => record
                .into_iter()
                .map(|(key, item)| {
                    let value = item.into_value(&format!("{path}.{key}"))?;
                    Ok((key, value))
                })
                .collect::<SchemaResult<Map<_, _>>>()
                .map(Value::Object),
            Data::Deferred(_) => Err(SchemaError::resolution(
                path,
                "deferred value found outside of an extendable field",
            )),
        }
    }

    /// A short name of the kind of value, for error messages
    pub fn kind(&self) -> &'static str {
        match self {
            Data::Value(value) => value_kind(value),
            Data::List(_) => "array",
            Data::Record(_) => "object",
            Data::Deferred(_) => "deferred value",
        }
    }
}

/// A short name of the kind of a JSON value, for error messages
pub fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

impl From<Value> for Data {
    fn from(value: Value) -> Self {
        Data::Value(value)
    }
}

impl From<&str> for Data {
    fn from(value: &str) -> Self {
        Data::Value(Value::from(value))
    }
}

impl From<String> for Data {
    fn from(value: String) -> Self {
        Data::Value(Value::from(value))
    }
}

impl From<bool> for Data {
    fn from(value: bool) -> Self {
        Data::Value(Value::from(value))
    }
}

impl From<i64> for Data {
    fn from(value: i64) -> Self {
        Data::Value(Value::from(value))
    }
}

impl From<f64> for Data {
    fn from(value: f64) -> Self {
        Data::Value(Value::from(value))
    }
}

impl From<Record> for Data {
    fn from(record: Record) -> Self {
        Data::Record(record)
    }
}

impl From<Deferred> for Data {
    fn from(deferred: Deferred) -> Self {
        Data::Deferred(deferred)
    }
}

impl<T: Into<Data>> From<Vec<T>> for Data {
    fn from(items: Vec<T>) -> Self {
        Data::List(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Data>> From<Option<T>> for Data {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or_default()
    }
}

impl<K: Into<String>, V: Into<Data>> FromIterator<(K, V)> for Data {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(fields: I) -> Self {
        Data::Record(
            fields
                .into_iter()
                .map(|(key, value)| (key.into(), value.into()))
                .collect(),
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn it_flattens_nested_records_and_lists_into_json() {
        let data = Data::from_iter([
            ("id", Data::from("u1")),
            ("tags", Data::from(vec!["a", "b"])),
            ("manager", Data::from(None::<String>)),
        ]);

        assert_eq!(
            data.into_value("output").unwrap(),
            json!({"id": "u1", "tags": ["a", "b"], "manager": null})
        );
    }

    #[test]
    fn it_refuses_to_flatten_deferred_values() {
        let data = Data::from_iter([(
            "lazy",
            Data::deferred(|| async { Ok(Data::null()) }),
        )]);

        assert_eq!(
            data.into_value("output"),
            Err(SchemaError::resolution(
                "output.lazy",
                "deferred value found outside of an extendable field"
            ))
        );
    }

    #[test]
    fn it_splits_json_objects_into_fields() {
        let fields = Data::from(json!({"a": 1, "b": [true]}))
            .into_fields("output")
            .unwrap();

        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["a", "b"]);
        assert!(matches!(fields["b"], Data::Value(Value::Array(_))));
    }

    #[test]
    fn it_reports_the_kind_of_mismatched_values() {
        let error = Data::from(42_i64).into_fields("output.user").unwrap_err();
        assert_eq!(error.to_string(), "expected an object, got number [output.user]");

        let error = Data::from("x").into_items("output.list").unwrap_err();
        assert_eq!(error.to_string(), "expected an array, got string [output.list]");
    }

    #[tokio::test]
    async fn it_runs_deferred_producers_on_demand() {
        let deferred = Deferred::new(|| async { Ok(Data::from(true)) });
        let produced = deferred.produce().await.unwrap();
        assert!(matches!(produced, Data::Value(Value::Bool(true))));
    }

    #[test]
    fn it_serializes_arbitrary_values() {
        #[derive(Serialize)]
        struct Point {
            x: i32,
            y: i32,
        }

        let data = Data::serialized(&Point { x: 1, y: 2 }).unwrap();
        assert_eq!(data.into_value("output").unwrap(), json!({"x": 1, "y": 2}));
    }
}
