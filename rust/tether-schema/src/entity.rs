//! Named records that are declared first and given fields later, so that
//! entities can refer to each other (and to themselves).

use std::{
    future::Future,
    marker::PhantomData,
    sync::{Arc, OnceLock},
};

use async_trait::async_trait;
use serde_json::Value;
use tether_common::{BoxedFuture, ConditionalSend, ConditionalSync, boxed};

use crate::{
    Data, Description, Descriptor, Output, SchemaError, SchemaResult, Selection, Shape, exact,
    object,
};

/// Name of the field that carries the entity name in every resolved entity
pub const TYPE_FIELD: &str = "$type";

trait Handle<C>: ConditionalSync {
    fn handle(&self, data: Data, context: &C) -> BoxedFuture<'static, SchemaResult<Data>>;
}

struct HandleWith<F, Fut> {
    handler: F,
    future: PhantomData<fn() -> Fut>,
}

impl<C, F, Fut> Handle<C> for HandleWith<F, Fut>
where
    F: Fn(Data, &C) -> Fut + ConditionalSync,
    Fut: Future<Output = SchemaResult<Data>> + ConditionalSend + 'static,
{
    fn handle(&self, data: Data, context: &C) -> BoxedFuture<'static, SchemaResult<Data>> {
        boxed((self.handler)(data, context))
    }
}

struct Attached<C> {
    object: Descriptor<C>,
    handler: Option<Arc<dyn Handle<C>>>,
}

struct EntityState<C> {
    name: String,
    attached: OnceLock<Attached<C>>,
}

impl<C> EntityState<C> {
    fn attached(&self) -> SchemaResult<&Attached<C>> {
        self.attached.get().ok_or_else(|| SchemaError::Uninitialized {
            entity: self.name.clone(),
        })
    }
}

/// A named record type.
///
/// An entity is declared by name and can be referenced right away, while its
/// fields and resolver are attached later, exactly once. Using an entity
/// that has not been attached yet fails with [SchemaError::Uninitialized].
/// Every resolved entity carries its name under [TYPE_FIELD].
pub struct Entity<C = ()> {
    state: Arc<EntityState<C>>,
}

impl<C> Clone for Entity<C> {
    fn clone(&self) -> Self {
        Self {
            state: self.state.clone(),
        }
    }
}

impl<C> std::fmt::Debug for Entity<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Entity")
            .field("name", &self.state.name)
            .field("attached", &self.state.attached.get().is_some())
            .finish()
    }
}

impl<C> Entity<C>
where
    C: ConditionalSync + 'static,
{
    /// Declare an entity without fields
    pub fn declare(name: impl Into<String>) -> Self {
        Self {
            state: Arc::new(EntityState {
                name: name.into(),
                attached: OnceLock::new(),
            }),
        }
    }

    /// The name the entity is published under
    pub fn name(&self) -> &str {
        &self.state.name
    }

    /// Whether fields have been attached
    pub fn is_attached(&self) -> bool {
        self.state.attached.get().is_some()
    }

    /// Attach `fields` together with a `handler` that turns the source value
    /// into a record of those fields. Can only be done once.
    pub fn attach<I, K, F, Fut>(&self, fields: I, handler: F) -> SchemaResult<()>
    where
        I: IntoIterator<Item = (K, Descriptor<C>)>,
        K: Into<String>,
        F: Fn(Data, &C) -> Fut + ConditionalSync + 'static,
        Fut: Future<Output = SchemaResult<Data>> + ConditionalSend + 'static,
    {
        let handler = HandleWith {
            handler,
            future: PhantomData,
        };
        self.attach_with(fields, Some(Arc::new(handler)))
    }

    /// Attach `fields`, resolving the source value as the record itself
    pub fn attach_fields<I, K>(&self, fields: I) -> SchemaResult<()>
    where
        I: IntoIterator<Item = (K, Descriptor<C>)>,
        K: Into<String>,
    {
        self.attach_with(fields, None)
    }

    fn attach_with<I, K>(&self, fields: I, handler: Option<Arc<dyn Handle<C>>>) -> SchemaResult<()>
    where
        I: IntoIterator<Item = (K, Descriptor<C>)>,
        K: Into<String>,
    {
        let fields = std::iter::once((TYPE_FIELD.to_string(), exact(self.name())))
            .chain(fields.into_iter().map(|(key, field)| (key.into(), field)));
        let object = object(fields);

        self.state
            .attached
            .set(Attached { object, handler })
            .map_err(|_| SchemaError::AlreadyAttached {
                entity: self.state.name.clone(),
            })?;

        tracing::debug!(entity = %self.state.name, "Attached entity resolver");
        Ok(())
    }

    /// The descriptor used to reference this entity from fields and methods
    pub fn descriptor(&self) -> Descriptor<C> {
        Descriptor::new(
            Description::new(Shape::Alias(self.state.name.clone())),
            None,
            Some(Arc::new(EntityOutput {
                state: self.state.clone(),
            })),
        )
    }

    /// Metadata of the attached record, `None` before fields are attached
    pub fn object_description(&self) -> Option<Description> {
        self.state
            .attached
            .get()
            .map(|attached| attached.object.description().clone())
    }
}

struct EntityOutput<C> {
    state: Arc<EntityState<C>>,
}

#[cfg_attr(not(target_arch = "wasm32"), async_trait)]
#[cfg_attr(target_arch = "wasm32", async_trait(?Send))]
impl<C> Output<C> for EntityOutput<C>
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
        let attached = self.state.attached()?;
        let data = match &attached.handler {
            Some(handler) => handler.handle(data, context).await?,
            None => data,
        };

        let mut record = data.into_fields(path)?;
        record.insert(TYPE_FIELD.to_string(), Data::from(self.state.name.as_str()));
        attached
            .object
            .resolve(Data::Record(record), path, selection, context)
            .await
    }

    fn selectable(&self) -> bool {
        true
    }

    fn check_selection(&self, raw: Option<&Value>, path: &str) -> SchemaResult<Option<Selection>> {
        self.state.attached()?.object.check_selection(raw, path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{RelationOptions, array_of, extend, int, relation, string};
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[tokio::test]
    async fn it_fails_before_fields_are_attached() {
        let user: Entity = Entity::declare("User");
        let descriptor = user.descriptor();

        assert_eq!(
            descriptor.check_selection(None, "extend").unwrap_err(),
            SchemaError::Uninitialized {
                entity: "User".into()
            }
        );
        assert_eq!(
            descriptor
                .resolve(Data::from(json!({})), "output", None, &())
                .await
                .unwrap_err()
                .to_string(),
            "Entity \"User\" is not initialized"
        );
        assert!(!descriptor.description().output_extendable);
        assert!(user.object_description().is_none());
    }

    #[tokio::test]
    async fn it_tags_resolved_records_with_the_entity_name() -> anyhow::Result<()> {
        let user: Entity = Entity::declare("User");
        user.attach_fields([("name", string()), ("bio", extend(string()))])?;

        let resolved = user
            .descriptor()
            .resolve(
                Data::from(json!({"name": "Ada", "bio": "Mathematician"})),
                "output",
                None,
                &(),
            )
            .await?;
        assert_eq!(resolved, Some(json!({"$type": "User", "name": "Ada"})));
        Ok(())
    }

    #[tokio::test]
    async fn it_runs_the_handler_before_resolving_fields() -> anyhow::Result<()> {
        let point: Entity = Entity::declare("Point");
        point.attach(
            [("x", int()), ("y", int()), ("length", extend(int()))],
            |data: Data, _: &()| async move {
                let value = data.into_value("output")?;
                let x = value.get("x").and_then(Value::as_i64).unwrap_or_default();
                let y = value.get("y").and_then(Value::as_i64).unwrap_or_default();
                Ok::<_, SchemaError>(Data::from_iter([
                    ("x", Data::from(x)),
                    ("y", Data::from(y)),
                    ("length", Data::deferred(move || async move { Ok(Data::from(x.abs() + y.abs())) })),
                ]))
            },
        )?;

        let selection = Selection::new().with("length", Selection::new());
        let resolved = point
            .descriptor()
            .resolve_root(Data::from(json!({"x": 3, "y": -4})), Some(&selection), &())
            .await?;
        assert_eq!(resolved, json!({"$type": "Point", "x": 3, "y": -4, "length": 7}));
        Ok(())
    }

    #[test]
    fn it_attaches_only_once() {
        let user: Entity = Entity::declare("User");

        assert!(user.attach_fields([("name", string())]).is_ok());
        assert_eq!(
            user.attach_fields([("name", string())]),
            Err(SchemaError::AlreadyAttached {
                entity: "User".into()
            })
        );
        assert!(user.is_attached());
    }

    #[tokio::test]
    async fn it_supports_self_references() -> anyhow::Result<()> {
        let person: Entity = Entity::declare("Person");
        person.attach_fields([
            ("name", string()),
            (
                "friends",
                extend(array_of(relation(
                    person.descriptor(),
                    |id: String, _: &()| async move {
                        Ok(Some(Data::from(json!({"name": format!("friend {id}"), "friends": []}))))
                    },
                    RelationOptions::default().auto(),
                ))),
            ),
        ])?;

        let raw = json!({"friends": {"friends": {}}});
        let selection = person.descriptor().check_selection(Some(&raw), "extend")?;
        let resolved = person
            .descriptor()
            .resolve_root(
                Data::from(json!({"name": "Ada", "friends": ["1"]})),
                selection.as_ref(),
                &(),
            )
            .await?;

        assert_eq!(
            resolved,
            json!({
                "$type": "Person",
                "name": "Ada",
                "friends": [{"$type": "Person", "name": "friend 1", "friends": []}]
            })
        );
        Ok(())
    }

    #[test]
    fn it_describes_the_attached_record() {
        let tag: Entity = Entity::declare("Tag");
        assert_eq!(tag.descriptor().description().shape, Shape::Alias("Tag".into()));

        tag.attach_fields([("label", string())]).unwrap();
        let Some(Description {
            shape: Shape::ObjectOf(fields),
            ..
        }) = tag.object_description()
        else {
            panic!("expected an object description");
        };
        assert_eq!(fields.keys().collect::<Vec<_>>(), vec!["$type", "label"]);
    }
}
