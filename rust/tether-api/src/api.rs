use std::{future::Future, sync::Arc};

use indexmap::IndexMap;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tether_common::{ConditionalSend, ConditionalSync};
use tether_schema::{
    Capability, Data, Description, Descriptor, Entity, Input, Output, Selection, Shape, custom,
};
use tracing::{debug, warn};

use crate::{
    ApiConfig, ApiDescription, ApiError, MethodDescription,
    method::{HandlerFn, Method},
};

/// Root path of validated input
pub const INPUT_PATH: &str = "input";

/// Root path of the extend query
pub const EXTEND_PATH: &str = "extend";

enum NamedType<C> {
    Described(Description),
    Entity(Entity<C>),
}

impl<C> NamedType<C>
where
    C: ConditionalSync + 'static,
{
    fn description(&self) -> Description {
        match self {
            NamedType::Described(description) => description.clone(),
            NamedType::Entity(entity) => entity
                .object_description()
                .unwrap_or_else(|| Description::new(Shape::ObjectOf(IndexMap::new()))),
        }
    }
}

/// A registry of remote procedures sharing the request context `C`.
///
/// Methods, entities and named types are registered up front through `&mut`
/// access; afterwards the registry is typically shared and only used through
/// [Api::call_method].
pub struct Api<C = ()> {
    config: ApiConfig,
    methods: IndexMap<String, Method<C>>,
    types: IndexMap<String, NamedType<C>>,
}

impl<C> std::fmt::Debug for Api<C> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Api")
            .field("config", &self.config)
            .field("methods", &self.methods.keys().collect::<Vec<_>>())
            .field("types", &self.types.keys().collect::<Vec<_>>())
            .finish()
    }
}

impl<C> Default for Api<C> {
    fn default() -> Self {
        Self::with_config(ApiConfig::default())
    }
}

impl<C> Api<C> {
    /// An empty registry with default settings
    pub fn new() -> Self {
        Self::default()
    }

    /// An empty registry with the given settings
    pub fn with_config(config: ApiConfig) -> Self {
        Self {
            config,
            methods: IndexMap::new(),
            types: IndexMap::new(),
        }
    }

    /// The settings of this registry
    pub fn config(&self) -> &ApiConfig {
        &self.config
    }

    /// Whether a method is registered under `name`
    pub fn has_method(&self, name: &str) -> bool {
        self.methods.contains_key(name)
    }

    fn claim_type(&self, name: &str) -> Result<(), ApiError> {
        if self.types.contains_key(name) {
            return Err(ApiError::AlreadyDefined {
                name: name.to_string(),
            });
        }
        Ok(())
    }
}

impl<C> Api<C>
where
    C: ConditionalSync + 'static,
{
    /// Register a method.
    ///
    /// `name` is a dot delimited path such as `users.get`. The handler
    /// receives the validated input deserialized into `I` (use `()` for
    /// methods without input) and returns anything convertible into [Data],
    /// which is then resolved by `output` against the caller's extend query.
    pub fn create_method<I, O, F, Fut>(
        &mut self,
        name: impl Into<String>,
        input: Option<Descriptor<C>>,
        output: Descriptor<C>,
        handler: F,
    ) -> Result<(), ApiError>
    where
        I: DeserializeOwned + 'static,
        O: Into<Data> + 'static,
        F: Fn(I, &C) -> Fut + ConditionalSync + 'static,
        Fut: Future<Output = Result<O, ApiError>> + ConditionalSend + 'static,
    {
        let name = name.into();
        if !is_method_name(&name) {
            return Err(ApiError::InvalidDefinition {
                name,
                reason: "expected a dot delimited path of identifiers".into(),
            });
        }
        if self.methods.contains_key(&name) {
            return Err(ApiError::AlreadyDefined { name });
        }
        if !output.has(Capability::Output) {
            return Err(ApiError::InvalidDefinition {
                name,
                reason: "the output descriptor can not resolve values".into(),
            });
        }
        if input
            .as_ref()
            .is_some_and(|input| !input.has(Capability::Input))
        {
            return Err(ApiError::InvalidDefinition {
                name,
                reason: "the input descriptor can not validate values".into(),
            });
        }

        debug!(method = %name, "Registered method");
        self.methods.insert(
            name,
            Method {
                input,
                output,
                handler: Arc::new(HandlerFn::new(handler)),
            },
        );
        Ok(())
    }

    /// Declare an entity. Its fields are attached later through
    /// [Entity::attach], which lets entities refer to each other.
    pub fn create_entity(&mut self, name: impl Into<String>) -> Result<Entity<C>, ApiError> {
        let name = name.into();
        self.claim_type(&name)?;

        let entity = Entity::declare(name.clone());
        self.types.insert(name, NamedType::Entity(entity.clone()));
        Ok(entity)
    }

    /// Publish `descriptor` under `name`. The returned descriptor behaves
    /// the same but is described by reference to the name.
    pub fn create_alias(
        &mut self,
        name: impl Into<String>,
        descriptor: Descriptor<C>,
    ) -> Result<Descriptor<C>, ApiError> {
        let name = name.into();
        self.claim_type(&name)?;

        let alias = descriptor.aliased(name.clone());
        self.types
            .insert(name, NamedType::Described(descriptor.description().clone()));
        Ok(alias)
    }

    /// Publish a hand-written leaf under `name`. `definition` describes the
    /// wire type to client generators.
    pub fn create_custom_type(
        &mut self,
        name: impl Into<String>,
        definition: impl Into<String>,
        input: Option<Arc<dyn Input>>,
        output: Option<Arc<dyn Output<C>>>,
        description: Option<String>,
    ) -> Result<Descriptor<C>, ApiError> {
        let name = name.into();
        self.claim_type(&name)?;

        let descriptor = custom(definition, input, output);
        let mut published = descriptor.description().clone();
        published.description = description;

        let alias = descriptor.aliased(name.clone());
        self.types.insert(name, NamedType::Described(published));
        Ok(alias)
    }

    /// Metadata of every registered method and named type
    pub fn description(&self) -> ApiDescription {
        ApiDescription {
            types: self
                .types
                .iter()
                .map(|(name, named)| (name.clone(), named.description()))
                .collect(),
            methods: self
                .methods
                .iter()
                .map(|(name, method)| {
                    let description = MethodDescription {
                        input: method
                            .input
                            .as_ref()
                            .map(|input| input.description().clone()),
                        output: method.output.description().clone(),
                    };
                    (name.clone(), description)
                })
                .collect(),
        }
    }

    /// Call the method registered under `name`.
    ///
    /// The raw input and the raw extend query are fully checked (input
    /// validation, extend query budgets, extend query shape) before the
    /// handler runs. The handler's result is then resolved into the response,
    /// computing only the extendable fields the extend query selects.
    pub async fn call_method(
        &self,
        name: &str,
        input: Option<&Value>,
        extend: Option<&Value>,
        context: &C,
    ) -> Result<Value, ApiError> {
        let method = self
            .methods
            .get(name)
            .ok_or_else(|| ApiError::NotFound("No method found".into()))?;

        let input = match &method.input {
            Some(descriptor) => descriptor.validate(input, INPUT_PATH)?.unwrap_or(Value::Null),
            None => Value::Null,
        };
        if let (Some(guard), Some(extend)) = (&self.config.guard, extend) {
            guard.check(extend)?;
        }
        let selection = method.output.check_selection(extend, EXTEND_PATH)?;

        debug!(method = %name, extend = ?selection, "Calling method");
        let result = Self::invoke(method, input, selection, context).await;
        if let Err(error) = &result
            && error.status_code() >= 500
        {
            warn!(method = %name, %error, "Method failed");
        }
        result
    }
}

impl<C> Api<C>
where
    C: ConditionalSync,
{
    async fn invoke(
        method: &Method<C>,
        input: Value,
        selection: Option<Selection>,
        context: &C,
    ) -> Result<Value, ApiError> {
        let data = method.handler.call(input, context).await?;
        let output = method
            .output
            .resolve_root(data, selection.as_ref(), context)
            .await?;
        Ok(output)
    }
}

fn is_method_name(name: &str) -> bool {
    name.split('.').all(|segment| {
        let mut chars = segment.chars();
        chars
            .next()
            .is_some_and(|first| first.is_ascii_alphabetic() || first == '_')
            && chars.all(|rest| rest.is_ascii_alphanumeric() || rest == '_')
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde::Deserialize;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tether_schema::{GuardConfig, array_of, extend, int, object, optional, string, validator};

    #[derive(Deserialize)]
    struct Greet {
        name: String,
        times: Option<usize>,
    }

    fn greeter() -> Api {
        let mut api = Api::new();
        api.create_method(
            "greetings.say",
            Some(object([("name", string()), ("times", optional(int()))])),
            object([("text", string()), ("echo", extend(array_of(string())))]),
            |input: Greet, _: &()| async move {
                let text = format!("Hello, {}!", input.name);
                let echo = vec![text.clone(); input.times.unwrap_or(1)];
                Ok(Data::from_iter([
                    ("text", Data::from(text)),
                    ("echo", Data::from(echo)),
                ]))
            },
        )
        .unwrap();
        api
    }

    #[test]
    fn it_validates_method_names() {
        assert!(is_method_name("users"));
        assert!(is_method_name("listings.dates.list"));
        assert!(is_method_name("_internal.v2"));
        assert!(!is_method_name(""));
        assert!(!is_method_name("users."));
        assert!(!is_method_name("users..get"));
        assert!(!is_method_name("2fa.check"));
        assert!(!is_method_name("users/get"));
    }

    #[tokio::test]
    async fn it_calls_a_method() -> anyhow::Result<()> {
        let api = greeter();

        let output = api
            .call_method("greetings.say", Some(&json!({"name": "Ada"})), None, &())
            .await?;
        assert_eq!(output, json!({"text": "Hello, Ada!"}));

        let output = api
            .call_method(
                "greetings.say",
                Some(&json!({"name": "Ada", "times": 2})),
                Some(&json!({"echo": {}})),
                &(),
            )
            .await?;
        assert_eq!(
            output,
            json!({"text": "Hello, Ada!", "echo": ["Hello, Ada!", "Hello, Ada!"]})
        );
        Ok(())
    }

    #[tokio::test]
    async fn it_reports_unknown_methods() {
        let error = greeter()
            .call_method("greetings.shout", None, None, &())
            .await
            .unwrap_err();
        assert_eq!(error, ApiError::NotFound("No method found".into()));
        assert_eq!(error.status_code(), 404);
    }

    #[tokio::test]
    async fn it_does_not_run_the_handler_for_bad_requests() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let mut api = Api::with_config(ApiConfig::default().with_guard(GuardConfig {
            max_depth: 1,
            ..GuardConfig::default()
        }));
        api.create_method(
            "counter.bump",
            Some(object([("by", int())])),
            object([("total", int()), ("history", extend(array_of(int())))]),
            move |_: Value, _: &()| {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok(json!({"total": 1, "history": [1]})) }
            },
        )
        .unwrap();

        let invalid_input = api
            .call_method("counter.bump", Some(&json!({"by": "one"})), None, &())
            .await
            .unwrap_err();
        assert_eq!(
            invalid_input,
            ApiError::BadRequest("expected an integer, got string [input.by]".into())
        );

        let missing_field = api
            .call_method("counter.bump", Some(&json!({})), None, &())
            .await
            .unwrap_err();
        assert_eq!(
            missing_field,
            ApiError::BadRequest("value is required [input.by]".into())
        );
        assert_eq!(missing_field.status_code(), 400);
        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let unknown_field = api
            .call_method(
                "counter.bump",
                Some(&json!({"by": 1})),
                Some(&json!({"total": {}})),
                &(),
            )
            .await
            .unwrap_err();
        assert_eq!(
            unknown_field,
            ApiError::BadRequest("unknown property \"total\" [extend.total]".into())
        );

        let too_deep = api
            .call_method(
                "counter.bump",
                Some(&json!({"by": 1})),
                Some(&json!({"history": {"deeper": {}}})),
                &(),
            )
            .await
            .unwrap_err();
        assert_eq!(
            too_deep,
            ApiError::BadRequest("Max depth of extend query exceeded".into())
        );

        assert_eq!(calls.load(Ordering::SeqCst), 0);

        let output = api
            .call_method(
                "counter.bump",
                Some(&json!({"by": 1})),
                Some(&json!({"history": true})),
                &(),
            )
            .await
            .unwrap();
        assert_eq!(output, json!({"total": 1, "history": [1]}));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn it_passes_handler_errors_through() {
        let mut api: Api = Api::new();
        api.create_method("admin.reset", None, object([("ok", int())]), |_: (), _: &()| async {
            Err::<Value, _>(ApiError::Forbidden("Admins only".into()))
        })
        .unwrap();

        let error = api.call_method("admin.reset", None, None, &()).await.unwrap_err();
        assert_eq!(error.status_code(), 403);
        assert_eq!(error.to_string(), "Admins only");
    }

    #[test]
    fn it_rejects_duplicate_and_invalid_definitions() {
        let mut api = greeter();

        let duplicate = api.create_method("greetings.say", None, string(), |_: (), _: &()| async {
            Ok(Value::Null)
        });
        assert_eq!(
            duplicate,
            Err(ApiError::AlreadyDefined {
                name: "greetings.say".into()
            })
        );

        let input_only = api.create_method("greetings.wave", None, optional(string()), |_: (), _: &()| async {
            Ok(Value::Null)
        });
        assert!(matches!(input_only, Err(ApiError::InvalidDefinition { .. })));

        let output_only = api.create_method(
            "greetings.nod",
            Some(extend(string())),
            string(),
            |_: Value, _: &()| async { Ok(Value::Null) },
        );
        assert!(matches!(output_only, Err(ApiError::InvalidDefinition { .. })));

        api.create_entity("Greeting").unwrap();
        assert_eq!(
            api.create_alias("Greeting", string()).unwrap_err(),
            ApiError::AlreadyDefined {
                name: "Greeting".into()
            }
        );
    }

    #[test]
    fn it_describes_methods_and_types() -> anyhow::Result<()> {
        let mut api: Api = Api::new();
        let name = api.create_alias("Name", string())?;
        let seconds = api.create_custom_type(
            "Seconds",
            "number",
            Some(validator(|raw, _| Ok(raw.cloned()))),
            None,
            Some("Seconds since epoch".into()),
        )?;
        let user = api.create_entity("User")?;
        user.attach_fields([("name", name.clone())])?;
        api.create_method(
            "users.rename",
            Some(object([("name", name), ("at", seconds)])),
            user.descriptor(),
            |_: Value, _: &()| async { Ok(json!({"name": "Ada"})) },
        )?;

        let description = serde_json::to_value(api.description())?;
        assert_eq!(
            description,
            json!({
                "types": {
                    "Name": {"type": {"primitive": "string"}},
                    "Seconds": {"type": {"custom": "number"}, "description": "Seconds since epoch"},
                    "User": {"type": {"objectOf": {
                        "$type": {"type": {"exact": "User"}},
                        "name": {"type": {"alias": "Name"}}
                    }}}
                },
                "methods": {
                    "users.rename": {
                        "input": {"type": {"objectOf": {
                            "name": {"type": {"alias": "Name"}},
                            "at": {"type": {"alias": "Seconds"}}
                        }}},
                        "output": {"type": {"alias": "User"}}
                    }
                }
            })
        );
        Ok(())
    }
}
