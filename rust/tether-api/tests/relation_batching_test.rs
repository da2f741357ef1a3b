use std::{collections::HashMap, sync::Arc};

use parking_lot::Mutex;
use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tether_api::{Api, ApiError};
use tether_loader::{ListLoader, Listable, Listing, Loadable};
use tether_schema::{
    Data, Entity, RelationOptions, SchemaError, array_of, extend, relation, string,
};

struct Database {
    users: HashMap<String, Value>,
    posts: Vec<Value>,
    batches: Mutex<Vec<Vec<String>>>,
    offline: bool,
}

impl Database {
    fn new() -> Self {
        Self {
            users: HashMap::from([
                ("1".to_string(), json!({"id": "1", "name": "Ada"})),
                ("2".to_string(), json!({"id": "2", "name": "Grace"})),
            ]),
            posts: vec![
                json!({"id": "p1", "title": "Notes", "author": "1"}),
                json!({"id": "p2", "title": "Compilers", "author": "2"}),
                json!({"id": "p3", "title": "Engines", "author": "1"}),
                json!({"id": "p4", "title": "Lost", "author": "3"}),
            ],
            batches: Mutex::new(Vec::new()),
            offline: false,
        }
    }

    fn posts_by(&self, author: &str) -> Vec<Value> {
        self.posts
            .iter()
            .filter(|post| post["author"] == author)
            .cloned()
            .collect()
    }
}

fn users() -> Listable<Arc<Database>, (), String, Value, SchemaError> {
    Loadable::new(|ids: Vec<String>, database: Arc<Database>| async move {
        database.batches.lock().push(ids.clone());
        if database.offline {
            return Err(SchemaError::batch_fetch("database is offline"));
        }
        Ok::<_, SchemaError>(
            ids.into_iter()
                .filter_map(|id| database.users.get(&id).map(|user| (id, user.clone())))
                .collect::<HashMap<_, _>>(),
        )
    })
    .listable(
        |_: (), database: Arc<Database>| async move {
            let mut users = database.users.values().cloned().collect::<Vec<_>>();
            users.sort_by(|left, right| left["id"].as_str().cmp(&right["id"].as_str()));
            Ok::<_, SchemaError>(Listing::new(users))
        },
        |user: &Value| user["id"].as_str().unwrap_or_default().to_string(),
    )
}

/// Everything a single call may use
struct Request {
    database: Arc<Database>,
    users: ListLoader<Arc<Database>, (), String, Value, SchemaError>,
}

impl Request {
    fn new(database: Arc<Database>) -> Self {
        Self {
            users: users().bind(database.clone()),
            database,
        }
    }
}

fn load_user(
    id: String,
    request: &Request,
) -> impl Future<Output = Result<Option<Data>, SchemaError>> + Send + use<> {
    let user = request.users.get(id);
    async move { Ok(user.await?.map(Data::from)) }
}

fn blog() -> Api<Request> {
    let mut api = Api::new();
    let user: Entity<Request> = api.create_entity("User").unwrap();
    let post: Entity<Request> = api.create_entity("Post").unwrap();

    user.attach(
        [
            ("id", string()),
            ("name", string()),
            ("posts", extend(array_of(post.descriptor()))),
        ],
        |user: Data, request: &Request| {
            let database = request.database.clone();
            async move {
                let user = user.into_value("user")?;
                let id = user["id"].as_str().unwrap_or_default().to_string();
                let mut record = Data::from(user).into_fields("user")?;
                record.insert(
                    "posts".into(),
                    Data::deferred(move || {
                        let posts = database.posts_by(&id);
                        async move { Ok(Data::from(posts)) }
                    }),
                );
                Ok::<_, SchemaError>(Data::from(record))
            }
        },
    )
    .unwrap();

    post.attach_fields([
        ("id", string()),
        ("title", string()),
        ("author", relation(user.descriptor(), load_user, RelationOptions::default())),
    ])
    .unwrap();

    api.create_method(
        "posts.list",
        None,
        array_of(post.descriptor()),
        |_: (), request: &Request| {
            let posts = request.database.posts[..3].to_vec();
            async move { Ok::<_, ApiError>(posts) }
        },
    )
    .unwrap();

    api.create_method(
        "users.list",
        None,
        array_of(user.descriptor()),
        |_: (), request: &Request| {
            let users = request.users.clone();
            async move { Ok::<_, ApiError>(users.load_list(()).await?) }
        },
    )
    .unwrap();

    api.create_method(
        "posts.all",
        None,
        array_of(post.descriptor()),
        |_: (), request: &Request| {
            let posts = request.database.posts.clone();
            async move { Ok::<_, ApiError>(posts) }
        },
    )
    .unwrap();

    api
}

#[tokio::test]
async fn it_does_not_load_unselected_relations() -> anyhow::Result<()> {
    let database = Arc::new(Database::new());
    let request = Request::new(database.clone());

    let posts = blog().call_method("posts.list", None, None, &request).await?;

    assert_eq!(
        posts,
        json!([
            {"$type": "Post", "id": "p1", "title": "Notes"},
            {"$type": "Post", "id": "p2", "title": "Compilers"},
            {"$type": "Post", "id": "p3", "title": "Engines"},
        ])
    );
    assert!(database.batches.lock().is_empty());
    Ok(())
}

#[tokio::test]
async fn it_loads_sibling_relations_in_one_batch() -> anyhow::Result<()> {
    let database = Arc::new(Database::new());
    let request = Request::new(database.clone());

    let posts = blog()
        .call_method("posts.list", None, Some(&json!({"author": {}})), &request)
        .await?;

    assert_eq!(
        posts,
        json!([
            {"$type": "Post", "id": "p1", "title": "Notes", "author": {"$type": "User", "id": "1", "name": "Ada"}},
            {"$type": "Post", "id": "p2", "title": "Compilers", "author": {"$type": "User", "id": "2", "name": "Grace"}},
            {"$type": "Post", "id": "p3", "title": "Engines", "author": {"$type": "User", "id": "1", "name": "Ada"}},
        ])
    );
    assert_eq!(
        *database.batches.lock(),
        vec![vec!["1".to_string(), "2".to_string()]]
    );
    Ok(())
}

#[tokio::test]
async fn it_reuses_loaded_records_at_deeper_levels() -> anyhow::Result<()> {
    let database = Arc::new(Database::new());
    let request = Request::new(database.clone());

    let posts = blog()
        .call_method(
            "posts.list",
            None,
            Some(&json!({"author": {"posts": {"author": {}}}})),
            &request,
        )
        .await?;

    assert_eq!(
        posts[1]["author"],
        json!({
            "$type": "User",
            "id": "2",
            "name": "Grace",
            "posts": [{
                "$type": "Post",
                "id": "p2",
                "title": "Compilers",
                "author": {"$type": "User", "id": "2", "name": "Grace"}
            }]
        })
    );
    assert_eq!(database.batches.lock().len(), 1);
    Ok(())
}

#[tokio::test]
async fn it_keeps_caches_per_request() -> anyhow::Result<()> {
    let database = Arc::new(Database::new());
    let api = blog();
    let extend = json!({"author": {}});

    let first = Request::new(database.clone());
    api.call_method("posts.list", None, Some(&extend), &first).await?;
    api.call_method("posts.list", None, Some(&extend), &first).await?;
    assert_eq!(database.batches.lock().len(), 1);

    let second = Request::new(database.clone());
    api.call_method("posts.list", None, Some(&extend), &second).await?;
    assert_eq!(database.batches.lock().len(), 2);
    Ok(())
}

#[tokio::test]
async fn it_fails_the_call_when_a_related_record_is_missing() {
    let database = Arc::new(Database::new());
    let request = Request::new(database.clone());

    let error = blog()
        .call_method("posts.all", None, Some(&json!({"author": {}})), &request)
        .await
        .unwrap_err();

    assert_eq!(
        error,
        ApiError::NotFound("Nullable is not allowed but no record found [output[3].author]".into())
    );
    assert_eq!(
        *database.batches.lock(),
        vec![vec!["1".to_string(), "2".to_string(), "3".to_string()]]
    );
}

#[tokio::test]
async fn it_fails_every_waiter_when_the_batch_fails() {
    let database = Arc::new(Database {
        offline: true,
        ..Database::new()
    });
    let request = Request::new(database.clone());

    let error = blog()
        .call_method("posts.list", None, Some(&json!({"author": {}})), &request)
        .await
        .unwrap_err();

    assert_eq!(
        error,
        ApiError::Server("Batch fetch failed: database is offline".into())
    );
    assert_eq!(database.batches.lock().len(), 1);
}

#[tokio::test]
async fn it_resolves_relations_to_listed_records_without_a_batch() -> anyhow::Result<()> {
    let database = Arc::new(Database::new());
    let request = Request::new(database.clone());

    let users = blog()
        .call_method(
            "users.list",
            None,
            Some(&json!({"posts": {"author": {}}})),
            &request,
        )
        .await?;

    assert_eq!(
        users[1],
        json!({
            "$type": "User",
            "id": "2",
            "name": "Grace",
            "posts": [{
                "$type": "Post",
                "id": "p2",
                "title": "Compilers",
                "author": {"$type": "User", "id": "2", "name": "Grace"}
            }]
        })
    );
    assert_eq!(users[0]["posts"][1]["author"]["name"], json!("Ada"));
    assert!(database.batches.lock().is_empty());
    Ok(())
}
