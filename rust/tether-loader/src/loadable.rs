use std::{collections::HashMap, future::Future, ops::Deref, sync::Arc};

use tether_common::{BoxedFuture, ConditionalSend, ConditionalSync, boxed};

use crate::{BatchLoader, LoaderKey, LoaderOutput};

/// A batch function that also receives the context of the request it is
/// fetching for.
pub trait ContextFetch<C, K, V, E>: ConditionalSync {
    /// Fetch all of the given keys on behalf of `context`.
    fn fetch(&self, ids: Vec<K>, context: C) -> BoxedFuture<'static, Result<HashMap<K, V>, E>>;
}

impl<C, K, V, E, F, Fut> ContextFetch<C, K, V, E> for F
where
    F: Fn(Vec<K>, C) -> Fut + ConditionalSync,
    Fut: Future<Output = Result<HashMap<K, V>, E>> + ConditionalSend + 'static,
{
    fn fetch(&self, ids: Vec<K>, context: C) -> BoxedFuture<'static, Result<HashMap<K, V>, E>> {
        boxed(self(ids, context))
    }
}

/// A reusable description of how to batch-load one kind of record.
///
/// A [Loadable] is defined once (typically next to the data access code) and
/// bound to a request context whenever a request starts. Each binding yields a
/// fresh [BatchLoader] with its own cache, so lookups made for one request are
/// never visible to another.
pub struct Loadable<C, K, V, E> {
    fetch: Arc<dyn ContextFetch<C, K, V, E>>,
}

impl<C, K, V, E> Clone for Loadable<C, K, V, E> {
    fn clone(&self) -> Self {
        Self {
            fetch: self.fetch.clone(),
        }
    }
}

impl<C, K, V, E> Loadable<C, K, V, E>
where
    C: Clone + ConditionalSync + 'static,
    K: LoaderKey,
    V: LoaderOutput,
    E: LoaderOutput,
{
    /// Define a loadable around a context-aware batch function.
    pub fn new<F>(fetch: F) -> Self
    where
        F: ContextFetch<C, K, V, E> + 'static,
    {
        Self {
            fetch: Arc::new(fetch),
        }
    }

    /// Create the per-request loader for `context`.
    pub fn bind(&self, context: C) -> BatchLoader<K, V, E> {
        let fetch = self.fetch.clone();
        BatchLoader::new(move |ids: Vec<K>| fetch.fetch(ids, context.clone()))
    }
}

/// A page of records returned by a list query, along with whatever the query
/// reports about the page as a whole (totals, cursors).
#[derive(Debug, Clone, PartialEq)]
pub struct Listing<V, M = ()> {
    /// The records on this page.
    pub items: Vec<V>,
    /// Page-level metadata.
    pub meta: M,
}

impl<V> Listing<V> {
    /// A listing without metadata.
    pub fn new(items: Vec<V>) -> Self {
        Self { items, meta: () }
    }
}

impl<V, M> Listing<V, M> {
    /// A listing carrying `meta`.
    pub fn with_meta(items: Vec<V>, meta: M) -> Self {
        Self { items, meta }
    }
}

/// A list query that receives the context of the request it runs for.
pub trait ListFetch<C, Filter, V, M, E>: ConditionalSync {
    /// Fetch the records matching `filter` on behalf of `context`.
    fn list(&self, filter: Filter, context: C) -> BoxedFuture<'static, Result<Listing<V, M>, E>>;
}

impl<C, Filter, V, M, E, F, Fut> ListFetch<C, Filter, V, M, E> for F
where
    F: Fn(Filter, C) -> Fut + ConditionalSync,
    Fut: Future<Output = Result<Listing<V, M>, E>> + ConditionalSend + 'static,
{
    fn list(&self, filter: Filter, context: C) -> BoxedFuture<'static, Result<Listing<V, M>, E>> {
        boxed(self(filter, context))
    }
}

/// Reports the key a record is cached under.
pub trait KeyOf<K, V>: ConditionalSync {
    /// The key of `record`.
    fn key_of(&self, record: &V) -> K;
}

impl<K, V, F> KeyOf<K, V> for F
where
    F: Fn(&V) -> K + ConditionalSync,
{
    fn key_of(&self, record: &V) -> K {
        self(record)
    }
}

/// A [Loadable] that can also list records. Every listed record is seeded into
/// the bound loader, so resolving a relation to it afterwards never reaches
/// the batch function.
pub struct Listable<C, Filter, K, V, E, M = ()> {
    loadable: Loadable<C, K, V, E>,
    list: Arc<dyn ListFetch<C, Filter, V, M, E>>,
    key_of: Arc<dyn KeyOf<K, V>>,
}

impl<C, Filter, K, V, E, M> Clone for Listable<C, Filter, K, V, E, M> {
    fn clone(&self) -> Self {
        Self {
            loadable: self.loadable.clone(),
            list: self.list.clone(),
            key_of: self.key_of.clone(),
        }
    }
}

impl<C, K, V, E> Loadable<C, K, V, E>
where
    C: Clone + ConditionalSync + 'static,
    K: LoaderKey,
    V: LoaderOutput,
    E: LoaderOutput,
{
    /// Add a list query to this loadable. `key_of` reports the key each listed
    /// record is cached under.
    pub fn listable<Filter, M, L, Key>(self, list: L, key_of: Key) -> Listable<C, Filter, K, V, E, M>
    where
        L: ListFetch<C, Filter, V, M, E> + 'static,
        Key: KeyOf<K, V> + 'static,
    {
        Listable {
            loadable: self,
            list: Arc::new(list),
            key_of: Arc::new(key_of),
        }
    }
}

impl<C, Filter, K, V, E, M> Listable<C, Filter, K, V, E, M>
where
    C: Clone + ConditionalSync + 'static,
    K: LoaderKey,
    V: LoaderOutput,
    E: LoaderOutput,
{
    /// Create the per-request loader for `context`.
    pub fn bind(&self, context: C) -> ListLoader<C, Filter, K, V, E, M> {
        ListLoader {
            loader: self.loadable.bind(context.clone()),
            list: self.list.clone(),
            key_of: self.key_of.clone(),
            context,
        }
    }
}

/// A [BatchLoader] bound to a request, together with the list query of its
/// [Listable]. Dereferences to the underlying loader.
pub struct ListLoader<C, Filter, K, V, E, M = ()> {
    loader: BatchLoader<K, V, E>,
    list: Arc<dyn ListFetch<C, Filter, V, M, E>>,
    key_of: Arc<dyn KeyOf<K, V>>,
    context: C,
}

impl<C: Clone, Filter, K, V, E, M> Clone for ListLoader<C, Filter, K, V, E, M> {
    fn clone(&self) -> Self {
        Self {
            loader: self.loader.clone(),
            list: self.list.clone(),
            key_of: self.key_of.clone(),
            context: self.context.clone(),
        }
    }
}

impl<C, Filter, K, V, E, M> ListLoader<C, Filter, K, V, E, M>
where
    C: Clone + ConditionalSync + 'static,
    K: LoaderKey,
    V: LoaderOutput,
    E: LoaderOutput,
{
    /// The loader that listed records are seeded into.
    pub fn loader(&self) -> &BatchLoader<K, V, E> {
        &self.loader
    }

    /// Run the list query and seed the loader with every returned record.
    pub async fn load_list_with_meta(&self, filter: Filter) -> Result<Listing<V, M>, E> {
        let listing = self.list.list(filter, self.context.clone()).await?;
        tracing::trace!(count = listing.items.len(), "seeding listed records");
        self.loader.seed(
            listing
                .items
                .iter()
                .map(|record| (self.key_of.key_of(record), record.clone())),
        );
        Ok(listing)
    }

    /// Like [ListLoader::load_list_with_meta], keeping only the records.
    pub async fn load_list(&self, filter: Filter) -> Result<Vec<V>, E> {
        Ok(self.load_list_with_meta(filter).await?.items)
    }
}

impl<C, Filter, K, V, E, M> Deref for ListLoader<C, Filter, K, V, E, M> {
    type Target = BatchLoader<K, V, E>;

    fn deref(&self) -> &Self::Target {
        &self.loader
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;

    #[derive(Clone)]
    struct Request {
        tenant: &'static str,
        log: Arc<Mutex<Vec<(&'static str, Vec<u32>)>>>,
    }

    fn numbers() -> Loadable<Request, u32, String, String> {
        Loadable::new(|ids: Vec<u32>, request: Request| async move {
            request.log.lock().push((request.tenant, ids.clone()));
            Ok::<_, String>(
                ids.into_iter()
                    .map(|id| (id, format!("{}:{id}", request.tenant)))
                    .collect::<HashMap<_, _>>(),
            )
        })
    }

    #[tokio::test]
    async fn it_passes_the_bound_context_to_the_batch_function() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let loader = numbers().bind(Request {
            tenant: "acme",
            log: log.clone(),
        });

        assert_eq!(loader.get(7).await, Ok(Some("acme:7".to_string())));
        assert_eq!(*log.lock(), vec![("acme", vec![7])]);
    }

    #[tokio::test]
    async fn it_never_shares_a_cache_between_bindings() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let numbers = numbers();
        let first = numbers.bind(Request {
            tenant: "first",
            log: log.clone(),
        });
        let second = numbers.bind(Request {
            tenant: "second",
            log: log.clone(),
        });

        assert_eq!(first.get(1).await, Ok(Some("first:1".to_string())));
        assert_eq!(second.get(1).await, Ok(Some("second:1".to_string())));
        assert_eq!(first.get(1).await, Ok(Some("first:1".to_string())));

        assert_eq!(
            *log.lock(),
            vec![("first", vec![1]), ("second", vec![1])]
        );
    }

    #[derive(Debug, Clone, PartialEq)]
    struct Venue {
        id: u32,
        city: &'static str,
    }

    fn venues(calls: Arc<Mutex<Vec<Vec<u32>>>>) -> Listable<(), &'static str, u32, Venue, String, usize> {
        Loadable::new(move |ids: Vec<u32>, _: ()| {
            calls.lock().push(ids.clone());
            async move {
                Ok::<_, String>(
                    ids.into_iter()
                        .map(|id| (id, Venue { id, city: "Gdansk" }))
                        .collect::<HashMap<_, _>>(),
                )
            }
        })
        .listable(
            |city: &'static str, _: ()| async move {
                let items = match city {
                    "Krakow" => vec![Venue { id: 1, city }, Venue { id: 2, city }],
                    _ => vec![],
                };
                let total = items.len();
                Ok::<_, String>(Listing::with_meta(items, total))
            },
            |venue: &Venue| venue.id,
        )
    }

    #[tokio::test]
    async fn it_serves_listed_records_from_the_cache() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let loader = venues(calls.clone()).bind(());

        let listed = loader.load_list("Krakow").await;
        assert_eq!(
            listed,
            Ok(vec![
                Venue { id: 1, city: "Krakow" },
                Venue { id: 2, city: "Krakow" }
            ])
        );

        assert_eq!(
            loader.get(2).await,
            Ok(Some(Venue { id: 2, city: "Krakow" }))
        );
        assert_eq!(
            loader.loader().get_many([1, 2]).await.map(|found| found.len()),
            Ok(2)
        );
        assert!(calls.lock().is_empty());

        assert_eq!(
            loader.get(3).await,
            Ok(Some(Venue { id: 3, city: "Gdansk" }))
        );
        assert_eq!(*calls.lock(), vec![vec![3]]);
    }

    #[tokio::test]
    async fn it_returns_list_metadata() {
        let calls = Arc::new(Mutex::new(Vec::new()));
        let loader = venues(calls.clone()).bind(());

        let listing = loader.load_list_with_meta("Krakow").await;
        assert_eq!(listing.map(|listing| listing.meta), Ok(2));

        let empty = loader.load_list_with_meta("Torun").await;
        assert_eq!(empty, Ok(Listing::with_meta(vec![], 0)));
        assert!(calls.lock().is_empty());
    }
}
