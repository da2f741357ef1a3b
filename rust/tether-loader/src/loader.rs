use std::{
    collections::HashMap,
    future::Future,
    hash::Hash,
    sync::{Arc, Weak},
};

use futures_util::{
    FutureExt,
    future::{Shared, try_join_all},
};
use indexmap::IndexSet;
use parking_lot::Mutex;
use tether_common::{BoxedFuture, ConditionalSend, ConditionalSync, boxed};
use tracing::{trace, warn};

/// Bounds shared by every key a [BatchLoader] can be asked for.
pub trait LoaderKey: Eq + Hash + Clone + std::fmt::Debug + ConditionalSync + 'static {}
impl<K> LoaderKey for K where K: Eq + Hash + Clone + std::fmt::Debug + ConditionalSync + 'static {}

/// Bounds shared by records and errors produced by a batch function. Both are
/// handed out to every caller waiting on a batch, so they must be cheap to
/// clone.
pub trait LoaderOutput: Clone + ConditionalSync + 'static {}
impl<T> LoaderOutput for T where T: Clone + ConditionalSync + 'static {}

/// The pending (or settled) lookup of one key. Awaiting it yields the record,
/// `None` when the batch function did not return the key, or the batch
/// function's error.
pub type Pending<V, E> = Shared<BoxedFuture<'static, Result<Option<V>, E>>>;

type Batch<K, V, E> = Shared<BoxedFuture<'static, Result<Arc<HashMap<K, V>>, E>>>;

/// A function that fetches many records at once. Keys missing from the
/// returned map are treated as not found.
pub trait BatchFetch<K, V, E>: ConditionalSync {
    /// Fetch all of the given (already deduplicated) keys.
    fn fetch(&self, ids: Vec<K>) -> BoxedFuture<'static, Result<HashMap<K, V>, E>>;
}

impl<K, V, E, F, Fut> BatchFetch<K, V, E> for F
where
    F: Fn(Vec<K>) -> Fut + ConditionalSync,
    Fut: Future<Output = Result<HashMap<K, V>, E>> + ConditionalSend + 'static,
{
    fn fetch(&self, ids: Vec<K>) -> BoxedFuture<'static, Result<HashMap<K, V>, E>> {
        boxed(self(ids))
    }
}

/// Keys collected for a batch that has not been dispatched yet, together with
/// the shared future that will dispatch them.
struct OpenBatch<K, V, E> {
    ids: Arc<Mutex<IndexSet<K>>>,
    future: Batch<K, V, E>,
}

impl<K, V, E> Clone for OpenBatch<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            ids: self.ids.clone(),
            future: self.future.clone(),
        }
    }
}

struct State<K, V, E> {
    cache: HashMap<K, Pending<V, E>>,
    open: Option<OpenBatch<K, V, E>>,
}

/// A [BatchLoader] coalesces point lookups into batch calls and caches the
/// results.
///
/// Every [BatchLoader::get] for a key that is not cached yet joins the
/// currently open batch (opening one if there is none). The batch is
/// driven by the callers that await it. It keeps yielding until no new key
/// has joined for a few scheduler rounds, so sibling resolutions that reach
/// the loader a few polls late still share the batch. From the moment it is
/// dispatched the batch is closed and new keys open a new one. If the batch function fails, every caller waiting on that batch
/// receives the same error.
///
/// A loader must not outlive the request it was created for: nothing is ever
/// evicted except through [BatchLoader::invalidate].
pub struct BatchLoader<K, V, E> {
    fetch: Arc<dyn BatchFetch<K, V, E>>,
    state: Arc<Mutex<State<K, V, E>>>,
}

impl<K, V, E> Clone for BatchLoader<K, V, E> {
    fn clone(&self) -> Self {
        Self {
            fetch: self.fetch.clone(),
            state: self.state.clone(),
        }
    }
}

impl<K, V, E> std::fmt::Debug for BatchLoader<K, V, E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("BatchLoader")
            .field("cached", &state.cache.len())
            .field("open", &state.open.is_some())
            .finish()
    }
}

impl<K, V, E> BatchLoader<K, V, E>
where
    K: LoaderKey,
    V: LoaderOutput,
    E: LoaderOutput,
{
    /// Create a loader around a batch function that returns records keyed by
    /// id.
    pub fn new<F>(fetch: F) -> Self
    where
        F: BatchFetch<K, V, E> + 'static,
    {
        Self {
            fetch: Arc::new(fetch),
            state: Arc::new(Mutex::new(State {
                cache: HashMap::new(),
                open: None,
            })),
        }
    }

    /// Create a loader around a batch function that returns a plain list of
    /// records; each record is indexed under the key reported by `key_of`.
    pub fn keyed<F, Fut, Key>(fetch: F, key_of: Key) -> Self
    where
        F: Fn(Vec<K>) -> Fut + ConditionalSync + 'static,
        Fut: Future<Output = Result<Vec<V>, E>> + ConditionalSend + 'static,
        Key: Fn(&V) -> K + ConditionalSync + 'static,
    {
        let key_of = Arc::new(key_of);
        Self::new(move |ids: Vec<K>| {
            let records = fetch(ids);
            let key_of = key_of.clone();
            async move {
                Ok::<_, E>(
                    records
                        .await?
                        .into_iter()
                        .map(|record| (key_of(&record), record))
                        .collect::<HashMap<_, _>>(),
                )
            }
        })
    }

    /// Look up a single record. The returned future resolves from the cache
    /// when the key has been requested before; otherwise the key joins the
    /// open batch.
    pub fn get(&self, id: K) -> Pending<V, E> {
        let mut state = self.state.lock();

        if let Some(pending) = state.cache.get(&id) {
            trace!(?id, "Loader cache hit");
            return pending.clone();
        }

        let batch = match state.open.clone() {
            Some(batch) => batch,
            None => {
                let batch = self.open_batch();
                state.open = Some(batch.clone());
                batch
            }
        };
        batch.ids.lock().insert(id.clone());

        let key = id.clone();
        let pending = boxed(
            batch
                .future
                .map(move |records| records.map(|records| records.get(&key).cloned())),
        )
        .shared();

        state.cache.insert(id, pending.clone());
        pending
    }

    /// Look up several records, returned in the order of `ids`. All keys that
    /// are not cached yet are fetched in one batch.
    pub async fn get_many(&self, ids: impl IntoIterator<Item = K>) -> Result<Vec<Option<V>>, E> {
        try_join_all(ids.into_iter().map(|id| self.get(id))).await
    }

    /// Like [BatchLoader::get_many], but returns the records keyed by id.
    pub async fn get_map(
        &self,
        ids: impl IntoIterator<Item = K>,
    ) -> Result<HashMap<K, Option<V>>, E> {
        let ids = ids.into_iter().collect::<Vec<_>>();
        let records = self.get_many(ids.clone()).await?;
        Ok(ids.into_iter().zip(records).collect())
    }

    /// Dispatch the open batch now instead of waiting for one of its callers
    /// to await it. Resolves once the batch function has settled.
    pub async fn flush(&self) -> Result<(), E> {
        let open = self.state.lock().open.take();
        match open {
            Some(batch) => batch.future.await.map(|_| ()),
            None => Ok(()),
        }
    }

    /// Seed the cache with a record that is already known (or known to be
    /// missing). Subsequent lookups of `id` never reach the batch function.
    pub fn set(&self, id: K, value: Option<V>) {
        let settled = boxed(std::future::ready(Ok(value))).shared();
        self.state.lock().cache.insert(id, settled);
    }

    /// Seed the cache with many records at once, e.g. the result of a list
    /// query.
    pub fn seed(&self, records: impl IntoIterator<Item = (K, V)>) {
        for (id, record) in records {
            self.set(id, Some(record));
        }
    }

    /// Drop the cached lookup of `id`. The next [BatchLoader::get] for it
    /// joins a new batch.
    pub fn invalidate(&self, id: &K) {
        self.state.lock().cache.remove(id);
    }

    /// Drop the cached lookups of all given ids.
    pub fn invalidate_many<'a>(&self, ids: impl IntoIterator<Item = &'a K>) {
        let mut state = self.state.lock();
        for id in ids {
            state.cache.remove(id);
        }
    }

    fn open_batch(&self) -> OpenBatch<K, V, E> {
        let ids = Arc::new(Mutex::new(IndexSet::new()));
        let fetch = self.fetch.clone();
        let state = Arc::downgrade(&self.state);
        let future = boxed(dispatch(fetch, state, ids.clone())).shared();
        OpenBatch { ids, future }
    }
}

/// Rounds without a new key after which a batch is dispatched
const SETTLE_ROUNDS: usize = 4;

/// Upper bound on the rounds a batch waits for, however busy its callers are
const MAX_ROUNDS: usize = 64;

/// Yield until the keys of an open batch stop growing, so that sibling
/// resolutions which need a few polls before they reach the loader still join
/// this batch.
///
/// Every waiter on the batch may poll it, so one scheduler round can advance
/// this loop once per waiter. Budgets are therefore scaled by the number of
/// keys collected so far.
async fn settle<K>(ids: &Mutex<IndexSet<K>>) {
    let mut seen = ids.lock().len().max(1);
    let mut quiet = 0;
    let mut yields = 0;
    while quiet < SETTLE_ROUNDS * seen && yields < MAX_ROUNDS * seen {
        tokio::task::yield_now().await;
        yields += 1;

        let pending = ids.lock().len();
        if pending > seen {
            seen = pending;
            quiet = 0;
        } else {
            quiet += 1;
        }
    }
}

async fn dispatch<K, V, E>(
    fetch: Arc<dyn BatchFetch<K, V, E>>,
    state: Weak<Mutex<State<K, V, E>>>,
    ids: Arc<Mutex<IndexSet<K>>>,
) -> Result<Arc<HashMap<K, V>>, E>
where
    K: LoaderKey,
    V: LoaderOutput,
    E: LoaderOutput,
{
    settle(&ids).await;

    let ids = {
        if let Some(state) = state.upgrade() {
            let mut state = state.lock();
            if state
                .open
                .as_ref()
                .is_some_and(|open| Arc::ptr_eq(&open.ids, &ids))
            {
                state.open = None;
            }
        }
        std::mem::take(&mut *ids.lock())
            .into_iter()
            .collect::<Vec<_>>()
    };

    trace!(size = ids.len(), "Dispatching loader batch");

    match fetch.fetch(ids).await {
        Ok(records) => Ok(Arc::new(records)),
        Err(error) => {
            warn!("Loader batch failed; rejecting every key in the batch");
            Err(error)
        }
    }
}
