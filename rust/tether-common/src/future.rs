use std::future::Future;

#[cfg(not(target_arch = "wasm32"))]
use futures_util::FutureExt;

/// A pinned, boxed future that is `Send` on native targets and unbounded on
/// `wasm32-unknown-unknown`, where everything runs on a single thread.
#[cfg(not(target_arch = "wasm32"))]
pub type BoxedFuture<'a, T> = futures_util::future::BoxFuture<'a, T>;

/// A pinned, boxed future that is `Send` on native targets and unbounded on
/// `wasm32-unknown-unknown`, where everything runs on a single thread.
#[cfg(target_arch = "wasm32")]
pub type BoxedFuture<'a, T> = futures_util::future::LocalBoxFuture<'a, T>;

/// Erase the type of a future into a [BoxedFuture] appropriate for the
/// current target.
#[cfg(not(target_arch = "wasm32"))]
pub fn boxed<'a, F>(future: F) -> BoxedFuture<'a, F::Output>
where
    F: Future + Send + 'a,
{
    future.boxed()
}

/// Erase the type of a future into a [BoxedFuture] appropriate for the
/// current target.
#[cfg(target_arch = "wasm32")]
pub fn boxed<'a, F>(future: F) -> BoxedFuture<'a, F::Output>
where
    F: Future + 'a,
{
    Box::pin(future)
}
