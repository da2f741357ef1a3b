//! Thread-safety bounds that only apply where threads exist.
//!
//! Native builds share loaders, descriptors and contexts across tokio worker
//! threads, so anything captured by a resolver must be `Send` (and usually
//! `Sync`). On `wasm32-unknown-unknown` there is a single thread, and requiring
//! those bounds would rule out perfectly good `Rc`-based contexts. Code in the
//! tether crates names [ConditionalSend] / [ConditionalSync] instead of the
//! std traits, and the bound collapses to nothing on wasm.

#[cfg(not(target_arch = "wasm32"))]
mod target {
    /// `Send` on native targets.
    pub trait ConditionalSend: Send {}
    impl<T> ConditionalSend for T where T: Send + ?Sized {}

    /// `Send + Sync` on native targets.
    pub trait ConditionalSync: Send + Sync {}
    impl<T> ConditionalSync for T where T: Send + Sync + ?Sized {}
}

#[cfg(target_arch = "wasm32")]
mod target {
    /// No bound on wasm.
    pub trait ConditionalSend {}
    impl<T> ConditionalSend for T where T: ?Sized {}

    /// No bound on wasm.
    pub trait ConditionalSync {}
    impl<T> ConditionalSync for T where T: ?Sized {}
}

pub use target::*;
