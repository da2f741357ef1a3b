#![warn(missing_docs)]

//! Batched, cached lookups for a single resolution pass.
//!
//! Resolving a list of records whose fields point at other records naively
//! issues one lookup per field: the N+1 problem. A [BatchLoader] collects the
//! keys requested while a resolution pass is busy, dispatches them to a batch
//! function in one call, and hands every caller its own record back. Results
//! are cached for the lifetime of the loader, which should match the lifetime
//! of one request.
//!
//! ```rust
//! use std::collections::HashMap;
//! use tether_loader::BatchLoader;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), String> {
//! let users = BatchLoader::new(|ids: Vec<String>| async move {
//!     Ok::<_, String>(
//!         ids.into_iter()
//!             .map(|id| (id.clone(), format!("user {id}")))
//!             .collect::<HashMap<_, _>>(),
//!     )
//! });
//!
//! let (alice, bob) = futures_util::join!(users.get("alice".into()), users.get("bob".into()));
//! assert_eq!(alice?, Some("user alice".to_string()));
//! assert_eq!(bob?, Some("user bob".to_string()));
//! # Ok(())
//! # }
//! ```

mod loader;
pub use loader::*;

mod loadable;
pub use loadable::*;
