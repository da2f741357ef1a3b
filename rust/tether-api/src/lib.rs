//! Tether API
//!
//! A registry of named remote procedures. Each method has an optional input
//! descriptor, an output descriptor and a handler. A call validates the raw
//! input, bounds and checks the caller's extend query, runs the handler and
//! resolves its result into the response, computing only the extendable
//! fields the extend query asks for.
//!
//! ```rust
//! use serde_json::json;
//! use tether_api::{Api, ApiError};
//! use tether_schema::{Data, extend, int, object, string};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), ApiError> {
//! let mut api: Api = Api::new();
//! api.create_method(
//!     "math.square",
//!     Some(int()),
//!     object([("value", int()), ("proof", extend(string()))]),
//!     |value: i64, _: &()| async move {
//!         Ok::<_, ApiError>(Data::from_iter([
//!             ("value", Data::from(value * value)),
//!             ("proof", Data::deferred(move || async move {
//!                 Ok(Data::from(format!("{value} * {value}")))
//!             })),
//!         ]))
//!     },
//! )?;
//!
//! let short = api.call_method("math.square", Some(&json!(4)), None, &()).await?;
//! assert_eq!(short, json!({"value": 16}));
//!
//! let long = api
//!     .call_method("math.square", Some(&json!(4)), Some(&json!({"proof": {}})), &())
//!     .await?;
//! assert_eq!(long, json!({"value": 16, "proof": "4 * 4"}));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod error;
pub use error::*;

mod config;
pub use config::*;

mod description;
pub use description::*;

mod method;

mod api;
pub use api::*;
