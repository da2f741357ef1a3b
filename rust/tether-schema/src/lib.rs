//! Tether Schema
//!
//! Composable type descriptors for remote procedures. A descriptor may know
//! how to validate raw input, how to resolve an output tree, or both. Output
//! resolution is driven by a client-supplied selection tree (the "extend
//! query"): fields wrapped in [extend] or declared as non-automatic
//! [relation]s are only computed when the caller asks for them.
//!
//! ```rust
//! use serde_json::json;
//! use tether_schema::{Data, Descriptor, Selection, extend, object, string};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), tether_schema::SchemaError> {
//! let user: Descriptor = object([
//!     ("name", string()),
//!     ("bio", extend(string())),
//! ]);
//!
//! let data = Data::from_iter([
//!     ("name", Data::from("Ada")),
//!     ("bio", Data::deferred(|| async { Ok(Data::from("Wrote the first program")) })),
//! ]);
//!
//! let plain = user.resolve(data.clone(), "output", None, &()).await?;
//! assert_eq!(plain, Some(json!({"name": "Ada"})));
//!
//! let selection = Selection::new().with("bio", Selection::new());
//! let extended = user.resolve(data, "output", Some(&selection), &()).await?;
//! assert_eq!(extended, Some(json!({"name": "Ada", "bio": "Wrote the first program"})));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]

mod error;
pub use error::*;

mod data;
pub use data::*;

mod selection;
pub use selection::*;

mod description;
pub use description::*;

mod capability;
pub use capability::*;

mod descriptor;
pub use descriptor::*;

mod primitive;
pub use primitive::*;

mod literal;
pub use literal::*;

mod modifier;
pub use modifier::*;

mod array;
pub use array::*;

mod object;
pub use object::*;

mod extend;
pub use extend::*;

mod relation;
pub use relation::*;

mod entity;
pub use entity::*;

mod custom;
pub use custom::*;

mod guard;
pub use guard::*;
