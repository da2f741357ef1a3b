#![warn(missing_docs)]

//! Light weight helpers shared by the other tether crates. Their chief
//! quality is that they paper over the differences between native and
//! `wasm32-unknown-unknown` targets, so the rest of the workspace can be
//! written once.

mod bounds;
pub use bounds::*;

mod future;
pub use future::*;
