//! C ABI boundary over the lazy array engine.
//!
//! Every exported function takes primitive values, opaque handles and
//! output parameters, and returns an [`mlx_err`] status. Failures (engine
//! errors, invalid arguments, null pointers, panics) are caught at the
//! boundary, reported to the diagnostic sink, and turned into
//! `mlx_exception`; output parameters are only written on success.
//!
//! Handles returned through `mlx_array*` / `mlx_array_iterator*` are owned
//! by the caller and must be released exactly once with `destroyArray` /
//! `destroyArrayIterator`.

#![allow(non_camel_case_types, non_snake_case)]
#![allow(clippy::missing_safety_doc)]

pub mod config;
pub mod construct;
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod eval;
mod handles;
pub mod iterator;
pub mod ops;
pub mod properties;
mod shim;
pub mod types;

pub use construct::*;
pub use error::BoundaryError;
pub use eval::*;
pub use handles::{destroyArray, destroyArrayIterator};
pub use iterator::*;
pub use ops::*;
pub use properties::*;
pub use types::*;
