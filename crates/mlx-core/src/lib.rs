//! Lazy multidimensional arrays for the MLX C boundary.
//!
//! `mlx-core` provides the foundational types (`Array`, `DType`, `Shape`,
//! `Flags`), the lazy computation graph, and a pluggable backend interface
//! with a CPU reference implementation.
//!
//! Every operation records a graph node; nothing is computed until an array
//! is evaluated.

pub mod array;
pub mod backend;
pub mod buffer;
pub mod cpu_kernels;
pub mod graph;
pub mod random;
pub mod types;

pub use array::{Array, WeakArray, live_arrays};
pub use backend::{Backend, Stream, default_stream};
pub use buffer::{Buffer, Element, bf16, f16};
pub use graph::{NodeId, OpKind, Primitive};
pub use types::{DType, Flags, Shape};

pub type Result<T> = std::result::Result<T, MlxError>;

#[derive(thiserror::Error, Debug)]
pub enum MlxError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Shape mismatch: expected {expected:?}, got {got:?}")]
    ShapeMismatch { expected: Vec<i64>, got: Vec<i64> },

    #[error("array has not been evaluated")]
    NotEvaluated,

    #[error("{op} does not support dtype {dtype}")]
    UnsupportedDType { op: &'static str, dtype: DType },

    #[error("graph error: {0}")]
    Graph(&'static str),

    #[error("failed to allocate {0} bytes")]
    Allocation(usize),
}
