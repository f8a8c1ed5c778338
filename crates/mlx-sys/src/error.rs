use libc::c_int;
use mlx_core::{DType, MlxError};

/// Failures detected by the boundary layer itself, plus engine failures.
///
/// All of them collapse to `mlx_exception` at the C surface; the message is
/// what reaches the diagnostic sink.
#[derive(thiserror::Error, Debug)]
pub enum BoundaryError {
    #[error("Invalid dtype enum: {0}")]
    InvalidDType(c_int),

    #[error("Unhandled dtype: {0}")]
    UnhandledDType(DType),

    #[error("null {0} pointer")]
    NullPointer(&'static str),

    #[error("dimension size {0} does not fit the C interface")]
    InvalidDimension(i64),

    #[error("dimension {axis} out of range for array with {ndim} dimensions")]
    AxisOutOfRange { axis: c_int, ndim: usize },

    #[error("iterator position {position} out of range for leading dimension {len}")]
    IteratorOutOfRange { position: usize, len: usize },

    #[error("cannot iterate over a 0-d array")]
    ScalarIteration,

    #[error("iterator parent array has been released")]
    ParentReleased,

    #[error("array has no primitive")]
    NoPrimitive,

    #[error(transparent)]
    Engine(#[from] MlxError),
}

pub type Result<T> = std::result::Result<T, BoundaryError>;
