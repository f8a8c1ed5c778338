//! C-visible types: status code, dtype enumeration, flags, opaque handles.

use libc::c_int;

/// Status code returned by every fallible entry point.
#[repr(C)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum mlx_err {
    mlx_success = 0,
    mlx_exception = 1,
}

impl mlx_err {
    pub fn is_success(self) -> bool {
        self == mlx_err::mlx_success
    }
}

/// Scalar element kind as passed by the caller.
///
/// Kept as a transparent `int` rather than a Rust enum: callers may pass
/// any integer, and out-of-range values must be rejected, not trusted.
#[repr(transparent)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct mlx_dtype(pub c_int);

impl mlx_dtype {
    pub const BOOL: mlx_dtype = mlx_dtype(0);
    pub const UINT8: mlx_dtype = mlx_dtype(1);
    pub const UINT16: mlx_dtype = mlx_dtype(2);
    pub const UINT32: mlx_dtype = mlx_dtype(3);
    pub const UINT64: mlx_dtype = mlx_dtype(4);
    pub const INT8: mlx_dtype = mlx_dtype(5);
    pub const INT16: mlx_dtype = mlx_dtype(6);
    pub const INT32: mlx_dtype = mlx_dtype(7);
    pub const INT64: mlx_dtype = mlx_dtype(8);
    pub const FLOAT16: mlx_dtype = mlx_dtype(9);
    pub const FLOAT32: mlx_dtype = mlx_dtype(10);
    pub const BFLOAT16: mlx_dtype = mlx_dtype(11);
    /// Reserved; always rejected.
    pub const COMPLEX64: mlx_dtype = mlx_dtype(12);
}

/// Contiguity flags snapshot.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct mlx_array_flags {
    pub contiguous: bool,
    pub row_contiguous: bool,
    pub col_contiguous: bool,
}

impl From<mlx_core::Flags> for mlx_array_flags {
    fn from(flags: mlx_core::Flags) -> Self {
        Self {
            contiguous: flags.contiguous,
            row_contiguous: flags.row_contiguous,
            col_contiguous: flags.col_contiguous,
        }
    }
}

// ── Opaque handle types ─────────────────────────────────────────────────

/// Opaque array handle target.
#[repr(C)]
pub struct mlx_array_t {
    _private: [u8; 0],
}

/// Opaque iterator handle target.
#[repr(C)]
pub struct mlx_array_iterator_t {
    _private: [u8; 0],
}

/// Opaque primitive reference target.
#[repr(C)]
pub struct mlx_primitive_t {
    _private: [u8; 0],
}

pub type mlx_array = *mut mlx_array_t;
pub type mlx_array_iterator = *mut mlx_array_iterator_t;
pub type mlx_primitive = *mut mlx_primitive_t;
