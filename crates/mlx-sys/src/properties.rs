//! Property surface: read-only queries over an array handle.

use std::ffi::c_void;

use libc::{c_int, size_t};

use crate::dispatch::{ScalarKind, kind_of};
use crate::error::BoundaryError;
use crate::handles::{array_ref, out_param, write_out};
use crate::shim::guard;
use crate::types::{mlx_array, mlx_array_flags, mlx_dtype, mlx_err};

/// Element byte width.
///
/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn itemsize(res: *mut size_t, arr: mlx_array) -> mlx_err {
    guard("itemsize", || {
        let handle = unsafe { array_ref(arr) }?;
        unsafe { write_out(res, handle.array.itemsize()) }
    })
}

/// Element count.
///
/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn size(res: *mut size_t, arr: mlx_array) -> mlx_err {
    guard("size", || {
        let handle = unsafe { array_ref(arr) }?;
        unsafe { write_out(res, handle.array.size()) }
    })
}

/// Total byte count (`size * itemsize`).
///
/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nbytes(res: *mut size_t, arr: mlx_array) -> mlx_err {
    guard("nbytes", || {
        let handle = unsafe { array_ref(arr) }?;
        unsafe { write_out(res, handle.array.nbytes()) }
    })
}

/// Number of dimensions.
///
/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn ndim(res: *mut size_t, arr: mlx_array) -> mlx_err {
    guard("ndim", || {
        let handle = unsafe { array_ref(arr) }?;
        unsafe { write_out(res, handle.array.ndim()) }
    })
}

/// Pointer to `ndim` `int` dimensions, owned by the handle.
///
/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn shape(res: *mut *mut c_void, arr: mlx_array) -> mlx_err {
    guard("shape", || {
        let handle = unsafe { array_ref(arr) }?;
        let dims = handle.dims().as_ptr().cast_mut().cast::<c_void>();
        unsafe { write_out(res, dims) }
    })
}

/// Size of one dimension. Negative indices count from the last axis.
///
/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dim(res: *mut c_int, dimension: c_int, arr: mlx_array) -> mlx_err {
    guard("dim", || {
        let handle = unsafe { array_ref(arr) }?;
        let size = handle
            .array
            .shape()
            .dim(dimension)
            .ok_or(BoundaryError::AxisOutOfRange {
                axis: dimension,
                ndim: handle.array.ndim(),
            })?;
        let size = c_int::try_from(size).map_err(|_| BoundaryError::InvalidDimension(size))?;
        unsafe { write_out(res, size) }
    })
}

/// Pointer to `ndim` byte strides, owned by the handle; `stride_len`
/// receives `ndim`.
///
/// # Safety
/// `res` and `stride_len` must be null or writable; `arr` must be null or a
/// live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn strides(
    res: *mut *mut c_void,
    stride_len: *mut size_t,
    arr: mlx_array,
) -> mlx_err {
    guard("strides", || {
        let handle = unsafe { array_ref(arr) }?;
        let res = out_param(res)?;
        let stride_len = out_param(stride_len)?;
        let strides = handle.array.strides();
        unsafe {
            res.write(strides.as_ptr().cast_mut().cast::<c_void>());
            stride_len.write(strides.len());
        }
        Ok(())
    })
}

/// Element kind.
///
/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn dtype(res: *mut mlx_dtype, arr: mlx_array) -> mlx_err {
    guard("dtype", || {
        let handle = unsafe { array_ref(arr) }?;
        let kind = ScalarKind::from_dtype(handle.array.dtype());
        unsafe { write_out(res, kind.to_raw()) }
    })
}

/// Process-unique identifier of the array's graph node.
///
/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn id(res: *mut size_t, arr: mlx_array) -> mlx_err {
    guard("id", || {
        let handle = unsafe { array_ref(arr) }?;
        unsafe { write_out(res, handle.array.id().as_u64() as size_t) }
    })
}

/// Contiguity flags; all false until the array is evaluated.
///
/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn flags(res: *mut mlx_array_flags, arr: mlx_array) -> mlx_err {
    guard("flags", || {
        let handle = unsafe { array_ref(arr) }?;
        unsafe { write_out(res, mlx_array_flags::from(handle.array.flags())) }
    })
}

/// Element count of the materialized buffer. Fails before evaluation.
///
/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn data_size(res: *mut size_t, arr: mlx_array) -> mlx_err {
    guard("data_size", || {
        let handle = unsafe { array_ref(arr) }?;
        let count = handle.array.data_size()?;
        unsafe { write_out(res, count) }
    })
}

/// Pointer to the materialized elements. Fails before evaluation.
///
/// The pointer is owned by the handle and aligned for the element type.
///
/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn data(res: *mut *mut c_void, arr: mlx_array) -> mlx_err {
    guard("data", || {
        let handle = unsafe { array_ref(arr) }?;
        let res = out_param(res)?;
        let buffer = handle.array.buffer()?;
        let ptr = (kind_of(&handle.array).data_ptr)(&buffer)
            .ok_or(BoundaryError::UnhandledDType(handle.array.dtype()))?;
        unsafe { res.write(ptr.cast_mut()) };
        Ok(())
    })
}

/// Whether the array has been materialized.
///
/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn is_evaled(res: *mut bool, arr: mlx_array) -> mlx_err {
    guard("is_evaled", || {
        let handle = unsafe { array_ref(arr) }?;
        unsafe { write_out(res, handle.array.is_evaled()) }
    })
}
