//! Construction surface: entry points that produce a new array handle.
//!
//! Every entry point checks its output parameter first and writes it only
//! once the array has been built, so a failure never leaves a handle
//! behind.

use std::ffi::c_void;

use libc::{c_int, size_t};
use mlx_core::{Array, random};

use crate::dispatch::ScalarKind;
use crate::error::{BoundaryError, Result};
use crate::handles::{out_param, publish_array, read_shape};
use crate::shim::guard;
use crate::types::{mlx_array, mlx_dtype, mlx_err};

/// # Safety
/// `res` must be null or valid for a write of one handle.
unsafe fn emit(res: *mut mlx_array, array: Array) -> Result<()> {
    let handle = publish_array(array)?;
    unsafe { res.write(handle) };
    Ok(())
}

/// Reseed the process-wide random generator.
#[unsafe(no_mangle)]
pub extern "C" fn seed(seed: u64) -> mlx_err {
    guard("seed", || {
        random::seed(seed);
        Ok(())
    })
}

/// 0-d array holding `val` converted to `dtype`.
///
/// # Safety
/// `res` must be null or valid for a write of one handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fromScalar(res: *mut mlx_array, val: f64, dtype: mlx_dtype) -> mlx_err {
    guard("fromScalar", || {
        let res = out_param(res)?;
        let kind = ScalarKind::from_raw(dtype)?;
        let array = Array::from_f64(val, kind.dtype())?;
        unsafe { emit(res, array) }
    })
}

/// 0-d int64 array.
///
/// # Safety
/// `res` must be null or valid for a write of one handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fromScalarI64(res: *mut mlx_array, val: i64) -> mlx_err {
    guard("fromScalarI64", || {
        let res = out_param(res)?;
        unsafe { emit(res, Array::from_scalar(val)) }
    })
}

/// 0-d uint64 array.
///
/// # Safety
/// `res` must be null or valid for a write of one handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fromScalarU64(res: *mut mlx_array, val: u64) -> mlx_err {
    guard("fromScalarU64", || {
        let res = out_param(res)?;
        unsafe { emit(res, Array::from_scalar(val)) }
    })
}

/// Allocate an array of `shape` without meaningful contents.
///
/// The storage is zero-filled, but callers must treat it as uninitialized.
///
/// # Safety
/// `res` must be null or valid for a write of one handle; `shape` must be
/// valid for reads of `shape_len` `int`s.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn initHandle(
    res: *mut mlx_array,
    shape: *const c_int,
    shape_len: size_t,
    dtype: mlx_dtype,
) -> mlx_err {
    guard("initHandle", || {
        let res = out_param(res)?;
        let kind = ScalarKind::from_raw(dtype)?;
        let shape = unsafe { read_shape(shape, shape_len) }?;
        let array = Array::uninit(&shape, kind.dtype())?;
        unsafe { emit(res, array) }
    })
}

/// Empty float32 array.
///
/// # Safety
/// `res` must be null or valid for a write of one handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn initEmpty(res: *mut mlx_array) -> mlx_err {
    guard("initEmpty", || {
        let res = out_param(res)?;
        unsafe { emit(res, Array::empty()) }
    })
}

/// Array copied from caller memory holding `product(shape)` native-endian
/// elements of `dtype`.
///
/// The engine owns its own copy once this returns; `data` need not be
/// aligned and may be released by the caller immediately.
///
/// # Safety
/// `res` must be null or valid for a write of one handle; `shape` must be
/// valid for reads of `shape_len` `int`s; `data` must be valid for reads of
/// `product(shape) * itemsize(dtype)` bytes.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn fromPtr(
    res: *mut mlx_array,
    data: *const c_void,
    shape: *const c_int,
    shape_len: size_t,
    dtype: mlx_dtype,
) -> mlx_err {
    guard("fromPtr", || {
        let res = out_param(res)?;
        let ops = ScalarKind::from_raw(dtype)?.ops();
        let shape = unsafe { read_shape(shape, shape_len) }?;
        let count = shape.validate()?;
        let nbytes = count.checked_mul(ops.itemsize).ok_or_else(|| {
            mlx_core::MlxError::InvalidArgument(format!("shape {shape} overflows the byte count"))
        })?;
        let bytes: &[u8] = if nbytes == 0 {
            &[]
        } else if data.is_null() {
            return Err(BoundaryError::NullPointer("data"));
        } else {
            unsafe { std::slice::from_raw_parts(data.cast::<u8>(), nbytes) }
        };
        let array = Array::from_buffer((ops.from_bytes)(bytes)?, &shape)?;
        unsafe { emit(res, array) }
    })
}

/// Lazily sampled standard-normal array drawn from the global generator.
///
/// # Safety
/// `res` must be null or valid for a write of one handle; `shape` must be
/// valid for reads of `shape_len` `int`s.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn randomNormal(
    res: *mut mlx_array,
    shape: *const c_int,
    shape_len: size_t,
    dtype: mlx_dtype,
) -> mlx_err {
    guard("randomNormal", || {
        let res = out_param(res)?;
        let kind = ScalarKind::from_raw(dtype)?;
        let shape = unsafe { read_shape(shape, shape_len) }?;
        let array = random::normal(&shape, kind.dtype())?;
        unsafe { emit(res, array) }
    })
}
