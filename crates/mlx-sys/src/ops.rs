//! Elementwise operation surface. Results are lazy.

use mlx_core::Array;

use crate::handles::{array_ref, out_param, publish_array};
use crate::shim::guard;
use crate::types::{mlx_array, mlx_err};

type BinaryFn = fn(&Array, &Array) -> mlx_core::Result<Array>;

/// # Safety
/// `res` must be null or writable; `a` and `b` must be null or live handles.
unsafe fn binary(
    entry: &'static str,
    op: BinaryFn,
    res: *mut mlx_array,
    a: mlx_array,
    b: mlx_array,
) -> mlx_err {
    guard(entry, || {
        let res = out_param(res)?;
        let lhs = unsafe { array_ref(a) }?;
        let rhs = unsafe { array_ref(b) }?;
        let out = op(&lhs.array, &rhs.array)?;
        let handle = publish_array(out)?;
        unsafe { res.write(handle) };
        Ok(())
    })
}

/// # Safety
/// `res` must be null or writable; `a` and `b` must be null or live handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn add(res: *mut mlx_array, a: mlx_array, b: mlx_array) -> mlx_err {
    unsafe { binary("add", Array::add, res, a, b) }
}

/// # Safety
/// `res` must be null or writable; `a` and `b` must be null or live handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn subtract(res: *mut mlx_array, a: mlx_array, b: mlx_array) -> mlx_err {
    unsafe { binary("subtract", Array::subtract, res, a, b) }
}

/// # Safety
/// `res` must be null or writable; `a` and `b` must be null or live handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn multiply(res: *mut mlx_array, a: mlx_array, b: mlx_array) -> mlx_err {
    unsafe { binary("multiply", Array::multiply, res, a, b) }
}

/// # Safety
/// `res` must be null or writable; `a` and `b` must be null or live handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn divide(res: *mut mlx_array, a: mlx_array, b: mlx_array) -> mlx_err {
    unsafe { binary("divide", Array::divide, res, a, b) }
}
