//! Mutation/evaluation surface and graph introspection.

use std::ffi::{c_char, c_void};
use std::sync::Arc;

use mlx_core::Primitive;

use crate::dispatch::kind_of;
use crate::error::BoundaryError;
use crate::handles::{array_ref, out_param, write_out};
use crate::shim::guard;
use crate::types::{mlx_array, mlx_err, mlx_primitive};

/// Materialize the array. With `retain_graph == false` the producing graph
/// is released afterwards.
///
/// # Safety
/// `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn eval_array(retain_graph: bool, arr: mlx_array) -> mlx_err {
    guard("eval_array", || {
        let handle = unsafe { array_ref(arr) }?;
        handle.array.eval(retain_graph)?;
        Ok(())
    })
}

/// Evaluate a one-element array and write its value, typed by the array's
/// dtype, to `res`.
///
/// # Safety
/// `res` must be null or valid for a write of one element of the array's
/// dtype; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn item(res: *mut c_void, retain_graph: bool, arr: mlx_array) -> mlx_err {
    guard("item", || {
        let handle = unsafe { array_ref(arr) }?;
        let res = out_param(res)?;
        unsafe { (kind_of(&handle.array).write_item)(&handle.array, retain_graph, res) }
    })
}

/// Cut the array off from its producing graph. Idempotent.
///
/// # Safety
/// `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn detach(arr: mlx_array) -> mlx_err {
    guard("detach", || {
        let handle = unsafe { array_ref(arr) }?;
        handle.array.detach();
        Ok(())
    })
}

/// # Safety
/// `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn set_tracer(is_tracer: bool, arr: mlx_array) -> mlx_err {
    guard("set_tracer", || {
        let handle = unsafe { array_ref(arr) }?;
        handle.array.set_tracer(is_tracer);
        Ok(())
    })
}

/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn is_tracer(res: *mut bool, arr: mlx_array) -> mlx_err {
    guard("is_tracer", || {
        let handle = unsafe { array_ref(arr) }?;
        unsafe { write_out(res, handle.array.is_tracer()) }
    })
}

/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn has_primitive(res: *mut bool, arr: mlx_array) -> mlx_err {
    guard("has_primitive", || {
        let handle = unsafe { array_ref(arr) }?;
        unsafe { write_out(res, handle.array.has_primitive()) }
    })
}

/// Borrowed reference to the op that produced the array.
///
/// Valid while the handle lives and its graph is retained; `detach` or an
/// `eval_array` without retained graph invalidates it.
///
/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn primitive(res: *mut mlx_primitive, arr: mlx_array) -> mlx_err {
    guard("primitive", || {
        let handle = unsafe { array_ref(arr) }?;
        let res = out_param(res)?;
        let primitive = handle.array.primitive().ok_or(BoundaryError::NoPrimitive)?;
        // The node keeps its own reference alive.
        let ptr = Arc::as_ptr(&primitive).cast_mut().cast();
        unsafe { res.write(ptr) };
        Ok(())
    })
}

/// Static NUL-terminated name of a primitive returned by [`primitive`].
///
/// # Safety
/// `res` must be null or writable; `prim` must be null or a live primitive
/// reference.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn primitive_name(res: *mut *const c_char, prim: mlx_primitive) -> mlx_err {
    guard("primitive_name", || {
        if prim.is_null() {
            return Err(BoundaryError::NullPointer("primitive"));
        }
        let primitive = unsafe { &*prim.cast::<Primitive>() };
        unsafe { write_out(res, primitive.name().as_ptr()) }
    })
}
