//! Handle lifecycle: boxing engine values into opaque handles, borrowing
//! them back, and releasing them.
//!
//! # Safety
//!
//! Handles are `Box` pointers cast through the zero-sized marker types in
//! [`crate::types`]. A handle is valid from the successful return of the
//! call that produced it until it is passed to its destroy function.
//! Double destroy and use-after-destroy are caller errors; only null
//! handles are detected.

use libc::{c_int, size_t};
use mlx_core::{Array, NodeId, Shape, WeakArray};

use crate::error::{BoundaryError, Result};
use crate::types::{mlx_array, mlx_array_iterator};

/// Boxed state behind an `mlx_array`.
pub(crate) struct ArrayHandle {
    pub(crate) array: Array,
    /// Dimensions in the `int` width handed out by `shape`.
    dims: Vec<c_int>,
}

impl ArrayHandle {
    fn new(array: Array) -> Result<Self> {
        let dims = array
            .shape()
            .0
            .iter()
            .map(|&d| c_int::try_from(d).map_err(|_| BoundaryError::InvalidDimension(d)))
            .collect::<Result<_>>()?;
        Ok(Self { array, dims })
    }

    pub(crate) fn dims(&self) -> &[c_int] {
        &self.dims
    }
}

/// Boxed state behind an `mlx_array_iterator`.
///
/// Holds only a weak reference: an iterator never keeps its parent alive.
pub(crate) struct IteratorHandle {
    pub(crate) parent: WeakArray,
    pub(crate) position: usize,
    pub(crate) len: usize,
}

impl IteratorHandle {
    pub(crate) fn parent_id(&self) -> NodeId {
        self.parent.id()
    }
}

// ── Publishing ──────────────────────────────────────────────────────────

pub(crate) fn publish_array(array: Array) -> Result<mlx_array> {
    let handle = ArrayHandle::new(array)?;
    tracing::trace!(id = handle.array.id().as_u64(), "array handle created");
    Ok(Box::into_raw(Box::new(handle)).cast())
}

pub(crate) fn publish_iterator(iter: IteratorHandle) -> mlx_array_iterator {
    tracing::trace!(
        parent = iter.parent_id().as_u64(),
        position = iter.position,
        "iterator handle created"
    );
    Box::into_raw(Box::new(iter)).cast()
}

// ── Borrowing ───────────────────────────────────────────────────────────

/// # Safety
/// `arr` must be null or a live array handle.
pub(crate) unsafe fn array_ref<'a>(arr: mlx_array) -> Result<&'a ArrayHandle> {
    if arr.is_null() {
        return Err(BoundaryError::NullPointer("array"));
    }
    Ok(unsafe { &*arr.cast::<ArrayHandle>() })
}

/// # Safety
/// `iter` must be null or a live iterator handle.
pub(crate) unsafe fn iter_ref<'a>(iter: mlx_array_iterator) -> Result<&'a IteratorHandle> {
    if iter.is_null() {
        return Err(BoundaryError::NullPointer("iterator"));
    }
    Ok(unsafe { &*iter.cast::<IteratorHandle>() })
}

/// # Safety
/// `iter` must be null or a live iterator handle not borrowed elsewhere.
pub(crate) unsafe fn iter_mut<'a>(iter: mlx_array_iterator) -> Result<&'a mut IteratorHandle> {
    if iter.is_null() {
        return Err(BoundaryError::NullPointer("iterator"));
    }
    Ok(unsafe { &mut *iter.cast::<IteratorHandle>() })
}

/// Reject a null output parameter before any work is done.
pub(crate) fn out_param<T>(res: *mut T) -> Result<*mut T> {
    if res.is_null() {
        Err(BoundaryError::NullPointer("result"))
    } else {
        Ok(res)
    }
}

/// Write `value` through a checked output parameter.
///
/// # Safety
/// `res` must be null or valid for a write of `T`.
pub(crate) unsafe fn write_out<T>(res: *mut T, value: T) -> Result<()> {
    let res = out_param(res)?;
    unsafe { res.write(value) };
    Ok(())
}

/// Read a caller shape (`int` dimensions) into an engine shape.
///
/// A zero-length shape may be passed as null.
///
/// # Safety
/// `shape` must be null or valid for reads of `len` `int`s.
pub(crate) unsafe fn read_shape(shape: *const c_int, len: size_t) -> Result<Shape> {
    if len == 0 {
        return Ok(Shape::scalar());
    }
    if shape.is_null() {
        return Err(BoundaryError::NullPointer("shape"));
    }
    let dims = unsafe { std::slice::from_raw_parts(shape, len) };
    Ok(Shape::new(dims.iter().map(|&d| i64::from(d)).collect::<Vec<_>>()))
}

// ── Destruction ─────────────────────────────────────────────────────────

/// Release an array handle. Null is a no-op.
///
/// # Safety
/// `arr` must be null or a live array handle; it is invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn destroyArray(arr: mlx_array) {
    if arr.is_null() {
        return;
    }
    let handle = unsafe { Box::from_raw(arr.cast::<ArrayHandle>()) };
    tracing::trace!(id = handle.array.id().as_u64(), "array handle destroyed");
    drop(handle);
}

/// Release an iterator handle. Null is a no-op.
///
/// # Safety
/// `iter` must be null or a live iterator handle; it is invalid afterwards.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn destroyArrayIterator(iter: mlx_array_iterator) {
    if iter.is_null() {
        return;
    }
    let handle = unsafe { Box::from_raw(iter.cast::<IteratorHandle>()) };
    tracing::trace!(parent = handle.parent_id().as_u64(), "iterator handle destroyed");
    drop(handle);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_and_destroy() {
        let array = Array::from_slice(&[1u8, 2], &Shape::new(vec![2])).unwrap();
        let weak = array.downgrade();
        let handle = publish_array(array).unwrap();
        let borrowed = unsafe { array_ref(handle) }.unwrap();
        assert_eq!(borrowed.array.id(), weak.id());
        assert_eq!(borrowed.dims(), &[2]);
        unsafe { destroyArray(handle) };
        assert!(weak.upgrade().is_none());
    }

    #[test]
    fn test_publish_rejects_dimension_beyond_c_int() {
        let wide = i64::from(c_int::MAX) + 1;
        let array = Array::uninit(&Shape::new(vec![wide, 0]), mlx_core::DType::U8).unwrap();
        assert!(matches!(
            publish_array(array),
            Err(BoundaryError::InvalidDimension(d)) if d == wide
        ));
    }

    #[test]
    fn test_null_handles() {
        assert!(matches!(
            unsafe { array_ref(std::ptr::null_mut()) },
            Err(BoundaryError::NullPointer("array"))
        ));
        assert!(unsafe { iter_ref(std::ptr::null_mut()) }.is_err());
        assert!(out_param::<u8>(std::ptr::null_mut()).is_err());
        unsafe {
            destroyArray(std::ptr::null_mut());
            destroyArrayIterator(std::ptr::null_mut());
        }
    }

    #[test]
    fn test_read_shape() {
        let dims: [c_int; 3] = [2, 0, 4];
        let shape = unsafe { read_shape(dims.as_ptr(), dims.len()) }.unwrap();
        assert_eq!(shape, Shape::new(vec![2, 0, 4]));
        let scalar = unsafe { read_shape(std::ptr::null(), 0) }.unwrap();
        assert_eq!(scalar.ndim(), 0);
        assert!(unsafe { read_shape(std::ptr::null(), 2) }.is_err());
    }

    #[test]
    fn test_iterator_does_not_own_parent() {
        let array = Array::from_slice(&[1i32, 2, 3], &Shape::new(vec![3])).unwrap();
        let iter = publish_iterator(IteratorHandle {
            parent: array.downgrade(),
            position: 0,
            len: 3,
        });
        drop(array);
        let handle = unsafe { iter_ref(iter) }.unwrap();
        assert!(handle.parent.upgrade().is_none());
        unsafe { destroyArrayIterator(iter) };
    }
}
