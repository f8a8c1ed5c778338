//! Iterator surface: forward iteration over the leading dimension.
//!
//! An iterator records its parent's node weakly together with a position.
//! Advancing never checks bounds; only `arrayIterDeref` does.

use crate::error::BoundaryError;
use crate::handles::{
    IteratorHandle, array_ref, iter_mut, iter_ref, out_param, publish_array, publish_iterator,
    write_out,
};
use crate::shim::guard;
use crate::types::{mlx_array, mlx_array_iterator, mlx_err};

/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle.
unsafe fn make_iterator(
    entry: &'static str,
    res: *mut mlx_array_iterator,
    arr: mlx_array,
    at_end: bool,
) -> mlx_err {
    guard(entry, || {
        let handle = unsafe { array_ref(arr) }?;
        let res = out_param(res)?;
        let len = match handle.array.shape().0.first() {
            Some(&rows) => usize::try_from(rows).map_err(|_| BoundaryError::InvalidDimension(rows))?,
            None => return Err(BoundaryError::ScalarIteration),
        };
        let iter = IteratorHandle {
            parent: handle.array.downgrade(),
            position: if at_end { len } else { 0 },
            len,
        };
        unsafe { res.write(publish_iterator(iter)) };
        Ok(())
    })
}

/// Iterator at position 0.
///
/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle that
/// outlives the iterator.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn begin(res: *mut mlx_array_iterator, arr: mlx_array) -> mlx_err {
    unsafe { make_iterator("begin", res, arr, false) }
}

/// Iterator one past the last row.
///
/// # Safety
/// `res` must be null or writable; `arr` must be null or a live handle that
/// outlives the iterator.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn end(res: *mut mlx_array_iterator, arr: mlx_array) -> mlx_err {
    unsafe { make_iterator("end", res, arr, true) }
}

/// Advance by one row.
///
/// # Safety
/// `iter` must be null or a live iterator handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn next(iter: mlx_array_iterator) -> mlx_err {
    unsafe { nextDiff(iter, 1) }
}

/// Advance by `diff` rows.
///
/// # Safety
/// `iter` must be null or a live iterator handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn nextDiff(iter: mlx_array_iterator, diff: usize) -> mlx_err {
    guard("nextDiff", || {
        let iter = unsafe { iter_mut(iter) }?;
        iter.position = iter.position.saturating_add(diff);
        Ok(())
    })
}

/// # Safety
/// `iter` must be null or a live iterator handle.
unsafe fn same_position(a: mlx_array_iterator, b: mlx_array_iterator) -> Result<bool, BoundaryError> {
    let a = unsafe { iter_ref(a) }?;
    let b = unsafe { iter_ref(b) }?;
    Ok(a.parent_id() == b.parent_id() && a.position == b.position)
}

/// Whether two iterators are over the same array at the same position.
///
/// # Safety
/// `res` must be null or writable; `a` and `b` must be null or live
/// iterator handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn arrayIterEql(
    res: *mut bool,
    a: mlx_array_iterator,
    b: mlx_array_iterator,
) -> mlx_err {
    guard("arrayIterEql", || {
        let eq = unsafe { same_position(a, b) }?;
        unsafe { write_out(res, eq) }
    })
}

/// Negation of [`arrayIterEql`].
///
/// # Safety
/// `res` must be null or writable; `a` and `b` must be null or live
/// iterator handles.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn arrayIterNeq(
    res: *mut bool,
    a: mlx_array_iterator,
    b: mlx_array_iterator,
) -> mlx_err {
    guard("arrayIterNeq", || {
        let eq = unsafe { same_position(a, b) }?;
        unsafe { write_out(res, !eq) }
    })
}

/// New owned handle for the row at the iterator's position, computed lazily.
///
/// # Safety
/// `res` must be null or writable; `iter` must be null or a live iterator
/// handle.
#[unsafe(no_mangle)]
pub unsafe extern "C" fn arrayIterDeref(res: *mut mlx_array, iter: mlx_array_iterator) -> mlx_err {
    guard("arrayIterDeref", || {
        let iter = unsafe { iter_ref(iter) }?;
        let res = out_param(res)?;
        if iter.position >= iter.len {
            return Err(BoundaryError::IteratorOutOfRange {
                position: iter.position,
                len: iter.len,
            });
        }
        let parent = iter.parent.upgrade().ok_or(BoundaryError::ParentReleased)?;
        let row = parent.index_axis0(iter.position)?;
        let handle = publish_array(row)?;
        unsafe { res.write(handle) };
        Ok(())
    })
}
