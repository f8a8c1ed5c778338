//! Type dispatch table.
//!
//! Maps the caller-facing `mlx_dtype` values onto engine dtypes and holds,
//! per scalar kind, the typed routines every dtype-dependent entry point
//! needs. Entry points never switch on the dtype themselves; they look up
//! a [`KindOps`] row and call through it.

use std::ffi::c_void;

use mlx_core::buffer::try_collect;
use mlx_core::{Array, Buffer, DType, Element, bf16, f16};

use crate::error::{BoundaryError, Result};
use crate::types::mlx_dtype;

/// Implemented scalar kinds, in `mlx_dtype` order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ScalarKind {
    Bool = 0,
    UInt8 = 1,
    UInt16 = 2,
    UInt32 = 3,
    UInt64 = 4,
    Int8 = 5,
    Int16 = 6,
    Int32 = 7,
    Int64 = 8,
    Float16 = 9,
    Float32 = 10,
    BFloat16 = 11,
}

impl ScalarKind {
    pub const ALL: [ScalarKind; 12] = [
        ScalarKind::Bool,
        ScalarKind::UInt8,
        ScalarKind::UInt16,
        ScalarKind::UInt32,
        ScalarKind::UInt64,
        ScalarKind::Int8,
        ScalarKind::Int16,
        ScalarKind::Int32,
        ScalarKind::Int64,
        ScalarKind::Float16,
        ScalarKind::Float32,
        ScalarKind::BFloat16,
    ];

    /// Decode a caller-supplied dtype. `complex64` and unknown values fail.
    pub fn from_raw(raw: mlx_dtype) -> Result<Self> {
        usize::try_from(raw.0)
            .ok()
            .and_then(|i| Self::ALL.get(i).copied())
            .ok_or(BoundaryError::InvalidDType(raw.0))
    }

    pub fn to_raw(self) -> mlx_dtype {
        mlx_dtype(self as libc::c_int)
    }

    pub fn dtype(self) -> DType {
        match self {
            ScalarKind::Bool => DType::Bool,
            ScalarKind::UInt8 => DType::U8,
            ScalarKind::UInt16 => DType::U16,
            ScalarKind::UInt32 => DType::U32,
            ScalarKind::UInt64 => DType::U64,
            ScalarKind::Int8 => DType::I8,
            ScalarKind::Int16 => DType::I16,
            ScalarKind::Int32 => DType::I32,
            ScalarKind::Int64 => DType::I64,
            ScalarKind::Float16 => DType::F16,
            ScalarKind::Float32 => DType::F32,
            ScalarKind::BFloat16 => DType::BF16,
        }
    }

    pub fn from_dtype(dtype: DType) -> Self {
        match dtype {
            DType::Bool => ScalarKind::Bool,
            DType::U8 => ScalarKind::UInt8,
            DType::U16 => ScalarKind::UInt16,
            DType::U32 => ScalarKind::UInt32,
            DType::U64 => ScalarKind::UInt64,
            DType::I8 => ScalarKind::Int8,
            DType::I16 => ScalarKind::Int16,
            DType::I32 => ScalarKind::Int32,
            DType::I64 => ScalarKind::Int64,
            DType::F16 => ScalarKind::Float16,
            DType::F32 => ScalarKind::Float32,
            DType::BF16 => ScalarKind::BFloat16,
        }
    }

    pub fn ops(self) -> &'static KindOps {
        &TABLE[self as usize]
    }
}

/// Typed routines for one scalar kind.
pub struct KindOps {
    pub kind: ScalarKind,
    pub itemsize: usize,
    /// Decode native-endian element bytes into engine storage.
    pub from_bytes: fn(&[u8]) -> mlx_core::Result<Buffer>,
    /// Evaluate a one-element array and write its value to `out`.
    pub write_item: unsafe fn(&Array, bool, *mut c_void) -> Result<()>,
    /// Pointer to the first element of materialized storage of this kind.
    pub data_ptr: fn(&Buffer) -> Option<*const c_void>,
}

/// Trailing bytes that do not fill a whole element are ignored.
fn decode<T: Element>(bytes: &[u8]) -> mlx_core::Result<Buffer> {
    let size = std::mem::size_of::<T>();
    let data = try_collect(bytes.len() / size, bytes.chunks_exact(size).map(T::read_ne))?;
    Ok(T::wrap(data))
}

/// # Safety
/// `out` must be valid for a write of one `T`; alignment is not required.
unsafe fn write_item<T: Element>(array: &Array, retain_graph: bool, out: *mut c_void) -> Result<()> {
    let value = array.item::<T>(retain_graph)?;
    unsafe { std::ptr::write_unaligned(out.cast::<T>(), value) };
    Ok(())
}

fn data_ptr<T: Element>(buffer: &Buffer) -> Option<*const c_void> {
    buffer
        .as_slice::<T>()
        .map(|s| s.as_ptr().cast::<c_void>())
}

const fn entry<T: Element>(kind: ScalarKind) -> KindOps {
    KindOps {
        kind,
        itemsize: std::mem::size_of::<T>(),
        from_bytes: decode::<T>,
        write_item: write_item::<T>,
        data_ptr: data_ptr::<T>,
    }
}

static TABLE: [KindOps; 12] = [
    entry::<bool>(ScalarKind::Bool),
    entry::<u8>(ScalarKind::UInt8),
    entry::<u16>(ScalarKind::UInt16),
    entry::<u32>(ScalarKind::UInt32),
    entry::<u64>(ScalarKind::UInt64),
    entry::<i8>(ScalarKind::Int8),
    entry::<i16>(ScalarKind::Int16),
    entry::<i32>(ScalarKind::Int32),
    entry::<i64>(ScalarKind::Int64),
    entry::<f16>(ScalarKind::Float16),
    entry::<f32>(ScalarKind::Float32),
    entry::<bf16>(ScalarKind::BFloat16),
];

/// Kind of an engine array, as seen by the dispatch table.
pub fn kind_of(array: &Array) -> &'static KindOps {
    ScalarKind::from_dtype(array.dtype()).ops()
}

#[cfg(test)]
mod tests {
    use super::*;
    use mlx_core::Shape;
    use proptest::prelude::*;

    #[test]
    fn test_table_order_matches_kinds() {
        for (i, ops) in TABLE.iter().enumerate() {
            assert_eq!(ops.kind as usize, i);
            assert_eq!(ops.kind.to_raw(), mlx_dtype(i as libc::c_int));
            assert_eq!(ops.itemsize, ops.kind.dtype().size_bytes());
        }
    }

    #[test]
    fn test_complex64_rejected() {
        assert!(matches!(
            ScalarKind::from_raw(mlx_dtype::COMPLEX64),
            Err(BoundaryError::InvalidDType(12))
        ));
        assert!(ScalarKind::from_raw(mlx_dtype(-1)).is_err());
        assert!(ScalarKind::from_raw(mlx_dtype(1000)).is_err());
    }

    #[test]
    fn test_decode_and_data_ptr() {
        let bytes: Vec<u8> = [3u16, 9].iter().flat_map(|v| v.to_ne_bytes()).collect();
        let ops = ScalarKind::UInt16.ops();
        let buffer = (ops.from_bytes)(&bytes).unwrap();
        assert_eq!(buffer.as_slice::<u16>(), Some(&[3, 9][..]));
        assert!((ops.data_ptr)(&buffer).is_some());
        assert!((ScalarKind::Int16.ops().data_ptr)(&buffer).is_none());
    }

    #[test]
    fn test_decode_bool_and_half() {
        let flags = (ScalarKind::Bool.ops().from_bytes)(&[0, 7, 1]).unwrap();
        assert_eq!(flags.as_slice::<bool>(), Some(&[false, true, true][..]));

        let vals = [f16::from_f32(1.5), f16::from_f32(-0.25)];
        let bytes: Vec<u8> = vals.iter().flat_map(|v| v.to_ne_bytes()).collect();
        let halves = (ScalarKind::Float16.ops().from_bytes)(&bytes).unwrap();
        assert_eq!(halves.as_slice::<f16>(), Some(&vals[..]));

        let odd = (ScalarKind::Int32.ops().from_bytes)(&[1, 0, 0, 0, 9]).unwrap();
        assert_eq!(odd.len(), 1);
    }

    #[test]
    fn test_write_item_unaligned() {
        let array = Array::from_slice(&[-5i64], &Shape::new(vec![1])).unwrap();
        let mut raw = [0u8; 9];
        let out = raw[1..].as_mut_ptr().cast::<c_void>();
        unsafe { (kind_of(&array).write_item)(&array, true, out).unwrap() };
        assert_eq!(i64::from_ne_bytes(raw[1..].try_into().unwrap()), -5);
    }

    proptest! {
        #[test]
        fn dispatch_round_trip(raw in 0i32..12) {
            let kind = ScalarKind::from_raw(mlx_dtype(raw)).unwrap();
            prop_assert_eq!(kind.to_raw(), mlx_dtype(raw));
            prop_assert_eq!(ScalarKind::from_dtype(kind.dtype()), kind);
        }

        #[test]
        fn out_of_range_rejected(raw in prop_oneof![i32::MIN..0, 12i32..i32::MAX]) {
            prop_assert!(ScalarKind::from_raw(mlx_dtype(raw)).is_err());
        }
    }
}
