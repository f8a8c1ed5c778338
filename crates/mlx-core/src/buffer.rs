//! Typed element storage for materialized arrays.
//!
//! A `Buffer` owns one contiguous vector per element type so raw data
//! pointers handed out for a dtype are always aligned for that dtype.

pub use half::{bf16, f16};

use crate::{DType, MlxError, Result};

/// Collect exactly `len` items, reporting allocation failure as an error
/// instead of aborting the process.
pub fn try_collect<T>(len: usize, items: impl Iterator<Item = T>) -> Result<Vec<T>> {
    let mut out = Vec::new();
    out.try_reserve_exact(len)
        .map_err(|_| MlxError::Allocation(len.saturating_mul(std::mem::size_of::<T>())))?;
    out.extend(items.take(len));
    Ok(out)
}

/// Elementwise binary operation applied by the kernels.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

/// A scalar type that can live inside a [`Buffer`].
pub trait Element: Copy + Send + Sync + std::fmt::Debug + 'static {
    const DTYPE: DType;

    /// Convert from f64, saturating/rounding the way `as` casts do.
    fn cast_from(v: f64) -> Self;

    fn as_f64(self) -> f64;

    /// Decode one element from native-endian bytes (`bytes.len() == size`).
    fn read_ne(bytes: &[u8]) -> Self;

    fn apply(op: BinaryOp, lhs: Self, rhs: Self) -> Self;

    fn wrap(data: Vec<Self>) -> Buffer;

    fn view(buffer: &Buffer) -> Option<&[Self]>;
}

/// Materialized array storage.
#[derive(Clone, Debug, PartialEq)]
pub enum Buffer {
    Bool(Vec<bool>),
    U8(Vec<u8>),
    U16(Vec<u16>),
    U32(Vec<u32>),
    U64(Vec<u64>),
    I8(Vec<i8>),
    I16(Vec<i16>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F16(Vec<f16>),
    F32(Vec<f32>),
    BF16(Vec<bf16>),
}

/// Run `$body` with `$v` bound to the typed vector inside a buffer.
#[macro_export]
macro_rules! with_buffer {
    ($buffer:expr, $v:ident => $body:expr) => {
        match $buffer {
            $crate::buffer::Buffer::Bool($v) => $body,
            $crate::buffer::Buffer::U8($v) => $body,
            $crate::buffer::Buffer::U16($v) => $body,
            $crate::buffer::Buffer::U32($v) => $body,
            $crate::buffer::Buffer::U64($v) => $body,
            $crate::buffer::Buffer::I8($v) => $body,
            $crate::buffer::Buffer::I16($v) => $body,
            $crate::buffer::Buffer::I32($v) => $body,
            $crate::buffer::Buffer::I64($v) => $body,
            $crate::buffer::Buffer::F16($v) => $body,
            $crate::buffer::Buffer::F32($v) => $body,
            $crate::buffer::Buffer::BF16($v) => $body,
        }
    };
}

/// Run `$body` with the type alias `$T` naming the element type of a dtype.
#[macro_export]
macro_rules! with_dtype {
    ($dtype:expr, $T:ident => $body:expr) => {
        match $dtype {
            $crate::DType::Bool => {
                type $T = bool;
                $body
            }
            $crate::DType::U8 => {
                type $T = u8;
                $body
            }
            $crate::DType::U16 => {
                type $T = u16;
                $body
            }
            $crate::DType::U32 => {
                type $T = u32;
                $body
            }
            $crate::DType::U64 => {
                type $T = u64;
                $body
            }
            $crate::DType::I8 => {
                type $T = i8;
                $body
            }
            $crate::DType::I16 => {
                type $T = i16;
                $body
            }
            $crate::DType::I32 => {
                type $T = i32;
                $body
            }
            $crate::DType::I64 => {
                type $T = i64;
                $body
            }
            $crate::DType::F16 => {
                type $T = $crate::buffer::f16;
                $body
            }
            $crate::DType::F32 => {
                type $T = f32;
                $body
            }
            $crate::DType::BF16 => {
                type $T = $crate::buffer::bf16;
                $body
            }
        }
    };
}

macro_rules! impl_int_element {
    ($t:ty, $variant:ident) => {
        impl Element for $t {
            const DTYPE: DType = DType::$variant;

            fn cast_from(v: f64) -> Self {
                v as $t
            }

            fn as_f64(self) -> f64 {
                self as f64
            }

            fn read_ne(bytes: &[u8]) -> Self {
                let mut raw = [0u8; std::mem::size_of::<$t>()];
                raw.copy_from_slice(bytes);
                <$t>::from_ne_bytes(raw)
            }

            fn apply(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
                match op {
                    BinaryOp::Add => lhs.wrapping_add(rhs),
                    BinaryOp::Sub => lhs.wrapping_sub(rhs),
                    BinaryOp::Mul => lhs.wrapping_mul(rhs),
                    BinaryOp::Div => lhs.checked_div(rhs).unwrap_or(0),
                }
            }

            fn wrap(data: Vec<Self>) -> Buffer {
                Buffer::$variant(data)
            }

            fn view(buffer: &Buffer) -> Option<&[Self]> {
                match buffer {
                    Buffer::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }
        }
    };
}

impl_int_element!(u8, U8);
impl_int_element!(u16, U16);
impl_int_element!(u32, U32);
impl_int_element!(u64, U64);
impl_int_element!(i8, I8);
impl_int_element!(i16, I16);
impl_int_element!(i32, I32);
impl_int_element!(i64, I64);

impl Element for bool {
    const DTYPE: DType = DType::Bool;

    fn cast_from(v: f64) -> Self {
        v != 0.0
    }

    fn as_f64(self) -> f64 {
        if self { 1.0 } else { 0.0 }
    }

    fn read_ne(bytes: &[u8]) -> Self {
        bytes[0] != 0
    }

    // Subtraction of booleans is rejected when the op is recorded.
    fn apply(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        match op {
            BinaryOp::Add => lhs | rhs,
            BinaryOp::Mul | BinaryOp::Div => lhs & rhs,
            BinaryOp::Sub => lhs ^ rhs,
        }
    }

    fn wrap(data: Vec<Self>) -> Buffer {
        Buffer::Bool(data)
    }

    fn view(buffer: &Buffer) -> Option<&[Self]> {
        match buffer {
            Buffer::Bool(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

impl Element for f32 {
    const DTYPE: DType = DType::F32;

    fn cast_from(v: f64) -> Self {
        v as f32
    }

    fn as_f64(self) -> f64 {
        self as f64
    }

    fn read_ne(bytes: &[u8]) -> Self {
        f32::from_ne_bytes([bytes[0], bytes[1], bytes[2], bytes[3]])
    }

    fn apply(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
        match op {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
        }
    }

    fn wrap(data: Vec<Self>) -> Buffer {
        Buffer::F32(data)
    }

    fn view(buffer: &Buffer) -> Option<&[Self]> {
        match buffer {
            Buffer::F32(v) => Some(v.as_slice()),
            _ => None,
        }
    }
}

macro_rules! impl_half_element {
    ($t:ty, $variant:ident) => {
        impl Element for $t {
            const DTYPE: DType = DType::$variant;

            fn cast_from(v: f64) -> Self {
                <$t>::from_f64(v)
            }

            fn as_f64(self) -> f64 {
                <$t>::to_f64(self)
            }

            fn read_ne(bytes: &[u8]) -> Self {
                <$t>::from_ne_bytes([bytes[0], bytes[1]])
            }

            // Half types compute through f32.
            fn apply(op: BinaryOp, lhs: Self, rhs: Self) -> Self {
                <$t>::from_f32(f32::apply(op, lhs.to_f32(), rhs.to_f32()))
            }

            fn wrap(data: Vec<Self>) -> Buffer {
                Buffer::$variant(data)
            }

            fn view(buffer: &Buffer) -> Option<&[Self]> {
                match buffer {
                    Buffer::$variant(v) => Some(v.as_slice()),
                    _ => None,
                }
            }
        }
    };
}

impl_half_element!(f16, F16);
impl_half_element!(bf16, BF16);

impl Buffer {
    /// Element type held by this buffer.
    pub fn dtype(&self) -> DType {
        match self {
            Buffer::Bool(_) => DType::Bool,
            Buffer::U8(_) => DType::U8,
            Buffer::U16(_) => DType::U16,
            Buffer::U32(_) => DType::U32,
            Buffer::U64(_) => DType::U64,
            Buffer::I8(_) => DType::I8,
            Buffer::I16(_) => DType::I16,
            Buffer::I32(_) => DType::I32,
            Buffer::I64(_) => DType::I64,
            Buffer::F16(_) => DType::F16,
            Buffer::F32(_) => DType::F32,
            Buffer::BF16(_) => DType::BF16,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        with_buffer!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// A zero-filled buffer of `len` elements.
    pub fn zeros(dtype: DType, len: usize) -> Result<Buffer> {
        with_dtype!(dtype, T => {
            let zero = T::cast_from(0.0);
            Ok(T::wrap(try_collect(len, std::iter::repeat_n(zero, len))?))
        })
    }

    /// A buffer holding `values` converted to `dtype`.
    pub fn from_f64(dtype: DType, values: &[f64]) -> Result<Buffer> {
        with_dtype!(dtype, T => {
            let data = try_collect(values.len(), values.iter().map(|&v| T::cast_from(v)))?;
            Ok(T::wrap(data))
        })
    }

    /// Convert every element to `dtype` (through f64 for mixed types).
    pub fn cast(&self, dtype: DType) -> Result<Buffer> {
        if self.dtype() == dtype {
            return self.try_clone();
        }
        let len = self.len();
        with_buffer!(self, v => with_dtype!(dtype, T => {
            let data = try_collect(len, v.iter().map(|&x| T::cast_from(Element::as_f64(x))))?;
            Ok(T::wrap(data))
        }))
    }

    /// Copy of the buffer; allocation failure is an error.
    pub fn try_clone(&self) -> Result<Buffer> {
        with_buffer!(self, v => Ok(Element::wrap(try_collect(v.len(), v.iter().copied())?)))
    }

    /// Elements `[start, end)` as a new buffer.
    pub fn range(&self, start: usize, end: usize) -> Result<Buffer> {
        with_buffer!(self, v => {
            let rows = v.get(start..end).ok_or_else(|| {
                MlxError::InvalidArgument(format!(
                    "range {start}..{end} out of bounds for {} elements",
                    v.len()
                ))
            })?;
            Ok(Element::wrap(try_collect(rows.len(), rows.iter().copied())?))
        })
    }

    /// Elements widened to f64, mostly for inspection and tests.
    pub fn to_vec_f64(&self) -> Vec<f64> {
        with_buffer!(self, v => v.iter().map(|&x| Element::as_f64(x)).collect())
    }

    /// Typed view when `T` matches the stored dtype.
    pub fn as_slice<T: Element>(&self) -> Option<&[T]> {
        T::view(self)
    }
}
