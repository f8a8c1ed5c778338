//! Core type definitions: DType, Shape, Flags.

use crate::{MlxError, Result};

/// Supported data types for array elements.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum DType {
    Bool,
    U8,
    U16,
    U32,
    U64,
    I8,
    I16,
    I32,
    I64,
    F16,
    F32,
    BF16,
}

/// Coarse numeric category used by the promotion rules.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Category {
    Boolean,
    Unsigned,
    Signed,
    Float,
}

impl DType {
    /// Every element type, in declaration order.
    pub const ALL: [DType; 12] = [
        DType::Bool,
        DType::U8,
        DType::U16,
        DType::U32,
        DType::U64,
        DType::I8,
        DType::I16,
        DType::I32,
        DType::I64,
        DType::F16,
        DType::F32,
        DType::BF16,
    ];

    /// Size in bytes of a single element.
    pub fn size_bytes(self) -> usize {
        match self {
            DType::Bool | DType::U8 | DType::I8 => 1,
            DType::U16 | DType::I16 | DType::F16 | DType::BF16 => 2,
            DType::U32 | DType::I32 | DType::F32 => 4,
            DType::U64 | DType::I64 => 8,
        }
    }

    fn category(self) -> Category {
        match self {
            DType::Bool => Category::Boolean,
            DType::U8 | DType::U16 | DType::U32 | DType::U64 => Category::Unsigned,
            DType::I8 | DType::I16 | DType::I32 | DType::I64 => Category::Signed,
            DType::F16 | DType::F32 | DType::BF16 => Category::Float,
        }
    }

    pub fn is_float(self) -> bool {
        self.category() == Category::Float
    }

    /// Promote two dtypes to the common result dtype of a binary op.
    ///
    /// Rules:
    /// - Same dtype → same dtype; Bool defers to the other side
    /// - Float + Float → wider float (F16 + BF16 → F32)
    /// - Int + Float → the float type
    /// - Int + Int of the same signedness → wider int
    /// - Unsigned + Signed → a signed type wide enough for both, F32 past 64 bits
    pub fn promote(a: DType, b: DType) -> DType {
        if a == b {
            return a;
        }
        match (a.category(), b.category()) {
            (Category::Boolean, _) => b,
            (_, Category::Boolean) => a,
            (Category::Float, Category::Float) => {
                if a.size_bytes() == b.size_bytes() {
                    DType::F32
                } else if a.size_bytes() > b.size_bytes() {
                    a
                } else {
                    b
                }
            }
            (Category::Float, _) => a,
            (_, Category::Float) => b,
            (Category::Unsigned, Category::Signed) => promote_mixed(a, b),
            (Category::Signed, Category::Unsigned) => promote_mixed(b, a),
            _ => {
                if a.size_bytes() >= b.size_bytes() {
                    a
                } else {
                    b
                }
            }
        }
    }

    /// The dtype itself if floating, F32 otherwise.
    pub fn at_least_float(self) -> DType {
        if self.is_float() { self } else { DType::F32 }
    }
}

fn promote_mixed(unsigned: DType, signed: DType) -> DType {
    if signed.size_bytes() > unsigned.size_bytes() {
        return signed;
    }
    match unsigned {
        DType::U8 => DType::I16,
        DType::U16 => DType::I32,
        DType::U32 => DType::I64,
        _ => DType::F32,
    }
}

impl std::fmt::Display for DType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            DType::Bool => "bool",
            DType::U8 => "uint8",
            DType::U16 => "uint16",
            DType::U32 => "uint32",
            DType::U64 => "uint64",
            DType::I8 => "int8",
            DType::I16 => "int16",
            DType::I32 => "int32",
            DType::I64 => "int64",
            DType::F16 => "float16",
            DType::F32 => "float32",
            DType::BF16 => "bfloat16",
        };
        f.write_str(name)
    }
}

/// Array shape (dimensions).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Shape(pub Vec<i64>);

impl Shape {
    pub fn new(dims: impl Into<Vec<i64>>) -> Self {
        Self(dims.into())
    }

    /// Scalar (rank-0) shape.
    pub fn scalar() -> Self {
        Self(vec![])
    }

    /// Number of dimensions (rank).
    pub fn ndim(&self) -> usize {
        self.0.len()
    }

    /// Total number of elements. Only meaningful on a validated shape.
    pub fn numel(&self) -> usize {
        self.0.iter().map(|&d| d as usize).product()
    }

    /// Check every dimension is non-negative and the element count fits in
    /// `usize`, returning that count.
    pub fn validate(&self) -> Result<usize> {
        let mut count: usize = 1;
        for &d in &self.0 {
            let d = usize::try_from(d).map_err(|_| {
                MlxError::InvalidArgument(format!("negative dimension in shape {self}"))
            })?;
            count = count.checked_mul(d).ok_or_else(|| {
                MlxError::InvalidArgument(format!("shape {self} overflows the element count"))
            })?;
        }
        Ok(count)
    }

    /// Get dimension at axis (supports negative indexing).
    pub fn dim(&self, axis: i32) -> Option<i64> {
        let ndim = self.0.len() as i32;
        let idx = if axis < 0 { ndim + axis } else { axis };
        if idx >= 0 && idx < ndim {
            Some(self.0[idx as usize])
        } else {
            None
        }
    }

    /// Row-major strides in elements.
    pub fn row_major_strides(&self) -> Vec<usize> {
        let mut strides = vec![0usize; self.0.len()];
        let mut acc = 1usize;
        for (i, &d) in self.0.iter().enumerate().rev() {
            strides[i] = acc;
            acc = acc.saturating_mul(d.max(0) as usize);
        }
        strides
    }

    /// Compute the broadcast shape of two shapes, or None if incompatible.
    pub fn broadcast_shapes(a: &Shape, b: &Shape) -> Option<Shape> {
        let a_dims = &a.0;
        let b_dims = &b.0;
        let max_ndim = a_dims.len().max(b_dims.len());

        let mut result = Vec::with_capacity(max_ndim);

        for i in 0..max_ndim {
            let da = if i < a_dims.len() {
                a_dims[a_dims.len() - 1 - i]
            } else {
                1
            };
            let db = if i < b_dims.len() {
                b_dims[b_dims.len() - 1 - i]
            } else {
                1
            };

            if da == db {
                result.push(da);
            } else if da == 1 {
                result.push(db);
            } else if db == 1 {
                result.push(da);
            } else {
                return None;
            }
        }

        result.reverse();
        Some(Shape::new(result))
    }
}

impl std::fmt::Display for Shape {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[")?;
        for (i, d) in self.0.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{d}")?;
        }
        write!(f, "]")
    }
}

/// Memory-layout flags of a materialized array.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Flags {
    pub contiguous: bool,
    pub row_contiguous: bool,
    pub col_contiguous: bool,
}

impl Flags {
    /// Derive the flags from a shape and its byte strides.
    ///
    /// Axes of size 1 never affect contiguity. Empty arrays are contiguous.
    pub fn from_layout(shape: &Shape, strides: &[usize], itemsize: usize) -> Self {
        if shape.0.contains(&0) {
            return Self {
                contiguous: true,
                row_contiguous: true,
                col_contiguous: true,
            };
        }
        let dims: Vec<(usize, usize)> = shape
            .0
            .iter()
            .map(|&d| d as usize)
            .zip(strides.iter().copied())
            .collect();
        let row_contiguous = packed(dims.iter().rev(), itemsize);
        let col_contiguous = packed(dims.iter(), itemsize);
        Self {
            contiguous: row_contiguous || col_contiguous,
            row_contiguous,
            col_contiguous,
        }
    }
}

fn packed<'a>(dims: impl Iterator<Item = &'a (usize, usize)>, itemsize: usize) -> bool {
    let mut expected = itemsize;
    for &(dim, stride) in dims {
        if dim == 1 {
            continue;
        }
        if stride != expected {
            return false;
        }
        expected *= dim;
    }
    true
}
