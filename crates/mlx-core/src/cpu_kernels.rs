//! Built-in CPU reference backend, used as the correctness oracle.
//!
//! A deliberately simple, safe Rust implementation of every op, generic over
//! the element type. It prioritizes correctness and readability over speed.

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, StandardNormal};

use crate::backend::{Backend, NodeInput};
use crate::buffer::{BinaryOp, Buffer, Element, try_collect};
use crate::graph::{OpKind, TensorMeta};
use crate::{MlxError, Result, Shape, with_dtype};

/// Reference CPU backend.
pub struct CpuRefBackend;

impl Backend for CpuRefBackend {
    fn eval_node(
        &self,
        op: &OpKind,
        inputs: &[NodeInput<'_>],
        output_meta: &TensorMeta,
    ) -> Result<Buffer> {
        match op {
            OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div => {
                let a = require_input(inputs, 0)?;
                let b = require_input(inputs, 1)?;
                let bop = op
                    .binary()
                    .ok_or(MlxError::Graph("elementwise op without binary kernel"))?;
                binary_elementwise(bop, a, b, output_meta)
            }
            OpKind::Slice { index } => {
                let a = require_input(inputs, 0)?;
                slice_axis0(a, *index)
            }
            OpKind::RandomNormal { key } => sample_normal(*key, output_meta),
        }
    }
}

fn require_input<'a>(inputs: &'a [NodeInput<'_>], idx: usize) -> Result<&'a NodeInput<'a>> {
    inputs
        .get(idx)
        .ok_or_else(|| MlxError::InvalidArgument(format!("expected input at index {idx}")))
}

/// Per-output-axis element strides into an input broadcast to `out`.
/// Broadcast axes get stride 0.
fn broadcast_strides(input: &Shape, out: &Shape) -> Vec<usize> {
    let pad = out.ndim() - input.ndim();
    let in_strides = input.row_major_strides();
    (0..out.ndim())
        .map(|d| {
            if d < pad || input.0[d - pad] == 1 {
                0
            } else {
                in_strides[d - pad]
            }
        })
        .collect()
}

fn source_index(mut flat: usize, out_dims: &[usize], strides: &[usize]) -> usize {
    let mut idx = 0usize;
    for (&dim, &stride) in out_dims.iter().zip(strides.iter()).rev() {
        idx += (flat % dim) * stride;
        flat /= dim;
    }
    idx
}

fn binary_elementwise(
    op: BinaryOp,
    a: &NodeInput<'_>,
    b: &NodeInput<'_>,
    out: &TensorMeta,
) -> Result<Buffer> {
    if a.shape.ndim() > out.shape.ndim() || b.shape.ndim() > out.shape.ndim() {
        return Err(MlxError::ShapeMismatch {
            expected: out.shape.0.clone(),
            got: a.shape.0.clone(),
        });
    }
    let lhs = a.data.cast(out.dtype)?;
    let rhs = b.data.cast(out.dtype)?;
    let a_strides = broadcast_strides(a.shape, &out.shape);
    let b_strides = broadcast_strides(b.shape, &out.shape);
    let out_dims: Vec<usize> = out.shape.0.iter().map(|&d| d as usize).collect();
    let total = out.shape.numel();

    with_dtype!(out.dtype, T => {
        let (x, y) = match (T::view(&lhs), T::view(&rhs)) {
            (Some(x), Some(y)) => (x, y),
            _ => return Err(MlxError::Graph("cast produced an unexpected dtype")),
        };
        let values = (0..total).map(|i| {
            let xi = source_index(i, &out_dims, &a_strides);
            let yi = source_index(i, &out_dims, &b_strides);
            T::apply(op, x[xi], y[yi])
        });
        Ok(T::wrap(try_collect(total, values)?))
    })
}

fn slice_axis0(a: &NodeInput<'_>, index: usize) -> Result<Buffer> {
    let rows = a.shape.0.first().copied().unwrap_or(0);
    let rows = usize::try_from(rows)
        .map_err(|_| MlxError::InvalidArgument(format!("invalid leading dimension {rows}")))?;
    if index >= rows {
        return Err(MlxError::InvalidArgument(format!(
            "slice index {index} out of range for leading dimension {rows}"
        )));
    }
    let row_len = a.data.len() / rows;
    a.data.range(index * row_len, (index + 1) * row_len)
}

/// Standard-normal samples; the same key always yields the same values.
pub fn sample_normal(key: u64, out: &TensorMeta) -> Result<Buffer> {
    if !out.dtype.is_float() {
        return Err(MlxError::UnsupportedDType {
            op: "random normal",
            dtype: out.dtype,
        });
    }
    let mut rng = StdRng::seed_from_u64(key);
    let n = out.shape.numel();
    with_dtype!(out.dtype, T => {
        let samples = (0..n).map(|_| {
            let v: f64 = StandardNormal.sample(&mut rng);
            T::cast_from(v)
        });
        Ok(T::wrap(try_collect(n, samples)?))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DType;

    fn meta(shape: Vec<i64>, dtype: DType) -> TensorMeta {
        TensorMeta {
            shape: Shape::new(shape),
            dtype,
        }
    }

    fn input<'a>(data: &'a Buffer, shape: &'a Shape) -> NodeInput<'a> {
        NodeInput {
            data,
            shape,
            dtype: data.dtype(),
        }
    }

    #[test]
    fn test_add_i32() {
        let a = Buffer::I32(vec![1, 2]);
        let b = Buffer::I32(vec![10, 20]);
        let s = Shape::new(vec![2]);
        let out = CpuRefBackend
            .eval_node(
                &OpKind::Add,
                &[input(&a, &s), input(&b, &s)],
                &meta(vec![2], DType::I32),
            )
            .unwrap();
        assert_eq!(out, Buffer::I32(vec![11, 22]));
    }

    #[test]
    fn test_broadcast_row() {
        let a = Buffer::F32(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0]);
        let b = Buffer::F32(vec![10.0, 20.0, 30.0]);
        let sa = Shape::new(vec![2, 3]);
        let sb = Shape::new(vec![3]);
        let out = CpuRefBackend
            .eval_node(
                &OpKind::Add,
                &[input(&a, &sa), input(&b, &sb)],
                &meta(vec![2, 3], DType::F32),
            )
            .unwrap();
        assert_eq!(
            out,
            Buffer::F32(vec![11.0, 22.0, 33.0, 14.0, 25.0, 36.0])
        );
    }

    #[test]
    fn test_broadcast_outer() {
        let a = Buffer::I64(vec![1, 2]);
        let b = Buffer::I64(vec![10, 20, 30]);
        let sa = Shape::new(vec![2, 1]);
        let sb = Shape::new(vec![1, 3]);
        let out = CpuRefBackend
            .eval_node(
                &OpKind::Mul,
                &[input(&a, &sa), input(&b, &sb)],
                &meta(vec![2, 3], DType::I64),
            )
            .unwrap();
        assert_eq!(out, Buffer::I64(vec![10, 20, 30, 20, 40, 60]));
    }

    #[test]
    fn test_mixed_dtype_casts_inputs() {
        let a = Buffer::U8(vec![1, 2]);
        let b = Buffer::F32(vec![0.5, 0.5]);
        let s = Shape::new(vec![2]);
        let out = CpuRefBackend
            .eval_node(
                &OpKind::Sub,
                &[input(&a, &s), input(&b, &s)],
                &meta(vec![2], DType::F32),
            )
            .unwrap();
        assert_eq!(out, Buffer::F32(vec![0.5, 1.5]));
    }

    #[test]
    fn test_slice_axis0() {
        let a = Buffer::U16(vec![1, 2, 3, 4, 5, 6]);
        let s = Shape::new(vec![3, 2]);
        let out = CpuRefBackend
            .eval_node(
                &OpKind::Slice { index: 1 },
                &[input(&a, &s)],
                &meta(vec![2], DType::U16),
            )
            .unwrap();
        assert_eq!(out, Buffer::U16(vec![3, 4]));
    }

    #[test]
    fn test_slice_out_of_range() {
        let a = Buffer::U16(vec![1, 2]);
        let s = Shape::new(vec![2]);
        let r = CpuRefBackend.eval_node(
            &OpKind::Slice { index: 2 },
            &[input(&a, &s)],
            &meta(vec![], DType::U16),
        );
        assert!(r.is_err());
    }

    #[test]
    fn test_normal_deterministic_per_key() {
        let m = meta(vec![64], DType::F32);
        let a = sample_normal(42, &m).unwrap();
        let b = sample_normal(42, &m).unwrap();
        let c = sample_normal(43, &m).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
        let vals = a.to_vec_f64();
        let mean = vals.iter().sum::<f64>() / vals.len() as f64;
        assert!(mean.abs() < 0.5, "mean {mean} too far from 0");
    }

    #[test]
    fn test_normal_rejects_integer() {
        assert!(sample_normal(1, &meta(vec![2], DType::I32)).is_err());
    }

    #[test]
    fn test_missing_input() {
        let r = CpuRefBackend.eval_node(&OpKind::Add, &[], &meta(vec![1], DType::F32));
        assert!(r.is_err());
    }
}
