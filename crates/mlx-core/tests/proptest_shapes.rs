//! Property tests: engine elementwise ops against the f64 reference oracle.

use mlx_conformance::{RefOp, assert_allclose, reference_binary};
use mlx_core::{Array, DType, Shape};
use proptest::prelude::*;

/// A shape and a second shape that broadcasts against it.
fn broadcast_pair() -> impl Strategy<Value = (Vec<i64>, Vec<i64>)> {
    prop::collection::vec(1i64..5, 0..4).prop_flat_map(|shape| {
        let n = shape.len();
        (
            Just(shape),
            prop::collection::vec(any::<bool>(), n),
            0..=n,
        )
            .prop_map(|(shape, ones, drop)| {
                let other: Vec<i64> = shape
                    .iter()
                    .zip(ones)
                    .map(|(&d, one)| if one { 1 } else { d })
                    .skip(drop)
                    .collect();
                (shape, other)
            })
    })
}

fn values(shape: &[i64], seed: i64) -> Vec<f32> {
    let n: i64 = shape.iter().product();
    (0..n).map(|i| ((i * 7 + seed) % 11 + 1) as f32).collect()
}

fn check(op: RefOp, lhs_shape: &[i64], rhs_shape: &[i64]) -> Result<(), TestCaseError> {
    let x = values(lhs_shape, 3);
    let y = values(rhs_shape, 5);
    let a = Array::from_slice(&x, &Shape::new(lhs_shape.to_vec())).unwrap();
    let b = Array::from_slice(&y, &Shape::new(rhs_shape.to_vec())).unwrap();
    let out = match op {
        RefOp::Add => a.add(&b),
        RefOp::Subtract => a.subtract(&b),
        RefOp::Multiply => a.multiply(&b),
        RefOp::Divide => a.divide(&b),
    }
    .unwrap();
    prop_assert_eq!(out.dtype(), DType::F32);

    let xf: Vec<f64> = x.iter().map(|&v| v as f64).collect();
    let yf: Vec<f64> = y.iter().map(|&v| v as f64).collect();
    let expected = reference_binary(op, &xf, lhs_shape, &yf, rhs_shape);
    assert_allclose(&out.to_vec_f64().unwrap(), &expected, 1e-6, 1e-6);
    Ok(())
}

proptest! {
    #[test]
    fn add_matches_reference((lhs, rhs) in broadcast_pair()) {
        check(RefOp::Add, &lhs, &rhs)?;
        check(RefOp::Add, &rhs, &lhs)?;
    }

    #[test]
    fn subtract_matches_reference((lhs, rhs) in broadcast_pair()) {
        check(RefOp::Subtract, &lhs, &rhs)?;
    }

    #[test]
    fn multiply_matches_reference((lhs, rhs) in broadcast_pair()) {
        check(RefOp::Multiply, &lhs, &rhs)?;
    }

    #[test]
    fn divide_matches_reference((lhs, rhs) in broadcast_pair()) {
        check(RefOp::Divide, &lhs, &rhs)?;
    }

    #[test]
    fn shape_metadata_consistent(dims in prop::collection::vec(0i64..6, 0..5), idx in 0usize..12) {
        let dtype = DType::ALL[idx];
        let shape = Shape::new(dims.clone());
        let a = Array::uninit(&shape, dtype).unwrap();
        let count: i64 = dims.iter().product();
        prop_assert_eq!(a.size() as i64, count);
        prop_assert_eq!(a.nbytes(), a.size() * dtype.size_bytes());
        prop_assert_eq!(a.ndim(), dims.len());
        prop_assert_eq!(a.data_size().unwrap(), a.size());
        prop_assert!(a.flags().row_contiguous);
    }

    #[test]
    fn promotion_is_commutative(i in 0usize..12, j in 0usize..12) {
        let (a, b) = (DType::ALL[i], DType::ALL[j]);
        prop_assert_eq!(DType::promote(a, b), DType::promote(b, a));
    }
}
