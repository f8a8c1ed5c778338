//! Conformance testing infrastructure.
//!
//! Provides straightforward f64 reference implementations of the elementwise
//! ops, written independently of the engine kernels, and tolerance-based
//! comparison helpers. Engine and boundary tests compare their outputs
//! against these oracles.

/// Elementwise op understood by the reference evaluator.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum RefOp {
    Add,
    Subtract,
    Multiply,
    Divide,
}

impl RefOp {
    pub fn apply(self, x: f64, y: f64) -> f64 {
        match self {
            RefOp::Add => x + y,
            RefOp::Subtract => x - y,
            RefOp::Multiply => x * y,
            RefOp::Divide => x / y,
        }
    }
}

/// NumPy-style broadcast of two shapes, or `None` when incompatible.
pub fn broadcast_shape(a: &[i64], b: &[i64]) -> Option<Vec<i64>> {
    let n = a.len().max(b.len());
    let dim = |s: &[i64], i: usize| -> i64 {
        if i < n - s.len() { 1 } else { s[i - (n - s.len())] }
    };
    (0..n)
        .map(|i| match (dim(a, i), dim(b, i)) {
            (x, y) if x == y => Some(x),
            (1, y) => Some(y),
            (x, 1) => Some(x),
            _ => None,
        })
        .collect()
}

fn gather(data: &[f64], shape: &[i64], out_shape: &[i64], coords: &[i64]) -> f64 {
    let offset = out_shape.len() - shape.len();
    let mut flat = 0i64;
    for (d, &extent) in shape.iter().enumerate() {
        let c = if extent == 1 { 0 } else { coords[d + offset] };
        flat = flat * extent + c;
    }
    data[flat as usize]
}

/// Reference broadcasting binary op over row-major f64 data.
///
/// Panics on incompatible shapes.
pub fn reference_binary(op: RefOp, a: &[f64], a_shape: &[i64], b: &[f64], b_shape: &[i64]) -> Vec<f64> {
    let out_shape = broadcast_shape(a_shape, b_shape)
        .unwrap_or_else(|| panic!("shapes {a_shape:?} and {b_shape:?} do not broadcast"));
    let total: i64 = out_shape.iter().product();
    let mut coords = vec![0i64; out_shape.len()];
    let mut out = Vec::with_capacity(total as usize);
    for _ in 0..total {
        let x = gather(a, a_shape, &out_shape, &coords);
        let y = gather(b, b_shape, &out_shape, &coords);
        out.push(op.apply(x, y));
        for d in (0..coords.len()).rev() {
            coords[d] += 1;
            if coords[d] < out_shape[d] {
                break;
            }
            coords[d] = 0;
        }
    }
    out
}

/// Assert two f64 slices are element-wise close.
pub fn assert_allclose(got: &[f64], expected: &[f64], atol: f64, rtol: f64) {
    assert_eq!(
        got.len(),
        expected.len(),
        "length mismatch: got={} expected={}",
        got.len(),
        expected.len()
    );
    for (i, (x, y)) in got.iter().zip(expected.iter()).enumerate() {
        if x.is_nan() && y.is_nan() {
            continue;
        }
        if x == y {
            continue;
        }
        let diff = (x - y).abs();
        let tol = atol + rtol * y.abs();
        assert!(
            diff <= tol,
            "mismatch at [{i}]: got={x} expected={y} diff={diff} tol={tol}"
        );
    }
}

/// Sample mean and (population) standard deviation.
pub fn mean_std(values: &[f64]) -> (f64, f64) {
    let n = values.len().max(1) as f64;
    let mean = values.iter().sum::<f64>() / n;
    let var = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_allclose_exact() {
        assert_allclose(&[1.0, 2.0, 3.0], &[1.0, 2.0, 3.0], 1e-6, 1e-6);
    }

    #[test]
    fn test_allclose_within_tolerance() {
        assert_allclose(&[1.0001], &[1.0], 1e-3, 1e-3);
    }

    #[test]
    fn test_allclose_infinities_and_nan() {
        assert_allclose(&[f64::INFINITY, f64::NAN], &[f64::INFINITY, f64::NAN], 0.0, 0.0);
    }

    #[test]
    #[should_panic(expected = "mismatch")]
    fn test_allclose_fails() {
        assert_allclose(&[1.0], &[2.0], 1e-6, 1e-6);
    }

    #[test]
    fn test_broadcast_shape() {
        assert_eq!(broadcast_shape(&[2, 1], &[3]), Some(vec![2, 3]));
        assert_eq!(broadcast_shape(&[], &[4]), Some(vec![4]));
        assert_eq!(broadcast_shape(&[2], &[3]), None);
    }

    #[test]
    fn test_reference_binary_outer() {
        let out = reference_binary(RefOp::Multiply, &[1.0, 2.0], &[2, 1], &[10.0, 20.0, 30.0], &[3]);
        assert_eq!(out, vec![10.0, 20.0, 30.0, 20.0, 40.0, 60.0]);
    }

    #[test]
    fn test_mean_std() {
        let (m, s) = mean_std(&[1.0, 3.0]);
        assert_eq!(m, 2.0);
        assert_eq!(s, 1.0);
    }
}
