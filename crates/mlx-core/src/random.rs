//! Global pseudo-random state.
//!
//! Random arrays are lazy: constructing one draws a 64-bit key from the
//! global state and records a `RandomNormal { key }` node. Sampling happens
//! at evaluation, so reseeding the state reproduces the same arrays.

use std::sync::LazyLock;

use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use smallvec::SmallVec;

use crate::array::{Array, byte_strides};
use crate::graph::OpKind;
use crate::{DType, MlxError, Result, Shape};

/// Environment variable holding the initial seed of the global state.
pub const SEED_ENV: &str = "MLX_RS_SEED";

/// Key generator backing the random constructors.
#[derive(Debug)]
pub struct RandomState {
    rng: StdRng,
}

impl RandomState {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
        }
    }

    /// Seed from `MLX_RS_SEED` when it parses as a `u64`, else from OS entropy.
    pub fn from_env() -> Self {
        match std::env::var(SEED_ENV).ok().and_then(|s| s.trim().parse::<u64>().ok()) {
            Some(seed) => {
                tracing::debug!(seed, "seeding random state from environment");
                Self::new(seed)
            }
            None => Self {
                rng: StdRng::from_os_rng(),
            },
        }
    }

    pub fn seed(&mut self, seed: u64) {
        self.rng = StdRng::seed_from_u64(seed);
    }

    pub fn next_key(&mut self) -> u64 {
        self.rng.random()
    }

    /// Record a standard-normal array, advancing this state by one key.
    pub fn normal(&mut self, shape: &Shape, dtype: DType) -> Result<Array> {
        byte_strides(shape, dtype)?;
        if !dtype.is_float() {
            return Err(MlxError::UnsupportedDType {
                op: "random normal",
                dtype,
            });
        }
        let key = self.next_key();
        Array::from_op(
            OpKind::RandomNormal { key },
            SmallVec::new(),
            shape.clone(),
            dtype,
        )
    }
}

static GLOBAL_STATE: LazyLock<Mutex<RandomState>> =
    LazyLock::new(|| Mutex::new(RandomState::from_env()));

/// Reseed the global random state.
pub fn seed(seed: u64) {
    GLOBAL_STATE.lock().seed(seed);
}

/// Standard-normal array drawn from the global state.
///
/// Invalid arguments are rejected before a key is consumed.
pub fn normal(shape: &Shape, dtype: DType) -> Result<Array> {
    GLOBAL_STATE.lock().normal(shape, dtype)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_seed_same_values() {
        let shape = Shape::new(vec![4, 4]);
        let a = RandomState::new(7).normal(&shape, DType::F32).unwrap();
        let b = RandomState::new(7).normal(&shape, DType::F32).unwrap();
        assert!(!a.is_evaled());
        assert_eq!(a.to_vec_f64().unwrap(), b.to_vec_f64().unwrap());
    }

    #[test]
    fn test_successive_draws_differ() {
        let mut state = RandomState::new(7);
        let shape = Shape::new(vec![8]);
        let a = state.normal(&shape, DType::F32).unwrap();
        let b = state.normal(&shape, DType::F32).unwrap();
        assert_ne!(a.to_vec_f64().unwrap(), b.to_vec_f64().unwrap());
    }

    #[test]
    fn test_rejection_does_not_advance() {
        let shape = Shape::new(vec![3]);
        let mut s1 = RandomState::new(11);
        assert!(s1.normal(&shape, DType::I32).is_err());
        assert!(s1.normal(&Shape::new(vec![-2]), DType::F32).is_err());
        let huge = Shape::new(vec![i32::MAX as i64, i32::MAX as i64, 2]);
        assert!(s1.normal(&huge, DType::F32).is_err());
        let a = s1.normal(&shape, DType::F32).unwrap();
        let b = RandomState::new(11).normal(&shape, DType::F32).unwrap();
        assert_eq!(a.to_vec_f64().unwrap(), b.to_vec_f64().unwrap());
    }

    #[test]
    fn test_half_precision_samples() {
        let a = RandomState::new(3)
            .normal(&Shape::new(vec![16]), DType::BF16)
            .unwrap();
        assert_eq!(a.dtype(), DType::BF16);
        assert_eq!(a.to_vec_f64().unwrap().len(), 16);
    }
}
