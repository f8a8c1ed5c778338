//! Backend trait and Stream: the pluggable compute engine behind array evaluation.
//!
//! A `Backend` knows how to execute a single graph node (op + inputs → output).
//! A `Stream` schedules the pending subgraph of the arrays being evaluated,
//! feeds materialized inputs to its backend and stores the results back on
//! the nodes.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, LazyLock};

use crate::array::Array;
use crate::buffer::Buffer;
use crate::graph::{self, OpKind, TensorMeta};
use crate::types::{DType, Shape};
use crate::{MlxError, Result};

/// Materialized input data passed to a backend for evaluation.
pub struct NodeInput<'a> {
    pub data: &'a Buffer,
    pub shape: &'a Shape,
    pub dtype: DType,
}

/// Pluggable compute backend.
///
/// Backends evaluate individual graph nodes. The `Stream` handles scheduling
/// (topological sort) and buffer management; the backend only needs to
/// implement the actual kernel dispatch.
pub trait Backend: Send + Sync {
    /// Evaluate a single op node given its materialized inputs.
    fn eval_node(
        &self,
        op: &OpKind,
        inputs: &[NodeInput<'_>],
        output_meta: &TensorMeta,
    ) -> Result<Buffer>;
}

/// A computation stream binding lazily built arrays to a backend.
pub struct Stream {
    backend: Box<dyn Backend>,
    nodes_evaluated: AtomicU64,
}

impl Stream {
    /// Create a new stream with the given backend.
    pub fn new(backend: Box<dyn Backend>) -> Self {
        Self {
            backend,
            nodes_evaluated: AtomicU64::new(0),
        }
    }

    /// Materialize every array in `outputs`.
    ///
    /// With `retain_graph == false` each array touched by this call is
    /// detached afterwards, dropping its primitive and its references to
    /// inputs.
    pub fn eval(&self, outputs: &[Array], retain_graph: bool) -> Result<()> {
        let order = graph::topo_sort(outputs);

        for array in &order {
            if array.is_evaled() {
                continue;
            }
            let primitive = array
                .primitive()
                .ok_or(MlxError::Graph("pending array has no primitive"))?;

            // Hold the input buffers alive for the duration of the kernel.
            let buffers: Vec<Arc<Buffer>> = primitive
                .inputs()
                .iter()
                .map(|input| input.buffer())
                .collect::<Result<_>>()?;
            let inputs: Vec<NodeInput<'_>> = buffers
                .iter()
                .zip(primitive.inputs())
                .map(|(data, input)| NodeInput {
                    data: data.as_ref(),
                    shape: input.shape(),
                    dtype: input.dtype(),
                })
                .collect();

            let meta = TensorMeta {
                shape: array.shape().clone(),
                dtype: array.dtype(),
            };
            let result = self.backend.eval_node(primitive.op(), &inputs, &meta)?;
            if result.dtype() != meta.dtype || result.len() != meta.shape.numel() {
                return Err(MlxError::ShapeMismatch {
                    expected: meta.shape.0.clone(),
                    got: vec![result.len() as i64],
                });
            }
            array.set_data(result);
            self.nodes_evaluated.fetch_add(1, Ordering::Relaxed);
        }

        if !retain_graph {
            for array in &order {
                array.detach();
            }
        }
        Ok(())
    }

    /// Total number of nodes this stream has computed.
    pub fn nodes_evaluated(&self) -> u64 {
        self.nodes_evaluated.load(Ordering::Relaxed)
    }
}

impl std::fmt::Debug for Stream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stream")
            .field("nodes_evaluated", &self.nodes_evaluated())
            .finish_non_exhaustive()
    }
}

/// The default stream using the CPU reference backend.
static DEFAULT_STREAM: LazyLock<Arc<Stream>> =
    LazyLock::new(|| Arc::new(Stream::new(Box::new(crate::cpu_kernels::CpuRefBackend))));

/// Get the default computation stream.
pub fn default_stream() -> Arc<Stream> {
    Arc::clone(&DEFAULT_STREAM)
}

#[cfg(test)]
mod tests {
    use super::*;

    struct FailingBackend;

    impl Backend for FailingBackend {
        fn eval_node(&self, _: &OpKind, _: &[NodeInput<'_>], _: &TensorMeta) -> Result<Buffer> {
            Err(MlxError::InvalidArgument("backend refused".into()))
        }
    }

    #[test]
    fn test_stream_eval_add() {
        let a = Array::from_slice(&[1.0f32, 2.0], &Shape::new(vec![2])).unwrap();
        let b = Array::from_slice(&[3.0f32, 4.0], &Shape::new(vec![2])).unwrap();
        let c = a.add(&b).unwrap();
        assert!(!c.is_evaled());
        default_stream().eval(&[c.clone()], true).unwrap();
        assert!(c.is_evaled());
        assert_eq!(c.to_vec_f64().unwrap(), vec![4.0, 6.0]);
        assert!(c.has_primitive());
    }

    #[test]
    fn test_stream_eval_detaches_without_retain() {
        let a = Array::from_slice(&[1i32, 2], &Shape::new(vec![2])).unwrap();
        let c = a.add(&a).unwrap();
        default_stream().eval(&[c.clone()], false).unwrap();
        assert!(c.is_evaled());
        assert!(!c.has_primitive());
    }

    #[test]
    fn test_backend_failure_propagates() {
        let stream = Arc::new(Stream::new(Box::new(FailingBackend)));
        let a = Array::from_slice(&[1.0f32], &Shape::new(vec![1])).unwrap();
        let c = a.add(&a).unwrap();
        assert!(stream.eval(&[c.clone()], true).is_err());
        assert!(!c.is_evaled());
    }
}
