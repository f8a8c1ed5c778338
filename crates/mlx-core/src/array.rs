//! Array type: a lazy, shared handle to a node in the computation graph.
//!
//! Operations on arrays record nodes in the graph. Actual computation is
//! deferred until `eval()` (or `item()`) is called, at which point the
//! stream topologically sorts the pending subgraph and dispatches to the
//! backend. Cloning an `Array` shares the node.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Weak};

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::backend::{Stream, default_stream};
use crate::buffer::{BinaryOp, Buffer, Element};
use crate::graph::{NodeId, OpKind, Primitive, TensorMeta};
use crate::{DType, Flags, MlxError, Result, Shape};

static LIVE_NODES: AtomicUsize = AtomicUsize::new(0);

/// Number of array nodes currently alive in the process.
pub fn live_arrays() -> usize {
    LIVE_NODES.load(Ordering::Relaxed)
}

#[derive(Default)]
struct NodeState {
    data: Option<Arc<Buffer>>,
    flags: Flags,
    primitive: Option<Arc<Primitive>>,
    tracer: bool,
}

struct ArrayNode {
    id: NodeId,
    meta: TensorMeta,
    /// Row-major byte strides.
    strides: Vec<usize>,
    stream: Arc<Stream>,
    state: Mutex<NodeState>,
}

impl Drop for ArrayNode {
    fn drop(&mut self) {
        LIVE_NODES.fetch_sub(1, Ordering::Relaxed);
        // Unlink the producing graph with a worklist: releasing the last
        // handle to a long lazy chain must not recurse once per node.
        let mut pending: Vec<Arc<Primitive>> =
            self.state.get_mut().primitive.take().into_iter().collect();
        while let Some(primitive) = pending.pop() {
            let Some(primitive) = Arc::into_inner(primitive) else {
                continue;
            };
            for input in primitive.into_inputs() {
                if let Some(mut node) = Arc::into_inner(input.node) {
                    pending.extend(node.state.get_mut().primitive.take());
                }
            }
        }
    }
}

/// Row-major byte strides for `shape`, rejecting shapes whose byte size
/// does not fit in `usize`.
pub(crate) fn byte_strides(shape: &Shape, dtype: DType) -> Result<Vec<usize>> {
    let count = shape.validate()?;
    let itemsize = dtype.size_bytes();
    let overflow =
        || MlxError::InvalidArgument(format!("shape {shape} overflows the byte count for {dtype}"));
    count.checked_mul(itemsize).ok_or_else(overflow)?;
    shape
        .row_major_strides()
        .into_iter()
        .map(|s| s.checked_mul(itemsize).ok_or_else(overflow))
        .collect()
}

/// An array handle.
#[derive(Clone)]
pub struct Array {
    node: Arc<ArrayNode>,
}

/// Non-owning reference to an array node.
#[derive(Clone, Debug)]
pub struct WeakArray {
    id: NodeId,
    node: Weak<ArrayNode>,
}

impl WeakArray {
    pub fn upgrade(&self) -> Option<Array> {
        self.node.upgrade().map(|node| Array { node })
    }

    /// Id of the referenced node, available even after it was dropped.
    pub fn id(&self) -> NodeId {
        self.id
    }
}

impl Array {
    // ── Constructors ────────────────────────────────────────────────────

    fn with_state(
        meta: TensorMeta,
        strides: Vec<usize>,
        stream: Arc<Stream>,
        state: NodeState,
    ) -> Self {
        LIVE_NODES.fetch_add(1, Ordering::Relaxed);
        Self {
            node: Arc::new(ArrayNode {
                id: NodeId::fresh(),
                meta,
                strides,
                stream,
                state: Mutex::new(state),
            }),
        }
    }

    /// Create a materialized array that owns `data`.
    pub fn from_buffer(data: Buffer, shape: &Shape) -> Result<Self> {
        let expected = shape.validate()?;
        let strides = byte_strides(shape, data.dtype())?;
        if data.len() != expected {
            return Err(MlxError::InvalidArgument(format!(
                "data length {} does not match shape {} (expected {})",
                data.len(),
                shape,
                expected,
            )));
        }
        let meta = TensorMeta {
            shape: shape.clone(),
            dtype: data.dtype(),
        };
        let array = Self::with_state(meta, strides, default_stream(), NodeState::default());
        array.set_data(data);
        Ok(array)
    }

    /// Create an array from typed data, copied.
    pub fn from_slice<T: Element>(data: &[T], shape: &Shape) -> Result<Self> {
        Self::from_vec(data.to_vec(), shape)
    }

    /// Create an array taking ownership of typed data.
    pub fn from_vec<T: Element>(data: Vec<T>, shape: &Shape) -> Result<Self> {
        Self::from_buffer(T::wrap(data), shape)
    }

    /// Rank-0 array holding `value`, typed by `T`.
    pub fn from_scalar<T: Element>(value: T) -> Self {
        let meta = TensorMeta {
            shape: Shape::scalar(),
            dtype: T::DTYPE,
        };
        let array = Self::with_state(meta, Vec::new(), default_stream(), NodeState::default());
        array.set_data(T::wrap(vec![value]));
        array
    }

    /// Rank-0 array holding `value` converted to `dtype`.
    pub fn from_f64(value: f64, dtype: DType) -> Result<Self> {
        let meta = TensorMeta {
            shape: Shape::scalar(),
            dtype,
        };
        let data = Buffer::from_f64(dtype, &[value])?;
        let array = Self::with_state(meta, Vec::new(), default_stream(), NodeState::default());
        array.set_data(data);
        Ok(array)
    }

    /// Allocate storage for `shape` without meaningful contents.
    ///
    /// The storage is zero-filled; callers must not rely on the values.
    pub fn uninit(shape: &Shape, dtype: DType) -> Result<Self> {
        let n = shape.validate()?;
        byte_strides(shape, dtype)?;
        Self::from_buffer(Buffer::zeros(dtype, n)?, shape)
    }

    /// A materialized float32 array with a single zero-length axis.
    pub fn empty() -> Self {
        let meta = TensorMeta {
            shape: Shape::new(vec![0]),
            dtype: DType::F32,
        };
        let strides = vec![DType::F32.size_bytes()];
        let array = Self::with_state(meta, strides, default_stream(), NodeState::default());
        array.set_data(Buffer::F32(Vec::new()));
        array
    }

    /// Record a pending node produced by `op` on the default stream.
    pub fn from_op(
        op: OpKind,
        inputs: SmallVec<[Array; 2]>,
        shape: Shape,
        dtype: DType,
    ) -> Result<Self> {
        let strides = byte_strides(&shape, dtype)?;
        if inputs.len() != op.arity() {
            return Err(MlxError::InvalidArgument(format!(
                "{} expects {} inputs, got {}",
                op.name().to_string_lossy(),
                op.arity(),
                inputs.len()
            )));
        }
        let stream = inputs
            .first()
            .map(|a| Arc::clone(&a.node.stream))
            .unwrap_or_else(default_stream);
        let state = NodeState {
            primitive: Some(Arc::new(Primitive::new(op, inputs))),
            ..NodeState::default()
        };
        Ok(Self::with_state(TensorMeta { shape, dtype }, strides, stream, state))
    }

    // ── Elementwise ops ─────────────────────────────────────────────────

    fn binary_op(&self, rhs: &Array, op: BinaryOp) -> Result<Array> {
        let shape = Shape::broadcast_shapes(self.shape(), rhs.shape()).ok_or_else(|| {
            MlxError::ShapeMismatch {
                expected: self.shape().0.clone(),
                got: rhs.shape().0.clone(),
            }
        })?;
        let mut dtype = DType::promote(self.dtype(), rhs.dtype());
        match op {
            BinaryOp::Sub if dtype == DType::Bool => {
                return Err(MlxError::UnsupportedDType {
                    op: "subtract",
                    dtype,
                });
            }
            BinaryOp::Div => dtype = dtype.at_least_float(),
            _ => {}
        }
        Array::from_op(
            OpKind::from(op),
            SmallVec::from_buf([self.clone(), rhs.clone()]),
            shape,
            dtype,
        )
    }

    /// Element-wise addition with broadcasting.
    pub fn add(&self, rhs: &Array) -> Result<Array> {
        self.binary_op(rhs, BinaryOp::Add)
    }

    /// Element-wise subtraction with broadcasting.
    pub fn subtract(&self, rhs: &Array) -> Result<Array> {
        self.binary_op(rhs, BinaryOp::Sub)
    }

    /// Element-wise multiplication with broadcasting.
    pub fn multiply(&self, rhs: &Array) -> Result<Array> {
        self.binary_op(rhs, BinaryOp::Mul)
    }

    /// Element-wise true division; integer inputs yield a float result.
    pub fn divide(&self, rhs: &Array) -> Result<Array> {
        self.binary_op(rhs, BinaryOp::Div)
    }

    /// Row `index` along the leading axis, computed lazily.
    pub fn index_axis0(&self, index: usize) -> Result<Array> {
        let rows = match self.shape().0.first() {
            Some(&rows) => usize::try_from(rows).map_err(|_| {
                MlxError::InvalidArgument(format!("invalid leading dimension {rows}"))
            })?,
            None => {
                return Err(MlxError::InvalidArgument(
                    "cannot index a 0-d array".into(),
                ));
            }
        };
        if index >= rows {
            return Err(MlxError::InvalidArgument(format!(
                "index {index} out of range for leading dimension {rows}"
            )));
        }
        Array::from_op(
            OpKind::Slice { index },
            SmallVec::from_elem(self.clone(), 1),
            Shape::new(self.shape().0[1..].to_vec()),
            self.dtype(),
        )
    }

    // ── Materialization ─────────────────────────────────────────────────

    /// Materialize the array, triggering evaluation of the pending graph.
    pub fn eval(&self, retain_graph: bool) -> Result<()> {
        self.node.stream.eval(std::slice::from_ref(self), retain_graph)
    }

    /// Evaluate and read the single element of a one-element array.
    pub fn item<T: Element>(&self, retain_graph: bool) -> Result<T> {
        if self.size() != 1 {
            return Err(MlxError::InvalidArgument(format!(
                "item can only be called on arrays of size 1, got size {}",
                self.size()
            )));
        }
        self.eval(retain_graph)?;
        let buffer = self.buffer()?;
        buffer
            .as_slice::<T>()
            .and_then(|s| s.first().copied())
            .ok_or(MlxError::UnsupportedDType {
                op: "item",
                dtype: self.dtype(),
            })
    }

    /// Evaluate and copy the data out widened to f64.
    pub fn to_vec_f64(&self) -> Result<Vec<f64>> {
        self.eval(true)?;
        Ok(self.buffer()?.to_vec_f64())
    }

    /// Materialized storage. Fails if the array has not been evaluated.
    pub fn buffer(&self) -> Result<Arc<Buffer>> {
        self.node
            .state
            .lock()
            .data
            .clone()
            .ok_or(MlxError::NotEvaluated)
    }

    pub(crate) fn set_data(&self, data: Buffer) {
        let flags = Flags::from_layout(self.shape(), self.strides(), self.itemsize());
        let mut state = self.node.state.lock();
        state.data = Some(Arc::new(data));
        state.flags = flags;
    }

    pub fn is_evaled(&self) -> bool {
        self.node.state.lock().data.is_some()
    }

    // ── Graph ───────────────────────────────────────────────────────────

    /// Cut the array off from the graph that produced it.
    pub fn detach(&self) {
        self.node.state.lock().primitive = None;
    }

    pub fn has_primitive(&self) -> bool {
        self.node.state.lock().primitive.is_some()
    }

    pub fn primitive(&self) -> Option<Arc<Primitive>> {
        self.node.state.lock().primitive.clone()
    }

    pub(crate) fn input_arrays(&self) -> Vec<Array> {
        self.primitive()
            .map(|p| p.inputs().to_vec())
            .unwrap_or_default()
    }

    pub fn set_tracer(&self, is_tracer: bool) {
        self.node.state.lock().tracer = is_tracer;
    }

    pub fn is_tracer(&self) -> bool {
        self.node.state.lock().tracer
    }

    pub fn downgrade(&self) -> WeakArray {
        WeakArray {
            id: self.id(),
            node: Arc::downgrade(&self.node),
        }
    }

    // ── Accessors ───────────────────────────────────────────────────────

    pub fn id(&self) -> NodeId {
        self.node.id
    }

    pub fn shape(&self) -> &Shape {
        &self.node.meta.shape
    }

    pub fn dtype(&self) -> DType {
        self.node.meta.dtype
    }

    pub fn ndim(&self) -> usize {
        self.shape().ndim()
    }

    /// Number of elements.
    pub fn size(&self) -> usize {
        self.shape().numel()
    }

    pub fn itemsize(&self) -> usize {
        self.dtype().size_bytes()
    }

    pub fn nbytes(&self) -> usize {
        self.size() * self.itemsize()
    }

    /// Byte strides per dimension.
    pub fn strides(&self) -> &[usize] {
        &self.node.strides
    }

    /// Layout flags; all false until the array is materialized.
    pub fn flags(&self) -> Flags {
        self.node.state.lock().flags
    }

    /// Number of elements in the backing buffer.
    pub fn data_size(&self) -> Result<usize> {
        Ok(self.buffer()?.len())
    }
}

impl std::fmt::Debug for Array {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Array")
            .field("id", &self.id())
            .field("shape", self.shape())
            .field("dtype", &self.dtype())
            .field("evaled", &self.is_evaled())
            .finish()
    }
}
