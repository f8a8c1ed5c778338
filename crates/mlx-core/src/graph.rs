//! Lazy computation graph IR.
//!
//! Arrays are handles to nodes in this graph. An un-materialized node carries
//! a [`Primitive`]: the op that produces it plus the input arrays. Computation
//! is deferred until `eval()` is called, at which point the scheduler
//! topologically sorts the pending subgraph and dispatches to the backend.

use std::collections::HashSet;
use std::ffi::CStr;
use std::sync::atomic::{AtomicU64, Ordering};

use smallvec::SmallVec;

use crate::array::Array;
use crate::types::{DType, Shape};
use crate::buffer::BinaryOp;

/// Unique identifier for a node in the computation graph.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u64);

static NEXT_NODE_ID: AtomicU64 = AtomicU64::new(1);

impl NodeId {
    pub(crate) fn fresh() -> Self {
        NodeId(NEXT_NODE_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }
}

/// Metadata about an array (known before materialization).
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct TensorMeta {
    pub shape: Shape,
    pub dtype: DType,
}

/// The set of operations a node can be produced by.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum OpKind {
    // ── Elementwise ─────────────────────────────────────────────────────
    Add,
    Sub,
    Mul,
    Div,

    // ── Indexing ────────────────────────────────────────────────────────
    /// Row `index` along axis 0.
    Slice { index: usize },

    // ── Random ──────────────────────────────────────────────────────────
    /// Standard-normal samples drawn from a generator seeded with `key`.
    RandomNormal { key: u64 },
}

impl OpKind {
    /// Human-readable op name.
    pub fn name(&self) -> &'static CStr {
        match self {
            OpKind::Add => c"Add",
            OpKind::Sub => c"Subtract",
            OpKind::Mul => c"Multiply",
            OpKind::Div => c"Divide",
            OpKind::Slice { .. } => c"Slice",
            OpKind::RandomNormal { .. } => c"RandomNormal",
        }
    }

    /// Number of array inputs the op consumes.
    pub fn arity(&self) -> usize {
        match self {
            OpKind::Add | OpKind::Sub | OpKind::Mul | OpKind::Div => 2,
            OpKind::Slice { .. } => 1,
            OpKind::RandomNormal { .. } => 0,
        }
    }

    pub fn binary(&self) -> Option<BinaryOp> {
        match self {
            OpKind::Add => Some(BinaryOp::Add),
            OpKind::Sub => Some(BinaryOp::Sub),
            OpKind::Mul => Some(BinaryOp::Mul),
            OpKind::Div => Some(BinaryOp::Div),
            _ => None,
        }
    }
}

impl From<BinaryOp> for OpKind {
    fn from(op: BinaryOp) -> Self {
        match op {
            BinaryOp::Add => OpKind::Add,
            BinaryOp::Sub => OpKind::Sub,
            BinaryOp::Mul => OpKind::Mul,
            BinaryOp::Div => OpKind::Div,
        }
    }
}

/// The operation that produced an array, with the arrays it consumed.
#[derive(Debug)]
pub struct Primitive {
    op: OpKind,
    inputs: SmallVec<[Array; 2]>,
}

impl Primitive {
    pub fn new(op: OpKind, inputs: SmallVec<[Array; 2]>) -> Self {
        Self { op, inputs }
    }

    pub fn op(&self) -> &OpKind {
        &self.op
    }

    pub fn inputs(&self) -> &[Array] {
        &self.inputs
    }

    pub(crate) fn into_inputs(self) -> SmallVec<[Array; 2]> {
        self.inputs
    }

    pub fn name(&self) -> &'static CStr {
        self.op.name()
    }
}

/// Topological order of the pending subgraph rooted at `outputs`.
///
/// Dependencies appear before dependents. Traversal stops at materialized
/// arrays; those are only included when they are themselves outputs.
pub fn topo_sort(outputs: &[Array]) -> Vec<Array> {
    let mut visited: HashSet<NodeId> = HashSet::new();
    let mut order = Vec::new();
    // (array, inputs already pushed)
    let mut stack: Vec<(Array, bool)> = outputs.iter().rev().map(|a| (a.clone(), false)).collect();

    while let Some((array, expanded)) = stack.pop() {
        if expanded {
            order.push(array);
            continue;
        }
        if !visited.insert(array.id()) {
            continue;
        }
        let inputs = if array.is_evaled() {
            Vec::new()
        } else {
            array.input_arrays()
        };
        stack.push((array, true));
        for input in inputs.into_iter().rev() {
            if !visited.contains(&input.id()) && !input.is_evaled() {
                stack.push((input, false));
            }
        }
    }

    order
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_topo_sort_dependencies_first() {
        let a = Array::from_slice(&[1.0f32, 2.0], &Shape::new(vec![2])).unwrap();
        let b = Array::from_slice(&[3.0f32, 4.0], &Shape::new(vec![2])).unwrap();
        let c = a.add(&b).unwrap();
        let d = c.multiply(&a).unwrap();

        let order = topo_sort(&[d.clone()]);
        let pos = |x: &Array| order.iter().position(|n| n.id() == x.id());
        // Materialized leaves are not scheduled.
        assert_eq!(pos(&a), None);
        assert_eq!(pos(&b), None);
        assert!(pos(&c).unwrap() < pos(&d).unwrap());
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_topo_sort_shared_subgraph_visited_once() {
        let a = Array::from_slice(&[1i32, 2], &Shape::new(vec![2])).unwrap();
        let m = a.multiply(&a).unwrap();
        let z = m.add(&m).unwrap();
        let order = topo_sort(&[z]);
        assert_eq!(order.len(), 2);
    }

    #[test]
    fn test_topo_sort_materialized_output() {
        let a = Array::from_slice(&[1u8], &Shape::new(vec![1])).unwrap();
        let order = topo_sort(&[a.clone()]);
        assert_eq!(order.len(), 1);
        assert_eq!(order[0].id(), a.id());
    }

    #[test]
    fn test_op_metadata() {
        assert_eq!(OpKind::Add.arity(), 2);
        assert_eq!(OpKind::Slice { index: 0 }.arity(), 1);
        assert_eq!(OpKind::RandomNormal { key: 1 }.arity(), 0);
        assert_eq!(OpKind::Div.name(), c"Divide");
        assert_eq!(OpKind::from(BinaryOp::Mul), OpKind::Mul);
    }
}
