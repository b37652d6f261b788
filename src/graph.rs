//! Expression graph arena with structural deduplication.
//!
//! Nodes are stored in creation order, which is also a topological order since
//! operands must exist before their consumer. Each node is an opcode plus two
//! operand slots (`arg_indices[1]` is [`UNUSED`] for unary ops).
//!
//! [`Graph::combine`] returns the existing node when one with the same opcode
//! and the same operand handles already exists, so every distinct
//! sub-computation appears exactly once. The key is literal: `x*y` and `y*x`
//! are different nodes. Constants are shared by bit pattern. Leaves are never
//! shared.

use std::collections::HashMap;
use std::fmt;

use crate::error::{Error, Result};
use crate::opcode::{OpCode, UNUSED};

/// Handle of a node in a [`Graph`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    /// Position of the node in creation order.
    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "%{}", self.0)
    }
}

#[derive(Clone, Debug, Default)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(try_from = "RawGraph", into = "RawGraph")
)]
pub struct Graph {
    opcodes: Vec<OpCode>,
    arg_indices: Vec<[u32; 2]>,
    /// Value of `Const` nodes, 0.0 for every other node.
    constants: Vec<f64>,
    /// Node index of every leaf, in leaf order.
    leaves: Vec<u32>,
    /// Leaf position of every node, [`UNUSED`] for non-leaves.
    leaf_positions: Vec<u32>,
    dedup: HashMap<(OpCode, u32, u32), u32>,
    const_dedup: HashMap<u64, u32>,
}

impl Graph {
    pub fn new() -> Self {
        Graph::default()
    }

    pub fn with_capacity(nodes: usize) -> Self {
        Graph {
            opcodes: Vec::with_capacity(nodes),
            arg_indices: Vec::with_capacity(nodes),
            constants: Vec::with_capacity(nodes),
            leaf_positions: Vec::with_capacity(nodes),
            dedup: HashMap::with_capacity(nodes),
            ..Graph::default()
        }
    }

    /// Number of nodes.
    #[inline]
    pub fn len(&self) -> usize {
        self.opcodes.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.opcodes.is_empty()
    }

    #[inline]
    pub fn num_leaves(&self) -> usize {
        self.leaves.len()
    }

    fn push_raw(&mut self, op: OpCode, args: [u32; 2], constant: f64) -> u32 {
        let idx = self.opcodes.len() as u32;
        self.opcodes.push(op);
        self.arg_indices.push(args);
        self.constants.push(constant);
        self.leaf_positions.push(UNUSED);
        idx
    }

    /// Create a fresh leaf. Leaf values are supplied in creation order.
    pub fn leaf(&mut self) -> NodeId {
        let idx = self.push_raw(OpCode::Leaf, [UNUSED, UNUSED], 0.0);
        self.leaf_positions[idx as usize] = self.leaves.len() as u32;
        self.leaves.push(idx);
        NodeId(idx)
    }

    /// Constant node; equal bit patterns share one node.
    pub fn constant(&mut self, value: f64) -> NodeId {
        if let Some(&idx) = self.const_dedup.get(&value.to_bits()) {
            return NodeId(idx);
        }
        let idx = self.push_raw(OpCode::Const, [UNUSED, UNUSED], value);
        self.const_dedup.insert(value.to_bits(), idx);
        NodeId(idx)
    }

    /// Apply `op` to `operands`, reusing an identical existing node.
    pub fn combine(&mut self, op: OpCode, operands: &[NodeId]) -> Result<NodeId> {
        if op.arity() == 0 {
            return Err(Error::NotAnOperation(op));
        }
        if operands.len() != op.arity() {
            return Err(Error::Arity {
                op,
                expected: op.arity(),
                got: operands.len(),
            });
        }
        for &id in operands {
            self.check(id)?;
        }
        let a = operands[0].0;
        let b = operands.get(1).map_or(UNUSED, |id| id.0);
        Ok(self.intern(op, a, b))
    }

    fn intern(&mut self, op: OpCode, a: u32, b: u32) -> NodeId {
        let key = (op, a, b);
        if let Some(&idx) = self.dedup.get(&key) {
            return NodeId(idx);
        }
        let idx = self.push_raw(op, [a, b], 0.0);
        self.dedup.insert(key, idx);
        NodeId(idx)
    }

    /// Binary operation.
    ///
    /// # Panics
    ///
    /// Panics if `op` is not binary or a handle is foreign to this graph;
    /// [`Graph::combine`] is the fallible form.
    pub fn binary(&mut self, op: OpCode, a: NodeId, b: NodeId) -> NodeId {
        assert!(op.is_binary(), "{op:?} is not a binary operation");
        self.assert_contains(a);
        self.assert_contains(b);
        self.intern(op, a.0, b.0)
    }

    /// Unary operation. Panics like [`Graph::binary`].
    pub fn unary(&mut self, op: OpCode, a: NodeId) -> NodeId {
        assert!(op.is_unary(), "{op:?} is not a unary operation");
        self.assert_contains(a);
        self.intern(op, a.0, UNUSED)
    }

    pub fn add(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.binary(OpCode::Add, a, b)
    }

    pub fn sub(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.binary(OpCode::Sub, a, b)
    }

    pub fn mul(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.binary(OpCode::Mul, a, b)
    }

    pub fn div(&mut self, a: NodeId, b: NodeId) -> NodeId {
        self.binary(OpCode::Div, a, b)
    }

    // ── Queries ──

    #[inline]
    pub fn contains(&self, id: NodeId) -> bool {
        id.index() < self.len()
    }

    pub(crate) fn check(&self, id: NodeId) -> Result<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(Error::UnknownNode {
                node: id,
                len: self.len(),
            })
        }
    }

    fn assert_contains(&self, id: NodeId) {
        assert!(
            self.contains(id),
            "node {id} does not exist in a graph of {} nodes",
            self.len()
        );
    }

    #[inline]
    pub fn op(&self, id: NodeId) -> OpCode {
        self.opcodes[id.index()]
    }

    /// Operands of `id` in order (none for leaves and constants).
    pub fn operands(&self, id: NodeId) -> impl Iterator<Item = NodeId> + '_ {
        let arity = self.op(id).arity();
        self.arg_indices[id.index()][..arity].iter().map(|&i| NodeId(i))
    }

    #[inline]
    pub(crate) fn opcodes(&self) -> &[OpCode] {
        &self.opcodes
    }

    #[inline]
    pub(crate) fn arg_indices(&self) -> &[[u32; 2]] {
        &self.arg_indices
    }

    #[inline]
    pub(crate) fn raw_constants(&self) -> &[f64] {
        &self.constants
    }

    #[inline]
    pub fn is_leaf(&self, id: NodeId) -> bool {
        self.contains(id) && self.op(id) == OpCode::Leaf
    }

    /// Position of a leaf among all leaves, `None` for other nodes.
    pub fn leaf_position(&self, id: NodeId) -> Option<usize> {
        match self.leaf_positions.get(id.index()) {
            Some(&pos) if pos != UNUSED => Some(pos as usize),
            _ => None,
        }
    }

    /// Value of a constant node.
    pub fn constant_value(&self, id: NodeId) -> Option<f64> {
        (self.contains(id) && self.op(id) == OpCode::Const).then(|| self.constants[id.index()])
    }

    /// All leaves in creation order.
    pub fn leaves(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.leaves.iter().map(|&i| NodeId(i))
    }

    #[inline]
    pub(crate) fn leaf_nodes(&self) -> &[u32] {
        &self.leaves
    }
}

macro_rules! unary_methods {
    ($($name:ident => $op:ident),* $(,)?) => {
        impl Graph {
            $(
                #[doc = concat!("`", stringify!($name), "(a)`")]
                pub fn $name(&mut self, a: NodeId) -> NodeId {
                    self.unary(OpCode::$op, a)
                }
            )*
        }
    };
}

unary_methods! {
    neg => Neg,
    recip => Recip,
    sqrt => Sqrt,
    cbrt => Cbrt,
    exp => Exp,
    exp_m1 => ExpM1,
    ln => Ln,
    ln_1p => Ln1p,
    log2 => Log2,
    log10 => Log10,
    sin => Sin,
    cos => Cos,
    tan => Tan,
    asin => Asin,
    acos => Acos,
    atan => Atan,
    sinh => Sinh,
    cosh => Cosh,
    tanh => Tanh,
    asinh => Asinh,
    acosh => Acosh,
    atanh => Atanh,
    erf => Erf,
    erfc => Erfc,
    lgamma => Lgamma,
    tgamma => Tgamma,
    zeta => Zeta,
    comp_ellint_1 => CompEllint1,
    comp_ellint_2 => CompEllint2,
}

// ══════════════════════════════════════════════
//  Serialization
// ══════════════════════════════════════════════

/// Node list only; lookup tables are rebuilt on load.
#[cfg(feature = "serde")]
#[derive(serde::Serialize, serde::Deserialize)]
struct RawGraph {
    opcodes: Vec<OpCode>,
    arg_indices: Vec<[u32; 2]>,
    constants: Vec<f64>,
}

#[cfg(feature = "serde")]
impl From<Graph> for RawGraph {
    fn from(g: Graph) -> Self {
        RawGraph {
            opcodes: g.opcodes,
            arg_indices: g.arg_indices,
            constants: g.constants,
        }
    }
}

#[cfg(feature = "serde")]
impl TryFrom<RawGraph> for Graph {
    type Error = Error;

    /// Rebuild a graph, rejecting node lists the builder could not have made.
    fn try_from(raw: RawGraph) -> Result<Self> {
        let len = raw.opcodes.len();
        if raw.arg_indices.len() != len || raw.constants.len() != len {
            return Err(Error::ColumnLength {
                opcodes: len,
                arg_indices: raw.arg_indices.len(),
                constants: raw.constants.len(),
            });
        }
        let mut g = Graph::with_capacity(len);
        for (i, (&op, &args)) in raw.opcodes.iter().zip(&raw.arg_indices).enumerate() {
            let arity = op.arity();
            for (slot, &arg) in args.iter().enumerate() {
                if slot < arity && arg as usize >= i {
                    return Err(Error::CorruptGraph {
                        node: i,
                        reason: "operand does not precede the node",
                    });
                }
                if slot >= arity && arg != UNUSED {
                    return Err(Error::CorruptGraph {
                        node: i,
                        reason: "operand slot is set beyond the operation's arity",
                    });
                }
            }
            match op {
                OpCode::Leaf => {
                    g.leaf();
                }
                OpCode::Const => {
                    let value = raw.constants[i];
                    let idx = g.push_raw(OpCode::Const, [UNUSED, UNUSED], value);
                    g.const_dedup.entry(value.to_bits()).or_insert(idx);
                }
                _ => {
                    let idx = g.push_raw(op, args, 0.0);
                    g.dedup.entry((op, args[0], args[1])).or_insert(idx);
                }
            }
        }
        Ok(g)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_operations_are_shared() {
        let mut g = Graph::new();
        let x = g.leaf();
        let y = g.leaf();
        let a = g.mul(x, y);
        let b = g.mul(x, y);
        assert_eq!(a, b);
        assert_ne!(g.mul(y, x), a);
        assert_eq!(g.exp(a), g.exp(b));
        assert_eq!(g.len(), 5);
    }

    #[test]
    fn leaves_are_never_shared() {
        let mut g = Graph::new();
        let x = g.leaf();
        let y = g.leaf();
        assert_ne!(x, y);
        assert_eq!(g.leaf_position(y), Some(1));
        assert_eq!(g.leaves().collect::<Vec<_>>(), vec![x, y]);
    }

    #[test]
    fn constants_share_by_bits() {
        let mut g = Graph::new();
        assert_eq!(g.constant(0.5), g.constant(0.5));
        assert_ne!(g.constant(0.0), g.constant(-0.0));
        let c = g.constant(2.0);
        assert_eq!(g.constant_value(c), Some(2.0));
    }

    #[test]
    fn combine_validates() {
        let mut g = Graph::new();
        let x = g.leaf();
        assert_eq!(
            g.combine(OpCode::Add, &[x]),
            Err(Error::Arity {
                op: OpCode::Add,
                expected: 2,
                got: 1
            })
        );
        assert_eq!(
            g.combine(OpCode::Exp, &[NodeId(7)]),
            Err(Error::UnknownNode {
                node: NodeId(7),
                len: 1
            })
        );
        assert_eq!(g.combine(OpCode::Leaf, &[]), Err(Error::NotAnOperation(OpCode::Leaf)));
        let e = g.combine(OpCode::Exp, &[x]).unwrap();
        assert_eq!(g.exp(x), e);
        assert_eq!(g.operands(e).collect::<Vec<_>>(), vec![x]);
    }
}
