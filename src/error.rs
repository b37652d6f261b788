//! Error type for graph construction and derivative requests.
//!
//! Only structural problems are errors. Domain faults during evaluation
//! (division by zero, `ln` of a negative value) propagate as NaN/±∞ through
//! the values like ordinary float arithmetic, and an undersized accumulator is
//! an internal invariant violation that panics.

use thiserror::Error;

use crate::graph::NodeId;
use crate::opcode::OpCode;

#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum Error {
    /// A derivative was requested with respect to a node that is not a leaf.
    #[error("derivative requested with respect to {0}, which is not a leaf")]
    NotALeaf(NodeId),

    /// A handle that does not belong to the graph.
    #[error("node {node} does not exist in a graph of {len} nodes")]
    UnknownNode { node: NodeId, len: usize },

    /// Operand count does not match the operation.
    #[error("{op:?} takes {expected} operand(s), got {got}")]
    Arity { op: OpCode, expected: usize, got: usize },

    /// `combine` cannot create leaves or constants.
    #[error("{0:?} nodes are created with leaf() or constant(), not combine()")]
    NotAnOperation(OpCode),

    /// Wrong number of leaf values for the graph.
    #[error("graph has {expected} leaves, got {got} values")]
    LeafCount { expected: usize, got: usize },

    /// A request with no targets.
    #[error("no derivative targets requested")]
    NoTargets,

    /// A target of order zero.
    #[error("target {0} has order zero")]
    EmptyTarget(usize),

    /// A loaded node list whose columns disagree in length.
    #[error("graph columns differ in length: {opcodes} opcodes, {arg_indices} operand pairs, {constants} constants")]
    ColumnLength {
        opcodes: usize,
        arg_indices: usize,
        constants: usize,
    },

    /// A loaded node with operands the builder could not have produced.
    #[error("node {node} is malformed: {reason}")]
    CorruptGraph { node: usize, reason: &'static str },
}

pub type Result<T> = std::result::Result<T, Error>;
