//! Forward (primal) evaluation.

use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};
use crate::opcode::{self, OpCode, UNUSED};

/// Primal value of every node of one graph at one point.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ValueTape {
    values: Vec<f64>,
}

impl ValueTape {
    pub fn new() -> Self {
        ValueTape::default()
    }

    #[inline]
    pub fn value(&self, id: NodeId) -> f64 {
        self.values[id.index()]
    }

    #[inline]
    pub fn values(&self) -> &[f64] {
        &self.values
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Evaluate every node of `graph` with leaves set to `leaf_values` (in leaf
/// creation order).
pub fn evaluate(graph: &Graph, leaf_values: &[f64]) -> Result<ValueTape> {
    let mut tape = ValueTape::new();
    evaluate_into(graph, leaf_values, &mut tape)?;
    Ok(tape)
}

/// Like [`evaluate`], reusing `tape`'s storage.
pub fn evaluate_into(graph: &Graph, leaf_values: &[f64], tape: &mut ValueTape) -> Result<()> {
    if leaf_values.len() != graph.num_leaves() {
        return Err(Error::LeafCount {
            expected: graph.num_leaves(),
            got: leaf_values.len(),
        });
    }

    let values = &mut tape.values;
    values.clear();
    values.resize(graph.len(), 0.0);

    for (&node, &v) in graph.leaf_nodes().iter().zip(leaf_values) {
        values[node as usize] = v;
    }

    let constants = graph.raw_constants();
    for (i, (&op, &[a_idx, b_idx])) in graph.opcodes().iter().zip(graph.arg_indices()).enumerate() {
        match op {
            OpCode::Leaf => continue,
            OpCode::Const => values[i] = constants[i],
            op => {
                let a = values[a_idx as usize];
                let b = if b_idx != UNUSED {
                    values[b_idx as usize]
                } else {
                    0.0
                };
                values[i] = opcode::eval_forward(op, a, b);
            }
        }
    }
    Ok(())
}
