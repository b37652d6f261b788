//! Structural order analysis.
//!
//! `order(n, x)` bounds how many times node `n` can be differentiated with
//! respect to leaf `x` before the result is identically zero: a polynomial of
//! degree `d` in `x` has order `d`, anything non-polynomial in `x` has order
//! ∞. The table depends only on topology and is computed once per graph.

use std::fmt;

use crate::graph::{Graph, NodeId};
use crate::opcode::OpCode;

/// Element of ℕ ∪ {∞}.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Order(u32);

impl Order {
    pub const ZERO: Order = Order(0);
    pub const ONE: Order = Order(1);
    pub const INFINITE: Order = Order(u32::MAX);

    /// Finite order `n`. `u32::MAX` is reserved for ∞.
    #[inline]
    pub fn finite(n: u32) -> Order {
        Order(n.min(u32::MAX - 1))
    }

    #[inline]
    pub fn is_zero(self) -> bool {
        self.0 == 0
    }

    #[inline]
    pub fn is_infinite(self) -> bool {
        self.0 == u32::MAX
    }

    /// The finite value, `None` for ∞.
    #[inline]
    pub fn get(self) -> Option<u32> {
        (!self.is_infinite()).then_some(self.0)
    }

    /// Raw value with ∞ as `u32::MAX`; usable directly as an upper bound.
    #[inline]
    pub fn bound(self) -> u32 {
        self.0
    }

    /// Sum, saturating at ∞.
    #[inline]
    pub fn saturating_add(self, rhs: Order) -> Order {
        if self.is_infinite() || rhs.is_infinite() {
            return Order::INFINITE;
        }
        Order::finite(self.0.saturating_add(rhs.0))
    }

    /// Whether derivatives of order `k` can be nonzero.
    #[inline]
    pub fn admits(self, k: u32) -> bool {
        k <= self.0
    }
}

impl fmt::Display for Order {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.get() {
            Some(n) => write!(f, "{n}"),
            None => write!(f, "∞"),
        }
    }
}

/// Dense `(node, leaf)` order table.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OrderTable {
    num_leaves: usize,
    orders: Vec<Order>,
}

impl OrderTable {
    /// Analyze `graph` in one forward pass over creation order.
    pub fn new(graph: &Graph) -> Self {
        let width = graph.num_leaves();
        let mut orders = vec![Order::ZERO; graph.len() * width];

        for (i, (&op, &[a, b])) in graph.opcodes().iter().zip(graph.arg_indices()).enumerate() {
            let (done, rest) = orders.split_at_mut(i * width);
            let done: &[Order] = done;
            let row = &mut rest[..width];
            let arg = |idx: u32| &done[idx as usize * width..(idx as usize + 1) * width];
            match op {
                OpCode::Leaf => {
                    if let Some(pos) = graph.leaf_position(NodeId(i as u32)) {
                        row[pos] = Order::ONE;
                    }
                }
                OpCode::Const => {}
                OpCode::Add | OpCode::Sub => {
                    for ((r, &x), &y) in row.iter_mut().zip(arg(a)).zip(arg(b)) {
                        *r = x.max(y);
                    }
                }
                OpCode::Mul => {
                    for ((r, &x), &y) in row.iter_mut().zip(arg(a)).zip(arg(b)) {
                        *r = x.saturating_add(y);
                    }
                }
                OpCode::Div => {
                    for ((r, &x), &y) in row.iter_mut().zip(arg(a)).zip(arg(b)) {
                        *r = if y.is_zero() { x } else { Order::INFINITE };
                    }
                }
                OpCode::Neg => row.copy_from_slice(arg(a)),
                _ => {
                    for (r, &x) in row.iter_mut().zip(arg(a)) {
                        *r = if x.is_zero() { Order::ZERO } else { Order::INFINITE };
                    }
                }
            }
        }

        OrderTable {
            num_leaves: width,
            orders,
        }
    }

    #[inline]
    pub fn num_leaves(&self) -> usize {
        self.num_leaves
    }

    /// Order of `node` with respect to `leaf`.
    ///
    /// # Panics
    ///
    /// Panics if `leaf` is not a leaf of `graph` or `node` is out of range.
    pub fn order(&self, graph: &Graph, node: NodeId, leaf: NodeId) -> Order {
        let pos = graph
            .leaf_position(leaf)
            .unwrap_or_else(|| panic!("{leaf} is not a leaf"));
        self.order_at(node, pos)
    }

    /// Order of `node` with respect to the leaf at position `pos`.
    #[inline]
    pub fn order_at(&self, node: NodeId, pos: usize) -> Order {
        self.row(node)[pos]
    }

    /// Orders of `node` with respect to every leaf, in leaf order.
    #[inline]
    pub fn row(&self, node: NodeId) -> &[Order] {
        let start = node.index() * self.num_leaves;
        &self.orders[start..start + self.num_leaves]
    }

    /// Whether `node` depends on any leaf at all.
    pub fn is_active(&self, node: NodeId) -> bool {
        self.row(node).iter().any(|o| !o.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_arithmetic() {
        assert_eq!(Order::finite(2).saturating_add(Order::finite(3)), Order::finite(5));
        assert_eq!(Order::finite(2).saturating_add(Order::INFINITE), Order::INFINITE);
        assert_eq!(Order::finite(u32::MAX - 2).saturating_add(Order::finite(7)).get(), Some(u32::MAX - 1));
        assert!(Order::INFINITE > Order::finite(1_000_000));
        assert_eq!(Order::INFINITE.to_string(), "∞");
        assert!(Order::finite(2).admits(2));
        assert!(!Order::finite(2).admits(3));
    }
}
