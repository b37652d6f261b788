//! Operator-overloading front end for building graphs.
//!
//! ```
//! use taylorback::GraphBuilder;
//!
//! let b = GraphBuilder::new();
//! let x = b.leaf();
//! let y = b.leaf();
//! let f = (x * y + 1.0).exp() / y;
//! let root = f.id();
//! let graph = b.finish();
//! assert_eq!(graph.len(), 7);
//! # let _ = root;
//! ```

use std::cell::RefCell;
use std::ops::{Add, Div, Mul, Neg, Sub};

use crate::graph::{Graph, NodeId};
use crate::opcode::OpCode;

/// Owns a [`Graph`] under construction and hands out [`Var`]s that record into it.
#[derive(Debug, Default)]
pub struct GraphBuilder {
    graph: RefCell<Graph>,
}

/// A node of a [`GraphBuilder`]'s graph, combinable with `+ - * /`.
#[derive(Clone, Copy, Debug)]
pub struct Var<'g> {
    builder: &'g GraphBuilder,
    id: NodeId,
}

impl GraphBuilder {
    pub fn new() -> Self {
        GraphBuilder::default()
    }

    /// Continue building on an existing graph.
    pub fn from_graph(graph: Graph) -> Self {
        GraphBuilder {
            graph: RefCell::new(graph),
        }
    }

    pub fn leaf(&self) -> Var<'_> {
        let id = self.graph.borrow_mut().leaf();
        Var { builder: self, id }
    }

    /// `n` fresh leaves.
    pub fn leaves(&self, n: usize) -> Vec<Var<'_>> {
        (0..n).map(|_| self.leaf()).collect()
    }

    pub fn constant(&self, value: f64) -> Var<'_> {
        let id = self.graph.borrow_mut().constant(value);
        Var { builder: self, id }
    }

    /// Wrap an existing handle.
    ///
    /// # Panics
    ///
    /// Panics if `id` is not a node of this builder's graph.
    pub fn var(&self, id: NodeId) -> Var<'_> {
        assert!(self.graph.borrow().contains(id), "unknown node {id}");
        Var { builder: self, id }
    }

    /// Run `f` with read access to the graph built so far.
    pub fn with_graph<R>(&self, f: impl FnOnce(&Graph) -> R) -> R {
        f(&self.graph.borrow())
    }

    pub fn finish(self) -> Graph {
        self.graph.into_inner()
    }

    fn binary(&self, op: OpCode, a: NodeId, b: NodeId) -> Var<'_> {
        let id = self.graph.borrow_mut().binary(op, a, b);
        Var { builder: self, id }
    }

    fn unary(&self, op: OpCode, a: NodeId) -> Var<'_> {
        let id = self.graph.borrow_mut().unary(op, a);
        Var { builder: self, id }
    }
}

impl<'g> Var<'g> {
    #[inline]
    pub fn id(self) -> NodeId {
        self.id
    }

    fn same_builder(self, other: Var<'g>) {
        assert!(
            std::ptr::eq(self.builder, other.builder),
            "cannot combine variables from different builders"
        );
    }

    fn with(self, op: OpCode, rhs: Var<'g>) -> Var<'g> {
        self.same_builder(rhs);
        self.builder.binary(op, self.id, rhs.id)
    }

    fn with_const(self, op: OpCode, value: f64, const_first: bool) -> Var<'g> {
        let c = self.builder.constant(value);
        if const_first {
            c.with(op, self)
        } else {
            self.with(op, c)
        }
    }

    /// Apply an arbitrary unary opcode.
    pub fn apply(self, op: OpCode) -> Var<'g> {
        self.builder.unary(op, self.id)
    }
}

macro_rules! var_unary_methods {
    ($($name:ident => $op:ident),* $(,)?) => {
        impl<'g> Var<'g> {
            $(
                #[doc = concat!("`", stringify!($name), "(self)`")]
                pub fn $name(self) -> Var<'g> {
                    self.apply(OpCode::$op)
                }
            )*
        }
    };
}

var_unary_methods! {
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

macro_rules! var_binary_ops {
    ($($trait:ident, $method:ident => $op:ident);* $(;)?) => {
        $(
            impl<'g> $trait for Var<'g> {
                type Output = Var<'g>;
                #[inline]
                fn $method(self, rhs: Var<'g>) -> Var<'g> {
                    self.with(OpCode::$op, rhs)
                }
            }

            impl<'g> $trait<f64> for Var<'g> {
                type Output = Var<'g>;
                #[inline]
                fn $method(self, rhs: f64) -> Var<'g> {
                    self.with_const(OpCode::$op, rhs, false)
                }
            }

            impl<'g> $trait<Var<'g>> for f64 {
                type Output = Var<'g>;
                #[inline]
                fn $method(self, rhs: Var<'g>) -> Var<'g> {
                    rhs.with_const(OpCode::$op, self, true)
                }
            }
        )*
    };
}

var_binary_ops! {
    Add, add => Add;
    Sub, sub => Sub;
    Mul, mul => Mul;
    Div, div => Div;
}

impl<'g> Neg for Var<'g> {
    type Output = Var<'g>;
    #[inline]
    fn neg(self) -> Var<'g> {
        self.apply(OpCode::Neg)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operators_record_and_dedup() {
        let b = GraphBuilder::new();
        let x = b.leaf();
        let y = b.leaf();
        let p = x * y;
        let q = x * y;
        assert_eq!(p.id(), q.id());
        let r = (2.0 * p - 1.0).id();
        let g = b.finish();
        assert_eq!(g.op(r), OpCode::Sub);
        // x, y, x*y, 2, 2*(x*y), 1, -
        assert_eq!(g.len(), 7);
    }

    #[test]
    #[should_panic(expected = "different builders")]
    fn mixing_builders_panics() {
        let a = GraphBuilder::new();
        let b = GraphBuilder::new();
        let _ = a.leaf() + b.leaf();
    }
}
