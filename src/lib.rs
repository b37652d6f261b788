//! Higher-order reverse-mode automatic differentiation.
//!
//! Build a scalar expression as a deduplicated [`Graph`], request any set of
//! partial derivatives as [`Monomial`]s over its leaves (mixed, any order),
//! and get all of them from one forward and one reverse pass. The reverse
//! pass runs over an accumulator whose size, computed once by [`BufferPlan`],
//! is exactly the number of slots the sweep ever uses at the same time.

pub mod api;
pub mod builder;
pub mod combinatorics;
pub mod diffop;
pub mod error;
pub mod forward;
pub mod graph;
pub mod monomial;
pub mod opcode;
pub mod order;
pub mod plan;
pub mod reverse;
pub mod special;
pub mod taylor_ops;

#[cfg(feature = "parallel")]
mod parallel;

pub use api::{derivatives, gradient, Derivatives, Evaluator, Workspace};
pub use builder::{GraphBuilder, Var};
pub use diffop::{monomial_included, TargetSet};
pub use error::{Error, Result};
pub use forward::{evaluate, ValueTape};
pub use graph::{Graph, NodeId};
pub use monomial::Monomial;
pub use opcode::OpCode;
pub use order::{Order, OrderTable};
pub use plan::{plan, BufferPlan};
pub use reverse::{accumulate, AccumulatorBuffer};
