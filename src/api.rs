//! Request surface: plan once, evaluate at many points.
//!
//! ```
//! use taylorback::{Evaluator, GraphBuilder, Monomial};
//!
//! let b = GraphBuilder::new();
//! let x = b.leaf();
//! let y = b.leaf();
//! let f = (x * y).id();
//! let (x, y) = (x.id(), y.id());
//! let graph = b.finish();
//!
//! let targets = [Monomial::d(x), Monomial::d(y), Monomial::d(x) * Monomial::d(y)];
//! let eval = Evaluator::new(&graph, f, &targets).unwrap();
//! let d = eval.evaluate(&[2.0, 3.0]).unwrap();
//! assert_eq!(d.value(), 6.0);
//! assert_eq!(d.derivatives(), &[3.0, 2.0, 1.0]);
//! ```

use std::sync::Arc;

use log::debug;

use crate::error::Result;
use crate::forward::{evaluate_into, ValueTape};
use crate::graph::{Graph, NodeId};
use crate::monomial::Monomial;
use crate::order::OrderTable;
use crate::plan::BufferPlan;
use crate::reverse::{accumulate, AccumulatorBuffer};

/// A planned derivative request against one graph.
#[derive(Clone, Debug)]
pub struct Evaluator<'g> {
    graph: &'g Graph,
    plan: BufferPlan,
    requests: Arc<[Monomial]>,
    /// `Π k!` of every distinct target.
    weights: Vec<f64>,
    seed: f64,
}

/// Reusable per-thread storage for [`Evaluator::evaluate_with`].
#[derive(Clone, Debug, Default)]
pub struct Workspace {
    tape: ValueTape,
    buffer: AccumulatorBuffer,
}

impl Workspace {
    pub fn new() -> Self {
        Workspace::default()
    }

    /// Primal values of the last evaluation.
    pub fn tape(&self) -> &ValueTape {
        &self.tape
    }

    /// Peak live slot count of the last sweep.
    pub fn peak_slots(&self) -> usize {
        self.buffer.peak()
    }
}

impl<'g> Evaluator<'g> {
    /// Analyze and plan `requests` (monomials over leaves) for `root`.
    pub fn new(graph: &'g Graph, root: NodeId, requests: &[Monomial]) -> Result<Self> {
        let orders = OrderTable::new(graph);
        Self::with_orders(graph, &orders, root, requests)
    }

    /// Like [`Evaluator::new`] with a precomputed order table, for planning
    /// several roots of the same graph.
    pub fn with_orders(graph: &'g Graph, orders: &OrderTable, root: NodeId, requests: &[Monomial]) -> Result<Self> {
        let plan = BufferPlan::new(graph, orders, root, requests)?;
        let weights = plan.targets().iter().map(Monomial::factorial_weight).collect();
        debug!(
            "evaluator for {root}: {} request(s), {} distinct, {} slot(s)",
            requests.len(),
            plan.targets().len(),
            plan.slot_count()
        );
        Ok(Evaluator {
            graph,
            plan,
            requests: requests.into(),
            weights,
            seed: 1.0,
        })
    }

    /// Scale every result by `seed` (default 1).
    pub fn with_seed(mut self, seed: f64) -> Self {
        self.seed = seed;
        self
    }

    pub fn plan(&self) -> &BufferPlan {
        &self.plan
    }

    pub fn graph(&self) -> &'g Graph {
        self.graph
    }

    pub fn requests(&self) -> &[Monomial] {
        &self.requests
    }

    pub fn workspace(&self) -> Workspace {
        Workspace {
            tape: ValueTape::new(),
            buffer: AccumulatorBuffer::with_slots(self.plan.slot_count()),
        }
    }

    /// One forward and one reverse pass at `leaf_values`.
    pub fn evaluate(&self, leaf_values: &[f64]) -> Result<Derivatives> {
        let mut ws = self.workspace();
        self.evaluate_with(leaf_values, &mut ws)
    }

    /// Like [`Evaluator::evaluate`], reusing `ws`.
    pub fn evaluate_with(&self, leaf_values: &[f64], ws: &mut Workspace) -> Result<Derivatives> {
        evaluate_into(self.graph, leaf_values, &mut ws.tape)?;
        let coeffs = accumulate(self.graph, &self.plan, &ws.tape, self.seed, &mut ws.buffer);
        let taylor: Vec<f64> = self.plan.request_targets().iter().map(|&t| coeffs[t]).collect();
        let derivatives = self
            .plan
            .request_targets()
            .iter()
            .map(|&t| coeffs[t] * self.weights[t])
            .collect();
        Ok(Derivatives {
            value: ws.tape.value(self.plan.root()),
            taylor,
            derivatives,
            requests: Arc::clone(&self.requests),
        })
    }

    /// Evaluate at every point, reusing one workspace.
    pub fn evaluate_batch<P: AsRef<[f64]>>(&self, points: &[P]) -> Result<Vec<Derivatives>> {
        let mut ws = self.workspace();
        points
            .iter()
            .map(|x| self.evaluate_with(x.as_ref(), &mut ws))
            .collect()
    }
}

/// Results of one evaluation, in request order.
#[derive(Clone, Debug, PartialEq)]
pub struct Derivatives {
    value: f64,
    taylor: Vec<f64>,
    derivatives: Vec<f64>,
    requests: Arc<[Monomial]>,
}

impl Derivatives {
    /// Primal value of the root.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Partial derivatives, one per request.
    pub fn derivatives(&self) -> &[f64] {
        &self.derivatives
    }

    /// Taylor coefficients (derivative divided by `Π k!`), one per request.
    pub fn taylor_coefficients(&self) -> &[f64] {
        &self.taylor
    }

    pub fn requests(&self) -> &[Monomial] {
        &self.requests
    }

    /// Derivative for `target`, if it was requested.
    pub fn get(&self, target: &Monomial) -> Option<f64> {
        self.requests
            .iter()
            .position(|m| m == target)
            .map(|i| self.derivatives[i])
    }

    pub fn len(&self) -> usize {
        self.derivatives.len()
    }

    pub fn is_empty(&self) -> bool {
        self.derivatives.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Monomial, f64)> + '_ {
        self.requests.iter().zip(self.derivatives.iter().copied())
    }
}

/// Plan and evaluate `requests` in one call.
pub fn derivatives(graph: &Graph, root: NodeId, requests: &[Monomial], leaf_values: &[f64]) -> Result<Derivatives> {
    Evaluator::new(graph, root, requests)?.evaluate(leaf_values)
}

/// First derivatives of `root` with respect to every leaf, in leaf order.
pub fn gradient(graph: &Graph, root: NodeId, leaf_values: &[f64]) -> Result<Vec<f64>> {
    let requests: Vec<Monomial> = graph.leaves().map(Monomial::d).collect();
    if requests.is_empty() {
        crate::forward::evaluate(graph, leaf_values)?;
        return Ok(Vec::new());
    }
    Ok(derivatives(graph, root, &requests, leaf_values)?.derivatives)
}
