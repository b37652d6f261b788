//! Static accumulator planning.
//!
//! The reverse sweep stores one Taylor coefficient per live derivative
//! monomial. [`BufferPlan::new`] replays the sweep structurally (no values):
//! it starts from `δroot`, visits nodes from the last created to the first,
//! and for every live monomial whose highest non-leaf factor is the current
//! node `n`, frees its slot and hands its content to the monomials obtained by
//! expanding `(δn)^p` into the operands' perturbations. Destinations that can
//! no longer reach a target (see [`TargetSet::includes`]) are dropped; the rest
//! reuse a live slot, take the lowest free one, or, when they are a requested
//! leaf monomial, go to that target's output cell outside the pool.
//!
//! The largest number of simultaneously occupied pool slots is the exact
//! buffer size: the accumulator allocates exactly that many and follows the
//! recorded steps. Visiting order is fixed by creation order, so the same
//! expression built in a different association can need a different size.
//!
//! For first-order targets every monomial is a single `δn` and this is the
//! classic adjoint sweep with register reuse.

use std::collections::{BTreeMap, BTreeSet, HashMap};

use log::{debug, trace};

use crate::diffop::{term_exponents, ExpansionPattern, TargetSet};
use crate::error::{Error, Result};
use crate::graph::{Graph, NodeId};
use crate::monomial::Monomial;
use crate::opcode::OpCode;
use crate::order::OrderTable;

/// Where a contribution is accumulated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Dest {
    /// Reusable pool slot.
    Slot(u32),
    /// Output cell of a distinct target.
    Target(u32),
}

/// One term of the expansion of `(δn)^p`: coefficient of `δa^ea δb^eb`.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Contribution {
    pub dest: Dest,
    pub ea: u32,
    pub eb: u32,
}

/// Read and free `source`, then distribute its value.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Step {
    pub source: u32,
    /// Power of the processed node in the source monomial.
    pub power: u32,
    pub contributions: Vec<Contribution>,
}

/// All steps executed while a node is processed.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct NodeSchedule {
    pub node: NodeId,
    pub max_power: u32,
    /// Largest `ea + eb` over all contributions.
    pub max_exponent: u32,
    pub steps: Vec<Step>,
}

impl NodeSchedule {
    /// Whether any step distributes anything.
    pub fn has_terms(&self) -> bool {
        self.steps.iter().any(|s| !s.contributions.is_empty())
    }
}

/// A monomial and the slot it occupied during its lifetime.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct SlotAssignment {
    pub monomial: Monomial,
    pub slot: u32,
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BufferPlan {
    root: NodeId,
    graph_len: usize,
    /// Distinct targets, in order of first request.
    targets: Vec<Monomial>,
    /// Distinct-target index of every request.
    request_targets: Vec<usize>,
    root_dest: Option<Dest>,
    slot_count: usize,
    schedule: Vec<NodeSchedule>,
    assignments: Vec<SlotAssignment>,
    pattern: ExpansionPattern,
}

/// Check that `requests` are usable derivative targets for `root` in `graph`.
pub fn validate_request(graph: &Graph, root: NodeId, requests: &[Monomial]) -> Result<()> {
    graph.check(root)?;
    if requests.is_empty() {
        return Err(Error::NoTargets);
    }
    for (i, target) in requests.iter().enumerate() {
        if target.is_one() {
            return Err(Error::EmptyTarget(i));
        }
        for node in target.nodes() {
            graph.check(node)?;
            if !graph.is_leaf(node) {
                return Err(Error::NotALeaf(node));
            }
        }
    }
    Ok(())
}

/// Plan the sweep from `root` towards `requests`.
pub fn plan(graph: &Graph, orders: &OrderTable, root: NodeId, requests: &[Monomial]) -> Result<BufferPlan> {
    BufferPlan::new(graph, orders, root, requests)
}

impl BufferPlan {
    pub fn new(graph: &Graph, orders: &OrderTable, root: NodeId, requests: &[Monomial]) -> Result<Self> {
        validate_request(graph, root, requests)?;
        assert_eq!(
            orders.num_leaves(),
            graph.num_leaves(),
            "order table was computed for a different graph"
        );

        let mut targets = Vec::new();
        let mut target_index = HashMap::new();
        let request_targets = requests
            .iter()
            .map(|m| {
                *target_index.entry(m.clone()).or_insert_with(|| {
                    targets.push(m.clone());
                    targets.len() - 1
                })
            })
            .collect();

        let mut planner = Planner {
            graph,
            orders,
            reach: TargetSet::new(graph, &targets),
            target_index: &target_index,
            live: HashMap::new(),
            pending: BTreeMap::new(),
            included: HashMap::new(),
            free: BTreeSet::new(),
            next_slot: 0,
            occupied: 0,
            peak: 0,
            assignments: Vec::new(),
        };
        let root_dest = planner.place(Monomial::d(root));
        let mut schedule = Vec::new();
        while let Some((node, batch)) = planner.pending.pop_last() {
            schedule.push(planner.process(NodeId(node), batch));
        }
        let pattern = ExpansionPattern::new(
            schedule.iter().map(|s| s.max_power).max().unwrap_or(0),
            schedule.iter().map(|s| s.max_exponent).max().unwrap_or(0),
        );

        let plan = BufferPlan {
            root,
            graph_len: graph.len(),
            targets,
            request_targets,
            root_dest,
            slot_count: planner.peak,
            schedule,
            assignments: planner.assignments,
            pattern,
        };
        debug!(
            "planned {} target(s) from {}: {} slot(s), {} node(s), {} step(s)",
            plan.targets.len(),
            root,
            plan.slot_count,
            plan.schedule.len(),
            plan.num_steps()
        );
        Ok(plan)
    }

    #[inline]
    pub fn root(&self) -> NodeId {
        self.root
    }

    /// Exact number of pool slots the sweep needs.
    #[inline]
    pub fn slot_count(&self) -> usize {
        self.slot_count
    }

    /// Distinct targets, in order of first request.
    #[inline]
    pub fn targets(&self) -> &[Monomial] {
        &self.targets
    }

    /// For every request, the index of its distinct target.
    #[inline]
    pub fn request_targets(&self) -> &[usize] {
        &self.request_targets
    }

    /// Where the seed is placed; `None` when the root cannot reach any target.
    #[inline]
    pub fn root_dest(&self) -> Option<Dest> {
        self.root_dest
    }

    /// Processed nodes in sweep order.
    #[inline]
    pub fn schedule(&self) -> &[NodeSchedule] {
        &self.schedule
    }

    /// Every monomial that received a slot, in allocation order.
    #[inline]
    pub fn slot_assignment(&self) -> &[SlotAssignment] {
        &self.assignments
    }

    /// Partitions and weights shared by every local expansion of the sweep.
    #[inline]
    pub fn expansion_pattern(&self) -> &ExpansionPattern {
        &self.pattern
    }

    pub fn num_steps(&self) -> usize {
        self.schedule.iter().map(|s| s.steps.len()).sum()
    }

    #[inline]
    pub(crate) fn graph_len(&self) -> usize {
        self.graph_len
    }
}

struct Planner<'a> {
    graph: &'a Graph,
    orders: &'a OrderTable,
    reach: TargetSet,
    target_index: &'a HashMap<Monomial, usize>,
    /// Slot of every live monomial.
    live: HashMap<Monomial, u32>,
    /// Live monomials grouped by the node that expands them next.
    pending: BTreeMap<u32, BTreeMap<Monomial, u32>>,
    included: HashMap<Monomial, bool>,
    free: BTreeSet<u32>,
    next_slot: u32,
    occupied: usize,
    peak: usize,
    assignments: Vec<SlotAssignment>,
}

impl Planner<'_> {
    /// Highest non-leaf factor: the node whose processing expands `m`.
    fn expanding_node(&self, m: &Monomial) -> Option<NodeId> {
        m.factors()
            .iter()
            .rev()
            .map(|&(n, _)| n)
            .find(|&n| self.graph.op(n) != OpCode::Leaf)
    }

    fn allocate(&mut self) -> u32 {
        let slot = self.free.pop_first().unwrap_or_else(|| {
            self.next_slot += 1;
            self.next_slot - 1
        });
        self.occupied += 1;
        self.peak = self.peak.max(self.occupied);
        slot
    }

    fn release(&mut self, slot: u32) {
        self.free.insert(slot);
        self.occupied -= 1;
    }

    fn reaches_target(&mut self, m: &Monomial) -> bool {
        if let Some(&hit) = self.included.get(m) {
            return hit;
        }
        let hit = self.reach.includes(self.orders, m);
        self.included.insert(m.clone(), hit);
        hit
    }

    /// Destination for contributions to `m`, allocating a slot if needed.
    fn place(&mut self, m: Monomial) -> Option<Dest> {
        if let Some(&slot) = self.live.get(&m) {
            return Some(Dest::Slot(slot));
        }
        let Some(node) = self.expanding_node(&m) else {
            return self.target_index.get(&m).map(|&t| Dest::Target(t as u32));
        };
        if !self.reaches_target(&m) {
            return None;
        }
        let slot = self.allocate();
        self.live.insert(m.clone(), slot);
        self.pending.entry(node.0).or_default().insert(m.clone(), slot);
        self.assignments.push(SlotAssignment { monomial: m, slot });
        Some(Dest::Slot(slot))
    }

    fn process(&mut self, node: NodeId, batch: BTreeMap<Monomial, u32>) -> NodeSchedule {
        let op = self.graph.op(node);
        let mut operands = self.graph.operands(node);
        let a = operands.next();
        let b = operands.next();
        let same_operand = a.is_some() && a == b;
        let budget = self.reach.max_total_order();

        let mut steps = Vec::with_capacity(batch.len());
        let mut max_power = 0;
        let mut max_exponent = 0;
        for (m, slot) in batch {
            self.live.remove(&m);
            self.release(slot);

            let power = m.power_of(node);
            let rest = m.without(node);
            let room = budget.saturating_sub(rest.total_order());
            let mut contributions = Vec::new();
            for (ea, eb) in term_exponents(op, same_operand, power, room) {
                let mut dest = rest.clone();
                if let Some(a) = a {
                    dest.insert(a, ea);
                }
                if let (Some(b), false) = (b, same_operand) {
                    dest.insert(b, eb);
                }
                if let Some(dest) = self.place(dest) {
                    contributions.push(Contribution { dest, ea, eb });
                    max_exponent = max_exponent.max(ea + eb);
                }
            }
            max_power = max_power.max(power);
            steps.push(Step {
                source: slot,
                power,
                contributions,
            });
        }
        trace!(
            "{node} ({op:?}): {} step(s), {} slot(s) occupied",
            steps.len(),
            self.occupied
        );
        NodeSchedule {
            node,
            max_power,
            max_exponent,
            steps,
        }
    }
}
