//! Differential-operator algebra.
//!
//! The reverse sweep carries Taylor coefficients of derivative monomials
//! `Π (δnᵢ)^{kᵢ}`. Processing a node `n` rewrites `(δn)^p` in terms of the
//! perturbations of its operands:
//!
//! - unary `n = f(u)`: `δn = Σ_{j≥1} c_j δu^j` with `c_j = f^(j)(u)/j!`, so the
//!   coefficient of `δu^m` in `(δn)^p` is a sum over the partitions of `m` into
//!   exactly `p` parts (Faà di Bruno, see [`univariate_power`]);
//! - binary `n = a ∘ b`: `δn = α δa + β δB + γ δa δB` where `δB = δb` except for
//!   division, where `δB = δ(1/b) = Σ_{m≥1} (-1)^m / b^{m+1} δb^m`. Then
//!   `(δn)^p = Σ_{i+j+k=p} (p; i,j,k) α^i β^j γ^k δa^{i+k} δB^{j+k}`.
//!
//! The combinatorial part of both expansions depends only on the plan, so it
//! is enumerated once into an [`ExpansionPattern`]; evaluating a node only
//! multiplies in its local coefficients.
//!
//! [`TargetSet`] decides structurally which monomials can still reach a
//! requested derivative; everything else is pruned before it gets storage.

use std::collections::BTreeSet;

use smallvec::SmallVec;

use crate::combinatorics::{arrangements_f64, multinomial_f64, partitions_into, Partition};
use crate::forward::ValueTape;
use crate::graph::{Graph, NodeId};
use crate::monomial::Monomial;
use crate::opcode::{local_taylor, OpCode};
use crate::order::OrderTable;

// ══════════════════════════════════════════════
//  Faà di Bruno
// ══════════════════════════════════════════════

/// Coefficient of `t^m` in `(Σ_{j≥1} c[j] t^j)^p`. `c[0]` is ignored.
///
/// Sums over the partitions of `m` into exactly `p` parts, each weighted by the
/// number of its distinct orderings.
pub fn univariate_power(c: &[f64], p: u32, m: u32) -> f64 {
    if p == 0 {
        return if m == 0 { 1.0 } else { 0.0 };
    }
    partitions_into(m, p)
        .iter()
        .map(|partition| {
            partition_product(arrangements_f64(partition), partition, c)
        })
        .sum()
}

#[inline]
fn partition_product(weight: f64, partition: &[(u32, u32)], c: &[f64]) -> f64 {
    partition.iter().fold(weight, |acc, &(part, mult)| {
        acc * c.get(part as usize).copied().unwrap_or(0.0).powi(mult as i32)
    })
}

/// Taylor coefficients of `f ∘ g` from those of `f` (at `g[0]`) and `g`.
///
/// `h[m] = Σ_{p=1}^{m} f[p] [t^m](g - g[0])^p`; the result has the length of
/// the shorter input.
pub fn faa_di_bruno(outer: &[f64], inner: &[f64]) -> Vec<f64> {
    let n = outer.len().min(inner.len());
    let mut h = vec![0.0; n];
    if n == 0 {
        return h;
    }
    h[0] = outer[0];
    for m in 1..n {
        h[m] = (1..=m)
            .map(|p| outer[p] * univariate_power(inner, p as u32, m as u32))
            .sum();
    }
    h
}

// ══════════════════════════════════════════════
//  Plan-time expansion pattern
// ══════════════════════════════════════════════

/// A partition together with its number of distinct orderings.
#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
struct WeightedPartition {
    weight: f64,
    parts: Partition,
}

/// Value-independent part of every local expansion a plan evaluates.
///
/// For each power `q ≤ max_power` and exponent `m ≤ max_exponent` it stores
/// the partitions of `m` into exactly `q` parts with their arrangement counts,
/// and for `i + j + k ≤ max_power` the trinomial weights `(i+j+k)! / (i! j! k!)`.
/// Lookups outside those ranges are computed on the spot.
#[derive(Clone, Debug, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ExpansionPattern {
    max_power: u32,
    max_exponent: u32,
    /// `partitions[q * (max_exponent + 1) + m]`.
    partitions: Vec<Vec<WeightedPartition>>,
    /// `trinomials[(i * side + j) * side + k]` with `side = max_power + 1`.
    trinomials: Vec<f64>,
}

impl ExpansionPattern {
    pub fn new(max_power: u32, max_exponent: u32) -> Self {
        let width = max_exponent as usize + 1;
        let mut partitions = vec![Vec::new(); (max_power as usize + 1) * width];
        for q in 0..=max_power {
            // (Σ c_j t^j)^q starts at t^q
            for m in q..=max_exponent {
                partitions[q as usize * width + m as usize] = partitions_into(m, q)
                    .into_iter()
                    .map(|parts| WeightedPartition {
                        weight: arrangements_f64(&parts),
                        parts,
                    })
                    .collect();
            }
        }

        let side = max_power as usize + 1;
        let mut trinomials = vec![0.0; side * side * side];
        for i in 0..=max_power {
            for j in 0..=max_power - i {
                for k in 0..=max_power - i - j {
                    trinomials[(i as usize * side + j as usize) * side + k as usize] = multinomial_f64(&[i, j, k]);
                }
            }
        }
        ExpansionPattern {
            max_power,
            max_exponent,
            partitions,
            trinomials,
        }
    }

    #[inline]
    pub fn max_power(&self) -> u32 {
        self.max_power
    }

    #[inline]
    pub fn max_exponent(&self) -> u32 {
        self.max_exponent
    }

    /// Stored partitions of `m` into `q` parts, `None` outside the pattern.
    fn cell(&self, q: u32, m: u32) -> Option<&[WeightedPartition]> {
        if q > self.max_power || m > self.max_exponent {
            return None;
        }
        let idx = q as usize * (self.max_exponent as usize + 1) + m as usize;
        self.partitions.get(idx).map(Vec::as_slice)
    }

    /// Number of stored partitions of `m` into `q` parts.
    pub fn partition_count(&self, q: u32, m: u32) -> Option<usize> {
        self.cell(q, m).map(<[_]>::len)
    }

    /// `[t^m](Σ_{j≥1} c[j] t^j)^q`, the same value as [`univariate_power`].
    pub fn power(&self, c: &[f64], q: u32, m: u32) -> f64 {
        match self.cell(q, m) {
            Some(cell) => cell.iter().map(|wp| partition_product(wp.weight, &wp.parts, c)).sum(),
            None => univariate_power(c, q, m),
        }
    }

    /// `(i + j + k)! / (i! j! k!)`.
    pub fn trinomial(&self, i: u32, j: u32, k: u32) -> f64 {
        let side = self.max_power as usize + 1;
        let stored = (i + j + k <= self.max_power)
            .then(|| self.trinomials.get((i as usize * side + j as usize) * side + k as usize))
            .flatten();
        match stored {
            Some(&w) => w,
            None => multinomial_f64(&[i, j, k]),
        }
    }
}

/// `table[q][m] = [t^m](Σ_{j≥1} c[j] t^j)^q` for `q ≤ max_power`, `m ≤ max_exponent`.
#[derive(Clone, Debug)]
pub(crate) struct PowerTable {
    width: usize,
    values: Vec<f64>,
}

impl PowerTable {
    fn new(c: &[f64], pattern: &ExpansionPattern, max_power: u32, max_exponent: u32) -> Self {
        let width = max_exponent as usize + 1;
        let mut values = vec![0.0; (max_power as usize + 1) * width];
        for q in 0..=max_power {
            for m in q..=max_exponent {
                values[q as usize * width + m as usize] = pattern.power(c, q, m);
            }
        }
        PowerTable { width, values }
    }

    #[inline]
    fn get(&self, q: u32, m: u32) -> f64 {
        let m = m as usize;
        if m >= self.width {
            return 0.0;
        }
        self.values.get(q as usize * self.width + m).copied().unwrap_or(0.0)
    }
}

// ══════════════════════════════════════════════
//  Structural term support
// ══════════════════════════════════════════════

/// Exponent pairs `(ea, eb)` of the operand perturbations that can appear with
/// a nonzero coefficient in `(δn)^p`, truncated to `ea + eb ≤ budget`.
///
/// A node whose two operands are the same node reports merged exponents
/// `(ea + eb, 0)`. Unary nodes report `(ea, 0)`.
pub fn term_exponents(op: OpCode, same_operand: bool, p: u32, budget: u32) -> Vec<(u32, u32)> {
    let mut terms = BTreeSet::new();
    if p == 0 || p > budget {
        return Vec::new();
    }
    if op.is_unary() {
        let top = op.local_degree().map_or(budget, |d| (p * d).min(budget));
        terms.extend((p..=top).map(|e| (e, 0)));
    } else if op.is_binary() {
        let cross = matches!(op, OpCode::Mul | OpCode::Div);
        let series = op == OpCode::Div;
        for k in 0..=(if cross { p } else { 0 }) {
            for i in 0..=(p - k) {
                let j = p - i - k;
                let ea = i + k;
                let q = j + k;
                let eb_max = budget - ea.min(budget);
                let ebs = if series && q > 0 { q..=eb_max } else { q..=q.min(eb_max) };
                for eb in ebs {
                    if same_operand {
                        terms.insert((ea + eb, 0));
                    } else {
                        terms.insert((ea, eb));
                    }
                }
            }
        }
    }
    terms.into_iter().collect()
}

// ══════════════════════════════════════════════
//  Numeric local expansions
// ══════════════════════════════════════════════

/// Numeric coefficients of `(δn)^p` for one node at one point.
#[derive(Clone, Debug)]
pub(crate) enum LocalExpansion<'p> {
    Unary(PowerTable),
    Binary {
        pattern: &'p ExpansionPattern,
        alpha: f64,
        beta: f64,
        gamma: f64,
        cross: bool,
        same_operand: bool,
        /// Powers of the `δ(1/b)` series, division only.
        reciprocal: Option<PowerTable>,
    },
}

impl<'p> LocalExpansion<'p> {
    /// Prepare coefficients for powers up to `max_power` and total operand
    /// exponents up to `max_exponent`.
    pub(crate) fn new(
        graph: &Graph,
        node: NodeId,
        tape: &ValueTape,
        pattern: &'p ExpansionPattern,
        max_power: u32,
        max_exponent: u32,
    ) -> Self {
        let op = graph.op(node);
        let mut operands = graph.operands(node);
        let a = operands.next().map_or(f64::NAN, |id| tape.value(id));
        if op.is_unary() {
            let c = local_taylor(op, a, max_exponent as usize);
            return LocalExpansion::Unary(PowerTable::new(&c, pattern, max_power, max_exponent));
        }
        let b_id = operands.next();
        let b = b_id.map_or(f64::NAN, |id| tape.value(id));
        let same_operand = {
            let mut ops = graph.operands(node);
            ops.next() == ops.next()
        };
        let (alpha, beta, gamma) = match op {
            OpCode::Add => (1.0, 1.0, 0.0),
            OpCode::Sub => (1.0, -1.0, 0.0),
            OpCode::Mul => (b, a, 1.0),
            OpCode::Div => (b.recip(), a, 1.0),
            _ => unreachable!("{op:?} has no local expansion"),
        };
        let reciprocal = (op == OpCode::Div).then(|| {
            // r[m] = (-1)^m / b^(m+1)
            let mut r = vec![0.0; max_exponent as usize + 1];
            let step = -b.recip();
            let mut term = b.recip();
            for rm in r.iter_mut().skip(1) {
                term *= step;
                *rm = term;
            }
            PowerTable::new(&r, pattern, max_power, max_exponent)
        });
        LocalExpansion::Binary {
            pattern,
            alpha,
            beta,
            gamma,
            cross: matches!(op, OpCode::Mul | OpCode::Div),
            same_operand,
            reciprocal,
        }
    }

    /// Coefficient of `δa^ea δb^eb` in `(δn)^p`. For unary nodes and nodes with
    /// identical operands `ea` is the (merged) exponent and `eb` must be 0.
    pub(crate) fn coefficient(&self, p: u32, ea: u32, eb: u32) -> f64 {
        match self {
            LocalExpansion::Unary(powers) => powers.get(p, ea),
            LocalExpansion::Binary { same_operand: true, .. } => {
                debug_assert_eq!(eb, 0);
                (0..=ea).map(|e| self.distinct_coefficient(p, e, ea - e)).sum()
            }
            LocalExpansion::Binary { .. } => self.distinct_coefficient(p, ea, eb),
        }
    }

    fn distinct_coefficient(&self, p: u32, ea: u32, eb: u32) -> f64 {
        let LocalExpansion::Binary {
            pattern,
            alpha,
            beta,
            gamma,
            cross,
            reciprocal,
            ..
        } = self
        else {
            return 0.0;
        };
        let k_max = if *cross { p.min(ea) } else { 0 };
        let mut sum = 0.0;
        for k in 0..=k_max {
            let i = ea - k;
            if i + k > p {
                continue;
            }
            let j = p - i - k;
            let q = j + k;
            let inner = match reciprocal {
                Some(table) => table.get(q, eb),
                None => {
                    if eb == q {
                        1.0
                    } else {
                        0.0
                    }
                }
            };
            if inner == 0.0 {
                continue;
            }
            let weight = pattern.trinomial(i, j, k);
            sum += weight * alpha.powi(i as i32) * beta.powi(j as i32) * gamma.powi(k as i32) * inner;
        }
        sum
    }
}

// ══════════════════════════════════════════════
//  Reachability of targets
// ══════════════════════════════════════════════

/// Requested leaf monomials, indexed for [`TargetSet::includes`].
#[derive(Clone, Debug)]
pub struct TargetSet {
    /// Leaf positions of the distinct leaves used by any target, ascending.
    positions: Vec<usize>,
    /// Per target, exponents aligned with `positions`.
    exponents: Vec<SmallVec<[u32; 4]>>,
    max_total: u32,
}

impl TargetSet {
    /// Index `targets`. Every factor must be a leaf of `graph`.
    ///
    /// # Panics
    ///
    /// Panics on a non-leaf factor; requests are validated before planning.
    pub fn new(graph: &Graph, targets: &[Monomial]) -> Self {
        let leaf_pos = |node: NodeId| {
            graph
                .leaf_position(node)
                .unwrap_or_else(|| panic!("target factor {node} is not a leaf"))
        };
        let positions: Vec<usize> = targets
            .iter()
            .flat_map(|t| t.nodes())
            .map(leaf_pos)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        let exponents = targets
            .iter()
            .map(|t| {
                let mut e: SmallVec<[u32; 4]> = SmallVec::from_elem(0, positions.len());
                for &(node, k) in t.factors() {
                    if let Ok(slot) = positions.binary_search(&leaf_pos(node)) {
                        e[slot] = k;
                    }
                }
                e
            })
            .collect();
        let max_total = targets.iter().map(Monomial::total_order).max().unwrap_or(0);
        TargetSet {
            positions,
            exponents,
            max_total,
        }
    }

    /// Largest total order among the targets.
    #[inline]
    pub fn max_total_order(&self) -> u32 {
        self.max_total
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.exponents.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.exponents.is_empty()
    }

    /// Whether `candidate` can contribute to at least one target.
    ///
    /// Every factor copy of `candidate` must take a nonzero share `e_f` of a
    /// target's leaf exponents, with `e_f[x] ≤ order(node_f, x)` for every leaf
    /// `x`, and the shares must add up to the target exactly.
    pub fn includes(&self, orders: &OrderTable, candidate: &Monomial) -> bool {
        let total = candidate.total_order();
        if total == 0 || total > self.max_total {
            return false;
        }
        let mut caps: Vec<SmallVec<[u32; 4]>> = Vec::with_capacity(total as usize);
        for &(node, k) in candidate.factors() {
            let row = orders.row(node);
            let cap: SmallVec<[u32; 4]> = self.positions.iter().map(|&p| row[p].bound()).collect();
            if cap.iter().all(|&c| c == 0) {
                return false;
            }
            for _ in 0..k {
                caps.push(cap.clone());
            }
        }
        self.exponents.iter().any(|target| {
            let sum: u32 = target.iter().sum();
            if sum < total {
                return false;
            }
            let mut remaining = target.clone();
            assign_shares(&caps, 0, &mut remaining)
        })
    }
}

/// Backtracking search for nonzero shares `e_f ≤ caps[f]` summing to `remaining`.
fn assign_shares(caps: &[SmallVec<[u32; 4]>], idx: usize, remaining: &mut [u32]) -> bool {
    if idx == caps.len() {
        return remaining.iter().all(|&r| r == 0);
    }
    let left = (caps.len() - idx) as u64;
    if remaining.iter().map(|&r| u64::from(r)).sum::<u64>() < left {
        return false;
    }
    for l in 0..remaining.len() {
        if remaining[l] > 0 {
            let room: u64 = caps[idx..].iter().map(|c| u64::from(c[l].min(remaining[l]))).sum();
            if room < u64::from(remaining[l]) {
                return false;
            }
        }
    }

    let n = remaining.len();
    let limits: SmallVec<[u32; 4]> = (0..n).map(|l| caps[idx][l].min(remaining[l])).collect();
    let mut share: SmallVec<[u32; 4]> = SmallVec::from_elem(0, n);
    loop {
        // next nonzero share in odometer order
        let mut l = 0;
        loop {
            if l == n {
                return false;
            }
            if share[l] < limits[l] {
                share[l] += 1;
                break;
            }
            share[l] = 0;
            l += 1;
        }
        for (r, &s) in remaining.iter_mut().zip(&share) {
            *r -= s;
        }
        let found = assign_shares(caps, idx + 1, remaining);
        for (r, &s) in remaining.iter_mut().zip(&share) {
            *r += s;
        }
        if found {
            return true;
        }
    }
}

/// Whether `candidate` can contribute to any of `targets` (monomials over
/// leaves of `graph`).
pub fn monomial_included(graph: &Graph, orders: &OrderTable, candidate: &Monomial, targets: &[Monomial]) -> bool {
    TargetSet::new(graph, targets).includes(orders, candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn power_of_geometric_series() {
        // (t + t² + t³ + ...)^2 = t² + 2t³ + 3t⁴ + ...
        let c = [0.0, 1.0, 1.0, 1.0, 1.0, 1.0];
        assert_eq!(univariate_power(&c, 2, 2), 1.0);
        assert_eq!(univariate_power(&c, 2, 3), 2.0);
        assert_eq!(univariate_power(&c, 2, 4), 3.0);
        assert_eq!(univariate_power(&c, 3, 2), 0.0);
        assert_eq!(univariate_power(&c, 0, 0), 1.0);
    }

    #[test]
    fn pattern_matches_direct_enumeration() {
        let c = [0.0, 0.7, -1.3, 0.25, 2.0, -0.5];
        let pattern = ExpansionPattern::new(3, 5);
        for q in 0..=3 {
            for m in 0..=5 {
                let direct = univariate_power(&c, q, m);
                assert!((pattern.power(&c, q, m) - direct).abs() <= 1e-15 * direct.abs().max(1.0));
            }
        }
        assert_eq!(pattern.partition_count(2, 5), Some(2));
        assert_eq!(pattern.partition_count(4, 5), None);
        // outside the stored range the value is still right
        assert_eq!(pattern.power(&c, 4, 7), univariate_power(&c, 4, 7));
        assert_eq!(pattern.trinomial(1, 1, 1), 6.0);
        assert_eq!(pattern.trinomial(2, 2, 0), 6.0);
        assert_eq!(pattern.trinomial(0, 0, 0), 1.0);
    }

    #[test]
    fn mul_terms() {
        assert_eq!(term_exponents(OpCode::Mul, false, 1, 1), vec![(0, 1), (1, 0)]);
        assert_eq!(term_exponents(OpCode::Mul, false, 1, 2), vec![(0, 1), (1, 0), (1, 1)]);
        assert_eq!(term_exponents(OpCode::Mul, true, 1, 2), vec![(1, 0), (2, 0)]);
        assert_eq!(term_exponents(OpCode::Add, false, 2, 2), vec![(0, 2), (1, 1), (2, 0)]);
    }

    #[test]
    fn div_terms_include_reciprocal_series() {
        let terms = term_exponents(OpCode::Div, false, 1, 3);
        assert!(terms.contains(&(0, 3)));
        assert!(terms.contains(&(1, 2)));
        assert!(!terms.contains(&(2, 0)));
    }

    #[test]
    fn unary_terms() {
        assert_eq!(term_exponents(OpCode::Exp, false, 2, 4), vec![(2, 0), (3, 0), (4, 0)]);
        assert_eq!(term_exponents(OpCode::Neg, false, 2, 4), vec![(2, 0)]);
        assert!(term_exponents(OpCode::Exp, false, 3, 2).is_empty());
    }
}
