//! Canonical derivative monomials.
//!
//! A [`Monomial`] is a product `Π (δnᵢ)^{kᵢ}` of differentiation operators over
//! graph nodes, stored as `(node, power)` pairs sorted by node handle with every
//! power at least 1. Equality is equality of that canonical sequence, so
//! `d(x) * d(y)` and `d(y) * d(x)` are the same request.
//!
//! Requests are monomials over leaves only; the planner also forms monomials
//! over interior nodes while it pushes derivative terms through the graph.

use std::fmt;
use std::ops::Mul;

use smallvec::SmallVec;

use crate::combinatorics::multi_indices;
use crate::graph::NodeId;

#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(from = "RawMonomial")
)]
pub struct Monomial {
    factors: SmallVec<[(NodeId, u32); 4]>,
}

/// Factor list as stored; canonicalized on load.
#[cfg(feature = "serde")]
#[derive(serde::Deserialize)]
struct RawMonomial {
    factors: Vec<(NodeId, u32)>,
}

#[cfg(feature = "serde")]
impl From<RawMonomial> for Monomial {
    fn from(raw: RawMonomial) -> Self {
        Monomial::from_factors(raw.factors)
    }
}

impl Monomial {
    /// The empty product (order zero).
    pub fn one() -> Self {
        Monomial::default()
    }

    /// First-order operator `δnode`.
    pub fn d(node: NodeId) -> Self {
        Monomial::d_n(node, 1)
    }

    /// `order`-th power `(δnode)^order`. Order zero gives [`Monomial::one`].
    pub fn d_n(node: NodeId, order: u32) -> Self {
        let mut factors = SmallVec::new();
        if order > 0 {
            factors.push((node, order));
        }
        Monomial { factors }
    }

    /// Build from arbitrary `(node, power)` pairs; repeated nodes are merged and
    /// zero powers dropped.
    pub fn from_factors<I: IntoIterator<Item = (NodeId, u32)>>(factors: I) -> Self {
        let mut m = Monomial::one();
        for (node, power) in factors {
            m.insert(node, power);
        }
        m
    }

    /// Every mixed partial over `leaves` with total order `1..=max_order`,
    /// grouped by increasing total order.
    pub fn all_up_to(leaves: &[NodeId], max_order: u32) -> Vec<Monomial> {
        multi_indices(leaves.len(), max_order)
            .into_iter()
            .map(|exps| Monomial::from_factors(leaves.iter().copied().zip(exps)))
            .collect()
    }

    pub fn factors(&self) -> &[(NodeId, u32)] {
        &self.factors
    }

    pub fn is_one(&self) -> bool {
        self.factors.is_empty()
    }

    /// Number of distinct nodes.
    pub fn len(&self) -> usize {
        self.factors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.factors.is_empty()
    }

    /// Sum of all powers.
    pub fn total_order(&self) -> u32 {
        self.factors.iter().map(|&(_, k)| k).sum()
    }

    /// Power of `node` in this monomial (0 if absent).
    pub fn power_of(&self, node: NodeId) -> u32 {
        match self.factors.binary_search_by_key(&node, |&(n, _)| n) {
            Ok(pos) => self.factors[pos].1,
            Err(_) => 0,
        }
    }

    pub fn nodes(&self) -> impl Iterator<Item = NodeId> + '_ {
        self.factors.iter().map(|&(n, _)| n)
    }

    /// This monomial with every power of `node` removed.
    pub fn without(&self, node: NodeId) -> Monomial {
        let mut m = self.clone();
        if let Ok(pos) = m.factors.binary_search_by_key(&node, |&(n, _)| n) {
            m.factors.remove(pos);
        }
        m
    }

    /// Multiply in place by `(δnode)^power`.
    pub fn insert(&mut self, node: NodeId, power: u32) {
        if power == 0 {
            return;
        }
        match self.factors.binary_search_by_key(&node, |&(n, _)| n) {
            Ok(pos) => self.factors[pos].1 += power,
            Err(pos) => self.factors.insert(pos, (node, power)),
        }
    }

    /// `Π kᵢ!`: the factor turning a Taylor coefficient into a derivative.
    pub fn factorial_weight(&self) -> f64 {
        self.factors
            .iter()
            .map(|&(_, k)| (2..=k).map(f64::from).product::<f64>())
            .product()
    }
}

impl Mul<&Monomial> for &Monomial {
    type Output = Monomial;

    fn mul(self, rhs: &Monomial) -> Monomial {
        let mut factors = SmallVec::with_capacity(self.factors.len() + rhs.factors.len());
        let (mut i, mut j) = (0, 0);
        while i < self.factors.len() && j < rhs.factors.len() {
            let (a, b) = (self.factors[i], rhs.factors[j]);
            match a.0.cmp(&b.0) {
                std::cmp::Ordering::Less => {
                    factors.push(a);
                    i += 1;
                }
                std::cmp::Ordering::Greater => {
                    factors.push(b);
                    j += 1;
                }
                std::cmp::Ordering::Equal => {
                    factors.push((a.0, a.1 + b.1));
                    i += 1;
                    j += 1;
                }
            }
        }
        factors.extend_from_slice(&self.factors[i..]);
        factors.extend_from_slice(&rhs.factors[j..]);
        Monomial { factors }
    }
}

impl Mul for Monomial {
    type Output = Monomial;

    fn mul(self, rhs: Monomial) -> Monomial {
        &self * &rhs
    }
}

impl fmt::Display for Monomial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.factors.is_empty() {
            return write!(f, "1");
        }
        for (i, &(node, k)) in self.factors.iter().enumerate() {
            if i > 0 {
                write!(f, "·")?;
            }
            if k == 1 {
                write!(f, "d({node})")?;
            } else {
                write!(f, "d({node})^{k}")?;
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn n(i: u32) -> NodeId {
        NodeId(i)
    }

    #[test]
    fn mixed_partials_are_commutative() {
        let xy = Monomial::d(n(0)) * Monomial::d(n(1));
        let yx = Monomial::d(n(1)) * Monomial::d(n(0));
        assert_eq!(xy, yx);
        assert_eq!(xy.factors(), &[(n(0), 1), (n(1), 1)]);
    }

    #[test]
    fn repeated_factors_merge() {
        let xx = Monomial::d(n(3)) * Monomial::d(n(3));
        assert_eq!(xx, Monomial::d_n(n(3), 2));
        let m = Monomial::from_factors([(n(2), 1), (n(0), 0), (n(2), 2), (n(1), 1)]);
        assert_eq!(m.factors(), &[(n(1), 1), (n(2), 3)]);
        assert_eq!(m.total_order(), 4);
        assert_eq!(m.power_of(n(2)), 3);
        assert_eq!(m.power_of(n(0)), 0);
    }

    #[test]
    fn without_and_insert() {
        let mut m = Monomial::d_n(n(5), 2) * Monomial::d(n(1));
        assert_eq!(m.without(n(5)), Monomial::d(n(1)));
        m.insert(n(3), 1);
        assert_eq!(m.factors(), &[(n(1), 1), (n(3), 1), (n(5), 2)]);
        assert!(Monomial::d_n(n(0), 0).is_one());
    }

    #[test]
    fn factorial_weight_is_product_of_factorials() {
        let m = Monomial::d_n(n(0), 3) * Monomial::d_n(n(1), 2);
        assert_eq!(m.factorial_weight(), 12.0);
        assert_eq!(Monomial::one().factorial_weight(), 1.0);
    }

    #[test]
    fn all_up_to_enumerates_distinct_requests() {
        let leaves = [n(0), n(1)];
        let all = Monomial::all_up_to(&leaves, 2);
        assert_eq!(all.len(), 5);
        assert_eq!(all[0], Monomial::d(n(0)));
        assert!(all.contains(&(Monomial::d(n(0)) * Monomial::d(n(1)))));
        assert!(all.contains(&Monomial::d_n(n(1), 2)));
    }

    #[test]
    fn display() {
        let m = Monomial::d_n(n(0), 2) * Monomial::d(n(4));
        assert_eq!(m.to_string(), "d(%0)^2·d(%4)");
        assert_eq!(Monomial::one().to_string(), "1");
    }
}
