//! Structural reachability of derivative targets.

use taylorback::{monomial_included, GraphBuilder, Monomial, OrderTable, TargetSet};

#[test]
fn erfc_factor_against_second_leaf_derivative() {
    let b = GraphBuilder::new();
    let v = b.leaf();
    let e = v.erfc();
    let (v, e) = (v.id(), e.id());
    let g = b.finish();
    let orders = OrderTable::new(&g);

    let candidate = Monomial::d(e) * Monomial::d(v);
    assert!(!monomial_included(&g, &orders, &candidate, &[Monomial::d(v)]));
    assert!(monomial_included(&g, &orders, &candidate, &[Monomial::d_n(v, 2)]));
    assert!(monomial_included(&g, &orders, &candidate, &[Monomial::d_n(v, 3)]));
}

#[test]
fn sum_squared_reaches_the_mixed_partial() {
    let b = GraphBuilder::new();
    let x = b.leaf();
    let y = b.leaf();
    let s = x + y;
    let (x, y, s) = (x.id(), y.id(), s.id());
    let g = b.finish();
    let orders = OrderTable::new(&g);

    let targets = [Monomial::d(x), Monomial::d(y), Monomial::d(x) * Monomial::d(y)];
    assert!(monomial_included(&g, &orders, &Monomial::d_n(s, 2), &targets));
    assert!(!monomial_included(&g, &orders, &Monomial::d_n(s, 3), &targets));
}

#[test]
fn leaf_budget_is_shared_between_factors() {
    let b = GraphBuilder::new();
    let k = b.leaf();
    let s = b.leaf();
    let v = b.leaf();
    let ks = k * s;
    let sqrt_v = v.sqrt();
    let vv = v * v;
    let kk = k * k;
    let (k, v) = (k.id(), v.id());
    let (ks, sqrt_v, vv, kk) = (ks.id(), sqrt_v.id(), vv.id(), kk.id());
    let g = b.finish();
    let orders = OrderTable::new(&g);

    let d2v = Monomial::d_n(v, 2);
    assert!(!monomial_included(&g, &orders, &(Monomial::d(ks) * Monomial::d(sqrt_v)), &[d2v.clone()]));
    assert!(!monomial_included(&g, &orders, &(Monomial::d(k) * Monomial::d(vv)), &[d2v.clone()]));
    assert!(!monomial_included(
        &g,
        &orders,
        &(Monomial::d(kk) * Monomial::d(vv)),
        &[d2v.clone(), Monomial::d_n(k, 2)]
    ));
    // with a mixed target the same product becomes reachable
    assert!(monomial_included(
        &g,
        &orders,
        &(Monomial::d(kk) * Monomial::d(vv)),
        &[Monomial::d_n(k, 2) * Monomial::d_n(v, 2)]
    ));
}

#[test]
fn quotient_reaches_both_gradients() {
    let b = GraphBuilder::new();
    let x = b.leaf();
    let y = b.leaf();
    let q = x / y;
    let (x, y, q) = (x.id(), y.id(), q.id());
    let g = b.finish();
    let orders = OrderTable::new(&g);

    assert!(monomial_included(&g, &orders, &Monomial::d(q), &[Monomial::d(x), Monomial::d(y)]));
}

#[test]
fn target_set_limits() {
    let b = GraphBuilder::new();
    let x = b.leaf();
    let y = b.leaf();
    let c = b.constant(2.0);
    let e = (x * y).exp();
    let (x, y, c, e) = (x.id(), y.id(), c.id(), e.id());
    let g = b.finish();
    let orders = OrderTable::new(&g);

    let targets = [Monomial::d_n(x, 2), Monomial::d(x) * Monomial::d(y)];
    let set = TargetSet::new(&g, &targets);
    assert_eq!(set.len(), 2);
    assert_eq!(set.max_total_order(), 2);

    assert!(set.includes(&orders, &Monomial::d_n(e, 2)));
    assert!(!set.includes(&orders, &Monomial::d_n(e, 3)));
    assert!(!set.includes(&orders, &Monomial::one()));
    assert!(!set.includes(&orders, &Monomial::d(c)));
    // a pure leaf monomial only reaches itself
    assert!(set.includes(&orders, &Monomial::d_n(x, 2)));
    assert!(!set.includes(&orders, &Monomial::d_n(y, 2)));
    assert!(!set.includes(&orders, &Monomial::d(x)));
}
