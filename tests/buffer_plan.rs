//! Exact accumulator sizing and plan reuse.

use approx::assert_relative_eq;
use taylorback::plan::Dest;
use taylorback::{accumulate, evaluate, plan, AccumulatorBuffer, Evaluator, GraphBuilder, Monomial, OrderTable};

fn init_logger() {
    let _ = env_logger::builder().is_test(true).try_init();
}

#[test]
fn log_erfc_third_order_needs_three_slots() {
    init_logger();
    let b = GraphBuilder::new();
    let x = b.leaf();
    let f = x.erfc().ln().id();
    let x = x.id();
    let g = b.finish();

    let requests = [Monomial::d(x), Monomial::d_n(x, 2), Monomial::d_n(x, 3)];
    let eval = Evaluator::new(&g, f, &requests).unwrap();
    assert_eq!(eval.plan().slot_count(), 3);

    let mut ws = eval.workspace();
    eval.evaluate_with(&[1.2], &mut ws).unwrap();
    assert_eq!(ws.peak_slots(), 3);
}

#[test]
fn two_variable_requests_need_three_slots() {
    init_logger();
    for which in 0..3 {
        let b = GraphBuilder::new();
        let x = b.leaf();
        let y = b.leaf();
        let f = match which {
            0 => (x + y).ln(),
            1 => (x * y).erfc(),
            _ => (x / y).erfc(),
        };
        let (x, y, f) = (x.id(), y.id(), f.id());
        let g = b.finish();

        let requests = [
            Monomial::d(x),
            Monomial::d(y),
            Monomial::d(x) * Monomial::d(y),
            Monomial::d_n(x, 5),
        ];
        let eval = Evaluator::new(&g, f, &requests).unwrap();
        assert_eq!(eval.plan().slot_count(), 3, "expression {which}");
        let mut ws = eval.workspace();
        eval.evaluate_with(&[1.2, 0.4], &mut ws).unwrap();
        assert_eq!(ws.peak_slots(), 3);
    }
}

#[test]
fn single_unary_needs_one_slot() {
    let b = GraphBuilder::new();
    let x = b.leaf();
    let f = x.erfc().id();
    let x = x.id();
    let g = b.finish();

    let requests = [Monomial::d(x), Monomial::d_n(x, 2), Monomial::d_n(x, 3)];
    let eval = Evaluator::new(&g, f, &requests).unwrap();
    assert_eq!(eval.plan().slot_count(), 1);
    assert_eq!(eval.plan().num_steps(), 1);
    assert_eq!(eval.plan().schedule().len(), 1);
    assert_eq!(eval.plan().root_dest(), Some(Dest::Slot(0)));
}

#[test]
fn constant_root_needs_no_storage() {
    let b = GraphBuilder::new();
    let x = b.leaf();
    let c = b.constant(3.0).exp();
    let (x, c) = (x.id(), c.id());
    let g = b.finish();

    let eval = Evaluator::new(&g, c, &[Monomial::d(x), Monomial::d_n(x, 4)]).unwrap();
    assert_eq!(eval.plan().slot_count(), 0);
    assert_eq!(eval.plan().root_dest(), None);
    assert!(eval.plan().schedule().is_empty());

    let d = eval.evaluate(&[0.5]).unwrap();
    assert_relative_eq!(d.value(), 3.0_f64.exp(), epsilon = 1e-12);
    assert_eq!(d.derivatives(), &[0.0, 0.0]);
}

#[test]
fn leaf_root_seeds_its_own_target() {
    let b = GraphBuilder::new();
    let x = b.leaf();
    let y = b.leaf();
    let (x, y) = (x.id(), y.id());
    let g = b.finish();

    let eval = Evaluator::new(&g, x, &[Monomial::d(x), Monomial::d(y), Monomial::d_n(x, 2)]).unwrap();
    assert_eq!(eval.plan().slot_count(), 0);
    assert_eq!(eval.plan().root_dest(), Some(Dest::Target(0)));
    let d = eval.evaluate(&[0.25, 4.0]).unwrap();
    assert_eq!(d.derivatives(), &[1.0, 0.0, 0.0]);
}

#[test]
fn pruned_branches_get_no_slot() {
    let b = GraphBuilder::new();
    let x = b.leaf();
    let y = b.leaf();
    // the y-branch is dead for a request in x only
    let f = x.sin() * y.exp() + y.cos();
    let (x, f) = (x.id(), f.id());
    let g = b.finish();

    let eval = Evaluator::new(&g, f, &[Monomial::d(x)]).unwrap();
    for a in eval.plan().slot_assignment() {
        assert!(a.monomial.total_order() == 1);
    }
    let d = eval.evaluate(&[0.3, 0.7]).unwrap();
    assert_relative_eq!(d.derivatives()[0], 0.3_f64.cos() * 0.7_f64.exp(), epsilon = 1e-14);
    assert!(eval.plan().slot_count() <= 2);
}

#[test]
fn plan_is_reused_across_points() {
    let b = GraphBuilder::new();
    let x = b.leaf();
    let y = b.leaf();
    let f = (x * y).sin() + x / y;
    let (x, y, f) = (x.id(), y.id(), f.id());
    let g = b.finish();

    let orders = OrderTable::new(&g);
    let requests = [Monomial::d(x), Monomial::d(x) * Monomial::d(y), Monomial::d_n(y, 2)];
    let plan = plan(&g, &orders, f, &requests).unwrap();
    let mut buffer = AccumulatorBuffer::with_slots(plan.slot_count());

    for i in 0..8 {
        let (xv, yv) = (0.2 + 0.1 * i as f64, 1.3 - 0.05 * i as f64);
        let tape = evaluate(&g, &[xv, yv]).unwrap();
        let taylor = accumulate(&g, &plan, &tape, 1.0, &mut buffer);
        assert_eq!(buffer.peak(), plan.slot_count());
        assert_eq!(buffer.live(), 0);
        assert_eq!(buffer.len(), plan.slot_count());

        let u = xv * yv;
        let fx = yv * u.cos() + 1.0 / yv;
        let fxy = u.cos() - u * u.sin() - 1.0 / (yv * yv);
        let fyy = -xv * xv * u.sin() + 2.0 * xv / (yv * yv * yv);
        assert_relative_eq!(taylor[0], fx, epsilon = 1e-12);
        assert_relative_eq!(taylor[1], fxy, epsilon = 1e-12);
        // Taylor coefficient is half the second derivative
        assert_relative_eq!(taylor[2], fyy / 2.0, epsilon = 1e-12);
    }
}

#[test]
fn expansion_pattern_covers_every_scheduled_node() {
    let b = GraphBuilder::new();
    let x = b.leaf();
    let y = b.leaf();
    let f = (x / y).exp() * (x * y).atan();
    let (x, y, f) = (x.id(), y.id(), f.id());
    let g = b.finish();

    let orders = OrderTable::new(&g);
    let requests = [Monomial::d_n(x, 3), Monomial::d_n(x, 2) * Monomial::d(y)];
    let plan = plan(&g, &orders, f, &requests).unwrap();
    let pattern = plan.expansion_pattern();
    assert!(!plan.schedule().is_empty());
    for entry in plan.schedule() {
        assert!(entry.max_power <= pattern.max_power());
        assert!(entry.max_exponent <= pattern.max_exponent());
    }
    let top_power = plan.schedule().iter().map(|e| e.max_power).max();
    assert_eq!(Some(pattern.max_power()), top_power);
    assert!(pattern.max_exponent() <= 3);
    // 3 = 2 + 1 is the only split into two parts
    assert_eq!(pattern.partition_count(2, 3), Some(1));
}

#[test]
fn batch_matches_pointwise() {
    let b = GraphBuilder::new();
    let x = b.leaf();
    let y = b.leaf();
    let f = (x * x + y).sqrt().atan();
    let (x, y, f) = (x.id(), y.id(), f.id());
    let g = b.finish();

    let requests = Monomial::all_up_to(&[x, y], 3);
    let eval = Evaluator::new(&g, f, &requests).unwrap();
    let points = [[0.3, 0.4], [1.1, 0.2], [0.7, 0.9]];
    let batch = eval.evaluate_batch(&points).unwrap();
    for (p, d) in points.iter().zip(&batch) {
        assert_eq!(*d, eval.evaluate(p).unwrap());
    }
}
