//! Request validation and floating-point fault propagation.

use taylorback::{derivatives, evaluate, gradient, Error, Evaluator, Graph, GraphBuilder, Monomial, OpCode};

fn product() -> (Graph, taylorback::NodeId, taylorback::NodeId, taylorback::NodeId) {
    let mut g = Graph::new();
    let x = g.leaf();
    let y = g.leaf();
    let f = g.mul(x, y);
    (g, x, y, f)
}

#[test]
fn derivative_with_respect_to_interior_node() {
    let (g, x, _, f) = product();
    let err = Evaluator::new(&g, f, &[Monomial::d(x) * Monomial::d(f)]).unwrap_err();
    assert_eq!(err, Error::NotALeaf(f));
    assert!(err.to_string().contains("not a leaf"));
}

#[test]
fn empty_requests() {
    let (g, _, _, f) = product();
    assert_eq!(Evaluator::new(&g, f, &[]).unwrap_err(), Error::NoTargets);
    assert_eq!(
        Evaluator::new(&g, f, &[Monomial::d_n(f, 1), Monomial::one()]).unwrap_err(),
        Error::NotALeaf(f)
    );
}

#[test]
fn order_zero_target() {
    let (g, x, y, f) = product();
    let err = Evaluator::new(&g, f, &[Monomial::d(x), Monomial::d(y), Monomial::one()]).unwrap_err();
    assert_eq!(err, Error::EmptyTarget(2));
}

#[test]
fn foreign_handles() {
    let (g, x, _, _) = product();
    let mut big = Graph::new();
    let a = big.leaf();
    let b = big.leaf();
    let c = big.add(a, b);
    let foreign = big.exp(c);

    match Evaluator::new(&g, foreign, &[Monomial::d(x)]) {
        Err(Error::UnknownNode { node, len }) => {
            assert_eq!(node, foreign);
            assert_eq!(len, 3);
        }
        other => panic!("expected UnknownNode, got {other:?}"),
    }
    let mut g = g;
    assert!(matches!(
        g.combine(OpCode::Sin, &[foreign]),
        Err(Error::UnknownNode { .. })
    ));
}

#[test]
fn combine_checks_arity() {
    let (mut g, x, y, _) = product();
    assert_eq!(
        g.combine(OpCode::Exp, &[x, y]),
        Err(Error::Arity {
            op: OpCode::Exp,
            expected: 1,
            got: 2
        })
    );
    assert_eq!(g.combine(OpCode::Leaf, &[]), Err(Error::NotAnOperation(OpCode::Leaf)));
    assert_eq!(g.combine(OpCode::Const, &[x]), Err(Error::NotAnOperation(OpCode::Const)));
    let sum = g.combine(OpCode::Add, &[x, y]).unwrap();
    assert_eq!(g.combine(OpCode::Add, &[x, y]), Ok(sum));
}

#[test]
fn wrong_number_of_leaf_values() {
    let (g, x, _, f) = product();
    let eval = Evaluator::new(&g, f, &[Monomial::d(x)]).unwrap();
    assert_eq!(eval.evaluate(&[1.0]).unwrap_err(), Error::LeafCount { expected: 2, got: 1 });
    assert_eq!(
        evaluate(&g, &[1.0, 2.0, 3.0]).unwrap_err(),
        Error::LeafCount { expected: 2, got: 3 }
    );
    assert!(gradient(&g, f, &[]).is_err());
}

#[test]
fn domain_faults_propagate_as_nan() {
    let b = GraphBuilder::new();
    let x = b.leaf();
    let f = x.ln().id();
    let x = x.id();
    let g = b.finish();

    let d = derivatives(&g, f, &[Monomial::d(x), Monomial::d_n(x, 2)], &[-1.0]).unwrap();
    assert!(d.value().is_nan());
    // d/dx ln x = 1/x stays finite, the primal does not
    assert_eq!(d.derivatives()[0], -1.0);
    assert_eq!(d.derivatives()[1], -1.0);
}

#[test]
fn division_by_zero_gives_infinities() {
    let b = GraphBuilder::new();
    let x = b.leaf();
    let y = b.leaf();
    let f = (x / y).id();
    let (x, y) = (x.id(), y.id());
    let g = b.finish();

    let d = derivatives(&g, f, &[Monomial::d(x), Monomial::d(y)], &[1.0, 0.0]).unwrap();
    assert_eq!(d.value(), f64::INFINITY);
    assert_eq!(d.derivatives()[0], f64::INFINITY);
    assert!(d.derivatives()[1].is_nan() || d.derivatives()[1].is_infinite());
}

#[test]
fn graph_without_leaves() {
    let mut g = Graph::new();
    let c = g.constant(2.0);
    let f = g.sqrt(c);
    assert_eq!(gradient(&g, f, &[]).unwrap(), Vec::<f64>::new());
    assert_eq!(evaluate(&g, &[]).unwrap().value(f), 2.0_f64.sqrt());
}
