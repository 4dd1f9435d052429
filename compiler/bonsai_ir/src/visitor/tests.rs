#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test code uses unwrap for concise assertions"
)]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::descriptor::{MemberSlim, ObjectSlim, TypeSlim};
use crate::slim::{ParameterSlim, UnaryOp};
use crate::SlimEquality;

fn int(v: i32) -> Expr {
    Expr::constant(v, TypeSlim::int32())
}

/// Rewriter that keeps every node.
struct Identity;

impl Rewriter for Identity {}

/// Replaces the integer constant `from` with `to`.
struct ReplaceConstant {
    from: i32,
    to: i32,
}

impl Rewriter for ReplaceConstant {
    fn visit_constant(&mut self, node: &Arc<ConstantSlim>) -> Visited {
        if node.value == ObjectSlim::from(self.from) {
            Ok(int(self.to))
        } else {
            Ok(Expr::Constant(Arc::clone(node)))
        }
    }
}

fn sample_tree() -> Expr {
    let x = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    let y = ParameterSlim::new(TypeSlim::int32(), Some("y"));
    let sum = Expr::add(x.clone().into(), Expr::multiply(y.clone().into(), int(2)));
    let cond = Expr::condition(
        Expr::greater_than(sum.clone(), int(10)),
        sum,
        Expr::negate(x.clone().into()),
    );
    let done = crate::slim::LabelTarget::new(Some(TypeSlim::int32()), Some("done"));
    let body = Expr::block(
        vec![],
        vec![
            Expr::goto(done.clone()),
            Expr::label(done, Some(cond)),
        ],
    )
    .unwrap();
    Expr::lambda(body, vec![x, y]).unwrap()
}

// ── Structural sharing ────────────────────────────────────────────

#[test]
fn identity_rewrite_returns_same_root() {
    let tree = sample_tree();
    let out = Identity.visit(&tree).unwrap();
    assert!(out.ptr_eq(&tree));
}

#[test]
fn unaffected_subtrees_are_shared() {
    let left = Expr::add(int(1), int(2));
    let right = Expr::multiply(int(3), int(4));
    let tree = Expr::subtract(left.clone(), right.clone());

    let out = ReplaceConstant { from: 3, to: 30 }.visit(&tree).unwrap();
    assert!(!out.ptr_eq(&tree));
    let Expr::Binary(b) = &out else { unreachable!() };
    assert!(b.left.ptr_eq(&left));
    assert!(!b.right.ptr_eq(&right));
}

fn arb_expr() -> impl Strategy<Value = Expr> {
    let leaf = prop_oneof![
        any::<i32>().prop_map(int),
        Just(Expr::default_value(TypeSlim::int32())),
    ];
    leaf.prop_recursive(6, 64, 6, |inner| {
        prop_oneof![
            (inner.clone(), inner.clone()).prop_map(|(l, r)| Expr::add(l, r)),
            (inner.clone(), inner.clone(), inner.clone())
                .prop_map(|(t, a, b)| Expr::condition(t, a, b)),
            inner.clone().prop_map(Expr::negate),
            prop::collection::vec(inner.clone(), 0..8).prop_map(|args| {
                let method = MemberSlim::static_method(
                    TypeSlim::simple("Acme.Math"),
                    "Sum",
                    vec![TypeSlim::int32(); args.len()],
                    TypeSlim::int32(),
                );
                Expr::call(None, method, args).unwrap()
            }),
            prop::collection::vec(inner, 1..8)
                .prop_map(|items| Expr::new_array_init(TypeSlim::int32(), items)),
        ]
    })
}

proptest! {
    #[test]
    fn identity_rewrite_shares_every_tree(tree in arb_expr()) {
        let out = Identity.visit(&tree).unwrap();
        prop_assert!(out.ptr_eq(&tree));
    }
}

// ── Copy-on-write lists ───────────────────────────────────────────

#[test]
fn unchanged_list_is_returned_as_is() {
    let list: Arc<[Expr]> = (0..5).map(int).collect();
    let mut calls = 0;
    let out = rewrite_list(&list, |e| -> Result<Expr, SlimError> {
        calls += 1;
        Ok(e.clone())
    })
    .unwrap();
    assert!(Arc::ptr_eq(&out, &list));
    assert_eq!(calls, 5);
}

#[test]
fn changed_list_copies_prefix_and_visits_rest() {
    let list: Arc<[Expr]> = (0..6).map(int).collect();
    let mut calls = 0;
    let out = rewrite_list(&list, |e| -> Result<Expr, SlimError> {
        calls += 1;
        Ok(if calls == 3 || calls == 5 { int(99) } else { e.clone() })
    })
    .unwrap();

    assert_eq!(calls, 6);
    assert_eq!(out.len(), list.len());
    assert!(!Arc::ptr_eq(&out, &list));
    for i in [0, 1, 3, 5] {
        assert!(out[i].ptr_eq(&list[i]), "element {i} should be shared");
    }
    for i in [2, 4] {
        assert!(!out[i].ptr_eq(&list[i]), "element {i} should be replaced");
    }
}

#[test]
fn list_errors_propagate_after_first_change() {
    let list: Arc<[Expr]> = (0..4).map(int).collect();
    let mut calls = 0;
    let out = rewrite_list(&list, |e| {
        calls += 1;
        match calls {
            1 => Ok(int(7)),
            3 => Err("boom"),
            _ => Ok(e.clone()),
        }
    });
    assert_eq!(out.unwrap_err(), "boom");
    // Visiting stops at the failure.
    assert_eq!(calls, 3);
}

#[test]
fn inline_arguments_rewrite_without_list() {
    let method = MemberSlim::static_method(
        TypeSlim::simple("Acme.Math"),
        "Sum3",
        vec![TypeSlim::int32(); 3],
        TypeSlim::int32(),
    );
    let call = Expr::call(None, method, vec![int(1), int(2), int(3)]).unwrap();
    let out = ReplaceConstant { from: 2, to: 20 }.visit(&call).unwrap();
    let Expr::MethodCall(c) = &out else { unreachable!() };
    assert!(c.arguments.is_inline());
    assert_eq!(c.arguments.len(), 3);
    let Expr::MethodCall(orig) = &call else { unreachable!() };
    assert!(c.arguments.get(0).unwrap().ptr_eq(orig.arguments.get(0).unwrap()));
    assert!(!c.arguments.get(1).unwrap().ptr_eq(orig.arguments.get(1).unwrap()));
}

// ── Convert-and-cast ──────────────────────────────────────────────

#[test]
fn replacing_a_declared_parameter_is_an_invariant_violation() {
    let x = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    let lambda = Expr::lambda(x.clone().into(), vec![x.clone()]).unwrap();

    let mut subst = Substitutor::new().with(&x, int(5));
    let err = subst.apply(&lambda).unwrap_err();
    assert_eq!(
        err,
        SlimError::InvariantViolation {
            call_site: "LambdaSlim.parameters",
            expected: NodeKind::Parameter,
            found: NodeKind::Constant,
        }
    );
}

#[test]
fn not_supported_is_declared_by_rewriter() {
    struct NoLoops;
    impl Rewriter for NoLoops {
        fn visit_loop(&mut self, _node: &Arc<crate::slim::LoopSlim>) -> Visited {
            Err(SlimError::NotSupported {
                kind: NodeKind::Loop,
                detail: "loops are not allowed here".into(),
            })
        }
    }

    let looped = Expr::loop_expr(Expr::empty(), None, None).unwrap();
    let tree = Expr::block(vec![], vec![int(1), looped]).unwrap();
    assert!(matches!(
        NoLoops.visit(&tree),
        Err(SlimError::NotSupported { kind: NodeKind::Loop, .. })
    ));
}

// ── Stock rewriters ───────────────────────────────────────────────

#[test]
fn substitutor_replaces_free_occurrences() {
    let x = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    let tree = Expr::add(x.clone().into(), Expr::multiply(x.clone().into(), int(3)));

    let out = Substitutor::new().with(&x, int(4)).apply(&tree).unwrap();
    let expected = Expr::add(int(4), Expr::multiply(int(4), int(3)));
    assert!(SlimEquality::equal(&out, &expected));
}

#[test]
fn substitutor_without_matches_shares_tree() {
    let x = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    let tree = sample_tree();
    let out = Substitutor::new().with(&x, int(4)).apply(&tree).unwrap();
    assert!(out.ptr_eq(&tree));
}

#[test]
fn anonymizer_preserves_binding_structure() {
    let tree = sample_tree();
    let anon = Anonymizer::new().apply(&tree).unwrap();

    assert!(!anon.ptr_eq(&tree));
    let Expr::Lambda(l) = &anon else { unreachable!() };
    assert!(l.parameters.iter().all(|p| p.name.is_none()));
    assert!(SlimEquality::equal(&tree, &anon));
}

#[test]
fn anonymizer_maps_each_identity_once() {
    let x = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    let tree = Expr::add(x.clone().into(), x.into());
    let out = Anonymizer::new().apply(&tree).unwrap();
    let Expr::Binary(b) = &out else { unreachable!() };
    assert!(b.left.ptr_eq(&b.right));
}

#[test]
fn free_variables_skip_bound_parameters() {
    let x = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    let y = ParameterSlim::new(TypeSlim::int32(), Some("y"));
    let z = ParameterSlim::new(TypeSlim::int32(), Some("z"));

    let inner = Expr::lambda(
        Expr::add(x.clone().into(), Expr::add(y.clone().into(), z.clone().into())),
        vec![x.clone()],
    )
    .unwrap();
    let block = Expr::block(vec![y.clone()], vec![inner, y.clone().into(), z.clone().into()]).unwrap();

    let free = FreeVariables::collect(&block).unwrap();
    assert_eq!(free.len(), 1);
    assert!(Arc::ptr_eq(&free[0], &z));
}

#[test]
fn free_variables_in_catch_scope() {
    let e = ParameterSlim::new(TypeSlim::simple("System.Exception"), Some("e"));
    let handler = crate::slim::CatchBlock::new(
        TypeSlim::simple("System.Exception"),
        Some(e.clone()),
        Expr::throw(e.clone().into()),
        None,
    );
    let tree = Expr::try_catch(int(1), vec![handler]).unwrap();
    assert!(FreeVariables::collect(&tree).unwrap().is_empty());
}

// ── Equality ──────────────────────────────────────────────────────

#[test]
fn equality_distinguishes_free_variables() {
    let x = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    let x2 = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    assert!(!SlimEquality::equal(&x.clone().into(), &x2.into()));
    assert!(SlimEquality::equal(&x.clone().into(), &x.into()));
}

#[test]
fn equality_requires_consistent_binding() {
    let a = ParameterSlim::new(TypeSlim::int32(), None);
    let b = ParameterSlim::new(TypeSlim::int32(), None);
    let c = ParameterSlim::new(TypeSlim::int32(), None);
    let d = ParameterSlim::new(TypeSlim::int32(), None);

    // (a, b) => a  vs  (c, d) => d
    let first = Expr::lambda(a.clone().into(), vec![a, b]).unwrap();
    let second = Expr::lambda(d.clone().into(), vec![c, d]).unwrap();
    assert!(!SlimEquality::equal(&first, &second));
}

#[test]
fn shared_bodies_still_respect_parameter_order() {
    let x = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    let y = ParameterSlim::new(TypeSlim::int32(), Some("y"));

    // (x, y) => x + 1  vs  (y, x) => x + 1, one body shared by both
    let body = Expr::add(x.clone().into(), int(1));
    let first = Expr::lambda(body.clone(), vec![x.clone(), y.clone()]).unwrap();
    let second = Expr::lambda(body.clone(), vec![y.clone(), x.clone()]).unwrap();
    assert!(!SlimEquality::equal(&first, &second));

    let leaf: Expr = x.clone().into();
    let first = Expr::lambda(leaf.clone(), vec![x.clone(), y.clone()]).unwrap();
    let second = Expr::lambda(leaf, vec![y.clone(), x.clone()]).unwrap();
    assert!(!SlimEquality::equal(&first, &second));

    let same = Expr::lambda(body, vec![x, y]).unwrap();
    assert!(SlimEquality::equal(&same, &same));
}

#[test]
fn equality_sees_operator_differences() {
    let unary = Expr::unary(UnaryOp::Negate, int(1)).unwrap();
    assert!(SlimEquality::equal(&unary, &Expr::negate(int(1))));
    assert!(!SlimEquality::equal(&unary, &Expr::not(int(1))));
    assert!(!SlimEquality::equal(&int(1), &int(2)));
}

// ── Deep trees ────────────────────────────────────────────────────

#[test]
fn deep_trees_rewrite_and_compare() {
    let mut tree = int(0);
    for i in 1..3_000 {
        tree = Expr::add(tree, int(i));
    }
    let out = ReplaceConstant { from: 0, to: 1 }.visit(&tree).unwrap();
    assert!(!out.ptr_eq(&tree));
    assert!(!SlimEquality::equal(&tree, &out));
    let again = ReplaceConstant { from: 0, to: 1 }.visit(&tree).unwrap();
    assert!(SlimEquality::equal(&out, &again));
}
