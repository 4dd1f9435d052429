#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test code uses unwrap for concise assertions"
)]

use std::sync::Arc;

use pretty_assertions::assert_eq;
use proptest::prelude::*;

use super::*;
use crate::descriptor::{MemberSlim, TypeSlim};
use crate::SlimEquality;

fn int(v: i32) -> Expr {
    Expr::constant(v, TypeSlim::int32())
}

fn point() -> TypeSlim {
    TypeSlim::simple("Acme.Point")
}

fn sum3() -> MemberSlim {
    MemberSlim::static_method(
        TypeSlim::simple("Acme.Math"),
        "Sum3",
        vec![TypeSlim::int32(), TypeSlim::int32(), TypeSlim::int32()],
        TypeSlim::int32(),
    )
}

fn sum_n(n: usize) -> MemberSlim {
    MemberSlim::static_method(
        TypeSlim::simple("Acme.Math"),
        "SumN",
        vec![TypeSlim::int32(); n],
        TypeSlim::int32(),
    )
}

// ── Node identity and update ──────────────────────────────────────

#[test]
fn expr_is_one_tag_and_one_pointer() {
    assert_eq!(std::mem::size_of::<Expr>(), 2 * std::mem::size_of::<usize>());
}

#[test]
fn clone_shares_the_payload() {
    let e = Expr::add(int(1), int(2));
    let f = e.clone();
    assert!(e.ptr_eq(&f));
    assert!(!e.ptr_eq(&Expr::add(int(1), int(2))));
}

#[test]
fn update_with_same_children_returns_receiver() {
    let Expr::Binary(node) = Expr::add(int(1), int(2)) else {
        unreachable!()
    };
    let same = node.update(node.left.clone(), node.right.clone(), None);
    assert!(Arc::ptr_eq(&node, &same));

    let changed = node.update(node.left.clone(), int(3), None);
    assert!(!Arc::ptr_eq(&node, &changed));
    assert!(changed.left.ptr_eq(&node.left));
}

#[test]
fn update_on_call_uses_argument_identity() {
    let args = vec![int(1), int(2), int(3)];
    let Expr::MethodCall(call) = Expr::call(None, sum3(), args).unwrap() else {
        unreachable!()
    };
    let same = call.update(None, call.arguments.clone());
    assert!(Arc::ptr_eq(&call, &same));

    let fresh = Arguments::new(vec![int(1), int(2), int(3)]);
    assert!(!Arc::ptr_eq(&call, &call.update(None, fresh)));
}

#[test]
fn try_update_revalidates_shape() {
    let Expr::Try(node) = Expr::try_finally(int(1), Expr::empty()).unwrap() else {
        unreachable!()
    };
    let err = node
        .update(node.body.clone(), node.handlers.clone(), None, None)
        .unwrap_err();
    assert_eq!(err.kind, NodeKind::Try);
}

// ── Arity specialization ──────────────────────────────────────────

#[test]
fn arguments_pick_inline_variants() {
    assert!(matches!(Arguments::new(vec![]), Arguments::Nullary));
    assert!(matches!(Arguments::new(vec![int(1)]), Arguments::Unary(_)));
    assert!(matches!(
        Arguments::new(vec![int(1), int(2), int(3)]),
        Arguments::Ternary(..)
    ));
    assert!(matches!(
        Arguments::new((0..5).map(int).collect()),
        Arguments::Quinary(..)
    ));
    assert!(matches!(
        Arguments::new((0..6).map(int).collect()),
        Arguments::Nary(_)
    ));
    assert!(!Arguments::nary(vec![int(1)]).is_inline());
}

#[test]
fn reification_is_memoized() {
    let a = int(1);
    let b = int(2);
    let args = Arguments::new(vec![a.clone(), b.clone()]);
    let Arguments::Binary(first, _) = &args else {
        unreachable!()
    };
    assert!(!first.is_reified());

    let s1 = args.as_slice();
    assert!(first.is_reified());
    let s2 = args.as_slice();
    assert!(std::ptr::eq(s1, s2));
    assert_eq!(s1.len(), 2);
    assert!(s1[0].ptr_eq(&a));
    assert!(s1[1].ptr_eq(&b));
    // Argument 0 now reads through the reified list.
    assert!(args.get(0).unwrap().ptr_eq(&a));
}

#[test]
fn arguments_iterate_in_order() {
    let items: Vec<Expr> = (0..4).map(int).collect();
    let args = Arguments::new(items.clone());
    assert_eq!(args.iter().len(), 4);
    for (x, y) in args.iter().zip(&items) {
        assert!(x.ptr_eq(y));
    }
    assert!(args.get(4).is_none());
}

proptest! {
    #[test]
    fn inline_and_forced_lists_are_equivalent(values in prop::collection::vec(any::<i32>(), 0..9)) {
        let items: Vec<Expr> = values.iter().copied().map(int).collect();
        let inline = Arguments::new(items.clone());
        let forced = Arguments::nary(items.clone());

        prop_assert_eq!(inline.len(), forced.len());
        for i in 0..items.len() {
            prop_assert!(inline.get(i).unwrap().ptr_eq(forced.get(i).unwrap()));
        }
        prop_assert_eq!(inline.as_slice().len(), forced.as_slice().len());
        for (x, y) in inline.as_slice().iter().zip(forced.as_slice()) {
            prop_assert!(x.ptr_eq(y));
        }
    }
}

#[test]
fn specialized_and_generic_calls_are_observably_equal() {
    let args = vec![int(1), int(2), int(3)];
    let inline = Expr::call(None, sum3(), args.clone()).unwrap();
    let forced = Expr::call_nary(None, sum3(), args).unwrap();

    let (Expr::MethodCall(a), Expr::MethodCall(b)) = (&inline, &forced) else {
        unreachable!()
    };
    assert!(a.arguments.is_inline());
    assert!(!b.arguments.is_inline());
    assert_eq!(inline.kind(), forced.kind());
    assert_eq!(inline.ty(), forced.ty());
    assert!(SlimEquality::equal(&inline, &forced));
}

// ── Declared types ────────────────────────────────────────────────

#[test]
fn recomputed_types() {
    assert_eq!(Expr::add(int(1), int(2)).ty(), TypeSlim::int32());
    assert_eq!(Expr::equal(int(1), int(2)).ty(), TypeSlim::bool());
    assert_eq!(Expr::add(int(1), int(2)).declared_type(), None);

    let x = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    let lambda = Expr::lambda(Expr::add(x.clone().into(), int(1)), vec![x]).unwrap();
    assert_eq!(
        lambda.ty(),
        TypeSlim::function(vec![TypeSlim::int32()], TypeSlim::int32())
    );

    let block = Expr::block(vec![], vec![int(1), Expr::constant("s", TypeSlim::string())]).unwrap();
    assert_eq!(block.ty(), TypeSlim::string());

    let bounds = Expr::new_array_bounds(TypeSlim::int32(), vec![int(2), int(3)]).unwrap();
    assert_eq!(bounds.ty(), TypeSlim::array_of_rank(TypeSlim::int32(), 2));
    let vector = Expr::new_array_bounds(TypeSlim::int32(), vec![int(2)]).unwrap();
    assert_eq!(vector.ty(), TypeSlim::array(TypeSlim::int32()));

    let arr = Expr::new_array_init(TypeSlim::bool(), vec![]);
    assert_eq!(Expr::array_length(arr).ty(), TypeSlim::int32());
    assert_eq!(Expr::throw(Expr::null(TypeSlim::object())).ty(), TypeSlim::void());
    assert_eq!(Expr::type_is(int(1), TypeSlim::object()).ty(), TypeSlim::bool());
}

#[test]
fn coalesce_unwraps_nullable_left() {
    let left = Expr::null(TypeSlim::nullable(TypeSlim::int32()));
    assert_eq!(Expr::coalesce(left, int(0)).ty(), TypeSlim::int32());

    let s = Expr::null(TypeSlim::string());
    assert_eq!(
        Expr::coalesce(s, Expr::constant("x", TypeSlim::string())).ty(),
        TypeSlim::string()
    );
}

#[test]
fn redundant_declared_types_are_dropped() {
    let c = Expr::make_condition(Some(TypeSlim::int32()), Expr::constant(true, TypeSlim::bool()), int(1), int(2));
    assert_eq!(c.declared_type(), None);

    let widened = Expr::make_condition(
        Some(TypeSlim::object()),
        Expr::constant(true, TypeSlim::bool()),
        int(1),
        int(2),
    );
    assert_eq!(widened.declared_type(), Some(&TypeSlim::object()));
    assert_eq!(widened.ty(), TypeSlim::object());
    assert!(!widened.has_canonical_type());
}

#[test]
fn conversions_keep_their_type() {
    let e = Expr::convert(int(1), TypeSlim::int64());
    assert_eq!(e.declared_type(), Some(&TypeSlim::int64()));
    assert!(Expr::unary(UnaryOp::Convert, int(1)).is_err());
    assert!(Expr::make_unary(UnaryOp::Convert, int(1), None, None).is_err());
}

#[test]
fn label_and_loop_types() {
    let done = LabelTarget::new(Some(TypeSlim::int32()), Some("done"));
    let body = Expr::break_to(done.clone(), Some(int(1)));
    let looped = Expr::loop_expr(body, Some(done.clone()), None).unwrap();
    assert_eq!(looped.ty(), TypeSlim::int32());
    assert_eq!(Expr::label(done, Some(int(0))).ty(), TypeSlim::int32());
    assert_eq!(Expr::goto(LabelTarget::new(None, None)).ty(), TypeSlim::void());
}

// ── Construction errors ───────────────────────────────────────────

#[test]
fn try_shape_is_validated() {
    let handler = CatchBlock::new(TypeSlim::simple("System.Exception"), None, int(0), None);

    let err = Expr::make_try(None, int(1), vec![handler.clone()], None, Some(Expr::empty())).unwrap_err();
    assert_eq!(err.kind, NodeKind::Try);

    let err = Expr::make_try(None, int(1), vec![], Some(Expr::empty()), Some(Expr::empty())).unwrap_err();
    assert_eq!(err.kind, NodeKind::Try);

    let err = Expr::make_try(None, int(1), vec![], None, None).unwrap_err();
    assert_eq!(
        err.to_string(),
        "invalid Try node: needs at least one catch handler or a finally block"
    );

    assert!(Expr::try_catch(int(1), vec![handler]).is_ok());
    assert!(Expr::try_finally(int(1), Expr::empty()).is_ok());
    assert!(Expr::try_fault(int(1), Expr::empty()).is_ok());
}

#[test]
fn call_arity_and_instance_are_checked() {
    let err = Expr::call(None, sum3(), vec![int(1)]).unwrap_err();
    assert_eq!(err.kind, NodeKind::MethodCall);

    let err = Expr::call(Some(int(0)), sum3(), vec![int(1), int(2), int(3)]).unwrap_err();
    assert!(err.message.contains("cannot have an instance"));

    let instance = MemberSlim::method(point(), "Norm", vec![], TypeSlim::float64());
    assert!(Expr::call(None, instance, vec![]).is_err());

    assert!(Expr::call(None, sum_n(7), (0..7).map(int).collect()).is_ok());
}

#[test]
fn lambda_parameters_must_be_distinct() {
    let x = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    let err = Expr::lambda(x.clone().into(), vec![x.clone(), x]).unwrap_err();
    assert_eq!(err.kind, NodeKind::Lambda);
}

#[test]
fn block_needs_an_expression() {
    assert!(Expr::block(vec![], vec![]).is_err());
}

#[test]
fn switch_cases_need_test_values() {
    assert!(SwitchCase::new(vec![], int(1)).is_err());
    let case = SwitchCase::new(vec![int(1)], Expr::constant("one", TypeSlim::string())).unwrap();
    let sw = Expr::switch(
        None,
        int(1),
        Some(Expr::constant("other", TypeSlim::string())),
        None,
        vec![case],
    )
    .unwrap();
    assert_eq!(sw.ty(), TypeSlim::string());
}

#[test]
fn member_init_requires_new() {
    let ctor = MemberSlim::constructor(point(), vec![]);
    let x = MemberSlim::field(point(), "X", TypeSlim::int32());
    let binding = MemberBinding::assignment(x, int(3));

    let init = Expr::member_init(Expr::new_object(ctor, vec![]).unwrap(), vec![binding.clone()]).unwrap();
    assert_eq!(init.ty(), point());

    let err = Expr::member_init(int(1), vec![binding]).unwrap_err();
    assert_eq!(err.kind, NodeKind::MemberInit);
}

#[test]
fn assignment_target_must_be_writable() {
    let x = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    assert!(Expr::assign(x.into(), int(1)).is_ok());
    assert!(Expr::assign(int(0), int(1)).is_err());
}
