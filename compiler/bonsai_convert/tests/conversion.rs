#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test code uses unwrap for concise assertions"
)]

//! End-to-end conversions: slim trees resolved against a registry, run by
//! the interpreter, and converted back.

use std::sync::Arc;

use bonsai_convert::{
    to_native, to_slim, ConvertError, ConvertOptions, NativeToSlim, ResolutionError, SlimToNative,
    TypeSpace,
};
use bonsai_ir::{
    BinaryOp, CatchBlock, Expr, GotoKind, LabelTarget, MemberBinding, MemberSlim, NodeKind,
    ParameterSlim, Primitive, SlimEquality, SwitchCase, TypeSlim,
};
use bonsai_native::{
    DefaultFactory, Interpreter, NativeBinaryOp, NativeExpr, NativeKind, RestrictedFactory,
    TypeRegistry, Value,
};
use pretty_assertions::assert_eq;

fn space() -> TypeSpace {
    bonsai_convert::init_tracing();
    TypeSpace::new(TypeRegistry::shared())
}

fn int(v: i32) -> Expr {
    Expr::constant(v, TypeSlim::int32())
}

fn run(space: &TypeSpace, expr: &NativeExpr) -> Value {
    Interpreter::new(Arc::clone(space.registry())).eval(expr).unwrap()
}

/// `i` counts up until it passes `limit`; the loop breaks with the sum.
fn summing_loop(limit: i32) -> Expr {
    let i = ParameterSlim::new(TypeSlim::int32(), Some("i"));
    let sum = ParameterSlim::new(TypeSlim::int32(), Some("sum"));
    let brk = LabelTarget::new(Some(TypeSlim::int32()), Some("break"));
    let i_expr = || Expr::Parameter(Arc::clone(&i));
    let sum_expr = || Expr::Parameter(Arc::clone(&sum));

    let exit = Expr::make_condition(
        Some(TypeSlim::void()),
        Expr::binary(BinaryOp::GreaterThan, i_expr(), int(limit)),
        Expr::jump(GotoKind::Break, Arc::clone(&brk), Some(sum_expr()), None),
        Expr::empty(),
    );
    let body = Expr::make_block(
        None,
        Vec::new(),
        vec![
            Expr::binary(BinaryOp::AddAssign, i_expr(), int(1)),
            exit,
            Expr::binary(BinaryOp::AddAssign, sum_expr(), i_expr()),
        ],
    )
    .unwrap();
    let looped = Expr::loop_expr(body, Some(brk), None).unwrap();
    Expr::make_block(None, vec![i, sum], vec![looped]).unwrap()
}

#[test]
fn constants_add_and_resolve_their_type_once() {
    let mut space = space();
    let sum = Expr::binary(BinaryOp::Add, int(1), int(2));
    let native = to_native(&sum, &mut space).unwrap();

    assert_eq!(native.ty(), &space.registry().int32());
    assert_eq!(space.resolution_count(), 1);
    assert_eq!(run(&space, &native), Value::i32(3));
}

#[test]
fn parameter_occurrences_share_one_native_parameter() {
    let mut space = space();
    let x = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    let x_expr = || Expr::Parameter(Arc::clone(&x));
    let body = Expr::binary(
        BinaryOp::Multiply,
        Expr::binary(BinaryOp::Add, x_expr(), x_expr()),
        x_expr(),
    );
    let lambda = Expr::make_lambda(None, body, vec![Arc::clone(&x)], Some("f"), false).unwrap();

    let native = to_native(&lambda, &mut space).unwrap();
    let NativeKind::Lambda {
        body, parameters, ..
    } = native.kind()
    else {
        panic!("expected a lambda, got {native:?}");
    };
    let declared = &parameters[0];
    let NativeKind::Binary { left, right, .. } = body.kind() else {
        panic!("expected a binary body");
    };
    let NativeKind::Binary {
        left: first,
        right: second,
        ..
    } = left.kind()
    else {
        panic!("expected a nested binary");
    };
    for occurrence in [first, second, right] {
        assert!(occurrence.ptr_eq(declared));
    }

    let interpreter = Interpreter::new(Arc::clone(space.registry()));
    let function = interpreter.eval(&native).unwrap();
    assert_eq!(interpreter.call(&function, &[Value::i32(4)]).unwrap(), Value::i32(32));
}

#[test]
fn distinct_parameters_with_equal_names_stay_distinct() {
    let mut space = space();
    let a = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    let b = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    let body = Expr::binary(BinaryOp::Subtract, a.clone().into(), b.clone().into());
    let lambda = Expr::make_lambda(None, body, vec![a, b], None, false).unwrap();

    let native = to_native(&lambda, &mut space).unwrap();
    let interpreter = Interpreter::new(Arc::clone(space.registry()));
    let function = interpreter.eval(&native).unwrap();
    let result = interpreter
        .call(&function, &[Value::i32(10), Value::i32(3)])
        .unwrap();
    assert_eq!(result, Value::i32(7));
}

#[test]
fn reference_type_equality_is_lowered() {
    let mut space = space();
    let a = ParameterSlim::new(TypeSlim::string(), Some("a"));
    let b = ParameterSlim::new(TypeSlim::string(), Some("b"));
    let eq = Expr::binary(BinaryOp::Equal, a.into(), b.into());
    let native = to_native(&eq, &mut space).unwrap();
    assert!(
        matches!(
            native.kind(),
            NativeKind::Binary {
                op: NativeBinaryOp::ReferenceEqual,
                ..
            }
        ),
        "{native:?}"
    );

    // Value types keep their ordinary equality.
    let ints = Expr::binary(BinaryOp::Equal, int(1), int(1));
    let native = to_native(&ints, &mut space).unwrap();
    assert!(matches!(
        native.kind(),
        NativeKind::Binary {
            op: NativeBinaryOp::Slim(BinaryOp::Equal),
            ..
        }
    ));
    assert_eq!(run(&space, &native), Value::Bool(true));
}

#[test]
fn loops_and_labels_run_and_keep_identity() {
    let mut space = space();
    let program = summing_loop(4);
    let native = to_native(&program, &mut space).unwrap();
    assert_eq!(run(&space, &native), Value::i32(1 + 2 + 3 + 4));

    let NativeKind::Block { expressions, .. } = native.kind() else {
        panic!("expected a block");
    };
    let NativeKind::Loop {
        body,
        break_label: Some(brk),
        ..
    } = expressions[0].kind()
    else {
        panic!("expected a loop with a break label");
    };
    let NativeKind::Block { expressions, .. } = body.kind() else {
        panic!("expected a block body");
    };
    let NativeKind::Conditional { if_true, .. } = expressions[1].kind() else {
        panic!("expected the exit test");
    };
    let NativeKind::Goto { target, .. } = if_true.kind() else {
        panic!("expected a jump");
    };
    assert!(target.ptr_eq(brk));
}

#[test]
fn round_trips_are_structurally_equal() {
    let mut space = space();
    let x = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    let lambda = Expr::make_lambda(
        None,
        Expr::binary(BinaryOp::Add, Expr::Parameter(Arc::clone(&x)), int(1)),
        vec![x],
        None,
        false,
    )
    .unwrap();

    for original in [lambda, summing_loop(3), Expr::binary(BinaryOp::Add, int(1), int(2))] {
        assert_round_trip(&mut space, &original);
    }
}

fn assert_round_trip(space: &mut TypeSpace, original: &Expr) {
    let native = to_native(original, space).unwrap();
    let back = to_slim(&native, space).unwrap();
    assert!(
        SlimEquality::equal(original, &back),
        "{original:?} came back as {back:?}"
    );
}

fn string(v: &str) -> Expr {
    Expr::constant(v, TypeSlim::string())
}

#[test]
fn handlers_and_switches_round_trip() {
    let mut space = space();
    let exception = TypeSlim::simple("System.Exception");
    let e = ParameterSlim::new(exception.clone(), Some("e"));
    let handler = CatchBlock::new(
        exception.clone(),
        Some(e),
        int(2),
        Some(Expr::constant(true, TypeSlim::bool())),
    );
    let guarded = Expr::make_try(None, int(1), vec![handler], Some(Expr::empty()), None).unwrap();
    let bare_catch = Expr::try_catch(int(1), vec![CatchBlock::new(exception, None, int(0), None)]).unwrap();
    let faulted = Expr::try_fault(int(1), Expr::empty()).unwrap();

    let switch = Expr::switch(
        None,
        int(3),
        Some(string("other")),
        None,
        vec![
            SwitchCase::new(vec![int(1), int(2)], string("low")).unwrap(),
            SwitchCase::new(vec![int(3)], string("three")).unwrap(),
        ],
    )
    .unwrap();

    for original in [guarded, bare_catch, faulted, switch] {
        assert_round_trip(&mut space, &original);
    }
}

#[test]
fn arrays_and_operators_round_trip() {
    let mut space = space();
    let vector = Expr::new_array_bounds(TypeSlim::int32(), vec![int(3)]).unwrap();
    let matrix = Expr::new_array_bounds(TypeSlim::int32(), vec![int(2), int(3)]).unwrap();
    let strings = Expr::new_array_init(TypeSlim::string(), vec![string("a"), Expr::null(TypeSlim::string())]);
    let element = Expr::index(
        Expr::new_array_init(TypeSlim::int32(), vec![int(1), int(2)]),
        None,
        vec![int(0)],
    )
    .unwrap();
    let cell = Expr::index(matrix.clone(), None, vec![int(1), int(2)]).unwrap();

    let boxed = Expr::convert(int(1), TypeSlim::object());
    let is_int = Expr::type_is(boxed.clone(), TypeSlim::int32());
    let exactly_int = Expr::type_equal(boxed, TypeSlim::int32());
    let widened = Expr::convert(int(7), TypeSlim::int64());

    let choice = Expr::condition(
        Expr::less_than(int(1), int(2)),
        string("yes"),
        Expr::null(TypeSlim::string()),
    );

    let x = ParameterSlim::new(TypeSlim::int32(), Some("x"));
    let double = Expr::make_lambda(
        None,
        Expr::multiply(Expr::Parameter(Arc::clone(&x)), int(2)),
        vec![x],
        None,
        false,
    )
    .unwrap();
    let invoked = Expr::invoke(double, vec![int(21)]).unwrap();

    let nullable = TypeSlim::nullable(TypeSlim::int32());
    let present = Expr::constant(5, nullable.clone());
    let absent = Expr::null(nullable);
    let single = Expr::constant(0.1_f64, TypeSlim::primitive(Primitive::F32));
    let fallback = Expr::coalesce(absent.clone(), int(5));
    let string_fallback = Expr::coalesce(Expr::null(TypeSlim::string()), string("x"));

    // `==` on strings is lowered to reference equality and comes back as `==`.
    let same_text = Expr::equal(string("a"), string("b"));

    for original in [
        vector,
        matrix,
        strings,
        element,
        cell,
        is_int,
        exactly_int,
        widened,
        choice,
        invoked,
        present,
        absent,
        single,
        fallback,
        string_fallback,
        same_text,
    ] {
        assert_round_trip(&mut space, &original);
    }
}

#[test]
fn initializers_round_trip() {
    let mut space = space();
    let registry = Arc::clone(space.registry());
    let point = registry.define_class("Demo.Point", None);
    registry.define_field(&point, "X", registry.int32());
    registry.define_constructor(&point, Vec::new(), None);

    let point_slim = TypeSlim::simple("Demo.Point");
    let x = MemberSlim::field(point_slim.clone(), "X", TypeSlim::int32());
    let new_point = Expr::new_object(MemberSlim::constructor(point_slim, Vec::new()), Vec::new()).unwrap();
    let point_init = Expr::member_init(new_point, vec![MemberBinding::assignment(x, int(3))]).unwrap();

    let list_int = TypeSlim::generic(
        TypeSlim::generic_definition("System.Collections.Generic.List`1", 1),
        vec![TypeSlim::int32()],
    );
    let add = MemberSlim::method(list_int.clone(), "Add", vec![TypeSlim::int32()], TypeSlim::void());
    let new_list = Expr::new_object(MemberSlim::constructor(list_int.clone(), Vec::new()), Vec::new()).unwrap();
    let list_init = Expr::list_init(
        new_list,
        vec![
            Expr::element_init(add.clone(), vec![int(1)]).unwrap(),
            Expr::element_init(add, vec![int(2)]).unwrap(),
        ],
    )
    .unwrap();
    let item = MemberSlim::indexer(list_int, "Item", TypeSlim::int32(), vec![TypeSlim::int32()]);
    let first = Expr::index(list_init.clone(), Some(item), vec![int(0)]).unwrap();

    for original in [point_init, list_init, first] {
        assert_round_trip(&mut space, &original);
    }
}

#[test]
fn refused_node_kinds_surface_as_not_supported() {
    let mut space = space();
    let factory = RestrictedFactory::new(
        DefaultFactory::new(Arc::clone(space.registry())),
        [NodeKind::Loop],
    );
    let mut convert = SlimToNative::with_factory(factory, ConvertOptions::default());

    let err = convert.convert(&summing_loop(2), &mut space).unwrap_err();
    assert!(
        matches!(
            err,
            ConvertError::NotSupported {
                kind: NodeKind::Loop,
                ..
            }
        ),
        "{err:?}"
    );

    let allowed = convert
        .convert(&Expr::binary(BinaryOp::Add, int(1), int(2)), &mut space)
        .unwrap();
    assert_eq!(run(&space, &allowed), Value::i32(3));
}

#[test]
fn unresolvable_types_fail_the_conversion() {
    let mut space = space();
    let missing = TypeSlim::simple("Demo.Missing");
    let p = ParameterSlim::new(missing.clone(), Some("p"));
    let err = to_native(&Expr::Parameter(p), &mut space).unwrap_err();
    assert_eq!(
        err,
        ConvertError::Resolution(ResolutionError::UnknownType { ty: missing })
    );
}

#[test]
fn member_initializers_run_against_registered_types() {
    let mut space = space();
    let registry = Arc::clone(space.registry());
    let point = registry.define_class("Demo.Point", None);
    registry.define_field(&point, "X", registry.int32());
    registry.define_constructor(&point, Vec::new(), None);

    let point_slim = TypeSlim::simple("Demo.Point");
    let x = MemberSlim::field(point_slim.clone(), "X", TypeSlim::int32());
    let new = Expr::new_object(MemberSlim::constructor(point_slim, Vec::new()), Vec::new()).unwrap();
    let init = Expr::member_init(new, vec![MemberBinding::assignment(x.clone(), int(3))]).unwrap();
    let read = Expr::member_access(Some(init), x).unwrap();

    let native = to_native(&read, &mut space).unwrap();
    assert_eq!(run(&space, &native), Value::i32(3));
}

#[test]
fn a_seeded_space_is_reused_across_conversions() {
    let mut space = space();
    let int32 = space.registry().int32();
    let alias = TypeSlim::simple("int");
    space.seed_type(alias.clone(), int32);

    let first = Expr::binary(
        BinaryOp::Add,
        Expr::constant(1, alias.clone()),
        Expr::constant(2, alias.clone()),
    );
    let second = Expr::binary(BinaryOp::Multiply, Expr::constant(5, alias.clone()), Expr::constant(6, alias));

    let a = to_native(&first, &mut space).unwrap();
    let b = to_native(&second, &mut space).unwrap();
    assert_eq!(space.resolution_count(), 0);
    assert_eq!(run(&space, &a), Value::i32(3));
    assert_eq!(run(&space, &b), Value::i32(30));

    let back = NativeToSlim::new(&space).convert(&b).unwrap();
    assert!(SlimEquality::equal(&back, &second));
}
