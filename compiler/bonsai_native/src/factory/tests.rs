#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test code uses unwrap for concise assertions"
)]

use pretty_assertions::assert_eq;

use super::*;
use crate::types::MethodDef;

fn factory() -> DefaultFactory {
    DefaultFactory::new(Arc::new(TypeRegistry::new()))
}

fn int(f: &impl NodeFactory, v: i32) -> NativeExpr {
    f.constant(Value::i32(v), f.registry().int32()).unwrap()
}

fn kind_of(result: Built) -> NodeKind {
    match result {
        Err(FactoryError::Construction(e)) => e.kind,
        other => panic!("expected a construction error, got {other:?}"),
    }
}

// === Derived types ===

#[test]
fn comparison_yields_bool_and_lifting_yields_nullable_bool() {
    let f = factory();
    let registry = f.registry();
    let plain = f
        .binary(BinaryOp::LessThan.into(), int(&f, 1), int(&f, 2), false, None, None)
        .unwrap();
    assert_eq!(plain.ty(), &registry.bool());

    let nullable = registry.nullable_of(&registry.int32()).unwrap();
    let null = f.constant(Value::Null, nullable).unwrap();
    let lifted = f
        .binary(BinaryOp::LessThan.into(), null.clone(), null, true, None, None)
        .unwrap();
    assert_eq!(lifted.ty(), &registry.nullable_of(&registry.bool()).unwrap());
}

#[test]
fn coalesce_of_nullable_unwraps() {
    let f = factory();
    let registry = f.registry();
    let nullable = registry.nullable_of(&registry.int32()).unwrap();
    let null = f.constant(Value::Null, nullable).unwrap();
    let expr = f
        .binary(BinaryOp::Coalesce.into(), null, int(&f, 0), false, None, None)
        .unwrap();
    assert_eq!(expr.ty(), &registry.int32());
}

#[test]
fn lambda_type_is_derived_from_parameters_and_body() {
    let f = factory();
    let registry = f.registry();
    let s = f.parameter(registry.string(), Some("s")).unwrap();
    let lambda = f.lambda(None, int(&f, 1), vec![s], None, false).unwrap();
    assert_eq!(
        lambda.ty(),
        &registry.function_type(&[registry.string()], &registry.int32())
    );
}

#[test]
fn array_bounds_rank_follows_bound_count() {
    let f = factory();
    let registry = f.registry();
    let int32 = registry.int32();
    let vector = f.new_array_bounds(int32.clone(), vec![int(&f, 2)]).unwrap();
    let grid = f
        .new_array_bounds(int32.clone(), vec![int(&f, 2), int(&f, 2)])
        .unwrap();
    assert_eq!(vector.ty(), &registry.array_of(&int32, None));
    assert_eq!(grid.ty(), &registry.array_of(&int32, Some(2)));
}

#[test]
fn label_target_defaults_to_void() {
    let f = factory();
    let label = f.label_target(None, None);
    let node = f.label(label, None).unwrap();
    assert!(node.ty().is_void());
}

// === Validation ===

#[test]
fn conversion_requires_explicit_type() {
    let f = factory();
    assert_eq!(kind_of(f.unary(UnaryOp::Convert, int(&f, 1), None, None)), NodeKind::Unary);
}

#[test]
fn constant_must_fit_its_type() {
    let f = factory();
    let registry = f.registry();
    assert_eq!(
        kind_of(f.constant(Value::string("x"), registry.int32())),
        NodeKind::Constant
    );
    assert_eq!(kind_of(f.constant(Value::Null, registry.int32())), NodeKind::Constant);
    assert!(f.constant(Value::Null, registry.string()).is_ok());
}

#[test]
fn parameters_cannot_be_void() {
    let f = factory();
    assert_eq!(kind_of(f.parameter(f.registry().void(), None)), NodeKind::Parameter);
}

#[test]
fn lambda_rejects_duplicate_parameters() {
    let f = factory();
    let x = f.parameter(f.registry().int32(), Some("x")).unwrap();
    let result = f.lambda(None, x.clone(), vec![x.clone(), x], None, false);
    assert_eq!(kind_of(result), NodeKind::Lambda);
}

#[test]
fn mismatched_operand_types_are_rejected() {
    let f = factory();
    let long = f.constant(Value::i64(1), f.registry().primitive(Primitive::I64)).unwrap();
    let result = f.binary(BinaryOp::Add.into(), int(&f, 1), long, false, None, None);
    assert_eq!(kind_of(result), NodeKind::Binary);
}

#[test]
fn reference_equality_needs_reference_operands() {
    let f = factory();
    let result = f.binary(NativeBinaryOp::ReferenceEqual, int(&f, 1), int(&f, 1), false, None, None);
    assert_eq!(kind_of(result), NodeKind::Binary);
}

#[test]
fn assignment_target_must_be_writable() {
    let f = factory();
    let result = f.binary(BinaryOp::Assign.into(), int(&f, 1), int(&f, 2), false, None, None);
    assert_eq!(kind_of(result), NodeKind::Binary);
}

#[test]
fn conversion_lambda_only_on_coalesce_and_compound_assignment() {
    let f = factory();
    let x = f.parameter(f.registry().int32(), None).unwrap();
    let identity = f.lambda(None, x.clone(), vec![x], None, false).unwrap();
    let result = f.binary(BinaryOp::Add.into(), int(&f, 1), int(&f, 2), false, None, Some(identity));
    assert_eq!(kind_of(result), NodeKind::Binary);
}

#[test]
fn condition_needs_bool_test_and_matching_branches() {
    let f = factory();
    let registry = f.registry();
    let yes = f.constant(Value::Bool(true), registry.bool()).unwrap();
    let text = f.constant(Value::string("a"), registry.string()).unwrap();

    assert_eq!(
        kind_of(f.condition(None, int(&f, 1), int(&f, 2), int(&f, 3))),
        NodeKind::Conditional
    );
    assert_eq!(
        kind_of(f.condition(None, yes.clone(), int(&f, 2), text.clone())),
        NodeKind::Conditional
    );
    let widened = f
        .condition(Some(registry.object()), yes, int(&f, 2), text)
        .unwrap();
    assert_eq!(widened.ty(), &registry.object());
}

#[test]
fn call_checks_instance_and_arguments() {
    let f = factory();
    let registry = f.registry();
    let int32 = registry.int32();
    let widget = registry.define_class("Demo.Widget", None);
    let resize = registry.define_method(
        &widget,
        MethodDef::instance("Resize", vec![int32.clone()], registry.void()),
    );
    let instance = f.parameter(widget, Some("w")).unwrap();

    assert_eq!(kind_of(f.call(None, resize.clone(), vec![int(&f, 1)])), NodeKind::MethodCall);
    assert_eq!(
        kind_of(f.call(Some(instance.clone()), resize.clone(), Vec::new())),
        NodeKind::MethodCall
    );
    let text = f.constant(Value::string("x"), registry.string()).unwrap();
    assert_eq!(
        kind_of(f.call(Some(instance.clone()), resize.clone(), vec![text])),
        NodeKind::MethodCall
    );
    let ok = f.call(Some(instance), resize, vec![int(&f, 1)]).unwrap();
    assert!(ok.ty().is_void());
}

#[test]
fn open_generic_method_cannot_be_called() {
    let f = factory();
    let registry = f.registry();
    let util = registry.define_class("Demo.Util", None);
    let t = registry.generic_parameter("T");
    let identity = registry.define_method(
        &util,
        MethodDef::static_method("Identity", vec![t.clone()], t).generic(&["T"]),
    );
    assert_eq!(kind_of(f.call(None, identity.clone(), vec![int(&f, 1)])), NodeKind::MethodCall);

    let closed = registry.instantiate_method(&identity, &[registry.int32()]).unwrap();
    let call = f.call(None, closed, vec![int(&f, 1)]).unwrap();
    assert_eq!(call.ty(), &registry.int32());
}

#[test]
fn try_needs_a_handler_or_finally() {
    let f = factory();
    assert_eq!(kind_of(f.try_expr(None, int(&f, 1), Vec::new(), None, None)), NodeKind::Try);

    let cleanup = f.default_value(f.registry().void()).unwrap();
    let with_fault_and_finally = f.try_expr(
        None,
        int(&f, 1),
        Vec::new(),
        Some(cleanup.clone()),
        Some(cleanup),
    );
    assert_eq!(kind_of(with_fault_and_finally), NodeKind::Try);
}

#[test]
fn non_void_label_needs_default_and_jump_needs_value() {
    let f = factory();
    let int32 = f.registry().int32();
    let target = f.label_target(Some(int32), Some("result"));
    assert_eq!(kind_of(f.label(target.clone(), None)), NodeKind::Label);
    assert_eq!(
        kind_of(f.jump(GotoKind::Return, target.clone(), None, None)),
        NodeKind::Goto
    );
    assert!(f.jump(GotoKind::Return, target, Some(int(&f, 1)), None).is_ok());
}

#[test]
fn continue_label_must_be_void() {
    let f = factory();
    let int32 = f.registry().int32();
    let body = f.default_value(f.registry().void()).unwrap();
    let cont = f.label_target(Some(int32), None);
    assert_eq!(kind_of(f.loop_expr(body, None, Some(cont))), NodeKind::Loop);
}

#[test]
fn switch_without_comparison_needs_matching_test_types() {
    let f = factory();
    let text = f.constant(Value::string("a"), f.registry().string()).unwrap();
    let case = f.switch_case(vec![text], int(&f, 1)).unwrap();
    let result = f.switch(None, int(&f, 0), None, None, vec![case]);
    assert_eq!(kind_of(result), NodeKind::Switch);
    assert_eq!(
        f.switch_case(Vec::new(), int(&f, 1)).unwrap_err(),
        FactoryError::invalid(NodeKind::Switch, "a switch case needs at least one test value")
    );
}

// === Restricted factory ===

#[test]
fn restricted_factory_refuses_denied_kinds() {
    let f = RestrictedFactory::new(factory(), [NodeKind::Loop, NodeKind::Goto]);
    assert!(!f.allows(NodeKind::Loop));
    assert!(f.allows(NodeKind::Binary));

    let body = f.default_value(f.registry().void()).unwrap();
    assert_eq!(
        f.loop_expr(body, None, None).unwrap_err(),
        FactoryError::NotSupported {
            kind: NodeKind::Loop
        }
    );
    let label = f.label_target(None, None);
    assert_eq!(
        f.jump(GotoKind::Goto, label, None, None).unwrap_err(),
        FactoryError::NotSupported {
            kind: NodeKind::Goto
        }
    );
    assert!(f
        .binary(BinaryOp::Add.into(), int(&f, 1), int(&f, 2), false, None, None)
        .is_ok());
}

#[test]
fn restricted_factory_still_validates() {
    let f = RestrictedFactory::new(factory(), Vec::<NodeKind>::new());
    assert_eq!(kind_of(f.parameter(f.registry().void(), None)), NodeKind::Parameter);
}
