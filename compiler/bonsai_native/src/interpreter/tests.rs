#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test code uses unwrap for concise assertions"
)]

use std::sync::Arc;

use bonsai_ir::{BinaryOp, GotoKind, Primitive, TypeBinaryOp, UnaryOp};
use pretty_assertions::assert_eq;

use super::*;
use crate::factory::{DefaultFactory, NodeFactory};
use crate::types::{MethodDef, RuntimeType};

struct Fixture {
    f: DefaultFactory,
    interp: Interpreter,
}

impl Fixture {
    fn new() -> Self {
        let registry = Arc::new(TypeRegistry::new());
        Fixture {
            f: DefaultFactory::new(registry.clone()),
            interp: Interpreter::new(registry),
        }
    }

    fn registry(&self) -> &TypeRegistry {
        self.f.registry()
    }

    fn int32(&self) -> RuntimeType {
        self.registry().int32()
    }

    fn string(&self) -> RuntimeType {
        self.registry().string()
    }

    fn void(&self) -> NativeExpr {
        self.f.default_value(self.registry().void()).unwrap()
    }

    fn int(&self, v: i32) -> NativeExpr {
        self.f.constant(Value::i32(v), self.int32()).unwrap()
    }

    fn str(&self, s: &str) -> NativeExpr {
        self.f.constant(Value::string(s), self.string()).unwrap()
    }

    fn var(&self, ty: RuntimeType, name: &str) -> NativeExpr {
        self.f.parameter(ty, Some(name)).unwrap()
    }

    fn bin(&self, op: BinaryOp, l: &NativeExpr, r: &NativeExpr) -> NativeExpr {
        self.f
            .binary(op.into(), l.clone(), r.clone(), false, None, None)
            .unwrap()
    }

    fn block(&self, vars: &[&NativeExpr], exprs: Vec<NativeExpr>) -> NativeExpr {
        let vars = vars.iter().map(|&v| v.clone()).collect();
        self.f.block(None, vars, exprs).unwrap()
    }

    fn when(&self, test: NativeExpr, then: NativeExpr) -> NativeExpr {
        self.f
            .condition(Some(self.registry().void()), test, then, self.void())
            .unwrap()
    }

    fn exception(&self, kind: BuiltinException) -> RuntimeType {
        self.registry().exception_type(kind)
    }

    fn throw(&self, kind: BuiltinException, message: &str) -> NativeExpr {
        let exception = self.registry().new_exception(kind, message);
        let operand = self.f.constant(exception, self.exception(kind)).unwrap();
        self.f.unary(UnaryOp::Throw, operand, None, None).unwrap()
    }

    fn catch(&self, kind: BuiltinException, body: NativeExpr) -> NativeCatch {
        self.f
            .catch_block(self.exception(kind), None, body, None)
            .unwrap()
    }

    fn eval(&self, expr: &NativeExpr) -> Value {
        self.interp.eval(expr).unwrap()
    }
}

// === Operators ===

#[test]
fn arithmetic_follows_tree_shape() {
    let t = Fixture::new();
    let sum = t.bin(BinaryOp::Add, &t.int(2), &t.int(3));
    let product = t.bin(BinaryOp::Multiply, &sum, &t.int(4));
    assert_eq!(t.eval(&product), Value::i32(20));
}

#[test]
fn unchecked_addition_wraps() {
    let t = Fixture::new();
    let expr = t.bin(BinaryOp::Add, &t.int(i32::MAX), &t.int(1));
    assert_eq!(t.eval(&expr), Value::i32(i32::MIN));
}

#[test]
fn unsigned_64_bit_products_wrap_or_throw() {
    let t = Fixture::new();
    let u64_type = t.registry().primitive(Primitive::U64);
    let max = t
        .f
        .constant(Value::Int(Primitive::U64, i128::from(u64::MAX)), u64_type)
        .unwrap();

    let wrapped = t.bin(BinaryOp::Multiply, &max, &max);
    assert_eq!(t.eval(&wrapped), Value::Int(Primitive::U64, 1));

    let checked = t.bin(BinaryOp::MultiplyChecked, &max, &max);
    let Err(EvalError::Unhandled { exception }) = t.interp.eval(&checked) else {
        panic!("expected an overflow exception");
    };
    assert_eq!(
        exception.to_string(),
        "System.OverflowException: Arithmetic operation resulted in an overflow."
    );
}

#[test]
fn checked_overflow_is_caught_by_handler() {
    let t = Fixture::new();
    let overflow = t.bin(BinaryOp::AddChecked, &t.int(i32::MAX), &t.int(1));
    let guarded = t
        .f
        .try_expr(
            None,
            overflow,
            vec![t.catch(BuiltinException::Overflow, t.int(-1))],
            None,
            None,
        )
        .unwrap();
    assert_eq!(t.eval(&guarded), Value::i32(-1));
}

#[test]
fn uncaught_exception_surfaces_as_unhandled() {
    let t = Fixture::new();
    let expr = t.bin(BinaryOp::Divide, &t.int(1), &t.int(0));
    let Err(EvalError::Unhandled { exception }) = t.interp.eval(&expr) else {
        panic!("expected an unhandled exception");
    };
    assert_eq!(
        exception.to_string(),
        "System.DivideByZeroException: Attempted to divide by zero."
    );
}

#[test]
fn and_also_short_circuits() {
    let t = Fixture::new();
    let bool_ty = t.registry().bool();
    let no = t.f.constant(Value::Bool(false), bool_ty.clone()).unwrap();
    // The right operand would throw if it were evaluated.
    let boom = t.bin(
        BinaryOp::Equal,
        &t.bin(BinaryOp::Divide, &t.int(1), &t.int(0)),
        &t.int(0),
    );
    let expr = t.bin(BinaryOp::AndAlso, &no, &boom);
    assert_eq!(t.eval(&expr), Value::Bool(false));
}

#[test]
fn lifted_operators_propagate_null() {
    let t = Fixture::new();
    let nullable = t.registry().nullable_of(&t.int32()).unwrap();
    let null = t.f.constant(Value::Null, nullable.clone()).unwrap();
    let one = t.f.constant(Value::i32(1), nullable).unwrap();

    assert_eq!(t.eval(&t.bin(BinaryOp::Add, &null, &one)), Value::Null);
    assert_eq!(t.eval(&t.bin(BinaryOp::Equal, &null, &null)), Value::Bool(true));
    assert_eq!(t.eval(&t.bin(BinaryOp::LessThan, &null, &one)), Value::Bool(false));
    assert_eq!(t.eval(&t.bin(BinaryOp::Add, &one, &one)), Value::i32(2));

    let lifted = t
        .f
        .binary(BinaryOp::LessThan.into(), null, one, true, None, None)
        .unwrap();
    assert_eq!(t.eval(&lifted), Value::Null);
}

#[test]
fn coalesce_picks_first_non_null() {
    let t = Fixture::new();
    let null = t.f.constant(Value::Null, t.string()).unwrap();
    let expr = t.bin(BinaryOp::Coalesce, &null, &t.str("fallback"));
    assert_eq!(t.eval(&expr), Value::string("fallback"));
}

#[test]
fn string_concatenation_treats_null_as_empty() {
    let t = Fixture::new();
    let null = t.f.constant(Value::Null, t.string()).unwrap();
    let expr = t.bin(BinaryOp::Add, &null, &t.str("tail"));
    assert_eq!(t.eval(&expr), Value::string("tail"));
}

#[test]
fn operator_method_is_called() {
    let t = Fixture::new();
    let int32 = t.int32();
    let math = t.registry().define_class("Demo.Math", None);
    let max = t.registry().define_method(
        &math,
        MethodDef::static_method("Max", vec![int32.clone(), int32.clone()], int32).implemented_by(|call| {
            let (a, b) = (call.arg(0).as_int(), call.arg(1).as_int());
            Ok(Value::i32(i32::try_from(a.max(b).unwrap_or(0)).unwrap_or(0)))
        }),
    );
    let expr = t
        .f
        .binary(BinaryOp::Add.into(), t.int(3), t.int(9), false, Some(max), None)
        .unwrap();
    assert_eq!(t.eval(&expr), Value::i32(9));
}

#[test]
fn conversions_and_type_tests() {
    let t = Fixture::new();
    let object = t.registry().object();
    let boxed = t
        .f
        .unary(UnaryOp::Convert, t.int(7), Some(object.clone()), None)
        .unwrap();
    let is_int = t.f.type_binary(TypeBinaryOp::TypeIs, boxed.clone(), t.int32()).unwrap();
    let is_string = t.f.type_binary(TypeBinaryOp::TypeIs, boxed.clone(), t.string()).unwrap();
    let as_string = t
        .f
        .unary(UnaryOp::TypeAs, boxed.clone(), Some(t.string()), None)
        .unwrap();
    let unboxed = t
        .f
        .unary(UnaryOp::Unbox, boxed, Some(t.int32()), None)
        .unwrap();

    assert_eq!(t.eval(&is_int), Value::Bool(true));
    assert_eq!(t.eval(&is_string), Value::Bool(false));
    assert_eq!(t.eval(&as_string), Value::Null);
    assert_eq!(t.eval(&unboxed), Value::i32(7));
}

#[test]
fn quote_returns_the_operand_tree() {
    let t = Fixture::new();
    let x = t.var(t.int32(), "x");
    let body = t.bin(BinaryOp::Add, &x, &t.int(1));
    let lambda = t.f.lambda(None, body, vec![x], None, false).unwrap();
    let quoted = t.f.unary(UnaryOp::Quote, lambda.clone(), None, None).unwrap();
    let Value::Quoted(tree) = t.eval(&quoted) else {
        panic!("expected a quoted tree");
    };
    assert!(tree.ptr_eq(&lambda));
}

// === Variables and functions ===

#[test]
fn unbound_parameter_is_an_error() {
    let t = Fixture::new();
    let x = t.var(t.int32(), "x");
    let Err(EvalError::UnboundVariable { name }) = t.interp.eval(&x) else {
        panic!("expected an unbound variable");
    };
    assert_eq!(name, "x");
}

#[test]
fn eval_with_binds_free_parameters() {
    let t = Fixture::new();
    let x = t.var(t.int32(), "x");
    let expr = t.bin(BinaryOp::Multiply, &x, &x);
    let value = t.interp.eval_with(&expr, &[(x, Value::i32(6))]).unwrap();
    assert_eq!(value, Value::i32(36));
}

#[test]
fn lambda_call_binds_parameters() {
    let t = Fixture::new();
    let a = t.var(t.int32(), "a");
    let b = t.var(t.int32(), "b");
    let body = t.bin(BinaryOp::Subtract, &a, &b);
    let lambda = t.f.lambda(None, body, vec![a, b], Some("sub"), false).unwrap();
    let function = t.eval(&lambda);
    let result = t.interp.call(&function, &[Value::i32(10), Value::i32(4)]).unwrap();
    assert_eq!(result, Value::i32(6));
}

#[test]
fn closures_share_captured_variables() {
    let t = Fixture::new();
    let counter = t.var(t.int32(), "counter");
    let bump = t.bin(BinaryOp::AddAssign, &counter, &t.int(1));
    let lambda = t.f.lambda(None, bump, Vec::new(), None, false).unwrap();
    let call = t.f.invoke(lambda, Vec::new()).unwrap();
    let program = t.block(&[&counter], vec![call.clone(), call, counter.clone()]);
    assert_eq!(t.eval(&program), Value::i32(2));
}

#[test]
fn block_variables_start_at_default_and_are_scoped() {
    let t = Fixture::new();
    let x = t.var(t.int32(), "x");
    let inner = t.block(&[&x], vec![t.bin(BinaryOp::Assign, &x, &t.int(5))]);
    let outer = t.block(&[&x], vec![inner, x.clone()]);
    assert_eq!(t.eval(&outer), Value::i32(0));
}

// === Control flow ===

#[test]
fn loop_with_break_and_continue() {
    let t = Fixture::new();
    let i = t.var(t.int32(), "i");
    let sum = t.var(t.int32(), "sum");
    let brk = t.f.label_target(Some(t.int32()), Some("break"));
    let cont = t.f.label_target(None, Some("continue"));

    let body = t.block(
        &[],
        vec![
            t.bin(BinaryOp::AddAssign, &i, &t.int(1)),
            t.when(
                t.bin(BinaryOp::GreaterThan, &i, &t.int(10)),
                t.f.jump(GotoKind::Break, brk.clone(), Some(sum.clone()), None).unwrap(),
            ),
            t.when(
                t.bin(BinaryOp::Equal, &t.bin(BinaryOp::Modulo, &i, &t.int(2)), &t.int(0)),
                t.f.jump(GotoKind::Continue, cont.clone(), None, None).unwrap(),
            ),
            t.bin(BinaryOp::AddAssign, &sum, &i),
        ],
    );
    let looped = t.f.loop_expr(body, Some(brk), Some(cont)).unwrap();
    let program = t.block(&[&i, &sum], vec![looped]);

    assert_eq!(t.eval(&program), Value::i32(1 + 3 + 5 + 7 + 9));
}

#[test]
fn return_label_exits_early() {
    let t = Fixture::new();
    let x = t.var(t.int32(), "x");
    let ret = t.f.label_target(Some(t.int32()), Some("return"));
    let body = t.block(
        &[],
        vec![
            t.when(
                t.bin(BinaryOp::LessThan, &x, &t.int(0)),
                t.f.jump(GotoKind::Return, ret.clone(), Some(t.int(-1)), None).unwrap(),
            ),
            t.f.label(ret, Some(t.bin(BinaryOp::Multiply, &x, &t.int(2)))).unwrap(),
        ],
    );
    let lambda = t.f.lambda(None, body, vec![x], None, false).unwrap();
    let function = t.eval(&lambda);

    assert_eq!(t.interp.call(&function, &[Value::i32(-5)]).unwrap(), Value::i32(-1));
    assert_eq!(t.interp.call(&function, &[Value::i32(4)]).unwrap(), Value::i32(8));
}

#[test]
fn jump_out_of_lambda_is_unbound() {
    let t = Fixture::new();
    let outside = t.f.label_target(None, Some("outside"));
    let jump = t.f.jump(GotoKind::Goto, outside.clone(), None, None).unwrap();
    let lambda = t.f.lambda(None, jump, Vec::new(), None, false).unwrap();
    let call = t.f.invoke(lambda, Vec::new()).unwrap();
    let program = t.block(&[], vec![call, t.f.label(outside, None).unwrap()]);

    let Err(EvalError::UnboundLabel { label }) = t.interp.eval(&program) else {
        panic!("expected an unbound label");
    };
    assert_eq!(label, "outside");
}

#[test]
fn switch_matches_cases_then_default() {
    let t = Fixture::new();
    let x = t.var(t.int32(), "x");
    let switch = t
        .f
        .switch(
            None,
            x.clone(),
            Some(t.str("many")),
            None,
            vec![
                t.f.switch_case(vec![t.int(1), t.int(2)], t.str("small")).unwrap(),
                t.f.switch_case(vec![t.int(3)], t.str("three")).unwrap(),
            ],
        )
        .unwrap();

    let run = |v: i32| t.interp.eval_with(&switch, &[(x.clone(), Value::i32(v))]).unwrap();
    assert_eq!(run(2), Value::string("small"));
    assert_eq!(run(3), Value::string("three"));
    assert_eq!(run(9), Value::string("many"));
}

// === Exceptions ===

#[test]
fn finally_always_runs() {
    let t = Fixture::new();
    let log = t.var(t.string(), "log");
    let append = |s: &str| t.bin(BinaryOp::Assign, &log, &t.bin(BinaryOp::Add, &log, &t.str(s)));
    let guarded = t
        .f
        .try_expr(None, append("a"), Vec::new(), Some(append("f")), None)
        .unwrap();
    let program = t.block(&[&log], vec![guarded, log.clone()]);
    assert_eq!(t.eval(&program), Value::string("af"));
}

#[test]
fn fault_runs_only_when_an_exception_passes() {
    let t = Fixture::new();
    let void = t.registry().void();
    let log = t.var(t.string(), "log");
    let append = |s: &str| t.bin(BinaryOp::Assign, &log, &t.bin(BinaryOp::Add, &log, &t.str(s)));

    let quiet = t
        .f
        .try_expr(Some(void.clone()), append("q"), Vec::new(), None, Some(append("x")))
        .unwrap();
    let failing = t
        .f
        .try_expr(
            Some(void.clone()),
            t.throw(BuiltinException::Exception, "boom"),
            Vec::new(),
            None,
            Some(append("x")),
        )
        .unwrap();
    let caught = t
        .f
        .try_expr(
            Some(void),
            failing,
            vec![t.catch(BuiltinException::Exception, append("!"))],
            None,
            None,
        )
        .unwrap();
    let program = t.block(&[&log], vec![quiet, caught, log.clone()]);
    assert_eq!(t.eval(&program), Value::string("qx!"));
}

#[test]
fn handler_variable_and_rethrow() {
    let t = Fixture::new();
    let string = t.string();
    let exception = t.exception(BuiltinException::Exception);
    let message = t.registry().find_field(&exception, "Message").unwrap();
    let rethrow = t.f.unary(UnaryOp::Throw, t.void(), None, None).unwrap();

    let inner = t
        .f
        .try_expr(
            Some(string.clone()),
            t.throw(BuiltinException::InvalidOperation, "boom"),
            vec![t.catch(BuiltinException::Exception, rethrow)],
            None,
            None,
        )
        .unwrap();
    let ex = t.var(exception.clone(), "ex");
    let read = t.f.member_access(Some(ex.clone()), message).unwrap();
    let handler = t.f.catch_block(exception, Some(ex), read, None).unwrap();
    let outer = t
        .f
        .try_expr(Some(string), inner, vec![handler], None, None)
        .unwrap();

    assert_eq!(t.eval(&outer), Value::string("boom"));
}

#[test]
fn filter_can_decline_a_handler() {
    let t = Fixture::new();
    let bool_ty = t.registry().bool();
    let never = t.f.constant(Value::Bool(false), bool_ty).unwrap();
    let declined = t
        .f
        .catch_block(
            t.exception(BuiltinException::Exception),
            None,
            t.int(1),
            Some(never),
        )
        .unwrap();
    let guarded = t
        .f
        .try_expr(
            None,
            t.bin(BinaryOp::Divide, &t.int(1), &t.int(0)),
            vec![declined, t.catch(BuiltinException::DivideByZero, t.int(2))],
            None,
            None,
        )
        .unwrap();
    assert_eq!(t.eval(&guarded), Value::i32(2));
}

#[test]
fn handler_test_respects_hierarchy() {
    let t = Fixture::new();
    let guarded = t
        .f
        .try_expr(
            None,
            t.bin(BinaryOp::Divide, &t.int(1), &t.int(0)),
            vec![t.catch(BuiltinException::InvalidCast, t.int(1))],
            None,
            None,
        )
        .unwrap();
    assert!(matches!(
        t.interp.eval(&guarded),
        Err(EvalError::Unhandled { .. })
    ));
}

// === Host objects and arrays ===

#[test]
fn list_init_calls_host_add() {
    let t = Fixture::new();
    let registry = t.registry();
    let int32 = t.int32();
    let definition = registry.lookup("System.Collections.Generic.List`1").unwrap();
    let list = registry.instantiate(&definition, std::slice::from_ref(&int32)).unwrap();
    let ctor = registry.find_constructor(&list, &[]).unwrap();
    let add = registry.find_method(&list, "Add", &[int32], false, 0).unwrap();
    let count = registry.find_property(&list, "Count", &[]).unwrap();

    let new = t.f.new_object(ctor, Vec::new()).unwrap();
    let inits = (1..=3)
        .map(|v| t.f.element_init(add.clone(), vec![t.int(v)]).unwrap())
        .collect();
    let filled = t.f.list_init(new, inits).unwrap();
    let size = t.f.member_access(Some(filled), count).unwrap();

    assert_eq!(t.eval(&size), Value::i32(3));
}

#[test]
fn member_init_assigns_fields() {
    let t = Fixture::new();
    let registry = t.registry();
    let point = registry.define_class("Demo.Point", None);
    let x = registry.define_field(&point, "X", t.int32());
    let ctor = registry.define_constructor(&point, Vec::new(), None);

    let new = t.f.new_object(ctor, Vec::new()).unwrap();
    let binding = t.f.member_assignment(x.clone(), t.int(4)).unwrap();
    let init = t.f.member_init(new, vec![binding]).unwrap();
    let read = t.f.member_access(Some(init), x).unwrap();

    assert_eq!(t.eval(&read), Value::i32(4));
}

#[test]
fn member_access_on_null_throws() {
    let t = Fixture::new();
    let exception = t.exception(BuiltinException::Exception);
    let message = t.registry().find_field(&exception, "Message").unwrap();
    let null = t.f.constant(Value::Null, exception).unwrap();
    let read = t.f.member_access(Some(null), message).unwrap();

    let Err(EvalError::Unhandled { exception }) = t.interp.eval(&read) else {
        panic!("expected an unhandled exception");
    };
    let ty = exception.runtime_type(t.registry()).unwrap();
    assert_eq!(ty, t.exception(BuiltinException::NullReference));
}

#[test]
fn arrays_store_and_bound_check() {
    let t = Fixture::new();
    let int32 = t.int32();
    let array_ty = t.registry().array_of(&int32, None);
    let a = t.var(array_ty, "a");
    let alloc = t.f.new_array_bounds(int32, vec![t.int(3)]).unwrap();
    let slot = t.bin(BinaryOp::ArrayIndex, &a, &t.int(1));
    let length = t.f.unary(UnaryOp::ArrayLength, a.clone(), None, None).unwrap();

    let program = t.block(
        &[&a],
        vec![
            t.bin(BinaryOp::Assign, &a, &alloc),
            t.bin(BinaryOp::Assign, &slot, &t.int(5)),
            t.bin(BinaryOp::Add, &length, &slot),
        ],
    );
    assert_eq!(t.eval(&program), Value::i32(8));

    let out_of_range = t.block(
        &[&a],
        vec![
            t.bin(BinaryOp::Assign, &a, &alloc),
            t.bin(BinaryOp::ArrayIndex, &a, &t.int(3)),
        ],
    );
    let Err(EvalError::Unhandled { exception }) = t.interp.eval(&out_of_range) else {
        panic!("expected an unhandled exception");
    };
    assert_eq!(
        exception.runtime_type(t.registry()).unwrap(),
        t.exception(BuiltinException::IndexOutOfRange)
    );
}

#[test]
fn array_init_and_multi_dimensional_index() {
    let t = Fixture::new();
    let int32 = t.int32();
    let init = t
        .f
        .new_array_init(int32.clone(), vec![t.int(4), t.int(5), t.int(6)])
        .unwrap();
    let second = t.f.index(init, None, vec![t.int(1)]).unwrap();
    assert_eq!(t.eval(&second), Value::i32(5));

    let grid = t
        .f
        .new_array_bounds(int32, vec![t.int(2), t.int(3)])
        .unwrap();
    let cell = t.f.index(grid, None, vec![t.int(1), t.int(2)]).unwrap();
    assert_eq!(t.eval(&cell), Value::i32(0));
}

#[test]
fn missing_host_implementation_is_reported() {
    let t = Fixture::new();
    let widget = t.registry().define_class("Demo.Widget", None);
    let make = t.registry().define_method(
        &widget,
        MethodDef::static_method("Make", Vec::new(), widget.clone()),
    );
    let call = t.f.call(None, make, Vec::new()).unwrap();
    assert!(matches!(
        t.interp.eval(&call),
        Err(EvalError::MissingImplementation { .. })
    ));
}
