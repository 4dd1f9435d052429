//! Primitive arithmetic, comparison and conversion.
//!
//! Every operation here is pure: it maps values to a value or to a
//! [`Fault`], which the evaluator turns into a thrown exception object.

use std::cmp::Ordering;

use bonsai_ir::{BinaryOp, Primitive, UnaryOp};

use crate::types::{BuiltinException, RuntimeType, TypeRegistry};
use crate::value::Value;

const OVERFLOW: &str = "Arithmetic operation resulted in an overflow.";
const DIVIDE_BY_ZERO: &str = "Attempted to divide by zero.";
pub(super) const NULL_REFERENCE: &str = "Object reference not set to an instance of an object.";

/// A runtime fault to be raised as a built-in exception.
#[derive(Debug)]
pub(super) struct Fault {
    pub(super) kind: BuiltinException,
    pub(super) message: String,
}

impl Fault {
    pub(super) fn new(kind: BuiltinException, message: impl Into<String>) -> Self {
        Fault {
            kind,
            message: message.into(),
        }
    }

    pub(super) fn overflow() -> Self {
        Fault::new(BuiltinException::Overflow, OVERFLOW)
    }

    pub(super) fn null_reference() -> Self {
        Fault::new(BuiltinException::NullReference, NULL_REFERENCE)
    }

    fn unsupported(what: impl std::fmt::Display) -> Self {
        Fault::new(BuiltinException::InvalidOperation, format!("operation not supported: {what}"))
    }
}

pub(super) type OpResult = Result<Value, Fault>;

// Integer widths

fn bit_width(p: Primitive) -> u32 {
    match p {
        Primitive::I8 | Primitive::U8 => 8,
        Primitive::I16 | Primitive::U16 | Primitive::Char => 16,
        Primitive::I32 | Primitive::U32 => 32,
        _ => 64,
    }
}

fn range(p: Primitive) -> (i128, i128) {
    let w = bit_width(p);
    if p.is_signed() {
        (-(1i128 << (w - 1)), (1i128 << (w - 1)) - 1)
    } else {
        (0, (1i128 << w) - 1)
    }
}

/// Two's complement wrap of `v` into the range of `p`.
fn wrap(p: Primitive, v: i128) -> i128 {
    let modulus = 1i128 << bit_width(p);
    let m = v.rem_euclid(modulus);
    if p.is_signed() && m > range(p).1 {
        m - modulus
    } else {
        m
    }
}

fn narrow(p: Primitive, v: i128, checked: bool) -> OpResult {
    let (min, max) = range(p);
    if (min..=max).contains(&v) {
        Ok(Value::Int(p, v))
    } else if checked {
        Err(Fault::overflow())
    } else {
        Ok(Value::Int(p, wrap(p, v)))
    }
}

fn round_float(p: Primitive, x: f64) -> Value {
    #[allow(clippy::cast_possible_truncation, reason = "single precision rounding")]
    let x = if p == Primitive::F32 {
        f64::from(x as f32)
    } else {
        x
    };
    Value::Float(p, x)
}

/// Text used when a value takes part in string concatenation.
pub(super) fn text(value: &Value) -> String {
    match value {
        Value::Null => String::new(),
        Value::Str(s) => s.to_string(),
        Value::Char(c) => c.to_string(),
        other => other.to_string(),
    }
}

// Binary operators

/// Arithmetic, bitwise and shift operators on non-null operands.
pub(super) fn arithmetic(op: BinaryOp, left: &Value, right: &Value) -> OpResult {
    match (left, right) {
        (Value::Int(p, a), Value::Int(_, b)) => integer_arithmetic(op, *p, *a, *b),
        (Value::Float(p, a), Value::Float(_, b)) => float_arithmetic(op, *p, *a, *b),
        (Value::Str(_), _) | (_, Value::Str(_)) if op == BinaryOp::Add => {
            Ok(Value::string(text(left) + &text(right)))
        }
        (Value::Bool(a), Value::Bool(b)) => match op {
            BinaryOp::And => Ok(Value::Bool(*a & *b)),
            BinaryOp::Or => Ok(Value::Bool(*a | *b)),
            BinaryOp::ExclusiveOr => Ok(Value::Bool(*a ^ *b)),
            _ => Err(Fault::unsupported(format_args!("bool {op} bool"))),
        },
        _ => Err(Fault::unsupported(format_args!("{left:?} {op} {right:?}"))),
    }
}

fn integer_arithmetic(op: BinaryOp, p: Primitive, a: i128, b: i128) -> OpResult {
    let checked = op.is_checked();
    let value = match op {
        BinaryOp::Add | BinaryOp::AddChecked => exact_or_wrapped(a.checked_add(b), a.wrapping_add(b), checked)?,
        BinaryOp::Subtract | BinaryOp::SubtractChecked => {
            exact_or_wrapped(a.checked_sub(b), a.wrapping_sub(b), checked)?
        }
        BinaryOp::Multiply | BinaryOp::MultiplyChecked => {
            exact_or_wrapped(a.checked_mul(b), a.wrapping_mul(b), checked)?
        }
        BinaryOp::Divide | BinaryOp::Modulo => {
            if b == 0 {
                return Err(Fault::new(BuiltinException::DivideByZero, DIVIDE_BY_ZERO));
            }
            let value = if op == BinaryOp::Divide { a / b } else { a % b };
            // MIN / -1 is the one quotient that leaves the range.
            return narrow(p, value, true);
        }
        BinaryOp::Power => {
            let exponent = u32::try_from(b).map_err(|_| Fault::overflow())?;
            exact_or_wrapped(a.checked_pow(exponent), a.wrapping_pow(exponent), checked)?
        }
        BinaryOp::And => a & b,
        BinaryOp::Or => a | b,
        BinaryOp::ExclusiveOr => a ^ b,
        BinaryOp::LeftShift | BinaryOp::RightShift => {
            let count = u32::try_from(b & i128::from(bit_width(p) - 1)).unwrap_or(0);
            if op == BinaryOp::LeftShift {
                wrap(p, a << count)
            } else {
                a >> count
            }
        }
        _ => return Err(Fault::unsupported(format_args!("{p} {op} {p}"))),
    };
    narrow(p, value, checked)
}

/// `exact` when the `i128` result exists. Otherwise an overflow fault
/// for checked operators, or the wrapped result, which `narrow` then folds
/// into the operand width: every width divides 128 bits.
fn exact_or_wrapped(exact: Option<i128>, wrapped: i128, checked: bool) -> Result<i128, Fault> {
    match exact {
        Some(v) => Ok(v),
        None if checked => Err(Fault::overflow()),
        None => Ok(wrapped),
    }
}

fn float_arithmetic(op: BinaryOp, p: Primitive, a: f64, b: f64) -> OpResult {
    let value = match op {
        BinaryOp::Add | BinaryOp::AddChecked => a + b,
        BinaryOp::Subtract | BinaryOp::SubtractChecked => a - b,
        BinaryOp::Multiply | BinaryOp::MultiplyChecked => a * b,
        BinaryOp::Divide => a / b,
        BinaryOp::Modulo => a % b,
        BinaryOp::Power => a.powf(b),
        _ => return Err(Fault::unsupported(format_args!("{p} {op} {p}"))),
    };
    Ok(round_float(p, value))
}

#[allow(clippy::cast_precision_loss, reason = "mixed comparisons go through f64")]
fn ordering(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Int(_, a), Value::Int(_, b)) => Some(a.cmp(b)),
        (Value::Float(_, a), Value::Float(_, b)) => a.partial_cmp(b),
        (Value::Int(_, a), Value::Float(_, b)) => (*a as f64).partial_cmp(b),
        (Value::Float(_, a), Value::Int(_, b)) => a.partial_cmp(&(*b as f64)),
        (Value::Char(a), Value::Char(b)) => Some(a.cmp(b)),
        (Value::Str(a), Value::Str(b)) => Some(a.cmp(b)),
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

/// Comparison of two non-null operands.
pub(super) fn compare(op: BinaryOp, left: &Value, right: &Value) -> bool {
    match op {
        BinaryOp::Equal => left.equals(right),
        BinaryOp::NotEqual => !left.equals(right),
        BinaryOp::LessThan => ordering(left, right) == Some(Ordering::Less),
        BinaryOp::LessThanOrEqual => {
            matches!(ordering(left, right), Some(Ordering::Less | Ordering::Equal))
        }
        BinaryOp::GreaterThan => ordering(left, right) == Some(Ordering::Greater),
        BinaryOp::GreaterThanOrEqual => {
            matches!(ordering(left, right), Some(Ordering::Greater | Ordering::Equal))
        }
        _ => false,
    }
}

// Unary operators

/// Arithmetic unary operators on a non-null operand.
pub(super) fn unary(op: UnaryOp, operand: &Value) -> OpResult {
    match (op, operand) {
        (UnaryOp::UnaryPlus, v) => Ok(v.clone()),
        (UnaryOp::Not, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::IsTrue, Value::Bool(b)) => Ok(Value::Bool(*b)),
        (UnaryOp::IsFalse, Value::Bool(b)) => Ok(Value::Bool(!b)),
        (UnaryOp::Negate, Value::Int(p, a)) => narrow(*p, -a, false),
        (UnaryOp::NegateChecked, Value::Int(p, a)) => narrow(*p, -a, true),
        (UnaryOp::Not | UnaryOp::OnesComplement, Value::Int(p, a)) => Ok(Value::Int(*p, wrap(*p, !a))),
        (UnaryOp::Increment, Value::Int(p, a)) => narrow(*p, a + 1, false),
        (UnaryOp::Decrement, Value::Int(p, a)) => narrow(*p, a - 1, false),
        (UnaryOp::Negate | UnaryOp::NegateChecked, Value::Float(p, x)) => Ok(Value::Float(*p, -x)),
        (UnaryOp::Increment, Value::Float(p, x)) => Ok(round_float(*p, x + 1.0)),
        (UnaryOp::Decrement, Value::Float(p, x)) => Ok(round_float(*p, x - 1.0)),
        (op, v) => Err(Fault::unsupported(format_args!("{op} {v:?}"))),
    }
}

// Conversions

fn invalid_cast(value: &Value, target: &RuntimeType, registry: &TypeRegistry) -> Fault {
    let source = value
        .runtime_type(registry)
        .map_or_else(|| "null".to_owned(), |t| t.to_string());
    Fault::new(
        BuiltinException::InvalidCast,
        format!("Unable to cast object of type '{source}' to type '{target}'."),
    )
}

/// Whether a non-null value is an instance of `ty`: assignable, or of
/// exactly that type when `exact`.
pub(super) fn is_instance(value: &Value, ty: &RuntimeType, exact: bool, registry: &TypeRegistry) -> bool {
    let Some(actual) = value.runtime_type(registry) else {
        return false;
    };
    let target = ty.non_nullable();
    if exact {
        &actual == target
    } else {
        target.is_assignable_from(&actual)
    }
}

/// `Convert`/`ConvertChecked`/`Unbox` of `value` to `target`.
pub(super) fn convert(value: &Value, target: &RuntimeType, checked: bool, registry: &TypeRegistry) -> OpResult {
    if value.is_null() {
        return if target.admits_null() {
            Ok(Value::Null)
        } else {
            Err(Fault::null_reference())
        };
    }
    let core = target.non_nullable();
    let Some(p) = core.primitive() else {
        return if is_instance(value, core, false, registry) {
            Ok(value.clone())
        } else {
            Err(invalid_cast(value, target, registry))
        };
    };
    match (p, value) {
        (Primitive::Object, v) => Ok(v.clone()),
        (Primitive::Void, _) => Ok(Value::Void),
        (Primitive::String, Value::Str(_)) | (Primitive::Bool, Value::Bool(_)) | (Primitive::Char, Value::Char(_)) => {
            Ok(value.clone())
        }
        (Primitive::Char, Value::Int(_, a)) => {
            let code = if checked {
                narrow(Primitive::U16, *a, true)?.as_int().unwrap_or(0)
            } else {
                wrap(Primitive::U16, *a)
            };
            u32::try_from(code)
                .ok()
                .and_then(char::from_u32)
                .map(Value::Char)
                .ok_or_else(|| invalid_cast(value, target, registry))
        }
        (p, source) if p.is_integer() => {
            let whole = match source {
                Value::Int(_, a) => *a,
                Value::Char(c) => i128::from(u32::from(*c)),
                Value::Float(_, x) => float_to_integer(*x, p, checked)?,
                _ => return Err(invalid_cast(value, target, registry)),
            };
            narrow(p, whole, checked)
        }
        (p, source) if p.is_float() => {
            #[allow(clippy::cast_precision_loss, reason = "integer to float conversion")]
            let x = match source {
                Value::Int(_, a) => *a as f64,
                Value::Float(_, x) => *x,
                Value::Char(c) => f64::from(u32::from(*c)),
                _ => return Err(invalid_cast(value, target, registry)),
            };
            Ok(round_float(p, x))
        }
        _ => Err(invalid_cast(value, target, registry)),
    }
}

#[allow(clippy::cast_possible_truncation, reason = "range is checked or saturating")]
fn float_to_integer(x: f64, p: Primitive, checked: bool) -> Result<i128, Fault> {
    let truncated = x.trunc();
    if checked {
        let (min, max) = range(p);
        #[allow(clippy::cast_precision_loss, reason = "bounds comparison")]
        let in_range = truncated >= min as f64 && truncated <= max as f64;
        if x.is_nan() || !in_range {
            return Err(Fault::overflow());
        }
    }
    if x.is_nan() {
        return Ok(0);
    }
    Ok(truncated as i128)
}
