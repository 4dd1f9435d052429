//! Boxed constants with deferred materialization.
//!
//! A slim `Constant` node stores its value as an [`ObjectSlim`]: a raw,
//! width-agnostic representation (`Int(i128)` rather than `i32`/`i64`/...).
//! Only when the node's type descriptor has been resolved does the converter
//! call [`ObjectSlim::reduce`], which picks the concrete [`Literal`] for the
//! target. This keeps producers and consumers from having to agree on exact
//! numeric widths ahead of time.

use std::fmt;
use std::sync::Arc;

use super::ty::{Primitive, TypeSlim, TypeSlimKind};
use crate::error::ReductionError;

/// Raw stored representation of a boxed constant.
///
/// Floats are stored as `f64` bits so the type stays `Eq + Hash`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum RawValue {
    Null,
    Bool(bool),
    Int(i128),
    UInt(u128),
    Float(u64),
    Char(char),
    Str(Arc<str>),
    Array(Arc<[RawValue]>),
}

impl fmt::Display for RawValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RawValue::Null => f.write_str("null"),
            RawValue::Bool(b) => write!(f, "{b}"),
            RawValue::Int(i) => write!(f, "{i}"),
            RawValue::UInt(u) => write!(f, "{u}"),
            RawValue::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            RawValue::Char(c) => write!(f, "{c:?}"),
            RawValue::Str(s) => write!(f, "{s:?}"),
            RawValue::Array(items) => {
                f.write_str("[")?;
                for (i, item) in items.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{item}")?;
                }
                f.write_str("]")
            }
        }
    }
}

/// What a boxed constant should materialize as.
///
/// Built by the converter from the resolved runtime type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ReduceTarget {
    /// A primitive type (value or `String`/`Object`).
    Primitive(Primitive),
    /// `Nullable<p>`; accepts `null` in addition to `p`'s values.
    Nullable(Primitive),
    /// Vector of the inner target.
    Array(Box<ReduceTarget>),
    /// Any other reference type; only `null` fits.
    Reference,
    /// Any other value type (user struct); nothing fits.
    OpaqueValue,
}

impl fmt::Display for ReduceTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReduceTarget::Primitive(p) => write!(f, "{p}"),
            ReduceTarget::Nullable(p) => write!(f, "{p}?"),
            ReduceTarget::Array(inner) => write!(f, "{inner}[]"),
            ReduceTarget::Reference => f.write_str("reference type"),
            ReduceTarget::OpaqueValue => f.write_str("value type"),
        }
    }
}

/// A concrete value, materialized for one specific type.
#[derive(Clone, Debug, PartialEq)]
pub enum Literal {
    Null,
    Bool(bool),
    Char(char),
    I8(i8),
    I16(i16),
    I32(i32),
    I64(i64),
    U8(u8),
    U16(u16),
    U32(u32),
    U64(u64),
    F32(f32),
    F64(f64),
    Str(Arc<str>),
    Array(Vec<Literal>),
}

/// Boxed constant stored in slim `Constant` nodes.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ObjectSlim {
    raw: RawValue,
}

impl ObjectSlim {
    pub fn new(raw: RawValue) -> Self {
        ObjectSlim { raw }
    }

    pub fn null() -> Self {
        ObjectSlim::new(RawValue::Null)
    }

    #[inline]
    pub fn raw(&self) -> &RawValue {
        &self.raw
    }

    /// Box a concrete literal (used when converting native trees back).
    pub fn from_literal(literal: &Literal) -> Self {
        ObjectSlim::new(raw_of(literal))
    }

    /// Materialize the constant for `target`.
    pub fn reduce(&self, target: &ReduceTarget) -> Result<Literal, ReductionError> {
        reduce_raw(&self.raw, target)
    }

    /// Round float payloads to single precision where `ty` (or its element
    /// or nullable underlying type) is `System.Single`.
    ///
    /// A `Single` constant can only hold `f32` values, so the stored bits are
    /// the ones the constant reads back as after reduction.
    #[must_use]
    pub fn fit_to(self, ty: &TypeSlim) -> Self {
        if !mentions_single(ty) {
            return self;
        }
        ObjectSlim::new(fit_raw(self.raw, ty))
    }
}

fn single_element(ty: &TypeSlim) -> Option<&TypeSlim> {
    match ty.kind() {
        TypeSlimKind::Array { element, .. } => Some(element),
        _ => ty.nullable_underlying(),
    }
}

fn mentions_single(ty: &TypeSlim) -> bool {
    ty.primitive_kind() == Some(Primitive::F32) || single_element(ty).is_some_and(mentions_single)
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "single-precision constants hold f32 values"
)]
fn fit_raw(raw: RawValue, ty: &TypeSlim) -> RawValue {
    match raw {
        RawValue::Float(bits) if ty.primitive_kind() == Some(Primitive::F32) => {
            RawValue::Float(f64::from(f64::from_bits(bits) as f32).to_bits())
        }
        RawValue::Array(items) => match ty.kind() {
            TypeSlimKind::Array { element, .. } => {
                RawValue::Array(items.iter().map(|item| fit_raw(item.clone(), element)).collect())
            }
            _ => RawValue::Array(items),
        },
        RawValue::Float(_) => match ty.nullable_underlying() {
            Some(inner) => fit_raw(raw, inner),
            None => raw,
        },
        other => other,
    }
}

impl fmt::Display for ObjectSlim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.raw.fmt(f)
    }
}

fn raw_of(literal: &Literal) -> RawValue {
    match literal {
        Literal::Null => RawValue::Null,
        Literal::Bool(b) => RawValue::Bool(*b),
        Literal::Char(c) => RawValue::Char(*c),
        Literal::I8(v) => RawValue::Int(i128::from(*v)),
        Literal::I16(v) => RawValue::Int(i128::from(*v)),
        Literal::I32(v) => RawValue::Int(i128::from(*v)),
        Literal::I64(v) => RawValue::Int(i128::from(*v)),
        Literal::U8(v) => RawValue::UInt(u128::from(*v)),
        Literal::U16(v) => RawValue::UInt(u128::from(*v)),
        Literal::U32(v) => RawValue::UInt(u128::from(*v)),
        Literal::U64(v) => RawValue::UInt(u128::from(*v)),
        Literal::F32(v) => RawValue::Float(f64::from(*v).to_bits()),
        Literal::F64(v) => RawValue::Float(v.to_bits()),
        Literal::Str(s) => RawValue::Str(s.clone()),
        Literal::Array(items) => RawValue::Array(items.iter().map(raw_of).collect()),
    }
}

fn mismatch(raw: &RawValue, target: &ReduceTarget, reason: &'static str) -> ReductionError {
    ReductionError {
        value: raw.to_string(),
        target: target.to_string(),
        reason,
    }
}

fn reduce_raw(raw: &RawValue, target: &ReduceTarget) -> Result<Literal, ReductionError> {
    match target {
        ReduceTarget::Nullable(p) => match raw {
            RawValue::Null => Ok(Literal::Null),
            _ => reduce_primitive(raw, *p, target),
        },
        ReduceTarget::Primitive(p) => reduce_primitive(raw, *p, target),
        ReduceTarget::Array(element) => match raw {
            RawValue::Null => Ok(Literal::Null),
            RawValue::Array(items) => items
                .iter()
                .map(|item| reduce_raw(item, element))
                .collect::<Result<Vec<_>, _>>()
                .map(Literal::Array),
            _ => Err(mismatch(raw, target, "expected an array value")),
        },
        ReduceTarget::Reference => match raw {
            RawValue::Null => Ok(Literal::Null),
            _ => Err(mismatch(
                raw,
                target,
                "only null can be boxed for a non-primitive reference type",
            )),
        },
        ReduceTarget::OpaqueValue => Err(mismatch(
            raw,
            target,
            "constants of user-defined value types cannot be materialized",
        )),
    }
}

#[expect(
    clippy::cast_possible_truncation,
    reason = "narrowing to f32 is the requested representation"
)]
fn reduce_primitive(
    raw: &RawValue,
    p: Primitive,
    target: &ReduceTarget,
) -> Result<Literal, ReductionError> {
    match (raw, p) {
        (RawValue::Null, Primitive::String | Primitive::Object) => Ok(Literal::Null),
        (RawValue::Null, _) => Err(mismatch(raw, target, "null is not a valid value type value")),
        (_, Primitive::Void) => Err(mismatch(raw, target, "void has no values")),
        (_, Primitive::Object) => Ok(natural(raw)),
        (RawValue::Bool(b), Primitive::Bool) => Ok(Literal::Bool(*b)),
        (RawValue::Char(c), Primitive::Char) => Ok(Literal::Char(*c)),
        (RawValue::Str(s), Primitive::String) => Ok(Literal::Str(s.clone())),
        (RawValue::Int(i), _) if p.is_numeric() => reduce_integer(raw, *i, p, target),
        (RawValue::UInt(u), _) if p.is_numeric() => match i128::try_from(*u) {
            Ok(i) => reduce_integer(raw, i, p, target),
            // Only u64/u128-sized values exceed i128; u64 is the widest target.
            Err(_) => Err(mismatch(raw, target, "value out of range")),
        },
        (RawValue::Float(bits), Primitive::F64) => Ok(Literal::F64(f64::from_bits(*bits))),
        (RawValue::Float(bits), Primitive::F32) => Ok(Literal::F32(f64::from_bits(*bits) as f32)),
        (RawValue::Float(_), _) if p.is_integer() => Err(mismatch(
            raw,
            target,
            "floating-point value cannot be boxed as an integer",
        )),
        _ => Err(mismatch(raw, target, "incompatible value")),
    }
}

#[expect(
    clippy::cast_precision_loss,
    reason = "integer constants boxed as floats accept rounding"
)]
fn reduce_integer(
    raw: &RawValue,
    i: i128,
    p: Primitive,
    target: &ReduceTarget,
) -> Result<Literal, ReductionError> {
    let out_of_range = || mismatch(raw, target, "value out of range");
    Ok(match p {
        Primitive::I8 => Literal::I8(i8::try_from(i).map_err(|_| out_of_range())?),
        Primitive::I16 => Literal::I16(i16::try_from(i).map_err(|_| out_of_range())?),
        Primitive::I32 => Literal::I32(i32::try_from(i).map_err(|_| out_of_range())?),
        Primitive::I64 => Literal::I64(i64::try_from(i).map_err(|_| out_of_range())?),
        Primitive::U8 => Literal::U8(u8::try_from(i).map_err(|_| out_of_range())?),
        Primitive::U16 => Literal::U16(u16::try_from(i).map_err(|_| out_of_range())?),
        Primitive::U32 => Literal::U32(u32::try_from(i).map_err(|_| out_of_range())?),
        Primitive::U64 => Literal::U64(u64::try_from(i).map_err(|_| out_of_range())?),
        Primitive::F32 => Literal::F32(i as f32),
        Primitive::F64 => Literal::F64(i as f64),
        _ => return Err(mismatch(raw, target, "incompatible value")),
    })
}

/// Representation used when the target is `System.Object`.
#[expect(
    clippy::cast_possible_truncation,
    reason = "values beyond 64 bits wrap when boxed as object"
)]
fn natural(raw: &RawValue) -> Literal {
    match raw {
        RawValue::Null => Literal::Null,
        RawValue::Bool(b) => Literal::Bool(*b),
        RawValue::Int(i) => match (i32::try_from(*i), i64::try_from(*i)) {
            (Ok(v), _) => Literal::I32(v),
            (_, Ok(v)) => Literal::I64(v),
            _ => Literal::I64(*i as i64),
        },
        RawValue::UInt(u) => match u64::try_from(*u) {
            Ok(v) => Literal::U64(v),
            Err(_) => Literal::U64(*u as u64),
        },
        RawValue::Float(bits) => Literal::F64(f64::from_bits(*bits)),
        RawValue::Char(c) => Literal::Char(*c),
        RawValue::Str(s) => Literal::Str(s.clone()),
        RawValue::Array(items) => Literal::Array(items.iter().map(natural).collect()),
    }
}

macro_rules! object_slim_from {
    ($($ty:ty => $variant:ident($conv:expr)),* $(,)?) => {
        $(
            impl From<$ty> for ObjectSlim {
                fn from(value: $ty) -> Self {
                    ObjectSlim::new(RawValue::$variant($conv(value)))
                }
            }
        )*
    };
}

object_slim_from! {
    bool => Bool(|v| v),
    char => Char(|v| v),
    i8 => Int(i128::from),
    i16 => Int(i128::from),
    i32 => Int(i128::from),
    i64 => Int(i128::from),
    u8 => UInt(u128::from),
    u16 => UInt(u128::from),
    u32 => UInt(u128::from),
    u64 => UInt(u128::from),
    f32 => Float(|v: f32| f64::from(v).to_bits()),
    f64 => Float(f64::to_bits),
    &str => Str(Arc::<str>::from),
}
