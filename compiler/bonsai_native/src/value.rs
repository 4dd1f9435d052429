//! Runtime values of the interpreter.
//!
//! Integers of every width share one variant: the value is kept in an
//! `i128` already wrapped (or checked) to the width named by its
//! [`Primitive`] tag, so arithmetic never has to widen.

use std::fmt;
use std::sync::Arc;

use bonsai_ir::{Literal, Primitive};
use parking_lot::{Mutex, RwLock};
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::expr::NativeExpr;
use crate::types::{RuntimeType, TypeRegistry};

/// Shared mutable slot of a variable; closures capture these.
pub(crate) type VarCell = Arc<Mutex<Value>>;

#[derive(Clone)]
pub enum Value {
    Null,
    /// Result of a `void` expression.
    Void,
    Bool(bool),
    Char(char),
    Int(Primitive, i128),
    Float(Primitive, f64),
    Str(Arc<str>),
    Object(Arc<Object>),
    Array(Arc<ArrayValue>),
    Function(Arc<Closure>),
    /// Result of a `Quote`: the operand tree itself.
    Quoted(NativeExpr),
}

/// Class or struct instance, exceptions included.
pub struct Object {
    ty: RuntimeType,
    fields: Mutex<FxHashMap<Arc<str>, Value>>,
    /// Backing storage for host collection types.
    elements: Mutex<Vec<Value>>,
}

impl Object {
    pub(crate) fn new(ty: RuntimeType, fields: FxHashMap<Arc<str>, Value>) -> Self {
        Object {
            ty,
            fields: Mutex::new(fields),
            elements: Mutex::new(Vec::new()),
        }
    }

    pub fn runtime_type(&self) -> &RuntimeType {
        &self.ty
    }

    pub fn get(&self, name: &str) -> Option<Value> {
        self.fields.lock().get(name).cloned()
    }

    pub fn set(&self, name: &str, value: Value) {
        self.fields.lock().insert(name.into(), value);
    }

    pub fn elements(&self) -> parking_lot::MutexGuard<'_, Vec<Value>> {
        self.elements.lock()
    }
}

/// Array instance. Multi-dimensional arrays are stored row-major.
pub struct ArrayValue {
    ty: RuntimeType,
    lengths: SmallVec<[usize; 2]>,
    items: RwLock<Vec<Value>>,
}

impl ArrayValue {
    pub(crate) fn new(ty: RuntimeType, lengths: SmallVec<[usize; 2]>, items: Vec<Value>) -> Self {
        ArrayValue {
            ty,
            lengths,
            items: RwLock::new(items),
        }
    }

    pub fn runtime_type(&self) -> &RuntimeType {
        &self.ty
    }

    pub fn lengths(&self) -> &[usize] {
        &self.lengths
    }

    pub fn len(&self) -> usize {
        self.items.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Row-major offset of `indices`, or `None` when out of range.
    pub fn offset(&self, indices: &[i128]) -> Option<usize> {
        if indices.len() != self.lengths.len() {
            return None;
        }
        let mut offset = 0usize;
        for (&index, &len) in indices.iter().zip(&self.lengths) {
            let index = usize::try_from(index).ok().filter(|&i| i < len)?;
            offset = offset * len + index;
        }
        Some(offset)
    }

    pub fn get(&self, offset: usize) -> Option<Value> {
        self.items.read().get(offset).cloned()
    }

    pub fn set(&self, offset: usize, value: Value) -> bool {
        match self.items.write().get_mut(offset) {
            Some(slot) => {
                *slot = value;
                true
            }
            None => false,
        }
    }

    pub fn to_vec(&self) -> Vec<Value> {
        self.items.read().clone()
    }
}

/// A lambda together with the variables it closed over.
pub struct Closure {
    pub(crate) lambda: NativeExpr,
    pub(crate) captured: FxHashMap<usize, (NativeExpr, VarCell)>,
}

impl Closure {
    pub fn lambda(&self) -> &NativeExpr {
        &self.lambda
    }
}

impl Value {
    #[inline]
    pub fn string(s: impl Into<Arc<str>>) -> Self {
        Value::Str(s.into())
    }

    #[inline]
    pub fn i32(v: i32) -> Self {
        Value::Int(Primitive::I32, i128::from(v))
    }

    #[inline]
    pub fn i64(v: i64) -> Self {
        Value::Int(Primitive::I64, i128::from(v))
    }

    #[inline]
    pub fn f64(v: f64) -> Self {
        Value::Float(Primitive::F64, v)
    }

    #[inline]
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i128> {
        match self {
            Value::Int(_, v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::Str(s) => Some(s),
            _ => None,
        }
    }

    pub fn as_object(&self) -> Option<&Arc<Object>> {
        match self {
            Value::Object(o) => Some(o),
            _ => None,
        }
    }

    /// Value equality: numbers, characters, booleans and strings compare by
    /// content, everything else by reference.
    pub fn equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) | (Value::Void, Value::Void) => true,
            (Value::Bool(a), Value::Bool(b)) => a == b,
            (Value::Char(a), Value::Char(b)) => a == b,
            (Value::Int(_, a), Value::Int(_, b)) => a == b,
            #[allow(clippy::float_cmp, reason = "value equality is exact equality")]
            (Value::Float(_, a), Value::Float(_, b)) => a == b,
            (Value::Str(a), Value::Str(b)) => a == b,
            _ => self.reference_equals(other),
        }
    }

    /// Reference identity; `null` equals only `null`.
    pub fn reference_equals(&self, other: &Value) -> bool {
        match (self, other) {
            (Value::Null, Value::Null) => true,
            (Value::Str(a), Value::Str(b)) => Arc::ptr_eq(a, b),
            (Value::Object(a), Value::Object(b)) => Arc::ptr_eq(a, b),
            (Value::Array(a), Value::Array(b)) => Arc::ptr_eq(a, b),
            (Value::Function(a), Value::Function(b)) => Arc::ptr_eq(a, b),
            (Value::Quoted(a), Value::Quoted(b)) => a.ptr_eq(b),
            _ => false,
        }
    }

    /// Runtime type of a non-null value.
    pub fn runtime_type(&self, registry: &TypeRegistry) -> Option<RuntimeType> {
        match self {
            Value::Null => None,
            Value::Void => Some(registry.primitive(Primitive::Void)),
            Value::Bool(_) => Some(registry.primitive(Primitive::Bool)),
            Value::Char(_) => Some(registry.primitive(Primitive::Char)),
            Value::Int(p, _) | Value::Float(p, _) => Some(registry.primitive(*p)),
            Value::Str(_) => Some(registry.primitive(Primitive::String)),
            Value::Object(o) => Some(o.ty.clone()),
            Value::Array(a) => Some(a.ty.clone()),
            Value::Function(c) => Some(c.lambda.ty().clone()),
            Value::Quoted(e) => Some(e.ty().clone()),
        }
    }

    /// Materialize a reduced constant of type `ty`.
    pub fn from_literal(literal: &Literal, ty: &RuntimeType, registry: &TypeRegistry) -> Value {
        match literal {
            Literal::Null => Value::Null,
            Literal::Bool(b) => Value::Bool(*b),
            Literal::Char(c) => Value::Char(*c),
            Literal::I8(v) => Value::Int(Primitive::I8, i128::from(*v)),
            Literal::I16(v) => Value::Int(Primitive::I16, i128::from(*v)),
            Literal::I32(v) => Value::Int(Primitive::I32, i128::from(*v)),
            Literal::I64(v) => Value::Int(Primitive::I64, i128::from(*v)),
            Literal::U8(v) => Value::Int(Primitive::U8, i128::from(*v)),
            Literal::U16(v) => Value::Int(Primitive::U16, i128::from(*v)),
            Literal::U32(v) => Value::Int(Primitive::U32, i128::from(*v)),
            Literal::U64(v) => Value::Int(Primitive::U64, i128::from(*v)),
            Literal::F32(v) => Value::Float(Primitive::F32, f64::from(*v)),
            Literal::F64(v) => Value::Float(Primitive::F64, *v),
            Literal::Str(s) => Value::Str(s.clone()),
            Literal::Array(items) => {
                let element = ty
                    .element_type()
                    .cloned()
                    .unwrap_or_else(|| registry.primitive(Primitive::Object));
                let values: Vec<Value> = items
                    .iter()
                    .map(|item| Value::from_literal(item, &element, registry))
                    .collect();
                let array_ty = if ty.is_array() {
                    ty.clone()
                } else {
                    registry.array_of(&element, None)
                };
                Value::Array(Arc::new(ArrayValue::new(
                    array_ty,
                    SmallVec::from_elem(values.len(), 1),
                    values,
                )))
            }
        }
    }

    /// The literal this value was materialized from, if it is one.
    #[allow(
        clippy::cast_possible_truncation,
        reason = "integers are kept within the range of their width"
    )]
    pub fn to_literal(&self) -> Option<Literal> {
        Some(match self {
            Value::Null => Literal::Null,
            Value::Bool(b) => Literal::Bool(*b),
            Value::Char(c) => Literal::Char(*c),
            Value::Int(p, v) => match p {
                Primitive::I8 => Literal::I8(*v as i8),
                Primitive::I16 => Literal::I16(*v as i16),
                Primitive::I32 => Literal::I32(*v as i32),
                Primitive::I64 => Literal::I64(*v as i64),
                Primitive::U8 => Literal::U8(*v as u8),
                Primitive::U16 => Literal::U16(*v as u16),
                Primitive::U32 => Literal::U32(*v as u32),
                _ => Literal::U64(*v as u64),
            },
            Value::Float(Primitive::F32, v) => Literal::F32(*v as f32),
            Value::Float(_, v) => Literal::F64(*v),
            Value::Str(s) => Literal::Str(s.clone()),
            Value::Array(a) => Literal::Array(
                a.to_vec()
                    .iter()
                    .map(Value::to_literal)
                    .collect::<Option<Vec<_>>>()?,
            ),
            Value::Void | Value::Object(_) | Value::Function(_) | Value::Quoted(_) => return None,
        })
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Null => f.write_str("null"),
            Value::Void => f.write_str("void"),
            Value::Bool(b) => write!(f, "{b}"),
            Value::Char(c) => write!(f, "{c:?}"),
            Value::Int(_, v) => write!(f, "{v}"),
            Value::Float(_, v) => write!(f, "{v}"),
            Value::Str(s) => write!(f, "{s:?}"),
            Value::Object(o) => match o.get("Message") {
                Some(Value::Str(message)) => write!(f, "{}: {message}", o.ty),
                _ => write!(f, "{}", o.ty),
            },
            Value::Array(a) => write!(f, "{}[{}]", a.ty, a.len()),
            Value::Function(c) => write!(f, "<closure {}>", c.lambda.ty()),
            Value::Quoted(e) => write!(f, "<quoted {}>", e.ty()),
        }
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Int(p, v) => write!(f, "Int({p}, {v})"),
            Value::Float(p, v) => write!(f, "Float({p}, {v})"),
            other => write!(f, "Value({other})"),
        }
    }
}

impl PartialEq for Value {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Value::Int(p, a), Value::Int(q, b)) => p == q && a == b,
            #[allow(clippy::float_cmp, reason = "structural test equality")]
            (Value::Float(p, a), Value::Float(q, b)) => p == q && a == b,
            _ => self.equals(other),
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Bool(b)
    }
}

impl From<i32> for Value {
    fn from(v: i32) -> Self {
        Value::i32(v)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::string(s)
    }
}
