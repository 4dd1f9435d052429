//! Runtime types and members.
//!
//! A [`RuntimeType`] is what a [`TypeSlim`] resolves to on this host. All
//! runtime types come out of a [`TypeRegistry`], which interns them: the
//! registry never hands out two distinct handles for the same type, so
//! equality and hashing are by address.

mod flags;
mod member;
mod registry;

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bonsai_ir::{Primitive, TypeSlim};

pub use flags::TypeFlags;
pub use member::{BuiltinException, HostCall, HostFn, MethodDef, RuntimeMember, RuntimeMemberKind};
pub use registry::TypeRegistry;

/// Interned runtime type handle.
#[derive(Clone)]
pub struct RuntimeType(Arc<TypeData>);

struct TypeData {
    kind: RuntimeTypeKind,
    flags: TypeFlags,
}

/// Shape of a [`RuntimeType`].
#[derive(Debug)]
pub enum RuntimeTypeKind {
    Primitive(Primitive),
    /// Reference type with single inheritance.
    Class {
        name: Arc<str>,
        base: Option<RuntimeType>,
    },
    /// User value type.
    Struct { name: Arc<str> },
    /// `rank == None` is a vector.
    Array {
        element: RuntimeType,
        rank: Option<u32>,
    },
    Function {
        parameters: Arc<[RuntimeType]>,
        result: RuntimeType,
    },
    /// Open generic type; `parameters` names its type parameters.
    GenericDefinition {
        name: Arc<str>,
        parameters: Arc<[Arc<str>]>,
        value_type: bool,
    },
    Constructed {
        definition: RuntimeType,
        arguments: Arc<[RuntimeType]>,
    },
    GenericParameter { name: Arc<str> },
}

impl RuntimeType {
    /// Only the registry creates types; see [`TypeRegistry`].
    fn new(kind: RuntimeTypeKind) -> Self {
        let flags = compute_flags(&kind);
        RuntimeType(Arc::new(TypeData { kind, flags }))
    }

    #[inline]
    pub fn kind(&self) -> &RuntimeTypeKind {
        &self.0.kind
    }

    #[inline]
    pub fn flags(&self) -> TypeFlags {
        self.0.flags
    }

    /// Address used as the identity key.
    #[inline]
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    #[inline]
    pub fn is_value_type(&self) -> bool {
        self.flags().is_value_type()
    }

    #[inline]
    pub fn is_nullable(&self) -> bool {
        self.flags().contains(TypeFlags::IS_NULLABLE)
    }

    #[inline]
    pub fn is_void(&self) -> bool {
        self.flags().contains(TypeFlags::IS_VOID)
    }

    #[inline]
    pub fn is_array(&self) -> bool {
        self.flags().contains(TypeFlags::IS_ARRAY)
    }

    #[inline]
    pub fn admits_null(&self) -> bool {
        self.flags().admits_null()
    }

    pub fn primitive(&self) -> Option<Primitive> {
        match self.kind() {
            RuntimeTypeKind::Primitive(p) => Some(*p),
            _ => None,
        }
    }

    pub fn element_type(&self) -> Option<&RuntimeType> {
        match self.kind() {
            RuntimeTypeKind::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    /// Number of dimensions of an array type; vectors have one.
    pub fn array_rank(&self) -> Option<u32> {
        match self.kind() {
            RuntimeTypeKind::Array { rank, .. } => Some(rank.unwrap_or(1)),
            _ => None,
        }
    }

    /// `T` for `Nullable<T>`.
    pub fn nullable_underlying(&self) -> Option<&RuntimeType> {
        if !self.is_nullable() {
            return None;
        }
        match self.kind() {
            RuntimeTypeKind::Constructed { arguments, .. } => arguments.first(),
            _ => None,
        }
    }

    /// The type a `null` check or arithmetic operates on: `T` for
    /// `Nullable<T>`, otherwise `self`.
    pub fn non_nullable(&self) -> &RuntimeType {
        self.nullable_underlying().unwrap_or(self)
    }

    pub fn function_signature(&self) -> Option<(&[RuntimeType], &RuntimeType)> {
        match self.kind() {
            RuntimeTypeKind::Function { parameters, result } => Some((parameters, result)),
            _ => None,
        }
    }

    pub fn base_type(&self) -> Option<&RuntimeType> {
        match self.kind() {
            RuntimeTypeKind::Class { base, .. } => base.as_ref(),
            _ => None,
        }
    }

    /// Definition and arguments of a constructed generic type.
    pub fn generic_parts(&self) -> Option<(&RuntimeType, &[RuntimeType])> {
        match self.kind() {
            RuntimeTypeKind::Constructed {
                definition,
                arguments,
            } => Some((definition, arguments)),
            _ => None,
        }
    }

    /// Whether a value of type `source` can be stored in a slot of this
    /// type without conversion.
    ///
    /// Covers identity, class inheritance, `Object` as the universal
    /// reference target (boxing value types), `Nullable<T>` accepting `T`,
    /// and array covariance over reference element types.
    pub fn is_assignable_from(&self, source: &RuntimeType) -> bool {
        if self == source {
            return true;
        }
        if self.primitive() == Some(Primitive::Object) {
            return !source.is_void();
        }
        if let Some(inner) = self.nullable_underlying() {
            return inner == source;
        }
        match (self.kind(), source.kind()) {
            (
                RuntimeTypeKind::Array {
                    element: target,
                    rank: r1,
                },
                RuntimeTypeKind::Array {
                    element: from,
                    rank: r2,
                },
            ) => r1 == r2 && !from.is_value_type() && target.is_assignable_from(from),
            (RuntimeTypeKind::Class { .. }, RuntimeTypeKind::Class { .. }) => {
                let mut current = source.base_type();
                while let Some(base) = current {
                    if base == self {
                        return true;
                    }
                    current = base.base_type();
                }
                false
            }
            _ => false,
        }
    }

    /// The portable descriptor naming this type.
    pub fn to_descriptor(&self) -> TypeSlim {
        match self.kind() {
            RuntimeTypeKind::Primitive(p) => TypeSlim::primitive(*p),
            RuntimeTypeKind::Class { name, .. } | RuntimeTypeKind::Struct { name } => {
                TypeSlim::simple(name)
            }
            RuntimeTypeKind::Array { element, rank } => match rank {
                None => TypeSlim::array(element.to_descriptor()),
                Some(r) => TypeSlim::array_of_rank(element.to_descriptor(), *r),
            },
            RuntimeTypeKind::Function { parameters, result } => TypeSlim::function(
                parameters.iter().map(RuntimeType::to_descriptor).collect(),
                result.to_descriptor(),
            ),
            RuntimeTypeKind::GenericDefinition {
                name, parameters, ..
            } => TypeSlim::generic_definition(
                name,
                u32::try_from(parameters.len()).unwrap_or(u32::MAX),
            ),
            RuntimeTypeKind::Constructed {
                definition,
                arguments,
            } => TypeSlim::generic(
                definition.to_descriptor(),
                arguments.iter().map(RuntimeType::to_descriptor).collect(),
            ),
            RuntimeTypeKind::GenericParameter { name } => TypeSlim::generic_parameter(name),
        }
    }
}

fn compute_flags(kind: &RuntimeTypeKind) -> TypeFlags {
    match kind {
        RuntimeTypeKind::Primitive(p) => {
            let mut flags = TypeFlags::IS_PRIMITIVE;
            flags.set(TypeFlags::IS_VALUE_TYPE, p.is_value_type());
            flags.set(TypeFlags::IS_NUMERIC, p.is_numeric());
            flags.set(TypeFlags::IS_INTEGER, p.is_integer());
            flags.set(TypeFlags::IS_VOID, *p == Primitive::Void);
            flags
        }
        RuntimeTypeKind::Class { .. } => TypeFlags::empty(),
        RuntimeTypeKind::Struct { .. } => TypeFlags::IS_VALUE_TYPE,
        RuntimeTypeKind::Array { element, .. } => {
            TypeFlags::IS_ARRAY | (element.flags() & TypeFlags::PROPAGATE_MASK)
        }
        RuntimeTypeKind::Function { parameters, result } => parameters
            .iter()
            .chain(std::iter::once(result))
            .fold(TypeFlags::IS_FUNCTION, |acc, t| {
                acc | (t.flags() & TypeFlags::PROPAGATE_MASK)
            }),
        RuntimeTypeKind::GenericDefinition { value_type, .. } => {
            let mut flags = TypeFlags::IS_GENERIC_DEFINITION;
            flags.set(TypeFlags::IS_VALUE_TYPE, *value_type);
            flags
        }
        RuntimeTypeKind::Constructed {
            definition,
            arguments,
        } => {
            let mut flags = arguments
                .iter()
                .fold(TypeFlags::IS_CONSTRUCTED, |acc, t| {
                    acc | (t.flags() & TypeFlags::PROPAGATE_MASK)
                });
            flags.set(TypeFlags::IS_VALUE_TYPE, definition.is_value_type());
            let nullable = matches!(
                definition.kind(),
                RuntimeTypeKind::GenericDefinition { name, .. } if &**name == registry::NULLABLE_NAME
            );
            flags.set(TypeFlags::IS_NULLABLE, nullable);
            flags
        }
        RuntimeTypeKind::GenericParameter { .. } => {
            TypeFlags::IS_GENERIC_PARAMETER | TypeFlags::HAS_GENERIC_PARAMETER
        }
    }
}

impl PartialEq for RuntimeType {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for RuntimeType {}

impl Hash for RuntimeType {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Display for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_descriptor().fmt(f)
    }
}

impl fmt::Debug for RuntimeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuntimeType({self})")
    }
}
