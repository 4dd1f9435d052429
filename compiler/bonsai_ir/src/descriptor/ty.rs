//! Type descriptors.

use std::fmt;
use std::sync::Arc;

/// Built-in scalar types every runtime is expected to provide.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum Primitive {
    Bool,
    Char,
    I8,
    I16,
    I32,
    I64,
    U8,
    U16,
    U32,
    U64,
    F32,
    F64,
    String,
    Object,
    Void,
}

impl Primitive {
    /// Every primitive, in declaration order.
    pub const ALL: [Primitive; 15] = [
        Primitive::Bool,
        Primitive::Char,
        Primitive::I8,
        Primitive::I16,
        Primitive::I32,
        Primitive::I64,
        Primitive::U8,
        Primitive::U16,
        Primitive::U32,
        Primitive::U64,
        Primitive::F32,
        Primitive::F64,
        Primitive::String,
        Primitive::Object,
        Primitive::Void,
    ];

    /// Canonical, fully qualified type name.
    pub const fn name(self) -> &'static str {
        match self {
            Primitive::Bool => "System.Boolean",
            Primitive::Char => "System.Char",
            Primitive::I8 => "System.SByte",
            Primitive::I16 => "System.Int16",
            Primitive::I32 => "System.Int32",
            Primitive::I64 => "System.Int64",
            Primitive::U8 => "System.Byte",
            Primitive::U16 => "System.UInt16",
            Primitive::U32 => "System.UInt32",
            Primitive::U64 => "System.UInt64",
            Primitive::F32 => "System.Single",
            Primitive::F64 => "System.Double",
            Primitive::String => "System.String",
            Primitive::Object => "System.Object",
            Primitive::Void => "System.Void",
        }
    }

    /// Look up a primitive by its canonical name.
    pub fn from_name(name: &str) -> Option<Primitive> {
        Primitive::ALL.into_iter().find(|p| p.name() == name)
    }

    #[inline]
    pub const fn is_integer(self) -> bool {
        matches!(
            self,
            Primitive::I8
                | Primitive::I16
                | Primitive::I32
                | Primitive::I64
                | Primitive::U8
                | Primitive::U16
                | Primitive::U32
                | Primitive::U64
        )
    }

    #[inline]
    pub const fn is_float(self) -> bool {
        matches!(self, Primitive::F32 | Primitive::F64)
    }

    #[inline]
    pub const fn is_numeric(self) -> bool {
        self.is_integer() || self.is_float()
    }

    #[inline]
    pub const fn is_signed(self) -> bool {
        matches!(
            self,
            Primitive::I8
                | Primitive::I16
                | Primitive::I32
                | Primitive::I64
                | Primitive::F32
                | Primitive::F64
        )
    }

    /// `String` and `Object` are references; `Void` is neither but is
    /// treated as a value type for classification purposes.
    #[inline]
    pub const fn is_value_type(self) -> bool {
        !matches!(self, Primitive::String | Primitive::Object)
    }
}

impl fmt::Display for Primitive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Name of the open generic nullable wrapper.
pub(crate) const NULLABLE_NAME: &str = "System.Nullable`1";

/// Portable type descriptor.
///
/// Cheap to clone (one `Arc`). Equality and hashing are structural, so two
/// independently built descriptors for `List`1[System.Int32]` are equal.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TypeSlim(Arc<TypeSlimKind>);

/// Shape of a [`TypeSlim`].
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TypeSlimKind {
    /// A named, non-generic type (primitives included).
    Simple { name: Arc<str> },
    /// Array of `element`. `rank == None` is a single-dimensional vector;
    /// `Some(n)` is a (possibly 1-rank) multi-dimensional array.
    Array { element: TypeSlim, rank: Option<u32> },
    /// Open generic type such as `List`1`.
    GenericDefinition { name: Arc<str>, arity: u32 },
    /// Closed construction of a generic definition.
    Generic {
        definition: TypeSlim,
        arguments: Arc<[TypeSlim]>,
    },
    /// Generic parameter placeholder, used inside open signatures.
    GenericParameter { name: Arc<str> },
    /// Function (delegate) type.
    Function {
        parameters: Arc<[TypeSlim]>,
        result: TypeSlim,
    },
}

impl TypeSlim {
    pub fn new(kind: TypeSlimKind) -> Self {
        TypeSlim(Arc::new(kind))
    }

    pub fn simple(name: &str) -> Self {
        TypeSlim::new(TypeSlimKind::Simple { name: name.into() })
    }

    pub fn primitive(p: Primitive) -> Self {
        TypeSlim::simple(p.name())
    }

    pub fn bool() -> Self {
        TypeSlim::primitive(Primitive::Bool)
    }

    pub fn int32() -> Self {
        TypeSlim::primitive(Primitive::I32)
    }

    pub fn int64() -> Self {
        TypeSlim::primitive(Primitive::I64)
    }

    pub fn float64() -> Self {
        TypeSlim::primitive(Primitive::F64)
    }

    pub fn string() -> Self {
        TypeSlim::primitive(Primitive::String)
    }

    pub fn object() -> Self {
        TypeSlim::primitive(Primitive::Object)
    }

    pub fn void() -> Self {
        TypeSlim::primitive(Primitive::Void)
    }

    /// Single-dimensional array (vector) of `element`.
    pub fn array(element: TypeSlim) -> Self {
        TypeSlim::new(TypeSlimKind::Array {
            element,
            rank: None,
        })
    }

    /// Multi-dimensional array of `element` with `rank` dimensions.
    pub fn array_of_rank(element: TypeSlim, rank: u32) -> Self {
        TypeSlim::new(TypeSlimKind::Array {
            element,
            rank: Some(rank),
        })
    }

    pub fn generic_definition(name: &str, arity: u32) -> Self {
        TypeSlim::new(TypeSlimKind::GenericDefinition {
            name: name.into(),
            arity,
        })
    }

    pub fn generic(definition: TypeSlim, arguments: Vec<TypeSlim>) -> Self {
        TypeSlim::new(TypeSlimKind::Generic {
            definition,
            arguments: arguments.into(),
        })
    }

    pub fn generic_parameter(name: &str) -> Self {
        TypeSlim::new(TypeSlimKind::GenericParameter { name: name.into() })
    }

    pub fn function(parameters: Vec<TypeSlim>, result: TypeSlim) -> Self {
        TypeSlim::new(TypeSlimKind::Function {
            parameters: parameters.into(),
            result,
        })
    }

    /// `System.Nullable`1[inner]`.
    pub fn nullable(inner: TypeSlim) -> Self {
        TypeSlim::generic(
            TypeSlim::generic_definition(NULLABLE_NAME, 1),
            vec![inner],
        )
    }

    #[inline]
    pub fn kind(&self) -> &TypeSlimKind {
        &self.0
    }

    /// Whether both descriptors are the same allocation (cheap pre-check).
    #[inline]
    pub fn ptr_eq(a: &TypeSlim, b: &TypeSlim) -> bool {
        Arc::ptr_eq(&a.0, &b.0)
    }

    // Classification

    pub fn primitive_kind(&self) -> Option<Primitive> {
        match self.kind() {
            TypeSlimKind::Simple { name } => Primitive::from_name(name),
            _ => None,
        }
    }

    /// Whether this descriptor denotes a value type.
    ///
    /// Returns `None` for named user types: a descriptor alone does not say
    /// whether `Acme.Point` is a struct or a class. The resolved runtime type
    /// answers that.
    pub fn is_value_type(&self) -> Option<bool> {
        match self.kind() {
            TypeSlimKind::Simple { name } => Primitive::from_name(name).map(Primitive::is_value_type),
            TypeSlimKind::Array { .. } | TypeSlimKind::Function { .. } => Some(false),
            TypeSlimKind::Generic { .. } if self.is_nullable() => Some(true),
            TypeSlimKind::Generic { .. }
            | TypeSlimKind::GenericDefinition { .. }
            | TypeSlimKind::GenericParameter { .. } => None,
        }
    }

    pub fn is_numeric(&self) -> bool {
        self.primitive_kind().is_some_and(Primitive::is_numeric)
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable_underlying().is_some()
    }

    /// `T` when this is `Nullable<T>`.
    pub fn nullable_underlying(&self) -> Option<&TypeSlim> {
        match self.kind() {
            TypeSlimKind::Generic {
                definition,
                arguments,
            } => match definition.kind() {
                TypeSlimKind::GenericDefinition { name, arity: 1 }
                    if &**name == NULLABLE_NAME =>
                {
                    arguments.first()
                }
                _ => None,
            },
            _ => None,
        }
    }

    pub fn is_array(&self) -> bool {
        matches!(self.kind(), TypeSlimKind::Array { .. })
    }

    /// Element type of an array descriptor.
    pub fn element_type(&self) -> Option<&TypeSlim> {
        match self.kind() {
            TypeSlimKind::Array { element, .. } => Some(element),
            _ => None,
        }
    }

    pub fn is_generic(&self) -> bool {
        matches!(
            self.kind(),
            TypeSlimKind::Generic { .. } | TypeSlimKind::GenericDefinition { .. }
        )
    }

    /// Whether any generic parameter occurs inside this descriptor.
    pub fn contains_generic_parameters(&self) -> bool {
        match self.kind() {
            TypeSlimKind::GenericParameter { .. } => true,
            TypeSlimKind::Simple { .. } | TypeSlimKind::GenericDefinition { .. } => false,
            TypeSlimKind::Array { element, .. } => element.contains_generic_parameters(),
            TypeSlimKind::Generic { arguments, .. } => {
                arguments.iter().any(TypeSlim::contains_generic_parameters)
            }
            TypeSlimKind::Function { parameters, result } => {
                parameters.iter().any(TypeSlim::contains_generic_parameters)
                    || result.contains_generic_parameters()
            }
        }
    }

    /// Parameter and result types of a function descriptor.
    pub fn function_signature(&self) -> Option<(&[TypeSlim], &TypeSlim)> {
        match self.kind() {
            TypeSlimKind::Function { parameters, result } => Some((parameters, result)),
            _ => None,
        }
    }

    /// Replace generic parameters by name.
    ///
    /// Returns `self` (same allocation) when nothing was replaced.
    pub fn substitute(&self, names: &[Arc<str>], arguments: &[TypeSlim]) -> TypeSlim {
        if !self.contains_generic_parameters() {
            return self.clone();
        }
        match self.kind() {
            TypeSlimKind::GenericParameter { name } => names
                .iter()
                .position(|n| n == name)
                .and_then(|i| arguments.get(i))
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeSlimKind::Array { element, rank } => TypeSlim::new(TypeSlimKind::Array {
                element: element.substitute(names, arguments),
                rank: *rank,
            }),
            TypeSlimKind::Generic {
                definition,
                arguments: args,
            } => TypeSlim::new(TypeSlimKind::Generic {
                definition: definition.clone(),
                arguments: args.iter().map(|a| a.substitute(names, arguments)).collect(),
            }),
            TypeSlimKind::Function { parameters, result } => TypeSlim::new(TypeSlimKind::Function {
                parameters: parameters
                    .iter()
                    .map(|p| p.substitute(names, arguments))
                    .collect(),
                result: result.substitute(names, arguments),
            }),
            TypeSlimKind::Simple { .. } | TypeSlimKind::GenericDefinition { .. } => self.clone(),
        }
    }
}

impl fmt::Display for TypeSlim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            TypeSlimKind::Simple { name }
            | TypeSlimKind::GenericDefinition { name, .. }
            | TypeSlimKind::GenericParameter { name } => f.write_str(name),
            TypeSlimKind::Array { element, rank } => match rank {
                None => write!(f, "{element}[]"),
                Some(n) => {
                    write!(f, "{element}[")?;
                    for _ in 1..*n {
                        f.write_str(",")?;
                    }
                    f.write_str("]")
                }
            },
            TypeSlimKind::Generic {
                definition,
                arguments,
            } => {
                write!(f, "{definition}[")?;
                for (i, arg) in arguments.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{arg}")?;
                }
                f.write_str("]")
            }
            TypeSlimKind::Function { parameters, result } => {
                f.write_str("(")?;
                for (i, p) in parameters.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{p}")?;
                }
                write!(f, ") -> {result}")
            }
        }
    }
}

impl fmt::Debug for TypeSlim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "TypeSlim({self})")
    }
}

impl From<Primitive> for TypeSlim {
    fn from(p: Primitive) -> Self {
        TypeSlim::primitive(p)
    }
}
