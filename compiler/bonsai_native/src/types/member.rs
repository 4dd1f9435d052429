//! Runtime members and host implementations.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use bonsai_ir::{MemberSlim, MemberSlimKind, TypeSlim};

use super::{RuntimeType, TypeRegistry};
use crate::value::Value;

/// Host implementation of a method, constructor or property accessor.
///
/// `Err` carries a thrown exception object.
pub type HostFn = Arc<dyn Fn(HostCall<'_>) -> Result<Value, Value> + Send + Sync>;

/// Everything a host implementation gets to see.
pub struct HostCall<'a> {
    pub registry: &'a TypeRegistry,
    pub member: &'a RuntimeMember,
    /// Instance for instance members; `None` for static methods and
    /// constructors.
    pub this: Option<&'a Value>,
    pub args: &'a [Value],
}

impl HostCall<'_> {
    /// Build an exception object to return as `Err`.
    pub fn throw(&self, kind: BuiltinException, message: impl Into<String>) -> Value {
        self.registry.new_exception(kind, message)
    }

    pub fn arg(&self, index: usize) -> &Value {
        self.args.get(index).unwrap_or(&Value::Null)
    }
}

/// Exception types pre-registered by every [`TypeRegistry`].
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum BuiltinException {
    Exception,
    Argument,
    InvalidOperation,
    DivideByZero,
    Overflow,
    NullReference,
    IndexOutOfRange,
    InvalidCast,
}

impl BuiltinException {
    pub const ALL: [BuiltinException; 8] = [
        BuiltinException::Exception,
        BuiltinException::Argument,
        BuiltinException::InvalidOperation,
        BuiltinException::DivideByZero,
        BuiltinException::Overflow,
        BuiltinException::NullReference,
        BuiltinException::IndexOutOfRange,
        BuiltinException::InvalidCast,
    ];

    pub const fn name(self) -> &'static str {
        match self {
            BuiltinException::Exception => "System.Exception",
            BuiltinException::Argument => "System.ArgumentException",
            BuiltinException::InvalidOperation => "System.InvalidOperationException",
            BuiltinException::DivideByZero => "System.DivideByZeroException",
            BuiltinException::Overflow => "System.OverflowException",
            BuiltinException::NullReference => "System.NullReferenceException",
            BuiltinException::IndexOutOfRange => "System.IndexOutOfRangeException",
            BuiltinException::InvalidCast => "System.InvalidCastException",
        }
    }
}

/// Interned runtime member handle. Equality is by address.
#[derive(Clone)]
pub struct RuntimeMember(Arc<MemberData>);

pub(super) struct MemberData {
    pub(super) declaring_type: RuntimeType,
    pub(super) name: Arc<str>,
    pub(super) kind: RuntimeMemberKind,
}

pub enum RuntimeMemberKind {
    Field {
        field_type: RuntimeType,
    },
    /// Property; a non-empty `index_parameters` makes it an indexer.
    /// Properties without accessors are backed by instance storage.
    Property {
        property_type: RuntimeType,
        index_parameters: Arc<[RuntimeType]>,
        getter: Option<HostFn>,
        setter: Option<HostFn>,
    },
    /// Method. `parameters` and `return_type` are closed; for a closed
    /// generic method `definition` is the open method it was made from.
    Method {
        parameters: Arc<[RuntimeType]>,
        return_type: RuntimeType,
        is_static: bool,
        generic_parameters: Arc<[Arc<str>]>,
        generic_arguments: Arc<[RuntimeType]>,
        definition: Option<RuntimeMember>,
        implementation: Option<HostFn>,
    },
    /// Constructor. Without an implementation only the parameterless form
    /// is callable and yields a default-initialized instance.
    Constructor {
        parameters: Arc<[RuntimeType]>,
        implementation: Option<HostFn>,
    },
}

/// Everything needed to register a method.
pub struct MethodDef {
    pub name: String,
    pub parameters: Vec<RuntimeType>,
    pub return_type: RuntimeType,
    pub is_static: bool,
    /// Names of the method's own generic parameters (open methods only).
    pub generic_parameters: Vec<String>,
    pub implementation: Option<HostFn>,
}

impl MethodDef {
    pub fn instance(name: &str, parameters: Vec<RuntimeType>, return_type: RuntimeType) -> Self {
        MethodDef {
            name: name.to_owned(),
            parameters,
            return_type,
            is_static: false,
            generic_parameters: Vec::new(),
            implementation: None,
        }
    }

    pub fn static_method(
        name: &str,
        parameters: Vec<RuntimeType>,
        return_type: RuntimeType,
    ) -> Self {
        MethodDef {
            is_static: true,
            ..MethodDef::instance(name, parameters, return_type)
        }
    }

    #[must_use]
    pub fn generic(mut self, parameters: &[&str]) -> Self {
        self.generic_parameters = parameters.iter().map(|&p| p.to_owned()).collect();
        self
    }

    #[must_use]
    pub fn implemented_by(
        mut self,
        f: impl Fn(HostCall<'_>) -> Result<Value, Value> + Send + Sync + 'static,
    ) -> Self {
        self.implementation = Some(Arc::new(f));
        self
    }
}

impl RuntimeMember {
    pub(super) fn new(declaring_type: RuntimeType, name: &str, kind: RuntimeMemberKind) -> Self {
        RuntimeMember(Arc::new(MemberData {
            declaring_type,
            name: name.into(),
            kind,
        }))
    }

    #[inline]
    pub fn kind(&self) -> &RuntimeMemberKind {
        &self.0.kind
    }

    #[inline]
    pub fn declaring_type(&self) -> &RuntimeType {
        &self.0.declaring_type
    }

    #[inline]
    pub fn name(&self) -> &str {
        &self.0.name
    }

    #[inline]
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    pub fn is_field(&self) -> bool {
        matches!(self.kind(), RuntimeMemberKind::Field { .. })
    }

    pub fn is_property(&self) -> bool {
        matches!(self.kind(), RuntimeMemberKind::Property { .. })
    }

    pub fn is_method(&self) -> bool {
        matches!(self.kind(), RuntimeMemberKind::Method { .. })
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self.kind(), RuntimeMemberKind::Constructor { .. })
    }

    pub fn is_static(&self) -> bool {
        matches!(self.kind(), RuntimeMemberKind::Method { is_static: true, .. })
    }

    /// Whether this is a generic method still missing its arguments.
    pub fn is_open_generic(&self) -> bool {
        matches!(
            self.kind(),
            RuntimeMemberKind::Method { generic_parameters, generic_arguments, .. }
                if generic_parameters.len() != generic_arguments.len()
        )
    }

    /// Parameter types (index parameters for indexers).
    pub fn parameter_types(&self) -> &[RuntimeType] {
        match self.kind() {
            RuntimeMemberKind::Field { .. } => &[],
            RuntimeMemberKind::Property {
                index_parameters, ..
            } => index_parameters,
            RuntimeMemberKind::Method { parameters, .. }
            | RuntimeMemberKind::Constructor { parameters, .. } => parameters,
        }
    }

    /// Field/property type, method return type, or the constructed type.
    pub fn member_type(&self) -> &RuntimeType {
        match self.kind() {
            RuntimeMemberKind::Field { field_type } => field_type,
            RuntimeMemberKind::Property { property_type, .. } => property_type,
            RuntimeMemberKind::Method { return_type, .. } => return_type,
            RuntimeMemberKind::Constructor { .. } => self.declaring_type(),
        }
    }

    pub fn implementation(&self) -> Option<&HostFn> {
        match self.kind() {
            RuntimeMemberKind::Method { implementation, .. }
            | RuntimeMemberKind::Constructor { implementation, .. } => implementation.as_ref(),
            RuntimeMemberKind::Property { getter, .. } => getter.as_ref(),
            RuntimeMemberKind::Field { .. } => None,
        }
    }

    pub fn setter(&self) -> Option<&HostFn> {
        match self.kind() {
            RuntimeMemberKind::Property { setter, .. } => setter.as_ref(),
            _ => None,
        }
    }

    /// The portable descriptor naming this member.
    ///
    /// Closed generic methods are described by their open signature plus
    /// generic arguments, the way descriptors express them.
    pub fn to_descriptor(&self) -> MemberSlim {
        let declaring_type = self.declaring_type().to_descriptor();
        let name: Arc<str> = self.0.name.clone();
        let descriptors = |types: &[RuntimeType]| -> Arc<[TypeSlim]> {
            types.iter().map(RuntimeType::to_descriptor).collect()
        };
        let kind = match self.kind() {
            RuntimeMemberKind::Field { field_type } => MemberSlimKind::Field {
                declaring_type,
                name,
                field_type: field_type.to_descriptor(),
            },
            RuntimeMemberKind::Property {
                property_type,
                index_parameters,
                ..
            } => MemberSlimKind::Property {
                declaring_type,
                name,
                property_type: property_type.to_descriptor(),
                index_parameters: descriptors(index_parameters),
            },
            RuntimeMemberKind::Method {
                parameters,
                return_type,
                is_static,
                generic_parameters,
                generic_arguments,
                definition,
                ..
            } => {
                let (parameters, return_type) = match definition {
                    Some(open) => (
                        descriptors(open.parameter_types()),
                        open.member_type().to_descriptor(),
                    ),
                    None => (descriptors(parameters), return_type.to_descriptor()),
                };
                MemberSlimKind::Method {
                    declaring_type,
                    name,
                    parameters,
                    return_type,
                    is_static: *is_static,
                    generic_parameters: generic_parameters.clone(),
                    generic_arguments: descriptors(generic_arguments),
                }
            }
            RuntimeMemberKind::Constructor { parameters, .. } => MemberSlimKind::Constructor {
                declaring_type,
                parameters: descriptors(parameters),
            },
        };
        MemberSlim::new(kind)
    }
}

impl PartialEq for RuntimeMember {
    #[inline]
    fn eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl Eq for RuntimeMember {}

impl Hash for RuntimeMember {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.addr().hash(state);
    }
}

impl fmt::Display for RuntimeMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.to_descriptor().fmt(f)
    }
}

impl fmt::Debug for RuntimeMember {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "RuntimeMember({self})")
    }
}
