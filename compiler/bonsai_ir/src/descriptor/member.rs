//! Member descriptors (fields, properties, methods, constructors).

use std::fmt;
use std::sync::Arc;

use super::ty::{TypeSlim, TypeSlimKind};

/// Portable member descriptor.
///
/// Like [`TypeSlim`], cheap to clone and structurally comparable.
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct MemberSlim(Arc<MemberSlimKind>);

#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum MemberSlimKind {
    Field {
        declaring_type: TypeSlim,
        name: Arc<str>,
        field_type: TypeSlim,
    },
    /// Property; non-empty `index_parameters` makes it an indexer.
    Property {
        declaring_type: TypeSlim,
        name: Arc<str>,
        property_type: TypeSlim,
        index_parameters: Arc<[TypeSlim]>,
    },
    /// Method. For generic methods `parameters`/`return_type` are the open
    /// signature expressed over `generic_parameters`, and
    /// `generic_arguments` closes it (same length).
    Method {
        declaring_type: TypeSlim,
        name: Arc<str>,
        parameters: Arc<[TypeSlim]>,
        return_type: TypeSlim,
        is_static: bool,
        generic_parameters: Arc<[Arc<str>]>,
        generic_arguments: Arc<[TypeSlim]>,
    },
    Constructor {
        declaring_type: TypeSlim,
        parameters: Arc<[TypeSlim]>,
    },
}

impl MemberSlim {
    pub fn new(kind: MemberSlimKind) -> Self {
        MemberSlim(Arc::new(kind))
    }

    pub fn field(declaring_type: TypeSlim, name: &str, field_type: TypeSlim) -> Self {
        MemberSlim::new(MemberSlimKind::Field {
            declaring_type,
            name: name.into(),
            field_type,
        })
    }

    pub fn property(declaring_type: TypeSlim, name: &str, property_type: TypeSlim) -> Self {
        MemberSlim::indexer(declaring_type, name, property_type, Vec::new())
    }

    pub fn indexer(
        declaring_type: TypeSlim,
        name: &str,
        property_type: TypeSlim,
        index_parameters: Vec<TypeSlim>,
    ) -> Self {
        MemberSlim::new(MemberSlimKind::Property {
            declaring_type,
            name: name.into(),
            property_type,
            index_parameters: index_parameters.into(),
        })
    }

    /// Non-generic instance method.
    pub fn method(
        declaring_type: TypeSlim,
        name: &str,
        parameters: Vec<TypeSlim>,
        return_type: TypeSlim,
    ) -> Self {
        MemberSlim::new(MemberSlimKind::Method {
            declaring_type,
            name: name.into(),
            parameters: parameters.into(),
            return_type,
            is_static: false,
            generic_parameters: Vec::new().into(),
            generic_arguments: Vec::new().into(),
        })
    }

    /// Non-generic static method.
    pub fn static_method(
        declaring_type: TypeSlim,
        name: &str,
        parameters: Vec<TypeSlim>,
        return_type: TypeSlim,
    ) -> Self {
        MemberSlim::new(MemberSlimKind::Method {
            declaring_type,
            name: name.into(),
            parameters: parameters.into(),
            return_type,
            is_static: true,
            generic_parameters: Vec::new().into(),
            generic_arguments: Vec::new().into(),
        })
    }

    /// Close a method over generic arguments.
    ///
    /// `generic_parameters` names the placeholders used in the method's
    /// signature. Returns `None` if `self` is not a method or the counts
    /// disagree.
    pub fn make_generic_method(
        &self,
        generic_parameters: &[&str],
        generic_arguments: Vec<TypeSlim>,
    ) -> Option<Self> {
        match self.kind() {
            MemberSlimKind::Method {
                declaring_type,
                name,
                parameters,
                return_type,
                is_static,
                ..
            } if generic_parameters.len() == generic_arguments.len() => {
                Some(MemberSlim::new(MemberSlimKind::Method {
                    declaring_type: declaring_type.clone(),
                    name: name.clone(),
                    parameters: parameters.clone(),
                    return_type: return_type.clone(),
                    is_static: *is_static,
                    generic_parameters: generic_parameters.iter().map(|&n| Arc::from(n)).collect(),
                    generic_arguments: generic_arguments.into(),
                }))
            }
            _ => None,
        }
    }

    pub fn constructor(declaring_type: TypeSlim, parameters: Vec<TypeSlim>) -> Self {
        MemberSlim::new(MemberSlimKind::Constructor {
            declaring_type,
            parameters: parameters.into(),
        })
    }

    #[inline]
    pub fn kind(&self) -> &MemberSlimKind {
        &self.0
    }

    pub fn declaring_type(&self) -> &TypeSlim {
        match self.kind() {
            MemberSlimKind::Field { declaring_type, .. }
            | MemberSlimKind::Property { declaring_type, .. }
            | MemberSlimKind::Method { declaring_type, .. }
            | MemberSlimKind::Constructor { declaring_type, .. } => declaring_type,
        }
    }

    /// Member name; constructors are named `.ctor`.
    pub fn name(&self) -> &str {
        match self.kind() {
            MemberSlimKind::Field { name, .. }
            | MemberSlimKind::Property { name, .. }
            | MemberSlimKind::Method { name, .. } => name,
            MemberSlimKind::Constructor { .. } => ".ctor",
        }
    }

    /// `Declaring.Type::Name`, used in diagnostics.
    pub fn display_name(&self) -> String {
        format!("{}::{}", self.declaring_type(), self.name())
    }

    pub fn is_field(&self) -> bool {
        matches!(self.kind(), MemberSlimKind::Field { .. })
    }

    pub fn is_property(&self) -> bool {
        matches!(self.kind(), MemberSlimKind::Property { .. })
    }

    pub fn is_method(&self) -> bool {
        matches!(self.kind(), MemberSlimKind::Method { .. })
    }

    pub fn is_constructor(&self) -> bool {
        matches!(self.kind(), MemberSlimKind::Constructor { .. })
    }

    /// Fields, constructors and properties are never static here; methods
    /// carry the flag explicitly.
    pub fn is_static(&self) -> bool {
        matches!(self.kind(), MemberSlimKind::Method { is_static: true, .. })
    }

    pub fn generic_arguments(&self) -> &[TypeSlim] {
        match self.kind() {
            MemberSlimKind::Method {
                generic_arguments, ..
            } => generic_arguments,
            _ => &[],
        }
    }

    pub fn generic_parameters(&self) -> &[Arc<str>] {
        match self.kind() {
            MemberSlimKind::Method {
                generic_parameters, ..
            } => generic_parameters,
            _ => &[],
        }
    }

    /// Parameter types as written (open for generic methods).
    pub fn open_parameter_types(&self) -> &[TypeSlim] {
        match self.kind() {
            MemberSlimKind::Field { .. } => &[],
            MemberSlimKind::Property {
                index_parameters, ..
            } => index_parameters,
            MemberSlimKind::Method { parameters, .. }
            | MemberSlimKind::Constructor { parameters, .. } => parameters,
        }
    }

    /// Parameter types with generic method arguments substituted.
    pub fn parameter_types(&self) -> Vec<TypeSlim> {
        let names = self.generic_parameters();
        let args = self.generic_arguments();
        self.open_parameter_types()
            .iter()
            .map(|p| p.substitute(names, args))
            .collect()
    }

    /// Field/property type, closed method return type, or the constructed
    /// type for constructors.
    pub fn member_type(&self) -> TypeSlim {
        match self.kind() {
            MemberSlimKind::Field { field_type, .. } => field_type.clone(),
            MemberSlimKind::Property { property_type, .. } => property_type.clone(),
            MemberSlimKind::Method {
                return_type,
                generic_parameters,
                generic_arguments,
                ..
            } => return_type.substitute(generic_parameters, generic_arguments),
            MemberSlimKind::Constructor { declaring_type, .. } => declaring_type.clone(),
        }
    }

    /// Whether the member's value is typed `void` (methods only).
    pub fn returns_void(&self) -> bool {
        matches!(
            self.kind(),
            MemberSlimKind::Method { return_type, .. }
                if matches!(return_type.kind(), TypeSlimKind::Simple { name } if &**name == "System.Void")
        )
    }
}

impl fmt::Display for MemberSlim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.display_name())?;
        let args = self.generic_arguments();
        if !args.is_empty() {
            f.write_str("<")?;
            for (i, a) in args.iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{a}")?;
            }
            f.write_str(">")?;
        }
        if self.is_method() || self.is_constructor() {
            f.write_str("(")?;
            for (i, p) in self.open_parameter_types().iter().enumerate() {
                if i > 0 {
                    f.write_str(", ")?;
                }
                write!(f, "{p}")?;
            }
            f.write_str(")")?;
        }
        Ok(())
    }
}

impl fmt::Debug for MemberSlim {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "MemberSlim({self})")
    }
}
