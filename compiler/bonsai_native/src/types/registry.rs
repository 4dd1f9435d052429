//! The host's reflection universe.
//!
//! Types are interned in two tables: named types (primitives, classes,
//! structs, generic definitions) by name, and structural types (arrays,
//! functions, constructions, generic parameters) by the addresses of their
//! components. Because every component is itself interned, structurally
//! equal types always map to the same handle.
//!
//! Members of a generic definition are declared once over its type
//! parameters and closed over each construction on first lookup.

use std::sync::Arc;

use bonsai_ir::Primitive;
use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::member::{BuiltinException, HostCall, HostFn, MethodDef, RuntimeMemberKind};
use super::{RuntimeMember, RuntimeType, RuntimeTypeKind};
use crate::value::{Object, Value};

pub(super) const NULLABLE_NAME: &str = "System.Nullable`1";
const LIST_NAME: &str = "System.Collections.Generic.List`1";

type Addrs = SmallVec<[usize; 4]>;

#[derive(Clone, PartialEq, Eq, Hash)]
enum InternKey {
    Array(usize, Option<u32>),
    Function(Addrs, usize),
    Constructed(usize, Addrs),
    GenericParameter(Arc<str>),
}

#[derive(Clone, PartialEq, Eq, Hash)]
enum ClosedKey {
    /// Member of a generic definition closed over a construction.
    OnType { member: usize, ty: usize },
    /// Generic method closed over method type arguments.
    Method { member: usize, args: Addrs },
}

#[derive(Default)]
struct RegistryData {
    named: FxHashMap<Arc<str>, RuntimeType>,
    interned: FxHashMap<InternKey, RuntimeType>,
    /// Declared members, keyed by declaring type address.
    members: FxHashMap<usize, Vec<RuntimeMember>>,
    closed: FxHashMap<ClosedKey, RuntimeMember>,
}

/// Thread-safe registry of runtime types and members.
///
/// Share it behind an `Arc`; all methods take `&self`.
pub struct TypeRegistry {
    data: RwLock<RegistryData>,
}

impl Default for TypeRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeRegistry {
    /// A registry with the built-in types: every [`Primitive`], the
    /// [`BuiltinException`] family, `Nullable`1` and `List`1`.
    pub fn new() -> Self {
        let registry = TypeRegistry {
            data: RwLock::new(RegistryData::default()),
        };
        {
            let mut data = registry.data.write();
            for p in Primitive::ALL {
                let ty = RuntimeType::new(RuntimeTypeKind::Primitive(p));
                data.named.insert(p.name().into(), ty);
            }
        }
        registry.install_exceptions();
        registry.install_nullable();
        registry.install_list();
        registry
    }

    pub fn shared() -> Arc<Self> {
        Arc::new(Self::new())
    }

    // Types

    /// Look up a named type (primitive, class, struct or generic definition).
    pub fn lookup(&self, name: &str) -> Option<RuntimeType> {
        self.data.read().named.get(name).cloned()
    }

    pub fn primitive(&self, p: Primitive) -> RuntimeType {
        match self.lookup(p.name()) {
            Some(ty) => ty,
            // Primitives are installed by `new` and never removed.
            None => self.define_named(p.name(), RuntimeTypeKind::Primitive(p)),
        }
    }

    pub fn bool(&self) -> RuntimeType {
        self.primitive(Primitive::Bool)
    }

    pub fn int32(&self) -> RuntimeType {
        self.primitive(Primitive::I32)
    }

    pub fn string(&self) -> RuntimeType {
        self.primitive(Primitive::String)
    }

    pub fn object(&self) -> RuntimeType {
        self.primitive(Primitive::Object)
    }

    pub fn void(&self) -> RuntimeType {
        self.primitive(Primitive::Void)
    }

    /// Define a class. Returns the existing type if the name is taken.
    pub fn define_class(&self, name: &str, base: Option<&RuntimeType>) -> RuntimeType {
        self.define_named(
            name,
            RuntimeTypeKind::Class {
                name: name.into(),
                base: base.cloned(),
            },
        )
    }

    /// Define a struct. Returns the existing type if the name is taken.
    pub fn define_struct(&self, name: &str) -> RuntimeType {
        self.define_named(name, RuntimeTypeKind::Struct { name: name.into() })
    }

    /// Define an open generic type over `parameters`.
    pub fn define_generic(&self, name: &str, parameters: &[&str], value_type: bool) -> RuntimeType {
        self.define_named(
            name,
            RuntimeTypeKind::GenericDefinition {
                name: name.into(),
                parameters: parameters.iter().map(|&p| Arc::from(p)).collect(),
                value_type,
            },
        )
    }

    fn define_named(&self, name: &str, kind: RuntimeTypeKind) -> RuntimeType {
        let mut data = self.data.write();
        data.named
            .entry(name.into())
            .or_insert_with(|| RuntimeType::new(kind))
            .clone()
    }

    /// Vector (`rank == None`) or multi-dimensional array of `element`.
    pub fn array_of(&self, element: &RuntimeType, rank: Option<u32>) -> RuntimeType {
        self.data.write().array_of(element, rank)
    }

    pub fn function_type(&self, parameters: &[RuntimeType], result: &RuntimeType) -> RuntimeType {
        self.data.write().function_type(parameters, result)
    }

    pub fn generic_parameter(&self, name: &str) -> RuntimeType {
        self.data.write().generic_parameter(name)
    }

    /// Close a generic definition. `None` if `definition` is not one, the
    /// argument count is wrong, or an argument is `void`.
    pub fn instantiate(
        &self,
        definition: &RuntimeType,
        arguments: &[RuntimeType],
    ) -> Option<RuntimeType> {
        self.data.write().instantiate(definition, arguments)
    }

    /// `Nullable<inner>`; `None` for reference types and nullables.
    pub fn nullable_of(&self, inner: &RuntimeType) -> Option<RuntimeType> {
        if !inner.is_value_type() || inner.is_nullable() || inner.is_void() {
            return None;
        }
        let definition = self.lookup(NULLABLE_NAME)?;
        self.instantiate(&definition, std::slice::from_ref(inner))
    }

    pub fn exception_type(&self, kind: BuiltinException) -> RuntimeType {
        self.define_class(kind.name(), None)
    }

    // Members

    fn add_member(&self, ty: &RuntimeType, name: &str, kind: RuntimeMemberKind) -> RuntimeMember {
        let member = RuntimeMember::new(ty.clone(), name, kind);
        self.data
            .write()
            .members
            .entry(ty.addr())
            .or_default()
            .push(member.clone());
        member
    }

    pub fn define_field(&self, ty: &RuntimeType, name: &str, field_type: RuntimeType) -> RuntimeMember {
        self.add_member(ty, name, RuntimeMemberKind::Field { field_type })
    }

    /// Property, or indexer when `index_parameters` is non-empty.
    ///
    /// A non-indexed property without accessors stores its value on the
    /// instance, like a field.
    pub fn define_property(
        &self,
        ty: &RuntimeType,
        name: &str,
        property_type: RuntimeType,
        index_parameters: Vec<RuntimeType>,
        getter: Option<HostFn>,
        setter: Option<HostFn>,
    ) -> RuntimeMember {
        self.add_member(
            ty,
            name,
            RuntimeMemberKind::Property {
                property_type,
                index_parameters: index_parameters.into(),
                getter,
                setter,
            },
        )
    }

    pub fn define_method(&self, ty: &RuntimeType, def: MethodDef) -> RuntimeMember {
        self.add_member(
            ty,
            &def.name,
            RuntimeMemberKind::Method {
                parameters: def.parameters.into(),
                return_type: def.return_type,
                is_static: def.is_static,
                generic_parameters: def.generic_parameters.iter().map(|p| Arc::from(&**p)).collect(),
                generic_arguments: Vec::<RuntimeType>::new().into(),
                definition: None,
                implementation: def.implementation,
            },
        )
    }

    pub fn define_constructor(
        &self,
        ty: &RuntimeType,
        parameters: Vec<RuntimeType>,
        implementation: Option<HostFn>,
    ) -> RuntimeMember {
        self.add_member(
            ty,
            ".ctor",
            RuntimeMemberKind::Constructor {
                parameters: parameters.into(),
                implementation,
            },
        )
    }

    /// Members declared directly on `ty`, closed over `ty` when it is a
    /// generic construction.
    pub fn members_of(&self, ty: &RuntimeType) -> Vec<RuntimeMember> {
        let mut data = self.data.write();
        data.members_of(ty)
    }

    /// Declared members of `ty` and its base classes, most derived first.
    fn members_with_bases(&self, ty: &RuntimeType) -> Vec<RuntimeMember> {
        let mut data = self.data.write();
        let mut out = data.members_of(ty);
        let mut current = ty.base_type().cloned();
        while let Some(base) = current {
            out.extend(data.members_of(&base));
            current = base.base_type().cloned();
        }
        out
    }

    pub fn find_field(&self, ty: &RuntimeType, name: &str) -> Option<RuntimeMember> {
        self.members_with_bases(ty)
            .into_iter()
            .find(|m| m.is_field() && m.name() == name)
    }

    pub fn find_property(
        &self,
        ty: &RuntimeType,
        name: &str,
        index_parameters: &[RuntimeType],
    ) -> Option<RuntimeMember> {
        self.members_with_bases(ty)
            .into_iter()
            .find(|m| m.is_property() && m.name() == name && m.parameter_types() == index_parameters)
    }

    /// Find a method by signature. For generic methods `parameters` is the
    /// open signature and `generic_arity` the number of method type
    /// parameters; the result is the open method.
    pub fn find_method(
        &self,
        ty: &RuntimeType,
        name: &str,
        parameters: &[RuntimeType],
        is_static: bool,
        generic_arity: usize,
    ) -> Option<RuntimeMember> {
        self.members_with_bases(ty).into_iter().find(|m| match m.kind() {
            RuntimeMemberKind::Method {
                parameters: ps,
                is_static: s,
                generic_parameters,
                ..
            } => {
                m.name() == name
                    && *s == is_static
                    && generic_parameters.len() == generic_arity
                    && &**ps == parameters
            }
            _ => false,
        })
    }

    pub fn find_constructor(&self, ty: &RuntimeType, parameters: &[RuntimeType]) -> Option<RuntimeMember> {
        self.members_of(ty)
            .into_iter()
            .find(|m| m.is_constructor() && m.parameter_types() == parameters)
    }

    /// Close an open generic method over `arguments`. Interned: closing
    /// the same method over the same arguments twice yields one handle.
    pub fn instantiate_method(
        &self,
        open: &RuntimeMember,
        arguments: &[RuntimeType],
    ) -> Option<RuntimeMember> {
        self.data.write().instantiate_method(open, arguments)
    }

    // Values

    /// Default value of `ty`: zero, `false`, `null`, or a fresh struct.
    pub fn default_value(&self, ty: &RuntimeType) -> Value {
        match ty.kind() {
            RuntimeTypeKind::Primitive(p) => match p {
                Primitive::Bool => Value::Bool(false),
                Primitive::Char => Value::Char('\0'),
                Primitive::F32 | Primitive::F64 => Value::Float(*p, 0.0),
                Primitive::String | Primitive::Object => Value::Null,
                Primitive::Void => Value::Void,
                _ => Value::Int(*p, 0),
            },
            RuntimeTypeKind::Struct { .. } => self.new_instance(ty),
            _ => Value::Null,
        }
    }

    /// A default-initialized instance of a class or struct.
    pub fn new_instance(&self, ty: &RuntimeType) -> Value {
        let fields = self
            .members_with_bases(ty)
            .into_iter()
            .filter_map(|m| match m.kind() {
                RuntimeMemberKind::Field { field_type } => {
                    Some((Arc::from(m.name()), self.default_value(field_type)))
                }
                RuntimeMemberKind::Property {
                    property_type,
                    index_parameters,
                    getter: None,
                    ..
                } if index_parameters.is_empty() => {
                    Some((Arc::from(m.name()), self.default_value(property_type)))
                }
                _ => None,
            })
            .collect();
        Value::Object(Arc::new(Object::new(ty.clone(), fields)))
    }

    pub fn new_exception(&self, kind: BuiltinException, message: impl Into<String>) -> Value {
        let value = self.new_instance(&self.exception_type(kind));
        if let Value::Object(o) = &value {
            o.set("Message", Value::string(message.into()));
        }
        value
    }

    // Built-ins

    fn install_exceptions(&self) {
        let string = self.string();
        let root = self.define_class(BuiltinException::Exception.name(), None);
        self.define_field(&root, "Message", string.clone());
        for kind in BuiltinException::ALL {
            let ty = if kind == BuiltinException::Exception {
                root.clone()
            } else {
                self.define_class(kind.name(), Some(&root))
            };
            let default_message = format!("Exception of type '{}' was thrown.", kind.name());
            let this_ty = ty.clone();
            self.define_constructor(
                &ty,
                Vec::new(),
                Some(Arc::new(move |call: HostCall<'_>| {
                    let value = call.registry.new_instance(&this_ty);
                    if let Value::Object(o) = &value {
                        o.set("Message", Value::string(default_message.as_str()));
                    }
                    Ok(value)
                })),
            );
            let this_ty = ty.clone();
            self.define_constructor(
                &ty,
                vec![string.clone()],
                Some(Arc::new(move |call: HostCall<'_>| {
                    let value = call.registry.new_instance(&this_ty);
                    if let Value::Object(o) = &value {
                        o.set("Message", call.arg(0).clone());
                    }
                    Ok(value)
                })),
            );
        }
    }

    fn install_nullable(&self) {
        let nullable = self.define_generic(NULLABLE_NAME, &["T"], true);
        let t = self.generic_parameter("T");
        self.define_property(
            &nullable,
            "HasValue",
            self.bool(),
            Vec::new(),
            Some(Arc::new(|call: HostCall<'_>| {
                Ok(Value::Bool(call.this.is_some_and(|v| !v.is_null())))
            })),
            None,
        );
        self.define_property(
            &nullable,
            "Value",
            t,
            Vec::new(),
            Some(Arc::new(|call: HostCall<'_>| match call.this {
                Some(v) if !v.is_null() => Ok(v.clone()),
                _ => Err(call.throw(
                    BuiltinException::InvalidOperation,
                    "Nullable object must have a value.",
                )),
            })),
            None,
        );
    }

    fn install_list(&self) {
        let list = self.define_generic(LIST_NAME, &["T"], false);
        let t = self.generic_parameter("T");
        let int32 = self.int32();

        self.define_constructor(&list, Vec::new(), None);
        self.define_method(
            &list,
            MethodDef::instance("Add", vec![t.clone()], self.void()).implemented_by(|call| {
                let list = this_object(&call)?;
                list.elements().push(call.arg(0).clone());
                Ok(Value::Void)
            }),
        );
        self.define_property(
            &list,
            "Count",
            int32.clone(),
            Vec::new(),
            Some(Arc::new(|call: HostCall<'_>| {
                let list = this_object(&call)?;
                let len = list.elements().len();
                Ok(Value::Int(Primitive::I32, i128::try_from(len).unwrap_or(i128::MAX)))
            })),
            None,
        );
        self.define_property(
            &list,
            "Item",
            t,
            vec![int32],
            Some(Arc::new(|call: HostCall<'_>| {
                let list = this_object(&call)?;
                let index = list_index(&call, list.elements().len())?;
                Ok(list.elements()[index].clone())
            })),
            Some(Arc::new(|call: HostCall<'_>| {
                let list = this_object(&call)?;
                let index = list_index(&call, list.elements().len())?;
                list.elements()[index] = call.arg(1).clone();
                Ok(Value::Void)
            })),
        );
    }
}

fn this_object<'a>(call: &HostCall<'a>) -> Result<&'a Arc<Object>, Value> {
    call.this
        .and_then(Value::as_object)
        .ok_or_else(|| call.throw(BuiltinException::NullReference, "Object reference not set to an instance of an object."))
}

fn list_index(call: &HostCall<'_>, len: usize) -> Result<usize, Value> {
    call.arg(0)
        .as_int()
        .and_then(|i| usize::try_from(i).ok())
        .filter(|&i| i < len)
        .ok_or_else(|| {
            call.throw(
                BuiltinException::IndexOutOfRange,
                "Index was out of range. Must be non-negative and less than the size of the collection.",
            )
        })
}

impl RegistryData {
    fn intern(&mut self, key: InternKey, make: impl FnOnce() -> RuntimeTypeKind) -> RuntimeType {
        self.interned
            .entry(key)
            .or_insert_with(|| RuntimeType::new(make()))
            .clone()
    }

    fn array_of(&mut self, element: &RuntimeType, rank: Option<u32>) -> RuntimeType {
        self.intern(InternKey::Array(element.addr(), rank), || {
            RuntimeTypeKind::Array {
                element: element.clone(),
                rank,
            }
        })
    }

    fn function_type(&mut self, parameters: &[RuntimeType], result: &RuntimeType) -> RuntimeType {
        let key = InternKey::Function(parameters.iter().map(RuntimeType::addr).collect(), result.addr());
        self.intern(key, || RuntimeTypeKind::Function {
            parameters: parameters.into(),
            result: result.clone(),
        })
    }

    fn generic_parameter(&mut self, name: &str) -> RuntimeType {
        self.intern(InternKey::GenericParameter(name.into()), || {
            RuntimeTypeKind::GenericParameter { name: name.into() }
        })
    }

    fn instantiate(&mut self, definition: &RuntimeType, arguments: &[RuntimeType]) -> Option<RuntimeType> {
        let RuntimeTypeKind::GenericDefinition { parameters, .. } = definition.kind() else {
            return None;
        };
        if parameters.len() != arguments.len() || arguments.iter().any(RuntimeType::is_void) {
            return None;
        }
        let key = InternKey::Constructed(
            definition.addr(),
            arguments.iter().map(RuntimeType::addr).collect(),
        );
        Some(self.intern(key, || RuntimeTypeKind::Constructed {
            definition: definition.clone(),
            arguments: arguments.into(),
        }))
    }

    /// Replace generic parameters named in `names` by `arguments`.
    fn substitute(&mut self, ty: &RuntimeType, names: &[Arc<str>], arguments: &[RuntimeType]) -> RuntimeType {
        if !ty.flags().contains(super::TypeFlags::HAS_GENERIC_PARAMETER) {
            return ty.clone();
        }
        match ty.kind() {
            RuntimeTypeKind::GenericParameter { name } => names
                .iter()
                .position(|n| n == name)
                .and_then(|i| arguments.get(i))
                .cloned()
                .unwrap_or_else(|| ty.clone()),
            RuntimeTypeKind::Array { element, rank } => {
                let element = self.substitute(element, names, arguments);
                self.array_of(&element, *rank)
            }
            RuntimeTypeKind::Function { parameters, result } => {
                let parameters: Vec<_> = parameters
                    .iter()
                    .map(|p| self.substitute(p, names, arguments))
                    .collect();
                let result = self.substitute(result, names, arguments);
                self.function_type(&parameters, &result)
            }
            RuntimeTypeKind::Constructed {
                definition,
                arguments: args,
            } => {
                let args: Vec<_> = args
                    .iter()
                    .map(|a| self.substitute(a, names, arguments))
                    .collect();
                self.instantiate(definition, &args).unwrap_or_else(|| ty.clone())
            }
            _ => ty.clone(),
        }
    }

    fn substitute_all(
        &mut self,
        types: &[RuntimeType],
        names: &[Arc<str>],
        arguments: &[RuntimeType],
    ) -> Arc<[RuntimeType]> {
        types
            .iter()
            .map(|t| self.substitute(t, names, arguments))
            .collect()
    }

    fn members_of(&mut self, ty: &RuntimeType) -> Vec<RuntimeMember> {
        let Some((definition, arguments)) = ty.generic_parts() else {
            return self.members.get(&ty.addr()).cloned().unwrap_or_default();
        };
        let RuntimeTypeKind::GenericDefinition { parameters: names, .. } = definition.kind() else {
            return Vec::new();
        };
        let open = self.members.get(&definition.addr()).cloned().unwrap_or_default();
        open.iter()
            .map(|m| self.close_over_type(m, ty, names, arguments))
            .collect()
    }

    fn close_over_type(
        &mut self,
        open: &RuntimeMember,
        ty: &RuntimeType,
        names: &[Arc<str>],
        arguments: &[RuntimeType],
    ) -> RuntimeMember {
        let key = ClosedKey::OnType {
            member: open.addr(),
            ty: ty.addr(),
        };
        if let Some(m) = self.closed.get(&key) {
            return m.clone();
        }
        let kind = match open.kind() {
            RuntimeMemberKind::Field { field_type } => RuntimeMemberKind::Field {
                field_type: self.substitute(field_type, names, arguments),
            },
            RuntimeMemberKind::Property {
                property_type,
                index_parameters,
                getter,
                setter,
            } => RuntimeMemberKind::Property {
                property_type: self.substitute(property_type, names, arguments),
                index_parameters: self.substitute_all(index_parameters, names, arguments),
                getter: getter.clone(),
                setter: setter.clone(),
            },
            RuntimeMemberKind::Method {
                parameters,
                return_type,
                is_static,
                generic_parameters,
                implementation,
                ..
            } => RuntimeMemberKind::Method {
                parameters: self.substitute_all(parameters, names, arguments),
                return_type: self.substitute(return_type, names, arguments),
                is_static: *is_static,
                generic_parameters: generic_parameters.clone(),
                generic_arguments: Vec::<RuntimeType>::new().into(),
                definition: None,
                implementation: implementation.clone(),
            },
            RuntimeMemberKind::Constructor {
                parameters,
                implementation,
            } => RuntimeMemberKind::Constructor {
                parameters: self.substitute_all(parameters, names, arguments),
                implementation: implementation.clone(),
            },
        };
        let closed = RuntimeMember::new(ty.clone(), open.name(), kind);
        self.closed.insert(key, closed.clone());
        closed
    }

    fn instantiate_method(
        &mut self,
        open: &RuntimeMember,
        arguments: &[RuntimeType],
    ) -> Option<RuntimeMember> {
        let RuntimeMemberKind::Method {
            parameters,
            return_type,
            is_static,
            generic_parameters,
            generic_arguments,
            implementation,
            ..
        } = open.kind()
        else {
            return None;
        };
        if !generic_arguments.is_empty()
            || generic_parameters.len() != arguments.len()
            || arguments.iter().any(RuntimeType::is_void)
        {
            return None;
        }
        let key = ClosedKey::Method {
            member: open.addr(),
            args: arguments.iter().map(RuntimeType::addr).collect(),
        };
        if let Some(m) = self.closed.get(&key) {
            return Some(m.clone());
        }
        let kind = RuntimeMemberKind::Method {
            parameters: self.substitute_all(parameters, generic_parameters, arguments),
            return_type: self.substitute(return_type, generic_parameters, arguments),
            is_static: *is_static,
            generic_parameters: generic_parameters.clone(),
            generic_arguments: arguments.into(),
            definition: Some(open.clone()),
            implementation: implementation.clone(),
        };
        let closed = RuntimeMember::new(open.declaring_type().clone(), open.name(), kind);
        self.closed.insert(key, closed.clone());
        Some(closed)
    }
}
