//! Memoizing resolution of descriptors to runtime handles.
//!
//! A [`TypeSpace`] sits between the converters and a shared
//! [`TypeRegistry`]. Every descriptor it resolves is cached, so a
//! descriptor that occurs a thousand times in a tree costs one registry
//! lookup. Structural descriptors (arrays, constructions, functions)
//! resolve their components through the same cache.
//!
//! The space also remembers which descriptor produced each handle, so the
//! way back to slim form reproduces the caller's spelling (including
//! seeded aliases) instead of the registry's canonical names.
//!
//! A space is single-writer: share the registry, not the space.

use std::sync::Arc;

use bonsai_ir::{MemberSlim, MemberSlimKind, TypeSlim, TypeSlimKind};
use bonsai_native::{RuntimeMember, RuntimeType, RuntimeTypeKind, TypeRegistry};
use rustc_hash::FxHashMap;

use crate::error::ResolutionError;

pub struct TypeSpace {
    registry: Arc<TypeRegistry>,
    types: FxHashMap<TypeSlim, RuntimeType>,
    members: FxHashMap<MemberSlim, RuntimeMember>,
    type_descriptors: FxHashMap<RuntimeType, TypeSlim>,
    member_descriptors: FxHashMap<RuntimeMember, MemberSlim>,
    resolutions: usize,
}

impl TypeSpace {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        TypeSpace {
            registry,
            types: FxHashMap::default(),
            members: FxHashMap::default(),
            type_descriptors: FxHashMap::default(),
            member_descriptors: FxHashMap::default(),
            resolutions: 0,
        }
    }

    #[inline]
    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Number of descriptors resolved against the registry so far. Cache
    /// hits and seeded entries do not count.
    #[inline]
    pub fn resolution_count(&self) -> usize {
        self.resolutions
    }

    /// Bind `descriptor` to `ty` up front, overriding registry lookup.
    pub fn seed_type(&mut self, descriptor: TypeSlim, ty: RuntimeType) {
        self.type_descriptors
            .entry(ty.clone())
            .or_insert_with(|| descriptor.clone());
        self.types.insert(descriptor, ty);
    }

    /// Bind `descriptor` to `member` up front, overriding registry lookup.
    pub fn seed_member(&mut self, descriptor: MemberSlim, member: RuntimeMember) {
        self.member_descriptors
            .entry(member.clone())
            .or_insert_with(|| descriptor.clone());
        self.members.insert(descriptor, member);
    }

    /// The descriptor `ty` was resolved from, or its canonical descriptor.
    pub fn descriptor_of(&self, ty: &RuntimeType) -> TypeSlim {
        match self.type_descriptors.get(ty) {
            Some(descriptor) => descriptor.clone(),
            None => ty.to_descriptor(),
        }
    }

    /// The descriptor `member` was resolved from, or its canonical
    /// descriptor.
    pub fn member_descriptor_of(&self, member: &RuntimeMember) -> MemberSlim {
        match self.member_descriptors.get(member) {
            Some(descriptor) => descriptor.clone(),
            None => member.to_descriptor(),
        }
    }

    pub fn resolve_type(&mut self, descriptor: &TypeSlim) -> Result<RuntimeType, ResolutionError> {
        if let Some(ty) = self.types.get(descriptor) {
            tracing::trace!(%descriptor, "type space hit");
            return Ok(ty.clone());
        }
        let ty = self.lookup_type(descriptor)?;
        tracing::trace!(%descriptor, resolved = %ty, "type space miss");
        self.resolutions += 1;
        self.seed_type(descriptor.clone(), ty.clone());
        Ok(ty)
    }

    pub fn resolve_types(&mut self, descriptors: &[TypeSlim]) -> Result<Vec<RuntimeType>, ResolutionError> {
        descriptors.iter().map(|d| self.resolve_type(d)).collect()
    }

    fn lookup_type(&mut self, descriptor: &TypeSlim) -> Result<RuntimeType, ResolutionError> {
        let registry = Arc::clone(&self.registry);
        let unknown = || ResolutionError::UnknownType {
            ty: descriptor.clone(),
        };
        match descriptor.kind() {
            TypeSlimKind::Simple { name } => registry.lookup(name).ok_or_else(unknown),
            TypeSlimKind::GenericDefinition { name, arity } => {
                let ty = registry.lookup(name).ok_or_else(unknown)?;
                let arity_matches = matches!(
                    ty.kind(),
                    RuntimeTypeKind::GenericDefinition { parameters, .. }
                        if u32::try_from(parameters.len()) == Ok(*arity)
                );
                if arity_matches {
                    Ok(ty)
                } else {
                    Err(unknown())
                }
            }
            TypeSlimKind::Generic {
                definition,
                arguments,
            } => {
                let definition = self.resolve_type(definition)?;
                let arguments = self.resolve_types(arguments)?;
                registry
                    .instantiate(&definition, &arguments)
                    .ok_or_else(|| ResolutionError::BadInstantiation {
                        ty: descriptor.clone(),
                    })
            }
            TypeSlimKind::Array { element, rank } => {
                let element = self.resolve_type(element)?;
                if element.is_void() {
                    return Err(unknown());
                }
                Ok(registry.array_of(&element, *rank))
            }
            TypeSlimKind::GenericParameter { name } => Ok(registry.generic_parameter(name)),
            TypeSlimKind::Function { parameters, result } => {
                let parameters = self.resolve_types(parameters)?;
                let result = self.resolve_type(result)?;
                Ok(registry.function_type(&parameters, &result))
            }
        }
    }

    pub fn resolve_member(&mut self, descriptor: &MemberSlim) -> Result<RuntimeMember, ResolutionError> {
        if let Some(member) = self.members.get(descriptor) {
            tracing::trace!(%descriptor, "type space hit");
            return Ok(member.clone());
        }
        let declaring_type = self.resolve_type(descriptor.declaring_type())?;
        let registry = Arc::clone(&self.registry);
        let found = match descriptor.kind() {
            MemberSlimKind::Field { name, .. } => registry.find_field(&declaring_type, name),
            MemberSlimKind::Property {
                name,
                index_parameters,
                ..
            } => {
                let index_parameters = self.resolve_types(index_parameters)?;
                registry.find_property(&declaring_type, name, &index_parameters)
            }
            MemberSlimKind::Method {
                name,
                parameters,
                is_static,
                generic_parameters,
                generic_arguments,
                ..
            } => {
                let parameters = self.resolve_types(parameters)?;
                let open = registry.find_method(
                    &declaring_type,
                    name,
                    &parameters,
                    *is_static,
                    generic_parameters.len(),
                );
                match open {
                    Some(open) if !generic_arguments.is_empty() => {
                        let arguments = self.resolve_types(generic_arguments)?;
                        let closed = registry.instantiate_method(&open, &arguments).ok_or_else(|| {
                            ResolutionError::BadMethodInstantiation {
                                member: descriptor.clone(),
                            }
                        })?;
                        Some(closed)
                    }
                    other => other,
                }
            }
            MemberSlimKind::Constructor { parameters, .. } => {
                let parameters = self.resolve_types(parameters)?;
                registry.find_constructor(&declaring_type, &parameters)
            }
        };
        let Some(member) = found else {
            return Err(ResolutionError::UnknownMember {
                member: descriptor.clone(),
                declaring_type,
            });
        };
        tracing::trace!(%descriptor, resolved = %member, "type space miss");
        self.resolutions += 1;
        self.seed_member(descriptor.clone(), member.clone());
        Ok(member)
    }
}
