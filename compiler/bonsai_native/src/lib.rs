//! Bonsai native - the host side of the pipeline.
//!
//! Slim trees name types and members by descriptor. This crate provides
//! what those descriptors resolve to, and something to run the result on:
//! - [`TypeRegistry`]: the host's reflection universe, handing out interned
//!   [`RuntimeType`] and [`RuntimeMember`] handles
//! - [`NativeExpr`]: executable nodes carrying resolved types
//! - [`NodeFactory`]: validating constructors for native nodes, with a
//!   [`RestrictedFactory`] that refuses configured node kinds
//! - [`Interpreter`]: a tree-walking evaluator for native trees
//!
//! # Identity
//!
//! Runtime types and members are interned: two handles are equal exactly
//! when they are the same allocation. Parameters and labels of native trees
//! are identity-bearing as well, mirroring their slim counterparts.

mod error;
pub mod expr;
pub mod factory;
pub mod interpreter;
pub mod types;
mod value;

pub use error::{EvalError, FactoryError};
pub use expr::{
    NativeBinaryOp, NativeBinding, NativeCatch, NativeElementInit, NativeExpr, NativeKind,
    NativeLabel, NativeSwitchCase,
};
pub use factory::{DefaultFactory, NodeFactory, RestrictedFactory};
pub use interpreter::Interpreter;
pub use types::{
    BuiltinException, HostCall, HostFn, MethodDef, RuntimeMember, RuntimeMemberKind, RuntimeType,
    RuntimeTypeKind, TypeFlags, TypeRegistry,
};
pub use value::{ArrayValue, Closure, Object, Value};

#[cfg(target_pointer_width = "64")]
mod size_asserts {
    use super::{NativeExpr, RuntimeMember, RuntimeType};
    bonsai_ir::static_assert_size!(NativeExpr, 8);
    bonsai_ir::static_assert_size!(RuntimeType, 8);
    bonsai_ir::static_assert_size!(RuntimeMember, 8);
}
