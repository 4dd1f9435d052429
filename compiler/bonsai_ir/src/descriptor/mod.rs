//! Serialization-safe stand-ins for runtime types, members and values.
//!
//! Slim trees never hold runtime handles. Where a native tree would point at
//! a type or a method, a slim tree holds a descriptor that can be compared,
//! hashed, shipped across processes, and later resolved against whatever
//! runtime the tree lands in.
//!
//! - [`TypeSlim`]: type descriptors (simple, array, generic, function, ...)
//! - [`MemberSlim`]: field, property, method and constructor descriptors
//! - [`ObjectSlim`]: boxed constants whose concrete representation is chosen
//!   only once the target type is known ([`ObjectSlim::reduce`])

mod constant;
mod member;
mod ty;

pub use constant::{Literal, ObjectSlim, RawValue, ReduceTarget};
pub use member::{MemberSlim, MemberSlimKind};
pub use ty::{Primitive, TypeSlim, TypeSlimKind};

#[cfg(test)]
mod tests;
