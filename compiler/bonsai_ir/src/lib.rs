//! Bonsai IR - portable ("slim") expression trees.
//!
//! This crate contains the host-independent half of the Bonsai pipeline:
//! - Descriptors standing in for runtime types and members ([`TypeSlim`],
//!   [`MemberSlim`]) and deferred constants ([`ObjectSlim`])
//! - The closed slim node model ([`Expr`] and its payload structs)
//! - The rewriting visitor ([`visitor::Rewriter`]) with copy-on-write
//!   sequence handling
//! - Structural equality modulo parameter/label identity ([`SlimEquality`])
//!
//! # Design Philosophy
//!
//! - **Immutable nodes**: every payload sits behind an `Arc`; a rewrite
//!   either hands back the same `Arc` or builds a new node, never both.
//! - **Identity where it matters**: parameters and label targets are shared
//!   handles, compared by address. Everything else compares structurally.
//! - **Small call sites**: calls, constructor calls and invocations with up to
//!   five arguments store them inline (see [`Arguments`]).
//!
//! Converting a slim tree into something executable is the job of
//! `bonsai_convert`; this crate never touches runtime handles.

/// Compile-time assertion that a type has a specific size.
///
/// Used to prevent accidental size regressions in frequently-allocated types.
#[macro_export]
macro_rules! static_assert_size {
    ($ty:ty, $size:expr) => {
        const _: [(); $size] = [(); ::std::mem::size_of::<$ty>()];
    };
}

pub mod descriptor;
mod equality;
mod error;
pub mod slim;
pub mod stack;
pub mod visitor;

pub use descriptor::{
    Literal, MemberSlim, MemberSlimKind, ObjectSlim, Primitive, RawValue, ReduceTarget, TypeSlim,
    TypeSlimKind,
};
pub use equality::SlimEquality;
pub use error::{ConstructionError, ReductionError, SlimError};
pub use slim::{
    Arguments, BinaryOp, BinarySlim, BlockSlim, CatchBlock, ConditionalSlim, ConstantSlim,
    DefaultSlim, ElementInit, Expr, ExprList, FirstArgument, GotoKind, GotoSlim, IndexSlim,
    InvocationSlim, LabelRef, LabelSlim, LabelTarget, LambdaSlim, ListInitSlim, LoopSlim,
    MemberAccessSlim, MemberBinding, MemberInitSlim, MethodCallSlim, NewArrayBoundsSlim,
    NewArrayInitSlim, NewSlim, NodeKind, ParameterRef, ParameterSlim, SwitchCase, SwitchSlim,
    TrySlim, TypeBinaryOp, TypeBinarySlim, UnaryOp, UnarySlim,
};
pub use visitor::Rewriter;

// Size assertions to prevent accidental regressions in frequently-allocated types.
// `Expr` is a tag plus one `Arc`; it appears in every child slot of every node.
#[cfg(target_pointer_width = "64")]
mod size_asserts {
    use super::{Arguments, Expr, FirstArgument, NodeKind};
    crate::static_assert_size!(Expr, 16);
    crate::static_assert_size!(NodeKind, 1);
    // Argument 0 plus its reification cell.
    crate::static_assert_size!(FirstArgument, 40);
    // Five inline arguments; the enum tag may or may not fit in a niche.
    const _: () = assert!(std::mem::size_of::<Arguments>() <= 112);
}
