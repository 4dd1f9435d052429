//! Error types for conversion.

use bonsai_ir::{ConstructionError, MemberSlim, NodeKind, ReductionError, TypeSlim};
use bonsai_native::{FactoryError, RuntimeType};

/// A descriptor has no counterpart in the active type space.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ResolutionError {
    /// No type of that name is registered.
    #[error("type `{ty}` is not known to the registry")]
    UnknownType { ty: TypeSlim },

    /// The definition exists but cannot be closed over these arguments.
    #[error("type `{ty}` cannot be instantiated over its arguments")]
    BadInstantiation { ty: TypeSlim },

    /// The declaring type resolved, the member did not.
    #[error("member `{member}` is not declared on {declaring_type}")]
    UnknownMember {
        member: MemberSlim,
        declaring_type: RuntimeType,
    },

    /// The open method resolved but rejects these generic arguments.
    #[error("generic method `{member}` cannot be closed over its arguments")]
    BadMethodInstantiation { member: MemberSlim },
}

/// Failure of a conversion in either direction. Never retried.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum ConvertError {
    #[error(transparent)]
    Resolution(#[from] ResolutionError),

    #[error(transparent)]
    Reduction(#[from] ReductionError),

    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// The factory (or the target algebra) has no way to express the node.
    #[error("{kind} nodes are not supported: {detail}")]
    NotSupported { kind: NodeKind, detail: String },

    /// A converted child came back as the wrong kind of node.
    #[error("conversion invariant violated: {0}")]
    Invariant(String),
}

impl From<FactoryError> for ConvertError {
    fn from(err: FactoryError) -> Self {
        match err {
            FactoryError::Construction(e) => ConvertError::Construction(e),
            FactoryError::NotSupported { kind } => ConvertError::NotSupported {
                kind,
                detail: "refused by the node factory".to_string(),
            },
        }
    }
}
