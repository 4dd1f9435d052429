//! Error types for native node construction and evaluation.

use bonsai_ir::{ConstructionError, NodeKind};

use crate::types::RuntimeMember;
use crate::value::Value;

/// Failure of a [`NodeFactory`](crate::NodeFactory) method.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum FactoryError {
    /// The children do not form a valid node.
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// The factory refuses to build this kind at all.
    #[error("{kind} nodes are not supported by this factory")]
    NotSupported { kind: NodeKind },
}

impl FactoryError {
    pub(crate) fn invalid(kind: NodeKind, message: impl Into<String>) -> Self {
        FactoryError::Construction(ConstructionError::new(kind, message))
    }
}

/// Evaluation failure that the program itself cannot catch.
#[derive(Debug, thiserror::Error)]
pub enum EvalError {
    /// An exception propagated out of the evaluated tree.
    #[error("unhandled exception: {exception}")]
    Unhandled { exception: Value },

    /// A parameter was read outside of any scope binding it.
    #[error("variable `{name}` is not in scope")]
    UnboundVariable { name: String },

    /// A jump reached no enclosing block, loop or label for its target.
    #[error("jump to label `{label}` leaves its scope")]
    UnboundLabel { label: String },

    /// A host member was called that has no implementation.
    #[error("{member} has no host implementation")]
    MissingImplementation { member: RuntimeMember },

    /// The tree asks for something its nodes cannot do at runtime.
    #[error("invalid program: {0}")]
    InvalidProgram(String),
}
