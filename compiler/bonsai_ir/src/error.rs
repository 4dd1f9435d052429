//! Error types shared by node construction and rewriting.

use crate::slim::NodeKind;

/// A node was asked to be built from an invalid combination of children.
///
/// Raised eagerly by constructors; a node is never partially constructed.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("invalid {kind} node: {message}")]
pub struct ConstructionError {
    /// Kind of the node being constructed.
    pub kind: NodeKind,
    /// What was wrong with the supplied children.
    pub message: String,
}

impl ConstructionError {
    pub fn new(kind: NodeKind, message: impl Into<String>) -> Self {
        ConstructionError {
            kind,
            message: message.into(),
        }
    }
}

/// A boxed constant could not be materialized as the requested type.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
#[error("cannot reduce constant `{value}` to {target}: {reason}")]
pub struct ReductionError {
    /// Rendering of the raw stored value.
    pub value: String,
    /// Rendering of the requested target.
    pub target: String,
    /// Why the value does not fit.
    pub reason: &'static str,
}

/// Failure of a rewrite pass.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum SlimError {
    /// Rebuilding a node produced an invalid shape.
    #[error(transparent)]
    Construction(#[from] ConstructionError),

    /// A convert-and-cast visit produced the wrong kind of node.
    ///
    /// Always a bug in the rewriter; `call_site` names the visit that
    /// requested the conversion.
    #[error("{call_site}: rewriter must produce a {expected} node, got {found}")]
    InvariantViolation {
        call_site: &'static str,
        expected: NodeKind,
        found: NodeKind,
    },

    /// The rewriter declares it has no handler for this kind.
    #[error("{kind} nodes are not supported: {detail}")]
    NotSupported { kind: NodeKind, detail: String },
}
