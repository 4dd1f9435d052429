//! Slim node model.
//!
//! [`Expr`] is a closed sum over every node kind. Each variant holds an
//! `Arc` to an immutable payload struct (`BinarySlim`, `LambdaSlim`, ...);
//! cloning an `Expr` clones one reference, and "the same node" means the same
//! allocation ([`Expr::ptr_eq`]).
//!
//! # Sharing
//!
//! Payloads are never mutated after construction. Every payload offers an
//! `update` that returns the receiver itself when all supplied children are
//! reference-identical to the current ones, and a new payload otherwise.
//! The rewriting visitor builds on that to share unchanged subtrees.
//!
//! # Identity-bearing leaves
//!
//! [`ParameterSlim`] and [`LabelTarget`] are always handled through `Arc`
//! handles ([`ParameterRef`], [`LabelRef`]). Every occurrence of a variable
//! holds a clone of the one handle that declares it; identity is the handle
//! address, never the name.
//!
//! # Declared types
//!
//! Kinds whose type can be derived from their children store `None` in
//! their optional type slot unless a different type was asked for.
//! [`Expr::declared_type`] reports the stored value, not the derived one.

mod arguments;
mod bindings;
mod calls;
mod control;
mod factory;
mod nodes;
mod operators;
mod typing;

use std::fmt;
use std::sync::Arc;

pub use arguments::{Arguments, ArgumentsIter, FirstArgument};
pub use bindings::{ElementInit, MemberBinding};
pub use calls::{InvocationSlim, MethodCallSlim, NewSlim};
pub use control::{
    BlockSlim, CatchBlock, GotoSlim, LabelRef, LabelSlim, LabelTarget, LoopSlim, SwitchCase,
    SwitchSlim, TrySlim,
};
pub use nodes::{
    BinarySlim, ConditionalSlim, ConstantSlim, DefaultSlim, IndexSlim, LambdaSlim, ListInitSlim,
    MemberAccessSlim, MemberInitSlim, NewArrayBoundsSlim, NewArrayInitSlim, ParameterRef,
    ParameterSlim, TypeBinarySlim, UnarySlim,
};
pub use operators::{BinaryOp, GotoKind, TypeBinaryOp, UnaryOp};

use crate::descriptor::TypeSlim;

/// Shared, immutable list of child expressions.
pub type ExprList = Arc<[Expr]>;

/// Tag of a node kind.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NodeKind {
    Binary,
    Unary,
    Constant,
    Default,
    Parameter,
    Lambda,
    Invocation,
    MethodCall,
    New,
    NewArrayBounds,
    NewArrayInit,
    MemberAccess,
    MemberInit,
    ListInit,
    Conditional,
    TypeBinary,
    Block,
    Try,
    Switch,
    Label,
    Loop,
    Goto,
    Index,
}

impl NodeKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            NodeKind::Binary => "Binary",
            NodeKind::Unary => "Unary",
            NodeKind::Constant => "Constant",
            NodeKind::Default => "Default",
            NodeKind::Parameter => "Parameter",
            NodeKind::Lambda => "Lambda",
            NodeKind::Invocation => "Invocation",
            NodeKind::MethodCall => "MethodCall",
            NodeKind::New => "New",
            NodeKind::NewArrayBounds => "NewArrayBounds",
            NodeKind::NewArrayInit => "NewArrayInit",
            NodeKind::MemberAccess => "MemberAccess",
            NodeKind::MemberInit => "MemberInit",
            NodeKind::ListInit => "ListInit",
            NodeKind::Conditional => "Conditional",
            NodeKind::TypeBinary => "TypeBinary",
            NodeKind::Block => "Block",
            NodeKind::Try => "Try",
            NodeKind::Switch => "Switch",
            NodeKind::Label => "Label",
            NodeKind::Loop => "Loop",
            NodeKind::Goto => "Goto",
            NodeKind::Index => "Index",
        }
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A slim expression node.
#[derive(Clone)]
pub enum Expr {
    Binary(Arc<BinarySlim>),
    Unary(Arc<UnarySlim>),
    Constant(Arc<ConstantSlim>),
    Default(Arc<DefaultSlim>),
    Parameter(ParameterRef),
    Lambda(Arc<LambdaSlim>),
    Invocation(Arc<InvocationSlim>),
    MethodCall(Arc<MethodCallSlim>),
    New(Arc<NewSlim>),
    NewArrayBounds(Arc<NewArrayBoundsSlim>),
    NewArrayInit(Arc<NewArrayInitSlim>),
    MemberAccess(Arc<MemberAccessSlim>),
    MemberInit(Arc<MemberInitSlim>),
    ListInit(Arc<ListInitSlim>),
    Conditional(Arc<ConditionalSlim>),
    TypeBinary(Arc<TypeBinarySlim>),
    Block(Arc<BlockSlim>),
    Try(Arc<TrySlim>),
    Switch(Arc<SwitchSlim>),
    Label(Arc<LabelSlim>),
    Loop(Arc<LoopSlim>),
    Goto(Arc<GotoSlim>),
    Index(Arc<IndexSlim>),
}

/// Apply `$body` to the payload `Arc` of whichever variant `$expr` is.
macro_rules! with_payload {
    ($expr:expr, $p:ident => $body:expr) => {
        match $expr {
            Expr::Binary($p) => $body,
            Expr::Unary($p) => $body,
            Expr::Constant($p) => $body,
            Expr::Default($p) => $body,
            Expr::Parameter($p) => $body,
            Expr::Lambda($p) => $body,
            Expr::Invocation($p) => $body,
            Expr::MethodCall($p) => $body,
            Expr::New($p) => $body,
            Expr::NewArrayBounds($p) => $body,
            Expr::NewArrayInit($p) => $body,
            Expr::MemberAccess($p) => $body,
            Expr::MemberInit($p) => $body,
            Expr::ListInit($p) => $body,
            Expr::Conditional($p) => $body,
            Expr::TypeBinary($p) => $body,
            Expr::Block($p) => $body,
            Expr::Try($p) => $body,
            Expr::Switch($p) => $body,
            Expr::Label($p) => $body,
            Expr::Loop($p) => $body,
            Expr::Goto($p) => $body,
            Expr::Index($p) => $body,
        }
    };
}

impl Expr {
    pub fn kind(&self) -> NodeKind {
        match self {
            Expr::Binary(_) => NodeKind::Binary,
            Expr::Unary(_) => NodeKind::Unary,
            Expr::Constant(_) => NodeKind::Constant,
            Expr::Default(_) => NodeKind::Default,
            Expr::Parameter(_) => NodeKind::Parameter,
            Expr::Lambda(_) => NodeKind::Lambda,
            Expr::Invocation(_) => NodeKind::Invocation,
            Expr::MethodCall(_) => NodeKind::MethodCall,
            Expr::New(_) => NodeKind::New,
            Expr::NewArrayBounds(_) => NodeKind::NewArrayBounds,
            Expr::NewArrayInit(_) => NodeKind::NewArrayInit,
            Expr::MemberAccess(_) => NodeKind::MemberAccess,
            Expr::MemberInit(_) => NodeKind::MemberInit,
            Expr::ListInit(_) => NodeKind::ListInit,
            Expr::Conditional(_) => NodeKind::Conditional,
            Expr::TypeBinary(_) => NodeKind::TypeBinary,
            Expr::Block(_) => NodeKind::Block,
            Expr::Try(_) => NodeKind::Try,
            Expr::Switch(_) => NodeKind::Switch,
            Expr::Label(_) => NodeKind::Label,
            Expr::Loop(_) => NodeKind::Loop,
            Expr::Goto(_) => NodeKind::Goto,
            Expr::Index(_) => NodeKind::Index,
        }
    }

    /// Address of the payload; the identity of this node.
    #[inline]
    pub fn as_ptr(&self) -> *const () {
        with_payload!(self, p => Arc::as_ptr(p).cast::<()>())
    }

    /// Whether `a` and `b` are the same node instance.
    #[inline]
    pub fn ptr_eq(&self, other: &Expr) -> bool {
        self.kind() == other.kind() && self.as_ptr() == other.as_ptr()
    }

    /// Type stored on the node, if any.
    ///
    /// `None` means "derive it from the children" for kinds with an optional
    /// type slot, and "always derived" for kinds without one.
    pub fn declared_type(&self) -> Option<&TypeSlim> {
        match self {
            Expr::Unary(n) => n.ty.as_ref(),
            Expr::Constant(n) => Some(&n.ty),
            Expr::Default(n) => Some(&n.ty),
            Expr::Parameter(n) => Some(&n.ty),
            Expr::Lambda(n) => n.ty.as_ref(),
            Expr::Conditional(n) => n.ty.as_ref(),
            Expr::Block(n) => n.ty.as_ref(),
            Expr::Try(n) => n.ty.as_ref(),
            Expr::Switch(n) => n.ty.as_ref(),
            Expr::Goto(n) => n.ty.as_ref(),
            Expr::Binary(_)
            | Expr::Invocation(_)
            | Expr::MethodCall(_)
            | Expr::New(_)
            | Expr::NewArrayBounds(_)
            | Expr::NewArrayInit(_)
            | Expr::MemberAccess(_)
            | Expr::MemberInit(_)
            | Expr::ListInit(_)
            | Expr::TypeBinary(_)
            | Expr::Label(_)
            | Expr::Loop(_)
            | Expr::Index(_) => None,
        }
    }

    pub fn as_parameter(&self) -> Option<&ParameterRef> {
        match self {
            Expr::Parameter(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_lambda(&self) -> Option<&Arc<LambdaSlim>> {
        match self {
            Expr::Lambda(l) => Some(l),
            _ => None,
        }
    }

    pub fn as_new(&self) -> Option<&Arc<NewSlim>> {
        match self {
            Expr::New(n) => Some(n),
            _ => None,
        }
    }
}

impl From<ParameterRef> for Expr {
    fn from(p: ParameterRef) -> Self {
        Expr::Parameter(p)
    }
}

impl fmt::Debug for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        with_payload!(self, p => fmt::Debug::fmt(&**p, f))
    }
}

/// Reference identity for values stored in child lists.
///
/// The copy-on-write list algorithm uses it to tell "unchanged" from
/// "replaced"; structural equality is never consulted.
pub trait RefIdentity: Clone {
    fn same_ref(&self, other: &Self) -> bool;
}

impl RefIdentity for Expr {
    #[inline]
    fn same_ref(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl<T> RefIdentity for Arc<T> {
    #[inline]
    fn same_ref(&self, other: &Self) -> bool {
        Arc::ptr_eq(self, other)
    }
}

/// Whether two optional children are both absent or the same node.
#[inline]
pub(crate) fn same_opt<T: RefIdentity>(a: Option<&T>, b: Option<&T>) -> bool {
    match (a, b) {
        (None, None) => true,
        (Some(a), Some(b)) => a.same_ref(b),
        _ => false,
    }
}

#[cfg(test)]
mod tests;
