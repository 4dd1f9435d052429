//! Native (executable) expression nodes.
//!
//! A [`NativeExpr`] is the host-bound twin of a slim node: every type and
//! member is a resolved runtime handle and every node carries its computed
//! type. Nodes are only built through a [`NodeFactory`](crate::NodeFactory),
//! which validates them.
//!
//! Parameters and labels are identity-bearing. A parameter *is* the
//! `NativeExpr` of its declaration; every use clones that handle.

use std::fmt;
use std::sync::Arc;

use bonsai_ir::{BinaryOp, GotoKind, NodeKind, TypeBinaryOp, UnaryOp};

use crate::types::{RuntimeMember, RuntimeType};
use crate::value::Value;

/// Shared list of child nodes.
pub type NativeList = Arc<[NativeExpr]>;

/// Shared, immutable native node.
#[derive(Clone)]
pub struct NativeExpr(Arc<NativeNode>);

struct NativeNode {
    ty: RuntimeType,
    kind: NativeKind,
}

/// Binary operators of the native algebra: the slim ones plus reference
/// comparisons, which slim trees cannot spell.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub enum NativeBinaryOp {
    Slim(BinaryOp),
    ReferenceEqual,
    ReferenceNotEqual,
}

impl NativeBinaryOp {
    pub const fn is_comparison(self) -> bool {
        match self {
            NativeBinaryOp::Slim(op) => op.is_comparison(),
            NativeBinaryOp::ReferenceEqual | NativeBinaryOp::ReferenceNotEqual => true,
        }
    }

    pub const fn slim(self) -> Option<BinaryOp> {
        match self {
            NativeBinaryOp::Slim(op) => Some(op),
            _ => None,
        }
    }
}

impl From<BinaryOp> for NativeBinaryOp {
    fn from(op: BinaryOp) -> Self {
        NativeBinaryOp::Slim(op)
    }
}

impl fmt::Display for NativeBinaryOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NativeBinaryOp::Slim(op) => op.fmt(f),
            NativeBinaryOp::ReferenceEqual => f.write_str("ref=="),
            NativeBinaryOp::ReferenceNotEqual => f.write_str("ref!="),
        }
    }
}

/// Payload of a [`NativeExpr`].
pub enum NativeKind {
    Binary {
        op: NativeBinaryOp,
        left: NativeExpr,
        right: NativeExpr,
        lifted_to_null: bool,
        method: Option<RuntimeMember>,
        /// A lambda node of one parameter.
        conversion: Option<NativeExpr>,
    },
    Unary {
        op: UnaryOp,
        operand: NativeExpr,
        method: Option<RuntimeMember>,
    },
    Constant {
        value: Value,
    },
    Default,
    Parameter {
        name: Option<Arc<str>>,
    },
    Lambda {
        body: NativeExpr,
        parameters: NativeList,
        name: Option<Arc<str>>,
        tail_call: bool,
    },
    Invocation {
        expression: NativeExpr,
        arguments: NativeList,
    },
    MethodCall {
        object: Option<NativeExpr>,
        method: RuntimeMember,
        arguments: NativeList,
    },
    /// `constructor == None` is the parameterless value-type form.
    New {
        constructor: Option<RuntimeMember>,
        arguments: NativeList,
    },
    NewArrayBounds {
        element_type: RuntimeType,
        bounds: NativeList,
    },
    NewArrayInit {
        element_type: RuntimeType,
        expressions: NativeList,
    },
    MemberAccess {
        expression: Option<NativeExpr>,
        member: RuntimeMember,
    },
    /// `new_expression` is always a `New` node.
    MemberInit {
        new_expression: NativeExpr,
        bindings: Arc<[NativeBinding]>,
    },
    ListInit {
        new_expression: NativeExpr,
        initializers: Arc<[NativeElementInit]>,
    },
    Conditional {
        test: NativeExpr,
        if_true: NativeExpr,
        if_false: NativeExpr,
    },
    TypeBinary {
        op: TypeBinaryOp,
        expression: NativeExpr,
        type_operand: RuntimeType,
    },
    Block {
        variables: NativeList,
        expressions: NativeList,
    },
    Try {
        body: NativeExpr,
        handlers: Arc<[NativeCatch]>,
        finally: Option<NativeExpr>,
        fault: Option<NativeExpr>,
    },
    Switch {
        switch_value: NativeExpr,
        default_body: Option<NativeExpr>,
        comparison: Option<RuntimeMember>,
        cases: Arc<[NativeSwitchCase]>,
    },
    Label {
        target: NativeLabel,
        default_value: Option<NativeExpr>,
    },
    Loop {
        body: NativeExpr,
        break_label: Option<NativeLabel>,
        continue_label: Option<NativeLabel>,
    },
    Goto {
        kind: GotoKind,
        target: NativeLabel,
        value: Option<NativeExpr>,
    },
    Index {
        object: NativeExpr,
        indexer: Option<RuntimeMember>,
        arguments: NativeList,
    },
}

impl NativeExpr {
    pub(crate) fn new(ty: RuntimeType, kind: NativeKind) -> Self {
        NativeExpr(Arc::new(NativeNode { ty, kind }))
    }

    #[inline]
    pub fn ty(&self) -> &RuntimeType {
        &self.0.ty
    }

    #[inline]
    pub fn kind(&self) -> &NativeKind {
        &self.0.kind
    }

    /// Identity of this node.
    #[inline]
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    #[inline]
    pub fn ptr_eq(&self, other: &NativeExpr) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }

    pub fn node_kind(&self) -> NodeKind {
        match self.kind() {
            NativeKind::Binary { .. } => NodeKind::Binary,
            NativeKind::Unary { .. } => NodeKind::Unary,
            NativeKind::Constant { .. } => NodeKind::Constant,
            NativeKind::Default => NodeKind::Default,
            NativeKind::Parameter { .. } => NodeKind::Parameter,
            NativeKind::Lambda { .. } => NodeKind::Lambda,
            NativeKind::Invocation { .. } => NodeKind::Invocation,
            NativeKind::MethodCall { .. } => NodeKind::MethodCall,
            NativeKind::New { .. } => NodeKind::New,
            NativeKind::NewArrayBounds { .. } => NodeKind::NewArrayBounds,
            NativeKind::NewArrayInit { .. } => NodeKind::NewArrayInit,
            NativeKind::MemberAccess { .. } => NodeKind::MemberAccess,
            NativeKind::MemberInit { .. } => NodeKind::MemberInit,
            NativeKind::ListInit { .. } => NodeKind::ListInit,
            NativeKind::Conditional { .. } => NodeKind::Conditional,
            NativeKind::TypeBinary { .. } => NodeKind::TypeBinary,
            NativeKind::Block { .. } => NodeKind::Block,
            NativeKind::Try { .. } => NodeKind::Try,
            NativeKind::Switch { .. } => NodeKind::Switch,
            NativeKind::Label { .. } => NodeKind::Label,
            NativeKind::Loop { .. } => NodeKind::Loop,
            NativeKind::Goto { .. } => NodeKind::Goto,
            NativeKind::Index { .. } => NodeKind::Index,
        }
    }

    pub fn is_parameter(&self) -> bool {
        matches!(self.kind(), NativeKind::Parameter { .. })
    }

    /// Display name of a parameter node.
    pub fn parameter_name(&self) -> Option<&str> {
        match self.kind() {
            NativeKind::Parameter { name } => name.as_deref(),
            _ => None,
        }
    }

    /// Parameters of a lambda node.
    pub fn lambda_parameters(&self) -> Option<&[NativeExpr]> {
        match self.kind() {
            NativeKind::Lambda { parameters, .. } => Some(parameters),
            _ => None,
        }
    }
}

impl fmt::Debug for NativeExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            NativeKind::Parameter { name } => write!(
                f,
                "Parameter({}: {})",
                name.as_deref().unwrap_or("_"),
                self.ty()
            ),
            NativeKind::Constant { value } => write!(f, "Constant({value}: {})", self.ty()),
            NativeKind::Binary { op, left, right, .. } => {
                write!(f, "Binary({left:?} {op} {right:?})")
            }
            _ => write!(f, "{}: {}", self.node_kind(), self.ty()),
        }
    }
}

/// Identity-bearing jump target.
#[derive(Clone)]
pub struct NativeLabel(Arc<LabelData>);

struct LabelData {
    ty: RuntimeType,
    name: Option<Arc<str>>,
}

impl NativeLabel {
    pub(crate) fn new(ty: RuntimeType, name: Option<&str>) -> Self {
        NativeLabel(Arc::new(LabelData {
            ty,
            name: name.map(Arc::from),
        }))
    }

    /// Type of the value carried by jumps to this label.
    #[inline]
    pub fn ty(&self) -> &RuntimeType {
        &self.0.ty
    }

    pub fn name(&self) -> Option<&str> {
        self.0.name.as_deref()
    }

    #[inline]
    pub fn addr(&self) -> usize {
        Arc::as_ptr(&self.0) as usize
    }

    #[inline]
    pub fn ptr_eq(&self, other: &NativeLabel) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl fmt::Debug for NativeLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label({}: {})", self.name().unwrap_or("_"), self.ty())
    }
}

/// Catch clause of a `Try` node.
#[derive(Clone, Debug)]
pub struct NativeCatch {
    pub test: RuntimeType,
    pub variable: Option<NativeExpr>,
    pub body: NativeExpr,
    pub filter: Option<NativeExpr>,
}

#[derive(Clone, Debug)]
pub struct NativeSwitchCase {
    pub test_values: NativeList,
    pub body: NativeExpr,
}

/// Member initializer of a `MemberInit` node.
#[derive(Clone, Debug)]
pub enum NativeBinding {
    Assignment {
        member: RuntimeMember,
        expression: NativeExpr,
    },
    MemberBind {
        member: RuntimeMember,
        bindings: Arc<[NativeBinding]>,
    },
    ListBind {
        member: RuntimeMember,
        initializers: Arc<[NativeElementInit]>,
    },
}

impl NativeBinding {
    pub fn member(&self) -> &RuntimeMember {
        match self {
            NativeBinding::Assignment { member, .. }
            | NativeBinding::MemberBind { member, .. }
            | NativeBinding::ListBind { member, .. } => member,
        }
    }
}

#[derive(Clone, Debug)]
pub struct NativeElementInit {
    pub add_method: RuntimeMember,
    pub arguments: NativeList,
}
