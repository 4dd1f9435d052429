//! Result types of slim nodes.
//!
//! A node whose optional type slot is empty has its type recomputed from its
//! children by the rules below. The native factory applies the same rules to
//! runtime types, and the native-to-slim converter relies on them to decide
//! when a stored type is redundant; all three must agree.

use super::operators::{BinaryOp, UnaryOp};
use super::{BinarySlim, Expr, UnarySlim};
use crate::descriptor::{Primitive, TypeSlim};

impl Expr {
    /// The node's type: the stored one if present, else the recomputed one.
    pub fn ty(&self) -> TypeSlim {
        match self.declared_type() {
            Some(ty) => ty.clone(),
            None => self.canonical_type(),
        }
    }

    /// The type recomputed from children, ignoring any stored type.
    ///
    /// Kinds whose type is always stored (`Constant`, `Default`, `Parameter`)
    /// return it unchanged.
    pub fn canonical_type(&self) -> TypeSlim {
        match self {
            Expr::Binary(n) => binary_type(n),
            Expr::Unary(n) => unary_type(n),
            Expr::Constant(n) => n.ty.clone(),
            Expr::Default(n) => n.ty.clone(),
            Expr::Parameter(p) => p.ty.clone(),
            Expr::Lambda(n) => TypeSlim::function(
                n.parameters.iter().map(|p| p.ty.clone()).collect(),
                n.body.ty(),
            ),
            Expr::Invocation(n) => {
                let callee = n.expression.ty();
                callee
                    .function_signature()
                    .map_or_else(TypeSlim::object, |(_, result)| result.clone())
            }
            Expr::MethodCall(n) => n.method.member_type(),
            Expr::New(n) => n.constructed_type(),
            Expr::NewArrayBounds(n) => match u32::try_from(n.bounds.len()) {
                Ok(1) | Err(_) => TypeSlim::array(n.element_type.clone()),
                Ok(rank) => TypeSlim::array_of_rank(n.element_type.clone(), rank),
            },
            Expr::NewArrayInit(n) => TypeSlim::array(n.element_type.clone()),
            Expr::MemberAccess(n) => n.member.member_type(),
            Expr::MemberInit(n) => n.new_expression.constructed_type(),
            Expr::ListInit(n) => n.new_expression.constructed_type(),
            Expr::Conditional(n) => n.if_true.ty(),
            Expr::TypeBinary(_) => TypeSlim::bool(),
            Expr::Block(n) => n.result().map_or_else(TypeSlim::void, Expr::ty),
            Expr::Try(n) => n.body.ty(),
            Expr::Switch(n) => match (n.cases.first(), &n.default_body) {
                (Some(case), _) => case.body.ty(),
                (None, Some(body)) => body.ty(),
                (None, None) => TypeSlim::void(),
            },
            Expr::Label(n) => n.target.value_type(),
            Expr::Loop(n) => n
                .break_label
                .as_ref()
                .map_or_else(TypeSlim::void, |l| l.value_type()),
            Expr::Goto(_) => TypeSlim::void(),
            Expr::Index(n) => match &n.indexer {
                Some(indexer) => indexer.member_type(),
                None => n
                    .object
                    .ty()
                    .element_type()
                    .cloned()
                    .unwrap_or_else(TypeSlim::object),
            },
        }
    }

    /// Whether the stored type (if any) equals the recomputed one, i.e. the
    /// node could drop it without changing meaning.
    pub fn has_canonical_type(&self) -> bool {
        match self.declared_type() {
            None => true,
            Some(ty) => *ty == self.canonical_type(),
        }
    }
}

pub(super) fn binary_type(n: &BinarySlim) -> TypeSlim {
    if n.op.is_assignment() {
        return n.left.ty();
    }
    if let Some(method) = &n.method {
        let ret = method.member_type();
        return if n.lifted_to_null && !n.op.is_comparison() {
            TypeSlim::nullable(ret)
        } else {
            ret
        };
    }
    if n.op.is_comparison() {
        return if n.lifted_to_null {
            TypeSlim::nullable(TypeSlim::bool())
        } else {
            TypeSlim::bool()
        };
    }
    let left = n.left.ty();
    match n.op {
        BinaryOp::Coalesce => {
            let right = n.right.ty();
            match left.nullable_underlying() {
                Some(inner) if *inner == right => right,
                _ => left,
            }
        }
        BinaryOp::ArrayIndex => left.element_type().cloned().unwrap_or(left),
        _ => left,
    }
}

pub(super) fn unary_type(n: &UnarySlim) -> TypeSlim {
    if let (true, Some(ty)) = (n.op.requires_type(), &n.ty) {
        return ty.clone();
    }
    if let Some(method) = &n.method {
        return method.member_type();
    }
    match n.op {
        UnaryOp::ArrayLength => TypeSlim::primitive(Primitive::I32),
        UnaryOp::IsTrue | UnaryOp::IsFalse => TypeSlim::bool(),
        UnaryOp::Throw => TypeSlim::void(),
        _ => n.operand.ty(),
    }
}
