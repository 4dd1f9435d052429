//! Member bindings and element initializers used by `MemberInit` and
//! `ListInit`.

use std::sync::Arc;

use super::{Expr, ExprList};
use crate::descriptor::MemberSlim;

/// One binding inside a member initializer.
#[derive(Debug)]
pub enum MemberBinding {
    /// `member = expression`
    Assignment { member: MemberSlim, expression: Expr },
    /// `member = { nested bindings }` applied to the member's current value.
    MemberBind {
        member: MemberSlim,
        bindings: Arc<[Arc<MemberBinding>]>,
    },
    /// `member = { initializers }` adding elements to the member's collection.
    ListBind {
        member: MemberSlim,
        initializers: Arc<[Arc<ElementInit>]>,
    },
}

impl MemberBinding {
    pub fn assignment(member: MemberSlim, expression: Expr) -> Arc<Self> {
        Arc::new(MemberBinding::Assignment { member, expression })
    }

    pub fn member_bind(member: MemberSlim, bindings: Vec<Arc<MemberBinding>>) -> Arc<Self> {
        Arc::new(MemberBinding::MemberBind {
            member,
            bindings: bindings.into(),
        })
    }

    pub fn list_bind(member: MemberSlim, initializers: Vec<Arc<ElementInit>>) -> Arc<Self> {
        Arc::new(MemberBinding::ListBind {
            member,
            initializers: initializers.into(),
        })
    }

    pub fn member(&self) -> &MemberSlim {
        match self {
            MemberBinding::Assignment { member, .. }
            | MemberBinding::MemberBind { member, .. }
            | MemberBinding::ListBind { member, .. } => member,
        }
    }

    /// Replace the expression of an `Assignment`. Other variants are
    /// returned unchanged.
    pub fn update_assignment(self: &Arc<Self>, new_expression: Expr) -> Arc<Self> {
        match &**self {
            MemberBinding::Assignment { member, expression } if !new_expression.ptr_eq(expression) => {
                MemberBinding::assignment(member.clone(), new_expression)
            }
            _ => Arc::clone(self),
        }
    }

    pub fn update_member_bind(self: &Arc<Self>, new_bindings: Arc<[Arc<MemberBinding>]>) -> Arc<Self> {
        match &**self {
            MemberBinding::MemberBind { member, bindings } if !Arc::ptr_eq(bindings, &new_bindings) => {
                Arc::new(MemberBinding::MemberBind {
                    member: member.clone(),
                    bindings: new_bindings,
                })
            }
            _ => Arc::clone(self),
        }
    }

    pub fn update_list_bind(self: &Arc<Self>, new_initializers: Arc<[Arc<ElementInit>]>) -> Arc<Self> {
        match &**self {
            MemberBinding::ListBind {
                member,
                initializers,
            } if !Arc::ptr_eq(initializers, &new_initializers) => Arc::new(MemberBinding::ListBind {
                member: member.clone(),
                initializers: new_initializers,
            }),
            _ => Arc::clone(self),
        }
    }
}

/// A call to an "add"-style method with its arguments.
#[derive(Debug)]
pub struct ElementInit {
    pub add_method: MemberSlim,
    pub arguments: ExprList,
}

impl ElementInit {
    pub fn update(self: &Arc<Self>, arguments: ExprList) -> Arc<Self> {
        if Arc::ptr_eq(&arguments, &self.arguments) {
            return Arc::clone(self);
        }
        Arc::new(ElementInit {
            add_method: self.add_method.clone(),
            arguments,
        })
    }
}
