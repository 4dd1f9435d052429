//! Call-like nodes: invocation, method call and constructor call.
//!
//! All three store their arguments as [`Arguments`], so calls with up to
//! five arguments carry no separate list allocation.

use std::sync::Arc;

use super::arguments::Arguments;
use super::{same_opt, Expr};
use crate::descriptor::{MemberSlim, TypeSlim};

/// Invocation of a function-typed value.
#[derive(Debug)]
pub struct InvocationSlim {
    pub expression: Expr,
    pub arguments: Arguments,
}

impl InvocationSlim {
    pub fn update(self: &Arc<Self>, expression: Expr, arguments: Arguments) -> Arc<Self> {
        if expression.ptr_eq(&self.expression) && arguments.same_as(&self.arguments) {
            return Arc::clone(self);
        }
        Arc::new(InvocationSlim {
            expression,
            arguments,
        })
    }
}

/// Static (`object == None`) or instance method call.
#[derive(Debug)]
pub struct MethodCallSlim {
    pub object: Option<Expr>,
    pub method: MemberSlim,
    pub arguments: Arguments,
}

impl MethodCallSlim {
    pub fn update(self: &Arc<Self>, object: Option<Expr>, arguments: Arguments) -> Arc<Self> {
        if same_opt(object.as_ref(), self.object.as_ref()) && arguments.same_as(&self.arguments) {
            return Arc::clone(self);
        }
        Arc::new(MethodCallSlim {
            object,
            method: self.method.clone(),
            arguments,
        })
    }
}

/// Constructor call.
///
/// Exactly one of `constructor` and `value_type` is set; the latter is the
/// parameterless default construction of a value type.
#[derive(Debug)]
pub struct NewSlim {
    pub constructor: Option<MemberSlim>,
    pub value_type: Option<TypeSlim>,
    pub arguments: Arguments,
}

impl NewSlim {
    pub fn update(self: &Arc<Self>, arguments: Arguments) -> Arc<Self> {
        if arguments.same_as(&self.arguments) {
            return Arc::clone(self);
        }
        Arc::new(NewSlim {
            constructor: self.constructor.clone(),
            value_type: self.value_type.clone(),
            arguments,
        })
    }

    /// The constructed type.
    pub fn constructed_type(&self) -> TypeSlim {
        match (&self.constructor, &self.value_type) {
            (Some(ctor), _) => ctor.declaring_type().clone(),
            (None, Some(ty)) => ty.clone(),
            (None, None) => TypeSlim::object(),
        }
    }
}
