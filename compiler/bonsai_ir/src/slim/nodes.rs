//! Payloads of the expression-level node kinds.
//!
//! Call-like kinds live in `calls`, statement-like kinds in `control`.

use std::sync::Arc;

use super::bindings::{ElementInit, MemberBinding};
use super::calls::NewSlim;
use super::operators::{BinaryOp, TypeBinaryOp, UnaryOp};
use super::{same_opt, Expr, ExprList};
use crate::descriptor::{MemberSlim, ObjectSlim, TypeSlim};

/// Shared handle to a parameter; every occurrence clones the same `Arc`.
pub type ParameterRef = Arc<ParameterSlim>;

#[derive(Debug)]
pub struct BinarySlim {
    pub op: BinaryOp,
    pub left: Expr,
    pub right: Expr,
    /// Lifted comparisons yield `bool?` instead of `bool`.
    pub lifted_to_null: bool,
    /// User-defined operator implementation.
    pub method: Option<MemberSlim>,
    /// Conversion applied by `??` and compound assignments.
    pub conversion: Option<Arc<LambdaSlim>>,
}

impl BinarySlim {
    pub fn update(
        self: &Arc<Self>,
        left: Expr,
        right: Expr,
        conversion: Option<Arc<LambdaSlim>>,
    ) -> Arc<Self> {
        if left.ptr_eq(&self.left)
            && right.ptr_eq(&self.right)
            && same_opt(conversion.as_ref(), self.conversion.as_ref())
        {
            return Arc::clone(self);
        }
        Arc::new(BinarySlim {
            op: self.op,
            left,
            right,
            lifted_to_null: self.lifted_to_null,
            method: self.method.clone(),
            conversion,
        })
    }
}

#[derive(Debug)]
pub struct UnarySlim {
    pub op: UnaryOp,
    pub operand: Expr,
    pub ty: Option<TypeSlim>,
    pub method: Option<MemberSlim>,
}

impl UnarySlim {
    pub fn update(self: &Arc<Self>, operand: Expr) -> Arc<Self> {
        if operand.ptr_eq(&self.operand) {
            return Arc::clone(self);
        }
        Arc::new(UnarySlim {
            op: self.op,
            operand,
            ty: self.ty.clone(),
            method: self.method.clone(),
        })
    }
}

/// Constant leaf; the value is reduced once `ty` is resolved.
#[derive(Debug)]
pub struct ConstantSlim {
    pub value: ObjectSlim,
    pub ty: TypeSlim,
}

#[derive(Debug)]
pub struct DefaultSlim {
    pub ty: TypeSlim,
}

/// A variable. Compared by handle identity, never by name.
#[derive(Debug)]
pub struct ParameterSlim {
    pub ty: TypeSlim,
    pub name: Option<Arc<str>>,
}

impl ParameterSlim {
    /// Fresh parameter identity.
    pub fn new(ty: TypeSlim, name: Option<&str>) -> ParameterRef {
        Arc::new(ParameterSlim {
            ty,
            name: name.map(Arc::from),
        })
    }
}

#[derive(Debug)]
pub struct LambdaSlim {
    pub ty: Option<TypeSlim>,
    pub body: Expr,
    pub parameters: Arc<[ParameterRef]>,
    pub name: Option<Arc<str>>,
    pub tail_call: bool,
}

impl LambdaSlim {
    pub fn update(self: &Arc<Self>, body: Expr, parameters: Arc<[ParameterRef]>) -> Arc<Self> {
        if body.ptr_eq(&self.body) && Arc::ptr_eq(&parameters, &self.parameters) {
            return Arc::clone(self);
        }
        Arc::new(LambdaSlim {
            ty: self.ty.clone(),
            body,
            parameters,
            name: self.name.clone(),
            tail_call: self.tail_call,
        })
    }

    /// Parameter types followed by the body's type.
    pub fn function_type(&self) -> TypeSlim {
        match &self.ty {
            Some(ty) => ty.clone(),
            None => TypeSlim::function(
                self.parameters.iter().map(|p| p.ty.clone()).collect(),
                self.body.ty(),
            ),
        }
    }
}

#[derive(Debug)]
pub struct ConditionalSlim {
    pub ty: Option<TypeSlim>,
    pub test: Expr,
    pub if_true: Expr,
    pub if_false: Expr,
}

impl ConditionalSlim {
    pub fn update(self: &Arc<Self>, test: Expr, if_true: Expr, if_false: Expr) -> Arc<Self> {
        if test.ptr_eq(&self.test) && if_true.ptr_eq(&self.if_true) && if_false.ptr_eq(&self.if_false)
        {
            return Arc::clone(self);
        }
        Arc::new(ConditionalSlim {
            ty: self.ty.clone(),
            test,
            if_true,
            if_false,
        })
    }
}

#[derive(Debug)]
pub struct TypeBinarySlim {
    pub op: TypeBinaryOp,
    pub expression: Expr,
    pub type_operand: TypeSlim,
}

impl TypeBinarySlim {
    pub fn update(self: &Arc<Self>, expression: Expr) -> Arc<Self> {
        if expression.ptr_eq(&self.expression) {
            return Arc::clone(self);
        }
        Arc::new(TypeBinarySlim {
            op: self.op,
            expression,
            type_operand: self.type_operand.clone(),
        })
    }
}

/// Field or property read. `expression` is `None` for static members.
#[derive(Debug)]
pub struct MemberAccessSlim {
    pub expression: Option<Expr>,
    pub member: MemberSlim,
}

impl MemberAccessSlim {
    pub fn update(self: &Arc<Self>, expression: Option<Expr>) -> Arc<Self> {
        if same_opt(expression.as_ref(), self.expression.as_ref()) {
            return Arc::clone(self);
        }
        Arc::new(MemberAccessSlim {
            expression,
            member: self.member.clone(),
        })
    }
}

#[derive(Debug)]
pub struct MemberInitSlim {
    pub new_expression: Arc<NewSlim>,
    pub bindings: Arc<[Arc<MemberBinding>]>,
}

impl MemberInitSlim {
    pub fn update(
        self: &Arc<Self>,
        new_expression: Arc<NewSlim>,
        bindings: Arc<[Arc<MemberBinding>]>,
    ) -> Arc<Self> {
        if Arc::ptr_eq(&new_expression, &self.new_expression)
            && Arc::ptr_eq(&bindings, &self.bindings)
        {
            return Arc::clone(self);
        }
        Arc::new(MemberInitSlim {
            new_expression,
            bindings,
        })
    }
}

#[derive(Debug)]
pub struct ListInitSlim {
    pub new_expression: Arc<NewSlim>,
    pub initializers: Arc<[Arc<ElementInit>]>,
}

impl ListInitSlim {
    pub fn update(
        self: &Arc<Self>,
        new_expression: Arc<NewSlim>,
        initializers: Arc<[Arc<ElementInit>]>,
    ) -> Arc<Self> {
        if Arc::ptr_eq(&new_expression, &self.new_expression)
            && Arc::ptr_eq(&initializers, &self.initializers)
        {
            return Arc::clone(self);
        }
        Arc::new(ListInitSlim {
            new_expression,
            initializers,
        })
    }
}

#[derive(Debug)]
pub struct NewArrayBoundsSlim {
    pub element_type: TypeSlim,
    pub bounds: ExprList,
}

impl NewArrayBoundsSlim {
    pub fn update(self: &Arc<Self>, bounds: ExprList) -> Arc<Self> {
        if Arc::ptr_eq(&bounds, &self.bounds) {
            return Arc::clone(self);
        }
        Arc::new(NewArrayBoundsSlim {
            element_type: self.element_type.clone(),
            bounds,
        })
    }
}

#[derive(Debug)]
pub struct NewArrayInitSlim {
    pub element_type: TypeSlim,
    pub expressions: ExprList,
}

impl NewArrayInitSlim {
    pub fn update(self: &Arc<Self>, expressions: ExprList) -> Arc<Self> {
        if Arc::ptr_eq(&expressions, &self.expressions) {
            return Arc::clone(self);
        }
        Arc::new(NewArrayInitSlim {
            element_type: self.element_type.clone(),
            expressions,
        })
    }
}

/// Indexer property access, or array element access when `indexer` is
/// `None`.
#[derive(Debug)]
pub struct IndexSlim {
    pub object: Expr,
    pub indexer: Option<MemberSlim>,
    pub arguments: ExprList,
}

impl IndexSlim {
    pub fn update(self: &Arc<Self>, object: Expr, arguments: ExprList) -> Arc<Self> {
        if object.ptr_eq(&self.object) && Arc::ptr_eq(&arguments, &self.arguments) {
            return Arc::clone(self);
        }
        Arc::new(IndexSlim {
            object,
            indexer: self.indexer.clone(),
            arguments,
        })
    }
}
