//! Native to slim conversion.
//!
//! The inverse of [`SlimToNative`](crate::SlimToNative): every runtime
//! handle is turned back into the descriptor the [`TypeSpace`] resolved it
//! from, and every node is rebuilt through the slim constructors, so the
//! result is validated and canonical. Optional type slots stay empty when
//! the native node's type is the one its children imply.
//!
//! Reference comparisons have no slim spelling and come back as `==`/`!=`,
//! which the forward conversion lowers again.

use std::sync::Arc;

use bonsai_ir::stack::ensure_sufficient_stack;
use bonsai_ir::{
    BinaryOp, CatchBlock, ElementInit, Expr, LabelRef, LabelTarget, MemberBinding, MemberSlim,
    NodeKind, ObjectSlim, ParameterRef, ParameterSlim, SwitchCase, TypeBinaryOp, TypeSlim,
};
use bonsai_native::{
    NativeBinaryOp, NativeBinding, NativeCatch, NativeElementInit, NativeExpr, NativeKind,
    NativeLabel, NativeSwitchCase, RuntimeMember, RuntimeType,
};
use rustc_hash::FxHashMap;

use crate::error::ConvertError;
use crate::type_space::TypeSpace;

type Converted = Result<Expr, ConvertError>;

/// Converts native trees back into slim trees, naming types the way
/// `space` knows them.
pub struct NativeToSlim<'s> {
    space: &'s TypeSpace,
    parameters: FxHashMap<usize, (NativeExpr, ParameterRef)>,
    labels: FxHashMap<usize, (NativeLabel, LabelRef)>,
}

impl<'s> NativeToSlim<'s> {
    pub fn new(space: &'s TypeSpace) -> Self {
        NativeToSlim {
            space,
            parameters: FxHashMap::default(),
            labels: FxHashMap::default(),
        }
    }

    #[tracing::instrument(level = "debug", skip_all, fields(kind = %expr.node_kind()))]
    pub fn convert(&mut self, expr: &NativeExpr) -> Converted {
        let slim = self.visit(expr)?;
        tracing::debug!(
            parameters = self.parameters.len(),
            labels = self.labels.len(),
            "converted native tree"
        );
        Ok(slim)
    }

    fn ty(&self, ty: &RuntimeType) -> TypeSlim {
        self.space.descriptor_of(ty)
    }

    fn member(&self, member: &RuntimeMember) -> MemberSlim {
        self.space.member_descriptor_of(member)
    }

    /// The descriptor of `ty` if it differs from `canonical`, the type the
    /// node would get from its children.
    fn declared(&self, ty: &RuntimeType, canonical: &RuntimeType) -> Option<TypeSlim> {
        (ty != canonical).then(|| self.ty(ty))
    }

    fn visit(&mut self, expr: &NativeExpr) -> Converted {
        ensure_sufficient_stack(|| self.visit_node(expr))
    }

    fn visit_opt(&mut self, expr: Option<&NativeExpr>) -> Result<Option<Expr>, ConvertError> {
        expr.map(|e| self.visit(e)).transpose()
    }

    fn visit_all(&mut self, exprs: &[NativeExpr]) -> Result<Vec<Expr>, ConvertError> {
        exprs.iter().map(|e| self.visit(e)).collect()
    }

    fn parameter(&mut self, expr: &NativeExpr) -> Result<ParameterRef, ConvertError> {
        if let Some((_, slim)) = self.parameters.get(&expr.addr()) {
            return Ok(Arc::clone(slim));
        }
        let NativeKind::Parameter { name } = expr.kind() else {
            return Err(ConvertError::Invariant(format!(
                "expected a parameter declaration, got {}",
                expr.node_kind()
            )));
        };
        let slim = ParameterSlim::new(self.ty(expr.ty()), name.as_deref());
        self.parameters
            .insert(expr.addr(), (expr.clone(), Arc::clone(&slim)));
        Ok(slim)
    }

    fn parameter_list(&mut self, exprs: &[NativeExpr]) -> Result<Vec<ParameterRef>, ConvertError> {
        exprs.iter().map(|e| self.parameter(e)).collect()
    }

    fn label(&mut self, target: &NativeLabel) -> LabelRef {
        if let Some((_, slim)) = self.labels.get(&target.addr()) {
            return Arc::clone(slim);
        }
        let ty = (!target.ty().is_void()).then(|| self.ty(target.ty()));
        let slim = LabelTarget::new(ty, target.name());
        self.labels
            .insert(target.addr(), (target.clone(), Arc::clone(&slim)));
        slim
    }

    fn visit_node(&mut self, expr: &NativeExpr) -> Converted {
        let ty = expr.ty();
        match expr.kind() {
            NativeKind::Binary {
                op,
                left,
                right,
                lifted_to_null,
                method,
                conversion,
            } => {
                let left = self.visit(left)?;
                let right = self.visit(right)?;
                let method = method.as_ref().map(|m| self.member(m));
                let conversion = match conversion {
                    Some(c) => match self.visit(c)? {
                        Expr::Lambda(lambda) => Some(lambda),
                        other => {
                            return Err(ConvertError::Invariant(format!(
                                "binary conversion must convert to a Lambda node, got {}",
                                other.kind()
                            )));
                        }
                    },
                    None => None,
                };
                let op = match op {
                    NativeBinaryOp::Slim(op) => *op,
                    NativeBinaryOp::ReferenceEqual => BinaryOp::Equal,
                    NativeBinaryOp::ReferenceNotEqual => BinaryOp::NotEqual,
                };
                Ok(Expr::make_binary(op, left, right, *lifted_to_null, method, conversion)?)
            }
            NativeKind::Unary {
                op,
                operand,
                method,
            } => {
                let operand = self.visit(operand)?;
                let method = method.as_ref().map(|m| self.member(m));
                // The slim constructor drops the type again when it is implied.
                Ok(Expr::make_unary(*op, operand, Some(self.ty(ty)), method)?)
            }
            NativeKind::Constant { value } => {
                let literal = value.to_literal().ok_or_else(|| ConvertError::NotSupported {
                    kind: NodeKind::Constant,
                    detail: format!("{value} has no portable representation"),
                })?;
                Ok(Expr::constant(ObjectSlim::from_literal(&literal), self.ty(ty)))
            }
            NativeKind::Default => Ok(Expr::default_value(self.ty(ty))),
            NativeKind::Parameter { .. } => Ok(Expr::Parameter(self.parameter(expr)?)),
            NativeKind::Lambda {
                body,
                parameters,
                name,
                tail_call,
            } => {
                let signature: Vec<RuntimeType> = parameters.iter().map(|p| p.ty().clone()).collect();
                let canonical = self.space.registry().function_type(&signature, body.ty());
                let declared = self.declared(ty, &canonical);
                let parameters = self.parameter_list(parameters)?;
                let body = self.visit(body)?;
                Ok(Expr::make_lambda(
                    declared,
                    body,
                    parameters,
                    name.as_deref(),
                    *tail_call,
                )?)
            }
            NativeKind::Invocation {
                expression,
                arguments,
            } => {
                let expression = self.visit(expression)?;
                let arguments = self.visit_all(arguments)?;
                Ok(Expr::invoke(expression, arguments)?)
            }
            NativeKind::MethodCall {
                object,
                method,
                arguments,
            } => {
                let object = self.visit_opt(object.as_ref())?;
                let arguments = self.visit_all(arguments)?;
                Ok(Expr::call(object, self.member(method), arguments)?)
            }
            NativeKind::New {
                constructor,
                arguments,
            } => match constructor {
                Some(constructor) => {
                    let arguments = self.visit_all(arguments)?;
                    Ok(Expr::new_object(self.member(constructor), arguments)?)
                }
                None => Ok(Expr::new_value(self.ty(ty))?),
            },
            NativeKind::NewArrayBounds {
                element_type,
                bounds,
            } => {
                let bounds = self.visit_all(bounds)?;
                Ok(Expr::new_array_bounds(self.ty(element_type), bounds)?)
            }
            NativeKind::NewArrayInit {
                element_type,
                expressions,
            } => {
                let expressions = self.visit_all(expressions)?;
                Ok(Expr::new_array_init(self.ty(element_type), expressions))
            }
            NativeKind::MemberAccess { expression, member } => {
                let expression = self.visit_opt(expression.as_ref())?;
                Ok(Expr::member_access(expression, self.member(member))?)
            }
            NativeKind::MemberInit {
                new_expression,
                bindings,
            } => {
                let new_expression = self.visit(new_expression)?;
                let bindings = bindings
                    .iter()
                    .map(|b| self.binding(b))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::member_init(new_expression, bindings)?)
            }
            NativeKind::ListInit {
                new_expression,
                initializers,
            } => {
                let new_expression = self.visit(new_expression)?;
                let initializers = self.element_inits(initializers)?;
                Ok(Expr::list_init(new_expression, initializers)?)
            }
            NativeKind::Conditional {
                test,
                if_true,
                if_false,
            } => {
                let declared = self.declared(ty, if_true.ty());
                let test = self.visit(test)?;
                let if_true = self.visit(if_true)?;
                let if_false = self.visit(if_false)?;
                Ok(Expr::make_condition(declared, test, if_true, if_false))
            }
            NativeKind::TypeBinary {
                op,
                expression,
                type_operand,
            } => {
                let expression = self.visit(expression)?;
                let type_operand = self.ty(type_operand);
                Ok(match op {
                    TypeBinaryOp::TypeIs => Expr::type_is(expression, type_operand),
                    TypeBinaryOp::TypeEqual => Expr::type_equal(expression, type_operand),
                })
            }
            NativeKind::Block {
                variables,
                expressions,
            } => {
                let declared = match expressions.last() {
                    Some(last) => self.declared(ty, last.ty()),
                    None => Some(self.ty(ty)),
                };
                let variables = self.parameter_list(variables)?;
                let expressions = self.visit_all(expressions)?;
                Ok(Expr::make_block(declared, variables, expressions)?)
            }
            NativeKind::Try {
                body,
                handlers,
                finally,
                fault,
            } => {
                let declared = self.declared(ty, body.ty());
                let body = self.visit(body)?;
                let handlers = handlers
                    .iter()
                    .map(|h| self.catch_block(h))
                    .collect::<Result<Vec<_>, _>>()?;
                let finally = self.visit_opt(finally.as_ref())?;
                let fault = self.visit_opt(fault.as_ref())?;
                Ok(Expr::make_try(declared, body, handlers, finally, fault)?)
            }
            NativeKind::Switch {
                switch_value,
                default_body,
                comparison,
                cases,
            } => {
                let canonical = match (cases.first(), default_body) {
                    (Some(case), _) => case.body.ty().clone(),
                    (None, Some(body)) => body.ty().clone(),
                    (None, None) => self.space.registry().void(),
                };
                let declared = self.declared(ty, &canonical);
                let switch_value = self.visit(switch_value)?;
                let default_body = self.visit_opt(default_body.as_ref())?;
                let comparison = comparison.as_ref().map(|m| self.member(m));
                let cases = cases
                    .iter()
                    .map(|c| self.switch_case(c))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(Expr::switch(declared, switch_value, default_body, comparison, cases)?)
            }
            NativeKind::Label {
                target,
                default_value,
            } => {
                let target = self.label(target);
                let default_value = self.visit_opt(default_value.as_ref())?;
                Ok(Expr::label(target, default_value))
            }
            NativeKind::Loop {
                body,
                break_label,
                continue_label,
            } => {
                let body = self.visit(body)?;
                let break_label = break_label.as_ref().map(|l| self.label(l));
                let continue_label = continue_label.as_ref().map(|l| self.label(l));
                Ok(Expr::loop_expr(body, break_label, continue_label)?)
            }
            NativeKind::Goto {
                kind,
                target,
                value,
            } => {
                let declared = (!ty.is_void()).then(|| self.ty(ty));
                let target = self.label(target);
                let value = self.visit_opt(value.as_ref())?;
                Ok(Expr::jump(*kind, target, value, declared))
            }
            NativeKind::Index {
                object,
                indexer,
                arguments,
            } => {
                let object = self.visit(object)?;
                let indexer = indexer.as_ref().map(|m| self.member(m));
                let arguments = self.visit_all(arguments)?;
                Ok(Expr::index(object, indexer, arguments)?)
            }
        }
    }

    fn binding(&mut self, binding: &NativeBinding) -> Result<Arc<MemberBinding>, ConvertError> {
        Ok(match binding {
            NativeBinding::Assignment { member, expression } => {
                let expression = self.visit(expression)?;
                MemberBinding::assignment(self.member(member), expression)
            }
            NativeBinding::MemberBind { member, bindings } => {
                let bindings = bindings
                    .iter()
                    .map(|b| self.binding(b))
                    .collect::<Result<Vec<_>, _>>()?;
                MemberBinding::member_bind(self.member(member), bindings)
            }
            NativeBinding::ListBind {
                member,
                initializers,
            } => {
                let initializers = self.element_inits(initializers)?;
                MemberBinding::list_bind(self.member(member), initializers)
            }
        })
    }

    fn element_inits(&mut self, initializers: &[NativeElementInit]) -> Result<Vec<Arc<ElementInit>>, ConvertError> {
        initializers
            .iter()
            .map(|init| {
                let arguments = self.visit_all(&init.arguments)?;
                Ok(Expr::element_init(self.member(&init.add_method), arguments)?)
            })
            .collect()
    }

    fn catch_block(&mut self, handler: &NativeCatch) -> Result<Arc<CatchBlock>, ConvertError> {
        let variable = handler
            .variable
            .as_ref()
            .map(|v| self.parameter(v))
            .transpose()?;
        let body = self.visit(&handler.body)?;
        let filter = self.visit_opt(handler.filter.as_ref())?;
        Ok(CatchBlock::new(self.ty(&handler.test), variable, body, filter))
    }

    fn switch_case(&mut self, case: &NativeSwitchCase) -> Result<Arc<SwitchCase>, ConvertError> {
        let test_values = self.visit_all(&case.test_values)?;
        let body = self.visit(&case.body)?;
        Ok(SwitchCase::new(test_values, body)?)
    }
}
