//! Rewriting visitor for slim trees.
//!
//! # Design
//!
//! [`Rewriter`] has one `visit_*` method per node kind, plus one per
//! auxiliary child shape (catch blocks, switch cases, member bindings,
//! element initializers, label targets). Each default body calls the
//! matching `walk_*` function, which visits the children and hands them to
//! the payload's `update`. When nothing below a node changed, `update`
//! returns the same `Arc`, so sharing propagates to the root with no
//! bookkeeping here.
//!
//! Child lists go through [`rewrite_list`]: no allocation while every
//! element comes back reference-identical, exactly one allocation of the
//! full length on the first difference.
//!
//! Traversal is post-order. Any state lives in the implementing type.
//!
//! # Example
//!
//! ```text
//! struct Swap(ParameterRef, Expr);
//!
//! impl Rewriter for Swap {
//!     fn visit_parameter(&mut self, p: &ParameterRef) -> Result<Expr, SlimError> {
//!         Ok(if Arc::ptr_eq(p, &self.0) { self.1.clone() } else { Expr::Parameter(p.clone()) })
//!     }
//! }
//! ```

mod rewriters;

use std::sync::Arc;

pub use rewriters::{Anonymizer, FreeVariables, Substitutor};

use crate::error::SlimError;
use crate::slim::{
    BinarySlim, BlockSlim, CatchBlock, ConditionalSlim, ConstantSlim, DefaultSlim, ElementInit,
    Expr, GotoSlim, IndexSlim, InvocationSlim, LabelRef, LabelSlim, LambdaSlim, ListInitSlim,
    LoopSlim, MemberAccessSlim, MemberBinding, MemberInitSlim, MethodCallSlim, NewArrayBoundsSlim,
    NewArrayInitSlim, NewSlim, NodeKind, ParameterRef, RefIdentity, SwitchCase, SwitchSlim,
    TrySlim, TypeBinarySlim, UnarySlim,
};
use crate::stack::ensure_sufficient_stack;

/// Result of visiting a node.
pub type Visited = Result<Expr, SlimError>;

/// Bottom-up tree rewriter.
///
/// Override `visit_*` methods to transform specific nodes; call the
/// matching `walk_*` function to keep the default child traversal.
pub trait Rewriter {
    /// Visit any node. Dispatches on the node kind.
    fn visit(&mut self, expr: &Expr) -> Visited {
        ensure_sufficient_stack(|| walk_expr(self, expr))
    }

    fn visit_binary(&mut self, node: &Arc<BinarySlim>) -> Visited {
        walk_binary(self, node)
    }

    fn visit_unary(&mut self, node: &Arc<UnarySlim>) -> Visited {
        walk_unary(self, node)
    }

    fn visit_constant(&mut self, node: &Arc<ConstantSlim>) -> Visited {
        Ok(Expr::Constant(Arc::clone(node)))
    }

    fn visit_default(&mut self, node: &Arc<DefaultSlim>) -> Visited {
        Ok(Expr::Default(Arc::clone(node)))
    }

    fn visit_parameter(&mut self, node: &ParameterRef) -> Visited {
        Ok(Expr::Parameter(Arc::clone(node)))
    }

    fn visit_lambda(&mut self, node: &Arc<LambdaSlim>) -> Visited {
        walk_lambda(self, node)
    }

    fn visit_invocation(&mut self, node: &Arc<InvocationSlim>) -> Visited {
        walk_invocation(self, node)
    }

    fn visit_method_call(&mut self, node: &Arc<MethodCallSlim>) -> Visited {
        walk_method_call(self, node)
    }

    fn visit_new(&mut self, node: &Arc<NewSlim>) -> Visited {
        walk_new(self, node)
    }

    fn visit_new_array_bounds(&mut self, node: &Arc<NewArrayBoundsSlim>) -> Visited {
        walk_new_array_bounds(self, node)
    }

    fn visit_new_array_init(&mut self, node: &Arc<NewArrayInitSlim>) -> Visited {
        walk_new_array_init(self, node)
    }

    fn visit_member_access(&mut self, node: &Arc<MemberAccessSlim>) -> Visited {
        walk_member_access(self, node)
    }

    fn visit_member_init(&mut self, node: &Arc<MemberInitSlim>) -> Visited {
        walk_member_init(self, node)
    }

    fn visit_list_init(&mut self, node: &Arc<ListInitSlim>) -> Visited {
        walk_list_init(self, node)
    }

    fn visit_conditional(&mut self, node: &Arc<ConditionalSlim>) -> Visited {
        walk_conditional(self, node)
    }

    fn visit_type_binary(&mut self, node: &Arc<TypeBinarySlim>) -> Visited {
        walk_type_binary(self, node)
    }

    fn visit_block(&mut self, node: &Arc<BlockSlim>) -> Visited {
        walk_block(self, node)
    }

    fn visit_try(&mut self, node: &Arc<TrySlim>) -> Visited {
        walk_try(self, node)
    }

    fn visit_switch(&mut self, node: &Arc<SwitchSlim>) -> Visited {
        walk_switch(self, node)
    }

    fn visit_label(&mut self, node: &Arc<LabelSlim>) -> Visited {
        walk_label(self, node)
    }

    fn visit_loop(&mut self, node: &Arc<LoopSlim>) -> Visited {
        walk_loop(self, node)
    }

    fn visit_goto(&mut self, node: &Arc<GotoSlim>) -> Visited {
        walk_goto(self, node)
    }

    fn visit_index(&mut self, node: &Arc<IndexSlim>) -> Visited {
        walk_index(self, node)
    }

    fn visit_label_target(&mut self, target: &LabelRef) -> Result<LabelRef, SlimError> {
        Ok(Arc::clone(target))
    }

    fn visit_catch_block(&mut self, node: &Arc<CatchBlock>) -> Result<Arc<CatchBlock>, SlimError> {
        walk_catch_block(self, node)
    }

    fn visit_switch_case(&mut self, node: &Arc<SwitchCase>) -> Result<Arc<SwitchCase>, SlimError> {
        walk_switch_case(self, node)
    }

    fn visit_member_binding(
        &mut self,
        node: &Arc<MemberBinding>,
    ) -> Result<Arc<MemberBinding>, SlimError> {
        walk_member_binding(self, node)
    }

    fn visit_element_init(
        &mut self,
        node: &Arc<ElementInit>,
    ) -> Result<Arc<ElementInit>, SlimError> {
        walk_element_init(self, node)
    }
}

// Copy-on-write sequences

/// Rewrite every element of `list` with `f`.
///
/// Returns `list` itself (same allocation) when every result is
/// reference-identical to its input. Otherwise the elements before the
/// first change are copied and the rest visited straight into one new
/// allocation of exactly `list.len()` elements.
pub fn rewrite_list<T: RefIdentity, E>(
    list: &Arc<[T]>,
    mut f: impl FnMut(&T) -> Result<T, E>,
) -> Result<Arc<[T]>, E> {
    for (i, item) in list.iter().enumerate() {
        let first_changed = f(item)?;
        if first_changed.same_ref(item) {
            continue;
        }
        // Every piece of this chain reports an exact length, so collecting
        // into `Arc<[T]>` allocates once. A failure is parked and the
        // original element kept so the length stays exact.
        let mut error = None;
        let rebuilt: Arc<[T]> = list[..i]
            .iter()
            .cloned()
            .chain(std::iter::once(first_changed))
            .chain(list[i + 1..].iter().map(|x| {
                if error.is_some() {
                    return x.clone();
                }
                f(x).unwrap_or_else(|e| {
                    error = Some(e);
                    x.clone()
                })
            }))
            .collect();
        return match error {
            Some(e) => Err(e),
            None => Ok(rebuilt),
        };
    }
    Ok(Arc::clone(list))
}

/// Rewrite an optional child.
pub fn rewrite_opt<T, E>(
    child: Option<&T>,
    f: impl FnOnce(&T) -> Result<T, E>,
) -> Result<Option<T>, E> {
    child.map(f).transpose()
}

// Convert-and-cast

/// Visit `param` and require the result to be a parameter.
///
/// Used wherever a parameter is declared (lambda parameters, block
/// variables, catch variables), where nothing else may take its place.
pub fn visit_and_convert_parameter<R: Rewriter + ?Sized>(
    v: &mut R,
    param: &ParameterRef,
    call_site: &'static str,
) -> Result<ParameterRef, SlimError> {
    match v.visit(&Expr::Parameter(Arc::clone(param)))? {
        Expr::Parameter(p) => Ok(p),
        other => Err(SlimError::InvariantViolation {
            call_site,
            expected: NodeKind::Parameter,
            found: other.kind(),
        }),
    }
}

pub fn visit_and_convert_parameters<R: Rewriter + ?Sized>(
    v: &mut R,
    params: &Arc<[ParameterRef]>,
    call_site: &'static str,
) -> Result<Arc<[ParameterRef]>, SlimError> {
    rewrite_list(params, |p| visit_and_convert_parameter(v, p, call_site))
}

/// Visit `lambda` and require the result to be a lambda.
pub fn visit_and_convert_lambda<R: Rewriter + ?Sized>(
    v: &mut R,
    lambda: &Arc<LambdaSlim>,
    call_site: &'static str,
) -> Result<Arc<LambdaSlim>, SlimError> {
    match v.visit(&Expr::Lambda(Arc::clone(lambda)))? {
        Expr::Lambda(l) => Ok(l),
        other => Err(SlimError::InvariantViolation {
            call_site,
            expected: NodeKind::Lambda,
            found: other.kind(),
        }),
    }
}

/// Visit `new` and require the result to be a constructor call.
pub fn visit_and_convert_new<R: Rewriter + ?Sized>(
    v: &mut R,
    new: &Arc<NewSlim>,
    call_site: &'static str,
) -> Result<Arc<NewSlim>, SlimError> {
    match v.visit(&Expr::New(Arc::clone(new)))? {
        Expr::New(n) => Ok(n),
        other => Err(SlimError::InvariantViolation {
            call_site,
            expected: NodeKind::New,
            found: other.kind(),
        }),
    }
}

fn visit_list<R: Rewriter + ?Sized>(
    v: &mut R,
    list: &Arc<[Expr]>,
) -> Result<Arc<[Expr]>, SlimError> {
    rewrite_list(list, |e| v.visit(e))
}

fn visit_opt<R: Rewriter + ?Sized>(v: &mut R, child: Option<&Expr>) -> Result<Option<Expr>, SlimError> {
    rewrite_opt(child, |e| v.visit(e))
}

fn visit_opt_label<R: Rewriter + ?Sized>(
    v: &mut R,
    target: Option<&LabelRef>,
) -> Result<Option<LabelRef>, SlimError> {
    rewrite_opt(target, |l| v.visit_label_target(l))
}

// Walk functions

pub fn walk_expr<R: Rewriter + ?Sized>(v: &mut R, expr: &Expr) -> Visited {
    match expr {
        Expr::Binary(n) => v.visit_binary(n),
        Expr::Unary(n) => v.visit_unary(n),
        Expr::Constant(n) => v.visit_constant(n),
        Expr::Default(n) => v.visit_default(n),
        Expr::Parameter(n) => v.visit_parameter(n),
        Expr::Lambda(n) => v.visit_lambda(n),
        Expr::Invocation(n) => v.visit_invocation(n),
        Expr::MethodCall(n) => v.visit_method_call(n),
        Expr::New(n) => v.visit_new(n),
        Expr::NewArrayBounds(n) => v.visit_new_array_bounds(n),
        Expr::NewArrayInit(n) => v.visit_new_array_init(n),
        Expr::MemberAccess(n) => v.visit_member_access(n),
        Expr::MemberInit(n) => v.visit_member_init(n),
        Expr::ListInit(n) => v.visit_list_init(n),
        Expr::Conditional(n) => v.visit_conditional(n),
        Expr::TypeBinary(n) => v.visit_type_binary(n),
        Expr::Block(n) => v.visit_block(n),
        Expr::Try(n) => v.visit_try(n),
        Expr::Switch(n) => v.visit_switch(n),
        Expr::Label(n) => v.visit_label(n),
        Expr::Loop(n) => v.visit_loop(n),
        Expr::Goto(n) => v.visit_goto(n),
        Expr::Index(n) => v.visit_index(n),
    }
}

pub fn walk_binary<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<BinarySlim>) -> Visited {
    let left = v.visit(&node.left)?;
    let conversion = rewrite_opt(node.conversion.as_ref(), |l| {
        visit_and_convert_lambda(v, l, "BinarySlim.conversion")
    })?;
    let right = v.visit(&node.right)?;
    Ok(Expr::Binary(node.update(left, right, conversion)))
}

pub fn walk_unary<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<UnarySlim>) -> Visited {
    let operand = v.visit(&node.operand)?;
    Ok(Expr::Unary(node.update(operand)))
}

pub fn walk_lambda<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<LambdaSlim>) -> Visited {
    let body = v.visit(&node.body)?;
    let parameters = visit_and_convert_parameters(v, &node.parameters, "LambdaSlim.parameters")?;
    Ok(Expr::Lambda(node.update(body, parameters)))
}

pub fn walk_invocation<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<InvocationSlim>) -> Visited {
    let expression = v.visit(&node.expression)?;
    let arguments = node
        .arguments
        .rewrite(|a| v.visit(a))?
        .unwrap_or_else(|| node.arguments.clone());
    Ok(Expr::Invocation(node.update(expression, arguments)))
}

pub fn walk_method_call<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<MethodCallSlim>) -> Visited {
    let object = visit_opt(v, node.object.as_ref())?;
    let arguments = node
        .arguments
        .rewrite(|a| v.visit(a))?
        .unwrap_or_else(|| node.arguments.clone());
    Ok(Expr::MethodCall(node.update(object, arguments)))
}

pub fn walk_new<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<NewSlim>) -> Visited {
    match node.arguments.rewrite(|a| v.visit(a))? {
        Some(arguments) => Ok(Expr::New(node.update(arguments))),
        None => Ok(Expr::New(Arc::clone(node))),
    }
}

pub fn walk_new_array_bounds<R: Rewriter + ?Sized>(
    v: &mut R,
    node: &Arc<NewArrayBoundsSlim>,
) -> Visited {
    let bounds = visit_list(v, &node.bounds)?;
    Ok(Expr::NewArrayBounds(node.update(bounds)))
}

pub fn walk_new_array_init<R: Rewriter + ?Sized>(
    v: &mut R,
    node: &Arc<NewArrayInitSlim>,
) -> Visited {
    let expressions = visit_list(v, &node.expressions)?;
    Ok(Expr::NewArrayInit(node.update(expressions)))
}

pub fn walk_member_access<R: Rewriter + ?Sized>(
    v: &mut R,
    node: &Arc<MemberAccessSlim>,
) -> Visited {
    let expression = visit_opt(v, node.expression.as_ref())?;
    Ok(Expr::MemberAccess(node.update(expression)))
}

pub fn walk_member_init<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<MemberInitSlim>) -> Visited {
    let new_expression =
        visit_and_convert_new(v, &node.new_expression, "MemberInitSlim.new_expression")?;
    let bindings = rewrite_list(&node.bindings, |b| v.visit_member_binding(b))?;
    Ok(Expr::MemberInit(node.update(new_expression, bindings)))
}

pub fn walk_list_init<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<ListInitSlim>) -> Visited {
    let new_expression =
        visit_and_convert_new(v, &node.new_expression, "ListInitSlim.new_expression")?;
    let initializers = rewrite_list(&node.initializers, |i| v.visit_element_init(i))?;
    Ok(Expr::ListInit(node.update(new_expression, initializers)))
}

pub fn walk_conditional<R: Rewriter + ?Sized>(
    v: &mut R,
    node: &Arc<ConditionalSlim>,
) -> Visited {
    let test = v.visit(&node.test)?;
    let if_true = v.visit(&node.if_true)?;
    let if_false = v.visit(&node.if_false)?;
    Ok(Expr::Conditional(node.update(test, if_true, if_false)))
}

pub fn walk_type_binary<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<TypeBinarySlim>) -> Visited {
    let expression = v.visit(&node.expression)?;
    Ok(Expr::TypeBinary(node.update(expression)))
}

pub fn walk_block<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<BlockSlim>) -> Visited {
    let variables = visit_and_convert_parameters(v, &node.variables, "BlockSlim.variables")?;
    let expressions = visit_list(v, &node.expressions)?;
    Ok(Expr::Block(node.update(variables, expressions)))
}

pub fn walk_try<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<TrySlim>) -> Visited {
    let body = v.visit(&node.body)?;
    let handlers = rewrite_list(&node.handlers, |h| v.visit_catch_block(h))?;
    let finally = visit_opt(v, node.finally.as_ref())?;
    let fault = visit_opt(v, node.fault.as_ref())?;
    Ok(Expr::Try(node.update(body, handlers, finally, fault)?))
}

pub fn walk_switch<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<SwitchSlim>) -> Visited {
    let switch_value = v.visit(&node.switch_value)?;
    let cases = rewrite_list(&node.cases, |c| v.visit_switch_case(c))?;
    let default_body = visit_opt(v, node.default_body.as_ref())?;
    Ok(Expr::Switch(node.update(switch_value, cases, default_body)))
}

pub fn walk_label<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<LabelSlim>) -> Visited {
    let target = v.visit_label_target(&node.target)?;
    let default_value = visit_opt(v, node.default_value.as_ref())?;
    Ok(Expr::Label(node.update(target, default_value)))
}

pub fn walk_loop<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<LoopSlim>) -> Visited {
    let break_label = visit_opt_label(v, node.break_label.as_ref())?;
    let continue_label = visit_opt_label(v, node.continue_label.as_ref())?;
    let body = v.visit(&node.body)?;
    Ok(Expr::Loop(node.update(body, break_label, continue_label)))
}

pub fn walk_goto<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<GotoSlim>) -> Visited {
    let target = v.visit_label_target(&node.target)?;
    let value = visit_opt(v, node.value.as_ref())?;
    Ok(Expr::Goto(node.update(target, value)))
}

pub fn walk_index<R: Rewriter + ?Sized>(v: &mut R, node: &Arc<IndexSlim>) -> Visited {
    let object = v.visit(&node.object)?;
    let arguments = visit_list(v, &node.arguments)?;
    Ok(Expr::Index(node.update(object, arguments)))
}

pub fn walk_catch_block<R: Rewriter + ?Sized>(
    v: &mut R,
    node: &Arc<CatchBlock>,
) -> Result<Arc<CatchBlock>, SlimError> {
    let variable = rewrite_opt(node.variable.as_ref(), |p| {
        visit_and_convert_parameter(v, p, "CatchBlock.variable")
    })?;
    let filter = visit_opt(v, node.filter.as_ref())?;
    let body = v.visit(&node.body)?;
    Ok(node.update(variable, body, filter))
}

pub fn walk_switch_case<R: Rewriter + ?Sized>(
    v: &mut R,
    node: &Arc<SwitchCase>,
) -> Result<Arc<SwitchCase>, SlimError> {
    let test_values = visit_list(v, &node.test_values)?;
    let body = v.visit(&node.body)?;
    Ok(node.update(test_values, body))
}

pub fn walk_member_binding<R: Rewriter + ?Sized>(
    v: &mut R,
    node: &Arc<MemberBinding>,
) -> Result<Arc<MemberBinding>, SlimError> {
    match &**node {
        MemberBinding::Assignment { expression, .. } => {
            let expression = v.visit(expression)?;
            Ok(node.update_assignment(expression))
        }
        MemberBinding::MemberBind { bindings, .. } => {
            let bindings = rewrite_list(bindings, |b| v.visit_member_binding(b))?;
            Ok(node.update_member_bind(bindings))
        }
        MemberBinding::ListBind { initializers, .. } => {
            let initializers = rewrite_list(initializers, |i| v.visit_element_init(i))?;
            Ok(node.update_list_bind(initializers))
        }
    }
}

pub fn walk_element_init<R: Rewriter + ?Sized>(
    v: &mut R,
    node: &Arc<ElementInit>,
) -> Result<Arc<ElementInit>, SlimError> {
    let arguments = visit_list(v, &node.arguments)?;
    Ok(node.update(arguments))
}

#[cfg(test)]
mod tests;
