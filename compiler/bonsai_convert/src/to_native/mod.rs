//! Slim to native conversion.
//!
//! The traversal mirrors the rewriting visitor: children first, then the
//! parent is synthesized. Synthesis goes through a [`NodeFactory`] instead
//! of the slim constructors, and every descriptor on the way is resolved
//! through the caller's [`TypeSpace`].
//!
//! Parameters and label targets are converted once per converter. The memo
//! tables are keyed by handle address and keep the slim handle alive next
//! to its native twin, so an address is never reused while it is a key.

use std::sync::Arc;

use bonsai_ir::stack::ensure_sufficient_stack;
use bonsai_ir::{
    BinaryOp, BinarySlim, CatchBlock, ConstantSlim, ElementInit, Expr, LabelRef, LambdaSlim,
    MemberBinding, MemberSlim, NewSlim, NodeKind, ParameterRef, ReduceTarget, SwitchCase, TypeSlim,
};
use bonsai_native::{
    NativeBinaryOp, NativeBinding, NativeCatch, NativeElementInit, NativeExpr, NativeLabel,
    NativeSwitchCase, NodeFactory, RuntimeMember, RuntimeType, RuntimeTypeKind, Value,
};
use rustc_hash::FxHashMap;

use crate::error::ConvertError;
use crate::type_space::TypeSpace;
use crate::ConvertOptions;

type Converted = Result<NativeExpr, ConvertError>;

/// Identity memo: handle address to (slim handle, native counterpart).
type Memo<K, V> = FxHashMap<usize, (K, V)>;

/// Converts slim trees into native trees built by `F`.
///
/// One converter is one identity session: a parameter handle shared by two
/// trees converted with the same converter maps to the same native
/// parameter in both.
pub struct SlimToNative<F> {
    factory: F,
    options: ConvertOptions,
    parameters: Memo<ParameterRef, NativeExpr>,
    labels: Memo<LabelRef, NativeLabel>,
}

impl<F: NodeFactory> SlimToNative<F> {
    pub fn with_factory(factory: F, options: ConvertOptions) -> Self {
        SlimToNative {
            factory,
            options,
            parameters: FxHashMap::default(),
            labels: FxHashMap::default(),
        }
    }

    pub fn factory(&self) -> &F {
        &self.factory
    }

    /// The native parameter `parameter` was converted to, if it was.
    pub fn converted_parameter(&self, parameter: &ParameterRef) -> Option<&NativeExpr> {
        self.parameters
            .get(&(Arc::as_ptr(parameter) as usize))
            .map(|(_, native)| native)
    }

    /// Convert `expr`, resolving descriptors through `space`.
    ///
    /// `space` must be backed by the factory's registry.
    #[tracing::instrument(level = "debug", skip_all, fields(kind = %expr.kind()))]
    pub fn convert(&mut self, expr: &Expr, space: &mut TypeSpace) -> Converted {
        if !std::ptr::eq(self.factory.registry(), Arc::as_ptr(space.registry())) {
            return Err(ConvertError::Invariant(
                "the node factory and the type space use different registries".to_string(),
            ));
        }
        let before = space.resolution_count();
        let mut session = Session {
            factory: &self.factory,
            options: self.options,
            space: &mut *space,
            parameters: &mut self.parameters,
            labels: &mut self.labels,
        };
        let native = session.visit(expr)?;
        tracing::debug!(
            resolutions = space.resolution_count() - before,
            parameters = self.parameters.len(),
            labels = self.labels.len(),
            ty = %native.ty(),
            "converted slim tree"
        );
        Ok(native)
    }
}

/// State of one `convert` call.
struct Session<'a, F> {
    factory: &'a F,
    options: ConvertOptions,
    space: &'a mut TypeSpace,
    parameters: &'a mut Memo<ParameterRef, NativeExpr>,
    labels: &'a mut Memo<LabelRef, NativeLabel>,
}

impl<F: NodeFactory> Session<'_, F> {
    // Descriptors

    fn ty(&mut self, descriptor: &TypeSlim) -> Result<RuntimeType, ConvertError> {
        Ok(self.space.resolve_type(descriptor)?)
    }

    fn opt_ty(&mut self, descriptor: Option<&TypeSlim>) -> Result<Option<RuntimeType>, ConvertError> {
        descriptor.map(|d| self.ty(d)).transpose()
    }

    fn member(&mut self, descriptor: &MemberSlim) -> Result<RuntimeMember, ConvertError> {
        Ok(self.space.resolve_member(descriptor)?)
    }

    fn opt_member(&mut self, descriptor: Option<&MemberSlim>) -> Result<Option<RuntimeMember>, ConvertError> {
        descriptor.map(|d| self.member(d)).transpose()
    }

    // Children

    fn visit(&mut self, expr: &Expr) -> Converted {
        ensure_sufficient_stack(|| self.visit_node(expr))
    }

    fn visit_opt(&mut self, expr: Option<&Expr>) -> Result<Option<NativeExpr>, ConvertError> {
        expr.map(|e| self.visit(e)).transpose()
    }

    fn visit_all<'e>(
        &mut self,
        exprs: impl IntoIterator<Item = &'e Expr>,
    ) -> Result<Vec<NativeExpr>, ConvertError> {
        exprs.into_iter().map(|e| self.visit(e)).collect()
    }

    fn parameter(&mut self, parameter: &ParameterRef) -> Converted {
        let key = Arc::as_ptr(parameter) as usize;
        if let Some((_, native)) = self.parameters.get(&key) {
            return Ok(native.clone());
        }
        let ty = self.ty(&parameter.ty)?;
        let native = self.factory.parameter(ty, parameter.name.as_deref())?;
        self.parameters
            .insert(key, (Arc::clone(parameter), native.clone()));
        Ok(native)
    }

    fn parameter_list(&mut self, parameters: &[ParameterRef]) -> Result<Vec<NativeExpr>, ConvertError> {
        parameters.iter().map(|p| self.parameter(p)).collect()
    }

    fn label(&mut self, target: &LabelRef) -> Result<NativeLabel, ConvertError> {
        let key = Arc::as_ptr(target) as usize;
        if let Some((_, native)) = self.labels.get(&key) {
            return Ok(native.clone());
        }
        let ty = self.opt_ty(target.ty.as_ref())?;
        let native = self.factory.label_target(ty, target.name.as_deref());
        self.labels.insert(key, (Arc::clone(target), native.clone()));
        Ok(native)
    }

    fn opt_label(&mut self, target: Option<&LabelRef>) -> Result<Option<NativeLabel>, ConvertError> {
        target.map(|t| self.label(t)).transpose()
    }

    // Nodes

    fn visit_node(&mut self, expr: &Expr) -> Converted {
        let factory = self.factory;
        match expr {
            Expr::Binary(n) => self.binary(n),
            Expr::Unary(n) => {
                let operand = self.visit(&n.operand)?;
                let ty = self.opt_ty(n.ty.as_ref())?;
                let method = self.opt_member(n.method.as_ref())?;
                Ok(factory.unary(n.op, operand, ty, method)?)
            }
            Expr::Constant(n) => self.constant(n),
            Expr::Default(n) => {
                let ty = self.ty(&n.ty)?;
                Ok(factory.default_value(ty)?)
            }
            Expr::Parameter(p) => self.parameter(p),
            Expr::Lambda(n) => self.lambda(n),
            Expr::Invocation(n) => {
                let expression = self.visit(&n.expression)?;
                let arguments = self.visit_all(&n.arguments)?;
                Ok(factory.invoke(expression, arguments)?)
            }
            Expr::MethodCall(n) => {
                let object = self.visit_opt(n.object.as_ref())?;
                let method = self.member(&n.method)?;
                let arguments = self.visit_all(&n.arguments)?;
                Ok(factory.call(object, method, arguments)?)
            }
            Expr::New(n) => self.new_expr(n),
            Expr::NewArrayBounds(n) => {
                let element_type = self.ty(&n.element_type)?;
                let bounds = self.visit_all(n.bounds.iter())?;
                Ok(factory.new_array_bounds(element_type, bounds)?)
            }
            Expr::NewArrayInit(n) => {
                let element_type = self.ty(&n.element_type)?;
                let expressions = self.visit_all(n.expressions.iter())?;
                Ok(factory.new_array_init(element_type, expressions)?)
            }
            Expr::MemberAccess(n) => {
                let expression = self.visit_opt(n.expression.as_ref())?;
                let member = self.member(&n.member)?;
                Ok(factory.member_access(expression, member)?)
            }
            Expr::MemberInit(n) => {
                let new_expression = self.new_expr(&n.new_expression)?;
                let new_expression = expect_kind(new_expression, NodeKind::New, "member initializer")?;
                let bindings = n
                    .bindings
                    .iter()
                    .map(|b| self.binding(b))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(factory.member_init(new_expression, bindings)?)
            }
            Expr::ListInit(n) => {
                let new_expression = self.new_expr(&n.new_expression)?;
                let new_expression = expect_kind(new_expression, NodeKind::New, "list initializer")?;
                let initializers = self.element_inits(&n.initializers)?;
                Ok(factory.list_init(new_expression, initializers)?)
            }
            Expr::Conditional(n) => {
                let test = self.visit(&n.test)?;
                let if_true = self.visit(&n.if_true)?;
                let if_false = self.visit(&n.if_false)?;
                let ty = self.opt_ty(n.ty.as_ref())?;
                Ok(factory.condition(ty, test, if_true, if_false)?)
            }
            Expr::TypeBinary(n) => {
                let expression = self.visit(&n.expression)?;
                let type_operand = self.ty(&n.type_operand)?;
                Ok(factory.type_binary(n.op, expression, type_operand)?)
            }
            Expr::Block(n) => {
                let variables = self.parameter_list(&n.variables)?;
                let expressions = self.visit_all(n.expressions.iter())?;
                let ty = self.opt_ty(n.ty.as_ref())?;
                Ok(factory.block(ty, variables, expressions)?)
            }
            Expr::Try(n) => {
                let body = self.visit(&n.body)?;
                let handlers = n
                    .handlers
                    .iter()
                    .map(|h| self.catch_block(h))
                    .collect::<Result<Vec<_>, _>>()?;
                let finally = self.visit_opt(n.finally.as_ref())?;
                let fault = self.visit_opt(n.fault.as_ref())?;
                let ty = self.opt_ty(n.ty.as_ref())?;
                Ok(factory.try_expr(ty, body, handlers, finally, fault)?)
            }
            Expr::Switch(n) => {
                let switch_value = self.visit(&n.switch_value)?;
                let default_body = self.visit_opt(n.default_body.as_ref())?;
                let comparison = self.opt_member(n.comparison.as_ref())?;
                let cases = n
                    .cases
                    .iter()
                    .map(|c| self.switch_case(c))
                    .collect::<Result<Vec<_>, _>>()?;
                let ty = self.opt_ty(n.ty.as_ref())?;
                Ok(factory.switch(ty, switch_value, default_body, comparison, cases)?)
            }
            Expr::Label(n) => {
                let target = self.label(&n.target)?;
                let default_value = self.visit_opt(n.default_value.as_ref())?;
                Ok(factory.label(target, default_value)?)
            }
            Expr::Loop(n) => {
                let body = self.visit(&n.body)?;
                let break_label = self.opt_label(n.break_label.as_ref())?;
                let continue_label = self.opt_label(n.continue_label.as_ref())?;
                Ok(factory.loop_expr(body, break_label, continue_label)?)
            }
            Expr::Goto(n) => {
                let target = self.label(&n.target)?;
                let value = self.visit_opt(n.value.as_ref())?;
                let ty = self.opt_ty(n.ty.as_ref())?;
                Ok(factory.jump(n.kind, target, value, ty)?)
            }
            Expr::Index(n) => {
                let object = self.visit(&n.object)?;
                let indexer = self.opt_member(n.indexer.as_ref())?;
                let arguments = self.visit_all(n.arguments.iter())?;
                Ok(factory.index(object, indexer, arguments)?)
            }
        }
    }

    fn binary(&mut self, n: &BinarySlim) -> Converted {
        let left = self.visit(&n.left)?;
        let right = self.visit(&n.right)?;
        let method = self.opt_member(n.method.as_ref())?;
        let conversion = match &n.conversion {
            Some(lambda) => {
                let lambda = self.lambda(lambda)?;
                Some(expect_kind(lambda, NodeKind::Lambda, "binary conversion")?)
            }
            None => None,
        };
        let op = self.operator(n, &left, &right);
        Ok(self
            .factory
            .binary(op, left, right, n.lifted_to_null, method, conversion)?)
    }

    /// `==`/`!=` between two reference types with no operator method means
    /// reference identity.
    fn operator(&self, n: &BinarySlim, left: &NativeExpr, right: &NativeExpr) -> NativeBinaryOp {
        let by_reference = self.options.lower_reference_equality
            && n.method.is_none()
            && n.conversion.is_none()
            && !left.ty().is_value_type()
            && !right.ty().is_value_type();
        match n.op {
            BinaryOp::Equal if by_reference => {
                tracing::trace!(left = %left.ty(), right = %right.ty(), "lowered == to reference equality");
                NativeBinaryOp::ReferenceEqual
            }
            BinaryOp::NotEqual if by_reference => {
                tracing::trace!(left = %left.ty(), right = %right.ty(), "lowered != to reference inequality");
                NativeBinaryOp::ReferenceNotEqual
            }
            op => op.into(),
        }
    }

    fn constant(&mut self, n: &ConstantSlim) -> Converted {
        let ty = self.ty(&n.ty)?;
        let literal = n.value.reduce(&reduce_target(&ty))?;
        let value = Value::from_literal(&literal, &ty, self.factory.registry());
        Ok(self.factory.constant(value, ty)?)
    }

    fn lambda(&mut self, n: &LambdaSlim) -> Converted {
        let parameters = self.parameter_list(&n.parameters)?;
        let body = self.visit(&n.body)?;
        let ty = self.opt_ty(n.ty.as_ref())?;
        Ok(self
            .factory
            .lambda(ty, body, parameters, n.name.as_deref(), n.tail_call)?)
    }

    fn new_expr(&mut self, n: &NewSlim) -> Converted {
        match &n.constructor {
            Some(constructor) => {
                let constructor = self.member(constructor)?;
                let arguments = self.visit_all(&n.arguments)?;
                Ok(self.factory.new_object(constructor, arguments)?)
            }
            None => {
                let ty = self.ty(&n.constructed_type())?;
                Ok(self.factory.new_value(ty)?)
            }
        }
    }

    fn binding(&mut self, binding: &MemberBinding) -> Result<NativeBinding, ConvertError> {
        match binding {
            MemberBinding::Assignment { member, expression } => {
                let member = self.member(member)?;
                let expression = self.visit(expression)?;
                Ok(self.factory.member_assignment(member, expression)?)
            }
            MemberBinding::MemberBind { member, bindings } => {
                let member = self.member(member)?;
                let bindings = bindings
                    .iter()
                    .map(|b| self.binding(b))
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(self.factory.member_bind(member, bindings)?)
            }
            MemberBinding::ListBind {
                member,
                initializers,
            } => {
                let member = self.member(member)?;
                let initializers = self.element_inits(initializers)?;
                Ok(self.factory.list_bind(member, initializers)?)
            }
        }
    }

    fn element_inits(&mut self, initializers: &[Arc<ElementInit>]) -> Result<Vec<NativeElementInit>, ConvertError> {
        initializers
            .iter()
            .map(|init| {
                let add_method = self.member(&init.add_method)?;
                let arguments = self.visit_all(init.arguments.iter())?;
                Ok(self.factory.element_init(add_method, arguments)?)
            })
            .collect()
    }

    fn catch_block(&mut self, handler: &CatchBlock) -> Result<NativeCatch, ConvertError> {
        let test = self.ty(&handler.test)?;
        let variable = handler
            .variable
            .as_ref()
            .map(|p| self.parameter(p))
            .transpose()?;
        let body = self.visit(&handler.body)?;
        let filter = self.visit_opt(handler.filter.as_ref())?;
        Ok(self.factory.catch_block(test, variable, body, filter)?)
    }

    fn switch_case(&mut self, case: &SwitchCase) -> Result<NativeSwitchCase, ConvertError> {
        let test_values = self.visit_all(case.test_values.iter())?;
        let body = self.visit(&case.body)?;
        Ok(self.factory.switch_case(test_values, body)?)
    }
}

/// What a boxed constant of type `ty` has to reduce to.
fn reduce_target(ty: &RuntimeType) -> ReduceTarget {
    if let Some(p) = ty.primitive() {
        return ReduceTarget::Primitive(p);
    }
    if let Some(inner) = ty.nullable_underlying() {
        return match inner.primitive() {
            Some(p) => ReduceTarget::Nullable(p),
            // Only null fits a nullable user struct.
            None => ReduceTarget::Reference,
        };
    }
    match ty.kind() {
        RuntimeTypeKind::Array {
            element,
            rank: None,
        } => ReduceTarget::Array(Box::new(reduce_target(element))),
        _ if ty.is_value_type() => ReduceTarget::OpaqueValue,
        _ => ReduceTarget::Reference,
    }
}

fn expect_kind(expr: NativeExpr, expected: NodeKind, site: &str) -> Converted {
    if expr.node_kind() == expected {
        Ok(expr)
    } else {
        Err(ConvertError::Invariant(format!(
            "{site} must convert to a {expected} node, got {}",
            expr.node_kind()
        )))
    }
}
