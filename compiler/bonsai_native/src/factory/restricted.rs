//! A factory that refuses selected node kinds.

use bonsai_ir::{GotoKind, NodeKind, TypeBinaryOp, UnaryOp};
use rustc_hash::FxHashSet;

use super::{Built, NodeFactory};
use crate::error::FactoryError;
use crate::expr::{
    NativeBinaryOp, NativeBinding, NativeCatch, NativeElementInit, NativeExpr, NativeLabel,
    NativeSwitchCase,
};
use crate::types::{RuntimeMember, RuntimeType, TypeRegistry};
use crate::value::Value;

/// Wraps another factory and fails with [`FactoryError::NotSupported`] for
/// every node kind in its deny set. Auxiliary pieces (catch blocks, switch
/// cases, bindings, labels) are always delegated.
pub struct RestrictedFactory<F> {
    inner: F,
    denied: FxHashSet<NodeKind>,
}

impl<F: NodeFactory> RestrictedFactory<F> {
    pub fn new(inner: F, denied: impl IntoIterator<Item = NodeKind>) -> Self {
        RestrictedFactory {
            inner,
            denied: denied.into_iter().collect(),
        }
    }

    pub fn allows(&self, kind: NodeKind) -> bool {
        !self.denied.contains(&kind)
    }

    pub fn inner(&self) -> &F {
        &self.inner
    }

    fn gate(&self, kind: NodeKind) -> Result<(), FactoryError> {
        if self.allows(kind) {
            Ok(())
        } else {
            tracing::debug!(%kind, "node kind refused by restricted factory");
            Err(FactoryError::NotSupported { kind })
        }
    }
}

impl<F: NodeFactory> NodeFactory for RestrictedFactory<F> {
    fn registry(&self) -> &TypeRegistry {
        self.inner.registry()
    }

    fn binary(
        &self,
        op: NativeBinaryOp,
        left: NativeExpr,
        right: NativeExpr,
        lifted_to_null: bool,
        method: Option<RuntimeMember>,
        conversion: Option<NativeExpr>,
    ) -> Built {
        self.gate(NodeKind::Binary)?;
        self.inner
            .binary(op, left, right, lifted_to_null, method, conversion)
    }

    fn unary(
        &self,
        op: UnaryOp,
        operand: NativeExpr,
        ty: Option<RuntimeType>,
        method: Option<RuntimeMember>,
    ) -> Built {
        self.gate(NodeKind::Unary)?;
        self.inner.unary(op, operand, ty, method)
    }

    fn type_binary(&self, op: TypeBinaryOp, expression: NativeExpr, type_operand: RuntimeType) -> Built {
        self.gate(NodeKind::TypeBinary)?;
        self.inner.type_binary(op, expression, type_operand)
    }

    fn constant(&self, value: Value, ty: RuntimeType) -> Built {
        self.gate(NodeKind::Constant)?;
        self.inner.constant(value, ty)
    }

    fn default_value(&self, ty: RuntimeType) -> Built {
        self.gate(NodeKind::Default)?;
        self.inner.default_value(ty)
    }

    fn parameter(&self, ty: RuntimeType, name: Option<&str>) -> Built {
        self.gate(NodeKind::Parameter)?;
        self.inner.parameter(ty, name)
    }

    fn lambda(
        &self,
        ty: Option<RuntimeType>,
        body: NativeExpr,
        parameters: Vec<NativeExpr>,
        name: Option<&str>,
        tail_call: bool,
    ) -> Built {
        self.gate(NodeKind::Lambda)?;
        self.inner.lambda(ty, body, parameters, name, tail_call)
    }

    fn invoke(&self, expression: NativeExpr, arguments: Vec<NativeExpr>) -> Built {
        self.gate(NodeKind::Invocation)?;
        self.inner.invoke(expression, arguments)
    }

    fn call(&self, object: Option<NativeExpr>, method: RuntimeMember, arguments: Vec<NativeExpr>) -> Built {
        self.gate(NodeKind::MethodCall)?;
        self.inner.call(object, method, arguments)
    }

    fn new_object(&self, constructor: RuntimeMember, arguments: Vec<NativeExpr>) -> Built {
        self.gate(NodeKind::New)?;
        self.inner.new_object(constructor, arguments)
    }

    fn new_value(&self, ty: RuntimeType) -> Built {
        self.gate(NodeKind::New)?;
        self.inner.new_value(ty)
    }

    fn new_array_bounds(&self, element_type: RuntimeType, bounds: Vec<NativeExpr>) -> Built {
        self.gate(NodeKind::NewArrayBounds)?;
        self.inner.new_array_bounds(element_type, bounds)
    }

    fn new_array_init(&self, element_type: RuntimeType, expressions: Vec<NativeExpr>) -> Built {
        self.gate(NodeKind::NewArrayInit)?;
        self.inner.new_array_init(element_type, expressions)
    }

    fn member_access(&self, expression: Option<NativeExpr>, member: RuntimeMember) -> Built {
        self.gate(NodeKind::MemberAccess)?;
        self.inner.member_access(expression, member)
    }

    fn member_init(&self, new_expression: NativeExpr, bindings: Vec<NativeBinding>) -> Built {
        self.gate(NodeKind::MemberInit)?;
        self.inner.member_init(new_expression, bindings)
    }

    fn list_init(&self, new_expression: NativeExpr, initializers: Vec<NativeElementInit>) -> Built {
        self.gate(NodeKind::ListInit)?;
        self.inner.list_init(new_expression, initializers)
    }

    fn member_assignment(&self, member: RuntimeMember, expression: NativeExpr) -> Result<NativeBinding, FactoryError> {
        self.inner.member_assignment(member, expression)
    }

    fn member_bind(&self, member: RuntimeMember, bindings: Vec<NativeBinding>) -> Result<NativeBinding, FactoryError> {
        self.inner.member_bind(member, bindings)
    }

    fn list_bind(
        &self,
        member: RuntimeMember,
        initializers: Vec<NativeElementInit>,
    ) -> Result<NativeBinding, FactoryError> {
        self.inner.list_bind(member, initializers)
    }

    fn element_init(
        &self,
        add_method: RuntimeMember,
        arguments: Vec<NativeExpr>,
    ) -> Result<NativeElementInit, FactoryError> {
        self.inner.element_init(add_method, arguments)
    }

    fn index(&self, object: NativeExpr, indexer: Option<RuntimeMember>, arguments: Vec<NativeExpr>) -> Built {
        self.gate(NodeKind::Index)?;
        self.inner.index(object, indexer, arguments)
    }

    fn condition(
        &self,
        ty: Option<RuntimeType>,
        test: NativeExpr,
        if_true: NativeExpr,
        if_false: NativeExpr,
    ) -> Built {
        self.gate(NodeKind::Conditional)?;
        self.inner.condition(ty, test, if_true, if_false)
    }

    fn block(&self, ty: Option<RuntimeType>, variables: Vec<NativeExpr>, expressions: Vec<NativeExpr>) -> Built {
        self.gate(NodeKind::Block)?;
        self.inner.block(ty, variables, expressions)
    }

    fn try_expr(
        &self,
        ty: Option<RuntimeType>,
        body: NativeExpr,
        handlers: Vec<NativeCatch>,
        finally: Option<NativeExpr>,
        fault: Option<NativeExpr>,
    ) -> Built {
        self.gate(NodeKind::Try)?;
        self.inner.try_expr(ty, body, handlers, finally, fault)
    }

    fn catch_block(
        &self,
        test: RuntimeType,
        variable: Option<NativeExpr>,
        body: NativeExpr,
        filter: Option<NativeExpr>,
    ) -> Result<NativeCatch, FactoryError> {
        self.inner.catch_block(test, variable, body, filter)
    }

    fn switch(
        &self,
        ty: Option<RuntimeType>,
        switch_value: NativeExpr,
        default_body: Option<NativeExpr>,
        comparison: Option<RuntimeMember>,
        cases: Vec<NativeSwitchCase>,
    ) -> Built {
        self.gate(NodeKind::Switch)?;
        self.inner
            .switch(ty, switch_value, default_body, comparison, cases)
    }

    fn switch_case(&self, test_values: Vec<NativeExpr>, body: NativeExpr) -> Result<NativeSwitchCase, FactoryError> {
        self.inner.switch_case(test_values, body)
    }

    fn label_target(&self, ty: Option<RuntimeType>, name: Option<&str>) -> NativeLabel {
        self.inner.label_target(ty, name)
    }

    fn label(&self, target: NativeLabel, default_value: Option<NativeExpr>) -> Built {
        self.gate(NodeKind::Label)?;
        self.inner.label(target, default_value)
    }

    fn loop_expr(
        &self,
        body: NativeExpr,
        break_label: Option<NativeLabel>,
        continue_label: Option<NativeLabel>,
    ) -> Built {
        self.gate(NodeKind::Loop)?;
        self.inner.loop_expr(body, break_label, continue_label)
    }

    fn jump(
        &self,
        kind: GotoKind,
        target: NativeLabel,
        value: Option<NativeExpr>,
        ty: Option<RuntimeType>,
    ) -> Built {
        self.gate(NodeKind::Goto)?;
        self.inner.jump(kind, target, value, ty)
    }
}
