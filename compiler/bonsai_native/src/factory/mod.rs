//! Validating construction of native nodes.
//!
//! [`NodeFactory`] has one method per node kind. The provided method bodies
//! are the full algebra: they check the children, compute the node type
//! (the same recomputation rules slim nodes use, applied to runtime types)
//! and build the node. An implementor only has to supply
//! [`NodeFactory::registry`]; wrappers such as [`RestrictedFactory`]
//! override individual methods and delegate the rest.

mod restricted;

use std::sync::Arc;

use bonsai_ir::{BinaryOp, GotoKind, NodeKind, Primitive, TypeBinaryOp, UnaryOp};
use rustc_hash::FxHashSet;

pub use restricted::RestrictedFactory;

use crate::error::FactoryError;
use crate::expr::{
    NativeBinaryOp, NativeBinding, NativeCatch, NativeElementInit, NativeExpr, NativeKind,
    NativeLabel, NativeSwitchCase,
};
use crate::types::{RuntimeMember, RuntimeType, TypeRegistry};
use crate::value::Value;

pub type Built = Result<NativeExpr, FactoryError>;

/// Factory over the full native algebra; see the module docs.
pub trait NodeFactory {
    /// Registry used to derive node types.
    fn registry(&self) -> &TypeRegistry;

    // Operators

    fn binary(
        &self,
        op: NativeBinaryOp,
        left: NativeExpr,
        right: NativeExpr,
        lifted_to_null: bool,
        method: Option<RuntimeMember>,
        conversion: Option<NativeExpr>,
    ) -> Built {
        const KIND: NodeKind = NodeKind::Binary;
        if let Some(conversion) = &conversion {
            if !op.slim().is_some_and(BinaryOp::accepts_conversion) {
                return Err(FactoryError::invalid(
                    KIND,
                    format!("operator `{op}` does not take a conversion"),
                ));
            }
            if conversion.lambda_parameters().map(<[_]>::len) != Some(1) {
                return Err(FactoryError::invalid(
                    KIND,
                    "a conversion must be a lambda of exactly one parameter",
                ));
            }
        }
        if let Some(m) = &method {
            check_static_method(KIND, m, 2)?;
        }
        if lifted_to_null && !op.is_comparison() {
            return Err(FactoryError::invalid(
                KIND,
                format!("only comparisons can be lifted to null, not `{op}`"),
            ));
        }
        match op {
            NativeBinaryOp::ReferenceEqual | NativeBinaryOp::ReferenceNotEqual => {
                if left.ty().is_value_type() || right.ty().is_value_type() {
                    return Err(FactoryError::invalid(
                        KIND,
                        format!(
                            "`{op}` needs reference operands, found {} and {}",
                            left.ty(),
                            right.ty()
                        ),
                    ));
                }
            }
            NativeBinaryOp::Slim(op) if method.is_none() => {
                check_slim_operands(op, &left, &right)?;
            }
            NativeBinaryOp::Slim(op) if op.is_assignment() => {
                check_assignment_target(&left)?;
            }
            NativeBinaryOp::Slim(_) => {}
        }
        let ty = binary_type(
            self.registry(),
            op,
            &left,
            &right,
            lifted_to_null,
            method.as_ref(),
        );
        Ok(NativeExpr::new(
            ty,
            NativeKind::Binary {
                op,
                left,
                right,
                lifted_to_null,
                method,
                conversion,
            },
        ))
    }

    /// Unary node. `ty` is required by conversions and otherwise overrides
    /// the derived type.
    fn unary(
        &self,
        op: UnaryOp,
        operand: NativeExpr,
        ty: Option<RuntimeType>,
        method: Option<RuntimeMember>,
    ) -> Built {
        const KIND: NodeKind = NodeKind::Unary;
        if op.requires_type() && ty.is_none() {
            return Err(FactoryError::invalid(
                KIND,
                format!("`{op}` requires an explicit result type"),
            ));
        }
        if let Some(m) = &method {
            check_static_method(KIND, m, 1)?;
        }
        let registry = self.registry();
        if method.is_none() {
            match op {
                UnaryOp::ArrayLength if operand.ty().array_rank() != Some(1) => {
                    return Err(FactoryError::invalid(
                        KIND,
                        format!("`length` needs a vector, found {}", operand.ty()),
                    ));
                }
                UnaryOp::IsTrue | UnaryOp::IsFalse
                    if operand.ty().non_nullable() != &registry.bool() =>
                {
                    return Err(FactoryError::invalid(
                        KIND,
                        format!("`{op}` needs a bool operand, found {}", operand.ty()),
                    ));
                }
                UnaryOp::TypeAs if ty.as_ref().is_some_and(|t| !t.admits_null()) => {
                    return Err(FactoryError::invalid(
                        KIND,
                        "`as` needs a target type that admits null",
                    ));
                }
                _ => {}
            }
        }
        let ty = match ty {
            Some(ty) => ty,
            None => unary_type(registry, op, &operand, method.as_ref()),
        };
        Ok(NativeExpr::new(
            ty,
            NativeKind::Unary {
                op,
                operand,
                method,
            },
        ))
    }

    fn type_binary(&self, op: TypeBinaryOp, expression: NativeExpr, type_operand: RuntimeType) -> Built {
        Ok(NativeExpr::new(
            self.registry().bool(),
            NativeKind::TypeBinary {
                op,
                expression,
                type_operand,
            },
        ))
    }

    // Leaves and functions

    fn constant(&self, value: Value, ty: RuntimeType) -> Built {
        let fits = match value.runtime_type(self.registry()) {
            None => ty.admits_null(),
            Some(actual) => ty.is_assignable_from(&actual),
        };
        if !fits {
            return Err(FactoryError::invalid(
                NodeKind::Constant,
                format!("a constant of type {ty} cannot hold {value}"),
            ));
        }
        Ok(NativeExpr::new(ty, NativeKind::Constant { value }))
    }

    fn default_value(&self, ty: RuntimeType) -> Built {
        Ok(NativeExpr::new(ty, NativeKind::Default))
    }

    /// A fresh parameter or block variable.
    fn parameter(&self, ty: RuntimeType, name: Option<&str>) -> Built {
        if ty.is_void() {
            return Err(FactoryError::invalid(
                NodeKind::Parameter,
                "a parameter cannot be void",
            ));
        }
        Ok(NativeExpr::new(
            ty,
            NativeKind::Parameter {
                name: name.map(Arc::from),
            },
        ))
    }

    /// Lambda. An explicit `ty` must be a function type whose parameter
    /// count matches and whose result accepts the body.
    fn lambda(
        &self,
        ty: Option<RuntimeType>,
        body: NativeExpr,
        parameters: Vec<NativeExpr>,
        name: Option<&str>,
        tail_call: bool,
    ) -> Built {
        const KIND: NodeKind = NodeKind::Lambda;
        distinct_parameters(KIND, "parameter", &parameters)?;
        let ty = match ty {
            Some(ty) => {
                let Some((params, result)) = ty.function_signature() else {
                    return Err(FactoryError::invalid(KIND, format!("{ty} is not a function type")));
                };
                if params.len() != parameters.len() {
                    return Err(FactoryError::invalid(
                        KIND,
                        format!(
                            "function type {ty} takes {} parameter(s), lambda declares {}",
                            params.len(),
                            parameters.len()
                        ),
                    ));
                }
                if !result.is_void() && !result.is_assignable_from(body.ty()) {
                    return Err(FactoryError::invalid(
                        KIND,
                        format!("body of type {} does not produce {result}", body.ty()),
                    ));
                }
                ty
            }
            None => {
                let params: Vec<RuntimeType> = parameters.iter().map(|p| p.ty().clone()).collect();
                self.registry().function_type(&params, body.ty())
            }
        };
        Ok(NativeExpr::new(
            ty,
            NativeKind::Lambda {
                body,
                parameters: parameters.into(),
                name: name.map(Arc::from),
                tail_call,
            },
        ))
    }

    fn invoke(&self, expression: NativeExpr, arguments: Vec<NativeExpr>) -> Built {
        const KIND: NodeKind = NodeKind::Invocation;
        let callee = expression.ty().clone();
        let Some((params, result)) = callee.function_signature() else {
            return Err(FactoryError::invalid(
                KIND,
                format!("cannot invoke a value of type {callee}"),
            ));
        };
        check_arguments(KIND, &callee.to_string(), params, &arguments)?;
        Ok(NativeExpr::new(
            result.clone(),
            NativeKind::Invocation {
                expression,
                arguments: arguments.into(),
            },
        ))
    }

    // Calls and construction

    fn call(&self, object: Option<NativeExpr>, method: RuntimeMember, arguments: Vec<NativeExpr>) -> Built {
        const KIND: NodeKind = NodeKind::MethodCall;
        if !method.is_method() {
            return Err(FactoryError::invalid(KIND, format!("{method} is not a method")));
        }
        match (method.is_static(), &object) {
            (true, Some(_)) => {
                return Err(FactoryError::invalid(
                    KIND,
                    format!("static method {method} cannot have an instance"),
                ));
            }
            (false, None) => {
                return Err(FactoryError::invalid(
                    KIND,
                    format!("instance method {method} requires an instance"),
                ));
            }
            (false, Some(object)) => check_instance(KIND, &method, object)?,
            (true, None) => {}
        }
        if method.is_open_generic() {
            return Err(FactoryError::invalid(
                KIND,
                format!("generic method {method} is not closed"),
            ));
        }
        check_arguments(KIND, &method.to_string(), method.parameter_types(), &arguments)?;
        Ok(NativeExpr::new(
            method.member_type().clone(),
            NativeKind::MethodCall {
                object,
                method,
                arguments: arguments.into(),
            },
        ))
    }

    fn new_object(&self, constructor: RuntimeMember, arguments: Vec<NativeExpr>) -> Built {
        const KIND: NodeKind = NodeKind::New;
        if !constructor.is_constructor() {
            return Err(FactoryError::invalid(
                KIND,
                format!("{constructor} is not a constructor"),
            ));
        }
        check_arguments(
            KIND,
            &constructor.to_string(),
            constructor.parameter_types(),
            &arguments,
        )?;
        Ok(NativeExpr::new(
            constructor.declaring_type().clone(),
            NativeKind::New {
                constructor: Some(constructor),
                arguments: arguments.into(),
            },
        ))
    }

    /// Parameterless construction of a value type.
    fn new_value(&self, ty: RuntimeType) -> Built {
        if !ty.is_value_type() || ty.is_void() {
            return Err(FactoryError::invalid(
                NodeKind::New,
                format!("{ty} is not a value type and needs a constructor"),
            ));
        }
        Ok(NativeExpr::new(
            ty,
            NativeKind::New {
                constructor: None,
                arguments: Vec::new().into(),
            },
        ))
    }

    fn new_array_bounds(&self, element_type: RuntimeType, bounds: Vec<NativeExpr>) -> Built {
        const KIND: NodeKind = NodeKind::NewArrayBounds;
        if bounds.is_empty() {
            return Err(FactoryError::invalid(KIND, "at least one bound is required"));
        }
        if let Some(bound) = bounds.iter().find(|b| !is_integer(b.ty())) {
            return Err(FactoryError::invalid(
                KIND,
                format!("array bounds must be integers, found {}", bound.ty()),
            ));
        }
        let rank = match u32::try_from(bounds.len()) {
            Ok(1) | Err(_) => None,
            Ok(rank) => Some(rank),
        };
        let ty = self.registry().array_of(&element_type, rank);
        Ok(NativeExpr::new(
            ty,
            NativeKind::NewArrayBounds {
                element_type,
                bounds: bounds.into(),
            },
        ))
    }

    fn new_array_init(&self, element_type: RuntimeType, expressions: Vec<NativeExpr>) -> Built {
        if let Some(item) = expressions
            .iter()
            .find(|e| !element_type.is_assignable_from(e.ty()))
        {
            return Err(FactoryError::invalid(
                NodeKind::NewArrayInit,
                format!("cannot store {} in an array of {element_type}", item.ty()),
            ));
        }
        let ty = self.registry().array_of(&element_type, None);
        Ok(NativeExpr::new(
            ty,
            NativeKind::NewArrayInit {
                element_type,
                expressions: expressions.into(),
            },
        ))
    }

    /// Field or property read. Runtime fields and properties are instance
    /// members, so `expression` is required.
    fn member_access(&self, expression: Option<NativeExpr>, member: RuntimeMember) -> Built {
        const KIND: NodeKind = NodeKind::MemberAccess;
        check_data_member(KIND, &member)?;
        let Some(object) = &expression else {
            return Err(FactoryError::invalid(
                KIND,
                format!("instance member {member} requires an instance"),
            ));
        };
        check_instance(KIND, &member, object)?;
        Ok(NativeExpr::new(
            member.member_type().clone(),
            NativeKind::MemberAccess { expression, member },
        ))
    }

    fn member_init(&self, new_expression: NativeExpr, bindings: Vec<NativeBinding>) -> Built {
        const KIND: NodeKind = NodeKind::MemberInit;
        check_new(KIND, &new_expression)?;
        for binding in &bindings {
            let member = binding.member();
            if !member.declaring_type().is_assignable_from(new_expression.ty()) {
                return Err(FactoryError::invalid(
                    KIND,
                    format!("{member} is not a member of {}", new_expression.ty()),
                ));
            }
        }
        Ok(NativeExpr::new(
            new_expression.ty().clone(),
            NativeKind::MemberInit {
                new_expression,
                bindings: bindings.into(),
            },
        ))
    }

    fn list_init(&self, new_expression: NativeExpr, initializers: Vec<NativeElementInit>) -> Built {
        const KIND: NodeKind = NodeKind::ListInit;
        check_new(KIND, &new_expression)?;
        if initializers.is_empty() {
            return Err(FactoryError::invalid(
                KIND,
                "at least one element initializer is required",
            ));
        }
        Ok(NativeExpr::new(
            new_expression.ty().clone(),
            NativeKind::ListInit {
                new_expression,
                initializers: initializers.into(),
            },
        ))
    }

    fn member_assignment(&self, member: RuntimeMember, expression: NativeExpr) -> Result<NativeBinding, FactoryError> {
        const KIND: NodeKind = NodeKind::MemberInit;
        check_data_member(KIND, &member)?;
        if !member.member_type().is_assignable_from(expression.ty()) {
            return Err(FactoryError::invalid(
                KIND,
                format!("cannot assign {} to {member}", expression.ty()),
            ));
        }
        Ok(NativeBinding::Assignment { member, expression })
    }

    fn member_bind(&self, member: RuntimeMember, bindings: Vec<NativeBinding>) -> Result<NativeBinding, FactoryError> {
        check_data_member(NodeKind::MemberInit, &member)?;
        Ok(NativeBinding::MemberBind {
            member,
            bindings: bindings.into(),
        })
    }

    fn list_bind(
        &self,
        member: RuntimeMember,
        initializers: Vec<NativeElementInit>,
    ) -> Result<NativeBinding, FactoryError> {
        check_data_member(NodeKind::MemberInit, &member)?;
        Ok(NativeBinding::ListBind {
            member,
            initializers: initializers.into(),
        })
    }

    fn element_init(
        &self,
        add_method: RuntimeMember,
        arguments: Vec<NativeExpr>,
    ) -> Result<NativeElementInit, FactoryError> {
        const KIND: NodeKind = NodeKind::ListInit;
        if !add_method.is_method() || add_method.is_static() {
            return Err(FactoryError::invalid(
                KIND,
                format!("{add_method} must be an instance method"),
            ));
        }
        check_arguments(
            KIND,
            &add_method.to_string(),
            add_method.parameter_types(),
            &arguments,
        )?;
        Ok(NativeElementInit {
            add_method,
            arguments: arguments.into(),
        })
    }

    fn index(&self, object: NativeExpr, indexer: Option<RuntimeMember>, arguments: Vec<NativeExpr>) -> Built {
        const KIND: NodeKind = NodeKind::Index;
        if arguments.is_empty() {
            return Err(FactoryError::invalid(
                KIND,
                "at least one index argument is required",
            ));
        }
        let ty = match &indexer {
            Some(indexer) => {
                if !indexer.is_property() || indexer.parameter_types().is_empty() {
                    return Err(FactoryError::invalid(
                        KIND,
                        format!("{indexer} is not an indexer property"),
                    ));
                }
                check_instance(KIND, indexer, &object)?;
                check_arguments(
                    KIND,
                    &indexer.to_string(),
                    indexer.parameter_types(),
                    &arguments,
                )?;
                indexer.member_type().clone()
            }
            None => {
                let rank = object.ty().array_rank();
                if rank.and_then(|r| usize::try_from(r).ok()) != Some(arguments.len()) {
                    return Err(FactoryError::invalid(
                        KIND,
                        format!(
                            "{} cannot be indexed by {} argument(s)",
                            object.ty(),
                            arguments.len()
                        ),
                    ));
                }
                if let Some(arg) = arguments.iter().find(|a| !is_integer(a.ty())) {
                    return Err(FactoryError::invalid(
                        KIND,
                        format!("array indices must be integers, found {}", arg.ty()),
                    ));
                }
                object
                    .ty()
                    .element_type()
                    .cloned()
                    .unwrap_or_else(|| self.registry().object())
            }
        };
        Ok(NativeExpr::new(
            ty,
            NativeKind::Index {
                object,
                indexer,
                arguments: arguments.into(),
            },
        ))
    }

    // Control flow

    /// Conditional. Without `ty` both branches must have the same type.
    fn condition(
        &self,
        ty: Option<RuntimeType>,
        test: NativeExpr,
        if_true: NativeExpr,
        if_false: NativeExpr,
    ) -> Built {
        const KIND: NodeKind = NodeKind::Conditional;
        let registry = self.registry();
        if test.ty() != &registry.bool() {
            return Err(FactoryError::invalid(
                KIND,
                format!("the test must be bool, found {}", test.ty()),
            ));
        }
        let ty = match ty {
            Some(ty) if ty.is_void() => ty,
            Some(ty) => {
                for branch in [&if_true, &if_false] {
                    if !ty.is_assignable_from(branch.ty()) {
                        return Err(FactoryError::invalid(
                            KIND,
                            format!("branch of type {} does not produce {ty}", branch.ty()),
                        ));
                    }
                }
                ty
            }
            None if if_true.ty() == if_false.ty() => if_true.ty().clone(),
            None => {
                return Err(FactoryError::invalid(
                    KIND,
                    format!(
                        "branches have different types: {} and {}",
                        if_true.ty(),
                        if_false.ty()
                    ),
                ));
            }
        };
        Ok(NativeExpr::new(
            ty,
            NativeKind::Conditional {
                test,
                if_true,
                if_false,
            },
        ))
    }

    fn block(&self, ty: Option<RuntimeType>, variables: Vec<NativeExpr>, expressions: Vec<NativeExpr>) -> Built {
        const KIND: NodeKind = NodeKind::Block;
        distinct_parameters(KIND, "variable", &variables)?;
        let Some(last) = expressions.last() else {
            return Err(FactoryError::invalid(
                KIND,
                "a block needs at least one expression",
            ));
        };
        let ty = ty.unwrap_or_else(|| last.ty().clone());
        Ok(NativeExpr::new(
            ty,
            NativeKind::Block {
                variables: variables.into(),
                expressions: expressions.into(),
            },
        ))
    }

    /// `try` with catch handlers, a finally block, or a fault block.
    fn try_expr(
        &self,
        ty: Option<RuntimeType>,
        body: NativeExpr,
        handlers: Vec<NativeCatch>,
        finally: Option<NativeExpr>,
        fault: Option<NativeExpr>,
    ) -> Built {
        const KIND: NodeKind = NodeKind::Try;
        match (fault.is_some(), handlers.is_empty(), finally.is_some()) {
            (true, false, _) | (true, _, true) => {
                return Err(FactoryError::invalid(
                    KIND,
                    "a fault block cannot be combined with catch handlers or a finally block",
                ));
            }
            (false, true, false) => {
                return Err(FactoryError::invalid(
                    KIND,
                    "needs at least one catch handler or a finally block",
                ));
            }
            _ => {}
        }
        let ty = ty.unwrap_or_else(|| body.ty().clone());
        Ok(NativeExpr::new(
            ty,
            NativeKind::Try {
                body,
                handlers: handlers.into(),
                finally,
                fault,
            },
        ))
    }

    fn catch_block(
        &self,
        test: RuntimeType,
        variable: Option<NativeExpr>,
        body: NativeExpr,
        filter: Option<NativeExpr>,
    ) -> Result<NativeCatch, FactoryError> {
        const KIND: NodeKind = NodeKind::Try;
        if let Some(variable) = &variable {
            if !variable.is_parameter() {
                return Err(FactoryError::invalid(
                    KIND,
                    format!("catch variable must be a parameter, found {}", variable.node_kind()),
                ));
            }
            if !variable.ty().is_assignable_from(&test) {
                return Err(FactoryError::invalid(
                    KIND,
                    format!("catch variable of type {} cannot hold {test}", variable.ty()),
                ));
            }
        }
        if let Some(filter) = &filter {
            if filter.ty() != &self.registry().bool() {
                return Err(FactoryError::invalid(
                    KIND,
                    format!("catch filter must be bool, found {}", filter.ty()),
                ));
            }
        }
        Ok(NativeCatch {
            test,
            variable,
            body,
            filter,
        })
    }

    /// Switch. Without a comparison method every test value must have the
    /// switch value's type.
    fn switch(
        &self,
        ty: Option<RuntimeType>,
        switch_value: NativeExpr,
        default_body: Option<NativeExpr>,
        comparison: Option<RuntimeMember>,
        cases: Vec<NativeSwitchCase>,
    ) -> Built {
        const KIND: NodeKind = NodeKind::Switch;
        if cases.is_empty() && default_body.is_none() {
            return Err(FactoryError::invalid(
                KIND,
                "a switch needs at least one case or a default body",
            ));
        }
        match &comparison {
            Some(m) => check_static_method(KIND, m, 2)?,
            None => {
                let mismatch = cases
                    .iter()
                    .flat_map(|c| c.test_values.iter())
                    .find(|v| v.ty() != switch_value.ty());
                if let Some(value) = mismatch {
                    return Err(FactoryError::invalid(
                        KIND,
                        format!(
                            "test value of type {} cannot match a switch over {}",
                            value.ty(),
                            switch_value.ty()
                        ),
                    ));
                }
            }
        }
        let ty = match ty {
            Some(ty) => ty,
            None => match (cases.first(), &default_body) {
                (Some(case), _) => case.body.ty().clone(),
                (None, Some(body)) => body.ty().clone(),
                (None, None) => self.registry().void(),
            },
        };
        Ok(NativeExpr::new(
            ty,
            NativeKind::Switch {
                switch_value,
                default_body,
                comparison,
                cases: cases.into(),
            },
        ))
    }

    fn switch_case(&self, test_values: Vec<NativeExpr>, body: NativeExpr) -> Result<NativeSwitchCase, FactoryError> {
        if test_values.is_empty() {
            return Err(FactoryError::invalid(
                NodeKind::Switch,
                "a switch case needs at least one test value",
            ));
        }
        Ok(NativeSwitchCase {
            test_values: test_values.into(),
            body,
        })
    }

    /// A fresh jump target; `None` is a `void` label.
    fn label_target(&self, ty: Option<RuntimeType>, name: Option<&str>) -> NativeLabel {
        NativeLabel::new(ty.unwrap_or_else(|| self.registry().void()), name)
    }

    /// Label. A non-void label needs a default value of its type.
    fn label(&self, target: NativeLabel, default_value: Option<NativeExpr>) -> Built {
        const KIND: NodeKind = NodeKind::Label;
        match &default_value {
            None if !target.ty().is_void() => {
                return Err(FactoryError::invalid(
                    KIND,
                    format!("label of type {} needs a default value", target.ty()),
                ));
            }
            Some(value) if !target.ty().is_void() && !target.ty().is_assignable_from(value.ty()) => {
                return Err(FactoryError::invalid(
                    KIND,
                    format!(
                        "default value of type {} does not fit label of type {}",
                        value.ty(),
                        target.ty()
                    ),
                ));
            }
            _ => {}
        }
        Ok(NativeExpr::new(
            target.ty().clone(),
            NativeKind::Label {
                target,
                default_value,
            },
        ))
    }

    fn loop_expr(
        &self,
        body: NativeExpr,
        break_label: Option<NativeLabel>,
        continue_label: Option<NativeLabel>,
    ) -> Built {
        if continue_label.as_ref().is_some_and(|l| !l.ty().is_void()) {
            return Err(FactoryError::invalid(
                NodeKind::Loop,
                "the continue label must be void",
            ));
        }
        let ty = match &break_label {
            Some(label) => label.ty().clone(),
            None => self.registry().void(),
        };
        Ok(NativeExpr::new(
            ty,
            NativeKind::Loop {
                body,
                break_label,
                continue_label,
            },
        ))
    }

    /// Jump of any flavor. The value must fit the label; `ty` is the type
    /// the jump claims to have, `void` by default.
    fn jump(
        &self,
        kind: GotoKind,
        target: NativeLabel,
        value: Option<NativeExpr>,
        ty: Option<RuntimeType>,
    ) -> Built {
        const KIND: NodeKind = NodeKind::Goto;
        match &value {
            None if !target.ty().is_void() => {
                return Err(FactoryError::invalid(
                    KIND,
                    format!("jump to a label of type {} needs a value", target.ty()),
                ));
            }
            Some(v) if !target.ty().is_void() && !target.ty().is_assignable_from(v.ty()) => {
                return Err(FactoryError::invalid(
                    KIND,
                    format!("value of type {} does not fit label of type {}", v.ty(), target.ty()),
                ));
            }
            _ => {}
        }
        let ty = ty.unwrap_or_else(|| self.registry().void());
        Ok(NativeExpr::new(ty, NativeKind::Goto { kind, target, value }))
    }
}

/// The unrestricted factory.
#[derive(Clone)]
pub struct DefaultFactory {
    registry: Arc<TypeRegistry>,
}

impl DefaultFactory {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        DefaultFactory { registry }
    }

    pub fn shared_registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }
}

impl NodeFactory for DefaultFactory {
    fn registry(&self) -> &TypeRegistry {
        &self.registry
    }
}

// Type derivation

fn binary_type(
    registry: &TypeRegistry,
    op: NativeBinaryOp,
    left: &NativeExpr,
    right: &NativeExpr,
    lifted_to_null: bool,
    method: Option<&RuntimeMember>,
) -> RuntimeType {
    let NativeBinaryOp::Slim(op) = op else {
        return registry.bool();
    };
    if op.is_assignment() {
        return left.ty().clone();
    }
    if let Some(method) = method {
        return method.member_type().clone();
    }
    if op.is_comparison() {
        let bool_ty = registry.bool();
        return if lifted_to_null {
            registry.nullable_of(&bool_ty).unwrap_or(bool_ty)
        } else {
            bool_ty
        };
    }
    let left = left.ty();
    match op {
        BinaryOp::Coalesce => match left.nullable_underlying() {
            Some(inner) if inner == right.ty() => inner.clone(),
            _ => left.clone(),
        },
        BinaryOp::ArrayIndex => left.element_type().unwrap_or(left).clone(),
        _ => left.clone(),
    }
}

fn unary_type(
    registry: &TypeRegistry,
    op: UnaryOp,
    operand: &NativeExpr,
    method: Option<&RuntimeMember>,
) -> RuntimeType {
    if let Some(method) = method {
        return method.member_type().clone();
    }
    match op {
        UnaryOp::ArrayLength => registry.int32(),
        UnaryOp::IsTrue | UnaryOp::IsFalse => registry.bool(),
        UnaryOp::Throw => registry.void(),
        _ => operand.ty().clone(),
    }
}

// Checks

fn is_integer(ty: &RuntimeType) -> bool {
    ty.primitive().is_some_and(Primitive::is_integer)
}

fn check_static_method(kind: NodeKind, method: &RuntimeMember, arity: usize) -> Result<(), FactoryError> {
    if !method.is_method() || !method.is_static() {
        return Err(FactoryError::invalid(
            kind,
            format!("operator implementation {method} must be a static method"),
        ));
    }
    if method.parameter_types().len() != arity {
        return Err(FactoryError::invalid(
            kind,
            format!(
                "{method} takes {} argument(s), {arity} supplied",
                method.parameter_types().len()
            ),
        ));
    }
    Ok(())
}

fn check_arguments(
    kind: NodeKind,
    callee: &str,
    parameters: &[RuntimeType],
    arguments: &[NativeExpr],
) -> Result<(), FactoryError> {
    if parameters.len() != arguments.len() {
        return Err(FactoryError::invalid(
            kind,
            format!(
                "{callee} takes {} argument(s), {} supplied",
                parameters.len(),
                arguments.len()
            ),
        ));
    }
    for (i, (param, arg)) in parameters.iter().zip(arguments).enumerate() {
        if !param.is_assignable_from(arg.ty()) {
            return Err(FactoryError::invalid(
                kind,
                format!("argument {i} of {callee}: expected {param}, found {}", arg.ty()),
            ));
        }
    }
    Ok(())
}

fn check_instance(kind: NodeKind, member: &RuntimeMember, object: &NativeExpr) -> Result<(), FactoryError> {
    let declaring = member.declaring_type();
    if declaring.is_assignable_from(object.ty()) || declaring.is_assignable_from(object.ty().non_nullable()) {
        Ok(())
    } else {
        Err(FactoryError::invalid(
            kind,
            format!("{member} cannot be used on an instance of {}", object.ty()),
        ))
    }
}

fn check_data_member(kind: NodeKind, member: &RuntimeMember) -> Result<(), FactoryError> {
    if !member.is_field() && !member.is_property() {
        return Err(FactoryError::invalid(
            kind,
            format!("{member} is not a field or property"),
        ));
    }
    if !member.parameter_types().is_empty() {
        return Err(FactoryError::invalid(
            kind,
            format!("indexer {member} must be accessed through an Index node"),
        ));
    }
    Ok(())
}

fn check_new(kind: NodeKind, new_expression: &NativeExpr) -> Result<(), FactoryError> {
    match new_expression.kind() {
        NativeKind::New { .. } => Ok(()),
        _ => Err(FactoryError::invalid(
            kind,
            format!("expected a New node, got {}", new_expression.node_kind()),
        )),
    }
}

fn check_assignment_target(left: &NativeExpr) -> Result<(), FactoryError> {
    match left.node_kind() {
        NodeKind::Parameter | NodeKind::MemberAccess | NodeKind::Index => Ok(()),
        NodeKind::Binary
            if matches!(
                left.kind(),
                NativeKind::Binary {
                    op: NativeBinaryOp::Slim(BinaryOp::ArrayIndex),
                    ..
                }
            ) =>
        {
            Ok(())
        }
        other => Err(FactoryError::invalid(
            NodeKind::Binary,
            format!("cannot assign to a {other} node"),
        )),
    }
}

/// Operand rules for slim operators without an implementing method.
fn check_slim_operands(op: BinaryOp, left: &NativeExpr, right: &NativeExpr) -> Result<(), FactoryError> {
    const KIND: NodeKind = NodeKind::Binary;
    let (l, r) = (left.ty(), right.ty());
    if op.is_assignment() {
        check_assignment_target(left)?;
        if op == BinaryOp::Assign && !l.is_assignable_from(r) {
            return Err(FactoryError::invalid(
                KIND,
                format!("cannot assign {r} to {l}"),
            ));
        }
        return Ok(());
    }
    match op {
        BinaryOp::AndAlso | BinaryOp::OrElse => {
            let both_bool = [l, r]
                .iter()
                .all(|t| t.non_nullable().primitive() == Some(Primitive::Bool));
            if !both_bool {
                return Err(FactoryError::invalid(
                    KIND,
                    format!("`{op}` needs bool operands, found {l} and {r}"),
                ));
            }
        }
        BinaryOp::Coalesce => {
            if !l.admits_null() {
                return Err(FactoryError::invalid(
                    KIND,
                    format!("the left operand of `??` must admit null, found {l}"),
                ));
            }
        }
        BinaryOp::ArrayIndex => {
            if l.array_rank() != Some(1) || !is_integer(r) {
                return Err(FactoryError::invalid(
                    KIND,
                    format!("`[]` needs a vector and an integer, found {l} and {r}"),
                ));
            }
        }
        _ if op.is_shift() => {
            if !is_integer(l.non_nullable()) || r.non_nullable().primitive() != Some(Primitive::I32) {
                return Err(FactoryError::invalid(
                    KIND,
                    format!("`{op}` needs an integer and an Int32 shift count, found {l} and {r}"),
                ));
            }
        }
        _ => {
            let (lp, rp) = (l.non_nullable(), r.non_nullable());
            if lp.is_value_type() && rp.is_value_type() && lp != rp {
                return Err(FactoryError::invalid(
                    KIND,
                    format!("operands of `{op}` have different types: {l} and {r}"),
                ));
            }
        }
    }
    Ok(())
}

/// Reject repeated declarations and non-parameter nodes in a declaration
/// list.
fn distinct_parameters(kind: NodeKind, what: &str, params: &[NativeExpr]) -> Result<(), FactoryError> {
    let mut seen = FxHashSet::default();
    for p in params {
        if !p.is_parameter() {
            return Err(FactoryError::invalid(
                kind,
                format!("{what} must be a parameter node, found {}", p.node_kind()),
            ));
        }
        if !seen.insert(p.addr()) {
            return Err(FactoryError::invalid(
                kind,
                format!(
                    "{what} `{}` is declared more than once",
                    p.parameter_name().unwrap_or("<unnamed>")
                ),
            ));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests;
