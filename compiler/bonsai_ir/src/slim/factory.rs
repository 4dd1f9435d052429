//! Validating constructors for slim nodes.
//!
//! Constructors that can reject their input return
//! `Result<Expr, ConstructionError>`; the rest are total. A stored type is
//! only kept when it differs from the one the node would recompute, so
//! trees built here are already canonical.

use std::sync::Arc;

use rustc_hash::FxHashSet;

use super::arguments::Arguments;
use super::bindings::{ElementInit, MemberBinding};
use super::calls::{InvocationSlim, MethodCallSlim, NewSlim};
use super::control::{
    BlockSlim, CatchBlock, GotoSlim, LabelRef, LabelSlim, LoopSlim, SwitchCase, SwitchSlim, TrySlim,
};
use super::nodes::{
    BinarySlim, ConditionalSlim, ConstantSlim, DefaultSlim, IndexSlim, LambdaSlim, ListInitSlim,
    MemberAccessSlim, MemberInitSlim, NewArrayBoundsSlim, NewArrayInitSlim, ParameterRef,
    TypeBinarySlim, UnarySlim,
};
use super::operators::{BinaryOp, GotoKind, TypeBinaryOp, UnaryOp};
use super::typing::unary_type;
use super::{Expr, NodeKind};
use crate::descriptor::{MemberSlim, ObjectSlim, TypeSlim};
use crate::error::ConstructionError;

type Built = Result<Expr, ConstructionError>;

/// Keep `ty` only if it differs from what the node would recompute.
fn explicit(ty: Option<TypeSlim>, canonical: impl FnOnce() -> TypeSlim) -> Option<TypeSlim> {
    ty.filter(|t| *t != canonical())
}

fn distinct_parameters(
    kind: NodeKind,
    what: &str,
    params: &[ParameterRef],
) -> Result<(), ConstructionError> {
    let mut seen = FxHashSet::default();
    for p in params {
        if !seen.insert(Arc::as_ptr(p)) {
            return Err(ConstructionError::new(
                kind,
                format!(
                    "{what} `{}` is declared more than once",
                    p.name.as_deref().unwrap_or("<unnamed>")
                ),
            ));
        }
    }
    Ok(())
}

fn check_arity(
    kind: NodeKind,
    member: &MemberSlim,
    expected: usize,
    found: usize,
) -> Result<(), ConstructionError> {
    if expected == found {
        Ok(())
    } else {
        Err(ConstructionError::new(
            kind,
            format!("{member} takes {expected} argument(s), {found} supplied"),
        ))
    }
}

// Operators

impl Expr {
    /// Binary node without method, conversion or lifting.
    pub fn binary(op: BinaryOp, left: Expr, right: Expr) -> Expr {
        Expr::Binary(Arc::new(BinarySlim {
            op,
            left,
            right,
            lifted_to_null: false,
            method: None,
            conversion: None,
        }))
    }

    /// Fully specified binary node.
    ///
    /// A conversion is only accepted by `??` and compound assignments, and
    /// must take exactly one parameter.
    pub fn make_binary(
        op: BinaryOp,
        left: Expr,
        right: Expr,
        lifted_to_null: bool,
        method: Option<MemberSlim>,
        conversion: Option<Arc<LambdaSlim>>,
    ) -> Built {
        if let Some(lambda) = &conversion {
            if !op.accepts_conversion() {
                return Err(ConstructionError::new(
                    NodeKind::Binary,
                    format!("operator `{op}` does not take a conversion"),
                ));
            }
            if lambda.parameters.len() != 1 {
                return Err(ConstructionError::new(
                    NodeKind::Binary,
                    "a conversion lambda must take exactly one parameter",
                ));
            }
        }
        if let Some(m) = &method {
            if !m.is_method() || !m.is_static() {
                return Err(ConstructionError::new(
                    NodeKind::Binary,
                    format!("operator implementation {m} must be a static method"),
                ));
            }
            check_arity(NodeKind::Binary, m, 2, m.open_parameter_types().len())?;
        }
        if lifted_to_null && !op.is_comparison() {
            return Err(ConstructionError::new(
                NodeKind::Binary,
                format!("only comparisons can be lifted to null, not `{op}`"),
            ));
        }
        Ok(Expr::Binary(Arc::new(BinarySlim {
            op,
            left,
            right,
            lifted_to_null,
            method,
            conversion,
        })))
    }

    pub fn add(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, left, right)
    }

    pub fn subtract(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Subtract, left, right)
    }

    pub fn multiply(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Multiply, left, right)
    }

    pub fn divide(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Divide, left, right)
    }

    pub fn equal(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Equal, left, right)
    }

    pub fn not_equal(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::NotEqual, left, right)
    }

    pub fn less_than(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::LessThan, left, right)
    }

    pub fn greater_than(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::GreaterThan, left, right)
    }

    pub fn and_also(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::AndAlso, left, right)
    }

    pub fn or_else(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::OrElse, left, right)
    }

    pub fn coalesce(left: Expr, right: Expr) -> Expr {
        Expr::binary(BinaryOp::Coalesce, left, right)
    }

    pub fn assign(left: Expr, right: Expr) -> Built {
        match left.kind() {
            NodeKind::Parameter | NodeKind::MemberAccess | NodeKind::Index => {
                Ok(Expr::binary(BinaryOp::Assign, left, right))
            }
            other => Err(ConstructionError::new(
                NodeKind::Binary,
                format!("cannot assign to a {other} node"),
            )),
        }
    }

    /// Unary node whose type derives from the operand.
    ///
    /// Fails for conversions, which need a target type (see
    /// [`Expr::convert`]).
    pub fn unary(op: UnaryOp, operand: Expr) -> Built {
        if op.requires_type() {
            return Err(ConstructionError::new(
                NodeKind::Unary,
                format!("`{op}` requires an explicit result type"),
            ));
        }
        Ok(Expr::Unary(Arc::new(UnarySlim {
            op,
            operand,
            ty: None,
            method: None,
        })))
    }

    /// Fully specified unary node.
    pub fn make_unary(
        op: UnaryOp,
        operand: Expr,
        ty: Option<TypeSlim>,
        method: Option<MemberSlim>,
    ) -> Built {
        if op.requires_type() && ty.is_none() {
            return Err(ConstructionError::new(
                NodeKind::Unary,
                format!("`{op}` requires an explicit result type"),
            ));
        }
        if let Some(m) = &method {
            if !m.is_method() || !m.is_static() {
                return Err(ConstructionError::new(
                    NodeKind::Unary,
                    format!("operator implementation {m} must be a static method"),
                ));
            }
            check_arity(NodeKind::Unary, m, 1, m.open_parameter_types().len())?;
        }
        let mut node = UnarySlim {
            op,
            operand,
            ty: None,
            method,
        };
        node.ty = if op.requires_type() {
            ty
        } else {
            explicit(ty, || unary_type(&node))
        };
        Ok(Expr::Unary(Arc::new(node)))
    }

    pub fn convert(operand: Expr, ty: TypeSlim) -> Expr {
        Expr::Unary(Arc::new(UnarySlim {
            op: UnaryOp::Convert,
            operand,
            ty: Some(ty),
            method: None,
        }))
    }

    pub fn negate(operand: Expr) -> Expr {
        Expr::Unary(Arc::new(UnarySlim {
            op: UnaryOp::Negate,
            operand,
            ty: None,
            method: None,
        }))
    }

    pub fn not(operand: Expr) -> Expr {
        Expr::Unary(Arc::new(UnarySlim {
            op: UnaryOp::Not,
            operand,
            ty: None,
            method: None,
        }))
    }

    pub fn array_length(array: Expr) -> Expr {
        Expr::Unary(Arc::new(UnarySlim {
            op: UnaryOp::ArrayLength,
            operand: array,
            ty: None,
            method: None,
        }))
    }

    /// `throw operand`, typed `void`.
    pub fn throw(operand: Expr) -> Expr {
        Expr::Unary(Arc::new(UnarySlim {
            op: UnaryOp::Throw,
            operand,
            ty: None,
            method: None,
        }))
    }

    pub fn type_is(expression: Expr, ty: TypeSlim) -> Expr {
        Expr::TypeBinary(Arc::new(TypeBinarySlim {
            op: TypeBinaryOp::TypeIs,
            expression,
            type_operand: ty,
        }))
    }

    pub fn type_equal(expression: Expr, ty: TypeSlim) -> Expr {
        Expr::TypeBinary(Arc::new(TypeBinarySlim {
            op: TypeBinaryOp::TypeEqual,
            expression,
            type_operand: ty,
        }))
    }
}

// Leaves and functions

impl Expr {
    /// Float values typed `Single` are rounded to `f32` here.
    pub fn constant(value: impl Into<ObjectSlim>, ty: TypeSlim) -> Expr {
        Expr::Constant(Arc::new(ConstantSlim {
            value: value.into().fit_to(&ty),
            ty,
        }))
    }

    pub fn null(ty: TypeSlim) -> Expr {
        Expr::constant(ObjectSlim::null(), ty)
    }

    pub fn default_value(ty: TypeSlim) -> Expr {
        Expr::Default(Arc::new(DefaultSlim { ty }))
    }

    /// The `void` no-op expression.
    pub fn empty() -> Expr {
        Expr::default_value(TypeSlim::void())
    }

    /// Lambda over `parameters`, typed by its signature.
    pub fn lambda(body: Expr, parameters: Vec<ParameterRef>) -> Built {
        Expr::make_lambda(None, body, parameters, None, false)
    }

    /// Fully specified lambda.
    ///
    /// An explicit `ty` must be a function type with one parameter type per
    /// parameter.
    pub fn make_lambda(
        ty: Option<TypeSlim>,
        body: Expr,
        parameters: Vec<ParameterRef>,
        name: Option<&str>,
        tail_call: bool,
    ) -> Built {
        distinct_parameters(NodeKind::Lambda, "parameter", &parameters)?;
        if let Some(ty) = &ty {
            match ty.function_signature() {
                Some((params, _)) if params.len() == parameters.len() => {}
                Some((params, _)) => {
                    return Err(ConstructionError::new(
                        NodeKind::Lambda,
                        format!(
                            "function type {ty} takes {} parameter(s), lambda declares {}",
                            params.len(),
                            parameters.len()
                        ),
                    ));
                }
                None => {
                    return Err(ConstructionError::new(
                        NodeKind::Lambda,
                        format!("{ty} is not a function type"),
                    ));
                }
            }
        }
        let mut lambda = LambdaSlim {
            ty: None,
            body,
            parameters: parameters.into(),
            name: name.map(Arc::from),
            tail_call,
        };
        lambda.ty = explicit(ty, || lambda.function_type());
        Ok(Expr::Lambda(Arc::new(lambda)))
    }

    /// Invoke a function-typed value.
    pub fn invoke(expression: Expr, arguments: Vec<Expr>) -> Built {
        let callee = expression.ty();
        if let Some((params, _)) = callee.function_signature() {
            if params.len() != arguments.len() {
                return Err(ConstructionError::new(
                    NodeKind::Invocation,
                    format!(
                        "{callee} takes {} argument(s), {} supplied",
                        params.len(),
                        arguments.len()
                    ),
                ));
            }
        }
        Ok(Expr::Invocation(Arc::new(InvocationSlim {
            expression,
            arguments: Arguments::new(arguments),
        })))
    }
}

// Calls and construction

impl Expr {
    /// Method call with arity-specialized argument storage.
    pub fn call(object: Option<Expr>, method: MemberSlim, arguments: Vec<Expr>) -> Built {
        Expr::make_call(object, method, Arguments::new(arguments))
    }

    /// Method call that always stores its arguments as a list.
    pub fn call_nary(object: Option<Expr>, method: MemberSlim, arguments: Vec<Expr>) -> Built {
        Expr::make_call(object, method, Arguments::nary(arguments))
    }

    fn make_call(object: Option<Expr>, method: MemberSlim, arguments: Arguments) -> Built {
        if !method.is_method() {
            return Err(ConstructionError::new(
                NodeKind::MethodCall,
                format!("{method} is not a method"),
            ));
        }
        match (method.is_static(), object.is_some()) {
            (true, true) => {
                return Err(ConstructionError::new(
                    NodeKind::MethodCall,
                    format!("static method {method} cannot have an instance"),
                ));
            }
            (false, false) => {
                return Err(ConstructionError::new(
                    NodeKind::MethodCall,
                    format!("instance method {method} requires an instance"),
                ));
            }
            _ => {}
        }
        if method.generic_parameters().len() != method.generic_arguments().len() {
            return Err(ConstructionError::new(
                NodeKind::MethodCall,
                format!("generic method {method} is not closed"),
            ));
        }
        check_arity(
            NodeKind::MethodCall,
            &method,
            method.open_parameter_types().len(),
            arguments.len(),
        )?;
        Ok(Expr::MethodCall(Arc::new(MethodCallSlim {
            object,
            method,
            arguments,
        })))
    }

    pub fn new_object(constructor: MemberSlim, arguments: Vec<Expr>) -> Built {
        Expr::make_new(constructor, Arguments::new(arguments))
    }

    pub fn new_object_nary(constructor: MemberSlim, arguments: Vec<Expr>) -> Built {
        Expr::make_new(constructor, Arguments::nary(arguments))
    }

    fn make_new(constructor: MemberSlim, arguments: Arguments) -> Built {
        if !constructor.is_constructor() {
            return Err(ConstructionError::new(
                NodeKind::New,
                format!("{constructor} is not a constructor"),
            ));
        }
        check_arity(
            NodeKind::New,
            &constructor,
            constructor.open_parameter_types().len(),
            arguments.len(),
        )?;
        Ok(Expr::New(Arc::new(NewSlim {
            constructor: Some(constructor),
            value_type: None,
            arguments,
        })))
    }

    /// Parameterless construction of a value type.
    pub fn new_value(ty: TypeSlim) -> Built {
        if ty.is_value_type() == Some(false) {
            return Err(ConstructionError::new(
                NodeKind::New,
                format!("{ty} is a reference type and needs a constructor"),
            ));
        }
        Ok(Expr::New(Arc::new(NewSlim {
            constructor: None,
            value_type: Some(ty),
            arguments: Arguments::Nullary,
        })))
    }

    pub fn new_array_bounds(element_type: TypeSlim, bounds: Vec<Expr>) -> Built {
        if bounds.is_empty() {
            return Err(ConstructionError::new(
                NodeKind::NewArrayBounds,
                "at least one bound is required",
            ));
        }
        Ok(Expr::NewArrayBounds(Arc::new(NewArrayBoundsSlim {
            element_type,
            bounds: bounds.into(),
        })))
    }

    pub fn new_array_init(element_type: TypeSlim, expressions: Vec<Expr>) -> Expr {
        Expr::NewArrayInit(Arc::new(NewArrayInitSlim {
            element_type,
            expressions: expressions.into(),
        }))
    }

    /// Field or property read; `expression` is `None` only for static
    /// members.
    pub fn member_access(expression: Option<Expr>, member: MemberSlim) -> Built {
        if member.is_method() || member.is_constructor() {
            return Err(ConstructionError::new(
                NodeKind::MemberAccess,
                format!("{member} is not a field or property"),
            ));
        }
        if !member.open_parameter_types().is_empty() {
            return Err(ConstructionError::new(
                NodeKind::MemberAccess,
                format!("indexer {member} must be accessed through an Index node"),
            ));
        }
        if expression.is_none() && !member.is_static() {
            return Err(ConstructionError::new(
                NodeKind::MemberAccess,
                format!("instance member {member} requires an instance"),
            ));
        }
        Ok(Expr::MemberAccess(Arc::new(MemberAccessSlim {
            expression,
            member,
        })))
    }

    /// `new T(..) { bindings }`. `new_expression` must be a `New` node.
    pub fn member_init(new_expression: Expr, bindings: Vec<Arc<MemberBinding>>) -> Built {
        let Expr::New(new_expression) = new_expression else {
            return Err(ConstructionError::new(
                NodeKind::MemberInit,
                format!("expected a New node, got {}", new_expression.kind()),
            ));
        };
        Ok(Expr::MemberInit(Arc::new(MemberInitSlim {
            new_expression,
            bindings: bindings.into(),
        })))
    }

    /// `new T(..) { initializers }`. Needs at least one initializer.
    pub fn list_init(new_expression: Expr, initializers: Vec<Arc<ElementInit>>) -> Built {
        let Expr::New(new_expression) = new_expression else {
            return Err(ConstructionError::new(
                NodeKind::ListInit,
                format!("expected a New node, got {}", new_expression.kind()),
            ));
        };
        if initializers.is_empty() {
            return Err(ConstructionError::new(
                NodeKind::ListInit,
                "at least one element initializer is required",
            ));
        }
        Ok(Expr::ListInit(Arc::new(ListInitSlim {
            new_expression,
            initializers: initializers.into(),
        })))
    }

    /// Element initializer calling `add_method` with `arguments`.
    pub fn element_init(
        add_method: MemberSlim,
        arguments: Vec<Expr>,
    ) -> Result<Arc<ElementInit>, ConstructionError> {
        if !add_method.is_method() || add_method.is_static() {
            return Err(ConstructionError::new(
                NodeKind::ListInit,
                format!("{add_method} must be an instance method"),
            ));
        }
        check_arity(
            NodeKind::ListInit,
            &add_method,
            add_method.open_parameter_types().len(),
            arguments.len(),
        )?;
        Ok(Arc::new(ElementInit {
            add_method,
            arguments: arguments.into(),
        }))
    }

    /// Indexer access, or array element access when `indexer` is `None`.
    pub fn index(object: Expr, indexer: Option<MemberSlim>, arguments: Vec<Expr>) -> Built {
        if arguments.is_empty() {
            return Err(ConstructionError::new(
                NodeKind::Index,
                "at least one index argument is required",
            ));
        }
        if let Some(indexer) = &indexer {
            if !indexer.is_property() {
                return Err(ConstructionError::new(
                    NodeKind::Index,
                    format!("{indexer} is not an indexer property"),
                ));
            }
            check_arity(
                NodeKind::Index,
                indexer,
                indexer.open_parameter_types().len(),
                arguments.len(),
            )?;
        }
        Ok(Expr::Index(Arc::new(IndexSlim {
            object,
            indexer,
            arguments: arguments.into(),
        })))
    }
}

// Control flow

impl Expr {
    pub fn condition(test: Expr, if_true: Expr, if_false: Expr) -> Expr {
        Expr::make_condition(None, test, if_true, if_false)
    }

    pub fn make_condition(ty: Option<TypeSlim>, test: Expr, if_true: Expr, if_false: Expr) -> Expr {
        let ty = explicit(ty, || if_true.ty());
        Expr::Conditional(Arc::new(ConditionalSlim {
            ty,
            test,
            if_true,
            if_false,
        }))
    }

    /// `if (test) if_true`, typed `void`.
    pub fn if_then(test: Expr, if_true: Expr) -> Expr {
        Expr::make_condition(Some(TypeSlim::void()), test, if_true, Expr::empty())
    }

    pub fn block(variables: Vec<ParameterRef>, expressions: Vec<Expr>) -> Built {
        Expr::make_block(None, variables, expressions)
    }

    pub fn make_block(
        ty: Option<TypeSlim>,
        variables: Vec<ParameterRef>,
        expressions: Vec<Expr>,
    ) -> Built {
        distinct_parameters(NodeKind::Block, "variable", &variables)?;
        let Some(last) = expressions.last() else {
            return Err(ConstructionError::new(
                NodeKind::Block,
                "a block needs at least one expression",
            ));
        };
        let ty = explicit(ty, || last.ty());
        Ok(Expr::Block(Arc::new(BlockSlim {
            ty,
            variables: variables.into(),
            expressions: expressions.into(),
        })))
    }

    /// Fully specified `try`; see [`TrySlim::validate`] for the shape rules.
    pub fn make_try(
        ty: Option<TypeSlim>,
        body: Expr,
        handlers: Vec<Arc<CatchBlock>>,
        finally: Option<Expr>,
        fault: Option<Expr>,
    ) -> Built {
        TrySlim::validate(&handlers, finally.as_ref(), fault.as_ref())?;
        for handler in &handlers {
            if let Some(filter) = &handler.filter {
                if filter.ty() != TypeSlim::bool() {
                    return Err(ConstructionError::new(
                        NodeKind::Try,
                        format!("catch filter must be bool, found {}", filter.ty()),
                    ));
                }
            }
        }
        let ty = explicit(ty, || body.ty());
        Ok(Expr::Try(Arc::new(TrySlim {
            ty,
            body,
            handlers: handlers.into(),
            finally,
            fault,
        })))
    }

    pub fn try_catch(body: Expr, handlers: Vec<Arc<CatchBlock>>) -> Built {
        Expr::make_try(None, body, handlers, None, None)
    }

    pub fn try_finally(body: Expr, finally: Expr) -> Built {
        Expr::make_try(None, body, Vec::new(), Some(finally), None)
    }

    pub fn try_fault(body: Expr, fault: Expr) -> Built {
        Expr::make_try(None, body, Vec::new(), None, Some(fault))
    }

    pub fn switch(
        ty: Option<TypeSlim>,
        switch_value: Expr,
        default_body: Option<Expr>,
        comparison: Option<MemberSlim>,
        cases: Vec<Arc<SwitchCase>>,
    ) -> Built {
        if cases.is_empty() && default_body.is_none() {
            return Err(ConstructionError::new(
                NodeKind::Switch,
                "a switch needs at least one case or a default body",
            ));
        }
        if let Some(m) = &comparison {
            if !m.is_method() {
                return Err(ConstructionError::new(
                    NodeKind::Switch,
                    format!("comparison {m} is not a method"),
                ));
            }
        }
        let canonical = match (cases.first(), &default_body) {
            (Some(case), _) => case.body.ty(),
            (None, Some(body)) => body.ty(),
            (None, None) => TypeSlim::void(),
        };
        let ty = explicit(ty, || canonical);
        Ok(Expr::Switch(Arc::new(SwitchSlim {
            ty,
            switch_value,
            default_body,
            comparison,
            cases: cases.into(),
        })))
    }

    pub fn label(target: LabelRef, default_value: Option<Expr>) -> Expr {
        Expr::Label(Arc::new(LabelSlim {
            target,
            default_value,
        }))
    }

    pub fn loop_expr(body: Expr, break_label: Option<LabelRef>, continue_label: Option<LabelRef>) -> Built {
        if let Some(target) = &continue_label {
            if target.ty.as_ref().is_some_and(|t| *t != TypeSlim::void()) {
                return Err(ConstructionError::new(
                    NodeKind::Loop,
                    "the continue label must be void",
                ));
            }
        }
        Ok(Expr::Loop(Arc::new(LoopSlim {
            body,
            break_label,
            continue_label,
        })))
    }

    /// Jump of any flavor. `ty` is the type the jump expression claims to
    /// have (it never produces a value); `None` is `void`.
    pub fn jump(kind: GotoKind, target: LabelRef, value: Option<Expr>, ty: Option<TypeSlim>) -> Expr {
        Expr::Goto(Arc::new(GotoSlim {
            kind,
            target,
            value,
            ty: explicit(ty, TypeSlim::void),
        }))
    }

    pub fn goto(target: LabelRef) -> Expr {
        Expr::jump(GotoKind::Goto, target, None, None)
    }

    pub fn return_to(target: LabelRef, value: Option<Expr>) -> Expr {
        Expr::jump(GotoKind::Return, target, value, None)
    }

    pub fn break_to(target: LabelRef, value: Option<Expr>) -> Expr {
        Expr::jump(GotoKind::Break, target, value, None)
    }

    pub fn continue_to(target: LabelRef) -> Expr {
        Expr::jump(GotoKind::Continue, target, None, None)
    }
}
