//! Tree-walking evaluator for native trees.
//!
//! Evaluation threads an [`Env`] of variable cells through the walk.
//! Non-local control flow (jumps and thrown exceptions) travels as the
//! `Err` side of [`Flow`] until a block, label, loop or try handler claims
//! it. Whatever escapes to the top becomes an [`EvalError`].

mod ops;

use std::sync::Arc;

use bonsai_ir::stack::ensure_sufficient_stack;
use bonsai_ir::{BinaryOp, TypeBinaryOp, UnaryOp};
use parking_lot::Mutex;
use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use crate::error::EvalError;
use crate::expr::{
    NativeBinaryOp, NativeBinding, NativeCatch, NativeElementInit, NativeExpr, NativeKind,
    NativeLabel, NativeSwitchCase,
};
use crate::types::{BuiltinException, HostCall, RuntimeMember, RuntimeMemberKind, TypeRegistry};
use crate::value::{ArrayValue, Closure, Value, VarCell};

use ops::Fault;

/// Non-local exit from a node.
enum Unwind {
    Jump { target: NativeLabel, value: Value },
    Throw(Value),
    Error(EvalError),
}

impl From<EvalError> for Unwind {
    fn from(error: EvalError) -> Self {
        Unwind::Error(error)
    }
}

type Flow<T = Value> = Result<T, Unwind>;

/// A variable binding displaced by a declaration, restored on scope exit.
type Shadowed = (usize, Option<(NativeExpr, VarCell)>);

#[derive(Default)]
struct Env {
    vars: FxHashMap<usize, (NativeExpr, VarCell)>,
    /// Exceptions whose handlers are running, innermost last.
    handling: Vec<Value>,
}

impl Env {
    fn cell(&self, parameter: &NativeExpr) -> Flow<VarCell> {
        match self.vars.get(&parameter.addr()) {
            Some((_, cell)) => Ok(cell.clone()),
            None => Err(EvalError::UnboundVariable {
                name: parameter.parameter_name().unwrap_or("_").to_owned(),
            }
            .into()),
        }
    }

    fn bind(&mut self, parameter: &NativeExpr, value: Value) -> Shadowed {
        let addr = parameter.addr();
        let previous = self
            .vars
            .insert(addr, (parameter.clone(), Arc::new(Mutex::new(value))));
        (addr, previous)
    }

    fn restore(&mut self, shadowed: Vec<Shadowed>) {
        for (addr, previous) in shadowed.into_iter().rev() {
            match previous {
                Some(binding) => {
                    self.vars.insert(addr, binding);
                }
                None => {
                    self.vars.remove(&addr);
                }
            }
        }
    }
}

/// Evaluator bound to the registry whose types its trees use.
pub struct Interpreter {
    registry: Arc<TypeRegistry>,
}

impl Interpreter {
    pub fn new(registry: Arc<TypeRegistry>) -> Self {
        Interpreter { registry }
    }

    pub fn registry(&self) -> &Arc<TypeRegistry> {
        &self.registry
    }

    /// Evaluate a closed tree.
    #[tracing::instrument(level = "debug", skip_all, fields(ty = %expr.ty()))]
    pub fn eval(&self, expr: &NativeExpr) -> Result<Value, EvalError> {
        self.eval_with(expr, &[])
    }

    /// Evaluate a tree whose free parameters are bound to the given values.
    pub fn eval_with(&self, expr: &NativeExpr, bindings: &[(NativeExpr, Value)]) -> Result<Value, EvalError> {
        let mut env = Env::default();
        for (parameter, value) in bindings {
            env.bind(parameter, value.clone());
        }
        self.eval_node(expr, &mut env).map_err(|unwind| self.settle(unwind))
    }

    /// Call a function value produced by evaluating a lambda.
    pub fn call(&self, function: &Value, args: &[Value]) -> Result<Value, EvalError> {
        self.call_closure(function, args.to_vec())
            .map_err(|unwind| self.settle(unwind))
    }

    fn settle(&self, unwind: Unwind) -> EvalError {
        match unwind {
            Unwind::Throw(exception) => {
                tracing::debug!(%exception, "unhandled exception");
                EvalError::Unhandled { exception }
            }
            Unwind::Jump { target, .. } => EvalError::UnboundLabel {
                label: target.name().unwrap_or("_").to_owned(),
            },
            Unwind::Error(error) => error,
        }
    }

    fn raise(&self, fault: Fault) -> Unwind {
        Unwind::Throw(self.registry.new_exception(fault.kind, fault.message))
    }

    fn eval_node(&self, expr: &NativeExpr, env: &mut Env) -> Flow {
        let value = ensure_sufficient_stack(|| self.eval_kind(expr, env))?;
        Ok(if expr.ty().is_void() { Value::Void } else { value })
    }

    fn eval_all(&self, exprs: &[NativeExpr], env: &mut Env) -> Flow<Vec<Value>> {
        exprs.iter().map(|e| self.eval_node(e, env)).collect()
    }

    fn eval_bool(&self, expr: &NativeExpr, env: &mut Env) -> Flow<bool> {
        match self.eval_node(expr, env)? {
            Value::Bool(b) => Ok(b),
            Value::Null => Err(self.raise(Fault::null_reference())),
            other => Err(invalid(format!("expected a boolean, found {other:?}"))),
        }
    }

    fn eval_kind(&self, expr: &NativeExpr, env: &mut Env) -> Flow {
        match expr.kind() {
            NativeKind::Binary {
                op,
                left,
                right,
                lifted_to_null,
                method,
                conversion,
            } => match *op {
                NativeBinaryOp::ReferenceEqual | NativeBinaryOp::ReferenceNotEqual => {
                    let l = self.eval_node(left, env)?;
                    let r = self.eval_node(right, env)?;
                    let same = l.reference_equals(&r);
                    Ok(Value::Bool(same == (*op == NativeBinaryOp::ReferenceEqual)))
                }
                NativeBinaryOp::Slim(op) if op.is_assignment() => {
                    self.assign(op, left, right, conversion.as_ref(), env)
                }
                NativeBinaryOp::Slim(op) => {
                    self.binary(op, left, right, *lifted_to_null, method.as_ref(), conversion.as_ref(), env)
                }
            },
            NativeKind::Unary {
                op,
                operand,
                method,
            } => self.unary(expr, *op, operand, method.as_ref(), env),
            NativeKind::Constant { value } => Ok(value.clone()),
            NativeKind::Default => Ok(self.registry.default_value(expr.ty())),
            NativeKind::Parameter { .. } => Ok(env.cell(expr)?.lock().clone()),
            NativeKind::Lambda { .. } => Ok(Value::Function(Arc::new(Closure {
                lambda: expr.clone(),
                captured: env.vars.clone(),
            }))),
            NativeKind::Invocation {
                expression,
                arguments,
            } => {
                let function = self.eval_node(expression, env)?;
                let args = self.eval_all(arguments, env)?;
                self.call_closure(&function, args)
            }
            NativeKind::MethodCall {
                object,
                method,
                arguments,
            } => {
                let this = match object {
                    Some(object) => Some(self.eval_instance(object, env)?),
                    None => None,
                };
                let args = self.eval_all(arguments, env)?;
                self.invoke_member(method, this.as_ref(), &args)
            }
            NativeKind::New {
                constructor,
                arguments,
            } => self.construct(expr, constructor.as_ref(), arguments, env),
            NativeKind::NewArrayBounds {
                element_type,
                bounds,
            } => {
                let mut lengths = SmallVec::<[usize; 2]>::new();
                for bound in self.eval_all(bounds, env)? {
                    let length = bound
                        .as_int()
                        .ok_or_else(|| invalid("array bound is not an integer"))?;
                    lengths.push(usize::try_from(length).map_err(|_| self.raise(Fault::overflow()))?);
                }
                let total = lengths
                    .iter()
                    .try_fold(1usize, |acc, &len| acc.checked_mul(len))
                    .ok_or_else(|| self.raise(Fault::overflow()))?;
                let items = (0..total)
                    .map(|_| self.registry.default_value(element_type))
                    .collect();
                Ok(Value::Array(Arc::new(ArrayValue::new(expr.ty().clone(), lengths, items))))
            }
            NativeKind::NewArrayInit { expressions, .. } => {
                let items = self.eval_all(expressions, env)?;
                let lengths = SmallVec::from_elem(items.len(), 1);
                Ok(Value::Array(Arc::new(ArrayValue::new(expr.ty().clone(), lengths, items))))
            }
            NativeKind::MemberAccess { expression, member } => {
                let this = match expression {
                    Some(expression) => Some(self.eval_instance(expression, env)?),
                    None => None,
                };
                self.read_member(this.as_ref(), member)
            }
            NativeKind::MemberInit {
                new_expression,
                bindings,
            } => {
                let object = self.eval_node(new_expression, env)?;
                self.apply_bindings(&object, bindings, env)?;
                Ok(object)
            }
            NativeKind::ListInit {
                new_expression,
                initializers,
            } => {
                let collection = self.eval_node(new_expression, env)?;
                self.add_elements(&collection, initializers, env)?;
                Ok(collection)
            }
            NativeKind::Conditional {
                test,
                if_true,
                if_false,
            } => {
                if self.eval_bool(test, env)? {
                    self.eval_node(if_true, env)
                } else {
                    self.eval_node(if_false, env)
                }
            }
            NativeKind::TypeBinary {
                op,
                expression,
                type_operand,
            } => {
                let value = self.eval_node(expression, env)?;
                let exact = *op == TypeBinaryOp::TypeEqual;
                Ok(Value::Bool(ops::is_instance(&value, type_operand, exact, &self.registry)))
            }
            NativeKind::Block {
                variables,
                expressions,
            } => {
                let shadowed: Vec<Shadowed> = variables
                    .iter()
                    .map(|v| env.bind(v, self.registry.default_value(v.ty())))
                    .collect();
                let result = self.run_block(expressions, env);
                env.restore(shadowed);
                result
            }
            NativeKind::Try {
                body,
                handlers,
                finally,
                fault,
            } => self.run_try(body, handlers, finally.as_ref(), fault.as_ref(), env),
            NativeKind::Switch {
                switch_value,
                default_body,
                comparison,
                cases,
            } => self.run_switch(switch_value, default_body.as_ref(), comparison.as_ref(), cases, env),
            NativeKind::Label {
                target,
                default_value,
            } => match default_value {
                Some(default_value) => match self.eval_node(default_value, env) {
                    Err(Unwind::Jump { target: t, value }) if t.ptr_eq(target) => Ok(value),
                    other => other,
                },
                None => Ok(Value::Void),
            },
            NativeKind::Loop {
                body,
                break_label,
                continue_label,
            } => loop {
                match self.eval_node(body, env) {
                    Ok(_) => {}
                    Err(Unwind::Jump { target, value }) => {
                        if break_label.as_ref().is_some_and(|b| b.ptr_eq(&target)) {
                            return Ok(value);
                        }
                        if !continue_label.as_ref().is_some_and(|c| c.ptr_eq(&target)) {
                            return Err(Unwind::Jump { target, value });
                        }
                    }
                    Err(other) => return Err(other),
                }
            },
            NativeKind::Goto { target, value, .. } => {
                let value = match value {
                    Some(value) => self.eval_node(value, env)?,
                    None => Value::Void,
                };
                Err(Unwind::Jump {
                    target: target.clone(),
                    value,
                })
            }
            NativeKind::Index {
                object,
                indexer,
                arguments,
            } => {
                let this = self.eval_instance(object, env)?;
                let args = self.eval_all(arguments, env)?;
                match indexer {
                    Some(indexer) => self.invoke_member(indexer, Some(&this), &args),
                    None => self.array_get(&this, &args),
                }
            }
        }
    }

    /// Evaluate the instance of a member access or call, rejecting `null`
    /// unless the instance is a nullable value.
    fn eval_instance(&self, object: &NativeExpr, env: &mut Env) -> Flow {
        let value = self.eval_node(object, env)?;
        if value.is_null() && !object.ty().is_nullable() {
            return Err(self.raise(Fault::null_reference()));
        }
        Ok(value)
    }

    // Operators

    #[allow(clippy::too_many_arguments)]
    fn binary(
        &self,
        op: BinaryOp,
        left: &NativeExpr,
        right: &NativeExpr,
        lifted_to_null: bool,
        method: Option<&RuntimeMember>,
        conversion: Option<&NativeExpr>,
        env: &mut Env,
    ) -> Flow {
        match op {
            BinaryOp::AndAlso | BinaryOp::OrElse if method.is_none() => {
                return self.short_circuit(op, left, right, env);
            }
            BinaryOp::Coalesce => {
                let value = self.eval_node(left, env)?;
                if value.is_null() {
                    return self.eval_node(right, env);
                }
                return match conversion {
                    Some(conversion) => {
                        let function = self.eval_node(conversion, env)?;
                        self.call_closure(&function, vec![value])
                    }
                    None => Ok(value),
                };
            }
            BinaryOp::ArrayIndex => {
                let array = self.eval_node(left, env)?;
                let index = self.eval_node(right, env)?;
                return self.array_get(&array, &[index]);
            }
            _ => {}
        }

        let l = self.eval_node(left, env)?;
        let r = self.eval_node(right, env)?;
        let lifted = left.ty().is_nullable() || right.ty().is_nullable();

        if lifted && (l.is_null() || r.is_null()) {
            return Ok(lifted_null_result(op, &l, &r, lifted_to_null));
        }
        if let Some(method) = method {
            return self.invoke_member(method, None, &[l, r]);
        }
        if op.is_comparison() {
            if !op.is_equality() && (l.is_null() || r.is_null()) {
                return Ok(Value::Bool(false));
            }
            return Ok(Value::Bool(ops::compare(op, &l, &r)));
        }
        if (l.is_null() || r.is_null()) && !matches!((&l, &r), (Value::Str(_), _) | (_, Value::Str(_))) {
            return Err(self.raise(Fault::null_reference()));
        }
        ops::arithmetic(op, &l, &r).map_err(|fault| self.raise(fault))
    }

    /// `&&` and `||`, with three-valued logic for nullable booleans.
    fn short_circuit(&self, op: BinaryOp, left: &NativeExpr, right: &NativeExpr, env: &mut Env) -> Flow {
        let decisive = op == BinaryOp::OrElse;
        let l = self.eval_node(left, env)?;
        if l.as_bool() == Some(decisive) {
            return Ok(l);
        }
        let r = self.eval_node(right, env)?;
        Ok(match (l, r) {
            (Value::Bool(_), r) => r,
            (_, Value::Bool(b)) if b == decisive => Value::Bool(b),
            _ => Value::Null,
        })
    }

    fn unary(
        &self,
        expr: &NativeExpr,
        op: UnaryOp,
        operand: &NativeExpr,
        method: Option<&RuntimeMember>,
        env: &mut Env,
    ) -> Flow {
        match op {
            UnaryOp::Quote => return Ok(Value::Quoted(operand.clone())),
            UnaryOp::Throw if operand.ty().is_void() => {
                return match env.handling.last() {
                    Some(exception) => Err(Unwind::Throw(exception.clone())),
                    None => Err(invalid("rethrow outside of a catch block")),
                };
            }
            _ => {}
        }

        let value = self.eval_node(operand, env)?;
        if op == UnaryOp::Throw {
            if value.is_null() {
                return Err(self.raise(Fault::null_reference()));
            }
            return Err(Unwind::Throw(value));
        }
        if let Some(method) = method {
            if value.is_null() && operand.ty().is_nullable() {
                return Ok(Value::Null);
            }
            return self.invoke_member(method, None, &[value]);
        }
        match op {
            UnaryOp::Convert | UnaryOp::ConvertChecked | UnaryOp::Unbox => {
                ops::convert(&value, expr.ty(), op == UnaryOp::ConvertChecked, &self.registry)
                    .map_err(|fault| self.raise(fault))
            }
            UnaryOp::TypeAs => Ok(if ops::is_instance(&value, expr.ty(), false, &self.registry) {
                value
            } else {
                Value::Null
            }),
            UnaryOp::ArrayLength => match value {
                Value::Array(array) => {
                    let length = i32::try_from(array.len()).map_err(|_| self.raise(Fault::overflow()))?;
                    Ok(Value::i32(length))
                }
                Value::Null => Err(self.raise(Fault::null_reference())),
                other => Err(invalid(format!("array length of {other:?}"))),
            },
            _ if value.is_null() => Ok(Value::Null),
            _ => ops::unary(op, &value).map_err(|fault| self.raise(fault)),
        }
    }

    // Assignment

    fn assign(
        &self,
        op: BinaryOp,
        target: &NativeExpr,
        right: &NativeExpr,
        conversion: Option<&NativeExpr>,
        env: &mut Env,
    ) -> Flow {
        match target.kind() {
            NativeKind::Parameter { .. } => {
                let cell = env.cell(target)?;
                let rhs = self.eval_node(right, env)?;
                let current = cell.lock().clone();
                let value = self.combine(op, current, rhs, conversion, env)?;
                *cell.lock() = value.clone();
                Ok(value)
            }
            NativeKind::MemberAccess { expression, member } => {
                let this = match expression {
                    Some(expression) => Some(self.eval_instance(expression, env)?),
                    None => None,
                };
                let rhs = self.eval_node(right, env)?;
                let current = if op == BinaryOp::Assign {
                    Value::Void
                } else {
                    self.read_member(this.as_ref(), member)?
                };
                let value = self.combine(op, current, rhs, conversion, env)?;
                self.write_member(this.as_ref(), member, &[], value.clone())?;
                Ok(value)
            }
            NativeKind::Index {
                object,
                indexer,
                arguments,
            } => {
                let this = self.eval_instance(object, env)?;
                let args = self.eval_all(arguments, env)?;
                let rhs = self.eval_node(right, env)?;
                let current = match (op, indexer) {
                    (BinaryOp::Assign, _) => Value::Void,
                    (_, Some(indexer)) => self.invoke_member(indexer, Some(&this), &args)?,
                    (_, None) => self.array_get(&this, &args)?,
                };
                let value = self.combine(op, current, rhs, conversion, env)?;
                match indexer {
                    Some(indexer) => self.write_member(Some(&this), indexer, &args, value.clone())?,
                    None => self.array_set(&this, &args, value.clone())?,
                }
                Ok(value)
            }
            NativeKind::Binary {
                op: NativeBinaryOp::Slim(BinaryOp::ArrayIndex),
                left,
                right: index,
                ..
            } => {
                let array = self.eval_node(left, env)?;
                let index = [self.eval_node(index, env)?];
                let rhs = self.eval_node(right, env)?;
                let current = if op == BinaryOp::Assign {
                    Value::Void
                } else {
                    self.array_get(&array, &index)?
                };
                let value = self.combine(op, current, rhs, conversion, env)?;
                self.array_set(&array, &index, value.clone())?;
                Ok(value)
            }
            _ => Err(invalid(format!("{} is not assignable", target.node_kind()))),
        }
    }

    /// New value of an assignment target: `rhs` for a plain assignment,
    /// otherwise the compound operator applied and optionally converted.
    fn combine(
        &self,
        op: BinaryOp,
        current: Value,
        rhs: Value,
        conversion: Option<&NativeExpr>,
        env: &mut Env,
    ) -> Flow {
        let Some(base) = op.compound_operator() else {
            return Ok(rhs);
        };
        if current.is_null() || rhs.is_null() {
            return Ok(Value::Null);
        }
        let value = ops::arithmetic(base, &current, &rhs).map_err(|fault| self.raise(fault))?;
        match conversion {
            Some(conversion) => {
                let function = self.eval_node(conversion, env)?;
                self.call_closure(&function, vec![value])
            }
            None => Ok(value),
        }
    }

    // Calls

    fn call_closure(&self, function: &Value, args: Vec<Value>) -> Flow {
        let closure = match function {
            Value::Function(closure) => closure,
            Value::Null => return Err(self.raise(Fault::null_reference())),
            other => return Err(invalid(format!("{other:?} is not callable"))),
        };
        let NativeKind::Lambda {
            body, parameters, ..
        } = closure.lambda().kind()
        else {
            return Err(invalid("closure over a non-lambda node"));
        };
        if parameters.len() != args.len() {
            return Err(invalid(format!(
                "function of {} parameters called with {} arguments",
                parameters.len(),
                args.len()
            )));
        }

        let mut env = Env {
            vars: closure.captured.clone(),
            handling: Vec::new(),
        };
        for (parameter, arg) in parameters.iter().zip(args) {
            env.bind(parameter, arg);
        }
        match self.eval_node(body, &mut env) {
            Err(Unwind::Jump { target, .. }) => Err(EvalError::UnboundLabel {
                label: target.name().unwrap_or("_").to_owned(),
            }
            .into()),
            other => other,
        }
    }

    fn invoke_member(&self, member: &RuntimeMember, this: Option<&Value>, args: &[Value]) -> Flow {
        let Some(implementation) = member.implementation() else {
            return Err(EvalError::MissingImplementation {
                member: member.clone(),
            }
            .into());
        };
        tracing::trace!(%member, "host call");
        implementation(HostCall {
            registry: &self.registry,
            member,
            this,
            args,
        })
        .map_err(Unwind::Throw)
    }

    fn construct(
        &self,
        expr: &NativeExpr,
        constructor: Option<&RuntimeMember>,
        arguments: &[NativeExpr],
        env: &mut Env,
    ) -> Flow {
        let Some(constructor) = constructor else {
            return Ok(self.registry.default_value(expr.ty()));
        };
        let args = self.eval_all(arguments, env)?;
        if constructor.implementation().is_none() && args.is_empty() {
            return Ok(self.registry.new_instance(constructor.declaring_type()));
        }
        self.invoke_member(constructor, None, &args)
    }

    // Members

    fn read_member(&self, this: Option<&Value>, member: &RuntimeMember) -> Flow {
        match member.kind() {
            RuntimeMemberKind::Property {
                getter: Some(_), ..
            } => self.invoke_member(member, this, &[]),
            RuntimeMemberKind::Field { .. } | RuntimeMemberKind::Property { .. } => {
                let object = self.storage(this, member)?;
                Ok(object
                    .as_object()
                    .and_then(|o| o.get(member.name()))
                    .unwrap_or_else(|| self.registry.default_value(member.member_type())))
            }
            _ => Err(invalid(format!("{member} is not a field or property"))),
        }
    }

    fn write_member(&self, this: Option<&Value>, member: &RuntimeMember, index: &[Value], value: Value) -> Flow<()> {
        match member.kind() {
            RuntimeMemberKind::Property {
                setter: Some(setter),
                ..
            } => {
                let mut args = index.to_vec();
                args.push(value);
                setter(HostCall {
                    registry: &self.registry,
                    member,
                    this,
                    args: &args,
                })
                .map(drop)
                .map_err(Unwind::Throw)
            }
            RuntimeMemberKind::Property {
                getter: Some(_), ..
            } => Err(invalid(format!("{member} is read-only"))),
            RuntimeMemberKind::Field { .. } | RuntimeMemberKind::Property { .. } => {
                let object = self.storage(this, member)?;
                match object.as_object() {
                    Some(o) => {
                        o.set(member.name(), value);
                        Ok(())
                    }
                    None => Err(invalid(format!("{member} has no storage on {object:?}"))),
                }
            }
            _ => Err(invalid(format!("{member} is not a field or property"))),
        }
    }

    /// The object holding a stored member's value.
    fn storage<'v>(&self, this: Option<&'v Value>, member: &RuntimeMember) -> Flow<&'v Value> {
        match this {
            Some(Value::Null) => Err(self.raise(Fault::null_reference())),
            Some(object) => Ok(object),
            None => Err(invalid(format!("static storage for {member} is not supported"))),
        }
    }

    fn apply_bindings(&self, object: &Value, bindings: &[NativeBinding], env: &mut Env) -> Flow<()> {
        for binding in bindings {
            match binding {
                NativeBinding::Assignment { member, expression } => {
                    let value = self.eval_node(expression, env)?;
                    self.write_member(Some(object), member, &[], value)?;
                }
                NativeBinding::MemberBind { member, bindings } => {
                    let inner = self.read_member(Some(object), member)?;
                    self.apply_bindings(&inner, bindings, env)?;
                }
                NativeBinding::ListBind {
                    member,
                    initializers,
                } => {
                    let collection = self.read_member(Some(object), member)?;
                    self.add_elements(&collection, initializers, env)?;
                }
            }
        }
        Ok(())
    }

    fn add_elements(&self, collection: &Value, initializers: &[NativeElementInit], env: &mut Env) -> Flow<()> {
        if collection.is_null() {
            return Err(self.raise(Fault::null_reference()));
        }
        for init in initializers {
            let args = self.eval_all(&init.arguments, env)?;
            self.invoke_member(&init.add_method, Some(collection), &args)?;
        }
        Ok(())
    }

    // Arrays

    fn array_offset(&self, array: &Value, indices: &[Value]) -> Flow<(Arc<ArrayValue>, usize)> {
        let array = match array {
            Value::Array(array) => array.clone(),
            Value::Null => return Err(self.raise(Fault::null_reference())),
            other => return Err(invalid(format!("indexing {other:?} as an array"))),
        };
        let indices = indices
            .iter()
            .map(|i| i.as_int().ok_or_else(|| invalid("array index is not an integer")))
            .collect::<Result<SmallVec<[i128; 2]>, _>>()?;
        match array.offset(&indices) {
            Some(offset) => Ok((array, offset)),
            None => Err(self.raise(Fault::new(
                BuiltinException::IndexOutOfRange,
                "Index was outside the bounds of the array.",
            ))),
        }
    }

    fn array_get(&self, array: &Value, indices: &[Value]) -> Flow {
        let (array, offset) = self.array_offset(array, indices)?;
        Ok(array.get(offset).unwrap_or(Value::Null))
    }

    fn array_set(&self, array: &Value, indices: &[Value], value: Value) -> Flow<()> {
        let (array, offset) = self.array_offset(array, indices)?;
        array.set(offset, value);
        Ok(())
    }

    // Statements

    /// Run a block body. A jump to a label that is a direct child resumes
    /// right after that label with the carried value.
    fn run_block(&self, expressions: &[NativeExpr], env: &mut Env) -> Flow {
        let mut last = Value::Void;
        let mut next = 0;
        while let Some(expr) = expressions.get(next) {
            match self.eval_node(expr, env) {
                Ok(value) => {
                    last = value;
                    next += 1;
                }
                Err(Unwind::Jump { target, value }) => {
                    let Some(position) = expressions.iter().position(|e| {
                        matches!(e.kind(), NativeKind::Label { target: t, .. } if t.ptr_eq(&target))
                    }) else {
                        return Err(Unwind::Jump { target, value });
                    };
                    last = value;
                    next = position + 1;
                }
                Err(other) => return Err(other),
            }
        }
        Ok(last)
    }

    fn run_try(
        &self,
        body: &NativeExpr,
        handlers: &[NativeCatch],
        finally: Option<&NativeExpr>,
        fault: Option<&NativeExpr>,
        env: &mut Env,
    ) -> Flow {
        let outcome = match self.eval_node(body, env) {
            Err(Unwind::Throw(exception)) => self.catch(handlers, exception, env),
            other => other,
        };
        let outcome = match (fault, outcome) {
            (Some(fault), Err(Unwind::Throw(exception))) => {
                self.eval_node(fault, env)?;
                Err(Unwind::Throw(exception))
            }
            (_, outcome) => outcome,
        };
        if let Some(finally) = finally {
            self.eval_node(finally, env)?;
        }
        outcome
    }

    /// Run the first handler accepting `exception`, or rethrow it.
    fn catch(&self, handlers: &[NativeCatch], exception: Value, env: &mut Env) -> Flow {
        for handler in handlers {
            if !ops::is_instance(&exception, &handler.test, false, &self.registry) {
                continue;
            }
            let shadowed: Vec<Shadowed> = handler
                .variable
                .iter()
                .map(|v| env.bind(v, exception.clone()))
                .collect();
            let accepted = match &handler.filter {
                Some(filter) => self.eval_bool(filter, env),
                None => Ok(true),
            };
            match accepted {
                Ok(true) => {}
                Ok(false) => {
                    env.restore(shadowed);
                    continue;
                }
                Err(unwind) => {
                    env.restore(shadowed);
                    return Err(unwind);
                }
            }
            env.handling.push(exception);
            let result = self.eval_node(&handler.body, env);
            env.handling.pop();
            env.restore(shadowed);
            return result;
        }
        Err(Unwind::Throw(exception))
    }

    fn run_switch(
        &self,
        switch_value: &NativeExpr,
        default_body: Option<&NativeExpr>,
        comparison: Option<&RuntimeMember>,
        cases: &[NativeSwitchCase],
        env: &mut Env,
    ) -> Flow {
        let value = self.eval_node(switch_value, env)?;
        for case in cases {
            for test in case.test_values.iter() {
                let test = self.eval_node(test, env)?;
                let hit = match comparison {
                    Some(comparison) => {
                        self.invoke_member(comparison, None, &[value.clone(), test])?
                            .as_bool()
                            == Some(true)
                    }
                    None => value.equals(&test),
                };
                if hit {
                    return self.eval_node(&case.body, env);
                }
            }
        }
        match default_body {
            Some(body) => self.eval_node(body, env),
            None => Ok(Value::Void),
        }
    }
}

/// Result of a lifted operator when an operand is `null`.
fn lifted_null_result(op: BinaryOp, left: &Value, right: &Value, lifted_to_null: bool) -> Value {
    if !op.is_comparison() || lifted_to_null {
        return Value::Null;
    }
    let both = left.is_null() && right.is_null();
    match op {
        BinaryOp::Equal => Value::Bool(both),
        BinaryOp::NotEqual => Value::Bool(!both),
        _ => Value::Bool(false),
    }
}

fn invalid(message: impl Into<String>) -> Unwind {
    Unwind::Error(EvalError::InvalidProgram(message.into()))
}

#[cfg(test)]
mod tests;
