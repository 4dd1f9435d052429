//! Structural equality of slim trees modulo parameter and label identity.
//!
//! Two trees are equal when they have the same kinds, operators,
//! descriptors and constants at every position, and their variables and
//! labels correspond one-to-one. Parameters declared at matching binding
//! sites (lambda parameters, block variables, catch variables) are paired
//! when the binding site is entered; labels are paired on first sight.
//! Free parameters are equal only if they are the same handle.
//!
//! Argument storage is ignored: a call built with inline arguments equals
//! one built with a forced argument list.

use std::sync::Arc;

use rustc_hash::FxHashMap;

use crate::slim::{
    Arguments, CatchBlock, ElementInit, Expr, LabelRef, MemberBinding, NewSlim, ParameterRef,
    SwitchCase,
};
use crate::stack::ensure_sufficient_stack;

/// Comparison session. Reuse one instance to compare several trees that
/// share free variables consistently.
#[derive(Default)]
pub struct SlimEquality {
    params: Bijection<ParameterRef>,
    labels: Bijection<LabelRef>,
}

/// One-to-one pairing of handles, keyed by address.
struct Bijection<T> {
    forward: FxHashMap<usize, T>,
    backward: FxHashMap<usize, T>,
}

impl<T> Default for Bijection<T> {
    fn default() -> Self {
        Bijection {
            forward: FxHashMap::default(),
            backward: FxHashMap::default(),
        }
    }
}

fn addr<T>(handle: &Arc<T>) -> usize {
    Arc::as_ptr(handle) as usize
}

impl<U> Bijection<Arc<U>> {
    /// Pair `a` with `b`; false if either is already paired elsewhere.
    fn bind(&mut self, a: &Arc<U>, b: &Arc<U>) -> bool {
        match (self.forward.get(&addr(a)), self.backward.get(&addr(b))) {
            (None, None) => {
                self.forward.insert(addr(a), Arc::clone(b));
                self.backward.insert(addr(b), Arc::clone(a));
                true
            }
            (Some(x), Some(y)) => Arc::ptr_eq(x, b) && Arc::ptr_eq(y, a),
            _ => false,
        }
    }

    /// Whether `a` and `b` correspond, without creating a pairing.
    fn matches(&self, a: &Arc<U>, b: &Arc<U>) -> bool {
        match (self.forward.get(&addr(a)), self.backward.get(&addr(b))) {
            (Some(x), _) => Arc::ptr_eq(x, b),
            (None, Some(_)) => false,
            (None, None) => Arc::ptr_eq(a, b),
        }
    }
}

impl SlimEquality {
    pub fn new() -> Self {
        Self::default()
    }

    /// Compare two trees in a fresh session.
    pub fn equal(a: &Expr, b: &Expr) -> bool {
        SlimEquality::new().compare(a, b)
    }

    /// Shared subtrees are still walked: a parameter or label inside one
    /// may already be paired with a different handle.
    pub fn compare(&mut self, a: &Expr, b: &Expr) -> bool {
        ensure_sufficient_stack(|| self.eq_node(a, b))
    }

    fn eq_node(&mut self, a: &Expr, b: &Expr) -> bool {
        match (a, b) {
            (Expr::Binary(x), Expr::Binary(y)) => {
                x.op == y.op
                    && x.lifted_to_null == y.lifted_to_null
                    && x.method == y.method
                    && self.compare(&x.left, &y.left)
                    && self.compare(&x.right, &y.right)
                    && match (&x.conversion, &y.conversion) {
                        (None, None) => true,
                        (Some(c), Some(d)) => {
                            self.compare(&Expr::Lambda(Arc::clone(c)), &Expr::Lambda(Arc::clone(d)))
                        }
                        _ => false,
                    }
            }
            (Expr::Unary(x), Expr::Unary(y)) => {
                x.op == y.op && x.ty == y.ty && x.method == y.method && self.compare(&x.operand, &y.operand)
            }
            (Expr::Constant(x), Expr::Constant(y)) => x.ty == y.ty && x.value == y.value,
            (Expr::Default(x), Expr::Default(y)) => x.ty == y.ty,
            (Expr::Parameter(x), Expr::Parameter(y)) => self.params.matches(x, y),
            (Expr::Lambda(x), Expr::Lambda(y)) => {
                x.ty == y.ty
                    && x.name == y.name
                    && x.tail_call == y.tail_call
                    && self.bind_params(&x.parameters, &y.parameters)
                    && self.compare(&x.body, &y.body)
            }
            (Expr::Invocation(x), Expr::Invocation(y)) => {
                self.compare(&x.expression, &y.expression) && self.eq_args(&x.arguments, &y.arguments)
            }
            (Expr::MethodCall(x), Expr::MethodCall(y)) => {
                x.method == y.method
                    && self.eq_opt(x.object.as_ref(), y.object.as_ref())
                    && self.eq_args(&x.arguments, &y.arguments)
            }
            (Expr::New(x), Expr::New(y)) => self.eq_new(x, y),
            (Expr::NewArrayBounds(x), Expr::NewArrayBounds(y)) => {
                x.element_type == y.element_type && self.eq_list(&x.bounds, &y.bounds)
            }
            (Expr::NewArrayInit(x), Expr::NewArrayInit(y)) => {
                x.element_type == y.element_type && self.eq_list(&x.expressions, &y.expressions)
            }
            (Expr::MemberAccess(x), Expr::MemberAccess(y)) => {
                x.member == y.member && self.eq_opt(x.expression.as_ref(), y.expression.as_ref())
            }
            (Expr::MemberInit(x), Expr::MemberInit(y)) => {
                self.eq_new(&x.new_expression, &y.new_expression)
                    && x.bindings.len() == y.bindings.len()
                    && x
                        .bindings
                        .iter()
                        .zip(y.bindings.iter())
                        .all(|(b, c)| self.eq_binding(b, c))
            }
            (Expr::ListInit(x), Expr::ListInit(y)) => {
                self.eq_new(&x.new_expression, &y.new_expression)
                    && self.eq_inits(&x.initializers, &y.initializers)
            }
            (Expr::Conditional(x), Expr::Conditional(y)) => {
                x.ty == y.ty
                    && self.compare(&x.test, &y.test)
                    && self.compare(&x.if_true, &y.if_true)
                    && self.compare(&x.if_false, &y.if_false)
            }
            (Expr::TypeBinary(x), Expr::TypeBinary(y)) => {
                x.op == y.op
                    && x.type_operand == y.type_operand
                    && self.compare(&x.expression, &y.expression)
            }
            (Expr::Block(x), Expr::Block(y)) => {
                x.ty == y.ty
                    && self.bind_params(&x.variables, &y.variables)
                    && self.eq_list(&x.expressions, &y.expressions)
            }
            (Expr::Try(x), Expr::Try(y)) => {
                x.ty == y.ty
                    && self.compare(&x.body, &y.body)
                    && x.handlers.len() == y.handlers.len()
                    && x
                        .handlers
                        .iter()
                        .zip(y.handlers.iter())
                        .all(|(h, g)| self.eq_catch(h, g))
                    && self.eq_opt(x.finally.as_ref(), y.finally.as_ref())
                    && self.eq_opt(x.fault.as_ref(), y.fault.as_ref())
            }
            (Expr::Switch(x), Expr::Switch(y)) => {
                x.ty == y.ty
                    && x.comparison == y.comparison
                    && self.compare(&x.switch_value, &y.switch_value)
                    && x.cases.len() == y.cases.len()
                    && x
                        .cases
                        .iter()
                        .zip(y.cases.iter())
                        .all(|(c, d)| self.eq_case(c, d))
                    && self.eq_opt(x.default_body.as_ref(), y.default_body.as_ref())
            }
            (Expr::Label(x), Expr::Label(y)) => {
                self.eq_label(&x.target, &y.target)
                    && self.eq_opt(x.default_value.as_ref(), y.default_value.as_ref())
            }
            (Expr::Loop(x), Expr::Loop(y)) => {
                self.eq_opt_label(x.break_label.as_ref(), y.break_label.as_ref())
                    && self.eq_opt_label(x.continue_label.as_ref(), y.continue_label.as_ref())
                    && self.compare(&x.body, &y.body)
            }
            (Expr::Goto(x), Expr::Goto(y)) => {
                x.kind == y.kind
                    && x.ty == y.ty
                    && self.eq_label(&x.target, &y.target)
                    && self.eq_opt(x.value.as_ref(), y.value.as_ref())
            }
            (Expr::Index(x), Expr::Index(y)) => {
                x.indexer == y.indexer
                    && self.compare(&x.object, &y.object)
                    && self.eq_list(&x.arguments, &y.arguments)
            }
            _ => false,
        }
    }

    fn bind_params(&mut self, a: &[ParameterRef], b: &[ParameterRef]) -> bool {
        a.len() == b.len()
            && a
                .iter()
                .zip(b)
                .all(|(p, q)| p.ty == q.ty && self.params.bind(p, q))
    }

    fn eq_label(&mut self, a: &LabelRef, b: &LabelRef) -> bool {
        a.ty == b.ty && self.labels.bind(a, b)
    }

    fn eq_opt_label(&mut self, a: Option<&LabelRef>, b: Option<&LabelRef>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => self.eq_label(a, b),
            _ => false,
        }
    }

    fn eq_opt(&mut self, a: Option<&Expr>, b: Option<&Expr>) -> bool {
        match (a, b) {
            (None, None) => true,
            (Some(a), Some(b)) => self.compare(a, b),
            _ => false,
        }
    }

    fn eq_list(&mut self, a: &[Expr], b: &[Expr]) -> bool {
        a.len() == b.len() && a.iter().zip(b).all(|(x, y)| self.compare(x, y))
    }

    fn eq_args(&mut self, a: &Arguments, b: &Arguments) -> bool {
        a.len() == b.len() && a.iter().zip(b.iter()).all(|(x, y)| self.compare(x, y))
    }

    fn eq_new(&mut self, a: &NewSlim, b: &NewSlim) -> bool {
        a.constructor == b.constructor
            && a.value_type == b.value_type
            && self.eq_args(&a.arguments, &b.arguments)
    }

    fn eq_inits(&mut self, a: &[Arc<ElementInit>], b: &[Arc<ElementInit>]) -> bool {
        a.len() == b.len()
            && a.iter().zip(b).all(|(x, y)| {
                x.add_method == y.add_method && self.eq_list(&x.arguments, &y.arguments)
            })
    }

    fn eq_binding(&mut self, a: &MemberBinding, b: &MemberBinding) -> bool {
        match (a, b) {
            (
                MemberBinding::Assignment {
                    member: m,
                    expression: e,
                },
                MemberBinding::Assignment {
                    member: n,
                    expression: f,
                },
            ) => m == n && self.compare(e, f),
            (
                MemberBinding::MemberBind {
                    member: m,
                    bindings: x,
                },
                MemberBinding::MemberBind {
                    member: n,
                    bindings: y,
                },
            ) => {
                m == n
                    && x.len() == y.len()
                    && x.iter().zip(y.iter()).all(|(b, c)| self.eq_binding(b, c))
            }
            (
                MemberBinding::ListBind {
                    member: m,
                    initializers: x,
                },
                MemberBinding::ListBind {
                    member: n,
                    initializers: y,
                },
            ) => m == n && self.eq_inits(x, y),
            _ => false,
        }
    }

    fn eq_catch(&mut self, a: &CatchBlock, b: &CatchBlock) -> bool {
        a.test == b.test
            && match (&a.variable, &b.variable) {
                (None, None) => true,
                (Some(p), Some(q)) => p.ty == q.ty && self.params.bind(p, q),
                _ => false,
            }
            && self.eq_opt(a.filter.as_ref(), b.filter.as_ref())
            && self.compare(&a.body, &b.body)
    }

    fn eq_case(&mut self, a: &SwitchCase, b: &SwitchCase) -> bool {
        self.eq_list(&a.test_values, &b.test_values) && self.compare(&a.body, &b.body)
    }
}
