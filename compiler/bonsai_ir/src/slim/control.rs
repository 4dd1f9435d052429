//! Statement-like nodes: blocks, exception handling, switches, labels,
//! loops and jumps.

use std::sync::Arc;

use super::nodes::ParameterRef;
use super::operators::GotoKind;
use super::{same_opt, Expr, ExprList, NodeKind};
use crate::descriptor::{MemberSlim, TypeSlim};
use crate::error::ConstructionError;

/// Shared handle to a jump target; every `Label`/`Goto`/`Loop` referring to
/// the same target clones the same `Arc`.
pub type LabelRef = Arc<LabelTarget>;

/// A jump target. `ty` is the type of the value carried by jumps to it;
/// `None` means `void`.
#[derive(Debug)]
pub struct LabelTarget {
    pub ty: Option<TypeSlim>,
    pub name: Option<Arc<str>>,
}

impl LabelTarget {
    /// Fresh label identity.
    pub fn new(ty: Option<TypeSlim>, name: Option<&str>) -> LabelRef {
        Arc::new(LabelTarget {
            ty,
            name: name.map(Arc::from),
        })
    }

    pub fn value_type(&self) -> TypeSlim {
        self.ty.clone().unwrap_or_else(TypeSlim::void)
    }
}

#[derive(Debug)]
pub struct BlockSlim {
    pub ty: Option<TypeSlim>,
    pub variables: Arc<[ParameterRef]>,
    /// Never empty.
    pub expressions: ExprList,
}

impl BlockSlim {
    pub fn update(self: &Arc<Self>, variables: Arc<[ParameterRef]>, expressions: ExprList) -> Arc<Self> {
        if Arc::ptr_eq(&variables, &self.variables) && Arc::ptr_eq(&expressions, &self.expressions) {
            return Arc::clone(self);
        }
        Arc::new(BlockSlim {
            ty: self.ty.clone(),
            variables,
            expressions,
        })
    }

    pub fn result(&self) -> Option<&Expr> {
        self.expressions.last()
    }
}

/// One `catch` clause.
///
/// `test` is the caught exception type; `variable`, when present, receives
/// the exception and has a type assignable from `test`.
#[derive(Debug)]
pub struct CatchBlock {
    pub test: TypeSlim,
    pub variable: Option<ParameterRef>,
    pub body: Expr,
    pub filter: Option<Expr>,
}

impl CatchBlock {
    pub fn new(
        test: TypeSlim,
        variable: Option<ParameterRef>,
        body: Expr,
        filter: Option<Expr>,
    ) -> Arc<Self> {
        Arc::new(CatchBlock {
            test,
            variable,
            body,
            filter,
        })
    }

    pub fn update(
        self: &Arc<Self>,
        variable: Option<ParameterRef>,
        body: Expr,
        filter: Option<Expr>,
    ) -> Arc<Self> {
        if same_opt(variable.as_ref(), self.variable.as_ref())
            && body.ptr_eq(&self.body)
            && same_opt(filter.as_ref(), self.filter.as_ref())
        {
            return Arc::clone(self);
        }
        CatchBlock::new(self.test.clone(), variable, body, filter)
    }
}

#[derive(Debug)]
pub struct TrySlim {
    pub ty: Option<TypeSlim>,
    pub body: Expr,
    pub handlers: Arc<[Arc<CatchBlock>]>,
    pub finally: Option<Expr>,
    pub fault: Option<Expr>,
}

impl TrySlim {
    /// Check the handler shape shared by every `try`.
    ///
    /// With a fault block there may be neither handlers nor a finally block;
    /// without one there must be at least one of them.
    pub fn validate(
        handlers: &[Arc<CatchBlock>],
        finally: Option<&Expr>,
        fault: Option<&Expr>,
    ) -> Result<(), ConstructionError> {
        match (fault.is_some(), handlers.is_empty(), finally.is_some()) {
            (true, false, _) | (true, _, true) => Err(ConstructionError::new(
                NodeKind::Try,
                "a fault block cannot be combined with catch handlers or a finally block",
            )),
            (false, true, false) => Err(ConstructionError::new(
                NodeKind::Try,
                "needs at least one catch handler or a finally block",
            )),
            _ => Ok(()),
        }
    }

    pub fn update(
        self: &Arc<Self>,
        body: Expr,
        handlers: Arc<[Arc<CatchBlock>]>,
        finally: Option<Expr>,
        fault: Option<Expr>,
    ) -> Result<Arc<Self>, ConstructionError> {
        if body.ptr_eq(&self.body)
            && Arc::ptr_eq(&handlers, &self.handlers)
            && same_opt(finally.as_ref(), self.finally.as_ref())
            && same_opt(fault.as_ref(), self.fault.as_ref())
        {
            return Ok(Arc::clone(self));
        }
        TrySlim::validate(&handlers, finally.as_ref(), fault.as_ref())?;
        Ok(Arc::new(TrySlim {
            ty: self.ty.clone(),
            body,
            handlers,
            finally,
            fault,
        }))
    }
}

#[derive(Debug)]
pub struct SwitchCase {
    /// Never empty.
    pub test_values: ExprList,
    pub body: Expr,
}

impl SwitchCase {
    pub fn new(test_values: Vec<Expr>, body: Expr) -> Result<Arc<Self>, ConstructionError> {
        if test_values.is_empty() {
            return Err(ConstructionError::new(
                NodeKind::Switch,
                "a switch case needs at least one test value",
            ));
        }
        Ok(Arc::new(SwitchCase {
            test_values: test_values.into(),
            body,
        }))
    }

    pub fn update(self: &Arc<Self>, test_values: ExprList, body: Expr) -> Arc<Self> {
        if Arc::ptr_eq(&test_values, &self.test_values) && body.ptr_eq(&self.body) {
            return Arc::clone(self);
        }
        Arc::new(SwitchCase { test_values, body })
    }
}

#[derive(Debug)]
pub struct SwitchSlim {
    pub ty: Option<TypeSlim>,
    pub switch_value: Expr,
    pub default_body: Option<Expr>,
    /// Equality method used to compare test values; `None` uses `==`.
    pub comparison: Option<MemberSlim>,
    pub cases: Arc<[Arc<SwitchCase>]>,
}

impl SwitchSlim {
    pub fn update(
        self: &Arc<Self>,
        switch_value: Expr,
        cases: Arc<[Arc<SwitchCase>]>,
        default_body: Option<Expr>,
    ) -> Arc<Self> {
        if switch_value.ptr_eq(&self.switch_value)
            && Arc::ptr_eq(&cases, &self.cases)
            && same_opt(default_body.as_ref(), self.default_body.as_ref())
        {
            return Arc::clone(self);
        }
        Arc::new(SwitchSlim {
            ty: self.ty.clone(),
            switch_value,
            default_body,
            comparison: self.comparison.clone(),
            cases,
        })
    }
}

/// Marks a jump target; evaluates to `default_value` when reached by
/// falling through.
#[derive(Debug)]
pub struct LabelSlim {
    pub target: LabelRef,
    pub default_value: Option<Expr>,
}

impl LabelSlim {
    pub fn update(self: &Arc<Self>, target: LabelRef, default_value: Option<Expr>) -> Arc<Self> {
        if Arc::ptr_eq(&target, &self.target)
            && same_opt(default_value.as_ref(), self.default_value.as_ref())
        {
            return Arc::clone(self);
        }
        Arc::new(LabelSlim {
            target,
            default_value,
        })
    }
}

#[derive(Debug)]
pub struct LoopSlim {
    pub body: Expr,
    pub break_label: Option<LabelRef>,
    pub continue_label: Option<LabelRef>,
}

impl LoopSlim {
    pub fn update(
        self: &Arc<Self>,
        body: Expr,
        break_label: Option<LabelRef>,
        continue_label: Option<LabelRef>,
    ) -> Arc<Self> {
        if body.ptr_eq(&self.body)
            && same_opt(break_label.as_ref(), self.break_label.as_ref())
            && same_opt(continue_label.as_ref(), self.continue_label.as_ref())
        {
            return Arc::clone(self);
        }
        Arc::new(LoopSlim {
            body,
            break_label,
            continue_label,
        })
    }
}

#[derive(Debug)]
pub struct GotoSlim {
    pub kind: GotoKind,
    pub target: LabelRef,
    pub value: Option<Expr>,
    pub ty: Option<TypeSlim>,
}

impl GotoSlim {
    pub fn update(self: &Arc<Self>, target: LabelRef, value: Option<Expr>) -> Arc<Self> {
        if Arc::ptr_eq(&target, &self.target) && same_opt(value.as_ref(), self.value.as_ref()) {
            return Arc::clone(self);
        }
        Arc::new(GotoSlim {
            kind: self.kind,
            target,
            value,
            ty: self.ty.clone(),
        })
    }
}
