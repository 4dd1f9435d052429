//! Stock rewriters built on [`Rewriter`].

use std::sync::Arc;

use rustc_hash::{FxHashMap, FxHashSet};

use super::{walk_block, walk_catch_block, walk_lambda, Rewriter, Visited};
use crate::error::SlimError;
use crate::slim::{
    BlockSlim, CatchBlock, Expr, LabelRef, LabelTarget, LambdaSlim, ParameterRef, ParameterSlim,
};

/// Address of a shared handle, used as a map key.
///
/// The owning map also stores the handle itself, which keeps the address
/// from being reused while the entry exists.
fn addr<T>(handle: &Arc<T>) -> usize {
    Arc::as_ptr(handle) as usize
}

/// Replaces parameters by expressions, matching by identity.
///
/// Declaration sites (lambda parameters, block variables, catch variables)
/// go through convert-and-cast visiting, so substituting a declared
/// parameter with anything other than another parameter fails with
/// [`SlimError::InvariantViolation`].
#[derive(Default)]
pub struct Substitutor {
    replacements: FxHashMap<usize, (ParameterRef, Expr)>,
}

impl Substitutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace every occurrence of `param` with `replacement`.
    #[must_use]
    pub fn with(mut self, param: &ParameterRef, replacement: Expr) -> Self {
        self.replacements
            .insert(addr(param), (Arc::clone(param), replacement));
        self
    }

    pub fn is_empty(&self) -> bool {
        self.replacements.is_empty()
    }

    pub fn apply(&mut self, expr: &Expr) -> Visited {
        self.visit(expr)
    }
}

impl Rewriter for Substitutor {
    fn visit_parameter(&mut self, node: &ParameterRef) -> Visited {
        Ok(match self.replacements.get(&addr(node)) {
            Some((_, replacement)) => replacement.clone(),
            None => Expr::Parameter(Arc::clone(node)),
        })
    }
}

/// Replaces every parameter and label with a fresh unnamed one.
///
/// Each distinct identity maps to exactly one replacement, so the result
/// has the same binding structure as the input.
#[derive(Default)]
pub struct Anonymizer {
    parameters: FxHashMap<usize, (ParameterRef, ParameterRef)>,
    labels: FxHashMap<usize, (LabelRef, LabelRef)>,
}

impl Anonymizer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn apply(&mut self, expr: &Expr) -> Visited {
        self.visit(expr)
    }
}

impl Rewriter for Anonymizer {
    fn visit_parameter(&mut self, node: &ParameterRef) -> Visited {
        let (_, fresh) = self.parameters.entry(addr(node)).or_insert_with(|| {
            (
                Arc::clone(node),
                Arc::new(ParameterSlim {
                    ty: node.ty.clone(),
                    name: None,
                }),
            )
        });
        Ok(Expr::Parameter(Arc::clone(fresh)))
    }

    fn visit_label_target(&mut self, target: &LabelRef) -> Result<LabelRef, SlimError> {
        let (_, fresh) = self.labels.entry(addr(target)).or_insert_with(|| {
            (
                Arc::clone(target),
                Arc::new(LabelTarget {
                    ty: target.ty.clone(),
                    name: None,
                }),
            )
        });
        Ok(Arc::clone(fresh))
    }
}

/// Collects parameters that are used but not declared by an enclosing
/// lambda, block or catch clause.
///
/// Results are in first-occurrence order, without duplicates.
#[derive(Default)]
pub struct FreeVariables {
    scopes: Vec<Vec<usize>>,
    seen: FxHashSet<usize>,
    free: Vec<ParameterRef>,
}

impl FreeVariables {
    pub fn collect(expr: &Expr) -> Result<Vec<ParameterRef>, SlimError> {
        let mut collector = FreeVariables::default();
        collector.visit(expr)?;
        Ok(collector.free)
    }

    fn is_bound(&self, key: usize) -> bool {
        self.scopes.iter().any(|scope| scope.contains(&key))
    }

    fn scoped<T>(
        &mut self,
        declared: impl IntoIterator<Item = usize>,
        body: impl FnOnce(&mut Self) -> T,
    ) -> T {
        self.scopes.push(declared.into_iter().collect());
        let result = body(self);
        self.scopes.pop();
        result
    }
}

impl Rewriter for FreeVariables {
    fn visit_parameter(&mut self, node: &ParameterRef) -> Visited {
        let key = addr(node);
        if !self.is_bound(key) && self.seen.insert(key) {
            self.free.push(Arc::clone(node));
        }
        Ok(Expr::Parameter(Arc::clone(node)))
    }

    fn visit_lambda(&mut self, node: &Arc<LambdaSlim>) -> Visited {
        self.scoped(node.parameters.iter().map(addr), |this| walk_lambda(this, node))
    }

    fn visit_block(&mut self, node: &Arc<BlockSlim>) -> Visited {
        self.scoped(node.variables.iter().map(addr), |this| walk_block(this, node))
    }

    fn visit_catch_block(&mut self, node: &Arc<CatchBlock>) -> Result<Arc<CatchBlock>, SlimError> {
        self.scoped(node.variable.iter().map(addr), |this| walk_catch_block(this, node))
    }
}
