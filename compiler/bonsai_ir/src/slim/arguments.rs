//! Arity-specialized argument storage for call-like nodes.
//!
//! Call sites dominate tree size, and most calls take few arguments. Instead
//! of a `kind + Vec<Expr>` pair, calls with up to five arguments keep one
//! field per argument directly in the node; only six or more arguments (or
//! an explicit request) use a shared list.
//!
//! # Reification
//!
//! Consumers that want "all arguments as a slice" call
//! [`Arguments::as_slice`]. For an inline variant argument 0 sits in a
//! [`FirstArgument`], which pairs it with a write-once cell. The first such
//! request materializes the list into that cell; the cell is authoritative
//! from then on and every later request returns the same allocation. Nodes
//! that nobody asks for a slice never allocate one, but every inline node
//! carries the empty cell (24 bytes on 64-bit targets).

use std::sync::{Arc, OnceLock};

use super::{Expr, ExprList};

/// Slot for argument 0 of an inline argument list.
///
/// Holds the argument itself plus a write-once cell for the reified list.
#[derive(Clone)]
pub struct FirstArgument {
    arg: Expr,
    reified: OnceLock<ExprList>,
}

impl FirstArgument {
    pub fn new(arg: Expr) -> Self {
        FirstArgument {
            arg,
            reified: OnceLock::new(),
        }
    }

    /// Argument 0. Reads the reified list once it exists.
    #[inline]
    pub fn get(&self) -> &Expr {
        match self.reified.get() {
            Some(list) => &list[0],
            None => &self.arg,
        }
    }

    /// Whether the full list has been materialized.
    #[inline]
    pub fn is_reified(&self) -> bool {
        self.reified.get().is_some()
    }

    fn reify(&self, rest: &[&Expr]) -> &ExprList {
        self.reified.get_or_init(|| {
            std::iter::once(self.arg.clone())
                .chain(rest.iter().map(|&e| e.clone()))
                .collect()
        })
    }
}

/// Arguments of a call, constructor call or invocation.
#[derive(Clone)]
pub enum Arguments {
    Nullary,
    Unary(FirstArgument),
    Binary(FirstArgument, Expr),
    Ternary(FirstArgument, Expr, Expr),
    Quaternary(FirstArgument, Expr, Expr, Expr),
    Quinary(FirstArgument, Expr, Expr, Expr, Expr),
    /// Six or more arguments, or a list built with [`Arguments::nary`].
    Nary(ExprList),
}

impl Arguments {
    /// Pick the most compact representation for `args`.
    pub fn new(args: Vec<Expr>) -> Self {
        let mut it = args.into_iter();
        let len = it.len();
        match (len, it.next(), it.next(), it.next(), it.next(), it.next()) {
            (0, ..) => Arguments::Nullary,
            (1, Some(a), ..) => Arguments::Unary(FirstArgument::new(a)),
            (2, Some(a), Some(b), ..) => Arguments::Binary(FirstArgument::new(a), b),
            (3, Some(a), Some(b), Some(c), ..) => {
                Arguments::Ternary(FirstArgument::new(a), b, c)
            }
            (4, Some(a), Some(b), Some(c), Some(d), _) => {
                Arguments::Quaternary(FirstArgument::new(a), b, c, d)
            }
            (5, Some(a), Some(b), Some(c), Some(d), Some(e)) => {
                Arguments::Quinary(FirstArgument::new(a), b, c, d, e)
            }
            (_, a, b, c, d, e) => Arguments::Nary(
                [a, b, c, d, e]
                    .into_iter()
                    .flatten()
                    .chain(it)
                    .collect(),
            ),
        }
    }

    /// Always use the generic list representation.
    pub fn nary(args: Vec<Expr>) -> Self {
        Arguments::Nary(args.into())
    }

    pub fn len(&self) -> usize {
        match self {
            Arguments::Nullary => 0,
            Arguments::Unary(..) => 1,
            Arguments::Binary(..) => 2,
            Arguments::Ternary(..) => 3,
            Arguments::Quaternary(..) => 4,
            Arguments::Quinary(..) => 5,
            Arguments::Nary(list) => list.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether this list uses the inline (specialized) representation.
    pub fn is_inline(&self) -> bool {
        !matches!(self, Arguments::Nary(_))
    }

    /// Argument `index`, without reifying.
    pub fn get(&self, index: usize) -> Option<&Expr> {
        match (self, index) {
            (Arguments::Nary(list), i) => list.get(i),
            (
                Arguments::Unary(a)
                | Arguments::Binary(a, ..)
                | Arguments::Ternary(a, ..)
                | Arguments::Quaternary(a, ..)
                | Arguments::Quinary(a, ..),
                0,
            ) => Some(a.get()),
            (
                Arguments::Binary(_, b)
                | Arguments::Ternary(_, b, _)
                | Arguments::Quaternary(_, b, ..)
                | Arguments::Quinary(_, b, ..),
                1,
            ) => Some(b),
            (
                Arguments::Ternary(_, _, c)
                | Arguments::Quaternary(_, _, c, _)
                | Arguments::Quinary(_, _, c, ..),
                2,
            ) => Some(c),
            (Arguments::Quaternary(_, _, _, d) | Arguments::Quinary(_, _, _, d, _), 3) => Some(d),
            (Arguments::Quinary(_, _, _, _, e), 4) => Some(e),
            _ => None,
        }
    }

    /// Iterate arguments in order, without reifying.
    pub fn iter(&self) -> ArgumentsIter<'_> {
        ArgumentsIter {
            args: self,
            next: 0,
        }
    }

    /// All arguments as a slice, reifying inline lists on first use.
    pub fn as_slice(&self) -> &[Expr] {
        match self {
            Arguments::Nullary => &[],
            Arguments::Unary(a) => &a.reify(&[])[..],
            Arguments::Binary(a, b) => &a.reify(&[b])[..],
            Arguments::Ternary(a, b, c) => &a.reify(&[b, c])[..],
            Arguments::Quaternary(a, b, c, d) => &a.reify(&[b, c, d])[..],
            Arguments::Quinary(a, b, c, d, e) => &a.reify(&[b, c, d, e])[..],
            Arguments::Nary(list) => &list[..],
        }
    }

    /// Copy the arguments into an owned vector.
    pub fn to_vec(&self) -> Vec<Expr> {
        self.iter().cloned().collect()
    }

    /// Whether `other` holds reference-identical arguments in the same
    /// representation.
    pub fn same_as(&self, other: &Arguments) -> bool {
        match (self, other) {
            (Arguments::Nary(a), Arguments::Nary(b)) => Arc::ptr_eq(a, b),
            (Arguments::Nary(_), _) | (_, Arguments::Nary(_)) => false,
            _ => {
                self.len() == other.len()
                    && self.iter().zip(other.iter()).all(|(a, b)| a.ptr_eq(b))
            }
        }
    }

    /// Rebuild with `f` applied to each argument.
    ///
    /// Returns `None` when every result is reference-identical to its input.
    /// Inline lists stay inline (no allocation); `Nary` lists go through the
    /// copy-on-write list algorithm.
    pub fn rewrite<E>(
        &self,
        mut f: impl FnMut(&Expr) -> Result<Expr, E>,
    ) -> Result<Option<Arguments>, E> {
        let inline = |a: &FirstArgument, f: &mut dyn FnMut(&Expr) -> Result<Expr, E>| {
            f(a.get()).map(|x| (x.ptr_eq(a.get()), x))
        };
        let keep = |same: bool, x: &Expr, orig: &Expr| same && x.ptr_eq(orig);
        Ok(match self {
            Arguments::Nullary => None,
            Arguments::Unary(a) => {
                let (same, a2) = inline(a, &mut f)?;
                (!same).then(|| Arguments::Unary(FirstArgument::new(a2)))
            }
            Arguments::Binary(a, b) => {
                let (same, a2) = inline(a, &mut f)?;
                let b2 = f(b)?;
                (!keep(same, &b2, b)).then(|| Arguments::Binary(FirstArgument::new(a2), b2))
            }
            Arguments::Ternary(a, b, c) => {
                let (same, a2) = inline(a, &mut f)?;
                let b2 = f(b)?;
                let c2 = f(c)?;
                let same = keep(same, &b2, b) && c2.ptr_eq(c);
                (!same).then(|| Arguments::Ternary(FirstArgument::new(a2), b2, c2))
            }
            Arguments::Quaternary(a, b, c, d) => {
                let (same, a2) = inline(a, &mut f)?;
                let b2 = f(b)?;
                let c2 = f(c)?;
                let d2 = f(d)?;
                let same = keep(same, &b2, b) && c2.ptr_eq(c) && d2.ptr_eq(d);
                (!same).then(|| Arguments::Quaternary(FirstArgument::new(a2), b2, c2, d2))
            }
            Arguments::Quinary(a, b, c, d, e) => {
                let (same, a2) = inline(a, &mut f)?;
                let b2 = f(b)?;
                let c2 = f(c)?;
                let d2 = f(d)?;
                let e2 = f(e)?;
                let same = keep(same, &b2, b) && c2.ptr_eq(c) && d2.ptr_eq(d) && e2.ptr_eq(e);
                (!same).then(|| Arguments::Quinary(FirstArgument::new(a2), b2, c2, d2, e2))
            }
            Arguments::Nary(list) => {
                let rewritten = crate::visitor::rewrite_list(list, f)?;
                (!Arc::ptr_eq(&rewritten, list)).then_some(Arguments::Nary(rewritten))
            }
        })
    }
}

/// Iterator over [`Arguments`].
pub struct ArgumentsIter<'a> {
    args: &'a Arguments,
    next: usize,
}

impl<'a> Iterator for ArgumentsIter<'a> {
    type Item = &'a Expr;

    fn next(&mut self) -> Option<&'a Expr> {
        let item = self.args.get(self.next)?;
        self.next += 1;
        Some(item)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = self.args.len() - self.next;
        (remaining, Some(remaining))
    }
}

impl ExactSizeIterator for ArgumentsIter<'_> {}

impl<'a> IntoIterator for &'a Arguments {
    type Item = &'a Expr;
    type IntoIter = ArgumentsIter<'a>;

    fn into_iter(self) -> ArgumentsIter<'a> {
        self.iter()
    }
}

impl Default for Arguments {
    fn default() -> Self {
        Arguments::Nullary
    }
}

impl std::fmt::Debug for Arguments {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.iter()).finish()
    }
}

impl From<Vec<Expr>> for Arguments {
    fn from(args: Vec<Expr>) -> Self {
        Arguments::new(args)
    }
}
