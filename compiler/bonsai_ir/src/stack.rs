//! Stack growth for deep tree recursion.
//!
//! Rewriting, conversion and interpretation all recurse once per tree level.
//! Generated trees (long `a + b + c + ...` chains, nested lambdas) can be
//! tens of thousands of levels deep, so every recursive entry point wraps its
//! body in [`ensure_sufficient_stack`].
//!
//! On native targets the `stacker` crate allocates a fresh segment when less
//! than [`RED_ZONE`] bytes remain; on wasm the closure runs directly.

/// Remaining stack below which a new segment is allocated (128KB).
const RED_ZONE: usize = 128 * 1024;

/// Size of each newly allocated stack segment (2MB).
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Run `f`, growing the stack first if it is close to exhausted.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// Run `f` directly; wasm manages its own stack.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
