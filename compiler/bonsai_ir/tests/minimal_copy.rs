#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    reason = "test code uses unwrap for concise assertions"
)]
#![allow(unsafe_code, reason = "a counting global allocator needs an unsafe impl")]

//! A rewritten sequence costs one allocation, however many elements change.

use std::alloc::{GlobalAlloc, Layout, System};
use std::cell::Cell;
use std::convert::Infallible;
use std::sync::Arc;

use bonsai_ir::visitor::rewrite_list;
use bonsai_ir::{Expr, TypeSlim};
use pretty_assertions::assert_eq;

struct Counting;

thread_local! {
    static ALLOCATIONS: Cell<usize> = const { Cell::new(0) };
}

// SAFETY: every call is forwarded unchanged to the system allocator.
unsafe impl GlobalAlloc for Counting {
    unsafe fn alloc(&self, layout: Layout) -> *mut u8 {
        let _ = ALLOCATIONS.try_with(|n| n.set(n.get() + 1));
        // SAFETY: the caller upholds `GlobalAlloc::alloc`'s contract.
        unsafe { System.alloc(layout) }
    }

    unsafe fn dealloc(&self, ptr: *mut u8, layout: Layout) {
        // SAFETY: `ptr` was returned by `alloc` above with this layout.
        unsafe { System.dealloc(ptr, layout) }
    }
}

#[global_allocator]
static GLOBAL: Counting = Counting;

fn allocations() -> usize {
    ALLOCATIONS.with(Cell::get)
}

fn int(v: i32) -> Expr {
    Expr::constant(v, TypeSlim::int32())
}

/// Allocations made by rewriting `list`, replacing the elements at
/// `changed` with nodes built beforehand.
fn count_rewrite(list: &Arc<[Expr]>, changed: &[usize]) -> (Arc<[Expr]>, usize) {
    let replacements: Vec<Expr> = changed.iter().map(|_| int(99)).collect();
    let mut position = 0;
    let before = allocations();
    let out = rewrite_list(list, |e| -> Result<Expr, Infallible> {
        let i = position;
        position += 1;
        Ok(match changed.iter().position(|&c| c == i) {
            Some(k) => replacements[k].clone(),
            None => e.clone(),
        })
    })
    .unwrap();
    (out, allocations() - before)
}

#[test]
fn changed_sequences_allocate_once() {
    let list: Arc<[Expr]> = (0..8).map(int).collect();

    let (out, count) = count_rewrite(&list, &[2, 5]);
    assert_eq!(count, 1);
    assert_eq!(out.len(), 8);
    assert!(out[0].ptr_eq(&list[0]));
    assert!(!out[2].ptr_eq(&list[2]));

    let (_, count) = count_rewrite(&list, &[0, 1, 2, 3, 4, 5, 6, 7]);
    assert_eq!(count, 1);

    let (_, count) = count_rewrite(&list, &[7]);
    assert_eq!(count, 1);
}

#[test]
fn unchanged_sequences_do_not_allocate() {
    let list: Arc<[Expr]> = (0..8).map(int).collect();
    let (out, count) = count_rewrite(&list, &[]);
    assert_eq!(count, 0);
    assert!(Arc::ptr_eq(&out, &list));
}
