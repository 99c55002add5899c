//! Native stack growth for recursive descent.
//!
//! Both rule compilation (one frame per nested rule) and rule execution
//! (one interpreter frame per sub-rule call) recurse as deep as the grammar
//! or the input nests. Wrapping each recursive step in
//! [`ensure_sufficient_stack`] moves execution onto a freshly allocated
//! segment when the current one runs low, so nesting depth is bounded by
//! memory rather than by the thread's initial stack.
//!
//! This is not a time limit. A grammar that loops without consuming input
//! is stopped by the left-recursion guard, not here.

/// Space that must remain on the current segment before a call proceeds.
const RED_ZONE: usize = 128 * 1024;

/// Size of each additional segment.
const SEGMENT_SIZE: usize = 2 * 1024 * 1024;

/// Run `f`, first switching to a new stack segment if fewer than
/// [`RED_ZONE`] bytes remain.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, SEGMENT_SIZE, f)
}

/// WASM manages its own stack; call through.
#[inline]
#[cfg(target_arch = "wasm32")]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
