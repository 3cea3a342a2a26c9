//! Native stack growth for recursive table marshalling.
//!
//! Tables nest arbitrarily deep in both directions (host tables pushed into
//! the interpreter and interpreter tables copied out), and each level is one
//! host recursion. [`ensure_sufficient_stack`] grows the native stack on
//! demand so a deep table cannot overflow it.
//!
//! - **Red zone**: 64KB left triggers growth
//! - **Growth size**: 1MB per segment

const RED_ZONE: usize = 64 * 1024;

const STACK_PER_RECURSION: usize = 1024 * 1024;

/// Run `f` with at least the red zone of native stack available.
#[inline]
#[cfg(not(target_arch = "wasm32"))]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[inline]
#[cfg(target_arch = "wasm32")]
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    f()
}
