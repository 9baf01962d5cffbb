//! Native stack growth for the recursive parser and evaluator.

/// Grow when less than this remains.
const RED_ZONE: usize = 64 * 1024;

/// Size of each new stack segment.
const STACK_GROWTH: usize = 1024 * 1024;

/// Run `f`, first moving to a fresh stack segment if this one is nearly
/// exhausted.
pub(crate) fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_GROWTH, f)
}
