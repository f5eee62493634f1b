//! Stack growth for the recursive parser and evaluator.
//!
//! Deeply nested expressions and deep interpreted recursion both map onto native
//! recursion. Wrapping the recursive entry points in [`ensure_sufficient_stack`] moves
//! execution onto a freshly allocated segment whenever the remaining stack gets low, so
//! the only depth failure a script can hit is the evaluator's own call-depth limit.

/// Grow the stack if less than this much remains.
const RED_ZONE: usize = 64 * 1024;

/// Size of each newly allocated stack segment.
const STACK_PER_RECURSION: usize = 1024 * 1024;

#[inline]
pub fn ensure_sufficient_stack<R>(f: impl FnOnce() -> R) -> R {
    stacker::maybe_grow(RED_ZONE, STACK_PER_RECURSION, f)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn depth(n: u32) -> u32 {
        ensure_sufficient_stack(|| if n == 0 { 0 } else { 1 + depth(n - 1) })
    }

    #[test]
    fn test_deep_recursion_completes() {
        assert_eq!(depth(200_000), 200_000);
    }
}
