//! Nested tape regions.
//!
//! A region marks the tape so that everything recorded inside it can be
//! discarded in one step while the nodes recorded before it stay live.
//! Regions nest and must be closed in LIFO order.
//!
//! Prefer [`nested`] or [`NestedRegion`], which close the region on every
//! exit path including panics and early returns; [`start_nested`] and
//! [`recover_memory_nested`] are the manual pair underneath.

use std::marker::PhantomData;

use crate::tape;

/// Open a nested region on the current thread's tape.
pub fn start_nested() {
    tape::with_tape(|t| t.start_nested());
}

/// Discard every node recorded since the innermost region opened, and close it.
///
/// # Panics
///
/// Panics if no region is open.
pub fn recover_memory_nested() {
    tape::with_tape(|t| t.recover_nested());
}

/// Whether any nested region is open on the current thread.
pub fn is_nested() -> bool {
    nesting_depth() > 0
}

/// Number of open nested regions on the current thread.
pub fn nesting_depth() -> usize {
    tape::with_tape(|t| t.nesting_depth())
}

/// RAII guard for a nested region. Dropping it recovers the region.
///
/// Not `Send`: the region belongs to the thread-local tape it was opened on.
#[must_use = "the region closes as soon as the guard is dropped"]
pub struct NestedRegion {
    depth: usize,
    _thread_bound: PhantomData<*const ()>,
}

impl NestedRegion {
    pub fn new() -> Self {
        let depth = tape::with_tape(|t| {
            t.start_nested();
            t.nesting_depth()
        });
        NestedRegion {
            depth,
            _thread_bound: PhantomData,
        }
    }

    /// Nesting depth this region was opened at (1 for an outermost region).
    pub fn depth(&self) -> usize {
        self.depth
    }
}

impl Default for NestedRegion {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for NestedRegion {
    fn drop(&mut self) {
        if std::thread::panicking() {
            // Unwinding may skip inner guards' expected order; close everything
            // down to and including this region without asserting.
            let depth = self.depth;
            tape::try_with_tape(|t| {
                while t.nesting_depth() >= depth {
                    t.recover_nested();
                }
            });
            return;
        }
        tape::with_tape(|t| {
            assert_eq!(
                t.nesting_depth(),
                self.depth,
                "nested regions must be closed in LIFO order"
            );
            t.recover_nested();
        });
    }
}

/// Run `f` inside a fresh nested region and recover it afterwards.
///
/// The region is recovered whether `f` returns normally or panics, so the
/// tape is left exactly as it was found. Any [`Var`](crate::Var) created
/// inside `f` is invalid once this returns; extract plain values first.
pub fn nested<R>(f: impl FnOnce() -> R) -> R {
    let _region = NestedRegion::new();
    f()
}
