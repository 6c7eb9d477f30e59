use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Hook polled once per leapfrog step to abort a run early.
///
/// When it reports `true` the current trajectory stops and the transition
/// is discarded: no draw is emitted, the chain stays at its previous point
/// and the run returns
/// [`SamplerError::Interrupted`](crate::SamplerError::Interrupted).
pub trait Interrupt {
    fn interrupted(&self) -> bool;
}

/// Never interrupts.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoInterrupt;

impl Interrupt for NoInterrupt {
    #[inline]
    fn interrupted(&self) -> bool {
        false
    }
}

impl Interrupt for AtomicBool {
    fn interrupted(&self) -> bool {
        self.load(Ordering::Relaxed)
    }
}

impl<T: Interrupt + ?Sized> Interrupt for &T {
    fn interrupted(&self) -> bool {
        (**self).interrupted()
    }
}

impl<T: Interrupt + ?Sized> Interrupt for Arc<T> {
    fn interrupted(&self) -> bool {
        (**self).interrupted()
    }
}
