//! Completion fences for asynchronous device work.
//!
//! A backend hands out a [`FenceSignal`] when work is submitted and flips it
//! once the device has finished. [`CompletionFence`] is the polling side kept
//! by the resource that issued the work. Nothing here ever waits.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Shared completion flag, set by the backend when submitted work finishes.
#[derive(Debug, Clone, Default)]
pub struct FenceSignal(Arc<AtomicBool>);

impl FenceSignal {
    pub fn new() -> Self {
        Self::default()
    }

    /// A signal for work that has already completed.
    pub fn signaled() -> Self {
        let signal = Self::new();
        signal.signal();
        signal
    }

    /// Mark the work as complete. Safe to call from any thread, more than once.
    pub fn signal(&self) {
        self.0.store(true, Ordering::Release);
    }

    #[inline]
    pub fn is_signaled(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

/// Tracks the most recent asynchronous operation of one resource.
///
/// An unarmed fence reports ready: there is nothing to wait for.
#[derive(Debug, Default)]
pub struct CompletionFence {
    pending: Option<FenceSignal>,
}

impl CompletionFence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Arm the fence for a newly issued operation, replacing the previous one.
    pub fn set(&mut self, signal: FenceSignal) {
        self.pending = Some(signal);
    }

    /// Whether the last issued operation has completed.
    #[inline]
    pub fn ready(&self) -> bool {
        self.pending.as_ref().map_or(true, FenceSignal::is_signaled)
    }

    pub fn is_armed(&self) -> bool {
        self.pending.is_some()
    }
}
