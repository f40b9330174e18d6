//! Pacing between quote requests for successive instruments.

use std::time::Duration;

/// Waits out the inter-instrument delay.
///
/// The collector calls `pause` between two instruments, never before the
/// first one or after the last one.
pub trait Pacer: Send + Sync {
    fn pause(&self, delay: Duration);
}

/// Blocks the current thread for the requested delay.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleepPacer;

impl Pacer for ThreadSleepPacer {
    fn pause(&self, delay: Duration) {
        if !delay.is_zero() {
            std::thread::sleep(delay);
        }
    }
}

/// Never waits. For tests and offline runs.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoPacer;

impl Pacer for NoPacer {
    fn pause(&self, _delay: Duration) {}
}
