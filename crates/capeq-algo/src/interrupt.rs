//! Cooperative cancellation for solver rounds.
//!
//! An [`Interrupt`] is a cheap clonable flag. The solver checks it before each
//! agent's best response and the optimizers check it between generations or
//! restarts, so a triggered interrupt stops the round at the next agent
//! boundary without leaving a half-written capacity row behind.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

#[derive(Debug, Clone, Default)]
pub struct Interrupt {
    flag: Arc<AtomicBool>,
}

impl Interrupt {
    pub fn new() -> Self {
        Self::default()
    }

    /// Request cancellation. Safe to call from a signal handler or another thread.
    pub fn trigger(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_triggered(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }

    /// Re-arm after an interrupted round has been handled.
    pub fn clear(&self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}
