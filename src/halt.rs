//! Cooperative halt signal.
//!
//! The signal is a one-way, idempotent flag. Setting it never takes a lock the
//! firing loop holds; the loop reads it once per iteration boundary, so a
//! firing already in progress always runs to completion.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Evaluator-owned halt flag.
#[derive(Debug, Default)]
pub(crate) struct HaltSignal {
    flag: Arc<AtomicBool>,
}

impl HaltSignal {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Request that the loop stop before its next selection.
    pub(crate) fn halt(&self) {
        self.flag.store(true, Ordering::Release);
    }

    pub(crate) fn is_halted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }

    /// Clear a halt left over from a previous call.
    pub(crate) fn rearm(&self) {
        self.flag.store(false, Ordering::Release);
    }

    pub(crate) fn handle(&self) -> HaltHandle {
        HaltHandle {
            flag: Arc::clone(&self.flag),
        }
    }
}

/// Cloneable handle that halts one evaluator from any thread.
#[derive(Debug, Clone)]
pub struct HaltHandle {
    flag: Arc<AtomicBool>,
}

impl HaltHandle {
    /// Stop the evaluator before its next selection.
    ///
    /// Has no effect on a firing already in progress. A halt issued while no
    /// call is running is cleared when the next call starts.
    pub fn halt(&self) {
        self.flag.store(true, Ordering::Release);
    }

    /// Returns true if a halt is pending for the current call.
    #[must_use]
    pub fn is_halted(&self) -> bool {
        self.flag.load(Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn handle_shares_flag() {
        let signal = HaltSignal::new();
        let handle = signal.handle();
        assert!(!signal.is_halted());

        handle.halt();
        assert!(signal.is_halted());
        assert!(handle.is_halted());

        signal.rearm();
        assert!(!handle.is_halted());
    }

    #[test]
    fn halt_is_idempotent() {
        let signal = HaltSignal::new();
        signal.halt();
        signal.halt();
        assert!(signal.is_halted());
    }

    #[test]
    fn halt_visible_across_threads() {
        let signal = HaltSignal::new();
        let handle = signal.handle();
        std::thread::spawn(move || handle.halt()).join().unwrap();
        assert!(signal.is_halted());
    }
}
