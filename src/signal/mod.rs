//! Operator interrupt handling (SIGINT)
//!
//! Each supervisor run owns an [`InterruptCounter`]. The OS handler only bumps
//! the counter; the supervision loop reads it to tell an operator-initiated
//! shutdown apart from a child failing on its own.
//!
//! - First interrupt: ask every supervised child to stop
//! - Further interrupts: already shutting down, the outcome stays cancelled

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Run-scoped count of received interrupts
#[derive(Debug, Clone, Default)]
pub struct InterruptCounter {
    count: Arc<AtomicUsize>,
}

/// What a received interrupt means for the run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SignalAction {
    /// First interrupt: initiate graceful shutdown
    InitiateShutdown,
    /// Second or later: shutdown already in progress
    AlreadyShuttingDown,
}

impl InterruptCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of interrupts received so far
    pub fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn is_interrupted(&self) -> bool {
        self.count() > 0
    }

    /// Record one interrupt
    pub fn record(&self) -> SignalAction {
        match self.count.fetch_add(1, Ordering::SeqCst) {
            0 => SignalAction::InitiateShutdown,
            _ => SignalAction::AlreadyShuttingDown,
        }
    }

    /// Route the process interrupt handler into this counter.
    ///
    /// The handler is process-wide and can be installed once per process.
    pub fn install(&self) -> Result<(), ctrlc::Error> {
        let counter = self.clone();
        ctrlc::set_handler(move || match counter.record() {
            SignalAction::InitiateShutdown => {
                eprintln!("\nReceived interrupt, stopping sync and services...");
            }
            SignalAction::AlreadyShuttingDown => {
                eprintln!("\nAlready stopping, waiting for processes to exit...");
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_initial() {
        let counter = InterruptCounter::new();
        assert_eq!(counter.count(), 0);
        assert!(!counter.is_interrupted());
    }

    #[test]
    fn test_first_interrupt_initiates_shutdown() {
        let counter = InterruptCounter::new();
        assert_eq!(counter.record(), SignalAction::InitiateShutdown);
        assert!(counter.is_interrupted());
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_later_interrupts() {
        let counter = InterruptCounter::new();
        counter.record();
        assert_eq!(counter.record(), SignalAction::AlreadyShuttingDown);
        assert_eq!(counter.record(), SignalAction::AlreadyShuttingDown);
        assert_eq!(counter.count(), 3);
    }

    #[test]
    fn test_clones_share_state() {
        let counter = InterruptCounter::new();
        let handler_side = counter.clone();
        handler_side.record();
        assert_eq!(counter.count(), 1);
    }

    #[test]
    fn test_fresh_counters_independent() {
        let a = InterruptCounter::new();
        let b = InterruptCounter::new();
        a.record();
        assert_eq!(b.count(), 0);
    }
}
