//! Scripted processes for testing supervision
//!
//! Stands in for the synchronizer and the service runner so the supervisor
//! state machine can be driven without spawning anything.
//!
//! # Pieces
//!
//! - [`ScriptedLauncher`]: configurable exit codes for blocking runs, spawn
//!   failure injection, interrupts delivered during a blocking run
//! - [`ScriptedProcess`]: a background process that exits after a number of
//!   polls, stops some polls after being asked to, or raises an interrupt
//! - [`Journal`]: shared record of everything the supervisor did

mod launcher;
mod process;

pub use launcher::ScriptedLauncher;
pub use process::{ProcessScript, ScriptedProcess, DEFAULT_STOP_CODE};

use std::sync::{Arc, Mutex};

use crate::supervisor::{Invocation, Role};

/// One observed supervisor action
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// Blocking run requested
    Run(Invocation),
    /// Background process started
    Spawn(Invocation),
    /// Termination requested on a live process
    Terminate(Role),
    /// Process observed exited with the given code
    Exit(Role, i32),
    /// Termination requested on a process already observed exited
    TerminateAfterExit(Role),
}

impl Event {
    pub fn role(&self) -> Role {
        match self {
            Event::Run(inv) | Event::Spawn(inv) => inv.role(),
            Event::Terminate(role) | Event::Exit(role, _) | Event::TerminateAfterExit(role) => *role,
        }
    }
}

/// Shared, ordered event log
#[derive(Debug, Clone, Default)]
pub struct Journal {
    events: Arc<Mutex<Vec<Event>>>,
}

impl Journal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, event: Event) {
        if let Ok(mut events) = self.events.lock() {
            events.push(event);
        }
    }

    /// Snapshot of all events so far
    pub fn events(&self) -> Vec<Event> {
        self.events
            .lock()
            .map(|events| events.clone())
            .unwrap_or_default()
    }

    pub fn contains(&self, event: &Event) -> bool {
        self.events().contains(event)
    }

    pub fn count(&self, predicate: impl Fn(&Event) -> bool) -> usize {
        self.events().iter().filter(|e| predicate(e)).count()
    }

    /// Position of the first matching event
    pub fn position(&self, event: &Event) -> Option<usize> {
        self.events().iter().position(|e| e == event)
    }
}
