//! Scripted background processes

use super::{Event, Journal};
use crate::signal::InterruptCounter;
use crate::supervisor::{ProcessError, Role, SupervisedProcess};

/// Exit code reported after a termination request (128 + SIGTERM)
pub const DEFAULT_STOP_CODE: i32 = 143;

/// Behavior of one scripted process
#[derive(Debug, Clone)]
pub struct ProcessScript {
    /// Exit on its own at this poll with this code
    pub exit_after: Option<(u32, i32)>,
    /// Polls between a termination request and the exit
    pub stop_after_polls: u32,
    pub stop_code: i32,
    /// Record one interrupt when polled for the n-th time
    pub interrupt_at: Option<u32>,
    /// Termination requests fail (the process keeps running)
    pub refuse_terminate: bool,
}

impl ProcessScript {
    /// Runs until asked to stop, then exits on the next poll
    pub fn long_running() -> Self {
        Self {
            exit_after: None,
            stop_after_polls: 1,
            stop_code: DEFAULT_STOP_CODE,
            interrupt_at: None,
            refuse_terminate: false,
        }
    }

    pub fn exits_after(mut self, polls: u32, code: i32) -> Self {
        self.exit_after = Some((polls, code));
        self
    }

    pub fn stops_after(mut self, polls: u32) -> Self {
        self.stop_after_polls = polls;
        self
    }

    pub fn interrupts_at(mut self, poll: u32) -> Self {
        self.interrupt_at = Some(poll);
        self
    }

    pub fn refuses_terminate(mut self) -> Self {
        self.refuse_terminate = true;
        self
    }
}

impl Default for ProcessScript {
    fn default() -> Self {
        Self::long_running()
    }
}

/// A process driven by a [`ProcessScript`]
pub struct ScriptedProcess {
    role: Role,
    script: ProcessScript,
    polls: u32,
    terminated_at: Option<u32>,
    exit_code: Option<i32>,
    journal: Journal,
    interrupts: InterruptCounter,
}

impl ScriptedProcess {
    pub fn new(
        role: Role,
        script: ProcessScript,
        journal: Journal,
        interrupts: InterruptCounter,
    ) -> Self {
        Self {
            role,
            script,
            polls: 0,
            terminated_at: None,
            exit_code: None,
            journal,
            interrupts,
        }
    }

    pub fn polls(&self) -> u32 {
        self.polls
    }

    fn exit(&mut self, code: i32) {
        self.exit_code = Some(code);
        self.journal.record(Event::Exit(self.role, code));
    }
}

impl SupervisedProcess for ScriptedProcess {
    fn role(&self) -> Role {
        self.role
    }

    fn is_alive(&mut self) -> bool {
        if self.exit_code.is_some() {
            return false;
        }
        self.polls += 1;

        if self.script.interrupt_at == Some(self.polls) {
            self.interrupts.record();
        }

        if let Some(at) = self.terminated_at {
            if self.polls - at >= self.script.stop_after_polls {
                self.exit(self.script.stop_code);
                return false;
            }
        }
        if let Some((after, code)) = self.script.exit_after {
            if self.polls >= after {
                self.exit(code);
                return false;
            }
        }
        true
    }

    fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    fn terminate(&mut self) -> Result<(), ProcessError> {
        if self.exit_code.is_some() {
            self.journal.record(Event::TerminateAfterExit(self.role));
            return Ok(());
        }
        self.journal.record(Event::Terminate(self.role));
        if self.script.refuse_terminate {
            return Err(ProcessError {
                role: self.role,
                message: "termination refused".to_string(),
            });
        }
        if self.terminated_at.is_none() {
            self.terminated_at = Some(self.polls);
        }
        Ok(())
    }
}
