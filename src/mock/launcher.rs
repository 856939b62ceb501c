//! Scripted launcher

use std::collections::HashMap;
use std::io;

use super::process::{ProcessScript, ScriptedProcess};
use super::{Event, Journal};
use crate::signal::InterruptCounter;
use crate::supervisor::{Invocation, LaunchError, Launcher, Role, SupervisedProcess};

/// Launcher returning scripted results instead of starting programs
#[derive(Debug, Default)]
pub struct ScriptedLauncher {
    run_codes: HashMap<Invocation, i32>,
    scripts: HashMap<Role, ProcessScript>,
    failing_spawns: Vec<Invocation>,
    interrupt_during: Option<Invocation>,
    interrupts: InterruptCounter,
    journal: Journal,
}

impl ScriptedLauncher {
    /// Every blocking run succeeds and every process runs until stopped
    pub fn new() -> Self {
        Self::default()
    }

    /// Exit code returned by a blocking run of `invocation` (default 0)
    pub fn with_run_code(mut self, invocation: Invocation, code: i32) -> Self {
        self.run_codes.insert(invocation, code);
        self
    }

    /// Script for background processes of `role`
    pub fn with_script(mut self, role: Role, script: ProcessScript) -> Self {
        self.scripts.insert(role, script);
        self
    }

    /// Spawning `invocation` fails as if the program were missing
    pub fn fail_spawn(mut self, invocation: Invocation) -> Self {
        self.failing_spawns.push(invocation);
        self
    }

    /// Deliver one interrupt while `invocation` is running
    pub fn interrupt_during(mut self, invocation: Invocation) -> Self {
        self.interrupt_during = Some(invocation);
        self
    }

    /// Counter the scripted interrupts are recorded on
    pub fn interrupts(&self) -> InterruptCounter {
        self.interrupts.clone()
    }

    pub fn journal(&self) -> Journal {
        self.journal.clone()
    }
}

impl Launcher for ScriptedLauncher {
    fn run(&mut self, invocation: &Invocation) -> Result<i32, LaunchError> {
        self.journal.record(Event::Run(invocation.clone()));
        if self.interrupt_during.as_ref() == Some(invocation) {
            self.interrupts.record();
        }
        Ok(self.run_codes.get(invocation).copied().unwrap_or(0))
    }

    fn spawn(
        &mut self,
        invocation: &Invocation,
    ) -> Result<Box<dyn SupervisedProcess>, LaunchError> {
        let role = invocation.role();
        if self.failing_spawns.contains(invocation) {
            return Err(LaunchError::Spawn {
                role,
                program: format!("scripted-{}", role),
                source: io::Error::new(io::ErrorKind::NotFound, "scripted spawn failure"),
            });
        }
        self.journal.record(Event::Spawn(invocation.clone()));
        let script = self.scripts.get(&role).cloned().unwrap_or_default();
        Ok(Box::new(ScriptedProcess::new(
            role,
            script,
            self.journal.clone(),
            self.interrupts.clone(),
        )))
    }
}
