//! Process supervision for `stolos up`
//!
//! Phases:
//! 1. `InitialSync`: one blocking synchronization pass
//! 2. `Starting`: blocking service bring-up
//! 3. `Running`: continuous sync (and optionally log follow) polled once per
//!    interval until one of them exits or the operator interrupts
//! 4. `ShuttingDown`: every live process was asked to stop; keep polling
//!    until all of them are observed exited
//!
//! The run terminates only after every spawned process has exited.

mod launcher;
mod outcome;
mod process;

pub use launcher::{
    CommandLauncher, Invocation, LaunchError, Launcher, ServicesCommand, SyncCommand,
    SERVICES_PROGRAM, SYNC_PROGRAM,
};
pub use outcome::{ExitCode, Outcome};
pub use process::{status_code, ChildProcess, ProcessError, Role, SupervisedProcess};

use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::signal::InterruptCounter;

/// Default interval between liveness polls
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(1);

/// Supervisor state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    InitialSync,
    Starting,
    Running,
    ShuttingDown,
    Terminated,
}

/// Options for one `up` run
#[derive(Debug, Clone)]
pub struct UpOptions {
    /// Rebuild images during bring-up
    pub rebuild: bool,
    /// Follow service logs while running
    pub follow_logs: bool,
    /// Keep synchronizing after bring-up; `false` stops after `Starting`
    pub watch: bool,
    pub poll_interval: Duration,
}

impl Default for UpOptions {
    fn default() -> Self {
        Self {
            rebuild: false,
            follow_logs: true,
            watch: true,
            poll_interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

/// Supervisor errors
#[derive(Debug, thiserror::Error)]
pub enum SupervisorError {
    #[error(transparent)]
    Launch(#[from] LaunchError),
}

/// Drives one `up` run
pub struct Supervisor<L> {
    launcher: L,
    interrupts: InterruptCounter,
    options: UpOptions,
    phase: Phase,
}

impl<L: Launcher> Supervisor<L> {
    pub fn new(launcher: L, interrupts: InterruptCounter, options: UpOptions) -> Self {
        Self {
            launcher,
            interrupts,
            options,
            phase: Phase::Idle,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn interrupts(&self) -> &InterruptCounter {
        &self.interrupts
    }

    /// Run the full protocol and return the outcome.
    pub fn run(&mut self) -> Result<Outcome, SupervisorError> {
        let result = self.run_phases();
        self.enter(Phase::Terminated);
        match &result {
            Ok(outcome) if outcome.is_failure() => warn!(%outcome, "run finished"),
            Ok(outcome) => info!(%outcome, "run finished"),
            Err(e) => warn!(error = %e, "run aborted"),
        }
        result
    }

    fn run_phases(&mut self) -> Result<Outcome, SupervisorError> {
        self.enter(Phase::InitialSync);
        let code = self.launcher.run(&Invocation::SyncOnce)?;
        if self.interrupts.is_interrupted() {
            return Ok(Outcome::UserCancelled);
        }
        if code != 0 {
            return Ok(Outcome::SyncFailed { code });
        }

        self.enter(Phase::Starting);
        let code = self.launcher.run(&Invocation::ServicesUp {
            rebuild: self.options.rebuild,
        })?;
        if self.interrupts.is_interrupted() {
            return Ok(Outcome::UserCancelled);
        }
        if code != 0 {
            return Ok(Outcome::ServiceStartFailed { code });
        }

        if !self.options.watch {
            return Ok(Outcome::Success);
        }

        let mut background = vec![Invocation::SyncRepeat];
        if self.options.follow_logs {
            background.push(Invocation::ServicesLogs);
        }

        let mut live: Vec<Box<dyn SupervisedProcess>> = Vec::new();
        for invocation in &background {
            match self.launcher.spawn(invocation) {
                Ok(process) => live.push(process),
                Err(e) => {
                    self.enter(Phase::ShuttingDown);
                    request_termination(&mut live);
                    self.drain(&mut live);
                    return Err(e.into());
                }
            }
        }

        self.enter(Phase::Running);
        Ok(self.supervise(live))
    }

    /// Poll loop of the `Running` and `ShuttingDown` phases
    fn supervise(&mut self, mut live: Vec<Box<dyn SupervisedProcess>>) -> Outcome {
        let mut failure: Option<(Role, i32)> = None;
        let mut stopping = false;

        loop {
            if !stopping && self.interrupts.is_interrupted() {
                info!("interrupt received, stopping supervised processes");
                stopping = true;
                self.enter(Phase::ShuttingDown);
                request_termination(&mut live);
            }

            let mut index = 0;
            while index < live.len() {
                if live[index].is_alive() {
                    index += 1;
                    continue;
                }

                let process = live.remove(index);
                let role = process.role();
                let code = process.exit_code().unwrap_or(-1);

                if stopping || self.interrupts.is_interrupted() {
                    debug!(%role, code, "process exited");
                } else {
                    warn!(%role, code, "process exited unexpectedly, stopping the rest");
                    failure = Some((role, code));
                    stopping = true;
                    self.enter(Phase::ShuttingDown);
                    request_termination(&mut live);
                }
            }

            if live.is_empty() {
                break;
            }
            thread::sleep(self.options.poll_interval);
        }

        match failure {
            Some((role, code)) => Outcome::ProcessExited { role, code },
            None => Outcome::UserCancelled,
        }
    }

    /// Wait until every process in `live` is observed exited
    fn drain(&self, live: &mut Vec<Box<dyn SupervisedProcess>>) {
        loop {
            live.retain_mut(|process| process.is_alive());
            if live.is_empty() {
                return;
            }
            thread::sleep(self.options.poll_interval);
        }
    }

    fn enter(&mut self, phase: Phase) {
        if self.phase != phase {
            debug!(from = ?self.phase, to = ?phase, "phase transition");
            match phase {
                Phase::InitialSync => info!("running initial sync"),
                Phase::Starting => info!("starting services"),
                Phase::Running => info!("project is up, watching for changes"),
                _ => {}
            }
            self.phase = phase;
        }
    }
}

/// Ask every live process to stop. Failures are tolerated.
fn request_termination(live: &mut [Box<dyn SupervisedProcess>]) {
    for process in live.iter_mut() {
        if let Err(e) = process.terminate() {
            debug!(role = %process.role(), error = %e, "termination request failed");
        }
    }
}
