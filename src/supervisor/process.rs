//! Supervised process handles

use std::fmt;
use std::process::{Child, ExitStatus};
use tracing::warn;

/// Which cooperating process a handle belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    /// File synchronizer
    Sync,
    /// Service runner (bring-up, log follow)
    Services,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Sync => "sync",
            Role::Services => "services",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Termination request errors
#[derive(Debug, thiserror::Error)]
#[error("cannot terminate {role} process: {message}")]
pub struct ProcessError {
    pub role: Role,
    pub message: String,
}

/// Capability interface over one supervised child.
///
/// The supervision loop only ever talks to children through this trait, so
/// it runs unchanged against scripted processes in tests.
pub trait SupervisedProcess {
    fn role(&self) -> Role;

    /// Non-blocking liveness check. Records the exit code once exited.
    fn is_alive(&mut self) -> bool;

    /// Exit code, once `is_alive` has observed the exit
    fn exit_code(&self) -> Option<i32>;

    /// Ask the process to stop (SIGTERM, not a kill)
    fn terminate(&mut self) -> Result<(), ProcessError>;
}

/// Exit code of a finished child; signal deaths map to `128 + signal`.
pub fn status_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    -1
}

/// An OS child process
pub struct ChildProcess {
    role: Role,
    child: Child,
    exit_code: Option<i32>,
}

impl ChildProcess {
    pub fn new(role: Role, child: Child) -> Self {
        Self {
            role,
            child,
            exit_code: None,
        }
    }

    pub fn id(&self) -> u32 {
        self.child.id()
    }
}

impl SupervisedProcess for ChildProcess {
    fn role(&self) -> Role {
        self.role
    }

    fn is_alive(&mut self) -> bool {
        if self.exit_code.is_some() {
            return false;
        }
        match self.child.try_wait() {
            Ok(Some(status)) => {
                self.exit_code = Some(status_code(status));
                false
            }
            Ok(None) => true,
            Err(e) => {
                // The child can no longer be waited on, so it is gone
                warn!(role = %self.role, error = %e, "cannot query process status");
                self.exit_code = Some(-1);
                false
            }
        }
    }

    fn exit_code(&self) -> Option<i32> {
        self.exit_code
    }

    fn terminate(&mut self) -> Result<(), ProcessError> {
        #[cfg(unix)]
        {
            use nix::sys::signal::{self, Signal};
            use nix::unistd::Pid;

            let pid = Pid::from_raw(self.child.id() as i32);
            signal::kill(pid, Signal::SIGTERM).map_err(|e| ProcessError {
                role: self.role,
                message: e.to_string(),
            })
        }
        #[cfg(not(unix))]
        {
            self.child.kill().map_err(|e| ProcessError {
                role: self.role,
                message: e.to_string(),
            })
        }
    }
}
