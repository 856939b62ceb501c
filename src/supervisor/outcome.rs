//! Run outcomes and stable exit codes

use std::fmt;

use super::process::Role;

/// Stable process exit codes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum ExitCode {
    Success = 0,
    /// Unexpected local failure (interrupt handler, output serialization)
    Internal = 1,
    /// Configuration could not be read, written or resolved
    Config = 2,
    /// A synchronizer or service runner binary could not be started
    Launch = 3,
    SyncFailed = 10,
    ServiceStartFailed = 11,
    /// A supervised process exited on its own mid-run
    ProcessExited = 12,
    /// Stopped by the operator
    Cancelled = 80,
}

impl ExitCode {
    pub fn code(self) -> i32 {
        self as i32
    }
}

/// Final outcome of one supervisor run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    Success,
    /// Initial synchronization exited non-zero; no service was started
    SyncFailed { code: i32 },
    /// Service bring-up exited non-zero
    ServiceStartFailed { code: i32 },
    /// A supervised process exited without being asked to
    ProcessExited { role: Role, code: i32 },
    /// The operator interrupted the run
    UserCancelled,
}

impl Outcome {
    /// `UserCancelled` is a normal termination path, not a failure
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            Outcome::SyncFailed { .. }
                | Outcome::ServiceStartFailed { .. }
                | Outcome::ProcessExited { .. }
        )
    }

    pub fn exit_code(&self) -> ExitCode {
        match self {
            Outcome::Success => ExitCode::Success,
            Outcome::SyncFailed { .. } => ExitCode::SyncFailed,
            Outcome::ServiceStartFailed { .. } => ExitCode::ServiceStartFailed,
            Outcome::ProcessExited { .. } => ExitCode::ProcessExited,
            Outcome::UserCancelled => ExitCode::Cancelled,
        }
    }
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Outcome::Success => write!(f, "project is up"),
            Outcome::SyncFailed { code } => {
                write!(f, "initial sync failed (sync exited with code {})", code)
            }
            Outcome::ServiceStartFailed { code } => write!(
                f,
                "starting services failed (services exited with code {})",
                code
            ),
            Outcome::ProcessExited { role, code } => {
                write!(f, "{} process exited unexpectedly with code {}", role, code)
            }
            Outcome::UserCancelled => write!(f, "stopped by user"),
        }
    }
}
