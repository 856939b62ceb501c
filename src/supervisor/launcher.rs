//! Launching the synchronizer and the service runner
//!
//! The synchronizer is `unison` over ssh; the service runner is
//! `docker-compose` pointed at the remote container endpoint through the
//! environment built by [`crate::env::build`].

use std::collections::BTreeMap;
use std::io;
use std::path::PathBuf;
use std::process::Command;
use tracing::debug;

use super::process::{status_code, ChildProcess, Role, SupervisedProcess};
use crate::config::{Settings, PROJECT_STATE_DIR};

/// Default synchronizer program
pub const SYNC_PROGRAM: &str = "unison";

/// Default service runner program
pub const SERVICES_PROGRAM: &str = "docker-compose";

/// One request to the synchronizer or the service runner
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Invocation {
    /// Single synchronization pass with fast-check
    SyncOnce,
    /// Continuous synchronization
    SyncRepeat,
    /// Bring services up detached, removing orphans
    ServicesUp { rebuild: bool },
    /// Follow service logs
    ServicesLogs,
    /// Bring services down
    ServicesDown,
}

impl Invocation {
    pub fn role(&self) -> Role {
        match self {
            Invocation::SyncOnce | Invocation::SyncRepeat => Role::Sync,
            Invocation::ServicesUp { .. }
            | Invocation::ServicesLogs
            | Invocation::ServicesDown => Role::Services,
        }
    }
}

/// Launch errors
#[derive(Debug, thiserror::Error)]
pub enum LaunchError {
    #[error("cannot start {program} ({role}): {source}")]
    Spawn {
        role: Role,
        program: String,
        #[source]
        source: io::Error,
    },
}

/// Starts supervised processes
pub trait Launcher {
    /// Run `invocation` to completion and return its exit code
    fn run(&mut self, invocation: &Invocation) -> Result<i32, LaunchError>;

    /// Start `invocation` in the background
    fn spawn(&mut self, invocation: &Invocation)
        -> Result<Box<dyn SupervisedProcess>, LaunchError>;
}

/// Synchronizer command line
#[derive(Debug, Clone)]
pub struct SyncCommand {
    pub program: String,
    pub local_root: PathBuf,
    /// `ssh://[user@]host//remote/dir`
    pub remote: String,
    pub identity_file: PathBuf,
}

impl SyncCommand {
    pub fn from_settings(settings: &Settings) -> Self {
        let authority = match settings.credentials.username.as_deref() {
            Some(user) => format!("{}@{}", user, settings.server_host()),
            None => settings.server_host().to_string(),
        };
        Self {
            program: SYNC_PROGRAM.to_string(),
            local_root: settings.project_root.clone(),
            remote: format!("ssh://{}/{}", authority, settings.project.remote_dir()),
            identity_file: settings.identity_file.clone(),
        }
    }

    pub fn args(&self, repeat: bool) -> Vec<String> {
        let local = self.local_root.to_string_lossy().to_string();
        let mut args = vec![
            local.clone(),
            self.remote.clone(),
            "-batch".to_string(),
            "-auto".to_string(),
            "-prefer".to_string(),
            local,
            "-ignore".to_string(),
            format!("Path {}", PROJECT_STATE_DIR),
            "-sshargs".to_string(),
            format!("-i {}", self.identity_file.display()),
        ];
        if repeat {
            args.extend(["-repeat".to_string(), "watch".to_string()]);
        } else {
            args.extend(["-fastcheck".to_string(), "true".to_string()]);
        }
        args
    }
}

/// Service runner command line
#[derive(Debug, Clone)]
pub struct ServicesCommand {
    pub program: String,
    /// Disable ANSI colors in followed logs
    pub no_color: bool,
}

impl Default for ServicesCommand {
    fn default() -> Self {
        Self {
            program: SERVICES_PROGRAM.to_string(),
            no_color: cfg!(windows),
        }
    }
}

impl ServicesCommand {
    pub fn args(&self, invocation: &Invocation) -> Vec<String> {
        let mut args: Vec<String> = Vec::new();
        match invocation {
            Invocation::ServicesUp { rebuild } => {
                args.extend(["up", "-d", "--remove-orphans"].map(String::from));
                if *rebuild {
                    args.push("--build".to_string());
                }
            }
            Invocation::ServicesLogs => {
                args.extend(["logs", "-f"].map(String::from));
                if self.no_color {
                    args.push("--no-color".to_string());
                }
            }
            Invocation::ServicesDown => args.push("down".to_string()),
            Invocation::SyncOnce | Invocation::SyncRepeat => {}
        }
        args
    }
}

/// Launches real OS processes with the project environment
pub struct CommandLauncher {
    sync: SyncCommand,
    services: ServicesCommand,
    env: BTreeMap<String, String>,
    working_dir: PathBuf,
}

impl CommandLauncher {
    pub fn new(
        sync: SyncCommand,
        services: ServicesCommand,
        env: BTreeMap<String, String>,
        working_dir: PathBuf,
    ) -> Self {
        Self {
            sync,
            services,
            env,
            working_dir,
        }
    }

    /// Program and arguments for `invocation`
    pub fn command_line(&self, invocation: &Invocation) -> (String, Vec<String>) {
        match invocation {
            Invocation::SyncOnce => (self.sync.program.clone(), self.sync.args(false)),
            Invocation::SyncRepeat => (self.sync.program.clone(), self.sync.args(true)),
            other => (self.services.program.clone(), self.services.args(other)),
        }
    }

    fn command(&self, invocation: &Invocation) -> (String, Command) {
        let (program, args) = self.command_line(invocation);
        debug!(role = %invocation.role(), program = %program, args = ?args, "launching");
        let mut command = Command::new(&program);
        command
            .args(&args)
            .envs(&self.env)
            .current_dir(&self.working_dir);
        (program, command)
    }
}

impl Launcher for CommandLauncher {
    fn run(&mut self, invocation: &Invocation) -> Result<i32, LaunchError> {
        let (program, mut command) = self.command(invocation);
        let status = command.status().map_err(|source| LaunchError::Spawn {
            role: invocation.role(),
            program,
            source,
        })?;
        Ok(status_code(status))
    }

    fn spawn(
        &mut self,
        invocation: &Invocation,
    ) -> Result<Box<dyn SupervisedProcess>, LaunchError> {
        let (program, mut command) = self.command(invocation);
        let child = command.spawn().map_err(|source| LaunchError::Spawn {
            role: invocation.role(),
            program,
            source,
        })?;
        Ok(Box::new(ChildProcess::new(invocation.role(), child)))
    }
}
