//! stolos - remote development environments
//!
//! Keeps a local working copy synchronized with a remote host and supervises
//! the project's containerized services running there, exposing each service
//! under a public hostname.

pub mod config;
pub mod env;
pub mod manifest;
pub mod mock;
pub mod signal;
pub mod supervisor;

pub use config::{ConfigError, ConfigStore, Layer, Settings};
pub use manifest::{Manifest, ManifestError};
pub use signal::InterruptCounter;
pub use supervisor::{ExitCode, Outcome, Supervisor, SupervisorError, UpOptions};
