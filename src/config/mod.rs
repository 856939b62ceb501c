//! Layered configuration
//!
//! Two YAML layers contribute to the effective configuration:
//! 1. User layer (`<config dir>/config.yaml`): server credentials, default server
//! 2. Project layer (`<project>/.stolos/config.yaml`): project identity and routing
//!
//! The project layer wins on conflict, one mapping level deep.

mod merge;
mod settings;
mod store;

pub use merge::{merge_layer, merge_layers, partial_for_key};
pub use settings::{ProjectConfig, ServerCredentials, Settings, DEFAULT_MANIFEST, REMOTE_ROOT};
pub use store::{
    find_project_root, redact_secrets, ConfigError, ConfigSource, ConfigStore, Layer,
    CONFIG_FILE_NAME, PROJECT_STATE_DIR,
};
