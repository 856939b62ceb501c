//! Typed view over the effective configuration

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use uuid::Uuid;

use super::store::{ConfigError, ConfigStore};

/// Manifest file name used when the project does not name one
pub const DEFAULT_MANIFEST: &str = "docker-compose.yml";

/// Remote directory under which every project's working copy is synchronized
pub const REMOTE_ROOT: &str = "/mnt/stolos";

/// Project identity and routing, from the `project` section
#[derive(Debug, Clone, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ProjectConfig {
    pub uuid: Uuid,

    #[serde(default)]
    pub stack: Option<String>,

    /// Public base URL, `host[:port]` without scheme
    pub public_url: String,

    /// `true`: `<token>.<base>`; `false`: `<sub>-<token>.<rest>`
    #[serde(default = "default_subdomains")]
    pub subdomains: bool,

    /// Owning server; falls back to `user.default-server`
    #[serde(default)]
    pub server: Option<String>,

    /// Manifest path, relative to the project root
    #[serde(default)]
    pub manifest: Option<PathBuf>,
}

fn default_subdomains() -> bool {
    true
}

impl ProjectConfig {
    /// Synchronization target on the remote host
    pub fn remote_dir(&self) -> String {
        format!("{}/{}", REMOTE_ROOT, self.uuid)
    }

    /// Identity with separators stripped, usable as a namespace token
    pub fn namespace(&self) -> String {
        self.uuid.simple().to_string()
    }
}

/// Credentials for one server, from `servers.<host>`
#[derive(Debug, Clone, Default, Deserialize, PartialEq)]
#[serde(rename_all = "kebab-case")]
pub struct ServerCredentials {
    #[serde(default)]
    pub username: Option<String>,

    #[serde(default)]
    pub token: Option<String>,

    #[serde(default)]
    pub identity_file: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct UserSection {
    #[serde(default)]
    default_server: Option<String>,
}

#[derive(Debug, Deserialize)]
struct RawSettings {
    #[serde(default)]
    project: Option<ProjectConfig>,

    #[serde(default)]
    user: UserSection,

    #[serde(default)]
    servers: BTreeMap<String, ServerCredentials>,
}

/// Everything a command needs to talk to the project's server
#[derive(Debug, Clone)]
pub struct Settings {
    pub project: ProjectConfig,

    /// Server host (may carry a `:port`)
    pub server: String,

    pub credentials: ServerCredentials,

    pub project_root: PathBuf,

    pub manifest_path: PathBuf,

    /// TLS material for the remote container endpoint
    pub cert_dir: PathBuf,

    /// Private key handed to the synchronizer's ssh transport
    pub identity_file: PathBuf,
}

impl Settings {
    /// Resolve settings from a merged configuration.
    pub fn from_config(
        merged: &Value,
        user_dir: &Path,
        project_root: &Path,
    ) -> Result<Self, ConfigError> {
        let raw: RawSettings = serde_json::from_value(merged.clone())
            .map_err(|e| ConfigError::Invalid(e.to_string()))?;

        let project = raw.project.ok_or_else(|| {
            ConfigError::Invalid(
                "no project section; run inside a linked stolos project".to_string(),
            )
        })?;

        if project.public_url.trim().is_empty() {
            return Err(ConfigError::Invalid("project.public-url is empty".to_string()));
        }

        let server = project
            .server
            .clone()
            .or(raw.user.default_server)
            .ok_or_else(|| {
                ConfigError::Invalid(
                    "no server for this project and no user.default-server".to_string(),
                )
            })?;

        let credentials = raw.servers.get(&server).cloned().unwrap_or_default();

        let server_dir = user_dir.join("servers").join(&server);
        let identity_file = credentials
            .identity_file
            .clone()
            .unwrap_or_else(|| server_dir.join("id_rsa"));

        let manifest_path = project_root.join(
            project
                .manifest
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MANIFEST)),
        );

        Ok(Self {
            project,
            server,
            credentials,
            project_root: project_root.to_path_buf(),
            manifest_path,
            cert_dir: server_dir.join("certs"),
            identity_file,
        })
    }

    /// Load and resolve settings through a store
    pub fn from_store(store: &ConfigStore) -> Result<Self, ConfigError> {
        let merged = store.merge()?;
        Self::from_config(&merged, store.user_dir(), store.project_root())
    }

    /// Server host without any port suffix
    pub fn server_host(&self) -> &str {
        self.server
            .split_once(':')
            .map(|(host, _)| host)
            .unwrap_or(&self.server)
    }
}
