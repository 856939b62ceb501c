//! Configuration store
//!
//! Loads, merges and persists the user and project configuration layers.
//! A layer whose file does not exist is an empty mapping.

use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::debug;

use super::merge::{merge_layer, merge_layers};

/// Directory holding project-local state, relative to the project root
pub const PROJECT_STATE_DIR: &str = ".stolos";

/// File name of both configuration layers
pub const CONFIG_FILE_NAME: &str = "config.yaml";

/// Environment variable overriding the user configuration directory
pub const CONFIG_DIR_ENV: &str = "STOLOS_CONFIG_DIR";

/// Keys that contain secrets and should be redacted for display
const SECRET_KEYS: &[&str] = &["password", "token", "secret", "private_key", "api_key"];

/// Configuration layer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layer {
    User,
    Project,
}

impl Layer {
    pub fn as_str(&self) -> &'static str {
        match self {
            Layer::User => "user",
            Layer::Project => "project",
        }
    }
}

/// A contributing layer file with provenance
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConfigSource {
    /// Layer this file belongs to
    pub layer: Layer,

    /// File path
    pub path: String,

    /// SHA-256 digest of raw file bytes
    pub digest: String,
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A layer could not be read or written
    #[error("cannot persist configuration at {}: {source}", .path.display())]
    Persist {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse configuration at {}: {message}", .path.display())]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {0}")]
    Invalid(String),

    #[error("no configuration directory available on this platform (set STOLOS_CONFIG_DIR)")]
    NoConfigDir,
}

/// Loads and persists the two configuration layers
#[derive(Debug, Clone)]
pub struct ConfigStore {
    user_dir: PathBuf,
    project_root: PathBuf,
}

impl ConfigStore {
    /// Create a store over explicit directories
    pub fn new(user_dir: impl Into<PathBuf>, project_root: impl Into<PathBuf>) -> Self {
        Self {
            user_dir: user_dir.into(),
            project_root: project_root.into(),
        }
    }

    /// Create a store for the project enclosing `cwd`.
    ///
    /// Outside any project the project root is `cwd` itself, so a later
    /// `update(Layer::Project, ..)` creates the project there.
    pub fn discover(cwd: &Path) -> Result<Self, ConfigError> {
        let user_dir = Self::default_user_dir()?;
        let project_root = find_project_root(cwd).unwrap_or_else(|| cwd.to_path_buf());
        debug!(user_dir = %user_dir.display(), project_root = %project_root.display(), "config store");
        Ok(Self::new(user_dir, project_root))
    }

    /// Platform configuration directory for the user layer
    pub fn default_user_dir() -> Result<PathBuf, ConfigError> {
        if let Some(dir) = std::env::var_os(CONFIG_DIR_ENV) {
            return Ok(PathBuf::from(dir));
        }
        directories::ProjectDirs::from("", "", "Stolos")
            .map(|dirs| dirs.config_dir().to_path_buf())
            .ok_or(ConfigError::NoConfigDir)
    }

    pub fn user_dir(&self) -> &Path {
        &self.user_dir
    }

    pub fn project_root(&self) -> &Path {
        &self.project_root
    }

    /// Project-local state directory (`<root>/.stolos`)
    pub fn state_dir(&self) -> PathBuf {
        self.project_root.join(PROJECT_STATE_DIR)
    }

    /// Path of the file backing `layer`
    pub fn layer_path(&self, layer: Layer) -> PathBuf {
        match layer {
            Layer::User => self.user_dir.join(CONFIG_FILE_NAME),
            Layer::Project => self.state_dir().join(CONFIG_FILE_NAME),
        }
    }

    /// Load one layer. A missing file yields an empty mapping.
    pub fn load(&self, layer: Layer) -> Result<Value, ConfigError> {
        let path = self.layer_path(layer);
        Ok(read_layer(&path)?
            .map(|(value, _)| value)
            .unwrap_or_else(|| Value::Object(Map::new())))
    }

    /// Effective configuration: user layer, then project layer on top
    pub fn merge(&self) -> Result<Value, ConfigError> {
        let user = self.load(Layer::User)?;
        let project = self.load(Layer::Project)?;
        Ok(merge_layers(vec![user, project]))
    }

    /// Merge `partial` into `layer` and write the result back.
    pub fn update(&self, layer: Layer, partial: Value) -> Result<(), ConfigError> {
        let path = self.layer_path(layer);
        let current = self.load(layer)?;
        let updated = merge_layer(current, partial);

        let yaml = serde_yaml_bw::to_string(&updated).map_err(|e| ConfigError::Parse {
            path: path.clone(),
            message: e.to_string(),
        })?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::Persist {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        fs::write(&path, yaml).map_err(|source| ConfigError::Persist {
            path: path.clone(),
            source,
        })?;

        debug!(layer = layer.as_str(), path = %path.display(), "configuration updated");
        Ok(())
    }

    /// Files contributing to the effective configuration, in precedence order
    pub fn sources(&self) -> Result<Vec<ConfigSource>, ConfigError> {
        let mut sources = Vec::new();
        for layer in [Layer::User, Layer::Project] {
            let path = self.layer_path(layer);
            if let Some((_, bytes)) = read_layer(&path)? {
                let mut hasher = Sha256::new();
                hasher.update(&bytes);
                sources.push(ConfigSource {
                    layer,
                    path: path.to_string_lossy().to_string(),
                    digest: hex::encode(hasher.finalize()),
                });
            }
        }
        Ok(sources)
    }

    /// Remove the project state directory. Returns false if there was none.
    pub fn remove_project_state(&self) -> Result<bool, ConfigError> {
        let dir = self.state_dir();
        if !dir.exists() {
            return Ok(false);
        }
        fs::remove_dir_all(&dir).map_err(|source| ConfigError::Persist { path: dir, source })?;
        Ok(true)
    }
}

/// Read and parse a layer file, returning the mapping and the raw bytes.
fn read_layer(path: &Path) -> Result<Option<(Value, Vec<u8>)>, ConfigError> {
    let bytes = match fs::read(path) {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(source) => {
            return Err(ConfigError::Persist {
                path: path.to_path_buf(),
                source,
            })
        }
    };

    let contents = String::from_utf8(bytes.clone()).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: format!("invalid UTF-8: {}", e),
    })?;

    if contents.trim().is_empty() {
        return Ok(Some((Value::Object(Map::new()), bytes)));
    }

    let value: Value = serde_yaml_bw::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;

    match value {
        Value::Object(_) => Ok(Some((value, bytes))),
        Value::Null => Ok(Some((Value::Object(Map::new()), bytes))),
        _ => Err(ConfigError::Parse {
            path: path.to_path_buf(),
            message: "top level must be a mapping".to_string(),
        }),
    }
}

/// Find the closest ancestor of `start` (inclusive) holding a project layer.
pub fn find_project_root(start: &Path) -> Option<PathBuf> {
    let mut current = start.to_path_buf();
    loop {
        if current
            .join(PROJECT_STATE_DIR)
            .join(CONFIG_FILE_NAME)
            .is_file()
        {
            return Some(current);
        }
        match current.parent() {
            Some(parent) if parent != current => current = parent.to_path_buf(),
            _ => return None,
        }
    }
}

/// Redact secrets in place, returning the redacted key paths
pub fn redact_secrets(value: &mut Value) -> Vec<String> {
    let mut redactions = Vec::new();
    redact_recursive(value, String::new(), &mut redactions);
    redactions
}

fn redact_recursive(value: &mut Value, path: String, redactions: &mut Vec<String>) {
    if let Value::Object(map) = value {
        for (key, val) in map.iter_mut() {
            let key_lower = key.to_lowercase();
            let current_path = if path.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", path, key)
            };

            let is_secret = SECRET_KEYS.iter().any(|s| key_lower.contains(s));
            if is_secret && !val.is_object() && !val.is_null() {
                *val = Value::String("[REDACTED]".to_string());
                redactions.push(current_path);
            } else {
                redact_recursive(val, current_path, redactions);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn store(tmp: &TempDir) -> ConfigStore {
        ConfigStore::new(tmp.path().join("user"), tmp.path().join("proj"))
    }

    #[test]
    fn test_missing_layers_are_empty() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        assert_eq!(store.load(Layer::User).unwrap(), json!({}));
        assert_eq!(store.load(Layer::Project).unwrap(), json!({}));
        assert_eq!(store.merge().unwrap(), json!({}));
    }

    #[test]
    fn test_update_creates_directories() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        store
            .update(Layer::Project, json!({"project": {"public-url": "p.example.com"}}))
            .unwrap();

        assert!(store.layer_path(Layer::Project).is_file());
        assert_eq!(
            store.load(Layer::Project).unwrap()["project"]["public-url"],
            "p.example.com"
        );
    }

    #[test]
    fn test_update_merges_into_existing() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        store
            .update(Layer::User, json!({"servers": {"a": {"username": "alice"}}}))
            .unwrap();
        store
            .update(Layer::User, json!({"servers": {"b": {"username": "bob"}}}))
            .unwrap();

        let user = store.load(Layer::User).unwrap();
        assert_eq!(user["servers"]["a"]["username"], "alice");
        assert_eq!(user["servers"]["b"]["username"], "bob");
    }

    #[test]
    fn test_project_layer_wins() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);

        store
            .update(Layer::User, json!({"project": {"server": "u.example.com", "stack": "go"}}))
            .unwrap();
        store
            .update(Layer::Project, json!({"project": {"server": "p.example.com"}}))
            .unwrap();

        let merged = store.merge().unwrap();
        assert_eq!(merged["project"]["server"], "p.example.com");
        assert_eq!(merged["project"]["stack"], "go");
    }

    #[test]
    fn test_update_fails_when_directory_not_creatable() {
        let tmp = TempDir::new().unwrap();
        let blocker = tmp.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let store = ConfigStore::new(blocker.join("user"), tmp.path());

        let err = store.update(Layer::User, json!({"k": 1})).unwrap_err();
        assert!(matches!(err, ConfigError::Persist { .. }));
    }

    #[test]
    fn test_empty_file_is_empty_mapping() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let path = store.layer_path(Layer::User);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "\n").unwrap();

        assert_eq!(store.load(Layer::User).unwrap(), json!({}));
    }

    #[test]
    fn test_non_mapping_file_is_parse_error() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        let path = store.layer_path(Layer::User);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "- just\n- a list\n").unwrap();

        let err = store.load(Layer::User).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_find_project_root_from_subdirectory() {
        let tmp = TempDir::new().unwrap();
        let root = tmp.path().join("proj");
        let nested = root.join("src/app/views");
        fs::create_dir_all(&nested).unwrap();
        fs::create_dir_all(root.join(PROJECT_STATE_DIR)).unwrap();
        fs::write(root.join(PROJECT_STATE_DIR).join(CONFIG_FILE_NAME), "project: {}\n").unwrap();

        assert_eq!(find_project_root(&nested), Some(root.clone()));
        assert_eq!(find_project_root(&root), Some(root));
    }

    #[test]
    fn test_find_project_root_none() {
        let tmp = TempDir::new().unwrap();
        let dir = tmp.path().join("plain");
        fs::create_dir_all(&dir).unwrap();

        // An enclosing directory above the tempdir could in theory be a project,
        // so only assert that the result is not below the tempdir.
        if let Some(found) = find_project_root(&dir) {
            assert!(!found.starts_with(tmp.path()));
        }
    }

    #[test]
    fn test_sources_tracked() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        assert!(store.sources().unwrap().is_empty());

        store.update(Layer::User, json!({"k": 1})).unwrap();
        store.update(Layer::Project, json!({"k": 2})).unwrap();

        let sources = store.sources().unwrap();
        assert_eq!(sources.len(), 2);
        assert_eq!(sources[0].layer, Layer::User);
        assert_eq!(sources[1].layer, Layer::Project);
        assert_eq!(sources[0].digest.len(), 64);
    }

    #[test]
    fn test_remove_project_state() {
        let tmp = TempDir::new().unwrap();
        let store = store(&tmp);
        assert!(!store.remove_project_state().unwrap());

        store.update(Layer::Project, json!({"project": {}})).unwrap();
        assert!(store.remove_project_state().unwrap());
        assert!(!store.state_dir().exists());
    }

    #[test]
    fn test_secret_redaction() {
        let mut value = json!({
            "servers": {"h": {"username": "alice", "token": "abc"}},
            "password": "hunter2"
        });
        let redactions = redact_secrets(&mut value);

        assert_eq!(value["servers"]["h"]["token"], "[REDACTED]");
        assert_eq!(value["servers"]["h"]["username"], "alice");
        assert_eq!(value["password"], "[REDACTED]");
        assert!(redactions.contains(&"servers.h.token".to_string()));
    }
}
