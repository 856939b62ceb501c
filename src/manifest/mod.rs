//! Service manifest
//!
//! Reads the compose-style manifest of a project: the top-level `services`
//! collection, each service's normalized `environment` and its container
//! ports. Everything else in the document is ignored.

use serde_json::Value;
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::warn;

/// One service of the manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ServiceEntry {
    pub name: String,

    /// Container ports in declaration order
    pub ports: Vec<u16>,

    pub environment: BTreeMap<String, String>,
}

/// Parsed manifest
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Manifest {
    pub services: BTreeMap<String, ServiceEntry>,
}

/// Manifest errors
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("cannot read manifest {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot parse manifest: {0}")]
    Parse(String),
}

impl Manifest {
    /// Load the manifest at `path`. A missing file is an empty manifest.
    pub fn load(path: &Path) -> Result<Self, ManifestError> {
        match fs::read_to_string(path) {
            Ok(contents) => Self::parse(&contents),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(Self::default()),
            Err(source) => Err(ManifestError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    /// Parse manifest YAML
    pub fn parse(contents: &str) -> Result<Self, ManifestError> {
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }

        let document: Value =
            serde_yaml_bw::from_str(contents).map_err(|e| ManifestError::Parse(e.to_string()))?;

        let services = match document.get("services") {
            None | Some(Value::Null) => return Ok(Self::default()),
            Some(Value::Object(services)) => services,
            Some(_) => {
                return Err(ManifestError::Parse(
                    "'services' must be a mapping".to_string(),
                ))
            }
        };

        let services = services
            .iter()
            .map(|(name, body)| (name.clone(), parse_service(name, body)))
            .collect();

        Ok(Self { services })
    }

    /// Services that declare at least one port
    pub fn exposed(&self) -> impl Iterator<Item = &ServiceEntry> {
        self.services.values().filter(|s| !s.ports.is_empty())
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}

fn parse_service(name: &str, body: &Value) -> ServiceEntry {
    let environment = body
        .get("environment")
        .map(|env| normalize_environment(name, env))
        .unwrap_or_default();

    let ports = match body.get("ports") {
        Some(Value::Array(items)) => items
            .iter()
            .filter_map(|item| {
                let port = container_port(item);
                if port.is_none() {
                    warn!(service = name, port = %item, "skipping unsupported port declaration");
                }
                port
            })
            .collect(),
        Some(Value::Null) | None => Vec::new(),
        Some(other) => {
            warn!(service = name, ports = %other, "'ports' is not a list; ignoring");
            Vec::new()
        }
    };

    ServiceEntry {
        name: name.to_string(),
        ports,
        environment,
    }
}

/// Normalize either environment form to a mapping.
///
/// Mapping form: scalar values are stringified, null values are skipped.
/// List form: `KEY=VALUE` strings; entries without `=` are skipped.
pub fn normalize_environment(service: &str, env: &Value) -> BTreeMap<String, String> {
    let mut out = BTreeMap::new();
    match env {
        Value::Object(map) => {
            for (key, value) in map {
                match scalar_to_string(value) {
                    Some(v) => {
                        out.insert(key.clone(), v);
                    }
                    None => {
                        warn!(service, key = %key, "skipping environment entry without a scalar value")
                    }
                }
            }
        }
        Value::Array(items) => {
            for item in items {
                match item.as_str().and_then(|s| s.split_once('=')) {
                    Some((key, value)) if !key.is_empty() => {
                        out.insert(key.to_string(), value.to_string());
                    }
                    _ => warn!(service, entry = %item, "skipping malformed environment entry"),
                }
            }
        }
        Value::Null => {}
        other => warn!(service, environment = %other, "'environment' is neither a mapping nor a list"),
    }
    out
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

/// Extract the container port of one `ports` entry.
///
/// Accepts `80`, `"80"`, `"8000:80"`, `"127.0.0.1:8000:80"`, `"80/tcp"` and
/// long-form mappings with a `target` key. Port ranges are not supported.
pub fn container_port(item: &Value) -> Option<u16> {
    match item {
        Value::Number(n) => n.as_u64().and_then(|p| u16::try_from(p).ok()),
        Value::String(s) => {
            let spec = s.split('/').next()?;
            let container = spec.rsplit(':').next()?;
            container.trim().parse().ok()
        }
        Value::Object(map) => map.get("target").and_then(container_port),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_list_and_dict_environment_equal() {
        let dict = Manifest::parse(
            "services:\n  web:\n    environment:\n      DEBUG: \"1\"\n      NAME: app\n",
        )
        .unwrap();
        let list = Manifest::parse(
            "services:\n  web:\n    environment:\n      - DEBUG=1\n      - NAME=app\n",
        )
        .unwrap();

        assert_eq!(dict.services["web"].environment, list.services["web"].environment);
        assert_eq!(list.services["web"].environment["NAME"], "app");
    }

    #[test]
    fn test_malformed_list_entries_skipped() {
        let manifest = Manifest::parse(
            "services:\n  web:\n    environment:\n      - GOOD=yes\n      - NOEQUALS\n      - =novalue\n",
        )
        .unwrap();

        let env = &manifest.services["web"].environment;
        assert_eq!(env.len(), 1);
        assert_eq!(env["GOOD"], "yes");
    }

    #[test]
    fn test_value_with_equals_kept_whole() {
        let env = normalize_environment("web", &json!(["URL=postgres://u:p@db/x?a=b"]));
        assert_eq!(env["URL"], "postgres://u:p@db/x?a=b");
    }

    #[test]
    fn test_dict_scalars_stringified() {
        let env = normalize_environment("web", &json!({"N": 3, "B": true, "X": null}));
        assert_eq!(env["N"], "3");
        assert_eq!(env["B"], "true");
        assert!(!env.contains_key("X"));
    }

    #[test]
    fn test_ports() {
        let manifest = Manifest::parse(
            r#"
services:
  web:
    image: nginx
    ports:
      - 80
      - "8000:443"
      - "127.0.0.1:9000:9090"
      - "53/udp"
      - target: 3000
        published: 3001
      - "8000-8001:80-81"
  db:
    image: postgres
"#,
        )
        .unwrap();

        assert_eq!(manifest.services["web"].ports, vec![80, 443, 9090, 53, 3000]);
        assert!(manifest.services["db"].ports.is_empty());

        let exposed: Vec<_> = manifest.exposed().map(|s| s.name.as_str()).collect();
        assert_eq!(exposed, vec!["web"]);
    }

    #[test]
    fn test_empty_and_missing() {
        assert!(Manifest::parse("").unwrap().is_empty());
        assert!(Manifest::parse("version: '2'\n").unwrap().is_empty());
        assert!(Manifest::load(Path::new("/nonexistent/docker-compose.yml"))
            .unwrap()
            .is_empty());
    }

    #[test]
    fn test_services_not_mapping() {
        assert!(Manifest::parse("services: [a, b]\n").is_err());
    }
}
