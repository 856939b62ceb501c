//! Child process environment
//!
//! Builds the environment shared by the synchronizer and the service runner
//! from the resolved settings and the service manifest. Building is pure: the
//! caller decides when and where the mapping is applied.

mod shell;

pub use shell::{render, Shell};

use regex_lite::Regex;
use std::collections::BTreeMap;
use std::sync::OnceLock;

use crate::config::Settings;
use crate::manifest::Manifest;

/// Port of the TLS-protected container endpoint on every server
pub const DOCKER_TLS_PORT: u16 = 2376;

/// Prefix of per-service routing variables
pub const URL_PREFIX: &str = "STOLOS_URL_";

pub const PROJECT_ID: &str = "STOLOS_PROJECT_ID";
pub const COMPOSE_PROJECT_NAME: &str = "COMPOSE_PROJECT_NAME";
pub const COMPOSE_FILE: &str = "COMPOSE_FILE";
pub const REMOTE_DIR: &str = "STOLOS_REMOTE_DIR";
pub const SERVER: &str = "STOLOS_SERVER";
pub const PUBLIC_URL: &str = "STOLOS_PUBLIC_URL";
pub const DOCKER_HOST: &str = "DOCKER_HOST";
pub const DOCKER_TLS_VERIFY: &str = "DOCKER_TLS_VERIFY";
pub const DOCKER_CERT_PATH: &str = "DOCKER_CERT_PATH";

/// Environment build errors
#[derive(Debug, thiserror::Error)]
pub enum EnvError {
    #[error("cannot route service '{service}': {source}")]
    Routing {
        service: String,
        #[source]
        source: stolos_routing::RoutingError,
    },

    /// Two services sanitize to the same variable name
    #[error("services '{first}' and '{second}' both map to {key}")]
    KeyCollision {
        key: String,
        first: String,
        second: String,
    },
}

/// Build the environment for the synchronizer and the service runner.
pub fn build(
    settings: &Settings,
    manifest: &Manifest,
) -> Result<BTreeMap<String, String>, EnvError> {
    let project = &settings.project;
    let mut env = BTreeMap::new();

    env.insert(PROJECT_ID.to_string(), project.uuid.to_string());
    env.insert(COMPOSE_PROJECT_NAME.to_string(), project.namespace());
    env.insert(
        COMPOSE_FILE.to_string(),
        settings.manifest_path.to_string_lossy().to_string(),
    );
    env.insert(REMOTE_DIR.to_string(), project.remote_dir());
    env.insert(SERVER.to_string(), settings.server.clone());
    env.insert(PUBLIC_URL.to_string(), project.public_url.clone());
    env.insert(
        DOCKER_HOST.to_string(),
        format!("tcp://{}:{}", settings.server_host(), DOCKER_TLS_PORT),
    );
    env.insert(DOCKER_TLS_VERIFY.to_string(), "1".to_string());
    env.insert(
        DOCKER_CERT_PATH.to_string(),
        settings.cert_dir.to_string_lossy().to_string(),
    );

    // URL variable -> service that produced it
    let mut owners: BTreeMap<String, String> = BTreeMap::new();

    for service in manifest.exposed() {
        if !project.subdomains && !stolos_routing::supports_label_routing(&project.public_url) {
            return Err(EnvError::Routing {
                service: service.name.clone(),
                source: stolos_routing::RoutingError::UndottedBase(project.public_url.clone()),
            });
        }

        let route = |port: Option<u16>| {
            stolos_routing::resolve(
                &project.public_url,
                project.subdomains,
                Some(&service.name),
                port,
            )
            .map_err(|source| EnvError::Routing {
                service: service.name.clone(),
                source,
            })
        };

        let mut routes = vec![(url_key(&service.name, None), route(None)?)];
        for &port in &service.ports {
            routes.push((url_key(&service.name, Some(port)), route(Some(port))?));
        }

        for (key, url) in routes {
            match owners.get(&key) {
                Some(owner) if *owner != service.name => {
                    return Err(EnvError::KeyCollision {
                        key,
                        first: owner.clone(),
                        second: service.name.clone(),
                    });
                }
                _ => {}
            }
            owners.insert(key.clone(), service.name.clone());
            env.insert(key, url);
        }
    }

    Ok(env)
}

/// Variable name carrying the public hostname of a service (and port)
pub fn url_key(service: &str, port: Option<u16>) -> String {
    static NON_ALNUM: OnceLock<Regex> = OnceLock::new();
    let re = NON_ALNUM.get_or_init(|| Regex::new("[^A-Za-z0-9]+").expect("static regex"));
    let name = re.replace_all(service, "_").to_uppercase();
    match port {
        Some(port) => format!("{}{}_{}", URL_PREFIX, name, port),
        None => format!("{}{}", URL_PREFIX, name),
    }
}
