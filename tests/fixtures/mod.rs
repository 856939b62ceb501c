//! Test fixtures for linked projects
//!
//! Provides a temporary user configuration directory and project directory
//! with both layers and a service manifest written out.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use stolos::config::{ConfigStore, CONFIG_FILE_NAME, PROJECT_STATE_DIR};
use tempfile::TempDir;

pub const PROJECT_UUID: &str = "2b1c2c9e-4cf4-4b8e-9a55-6a1f0f1d2f20";
pub const SERVER: &str = "stolos.example.com";

/// User layer with credentials for [`SERVER`]
pub const USER_LAYER: &str = "\
user:
  default-server: stolos.example.com
servers:
  stolos.example.com:
    username: alice
    token: s3cr3t
";

/// Project layer routing with subdomains
pub const PROJECT_LAYER: &str = "\
project:
  uuid: 2b1c2c9e-4cf4-4b8e-9a55-6a1f0f1d2f20
  stack: python-3
  public-url: proj.example.com
  subdomains: true
";

/// Manifest with one exposed service per environment form
pub const MANIFEST: &str = "\
version: '3'
services:
  web:
    image: nginx
    ports:
      - \"8000:80\"
      - \"443/tcp\"
    environment:
      - DEBUG=1
      - MALFORMED
  api_v2:
    image: app
    ports:
      - 5000
    environment:
      DATABASE_URL: postgres://db/app
      WORKERS: 4
  db:
    image: postgres
";

/// A user directory and a linked project directory
pub struct ProjectFixture {
    pub tmp: TempDir,
}

impl ProjectFixture {
    /// Fixture with the default layers and manifest
    pub fn new() -> Self {
        Self::with_layers(USER_LAYER, PROJECT_LAYER, Some(MANIFEST))
    }

    pub fn with_layers(user: &str, project: &str, manifest: Option<&str>) -> Self {
        let fixture = Self {
            tmp: TempDir::new().unwrap(),
        };
        write(&fixture.user_dir().join(CONFIG_FILE_NAME), user);
        write(
            &fixture
                .project_root()
                .join(PROJECT_STATE_DIR)
                .join(CONFIG_FILE_NAME),
            project,
        );
        if let Some(manifest) = manifest {
            write(&fixture.project_root().join("docker-compose.yml"), manifest);
        }
        fixture
    }

    pub fn user_dir(&self) -> PathBuf {
        self.tmp.path().join("user")
    }

    pub fn project_root(&self) -> PathBuf {
        self.tmp.path().join("work").join("proj")
    }

    pub fn store(&self) -> ConfigStore {
        ConfigStore::new(self.user_dir(), self.project_root())
    }
}

pub fn write(path: &Path, contents: &str) {
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}
