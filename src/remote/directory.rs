//! Remote Host Directory: logical server id -> SSH endpoint.
//!
//! The real directory lives in the platform database; the core only sees the
//! [`HostDirectory`] trait. [`StaticHostDirectory`] is an in-memory
//! implementation used by the operator CLI (loaded from a JSON file) and by
//! tests.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::types::{ServerEndpoint, ServerId};

fn default_port() -> u16 {
    22
}

fn default_username() -> String {
    "root".to_string()
}

fn default_active() -> bool {
    true
}

/// One media host as recorded by the platform.
#[derive(Clone, Serialize, Deserialize)]
pub struct HostRecord {
    pub server_id: ServerId,
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    #[serde(default = "default_username")]
    pub username: String,
    /// Password of the shared privileged account
    #[serde(default, alias = "root_password")]
    pub password: Option<String>,
    #[serde(default)]
    pub key_path: Option<PathBuf>,
    /// Inactive hosts are never connected to
    #[serde(default = "default_active")]
    pub active: bool,
}

impl HostRecord {
    /// Record with password authentication as `root` on port 22.
    pub fn new(server_id: ServerId, host: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            server_id,
            host: host.into(),
            port: default_port(),
            username: default_username(),
            password: Some(password.into()),
            key_path: None,
            active: true,
        }
    }

    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    pub fn inactive(mut self) -> Self {
        self.active = false;
        self
    }

    pub fn endpoint(&self) -> ServerEndpoint {
        ServerEndpoint {
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            key_path: self.key_path.clone(),
        }
    }
}

impl fmt::Debug for HostRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HostRecord")
            .field("server_id", &self.server_id)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("active", &self.active)
            .finish_non_exhaustive()
    }
}

/// Lookup of host address and credentials by logical server id.
///
/// Implementations must be thread-safe (`Send + Sync`); the pool calls
/// `lookup` on every acquire.
#[async_trait]
pub trait HostDirectory: Send + Sync {
    /// Returns `Ok(None)` for unknown servers and `Err` when the directory
    /// itself could not be queried.
    async fn lookup(&self, server_id: ServerId) -> Result<Option<HostRecord>, String>;
}

#[derive(Debug, Error)]
pub enum DirectoryLoadError {
    #[error("failed to read host directory: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to parse host directory: {0}")]
    Parse(#[from] serde_json::Error),
}

/// In-memory host directory.
#[derive(Debug, Clone, Default)]
pub struct StaticHostDirectory {
    records: HashMap<ServerId, HostRecord>,
}

impl StaticHostDirectory {
    pub fn new(records: impl IntoIterator<Item = HostRecord>) -> Self {
        Self {
            records: records
                .into_iter()
                .map(|record| (record.server_id, record))
                .collect(),
        }
    }

    /// Parse a JSON array of host records.
    pub fn from_json(json: &str) -> Result<Self, DirectoryLoadError> {
        let records: Vec<HostRecord> = serde_json::from_str(json)?;
        Ok(Self::new(records))
    }

    pub fn from_json_file(path: &Path) -> Result<Self, DirectoryLoadError> {
        let raw = std::fs::read_to_string(path)?;
        Self::from_json(&raw)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

#[async_trait]
impl HostDirectory for StaticHostDirectory {
    async fn lookup(&self, server_id: ServerId) -> Result<Option<HostRecord>, String> {
        Ok(self.records.get(&server_id).cloned())
    }
}
