//! Endpoint, command output and introspection result types.
//!
//! Result types derive `Serialize` so request handlers (and the operator CLI)
//! can hand them straight to a JSON encoder.

use std::fmt;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Application-level identifier for a media host.
pub type ServerId = i64;

/// Address and credentials of one physical SSH endpoint.
///
/// Resolved from a [`ServerId`] through the Remote Host Directory and
/// immutable for the lifetime of the session built from it.
#[derive(Clone, PartialEq, Eq)]
pub struct ServerEndpoint {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: Option<String>,
    pub key_path: Option<PathBuf>,
}

impl ServerEndpoint {
    /// Pool key for this endpoint. Two logical servers on the same
    /// `host:port` share one session.
    pub fn key(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

impl fmt::Debug for ServerEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerEndpoint")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("key_path", &self.key_path)
            .finish()
    }
}

/// Captured result of one remote command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    /// Remote exit status, or -1 when the server never reported one
    pub exit_code: i32,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Existence, file count and byte size of a remote directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderInfo {
    pub exists: bool,
    pub file_count: u64,
    pub size_bytes: u64,
}

impl FolderInfo {
    /// The conservative answer used whenever introspection fails.
    pub fn missing() -> Self {
        Self::default()
    }
}

/// Existence, size and permission string of a single remote file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileInfo {
    pub exists: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
    /// Mode string as printed by `ls -l`, e.g. `-rw-r--r--`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub permissions: Option<String>,
}

impl FileInfo {
    pub fn missing() -> Self {
        Self::default()
    }
}

/// Outcome of a completed upload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UploadReport {
    pub remote_path: String,
    pub bytes: u64,
    /// False when the post-upload `chmod` failed (logged, non-fatal)
    pub permissions_applied: bool,
}

/// Kind of idempotent remote operation, the first component of an
/// [`OperationKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    EnsureUserDirectory,
    EnsureUserFolder,
    EnsureUserStructure,
    DirectoryExists,
    FolderInfo,
}

impl OperationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationKind::EnsureUserDirectory => "ensure_user_dir",
            OperationKind::EnsureUserFolder => "ensure_user_folder",
            OperationKind::EnsureUserStructure => "ensure_user_structure",
            OperationKind::DirectoryExists => "dir_exists",
            OperationKind::FolderInfo => "folder_info",
        }
    }
}

/// Deterministic identity of a remote operation: `kind:server:target`.
///
/// Two calls with equal keys address the same remote state, which is what
/// lets the cooldown and the introspection cache stand in for a round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct OperationKey(String);

impl OperationKey {
    pub fn new(kind: OperationKind, server_id: ServerId, target: &str) -> Self {
        Self(format!("{}:{}:{}", kind.as_str(), server_id, target))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OperationKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
