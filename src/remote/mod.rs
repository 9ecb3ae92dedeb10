//! Remote execution and connection management for media-server hosts.
//!
//! This module is organized into the following submodules:
//!
//! - `types`: Endpoint, command output and introspection result types
//! - `config`: Configuration resolution with environment variable support
//! - `error`: Error taxonomy and connect-time retry classification
//! - `directory`: Remote Host Directory lookup (logical server id -> endpoint)
//! - `transport`: `Connector`/`Transport` seams over the SSH client
//! - `session`: Pooled session wrapper and the russh client handler
//! - `auth`: Authentication strategies (password, key file)
//! - `client`: russh connect, retry and channel I/O
//! - `pool`: One live session per `host:port`, single in-flight connect
//! - `executor`: Run one command and classify its exit status
//! - `transfer`: Binary-safe file upload over an exec channel
//! - `shell`: Path segment validation, quoting and command builders
//! - `cache`: TTL cache, provisioning cooldown and introspection cache
//! - `context`: `RemoteStorage`, the context object handed to request handlers
//! - `provision`: Idempotent per-user directory provisioning
//! - `introspect`: Cached read-only filesystem queries

pub(crate) mod auth;
pub mod cache;
pub(crate) mod client;
pub mod config;
pub mod context;
pub mod directory;
pub mod error;
pub mod executor;
mod introspect;
pub mod pool;
mod provision;
pub mod session;
pub mod shell;
pub mod transfer;
pub mod transport;
pub mod types;

#[cfg(test)]
pub(crate) mod testing;

pub use client::RusshConnector;
pub use config::CoreConfig;
pub use context::RemoteStorage;
pub use directory::{HostDirectory, HostRecord, StaticHostDirectory};
pub use error::RemoteError;
pub use provision::{ProvisionOutcome, UserStructure};
pub use session::Session;
pub use transport::{Connector, Transport};
pub use types::{CommandOutput, FileInfo, FolderInfo, ServerEndpoint, ServerId, UploadReport};
