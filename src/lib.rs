#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

//! Pooled SSH provisioning and filesystem introspection for media-server hosts.
//!
//! The [`remote`] module owns everything: the connection pool, command
//! execution, file transfer, per-user directory provisioning and the caches
//! that keep repeated work off the network.

pub mod remote;

pub use remote::{CoreConfig, RemoteError, RemoteStorage};
