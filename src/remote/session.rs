//! Pooled SSH sessions.
//!
//! # Architecture
//!
//! - `Session`: a live transport bound to one [`ServerEndpoint`], plus the
//!   metadata used in logs. Owned by the pool; callers get an `Arc` for the
//!   duration of one operation and must not keep it beyond that.
//! - `SessionHandler`: the russh client handler. Fleet hosts are provisioned
//!   by the platform operators, so every host key is accepted (similar to
//!   `StrictHostKeyChecking=no` in OpenSSH). It also fires the transport's
//!   lost signal when the connection ends.
//!
//! # Lifecycle
//!
//! `Absent -> Connecting -> Ready -> {Closed | Lost}`. `Connecting` is
//! tracked by the pool; a `Session` value only exists once `Ready`. `Lost`
//! is observed through [`Session::is_alive`], `Closed` through
//! [`Session::close`]. Both are terminal and both cancel
//! [`Session::lost_signal`], which the pool watches to evict the session
//! as soon as the connection ends.

use std::fmt;
use std::sync::Arc;

use russh::{client, keys};
use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::debug;
use uuid::Uuid;

use super::transport::Transport;
use super::types::ServerEndpoint;

/// Client handler for russh that accepts all host keys.
pub struct SessionHandler {
    lost: CancellationToken,
}

impl SessionHandler {
    /// # Arguments
    ///
    /// * `lost` - Cancelled once russh reports the connection ended
    pub fn new(lost: CancellationToken) -> Self {
        Self { lost }
    }
}

impl client::Handler for SessionHandler {
    type Error = russh::Error;

    async fn check_server_key(
        &mut self,
        server_public_key: &keys::PublicKey,
    ) -> Result<bool, Self::Error> {
        debug!(
            "Accepting host key {}",
            server_public_key.fingerprint(Default::default())
        );
        Ok(true)
    }

    async fn disconnected(
        &mut self,
        reason: client::DisconnectReason<Self::Error>,
    ) -> Result<(), Self::Error> {
        self.lost.cancel();
        match reason {
            client::DisconnectReason::ReceivedDisconnect(info) => {
                debug!("Server closed the connection: {:?}", info);
                Ok(())
            }
            client::DisconnectReason::Error(e) => {
                debug!("Connection dropped: {}", e);
                Err(e)
            }
        }
    }
}

/// Session metadata for logs and operator tooling
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionInfo {
    pub session_id: String,
    /// `host:port` pool key
    pub endpoint: String,
    pub username: String,
    /// RFC3339 timestamp of the completed handshake
    pub connected_at: String,
}

/// A live authenticated connection bound to one endpoint.
pub struct Session {
    info: SessionInfo,
    transport: Arc<dyn Transport>,
}

impl Session {
    pub fn new(endpoint: &ServerEndpoint, transport: Arc<dyn Transport>) -> Self {
        Self {
            info: SessionInfo {
                session_id: Uuid::new_v4().to_string(),
                endpoint: endpoint.key(),
                username: endpoint.username.clone(),
                connected_at: chrono::Utc::now().to_rfc3339(),
            },
            transport,
        }
    }

    pub fn info(&self) -> &SessionInfo {
        &self.info
    }

    pub fn id(&self) -> &str {
        &self.info.session_id
    }

    /// Pool key (`host:port`) of the endpoint this session is bound to.
    pub fn key(&self) -> &str {
        &self.info.endpoint
    }

    pub fn transport(&self) -> &Arc<dyn Transport> {
        &self.transport
    }

    pub fn is_alive(&self) -> bool {
        self.transport.is_alive()
    }

    /// Cancelled once the connection is closed or lost.
    pub fn lost_signal(&self) -> CancellationToken {
        self.transport.lost_signal()
    }

    pub async fn close(&self) {
        debug!("Closing session {} to {}", self.info.session_id, self.info.endpoint);
        self.transport.close().await;
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("info", &self.info)
            .field("alive", &self.is_alive())
            .finish()
    }
}
