//! Transport seams between the pool and the SSH client.
//!
//! The pool only knows how to ask a [`Connector`] for a [`Transport`] and how
//! to ask a transport whether it is still alive. The russh implementation
//! lives in `client`; tests plug in an in-memory host.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::io::AsyncRead;
use tokio_util::sync::CancellationToken;

use super::error::RemoteError;
use super::types::{CommandOutput, ServerEndpoint};

/// Byte source streamed to a remote command's stdin.
pub type InputStream = Box<dyn AsyncRead + Send + Unpin>;

/// A live, authenticated, multiplexed connection to one endpoint.
///
/// Every call opens its own channel, so any number of commands may run
/// concurrently over one transport.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Run a shell line and collect its output. A non-zero exit status is
    /// *not* an error at this level.
    ///
    /// # Errors
    ///
    /// * `SessionLost` when the underlying connection is gone
    /// * `ChannelError` for any other fault mid-execution
    async fn exec(&self, command: &str) -> Result<CommandOutput, RemoteError>;

    /// Like [`Transport::exec`], streaming `input` to the command's stdin
    /// and sending EOF once it is exhausted.
    async fn exec_with_input(
        &self,
        command: &str,
        input: InputStream,
    ) -> Result<CommandOutput, RemoteError>;

    /// Cheap liveness check, no network round trip.
    fn is_alive(&self) -> bool;

    /// Token cancelled when the connection ends, whether closed locally,
    /// dropped by the server or lost to a network fault. A silently dead
    /// connection is only seen through [`Transport::is_alive`].
    fn lost_signal(&self) -> CancellationToken;

    /// Tear the connection down. Idempotent.
    async fn close(&self);
}

/// Performs one handshake + authentication against an endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    /// # Errors
    ///
    /// * `ConnectFailure` when the handshake fails, times out, or
    ///   authentication is rejected
    async fn connect(&self, endpoint: &ServerEndpoint) -> Result<Arc<dyn Transport>, RemoteError>;
}
