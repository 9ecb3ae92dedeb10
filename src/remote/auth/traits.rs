//! Authentication strategy trait definition.
//!
//! Every connector authenticates through this trait, so the pool never
//! needs to know which credential a host uses.

use async_trait::async_trait;
use russh::client;

use crate::remote::session::SessionHandler;

/// Trait for SSH authentication strategies.
///
/// Implementations must be thread-safe (`Send + Sync`); a connector may
/// authenticate several endpoints concurrently.
#[async_trait]
pub trait AuthStrategy: Send + Sync {
    /// Attempt to authenticate with the SSH server.
    ///
    /// # Arguments
    ///
    /// * `handle` - Handshaken client handle, not yet authenticated
    /// * `username` - The host's shared account name
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - Authentication succeeded
    /// * `Ok(false)` - Credentials rejected
    /// * `Err(message)` - Error during the attempt
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SessionHandler>,
        username: &str,
    ) -> Result<bool, String>;

    /// Strategy name.
    ///
    /// Used in logs and in the error returned when every strategy fails.
    fn name(&self) -> &'static str;
}
