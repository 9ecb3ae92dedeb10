//! Private key file SSH authentication.

use std::path::PathBuf;
use std::sync::Arc;

use async_trait::async_trait;
use russh::{client, keys};
use tracing::debug;

use crate::remote::session::SessionHandler;

use super::traits::AuthStrategy;

/// Private key file authentication strategy.
///
/// Loads a passphrase-less private key and offers it to the server. The key
/// is read on every attempt, so a rotated key file is picked up by the next
/// connect without restarting.
pub struct KeyAuth {
    key_path: PathBuf,
}

impl KeyAuth {
    /// Create a key authentication strategy.
    ///
    /// # Arguments
    ///
    /// * `key_path` - Path to the private key file on the local machine
    pub fn new(key_path: impl Into<PathBuf>) -> Self {
        Self {
            key_path: key_path.into(),
        }
    }
}

#[async_trait]
impl AuthStrategy for KeyAuth {
    /// Offer the key for `username`, signing RSA keys with the best hash
    /// the server advertises.
    ///
    /// # Returns
    ///
    /// * `Ok(true)` - The server accepted the key
    /// * `Ok(false)` - The server rejected the key
    /// * `Err(message)` - The key file could not be loaded, or the exchange failed
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SessionHandler>,
        username: &str,
    ) -> Result<bool, String> {
        let key_pair = keys::load_secret_key(&self.key_path, None)
            .map_err(|e| format!("Failed to load private key from {:?}: {}", self.key_path, e))?;

        // RSA keys need the best hash the server supports
        let hash_alg = handle
            .best_supported_rsa_hash()
            .await
            .ok()
            .flatten()
            .flatten();
        debug!("Using RSA hash algorithm for key auth: {:?}", hash_alg);

        let key_with_hash = keys::PrivateKeyWithHashAlg::new(Arc::new(key_pair), hash_alg);

        let result = handle
            .authenticate_publickey(username, key_with_hash)
            .await
            .map_err(|e| format!("Key authentication failed: {}", e))?;

        Ok(result.success())
    }

    fn name(&self) -> &'static str {
        "key"
    }
}
