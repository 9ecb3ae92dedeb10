//! Authentication chain for trying multiple strategies.

use std::path::PathBuf;

use async_trait::async_trait;
use russh::client;
use tracing::debug;

use crate::remote::session::SessionHandler;
use crate::remote::types::ServerEndpoint;

use super::traits::AuthStrategy;
use super::{KeyAuth, PasswordAuth};

/// Tries strategies in insertion order; the first success stops the chain.
pub struct AuthChain {
    strategies: Vec<Box<dyn AuthStrategy>>,
}

impl AuthChain {
    /// Create an empty chain.
    pub fn new() -> Self {
        Self {
            strategies: Vec::new(),
        }
    }

    /// Chain for an endpoint's credentials: password first, then key file.
    pub fn for_endpoint(endpoint: &ServerEndpoint) -> Self {
        let mut chain = Self::new();
        if let Some(password) = &endpoint.password {
            chain = chain.with_password(password.clone());
        }
        if let Some(key_path) = &endpoint.key_path {
            chain = chain.with_key(key_path.clone());
        }
        chain
    }

    /// Add password authentication to the chain.
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.strategies.push(Box::new(PasswordAuth::new(password)));
        self
    }

    /// Add key file authentication to the chain.
    pub fn with_key(mut self, key_path: impl Into<PathBuf>) -> Self {
        self.strategies.push(Box::new(KeyAuth::new(key_path)));
        self
    }

    /// Check if the chain has any authentication strategies.
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }

    #[cfg(test)]
    pub fn len(&self) -> usize {
        self.strategies.len()
    }
}

impl Default for AuthChain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuthStrategy for AuthChain {
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SessionHandler>,
        username: &str,
    ) -> Result<bool, String> {
        if self.strategies.is_empty() {
            return Err("No authentication methods configured for host".to_string());
        }

        let mut last_error = None;

        for strategy in &self.strategies {
            debug!("Trying authentication strategy: {}", strategy.name());

            match strategy.authenticate(handle, username).await {
                Ok(true) => {
                    debug!("Authentication succeeded with strategy: {}", strategy.name());
                    return Ok(true);
                }
                Ok(false) => {
                    last_error = Some(format!("{} authentication rejected", strategy.name()));
                }
                Err(e) => {
                    debug!("Authentication error with strategy {}: {}", strategy.name(), e);
                    last_error = Some(e);
                }
            }
        }

        Err(last_error.unwrap_or_else(|| "All authentication methods failed".to_string()))
    }

    fn name(&self) -> &'static str {
        "chain"
    }
}
