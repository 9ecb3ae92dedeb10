//! Password-based SSH authentication.

use async_trait::async_trait;
use russh::client;

use crate::remote::session::SessionHandler;

use super::traits::AuthStrategy;

/// Password authentication strategy.
///
/// Authenticates with the host's shared account password.
pub struct PasswordAuth {
    password: String,
}

impl PasswordAuth {
    /// Create a password authentication strategy.
    ///
    /// # Arguments
    ///
    /// * `password` - Password of the host's shared account
    pub fn new(password: impl Into<String>) -> Self {
        Self {
            password: password.into(),
        }
    }
}

#[async_trait]
impl AuthStrategy for PasswordAuth {
    /// # Returns
    ///
    /// * `Ok(true)` - The server accepted the password
    /// * `Ok(false)` - The server rejected the password
    /// * `Err(message)` - The exchange itself failed
    async fn authenticate(
        &self,
        handle: &mut client::Handle<SessionHandler>,
        username: &str,
    ) -> Result<bool, String> {
        let result = handle
            .authenticate_password(username, &self.password)
            .await
            .map_err(|e| format!("Password authentication failed: {}", e))?;

        Ok(result.success())
    }

    fn name(&self) -> &'static str {
        "password"
    }
}
