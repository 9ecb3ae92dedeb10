//! Authentication strategies for pooled SSH sessions.
//!
//! Each host in the directory carries one shared privileged account. Its
//! credential is either a password, a private key file, or both; the
//! strategies are chained in that order and the first success wins.
//!
//! - [`PasswordAuth`]: Password-based authentication
//! - [`KeyAuth`]: Private key file authentication

mod chain;
mod key;
mod password;
mod traits;

pub use chain::AuthChain;
pub use key::KeyAuth;
pub use password::PasswordAuth;
pub use traits::AuthStrategy;
