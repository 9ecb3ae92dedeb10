//! Error taxonomy for remote provisioning, plus connect-time retry
//! classification.
//!
//! [`RemoteError`] is what every public operation returns. It is `Clone`
//! because a single in-flight connect is awaited by every concurrent
//! acquirer of the same endpoint, and all of them observe the same result.
//!
//! # Retry classes
//!
//! | Variant | Retryable | Caller action |
//! |---------|-----------|---------------|
//! | `EndpointUnavailable` | no | operator must fix the host directory |
//! | `ConnectFailure` | yes | call again, a new connect is attempted |
//! | `SessionLost` | yes | call again, the dead session was evicted |
//! | `ChannelError` | yes | call again |
//! | `CommandFailed` | no | inspect `stderr` |
//! | `TransferFailed` | no | clean up partial local/remote state |
//! | `FolderCreationFailed` | no | reject the upload |
//! | `InvalidPathSegment` | no | reject the input |
//!
//! Connect attempts themselves are retried inside the client with backoff.
//! Whether a raw transport error message is worth another attempt is decided
//! by [`is_retryable_error`]: authentication failures never are, connection
//! level failures always are, and other SSH protocol errors are not.

use thiserror::Error;

use super::types::ServerId;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RemoteError {
    #[error("server {server_id} is unavailable: {reason}")]
    EndpointUnavailable { server_id: ServerId, reason: String },

    #[error("connect failed: {0}")]
    ConnectFailure(String),

    #[error("session lost: {0}")]
    SessionLost(String),

    #[error("command exited with status {exit_code}: {stderr}")]
    CommandFailed { exit_code: i32, stderr: String },

    #[error("channel error: {0}")]
    ChannelError(String),

    #[error("transfer failed: {0}")]
    TransferFailed(String),

    #[error("folder {path} still missing after creation")]
    FolderCreationFailed { path: String },

    #[error("invalid {kind} {value:?}: only letters, digits, '.', '_' and '-' are allowed")]
    InvalidPathSegment { kind: &'static str, value: String },
}

impl RemoteError {
    /// Whether re-acquiring a session and repeating the call can succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            RemoteError::ConnectFailure(_)
                | RemoteError::SessionLost(_)
                | RemoteError::ChannelError(_)
        )
    }
}

/// Authentication error patterns that indicate permanent failures.
///
/// Retrying these only risks locking out the shared privileged account.
const AUTH_ERRORS: &[&str] = &[
    "authentication failed",
    "password authentication failed",
    "key authentication failed",
    "authentication rejected",
    "permission denied",
    "publickey",
    "auth fail",
    "no authentication",
    "all authentication methods failed",
];

/// Connection error patterns that indicate transient failures.
const RETRYABLE_ERRORS: &[&str] = &[
    "connection refused",
    "connection reset",
    "connection timed out",
    "timed out",
    "timeout",
    "network is unreachable",
    "no route to host",
    "host is down",
    "temporary failure",
    "resource temporarily unavailable",
    "handshake failed",
    "failed to connect",
    "broken pipe",
];

/// Determines if a raw connect error message is worth another attempt.
///
/// Authentication patterns are checked first and win over connection
/// patterns. Messages matching neither list are retried unless they look
/// like an SSH protocol error without a timeout/connect hint.
pub(crate) fn is_retryable_error(error: &str) -> bool {
    let error_lower = error.to_lowercase();

    if AUTH_ERRORS.iter().any(|auth_err| error_lower.contains(auth_err)) {
        return false;
    }

    if RETRYABLE_ERRORS
        .iter()
        .any(|retryable_err| error_lower.contains(retryable_err))
    {
        return true;
    }

    !error_lower.contains("ssh")
        || error_lower.contains("timeout")
        || error_lower.contains("connect")
}

#[cfg(test)]
mod tests {
    use super::*;

    mod taxonomy {
        use super::*;

        #[test]
        fn test_transport_errors_are_retryable() {
            assert!(RemoteError::ConnectFailure("refused".into()).is_retryable());
            assert!(RemoteError::SessionLost("closed".into()).is_retryable());
            assert!(RemoteError::ChannelError("eof".into()).is_retryable());
        }

        #[test]
        fn test_permanent_errors_are_not_retryable() {
            let unavailable = RemoteError::EndpointUnavailable {
                server_id: 9,
                reason: "unknown server".into(),
            };
            assert!(!unavailable.is_retryable());
            assert!(
                !RemoteError::CommandFailed {
                    exit_code: 1,
                    stderr: String::new()
                }
                .is_retryable()
            );
            assert!(!RemoteError::TransferFailed("short write".into()).is_retryable());
            assert!(
                !RemoteError::FolderCreationFailed {
                    path: "/home/streaming/a/b".into()
                }
                .is_retryable()
            );
        }

        #[test]
        fn test_command_failed_message_carries_stderr() {
            let err = RemoteError::CommandFailed {
                exit_code: 2,
                stderr: "mkdir: cannot create directory".into(),
            };
            let message = err.to_string();
            assert!(message.contains("status 2"));
            assert!(message.contains("cannot create directory"));
        }
    }

    mod classification {
        use super::*;

        #[test]
        fn test_auth_failures_not_retryable() {
            assert!(!is_retryable_error("Authentication failed"));
            assert!(!is_retryable_error("Password authentication failed: denied"));
            assert!(!is_retryable_error("password authentication rejected"));
            assert!(!is_retryable_error("Permission denied (publickey,password)"));
        }

        #[test]
        fn test_connection_failures_retryable() {
            assert!(is_retryable_error("Connection refused"));
            assert!(is_retryable_error("Connection timed out after 30s"));
            assert!(is_retryable_error("Network is unreachable"));
            assert!(is_retryable_error("Failed to connect: broken pipe"));
        }

        #[test]
        fn test_auth_takes_precedence_over_connection() {
            assert!(!is_retryable_error(
                "Connection timeout during authentication failed"
            ));
        }

        #[test]
        fn test_ssh_protocol_error_not_retryable() {
            assert!(!is_retryable_error("SSH protocol error"));
            assert!(is_retryable_error("SSH connection timeout"));
        }

        #[test]
        fn test_unknown_error_retryable() {
            assert!(is_retryable_error("Something went wrong"));
            assert!(is_retryable_error(""));
        }
    }
}
