//! Command Executor: one shell line over an existing session.

use std::time::Duration;

use tracing::{debug, warn};

use super::error::RemoteError;
use super::session::Session;
use super::types::CommandOutput;

/// Run `command` on `session` and require a zero exit status.
///
/// The caller is responsible for quoting (see [`crate::remote::shell`]).
///
/// # Errors
///
/// * `CommandFailed` - non-zero exit, with the captured stderr
/// * `ChannelError` - transport fault mid-execution, or `timeout` elapsed
/// * `SessionLost` - the session died; re-acquire and retry
///
/// On timeout the remote command is not aborted, it may still complete.
pub async fn run(
    session: &Session,
    command: &str,
    timeout: Duration,
) -> Result<CommandOutput, RemoteError> {
    debug!("[{}] $ {}", session.key(), command);

    let output = tokio::time::timeout(timeout, session.transport().exec(command))
        .await
        .map_err(|_| {
            warn!("[{}] command timed out after {:?}: {}", session.key(), timeout, command);
            RemoteError::ChannelError(format!("command timed out after {:?}", timeout))
        })??;

    if !output.success() {
        return Err(RemoteError::CommandFailed {
            exit_code: output.exit_code,
            stderr: output.stderr.trim().to_string(),
        });
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::remote::testing::FakeHost;

    const TIMEOUT: Duration = Duration::from_secs(5);

    #[tokio::test]
    async fn test_false_yields_command_failed_with_exit_code_one() {
        let host = FakeHost::new();
        let session = host.session();

        let err = run(&session, "false", TIMEOUT).await.unwrap_err();
        assert_eq!(
            err,
            RemoteError::CommandFailed {
                exit_code: 1,
                stderr: String::new()
            }
        );
    }

    #[tokio::test]
    async fn test_success_returns_stdout() {
        let host = FakeHost::new();
        host.add_dir("/home/streaming/alice");
        let session = host.session();

        let output = run(&session, "test -d '/home/streaming/alice' && echo 1 || echo 0", TIMEOUT)
            .await
            .unwrap();
        assert_eq!(output.stdout.trim(), "1");
        assert_eq!(output.exit_code, 0);
    }

    #[tokio::test]
    async fn test_stderr_is_trimmed_into_error() {
        let host = FakeHost::new();
        host.fail_on("chown", 1, "chown: operation not permitted\n");
        let session = host.session();

        let err = run(&session, "chown -R 'a:a' '/x'", TIMEOUT).await.unwrap_err();
        match err {
            RemoteError::CommandFailed { exit_code, stderr } => {
                assert_eq!(exit_code, 1);
                assert_eq!(stderr, "chown: operation not permitted");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_dead_transport_is_session_lost() {
        let host = FakeHost::new();
        let session = host.session();
        host.kill_transports();

        let err = run(&session, "echo 1", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, RemoteError::SessionLost(_)));
        assert!(err.is_retryable());
    }

    #[tokio::test(start_paused = true)]
    async fn test_slow_command_times_out_as_channel_error() {
        let host = FakeHost::new();
        host.set_exec_delay(Duration::from_secs(60));
        let session = host.session();

        let err = run(&session, "echo 1", TIMEOUT).await.unwrap_err();
        assert!(matches!(err, RemoteError::ChannelError(_)));
    }
}
