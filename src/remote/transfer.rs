//! File Transfer: stream a local file to a remote path over the session.
//!
//! The bytes travel over the stdin of a `cat > path` exec channel, which is
//! binary-safe and multiplexed over the same session as every other command.

use std::path::Path;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::error::RemoteError;
use super::executor::run;
use super::session::Session;
use super::shell::{chmod_command, mkdir_command, parent_dir, upload_command};
use super::types::UploadReport;

/// Upload `local_path` to `remote_path` and apply `file_mode`.
///
/// 1. Open the local file; nothing touches the host if that fails
/// 2. Best-effort `mkdir -p` of the remote parent (failures are logged;
///    the stream step fails on its own if the directory really is missing)
/// 3. Stream the file through the channel, EOF, wait for the exit status
/// 4. Best-effort `chmod` (failure is logged, reported in the result)
///
/// `command_timeout` bounds the two bookkeeping commands only; the byte
/// stream runs until it completes or the transport fails.
///
/// # Errors
///
/// * `TransferFailed` - the local file cannot be read, or the stream or the
///   remote write did not complete. The remote file may be partial.
pub async fn upload(
    session: &Session,
    local_path: &Path,
    remote_path: &str,
    file_mode: &str,
    command_timeout: Duration,
) -> Result<UploadReport, RemoteError> {
    let file = tokio::fs::File::open(local_path).await.map_err(|e| {
        RemoteError::TransferFailed(format!("cannot open {}: {}", local_path.display(), e))
    })?;
    let bytes = file
        .metadata()
        .await
        .map_err(|e| {
            RemoteError::TransferFailed(format!("cannot stat {}: {}", local_path.display(), e))
        })?
        .len();

    if let Some(parent) = parent_dir(remote_path)
        && let Err(e) = run(session, &mkdir_command(&[parent]), command_timeout).await
    {
        debug!("[{}] mkdir of {} before upload failed: {}", session.key(), parent, e);
    }

    let output = session
        .transport()
        .exec_with_input(&upload_command(remote_path), Box::new(file))
        .await
        .map_err(|e| RemoteError::TransferFailed(format!("stream to {} failed: {}", remote_path, e)))?;

    if !output.success() {
        return Err(RemoteError::TransferFailed(format!(
            "remote write to {} exited with status {}: {}",
            remote_path,
            output.exit_code,
            output.stderr.trim()
        )));
    }

    let permissions_applied =
        match run(session, &chmod_command(file_mode, remote_path, false), command_timeout).await {
            Ok(_) => true,
            Err(e) => {
                warn!("[{}] chmod {} {} failed: {}", session.key(), file_mode, remote_path, e);
                false
            }
        };

    info!(
        "[{}] Uploaded {} ({} bytes) to {}",
        session.key(),
        local_path.display(),
        bytes,
        remote_path
    );

    Ok(UploadReport {
        remote_path: remote_path.to_string(),
        bytes,
        permissions_applied,
    })
}
