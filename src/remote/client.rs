//! russh-backed [`Connector`] and [`Transport`].
//!
//! ## Connection Lifecycle
//!
//! 1. **Client Configuration**: keepalive and compression settings, no
//!    inactivity timeout (pooled sessions live until they die or the pool is
//!    shut down).
//! 2. **Connection Establishment**: TCP connect + SSH handshake bounded by the
//!    connect timeout.
//! 3. **Authentication**: the endpoint's [`AuthChain`] (password, then key).
//! 4. **Channels**: every command opens its own session channel, so one
//!    transport serves any number of concurrent commands.
//!
//! ## Retry Strategy
//!
//! Connect attempts use exponential backoff with jitter via `backon`,
//! starting at the configured retry delay and capped at [`MAX_RETRY_DELAY`].
//! Authentication failures are never retried.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use backon::{ExponentialBuilder, Retryable};
use russh::{ChannelMsg, Disconnect, client};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::auth::{AuthChain, AuthStrategy};
use super::config::{CoreConfig, MAX_RETRY_DELAY};
use super::error::{RemoteError, is_retryable_error};
use super::session::SessionHandler;
use super::transport::{Connector, InputStream, Transport};
use super::types::{CommandOutput, ServerEndpoint};

/// Connection settings taken from [`CoreConfig`].
#[derive(Debug, Clone)]
pub struct ConnectSettings {
    pub connect_timeout: Duration,
    pub max_retries: u32,
    pub retry_delay: Duration,
    pub keepalive_interval: Duration,
    pub compression: bool,
}

impl From<&CoreConfig> for ConnectSettings {
    fn from(config: &CoreConfig) -> Self {
        Self {
            connect_timeout: config.connect_timeout,
            max_retries: config.max_retries,
            retry_delay: config.retry_delay,
            keepalive_interval: config.keepalive_interval,
            compression: config.compression,
        }
    }
}

/// Build russh client configuration.
///
/// Keepalives are sent every `keepalive_interval`; three unanswered ones
/// close the transport, which the pool then observes as a dead session.
pub(crate) fn build_client_config(
    keepalive_interval: Duration,
    compress: bool,
) -> Arc<client::Config> {
    let compression = if compress {
        (&[russh::compression::ZLIB, russh::compression::NONE][..]).into()
    } else {
        (&[russh::compression::NONE][..]).into()
    };

    let preferred = russh::Preferred {
        compression,
        ..Default::default()
    };

    Arc::new(client::Config {
        inactivity_timeout: None,
        // Zero disables keepalives rather than spinning
        keepalive_interval: (!keepalive_interval.is_zero()).then_some(keepalive_interval),
        keepalive_max: 3,
        preferred,
        ..Default::default()
    })
}

/// Opens pooled sessions with russh.
pub struct RusshConnector {
    settings: ConnectSettings,
}

impl RusshConnector {
    pub fn new(config: &CoreConfig) -> Self {
        Self {
            settings: ConnectSettings::from(config),
        }
    }
}

#[async_trait]
impl Connector for RusshConnector {
    async fn connect(&self, endpoint: &ServerEndpoint) -> Result<Arc<dyn Transport>, RemoteError> {
        let (handle, lost) = connect_with_retry(endpoint, &self.settings)
            .await
            .map_err(RemoteError::ConnectFailure)?;
        Ok(Arc::new(RusshTransport::new(handle, lost)))
    }
}

/// Connect with exponential backoff on transient errors.
async fn connect_with_retry(
    endpoint: &ServerEndpoint,
    settings: &ConnectSettings,
) -> Result<(client::Handle<SessionHandler>, CancellationToken), String> {
    let attempt_counter = AtomicU32::new(0);
    let target = format!("{}@{}", endpoint.username, endpoint.key());

    let backoff = ExponentialBuilder::default()
        .with_min_delay(settings.retry_delay)
        .with_max_delay(MAX_RETRY_DELAY)
        .with_max_times(settings.max_retries as usize)
        .with_jitter();

    let result = (|| async {
        let current_attempt = attempt_counter.fetch_add(1, Ordering::SeqCst);
        if current_attempt > 0 {
            warn!("SSH connection retry attempt {} to {}", current_attempt, target);
        }
        connect_once(endpoint, settings).await
    })
    .retry(backoff)
    .when(|e| {
        let retryable = is_retryable_error(e);
        if !retryable {
            warn!("SSH connection to {} failed with non-retryable error: {}", target, e);
        }
        retryable
    })
    .notify(|err, dur| {
        warn!("SSH connection to {} failed: {}. Retrying in {:?}", target, err, dur);
    })
    .await;

    let total_attempts = attempt_counter.load(Ordering::SeqCst);

    match result {
        Ok(handle) => {
            info!(
                "SSH connection to {} established after {} attempt(s)",
                target, total_attempts
            );
            Ok(handle)
        }
        Err(e) => {
            error!(
                "SSH connection to {} failed after {} attempt(s). Last error: {}",
                target, total_attempts, e
            );
            Err(format!(
                "{} unreachable after {} attempt(s): {}",
                target, total_attempts, e
            ))
        }
    }
}

/// One handshake + authentication, bounded by the connect timeout.
///
/// Returns the handle together with the token its handler cancels when the
/// connection ends.
async fn connect_once(
    endpoint: &ServerEndpoint,
    settings: &ConnectSettings,
) -> Result<(client::Handle<SessionHandler>, CancellationToken), String> {
    let config = build_client_config(settings.keepalive_interval, settings.compression);
    let lost = CancellationToken::new();

    let connect_future = client::connect(
        config,
        (endpoint.host.as_str(), endpoint.port),
        SessionHandler::new(lost.clone()),
    );

    let mut handle = tokio::time::timeout(settings.connect_timeout, connect_future)
        .await
        .map_err(|_| format!("Connection timed out after {:?}", settings.connect_timeout))?
        .map_err(|e| format!("Failed to connect: {}", e))?;

    let auth_chain = AuthChain::for_endpoint(endpoint);
    let success = auth_chain.authenticate(&mut handle, &endpoint.username).await?;

    if !success {
        return Err("Authentication failed: no authentication methods succeeded".to_string());
    }

    Ok((handle, lost))
}

/// A russh client handle shared by every channel opened on it.
pub struct RusshTransport {
    handle: client::Handle<SessionHandler>,
    lost: CancellationToken,
}

impl RusshTransport {
    fn new(handle: client::Handle<SessionHandler>, lost: CancellationToken) -> Self {
        Self { handle, lost }
    }

    /// Classify a russh error: if the connection task is gone the session is
    /// lost for good, otherwise only this channel failed.
    fn fault(&self, context: &str, e: russh::Error) -> RemoteError {
        if self.handle.is_closed() {
            self.lost.cancel();
            RemoteError::SessionLost(format!("{}: {}", context, e))
        } else {
            RemoteError::ChannelError(format!("{}: {}", context, e))
        }
    }

    async fn open_and_exec(
        &self,
        command: &str,
    ) -> Result<russh::Channel<client::Msg>, RemoteError> {
        let channel = self
            .handle
            .channel_open_session()
            .await
            .map_err(|e| self.fault("Failed to open channel", e))?;

        channel
            .exec(true, command)
            .await
            .map_err(|e| self.fault("Failed to execute command", e))?;

        Ok(channel)
    }

    /// Read channel messages until the remote side closes the channel.
    async fn collect_output(
        &self,
        channel: &mut russh::Channel<client::Msg>,
    ) -> Result<CommandOutput, RemoteError> {
        let mut stdout = Vec::with_capacity(4096);
        let mut stderr = Vec::with_capacity(1024);
        let mut exit_code: Option<u32> = None;

        loop {
            match channel.wait().await {
                Some(ChannelMsg::Data { data }) => {
                    stdout.extend_from_slice(&data);
                }
                Some(ChannelMsg::ExtendedData { data, ext }) => {
                    // ext == 1 is stderr in SSH protocol
                    if ext == 1 {
                        stderr.extend_from_slice(&data);
                    }
                }
                Some(ChannelMsg::ExitStatus { exit_status }) => {
                    exit_code = Some(exit_status);
                }
                Some(ChannelMsg::Eof) => {
                    if exit_code.is_some() {
                        break;
                    }
                }
                Some(ChannelMsg::Close) | None => {
                    break;
                }
                Some(_) => {}
            }
        }

        let _ = channel.close().await;

        if exit_code.is_none() && self.handle.is_closed() {
            self.lost.cancel();
            return Err(RemoteError::SessionLost(
                "connection closed before the command reported an exit status".to_string(),
            ));
        }

        Ok(CommandOutput {
            stdout: String::from_utf8_lossy(&stdout).into_owned(),
            stderr: String::from_utf8_lossy(&stderr).into_owned(),
            exit_code: exit_code.map(|c| c as i32).unwrap_or(-1),
        })
    }
}

#[async_trait]
impl Transport for RusshTransport {
    async fn exec(&self, command: &str) -> Result<CommandOutput, RemoteError> {
        let mut channel = self.open_and_exec(command).await?;
        self.collect_output(&mut channel).await
    }

    async fn exec_with_input(
        &self,
        command: &str,
        input: InputStream,
    ) -> Result<CommandOutput, RemoteError> {
        let mut channel = self.open_and_exec(command).await?;

        if let Err(e) = channel.data(input).await {
            let _ = channel.close().await;
            return Err(self.fault("Failed to stream input", e));
        }
        channel
            .eof()
            .await
            .map_err(|e| self.fault("Failed to send EOF", e))?;

        self.collect_output(&mut channel).await
    }

    fn is_alive(&self) -> bool {
        !self.lost.is_cancelled() && !self.handle.is_closed()
    }

    fn lost_signal(&self) -> CancellationToken {
        self.lost.clone()
    }

    async fn close(&self) {
        if self.lost.is_cancelled() {
            return;
        }
        self.lost.cancel();
        if let Err(e) = self
            .handle
            .disconnect(Disconnect::ByApplication, "session closed", "en")
            .await
        {
            debug!("Disconnect failed (session already gone?): {}", e);
        }
    }
}
