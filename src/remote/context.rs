//! `RemoteStorage`: the context object every request handler shares.
//!
//! Constructed once at process start, handed to handlers behind an `Arc`,
//! and shut down on exit. It owns the three pieces of shared mutable state
//! (session pool, cooldown, introspection cache) and the janitor that sweeps
//! them.
//!
//! Provisioning operations live in `provision`, read-only queries in
//! `introspect`; both are `impl RemoteStorage` blocks.

use std::path::Path;
use std::sync::{Arc, Weak};
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::cache::{Cooldown, IntrospectionCache};
use super::client::RusshConnector;
use super::config::CoreConfig;
use super::directory::HostDirectory;
use super::error::RemoteError;
use super::executor;
use super::pool::ConnectionPool;
use super::session::Session;
use super::shell::{is_safe_remote_path, parent_dir, remove_command};
use super::transfer;
use super::transport::Connector;
use super::types::{CommandOutput, ServerId, UploadReport};

/// `tokio::time::interval` rejects a zero period.
const MIN_JANITOR_INTERVAL: Duration = Duration::from_secs(1);

/// Entries removed by one janitor pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub cooldown: usize,
    pub introspection: usize,
    pub sessions: usize,
}

pub struct RemoteStorage {
    pub(crate) config: CoreConfig,
    pub(crate) pool: ConnectionPool,
    pub(crate) cooldown: Cooldown,
    pub(crate) introspection: IntrospectionCache,
    shutdown: CancellationToken,
}

impl RemoteStorage {
    pub fn new(
        config: CoreConfig,
        directory: Arc<dyn HostDirectory>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        Self {
            pool: ConnectionPool::new(directory, connector),
            cooldown: Cooldown::new(config.cooldown),
            introspection: IntrospectionCache::new(config.exists_ttl, config.folder_info_ttl),
            shutdown: CancellationToken::new(),
            config,
        }
    }

    /// Production wiring: russh sessions to hosts from `directory`.
    pub fn with_russh(config: CoreConfig, directory: Arc<dyn HostDirectory>) -> Self {
        let connector = Arc::new(RusshConnector::new(&config));
        Self::new(config, directory, connector)
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }

    /// `<base>/<login>`; `login` must already be validated.
    pub(crate) fn user_path(&self, login: &str) -> String {
        format!("{}/{}", self.config.base_dir, login)
    }

    /// `<base>/<login>/<folder>`; both segments must already be validated.
    pub(crate) fn folder_path(&self, login: &str, folder: &str) -> String {
        format!("{}/{}/{}", self.config.base_dir, login, folder)
    }

    pub async fn acquire(&self, server_id: ServerId) -> Result<Arc<Session>, RemoteError> {
        self.pool.acquire(server_id).await
    }

    /// Run one command on a borrowed session. A session found dead after a
    /// failure is evicted, so the caller's retry reconnects.
    pub async fn run(&self, session: &Session, command: &str) -> Result<CommandOutput, RemoteError> {
        let result = executor::run(session, command, self.config.command_timeout).await;
        if result.is_err() {
            self.evict_if_dead(session);
        }
        result
    }

    /// Acquire a session for `server_id` and run one command on it.
    pub async fn run_on(&self, server_id: ServerId, command: &str) -> Result<CommandOutput, RemoteError> {
        let session = self.acquire(server_id).await?;
        self.run(&session, command).await
    }

    /// Upload over a borrowed session.
    pub async fn upload(
        &self,
        session: &Session,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<UploadReport, RemoteError> {
        let result = transfer::upload(
            session,
            local_path,
            remote_path,
            &self.config.file_mode,
            self.config.command_timeout,
        )
        .await;
        if result.is_err() {
            self.evict_if_dead(session);
        }
        result
    }

    /// Acquire, upload, and drop cached answers about the destination so an
    /// immediate existence or size check sees the new file.
    pub async fn upload_to(
        &self,
        server_id: ServerId,
        local_path: &Path,
        remote_path: &str,
    ) -> Result<UploadReport, RemoteError> {
        if !is_safe_remote_path(remote_path) {
            return Err(RemoteError::TransferFailed(format!(
                "refusing unsafe destination {:?}",
                remote_path
            )));
        }

        let session = self.acquire(server_id).await?;
        let report = self.upload(&session, local_path, remote_path).await;
        self.invalidate_with_ancestors(server_id, remote_path);
        report
    }

    /// Best-effort removal of a remote file during a deletion flow.
    ///
    /// Never fails: the database record is the durability boundary, so a
    /// remote leftover is logged and reported as `false`.
    pub async fn remove_file(&self, server_id: ServerId, remote_path: &str) -> bool {
        if !is_safe_remote_path(remote_path) {
            warn!("Refusing to remove unsafe path {:?} on server {}", remote_path, server_id);
            return false;
        }

        let removed = match self.run_on(server_id, &remove_command(remote_path)).await {
            Ok(_) => true,
            Err(e) => {
                warn!("Removing {} on server {} failed: {}", remote_path, server_id, e);
                false
            }
        };
        self.invalidate_with_ancestors(server_id, remote_path);
        removed
    }

    /// Drop cached introspection answers about `path`.
    pub fn invalidate(&self, server_id: ServerId, path: &str) {
        self.introspection.invalidate(server_id, path);
    }

    /// Drop cached answers for `path` and every directory above it, since
    /// `mkdir -p` may have created any of them. Stops at the base directory
    /// for paths below it, otherwise walks up to `/`.
    pub(crate) fn invalidate_with_ancestors(&self, server_id: ServerId, path: &str) {
        self.invalidate(server_id, path);

        let base = self.config.base_dir.as_str();
        let below_base = path.starts_with(base) && path[base.len()..].starts_with('/');
        let mut current = path;
        while let Some(parent) = parent_dir(current) {
            self.invalidate(server_id, parent);
            if below_base && parent.len() <= base.len() {
                break;
            }
            current = parent;
        }
    }

    fn evict_if_dead(&self, session: &Session) {
        if !session.is_alive() {
            self.pool.evict(session);
        }
    }

    /// One janitor pass over both caches and the pool.
    pub fn sweep(&self) -> SweepReport {
        let report = SweepReport {
            cooldown: self.cooldown.sweep(),
            introspection: self.introspection.sweep(),
            sessions: self.pool.sweep_dead(),
        };
        if report != SweepReport::default() {
            debug!("Janitor sweep: {:?}", report);
        }
        report
    }

    /// Spawn the periodic janitor. It stops on [`RemoteStorage::shutdown`]
    /// or once the storage is dropped.
    pub fn start_janitor(self: &Arc<Self>) -> JoinHandle<()> {
        let storage: Weak<Self> = Arc::downgrade(self);
        let shutdown = self.shutdown.clone();
        let period = self.config.janitor_interval.max(MIN_JANITOR_INTERVAL);

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(period);
            // The first tick completes immediately
            interval.tick().await;

            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => break,
                    _ = interval.tick() => {
                        match storage.upgrade() {
                            Some(storage) => {
                                storage.sweep();
                            }
                            None => break,
                        }
                    }
                }
            }
            debug!("Janitor stopped");
        })
    }

    /// Stop the janitor and close every pooled session.
    pub async fn shutdown(&self) {
        info!("Shutting down remote storage");
        self.shutdown.cancel();
        self.pool.close_all().await;
    }
}
