//! Provisioning: per-user directory structure on a media host.
//!
//! Every operation follows the same shape: validate the path segments,
//! consult the cooldown, check existence, create what is missing, apply
//! ownership best-effort, and mark the key done only once the operation has
//! really succeeded.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::context::RemoteStorage;
use super::error::RemoteError;
use super::session::Session;
use super::shell::{chmod_command, chown_command, mkdir_command, validate_segment};
use super::types::{OperationKey, OperationKind, ServerId};

/// How a provisioning call was satisfied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProvisionOutcome {
    /// Completed recently; success assumed without touching the host
    AssumedFromCooldown,
    /// Already present on the host, nothing created
    AlreadyPresent,
    Created,
}

impl ProvisionOutcome {
    fn merge(self, other: ProvisionOutcome) -> ProvisionOutcome {
        if self == ProvisionOutcome::Created || other == ProvisionOutcome::Created {
            ProvisionOutcome::Created
        } else {
            ProvisionOutcome::AlreadyPresent
        }
    }
}

/// What `ensure_complete_user_structure` provisions beyond the base
/// directory and its fixed subdirectories.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserStructure {
    #[serde(default)]
    pub folders: Vec<String>,
}

impl UserStructure {
    pub fn with_folder(mut self, folder: impl Into<String>) -> Self {
        self.folders.push(folder.into());
        self
    }
}

impl RemoteStorage {
    /// Make sure `<base>/<login>` and its fixed subdirectories exist.
    ///
    /// # Errors
    ///
    /// * `InvalidPathSegment` - `login` failed validation (no network I/O)
    /// * `EndpointUnavailable` / `ConnectFailure` - from acquiring the session
    /// * `CommandFailed` / `SessionLost` / `ChannelError` - the `mkdir` failed
    ///
    /// `chown`/`chmod` failures are logged and never returned.
    pub async fn ensure_user_directory(
        &self,
        server_id: ServerId,
        login: &str,
    ) -> Result<ProvisionOutcome, RemoteError> {
        let login = validate_segment("user login", login)?;
        let key = OperationKey::new(OperationKind::EnsureUserDirectory, server_id, login);
        if self.cooldown.should_skip(&key) {
            return Ok(ProvisionOutcome::AssumedFromCooldown);
        }

        let user_path = self.user_path(login);
        let session = self.acquire(server_id).await?;

        if self.query_directory(&session, &user_path).await {
            debug!("[{}] {} already exists", session.key(), user_path);
            self.introspection.put_exists(server_id, &user_path, true);
            self.cooldown.mark_done(&key);
            return Ok(ProvisionOutcome::AlreadyPresent);
        }

        let mut targets = vec![user_path.clone()];
        targets.extend(
            self.config
                .user_subdirs
                .iter()
                .map(|subdir| format!("{}/{}", user_path, subdir)),
        );
        self.run(&session, &mkdir_command(&targets)).await?;
        self.apply_ownership(&session, &user_path).await;

        for path in &targets {
            self.invalidate(server_id, path);
            self.introspection.put_exists(server_id, path, true);
        }
        self.cooldown.mark_done(&key);

        info!("[{}] Created user directory {}", session.key(), user_path);
        Ok(ProvisionOutcome::Created)
    }

    /// Make sure `<base>/<login>/<folder>` exists.
    ///
    /// Creation is best-effort, but the folder is verified afterwards: the
    /// upload that follows depends on it.
    ///
    /// # Errors
    ///
    /// * `InvalidPathSegment` - `login` or `folder` failed validation
    /// * `EndpointUnavailable` / `ConnectFailure` - from acquiring the session
    /// * `FolderCreationFailed` - the folder is still absent after `mkdir`
    pub async fn ensure_user_folder(
        &self,
        server_id: ServerId,
        login: &str,
        folder: &str,
    ) -> Result<ProvisionOutcome, RemoteError> {
        let login = validate_segment("user login", login)?;
        let folder = validate_segment("folder name", folder)?;
        let key = OperationKey::new(
            OperationKind::EnsureUserFolder,
            server_id,
            &format!("{}/{}", login, folder),
        );
        if self.cooldown.should_skip(&key) {
            return Ok(ProvisionOutcome::AssumedFromCooldown);
        }

        let path = self.folder_path(login, folder);
        let session = self.acquire(server_id).await?;

        if self.query_directory(&session, &path).await {
            debug!("[{}] {} already exists", session.key(), path);
            self.introspection.put_exists(server_id, &path, true);
            self.cooldown.mark_done(&key);
            return Ok(ProvisionOutcome::AlreadyPresent);
        }

        if let Err(e) = self.run(&session, &mkdir_command(&[path.as_str()])).await {
            warn!("[{}] mkdir {} failed: {}", session.key(), path, e);
        }

        self.invalidate(server_id, &path);
        if !self.query_directory(&session, &path).await {
            warn!("[{}] {} still missing after mkdir", session.key(), path);
            return Err(RemoteError::FolderCreationFailed { path });
        }

        self.apply_ownership(&session, &path).await;
        // mkdir -p may also have created the user directory
        let user_path = self.user_path(login);
        self.invalidate(server_id, &user_path);
        self.introspection.put_exists(server_id, &user_path, true);
        self.introspection.put_exists(server_id, &path, true);
        self.cooldown.mark_done(&key);

        info!("[{}] Created folder {}", session.key(), path);
        Ok(ProvisionOutcome::Created)
    }

    /// The user directory plus every folder of `structure`, deduplicated as
    /// one operation.
    ///
    /// All segments are validated before anything runs. Errors are those of
    /// [`RemoteStorage::ensure_user_directory`] and
    /// [`RemoteStorage::ensure_user_folder`].
    pub async fn ensure_complete_user_structure(
        &self,
        server_id: ServerId,
        login: &str,
        structure: &UserStructure,
    ) -> Result<ProvisionOutcome, RemoteError> {
        let login = validate_segment("user login", login)?;
        for folder in &structure.folders {
            validate_segment("folder name", folder)?;
        }

        let target = if structure.folders.is_empty() {
            login.to_string()
        } else {
            format!("{}[{}]", login, structure.folders.join(","))
        };
        let key = OperationKey::new(OperationKind::EnsureUserStructure, server_id, &target);
        if self.cooldown.should_skip(&key) {
            return Ok(ProvisionOutcome::AssumedFromCooldown);
        }

        let mut outcome = self.ensure_user_directory(server_id, login).await?;
        for folder in &structure.folders {
            let folder_outcome = self.ensure_user_folder(server_id, login, folder).await?;
            outcome = outcome.merge(folder_outcome);
        }
        let outcome = outcome.merge(ProvisionOutcome::AlreadyPresent);

        self.cooldown.mark_done(&key);
        Ok(outcome)
    }

    /// Best-effort `chown -R` then `chmod -R`; restricted accounts often
    /// cannot do either.
    async fn apply_ownership(&self, session: &Session, path: &str) {
        if let Err(e) = self.run(session, &chown_command(&self.config.owner, path)).await {
            warn!(
                "[{}] chown {} {} failed: {}",
                session.key(),
                self.config.owner,
                path,
                e
            );
        }
        if let Err(e) = self
            .run(session, &chmod_command(&self.config.dir_mode, path, true))
            .await
        {
            warn!(
                "[{}] chmod {} {} failed: {}",
                session.key(),
                self.config.dir_mode,
                path,
                e
            );
        }
    }
}
