//! Filesystem introspection: read-only queries about remote paths.
//!
//! These answers feed space accounting and display, never correctness
//! decisions, so none of them fails: unknown hosts, transport faults and
//! unparseable output all degrade to the negative answer.

use tracing::{debug, warn};

use super::context::RemoteStorage;
use super::session::Session;
use super::shell::{
    dir_exists_command, folder_info_command, is_safe_remote_path, listing_command,
    path_exists_command,
};
use super::types::{FileInfo, FolderInfo, ServerId};

impl RemoteStorage {
    /// Whether `path` is a directory on `server_id`, cached for the exists TTL.
    pub async fn directory_exists(&self, server_id: ServerId, path: &str) -> bool {
        if !is_safe_remote_path(path) {
            warn!("Refusing to query unsafe path {:?}", path);
            return false;
        }
        if let Some(exists) = self.introspection.exists(server_id, path) {
            return exists;
        }

        let session = match self.acquire(server_id).await {
            Ok(session) => session,
            Err(e) => {
                warn!("directory_exists({}, {}) unavailable: {}", server_id, path, e);
                return false;
            }
        };

        match self.run(&session, &dir_exists_command(path)).await {
            Ok(output) => {
                let exists = output.stdout.trim() == "1";
                self.introspection.put_exists(server_id, path, exists);
                exists
            }
            Err(e) => {
                warn!("[{}] test -d {} failed: {}", session.key(), path, e);
                false
            }
        }
    }

    /// Existence, regular file count and total size of a directory in one
    /// round trip, cached for the folder info TTL.
    pub async fn folder_info(&self, server_id: ServerId, path: &str) -> FolderInfo {
        if !is_safe_remote_path(path) {
            warn!("Refusing to query unsafe path {:?}", path);
            return FolderInfo::missing();
        }
        if let Some(info) = self.introspection.folder_info(server_id, path) {
            return info;
        }

        let session = match self.acquire(server_id).await {
            Ok(session) => session,
            Err(e) => {
                warn!("folder_info({}, {}) unavailable: {}", server_id, path, e);
                return FolderInfo::missing();
            }
        };

        let output = match self.run(&session, &folder_info_command(path)).await {
            Ok(output) => output,
            Err(e) => {
                warn!("[{}] folder info for {} failed: {}", session.key(), path, e);
                return FolderInfo::missing();
            }
        };

        match parse_folder_info(&output.stdout) {
            Some(info) => {
                self.introspection.put_folder_info(server_id, path, info);
                info
            }
            None => {
                warn!(
                    "[{}] Unexpected folder info output for {}: {:?}",
                    session.key(),
                    path,
                    output.stdout
                );
                FolderInfo::missing()
            }
        }
    }

    /// Existence, size and mode string of one file. Never cached: used to
    /// verify state right before a deletion.
    pub async fn file_info(&self, server_id: ServerId, path: &str) -> FileInfo {
        if !is_safe_remote_path(path) {
            warn!("Refusing to query unsafe path {:?}", path);
            return FileInfo::missing();
        }

        let session = match self.acquire(server_id).await {
            Ok(session) => session,
            Err(e) => {
                warn!("file_info({}, {}) unavailable: {}", server_id, path, e);
                return FileInfo::missing();
            }
        };

        match self.run(&session, &path_exists_command(path)).await {
            Ok(output) if output.stdout.trim() == "1" => {}
            Ok(_) => return FileInfo::missing(),
            Err(e) => {
                warn!("[{}] test -e {} failed: {}", session.key(), path, e);
                return FileInfo::missing();
            }
        }

        match self.run(&session, &listing_command(path)).await {
            Ok(output) => parse_listing(&output.stdout).unwrap_or_else(|| {
                warn!("[{}] Unparseable listing for {}: {:?}", session.key(), path, output.stdout);
                FileInfo::missing()
            }),
            Err(e) => {
                warn!("[{}] ls -ld {} failed: {}", session.key(), path, e);
                FileInfo::missing()
            }
        }
    }

    /// Uncached `test -d` on a borrowed session. Errors count as absent.
    pub(crate) async fn query_directory(&self, session: &Session, path: &str) -> bool {
        match self.run(session, &dir_exists_command(path)).await {
            Ok(output) => output.stdout.trim() == "1",
            Err(e) => {
                debug!("[{}] test -d {} failed, treating as absent: {}", session.key(), path, e);
                false
            }
        }
    }
}

/// Positional parse of the three-line folder info output.
///
/// `None` when the first line is neither `0` nor `1`. Missing or garbled
/// count and size lines read as zero.
fn parse_folder_info(stdout: &str) -> Option<FolderInfo> {
    let mut lines = stdout.lines().map(str::trim);
    match lines.next()? {
        "0" => Some(FolderInfo::missing()),
        "1" => {
            let mut number = || lines.next().and_then(|l| l.parse::<u64>().ok()).unwrap_or(0);
            let file_count = number();
            let size_bytes = number();
            Some(FolderInfo {
                exists: true,
                file_count,
                size_bytes,
            })
        }
        _ => None,
    }
}

/// Mode string (field 0) and size (field 4) of an `ls -ld` line.
fn parse_listing(stdout: &str) -> Option<FileInfo> {
    let fields: Vec<&str> = stdout.lines().next()?.split_whitespace().collect();
    if fields.len() < 5 {
        return None;
    }
    let size = fields[4].parse::<u64>().ok()?;
    Some(FileInfo {
        exists: true,
        size_bytes: Some(size),
        permissions: Some(fields[0].to_string()),
    })
}
