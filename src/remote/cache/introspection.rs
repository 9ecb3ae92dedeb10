//! Introspection result cache.
//!
//! One cache for every read-only query. Each query kind has its own TTL;
//! the TTL is stored with the entry so the sweep works without knowing the
//! kind.

use std::time::Duration;

use tracing::debug;

use crate::remote::types::{FolderInfo, OperationKey, OperationKind, ServerId};

use super::ttl::TtlCache;

/// A real answer from the remote host.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CachedAnswer {
    Exists(bool),
    Folder(FolderInfo),
}

pub struct IntrospectionCache {
    entries: TtlCache<CachedAnswer>,
    exists_ttl: Duration,
    folder_info_ttl: Duration,
}

impl IntrospectionCache {
    pub fn new(exists_ttl: Duration, folder_info_ttl: Duration) -> Self {
        Self {
            entries: TtlCache::new(),
            exists_ttl,
            folder_info_ttl,
        }
    }

    /// TTL for a query kind. Provisioning kinds are never cached here.
    pub fn ttl_for(&self, kind: OperationKind) -> Option<Duration> {
        match kind {
            OperationKind::DirectoryExists => Some(self.exists_ttl),
            OperationKind::FolderInfo => Some(self.folder_info_ttl),
            _ => None,
        }
    }

    pub fn get(&self, key: &OperationKey) -> Option<CachedAnswer> {
        let hit = self.entries.get(key);
        if hit.is_some() {
            debug!("Introspection cache hit for {}", key);
        }
        hit
    }

    pub fn put(&self, kind: OperationKind, key: &OperationKey, answer: CachedAnswer) {
        if let Some(ttl) = self.ttl_for(kind) {
            self.entries.insert(key, answer, ttl);
        }
    }

    pub fn exists(&self, server_id: ServerId, path: &str) -> Option<bool> {
        match self.get(&OperationKey::new(OperationKind::DirectoryExists, server_id, path)) {
            Some(CachedAnswer::Exists(exists)) => Some(exists),
            _ => None,
        }
    }

    pub fn put_exists(&self, server_id: ServerId, path: &str, exists: bool) {
        let key = OperationKey::new(OperationKind::DirectoryExists, server_id, path);
        self.put(OperationKind::DirectoryExists, &key, CachedAnswer::Exists(exists));
    }

    pub fn folder_info(&self, server_id: ServerId, path: &str) -> Option<FolderInfo> {
        match self.get(&OperationKey::new(OperationKind::FolderInfo, server_id, path)) {
            Some(CachedAnswer::Folder(info)) => Some(info),
            _ => None,
        }
    }

    pub fn put_folder_info(&self, server_id: ServerId, path: &str, info: FolderInfo) {
        let key = OperationKey::new(OperationKind::FolderInfo, server_id, path);
        self.put(OperationKind::FolderInfo, &key, CachedAnswer::Folder(info));
    }

    /// Drop every cached answer about `path` on `server_id`.
    pub fn invalidate(&self, server_id: ServerId, path: &str) {
        for kind in [OperationKind::DirectoryExists, OperationKind::FolderInfo] {
            self.entries.remove(&OperationKey::new(kind, server_id, path));
        }
    }

    pub fn sweep(&self) -> usize {
        self.entries.sweep()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
