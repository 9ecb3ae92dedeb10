//! Connection Pool: at most one live session per physical endpoint.
//!
//! Slots are keyed by `host:port`, not by logical server id, so two server
//! ids on the same machine share a session.
//!
//! # Single in-flight connect
//!
//! A slot is either `Connecting` (holding a shared future of the handshake)
//! or `Ready`. Acquirers that find a `Connecting` slot clone the shared
//! future and await the same handshake, so concurrent acquirers for one
//! endpoint cause exactly one connect and all see the same session or the
//! same error. Whoever observes the result first promotes the slot to
//! `Ready`, or clears it on failure so the next acquire starts over.
//!
//! The slot map is only locked for synchronous bookkeeping, never across an
//! await.
//!
//! # Eviction
//!
//! Every `Ready` session is watched through its lost signal and evicted the
//! moment the connection is closed or dropped. Connections that die without
//! any notice are caught by the liveness check on acquire and by
//! [`ConnectionPool::sweep_dead`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use futures::future::{BoxFuture, FutureExt, Shared, join_all};
use tracing::{info, warn};

use super::directory::HostDirectory;
use super::error::RemoteError;
use super::session::Session;
use super::transport::Connector;
use super::types::{ServerEndpoint, ServerId};

type PendingConnect = Shared<BoxFuture<'static, Result<Arc<Session>, RemoteError>>>;

enum Slot {
    Connecting { attempt: u64, pending: PendingConnect },
    Ready(Arc<Session>),
}

/// What `acquire` found in the slot map.
enum Lookup {
    Live(Arc<Session>),
    Pending(u64, PendingConnect),
}

pub struct ConnectionPool {
    directory: Arc<dyn HostDirectory>,
    connector: Arc<dyn Connector>,
    slots: Arc<DashMap<String, Slot>>,
    attempts: AtomicU64,
}

impl ConnectionPool {
    pub fn new(directory: Arc<dyn HostDirectory>, connector: Arc<dyn Connector>) -> Self {
        Self {
            directory,
            connector,
            slots: Arc::new(DashMap::new()),
            attempts: AtomicU64::new(0),
        }
    }

    /// Resolve `server_id` and return the live session for its endpoint,
    /// connecting if there is none.
    ///
    /// # Errors
    ///
    /// * `EndpointUnavailable` - unknown or inactive server; no network I/O
    /// * `ConnectFailure` - handshake or authentication failed
    pub async fn acquire(&self, server_id: ServerId) -> Result<Arc<Session>, RemoteError> {
        let endpoint = self.resolve(server_id).await?;
        let key = endpoint.key();

        let (attempt, pending) = match self.lookup_or_connect(&key, endpoint) {
            Lookup::Live(session) => return Ok(session),
            Lookup::Pending(attempt, pending) => (attempt, pending),
        };

        let result = pending.await;
        self.settle(&key, attempt, &result);
        result
    }

    async fn resolve(&self, server_id: ServerId) -> Result<ServerEndpoint, RemoteError> {
        let record = self
            .directory
            .lookup(server_id)
            .await
            .map_err(|reason| RemoteError::EndpointUnavailable { server_id, reason })?
            .ok_or_else(|| RemoteError::EndpointUnavailable {
                server_id,
                reason: "unknown server".to_string(),
            })?;

        if !record.active {
            return Err(RemoteError::EndpointUnavailable {
                server_id,
                reason: "server is inactive".to_string(),
            });
        }

        Ok(record.endpoint())
    }

    fn lookup_or_connect(&self, key: &str, endpoint: ServerEndpoint) -> Lookup {
        match self.slots.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                let dead = match occupied.get() {
                    Slot::Ready(session) if session.is_alive() => {
                        return Lookup::Live(session.clone());
                    }
                    Slot::Connecting { attempt, pending } => {
                        return Lookup::Pending(*attempt, pending.clone());
                    }
                    Slot::Ready(session) => session.clone(),
                };
                warn!("Session {} to {} is dead, reconnecting", dead.id(), key);
                let (attempt, pending) = self.start_connect(endpoint);
                occupied.insert(Slot::Connecting {
                    attempt,
                    pending: pending.clone(),
                });
                Lookup::Pending(attempt, pending)
            }
            Entry::Vacant(vacant) => {
                let (attempt, pending) = self.start_connect(endpoint);
                vacant.insert(Slot::Connecting {
                    attempt,
                    pending: pending.clone(),
                });
                Lookup::Pending(attempt, pending)
            }
        }
    }

    fn start_connect(&self, endpoint: ServerEndpoint) -> (u64, PendingConnect) {
        let attempt = self.attempts.fetch_add(1, Ordering::SeqCst);
        let connector = self.connector.clone();

        let pending = async move {
            info!("Opening session to {}@{}", endpoint.username, endpoint.key());
            let transport = connector.connect(&endpoint).await?;
            let session = Arc::new(Session::new(&endpoint, transport));
            info!("Session {} to {} ready", session.id(), session.key());
            Ok(session)
        }
        .boxed()
        .shared();

        (attempt, pending)
    }

    /// Promote or clear the slot once its connect attempt resolved.
    /// A no-op if the slot has moved on to another attempt.
    fn settle(&self, key: &str, attempt: u64, result: &Result<Arc<Session>, RemoteError>) {
        let Entry::Occupied(mut occupied) = self.slots.entry(key.to_string()) else {
            return;
        };
        let same_attempt = matches!(
            occupied.get(),
            Slot::Connecting { attempt: current, .. } if *current == attempt
        );
        if !same_attempt {
            return;
        }
        match result {
            Ok(session) => {
                occupied.insert(Slot::Ready(session.clone()));
                drop(occupied);
                self.watch(session);
            }
            Err(e) => {
                warn!("Connect to {} failed: {}", key, e);
                occupied.remove();
            }
        }
    }

    /// Evict `session` as soon as its lost signal fires.
    ///
    /// The watcher only holds a weak reference to the slot map and exits
    /// once the signal fires, which `close_all` guarantees for every
    /// pooled session.
    fn watch(&self, session: &Session) {
        let slots = Arc::downgrade(&self.slots);
        let lost = session.lost_signal();
        let key = session.key().to_string();
        let id = session.id().to_string();

        tokio::spawn(async move {
            lost.cancelled().await;
            if let Some(slots) = slots.upgrade()
                && remove_ready(&slots, &key, &id)
            {
                warn!("Session {} to {} ended, evicted", id, key);
            }
        });
    }

    /// Drop `session` from the pool if it is still the one serving its key.
    pub fn evict(&self, session: &Session) -> bool {
        let removed = remove_ready(&self.slots, session.key(), session.id());
        if removed {
            warn!("Evicted session {} to {}", session.id(), session.key());
        }
        removed
    }

    /// Drop every ready session whose transport is gone.
    pub fn sweep_dead(&self) -> usize {
        let before = self.slots.len();
        self.slots.retain(|_, slot| match slot {
            Slot::Ready(session) => session.is_alive(),
            Slot::Connecting { .. } => true,
        });
        before.saturating_sub(self.slots.len())
    }

    /// Number of ready sessions.
    pub fn len(&self) -> usize {
        self.slots
            .iter()
            .filter(|slot| matches!(slot.value(), Slot::Ready(_)))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Close every ready session and empty the pool.
    pub async fn close_all(&self) {
        let sessions: Vec<Arc<Session>> = self
            .slots
            .iter()
            .filter_map(|slot| match slot.value() {
                Slot::Ready(session) => Some(session.clone()),
                Slot::Connecting { .. } => None,
            })
            .collect();
        self.slots.clear();

        info!("Closing {} pooled session(s)", sessions.len());
        join_all(sessions.iter().map(|session| session.close())).await;
    }
}

/// Remove the `Ready` slot under `key` if it still holds session `id`.
fn remove_ready(slots: &DashMap<String, Slot>, key: &str, id: &str) -> bool {
    slots
        .remove_if(key, |_, slot| match slot {
            Slot::Ready(current) => current.id() == id,
            Slot::Connecting { .. } => false,
        })
        .is_some()
}
