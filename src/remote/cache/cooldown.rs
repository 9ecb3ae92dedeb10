//! Provisioning cooldown.
//!
//! Many concurrent uploads for one user each ask for the same directory
//! structure. Once one of those calls has *completed* the operation, its key
//! is remembered for the cooldown window and every repeat inside the window
//! is answered with an optimistic success without touching the network.
//! Nothing is verified on a hit: correctness rests on the first call having
//! actually succeeded, which is why only successful completions are marked.

use std::time::Duration;

use tracing::debug;

use crate::remote::types::OperationKey;

use super::ttl::TtlCache;

pub struct Cooldown {
    window: Duration,
    done: TtlCache<()>,
}

impl Cooldown {
    pub fn new(window: Duration) -> Self {
        Self {
            window,
            done: TtlCache::new(),
        }
    }

    /// True when `key` completed less than one window ago.
    pub fn should_skip(&self, key: &OperationKey) -> bool {
        let skip = self.done.get(key).is_some();
        if skip {
            debug!("Cooldown hit for {}, assuming success", key);
        }
        skip
    }

    /// Record a successful completion of `key`.
    pub fn mark_done(&self, key: &OperationKey) {
        self.done.insert(key, (), self.window);
    }

    pub fn sweep(&self) -> usize {
        self.done.sweep()
    }

    pub fn len(&self) -> usize {
        self.done.len()
    }

    pub fn is_empty(&self) -> bool {
        self.done.is_empty()
    }
}
