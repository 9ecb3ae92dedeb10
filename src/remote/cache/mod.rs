//! In-process caches that keep repeated remote work off the network.
//!
//! - [`TtlCache`]: the one timestamped map both caches are built on, backed
//!   by `DashMap` for lock-free concurrent access
//! - [`Cooldown`]: time-boxed memory of *completed* provisioning operations;
//!   a hit means "assume success", nothing was verified
//! - [`IntrospectionCache`]: real answers to read-only queries, with a TTL
//!   per query kind
//!
//! Entries are never evicted on read. A periodic janitor calls `sweep`,
//! which drops anything older than twice its window.

mod cooldown;
mod introspection;
mod ttl;

pub use cooldown::Cooldown;
pub use introspection::{CachedAnswer, IntrospectionCache};
pub use ttl::TtlCache;
