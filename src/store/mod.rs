//! The abstract facade the rest of the engine talks to. This module
//! only defines the trait and the key layout; concrete backends live in
//! [`redis_store`] (the shipped production adapter, matching
//! `original_source/`'s use of Redis) and [`memory`] (an in-process
//! adapter used by tests and by callers who don't need persistence
//! across process restarts).

mod memory;
mod redis_store;

pub use memory::InMemoryStore;
pub use redis_store::{RedisStore, DEFAULT_TIMEOUT};

use async_trait::async_trait;

use crate::error::Result;

/// Abstract facade over an expiring key/value store.
///
/// Values are opaque UTF-8 text records; this trait never interprets
/// them, that's [`crate::record`]'s job.
#[async_trait]
pub trait StoreAdapter: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str) -> Result<()>;

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()>;

    /// Atomic compare-and-set: succeeds (returns `true`) only if `key`
    /// did not already exist. This is the primitive the election
    /// coordinator uses to acquire an unheld lease.
    async fn set_if_absent_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool>;

    /// Value-guarded renewal: succeeds (returns `true`) and refreshes
    /// the TTL only if `key` currently holds `expected_value`. Used to
    /// renew a held lease without a separate `get` + `set`, so a lease
    /// that expired and was re-acquired by another owner in between
    /// cannot be clobbered by a stale renewal.
    async fn renew_if_owner(&self, key: &str, expected_value: &str, ttl_seconds: u64) -> Result<bool>;

    async fn delete(&self, key: &str) -> Result<()>;

    async fn scan_by_prefix(&self, prefix: &str) -> Result<Vec<String>>;
}

/// Store key layout.
pub mod keys {
    pub const OBS_PREFIX: &str = "obs:";
    pub const SYNC_STATE_PREFIX: &str = "sync:state:";
    pub const ELECTION_MASTER: &str = "election:master";
    pub const ELECTION_HEARTBEAT_PREFIX: &str = "election:bully:hb:";

    pub fn observation_key(sensor_id: &str, t_local_ns: i64) -> String {
        format!("{OBS_PREFIX}{sensor_id}:{t_local_ns}")
    }

    pub fn sync_state_key(sensor_id: &str) -> String {
        format!("{SYNC_STATE_PREFIX}{sensor_id}")
    }

    pub fn sensor_id_from_sync_state_key(key: &str) -> Option<&str> {
        key.strip_prefix(SYNC_STATE_PREFIX)
    }

    pub fn heartbeat_key(node_id: &str) -> String {
        format!("{ELECTION_HEARTBEAT_PREFIX}{node_id}")
    }
}
