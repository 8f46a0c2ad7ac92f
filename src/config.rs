//! Engine configuration. Construction parameters sit alongside the
//! grouper/filter design constants as configurable fields rather than
//! hard-coded values, so a host process can tune them without a
//! recompile.

use std::env;

/// Bucket width for candidate-cluster seeding.
pub const DEFAULT_BUCKET_SIZE_MS: u64 = 1000;
/// Process noise rate for offset-variance inflation.
pub const DEFAULT_PROCESS_NOISE: f64 = 1e-6;
/// RMS-deviation split multiplier.
pub const DEFAULT_SPLIT_K: f64 = 3.0;
/// Soft-assignment iteration cap.
pub const DEFAULT_MAX_ITER: u32 = 8;
/// Cluster-splitting recursion cap.
pub const DEFAULT_MAX_SPLIT_DEPTH: u32 = 3;

#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Store connection URL (e.g. a `redis://` URL for [`crate::store::RedisStore`]).
    pub store_url: String,
    /// This node's identifier; must be non-empty and unique per node in
    /// the cluster.
    pub node_id: String,
    /// Leader lease TTL in seconds.
    pub heartbeat_ttl_seconds: u64,
    /// Bucket width in milliseconds for bucketization.
    pub bucket_size_ms: u64,
    /// Process noise `q` for the predict step.
    pub process_noise: f64,
    /// `k` in the splitting criterion.
    pub split_k: f64,
    /// Iteration cap for soft-assignment convergence.
    pub max_iter: u32,
    /// Maximum cluster-split recursion depth.
    pub max_split_depth: u32,
    /// Per-store-operation timeout.
    pub store_timeout: std::time::Duration,
}

impl EngineConfig {
    pub fn new(store_url: impl Into<String>, node_id: impl Into<String>, heartbeat_ttl_seconds: u64) -> Self {
        EngineConfig {
            store_url: store_url.into(),
            node_id: node_id.into(),
            heartbeat_ttl_seconds,
            bucket_size_ms: DEFAULT_BUCKET_SIZE_MS,
            process_noise: DEFAULT_PROCESS_NOISE,
            split_k: DEFAULT_SPLIT_K,
            max_iter: DEFAULT_MAX_ITER,
            max_split_depth: DEFAULT_MAX_SPLIT_DEPTH,
            store_timeout: crate::store::DEFAULT_TIMEOUT,
        }
    }

    /// Reads `SENSORIUM_REDIS_URL`, `SENSORIUM_NODE_ID`, and
    /// `SENSORIUM_HEARTBEAT_TTL_SECONDS`, falling back to per-field
    /// defaults when a variable is absent or malformed. Not a CLI, just a
    /// convenience for host processes embedding the engine directly.
    pub fn from_env() -> Self {
        let store_url = env::var("SENSORIUM_REDIS_URL").unwrap_or_else(|_| "redis://127.0.0.1/".to_string());
        let node_id = env::var("SENSORIUM_NODE_ID").unwrap_or_else(|_| "sensorium-node".to_string());
        let heartbeat_ttl_seconds = env::var("SENSORIUM_HEARTBEAT_TTL_SECONDS")
            .ok()
            .and_then(|v| v.parse().ok())
            .unwrap_or(10);
        EngineConfig::new(store_url, node_id, heartbeat_ttl_seconds)
    }
}
