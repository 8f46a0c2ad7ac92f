//! The public entry point. One invocation of [`SyncEngine::step`] is
//! election check, then pool load, then grouping, then feedback, then
//! publish.

use std::collections::HashMap;
use std::sync::Arc;

use crate::config::EngineConfig;
use crate::election::{self, Role};
use crate::error::Result;
use crate::filter;
use crate::grouper;
use crate::model::{Group, SyncState};
use crate::pool;
use crate::record::encode_sync_state;
use crate::store::{keys, RedisStore, StoreAdapter};

/// The Sync Engine. Cheap to clone-and-hold: all state lives in the
/// store, this struct only carries the connection and configuration.
pub struct SyncEngine {
    store: Arc<dyn StoreAdapter>,
    config: EngineConfig,
}

impl SyncEngine {
    /// Build an engine over an already-connected store. Most callers
    /// should prefer [`SyncEngine::connect`], which opens a
    /// [`RedisStore`] from `config.store_url`.
    pub fn new(store: Arc<dyn StoreAdapter>, config: EngineConfig) -> Self {
        SyncEngine { store, config }
    }

    /// Connect to the Redis URL in `config.store_url` and build an
    /// engine over it.
    pub async fn connect(config: EngineConfig) -> Result<Self> {
        let store = RedisStore::connect_with_timeout(&config.store_url, config.store_timeout).await?;
        Ok(SyncEngine::new(Arc::new(store), config))
    }

    /// One invocation: election check, pool load, grouping, feedback,
    /// publish. Returns `[]` without touching the pool if this node is
    /// not leader.
    pub async fn step(&self) -> Result<Vec<Group>> {
        let role = election::acquire_or_renew(
            self.store.as_ref(),
            &self.config.node_id,
            self.config.heartbeat_ttl_seconds,
        )
        .await?;

        if role != Role::Leader {
            tracing::debug!(node_id = %self.config.node_id, "not leader, returning empty step");
            return Ok(Vec::new());
        }

        let (observations, sync_states) = pool::load_pool(self.store.as_ref()).await?;
        let clusters = grouper::group(&observations, &sync_states, &self.config);

        // A sensor can have more than one live observation in a single
        // step, so feedback is accumulated per sensor_id in a working
        // copy before any write: folding straight into `sync_states` and
        // writing per assignment would let a second (observation, group)
        // pair for the same sensor overwrite the first one's update
        // instead of composing with it.
        let mut working: HashMap<String, SyncState> = HashMap::new();
        let now_ms = unix_millis_now();
        for cluster in &clusters {
            for assignment in &cluster.assignments {
                let state = working.entry(assignment.sensor_id.clone()).or_insert_with(|| {
                    sync_states.get(&assignment.sensor_id).copied().unwrap_or_default()
                });
                filter::predict(state, now_ms, self.config.process_noise);
                filter::update(
                    state,
                    assignment.t_local,
                    assignment.sigma,
                    assignment.probability,
                    cluster.t_global,
                );
            }
        }

        for (sensor_id, state) in &working {
            let encoded = encode_sync_state(state)?;
            self.store.set(&keys::sync_state_key(sensor_id), &encoded).await?;
        }

        Ok(clusters.into_iter().map(|c| c.into_group()).collect())
    }
}

/// Wall-clock milliseconds used as the Predict step's `now`; isolated
/// here as the engine's one non-deterministic input, consulted nowhere
/// else.
fn unix_millis_now() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
