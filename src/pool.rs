//! Reads the current live observations and per-sensor sync state from
//! the store.

use std::collections::HashMap;

use crate::error::Result;
use crate::model::{Observation, SyncState};
use crate::record::{decode_observation, decode_sync_state};
use crate::store::{keys, StoreAdapter};

/// `load_pool` scans `obs:` and `sync:state:` and decodes whatever is
/// live. Malformed or already-expired records are skipped and logged,
/// never fatal to the step. Observations missing a corresponding sync
/// state are not defaulted here: they inherit defaults, which callers
/// get for free via `SyncState::default()` when a lookup misses.
pub async fn load_pool(store: &dyn StoreAdapter) -> Result<(Vec<Observation>, HashMap<String, SyncState>)> {
    let observations = load_observations(store).await?;
    let sync_states = load_sync_states(store).await?;
    Ok((observations, sync_states))
}

async fn load_observations(store: &dyn StoreAdapter) -> Result<Vec<Observation>> {
    let obs_keys = store.scan_by_prefix(keys::OBS_PREFIX).await?;
    let mut observations = Vec::with_capacity(obs_keys.len());

    for key in obs_keys {
        let raw = match store.get(&key).await? {
            Some(raw) => raw,
            None => {
                tracing::debug!(key = %key, "observation evicted between scan and read");
                continue;
            }
        };

        let obs = match decode_observation(&raw) {
            Ok(obs) => obs,
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "skipping malformed observation record");
                continue;
            }
        };

        match obs.validated() {
            Ok(obs) => observations.push(obs),
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "skipping invalid observation");
            }
        }
    }

    Ok(observations)
}

async fn load_sync_states(store: &dyn StoreAdapter) -> Result<HashMap<String, SyncState>> {
    let state_keys = store.scan_by_prefix(keys::SYNC_STATE_PREFIX).await?;
    let mut sync_states = HashMap::with_capacity(state_keys.len());

    for key in state_keys {
        let Some(sensor_id) = keys::sensor_id_from_sync_state_key(&key) else {
            continue;
        };

        let raw = match store.get(&key).await? {
            Some(raw) => raw,
            None => {
                tracing::debug!(key = %key, "sync state evicted between scan and read");
                continue;
            }
        };

        match decode_sync_state(&raw) {
            Ok(state) => {
                sync_states.insert(sensor_id.to_string(), state);
            }
            Err(err) => {
                tracing::warn!(key = %key, error = %err, "skipping malformed sync state record");
            }
        }
    }

    Ok(sync_states)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::{encode_observation, encode_sync_state};
    use crate::store::InMemoryStore;

    fn sample_observation(sensor_id: &str, t_local: f64) -> Observation {
        Observation {
            sensor_id: sensor_id.into(),
            sensor_type: "camera".into(),
            t_local,
            sigma: 0.01,
            payload_ref: format!("mem://{sensor_id}"),
        }
    }

    #[tokio::test]
    async fn empty_store_yields_empty_pool() {
        let store = InMemoryStore::new();
        let (observations, sync_states) = load_pool(&store).await.unwrap();
        assert!(observations.is_empty());
        assert!(sync_states.is_empty());
    }

    #[tokio::test]
    async fn loads_valid_observations_and_states() {
        let store = InMemoryStore::new();
        let obs = sample_observation("cam-1", 10.0);
        let key = keys::observation_key(&obs.sensor_id, obs.t_local_nanoseconds());
        store.set(&key, &encode_observation(&obs).unwrap()).await.unwrap();

        let state = SyncState::default();
        store
            .set(&keys::sync_state_key("cam-1"), &encode_sync_state(&state).unwrap())
            .await
            .unwrap();

        let (observations, sync_states) = load_pool(&store).await.unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].sensor_id, "cam-1");
        assert_eq!(sync_states.get("cam-1"), Some(&state));
    }

    #[tokio::test]
    async fn skips_malformed_and_invalid_records_without_failing_the_step() {
        let store = InMemoryStore::new();
        store.set("obs:bad:1", "not json").await.unwrap();

        let invalid = sample_observation("negative-sigma", 10.0);
        let mut invalid_json: serde_json::Value = serde_json::to_value(&invalid).unwrap();
        invalid_json["sigma"] = serde_json::json!(-1.0);
        store
            .set("obs:negative-sigma:2", &invalid_json.to_string())
            .await
            .unwrap();

        let good = sample_observation("cam-1", 10.0);
        let key = keys::observation_key(&good.sensor_id, good.t_local_nanoseconds());
        store.set(&key, &encode_observation(&good).unwrap()).await.unwrap();

        let (observations, _) = load_pool(&store).await.unwrap();
        assert_eq!(observations.len(), 1);
        assert_eq!(observations[0].sensor_id, "cam-1");
    }

    #[tokio::test]
    async fn missing_sync_state_is_not_defaulted_by_the_pool() {
        let store = InMemoryStore::new();
        let obs = sample_observation("cam-1", 10.0);
        let key = keys::observation_key(&obs.sensor_id, obs.t_local_nanoseconds());
        store.set(&key, &encode_observation(&obs).unwrap()).await.unwrap();

        let (_, sync_states) = load_pool(&store).await.unwrap();
        assert!(sync_states.get("cam-1").is_none());
    }
}
