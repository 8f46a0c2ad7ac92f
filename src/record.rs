//! Record encoding: plain JSON objects over the store's opaque byte
//! strings. This module is the only place that (de)serializes
//! [`Observation`] and [`SyncState`] to and from those strings.

use crate::error::{EngineError, Result};
use crate::model::{Observation, SyncState};

pub fn encode_observation(obs: &Observation) -> Result<String> {
    serde_json::to_string(obs).map_err(EngineError::store_error)
}

pub fn decode_observation(raw: &str) -> Result<Observation> {
    serde_json::from_str(raw).map_err(EngineError::store_error)
}

pub fn encode_sync_state(state: &SyncState) -> Result<String> {
    serde_json::to_string(state).map_err(EngineError::store_error)
}

pub fn decode_sync_state(raw: &str) -> Result<SyncState> {
    serde_json::from_str(raw).map_err(EngineError::store_error)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn observation_roundtrips() {
        let obs = Observation {
            sensor_id: "cam-1".into(),
            sensor_type: "camera".into(),
            t_local: 10.25,
            sigma: 0.01,
            payload_ref: "mem://cam-1".into(),
        };
        let encoded = encode_observation(&obs).unwrap();
        let decoded = decode_observation(&encoded).unwrap();
        assert_eq!(obs, decoded);
    }

    #[test]
    fn sync_state_roundtrips_including_bookkeeping_field() {
        let state = SyncState {
            offset_mean: 0.01,
            offset_var: 0.05,
            drift: 1.0002,
            updated_at_unix_ms: Some(1_700_000_000_000),
        };
        let encoded = encode_sync_state(&state).unwrap();
        let decoded = decode_sync_state(&encoded).unwrap();
        assert_eq!(state, decoded);
    }

    #[test]
    fn sync_state_without_bookkeeping_field_still_decodes() {
        let raw = r#"{"offset_mean":0.0,"offset_var":0.1,"drift":1.0}"#;
        let decoded = decode_sync_state(raw).unwrap();
        assert_eq!(decoded.updated_at_unix_ms, None);
    }

    #[test]
    fn malformed_record_is_a_store_error_not_a_panic() {
        assert!(decode_observation("not json").is_err());
    }
}
