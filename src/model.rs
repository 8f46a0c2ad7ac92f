use serde::{Deserialize, Serialize};

use crate::error::{EngineError, Result};

/// Sensor-local observation as read from the store.
///
/// Identity is `(sensor_id, t_local_nanoseconds)`; two `Observation`
/// values with the same identity are considered the same record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Observation {
    pub sensor_id: String,
    pub sensor_type: String,
    pub t_local: f64,
    pub sigma: f64,
    pub payload_ref: String,
}

impl Observation {
    /// Nanosecond-quantized local timestamp used as part of this
    /// observation's identity and as the `obs:<sensor_id>:<t_local_ns>`
    /// store key suffix.
    pub fn t_local_nanoseconds(&self) -> i64 {
        (self.t_local * 1e9).round() as i64
    }

    /// NaN in any numeric field rejects the observation; empty
    /// `sensor_id` rejects it; negative `sigma` rejects it; zero `sigma`
    /// is clamped to `1e-9`, not rejected.
    pub fn validated(mut self) -> Result<Self> {
        if self.sensor_id.trim().is_empty() {
            return Err(EngineError::invalid_observation("empty sensor_id"));
        }
        if self.t_local.is_nan() {
            return Err(EngineError::invalid_observation("t_local is NaN"));
        }
        if self.sigma.is_nan() {
            return Err(EngineError::invalid_observation("sigma is NaN"));
        }
        if self.sigma < 0.0 {
            return Err(EngineError::invalid_observation("negative sigma"));
        }
        if self.sigma == 0.0 {
            self.sigma = MIN_SIGMA;
        }
        Ok(self)
    }
}

/// Floor applied to zero `sigma`.
pub const MIN_SIGMA: f64 = 1e-9;

/// Per-sensor time-sync filter state.
///
/// `updated_at_unix_ms` is additive bookkeeping beyond `offset_mean`,
/// `offset_var`, and `drift`: the predict step needs elapsed time since
/// the state was last touched, and this crate is otherwise stateless
/// between invocations. Old records without the field decode fine
/// (`#[serde(default)]`) and are treated as never-yet-predicted.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SyncState {
    pub offset_mean: f64,
    pub offset_var: f64,
    pub drift: f64,
    #[serde(default)]
    pub updated_at_unix_ms: Option<i64>,
}

impl Default for SyncState {
    fn default() -> Self {
        SyncState {
            offset_mean: 0.0,
            offset_var: 0.1,
            drift: 1.0,
            updated_at_unix_ms: None,
        }
    }
}

/// A single member of a [`Group`]: one observation's soft membership.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Member {
    pub sensor_id: String,
    pub probability: f64,
}

/// One grouping result: an estimated global time and the observations
/// that plausibly correspond to it. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Group {
    pub t_global: f64,
    pub members: Vec<Member>,
}
