//! Per-sensor Kalman-style 1-D filter over offset, with drift tracked as
//! a slowly varying parameter updated by EMA. Pure functions over
//! [`SyncState`], no store access, so these are trivially unit-testable.

use crate::model::SyncState;

/// Process noise `q` used by [`predict`] when no override is supplied.
pub const DEFAULT_PROCESS_NOISE: f64 = 1e-6;
/// Floor below which a membership probability is too weak to update the
/// filter.
pub const P_MIN: f64 = 1e-6;
/// EMA weight for the drift update.
const DRIFT_ALPHA: f64 = 0.01;

const OFFSET_VAR_MIN: f64 = 1e-9;
const OFFSET_VAR_MAX: f64 = 10.0;
const DRIFT_MIN: f64 = 0.99;
const DRIFT_MAX: f64 = 1.01;

/// Predict (time update): inflate `offset_var` by elapsed time since
/// this state was last touched. `now_ms` becomes the new
/// `updated_at_unix_ms` bookkeeping value.
pub fn predict(state: &mut SyncState, now_ms: i64, process_noise: f64) {
    let dt_seconds = match state.updated_at_unix_ms {
        Some(prev_ms) => (now_ms.saturating_sub(prev_ms)).max(0) as f64 / 1000.0,
        None => 0.0,
    };
    state.offset_var = (state.offset_var + process_noise * dt_seconds).clamp(OFFSET_VAR_MIN, OFFSET_VAR_MAX);
    state.updated_at_unix_ms = Some(now_ms);
}

/// Update (measurement): fold in one (observation, group) feedback pair.
/// Memberships below [`P_MIN`] do not update the filter.
pub fn update(state: &mut SyncState, t_local: f64, sigma: f64, probability: f64, t_hat: f64) {
    if probability < P_MIN {
        return;
    }

    let innovation = t_hat - (t_local * state.drift + state.offset_mean);
    let innovation_variance = state.offset_var + sigma * sigma / probability.max(P_MIN);
    let gain = state.offset_var / innovation_variance;

    state.offset_mean += gain * innovation;
    state.offset_var = ((1.0 - gain) * state.offset_var).clamp(OFFSET_VAR_MIN, OFFSET_VAR_MAX);

    // This correction's sign depends on t_local and is numerically
    // sensitive when |t_local| is small; the clamp below bounds the
    // damage, but drift is meant to be a stable, rarely moving
    // parameter: small infrequent nudges, not a primary estimator.
    let correction = 1.0 + innovation / t_local.abs().max(1.0);
    state.drift = ((1.0 - DRIFT_ALPHA) * state.drift + DRIFT_ALPHA * correction).clamp(DRIFT_MIN, DRIFT_MAX);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn predict_is_noop_on_first_contact() {
        let mut state = SyncState::default();
        predict(&mut state, 1_000, DEFAULT_PROCESS_NOISE);
        assert_eq!(state.offset_var, 0.1);
        assert_eq!(state.updated_at_unix_ms, Some(1_000));
    }

    #[test]
    fn predict_inflates_variance_with_elapsed_time() {
        let mut state = SyncState {
            updated_at_unix_ms: Some(0),
            ..SyncState::default()
        };
        predict(&mut state, 10_000, 1e-3);
        assert!(state.offset_var > 0.1);
    }

    #[test]
    fn predict_clamps_variance_to_upper_bound() {
        let mut state = SyncState {
            offset_var: 9.999,
            updated_at_unix_ms: Some(0),
            ..SyncState::default()
        };
        predict(&mut state, i64::MAX / 2, 1.0);
        assert_eq!(state.offset_var, OFFSET_VAR_MAX);
    }

    #[test]
    fn update_below_p_min_is_skipped() {
        let mut state = SyncState::default();
        let before = state;
        update(&mut state, 10.0, 0.01, 1e-9, 10.0);
        assert_eq!(state, before);
    }

    #[test]
    fn update_moves_offset_mean_toward_innovation() {
        let mut state = SyncState::default();
        update(&mut state, 10.0, 0.01, 1.0, 10.05);
        assert!(state.offset_mean > 0.0);
        assert!(state.offset_var < 0.1);
    }

    #[test]
    fn update_clamps_drift_to_bounds() {
        let mut state = SyncState {
            drift: 1.0,
            offset_var: 5.0,
            ..SyncState::default()
        };
        // A huge innovation relative to a tiny t_local would otherwise
        // blow drift far past its bound.
        update(&mut state, 0.0001, 0.01, 1.0, 1000.0);
        assert!(state.drift <= DRIFT_MAX);
        assert!(state.drift >= DRIFT_MIN);
    }
}
