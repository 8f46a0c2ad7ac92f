use std::fmt;

/// Errors surfaced by the Sync Engine's public API.
///
/// `NotLeader` is never returned from [`crate::SyncEngine::step`]: the
/// orchestrator converts it into an empty result. It is still part of
/// this enum because the election coordinator and the orchestrator
/// share the same error type across their internal boundary.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Transport failure or timeout talking to the store.
    #[error("store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store responded, but the operation itself failed (protocol
    /// error, malformed data it could not even partially interpret).
    #[error("store error: {detail}")]
    StoreError { detail: String },

    /// A single observation record was malformed (NaN, negative sigma,
    /// empty sensor_id). The record is skipped, not fatal to the step.
    #[error("invalid observation: {reason}")]
    InvalidObservation { reason: String },

    /// Internal signal: this node is not (or no longer) the leader.
    #[error("not leader")]
    NotLeader,
}

impl EngineError {
    pub fn store_unavailable(detail: impl fmt::Display) -> Self {
        EngineError::StoreUnavailable(detail.to_string())
    }

    pub fn store_error(detail: impl fmt::Display) -> Self {
        EngineError::StoreError {
            detail: detail.to_string(),
        }
    }

    pub fn invalid_observation(reason: impl fmt::Display) -> Self {
        EngineError::InvalidObservation {
            reason: reason.to_string(),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;
