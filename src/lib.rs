//! Probabilistic cross-sensor time synchronization and co-occurrence
//! grouping engine.
//!
//! Built leaves first: a store-agnostic [`store::StoreAdapter`], the
//! [`pool`] loader on top of it, the per-sensor [`filter`], the
//! [`grouper`], the lease-based [`election`] coordinator, and
//! [`orchestrator::SyncEngine`], which is the only type most callers
//! need: construct one and call [`orchestrator::SyncEngine::step`] on
//! whatever cadence the host process chooses.

mod config;
mod election;
mod error;
mod filter;
mod grouper;
mod model;
mod orchestrator;
mod pool;
mod record;
mod store;

pub use config::EngineConfig;
pub use error::{EngineError, Result};
pub use model::{Group, Member, Observation, SyncState};
pub use orchestrator::SyncEngine;
pub use store::{InMemoryStore, RedisStore, StoreAdapter};

/// Install a [`tracing_subscriber`] formatter reading `RUST_LOG` (or
/// defaulting to `info`). Optional: host processes that already
/// configure `tracing` should skip this and install their own
/// subscriber instead.
pub fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}
