//! At-most-one leader via a renewable single-key lease, with per-node
//! heartbeat diagnostic keys. The only coordination primitives used are
//! the store's atomic `set_if_absent_with_ttl` to acquire an unheld
//! lease and `renew_if_owner` to keep one: no external consensus, and no
//! window where a node could renew a lease it no longer holds.

use crate::error::Result;
use crate::store::{keys, StoreAdapter};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Leader,
    Follower,
}

/// Attempt to become, or remain, leader for this node. Each call
/// re-derives the node's role from the store rather than holding one
/// across calls, so the follower/candidate/leader progression collapses
/// into one round-trip (or two, if the lease is contended) per
/// invocation.
///
/// A store-unavailable condition surfaces as an `Err` here and aborts
/// the caller's step; a lost or contended lease is not an error, just a
/// `Role::Follower` result.
pub async fn acquire_or_renew(store: &dyn StoreAdapter, node_id: &str, heartbeat_ttl_seconds: u64) -> Result<Role> {
    let acquired = store
        .set_if_absent_with_ttl(keys::ELECTION_MASTER, node_id, heartbeat_ttl_seconds)
        .await?;

    if acquired {
        tracing::debug!(node_id = %node_id, "acquired master lease");
        write_heartbeat(store, node_id, heartbeat_ttl_seconds).await?;
        return Ok(Role::Leader);
    }

    // The key was already held by someone. Renewal is value-guarded: it
    // only succeeds if this node is still the owner at the instant the
    // store applies it, so a lease that expired and was re-acquired by
    // another node in between cannot be clobbered.
    let renewed = store
        .renew_if_owner(keys::ELECTION_MASTER, node_id, heartbeat_ttl_seconds)
        .await?;

    if renewed {
        write_heartbeat(store, node_id, heartbeat_ttl_seconds).await?;
        Ok(Role::Leader)
    } else {
        tracing::debug!(node_id = %node_id, "lease held by another node or lost the race, remaining follower");
        Ok(Role::Follower)
    }
}

async fn write_heartbeat(store: &dyn StoreAdapter, node_id: &str, heartbeat_ttl_seconds: u64) -> Result<()> {
    store
        .set_with_ttl(&keys::heartbeat_key(node_id), node_id, heartbeat_ttl_seconds)
        .await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryStore;

    #[tokio::test]
    async fn first_caller_becomes_leader() {
        let store = InMemoryStore::new();
        let role = acquire_or_renew(&store, "node-a", 10).await.unwrap();
        assert_eq!(role, Role::Leader);
        assert_eq!(store.get(keys::ELECTION_MASTER).await.unwrap(), Some("node-a".to_string()));
    }

    #[tokio::test]
    async fn second_node_remains_follower() {
        let store = InMemoryStore::new();
        acquire_or_renew(&store, "node-a", 10).await.unwrap();
        let role = acquire_or_renew(&store, "node-b", 10).await.unwrap();
        assert_eq!(role, Role::Follower);
    }

    #[tokio::test]
    async fn leader_renews_its_own_lease() {
        let store = InMemoryStore::new();
        acquire_or_renew(&store, "node-a", 10).await.unwrap();
        let role = acquire_or_renew(&store, "node-a", 10).await.unwrap();
        assert_eq!(role, Role::Leader);
    }

    #[tokio::test]
    async fn heartbeat_key_is_written_for_the_leader() {
        let store = InMemoryStore::new();
        acquire_or_renew(&store, "node-a", 10).await.unwrap();
        let hb = store.get(&keys::heartbeat_key("node-a")).await.unwrap();
        assert_eq!(hb, Some("node-a".to_string()));
    }

    #[tokio::test]
    async fn deleting_the_lease_lets_another_node_take_over() {
        let store = InMemoryStore::new();
        acquire_or_renew(&store, "node-a", 10).await.unwrap();
        store.delete(keys::ELECTION_MASTER).await.unwrap();
        let role = acquire_or_renew(&store, "node-b", 10).await.unwrap();
        assert_eq!(role, Role::Leader);
    }
}
