use std::collections::HashMap;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::StoreAdapter;
use crate::error::Result;

struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        match self.expires_at {
            Some(deadline) => deadline > now,
            None => true,
        }
    }
}

/// In-process [`StoreAdapter`] backed by a map guarded by a single
/// mutex. Used by this crate's own tests, and by callers who want the
/// grouper/filter/election logic without standing up a store: the
/// grouper stays purely functional over an immutable snapshot so it can
/// be tested without the store.
#[derive(Default)]
pub struct InMemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        InMemoryStore {
            entries: Mutex::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl StoreAdapter for InMemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(entry.value.clone())),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: None,
            },
        );
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(Instant::now() + Duration::from_secs(ttl_seconds)),
            },
        );
        Ok(())
    }

    async fn set_if_absent_with_ttl(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        if let Some(existing) = entries.get(key) {
            if existing.is_live(now) {
                return Ok(false);
            }
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: Some(now + Duration::from_secs(ttl_seconds)),
            },
        );
        Ok(true)
    }

    async fn renew_if_owner(&self, key: &str, expected_value: &str, ttl_seconds: u64) -> Result<bool> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        let holds_expected = matches!(entries.get(key), Some(entry) if entry.is_live(now) && entry.value == expected_value);
        if !holds_expected {
            return Ok(false);
        }
        entries.insert(
            key.to_string(),
            Entry {
                value: expected_value.to_string(),
                expires_at: Some(now + Duration::from_secs(ttl_seconds)),
            },
        );
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<()> {
        let mut entries = self.entries.lock().await;
        entries.remove(key);
        Ok(())
    }

    async fn scan_by_prefix(&self, prefix: &str) -> Result<Vec<String>> {
        let now = Instant::now();
        let mut entries = self.entries.lock().await;
        entries.retain(|_, entry| entry.is_live(now));
        Ok(entries
            .keys()
            .filter(|key| key.starts_with(prefix))
            .cloned()
            .collect())
    }
}
