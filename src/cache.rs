//! TTL cache over the pluggable profile store. Owns no business logic: it
//! only decides when a cached profile is stale and writes through on save.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use rand::Rng;
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::CacheParams;
use crate::store::ProfileStore;
use crate::types::UserMetricsProfile;

const TTL_JITTER_RATIO: f64 = 0.1;

struct CacheEntry {
    profile: UserMetricsProfile,
    expires_at: Instant,
    last_access: Instant,
}

pub struct ProfileCache<S> {
    store: Arc<S>,
    params: CacheParams,
    persist_timeout: Duration,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl<S: ProfileStore> ProfileCache<S> {
    pub fn new(store: Arc<S>, params: CacheParams, persist_timeout: Duration) -> Self {
        Self {
            store,
            params,
            persist_timeout,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Cached profile if fresh; otherwise the stored one; otherwise a new
    /// default built by `factory`. The factory result is cached but not
    /// persisted until the first save.
    pub async fn get_or_create<F>(&self, user_id: &str, factory: F) -> UserMetricsProfile
    where
        F: FnOnce() -> UserMetricsProfile,
    {
        let now = Instant::now();
        {
            let mut entries = self.entries.write().await;
            if let Some(entry) = entries.get_mut(user_id) {
                if entry.expires_at > now {
                    entry.last_access = now;
                    return entry.profile.clone();
                }
                entries.remove(user_id);
            }
        }

        let profile = match self.store.load(user_id).await {
            Ok(Some(profile)) => profile,
            Ok(None) => factory(),
            Err(err) => {
                warn!(user_id, error = %err, "profile load failed, building default");
                factory()
            }
        };

        self.insert(profile.clone()).await;
        profile
    }

    /// Write-through save. A store failure or timeout is logged and
    /// swallowed; the cached copy stays authoritative for this process.
    pub async fn save(&self, profile: &UserMetricsProfile) {
        self.insert(profile.clone()).await;

        let result =
            tokio::time::timeout(self.persist_timeout, self.store.save(profile)).await;
        match result {
            Ok(Ok(())) => {}
            Ok(Err(err)) => {
                warn!(user_id = %profile.user_id, error = %err, "profile persist failed");
            }
            Err(_) => {
                warn!(user_id = %profile.user_id, "profile persist timed out");
            }
        }
    }

    pub async fn invalidate(&self, user_id: &str) {
        self.entries.write().await.remove(user_id);
    }

    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    async fn insert(&self, profile: UserMetricsProfile) {
        let now = Instant::now();
        let mut entries = self.entries.write().await;
        entries.insert(
            profile.user_id.clone(),
            CacheEntry {
                profile,
                expires_at: now + apply_ttl_jitter(self.params.ttl),
                last_access: now,
            },
        );

        if entries.len() > self.params.max_entries {
            entries.retain(|_, e| e.expires_at > now);
        }
        while entries.len() > self.params.max_entries {
            let stalest = entries
                .iter()
                .min_by_key(|(_, e)| e.last_access)
                .map(|(k, _)| k.clone());
            match stalest {
                Some(key) => {
                    entries.remove(&key);
                }
                None => break,
            }
        }
    }
}

fn apply_ttl_jitter(ttl: Duration) -> Duration {
    if ttl.is_zero() {
        return ttl;
    }
    let base_ms = ttl.as_millis() as f64;
    let mut rng = rand::rng();
    let factor = rng.random_range(1.0 - TTL_JITTER_RATIO..=1.0 + TTL_JITTER_RATIO);
    let jittered_ms = (base_ms * factor).round().max(1.0);
    Duration::from_millis(jittered_ms as u64)
}
