//! Persistence seams. The engine only requires a key-value profile store and
//! an append-only metric-history store; concrete backends (database, file,
//! network) live outside this crate and implement these traits.

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use tokio::sync::RwLock;

use crate::error::StoreError;
use crate::types::{MetricSnapshot, UserMetricsProfile};

pub trait ProfileStore: Send + Sync {
    fn load(
        &self,
        user_id: &str,
    ) -> impl Future<Output = Result<Option<UserMetricsProfile>, StoreError>> + Send;

    fn save(
        &self,
        profile: &UserMetricsProfile,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn delete(&self, user_id: &str) -> impl Future<Output = Result<bool, StoreError>> + Send;
}

/// Time-range filter for history queries. Results are ordered by timestamp
/// ascending.
#[derive(Debug, Clone, Default)]
pub struct SnapshotQuery {
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
    pub limit: Option<usize>,
    pub offset: usize,
}

pub trait HistoryStore: Send + Sync {
    fn append(&self, snapshot: MetricSnapshot) -> impl Future<Output = Result<(), StoreError>> + Send;

    fn query(
        &self,
        user_id: &str,
        metric_id: &str,
        query: &SnapshotQuery,
    ) -> impl Future<Output = Result<Vec<MetricSnapshot>, StoreError>> + Send;

    /// Retention-policy hook: drops snapshots older than `cutoff` and
    /// returns how many were removed. Scheduling is the caller's concern.
    fn prune_before(
        &self,
        cutoff: DateTime<Utc>,
    ) -> impl Future<Output = Result<usize, StoreError>> + Send;
}

/// Curricular priority of a concept, [0,1]. Absent concepts fall back to the
/// configured default.
pub trait ImportanceProvider: Send + Sync {
    fn importance(&self, concept: &str) -> Option<f64>;
}

#[derive(Debug, Default, Clone)]
pub struct StaticImportance {
    table: HashMap<String, f64>,
}

impl StaticImportance {
    pub fn new(table: HashMap<String, f64>) -> Self {
        Self { table }
    }
}

impl ImportanceProvider for StaticImportance {
    fn importance(&self, concept: &str) -> Option<f64> {
        self.table.get(concept).copied()
    }
}

/// Reference profile store backed by an in-process map. Used in tests and as
/// the default backend for embedded deployments.
#[derive(Default)]
pub struct InMemoryProfileStore {
    profiles: RwLock<HashMap<String, UserMetricsProfile>>,
}

impl InMemoryProfileStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.profiles.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.profiles.read().await.is_empty()
    }
}

impl ProfileStore for InMemoryProfileStore {
    async fn load(&self, user_id: &str) -> Result<Option<UserMetricsProfile>, StoreError> {
        Ok(self.profiles.read().await.get(user_id).cloned())
    }

    async fn save(&self, profile: &UserMetricsProfile) -> Result<(), StoreError> {
        self.profiles
            .write()
            .await
            .insert(profile.user_id.clone(), profile.clone());
        Ok(())
    }

    async fn delete(&self, user_id: &str) -> Result<bool, StoreError> {
        Ok(self.profiles.write().await.remove(user_id).is_some())
    }
}

/// Reference append-only history store. Snapshots are kept per user in
/// arrival order and sorted by timestamp at query time.
#[derive(Default)]
pub struct InMemoryHistoryStore {
    snapshots: RwLock<HashMap<String, Vec<MetricSnapshot>>>,
}

impl InMemoryHistoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn count_for_user(&self, user_id: &str) -> usize {
        self.snapshots
            .read()
            .await
            .get(user_id)
            .map(|s| s.len())
            .unwrap_or(0)
    }
}

impl HistoryStore for InMemoryHistoryStore {
    async fn append(&self, snapshot: MetricSnapshot) -> Result<(), StoreError> {
        self.snapshots
            .write()
            .await
            .entry(snapshot.user_id.clone())
            .or_default()
            .push(snapshot);
        Ok(())
    }

    async fn query(
        &self,
        user_id: &str,
        metric_id: &str,
        query: &SnapshotQuery,
    ) -> Result<Vec<MetricSnapshot>, StoreError> {
        let guard = self.snapshots.read().await;
        let mut matched: Vec<MetricSnapshot> = guard
            .get(user_id)
            .map(|all| {
                all.iter()
                    .filter(|s| s.metric_id == metric_id)
                    .filter(|s| query.start.map(|t| s.timestamp >= t).unwrap_or(true))
                    .filter(|s| query.end.map(|t| s.timestamp <= t).unwrap_or(true))
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();

        matched.sort_by_key(|s| s.timestamp);
        let offset = query.offset.min(matched.len());
        let mut page: Vec<MetricSnapshot> = matched.split_off(offset);
        if let Some(limit) = query.limit {
            page.truncate(limit);
        }
        Ok(page)
    }

    async fn prune_before(&self, cutoff: DateTime<Utc>) -> Result<usize, StoreError> {
        let mut guard = self.snapshots.write().await;
        let mut removed = 0;
        for snapshots in guard.values_mut() {
            let before = snapshots.len();
            snapshots.retain(|s| s.timestamp >= cutoff);
            removed += before - snapshots.len();
        }
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn snapshot(user: &str, metric: &str, value: f64, at: DateTime<Utc>) -> MetricSnapshot {
        MetricSnapshot::new(user, metric, value, at, HashMap::new())
    }

    #[tokio::test]
    async fn test_profile_store_round_trip() {
        let store = InMemoryProfileStore::new();
        let profile = UserMetricsProfile::new("u1", Utc::now());

        assert!(store.load("u1").await.unwrap().is_none());
        store.save(&profile).await.unwrap();
        let loaded = store.load("u1").await.unwrap().unwrap();
        assert_eq!(loaded.user_id, "u1");
        assert!(store.delete("u1").await.unwrap());
        assert!(!store.delete("u1").await.unwrap());
    }

    #[tokio::test]
    async fn test_history_query_filters_and_orders() {
        let store = InMemoryHistoryStore::new();
        let base = Utc::now();
        // Appended out of order on purpose.
        store
            .append(snapshot("u1", "successRate", 0.5, base + Duration::hours(2)))
            .await
            .unwrap();
        store
            .append(snapshot("u1", "successRate", 0.3, base))
            .await
            .unwrap();
        store
            .append(snapshot("u1", "other", 1.0, base + Duration::hours(1)))
            .await
            .unwrap();

        let all = store
            .query("u1", "successRate", &SnapshotQuery::default())
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(all[0].timestamp < all[1].timestamp);

        let limited = store
            .query(
                "u1",
                "successRate",
                &SnapshotQuery {
                    limit: Some(1),
                    offset: 1,
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert_eq!(limited.len(), 1);
        assert!((limited[0].value - 0.5).abs() < 1e-12);
    }

    #[tokio::test]
    async fn test_prune_before() {
        let store = InMemoryHistoryStore::new();
        let base = Utc::now();
        store
            .append(snapshot("u1", "m", 1.0, base - Duration::days(10)))
            .await
            .unwrap();
        store
            .append(snapshot("u1", "m", 2.0, base))
            .await
            .unwrap();

        let removed = store.prune_before(base - Duration::days(1)).await.unwrap();
        assert_eq!(removed, 1);
        assert_eq!(store.count_for_user("u1").await, 1);
    }

    #[test]
    fn test_static_importance_lookup() {
        let table = HashMap::from([("vocab".to_string(), 0.9)]);
        let provider = StaticImportance::new(table);
        assert_eq!(provider.importance("vocab"), Some(0.9));
        assert_eq!(provider.importance("grammar"), None);
    }
}
