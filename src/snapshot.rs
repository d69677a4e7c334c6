//! Snapshot throttler: rate-limited recorder of named metric values into the
//! history store, one gate per user. Custom metrics bypass the gate.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use tracing::warn;

use crate::config::SnapshotParams;
use crate::store::HistoryStore;
use crate::types::{MetricSnapshot, UserMetricsProfile};

pub struct SnapshotThrottler<H> {
    history: Arc<H>,
    params: SnapshotParams,
    last_snapshot: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl<H: HistoryStore> SnapshotThrottler<H> {
    pub fn new(history: Arc<H>, params: SnapshotParams) -> Self {
        Self {
            history,
            params,
            last_snapshot: Mutex::new(HashMap::new()),
        }
    }

    /// Records the batch unless the user's gate is still closed. Returns
    /// whether anything was written. Append failures are logged and do not
    /// fail the caller.
    pub async fn try_record(
        &self,
        user_id: &str,
        metrics: &[(String, f64)],
        metadata: &HashMap<String, String>,
        now: DateTime<Utc>,
    ) -> bool {
        if !self.params.enabled || metrics.is_empty() {
            return false;
        }

        let min_interval =
            Duration::from_std(self.params.min_interval).unwrap_or_else(|_| Duration::seconds(300));
        {
            let gates = self.last_snapshot.lock();
            if let Some(last) = gates.get(user_id) {
                if now - *last < min_interval {
                    return false;
                }
            }
        }

        for (metric_id, value) in metrics {
            let snapshot = MetricSnapshot::new(user_id, metric_id, *value, now, metadata.clone());
            if let Err(err) = self.history.append(snapshot).await {
                warn!(user_id, metric_id, error = %err, "metric snapshot append failed");
            }
        }

        self.last_snapshot
            .lock()
            .insert(user_id.to_string(), now);
        true
    }

    /// Custom metrics are user-supplied and unthrottled.
    pub async fn record_custom(
        &self,
        user_id: &str,
        metric_id: &str,
        value: f64,
        metadata: HashMap<String, String>,
        now: DateTime<Utc>,
    ) {
        let snapshot = MetricSnapshot::new(user_id, metric_id, value, now, metadata);
        if let Err(err) = self.history.append(snapshot).await {
            warn!(user_id, metric_id, error = %err, "custom metric append failed");
        }
    }
}

/// Standard metric paths projected from a profile, recorded on every
/// throttled batch.
pub fn standard_metrics(profile: &UserMetricsProfile) -> Vec<(String, f64)> {
    let mut metrics = vec![
        (
            "performance.successRate".to_string(),
            profile.performance.success_rate,
        ),
        (
            "performance.trend".to_string(),
            profile.performance.performance_trend,
        ),
        (
            "performance.totalExercises".to_string(),
            profile.performance.total_exercises as f64,
        ),
        (
            "performance.averageTimeSeconds".to_string(),
            profile.performance.average_time_seconds,
        ),
        (
            "mastery.masteredSkillsCount".to_string(),
            profile.mastery.mastered_skills_count as f64,
        ),
        (
            "progression.progressInLevel".to_string(),
            profile.progression.progress_in_level,
        ),
        (
            "engagement.averageSessionDuration".to_string(),
            profile.engagement.average_session_duration_seconds,
        ),
    ];
    for (skill, level) in &profile.mastery.skill_mastery_levels {
        metrics.push((format!("mastery.skill.{skill}"), *level));
    }
    metrics
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::InMemoryHistoryStore;

    fn throttler(history: Arc<InMemoryHistoryStore>) -> SnapshotThrottler<InMemoryHistoryStore> {
        SnapshotThrottler::new(history, SnapshotParams::default())
    }

    fn sample_metrics() -> Vec<(String, f64)> {
        vec![("performance.successRate".to_string(), 0.8)]
    }

    #[tokio::test]
    async fn test_throttle_gate_per_user() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let t = throttler(Arc::clone(&history));
        let base = Utc::now();
        let metadata = HashMap::new();

        // First call writes.
        assert!(t.try_record("u1", &sample_metrics(), &metadata, base).await);
        // 10 seconds later: inside the 5-minute window, no-op.
        assert!(
            !t.try_record("u1", &sample_metrics(), &metadata, base + Duration::seconds(10))
                .await
        );
        // 6 minutes later: gate reopens.
        assert!(
            t.try_record("u1", &sample_metrics(), &metadata, base + Duration::minutes(6))
                .await
        );

        assert_eq!(history.count_for_user("u1").await, 2);
    }

    #[tokio::test]
    async fn test_gates_are_independent_per_user() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let t = throttler(Arc::clone(&history));
        let now = Utc::now();
        let metadata = HashMap::new();

        assert!(t.try_record("u1", &sample_metrics(), &metadata, now).await);
        assert!(t.try_record("u2", &sample_metrics(), &metadata, now).await);
    }

    #[tokio::test]
    async fn test_custom_metrics_bypass_throttle() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let t = throttler(Arc::clone(&history));
        let now = Utc::now();

        t.try_record("u1", &sample_metrics(), &HashMap::new(), now)
            .await;
        for i in 0..3 {
            t.record_custom(
                "u1",
                "custom.focus",
                i as f64,
                HashMap::new(),
                now + Duration::seconds(i),
            )
            .await;
        }

        assert_eq!(history.count_for_user("u1").await, 4);
    }

    #[tokio::test]
    async fn test_disabled_throttler_writes_nothing() {
        let history = Arc::new(InMemoryHistoryStore::new());
        let t = SnapshotThrottler::new(
            Arc::clone(&history),
            SnapshotParams {
                enabled: false,
                ..Default::default()
            },
        );

        assert!(
            !t.try_record("u1", &sample_metrics(), &HashMap::new(), Utc::now())
                .await
        );
        assert_eq!(history.count_for_user("u1").await, 0);
    }

    #[test]
    fn test_standard_metrics_include_skills() {
        let mut profile = UserMetricsProfile::new("u1", Utc::now());
        profile
            .mastery
            .skill_mastery_levels
            .insert("vocab".to_string(), 0.62);

        let metrics = standard_metrics(&profile);
        assert!(metrics
            .iter()
            .any(|(id, v)| id == "mastery.skill.vocab" && (*v - 0.62).abs() < 1e-12));
        assert!(metrics.iter().any(|(id, _)| id == "performance.successRate"));
    }
}
