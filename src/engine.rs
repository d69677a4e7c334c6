//! Analytics orchestrator: sequences cache → performance → mastery →
//! engagement → snapshots → persist for each incoming outcome, serializing
//! updates per user so rolling counters and EMAs never interleave.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Datelike, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::debug;

use crate::cache::ProfileCache;
use crate::config::AnalyticsConfig;
use crate::error::AnalyticsError;
use crate::mastery::MasteryTracker;
use crate::performance::PerformanceTracker;
use crate::recommend::RecommendationEngine;
use crate::snapshot::{standard_metrics, SnapshotThrottler};
use crate::stats;
use crate::store::{HistoryStore, ImportanceProvider, ProfileStore};
use crate::types::{
    clamp01, EngagementMetrics, ExerciseOutcome, LevelChange, MetricValue, ProfileSummary,
    RecommendedConcept, UserMetricsProfile, MAX_LEVEL_HISTORY,
};

const DAYS_PER_MONTH: f64 = 30.44;

/// Idle per-user lock entries are swept once the map grows past this.
const MAX_IDLE_USER_LOCKS: usize = 1024;

pub struct AnalyticsEngine<P, H> {
    config: AnalyticsConfig,
    cache: ProfileCache<P>,
    performance: PerformanceTracker,
    mastery: MasteryTracker,
    recommender: RecommendationEngine,
    throttler: SnapshotThrottler<H>,
    importance: Arc<dyn ImportanceProvider>,
    user_locks: RwLock<HashMap<String, Arc<Mutex<()>>>>,
}

impl<P: ProfileStore, H: HistoryStore> AnalyticsEngine<P, H> {
    pub fn new(
        config: AnalyticsConfig,
        profile_store: Arc<P>,
        history_store: Arc<H>,
        importance: Arc<dyn ImportanceProvider>,
    ) -> Self {
        Self {
            cache: ProfileCache::new(
                profile_store,
                config.cache.clone(),
                config.persist_timeout,
            ),
            performance: PerformanceTracker::new(config.performance.clone()),
            mastery: MasteryTracker::new(config.mastery.clone()),
            recommender: RecommendationEngine::new(config.recommendation.clone()),
            throttler: SnapshotThrottler::new(history_store, config.snapshot.clone()),
            importance,
            user_locks: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Applies one exercise outcome to the user's profile and returns the
    /// updated summary. Updates for the same user are applied as a single
    /// atomic unit; different users proceed in parallel.
    pub async fn ingest(
        &self,
        user_id: &str,
        outcome: &ExerciseOutcome,
    ) -> Result<ProfileSummary, AnalyticsError> {
        validate(user_id, outcome)?;

        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;

        let mut profile = self
            .cache
            .get_or_create(user_id, || {
                UserMetricsProfile::new(user_id, outcome.timestamp)
            })
            .await;

        profile.performance = self.performance.update(&profile.performance, outcome);
        profile.mastery = self.mastery.update(&profile.mastery, outcome);
        update_engagement(
            &mut profile.engagement,
            outcome,
            Duration::from_std(self.config.engagement.session_gap)
                .unwrap_or_else(|_| Duration::minutes(30)),
        );
        profile.updated_at = outcome.timestamp;

        if self.config.snapshot.enabled {
            let mut metrics = standard_metrics(&profile);
            let exercise_type = outcome.resolved_exercise_type();
            metrics.push((
                format!("event.timeByType.{exercise_type}"),
                outcome.time_spent_seconds,
            ));
            for (skill, score) in &outcome.skill_scores {
                metrics.push((format!("event.skillScore.{skill}"), clamp01(*score)));
            }
            let metadata = HashMap::from([
                ("exerciseId".to_string(), outcome.exercise_id.clone()),
                ("exerciseType".to_string(), exercise_type),
            ]);
            let recorded = self
                .throttler
                .try_record(user_id, &metrics, &metadata, outcome.timestamp)
                .await;
            debug!(user_id, recorded, "snapshot batch attempted");
        }

        self.cache.save(&profile).await;
        Ok(ProfileSummary::from_profile(&profile))
    }

    /// Read-only summary; creates the profile lazily for unknown users.
    pub async fn summary(&self, user_id: &str) -> Result<ProfileSummary, AnalyticsError> {
        if user_id.trim().is_empty() {
            return Err(AnalyticsError::Validation("userId is empty".to_string()));
        }
        let profile = self
            .cache
            .get_or_create(user_id, || UserMetricsProfile::new(user_id, Utc::now()))
            .await;
        Ok(ProfileSummary::from_profile(&profile))
    }

    /// Priority-ordered review candidates for the user.
    pub async fn recommend(
        &self,
        user_id: &str,
        count: Option<usize>,
    ) -> Result<Vec<RecommendedConcept>, AnalyticsError> {
        if user_id.trim().is_empty() {
            return Err(AnalyticsError::Validation("userId is empty".to_string()));
        }
        let profile = self
            .cache
            .get_or_create(user_id, || UserMetricsProfile::new(user_id, Utc::now()))
            .await;
        let count = count.unwrap_or_else(|| self.recommender.default_count());
        Ok(self.recommender.recommend_next_concepts(
            &profile,
            count,
            self.importance.as_ref(),
            Utc::now(),
        ))
    }

    /// Named custom metric: stored on the profile and appended to history,
    /// bypassing the snapshot throttle.
    pub async fn record_custom_metric(
        &self,
        user_id: &str,
        metric_id: &str,
        value: f64,
    ) -> Result<(), AnalyticsError> {
        if user_id.trim().is_empty() || metric_id.trim().is_empty() {
            return Err(AnalyticsError::Validation(
                "userId and metricId are required".to_string(),
            ));
        }
        if !value.is_finite() {
            return Err(AnalyticsError::Validation(
                "metric value must be finite".to_string(),
            ));
        }

        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;
        let now = Utc::now();

        let mut profile = self
            .cache
            .get_or_create(user_id, || UserMetricsProfile::new(user_id, now))
            .await;
        profile.custom_metrics.insert(
            metric_id.to_string(),
            MetricValue {
                value,
                recorded_at: now,
            },
        );
        profile.updated_at = now;

        self.throttler
            .record_custom(user_id, metric_id, value, HashMap::new(), now)
            .await;
        self.cache.save(&profile).await;
        Ok(())
    }

    /// Records a level-up: appends to the bounded level history and
    /// recomputes the progression speed (levels per month) from it.
    pub async fn record_level_change(
        &self,
        user_id: &str,
        new_level: &str,
    ) -> Result<(), AnalyticsError> {
        if user_id.trim().is_empty() || new_level.trim().is_empty() {
            return Err(AnalyticsError::Validation(
                "userId and level are required".to_string(),
            ));
        }

        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;
        let now = Utc::now();

        let mut profile = self
            .cache
            .get_or_create(user_id, || UserMetricsProfile::new(user_id, now))
            .await;

        let previous_since = profile
            .progression
            .level_history
            .back()
            .map(|c| c.achieved_at)
            .unwrap_or(profile.created_at);
        let days_at_previous = ((now - previous_since).num_seconds() as f64 / 86_400.0).max(0.0);

        profile.progression.level_history.push_back(LevelChange {
            level: new_level.to_string(),
            achieved_at: now,
            days_at_previous_level: days_at_previous,
        });
        while profile.progression.level_history.len() > MAX_LEVEL_HISTORY {
            profile.progression.level_history.pop_front();
        }

        profile.progression.progression_speed =
            progression_speed(&profile.progression.level_history);
        profile.progression.current_level = new_level.to_string();
        profile.progression.progress_in_level = 0.0;
        profile.updated_at = now;

        self.cache.save(&profile).await;
        Ok(())
    }

    /// Caller-reported progress within the current level, clamped to [0,1].
    pub async fn set_level_progress(
        &self,
        user_id: &str,
        progress: f64,
    ) -> Result<(), AnalyticsError> {
        if user_id.trim().is_empty() {
            return Err(AnalyticsError::Validation("userId is empty".to_string()));
        }
        if !progress.is_finite() {
            return Err(AnalyticsError::Validation(
                "progress must be finite".to_string(),
            ));
        }

        let lock = self.user_lock(user_id).await;
        let _guard = lock.lock().await;
        let now = Utc::now();

        let mut profile = self
            .cache
            .get_or_create(user_id, || UserMetricsProfile::new(user_id, now))
            .await;
        profile.progression.progress_in_level = clamp01(progress);
        profile.updated_at = now;
        self.cache.save(&profile).await;
        Ok(())
    }

    async fn user_lock(&self, user_id: &str) -> Arc<Mutex<()>> {
        {
            let locks = self.user_locks.read().await;
            if let Some(lock) = locks.get(user_id) {
                return Arc::clone(lock);
            }
        }
        let mut locks = self.user_locks.write().await;
        if locks.len() >= MAX_IDLE_USER_LOCKS && !locks.contains_key(user_id) {
            // A strong count of 1 means only the map holds the lock, so no
            // task is inside or waiting on it.
            locks.retain(|_, lock| Arc::strong_count(lock) > 1);
        }
        Arc::clone(
            locks
                .entry(user_id.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(()))),
        )
    }
}

fn validate(user_id: &str, outcome: &ExerciseOutcome) -> Result<(), AnalyticsError> {
    if user_id.trim().is_empty() {
        return Err(AnalyticsError::Validation("userId is empty".to_string()));
    }
    if outcome.exercise_id.trim().is_empty() {
        return Err(AnalyticsError::Validation(
            "exerciseId is empty".to_string(),
        ));
    }
    if !outcome.score.is_finite() {
        return Err(AnalyticsError::Validation(
            "score must be finite".to_string(),
        ));
    }
    if !outcome.time_spent_seconds.is_finite() || outcome.time_spent_seconds < 0.0 {
        return Err(AnalyticsError::Validation(
            "timeSpentSeconds must be a non-negative finite number".to_string(),
        ));
    }
    for (skill, score) in &outcome.skill_scores {
        if !score.is_finite() {
            return Err(AnalyticsError::Validation(format!(
                "skill score for '{skill}' must be finite"
            )));
        }
    }
    Ok(())
}

fn update_engagement(
    engagement: &mut EngagementMetrics,
    outcome: &ExerciseOutcome,
    session_gap: Duration,
) {
    let now = outcome.timestamp;
    let new_session = engagement
        .last_active
        .map(|last| now - last > session_gap || now < last)
        .unwrap_or(true);

    if new_session {
        engagement.total_sessions += 1;
        engagement.current_session_seconds = outcome.time_spent_seconds;
    } else {
        engagement.current_session_seconds += outcome.time_spent_seconds;
    }

    engagement.total_time_seconds += outcome.time_spent_seconds;
    if engagement.total_sessions > 0 {
        engagement.average_session_duration_seconds =
            engagement.total_time_seconds / engagement.total_sessions as f64;
    }

    update_streak(engagement, now);
    engagement.last_active = Some(now);
}

fn update_streak(engagement: &mut EngagementMetrics, now: DateTime<Utc>) {
    let today = now.date_naive();
    match engagement.last_active.map(|d| d.date_naive()) {
        None => engagement.current_streak_days = 1,
        Some(last_day) if last_day == today => {}
        Some(last_day) => {
            let gap = today.num_days_from_ce() - last_day.num_days_from_ce();
            engagement.current_streak_days = if gap == 1 {
                engagement.current_streak_days + 1
            } else {
                1
            };
        }
    }
    engagement.longest_streak_days = engagement
        .longest_streak_days
        .max(engagement.current_streak_days);
}

/// Levels per month across the recorded history; 0 with fewer than two
/// entries or a degenerate time span.
fn progression_speed(history: &std::collections::VecDeque<LevelChange>) -> f64 {
    let (Some(oldest), Some(newest)) = (history.front(), history.back()) else {
        return 0.0;
    };
    if history.len() < 2 {
        return 0.0;
    }
    let months =
        (newest.achieved_at - oldest.achieved_at).num_seconds() as f64 / (86_400.0 * DAYS_PER_MONTH);
    if months <= 0.0 {
        return 0.0;
    }
    let span = stats::level_to_ordinal(&newest.level) - stats::level_to_ordinal(&oldest.level);
    span / months
}

#[cfg(test)]
mod tests {
    use super::*;

    fn outcome_at(ts: DateTime<Utc>, time_spent: f64) -> ExerciseOutcome {
        ExerciseOutcome {
            exercise_id: "vocab-1".to_string(),
            exercise_type: None,
            score: 0.8,
            time_spent_seconds: time_spent,
            attempts: 1,
            skill_scores: HashMap::new(),
            error_types: Vec::new(),
            timestamp: ts,
        }
    }

    #[test]
    fn test_engagement_sessions_split_on_gap() {
        let mut engagement = EngagementMetrics::default();
        let base = Utc::now();
        let gap = Duration::minutes(30);

        update_engagement(&mut engagement, &outcome_at(base, 60.0), gap);
        update_engagement(
            &mut engagement,
            &outcome_at(base + Duration::minutes(5), 60.0),
            gap,
        );
        assert_eq!(engagement.total_sessions, 1);
        assert!((engagement.current_session_seconds - 120.0).abs() < 1e-9);

        update_engagement(
            &mut engagement,
            &outcome_at(base + Duration::hours(2), 30.0),
            gap,
        );
        assert_eq!(engagement.total_sessions, 2);
        assert!((engagement.average_session_duration_seconds - 75.0).abs() < 1e-9);
    }

    #[test]
    fn test_streak_advances_on_consecutive_days() {
        let mut engagement = EngagementMetrics::default();
        let base = Utc::now();
        let gap = Duration::minutes(30);

        update_engagement(&mut engagement, &outcome_at(base, 10.0), gap);
        assert_eq!(engagement.current_streak_days, 1);

        update_engagement(
            &mut engagement,
            &outcome_at(base + Duration::days(1), 10.0),
            gap,
        );
        assert_eq!(engagement.current_streak_days, 2);

        update_engagement(
            &mut engagement,
            &outcome_at(base + Duration::days(5), 10.0),
            gap,
        );
        assert_eq!(engagement.current_streak_days, 1);
        assert_eq!(engagement.longest_streak_days, 2);
    }

    #[test]
    fn test_progression_speed_from_history() {
        let base = Utc::now();
        let mut history = std::collections::VecDeque::new();
        history.push_back(LevelChange {
            level: "A1".to_string(),
            achieved_at: base,
            days_at_previous_level: 0.0,
        });
        history.push_back(LevelChange {
            level: "A2".to_string(),
            achieved_at: base + Duration::days(30),
            days_at_previous_level: 30.0,
        });

        let speed = progression_speed(&history);
        // One level in roughly a month.
        assert!((speed - 1.0).abs() < 0.05);
        assert_eq!(progression_speed(&std::collections::VecDeque::new()), 0.0);
    }

    #[tokio::test]
    async fn test_user_locks_swept_when_idle() {
        use crate::config::AnalyticsConfig;
        use crate::store::{InMemoryHistoryStore, InMemoryProfileStore, StaticImportance};

        let engine = AnalyticsEngine::new(
            AnalyticsConfig::default(),
            Arc::new(InMemoryProfileStore::new()),
            Arc::new(InMemoryHistoryStore::new()),
            Arc::new(StaticImportance::default()),
        );

        // A lock still held from outside the map must survive the sweep.
        let held = engine.user_lock("pinned").await;

        for i in 0..MAX_IDLE_USER_LOCKS * 2 {
            let lock = engine.user_lock(&format!("u{i}")).await;
            drop(lock);
        }

        let locks = engine.user_locks.read().await;
        assert!(locks.len() <= MAX_IDLE_USER_LOCKS + 1);
        assert!(locks.contains_key("pinned"));
        drop(locks);
        drop(held);
    }

    #[test]
    fn test_validate_rejects_bad_events() {
        let outcome = outcome_at(Utc::now(), 10.0);
        assert!(validate("", &outcome).is_err());
        assert!(validate("u1", &outcome).is_ok());

        let mut bad_score = outcome.clone();
        bad_score.score = f64::NAN;
        assert!(validate("u1", &bad_score).is_err());

        let mut bad_id = outcome.clone();
        bad_id.exercise_id = "  ".to_string();
        assert!(validate("u1", &bad_id).is_err());

        let mut bad_time = outcome;
        bad_time.time_spent_seconds = -5.0;
        assert!(validate("u1", &bad_time).is_err());
    }
}
