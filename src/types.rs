//! Shared data model: inbound outcome events, the per-learner metrics
//! profile mutated by the pipeline, appended metric snapshots, and the
//! read-only summary projection returned to callers.

use std::collections::{BTreeSet, HashMap, VecDeque};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Clamp a probability-like value into [0,1]. Applied at every write site so
/// no profile field can drift out of range.
pub fn clamp01(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

/// One completed exercise, as reported by the learning flow.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExerciseOutcome {
    pub exercise_id: String,
    /// Exercise category; inferred from the exercise id when absent.
    pub exercise_type: Option<String>,
    /// Normalized score in [0,1].
    pub score: f64,
    pub time_spent_seconds: f64,
    pub attempts: u32,
    /// Per-skill scores in [0,1] contributed by this exercise.
    pub skill_scores: HashMap<String, f64>,
    pub error_types: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl ExerciseOutcome {
    /// Exercise ids follow a `<type><sep><rest>` convention in the source
    /// content pipeline; the prefix up to the first separator is the type.
    pub fn resolved_exercise_type(&self) -> String {
        if let Some(ref t) = self.exercise_type {
            if !t.trim().is_empty() {
                return t.trim().to_string();
            }
        }
        let prefix = self
            .exercise_id
            .split(['-', '_', ':'])
            .next()
            .unwrap_or_default()
            .trim();
        if prefix.is_empty() {
            "general".to_string()
        } else {
            prefix.to_string()
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricValue {
    pub value: f64,
    pub recorded_at: DateTime<Utc>,
}

/// Immutable time-series point appended to the history store.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetricSnapshot {
    pub id: Uuid,
    pub user_id: String,
    pub metric_id: String,
    pub timestamp: DateTime<Utc>,
    pub value: f64,
    pub metadata: HashMap<String, String>,
}

impl MetricSnapshot {
    pub fn new(
        user_id: &str,
        metric_id: &str,
        value: f64,
        timestamp: DateTime<Utc>,
        metadata: HashMap<String, String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            user_id: user_id.to_string(),
            metric_id: metric_id.to_string(),
            timestamp,
            value,
            metadata,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LevelChange {
    pub level: String,
    pub achieved_at: DateTime<Utc>,
    pub days_at_previous_level: f64,
}

pub const MAX_LEVEL_HISTORY: usize = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressionMetrics {
    /// Ordinal-encodable level code, e.g. "A1".."C2".
    pub current_level: String,
    /// Progress within the current level, [0,1].
    pub progress_in_level: f64,
    pub level_history: VecDeque<LevelChange>,
    /// Levels per month, derived from the level history.
    pub progression_speed: f64,
}

impl Default for ProgressionMetrics {
    fn default() -> Self {
        Self {
            current_level: "A1".to_string(),
            progress_in_level: 0.0,
            level_history: VecDeque::new(),
            progression_speed: 0.0,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScoreSample {
    pub score: f64,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PerformanceMetrics {
    pub total_exercises: u64,
    /// Overall success rate, [0,1].
    pub success_rate: f64,
    pub success_rate_by_type: HashMap<String, f64>,
    pub success_rate_by_skill: HashMap<String, f64>,
    /// Sample counts backing the per-key cumulative-mean updates.
    pub exercises_by_type: HashMap<String, u64>,
    pub attempts_by_skill: HashMap<String, u64>,
    /// Most-recent scores, oldest evicted first.
    pub recent_scores: VecDeque<ScoreSample>,
    pub average_time_seconds: f64,
    pub average_time_by_type: HashMap<String, f64>,
    /// Decaying frequency estimate per error type, [0,1].
    pub error_rates: HashMap<String, f64>,
    /// Signed slope of recent scores, scaled by the rolling window.
    pub performance_trend: f64,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ForgettingSample {
    pub days_from_last_practice: f64,
    pub retention_rate: f64,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MasteryMetrics {
    /// Per-skill mastery estimate, [0,1].
    pub skill_mastery_levels: HashMap<String, f64>,
    /// Skills in first-practiced order. Drives the stable tie-break of the
    /// recommendation ranking, so ordering matters.
    pub practiced_skills: Vec<String>,
    pub mastered_skills: BTreeSet<String>,
    pub weakness_skills: BTreeSet<String>,
    pub mastered_skills_count: usize,
    pub forgetting_curves: HashMap<String, Vec<ForgettingSample>>,
    /// Retention sampled at the reference horizon (day 5).
    pub retention_rates: HashMap<String, f64>,
    /// EMA of how closely scores track the mastery estimate, [0,1].
    pub performance_consistency: HashMap<String, f64>,
    /// Adaptive step size per skill, clamped to [0.001, 0.1].
    pub skill_acquisition_rates: HashMap<String, f64>,
    pub last_practiced: HashMap<String, DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementMetrics {
    pub total_sessions: u64,
    pub average_session_duration_seconds: f64,
    pub total_time_seconds: f64,
    pub current_streak_days: u32,
    pub longest_streak_days: u32,
    pub last_active: Option<DateTime<Utc>>,
    /// Running duration of the session currently in progress.
    pub current_session_seconds: f64,
}

/// The per-learner profile owned by this engine. Mutated only through the
/// orchestrator pipeline; trackers return updated copies of their section.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserMetricsProfile {
    pub user_id: String,
    pub progression: ProgressionMetrics,
    pub performance: PerformanceMetrics,
    pub mastery: MasteryMetrics,
    pub engagement: EngagementMetrics,
    pub custom_metrics: HashMap<String, MetricValue>,
    pub standard_metrics: HashMap<String, MetricValue>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl UserMetricsProfile {
    pub fn new(user_id: &str, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.to_string(),
            progression: ProgressionMetrics::default(),
            performance: PerformanceMetrics::default(),
            mastery: MasteryMetrics::default(),
            engagement: EngagementMetrics::default(),
            custom_metrics: HashMap::new(),
            standard_metrics: HashMap::new(),
            created_at: now,
            updated_at: now,
        }
    }
}

/// Read-only projection handed back to the learning façade after ingest.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileSummary {
    pub user_id: String,
    pub current_level: String,
    pub progress_in_level: f64,
    pub mastered_skills_count: usize,
    pub success_rate: f64,
    pub total_exercises_completed: u64,
    pub average_session_duration: f64,
    pub weakness_areas: Vec<String>,
    pub strength_areas: Vec<String>,
    pub custom_metrics: HashMap<String, MetricValue>,
}

impl ProfileSummary {
    pub fn from_profile(profile: &UserMetricsProfile) -> Self {
        Self {
            user_id: profile.user_id.clone(),
            current_level: profile.progression.current_level.clone(),
            progress_in_level: profile.progression.progress_in_level,
            mastered_skills_count: profile.mastery.mastered_skills_count,
            success_rate: profile.performance.success_rate,
            total_exercises_completed: profile.performance.total_exercises,
            average_session_duration: profile.engagement.average_session_duration_seconds,
            weakness_areas: profile.mastery.weakness_skills.iter().cloned().collect(),
            strength_areas: profile.mastery.mastered_skills.iter().cloned().collect(),
            custom_metrics: profile.custom_metrics.clone(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecommendedConcept {
    pub concept: String,
    pub priority: f64,
    pub mastery_level: f64,
    pub days_since_practice: f64,
    pub reason: String,
}
