use std::time::Duration;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PerformanceParams {
    /// Effective sample count cap for the cumulative-mean updates.
    pub rolling_window: usize,
    /// A score at or above this counts as a success (0/1 sample).
    pub success_threshold: f64,
    /// Bound of the recent-scores ring.
    pub max_recent_scores: usize,
}

impl Default for PerformanceParams {
    fn default() -> Self {
        Self {
            rolling_window: 20,
            success_threshold: 0.6,
            max_recent_scores: 20,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MasteryParams {
    /// EMA smoothing for blending new scores into mastery.
    pub ema_alpha: f64,
    pub mastered_threshold: f64,
    pub weakness_threshold: f64,
    /// EMA smoothing for the score-consistency estimate.
    pub consistency_alpha: f64,
    pub acquisition_seed: f64,
    pub acquisition_min: f64,
    pub acquisition_max: f64,
    /// Forgetting curves are sampled at 0, step, 2*step, ... horizon days.
    pub forgetting_horizon_days: u32,
    pub forgetting_step_days: u32,
    /// Reference horizon for the retention-rate snapshot.
    pub retention_reference_day: f64,
}

impl Default for MasteryParams {
    fn default() -> Self {
        Self {
            ema_alpha: 0.3,
            mastered_threshold: 0.8,
            weakness_threshold: 0.4,
            consistency_alpha: 0.2,
            acquisition_seed: 0.01,
            acquisition_min: 0.001,
            acquisition_max: 0.1,
            forgetting_horizon_days: 30,
            forgetting_step_days: 5,
            retention_reference_day: 5.0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationParams {
    pub default_count: usize,
    pub default_importance: f64,
    /// Days after which the forgetting factor saturates at 1.
    pub forgetting_saturation_days: f64,
    pub mastery_weight: f64,
    pub forgetting_weight: f64,
    pub importance_weight: f64,
}

impl Default for RecommendationParams {
    fn default() -> Self {
        Self {
            default_count: 3,
            default_importance: 0.7,
            forgetting_saturation_days: 30.0,
            mastery_weight: 0.5,
            forgetting_weight: 0.3,
            importance_weight: 0.2,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotParams {
    pub enabled: bool,
    /// Minimum gap between throttled snapshot batches per user.
    pub min_interval: Duration,
}

impl Default for SnapshotParams {
    fn default() -> Self {
        Self {
            enabled: true,
            min_interval: Duration::from_secs(300),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheParams {
    pub ttl: Duration,
    /// Hard bound on cached profiles; stalest entries evicted beyond it.
    pub max_entries: usize,
}

impl Default for CacheParams {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(60),
            max_entries: 10_000,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngagementParams {
    /// Gap after which the next event starts a new session.
    pub session_gap: Duration,
}

impl Default for EngagementParams {
    fn default() -> Self {
        Self {
            session_gap: Duration::from_secs(30 * 60),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalyticsConfig {
    pub performance: PerformanceParams,
    pub mastery: MasteryParams,
    pub recommendation: RecommendationParams,
    pub snapshot: SnapshotParams,
    pub cache: CacheParams,
    pub engagement: EngagementParams,
    /// Upper bound on a single persistence call before it is abandoned.
    pub persist_timeout: Duration,
}

impl Default for AnalyticsConfig {
    fn default() -> Self {
        Self {
            performance: PerformanceParams::default(),
            mastery: MasteryParams::default(),
            recommendation: RecommendationParams::default(),
            snapshot: SnapshotParams::default(),
            cache: CacheParams::default(),
            engagement: EngagementParams::default(),
            persist_timeout: Duration::from_secs(2),
        }
    }
}

impl AnalyticsConfig {
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(val) = std::env::var("ANALYTICS_SNAPSHOTS_ENABLED") {
            config.snapshot.enabled = val.parse().unwrap_or(true);
        }
        if let Ok(val) = std::env::var("ANALYTICS_SNAPSHOT_INTERVAL_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.snapshot.min_interval = Duration::from_secs(secs);
            }
        }
        if let Ok(val) = std::env::var("ANALYTICS_CACHE_TTL_SECS") {
            if let Ok(secs) = val.parse::<u64>() {
                config.cache.ttl = Duration::from_secs(secs);
            }
        }
        if let Ok(val) = std::env::var("ANALYTICS_CACHE_MAX_ENTRIES") {
            if let Ok(n) = val.parse::<usize>() {
                config.cache.max_entries = n.max(1);
            }
        }
        if let Ok(val) = std::env::var("ANALYTICS_PERSIST_TIMEOUT_MS") {
            if let Ok(ms) = val.parse::<u64>() {
                config.persist_timeout = Duration::from_millis(ms);
            }
        }
        if let Ok(val) = std::env::var("ANALYTICS_ROLLING_WINDOW") {
            if let Ok(n) = val.parse::<usize>() {
                config.performance.rolling_window = n.max(1);
            }
        }

        config
    }
}
