//! # mastery-analytics
//!
//! Converts raw exercise-completion events into decaying-memory estimates of
//! per-skill mastery, performance trend, and retention, and derives a
//! prioritized list of concepts a learner should review next.
//!
//! The crate is a library-style component: persistence is behind the
//! [`store::ProfileStore`] / [`store::HistoryStore`] seams and everything is
//! wired by explicit dependency injection.
//!
//! ## Module structure
//!
//! - [`stats`]: pure numeric primitives (rolling/weighted/exponential
//!   averages, OLS trend, forgetting-curve retention, CEFR ordinals)
//! - [`types`]: outcome events, the per-learner metrics profile, snapshots
//! - [`cache`]: TTL and size-bounded cache over the profile store
//! - [`performance`] / [`mastery`]: the two incremental trackers
//! - [`recommend`]: priority scoring of review candidates
//! - [`snapshot`]: per-user throttled metric recording
//! - [`engine`]: the orchestrator sequencing the whole pipeline
//!
//! ## Example
//!
//! ```rust
//! use std::collections::HashMap;
//! use std::sync::Arc;
//!
//! use chrono::Utc;
//! use mastery_analytics::config::AnalyticsConfig;
//! use mastery_analytics::engine::AnalyticsEngine;
//! use mastery_analytics::store::{InMemoryHistoryStore, InMemoryProfileStore, StaticImportance};
//! use mastery_analytics::types::ExerciseOutcome;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() {
//! let engine = AnalyticsEngine::new(
//!     AnalyticsConfig::default(),
//!     Arc::new(InMemoryProfileStore::new()),
//!     Arc::new(InMemoryHistoryStore::new()),
//!     Arc::new(StaticImportance::default()),
//! );
//!
//! let outcome = ExerciseOutcome {
//!     exercise_id: "vocab-101".to_string(),
//!     exercise_type: None,
//!     score: 0.85,
//!     time_spent_seconds: 42.0,
//!     attempts: 1,
//!     skill_scores: HashMap::from([("vocab".to_string(), 0.85)]),
//!     error_types: vec![],
//!     timestamp: Utc::now(),
//! };
//!
//! let summary = engine.ingest("learner-1", &outcome).await.unwrap();
//! assert_eq!(summary.total_exercises_completed, 1);
//! # }
//! ```

pub mod cache;
pub mod config;
pub mod engine;
pub mod error;
pub mod logging;
pub mod mastery;
pub mod performance;
pub mod recommend;
pub mod snapshot;
pub mod stats;
pub mod store;
pub mod types;

pub use config::AnalyticsConfig;
pub use engine::AnalyticsEngine;
pub use error::{AnalyticsError, StoreError};
pub use mastery::MasteryTracker;
pub use performance::PerformanceTracker;
pub use recommend::RecommendationEngine;
pub use snapshot::SnapshotThrottler;
pub use store::{
    HistoryStore, ImportanceProvider, InMemoryHistoryStore, InMemoryProfileStore, ProfileStore,
    SnapshotQuery, StaticImportance,
};
pub use types::{
    ExerciseOutcome, MetricSnapshot, ProfileSummary, RecommendedConcept, UserMetricsProfile,
};
