//! Recommendation engine: scores practiced concepts by how much they need
//! revisiting. Read-only over the mastery section; never mutates a profile.

use chrono::{DateTime, Utc};

use crate::config::RecommendationParams;
use crate::store::ImportanceProvider;
use crate::types::{RecommendedConcept, UserMetricsProfile};

pub struct RecommendationEngine {
    params: RecommendationParams,
}

impl RecommendationEngine {
    pub fn new(params: RecommendationParams) -> Self {
        Self { params }
    }

    /// Priority-ordered review candidates, truncated to `count`. Concepts
    /// without a known last-practice date are skipped. Ties keep the
    /// first-practiced-first order (stable sort over `practiced_skills`).
    pub fn recommend_next_concepts(
        &self,
        profile: &UserMetricsProfile,
        count: usize,
        importance: &dyn ImportanceProvider,
        now: DateTime<Utc>,
    ) -> Vec<RecommendedConcept> {
        let mastery = &profile.mastery;
        let mut candidates: Vec<RecommendedConcept> = Vec::new();

        for concept in &mastery.practiced_skills {
            let Some(last_practiced) = mastery.last_practiced.get(concept) else {
                continue;
            };
            let days_since_practice =
                ((now - *last_practiced).num_seconds() as f64 / 86_400.0).max(0.0);

            let level = mastery
                .skill_mastery_levels
                .get(concept)
                .copied()
                .unwrap_or(0.0);
            let forgetting_factor =
                (days_since_practice / self.params.forgetting_saturation_days).min(1.0);
            let mastery_factor = 1.0 - level;
            let concept_importance = importance
                .importance(concept)
                .unwrap_or(self.params.default_importance);

            let priority = self.params.mastery_weight * mastery_factor
                + self.params.forgetting_weight * forgetting_factor
                + self.params.importance_weight * concept_importance;
            if priority <= 0.0 {
                continue;
            }

            candidates.push(RecommendedConcept {
                concept: concept.clone(),
                priority,
                mastery_level: level,
                days_since_practice,
                reason: reason_for(level, forgetting_factor, concept_importance),
            });
        }

        candidates.sort_by(|a, b| {
            b.priority
                .partial_cmp(&a.priority)
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        candidates.truncate(count);
        candidates
    }

    pub fn default_count(&self) -> usize {
        self.params.default_count
    }
}

fn reason_for(mastery_level: f64, forgetting_factor: f64, importance: f64) -> String {
    if mastery_level < 0.4 {
        "needs reinforcement".to_string()
    } else if forgetting_factor > 0.7 {
        "due for review".to_string()
    } else if importance > 0.8 {
        "foundational concept".to_string()
    } else {
        "important for progression".to_string()
    }
}
