//! Mastery tracker: per-skill decaying-memory estimates. Each outcome blends
//! the observed score into the mastery level, regenerates the forgetting
//! curve for the touched skills, and adapts the per-skill acquisition rate.

use std::collections::BTreeSet;

use crate::config::MasteryParams;
use crate::stats;
use crate::types::{clamp01, ExerciseOutcome, ForgettingSample, MasteryMetrics};

pub struct MasteryTracker {
    params: MasteryParams,
}

impl MasteryTracker {
    pub fn new(params: MasteryParams) -> Self {
        Self { params }
    }

    pub fn update(&self, current: &MasteryMetrics, outcome: &ExerciseOutcome) -> MasteryMetrics {
        let mut mastery = current.clone();

        for (skill, raw) in &outcome.skill_scores {
            let score = clamp01(*raw);
            let previous = mastery.skill_mastery_levels.get(skill).copied();

            // First observation seeds the level directly; afterwards the new
            // score is blended in via EMA.
            let level = match previous {
                None => score,
                Some(m) => stats::exponential_moving_average(m, score, self.params.ema_alpha),
            };
            let level = clamp01(level);

            if previous.is_none() {
                mastery.practiced_skills.push(skill.clone());
            }
            mastery.skill_mastery_levels.insert(skill.clone(), level);

            let curve = self.forgetting_curve(level);
            mastery
                .retention_rates
                .insert(skill.clone(), self.reference_retention(&curve));
            mastery.forgetting_curves.insert(skill.clone(), curve);

            let observation = clamp01(1.0 - (score - level).abs());
            let consistency = match mastery.performance_consistency.get(skill) {
                Some(c) => stats::exponential_moving_average(
                    *c,
                    observation,
                    self.params.consistency_alpha,
                ),
                None => observation,
            };
            mastery
                .performance_consistency
                .insert(skill.clone(), clamp01(consistency));

            let mut rate = mastery
                .skill_acquisition_rates
                .get(skill)
                .copied()
                .unwrap_or(self.params.acquisition_seed);
            if let Some(m) = previous {
                if score > m {
                    rate *= 1.1;
                } else if score < 0.8 * m {
                    rate *= 0.9;
                }
            }
            mastery.skill_acquisition_rates.insert(
                skill.clone(),
                rate.clamp(self.params.acquisition_min, self.params.acquisition_max),
            );

            mastery.last_practiced.insert(skill.clone(), outcome.timestamp);
        }

        self.recompute_threshold_bands(&mut mastery);
        mastery
    }

    /// Full sample array at 0, step, 2*step, ... horizon days, regenerated
    /// from scratch for the current mastery level.
    fn forgetting_curve(&self, level: f64) -> Vec<ForgettingSample> {
        let step = self.params.forgetting_step_days.max(1);
        (0..=self.params.forgetting_horizon_days)
            .step_by(step as usize)
            .map(|d| ForgettingSample {
                days_from_last_practice: d as f64,
                retention_rate: clamp01(stats::retention_rate(level, d as f64)),
            })
            .collect()
    }

    /// Retention snapshot at the reference day, with the midpoint sample as
    /// fallback when the reference horizon is not in the grid.
    fn reference_retention(&self, curve: &[ForgettingSample]) -> f64 {
        curve
            .iter()
            .find(|s| s.days_from_last_practice == self.params.retention_reference_day)
            .or_else(|| curve.get(curve.len() / 2))
            .map(|s| s.retention_rate)
            .unwrap_or(0.0)
    }

    // Hard cutoffs, recomputed on every update: a skill near a boundary may
    // flicker between the sets on small score fluctuations.
    fn recompute_threshold_bands(&self, mastery: &mut MasteryMetrics) {
        let mut mastered = BTreeSet::new();
        let mut weakness = BTreeSet::new();
        for (skill, level) in &mastery.skill_mastery_levels {
            if *level >= self.params.mastered_threshold {
                mastered.insert(skill.clone());
            } else if *level <= self.params.weakness_threshold {
                weakness.insert(skill.clone());
            }
        }
        mastery.mastered_skills_count = mastered.len();
        mastery.mastered_skills = mastered;
        mastery.weakness_skills = weakness;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use std::collections::HashMap;

    fn tracker() -> MasteryTracker {
        MasteryTracker::new(MasteryParams::default())
    }

    fn outcome(skill: &str, score: f64) -> ExerciseOutcome {
        ExerciseOutcome {
            exercise_id: "vocab-1".to_string(),
            exercise_type: None,
            score,
            time_spent_seconds: 30.0,
            attempts: 1,
            skill_scores: HashMap::from([(skill.to_string(), score)]),
            error_types: Vec::new(),
            timestamp: Utc::now(),
        }
    }

    #[test]
    fn test_first_observation_seeds_level() {
        let mastery = tracker().update(&MasteryMetrics::default(), &outcome("vocab", 0.7));
        assert!((mastery.skill_mastery_levels["vocab"] - 0.7).abs() < 1e-12);
        assert_eq!(mastery.practiced_skills, vec!["vocab".to_string()]);
    }

    #[test]
    fn test_ema_blend_moves_toward_score() {
        let t = tracker();
        let mut mastery = MasteryMetrics::default();
        mastery
            .skill_mastery_levels
            .insert("vocab".to_string(), 0.5);
        mastery.practiced_skills.push("vocab".to_string());

        let updated = t.update(&mastery, &outcome("vocab", 0.9));
        // 0.3 * 0.9 + 0.7 * 0.5
        assert!((updated.skill_mastery_levels["vocab"] - 0.62).abs() < 1e-12);
    }

    #[test]
    fn test_threshold_bands_disjoint() {
        let t = tracker();
        let mut mastery = MasteryMetrics::default();
        mastery = t.update(&mastery, &outcome("strong", 0.95));
        mastery = t.update(&mastery, &outcome("weak", 0.2));
        mastery = t.update(&mastery, &outcome("middling", 0.6));

        assert!(mastery.mastered_skills.contains("strong"));
        assert!(mastery.weakness_skills.contains("weak"));
        assert!(!mastery.mastered_skills.contains("middling"));
        assert!(!mastery.weakness_skills.contains("middling"));
        assert!(mastery
            .mastered_skills
            .intersection(&mastery.weakness_skills)
            .next()
            .is_none());
        assert_eq!(mastery.mastered_skills_count, 1);
    }

    #[test]
    fn test_forgetting_curve_shape() {
        let mastery = tracker().update(&MasteryMetrics::default(), &outcome("vocab", 0.8));
        let curve = &mastery.forgetting_curves["vocab"];
        assert_eq!(curve.len(), 7); // 0, 5, ..., 30
        assert!((curve[0].retention_rate - 0.8).abs() < 1e-12);
        for pair in curve.windows(2) {
            assert!(pair[1].retention_rate <= pair[0].retention_rate);
        }
        // Snapshot is the day-5 sample.
        assert!((mastery.retention_rates["vocab"] - curve[1].retention_rate).abs() < 1e-12);
    }

    #[test]
    fn test_acquisition_rate_adapts_and_clamps() {
        let t = tracker();
        let mut mastery = t.update(&MasteryMetrics::default(), &outcome("vocab", 0.5));
        assert!((mastery.skill_acquisition_rates["vocab"] - 0.01).abs() < 1e-12);

        // Scores above mastery grow the rate.
        for _ in 0..40 {
            mastery = t.update(&mastery, &outcome("vocab", 1.0));
        }
        assert!((mastery.skill_acquisition_rates["vocab"] - 0.1).abs() < 1e-12);

        // Scores far below mastery shrink it back down to the floor.
        for _ in 0..80 {
            mastery = t.update(&mastery, &outcome("vocab", 0.0));
        }
        assert!((mastery.skill_acquisition_rates["vocab"] - 0.001).abs() < 1e-12);
    }

    #[test]
    fn test_consistency_tracks_alignment() {
        let t = tracker();
        let mut mastery = t.update(&MasteryMetrics::default(), &outcome("vocab", 0.6));
        // Seeded from the first observation: score equals level.
        assert!((mastery.performance_consistency["vocab"] - 1.0).abs() < 1e-12);

        mastery = t.update(&mastery, &outcome("vocab", 0.1));
        assert!(mastery.performance_consistency["vocab"] < 1.0);
        assert!(mastery.performance_consistency["vocab"] >= 0.0);
    }

    #[test]
    fn test_untouched_skills_keep_state() {
        let t = tracker();
        let mut mastery = t.update(&MasteryMetrics::default(), &outcome("vocab", 0.9));
        let before = mastery.skill_mastery_levels["vocab"];
        mastery = t.update(&mastery, &outcome("grammar", 0.3));
        assert!((mastery.skill_mastery_levels["vocab"] - before).abs() < 1e-12);
        assert_eq!(
            mastery.practiced_skills,
            vec!["vocab".to_string(), "grammar".to_string()]
        );
    }
}
