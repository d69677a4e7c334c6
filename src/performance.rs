//! Performance tracker: consumes one exercise outcome and returns an updated
//! copy of the profile's performance section. Success, timing, and error
//! rates all use the cumulative-mean update with a windowed sample count.

use crate::config::PerformanceParams;
use crate::stats;
use crate::types::{clamp01, ExerciseOutcome, PerformanceMetrics, ScoreSample};

pub struct PerformanceTracker {
    params: PerformanceParams,
}

impl PerformanceTracker {
    pub fn new(params: PerformanceParams) -> Self {
        Self { params }
    }

    pub fn update(
        &self,
        current: &PerformanceMetrics,
        outcome: &ExerciseOutcome,
    ) -> PerformanceMetrics {
        let mut perf = current.clone();
        let window = self.params.rolling_window.max(1);
        let score = clamp01(outcome.score);

        perf.total_exercises += 1;

        perf.recent_scores.push_back(ScoreSample {
            score,
            timestamp: outcome.timestamp,
        });
        while perf.recent_scores.len() > self.params.max_recent_scores {
            perf.recent_scores.pop_front();
        }

        let success = if score >= self.params.success_threshold {
            1.0
        } else {
            0.0
        };

        let n_overall = (perf.total_exercises as usize).min(window);
        perf.success_rate = clamp01(stats::update_rolling_average(
            perf.success_rate,
            success,
            n_overall,
        ));
        perf.average_time_seconds = stats::update_rolling_average(
            perf.average_time_seconds,
            outcome.time_spent_seconds,
            n_overall,
        );

        let exercise_type = outcome.resolved_exercise_type();
        let type_count = perf
            .exercises_by_type
            .entry(exercise_type.clone())
            .or_insert(0);
        *type_count += 1;
        let n_type = (*type_count as usize).min(window);

        let type_rate = perf
            .success_rate_by_type
            .entry(exercise_type.clone())
            .or_insert(0.0);
        *type_rate = clamp01(stats::update_rolling_average(*type_rate, success, n_type));

        let type_time = perf.average_time_by_type.entry(exercise_type).or_insert(0.0);
        *type_time = stats::update_rolling_average(*type_time, outcome.time_spent_seconds, n_type);

        for (skill, raw) in &outcome.skill_scores {
            let skill_success = if clamp01(*raw) >= self.params.success_threshold {
                1.0
            } else {
                0.0
            };
            let skill_count = perf.attempts_by_skill.entry(skill.clone()).or_insert(0);
            *skill_count += 1;
            let n_skill = (*skill_count as usize).min(window);

            let skill_rate = perf
                .success_rate_by_skill
                .entry(skill.clone())
                .or_insert(0.0);
            *skill_rate = clamp01(stats::update_rolling_average(
                *skill_rate,
                skill_success,
                n_skill,
            ));
        }

        // Seen error types are nudged toward 1, every other tracked type
        // toward 0. With the fixed window as `n` this is a decaying
        // frequency estimate, not a hit counter.
        for (error_type, rate) in perf.error_rates.iter_mut() {
            if !outcome.error_types.iter().any(|e| e == error_type) {
                *rate = clamp01(stats::update_rolling_average(*rate, 0.0, window));
            }
        }
        for error_type in &outcome.error_types {
            let rate = perf.error_rates.entry(error_type.clone()).or_insert(0.0);
            *rate = clamp01(stats::update_rolling_average(*rate, 1.0, window));
        }

        // Events can arrive out of order (offline sync, retries), so the
        // trend is fit over time order rather than arrival order.
        let mut samples: Vec<&ScoreSample> = perf.recent_scores.iter().collect();
        samples.sort_by_key(|s| s.timestamp);
        let points: Vec<(f64, f64)> = samples
            .iter()
            .enumerate()
            .map(|(i, s)| (i as f64, s.score))
            .collect();
        perf.performance_trend = stats::linear_trend(&points).slope * window as f64;

        perf
    }
}
