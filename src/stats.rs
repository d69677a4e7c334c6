//! Statistics kernel: pure numeric primitives shared by the trackers.
//!
//! Everything here is stateless; edge cases (empty series, single sample,
//! zero variance) return defaults instead of erroring.

/// Base decay constant of the forgetting-curve model.
/// Effective decay is `BASE_DECAY * (1 - strength)`: stronger memories decay slower.
const BASE_DECAY: f64 = 0.1;

const EPSILON: f64 = 1e-10;

/// Mean of the last `window` values, or of all values if fewer.
/// Returns 0.0 for an empty slice.
pub fn rolling_average(values: &[f64], window: usize) -> f64 {
    if values.is_empty() || window == 0 {
        return 0.0;
    }
    let start = values.len().saturating_sub(window);
    let tail = &values[start..];
    tail.iter().sum::<f64>() / tail.len() as f64
}

/// Cumulative mean update: `current + (new_value - current) / n`.
///
/// This is NOT a fixed-window average. `n` is the effective sample count;
/// callers approximating a window of size `w` must pass `min(samples, w)`.
/// Reusing a stale `n` silently degrades this to a full-history mean.
pub fn update_rolling_average(current: f64, new_value: f64, n: usize) -> f64 {
    if n == 0 {
        return new_value;
    }
    current + (new_value - current) / n as f64
}

/// Σ(value·weight) / Σ(weight); 0.0 when the weights sum to 0.
pub fn weighted_average(pairs: &[(f64, f64)]) -> f64 {
    let weight_sum: f64 = pairs.iter().map(|(_, w)| w).sum();
    if weight_sum.abs() < EPSILON {
        return 0.0;
    }
    let value_sum: f64 = pairs.iter().map(|(v, w)| v * w).sum();
    value_sum / weight_sum
}

/// `alpha * new_value + (1 - alpha) * current`.
pub fn exponential_moving_average(current: f64, new_value: f64, alpha: f64) -> f64 {
    alpha * new_value + (1.0 - alpha) * current
}

/// Ordinary least squares fit over (x, y) pairs.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendFit {
    pub slope: f64,
    pub intercept: f64,
}

/// OLS slope/intercept. With fewer than 2 points or a singular design matrix
/// (all x equal) the slope is 0 and the intercept is the mean of y.
pub fn linear_trend(points: &[(f64, f64)]) -> TrendFit {
    let mean_y = if points.is_empty() {
        0.0
    } else {
        points.iter().map(|(_, y)| y).sum::<f64>() / points.len() as f64
    };

    if points.len() < 2 {
        return TrendFit {
            slope: 0.0,
            intercept: mean_y,
        };
    }

    let n = points.len() as f64;
    let sum_x: f64 = points.iter().map(|(x, _)| x).sum();
    let sum_y: f64 = points.iter().map(|(_, y)| y).sum();
    let sum_xy: f64 = points.iter().map(|(x, y)| x * y).sum();
    let sum_xx: f64 = points.iter().map(|(x, _)| x * x).sum();

    let denominator = n * sum_xx - sum_x * sum_x;
    if denominator.abs() < EPSILON {
        return TrendFit {
            slope: 0.0,
            intercept: mean_y,
        };
    }

    let slope = (n * sum_xy - sum_x * sum_y) / denominator;
    let intercept = (sum_y - slope * sum_x) / n;
    TrendFit { slope, intercept }
}

/// Fits a trend over index-ordered values and extrapolates `steps_ahead`
/// past the last index.
pub fn predict_future_value(values: &[f64], steps_ahead: usize) -> f64 {
    let points: Vec<(f64, f64)> = values
        .iter()
        .enumerate()
        .map(|(i, v)| (i as f64, *v))
        .collect();
    let fit = linear_trend(&points);
    let x = (values.len().saturating_sub(1) + steps_ahead) as f64;
    fit.slope * x + fit.intercept
}

/// Population standard deviation; 0.0 for fewer than 2 samples.
pub fn standard_deviation(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Indices where `|x - mean| > threshold_std_devs * stddev`.
/// Empty when the deviation is 0 (constant series).
pub fn detect_anomalies(values: &[f64], threshold_std_devs: f64) -> Vec<usize> {
    let std_dev = standard_deviation(values);
    if std_dev < EPSILON {
        return Vec::new();
    }
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    // Tolerance keeps a point sitting exactly on the cutoff flagged; with a
    // strict comparison, float rounding drops it.
    let cutoff = threshold_std_devs * std_dev - EPSILON;
    values
        .iter()
        .enumerate()
        .filter(|(_, v)| (*v - mean).abs() > cutoff)
        .map(|(i, _)| i)
        .collect()
}

/// Forgetting-curve retention: `strength * exp(-decay * days)` with
/// `decay = 0.1 * (1 - strength)`. At day 0 this returns `strength` itself.
pub fn retention_rate(initial_strength: f64, days_since_practice: f64) -> f64 {
    let decay = BASE_DECAY * (1.0 - initial_strength);
    initial_strength * (-decay * days_since_practice).exp()
}

/// Ordinal encoding of CEFR-like level codes: `A1..C2` map to 1..6 via
/// `1 + 2*letter_index + (digit - 1)`. Anything else falls back to a plain
/// numeric parse, then to 0.
pub fn level_to_ordinal(level: &str) -> f64 {
    let trimmed = level.trim();
    let mut chars = trimmed.chars();
    if let (Some(letter), Some(digit), None) = (chars.next(), chars.next(), chars.next()) {
        let letter_index = match letter.to_ascii_uppercase() {
            'A' => Some(0),
            'B' => Some(1),
            'C' => Some(2),
            _ => None,
        };
        if let (Some(li), Some(d)) = (letter_index, digit.to_digit(10)) {
            if d == 1 || d == 2 {
                return (1 + 2 * li + (d - 1)) as f64;
            }
        }
    }
    trimmed.parse::<f64>().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rolling_average_window() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!((rolling_average(&values, 2) - 3.5).abs() < EPSILON);
        assert!((rolling_average(&values, 10) - 2.5).abs() < EPSILON);
        assert_eq!(rolling_average(&[], 5), 0.0);
    }

    #[test]
    fn test_update_rolling_average_converges() {
        let mut avg = 0.0;
        for i in 1..=4 {
            avg = update_rolling_average(avg, 10.0, i);
        }
        assert!((avg - 10.0).abs() < EPSILON);
    }

    #[test]
    fn test_weighted_average_zero_weights() {
        assert_eq!(weighted_average(&[(5.0, 0.0), (3.0, 0.0)]), 0.0);
        let avg = weighted_average(&[(1.0, 1.0), (3.0, 3.0)]);
        assert!((avg - 2.5).abs() < EPSILON);
    }

    #[test]
    fn test_linear_trend_two_points() {
        let fit = linear_trend(&[(0.0, 1.0), (1.0, 3.0)]);
        assert!((fit.slope - 2.0).abs() < EPSILON);
        assert!((fit.intercept - 1.0).abs() < EPSILON);
    }

    #[test]
    fn test_linear_trend_singular() {
        let fit = linear_trend(&[(2.0, 1.0), (2.0, 3.0)]);
        assert_eq!(fit.slope, 0.0);
        assert!((fit.intercept - 2.0).abs() < EPSILON);

        let single = linear_trend(&[(0.0, 4.0)]);
        assert_eq!(single.slope, 0.0);
        assert!((single.intercept - 4.0).abs() < EPSILON);
    }

    #[test]
    fn test_predict_future_value() {
        let predicted = predict_future_value(&[1.0, 2.0, 3.0], 2);
        assert!((predicted - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_standard_deviation() {
        assert_eq!(standard_deviation(&[1.0]), 0.0);
        let sd = standard_deviation(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((sd - 2.0).abs() < EPSILON);
    }

    #[test]
    fn test_detect_anomalies_flags_outlier() {
        let anomalies = detect_anomalies(&[1.0, 1.0, 1.0, 1.0, 100.0], 2.0);
        assert_eq!(anomalies, vec![4]);
    }

    #[test]
    fn test_detect_anomalies_exact_boundary() {
        // For [1,1,1,1,100] the outlier deviation equals 2 standard
        // deviations exactly; it must still be flagged.
        let values = [1.0, 1.0, 1.0, 1.0, 100.0];
        let mean = values.iter().sum::<f64>() / values.len() as f64;
        let sd = standard_deviation(&values);
        assert!(((values[4] - mean).abs() - 2.0 * sd).abs() < 1e-9);
        assert_eq!(detect_anomalies(&values, 2.0), vec![4]);
    }

    #[test]
    fn test_detect_anomalies_constant_series() {
        assert!(detect_anomalies(&[3.0, 3.0, 3.0], 1.0).is_empty());
    }

    #[test]
    fn test_retention_rate_decays() {
        let s = 0.7;
        assert!((retention_rate(s, 0.0) - s).abs() < EPSILON);
        let r5 = retention_rate(s, 5.0);
        let r10 = retention_rate(s, 10.0);
        assert!(r5 < s);
        assert!(r10 < r5);
    }

    #[test]
    fn test_retention_stronger_memory_decays_slower() {
        let weak = retention_rate(0.3, 10.0) / 0.3;
        let strong = retention_rate(0.9, 10.0) / 0.9;
        assert!(strong > weak);
    }

    #[test]
    fn test_level_to_ordinal() {
        assert_eq!(level_to_ordinal("A1"), 1.0);
        assert_eq!(level_to_ordinal("A2"), 2.0);
        assert_eq!(level_to_ordinal("B1"), 3.0);
        assert_eq!(level_to_ordinal("C2"), 6.0);
        assert_eq!(level_to_ordinal("3.5"), 3.5);
        assert_eq!(level_to_ordinal("unknown"), 0.0);
    }
}
