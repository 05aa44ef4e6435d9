//! Statistics Kernel (C6): total, pure functions over unordered
//! sequences of finite doubles. Empty input is a sentinel, not an
//! error, per spec.md §4.6.
//!
//! Grounded in the spread/mean computation of the multi-model
//! aggregation example in the retrieval pack, generalized into a
//! reusable kernel in the style of the teacher's `helpers.rs`
//! (small pure functions, one test block per function).

#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize, utoipa::ToSchema)]
pub struct MetricStatistics {
    pub mean: f64,
    pub median: f64,
    pub min: f64,
    pub max: f64,
    pub std_dev: f64,
    pub range: f64,
}

impl MetricStatistics {
    pub const EMPTY: MetricStatistics = MetricStatistics {
        mean: 0.0,
        median: 0.0,
        min: 0.0,
        max: 0.0,
        std_dev: 0.0,
        range: 0.0,
    };

    pub fn compute(xs: &[f64]) -> MetricStatistics {
        if xs.is_empty() {
            return MetricStatistics::EMPTY;
        }
        let min = xs.iter().cloned().fold(f64::INFINITY, f64::min);
        let max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
        MetricStatistics {
            mean: mean(xs),
            median: median(xs),
            min,
            max,
            std_dev: std_dev(xs),
            range: max - min,
        }
    }
}

pub fn mean(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    xs.iter().sum::<f64>() / xs.len() as f64
}

/// Min/max pair in one pass; empty input is `(0.0, 0.0)`, matching the
/// sentinel convention of the rest of this kernel.
pub fn min_max(xs: &[f64]) -> (f64, f64) {
    if xs.is_empty() {
        return (0.0, 0.0);
    }
    let min = xs.iter().cloned().fold(f64::INFINITY, f64::min);
    let max = xs.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
    (min, max)
}

pub fn median(xs: &[f64]) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let n = sorted.len();
    if n % 2 == 1 {
        sorted[n / 2]
    } else {
        (sorted[n / 2 - 1] + sorted[n / 2]) / 2.0
    }
}

pub fn std_dev(xs: &[f64]) -> f64 {
    if xs.len() <= 1 {
        return 0.0;
    }
    let m = mean(xs);
    let variance = xs.iter().map(|x| (x - m).powi(2)).sum::<f64>() / xs.len() as f64;
    variance.sqrt()
}

/// The aggregator's default point estimator: robust to one outlier
/// model without discarding the rest of the ensemble.
pub fn trimmed_mean(xs: &[f64]) -> f64 {
    let n = xs.len();
    if n <= 1 {
        return mean(xs);
    }
    if n == 2 {
        return mean(xs);
    }
    if n == 3 {
        return median(xs);
    }
    let mut sorted = xs.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).unwrap());
    let trim = if n >= 10 {
        ((0.1 * n as f64).ceil()) as usize
    } else {
        1
    };
    let remainder = &sorted[trim..n - trim];
    mean(remainder)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterThan,
    LessThan,
}

/// Percentage of `xs` satisfying `comparison` relative to `threshold`.
pub fn ensemble_probability(xs: &[f64], threshold: f64, comparison: Comparison) -> f64 {
    if xs.is_empty() {
        return 0.0;
    }
    let matching = xs
        .iter()
        .filter(|&&x| match comparison {
            Comparison::GreaterThan => x > threshold,
            Comparison::LessThan => x < threshold,
        })
        .count();
    100.0 * matching as f64 / xs.len() as f64
}

/// Indices whose z-score exceeds `z_threshold`. `stdDev = 0` yields no
/// outliers; `|xs| < 3` always yields none.
pub fn find_outlier_indices(xs: &[f64], z_threshold: f64) -> Vec<usize> {
    if xs.len() < 3 {
        return Vec::new();
    }
    let m = mean(xs);
    let sd = std_dev(xs);
    if sd == 0.0 {
        return Vec::new();
    }
    xs.iter()
        .enumerate()
        .filter(|(_, &x)| ((x - m) / sd).abs() > z_threshold)
        .map(|(i, _)| i)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_empty_is_zero() {
        assert_eq!(mean(&[]), 0.0);
    }

    #[test]
    fn mean_basic() {
        assert_eq!(mean(&[1.0, 2.0, 3.0]), 2.0);
    }

    #[test]
    fn min_max_of_empty_is_zero_pair() {
        assert_eq!(min_max(&[]), (0.0, 0.0));
    }

    #[test]
    fn min_max_basic() {
        assert_eq!(min_max(&[3.0, 1.0, 4.0, 1.5]), (1.0, 4.0));
    }

    #[test]
    fn median_odd_even_and_edge_lengths() {
        assert_eq!(median(&[]), 0.0);
        assert_eq!(median(&[5.0]), 5.0);
        assert_eq!(median(&[1.0, 3.0]), 2.0);
        assert_eq!(median(&[3.0, 1.0, 2.0]), 2.0);
    }

    #[test]
    fn std_dev_of_identical_values_is_zero() {
        assert_eq!(std_dev(&[4.0, 4.0, 4.0]), 0.0);
        assert_eq!(std_dev(&[4.0]), 0.0);
    }

    #[test]
    fn std_dev_population_formula() {
        let sd = std_dev(&[2.0, 4.0, 4.0, 4.0, 5.0, 5.0, 7.0, 9.0]);
        assert!((sd - 2.0).abs() < 1e-9);
    }

    #[test]
    fn trimmed_mean_small_n_rules() {
        assert_eq!(trimmed_mean(&[]), 0.0);
        assert_eq!(trimmed_mean(&[5.0]), 5.0);
        assert_eq!(trimmed_mean(&[2.0, 8.0]), 5.0);
        assert_eq!(trimmed_mean(&[1.0, 2.0, 100.0]), 2.0);
    }

    #[test]
    fn trimmed_mean_excludes_outlier_at_n_equals_5() {
        let xs = [20.0, 20.0, 20.0, 20.0, 50.0];
        assert_eq!(trimmed_mean(&xs), 20.0);
    }

    #[test]
    fn trimmed_mean_n_ge_10_trims_ceil_tenth_each_end() {
        // n=10 -> trim ceil(1.0)=1 from each end
        let mut xs: Vec<f64> = (1..=10).map(|x| x as f64).collect();
        xs[0] = -1000.0;
        xs[9] = 1000.0;
        let tm = trimmed_mean(&xs);
        // remaining 2..=9 mean = 5.5
        assert!((tm - 5.5).abs() < 1e-9);
    }

    #[test]
    fn trimmed_mean_is_within_min_max() {
        let xs = [1.0, 2.0, 3.0, 4.0, 100.0];
        let tm = trimmed_mean(&xs);
        assert!(tm >= 1.0 && tm <= 100.0);
    }

    #[test]
    fn ensemble_probability_basic() {
        let xs = [1.0, 2.0, 3.0, 4.0];
        assert_eq!(ensemble_probability(&xs, 2.0, Comparison::GreaterThan), 50.0);
        assert_eq!(ensemble_probability(&[], 2.0, Comparison::GreaterThan), 0.0);
    }

    #[test]
    fn find_outlier_indices_detects_single_outlier() {
        let xs = [20.0, 20.0, 20.0, 20.0, 50.0];
        let outliers = find_outlier_indices(&xs, 2.0);
        assert_eq!(outliers, vec![4]);
    }

    #[test]
    fn find_outlier_indices_empty_when_too_few_points() {
        assert_eq!(find_outlier_indices(&[1.0, 2.0], 2.0), Vec::<usize>::new());
    }

    #[test]
    fn find_outlier_indices_empty_when_std_dev_zero() {
        assert_eq!(find_outlier_indices(&[3.0, 3.0, 3.0], 2.0), Vec::<usize>::new());
    }

    #[test]
    fn metric_statistics_empty_sentinel() {
        assert_eq!(MetricStatistics::compute(&[]), MetricStatistics::EMPTY);
    }

    #[test]
    fn metric_statistics_orders_min_median_max() {
        let stats = MetricStatistics::compute(&[5.0, 1.0, 3.0]);
        assert!(stats.min <= stats.median && stats.median <= stats.max);
        assert_eq!(stats.range, stats.max - stats.min);
    }
}
