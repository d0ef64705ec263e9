use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Descriptive statistics of one numeric feature, computed over its
/// non-missing values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureStats {
    pub count: usize,
    pub mean: f64,
    pub std: f64,
    pub min: f64,
    pub max: f64,
    pub range: f64,
    pub unique_values: usize,
    pub missing_values: usize,
    pub skewness: f64,
    pub kurtosis: f64,
}

impl FeatureStats {
    pub fn from_column(values: &[Option<f64>]) -> Self {
        let present = crate::dataset::present_values(values);
        let mut stats = Self::from_values(&present);
        stats.missing_values = values.len() - present.len();
        stats
    }

    pub fn from_values(values: &[f64]) -> Self {
        let count = values.len();
        let min = values.iter().copied().fold(f64::NAN, f64::min);
        let max = values.iter().copied().fold(f64::NAN, f64::max);
        Self {
            count,
            mean: mean(values),
            std: std_dev(values),
            min,
            max,
            range: max - min,
            unique_values: unique_count(values),
            missing_values: 0,
            skewness: skewness(values),
            kurtosis: kurtosis(values),
        }
    }

    pub fn unique_ratio(&self) -> f64 {
        if self.count == 0 {
            return 0.0;
        }
        self.unique_values as f64 / self.count as f64
    }
}

pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Variance with ddof = 0.
pub fn population_variance(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

/// Sample standard deviation (n - 1 denominator).
pub fn std_dev(values: &[f64]) -> f64 {
    let n = values.len();
    if n < 2 {
        return f64::NAN;
    }
    let m = mean(values);
    let ss: f64 = values.iter().map(|v| (v - m).powi(2)).sum();
    (ss / (n - 1) as f64).sqrt()
}

fn central_moment(values: &[f64], order: i32) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(order)).sum::<f64>() / values.len() as f64
}

/// Biased Fisher-Pearson skewness, `m3 / m2^1.5`.
pub fn skewness(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m2 = central_moment(values, 2);
    if m2 == 0.0 {
        return f64::NAN;
    }
    central_moment(values, 3) / m2.powf(1.5)
}

/// Biased excess kurtosis, `m4 / m2^2 - 3`.
pub fn kurtosis(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m2 = central_moment(values, 2);
    if m2 == 0.0 {
        return f64::NAN;
    }
    central_moment(values, 4) / (m2 * m2) - 3.0
}

pub fn unique_count(values: &[f64]) -> usize {
    values
        .iter()
        // fold -0.0 into 0.0 so both count once
        .map(|v| (v + 0.0).to_bits())
        .collect::<HashSet<u64>>()
        .len()
}

pub fn sorted(values: &[f64]) -> Vec<f64> {
    let mut out = values.to_vec();
    out.sort_by(|a, b| a.total_cmp(b));
    out
}

/// Quantile `q` in `[0, 1]` of an ascending slice, linearly interpolated
/// between closest ranks.
pub fn quantile_sorted(sorted: &[f64], q: f64) -> f64 {
    if sorted.is_empty() {
        return f64::NAN;
    }
    let pos = q.clamp(0.0, 1.0) * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    sorted[lo] + (sorted[hi] - sorted[lo]) * (pos - lo as f64)
}

/// Percentile `p` in `[0, 100]` of unsorted values.
pub fn percentile(values: &[f64], p: f64) -> f64 {
    quantile_sorted(&sorted(values), p / 100.0)
}

pub fn median(values: &[f64]) -> f64 {
    quantile_sorted(&sorted(values), 0.5)
}

/// Five-number summary plus Tukey whiskers, as drawn by a box plot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BoxSummary {
    pub min: f64,
    pub q1: f64,
    pub median: f64,
    pub q3: f64,
    pub max: f64,
    pub lower_whisker: f64,
    pub upper_whisker: f64,
    pub outliers: usize,
}

impl BoxSummary {
    pub fn from_values(values: &[f64]) -> Option<Self> {
        if values.is_empty() {
            return None;
        }
        let s = sorted(values);
        let q1 = quantile_sorted(&s, 0.25);
        let q3 = quantile_sorted(&s, 0.75);
        let iqr = q3 - q1;
        let (lo_fence, hi_fence) = (q1 - 1.5 * iqr, q3 + 1.5 * iqr);
        // whiskers reach the most extreme points still inside the fences
        let lower_whisker = s.iter().copied().find(|v| *v >= lo_fence).unwrap_or(s[0]);
        let upper_whisker = s
            .iter()
            .rev()
            .copied()
            .find(|v| *v <= hi_fence)
            .unwrap_or(s[s.len() - 1]);
        let outliers = s.iter().filter(|v| **v < lo_fence || **v > hi_fence).count();
        Some(Self {
            min: s[0],
            q1,
            median: quantile_sorted(&s, 0.5),
            q3,
            max: s[s.len() - 1],
            lower_whisker,
            upper_whisker,
            outliers,
        })
    }
}

/// Equal-width histogram; the last bin is closed on both sides.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Histogram {
    pub edges: Vec<f64>,
    pub counts: Vec<usize>,
}

impl Histogram {
    pub fn from_values(values: &[f64], bins: usize) -> Self {
        let bins = bins.max(1);
        let (mut lo, mut hi) = if values.is_empty() {
            (0.0, 1.0)
        } else {
            (
                values.iter().copied().fold(f64::INFINITY, f64::min),
                values.iter().copied().fold(f64::NEG_INFINITY, f64::max),
            )
        };
        if lo == hi {
            lo -= 0.5;
            hi += 0.5;
        }
        let width = (hi - lo) / bins as f64;
        let edges = (0..=bins).map(|i| lo + i as f64 * width).collect();
        let mut counts = vec![0usize; bins];
        for v in values {
            let idx = (((v - lo) / width) as usize).min(bins - 1);
            counts[idx] += 1;
        }
        Self { edges, counts }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_histogram_counts_every_value() {
        let hist = Histogram::from_values(&[0.0, 0.5, 1.0, 1.0, 2.0], 2);
        assert_eq!(hist.edges, vec![0.0, 1.0, 2.0]);
        assert_eq!(hist.counts, vec![2, 3]);

        let flat = Histogram::from_values(&[3.0, 3.0], 4);
        assert_eq!(flat.counts.iter().sum::<usize>(), 2);
        assert_eq!(flat.edges[0], 2.5);
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_population_variance_uses_n() {
        assert!(close(population_variance(&[2.0, 4.0, 4.0, 6.0]), 2.0));
        assert!(population_variance(&[]).is_nan());
    }

    #[test]
    fn test_basic_stats() {
        let stats = FeatureStats::from_column(&[Some(2.0), Some(4.0), None, Some(4.0), Some(6.0)]);
        assert_eq!(stats.count, 4);
        assert_eq!(stats.missing_values, 1);
        assert_eq!(stats.unique_values, 3);
        assert!(close(stats.mean, 4.0));
        assert!(close(stats.std, (8.0f64 / 3.0).sqrt()));
        assert!(close(stats.range, 4.0));
        assert!(close(stats.skewness, 0.0));
        // m2 = 2, m4 = 8 => 8 / 4 - 3
        assert!(close(stats.kurtosis, -1.0));
    }

    #[test]
    fn test_skewness_sign() {
        assert!(skewness(&[1.0, 1.0, 1.0, 2.0, 10.0]) > 1.0);
        assert!(skewness(&[-10.0, -2.0, -1.0, -1.0, -1.0]) < -1.0);
    }

    #[test]
    fn test_constant_values_have_undefined_shape() {
        let stats = FeatureStats::from_values(&[3.0; 5]);
        assert_eq!(stats.std, 0.0);
        assert!(stats.skewness.is_nan());
        assert!(stats.kurtosis.is_nan());
    }

    #[test]
    fn test_percentile_interpolates() {
        let v = [1.0, 2.0, 3.0, 4.0];
        assert!(close(percentile(&v, 25.0), 1.75));
        assert!(close(percentile(&v, 75.0), 3.25));
        assert!(close(median(&v), 2.5));
        assert!(close(median(&[5.0, 1.0, 3.0]), 3.0));
    }

    #[test]
    fn test_box_summary_counts_outliers() {
        let summary = BoxSummary::from_values(&[1.0, 2.0, 3.0, 4.0, 100.0]).unwrap();
        assert_eq!(summary.outliers, 1);
        assert_eq!(summary.upper_whisker, 4.0);
        assert_eq!(summary.lower_whisker, 1.0);
        assert!(BoxSummary::from_values(&[]).is_none());
    }
}
