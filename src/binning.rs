//! Bin-count heuristics and the four discretizers: equal-width, quantile,
//! 1-D k-means and user-supplied edges.

use crate::dataset::present_values;
use crate::error::{PrepError, Result};
use crate::stats;
use serde::{Deserialize, Serialize};

pub const MIN_SUGGESTED_BINS: usize = 3;
pub const MAX_SUGGESTED_BINS: usize = 20;
const SUGGESTION_WINDOW: (usize, usize) = (3, 50);

const KMEANS_MAX_ITER: usize = 300;
const KMEANS_TOL: f64 = 1e-4;
const MIN_BIN_WIDTH: f64 = 1e-8;
const INTERVAL_PRECISION: i32 = 3;
const MAX_ROUND_DIGITS: i32 = 300;

pub fn default_n_bins() -> usize {
    5
}

/// How a feature is turned into ordinal bin labels.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum DiscretizationMethod {
    EqualWidth {
        #[serde(default = "default_n_bins")]
        n_bins: usize,
    },
    EqualFrequency {
        #[serde(default = "default_n_bins")]
        n_bins: usize,
    },
    #[serde(rename = "kmeans")]
    KMeans {
        #[serde(default = "default_n_bins")]
        n_bins: usize,
    },
    Custom {
        #[serde(default)]
        custom_bins: Vec<f64>,
    },
}

impl Default for DiscretizationMethod {
    fn default() -> Self {
        DiscretizationMethod::EqualWidth {
            n_bins: default_n_bins(),
        }
    }
}

impl DiscretizationMethod {
    pub fn name(&self) -> &'static str {
        match self {
            DiscretizationMethod::EqualWidth { .. } => "equal_width",
            DiscretizationMethod::EqualFrequency { .. } => "equal_frequency",
            DiscretizationMethod::KMeans { .. } => "kmeans",
            DiscretizationMethod::Custom { .. } => "custom",
        }
    }

    pub fn apply(&self, values: &[Option<f64>]) -> Result<Binning> {
        match self {
            DiscretizationMethod::EqualWidth { n_bins } => cut(values, *n_bins),
            DiscretizationMethod::EqualFrequency { n_bins } => qcut(values, *n_bins),
            DiscretizationMethod::KMeans { n_bins } => kmeans(values, *n_bins),
            DiscretizationMethod::Custom { custom_bins } if !custom_bins.is_empty() => {
                cut_with_edges(values, custom_bins)
            }
            DiscretizationMethod::Custom { .. } => Err(PrepError::Discretization(
                "invalid method or missing custom_bins".to_string(),
            )),
        }
    }
}

/// Which side of each interval includes its edge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Closed {
    /// `(a, b]`, the convention of equal-width, quantile and custom cuts.
    Right,
    /// `[a, b)`, the convention of k-means assignment.
    Left,
}

/// Bin labels for every row plus the edges that produced them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Binning {
    pub labels: Vec<Option<usize>>,
    pub edges: Vec<f64>,
    pub closed: Closed,
    pub include_lowest: bool,
}

impl Binning {
    pub fn n_bins(&self) -> usize {
        self.edges.len().saturating_sub(1)
    }

    /// Interval labels with edges rounded to the shortest precision (starting
    /// at three significant fractional digits) that keeps them distinct.
    pub fn intervals(&self) -> Vec<String> {
        let precision = infer_precision(INTERVAL_PRECISION, &self.edges);
        let mut breaks: Vec<f64> = self.edges.iter().map(|e| round_frac(*e, precision)).collect();
        if self.closed == Closed::Right && self.include_lowest {
            if let Some(first) = breaks.first_mut() {
                *first -= 10f64.powi(-precision);
            }
        }
        breaks
            .windows(2)
            .map(|w| match self.closed {
                Closed::Right => format!("({:?}, {:?}]", w[0], w[1]),
                Closed::Left => format!("[{:?}, {:?})", w[0], w[1]),
            })
            .collect()
    }
}

fn round_to(x: f64, digits: i32) -> f64 {
    let factor = 10f64.powi(digits);
    (x * factor).round() / factor
}

fn round_frac(x: f64, precision: i32) -> f64 {
    if !x.is_finite() || x == 0.0 {
        return x;
    }
    let (whole, frac) = (x.trunc(), x.fract());
    let digits = if whole == 0.0 {
        -(frac.abs().log10().floor() as i32) - 1 + precision
    } else {
        precision
    };
    // 10^digits must stay finite for subnormal edges
    round_to(x, digits.min(MAX_ROUND_DIGITS))
}

fn infer_precision(base: i32, edges: &[f64]) -> i32 {
    for precision in base..20 {
        let rounded: Vec<f64> = edges.iter().map(|e| round_frac(*e, precision)).collect();
        if rounded.windows(2).all(|w| w[0] != w[1]) {
            return precision;
        }
    }
    base
}

/// The individual rule-of-thumb bin counts behind [`suggest_bin_count`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BinRules {
    pub sturges: usize,
    pub scott: usize,
    pub freedman_diaconis: usize,
    pub sqrt: usize,
}

impl BinRules {
    pub fn from_values(values: &[f64]) -> Self {
        let n = values.len().max(1) as f64;
        let sturges = (n.log2() + 1.0).ceil() as usize;
        let range = values.iter().copied().fold(f64::NAN, f64::max)
            - values.iter().copied().fold(f64::NAN, f64::min);
        let cube_root = n.powf(1.0 / 3.0);

        // a zero or undefined width falls back to Sturges
        let width_rule = |h: f64| {
            if h > 0.0 && range.is_finite() {
                (range / h).ceil() as usize
            } else {
                sturges
            }
        };

        let h_scott = 3.5 * stats::std_dev(values) / cube_root;
        let iqr = stats::percentile(values, 75.0) - stats::percentile(values, 25.0);
        let h_fd = 2.0 * iqr / cube_root;

        Self {
            sturges,
            scott: width_rule(h_scott),
            freedman_diaconis: width_rule(h_fd),
            sqrt: n.sqrt().ceil() as usize,
        }
    }

    pub fn as_vec(&self) -> Vec<usize> {
        vec![self.sturges, self.scott, self.freedman_diaconis, self.sqrt]
    }
}

/// Median of the rule-of-thumb suggestions lying in `[3, 50]`, clamped to
/// `[3, 20]`.
pub fn suggest_bin_count(values: &[f64]) -> usize {
    let rules = BinRules::from_values(values);
    let in_window: Vec<f64> = rules
        .as_vec()
        .into_iter()
        .filter(|b| (SUGGESTION_WINDOW.0..=SUGGESTION_WINDOW.1).contains(b))
        .map(|b| b as f64)
        .collect();
    let median = if in_window.is_empty() {
        rules.sturges
    } else {
        stats::median(&in_window) as usize
    };
    median.clamp(MIN_SUGGESTED_BINS, MAX_SUGGESTED_BINS)
}

/// `[start, end)` display ranges for equal-width bins.
pub fn equal_width_ranges(min: f64, max: f64, n_bins: usize) -> Vec<(f64, f64)> {
    let width = (max - min) / n_bins as f64;
    (0..n_bins)
        .map(|i| (min + i as f64 * width, min + (i + 1) as f64 * width))
        .collect()
}

/// `[start, end)` display ranges between consecutive quantiles.
pub fn quantile_ranges(values: &[f64], n_bins: usize) -> Vec<(f64, f64)> {
    quantile_edges(&stats::sorted(values), n_bins)
        .windows(2)
        .map(|w| (w[0], w[1]))
        .collect()
}

fn quantile_edges(sorted: &[f64], n_bins: usize) -> Vec<f64> {
    (0..=n_bins)
        .map(|i| stats::quantile_sorted(sorted, i as f64 / n_bins as f64))
        .collect()
}

fn linspace(start: f64, end: f64, n: usize) -> Vec<f64> {
    if n == 1 {
        return vec![start];
    }
    let step = (end - start) / (n - 1) as f64;
    (0..n)
        .map(|i| if i == n - 1 { end } else { start + i as f64 * step })
        .collect()
}

fn require_bins(n_bins: usize) -> Result<()> {
    if n_bins == 0 {
        return Err(PrepError::Discretization(
            "number of bins must be at least 1".to_string(),
        ));
    }
    Ok(())
}

fn require_values(present: &[f64]) -> Result<()> {
    if present.is_empty() {
        return Err(PrepError::Discretization(
            "cannot discretize a feature with no values".to_string(),
        ));
    }
    Ok(())
}

fn assign_right_closed(values: &[Option<f64>], edges: &[f64], include_lowest: bool) -> Vec<Option<usize>> {
    let last = edges.len();
    values
        .iter()
        .map(|v| {
            let x = (*v).filter(|x| !x.is_nan())?;
            let mut idx = edges.partition_point(|e| *e < x);
            if include_lowest && x == edges[0] {
                idx = 1;
            }
            (idx != 0 && idx != last).then(|| idx - 1)
        })
        .collect()
}

/// Equal-width bins over the observed range. The lowest edge is pushed
/// down by 0.1% of the range so the minimum falls inside the first bin.
pub fn cut(values: &[Option<f64>], n_bins: usize) -> Result<Binning> {
    require_bins(n_bins)?;
    let present = present_values(values);
    require_values(&present)?;
    let mut min = present.iter().copied().fold(f64::INFINITY, f64::min);
    let mut max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let edges = if min == max {
        let adj = if min != 0.0 { 0.001 * min.abs() } else { 0.001 };
        min -= adj;
        max += adj;
        linspace(min, max, n_bins + 1)
    } else {
        let mut edges = linspace(min, max, n_bins + 1);
        edges[0] -= (max - min) * 0.001;
        edges
    };

    Ok(Binning {
        labels: assign_right_closed(values, &edges, false),
        edges,
        closed: Closed::Right,
        include_lowest: false,
    })
}

/// Right-closed bins on caller-supplied edges. Values outside
/// `(edges[0], edges[last]]` are left unassigned.
pub fn cut_with_edges(values: &[Option<f64>], edges: &[f64]) -> Result<Binning> {
    if edges.len() < 2 {
        return Err(PrepError::Discretization(
            "custom bins need at least two edges".to_string(),
        ));
    }
    if edges.windows(2).any(|w| !(w[0] < w[1])) {
        return Err(PrepError::Discretization(
            "custom bin edges must increase monotonically".to_string(),
        ));
    }
    Ok(Binning {
        labels: assign_right_closed(values, edges, false),
        edges: edges.to_vec(),
        closed: Closed::Right,
        include_lowest: false,
    })
}

/// Equal-frequency bins on sample quantiles. Duplicate edges are dropped,
/// so heavily tied data yields fewer than `q` bins.
pub fn qcut(values: &[Option<f64>], q: usize) -> Result<Binning> {
    require_bins(q)?;
    let present = present_values(values);
    require_values(&present)?;
    let mut edges = quantile_edges(&stats::sorted(&present), q);
    edges.dedup();

    if edges.len() < 2 {
        // a single distinct value collapses to one bin
        let labels = values
            .iter()
            .map(|v| v.filter(|x| !x.is_nan()).map(|_| 0))
            .collect();
        return Ok(Binning {
            labels,
            edges: vec![edges[0], edges[0]],
            closed: Closed::Right,
            include_lowest: true,
        });
    }

    Ok(Binning {
        labels: assign_right_closed(values, &edges, true),
        edges,
        closed: Closed::Right,
        include_lowest: true,
    })
}

/// Bins whose edges sit halfway between sorted 1-D k-means centres.
/// Centres start at the midpoints of equal-width bins.
pub fn kmeans(values: &[Option<f64>], n_bins: usize) -> Result<Binning> {
    require_bins(n_bins)?;
    let present = present_values(values);
    require_values(&present)?;
    let min = present.iter().copied().fold(f64::INFINITY, f64::min);
    let max = present.iter().copied().fold(f64::NEG_INFINITY, f64::max);

    let edges = if min == max {
        vec![f64::NEG_INFINITY, f64::INFINITY]
    } else {
        let uniform = linspace(min, max, n_bins + 1);
        let init: Vec<f64> = uniform.windows(2).map(|w| (w[0] + w[1]) * 0.5).collect();
        let mut centers = lloyd_1d(&present, init);
        centers.sort_by(|a, b| a.total_cmp(b));

        let mut raw = Vec::with_capacity(n_bins + 1);
        raw.push(min);
        raw.extend(centers.windows(2).map(|w| (w[0] + w[1]) * 0.5));
        raw.push(max);

        let mut edges = vec![raw[0]];
        for w in raw.windows(2) {
            if w[1] - w[0] > MIN_BIN_WIDTH {
                edges.push(w[1]);
            }
        }
        if edges.len() < 2 {
            edges.push(max);
        }
        edges
    };

    let inner = &edges[1..edges.len() - 1];
    let labels = values
        .iter()
        .map(|v| {
            let x = (*v).filter(|x| !x.is_nan())?;
            Some(inner.partition_point(|e| *e <= x))
        })
        .collect();

    Ok(Binning {
        labels,
        edges,
        closed: Closed::Left,
        include_lowest: true,
    })
}

/// Lloyd iterations in one dimension. A cluster left empty by an
/// assignment step takes over the point lying farthest from its own centre,
/// each such point used at most once per step.
fn lloyd_1d(values: &[f64], mut centers: Vec<f64>) -> Vec<f64> {
    let variance = stats::population_variance(values);
    let tol = if variance.is_finite() { KMEANS_TOL * variance } else { 0.0 };
    let mut assignment = vec![usize::MAX; values.len()];

    for iteration in 0..KMEANS_MAX_ITER {
        let mut changed = false;
        for (slot, x) in assignment.iter_mut().zip(values) {
            let nearest = nearest_center(&centers, *x);
            if *slot != nearest {
                *slot = nearest;
                changed = true;
            }
        }
        if !changed {
            break;
        }

        let mut sums = vec![0.0; centers.len()];
        let mut counts = vec![0usize; centers.len()];
        for (c, x) in assignment.iter().zip(values) {
            sums[*c] += x;
            counts[*c] += 1;
        }
        relocate_empty_clusters(values, &assignment, &centers, &mut sums, &mut counts);

        let mut shift = 0.0;
        for (k, center) in centers.iter_mut().enumerate() {
            if counts[k] > 0 {
                let updated = sums[k] / counts[k] as f64;
                shift += (updated - *center).powi(2);
                *center = updated;
            }
        }
        tracing::trace!(iteration, shift, "k-means step");
        if shift <= tol {
            break;
        }
    }
    centers
}

fn relocate_empty_clusters(
    values: &[f64],
    assignment: &[usize],
    centers: &[f64],
    sums: &mut [f64],
    counts: &mut [usize],
) {
    let empty: Vec<usize> = (0..counts.len()).filter(|k| counts[*k] == 0).collect();
    if empty.is_empty() {
        return;
    }

    let mut farthest: Vec<usize> = (0..values.len()).collect();
    // stable sort: ties keep row order
    farthest.sort_by(|a, b| {
        let da = (values[*a] - centers[assignment[*a]]).abs();
        let db = (values[*b] - centers[assignment[*b]]).abs();
        db.total_cmp(&da)
    });

    for (cluster, idx) in empty.into_iter().zip(farthest) {
        let x = values[idx];
        let from = assignment[idx];
        sums[from] -= x;
        counts[from] -= 1;
        sums[cluster] = x;
        counts[cluster] = 1;
    }
}

fn nearest_center(centers: &[f64], x: f64) -> usize {
    let mut best = 0;
    let mut best_dist = f64::INFINITY;
    for (k, c) in centers.iter().enumerate() {
        let d = (x - c).abs();
        if d < best_dist {
            best = k;
            best_dist = d;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    fn some(values: &[f64]) -> Vec<Option<f64>> {
        values.iter().copied().map(Some).collect()
    }

    #[test]
    fn test_suggest_bin_count_small_sample() {
        // n = 10: sturges 5, sqrt 4; scott and fd derive from spread
        let values: Vec<f64> = (1..=10).map(f64::from).collect();
        let rules = BinRules::from_values(&values);
        assert_eq!(rules.sturges, 5);
        assert_eq!(rules.sqrt, 4);
        let suggested = suggest_bin_count(&values);
        assert!((MIN_SUGGESTED_BINS..=MAX_SUGGESTED_BINS).contains(&suggested));
    }

    #[test]
    fn test_suggest_bin_count_is_clamped() {
        let values: Vec<f64> = (0..100_000).map(|i| i as f64).collect();
        assert_eq!(suggest_bin_count(&values), MAX_SUGGESTED_BINS);
    }

    #[test]
    fn test_constant_values_fall_back_to_sturges() {
        let rules = BinRules::from_values(&[7.0; 16]);
        assert_eq!(rules.scott, rules.sturges);
        assert_eq!(rules.freedman_diaconis, rules.sturges);
    }

    #[test]
    fn test_equal_width_ranges() {
        let ranges = equal_width_ranges(0.0, 10.0, 4);
        assert_eq!(ranges, vec![(0.0, 2.5), (2.5, 5.0), (5.0, 7.5), (7.5, 10.0)]);
    }

    #[test]
    fn test_cut_assigns_min_to_first_bin() {
        let binning = cut(&[Some(1.0), Some(2.0), None, Some(3.0), Some(5.0)], 2).unwrap();
        assert_eq!(binning.labels, vec![Some(0), Some(0), None, Some(0), Some(1)]);
        assert_eq!(binning.n_bins(), 2);
        assert!((binning.edges[0] - 0.996).abs() < 1e-12);
        assert_eq!(binning.intervals(), vec!["(0.996, 3.0]", "(3.0, 5.0]"]);
    }

    #[test]
    fn test_cut_constant_column() {
        let binning = cut(&some(&[4.0, 4.0, 4.0]), 3).unwrap();
        assert_eq!(binning.labels, vec![Some(1); 3]);
    }

    #[test]
    fn test_cut_rejects_zero_bins_and_empty_input() {
        assert!(cut(&some(&[1.0]), 0).is_err());
        assert!(cut(&[None, None], 3).is_err());
    }

    #[test]
    fn test_custom_edges_are_right_closed() {
        let binning = cut_with_edges(&some(&[0.0, 5.0, 10.0, 50.0, 100.0, 150.0]), &[0.0, 10.0, 50.0, 100.0]).unwrap();
        assert_eq!(binning.labels, vec![None, Some(0), Some(0), Some(1), Some(2), None]);
        assert!(cut_with_edges(&some(&[1.0]), &[0.0, 0.0, 1.0]).is_err());
        assert!(cut_with_edges(&some(&[1.0]), &[0.0]).is_err());
    }

    #[test]
    fn test_qcut_balances_counts() {
        let values: Vec<f64> = (1..=8).map(f64::from).collect();
        let binning = qcut(&some(&values), 4).unwrap();
        assert_eq!(
            binning.labels,
            vec![Some(0), Some(0), Some(1), Some(1), Some(2), Some(2), Some(3), Some(3)]
        );
        let intervals = binning.intervals();
        assert!(intervals[0].starts_with("(0.999"));
        assert_eq!(intervals[1], "(2.75, 4.5]");
    }

    #[test]
    fn test_qcut_drops_duplicate_edges() {
        let binning = qcut(&some(&[1.0, 1.0, 1.0, 1.0, 2.0, 3.0]), 4).unwrap();
        assert!(binning.n_bins() < 4);
        assert_eq!(binning.labels[0], Some(0));
    }

    #[test]
    fn test_kmeans_separates_clusters() {
        let values = some(&[1.0, 1.1, 0.9, 10.0, 10.2, 9.8, 20.0, 20.1, 19.9]);
        let binning = kmeans(&values, 3).unwrap();
        assert_eq!(
            binning.labels,
            vec![Some(0), Some(0), Some(0), Some(1), Some(1), Some(1), Some(2), Some(2), Some(2)]
        );
        assert_eq!(binning.edges.len(), 4);
        assert!((binning.edges[1] - 5.5).abs() < 1e-9);
    }

    #[test]
    fn test_kmeans_constant_column_is_single_bin() {
        let binning = kmeans(&some(&[2.0, 2.0]), 4).unwrap();
        assert_eq!(binning.labels, vec![Some(0), Some(0)]);
        assert_eq!(binning.n_bins(), 1);
    }

    #[test]
    fn test_kmeans_long_tail_keeps_every_bin() {
        // initial centres 2 and 3 attract nothing and must be relocated
        let mut raw: Vec<f64> = (0..36).map(|v| v as f64).collect();
        raw.extend([5600.0, 5700.0, 5800.0, 5900.0]);
        let binning = kmeans(&some(&raw), 4).unwrap();
        assert_eq!(binning.n_bins(), 4);
        for bin in 0..4 {
            assert!(
                binning.labels.contains(&Some(bin)),
                "bin {} is empty: {:?}",
                bin,
                binning.edges
            );
        }
        assert_eq!(binning.labels[0], Some(0));
        assert_eq!(binning.labels[39], Some(3));
    }

    #[test]
    fn test_kmeans_and_qcut_keep_missing_rows() {
        let values = vec![Some(1.0), None, Some(2.0), Some(10.0), None, Some(11.0)];
        let binning = kmeans(&values, 2).unwrap();
        assert_eq!(binning.labels, vec![Some(0), None, Some(0), Some(1), None, Some(1)]);

        let binning = qcut(&values, 2).unwrap();
        assert_eq!(binning.labels[1], None);
        assert_eq!(binning.labels[4], None);
        assert_eq!(binning.labels.iter().flatten().count(), 4);
    }

    #[test]
    fn test_qcut_constant_column_is_single_bin() {
        let binning = qcut(&some(&[7.0, 7.0, 7.0]), 4).unwrap();
        assert_eq!(binning.labels, vec![Some(0), Some(0), Some(0)]);
        assert_eq!(binning.n_bins(), 1);
    }

    #[test]
    fn test_subnormal_edges_render_finite_intervals() {
        assert!(round_frac(1e-310, 3).is_finite());
        assert!(round_frac(-1e-310, 3).is_finite());
        let binning = cut_with_edges(&some(&[1e-310]), &[0.0, 1e-310, 1.0]).unwrap();
        for interval in binning.intervals() {
            assert!(!interval.contains("NaN"), "{}", interval);
            assert!(!interval.contains("inf"), "{}", interval);
        }
    }

    #[test]
    fn test_custom_without_edges_is_error() {
        let method = DiscretizationMethod::Custom { custom_bins: vec![] };
        assert!(matches!(method.apply(&some(&[1.0])), Err(PrepError::Discretization(_))));
    }

    #[test]
    fn test_method_deserializes_from_toml() {
        let method: DiscretizationMethod = toml::from_str("method = \"equal_frequency\"\nn_bins = 3").unwrap();
        assert_eq!(method, DiscretizationMethod::EqualFrequency { n_bins: 3 });
        let method: DiscretizationMethod = toml::from_str("method = \"kmeans\"").unwrap();
        assert_eq!(method, DiscretizationMethod::KMeans { n_bins: 5 });
    }
}
