//! Per-feature inspection that decides whether and how each numeric feature
//! should be discretized before structure learning.

use crate::binning::{self, BinRules};
use crate::constants::*;
use crate::dataset::{present_values, Dataset};
use crate::error::{PrepError, Result};
use crate::plot;
use crate::run_log::RunLog;
use crate::stats::{BoxSummary, FeatureStats, Histogram};
use chrono::Local;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};

/// Outcome of [`FeatureDiscretizationAnalyzer::recommend_discretization`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Recommendation {
    pub needed: bool,
    pub high_cardinality: bool,
    pub recommended_bins: Option<usize>,
    pub bin_rules: Option<BinRules>,
    pub equal_width: Vec<(f64, f64)>,
    pub quantile: Vec<(f64, f64)>,
    pub notes: Vec<String>,
}

impl Recommendation {
    fn not_needed() -> Self {
        Self {
            needed: false,
            high_cardinality: false,
            recommended_bins: None,
            bin_rules: None,
            equal_width: Vec::new(),
            quantile: Vec::new(),
            notes: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureAnalysis {
    pub stats: FeatureStats,
    pub recommendation: Option<Recommendation>,
}

#[derive(Debug, Clone, Serialize)]
pub struct FeatureDistribution {
    pub feature: String,
    pub histogram: Histogram,
    pub box_plot: Option<BoxSummary>,
}

/// Data behind the distribution figure: one histogram and one box plot per
/// feature. `saved_to` is the JSON copy, `png_path` the rendered figure.
#[derive(Debug, Clone, Serialize)]
pub struct DistributionReport {
    pub features: Vec<FeatureDistribution>,
    pub saved_to: Option<PathBuf>,
    pub png_path: Option<PathBuf>,
}

fn with_thousands(n: usize) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}

fn list<T: std::fmt::Debug>(items: &[T]) -> String {
    let parts: Vec<String> = items.iter().map(|i| format!("{:?}", i)).collect();
    format!("[{}]", parts.join(", "))
}

fn label_list(labels: &[Option<usize>]) -> String {
    let parts: Vec<String> = labels
        .iter()
        .map(|l| l.map_or_else(|| "nan".to_string(), |v| v.to_string()))
        .collect();
    format!("[{}]", parts.join(", "))
}

pub struct FeatureDiscretizationAnalyzer {
    data: Dataset,
    log: RunLog,
    output_dir: PathBuf,
    numeric_features: Vec<String>,
    analysis_results: BTreeMap<String, FeatureAnalysis>,
}

impl FeatureDiscretizationAnalyzer {
    /// Creates the output directory if it does not exist.
    pub fn new(data: Dataset, log: RunLog, output_dir: impl Into<PathBuf>) -> Result<Self> {
        let output_dir = output_dir.into();
        fs::create_dir_all(&output_dir)?;
        let numeric_features = data.numeric_features();
        Ok(Self {
            data,
            log,
            output_dir,
            numeric_features,
            analysis_results: BTreeMap::new(),
        })
    }

    pub fn numeric_features(&self) -> &[String] {
        &self.numeric_features
    }

    pub fn analysis_results(&self) -> &BTreeMap<String, FeatureAnalysis> {
        &self.analysis_results
    }

    pub fn output_dir(&self) -> &Path {
        &self.output_dir
    }

    fn values(&self, feature: &str) -> Result<Vec<f64>> {
        Ok(present_values(self.data.numeric(feature)?))
    }

    #[instrument(skip(self), fields(features = self.numeric_features.len()))]
    pub fn inspect_features(&mut self) -> Result<()> {
        self.log.log("=".repeat(60));
        self.log.log("FEATURE INSPECTION FOR DISCRETIZATION");
        self.log.log("=".repeat(60));

        for feature in self.numeric_features.clone() {
            self.log.log(format!("\n FEATURE: {}", feature));
            self.log.log("-".repeat(40));

            self.analyze_distribution(&feature)?;
            self.recommend_discretization(&feature)?;

            self.log.log(format!("\n{}", "=".repeat(40)));
        }
        Ok(())
    }

    pub fn analyze_distribution(&mut self, feature: &str) -> Result<FeatureStats> {
        let stats = FeatureStats::from_column(self.data.numeric(feature)?);

        self.log.log(format!("Count: {}", with_thousands(stats.count)));
        self.log.log(format!("Mean: {:.4}", stats.mean));
        self.log.log(format!("Std: {:.4}", stats.std));
        self.log.log(format!("Min: {:.4}", stats.min));
        self.log.log(format!("Max: {:.4}", stats.max));
        self.log.log(format!("Range: {:.4}", stats.range));
        self.log.log(format!("Unique values: {}", with_thousands(stats.unique_values)));
        self.log.log(format!("Missing values: {}", with_thousands(stats.missing_values)));
        self.log.log(format!("Skewness: {:.4}", stats.skewness));
        self.log.log(format!("Kurtosis: {:.4}", stats.kurtosis));

        self.analysis_results.insert(
            feature.to_string(),
            FeatureAnalysis {
                stats: stats.clone(),
                recommendation: None,
            },
        );
        Ok(stats)
    }

    pub fn recommend_discretization(&mut self, feature: &str) -> Result<Recommendation> {
        let stats = match self.analysis_results.get(feature) {
            Some(analysis) => analysis.stats.clone(),
            None => self.analyze_distribution(feature)?,
        };
        let values = self.values(feature)?;

        self.log.log("\n DISCRETIZATION RECOMMENDATIONS:");

        let recommendation = if stats.unique_values <= FEW_UNIQUE_VALUES {
            self.log.log(" DISCRETIZATION NOT NEEDED - Already has few unique values");
            Recommendation::not_needed()
        } else {
            self.build_recommendation(&stats, &values)
        };

        if let Some(analysis) = self.analysis_results.get_mut(feature) {
            analysis.recommendation = Some(recommendation.clone());
        }
        Ok(recommendation)
    }

    fn build_recommendation(&self, stats: &FeatureStats, values: &[f64]) -> Recommendation {
        let high_cardinality = stats.unique_ratio() > HIGH_CARDINALITY_RATIO;
        if high_cardinality {
            self.log.log("HIGH CARDINALITY - Consider discretization");
        }

        let bins = binning::suggest_bin_count(values);
        self.log.log(format!(" Recommended bins: {}", bins));
        self.log.log("\nRECOMMENDED METHODS:");

        self.log.log("1. EQUAL-WIDTH BINNING");
        self.log.log("   - Good for: Uniform distribution");
        self.log.log(format!("   - Bins: {}", bins));
        let equal_width = binning::equal_width_ranges(stats.min, stats.max, bins);
        self.log.log(format!("   Bin width: {:.4}", stats.range / bins as f64));
        self.log_ranges(&equal_width);

        self.log.log("\n2. EQUAL-FREQUENCY BINNING (Quantile-based)");
        self.log.log("   - Good for: Skewed distributions");
        self.log.log(format!("   - Bins: {}", bins));
        let quantile = binning::quantile_ranges(values, bins);
        self.log_ranges(&quantile);

        self.log.log("\n3. K-MEANS BINNING");
        self.log.log("   - Good for: Clustering similar values");
        self.log.log(format!("   - Bins: {}", bins));

        let mut notes = Vec::new();
        if stats.skewness.abs() > HIGH_SKEW {
            self.log.log("\n SPECIAL RECOMMENDATION:");
            let note = format!("Distribution is highly skewed ({:.2})", stats.skewness);
            self.log.log(format!("   - {}", note));
            self.log.log("   - Consider: Quantile-based or log-transformation first");
            notes.push(note);
        }
        if stats.range > LARGE_RANGE {
            let note = format!("Large range detected ({:.0})", stats.range);
            self.log.log(format!("   - {}", note));
            self.log.log("   - Consider: Log-transformation or robust scaling");
            notes.push(note);
        }

        Recommendation {
            needed: true,
            high_cardinality,
            recommended_bins: Some(bins),
            bin_rules: Some(BinRules::from_values(values)),
            equal_width,
            quantile,
            notes,
        }
    }

    fn log_ranges(&self, ranges: &[(f64, f64)]) {
        for (i, (start, end)) in ranges.iter().enumerate() {
            self.log.log(format!("   Bin {}: [{:.4}, {:.4})", i + 1, start, end));
        }
    }

    /// Histogram and box-plot data for `features` (default: the first six
    /// numeric features). When `save` is set the figure is rendered to PNG
    /// and the numbers behind it are written alongside as JSON.
    pub fn create_visualizations(
        &self,
        features: Option<&[String]>,
        save: bool,
    ) -> Result<DistributionReport> {
        let default_features: Vec<String> = self
            .numeric_features
            .iter()
            .take(MAX_PLOTTED_FEATURES)
            .cloned()
            .collect();
        let features = features.unwrap_or(default_features.as_slice());

        let mut distributions = Vec::with_capacity(features.len());
        for feature in features {
            let values = self.values(feature)?;
            distributions.push(FeatureDistribution {
                feature: feature.clone(),
                histogram: Histogram::from_values(&values, HISTOGRAM_BINS),
                box_plot: BoxSummary::from_values(&values),
            });
        }

        let mut report = DistributionReport {
            features: distributions,
            saved_to: None,
            png_path: None,
        };

        if save {
            let timestamp = Local::now().format(FILE_TIMESTAMP_FORMAT);
            let png_path = self
                .output_dir
                .join(format!("feature_distributions_{}.png", timestamp));
            plot::render_distributions(&png_path, &report.features)?;
            self.log.log(format!(
                "Feature distributions plot saved to {}",
                png_path.display()
            ));
            report.png_path = Some(png_path);

            let filename = self
                .output_dir
                .join(format!("feature_distributions_{}.json", timestamp));
            fs::write(&filename, serde_json::to_string_pretty(&report)?)?;
            self.log.log(format!(
                "Feature distributions saved to {}",
                filename.display()
            ));
            report.saved_to = Some(filename);
        }
        Ok(report)
    }

    /// Log the first few labels each method assigns to `feature`, followed by
    /// the equal-width and equal-frequency interval boundaries.
    pub fn demonstrate_discretization_methods(&self, feature: &str, n_bins: usize) -> Result<()> {
        let values = self.values(feature)?;
        if values.is_empty() {
            return Err(PrepError::Discretization(format!(
                "feature '{}' has no values to demonstrate",
                feature
            )));
        }
        let column: Vec<Option<f64>> = values.iter().copied().map(Some).collect();
        let head = DEMO_SAMPLE.min(values.len());

        self.log.log(format!("\nDISCRETIZATION DEMONSTRATION FOR: {}", feature));
        self.log.log("=".repeat(50));
        self.log.log(format!("Original values (first {}): {}", DEMO_SAMPLE, list(&values[..head])));

        let equal_width = binning::cut(&column, n_bins)?;
        self.log.log(format!("\nEqual-width binning: {}", label_list(&equal_width.labels[..head])));

        let equal_freq = binning::qcut(&column, n_bins)?;
        self.log.log(format!("Equal-frequency binning: {}", label_list(&equal_freq.labels[..head])));

        let kmeans = binning::kmeans(&column, n_bins)?;
        self.log.log(format!("K-means binning: {}", label_list(&kmeans.labels[..head])));

        self.log.log("\nBIN BOUNDARIES:");
        self.log.log(format!("Equal-width: [{}]", equal_width.intervals().join(", ")));
        self.log.log(format!("Equal-frequency: [{}]", equal_freq.intervals().join(", ")));
        debug!("Demonstrated {} bins for '{}'", n_bins, feature);
        Ok(())
    }

    pub fn save_analysis(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(&self.analysis_results)?)?;
        Ok(())
    }
}
