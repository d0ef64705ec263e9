use crate::analyzer::FeatureDiscretizationAnalyzer;
use crate::config::Config;
use crate::constants::FILE_TIMESTAMP_FORMAT;
use crate::dataset::Dataset;
use crate::error::{PrepError, Result};
use crate::preprocessing::Preprocessing;
use crate::run_log::RunLog;
use chrono::Local;
use metrics::{counter, histogram};
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};
use uuid::Uuid;

/// Result of a complete preparation run
#[derive(Debug, Serialize)]
pub struct PipelineResult {
    pub run_id: Uuid,
    pub input_file: PathBuf,
    pub input_checksum: String,
    pub rows: usize,
    pub numeric_features: Vec<String>,
    pub discretized_features: Vec<String>,
    pub skipped_features: Vec<String>,
    pub output_files: Vec<PathBuf>,
}

pub struct Pipeline;

impl Pipeline {
    /// sha256 of the raw input bytes, hex encoded.
    pub fn checksum(path: &Path) -> Result<String> {
        let bytes = fs::read(path)?;
        Ok(hex::encode(Sha256::digest(&bytes)))
    }

    /// Load, derive, encode, inspect and discretize, then write every
    /// artifact into the configured output directory.
    #[instrument(skip(config), fields(output_dir = %config.output_dir.display()))]
    pub fn run(config: &Config) -> Result<PipelineResult> {
        let input = config
            .input
            .clone()
            .ok_or_else(|| PrepError::Config("no input file configured".to_string()))?;
        let run_id = Uuid::new_v4();
        let timestamp = Local::now().format(FILE_TIMESTAMP_FORMAT).to_string();
        let log = RunLog::new();
        counter!("prep_pipeline_runs_total").increment(1);
        let t_pipeline = std::time::Instant::now();

        info!(%run_id, "Starting preparation run");
        log.log(format!("Loading data from {}", input.display()));
        let input_checksum = Self::checksum(&input)?;
        let mut data = Dataset::from_csv_path(&input)?;
        log.log(format!(
            "Loaded {} rows and {} columns (sha256 {})",
            data.n_rows(),
            data.n_columns(),
            input_checksum
        ));

        let mut prep = Preprocessing::new(Some(log.clone()));
        if config.derive.treatment {
            data = prep.calculate_treatment(&data)?;
            log.log("Derived Treatment from ACR and Rate_Lag");
        }
        if config.derive.churn {
            data = prep.calculate_churn(&data)?;
            log.log("Derived Churn from ChurnRate");
        }

        let encoded_columns = data.non_numeric_features();
        data = prep.label_encode_non_numeric(&data)?;
        if !encoded_columns.is_empty() {
            log.log(format!("Label encoded columns: {}", encoded_columns.join(", ")));
        }

        let mut output_files = Vec::new();
        let mut analyzer =
            FeatureDiscretizationAnalyzer::new(data.clone(), log.clone(), &config.output_dir)?;
        if config.analysis.inspect {
            analyzer.inspect_features()?;
        }
        if config.analysis.visualize {
            let report = analyzer.create_visualizations(None, true)?;
            output_files.extend(report.png_path);
            output_files.extend(report.saved_to);
        }
        if let Some(feature) = &config.analysis.demo_feature {
            analyzer.demonstrate_discretization_methods(feature, config.analysis.demo_bins)?;
        }

        let (present, skipped): (Vec<String>, Vec<String>) = config
            .features
            .keys()
            .cloned()
            .partition(|f| data.has_column(f));
        for feature in &skipped {
            warn!("Configured feature '{}' not found in dataset", feature);
        }
        let discretized = prep.batch_discretize(&data, &config.features)?;
        counter!("prep_features_discretized_total").increment(present.len() as u64);

        let out_dir = &config.output_dir;
        let data_path = out_dir.join(format!("discretized_{}.csv", timestamp));
        discretized.to_csv_path(&data_path)?;
        log.log(format!("Discretized data saved to {}", data_path.display()));
        output_files.push(data_path);

        let analysis_path = out_dir.join(format!("feature_analysis_{}.json", timestamp));
        analyzer.save_analysis(&analysis_path)?;
        log.log(format!("Feature analysis saved to {}", analysis_path.display()));
        output_files.push(analysis_path);

        let encoders_path = out_dir.join(format!("label_encoders_{}.json", timestamp));
        fs::write(
            &encoders_path,
            serde_json::to_string_pretty(prep.label_encoders())?,
        )?;
        log.log(format!("Label encoders saved to {}", encoders_path.display()));
        output_files.push(encoders_path);

        let total_secs = t_pipeline.elapsed().as_secs_f64();
        histogram!("prep_pipeline_duration_seconds").record(total_secs);
        log.log(format!("Preparation run {} finished in {:.2}s", run_id, total_secs));

        let log_path = out_dir.join(format!("run_{}.log", timestamp));
        log.save(&log_path)?;
        output_files.push(log_path);
        info!(%run_id, files = output_files.len(), "Preparation run finished");

        Ok(PipelineResult {
            run_id,
            input_file: input,
            input_checksum,
            rows: discretized.n_rows(),
            numeric_features: analyzer.numeric_features().to_vec(),
            discretized_features: present,
            skipped_features: skipped,
            output_files,
        })
    }
}
