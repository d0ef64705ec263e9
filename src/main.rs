use anyhow::{Context, Result};
use causal_prep::analyzer::FeatureDiscretizationAnalyzer;
use causal_prep::config::Config;
use causal_prep::constants;
use causal_prep::dataset::Dataset;
use causal_prep::logging;
use causal_prep::pipeline::Pipeline;
use causal_prep::preprocessing::Preprocessing;
use causal_prep::run_log::RunLog;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use tracing::error;

#[derive(Parser)]
#[command(name = "causal-prep")]
#[command(about = "Feature inspection and discretization for causal Bayesian-network modeling")]
#[command(version = "0.1.0")]
struct Cli {
    /// Path to the TOML configuration
    #[arg(long, global = true, default_value = constants::DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Inspect numeric features and recommend discretization
    Inspect {
        /// CSV input (overrides the configured input)
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Show how each binning method treats one feature
    Demo {
        #[arg(long)]
        input: Option<PathBuf>,
        /// Feature to demonstrate
        #[arg(long)]
        feature: String,
        #[arg(long, default_value_t = 5)]
        bins: usize,
    },
    /// Run the full preparation pipeline
    Run {
        #[arg(long)]
        input: Option<PathBuf>,
    },
    /// Summarise a saved run log
    LogSummary {
        /// Run log to read
        path: PathBuf,
    },
}

fn load_config(path: &Path, input: Option<PathBuf>) -> Result<Config> {
    let mut config = Config::load_or_default(path)
        .with_context(|| format!("loading config {}", path.display()))?;
    if input.is_some() {
        config.input = input;
    }
    Ok(config)
}

/// Load the input and label-encode it so every column can be inspected.
fn load_encoded(config: &Config, log: &RunLog) -> Result<Dataset> {
    let input = config
        .input
        .as_ref()
        .context("no input file given; pass --input or set `input` in the config")?;
    log.log(format!("Loading data from {}", input.display()));
    let data = Dataset::from_csv_path(input)
        .with_context(|| format!("reading {}", input.display()))?;
    let mut prep = Preprocessing::new(Some(log.clone()));
    Ok(prep.label_encode_non_numeric(&data)?)
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = match &cli.command {
        Commands::Inspect { input } | Commands::Demo { input, .. } | Commands::Run { input } => {
            load_config(&cli.config, input.clone())?
        }
        Commands::LogSummary { .. } => Config::load_or_default(&cli.config)?,
    };

    // Initialize logging
    logging::init_logging(&config.log_dir);

    match cli.command {
        Commands::Inspect { .. } => {
            let log = RunLog::new();
            let data = load_encoded(&config, &log)?;
            let mut analyzer = FeatureDiscretizationAnalyzer::new(data, log.clone(), &config.output_dir)?;
            analyzer.inspect_features()?;
            print!("{}", log.render());
        }
        Commands::Demo { feature, bins, .. } => {
            let log = RunLog::new();
            let data = load_encoded(&config, &log)?;
            let analyzer = FeatureDiscretizationAnalyzer::new(data, log.clone(), &config.output_dir)?;
            analyzer.demonstrate_discretization_methods(&feature, bins)?;
            print!("{}", log.render());
        }
        Commands::Run { .. } => match Pipeline::run(&config) {
            Ok(result) => {
                println!("\nPreparation results (run {}):", result.run_id);
                println!("   Rows: {}", result.rows);
                println!("   Numeric features: {}", result.numeric_features.len());
                println!("   Discretized: {}", result.discretized_features.join(", "));
                if !result.skipped_features.is_empty() {
                    println!("   Not in dataset: {}", result.skipped_features.join(", "));
                }
                for file in &result.output_files {
                    println!("   Output file: {}", file.display());
                }
            }
            Err(e) => {
                error!("Pipeline failed: {}", e);
                return Err(e.into());
            }
        },
        Commands::LogSummary { path } => {
            let log = RunLog::load(&path).with_context(|| format!("reading {}", path.display()))?;
            let summary = log.summary();
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }
    Ok(())
}
