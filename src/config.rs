use crate::binning::{default_n_bins, DiscretizationMethod};
use crate::constants::{DEFAULT_LOG_DIR, DEFAULT_OUTPUT_DIR};
use crate::error::{PrepError, Result};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Settings for one preparation run, read from `prep.toml`.
///
/// ```toml
/// input = "data/churn.csv"
/// output_dir = "output/feature_analysis"
///
/// [derive]
/// treatment = true
/// churn = true
///
/// [features.Tenure]
/// method = "custom"
/// custom_bins = [0, 12, 36, 120]
///
/// [features.Spend]
/// method = "equal_frequency"
/// n_bins = 4
/// ```
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub input: Option<PathBuf>,
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    #[serde(default)]
    pub derive: DeriveConfig,
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub features: BTreeMap<String, DiscretizationMethod>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DeriveConfig {
    #[serde(default)]
    pub treatment: bool,
    #[serde(default)]
    pub churn: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_true")]
    pub inspect: bool,
    #[serde(default = "default_true")]
    pub visualize: bool,
    #[serde(default)]
    pub demo_feature: Option<String>,
    #[serde(default = "default_n_bins")]
    pub demo_bins: usize,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            inspect: true,
            visualize: true,
            demo_feature: None,
            demo_bins: default_n_bins(),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_output_dir() -> PathBuf {
    PathBuf::from(DEFAULT_OUTPUT_DIR)
}

fn default_log_dir() -> PathBuf {
    PathBuf::from(DEFAULT_LOG_DIR)
}

impl Default for Config {
    fn default() -> Self {
        Self {
            input: None,
            output_dir: default_output_dir(),
            log_dir: default_log_dir(),
            derive: DeriveConfig::default(),
            analysis: AnalysisConfig::default(),
            features: BTreeMap::new(),
        }
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path).map_err(|e| {
            PrepError::Config(format!("Failed to read config file '{}': {}", path.display(), e))
        })?;
        let mut config = Self::from_toml(&content)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load `path` when it exists, otherwise fall back to defaults. Either
    /// way `.env` and `PREP_*` variables are applied on top.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            return Self::load(path);
        }
        let mut config = Self::default();
        config.apply_env_overrides();
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        dotenv::dotenv().ok();
        if let Ok(input) = std::env::var("PREP_INPUT") {
            if !input.trim().is_empty() {
                self.input = Some(PathBuf::from(input));
            }
        }
        if let Ok(dir) = std::env::var("PREP_OUTPUT_DIR") {
            if !dir.trim().is_empty() {
                self.output_dir = PathBuf::from(dir);
            }
        }
    }

    fn validate(&self) -> Result<()> {
        if self.analysis.demo_bins == 0 {
            return Err(PrepError::Config("analysis.demo_bins must be at least 1".to_string()));
        }
        for (feature, method) in &self.features {
            match method {
                DiscretizationMethod::EqualWidth { n_bins }
                | DiscretizationMethod::EqualFrequency { n_bins }
                | DiscretizationMethod::KMeans { n_bins }
                    if *n_bins == 0 =>
                {
                    return Err(PrepError::Config(format!(
                        "feature '{}': n_bins must be at least 1",
                        feature
                    )));
                }
                DiscretizationMethod::Custom { custom_bins } if custom_bins.len() < 2 => {
                    return Err(PrepError::Config(format!(
                        "feature '{}': custom method needs custom_bins with at least two edges",
                        feature
                    )));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
