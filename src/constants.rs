/// Column names used by the outcome and treatment derivations.
/// These follow the churn dataset the pipeline was built around.

// Treatment inputs
pub const ACR_COLUMN: &str = "ACR";
pub const RATE_LAG_COLUMN: &str = "Rate_Lag";
pub const TREATMENT_COLUMN: &str = "Treatment";

// Churn inputs
pub const CHURN_RATE_COLUMN: &str = "ChurnRate";
pub const MEMBERS_COLUMN: &str = "Members";
pub const MEMBERS_LAG_COLUMN: &str = "Members_Lag";
pub const CHURN_COLUMN: &str = "Churn";

/// Encoded class for missing cells, matching how string coercion renders them.
pub const MISSING_CLASS: &str = "nan";

/// Features needing at most this many distinct values are left as they are.
pub const FEW_UNIQUE_VALUES: usize = 10;
/// Unique-to-count ratio above which a feature is flagged high-cardinality.
pub const HIGH_CARDINALITY_RATIO: f64 = 0.5;
pub const HIGH_SKEW: f64 = 1.0;
pub const LARGE_RANGE: f64 = 1000.0;

/// Visualization defaults.
pub const MAX_PLOTTED_FEATURES: usize = 6;
pub const HISTOGRAM_BINS: usize = 30;

/// Number of leading values shown by the discretization demonstration.
pub const DEMO_SAMPLE: usize = 10;

pub const DEFAULT_CONFIG_PATH: &str = "prep.toml";
pub const DEFAULT_OUTPUT_DIR: &str = "output/feature_analysis";
pub const DEFAULT_LOG_DIR: &str = "logs";

/// Timestamp suffix for generated artifact file names.
pub const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S";
