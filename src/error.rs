use thiserror::Error;

#[derive(Error, Debug)]
pub enum PrepError {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TOML deserialization failed: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Unknown column: {0}")]
    UnknownColumn(String),

    #[error("Column '{column}' is not numeric")]
    NotNumeric { column: String },

    #[error("Column '{column}' has {actual} rows, expected {expected}")]
    LengthMismatch {
        column: String,
        expected: usize,
        actual: usize,
    },

    #[error("Invalid discretization: {0}")]
    Discretization(String),

    #[error("Malformed log line: {0}")]
    LogFormat(String),

    #[error("Plot rendering failed: {0}")]
    Plot(String),

    #[error("Unknown label '{label}' for encoder '{column}'")]
    UnknownLabel { column: String, label: String },
}

pub type Result<T> = std::result::Result<T, PrepError>;
