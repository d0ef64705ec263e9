pub mod analyzer;
pub mod binning;
pub mod config;
pub mod constants;
pub mod dataset;
pub mod error;
pub mod logging;
pub mod pipeline;
pub mod plot;
pub mod preprocessing;
pub mod run_log;
pub mod stats;
