//! Immutable pipeline configuration.
//!
//! Built once from the command line at startup and passed by reference into
//! the pipeline; workers never read global state.

use snafu::prelude::*;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{ConfigError, EmptyEzKeySnafu, ZeroParsersSnafu, ZeroPostersSnafu};

/// Default size of each worker pool.
pub const DEFAULT_WORKERS: usize = 4;

fn default_metrics_address() -> String {
    "0.0.0.0:9090".to_string()
}

/// Metrics endpoint configuration.
#[derive(Debug, Clone)]
pub struct MetricsConfig {
    /// Whether the Prometheus endpoint is enabled.
    pub enabled: bool,
    /// Address to bind the metrics HTTP server.
    pub address: String,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            address: default_metrics_address(),
        }
    }
}

/// Main configuration for the pipeline.
#[derive(Debug, Clone)]
pub struct Config {
    /// StatHat EZ key identifying the metrics account.
    pub ez_key: String,
    /// Path of the access log to follow.
    pub access_log: PathBuf,
    /// Stat name prefix, empty for none.
    pub prefix: String,
    /// Number of parse workers.
    pub parsers: usize,
    /// Number of post workers.
    pub posters: usize,
    /// Print stat names instead of posting them.
    pub dryrun: bool,
    /// Keep following the file after reaching end of file.
    pub follow: bool,
    /// Interval between polls for newly appended data.
    pub poll_interval: Duration,
    /// Prometheus endpoint configuration.
    pub metrics: MetricsConfig,
}

impl Config {
    /// Validate the configuration.
    pub fn validate(&self) -> Result<(), ConfigError> {
        ensure!(!self.ez_key.is_empty(), EmptyEzKeySnafu);
        ensure!(self.parsers > 0, ZeroParsersSnafu);
        ensure!(self.posters > 0, ZeroPostersSnafu);
        Ok(())
    }
}
