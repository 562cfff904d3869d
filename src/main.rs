//! tailstat: a standalone tool for streaming access-log lines to StatHat.
//!
//! Tails an nginx access log and posts one count per logged request to the
//! StatHat EZ API, named by referer host, HTTP method, and response status.

mod config;
mod error;
mod metrics;
mod pipeline;
mod record;
mod sink;
mod source;
mod stat;

use clap::Parser;
use snafu::prelude::*;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use config::{Config, DEFAULT_WORKERS, MetricsConfig};
use error::{AddressParseSnafu, MetricsSnafu, PipelineError};
use pipeline::run_pipeline;
use sink::{MetricsSinkRef, StatHatSink, StdoutSink};

/// Access-log to StatHat streaming tool.
#[derive(Parser, Debug)]
#[command(name = "tailstat")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// StatHat EZ key identifying the metrics account.
    ez_key: String,

    /// Path to the access log to follow.
    access_log: PathBuf,

    /// Stat prefix, e.g. "`hostname -s` live site".
    #[arg(long, default_value = "")]
    prefix: String,

    /// Number of parallel workers parsing log lines.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    parsers: usize,

    /// Number of parallel workers posting results to StatHat.
    #[arg(long, default_value_t = DEFAULT_WORKERS)]
    posters: usize,

    /// Print stat names instead of posting them.
    #[arg(long)]
    dryrun: bool,

    /// Stop at end of file instead of following the log.
    #[arg(long)]
    no_follow: bool,

    /// Interval in milliseconds between polls for new log data.
    #[arg(long, default_value_t = 1000)]
    poll_interval_ms: u64,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Address to bind the Prometheus metrics endpoint.
    #[arg(long, default_value = "0.0.0.0:9090")]
    metrics_address: String,

    /// Disable the Prometheus metrics endpoint.
    #[arg(long)]
    disable_metrics: bool,
}

impl Args {
    fn into_config(self) -> Config {
        Config {
            ez_key: self.ez_key,
            access_log: self.access_log,
            prefix: self.prefix,
            parsers: self.parsers,
            posters: self.posters,
            dryrun: self.dryrun,
            follow: !self.no_follow,
            poll_interval: Duration::from_millis(self.poll_interval_ms),
            metrics: MetricsConfig {
                enabled: !self.disable_metrics,
                address: self.metrics_address,
            },
        }
    }
}

/// Parse the command line, exiting with status 1 on usage errors.
fn parse_args() -> Args {
    Args::try_parse().unwrap_or_else(|e| {
        let code = if e.use_stderr() { 1 } else { 0 };
        let _ = e.print();
        std::process::exit(code);
    })
}

#[snafu::report]
#[tokio::main]
async fn main() -> Result<(), PipelineError> {
    let args = parse_args();

    // Initialize logging
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    info!("tailstat starting");

    let config = args.into_config();

    // Initialize metrics if enabled
    if config.metrics.enabled {
        let addr = config.metrics.address.parse().context(AddressParseSnafu)?;
        metrics::init(addr).context(MetricsSnafu)?;
        debug!(
            "Metrics endpoint listening on http://{}/metrics",
            config.metrics.address
        );
    }

    let sink: MetricsSinkRef = if config.dryrun {
        info!("Dry run mode - printing stat names instead of posting");
        Arc::new(StdoutSink)
    } else {
        Arc::new(StatHatSink::new()?)
    };

    // Run the pipeline
    let stats = run_pipeline(config, sink).await?;

    info!("Pipeline completed");
    info!("  Lines read: {}", stats.lines_read);
    info!("  Records parsed: {}", stats.records_parsed);
    info!("  Parse failures: {}", stats.parse_failures);
    info!("  Stats posted: {}", stats.stats_posted);
    info!("  Post failures: {}", stats.post_failures);

    Ok(())
}
