//! Pipeline wiring.
//!
//! Connects the line tailer, the parse and post worker pools, and the error
//! sink into one streaming pipeline with backpressure and graceful shutdown.
//!
//! # Architecture
//!
//! ```text
//! tailer ──> raw-line channel ──> parse workers (N) ──> record channel ──> post workers (M) ──> sink
//!                                      │                                        │
//!                                      └────────────> error channel <───────────┘
//!                                                          │
//!                                                     error sink
//! ```
//!
//! All channels are bounded, so a slow sink throttles the post workers, the
//! record channel, the parse workers, and finally line consumption from the
//! source.
//!
//! # Shutdown ordering
//!
//! A channel must not close while a producer may still send to it. Producer
//! completion is tracked through sender ownership: the tailer owns the only
//! raw-line sender, each parse worker owns clones of the record and error
//! senders, and each post worker owns a clone of the error sender. `run`
//! drops its own sender handles right after spawning, so when the tailer
//! stops the stages drain and close strictly in order: raw lines, records,
//! errors, error sink.

mod signal;
mod tasks;

use snafu::prelude::*;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::config::Config;
use crate::error::{ConfigSnafu, PipelineError, PipelineSourceSnafu, TaskJoinSnafu};
use crate::sink::MetricsSinkRef;
use crate::source::{LineTailer, TailerConfig};

use tasks::{run_error_sink, run_parser, run_poster};

/// Capacity of the raw-line and record channels.
const DATA_CHANNEL_CAPACITY: usize = 1024;

/// Capacity of the error channel.
const ERROR_CHANNEL_CAPACITY: usize = 256;

/// Counters for one pipeline run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PipelineStats {
    /// Lines handed to the parse stage by the tailer.
    pub lines_read: u64,
    /// Lines that parsed into access records.
    pub records_parsed: u64,
    /// Lines rejected by the parser.
    pub parse_failures: u64,
    /// Counts accepted by the sink (or printed in dry-run).
    pub stats_posted: u64,
    /// Records dropped at derivation or delivery.
    pub post_failures: u64,
    /// Events logged by the error sink.
    pub errors_logged: u64,
}

/// Main processing pipeline.
pub struct Pipeline {
    config: Arc<Config>,
    sink: MetricsSinkRef,
    shutdown: CancellationToken,
}

impl Pipeline {
    /// Create a new pipeline from a validated configuration.
    pub fn new(
        config: Config,
        sink: MetricsSinkRef,
        shutdown: CancellationToken,
    ) -> Result<Self, PipelineError> {
        config.validate().context(ConfigSnafu)?;
        Ok(Self {
            config: Arc::new(config),
            sink,
            shutdown,
        })
    }

    /// Run the pipeline to completion.
    ///
    /// Completion means the line source terminated (end of file in no-follow
    /// mode, or cancellation) and every in-flight line reached its terminal
    /// outcome: one count delivered or one error logged.
    pub async fn run(self) -> Result<PipelineStats, PipelineError> {
        info!(
            parsers = self.config.parsers,
            posters = self.config.posters,
            dryrun = self.config.dryrun,
            "Starting pipeline"
        );

        let (line_tx, line_rx) = async_channel::bounded(DATA_CHANNEL_CAPACITY);
        let (record_tx, record_rx) = async_channel::bounded(DATA_CHANNEL_CAPACITY);
        let (error_tx, error_rx) = mpsc::channel(ERROR_CHANNEL_CAPACITY);

        let tailer = LineTailer::new(
            self.config.access_log.clone(),
            TailerConfig {
                follow: self.config.follow,
                tolerate_missing: self.config.follow,
                poll_interval: self.config.poll_interval,
            },
        );
        let tailer_handle = tokio::spawn(tailer.run(line_tx, self.shutdown.clone()));

        let parse_handles: Vec<_> = (0..self.config.parsers)
            .map(|id| {
                tokio::spawn(run_parser(
                    id,
                    line_rx.clone(),
                    record_tx.clone(),
                    error_tx.clone(),
                ))
            })
            .collect();

        let post_handles: Vec<_> = (0..self.config.posters)
            .map(|id| {
                tokio::spawn(run_poster(
                    id,
                    self.config.clone(),
                    record_rx.clone(),
                    error_tx.clone(),
                    self.sink.clone(),
                ))
            })
            .collect();

        // The workers own the only remaining channel handles now; dropping
        // ours lets each channel close when its last producer exits.
        drop(line_rx);
        drop(record_tx);
        drop(record_rx);
        drop(error_tx);

        let error_sink_handle = tokio::spawn(run_error_sink(error_rx));

        // Await in drain order: source, parse stage, post stage, error sink.
        let source_result = tailer_handle.await.context(TaskJoinSnafu)?;

        let mut stats = PipelineStats::default();
        for handle in parse_handles {
            let worker = handle.await.context(TaskJoinSnafu)?;
            stats.records_parsed += worker.parsed;
            stats.parse_failures += worker.failures;
        }
        for handle in post_handles {
            let worker = handle.await.context(TaskJoinSnafu)?;
            stats.stats_posted += worker.posted;
            stats.post_failures += worker.failures;
        }
        stats.errors_logged = error_sink_handle.await.context(TaskJoinSnafu)?;

        // A source failure still drains the stages above before surfacing.
        stats.lines_read = source_result.context(PipelineSourceSnafu)?;

        info!(
            lines_read = stats.lines_read,
            records_parsed = stats.records_parsed,
            parse_failures = stats.parse_failures,
            stats_posted = stats.stats_posted,
            post_failures = stats.post_failures,
            errors_logged = stats.errors_logged,
            "Pipeline drained"
        );
        Ok(stats)
    }
}

/// Run the pipeline with the given configuration and sink, stopping on
/// SIGINT/SIGTERM/SIGQUIT.
pub async fn run_pipeline(
    config: Config,
    sink: MetricsSinkRef,
) -> Result<PipelineStats, PipelineError> {
    let shutdown = CancellationToken::new();

    tokio::spawn({
        let shutdown = shutdown.clone();
        async move {
            signal::shutdown_signal().await;
            shutdown.cancel();
        }
    });

    Pipeline::new(config, sink, shutdown)?.run().await
}
