//! Worker loops for the parse stage, post stage, and error sink.
//!
//! Parse workers share the raw-line channel; post workers share the record
//! channel. Every worker holds clones of its downstream senders, so a
//! channel closes exactly when the last of its producers exits. For every
//! input received a worker performs exactly one downstream send before
//! requesting its next input; no line is ever dropped without a trace.

use tokio::sync::mpsc;
use tracing::{debug, error, trace};

use crate::config::Config;
use crate::emit;
use crate::error::ErrorEvent;
use crate::metrics::events::{InputDropped, RecordQueueDepth, RecordsParsed, StatsPosted};
use crate::record::{AccessRecord, RawLine};
use crate::sink::MetricsSinkRef;
use crate::stat::MetricEvent;

/// Counters accumulated by one parse worker.
#[derive(Debug, Default)]
pub(super) struct ParseWorkerStats {
    pub lines: u64,
    pub parsed: u64,
    pub failures: u64,
}

/// Counters accumulated by one post worker.
#[derive(Debug, Default)]
pub(super) struct PostWorkerStats {
    pub posted: u64,
    pub failures: u64,
}

/// Parse worker: drain raw lines, route each to exactly one of the record
/// channel or the error channel. Exits when the raw-line channel closes.
pub(super) async fn run_parser(
    id: usize,
    lines: async_channel::Receiver<RawLine>,
    records: async_channel::Sender<AccessRecord>,
    errors: mpsc::Sender<ErrorEvent>,
) -> ParseWorkerStats {
    let mut stats = ParseWorkerStats::default();

    while let Ok(raw) = lines.recv().await {
        stats.lines += 1;
        trace!(worker = id, offset = raw.offset, "Parsing line");

        match AccessRecord::parse(&raw.text) {
            Ok(record) => {
                stats.parsed += 1;
                emit!(RecordsParsed { count: 1 });
                if records.send(record).await.is_err() {
                    debug!(worker = id, "Record channel closed, stopping parser");
                    break;
                }
            }
            Err(parse_error) => {
                stats.failures += 1;
                emit!(InputDropped { kind: "parse" });
                if errors
                    .send(ErrorEvent::Parse { error: parse_error })
                    .await
                    .is_err()
                {
                    debug!(worker = id, "Error channel closed, stopping parser");
                    break;
                }
            }
        }
    }

    debug!(
        worker = id,
        lines = stats.lines,
        parsed = stats.parsed,
        failures = stats.failures,
        "Parse worker finished"
    );
    stats
}

/// Post worker: drain access records, derive one count event per record,
/// and deliver it through the sink. Derivation and delivery failures are
/// routed to the error channel. Exits when the record channel closes.
pub(super) async fn run_poster(
    id: usize,
    config: std::sync::Arc<Config>,
    records: async_channel::Receiver<AccessRecord>,
    errors: mpsc::Sender<ErrorEvent>,
    sink: MetricsSinkRef,
) -> PostWorkerStats {
    let mut stats = PostWorkerStats::default();

    while let Ok(record) = records.recv().await {
        emit!(RecordQueueDepth {
            count: records.len()
        });

        let event = match MetricEvent::from_record(&record, &config.prefix) {
            Ok(event) => event,
            Err(derive_error) => {
                stats.failures += 1;
                emit!(InputDropped { kind: "derive" });
                let event = ErrorEvent::Derive {
                    reason: derive_error.as_str().to_string(),
                    request: record.request.clone(),
                };
                if errors.send(event).await.is_err() {
                    debug!(worker = id, "Error channel closed, stopping poster");
                    break;
                }
                continue;
            }
        };

        match sink
            .post_count(&event.name, &config.ez_key, event.count, event.timestamp)
            .await
        {
            Ok(()) => {
                stats.posted += 1;
                emit!(StatsPosted { count: 1 });
            }
            Err(sink_error) => {
                stats.failures += 1;
                emit!(InputDropped {
                    kind: "sink_delivery"
                });
                let event = ErrorEvent::SinkDelivery {
                    stat: event.name,
                    error: sink_error,
                };
                if errors.send(event).await.is_err() {
                    debug!(worker = id, "Error channel closed, stopping poster");
                    break;
                }
            }
        }
    }

    debug!(
        worker = id,
        posted = stats.posted,
        failures = stats.failures,
        "Post worker finished"
    );
    stats
}

/// Error sink: single consumer logging every pipeline error individually.
/// No filtering, no rate limiting, no deduplication. Exits when the last
/// error-channel producer has finished. Returns the number of errors logged.
pub(super) async fn run_error_sink(mut errors: mpsc::Receiver<ErrorEvent>) -> u64 {
    let mut logged: u64 = 0;
    while let Some(event) = errors.recv().await {
        error!(kind = event.kind(), "{event}");
        logged += 1;
    }
    debug!(logged, "Error sink drained");
    logged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ParseError, ParseFailure, SinkError};

    #[tokio::test]
    async fn test_error_sink_counts_every_event() {
        let (tx, rx) = mpsc::channel(8);
        let handle = tokio::spawn(run_error_sink(rx));

        for status in [400, 500, 502] {
            tx.send(ErrorEvent::SinkDelivery {
                stat: "s".to_string(),
                error: SinkError::Api { status },
            })
            .await
            .unwrap();
        }
        tx.send(ErrorEvent::Parse {
            error: ParseError {
                reason: ParseFailure::Grammar,
                line: "bad".to_string(),
            },
        })
        .await
        .unwrap();
        drop(tx);

        assert_eq!(handle.await.unwrap(), 4);
    }
}
