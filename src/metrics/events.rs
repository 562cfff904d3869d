//! Internal events for metrics emission.
//!
//! Each event struct represents a measurable occurrence in the pipeline.
//! Events implement the `InternalEvent` trait which records the
//! corresponding Prometheus metric.

use metrics::{counter, gauge, histogram};
use std::time::Duration;
use tracing::trace;

/// Trait for internal events that can be emitted as metrics.
pub trait InternalEvent {
    /// Emit this event as a metric.
    fn emit(self);
}

/// Event emitted when the tailer hands a line to the parse stage.
pub struct LinesRead {
    pub count: u64,
}

impl InternalEvent for LinesRead {
    fn emit(self) {
        trace!(count = self.count, "Lines read");
        counter!("tailstat_lines_read_total").increment(self.count);
    }
}

/// Event emitted when a line parses into an access record.
pub struct RecordsParsed {
    pub count: u64,
}

impl InternalEvent for RecordsParsed {
    fn emit(self) {
        trace!(count = self.count, "Records parsed");
        counter!("tailstat_records_parsed_total").increment(self.count);
    }
}

/// Event emitted when a count is accepted by the metrics backend
/// (or printed in dry-run mode).
pub struct StatsPosted {
    pub count: u64,
}

impl InternalEvent for StatsPosted {
    fn emit(self) {
        trace!(count = self.count, "Stats posted");
        counter!("tailstat_stats_posted_total").increment(self.count);
    }
}

/// Event emitted when an input is dropped, labelled by failure kind
/// (`parse`, `derive`, `sink_delivery`).
pub struct InputDropped {
    pub kind: &'static str,
}

impl InternalEvent for InputDropped {
    fn emit(self) {
        trace!(kind = self.kind, "Input dropped");
        counter!("tailstat_inputs_dropped_total", "kind" => self.kind).increment(1);
    }
}

/// Event emitted when the record channel depth changes.
pub struct RecordQueueDepth {
    pub count: usize,
}

impl InternalEvent for RecordQueueDepth {
    fn emit(self) {
        trace!(count = self.count, "Record queue depth");
        gauge!("tailstat_record_queue_depth").set(self.count as f64);
    }
}

/// Event emitted when a post to the metrics backend completes.
pub struct PostCompleted {
    pub duration: Duration,
}

impl InternalEvent for PostCompleted {
    fn emit(self) {
        trace!(duration_ms = self.duration.as_millis(), "Post completed");
        histogram!("tailstat_post_duration_seconds").record(self.duration.as_secs_f64());
    }
}
