//! Sink trait for posting count metrics.

use async_trait::async_trait;
use std::sync::Arc;

use crate::error::SinkError;

/// Shared handle to a metrics sink.
pub type MetricsSinkRef = Arc<dyn MetricsSink>;

/// Destination for derived count events.
///
/// Implementations must be safe to call from many post workers concurrently.
/// One call per event; the pipeline performs no batching and treats delivery
/// failures as non-fatal (reported to the error sink, never re-queued).
#[async_trait]
pub trait MetricsSink: Send + Sync {
    /// Post a count of `count` for `stat` at `timestamp` (unix seconds)
    /// against the account identified by `ez_key`.
    async fn post_count(
        &self,
        stat: &str,
        ez_key: &str,
        count: u64,
        timestamp: i64,
    ) -> Result<(), SinkError>;
}
