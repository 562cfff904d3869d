//! Dry-run sink.
//!
//! Prints each derived stat name to standard output instead of posting it.
//! Given the same input, the set of printed names matches exactly what the
//! live sink would deliver.

use async_trait::async_trait;

use crate::error::SinkError;
use crate::sink::MetricsSink;

/// Sink that writes stat names to stdout and never fails.
#[derive(Debug, Default)]
pub struct StdoutSink;

#[async_trait]
impl MetricsSink for StdoutSink {
    async fn post_count(
        &self,
        stat: &str,
        _ez_key: &str,
        _count: u64,
        _timestamp: i64,
    ) -> Result<(), SinkError> {
        println!("{stat}");
        Ok(())
    }
}
