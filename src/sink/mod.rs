//! Metrics sinks.
//!
//! The post stage talks to the backend through the [`MetricsSink`] trait;
//! `StatHatSink` is the live implementation and `StdoutSink` backs dry-run
//! mode.

mod stathat;
mod stdout;
mod traits;

pub use stathat::StatHatSink;
pub use stdout::StdoutSink;
pub use traits::{MetricsSink, MetricsSinkRef};
