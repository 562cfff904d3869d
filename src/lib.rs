//! tailstat: stream nginx access-log lines to StatHat as count metrics.
//!
//! Follows a growing access log, parses each appended line into an
//! [`record::AccessRecord`], derives a stat name per record, and posts one
//! count event per record to the StatHat EZ API (or prints the name in
//! dry-run mode). Parsing and posting run on independent worker pools
//! connected by bounded channels; parse and delivery failures flow to a
//! single error sink and never stop the pipeline.
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tailstat::{Config, run_pipeline, sink::StatHatSink};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tailstat::error::PipelineError> {
//!     let config = Config { /* ... */ };
//!     let sink = Arc::new(StatHatSink::new()?);
//!     let stats = run_pipeline(config, sink).await?;
//!     println!("posted {} counts", stats.stats_posted);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod metrics;
pub mod pipeline;
pub mod record;
pub mod sink;
pub mod source;
pub mod stat;

// Re-export main types
pub use config::Config;
pub use pipeline::{Pipeline, PipelineStats, run_pipeline};
