//! Error types for tailstat using snafu.
//!
//! Two layers: component-level enums (`ConfigError`, `SourceError`,
//! `ParseError`, `SinkError`) and the top-level `PipelineError` that
//! aggregates them for reporting from `main`.
//!
//! Non-fatal failures do not travel as `Result`s through the pipeline;
//! they are wrapped in an [`ErrorEvent`] and sent down the error channel
//! to the error sink, tagged with their kind so the sink (or future
//! alerting logic) can branch on cause.

use snafu::prelude::*;

// ============ Config Errors ============

/// Errors that can occur while validating the startup configuration.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum ConfigError {
    /// EZ key is empty.
    #[snafu(display("EZ key cannot be empty"))]
    EmptyEzKey,

    /// Parser pool size is zero.
    #[snafu(display("Parser count must be at least 1"))]
    ZeroParsers,

    /// Poster pool size is zero.
    #[snafu(display("Poster count must be at least 1"))]
    ZeroPosters,
}

// ============ Source Errors ============

/// Errors that can occur while opening or reading the access log.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SourceError {
    /// Access log could not be opened.
    #[snafu(display("Failed to open access log {path}"))]
    Open {
        source: std::io::Error,
        path: String,
    },

    /// Read or seek failed while following the access log.
    #[snafu(display("Failed to read access log {path}"))]
    Read {
        source: std::io::Error,
        path: String,
    },
}

// ============ Parse Errors ============

/// A single access-log line failed to match the expected grammar.
///
/// Carries the offending line so the error sink can log it verbatim.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
#[snafu(display("Failed to parse access-log line ({reason}): {line}"))]
pub struct ParseError {
    pub reason: ParseFailure,
    pub line: String,
}

/// Reason a line failed to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseFailure {
    /// Line does not match the combined log format.
    Grammar,
    /// Timestamp field is not a valid `%d/%b/%Y:%H:%M:%S %z` time.
    Timestamp,
    /// Status field is not a valid numeric status.
    Status,
}

impl ParseFailure {
    pub fn as_str(&self) -> &'static str {
        match self {
            ParseFailure::Grammar => "grammar",
            ParseFailure::Timestamp => "timestamp",
            ParseFailure::Status => "status",
        }
    }
}

impl std::fmt::Display for ParseFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============ Sink Errors ============

/// Errors that can occur while posting a count to the metrics backend.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum SinkError {
    /// HTTP transport failure talking to the StatHat API.
    #[snafu(display("StatHat request failed"))]
    Transport { source: reqwest::Error },

    /// StatHat API answered with a non-success status.
    #[snafu(display("StatHat API returned status {status}"))]
    Api { status: u16 },

    /// All retry attempts exhausted.
    #[snafu(display("StatHat delivery failed after {attempts} attempts"))]
    RetriesExhausted {
        attempts: u32,
        #[snafu(source(from(SinkError, Box::new)))]
        source: Box<SinkError>,
    },
}

// ============ Pipeline Error (top-level) ============

/// Top-level errors that abort the process.
#[derive(Debug, Snafu)]
#[snafu(visibility(pub))]
pub enum PipelineError {
    /// Configuration error.
    #[snafu(display("Configuration error"))]
    Config { source: ConfigError },

    /// Line source failed to open the access log.
    #[snafu(display("Source error"))]
    PipelineSource { source: SourceError },

    /// Metrics endpoint initialization failed.
    #[snafu(display("Metrics error"))]
    Metrics { source: crate::metrics::MetricsError },

    /// Metrics address parsing failed.
    #[snafu(display("Failed to parse metrics address"))]
    AddressParse { source: std::net::AddrParseError },

    /// Sink construction failed (HTTP client build).
    #[snafu(display("Failed to build metrics sink"))]
    SinkBuild { source: reqwest::Error },

    /// Worker task panicked or was aborted.
    #[snafu(display("Task join error"))]
    TaskJoin { source: tokio::task::JoinError },
}

// ============ Error channel events ============

/// A non-fatal failure routed through the error channel to the error sink.
///
/// Every variant corresponds to exactly one dropped input: a line that never
/// became a record, a record that never became a stat, or a stat that never
/// reached the backend. Events are logged once and never retried or re-queued.
#[derive(Debug)]
pub enum ErrorEvent {
    /// A line failed to match the access-log grammar.
    Parse { error: ParseError },

    /// A parsed record could not be turned into a stat name.
    Derive { reason: String, request: String },

    /// The metrics backend rejected or failed a delivery.
    SinkDelivery { stat: String, error: SinkError },
}

impl ErrorEvent {
    /// Stable tag for logging and metrics labels.
    pub fn kind(&self) -> &'static str {
        match self {
            ErrorEvent::Parse { .. } => "parse",
            ErrorEvent::Derive { .. } => "derive",
            ErrorEvent::SinkDelivery { .. } => "sink_delivery",
        }
    }
}

impl std::fmt::Display for ErrorEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ErrorEvent::Parse { error } => write!(f, "{error}"),
            ErrorEvent::Derive { reason, request } => {
                write!(f, "Failed to derive stat ({reason}): {request:?}")
            }
            ErrorEvent::SinkDelivery { stat, error } => {
                write!(f, "Failed to deliver stat {stat:?}: {error}")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_display_includes_line() {
        let err = ParseError {
            reason: ParseFailure::Grammar,
            line: "not a log line".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("grammar"));
        assert!(msg.contains("not a log line"));
    }

    #[test]
    fn test_error_event_kinds() {
        let parse = ErrorEvent::Parse {
            error: ParseError {
                reason: ParseFailure::Status,
                line: String::new(),
            },
        };
        assert_eq!(parse.kind(), "parse");

        let derive = ErrorEvent::Derive {
            reason: "empty request".to_string(),
            request: String::new(),
        };
        assert_eq!(derive.kind(), "derive");

        let sink = ErrorEvent::SinkDelivery {
            stat: "x | GET | HTTP 200".to_string(),
            error: SinkError::Api { status: 500 },
        };
        assert_eq!(sink.kind(), "sink_delivery");
    }
}
