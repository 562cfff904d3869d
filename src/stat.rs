//! Stat-name derivation.
//!
//! A [`StatName`] is a fixed ordered sequence of tokens built from one
//! [`AccessRecord`]: the referer host (when the referer parses as a URL with
//! a host), the HTTP method, and the literal `HTTP <status>`. Tokens are
//! joined with `" | "`; a configured prefix, when present, is prepended with
//! a single space.

use url::Url;

use crate::record::AccessRecord;

/// Separator between stat-name tokens.
const TOKEN_SEPARATOR: &str = " | ";

/// Fixed token sequence for one stat name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatName {
    /// Referer host, omitted when the referer has no parseable host.
    host: Option<String>,
    /// HTTP method token from the request line.
    method: String,
    /// Numeric response status.
    status: u16,
}

impl StatName {
    /// Derive the stat name for one access record.
    ///
    /// A record whose request line has no leading token (empty or blank)
    /// cannot be named and is rejected; the caller routes it to the error
    /// channel. An unparseable referer is not an error, the host token is
    /// simply omitted.
    pub fn derive(record: &AccessRecord) -> Result<Self, DeriveError> {
        let method = record
            .request
            .split_whitespace()
            .next()
            .ok_or(DeriveError::EmptyRequest)?
            .to_string();

        let host = Url::parse(&record.http_referer)
            .ok()
            .and_then(|url| url.host_str().map(str::to_string));

        Ok(StatName {
            host,
            method,
            status: record.status,
        })
    }

    /// Render the joined stat name, with an optional prefix.
    pub fn render(&self, prefix: &str) -> String {
        let mut name = String::new();
        if let Some(host) = &self.host {
            name.push_str(host);
            name.push_str(TOKEN_SEPARATOR);
        }
        name.push_str(&self.method);
        name.push_str(TOKEN_SEPARATOR);
        name.push_str(&format!("HTTP {}", self.status));

        if prefix.is_empty() {
            name
        } else {
            format!("{prefix} {name}")
        }
    }
}

/// Why a record could not be turned into a stat name.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeriveError {
    /// The request line has no method token.
    EmptyRequest,
}

impl DeriveError {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeriveError::EmptyRequest => "empty request",
        }
    }
}

/// One count event bound for the metrics backend.
///
/// Ephemeral; built from one record and consumed immediately by the sink.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricEvent {
    /// Fully rendered stat name.
    pub name: String,
    /// Count delta, always 1 in this pipeline.
    pub count: u64,
    /// Event time as unix seconds, taken from the record's `local_time`.
    pub timestamp: i64,
}

impl MetricEvent {
    /// Build the count event for one record.
    pub fn from_record(record: &AccessRecord, prefix: &str) -> Result<Self, DeriveError> {
        let name = StatName::derive(record)?.render(prefix);
        Ok(MetricEvent {
            name,
            count: 1,
            timestamp: record.local_time.timestamp(),
        })
    }
}
