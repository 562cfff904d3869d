//! Access-log line parsing.
//!
//! [`AccessRecord::parse`] is a pure function over one line of the nginx
//! *combined* log format:
//!
//! ```text
//! $remote_addr - $remote_user [$time_local] "$request" $status $body_bytes_sent
//!     "$http_referer" "$http_user_agent"
//! ```
//!
//! Only the fields the pipeline consumes are retained; the rest of the line
//! still has to match the grammar for the parse to succeed. The parser holds
//! no state and is safe to call from any number of workers concurrently.

use chrono::{DateTime, FixedOffset, Utc};
use regex::Regex;
use std::sync::LazyLock;

use crate::error::{ParseError, ParseFailure};

/// Combined log format. The referer and user-agent fields are quoted strings
/// that may be empty or `-`; the request field may be empty on malformed
/// requests, which is a derivation failure downstream, not a parse failure.
static COMBINED_LOG_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#"(?x)
        ^
        \S+\ -\ \S+                  # remote_addr - remote_user
        \ \[([^\]]+)\]               # [time_local]
        \ "([^"]*)"                  # "request"
        \ (\d{3})                    # status
        \ (?:\d+|-)                  # body_bytes_sent
        \ "([^"]*)"                  # "http_referer"
        \ "[^"]*"                    # "http_user_agent"
        \s*$
        "#,
    )
    .expect("combined log pattern is valid")
});

/// Format of the `$time_local` field, e.g. `10/Oct/2000:13:55:36 -0700`.
const TIME_LOCAL_FORMAT: &str = "%d/%b/%Y:%H:%M:%S %z";

/// One raw line as handed to the parse stage by the line source.
#[derive(Debug, Clone)]
pub struct RawLine {
    /// Line text without the trailing newline.
    pub text: String,
    /// Byte offset of the start of this line in the source file.
    pub offset: u64,
    /// When the tailer observed the line.
    pub observed_at: DateTime<Utc>,
}

/// Structured representation of one parsed access-log entry.
///
/// Immutable once constructed; owned by the post worker that consumes it.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessRecord {
    /// Timestamp of the logged event.
    pub local_time: DateTime<FixedOffset>,
    /// Raw request line, e.g. `GET /foo HTTP/1.1`. May be empty.
    pub request: String,
    /// Numeric response status.
    pub status: u16,
    /// Referer URL string, possibly empty or malformed.
    pub http_referer: String,
}

impl AccessRecord {
    /// Parse one access-log line.
    ///
    /// Returns a [`ParseError`] carrying the offending line for any input
    /// that does not match the combined format grammar.
    pub fn parse(line: &str) -> Result<Self, ParseError> {
        let captures = COMBINED_LOG_PATTERN
            .captures(line)
            .ok_or_else(|| ParseError {
                reason: ParseFailure::Grammar,
                line: line.to_string(),
            })?;

        let local_time = DateTime::parse_from_str(&captures[1], TIME_LOCAL_FORMAT).map_err(
            |_| ParseError {
                reason: ParseFailure::Timestamp,
                line: line.to_string(),
            },
        )?;

        // The grammar guarantees three digits, but 0-prefixed values like
        // "099" are not real HTTP statuses.
        let status: u16 = captures[3].parse().map_err(|_| ParseError {
            reason: ParseFailure::Status,
            line: line.to_string(),
        })?;
        if status < 100 {
            return Err(ParseError {
                reason: ParseFailure::Status,
                line: line.to_string(),
            });
        }

        Ok(AccessRecord {
            local_time,
            request: captures[2].to_string(),
            status,
            http_referer: captures[4].to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Timelike;

    const VALID_LINE: &str = r#"203.0.113.7 - - [10/Oct/2000:13:55:36 -0700] "GET /foo HTTP/1.1" 200 2326 "http://x.example.com/path" "Mozilla/5.0""#;

    #[test]
    fn test_parse_valid_line() {
        let record = AccessRecord::parse(VALID_LINE).unwrap();
        assert_eq!(record.request, "GET /foo HTTP/1.1");
        assert_eq!(record.status, 200);
        assert_eq!(record.http_referer, "http://x.example.com/path");
        assert_eq!(record.local_time.hour(), 13);
        assert_eq!(record.local_time.timestamp(), 971211336);
    }

    #[test]
    fn test_parse_dash_referer() {
        let line = r#"203.0.113.7 - - [10/Oct/2000:13:55:36 -0700] "GET / HTTP/1.1" 304 - "-" "-""#;
        let record = AccessRecord::parse(line).unwrap();
        assert_eq!(record.http_referer, "-");
        assert_eq!(record.status, 304);
    }

    #[test]
    fn test_parse_authenticated_user() {
        let line = r#"10.0.0.1 - frank [10/Oct/2000:13:55:36 -0700] "POST /api HTTP/1.1" 201 512 "" "curl/8.0""#;
        let record = AccessRecord::parse(line).unwrap();
        assert_eq!(record.request, "POST /api HTTP/1.1");
        assert_eq!(record.http_referer, "");
    }

    #[test]
    fn test_parse_empty_request() {
        // nginx logs an empty request field for malformed requests; the
        // grammar accepts it and derivation rejects it later.
        let line = r#"203.0.113.7 - - [10/Oct/2000:13:55:36 -0700] "" 400 0 "-" "-""#;
        let record = AccessRecord::parse(line).unwrap();
        assert_eq!(record.request, "");
        assert_eq!(record.status, 400);
    }

    #[test]
    fn test_parse_rejects_garbage() {
        let err = AccessRecord::parse("not a log line").unwrap_err();
        assert_eq!(err.reason, ParseFailure::Grammar);
        assert_eq!(err.line, "not a log line");
    }

    #[test]
    fn test_parse_rejects_truncated_line() {
        let line = r#"203.0.113.7 - - [10/Oct/2000:13:55:36 -0700] "GET / HTTP/1.1" 200"#;
        let err = AccessRecord::parse(line).unwrap_err();
        assert_eq!(err.reason, ParseFailure::Grammar);
    }

    #[test]
    fn test_parse_rejects_bad_timestamp() {
        let line = r#"203.0.113.7 - - [99/Zzz/2000:13:55:36 -0700] "GET / HTTP/1.1" 200 1 "-" "-""#;
        let err = AccessRecord::parse(line).unwrap_err();
        assert_eq!(err.reason, ParseFailure::Timestamp);
    }

    #[test]
    fn test_parse_rejects_non_http_status() {
        let line = r#"203.0.113.7 - - [10/Oct/2000:13:55:36 -0700] "GET / HTTP/1.1" 099 1 "-" "-""#;
        let err = AccessRecord::parse(line).unwrap_err();
        assert_eq!(err.reason, ParseFailure::Status);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let a = AccessRecord::parse(VALID_LINE).unwrap();
        let b = AccessRecord::parse(VALID_LINE).unwrap();
        assert_eq!(a, b);
    }
}
