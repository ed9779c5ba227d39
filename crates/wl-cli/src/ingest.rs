//! Access log ingestion.
//!
//! Turns raw log lines into [`Event`]s. Lines that cannot be parsed are skipped and
//! counted; they never reach the sessionizer.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use chrono::{DateTime, NaiveDateTime, Utc};
use regex::Regex;
use serde::Serialize;
use thiserror::Error;
use wl_core::{ClientId, Event};

use crate::config::FieldLayout;

/// Buffer size for `BufReader` (64KB; access logs are large and read sequentially)
const BUFFER_SIZE: usize = 64 * 1024;

/// A quoted HTTP request line (which may itself contain quotes), any other quoted
/// field, or a run of non-whitespace. Quotes around a field are stripped.
static TOKEN_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r#""((?:GET|POST|PUT|DELETE|HEAD|OPTIONS|PATCH|CONNECT|TRACE) .*? HTTP/\d(?:\.\d)?)"|"([^"]*)"|(\S+)"#,
    )
    .unwrap()
});

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

/// Why a single line was skipped.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LineError {
    #[error("missing {field} field (position {position})")]
    MissingField {
        field: &'static str,
        position: usize,
    },
    #[error("invalid timestamp: {0}")]
    InvalidTimestamp(String),
    #[error("empty client address")]
    EmptyClient,
}

/// Line counts from one ingestion pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct IngestStats {
    /// Non-blank lines read.
    pub lines: usize,
    pub events: usize,
    pub skipped: usize,
}

/// Splits a log line into fields. Double-quoted fields stay whole, without quotes.
///
/// A quoted request line runs to its closing ` HTTP/x.y"`, so quotes inside the URL
/// do not end the field early.
pub fn tokenize(line: &str) -> Vec<&str> {
    TOKEN_RE
        .captures_iter(line)
        .filter_map(|caps| caps.get(1).or_else(|| caps.get(2)).or_else(|| caps.get(3)))
        .map(|m| m.as_str())
        .collect()
}

/// Removes a `:port` suffix from a client address.
///
/// Bracketed IPv6 addresses (`[::1]:443`) lose the brackets and port; bare IPv6
/// addresses are left alone.
pub fn strip_port(addr: &str) -> &str {
    if let Some(rest) = addr.strip_prefix('[') {
        return rest.split(']').next().unwrap_or(rest);
    }
    match addr.split_once(':') {
        Some((host, port)) if !port.contains(':') => host,
        _ => addr,
    }
}

/// Parses an ISO 8601 timestamp. Values without an offset are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

/// Parses single log lines according to a field layout.
#[derive(Debug, Clone, Copy)]
pub struct LineParser {
    fields: FieldLayout,
}

impl LineParser {
    pub const fn new(fields: FieldLayout) -> Self {
        Self { fields }
    }

    pub fn parse(&self, line: &str) -> Result<Event, LineError> {
        let tokens = tokenize(line);
        let field = |field: &'static str, position: usize| {
            tokens
                .get(position)
                .copied()
                .ok_or(LineError::MissingField { field, position })
        };

        let raw_client = field("client", self.fields.client)?;
        let raw_timestamp = field("timestamp", self.fields.timestamp)?;
        let resource = field("resource", self.fields.resource)?;

        let client_id =
            ClientId::new(strip_port(raw_client)).map_err(|_| LineError::EmptyClient)?;
        let timestamp = parse_timestamp(raw_timestamp)
            .ok_or_else(|| LineError::InvalidTimestamp(raw_timestamp.to_string()))?;

        Ok(Event::new(client_id, timestamp, resource))
    }
}

/// Reads events from any buffered source, skipping lines that do not parse.
pub fn read_events_from<R: BufRead>(
    reader: R,
    fields: FieldLayout,
) -> io::Result<(Vec<Event>, IngestStats)> {
    let parser = LineParser::new(fields);
    let mut events = Vec::new();
    let mut stats = IngestStats::default();

    for (index, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        stats.lines += 1;

        match parser.parse(&line) {
            Ok(event) => events.push(event),
            Err(e) => {
                stats.skipped += 1;
                tracing::debug!(line = index + 1, error = %e, "skipping unparsable log line");
            }
        }
    }

    stats.events = events.len();
    Ok((events, stats))
}

/// Reads events from a log file.
pub fn read_events(path: &Path, fields: FieldLayout) -> Result<(Vec<Event>, IngestStats), IngestError> {
    let io_err = |source| IngestError::Io {
        path: path.to_path_buf(),
        source,
    };

    let file = File::open(path).map_err(io_err)?;
    let (events, stats) =
        read_events_from(BufReader::with_capacity(BUFFER_SIZE, file), fields).map_err(io_err)?;

    if stats.skipped > 0 {
        tracing::warn!(
            path = ?path,
            skipped = stats.skipped,
            lines = stats.lines,
            "skipped unparsable log lines"
        );
    }
    tracing::debug!(path = ?path, events = stats.events, "read log events");

    Ok((events, stats))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    const ELB_LINE: &str = r#"2015-07-22T09:00:28.019143Z marketpalce-shop 123.242.248.130:54635 10.0.6.158:80 0.000022 0.026109 0.00002 200 200 0 699 "GET https://paytm.com:443/shop/authresponse?code=f2405b05e37b HTTP/1.1" "Mozilla/5.0 (Windows NT 6.1; rv:39.0) Gecko/20100101 Firefox/39.0" ECDHE-RSA-AES128-GCM-SHA256 TLSv1.2"#;

    #[test]
    fn test_tokenize_keeps_quoted_fields_whole() {
        let tokens = tokenize(r#"a "b c" d "" e"#);
        assert_eq!(tokens, ["a", "b c", "d", "", "e"]);
    }

    #[test]
    fn test_tokenize_keeps_quotes_inside_request_line() {
        let tokens = tokenize(r#"a "GET https://x.com/s?q="red" HTTP/1.1" "agent x" b"#);
        assert_eq!(
            tokens,
            ["a", r#"GET https://x.com/s?q="red" HTTP/1.1"#, "agent x", "b"]
        );
    }

    #[test]
    fn test_parse_request_with_quoted_query() {
        let line = |query: &str| {
            format!(
                r#"2015-07-22T09:00:28.019143Z marketpalce-shop 123.242.248.130:54635 10.0.6.158:80 0.000022 0.026109 0.00002 200 200 0 699 "GET https://paytm.com:443/s?q={query} HTTP/1.1" "Mozilla/5.0 (Windows NT 6.1)" ECDHE-RSA-AES128-GCM-SHA256 TLSv1.2"#
            )
        };
        let parser = LineParser::new(FieldLayout::default());

        let red = parser.parse(&line(r#""red""#)).unwrap();
        let blue = parser.parse(&line(r#""blue""#)).unwrap();

        assert_eq!(red.resource, r#"GET https://paytm.com:443/s?q="red" HTTP/1.1"#);
        assert_eq!(blue.resource, r#"GET https://paytm.com:443/s?q="blue" HTTP/1.1"#);
        assert_eq!(red.client_id.as_str(), "123.242.248.130");
    }

    #[test]
    fn test_strip_port() {
        assert_eq!(strip_port("1.2.3.4:5678"), "1.2.3.4");
        assert_eq!(strip_port("1.2.3.4"), "1.2.3.4");
        assert_eq!(strip_port("[2001:db8::1]:443"), "2001:db8::1");
        assert_eq!(strip_port("2001:db8::1"), "2001:db8::1");
    }

    #[test]
    fn test_parse_timestamp_variants() {
        let expected = Utc.with_ymd_and_hms(2015, 7, 22, 9, 0, 28).unwrap();
        assert_eq!(parse_timestamp("2015-07-22T09:00:28Z"), Some(expected));
        assert_eq!(parse_timestamp("2015-07-22T11:00:28+02:00"), Some(expected));
        assert_eq!(parse_timestamp("2015-07-22T09:00:28"), Some(expected));
        assert_eq!(parse_timestamp("yesterday"), None);
    }

    #[test]
    fn test_parse_elb_line() {
        let event = LineParser::new(FieldLayout::default()).parse(ELB_LINE).unwrap();

        assert_eq!(event.client_id.as_str(), "123.242.248.130");
        assert_eq!(
            event.resource,
            "GET https://paytm.com:443/shop/authresponse?code=f2405b05e37b HTTP/1.1"
        );
        assert_eq!(
            event.timestamp,
            Utc.with_ymd_and_hms(2015, 7, 22, 9, 0, 28).unwrap()
                + chrono::Duration::microseconds(19_143)
        );
    }

    #[test]
    fn test_parse_reports_missing_field() {
        let err = LineParser::new(FieldLayout::default())
            .parse("2015-07-22T09:00:28Z elb 1.2.3.4:80")
            .unwrap_err();
        assert_eq!(
            err,
            LineError::MissingField {
                field: "resource",
                position: 11
            }
        );
    }

    #[test]
    fn test_parse_reports_bad_timestamp() {
        let layout = FieldLayout {
            timestamp: 0,
            client: 1,
            resource: 2,
        };
        let err = LineParser::new(layout).parse("not-a-time 1.2.3.4 /").unwrap_err();
        assert_eq!(err, LineError::InvalidTimestamp("not-a-time".to_string()));

        let err = LineParser::new(layout)
            .parse(r#"2015-07-22T09:00:28Z "" /"#)
            .unwrap_err();
        assert_eq!(err, LineError::EmptyClient);
    }

    #[test]
    fn test_read_events_skips_bad_lines() {
        let input = format!("{ELB_LINE}\n\ngarbage line\n{ELB_LINE}\n");
        let (events, stats) =
            read_events_from(input.as_bytes(), FieldLayout::default()).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(
            stats,
            IngestStats {
                lines: 3,
                events: 2,
                skipped: 1
            }
        );
    }

    #[test]
    fn test_read_events_missing_file() {
        let temp = tempfile::tempdir().unwrap();
        let err = read_events(&temp.path().join("missing.log"), FieldLayout::default())
            .unwrap_err();
        assert!(err.to_string().contains("missing.log"));
    }
}
