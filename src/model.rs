//! Log record schema, severity ordering, and the query filter shape.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Severity ordered from most to least severe. Lower ordinal = more severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Severity {
    NoLogging = 0,
    Fatal = 1,
    Error = 2,
    Warning = 3,
    Display = 4,
    Log = 5,
    Verbose = 6,
    VeryVerbose = 7,
}

impl Severity {
    #[must_use]
    pub const fn ordinal(self) -> i64 {
        self as i64
    }

    #[must_use]
    pub fn from_ordinal(ord: i64) -> Option<Self> {
        Some(match ord {
            0 => Self::NoLogging,
            1 => Self::Fatal,
            2 => Self::Error,
            3 => Self::Warning,
            4 => Self::Display,
            5 => Self::Log,
            6 => Self::Verbose,
            7 => Self::VeryVerbose,
            _ => return None,
        })
    }

    /// Parses the seven emitter-facing level names, case-sensitively.
    /// Anything else (including `NoLogging`, which emitters never send) falls
    /// back to `Log`, matching the ingest parser's documented default.
    #[must_use]
    pub fn parse_verbosity(s: &str) -> Self {
        match s {
            "Fatal" => Self::Fatal,
            "Error" => Self::Error,
            "Warning" => Self::Warning,
            "Display" => Self::Display,
            "Log" => Self::Log,
            "Verbose" => Self::Verbose,
            "VeryVerbose" => Self::VeryVerbose,
            _ => Self::Log,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::NoLogging => "NoLogging",
            Self::Fatal => "Fatal",
            Self::Error => "Error",
            Self::Warning => "Warning",
            Self::Display => "Display",
            Self::Log => "Log",
            Self::Verbose => "Verbose",
            Self::VeryVerbose => "VeryVerbose",
        }
    }
}

/// One immutable log entry, as durably stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogRecord {
    pub id: i64,
    pub source: String,
    pub category: String,
    pub severity: Severity,
    pub message: String,
    pub emit_time: f64,
    pub receive_time: f64,
    pub frame: Option<i64>,
    pub file: Option<String>,
    pub line: Option<i64>,
    pub session_id: String,
    pub instance_id: String,
}

/// Inbound wire shape for ingest (UDP datagram or file-tail synthesis).
/// Fields an emitter should never set (`id`, `received_at`) are absent
/// here by construction; the parser never reads them even if present.
#[derive(Debug, Deserialize)]
pub struct IngestPayload {
    pub source: Option<String>,
    pub category: Option<String>,
    pub verbosity: Option<String>,
    pub message: Option<String>,
    pub timestamp: Option<f64>,
    pub frame: Option<i64>,
    pub file: Option<String>,
    pub line: Option<i64>,
    pub session_id: Option<String>,
    pub instance_id: Option<String>,
}

/// Error raised when a raw datagram/line cannot be turned into a record.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("empty payload")]
    Empty,
    #[error("invalid JSON: {0}")]
    InvalidJson(#[from] serde_json::Error),
}

impl IngestPayload {
    /// Parses a UTF-8 JSON object into an inbound payload. An empty byte
    /// string is rejected outright so the receiver can diagnose it without
    /// invoking the JSON parser.
    pub fn parse(bytes: &[u8]) -> Result<Self, ParseError> {
        if bytes.is_empty() {
            return Err(ParseError::Empty);
        }
        Ok(serde_json::from_slice(bytes)?)
    }

    /// Turns a parsed payload into a full record, substituting the
    /// documented defaults for any missing required field and stamping
    /// `receive_time`. `id` is assigned later by the store.
    #[must_use]
    pub fn into_record(self, receive_time: f64) -> LogRecord {
        LogRecord {
            id: 0,
            source: self.source.unwrap_or_else(|| "unknown".to_string()),
            category: self.category.unwrap_or_else(|| "LogTemp".to_string()),
            severity: self
                .verbosity
                .as_deref()
                .map(Severity::parse_verbosity)
                .unwrap_or(Severity::Log),
            message: self.message.unwrap_or_default(),
            emit_time: self.timestamp.unwrap_or(receive_time),
            receive_time,
            frame: self.frame,
            file: self.file,
            line: self.line,
            session_id: self.session_id.unwrap_or_default(),
            instance_id: self.instance_id.unwrap_or_default(),
        }
    }
}

/// Query/search/tail filter. All fields optional except the two that carry
/// documented defaults (`limit`, `offset`) and the boolean `all_sessions`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Filter {
    pub source: Option<String>,
    pub min_severity: Option<Severity>,
    pub category: Option<String>,
    pub emit_time_from: Option<f64>,
    pub emit_time_to: Option<f64>,
    pub session_id: Option<String>,
    pub instance_id: Option<String>,
    #[serde(default)]
    pub all_sessions: bool,
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

impl Filter {
    #[must_use]
    pub fn limit_or_default(&self) -> i64 {
        self.limit.unwrap_or(100)
    }

    #[must_use]
    pub fn offset_or_default(&self) -> i64 {
        self.offset.unwrap_or(0)
    }

    /// True when the store should implicitly scope to the latest session.
    #[must_use]
    pub fn needs_latest_session_scope(&self) -> bool {
        self.session_id.is_none() && !self.all_sessions
    }
}

/// `{session_id, first_seen, last_seen, log_count, instances}`.
#[derive(Debug, Clone, Serialize)]
pub struct SessionSummary {
    pub session_id: String,
    pub first_seen: f64,
    pub last_seen: f64,
    pub log_count: i64,
    pub instances: Vec<String>,
}

/// Aggregate store statistics, optionally scoped by source/since.
#[derive(Debug, Clone, Serialize)]
pub struct Stats {
    pub total: i64,
    pub per_source: Vec<(String, i64)>,
    pub error_count: i64,
    pub warning_count: i64,
    pub top_categories: Vec<(String, i64)>,
    pub distinct_session_count: i64,
    pub distinct_instance_count: i64,
    pub current_session: String,
}

/// Descriptor for a registered ingestion source (currently: file tailers).
#[derive(Debug, Clone, Serialize)]
pub struct SourceDescriptor {
    pub id: String,
    pub kind: &'static str,
    pub display_name: String,
    pub path: String,
    pub running: bool,
}

/// Converts an arbitrary JSON object body into a `Filter`, as the RPC tool
/// handlers do for every tool whose arguments embed filter fields.
pub fn filter_from_value(v: &Value) -> Filter {
    let opt_str = |k: &str| v.get(k).and_then(Value::as_str).map(str::to_string);
    let opt_f64 = |k: &str| v.get(k).and_then(Value::as_f64);
    let opt_i64 = |k: &str| v.get(k).and_then(Value::as_i64);
    Filter {
        source: opt_str("source"),
        min_severity: opt_str("min_severity").map(|s| Severity::parse_verbosity(&s)),
        category: opt_str("category"),
        emit_time_from: opt_f64("emit_time_from"),
        emit_time_to: opt_f64("emit_time_to"),
        session_id: opt_str("session_id"),
        instance_id: opt_str("instance_id"),
        all_sessions: v
            .get("all_sessions")
            .and_then(Value::as_bool)
            .unwrap_or(false),
        limit: opt_i64("limit"),
        offset: opt_i64("offset"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use rstest::rstest;

    #[test]
    fn severity_ordinals_are_documented_values() {
        assert_eq!(Severity::Fatal.ordinal(), 1);
        assert_eq!(Severity::VeryVerbose.ordinal(), 7);
    }

    #[rstest]
    #[case("Fatal", Severity::Fatal)]
    #[case("Error", Severity::Error)]
    #[case("Warning", Severity::Warning)]
    #[case("Display", Severity::Display)]
    #[case("Log", Severity::Log)]
    #[case("Verbose", Severity::Verbose)]
    #[case("VeryVerbose", Severity::VeryVerbose)]
    #[case("warning", Severity::Log)] // lowercase doesn't match any named level
    #[case("bogus", Severity::Log)]
    fn parse_verbosity_matches_each_named_level(#[case] input: &str, #[case] expected: Severity) {
        assert_eq!(Severity::parse_verbosity(input), expected);
    }

    #[test]
    fn ingest_payload_defaults() {
        let raw = br#"{"verbosity":"Warning","timestamp":1000.0}"#;
        let payload = IngestPayload::parse(raw).unwrap();
        let record = payload.into_record(42.0);
        assert_eq!(record.source, "unknown");
        assert_eq!(record.category, "LogTemp");
        assert_eq!(record.message, "");
        assert_eq!(record.severity, Severity::Warning);
        assert_eq!(record.emit_time, 1000.0);
        assert_eq!(record.receive_time, 42.0);
    }

    #[test]
    fn empty_payload_is_rejected() {
        assert!(matches!(IngestPayload::parse(b""), Err(ParseError::Empty)));
    }

    #[test]
    fn round_trips_through_json() {
        let record = LogRecord {
            id: 7,
            source: "client".into(),
            category: "LogTemp".into(),
            severity: Severity::Warning,
            message: "hello".into(),
            emit_time: 1.0,
            receive_time: 2.0,
            frame: Some(3),
            file: Some("a.rs".into()),
            line: Some(10),
            session_id: "s1".into(),
            instance_id: "i1".into(),
        };
        let json = serde_json::to_string(&record).unwrap();
        let back: LogRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(record, back);
    }
}
