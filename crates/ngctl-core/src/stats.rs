//! Parser for the `STATS` command's semicolon-delimited table.
//!
//! The daemon answers `STATS` with a header line followed by one row per
//! counter:
//!
//! ```text
//! SourceName;SourceId;SourceInstance;State;Type;Number
//! src.internal;s_local#0;;a;processed;42
//! ```
//!
//! Rows are independent. A malformed row is skipped and recorded in
//! [`StatsErrors`]; it never hides the rows around it.

use std::fmt;

use serde::Serialize;
use tracing::trace;

/// Lifecycle classification of the element a counter belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SourceState {
    /// `a`: backed by a running configuration object.
    Active,
    /// `d`: created and destroyed at runtime.
    Dynamic,
    /// `o`: no longer backed by a live configuration object.
    Orphaned,
    /// A state character this client does not know about.
    Other(char),
}

impl SourceState {
    pub fn from_char(c: char) -> Self {
        match c {
            'a' => SourceState::Active,
            'd' => SourceState::Dynamic,
            'o' => SourceState::Orphaned,
            other => SourceState::Other(other),
        }
    }

    /// The single character the daemon uses for this state.
    pub fn as_char(self) -> char {
        match self {
            SourceState::Active => 'a',
            SourceState::Dynamic => 'd',
            SourceState::Orphaned => 'o',
            SourceState::Other(c) => c,
        }
    }
}

impl fmt::Display for SourceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_char())
    }
}

impl Serialize for SourceState {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_char(self.as_char())
    }
}

/// One counter reported by the daemon.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
pub struct Stat {
    pub source_name: String,
    pub source_id: String,
    pub source_instance: String,
    pub source_state: SourceState,
    #[serde(rename = "type")]
    pub kind: String,
    pub number: u64,
}

impl fmt::Display for Stat {
    /// Renders the stat in the daemon's own row format.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{};{};{};{};{};{}",
            self.source_name,
            self.source_id,
            self.source_instance,
            self.source_state,
            self.kind,
            self.number
        )
    }
}

/// Why a counter value was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NumberError {
    #[error("empty value")]
    Empty,
    #[error("not a base-10 digit sequence")]
    InvalidDigit,
    #[error("value exceeds the 64-bit unsigned range")]
    Overflow,
}

/// A single rejected stats row.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum StatLineError {
    #[error("invalid stat line: {0:?}")]
    InvalidLine(String),

    #[error("invalid number {value:?} in stat line {line:?}: {reason}")]
    InvalidNumber {
        line: String,
        value: String,
        reason: NumberError,
    },
}

impl StatLineError {
    /// The raw row that was rejected.
    pub fn line(&self) -> &str {
        match self {
            StatLineError::InvalidLine(line) => line,
            StatLineError::InvalidNumber { line, .. } => line,
        }
    }
}

/// Every row error from one stats response, in input order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsErrors {
    errors: Vec<StatLineError>,
}

impl StatsErrors {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, err: StatLineError) {
        self.errors.push(err);
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, StatLineError> {
        self.errors.iter()
    }

    /// `Ok(())` when no row failed, otherwise `Err(self)`.
    pub fn into_result(self) -> Result<(), StatsErrors> {
        if self.is_empty() { Ok(()) } else { Err(self) }
    }
}

impl fmt::Display for StatsErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, err) in self.errors.iter().enumerate() {
            if i > 0 {
                writeln!(f)?;
            }
            write!(f, "{err}")?;
        }
        Ok(())
    }
}

impl std::error::Error for StatsErrors {}

impl IntoIterator for StatsErrors {
    type Item = StatLineError;
    type IntoIter = std::vec::IntoIter<StatLineError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.into_iter()
    }
}

impl<'a> IntoIterator for &'a StatsErrors {
    type Item = &'a StatLineError;
    type IntoIter = std::slice::Iter<'a, StatLineError>;

    fn into_iter(self) -> Self::IntoIter {
        self.errors.iter()
    }
}

impl FromIterator<StatLineError> for StatsErrors {
    fn from_iter<I: IntoIterator<Item = StatLineError>>(iter: I) -> Self {
        Self {
            errors: iter.into_iter().collect(),
        }
    }
}

/// Parsed rows plus the errors of the rows that were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatsResponse {
    pub stats: Vec<Stat>,
    pub errors: StatsErrors,
}

impl StatsResponse {
    /// True when every data row parsed.
    pub fn is_complete(&self) -> bool {
        self.errors.is_empty()
    }

    /// All-or-nothing view: the rows only if none was rejected.
    pub fn into_result(self) -> Result<Vec<Stat>, StatsErrors> {
        self.errors.into_result().map(|()| self.stats)
    }
}

/// Parse a raw `STATS` response. The first line is the column header and is
/// skipped without inspection.
pub fn parse_stats(raw: &str) -> StatsResponse {
    let body = raw.trim_end_matches(['\n', '\r']);
    let mut response = StatsResponse::default();
    if body.is_empty() {
        return response;
    }

    for line in body.split('\n').skip(1) {
        let line = line.strip_suffix('\r').unwrap_or(line);
        match parse_stat_line(line) {
            Ok(stat) => response.stats.push(stat),
            Err(err) => response.errors.push(err),
        }
    }

    trace!(
        parsed = response.stats.len(),
        rejected = response.errors.len(),
        "parsed stats response"
    );
    response
}

/// Parse a single data row.
pub fn parse_stat_line(line: &str) -> Result<Stat, StatLineError> {
    let fields: Vec<&str> = line.split(';').collect();
    let &[name, id, instance, state, kind, number] = fields.as_slice() else {
        return Err(StatLineError::InvalidLine(line.to_string()));
    };

    if state.len() != 1 {
        return Err(StatLineError::InvalidLine(line.to_string()));
    }
    let state = state
        .chars()
        .next()
        .map(SourceState::from_char)
        .ok_or_else(|| StatLineError::InvalidLine(line.to_string()))?;

    let number = parse_counter(number).map_err(|reason| StatLineError::InvalidNumber {
        line: line.to_string(),
        value: number.to_string(),
        reason,
    })?;

    Ok(Stat {
        source_name: name.to_string(),
        source_id: id.to_string(),
        source_instance: instance.to_string(),
        source_state: state,
        kind: kind.to_string(),
        number,
    })
}

/// Strict unsigned base-10: digits only, no sign, no whitespace.
fn parse_counter(value: &str) -> Result<u64, NumberError> {
    if value.is_empty() {
        return Err(NumberError::Empty);
    }
    if !value.bytes().all(|b| b.is_ascii_digit()) {
        return Err(NumberError::InvalidDigit);
    }
    value.parse::<u64>().map_err(|_| NumberError::Overflow)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const HEADER: &str = "SourceName;SourceId;SourceInstance;State;Type;Number";

    fn stat(name: &str, id: &str, instance: &str, state: SourceState, kind: &str, n: u64) -> Stat {
        Stat {
            source_name: name.to_string(),
            source_id: id.to_string(),
            source_instance: instance.to_string(),
            source_state: state,
            kind: kind.to_string(),
            number: n,
        }
    }

    #[test]
    fn test_parse_well_formed_response() {
        let raw = format!(
            "{HEADER}\n\
             center;;queued;a;processed;0\n\
             src.internal;s_local#0;;a;processed;42\n\
             dst.file;d_messages#0;/var/log/messages;o;dropped;7\n\
             filter;f_dyn;;d;matched;18446744073709551615\n"
        );

        let rsp = parse_stats(&raw);
        assert!(rsp.is_complete());
        assert_eq!(
            rsp.stats,
            vec![
                stat("center", "", "queued", SourceState::Active, "processed", 0),
                stat("src.internal", "s_local#0", "", SourceState::Active, "processed", 42),
                stat(
                    "dst.file",
                    "d_messages#0",
                    "/var/log/messages",
                    SourceState::Orphaned,
                    "dropped",
                    7
                ),
                stat("filter", "f_dyn", "", SourceState::Dynamic, "matched", u64::MAX),
            ]
        );
    }

    #[test]
    fn test_parse_mixed_response() {
        let raw = format!("{HEADER}\nsrc;s_file#0;;a;processed;1234\nbad;row;only;three\n");

        let rsp = parse_stats(&raw);
        assert_eq!(
            rsp.stats,
            vec![stat("src", "s_file#0", "", SourceState::Active, "processed", 1234)]
        );
        assert_eq!(rsp.errors.len(), 1);
        let err = rsp.errors.iter().next().unwrap();
        assert_eq!(err, &StatLineError::InvalidLine("bad;row;only;three".to_string()));
        assert_eq!(err.line(), "bad;row;only;three");
    }

    #[test]
    fn test_wrong_field_count_is_skipped() {
        let raw = format!(
            "{HEADER}\n\
             a;b;c;a;processed;1\n\
             a;b;c;a;processed;2;extra\n\
             a;b;c;a;processed;3\n"
        );

        let rsp = parse_stats(&raw);
        assert_eq!(rsp.stats.len(), 2);
        assert_eq!(rsp.stats[0].number, 1);
        assert_eq!(rsp.stats[1].number, 3);
        assert_eq!(
            rsp.errors.into_iter().collect::<Vec<_>>(),
            vec![StatLineError::InvalidLine("a;b;c;a;processed;2;extra".to_string())]
        );
    }

    #[test]
    fn test_bad_state_field_is_skipped() {
        let raw = format!(
            "{HEADER}\n\
             a;b;c;;processed;1\n\
             a;b;c;ao;processed;2\n\
             a;b;c;o;processed;3\n"
        );

        let rsp = parse_stats(&raw);
        assert_eq!(rsp.stats.len(), 1);
        assert_eq!(rsp.stats[0].source_state, SourceState::Orphaned);
        let lines: Vec<&str> = rsp.errors.iter().map(StatLineError::line).collect();
        assert_eq!(lines, vec!["a;b;c;;processed;1", "a;b;c;ao;processed;2"]);
    }

    #[test]
    fn test_unknown_state_char_is_kept() {
        let rsp = parse_stats(&format!("{HEADER}\na;b;c;x;processed;1\n"));
        assert!(rsp.is_complete());
        assert_eq!(rsp.stats[0].source_state, SourceState::Other('x'));
        assert_eq!(rsp.stats[0].source_state.to_string(), "x");
    }

    #[test]
    fn test_bad_numbers_are_skipped() {
        let raw = format!(
            "{HEADER}\n\
             a;b;c;a;processed;abc\n\
             a;b;c;a;processed;18446744073709551616\n\
             a;b;c;a;processed;-1\n\
             a;b;c;a;processed;+1\n\
             a;b;c;a;processed;\n\
             a;b;c;a;processed;5\n"
        );

        let rsp = parse_stats(&raw);
        assert_eq!(rsp.stats.len(), 1);
        assert_eq!(rsp.stats[0].number, 5);

        let reasons: Vec<NumberError> = rsp
            .errors
            .iter()
            .map(|e| match e {
                StatLineError::InvalidNumber { reason, .. } => reason.clone(),
                other => panic!("unexpected error: {other}"),
            })
            .collect();
        assert_eq!(
            reasons,
            vec![
                NumberError::InvalidDigit,
                NumberError::Overflow,
                NumberError::InvalidDigit,
                NumberError::InvalidDigit,
                NumberError::Empty,
            ]
        );
    }

    #[test]
    fn test_records_plus_errors_equal_data_lines() {
        let raw = format!(
            "{HEADER}\n\
             a;b;c;a;t;1\n\
             garbage\n\
             \n\
             a;b;c;a;t;x\n\
             a;b;c;d;t;2\n"
        );

        let rsp = parse_stats(&raw);
        assert_eq!(rsp.stats.len() + rsp.errors.len(), 5);
        assert_eq!(rsp.stats.len(), 2);
    }

    #[test]
    fn test_header_only_and_empty_responses() {
        assert_eq!(parse_stats(&format!("{HEADER}\n")), StatsResponse::default());
        assert_eq!(parse_stats(""), StatsResponse::default());
        assert_eq!(parse_stats("\n"), StatsResponse::default());
    }

    #[test]
    fn test_header_is_not_validated() {
        let rsp = parse_stats("whatever the daemon says\na;b;c;a;t;1");
        assert!(rsp.is_complete());
        assert_eq!(rsp.stats.len(), 1);
    }

    #[test]
    fn test_crlf_line_endings() {
        let rsp = parse_stats(&format!("{HEADER}\r\na;b;c;a;t;9\r\n"));
        assert!(rsp.is_complete());
        assert_eq!(rsp.stats[0].number, 9);
    }

    #[test]
    fn test_parse_is_deterministic() {
        let raw = format!("{HEADER}\na;b;c;a;t;1\nbroken\na;b;c;d;t;2\n");
        assert_eq!(parse_stats(&raw), parse_stats(&raw));
    }

    #[test]
    fn test_into_result() {
        let ok = parse_stats(&format!("{HEADER}\na;b;c;a;t;1\n"));
        assert_eq!(ok.into_result().unwrap().len(), 1);

        let bad = parse_stats(&format!("{HEADER}\na;b;c;a;t;1\nbroken\n"));
        let errs = bad.into_result().unwrap_err();
        assert_eq!(errs.len(), 1);
    }

    #[test]
    fn test_aggregate_display_lists_every_line() {
        let rsp = parse_stats(&format!("{HEADER}\nfirst\nsecond\n"));
        assert_eq!(
            rsp.errors.to_string(),
            "invalid stat line: \"first\"\ninvalid stat line: \"second\""
        );
    }

    #[test]
    fn test_stat_display_round_trips_row() {
        let row = "dst.file;d_messages#0;/var/log/messages;o;dropped;7";
        assert_eq!(parse_stat_line(row).unwrap().to_string(), row);
    }
}
