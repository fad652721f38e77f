//! Stateless scan of tailed log lines for the in-game mod's completion
//! marker.
//!
//! The mod mirrors agent completions into the client log as flash trace
//! lines. A qualifying line carries the marker at or after the timestamp
//! prefix and ends with the fixed completion phrase. Each appended line is
//! scanned exactly once; there is no state beyond the line itself.

use super::alerts::AlertEvent;

/// Byte length of the client log's timestamp prefix; the marker can only
/// occur after it, and shorter lines are ignored outright.
pub const PATTERN_MIN_OFFSET: usize = 20;
/// Trace tag the in-game mod logs under.
pub const PATTERN_MARKER: &str = "Scaleform.Clockwatcher";
/// Fixed phrase a completion line ends with.
pub const PATTERN_SUFFIX: &str = "agent mission completed";

/// Whether one log line is a completion report.
pub fn line_matches(line: &str) -> bool {
    if line.len() <= PATTERN_MIN_OFFSET {
        return false;
    }
    let after_prefix = match line.get(PATTERN_MIN_OFFSET..) {
        Some(rest) => rest,
        // Offset split a multi-byte character; not a client log line.
        None => return false,
    };
    after_prefix.contains(PATTERN_MARKER) && line.ends_with(PATTERN_SUFFIX)
}

/// Scan a batch of tailed lines, emitting one alert per qualifying line.
pub fn scan(source: &str, lines: &[String]) -> Vec<AlertEvent> {
    lines
        .iter()
        .filter(|line| line_matches(line))
        .map(|line| AlertEvent::PatternMatch {
            source: source.to_string(),
            line: line.clone(),
        })
        .collect()
}
