//! Decorator parsing for unified JVM logging prefixes.
//!
//! A unified-logging line looks like
//! `[2024-03-10T10:00:00.123+0000][2.345s][2345ms][info][gc,start] GC(3) ...`.
//! Each bracketed token is a datestamp, an uptime (`s`, `ms` or `ns`), or a
//! level/tag token. Legacy (JDK 8) lines carry no decorator at all.

use chrono::{DateTime, FixedOffset};
use serde::Serialize;

/// Uptime in seconds, with the number of fractional digits it was logged with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Seconds {
    pub value: f64,
    pub decimals: u32,
}

impl Seconds {
    /// Parses `2.345` style text (no unit suffix).
    pub fn parse(text: &str) -> Option<Self> {
        let (whole, frac) = text.split_once('.').unwrap_or((text, ""));
        if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        if !frac.bytes().all(|b| b.is_ascii_digit()) {
            return None;
        }
        let value = text.parse().ok()?;
        let decimals = u32::try_from(frac.len()).ok()?;
        Some(Self { value, decimals })
    }

    /// Converts to milliseconds with rounding.
    #[allow(clippy::cast_possible_truncation)]
    pub fn to_millis(self) -> i64 {
        (self.value * 1000.0).round() as i64
    }

    /// Half of the smallest step this value can express, in milliseconds,
    /// floored at one millisecond since millisecond uptimes are integral.
    #[allow(clippy::cast_possible_wrap)]
    fn tolerance_ms(self) -> f64 {
        let step_ms = 1000.0 / 10f64.powi(self.decimals.min(9) as i32);
        (step_ms / 2.0).max(1.0)
    }
}

/// Timing and tag prefix extracted from one log line.
///
/// Only the fields present in the text are populated.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Decorator {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub datestamp: Option<DateTime<FixedOffset>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_s: Option<Seconds>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_ms: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub uptime_ns: Option<i64>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tags: Vec<String>,
}

impl Decorator {
    /// Whether any timing token was present.
    pub const fn has_timing(&self) -> bool {
        self.datestamp.is_some()
            || self.uptime_s.is_some()
            || self.uptime_ms.is_some()
            || self.uptime_ns.is_some()
    }

    /// Whether a level/tag token equals `tag` (after padding is trimmed).
    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }

    /// Checks that the second and millisecond uptimes agree to the precision
    /// the seconds value was logged with.
    ///
    /// Returns the two disagreeing values in milliseconds on failure.
    #[allow(clippy::cast_precision_loss)]
    pub fn check_uptimes(&self) -> Result<(), (f64, i64)> {
        let (Some(secs), Some(ms)) = (self.uptime_s, self.uptime_ms) else {
            return Ok(());
        };
        let secs_ms = secs.value * 1000.0;
        if (secs_ms - ms as f64).abs() <= secs.tolerance_ms() {
            Ok(())
        } else {
            Err((secs_ms, ms))
        }
    }
}

/// Result of parsing a line's prefix.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedLine<'a> {
    pub decorator: Decorator,
    /// Number of bracketed tokens consumed.
    pub tokens: usize,
    /// A bracket was present but could not be parsed; the decorator was
    /// discarded and `body` is the full line.
    pub malformed: bool,
    /// The line after the decorator, leading whitespace removed.
    pub body: &'a str,
}

enum Token {
    Datestamp(DateTime<FixedOffset>),
    Seconds(Seconds),
    Millis(i64),
    Nanos(i64),
    /// Bare pid or tid; consumed but not modelled.
    Id,
    Tag(String),
}

enum TokenError {
    /// Not a decorator token; ends the prefix.
    Unrecognized,
    /// Looks like a timing token but does not parse.
    Malformed,
}

/// Parses the leading run of bracketed decorator tokens.
///
/// Never fails: a malformed prefix yields zero tokens so the full line can
/// still be classified.
pub fn parse_decorator(line: &str) -> ParsedLine<'_> {
    let mut decorator = Decorator::default();
    let mut tokens = 0;
    let mut rest = line;

    while let Some(after_open) = rest.strip_prefix('[') {
        let Some(close) = after_open.find(']') else {
            // Unbalanced. Only an error once a decorator has started.
            return undecorated(line, tokens > 0);
        };
        let content = &after_open[..close];
        if content.contains('[') {
            // A nested bracket means this is log content, e.g. `[Full GC [PSYoungGen: ...`
            break;
        }

        match parse_token(content) {
            Ok(token) => {
                if !apply_token(&mut decorator, token) {
                    tracing::trace!(token = content, "duplicate decorator timing token");
                    return undecorated(line, true);
                }
            }
            Err(TokenError::Unrecognized) => break,
            Err(TokenError::Malformed) => {
                tracing::trace!(token = content, "malformed decorator token");
                return undecorated(line, true);
            }
        }

        tokens += 1;
        rest = &after_open[close + 1..];
    }

    if tokens == 0 {
        return undecorated(line, false);
    }

    ParsedLine {
        decorator,
        tokens,
        malformed: false,
        body: rest.trim_start(),
    }
}

fn undecorated(line: &str, malformed: bool) -> ParsedLine<'_> {
    ParsedLine {
        decorator: Decorator::default(),
        tokens: 0,
        malformed,
        body: line,
    }
}

/// Stores a token, returning `false` if that timing field was already set.
fn apply_token(decorator: &mut Decorator, token: Token) -> bool {
    fn set<T>(slot: &mut Option<T>, value: T) -> bool {
        if slot.is_some() {
            return false;
        }
        *slot = Some(value);
        true
    }

    match token {
        Token::Datestamp(dt) => set(&mut decorator.datestamp, dt),
        Token::Seconds(s) => set(&mut decorator.uptime_s, s),
        Token::Millis(ms) => set(&mut decorator.uptime_ms, ms),
        Token::Nanos(ns) => set(&mut decorator.uptime_ns, ns),
        Token::Id => true,
        Token::Tag(tag) => {
            decorator.tags.push(tag);
            true
        }
    }
}

fn parse_token(content: &str) -> Result<Token, TokenError> {
    let content = content.trim();
    let bytes = content.as_bytes();

    if bytes.first().is_some_and(u8::is_ascii_digit) {
        if looks_like_date(bytes) {
            return parse_datestamp(content)
                .map(Token::Datestamp)
                .ok_or(TokenError::Malformed);
        }
        if let Some(digits) = content.strip_suffix("ms") {
            return parse_integer(digits).map(Token::Millis);
        }
        if let Some(digits) = content.strip_suffix("ns") {
            return parse_integer(digits).map(Token::Nanos);
        }
        if let Some(secs) = content.strip_suffix('s') {
            return Seconds::parse(secs)
                .map(Token::Seconds)
                .ok_or(TokenError::Malformed);
        }
        if bytes.iter().all(u8::is_ascii_digit) {
            return Ok(Token::Id);
        }
        return Err(TokenError::Unrecognized);
    }

    if is_tag_shaped(content) {
        return Ok(Token::Tag(content.to_string()));
    }

    Err(TokenError::Unrecognized)
}

fn looks_like_date(bytes: &[u8]) -> bool {
    bytes.len() >= 10 && bytes[4] == b'-' && bytes[7] == b'-'
}

fn parse_integer(digits: &str) -> Result<i64, TokenError> {
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TokenError::Malformed);
    }
    digits.parse().map_err(|_| TokenError::Malformed)
}

/// Parses JVM datestamps (`2024-03-10T10:00:00.123+0000`) and RFC 3339 text.
pub fn parse_datestamp(text: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f%z")
        .or_else(|_| DateTime::parse_from_rfc3339(text))
        .ok()
}

/// Level and tag tokens: `info`, `gc,start`, `gc,heap,exit   `.
fn is_tag_shaped(content: &str) -> bool {
    content.starts_with(|c: char| c.is_ascii_alphabetic())
        && content
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ',' || c == ' ')
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_full_unified_prefix() {
        let line = "[2024-03-10T10:00:00.123+0000][2.345s][2345ms][info][gc,start    ] GC(3) Pause Young";
        let parsed = parse_decorator(line);

        assert_eq!(parsed.tokens, 5);
        assert!(!parsed.malformed);
        assert_eq!(parsed.body, "GC(3) Pause Young");

        let d = &parsed.decorator;
        assert_eq!(
            d.datestamp.unwrap().to_rfc3339(),
            "2024-03-10T10:00:00.123+00:00"
        );
        assert_eq!(d.uptime_s.unwrap().to_millis(), 2345);
        assert_eq!(d.uptime_s.unwrap().decimals, 3);
        assert_eq!(d.uptime_ms, Some(2345));
        assert_eq!(d.tags, vec!["info", "gc,start"]);
        assert!(d.has_tag("gc,start"));
    }

    #[test]
    fn legacy_line_has_no_decorator() {
        let line = "2.345: [GC (Allocation Failure) 1024K->512K(2048K), 0.0012345 secs]";
        let parsed = parse_decorator(line);
        assert_eq!(parsed.tokens, 0);
        assert!(!parsed.malformed);
        assert_eq!(parsed.body, line);
        assert_eq!(parsed.decorator, Decorator::default());
    }

    #[test]
    fn bracketed_log_content_is_not_a_decorator() {
        let line = "[Full GC (Ergonomics) [PSYoungGen: 512K->0K(1024K)] 0.0100 secs]";
        let parsed = parse_decorator(line);
        assert_eq!(parsed.tokens, 0);
        assert!(!parsed.malformed);
        assert_eq!(parsed.body, line);
    }

    #[test]
    fn malformed_timing_discards_whole_prefix() {
        let line = "[info][1.2.3s] GC(1) Pause Young";
        let parsed = parse_decorator(line);
        assert_eq!(parsed.tokens, 0);
        assert!(parsed.malformed);
        assert_eq!(parsed.body, line);
    }

    #[test]
    fn invalid_date_is_malformed() {
        let parsed = parse_decorator("[2024-13-45T10:00:00.000+0000] Using G1");
        assert_eq!(parsed.tokens, 0);
        assert!(parsed.malformed);
    }

    #[test]
    fn unbalanced_bracket_after_tokens_is_malformed() {
        let parsed = parse_decorator("[0.5s][info");
        assert_eq!(parsed.tokens, 0);
        assert!(parsed.malformed);
    }

    #[test]
    fn unrecognized_token_stops_parsing() {
        let parsed = parse_decorator("[0.5s][<init>][info] body");
        assert_eq!(parsed.tokens, 1);
        assert_eq!(parsed.body, "[<init>][info] body");
        assert_eq!(parsed.decorator.uptime_s.unwrap().to_millis(), 500);
    }

    #[test]
    fn pid_and_tid_tokens_are_consumed() {
        let parsed =
            parse_decorator("[0.5s][12345][12346][info][gc] GC(0) Pause Young (Normal) (G1 Evacuation Pause)");
        assert!(!parsed.malformed);
        assert_eq!(parsed.tokens, 5);
        assert_eq!(parsed.body, "GC(0) Pause Young (Normal) (G1 Evacuation Pause)");
        assert_eq!(parsed.decorator.tags, vec!["info", "gc"]);
    }

    #[test]
    fn duplicate_timing_token_is_malformed() {
        let parsed = parse_decorator("[0.5s][0.6s] body");
        assert!(parsed.malformed);
        assert_eq!(parsed.tokens, 0);
    }

    #[test]
    fn uptimes_agree_within_precision() {
        let ok = parse_decorator("[2.345s][2345ms] x").decorator;
        assert!(ok.check_uptimes().is_ok());

        let coarse = parse_decorator("[2.3s][2345ms] x").decorator;
        assert!(coarse.check_uptimes().is_ok());

        let bad = parse_decorator("[2.345s][9000ms] x").decorator;
        assert_eq!(bad.check_uptimes(), Err((2345.0, 9000)));
    }

    #[test]
    fn rfc3339_datestamps_are_accepted() {
        let parsed = parse_decorator("[2024-03-10T10:00:00.5Z] x");
        assert_eq!(parsed.tokens, 1);
        assert!(parsed.decorator.datestamp.is_some());
    }

    #[test]
    fn nanosecond_uptime_is_recognized() {
        let parsed = parse_decorator("[1500000000ns][gc] x");
        assert_eq!(parsed.decorator.uptime_ns, Some(1_500_000_000));
        assert_eq!(parsed.body, "x");
    }
}
