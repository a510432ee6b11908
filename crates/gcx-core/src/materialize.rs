//! Builds typed events from rule matches.
//!
//! Every event gets a canonical timestamp in milliseconds since process
//! start. Resolution order: absolute datestamp (relative to the file epoch),
//! uptime in milliseconds, uptime in seconds, uptime in nanoseconds. Legacy
//! lines without a bracketed decorator fall back to `datestamp` / `uptime`
//! captures in the same order.

use std::collections::BTreeMap;
use std::time::Duration;

use chrono::{DateTime, FixedOffset, TimeDelta};
use serde::Serialize;
use thiserror::Error;

use crate::classify::RuleMatch;
use crate::decorator::{Seconds, parse_datestamp};
use crate::event_kind::EventKind;
use crate::rule::EventRule;
use crate::trigger::Trigger;

/// Reasons a matched line cannot become an event.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum MaterializeError {
    #[error("{kind} line carries no timestamp and its rule is not throw-away")]
    Untimed { kind: EventKind },

    #[error("uptime seconds ({secs_ms} ms) and milliseconds ({ms} ms) disagree")]
    UptimeMismatch { secs_ms: f64, ms: i64 },

    #[error("datestamp {datestamp} precedes the file epoch {epoch}")]
    BeforeEpoch {
        datestamp: DateTime<FixedOffset>,
        epoch: DateTime<FixedOffset>,
    },

    #[error("uptime {uptime_ms} ms before datestamp {datestamp} is out of range")]
    UptimeOutOfRange {
        uptime_ms: i64,
        datestamp: DateTime<FixedOffset>,
    },

    #[error("invalid {field} value `{value}`")]
    InvalidField { field: &'static str, value: String },
}

/// A classified log line.
///
/// Created once per matched line and never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassifiedEvent {
    pub kind: EventKind,
    /// Position of the matching rule in the registry.
    pub rule_index: usize,
    /// One-based line number within the stream.
    pub line: usize,
    /// Milliseconds since process start; 0 for untimed throw-away lines.
    pub timestamp_ms: i64,
    /// The timestamp marks the end of the operation.
    pub endstamp: bool,
    pub throwaway: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gc_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    /// Explicit pause duration carried by the line itself.
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "crate::duration_ms::serialize_opt"
    )]
    pub duration: Option<Duration>,
    pub fields: BTreeMap<String, String>,
}

/// Turns rule matches into events, tracking the file's reference epoch.
#[derive(Debug, Clone, Default)]
pub struct Materializer {
    epoch: Option<DateTime<FixedOffset>>,
}

impl Materializer {
    pub const fn new() -> Self {
        Self { epoch: None }
    }

    /// Uses a known process start time instead of deriving it from the file.
    pub const fn with_epoch(epoch: DateTime<FixedOffset>) -> Self {
        Self { epoch: Some(epoch) }
    }

    /// The process start time datestamps are measured against, once known.
    ///
    /// Derived from the first datestamped line: `datestamp - uptime` when the
    /// line also carries an uptime, otherwise the datestamp itself.
    pub const fn epoch(&self) -> Option<DateTime<FixedOffset>> {
        self.epoch
    }

    pub fn materialize(
        &mut self,
        rule: &EventRule,
        matched: &RuleMatch,
        line: usize,
    ) -> Result<ClassifiedEvent, MaterializeError> {
        let kind = rule.kind();
        let timestamp_ms = match self.resolve_timestamp(matched)? {
            Some(ms) => ms,
            None if rule.throwaway() => 0,
            None => return Err(MaterializeError::Untimed { kind }),
        };

        let fields = &matched.fields;
        let gc_id = fields
            .get("gc_id")
            .map(|v| {
                v.parse().map_err(|_| MaterializeError::InvalidField {
                    field: "gc_id",
                    value: v.clone(),
                })
            })
            .transpose()?;
        let trigger = fields.get("trigger").map(|t| Trigger::from_log_text(t));

        Ok(ClassifiedEvent {
            kind,
            rule_index: matched.rule_index,
            line,
            timestamp_ms,
            endstamp: rule.endstamp(),
            throwaway: rule.throwaway(),
            gc_id,
            trigger,
            duration: explicit_duration(fields)?,
            fields: fields.clone(),
        })
    }

    fn resolve_timestamp(&mut self, matched: &RuleMatch) -> Result<Option<i64>, MaterializeError> {
        let decorator = &matched.decorator;
        decorator
            .check_uptimes()
            .map_err(|(secs_ms, ms)| MaterializeError::UptimeMismatch { secs_ms, ms })?;

        let (datestamp, uptime_ms) = if decorator.has_timing() {
            let uptime_ms = decorator
                .uptime_ms
                .or_else(|| decorator.uptime_s.map(Seconds::to_millis))
                .or_else(|| decorator.uptime_ns.map(nanos_to_millis));
            (decorator.datestamp, uptime_ms)
        } else {
            let datestamp = matched
                .fields
                .get("datestamp")
                .map(|text| {
                    parse_datestamp(text).ok_or_else(|| MaterializeError::InvalidField {
                        field: "datestamp",
                        value: text.clone(),
                    })
                })
                .transpose()?;
            let uptime_ms = matched
                .fields
                .get("uptime")
                .map(|text| {
                    Seconds::parse(text)
                        .map(Seconds::to_millis)
                        .ok_or_else(|| MaterializeError::InvalidField {
                            field: "uptime",
                            value: text.clone(),
                        })
                })
                .transpose()?;
            (datestamp, uptime_ms)
        };

        let Some(datestamp) = datestamp else {
            return Ok(uptime_ms);
        };

        let epoch = match self.epoch {
            Some(epoch) => epoch,
            None => {
                let uptime_ms = uptime_ms.unwrap_or(0);
                let epoch = TimeDelta::try_milliseconds(uptime_ms)
                    .and_then(|uptime| datestamp.checked_sub_signed(uptime))
                    .ok_or(MaterializeError::UptimeOutOfRange {
                        uptime_ms,
                        datestamp,
                    })?;
                tracing::debug!(%epoch, "established file epoch");
                self.epoch = Some(epoch);
                epoch
            }
        };
        let offset = (datestamp - epoch).num_milliseconds();
        if offset < 0 {
            return Err(MaterializeError::BeforeEpoch { datestamp, epoch });
        }
        Ok(Some(offset))
    }
}

/// Rounds non-negative nanoseconds to the nearest millisecond.
fn nanos_to_millis(ns: i64) -> i64 {
    ns / 1_000_000 + i64::from(ns % 1_000_000 >= 500_000)
}

/// Reads the explicit duration from `pause_ms`, `pause_s` or `pause_ns`.
fn explicit_duration(
    fields: &BTreeMap<String, String>,
) -> Result<Option<Duration>, MaterializeError> {
    const UNITS: [(&str, u32); 3] = [("pause_ms", 6), ("pause_s", 9), ("pause_ns", 0)];

    for (field, scale) in UNITS {
        if let Some(value) = fields.get(field) {
            return parse_decimal_nanos(value, scale)
                .map(|nanos| Some(Duration::from_nanos(nanos)))
                .ok_or_else(|| MaterializeError::InvalidField {
                    field,
                    value: value.clone(),
                });
        }
    }
    Ok(None)
}

/// Parses a non-negative decimal in a unit of `10^scale` nanoseconds,
/// exactly. Digits beyond nanosecond precision are truncated.
fn parse_decimal_nanos(text: &str, scale: u32) -> Option<u64> {
    let (whole, frac) = text.split_once('.').unwrap_or((text, ""));
    if whole.is_empty() || !whole.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    if !frac.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }

    let unit = 10u64.pow(scale);
    let mut nanos = whole.parse::<u64>().ok()?.checked_mul(unit)?;
    let mut place = unit;
    for digit in frac.bytes() {
        place /= 10;
        if place == 0 {
            break;
        }
        nanos = nanos.checked_add(u64::from(digit - b'0') * place)?;
    }
    Some(nanos)
}

#[cfg(test)]
mod tests {
    use super::*;

    use crate::classify::{Classification, classify};
    use crate::registry::RuleRegistry;

    fn materialize_line(
        materializer: &mut Materializer,
        registry: &RuleRegistry,
        line: &str,
    ) -> Result<ClassifiedEvent, MaterializeError> {
        let Classification::Matched(m) = classify(registry, line) else {
            panic!("expected match for {line}");
        };
        let rule = registry.get(m.rule_index).unwrap();
        materializer.materialize(rule, &m, 1)
    }

    #[test]
    fn unified_end_line_uses_uptime() {
        let registry = RuleRegistry::builtin();
        let mut materializer = Materializer::new();
        let event = materialize_line(
            &mut materializer,
            &registry,
            "[2.500s][info][gc] GC(3) Pause Young (Normal) (G1 Evacuation Pause) 24M->4M(256M) 3.456ms",
        )
        .unwrap();

        assert_eq!(event.kind, EventKind::UnifiedYoung);
        assert_eq!(event.timestamp_ms, 2500);
        assert!(event.endstamp);
        assert_eq!(event.gc_id, Some(3));
        assert_eq!(event.trigger, Some(Trigger::G1EvacuationPause));
        assert_eq!(event.duration, Some(Duration::from_micros(3456)));
        assert!(materializer.epoch().is_none());
    }

    #[test]
    fn datestamp_is_measured_from_derived_epoch() {
        let registry = RuleRegistry::builtin();
        let mut materializer = Materializer::new();

        let first = materialize_line(
            &mut materializer,
            &registry,
            "[2024-03-10T10:00:02.000+0000][2.000s][info][gc] Using G1",
        )
        .unwrap();
        assert_eq!(first.timestamp_ms, 2000);
        assert_eq!(
            materializer.epoch().unwrap().to_rfc3339(),
            "2024-03-10T10:00:00+00:00"
        );

        // Later lines with only a datestamp share the same epoch.
        let second = materialize_line(
            &mut materializer,
            &registry,
            "[2024-03-10T10:00:05.250+0000][info][gc] GC(1) Pause Young (Normal) (G1 Evacuation Pause) 24M->4M(256M) 1.000ms",
        )
        .unwrap();
        assert_eq!(second.timestamp_ms, 5250);
    }

    #[test]
    fn datestamp_before_epoch_is_rejected() {
        let registry = RuleRegistry::builtin();
        let epoch = parse_datestamp("2024-03-10T10:00:00.000+0000").unwrap();
        let mut materializer = Materializer::with_epoch(epoch);

        let err = materialize_line(
            &mut materializer,
            &registry,
            "[2024-03-10T09:59:59.000+0000][info][gc] Using G1",
        )
        .unwrap_err();
        assert!(matches!(err, MaterializeError::BeforeEpoch { .. }));
    }

    #[test]
    fn legacy_inline_uptime_and_seconds_duration() {
        let registry = RuleRegistry::builtin();
        let mut materializer = Materializer::new();
        let event = materialize_line(
            &mut materializer,
            &registry,
            "2.345: [GC (Allocation Failure) [PSYoungGen: 1024K->512K(2048K)] 1024K->600K(4096K), 0.0012345 secs]",
        )
        .unwrap();

        assert_eq!(event.kind, EventKind::ParallelYoung);
        assert_eq!(event.timestamp_ms, 2345);
        assert!(!event.endstamp);
        assert_eq!(event.trigger, Some(Trigger::AllocationFailure));
        assert_eq!(event.duration, Some(Duration::from_nanos(1_234_500)));
    }

    #[test]
    fn legacy_datestamp_with_uptime_sets_epoch() {
        let registry = RuleRegistry::builtin();
        let mut materializer = Materializer::new();
        let event = materialize_line(
            &mut materializer,
            &registry,
            "2024-03-10T10:00:02.345+0000: 2.345: [GC pause (G1 Evacuation Pause) (young), 0.0123456 secs]",
        )
        .unwrap();

        assert_eq!(event.timestamp_ms, 2345);
        assert_eq!(
            materializer.epoch().unwrap().to_rfc3339(),
            "2024-03-10T10:00:00+00:00"
        );
    }

    #[test]
    fn disagreeing_uptimes_are_malformed() {
        let registry = RuleRegistry::builtin();
        let err = materialize_line(
            &mut Materializer::new(),
            &registry,
            "[2.000s][9000ms][info][gc] Using G1",
        )
        .unwrap_err();
        assert!(matches!(err, MaterializeError::UptimeMismatch { ms: 9000, .. }));
    }

    #[test]
    fn untimed_throwaway_gets_zero() {
        let registry = RuleRegistry::builtin();
        let event =
            materialize_line(&mut Materializer::new(), &registry, "{Heap before GC invocations=1 (full 0):")
                .unwrap();
        assert_eq!(event.timestamp_ms, 0);
        assert!(event.throwaway);
    }

    #[test]
    fn untimed_analytical_event_is_a_configuration_error() {
        let registry = RuleRegistry::builtin();
        let err = materialize_line(
            &mut Materializer::new(),
            &registry,
            "[GC pause (G1 Evacuation Pause) (young), 0.0123456 secs]",
        )
        .unwrap_err();
        assert_eq!(
            err,
            MaterializeError::Untimed {
                kind: EventKind::G1YoungPause
            }
        );
    }

    #[test]
    fn nanosecond_durations_are_exact() {
        let registry = RuleRegistry::builtin();
        let event = materialize_line(
            &mut Materializer::new(),
            &registry,
            "[4.000s][info][safepoint] Safepoint \"G1CollectForAllocation\", Time since last: 1000 ns, Reaching safepoint: 200 ns, At safepoint: 3000 ns, Total: 3200 ns",
        )
        .unwrap();
        assert_eq!(event.duration, Some(Duration::from_nanos(3200)));
    }

    #[test]
    fn huge_uptime_next_to_datestamp_is_malformed() {
        let registry = RuleRegistry::builtin();
        for line in [
            "[2024-03-10T10:00:00.000+0000][10000000000000000ms][info][gc] Using G1",
            "2024-03-10T10:00:02.345+0000: 99999999999999.000: [GC pause (G1 Evacuation Pause) (young), 0.0123456 secs]",
        ] {
            let mut materializer = Materializer::new();
            let err = materialize_line(&mut materializer, &registry, line).unwrap_err();
            assert!(
                matches!(err, MaterializeError::UptimeOutOfRange { .. }),
                "{line}: {err:?}"
            );
            assert!(materializer.epoch().is_none());
        }
    }

    #[test]
    fn maximal_nanosecond_uptime_does_not_overflow() {
        let registry = RuleRegistry::builtin();
        let event = materialize_line(
            &mut Materializer::new(),
            &registry,
            "[9223372036854775807ns][info][gc] GC(0) Pause Full (System.gc()) 30M->5M(256M) 1.000ms",
        )
        .unwrap();
        assert_eq!(event.timestamp_ms, 9_223_372_036_855);
        assert_eq!(nanos_to_millis(1_499_999), 1);
        assert_eq!(nanos_to_millis(1_500_000), 2);
    }

    #[test]
    fn decimal_parsing() {
        assert_eq!(parse_decimal_nanos("3.456", 6), Some(3_456_000));
        assert_eq!(parse_decimal_nanos("0.0012345", 9), Some(1_234_500));
        assert_eq!(parse_decimal_nanos("1.0000000001", 9), Some(1_000_000_000));
        assert_eq!(parse_decimal_nanos("42", 0), Some(42));
        assert_eq!(parse_decimal_nanos("-1", 6), None);
        assert_eq!(parse_decimal_nanos(".5", 6), None);
    }
}
