//! Timing reconciliation.
//!
//! Unified logging often splits one pause over a `gc,start` line and a later
//! end line. The reconciler pairs them per [`ReconcileKey`] and turns every
//! pause-bearing event into a [`Resolution`]:
//!
//! - start line, no duration: held until its end arrives
//! - start line with a duration (legacy logs): interval starting at the line
//! - end line with an open start: interval from start to end, timed by the
//!   end line's own duration when it logs one
//! - end line with a duration but no open start: interval ending at the line
//! - end line with neither: malformed orphan
//!
//! Throw-away and non-pause events never touch reconciliation state.

use std::collections::BTreeMap;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::event_kind::EventKind;
use crate::materialize::ClassifiedEvent;
use crate::trigger::Trigger;

/// What to do when a start arrives while one is already open for its key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DoubleStartPolicy {
    /// Report the held start as incomplete and hold the new one.
    #[default]
    FlushIncomplete,
    /// Keep both; an end closes the most recent open start.
    Nest,
}

/// Pending starts are keyed by event kind and, when logged, the GC id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct ReconcileKey {
    pub kind: EventKind,
    pub gc_id: Option<u64>,
}

impl ReconcileKey {
    pub const fn of(event: &ClassifiedEvent) -> Self {
        Self {
            kind: event.kind,
            gc_id: event.gc_id,
        }
    }
}

/// A completed pause.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ResolvedInterval {
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gc_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    /// Milliseconds since process start.
    pub start_ms: i64,
    #[serde(serialize_with = "crate::duration_ms::serialize")]
    pub duration: Duration,
    /// Line that completed the interval.
    pub line: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IncompleteReason {
    /// The stream ended while the start was open.
    Truncated,
    /// Another start for the same key replaced it.
    Superseded,
    /// Processing was abandoned while the start was open.
    Cancelled,
}

/// A start that never saw its end.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct IncompleteInterval {
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gc_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trigger: Option<Trigger>,
    pub start_ms: i64,
    /// Line of the start marker.
    pub line: usize,
    pub reason: IncompleteReason,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "reason")]
pub enum MalformedReason {
    /// The end precedes its start.
    NegativeDuration { start_ms: i64 },
    /// An end marker with no open start and no duration of its own.
    OrphanEnd,
}

/// A pause whose timing is inconsistent. Never folded into summaries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MalformedInterval {
    pub kind: EventKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gc_id: Option<u64>,
    pub end_ms: i64,
    pub line: usize,
    #[serde(flatten)]
    pub reason: MalformedReason,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum Resolution {
    Interval(ResolvedInterval),
    Incomplete(IncompleteInterval),
    Malformed(MalformedInterval),
}

#[derive(Debug, Clone)]
struct PendingStart {
    start_ms: i64,
    line: usize,
    trigger: Option<Trigger>,
}

/// Per-stream reconciliation state.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    policy: DoubleStartPolicy,
    pending: BTreeMap<ReconcileKey, Vec<PendingStart>>,
}

impl Reconciler {
    pub fn new(policy: DoubleStartPolicy) -> Self {
        Self {
            policy,
            pending: BTreeMap::new(),
        }
    }

    /// Number of starts still waiting for an end.
    pub fn open_count(&self) -> usize {
        self.pending.values().map(Vec::len).sum()
    }

    /// Feeds the next event of the stream, in file order.
    pub fn push(&mut self, event: &ClassifiedEvent) -> Option<Resolution> {
        if event.throwaway || !event.kind.is_pause() {
            return None;
        }

        let key = ReconcileKey::of(event);

        if !event.endstamp {
            return match event.duration {
                Some(duration) => Some(Resolution::Interval(ResolvedInterval {
                    kind: event.kind,
                    gc_id: event.gc_id,
                    trigger: event.trigger.clone(),
                    start_ms: event.timestamp_ms,
                    duration,
                    line: event.line,
                })),
                None => self.open(key, event),
            };
        }

        if let Some(start) = self.take_open(&key) {
            return Some(close(&start, event));
        }

        if let Some(duration) = event.duration {
            let millis = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
            return Some(Resolution::Interval(ResolvedInterval {
                kind: event.kind,
                gc_id: event.gc_id,
                trigger: event.trigger.clone(),
                start_ms: event.timestamp_ms.saturating_sub(millis).max(0),
                duration,
                line: event.line,
            }));
        }

        tracing::warn!(kind = %event.kind, line = event.line, "end marker without start or duration");
        Some(Resolution::Malformed(MalformedInterval {
            kind: event.kind,
            gc_id: event.gc_id,
            end_ms: event.timestamp_ms,
            line: event.line,
            reason: MalformedReason::OrphanEnd,
        }))
    }

    /// Ends the stream; every open start becomes an incomplete interval.
    pub fn finish(self, reason: IncompleteReason) -> Vec<Resolution> {
        let mut out = Vec::with_capacity(self.open_count());
        for (key, starts) in self.pending {
            for start in starts {
                tracing::warn!(kind = %key.kind, line = start.line, ?reason, "pause never ended");
                out.push(Resolution::Incomplete(incomplete(key, start, reason)));
            }
        }
        out
    }

    fn open(&mut self, key: ReconcileKey, event: &ClassifiedEvent) -> Option<Resolution> {
        let starts = self.pending.entry(key).or_default();
        let superseded = match self.policy {
            DoubleStartPolicy::FlushIncomplete => starts.pop(),
            DoubleStartPolicy::Nest => None,
        };
        starts.push(PendingStart {
            start_ms: event.timestamp_ms,
            line: event.line,
            trigger: event.trigger.clone(),
        });

        superseded.map(|start| {
            tracing::debug!(kind = %key.kind, line = start.line, "start superseded before its end");
            Resolution::Incomplete(incomplete(key, start, IncompleteReason::Superseded))
        })
    }

    fn take_open(&mut self, key: &ReconcileKey) -> Option<PendingStart> {
        let starts = self.pending.get_mut(key)?;
        let start = starts.pop();
        if starts.is_empty() {
            self.pending.remove(key);
        }
        start
    }
}

fn close(start: &PendingStart, end: &ClassifiedEvent) -> Resolution {
    let elapsed = end.timestamp_ms.saturating_sub(start.start_ms);
    match u64::try_from(elapsed) {
        Ok(millis) => Resolution::Interval(ResolvedInterval {
            kind: end.kind,
            gc_id: end.gc_id,
            trigger: end.trigger.clone().or_else(|| start.trigger.clone()),
            start_ms: start.start_ms,
            // The pause time the JVM logged is finer than the timestamps.
            duration: end.duration.unwrap_or(Duration::from_millis(millis)),
            line: end.line,
        }),
        Err(_) => {
            tracing::warn!(
                kind = %end.kind,
                start_ms = start.start_ms,
                end_ms = end.timestamp_ms,
                "pause ends before it starts"
            );
            Resolution::Malformed(MalformedInterval {
                kind: end.kind,
                gc_id: end.gc_id,
                end_ms: end.timestamp_ms,
                line: end.line,
                reason: MalformedReason::NegativeDuration {
                    start_ms: start.start_ms,
                },
            })
        }
    }
}

fn incomplete(key: ReconcileKey, start: PendingStart, reason: IncompleteReason) -> IncompleteInterval {
    IncompleteInterval {
        kind: key.kind,
        gc_id: key.gc_id,
        trigger: start.trigger,
        start_ms: start.start_ms,
        line: start.line,
        reason,
    }
}
