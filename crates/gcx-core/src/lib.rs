//! Core engine for JVM garbage-collection log analysis.
//!
//! This crate contains the fundamental types and logic for:
//! - Classification: matching log lines against an ordered rule catalogue
//! - Materialization: decorator parsing and canonical timestamps
//! - Reconciliation: pairing start and end markers into pause intervals
//! - Aggregation: mergeable per-trigger (or per-kind) pause summaries

pub mod aggregate;
pub mod analyze;
mod catalogue;
pub mod classify;
pub mod decorator;
mod duration_ms;
pub mod event_kind;
pub mod materialize;
pub mod reconcile;
pub mod registry;
pub mod rule;
pub mod trigger;

pub use aggregate::{GroupBy, GroupingMismatch, Summary, SummaryKey, SummaryRecord};
pub use analyze::{
    AnalyzeError, AnalyzeOptions, Diagnostics, LineOutcome, LossyLines, RunReport, StreamAnalyzer,
    StreamReport, analyze_file, analyze_files, analyze_lines, analyze_reader, lossy_lines,
};
pub use classify::{Classification, RuleMatch, classify};
pub use duration_ms::to_millis;
pub use event_kind::{EventKind, UnknownEventKind};
pub use materialize::{ClassifiedEvent, MaterializeError, Materializer};
pub use reconcile::{
    DoubleStartPolicy, IncompleteInterval, IncompleteReason, MalformedInterval, Reconciler,
    Resolution, ResolvedInterval,
};
pub use registry::{RegistryError, RuleRegistry};
pub use rule::{EventRule, RuleSpec};
pub use trigger::Trigger;
