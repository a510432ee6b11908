//! Stream and file drivers.
//!
//! One file is one ordered stream with its own epoch and reconciliation
//! state. Files are analyzed independently (in parallel) and their summaries
//! merged in input order afterwards.

use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::{DateTime, FixedOffset};
use rayon::prelude::*;
use serde::{Serialize, Serializer};
use thiserror::Error;

use crate::aggregate::{GroupBy, Summary};
use crate::classify::{Classification, classify};
use crate::materialize::{ClassifiedEvent, MaterializeError, Materializer};
use crate::reconcile::{
    DoubleStartPolicy, IncompleteInterval, IncompleteReason, MalformedInterval, MalformedReason,
    Reconciler, Resolution, ResolvedInterval,
};
use crate::registry::RuleRegistry;

/// Buffer size for `BufReader` (64KB for optimal performance on large files)
const BUFFER_SIZE: usize = 64 * 1024;

#[derive(Debug, Error)]
pub enum AnalyzeError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Per-run analysis settings.
#[derive(Debug, Clone, Default)]
pub struct AnalyzeOptions {
    pub group_by: GroupBy,
    pub double_start: DoubleStartPolicy,
    /// Fold incomplete intervals into the summary as zero-length pauses.
    pub include_incomplete: bool,
    /// Known process start time; derived from the first datestamp otherwise.
    pub epoch: Option<DateTime<FixedOffset>>,
}

/// Line and interval counters for one stream (or a merged run).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Diagnostics {
    pub lines: u64,
    pub classified: u64,
    pub unknown: u64,
    pub throwaway: u64,
    pub malformed_decorators: u64,
    pub malformed_events: u64,
    pub intervals: u64,
    pub malformed_intervals: u64,
    /// Subset of `malformed_intervals`: ends with no start and no duration.
    pub orphan_ends: u64,
    pub incomplete_intervals: u64,
}

impl Diagnostics {
    pub fn merge(&mut self, other: &Self) {
        self.lines += other.lines;
        self.classified += other.classified;
        self.unknown += other.unknown;
        self.throwaway += other.throwaway;
        self.malformed_decorators += other.malformed_decorators;
        self.malformed_events += other.malformed_events;
        self.intervals += other.intervals;
        self.malformed_intervals += other.malformed_intervals;
        self.orphan_ends += other.orphan_ends;
        self.incomplete_intervals += other.incomplete_intervals;
    }
}

/// A matched line that could not become an event.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LineError {
    pub line: usize,
    #[serde(serialize_with = "serialize_display")]
    pub error: MaterializeError,
}

fn serialize_display<S: Serializer>(
    error: &MaterializeError,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    serializer.collect_str(error)
}

/// Everything one stream produced.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StreamReport {
    pub summary: Summary,
    pub diagnostics: Diagnostics,
    pub incomplete: Vec<IncompleteInterval>,
    pub malformed_intervals: Vec<MalformedInterval>,
    pub malformed_events: Vec<LineError>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch: Option<DateTime<FixedOffset>>,
    /// Processing stopped before the end of the stream.
    pub partial: bool,
    /// The read failure that ended the stream early, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub read_error: Option<String>,
}

/// What happened to one line.
#[derive(Debug, Clone, PartialEq)]
pub enum LineOutcome {
    Event(ClassifiedEvent),
    Unknown,
    Malformed,
}

/// Incremental analysis of one ordered stream of lines.
#[derive(Debug)]
pub struct StreamAnalyzer<'r> {
    registry: &'r RuleRegistry,
    include_incomplete: bool,
    materializer: Materializer,
    reconciler: Reconciler,
    summary: Summary,
    diagnostics: Diagnostics,
    incomplete: Vec<IncompleteInterval>,
    malformed_intervals: Vec<MalformedInterval>,
    malformed_events: Vec<LineError>,
}

impl<'r> StreamAnalyzer<'r> {
    pub fn new(registry: &'r RuleRegistry, options: &AnalyzeOptions) -> Self {
        let materializer = options
            .epoch
            .map_or_else(Materializer::new, Materializer::with_epoch);
        Self {
            registry,
            include_incomplete: options.include_incomplete,
            materializer,
            reconciler: Reconciler::new(options.double_start),
            summary: Summary::new(options.group_by),
            diagnostics: Diagnostics::default(),
            incomplete: Vec::new(),
            malformed_intervals: Vec::new(),
            malformed_events: Vec::new(),
        }
    }

    /// The epoch datestamps are measured against, once established.
    pub const fn epoch(&self) -> Option<DateTime<FixedOffset>> {
        self.materializer.epoch()
    }

    pub const fn summary(&self) -> &Summary {
        &self.summary
    }

    /// Classifies, materializes, reconciles and aggregates the next line.
    pub fn push_line(&mut self, line: &str) -> LineOutcome {
        self.diagnostics.lines += 1;
        let line_number = usize::try_from(self.diagnostics.lines).unwrap_or(usize::MAX);

        let matched = match classify(self.registry, line) {
            Classification::Matched(matched) => matched,
            Classification::Unknown {
                malformed_decorator,
                ..
            } => {
                if malformed_decorator {
                    self.diagnostics.malformed_decorators += 1;
                }
                self.diagnostics.unknown += 1;
                return LineOutcome::Unknown;
            }
        };
        if matched.malformed_decorator {
            self.diagnostics.malformed_decorators += 1;
        }

        let Some(rule) = self.registry.get(matched.rule_index) else {
            return LineOutcome::Unknown;
        };
        let event = match self.materializer.materialize(rule, &matched, line_number) {
            Ok(event) => event,
            Err(error) => {
                tracing::debug!(line = line_number, %error, "malformed event");
                self.diagnostics.malformed_events += 1;
                self.malformed_events.push(LineError {
                    line: line_number,
                    error,
                });
                return LineOutcome::Malformed;
            }
        };

        self.diagnostics.classified += 1;
        if event.throwaway {
            self.diagnostics.throwaway += 1;
        }
        if let Some(resolution) = self.reconciler.push(&event) {
            self.apply(resolution);
        }
        LineOutcome::Event(event)
    }

    /// Ends a fully read stream; open starts are reported as truncated.
    pub fn finish(self) -> StreamReport {
        self.close(IncompleteReason::Truncated, false)
    }

    /// Ends a stream that was abandoned part-way.
    pub fn abandon(self) -> StreamReport {
        self.close(IncompleteReason::Cancelled, true)
    }

    fn close(mut self, reason: IncompleteReason, partial: bool) -> StreamReport {
        let reconciler = std::mem::take(&mut self.reconciler);
        for resolution in reconciler.finish(reason) {
            self.apply(resolution);
        }

        tracing::debug!(
            lines = self.diagnostics.lines,
            unknown = self.diagnostics.unknown,
            intervals = self.diagnostics.intervals,
            partial,
            "stream finished"
        );

        StreamReport {
            summary: self.summary,
            diagnostics: self.diagnostics,
            incomplete: self.incomplete,
            malformed_intervals: self.malformed_intervals,
            malformed_events: self.malformed_events,
            epoch: self.materializer.epoch(),
            partial,
            read_error: None,
        }
    }

    fn apply(&mut self, resolution: Resolution) {
        match resolution {
            Resolution::Interval(interval) => {
                self.diagnostics.intervals += 1;
                self.summary.record(&interval);
            }
            Resolution::Incomplete(incomplete) => {
                self.diagnostics.incomplete_intervals += 1;
                if self.include_incomplete {
                    self.summary.record(&ResolvedInterval {
                        kind: incomplete.kind,
                        gc_id: incomplete.gc_id,
                        trigger: incomplete.trigger.clone(),
                        start_ms: incomplete.start_ms,
                        duration: std::time::Duration::ZERO,
                        line: incomplete.line,
                    });
                }
                self.incomplete.push(incomplete);
            }
            Resolution::Malformed(malformed) => {
                self.diagnostics.malformed_intervals += 1;
                if malformed.reason == MalformedReason::OrphanEnd {
                    self.diagnostics.orphan_ends += 1;
                }
                self.malformed_intervals.push(malformed);
            }
        }
    }
}

/// Analyzes an in-memory sequence of lines.
///
/// `cancel` is checked before every line; once set, the partial report is
/// returned.
pub fn analyze_lines<I, S>(
    registry: &RuleRegistry,
    lines: I,
    options: &AnalyzeOptions,
    cancel: &AtomicBool,
) -> StreamReport
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut analyzer = StreamAnalyzer::new(registry, options);
    for line in lines {
        if cancel.load(Ordering::Relaxed) {
            return analyzer.abandon();
        }
        analyzer.push_line(line.as_ref());
    }
    analyzer.finish()
}

/// Lines of a reader with invalid UTF-8 replaced by U+FFFD.
///
/// Created by [`lossy_lines`].
#[derive(Debug)]
pub struct LossyLines<R> {
    reader: R,
    buf: Vec<u8>,
}

/// Splits `reader` into lines like [`BufRead::lines`], but never fails on
/// bytes that are not valid UTF-8.
pub const fn lossy_lines<R: BufRead>(reader: R) -> LossyLines<R> {
    LossyLines {
        reader,
        buf: Vec::new(),
    }
}

impl<R: BufRead> Iterator for LossyLines<R> {
    type Item = io::Result<String>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                if self.buf.ends_with(b"\n") {
                    self.buf.pop();
                    if self.buf.ends_with(b"\r") {
                        self.buf.pop();
                    }
                }
                Some(Ok(String::from_utf8_lossy(&self.buf).into_owned()))
            }
            Err(e) => Some(Err(e)),
        }
    }
}

/// Analyzes a buffered reader line by line.
///
/// A read error ends the stream early: the lines read so far are kept, the
/// report is marked partial and carries the error.
pub fn analyze_reader<R: BufRead>(
    registry: &RuleRegistry,
    reader: R,
    options: &AnalyzeOptions,
    cancel: &AtomicBool,
) -> StreamReport {
    let mut analyzer = StreamAnalyzer::new(registry, options);
    for line in lossy_lines(reader) {
        if cancel.load(Ordering::Relaxed) {
            return analyzer.abandon();
        }
        match line {
            Ok(line) => {
                analyzer.push_line(&line);
            }
            Err(e) => {
                tracing::warn!(
                    error = %e,
                    lines = analyzer.diagnostics.lines,
                    "read failed, keeping partial results"
                );
                let mut report = analyzer.abandon();
                report.read_error = Some(e.to_string());
                return report;
            }
        }
    }
    analyzer.finish()
}

/// Analyzes one log file.
///
/// Only failing to open the file is an error; see [`analyze_reader`] for
/// failures part-way through.
pub fn analyze_file(
    registry: &RuleRegistry,
    path: &Path,
    options: &AnalyzeOptions,
    cancel: &AtomicBool,
) -> Result<StreamReport, AnalyzeError> {
    let file = File::open(path).map_err(|source| AnalyzeError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let reader = BufReader::with_capacity(BUFFER_SIZE, file);
    Ok(analyze_reader(registry, reader, options, cancel))
}

/// Report for one file of a multi-file run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FileReport {
    pub path: PathBuf,
    #[serde(flatten)]
    pub report: StreamReport,
}

/// A file that could not be read.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FailedFile {
    pub path: PathBuf,
    pub error: String,
}

/// Merged result of analyzing several files.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub summary: Summary,
    pub diagnostics: Diagnostics,
    pub files: Vec<FileReport>,
    pub failed: Vec<FailedFile>,
    /// At least one file was abandoned part-way.
    pub partial: bool,
}

/// Analyzes files in parallel, one independent stream each, then merges
/// the per-file summaries in input order.
pub fn analyze_files(
    registry: &RuleRegistry,
    paths: &[PathBuf],
    options: &AnalyzeOptions,
    cancel: &AtomicBool,
) -> RunReport {
    let results: Vec<(PathBuf, Result<StreamReport, AnalyzeError>)> = paths
        .par_iter()
        .map(|path| (path.clone(), analyze_file(registry, path, options, cancel)))
        .collect();

    let mut run = RunReport {
        summary: Summary::new(options.group_by),
        diagnostics: Diagnostics::default(),
        files: Vec::with_capacity(results.len()),
        failed: Vec::new(),
        partial: false,
    };

    for (path, result) in results {
        match result {
            Ok(report) => {
                if let Some(error) = &report.read_error {
                    tracing::warn!(path = ?path, %error, "log file only partly read");
                }
                // Every stream is built from the same options.
                if let Err(e) = run.summary.merge(&report.summary) {
                    tracing::warn!(path = ?path, error = %e, "summary not merged");
                }
                run.diagnostics.merge(&report.diagnostics);
                run.partial |= report.partial;
                run.files.push(FileReport { path, report });
            }
            Err(e) => {
                tracing::warn!(path = ?path, error = %e, "skipping unreadable log file");
                run.failed.push(FailedFile {
                    path,
                    error: e.to_string(),
                });
            }
        }
    }

    run
}
