//! Events command: per-line classification output as JSON lines.

use std::fs::File;
use std::io::{BufRead, BufReader, Write};
use std::path::Path;

use anyhow::{Context, Result};
use serde::Serialize;

use gcx_core::{
    AnalyzeOptions, LineOutcome, RuleRegistry, StreamAnalyzer, StreamReport, lossy_lines,
};

/// An unclassified line, as printed by `gcx events --unknown`.
#[derive(Debug, Serialize)]
struct UnknownLine<'a> {
    line: usize,
    text: &'a str,
}

/// Streams `reader` through the analyzer, writing one JSON object per
/// classified event (or per unknown line when `unknown` is set).
pub fn write_events<R: BufRead, W: Write>(
    writer: &mut W,
    registry: &RuleRegistry,
    reader: R,
    options: &AnalyzeOptions,
    unknown: bool,
) -> Result<StreamReport> {
    let mut analyzer = StreamAnalyzer::new(registry, options);

    for (index, line) in lossy_lines(reader).enumerate() {
        let line = line.context("failed to read log line")?;
        match analyzer.push_line(&line) {
            LineOutcome::Event(event) if !unknown => {
                serde_json::to_writer(&mut *writer, &event)?;
                writeln!(writer)?;
            }
            LineOutcome::Unknown if unknown => {
                let record = UnknownLine {
                    line: index + 1,
                    text: &line,
                };
                serde_json::to_writer(&mut *writer, &record)?;
                writeln!(writer)?;
            }
            _ => {}
        }
    }

    Ok(analyzer.finish())
}

pub fn run<W: Write>(
    writer: &mut W,
    registry: &RuleRegistry,
    path: &Path,
    options: &AnalyzeOptions,
    unknown: bool,
) -> Result<()> {
    let file = File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let report = write_events(writer, registry, BufReader::new(file), options, unknown)?;
    tracing::debug!(
        lines = report.diagnostics.lines,
        classified = report.diagnostics.classified,
        unknown = report.diagnostics.unknown,
        "events written"
    );
    Ok(())
}
