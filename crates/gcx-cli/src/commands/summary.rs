//! Summary command: pause totals across log files.

use std::fmt::Write as _;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::AtomicBool;

use anyhow::{Result, bail};

use gcx_core::{
    AnalyzeOptions, Diagnostics, GroupBy, RuleRegistry, RunReport, Summary, analyze_files,
    to_millis,
};

/// Formats the summary table and run diagnostics for terminal output.
pub fn format_summary(summary: &Summary, diagnostics: &Diagnostics) -> String {
    let mut output = String::new();

    let title = match summary.group_by() {
        GroupBy::Trigger => "GC PAUSES BY TRIGGER",
        GroupBy::Kind => "GC PAUSES BY KIND",
    };
    let _ = writeln!(output, "{title}");
    let _ = writeln!(output, "{}", "─".repeat(title.chars().count()));

    if summary.is_empty() {
        let _ = writeln!(output, "(no pauses found)");
    } else {
        let _ = writeln!(
            output,
            "{:<28}{:>7}{:>12}{:>12}{:>12}",
            "KEY", "COUNT", "TOTAL_MS", "MAX_MS", "MEAN_MS"
        );
        for record in summary.records() {
            let _ = writeln!(
                output,
                "{:<28}{:>7}{:>12.3}{:>12.3}{:>12.3}",
                record.key.to_string(),
                record.count,
                to_millis(record.total),
                to_millis(record.max),
                to_millis(record.mean()),
            );
        }
    }

    let total: std::time::Duration = summary.records().map(|r| r.total).sum();
    let _ = writeln!(output);
    let _ = writeln!(
        output,
        "Pauses: {} ({:.3} ms)",
        summary.total_count(),
        to_millis(total)
    );
    let _ = writeln!(
        output,
        "Lines: {} read, {} classified, {} unknown, {} throw-away",
        diagnostics.lines, diagnostics.classified, diagnostics.unknown, diagnostics.throwaway
    );
    let _ = writeln!(
        output,
        "Problems: {} incomplete, {} malformed intervals, {} malformed events, {} malformed decorators",
        diagnostics.incomplete_intervals,
        diagnostics.malformed_intervals,
        diagnostics.malformed_events,
        diagnostics.malformed_decorators
    );

    output
}

pub fn run<W: Write>(
    writer: &mut W,
    registry: &RuleRegistry,
    files: &[PathBuf],
    options: &AnalyzeOptions,
    json: bool,
) -> Result<()> {
    let cancel = AtomicBool::new(false);
    let report: RunReport = analyze_files(registry, files, options, &cancel);

    for failed in &report.failed {
        eprintln!("gcx: {}: {}", failed.path.display(), failed.error);
    }
    for file in &report.files {
        if let Some(error) = &file.report.read_error {
            eprintln!("gcx: {}: stopped early: {error}", file.path.display());
        }
    }
    if report.files.is_empty() {
        bail!("no log file could be read");
    }

    if json {
        writeln!(writer, "{}", serde_json::to_string_pretty(&report)?)?;
    } else {
        write!(writer, "{}", format_summary(&report.summary, &report.diagnostics))?;
        if report.partial {
            writeln!(writer, "(partial: analysis was interrupted)")?;
        }
    }

    Ok(())
}
