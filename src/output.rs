use std::io::{self, Write};

use serde::Serialize;

use crate::app::{ProgressEvent, ProgressSink};
use crate::report::{ComparisonReport, CorrelationReport};

#[derive(Debug, Clone, Copy)]
pub enum OutputMode {
    Text,
    Json,
}

/// Progress goes to the log; results go to stdout.
pub struct TextOutput;

impl TextOutput {
    pub fn print_report(report: &ComparisonReport) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        write_report(&mut stdout, report)
    }

    pub fn print_correlation(report: &CorrelationReport) -> io::Result<()> {
        let mut stdout = io::stdout().lock();
        write_correlation(&mut stdout, report)
    }
}

impl ProgressSink for TextOutput {
    fn event(&self, event: ProgressEvent) {
        match event.elapsed {
            Some(elapsed) => tracing::info!(
                elapsed_ms = elapsed.as_millis() as u64,
                "{}",
                event.message
            ),
            None => tracing::info!("{}", event.message),
        }
    }
}

pub fn write_report<W: Write>(out: &mut W, report: &ComparisonReport) -> io::Result<()> {
    let verdict = if report.passed() { "PASS" } else { "FAIL" };
    writeln!(out, "{} validation: {verdict}", report.validation)?;
    writeln!(out, "  compared: {}/{} passed", report.successes, report.total)?;
    if report.expected > 0 {
        writeln!(out, "  expected: {}", report.expected)?;
    }
    if report.cells_compared > 0 {
        writeln!(
            out,
            "  cells: {}/{} matched",
            report.cells_matched, report.cells_compared
        )?;
    }
    write_list(out, "failed", &report.failed)?;
    write_list(out, "missing from matrix", &report.missing_from_matrix)?;
    write_list(out, "not compared", &report.not_compared)?;
    if !report.mismatches.is_empty() {
        writeln!(out, "  first mismatches:")?;
        for mismatch in &report.mismatches {
            writeln!(
                out,
                "    {} [{}]: gdc={} matrix={}",
                mismatch.id, mismatch.column, mismatch.remote, mismatch.matrix
            )?;
        }
    }
    write_list(out, "diagnostics", &report.diagnostics)?;
    Ok(())
}

pub fn write_correlation<W: Write>(out: &mut W, report: &CorrelationReport) -> io::Result<()> {
    if let Some(sample) = &report.sample {
        writeln!(out, "sample: {sample}")?;
    }
    for pair in &report.pairs {
        let axis = if pair.by_row { "first row" } else { "first sample" };
        writeln!(out, "{} vs {} ({axis})", pair.left, pair.right)?;
        writeln!(out, "  pearson:  {}", format_coefficient(pair.pearson))?;
        if !pair.by_row {
            writeln!(out, "  spearman: {}", format_coefficient(pair.spearman))?;
        }
    }
    Ok(())
}

fn format_coefficient(value: Option<f64>) -> String {
    value
        .map(|value| format!("{value:.6}"))
        .unwrap_or_else(|| "n/a".to_string())
}

fn write_list<W: Write>(out: &mut W, label: &str, items: &[String]) -> io::Result<()> {
    if items.is_empty() {
        return Ok(());
    }
    writeln!(out, "  {label} ({}):", items.len())?;
    for item in items {
        writeln!(out, "    {item}")?;
    }
    Ok(())
}

pub struct JsonOutput;

impl JsonOutput {
    pub fn print_report(report: &ComparisonReport) -> io::Result<()> {
        Self::print_json(report)
    }

    pub fn print_correlation(report: &CorrelationReport) -> io::Result<()> {
        Self::print_json(report)
    }

    fn print_json<T: Serialize>(value: &T) -> io::Result<()> {
        let json = serde_json::to_string_pretty(value).map_err(io::Error::other)?;
        let mut stdout = io::stdout();
        stdout.write_all(json.as_bytes())?;
        stdout.write_all(b"\n")?;
        Ok(())
    }
}

impl ProgressSink for JsonOutput {
    fn event(&self, _event: ProgressEvent) {}
}
