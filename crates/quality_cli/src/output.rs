use anyhow::{Context, Result};
use colored::*;
use quality_core::{JobReport, RuleResult, Severity, SourceReport, Status};
use std::path::Path;

use crate::OutputFormat;

/// Failure samples printed per rule in the text report.
const SAMPLE_PREVIEW: usize = 5;

pub fn print_job_report(report: &JobReport, format: OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => println!("{}", to_json(report)?),
        OutputFormat::Text => print_text_report(report),
    }
    Ok(())
}

pub fn write_json_report(report: &JobReport, path: &Path) -> Result<()> {
    std::fs::write(path, to_json(report)?)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

fn to_json(report: &JobReport) -> Result<String> {
    serde_json::to_string_pretty(report).context("Failed to serialize report")
}

fn status_label(status: Status) -> ColoredString {
    let label = status.to_string();
    match status {
        Status::Passed => label.green().bold(),
        Status::Warning => label.yellow().bold(),
        Status::Failed | Status::Aborted => label.red().bold(),
    }
}

fn print_text_report(report: &JobReport) {
    println!("\n{}", "═".repeat(60));
    println!("{}", "  DATA QUALITY REPORT".bold());
    println!("{}", "═".repeat(60));

    for source in &report.sources {
        print_source(source);
    }

    let summary = &report.summary;
    println!("\n{}", "Summary:".bold());
    println!("  Sources:        {}", summary.sources);
    println!("  Passed:         {}", summary.passed);
    println!("  Warnings:       {}", summary.warnings);
    println!("  Failed:         {}", summary.failed);
    println!("  Aborted:        {}", summary.aborted);
    println!(
        "  Rules failed:   {} of {}",
        summary.rules_failed, summary.rules_total
    );
    println!("  Duration:       {:.1} ms", report.duration_ms);

    let symbol = match report.status {
        Status::Passed => "✓".green().bold(),
        Status::Warning => "!".yellow().bold(),
        _ => "✗".red().bold(),
    };
    println!("\n{} Validation {}", symbol, status_label(report.status));
    println!("{}", "═".repeat(60));
}

fn print_source(source: &SourceReport) {
    println!(
        "\n{} {} [{}]",
        "Source:".bold(),
        source.source.bold(),
        status_label(source.status)
    );
    println!(
        "  rows: {}, batches: {}, passes: {}, {:.1} ms",
        source.rows_processed, source.batches_processed, source.passes, source.duration_ms
    );
    if let Some(reason) = &source.aborted {
        println!("  {} {}", "Aborted:".red().bold(), reason.to_string().red());
    }

    for result in &source.results {
        print_rule(result, 1);
    }
}

fn print_rule(result: &RuleResult, depth: usize) {
    let indent = "  ".repeat(depth);
    let mark = if result.passed {
        "✓".green().bold()
    } else if result.severity == Severity::Warning {
        "!".yellow().bold()
    } else {
        "✗".red().bold()
    };

    println!(
        "{}{} {} ({}) {}/{} failed: {}",
        indent,
        mark,
        result.rule.bold(),
        result.kind,
        result.failed_count,
        result.total_count,
        result.message
    );

    if let Some(error) = &result.error {
        println!("{}    {} {}", indent, "error:".red(), error);
    }

    for sample in result.samples.iter().take(SAMPLE_PREVIEW) {
        println!(
            "{}    row {} {} = '{}': {}",
            indent, sample.row, sample.field, sample.value, sample.message
        );
    }
    if result.samples.len() > SAMPLE_PREVIEW {
        println!(
            "{}    ... {} more samples",
            indent,
            result.samples.len() - SAMPLE_PREVIEW
        );
    }

    for nested in &result.nested {
        print_rule(nested, depth + 1);
    }
}

pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

pub fn print_error(message: &str) {
    eprintln!("{} {}", "✗".red().bold(), message.red());
}

pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}
