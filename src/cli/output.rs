//! Output formatting utilities

use console::{measure_text_width, style};
use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use crate::cli::OutputFormat;
use crate::entities::result::Verdict;

/// Determine the effective output format based on context
pub fn effective_format(format: OutputFormat) -> OutputFormat {
    match format {
        OutputFormat::Auto => OutputFormat::Table,
        other => other,
    }
}

/// Print `value` as JSON or YAML; returns `false` for other formats
pub fn print_structured<T: Serialize + ?Sized>(value: &T, format: OutputFormat) -> Result<bool> {
    match format {
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(value).into_diagnostic()?;
            println!("{}", json);
            Ok(true)
        }
        OutputFormat::Yaml => {
            let yaml = serde_yml::to_string(value).into_diagnostic()?;
            print!("{}", yaml);
            Ok(true)
        }
        _ => Ok(false),
    }
}

/// Print rows as CSV to stdout
pub fn print_csv(headers: &[&str], rows: &[Vec<String>]) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(std::io::stdout());
    wtr.write_record(headers).into_diagnostic()?;
    for row in rows {
        wtr.write_record(row).into_diagnostic()?;
    }
    wtr.flush().into_diagnostic()
}

/// Print rows as aligned columns with a bold header
pub fn print_table(headers: &[&str], rows: &[Vec<String>]) {
    let mut widths: Vec<usize> = headers.iter().map(|h| measure_text_width(h)).collect();
    for row in rows {
        for (i, cell) in row.iter().enumerate() {
            if let Some(w) = widths.get_mut(i) {
                *w = (*w).max(measure_text_width(cell));
            }
        }
    }

    let header: Vec<String> = headers
        .iter()
        .zip(&widths)
        .map(|(h, w)| pad(&style(h).bold().to_string(), *w))
        .collect();
    println!("{}", header.join("  ").trim_end());
    println!("{}", style("─".repeat(widths.iter().sum::<usize>() + 2 * widths.len().saturating_sub(1))).dim());

    for row in rows {
        let line: Vec<String> = row
            .iter()
            .zip(&widths)
            .map(|(cell, w)| pad(cell, *w))
            .collect();
        println!("{}", line.join("  ").trim_end());
    }
}

/// Verdict text coloured for terminals
pub fn styled_verdict(verdict: Verdict) -> String {
    match verdict {
        Verdict::Pass => style(verdict).green().bold().to_string(),
        Verdict::Fail => style(verdict).red().bold().to_string(),
        Verdict::Unknown => style(verdict).dim().to_string(),
    }
}

// Pad by display width so styled text lines up
fn pad(text: &str, width: usize) -> String {
    let len = measure_text_width(text);
    format!("{}{}", text, " ".repeat(width.saturating_sub(len)))
}
