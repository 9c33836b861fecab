//! Run report rendering

use crate::crawler::{CategoryReport, RunReport};
use std::fmt::Write;

fn category_line(category: &CategoryReport) -> String {
    let mut line = format!(
        "  - {}: {} recipes from {}/{} pages",
        category.category, category.records, category.pages_fetched, category.pages_requested
    );
    if category.pages_failed > 0 {
        let _ = write!(line, ", {} pages failed", category.pages_failed);
    }
    if category.pages_skipped > 0 {
        let _ = write!(line, ", {} pages skipped", category.pages_skipped);
    }
    if category.extraction_errors > 0 {
        let _ = write!(line, ", {} items skipped", category.extraction_errors);
    }
    line
}

/// Renders a run report as plain text
pub fn format_run_report(report: &RunReport) -> String {
    let mut out = String::new();

    let _ = writeln!(out, "=== Harvest Run #{} ===\n", report.run_id);
    let _ = writeln!(
        out,
        "{} recipes written in {:.1}s{}",
        report.total_records(),
        report.elapsed.as_secs_f64(),
        if report.cancelled { " (cancelled)" } else { "" }
    );

    let committed: Vec<_> = report.committed().collect();
    if !committed.is_empty() {
        let _ = writeln!(out, "\nCommitted ({}):", committed.len());
        for category in committed {
            let _ = writeln!(out, "{}", category_line(category));
        }
    }

    let failed: Vec<_> = report.failed().collect();
    if !failed.is_empty() {
        let _ = writeln!(out, "\nFailed ({}):", failed.len());
        for category in failed {
            let _ = writeln!(
                out,
                "{}: {}",
                category_line(category),
                category.error.as_deref().unwrap_or("unknown error")
            );
        }
    }

    let skipped: Vec<_> = report.skipped().collect();
    if !skipped.is_empty() {
        let _ = writeln!(out, "\nSkipped ({}):", skipped.len());
        for category in skipped {
            let _ = writeln!(out, "  - {}", category.category);
        }
    }

    out
}

/// Prints a run report to stdout
pub fn print_run_report(report: &RunReport) {
    print!("{}", format_run_report(report));
}
