//! End-of-run summary.

use std::fmt::Write;
use std::path::Path;

use placematch_core::{format_eta, RunReport};

/// Human-readable summary of a finished run.
pub fn render_summary(report: &RunReport, output: &Path) -> String {
    let mut out = String::new();
    let rule = "=".repeat(60);

    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(out, "Run {} ({})", report.run_id, report.status);
    let _ = writeln!(out, "{}", rule);
    let _ = writeln!(
        out,
        "This run:    {} processed, {} found, {} failed",
        report.processed, report.found, report.failed
    );
    let _ = writeln!(
        out,
        "Match rate:  {:.1}% ({} confident)",
        report.match_rate(),
        report.confident
    );
    if report.abandoned > 0 || report.remaining > 0 {
        let _ = writeln!(
            out,
            "Left over:   {} abandoned, {} never started (rerun with --resume)",
            report.abandoned, report.remaining
        );
    }
    let _ = writeln!(
        out,
        "Elapsed:     {} ({:.1} tasks/min)",
        format_eta(report.elapsed),
        report.average_rate_per_min()
    );
    let _ = writeln!(
        out,
        "All runs:    {} done, {} found ({:.1}%), {} confident",
        report.totals.completed,
        report.totals.successes,
        report.totals.match_rate(),
        report.totals.confident
    );
    match report.results_written {
        Some(count) => {
            let _ = writeln!(out, "Results:     {} written to {}", count, output.display());
        }
        None => {
            let _ = writeln!(out, "Results:     not written");
        }
    }
    let _ = write!(out, "{}", rule);
    out
}
