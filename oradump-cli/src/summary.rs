//! End-of-run summary

use colored::*;
use oradump_core::domain::job::{JobOutcome, JobResult};
use oradump_runner::scheduler::BatchSummary;

/// Prints every job's result, failures with their reason
pub fn print(outcomes: &[JobOutcome], records_reported: usize) {
    let summary = BatchSummary::from_outcomes(outcomes);

    if summary.total == 0 {
        println!("{}", "No scripts were run.".yellow());
        return;
    }

    println!();
    println!("{}", format!("Ran {} script(s):", summary.total).bold());

    for outcome in outcomes {
        let name = outcome
            .source
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| outcome.source.display().to_string());

        match &outcome.result {
            JobResult::Completed {
                artifact,
                rows_written,
                statements_executed,
            } => {
                println!(
                    "  {} {} -> {} ({} row(s), {} statement(s))",
                    "✓".green(),
                    name,
                    artifact.display(),
                    rows_written,
                    statements_executed
                );
            }
            JobResult::Failed {
                statement_index,
                error,
            } => {
                let at = statement_index
                    .map(|i| format!(" at statement {}", i))
                    .unwrap_or_default();
                println!("  {} {}{}: {}", "✗".red(), name, at, error.message.red());
            }
        }
    }

    println!();
    let line = format!(
        "{} completed, {} failed, {} row(s) written, {} error record(s) reported",
        summary.completed, summary.failed, summary.rows_written, records_reported
    );
    if summary.failed > 0 {
        println!("{}", line.yellow());
    } else {
        println!("{}", line.green());
    }
}
