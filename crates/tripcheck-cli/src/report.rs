//! `report` command: summarize a results CSV written by an earlier run.

use std::path::Path;

use anyhow::Context;
use tripcheck_core::{RunSummary, TestResult, TestStatus};

use crate::run::format_summary;

/// Lines for every result that needs a human to look at it.
pub(crate) fn attention_lines(results: &[TestResult]) -> Vec<String> {
    results
        .iter()
        .filter(|r| r.status != TestStatus::Pass)
        .map(|r| {
            format!(
                "{:<13} {} ({}): {}",
                r.status.as_str(),
                r.store.store_name,
                r.store.store_id,
                r.error_details
            )
        })
        .collect()
}

/// # Errors
///
/// Returns an error if the file cannot be read as a report.
pub(crate) fn run_report(path: &Path) -> anyhow::Result<()> {
    let results = tripcheck_engine::read_report(path)
        .with_context(|| format!("failed to read report {}", path.display()))?;
    let summary = RunSummary::from_results(&results);

    println!("{}", path.display());
    println!("{}", format_summary(&summary));

    let attention = attention_lines(&results);
    if !attention.is_empty() {
        println!("\nNeeds attention:");
        for line in attention {
            println!("  {line}");
        }
    }
    Ok(())
}
