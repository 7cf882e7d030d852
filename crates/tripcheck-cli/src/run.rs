//! `run` and `check` command handlers.
//!
//! Both print one progress line per finished store and a summary block at
//! the end. Per-store failures are part of the results; only run-level
//! failures (unreadable input, browser launch, session load) are errors.

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use tripcheck_core::{RunSummary, StoreSpec, TestResult, TestStatus};
use tripcheck_engine::{parse_store_csv, RunEvent, Verifier};

pub(crate) fn store_from_args(
    store_id: String,
    store_name: String,
    xfas_url: String,
    merchant_site_url: String,
    network_id: Option<String>,
) -> StoreSpec {
    StoreSpec {
        store_id,
        store_name,
        xfas_url,
        merchant_site_url,
        network_id: network_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(|| StoreSpec::DEFAULT_NETWORK_ID.to_string()),
    }
}

/// One progress line, e.g. `[2/7] PASS  Acme (101) -> https://acme.com/`.
pub(crate) fn format_progress(done: usize, total: usize, result: &TestResult) -> String {
    let mut line = format!(
        "[{done}/{total}] {:<13} {} ({})",
        result.status.as_str(),
        result.store.store_name,
        result.store.store_id
    );
    if !result.actual_landing_url.is_empty() {
        line.push_str(&format!(" -> {}", result.actual_landing_url));
    }
    if !result.error_details.is_empty() && result.status != TestStatus::Pass {
        line.push_str(&format!(" ({})", result.error_details));
    }
    line
}

pub(crate) fn format_summary(summary: &RunSummary) -> String {
    format!(
        "Total: {}\nPassed: {}\nFailed: {}\nPending: {}\nManual review: {}\nErrors: {}\nScreenshots: {}",
        summary.total,
        summary.passed,
        summary.failed,
        summary.pending,
        summary.manual_review,
        summary.errors,
        summary.screenshots
    )
}

/// Verify every store in the CSV at `input`, streaming progress to stdout.
///
/// # Errors
///
/// Returns an error if the input cannot be read or parsed, login capture
/// fails, or the run aborts before completing.
pub(crate) async fn run_store_list(
    verifier: Arc<Verifier>,
    input: &Path,
    login_if_missing: bool,
) -> anyhow::Result<()> {
    let text = tokio::fs::read_to_string(input)
        .await
        .with_context(|| format!("failed to read store list {}", input.display()))?;
    let stores = parse_store_csv(&text)
        .with_context(|| format!("invalid store list {}", input.display()))?;
    tracing::info!(input = %input.display(), stores = stores.len(), "loaded store list");

    if login_if_missing && !verifier.session_status().await {
        println!(
            "No saved session; opening a browser for {}s to log in...",
            verifier.settings().login_wait.as_secs()
        );
        verifier.capture_session().await?;
        println!("Session saved to {}", verifier.sessions().path().display());
    }

    let results_dir = verifier.settings().results_dir.clone();
    let mut events = Arc::clone(&verifier).stream(stores);
    let mut total = 0;
    let mut done = 0;

    while let Some(event) = events.recv().await {
        match event {
            RunEvent::Start { total: count } => {
                total = count;
                println!("Testing {count} stores...");
            }
            RunEvent::Result { result } => {
                done += 1;
                println!("{}", format_progress(done, total, &result));
            }
            RunEvent::Complete {
                summary,
                result_file,
                report_error,
                ..
            } => {
                println!("\n{}", format_summary(&summary));
                if let Some(file) = result_file {
                    println!("Results: {}", results_dir.join(file).display());
                }
                if let Some(error) = report_error {
                    eprintln!("warning: report was not written: {error}");
                }
            }
            RunEvent::Error { error } => anyhow::bail!("verification run failed: {error}"),
        }
    }

    Ok(())
}

/// Verify one store and print its result.
///
/// # Errors
///
/// Returns an error if a required field is blank or the run aborts.
pub(crate) async fn run_single_check(verifier: &Verifier, store: &StoreSpec) -> anyhow::Result<()> {
    let outcome = verifier.verify_one(store).await?;
    for result in &outcome.results {
        println!("{}", format_progress(1, 1, result));
        if let Some(path) = &result.screenshot_path {
            println!("Screenshot: {path}");
        }
    }
    match (&outcome.report_path, &outcome.report_error) {
        (Some(path), _) => println!("Results: {}", path.display()),
        (None, Some(error)) => eprintln!("warning: report was not written: {error}"),
        (None, None) => {}
    }
    Ok(())
}
