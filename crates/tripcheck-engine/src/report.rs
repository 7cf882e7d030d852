//! CSV run reports.

use std::path::Path;

use chrono::{DateTime, NaiveDate, Utc};
use serde::Deserialize;
use tripcheck_core::{StoreSpec, TestResult, TestStatus};

use crate::error::EngineError;

/// Column order of every report file.
pub const REPORT_HEADER: [&str; 11] = [
    "store_id",
    "store_name",
    "xfas_url",
    "merchant_site_url",
    "network_id",
    "test_url",
    "status",
    "actual_landing_url",
    "error_details",
    "screenshot_path",
    "tested_date",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReportKind {
    /// A list run: `results_<epoch-ms>.csv`.
    Batch,
    /// A one-store check: `single_result_<epoch-ms>.csv`.
    Single,
}

#[must_use]
pub fn report_file_name(kind: ReportKind, at: DateTime<Utc>) -> String {
    let prefix = match kind {
        ReportKind::Batch => "results",
        ReportKind::Single => "single_result",
    };
    format!("{prefix}_{}.csv", at.timestamp_millis())
}

/// Writes `results` to `path`, creating its directory if needed.
///
/// # Errors
///
/// Returns [`EngineError::Io`] if the directory cannot be created, or
/// [`EngineError::Csv`] if the file cannot be written.
pub fn write_report(path: &Path, results: &[TestResult]) -> Result<(), EngineError> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent).map_err(|e| EngineError::io(parent, e))?;
    }

    let mut writer = csv::Writer::from_path(path)?;
    writer.write_record(REPORT_HEADER)?;
    for result in results {
        let tested_date = result.tested_date.format("%Y-%m-%d").to_string();
        writer.write_record([
            result.store.store_id.as_str(),
            result.store.store_name.as_str(),
            result.store.xfas_url.as_str(),
            result.store.merchant_site_url.as_str(),
            result.store.network_id.as_str(),
            result.test_url.as_str(),
            result.status.as_str(),
            result.actual_landing_url.as_str(),
            result.error_details.as_str(),
            result.screenshot_path.as_deref().unwrap_or_default(),
            tested_date.as_str(),
        ])?;
    }
    writer.flush().map_err(|e| EngineError::io(path, e))?;

    tracing::info!(path = %path.display(), rows = results.len(), "report written");
    Ok(())
}

#[derive(Debug, Deserialize)]
struct ReportRow {
    store_id: String,
    store_name: String,
    xfas_url: String,
    merchant_site_url: String,
    network_id: String,
    test_url: String,
    status: TestStatus,
    actual_landing_url: String,
    error_details: String,
    screenshot_path: String,
    tested_date: NaiveDate,
}

impl From<ReportRow> for TestResult {
    fn from(row: ReportRow) -> Self {
        TestResult {
            store: StoreSpec {
                store_id: row.store_id,
                store_name: row.store_name,
                xfas_url: row.xfas_url,
                merchant_site_url: row.merchant_site_url,
                network_id: row.network_id,
            },
            test_url: row.test_url,
            status: row.status,
            actual_landing_url: row.actual_landing_url,
            error_details: row.error_details,
            screenshot_path: Some(row.screenshot_path).filter(|p| !p.is_empty()),
            tested_date: row.tested_date,
        }
    }
}

/// Reads a report previously produced by [`write_report`].
///
/// # Errors
///
/// Returns [`EngineError::Csv`] if the file is missing, unreadable, or has
/// rows that do not match the report columns.
pub fn read_report(path: &Path) -> Result<Vec<TestResult>, EngineError> {
    let mut reader = csv::Reader::from_path(path)?;
    reader
        .deserialize::<ReportRow>()
        .map(|row| row.map(TestResult::from).map_err(EngineError::from))
        .collect()
}
