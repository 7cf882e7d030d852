//! Store records read from the input list and the per-store verification
//! result produced for each of them.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::CoreError;

/// One merchant store whose tracking link is under test.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSpec {
    pub store_id: String,
    pub store_name: String,
    /// Affiliate tracking link that should forward to the merchant.
    pub xfas_url: String,
    /// Site the tracking link is expected to land on.
    pub merchant_site_url: String,
    pub network_id: String,
}

impl StoreSpec {
    /// Placeholder stored when the input omits a network id.
    pub const DEFAULT_NETWORK_ID: &'static str = "N/A";

    /// Checks that every field required to run a verification is present.
    ///
    /// `network_id` is informational and may be blank.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::MissingField`] naming the first blank required field.
    pub fn validate(&self) -> Result<(), CoreError> {
        let required = [
            ("store_id", &self.store_id),
            ("store_name", &self.store_name),
            ("xfas_url", &self.xfas_url),
            ("merchant_site_url", &self.merchant_site_url),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(CoreError::MissingField(field));
            }
        }
        Ok(())
    }
}

/// Classification of one tracking-link verification.
///
/// `Unknown` is only ever the starting state of a result; every result
/// handed out by the engine carries one of the terminal variants.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TestStatus {
    Unknown,
    Pass,
    Fail,
    Pending,
    ManualReview,
    Error,
}

impl TestStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            TestStatus::Unknown => "UNKNOWN",
            TestStatus::Pass => "PASS",
            TestStatus::Fail => "FAIL",
            TestStatus::Pending => "PENDING",
            TestStatus::ManualReview => "MANUAL_REVIEW",
            TestStatus::Error => "ERROR",
        }
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, TestStatus::Unknown)
    }
}

impl fmt::Display for TestStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TestStatus {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "UNKNOWN" => Ok(TestStatus::Unknown),
            "PASS" => Ok(TestStatus::Pass),
            "FAIL" => Ok(TestStatus::Fail),
            "PENDING" => Ok(TestStatus::Pending),
            "MANUAL_REVIEW" => Ok(TestStatus::ManualReview),
            "ERROR" => Ok(TestStatus::Error),
            other => Err(CoreError::UnknownStatus(other.to_string())),
        }
    }
}

/// Outcome of verifying a single [`StoreSpec`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TestResult {
    #[serde(flatten)]
    pub store: StoreSpec,
    /// Tracking URL with the shopping-trip query parameters appended.
    pub test_url: String,
    pub status: TestStatus,
    pub actual_landing_url: String,
    pub error_details: String,
    pub screenshot_path: Option<String>,
    pub tested_date: NaiveDate,
}

impl TestResult {
    /// Creates an unresolved result for `store`.
    #[must_use]
    pub fn begin(store: StoreSpec, test_url: String, tested_date: NaiveDate) -> Self {
        Self {
            store,
            test_url,
            status: TestStatus::Unknown,
            actual_landing_url: String::new(),
            error_details: String::new(),
            screenshot_path: None,
            tested_date,
        }
    }

    /// Records the terminal classification. A result is concluded once.
    pub fn conclude(
        &mut self,
        status: TestStatus,
        actual_landing_url: impl Into<String>,
        error_details: impl Into<String>,
    ) {
        debug_assert!(status.is_terminal(), "cannot conclude with {status}");
        debug_assert!(
            !self.status.is_terminal(),
            "result for store {} already concluded as {}",
            self.store.store_id,
            self.status
        );
        self.status = status;
        self.actual_landing_url = actual_landing_url.into();
        self.error_details = error_details.into();
    }
}

/// Aggregate counts over the results of one run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RunSummary {
    pub total: usize,
    pub passed: usize,
    pub failed: usize,
    pub pending: usize,
    pub manual_review: usize,
    pub errors: usize,
    /// Results that carry a screenshot.
    pub screenshots: usize,
}

impl RunSummary {
    #[must_use]
    pub fn from_results(results: &[TestResult]) -> Self {
        let mut summary = Self {
            total: results.len(),
            ..Self::default()
        };
        for result in results {
            match result.status {
                TestStatus::Pass => summary.passed += 1,
                TestStatus::Fail => summary.failed += 1,
                TestStatus::Pending => summary.pending += 1,
                TestStatus::ManualReview => summary.manual_review += 1,
                TestStatus::Error => summary.errors += 1,
                TestStatus::Unknown => {}
            }
            if result.screenshot_path.as_deref().is_some_and(|p| !p.is_empty()) {
                summary.screenshots += 1;
            }
        }
        summary
    }
}

#[cfg(test)]
#[path = "stores_test.rs"]
mod tests;
