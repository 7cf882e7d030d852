//! Per-store redirect classification.
//!
//! A classification navigates one page to the store's tracking link and then
//! samples where the browser is at fixed intervals until it either lands on
//! the merchant, strays onto some third site, or the poll budget runs out.

use std::path::PathBuf;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use tripcheck_core::{StoreSpec, TestResult, TestStatus};

use crate::driver::NavigationHandle;
use crate::error::DriverError;
use crate::evidence::{self, EvidenceTag};
use crate::normalize::{is_error_placeholder, is_same_site, normalize_host};

/// Script run against a blocked placeholder page to nudge a stalled redirect.
const UNBLOCK_SCRIPT: &str = r"(() => {
  const targets = document.querySelectorAll('button, a, [onclick]');
  if (targets.length > 0) { targets[0].click(); }
  return targets.length;
})()";

/// Timing knobs of the poll loop.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollPolicy {
    pub attempts: u32,
    pub interval: Duration,
    /// First zero-based attempt at which a third-party host counts as a
    /// wrong redirect rather than an intermediate hop.
    pub fail_after_attempt: u32,
    pub navigation_timeout: Duration,
    pub settle_min: Duration,
    pub settle_max: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            attempts: 15,
            interval: Duration::from_millis(3000),
            fail_after_attempt: 3,
            navigation_timeout: Duration::from_secs(20),
            settle_min: Duration::from_millis(500),
            settle_max: Duration::from_millis(1500),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ClassifierSettings {
    pub policy: PollPolicy,
    /// Normalized host of the affiliate tracking site.
    pub tracking_domain: String,
    pub source_name: String,
    pub ebstask: String,
    pub screenshot_dir: PathBuf,
}

impl Default for ClassifierSettings {
    fn default() -> Self {
        Self {
            policy: PollPolicy::default(),
            tracking_domain: "rakuten.com".to_string(),
            source_name: "Web-Desktop".to_string(),
            ebstask: "shoppingTripAttrProps".to_string(),
            screenshot_dir: PathBuf::from("./screenshots"),
        }
    }
}

/// What a single poll of the live navigation concluded.
enum Observation {
    Landed,
    Blocked,
    InTransit,
    Elsewhere,
}

#[derive(Debug, Clone)]
pub struct Classifier {
    settings: ClassifierSettings,
}

impl Classifier {
    #[must_use]
    pub fn new(settings: ClassifierSettings) -> Self {
        Self { settings }
    }

    #[must_use]
    pub fn settings(&self) -> &ClassifierSettings {
        &self.settings
    }

    /// Tracking link with the shopping-trip attribution parameters appended.
    #[must_use]
    pub fn build_test_url(&self, xfas_url: &str) -> String {
        let separator = if xfas_url.contains('?') { '&' } else { '?' };
        format!(
            "{xfas_url}{separator}sourceName={}&ebstask={}",
            self.settings.source_name, self.settings.ebstask
        )
    }

    /// A concluded [`TestStatus::Error`] result for a store that never reached
    /// classification.
    #[must_use]
    pub fn error_result(&self, store: &StoreSpec, details: impl Into<String>) -> TestResult {
        let test_url = self.build_test_url(&store.xfas_url);
        let mut result = TestResult::begin(store.clone(), test_url, Utc::now().date_naive());
        result.conclude(TestStatus::Error, String::new(), details);
        result
    }

    /// Drives `nav` through the store's tracking link and classifies where it
    /// ends up. Always returns a terminal status; driver failures become
    /// [`TestStatus::Error`].
    pub async fn classify(&self, nav: &dyn NavigationHandle, store: &StoreSpec) -> TestResult {
        let test_url = self.build_test_url(&store.xfas_url);
        let mut result = TestResult::begin(store.clone(), test_url, Utc::now().date_naive());

        if let Err(e) = self.run_poll_loop(nav, &mut result).await {
            let landing = nav.current_url().await.unwrap_or_default();
            tracing::warn!(
                store_id = %store.store_id,
                error = %e,
                "classification failed"
            );
            result.conclude(TestStatus::Error, landing.clone(), e.to_string());
            result.screenshot_path = self.evidence(nav, EvidenceTag::Error, store, &landing).await;
        }

        tracing::info!(
            store_id = %store.store_id,
            store_name = %store.store_name,
            status = %result.status,
            landing = %result.actual_landing_url,
            "store classified"
        );
        result
    }

    async fn run_poll_loop(
        &self,
        nav: &dyn NavigationHandle,
        result: &mut TestResult,
    ) -> Result<(), DriverError> {
        let policy = &self.settings.policy;
        let store = result.store.clone();

        match nav.goto(&result.test_url, policy.navigation_timeout).await {
            Ok(()) => {}
            Err(e) if e.is_timeout() => {
                tracing::debug!(store_id = %store.store_id, error = %e, "load timed out, polling anyway");
            }
            Err(e) => return Err(e),
        }

        tokio::time::sleep(self.settle_delay()).await;

        let expected = normalize_host(&store.merchant_site_url);

        for attempt in 0..policy.attempts {
            tokio::time::sleep(policy.interval).await;
            let current_url = nav.current_url().await?;
            let current_host = normalize_host(&current_url);

            tracing::debug!(
                store_id = %store.store_id,
                attempt = attempt + 1,
                host = %current_host,
                "poll"
            );

            match self.observe(&current_url, &current_host, &expected) {
                Observation::Landed => {
                    result.conclude(TestStatus::Pass, current_url.clone(), "Successfully redirected");
                    result.screenshot_path =
                        self.evidence(nav, EvidenceTag::Pass, &store, &current_url).await;
                    return Ok(());
                }
                Observation::Blocked => {
                    self.try_unblock(nav, &store).await;
                }
                Observation::InTransit => {}
                Observation::Elsewhere if attempt >= policy.fail_after_attempt => {
                    result.conclude(
                        TestStatus::Fail,
                        current_url.clone(),
                        format!("Wrong domain: {current_host}"),
                    );
                    result.screenshot_path =
                        self.evidence(nav, EvidenceTag::Fail, &store, &current_url).await;
                    return Ok(());
                }
                Observation::Elsewhere => {}
            }
        }

        let final_url = nav.current_url().await?;
        let final_host = normalize_host(&final_url);
        let (status, tag, details) = if final_host == self.settings.tracking_domain {
            (
                TestStatus::Pending,
                EvidenceTag::Pending,
                "Stuck on tracking page".to_string(),
            )
        } else if is_error_placeholder(&final_host) {
            (
                TestStatus::ManualReview,
                EvidenceTag::Manual,
                "Automation appears blocked; manual verification required".to_string(),
            )
        } else {
            (
                TestStatus::Fail,
                EvidenceTag::Fail,
                format!("Timeout - still on: {final_host}"),
            )
        };

        result.conclude(status, final_url.clone(), details);
        result.screenshot_path = self.evidence(nav, tag, &store, &final_url).await;
        Ok(())
    }

    fn observe(&self, current_url: &str, current_host: &str, expected: &str) -> Observation {
        if is_same_site(current_url, current_host, expected) {
            Observation::Landed
        } else if is_error_placeholder(current_host) {
            Observation::Blocked
        } else if current_host == self.settings.tracking_domain {
            Observation::InTransit
        } else {
            Observation::Elsewhere
        }
    }

    /// Best-effort nudges for a redirect stalled on the browser error page.
    async fn try_unblock(&self, nav: &dyn NavigationHandle, store: &StoreSpec) {
        tracing::debug!(store_id = %store.store_id, "navigation blocked, attempting to unblock");
        if let Err(e) = nav.click("body").await {
            tracing::debug!(store_id = %store.store_id, error = %e, "unblock click failed");
        }
        if let Err(e) = nav.evaluate(UNBLOCK_SCRIPT).await {
            tracing::debug!(store_id = %store.store_id, error = %e, "unblock script failed");
        }
    }

    async fn evidence(
        &self,
        nav: &dyn NavigationHandle,
        tag: EvidenceTag,
        store: &StoreSpec,
        url: &str,
    ) -> Option<String> {
        evidence::capture(nav, tag, store, url, &self.settings.screenshot_dir)
            .await
            .map(|path| path.display().to_string())
    }

    fn settle_delay(&self) -> Duration {
        let policy = &self.settings.policy;
        let min = u64::try_from(policy.settle_min.as_millis()).unwrap_or(u64::MAX);
        let max = u64::try_from(policy.settle_max.as_millis()).unwrap_or(u64::MAX);
        if max <= min {
            return Duration::from_millis(min);
        }
        Duration::from_millis(rand::rng().random_range(min..=max))
    }
}

#[cfg(test)]
#[path = "classifier_test.rs"]
mod tests;
