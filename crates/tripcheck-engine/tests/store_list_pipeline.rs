//! End-to-end tests over the public engine API: a store list is parsed,
//! classified against an in-test navigation stub, and written to a report
//! that reads back identically.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use tripcheck_core::{RunSummary, TestStatus};
use tripcheck_engine::{
    parse_store_csv, read_report, write_report, Classifier, ClassifierSettings, DriverError,
    NavigationHandle, PollPolicy,
};

const STORE_LIST: &str = "\
store_id,store_name,xfas_url,merchant_site_url,network_id
11, Acme Outlet ,https://www.rakuten.com/xfas/acme,https://www.acme.com,4

12,Globex,https://www.rakuten.com/xfas/globex,https://globex.example,
13,\"Initech, LLC\",https://www.rakuten.com/xfas/initech,https://initech.example,9
";

/// Lands wherever the route table says, keyed by a substring of the URL it
/// was sent to; stays on the tracking site otherwise.
struct RoutedPage {
    routes: Vec<(&'static str, &'static str)>,
    current: Mutex<String>,
}

impl RoutedPage {
    fn new(routes: Vec<(&'static str, &'static str)>) -> Self {
        Self {
            routes,
            current: Mutex::new("about:blank".to_string()),
        }
    }
}

#[async_trait]
impl NavigationHandle for RoutedPage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), DriverError> {
        let landing = self
            .routes
            .iter()
            .find(|(needle, _)| url.contains(needle))
            .map_or("https://www.rakuten.com/shopping", |(_, landing)| landing);
        *self.current.lock().expect("lock") = landing.to_string();
        Ok(())
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        Ok(self.current.lock().expect("lock").clone())
    }

    async fn evaluate(&self, _script: &str) -> Result<serde_json::Value, DriverError> {
        Ok(serde_json::Value::Null)
    }

    async fn click(&self, _selector: &str) -> Result<(), DriverError> {
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<(), DriverError> {
        std::fs::write(path, b"png").map_err(|e| DriverError::Screenshot {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    async fn close(&self) -> Result<(), DriverError> {
        Ok(())
    }
}

fn fast_classifier(screenshot_dir: &Path) -> Classifier {
    Classifier::new(ClassifierSettings {
        policy: PollPolicy {
            attempts: 4,
            interval: Duration::ZERO,
            fail_after_attempt: 3,
            navigation_timeout: Duration::from_secs(1),
            settle_min: Duration::ZERO,
            settle_max: Duration::ZERO,
        },
        screenshot_dir: screenshot_dir.to_path_buf(),
        ..ClassifierSettings::default()
    })
}

#[tokio::test]
async fn parsed_stores_classify_and_round_trip_through_report() {
    let dir = tempfile::tempdir().expect("tempdir");
    let stores = parse_store_csv(STORE_LIST).expect("parse store list");
    assert_eq!(stores.len(), 3);
    assert_eq!(stores[0].store_name, "Acme Outlet");
    assert_eq!(stores[1].network_id, "N/A");
    assert_eq!(stores[2].store_name, "Initech, LLC");

    let classifier = fast_classifier(&dir.path().join("shots"));
    let mut results = Vec::new();
    for store in &stores {
        let page = RoutedPage::new(vec![
            ("xfas/acme", "https://www.acme.com/welcome"),
            ("xfas/initech", "https://www.unrelated.example/"),
        ]);
        results.push(classifier.classify(&page, store).await);
    }

    let statuses: Vec<TestStatus> = results.iter().map(|r| r.status).collect();
    assert_eq!(
        statuses,
        [TestStatus::Pass, TestStatus::Pending, TestStatus::Fail]
    );
    assert_eq!(results[2].error_details, "Wrong domain: unrelated.example");

    let shot = results[0].screenshot_path.as_deref().expect("screenshot");
    assert!(Path::new(shot).exists(), "screenshot {shot} not on disk");
    assert!(shot.ends_with("PASS_11_Acme_Outlet.png"), "got {shot}");

    let report = dir.path().join("results").join("run.csv");
    write_report(&report, &results).expect("write report");
    let read_back = read_report(&report).expect("read report");
    assert_eq!(read_back, results);

    let summary = RunSummary::from_results(&read_back);
    assert_eq!(summary.total, 3);
    assert_eq!(summary.passed, 1);
    assert_eq!(summary.pending, 1);
    assert_eq!(summary.failed, 1);
    assert_eq!(summary.screenshots, 3);
}
