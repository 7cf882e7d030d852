//! Run orchestration: one browser context per run, scheduled classification,
//! a CSV report at the end, and an optional event stream for live progress.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tripcheck_core::{AppConfig, CoreError, RunSummary, StoreSpec, TestResult};

use crate::classifier::{Classifier, ClassifierSettings, PollPolicy};
use crate::driver::{ContextLauncher, LaunchMode, NavigationContext};
use crate::error::EngineError;
use crate::normalize::normalize_domain;
use crate::report::{report_file_name, write_report, ReportKind};
use crate::scheduler::BatchScheduler;
use crate::session::{SessionSnapshot, SessionStore};
use crate::storage::{self, OriginStorage};

const EVENT_BUFFER: usize = 64;

#[derive(Debug, Clone)]
pub struct EngineSettings {
    pub classifier: ClassifierSettings,
    pub batch_size: usize,
    pub results_dir: PathBuf,
    pub login_url: String,
    /// How long the interactive login window stays open before the session
    /// is exported.
    pub login_wait: Duration,
}

impl EngineSettings {
    #[must_use]
    pub fn from_app_config(config: &AppConfig) -> Self {
        Self {
            classifier: ClassifierSettings {
                policy: PollPolicy {
                    attempts: config.poll_attempts,
                    interval: Duration::from_millis(config.poll_interval_ms),
                    fail_after_attempt: config.fail_after_attempt,
                    navigation_timeout: Duration::from_secs(config.navigation_timeout_secs),
                    settle_min: Duration::from_millis(config.settle_min_ms),
                    settle_max: Duration::from_millis(config.settle_max_ms),
                },
                tracking_domain: normalize_domain(&config.tracking_domain),
                source_name: config.source_name.clone(),
                ebstask: config.ebstask.clone(),
                screenshot_dir: config.screenshot_dir.clone(),
            },
            batch_size: config.batch_size,
            results_dir: config.results_dir.clone(),
            login_url: config.login_url.clone(),
            login_wait: Duration::from_secs(config.login_wait_secs),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone, Serialize)]
pub struct RunOutcome {
    /// In input order.
    pub results: Vec<TestResult>,
    pub summary: RunSummary,
    pub report_path: Option<PathBuf>,
    /// Set when the report could not be written; results are still valid.
    pub report_error: Option<String>,
    pub timestamp: DateTime<Utc>,
}

impl RunOutcome {
    /// File name of the written report, if any.
    #[must_use]
    pub fn report_file(&self) -> Option<String> {
        self.report_path
            .as_ref()
            .and_then(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
    }
}

/// Progress of a streamed run. Exactly one `Start` is followed by one
/// `Result` per store and then either `Complete` or `Error`.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum RunEvent {
    Start {
        total: usize,
    },
    Result {
        result: TestResult,
    },
    Complete {
        summary: RunSummary,
        result_file: Option<String>,
        report_error: Option<String>,
        timestamp: DateTime<Utc>,
    },
    Error {
        error: String,
    },
}

pub struct Verifier {
    launcher: Arc<dyn ContextLauncher>,
    sessions: SessionStore,
    scheduler: BatchScheduler,
    settings: EngineSettings,
}

impl Verifier {
    #[must_use]
    pub fn new(
        launcher: Arc<dyn ContextLauncher>,
        sessions: SessionStore,
        settings: EngineSettings,
    ) -> Self {
        let scheduler = BatchScheduler::new(
            Classifier::new(settings.classifier.clone()),
            settings.batch_size,
        );
        Self {
            launcher,
            sessions,
            scheduler,
            settings,
        }
    }

    #[must_use]
    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    #[must_use]
    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    /// Verifies every store and writes a `results_<epoch-ms>.csv` report.
    ///
    /// # Errors
    ///
    /// Fails before any store is scheduled if the saved session cannot be
    /// read or restored, or the browser cannot be launched. Per-store
    /// failures are reported as `ERROR` results instead.
    pub async fn verify_all(
        &self,
        stores: &[StoreSpec],
        sink: Option<&mpsc::Sender<TestResult>>,
    ) -> Result<RunOutcome, EngineError> {
        self.execute(stores, ReportKind::Batch, sink).await
    }

    /// Verifies one store and writes a `single_result_<epoch-ms>.csv` report.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::InvalidStore`] if a required field is blank,
    /// otherwise fails as [`Verifier::verify_all`] does.
    pub async fn verify_one(&self, store: &StoreSpec) -> Result<RunOutcome, EngineError> {
        if let Err(CoreError::MissingField(field)) = store.validate() {
            return Err(EngineError::InvalidStore { row: 1, field });
        }
        self.execute(std::slice::from_ref(store), ReportKind::Single, None)
            .await
    }

    /// Runs `stores` in the background and returns the event stream.
    ///
    /// The run does not stop if the receiver is dropped.
    pub fn stream(self: Arc<Self>, stores: Vec<StoreSpec>) -> mpsc::Receiver<RunEvent> {
        let (events_tx, events_rx) = mpsc::channel(EVENT_BUFFER);

        tokio::spawn(async move {
            emit(&events_tx, RunEvent::Start { total: stores.len() }).await;

            let (result_tx, mut result_rx) = mpsc::channel(EVENT_BUFFER);
            let run = async {
                let outcome = self.verify_all(&stores, Some(&result_tx)).await;
                drop(result_tx);
                outcome
            };
            let forward = async {
                while let Some(result) = result_rx.recv().await {
                    emit(&events_tx, RunEvent::Result { result }).await;
                }
            };
            let (outcome, ()) = tokio::join!(run, forward);

            let last = match outcome {
                Ok(outcome) => RunEvent::Complete {
                    result_file: outcome.report_file(),
                    summary: outcome.summary,
                    report_error: outcome.report_error,
                    timestamp: outcome.timestamp,
                },
                Err(e) => {
                    tracing::error!(error = %e, "streamed run failed");
                    RunEvent::Error {
                        error: e.to_string(),
                    }
                }
            };
            emit(&events_tx, last).await;
        });

        events_rx
    }

    /// Opens a visible browser at the login page, waits for someone to sign
    /// in, then saves the resulting session.
    ///
    /// # Errors
    ///
    /// Returns an error if the browser cannot be launched, the session cannot
    /// be exported, or the snapshot cannot be saved.
    pub async fn capture_session(&self) -> Result<SessionSnapshot, EngineError> {
        let mut context = self.launcher.launch(LaunchMode::Interactive).await?;
        let exported = self.login_and_export(context.as_ref()).await;
        if let Err(e) = context.shutdown().await {
            tracing::warn!(error = %e, "browser shutdown failed after login capture");
        }

        let snapshot = exported?;
        self.sessions.save(&snapshot).await?;
        Ok(snapshot)
    }

    pub async fn session_status(&self) -> bool {
        self.sessions.exists().await
    }

    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if an existing session cannot be removed.
    pub async fn delete_session(&self) -> Result<bool, EngineError> {
        self.sessions.delete().await
    }

    async fn login_and_export(
        &self,
        context: &dyn NavigationContext,
    ) -> Result<SessionSnapshot, EngineError> {
        let page = context.open_page().await?;
        let timeout = self.settings.classifier.policy.navigation_timeout;
        match page.goto(&self.settings.login_url, timeout).await {
            Ok(()) => {}
            Err(e) if e.is_timeout() => {
                tracing::debug!(error = %e, "login page load timed out");
            }
            Err(e) => return Err(e.into()),
        }

        tracing::info!(
            url = %self.settings.login_url,
            wait_secs = self.settings.login_wait.as_secs(),
            "waiting for manual login"
        );
        tokio::time::sleep(self.settings.login_wait).await;

        let mut snapshot = context.export_session().await?;
        match page.evaluate(storage::EXPORT_SCRIPT).await {
            Ok(value) => {
                if let Some(origin) = OriginStorage::from_export(value) {
                    tracing::debug!(
                        origin = %origin.origin,
                        entries = origin.local_storage.len(),
                        "local storage captured"
                    );
                    snapshot = snapshot.with_origin(origin);
                }
            }
            Err(e) => tracing::warn!(error = %e, "local storage export failed"),
        }
        if let Err(e) = page.close().await {
            tracing::debug!(error = %e, "login page close failed");
        }
        Ok(snapshot)
    }

    /// Writes saved `localStorage` back into each origin. Best effort: a
    /// failure leaves that origin without its storage and the run continues.
    async fn restore_origins(&self, context: &dyn NavigationContext, snapshot: &SessionSnapshot) {
        let timeout = self.settings.classifier.policy.navigation_timeout;
        for origin in snapshot.origins() {
            let page = match context.open_page().await {
                Ok(page) => page,
                Err(e) => {
                    tracing::warn!(origin = %origin.origin, error = %e, "local storage restore skipped");
                    continue;
                }
            };
            let restored = match page.goto(&origin.origin, timeout).await {
                Err(e) if !e.is_timeout() => Err(e),
                _ => page.evaluate(&origin.restore_script()).await.map(|_| ()),
            };
            match restored {
                Ok(()) => tracing::debug!(
                    origin = %origin.origin,
                    entries = origin.local_storage.len(),
                    "local storage restored"
                ),
                Err(e) => {
                    tracing::warn!(origin = %origin.origin, error = %e, "local storage restore failed");
                }
            }
            if let Err(e) = page.close().await {
                tracing::debug!(error = %e, "storage page close failed");
            }
        }
    }

    async fn execute(
        &self,
        stores: &[StoreSpec],
        kind: ReportKind,
        sink: Option<&mpsc::Sender<TestResult>>,
    ) -> Result<RunOutcome, EngineError> {
        let snapshot = self.sessions.load().await?;
        let mut context = self.launcher.launch(LaunchMode::Headless).await?;

        match &snapshot {
            Some(snapshot) => {
                if let Err(e) = context.restore_session(snapshot).await {
                    if let Err(close_err) = context.shutdown().await {
                        tracing::debug!(error = %close_err, "browser shutdown failed");
                    }
                    return Err(e.into());
                }
                self.restore_origins(context.as_ref(), snapshot).await;
            }
            None => tracing::warn!(
                path = %self.sessions.path().display(),
                "no saved session, running unauthenticated"
            ),
        }

        tracing::info!(
            stores = stores.len(),
            batch_size = self.scheduler.batch_size(),
            "verification run started"
        );
        let results = self.scheduler.run(context.as_ref(), stores, sink).await;

        if let Err(e) = context.shutdown().await {
            tracing::warn!(error = %e, "browser shutdown failed");
        }

        let timestamp = Utc::now();
        let summary = RunSummary::from_results(&results);
        let path = self
            .settings
            .results_dir
            .join(report_file_name(kind, timestamp));
        let (report_path, report_error) = match write_report(&path, &results) {
            Ok(()) => (Some(path), None),
            Err(e) => {
                tracing::error!(path = %path.display(), error = %e, "report write failed");
                (None, Some(e.to_string()))
            }
        };

        tracing::info!(
            total = summary.total,
            passed = summary.passed,
            failed = summary.failed,
            pending = summary.pending,
            manual_review = summary.manual_review,
            errors = summary.errors,
            "verification run complete"
        );

        Ok(RunOutcome {
            results,
            summary,
            report_path,
            report_error,
            timestamp,
        })
    }
}

async fn emit(tx: &mpsc::Sender<RunEvent>, event: RunEvent) {
    if tx.send(event).await.is_err() {
        tracing::debug!("event receiver dropped");
    }
}

#[cfg(test)]
#[path = "verifier_test.rs"]
mod tests;
