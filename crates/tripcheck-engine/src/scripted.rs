//! In-memory driver that replays scripted URL sequences. Test-only.

use std::collections::VecDeque;
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::json;

use crate::driver::{ContextLauncher, LaunchMode, NavigationContext, NavigationHandle};
use crate::error::DriverError;
use crate::evidence::OVERLAY_ELEMENT_ID;
use crate::session::SessionSnapshot;
use crate::storage;

#[derive(Debug, Default)]
pub(crate) struct BrowserState {
    pub events: Vec<String>,
    pub launches: Vec<LaunchMode>,
    pub opened: usize,
    pub open_pages: usize,
    pub max_open_pages: usize,
    pub restored: Option<SessionSnapshot>,
    pub shutdowns: usize,
}

/// A fake browser. Pages opened from it look up their URL script by the
/// longest route prefix matching the URL they are sent to.
#[derive(Debug, Clone, Default)]
pub(crate) struct ScriptedBrowser {
    routes: Arc<Vec<(String, Vec<String>)>>,
    state: Arc<Mutex<BrowserState>>,
    goto_delay: Duration,
    fail_open_at: Option<usize>,
    fail_launch: bool,
    failing_screenshots: bool,
    failing_overlay: bool,
    local_storage: Option<serde_json::Value>,
}

impl ScriptedBrowser {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn route(mut self, prefix: &str, urls: &[&str]) -> Self {
        let mut routes = (*self.routes).clone();
        routes.push((prefix.to_string(), urls.iter().map(ToString::to_string).collect()));
        self.routes = Arc::new(routes);
        self
    }

    pub fn goto_delay(mut self, delay: Duration) -> Self {
        self.goto_delay = delay;
        self
    }

    /// Makes the `n`th (zero-based) `open_page` call fail.
    pub fn fail_open_at(mut self, n: usize) -> Self {
        self.fail_open_at = Some(n);
        self
    }

    pub fn failing_launch(mut self) -> Self {
        self.fail_launch = true;
        self
    }

    pub fn failing_screenshots(mut self) -> Self {
        self.failing_screenshots = true;
        self
    }

    /// What pages report when asked to export `localStorage`.
    pub fn local_storage(mut self, origin: &str, items: &[(&str, &str)]) -> Self {
        let items: Vec<_> = items
            .iter()
            .map(|(name, value)| json!({"name": name, "value": value}))
            .collect();
        self.local_storage = Some(json!({"origin": origin, "localStorage": items}));
        self
    }

    pub fn failing_overlay(mut self) -> Self {
        self.failing_overlay = true;
        self
    }

    pub fn state(&self) -> MutexGuard<'_, BrowserState> {
        self.state.lock().expect("browser state lock")
    }

    fn record(&self, event: impl Into<String>) {
        self.state().events.push(event.into());
    }

    fn script_for(&self, url: &str) -> Vec<String> {
        self.routes
            .iter()
            .filter(|(prefix, _)| url.starts_with(prefix.as_str()))
            .max_by_key(|(prefix, _)| prefix.len())
            .map(|(_, urls)| urls.clone())
            .unwrap_or_default()
    }

    pub fn page(&self) -> ScriptedPage {
        ScriptedPage {
            browser: self.clone(),
            urls: Mutex::new(VecDeque::new()),
            last_goto: Mutex::new(None),
            goto_error: Mutex::new(None),
            calls: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl ContextLauncher for ScriptedBrowser {
    async fn launch(&self, mode: LaunchMode) -> Result<Box<dyn NavigationContext>, DriverError> {
        if self.fail_launch {
            return Err(DriverError::Launch("scripted launch failure".to_string()));
        }
        self.state().launches.push(mode);
        self.record("launch");
        Ok(Box::new(ScriptedContext {
            browser: self.clone(),
        }))
    }
}

pub(crate) struct ScriptedContext {
    browser: ScriptedBrowser,
}

#[async_trait]
impl NavigationContext for ScriptedContext {
    async fn open_page(&self) -> Result<Box<dyn NavigationHandle>, DriverError> {
        {
            let mut state = self.browser.state();
            let index = state.opened;
            state.opened += 1;
            if self.browser.fail_open_at == Some(index) {
                state.events.push("open_failed".to_string());
                return Err(DriverError::Closed("scripted page open failure".to_string()));
            }
            state.open_pages += 1;
            state.max_open_pages = state.max_open_pages.max(state.open_pages);
            state.events.push("open".to_string());
        }
        Ok(Box::new(self.browser.page()))
    }

    async fn restore_session(&self, snapshot: &SessionSnapshot) -> Result<(), DriverError> {
        self.browser.state().restored = Some(snapshot.clone());
        self.browser.record("restore");
        Ok(())
    }

    async fn export_session(&self) -> Result<SessionSnapshot, DriverError> {
        self.browser.record("export");
        Ok(SessionSnapshot::new(
            json!({"cookies": [{"name": "session", "value": "scripted"}]}),
        ))
    }

    async fn shutdown(&mut self) -> Result<(), DriverError> {
        self.browser.state().shutdowns += 1;
        self.browser.record("shutdown");
        Ok(())
    }
}

pub(crate) struct ScriptedPage {
    browser: ScriptedBrowser,
    urls: Mutex<VecDeque<String>>,
    last_goto: Mutex<Option<String>>,
    goto_error: Mutex<Option<DriverError>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedPage {
    /// A page outside any context that reports `urls` in order, repeating
    /// the last one once the script runs out.
    pub fn with_urls(urls: &[&str]) -> Self {
        let page = ScriptedBrowser::new().page();
        *page.urls.lock().expect("urls lock") = urls.iter().map(ToString::to_string).collect();
        page
    }

    pub fn on(browser: &ScriptedBrowser, urls: &[&str]) -> Self {
        let page = browser.page();
        *page.urls.lock().expect("urls lock") = urls.iter().map(ToString::to_string).collect();
        page
    }

    pub fn goto_error(self, error: DriverError) -> Self {
        *self.goto_error.lock().expect("goto error lock") = Some(error);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().expect("calls lock").clone()
    }

    pub fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }

    fn record(&self, call: impl Into<String>) {
        self.calls.lock().expect("calls lock").push(call.into());
    }
}

#[async_trait]
impl NavigationHandle for ScriptedPage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), DriverError> {
        self.record("goto");
        *self.last_goto.lock().expect("last goto lock") = Some(url.to_string());
        {
            let mut urls = self.urls.lock().expect("urls lock");
            if urls.is_empty() {
                *urls = self.browser.script_for(url).into();
            }
        }
        if !self.browser.goto_delay.is_zero() {
            tokio::time::sleep(self.browser.goto_delay).await;
        }
        match self.goto_error.lock().expect("goto error lock").take() {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    async fn current_url(&self) -> Result<String, DriverError> {
        self.record("current_url");
        let mut urls = self.urls.lock().expect("urls lock");
        let url = if urls.len() > 1 {
            urls.pop_front()
        } else {
            urls.front().cloned()
        };
        Ok(url
            .or_else(|| self.last_goto.lock().expect("last goto lock").clone())
            .unwrap_or_else(|| "about:blank".to_string()))
    }

    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        if script.contains(OVERLAY_ELEMENT_ID) {
            self.record("evaluate:overlay");
            if self.browser.failing_overlay {
                return Err(DriverError::Script("scripted overlay failure".to_string()));
            }
        } else if script == storage::EXPORT_SCRIPT {
            self.record("evaluate:storage_export");
            return Ok(self
                .browser
                .local_storage
                .clone()
                .unwrap_or(serde_json::Value::Null));
        } else if script.contains("localStorage.setItem") {
            self.record("evaluate:storage_restore");
            let origin = self.last_goto.lock().expect("last goto lock").clone();
            self.browser
                .record(format!("storage_restore:{}", origin.unwrap_or_default()));
        } else {
            self.record("evaluate:script");
        }
        Ok(serde_json::Value::Bool(true))
    }

    async fn click(&self, selector: &str) -> Result<(), DriverError> {
        self.record(format!("click:{selector}"));
        Ok(())
    }

    async fn screenshot(&self, path: &Path) -> Result<(), DriverError> {
        self.record("screenshot");
        if self.browser.failing_screenshots {
            return Err(DriverError::Screenshot {
                path: path.to_path_buf(),
                reason: "scripted screenshot failure".to_string(),
            });
        }
        Ok(())
    }

    async fn close(&self) -> Result<(), DriverError> {
        self.record("close");
        let mut state = self.browser.state();
        state.open_pages = state.open_pages.saturating_sub(1);
        state.events.push("close".to_string());
        Ok(())
    }
}
