//! Capability traits over the browser automation driver.
//!
//! The engine only ever talks to a browser through these traits. The Chrome
//! implementation lives in [`crate::chrome`]; tests drive the classifier and
//! scheduler with scripted in-memory implementations.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;

use crate::error::DriverError;
use crate::session::SessionSnapshot;

/// How a navigation context is launched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LaunchMode {
    /// No visible window; used for verification runs.
    Headless,
    /// Visible window a person can interact with; used for login capture.
    Interactive,
}

/// Starts browser processes and hands out navigation contexts.
#[async_trait]
pub trait ContextLauncher: Send + Sync {
    async fn launch(&self, mode: LaunchMode) -> Result<Box<dyn NavigationContext>, DriverError>;
}

/// One browser-level session. Every page opened from a context shares its
/// cookie and storage state.
#[async_trait]
pub trait NavigationContext: Send + Sync {
    /// Opens a fresh, independent page.
    async fn open_page(&self) -> Result<Box<dyn NavigationHandle>, DriverError>;

    /// Loads previously exported authentication state into this context.
    async fn restore_session(&self, snapshot: &SessionSnapshot) -> Result<(), DriverError>;

    /// Exports this context's authentication state.
    async fn export_session(&self) -> Result<SessionSnapshot, DriverError>;

    /// Closes the context and the browser process behind it. No page opened
    /// from the context may be in use when this is called.
    async fn shutdown(&mut self) -> Result<(), DriverError>;
}

/// A single open page.
#[async_trait]
pub trait NavigationHandle: Send + Sync {
    /// Navigates to `url`, giving up on the load after `timeout` with
    /// [`DriverError::Timeout`]. The page keeps navigating after a timeout.
    async fn goto(&self, url: &str, timeout: Duration) -> Result<(), DriverError>;

    async fn current_url(&self) -> Result<String, DriverError>;

    /// Runs a one-shot script in the page and returns its JSON result.
    async fn evaluate(&self, script: &str) -> Result<serde_json::Value, DriverError>;

    async fn click(&self, selector: &str) -> Result<(), DriverError>;

    /// Writes a full-page PNG screenshot to `path`.
    async fn screenshot(&self, path: &Path) -> Result<(), DriverError>;

    async fn close(&self) -> Result<(), DriverError>;
}
