//! Admission control for requests that drive the browser.

use std::sync::Arc;

use tokio::sync::{OwnedSemaphorePermit, Semaphore};

/// Lets one browser-driving operation (a run or a login capture) proceed at
/// a time. The operation holds the permit until it ends; anyone arriving
/// meanwhile is turned away rather than queued.
#[derive(Debug, Clone)]
pub struct BrowserGate {
    permits: Arc<Semaphore>,
}

impl Default for BrowserGate {
    fn default() -> Self {
        Self {
            permits: Arc::new(Semaphore::new(1)),
        }
    }
}

impl BrowserGate {
    #[must_use]
    pub fn try_enter(&self) -> Option<OwnedSemaphorePermit> {
        Arc::clone(&self.permits).try_acquire_owned().ok()
    }

    #[must_use]
    pub fn is_busy(&self) -> bool {
        self.permits.available_permits() == 0
    }
}
