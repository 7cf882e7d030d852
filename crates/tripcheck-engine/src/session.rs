//! Persisted browser authentication state.
//!
//! There is exactly one snapshot, at one well-known path. The store has no
//! locking: capture is a rare, explicit action that never overlaps a run.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// Opaque authenticated-browser state as exported by the driver.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionSnapshot(serde_json::Value);

impl SessionSnapshot {
    #[must_use]
    pub fn new(state: serde_json::Value) -> Self {
        Self(state)
    }

    #[must_use]
    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }
}

/// Handle to the session snapshot file, passed to whoever needs it.
#[derive(Debug, Clone)]
pub struct SessionStore {
    path: PathBuf,
}

impl SessionStore {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn exists(&self) -> bool {
        tokio::fs::try_exists(&self.path).await.unwrap_or(false)
    }

    /// Reads the snapshot, or `None` when no session has been captured.
    ///
    /// # Errors
    ///
    /// - [`EngineError::Io`] if the file exists but cannot be read.
    /// - [`EngineError::SessionFormat`] if the file is not valid JSON.
    pub async fn load(&self) -> Result<Option<SessionSnapshot>, EngineError> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(EngineError::io(&self.path, e)),
        };

        let snapshot =
            serde_json::from_slice(&bytes).map_err(|source| EngineError::SessionFormat {
                path: self.path.clone(),
                source,
            })?;
        Ok(Some(snapshot))
    }

    /// Replaces the stored snapshot. Writes to a sibling temp file first so a
    /// reader never sees a half-written session.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if the file or its directory cannot be written.
    pub async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), EngineError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| EngineError::io(parent, e))?;
        }

        let body = serde_json::to_vec_pretty(snapshot).map_err(|source| {
            EngineError::SessionFormat {
                path: self.path.clone(),
                source,
            }
        })?;

        let tmp = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp, body)
            .await
            .map_err(|e| EngineError::io(&tmp, e))?;
        tokio::fs::rename(&tmp, &self.path)
            .await
            .map_err(|e| EngineError::io(&self.path, e))?;

        tracing::info!(path = %self.path.display(), "session snapshot saved");
        Ok(())
    }

    /// Removes the snapshot. Returns whether one existed.
    ///
    /// # Errors
    ///
    /// Returns [`EngineError::Io`] if the file exists but cannot be removed.
    pub async fn delete(&self) -> Result<bool, EngineError> {
        match tokio::fs::remove_file(&self.path).await {
            Ok(()) => {
                tracing::info!(path = %self.path.display(), "session snapshot deleted");
                Ok(true)
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(false),
            Err(e) => Err(EngineError::io(&self.path, e)),
        }
    }
}
