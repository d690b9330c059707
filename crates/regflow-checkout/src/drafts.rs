//! # Draft Persistence
//!
//! Saves in-progress registrations so a reload or a later visit can resume
//! them. Confirmed registrations are discarded, never resumed.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Registration ──snapshot()──► DraftSnapshot ──JSON──► DraftStore        │
//! │                                                                         │
//! │  MemoryDraftStore     one process, tests                                │
//! │  JsonFileDraftStore   <dir>/<registration id>.json                      │
//! │                       written to .tmp, then renamed into place          │
//! │                                                                         │
//! │  Concurrent saves of the same draft: last write wins.                   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use async_trait::async_trait;
use regflow_core::{DraftSnapshot, RegistrationId};
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;
use tracing::debug;

use crate::error::{CheckoutError, CheckoutResult};

#[async_trait]
pub trait DraftStore: Send + Sync {
    async fn save(&self, draft: &DraftSnapshot) -> CheckoutResult<()>;

    /// Fails with `DraftNotFound` if nothing was saved under `id`.
    async fn load(&self, id: &RegistrationId) -> CheckoutResult<DraftSnapshot>;

    /// Removes a draft. Discarding a missing draft is not an error.
    async fn discard(&self, id: &RegistrationId) -> CheckoutResult<()>;
}

// =============================================================================
// Memory Store
// =============================================================================

/// Keeps drafts as JSON strings in memory.
#[derive(Debug, Default)]
pub struct MemoryDraftStore {
    drafts: RwLock<HashMap<RegistrationId, String>>,
}

impl MemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.drafts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.drafts.read().await.is_empty()
    }
}

#[async_trait]
impl DraftStore for MemoryDraftStore {
    async fn save(&self, draft: &DraftSnapshot) -> CheckoutResult<()> {
        let json = serde_json::to_string(draft)?;
        self.drafts.write().await.insert(draft.id.clone(), json);
        Ok(())
    }

    async fn load(&self, id: &RegistrationId) -> CheckoutResult<DraftSnapshot> {
        let drafts = self.drafts.read().await;
        let json = drafts
            .get(id)
            .ok_or_else(|| CheckoutError::DraftNotFound(id.clone()))?;
        Ok(serde_json::from_str(json)?)
    }

    async fn discard(&self, id: &RegistrationId) -> CheckoutResult<()> {
        self.drafts.write().await.remove(id);
        Ok(())
    }
}

// =============================================================================
// JSON File Store
// =============================================================================

/// One pretty-printed JSON file per draft.
#[derive(Debug, Clone)]
pub struct JsonFileDraftStore {
    directory: PathBuf,
}

impl JsonFileDraftStore {
    pub fn new(directory: impl Into<PathBuf>) -> Self {
        JsonFileDraftStore {
            directory: directory.into(),
        }
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    fn path_for(&self, id: &RegistrationId) -> CheckoutResult<PathBuf> {
        let safe = !id.as_str().is_empty()
            && id
                .as_str()
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !safe {
            return Err(CheckoutError::DraftStorage(format!(
                "registration id '{}' cannot be used as a file name",
                id
            )));
        }
        Ok(self.directory.join(format!("{}.json", id)))
    }
}

#[async_trait]
impl DraftStore for JsonFileDraftStore {
    async fn save(&self, draft: &DraftSnapshot) -> CheckoutResult<()> {
        let path = self.path_for(&draft.id)?;
        let tmp = path.with_extension("json.tmp");
        let json = serde_json::to_vec_pretty(draft)?;

        tokio::fs::create_dir_all(&self.directory).await?;
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        debug!(registration_id = %draft.id, ?path, "Draft saved");
        Ok(())
    }

    async fn load(&self, id: &RegistrationId) -> CheckoutResult<DraftSnapshot> {
        let path = self.path_for(id)?;
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(CheckoutError::DraftNotFound(id.clone()))
            }
            Err(e) => return Err(e.into()),
        };
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn discard(&self, id: &RegistrationId) -> CheckoutResult<()> {
        let path = self.path_for(id)?;
        match tokio::fs::remove_file(&path).await {
            Ok(()) => {
                debug!(registration_id = %id, "Draft discarded");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
