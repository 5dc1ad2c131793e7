//! Entry store access: backend dispatch and the store error taxonomy.
//!
//! The runner reads and mutates entries through exactly one seam. Two
//! backends exist: the entry HTTP API (`Http`) and a direct filesystem
//! reader over the notebook (`Local`). Tests run against `Local` with a
//! temp notebook.

use crate::api_client::ApiClient;
use crate::local_store::LocalStore;
use crate::types::{EntryStatus, Task};

/// Errors the store distinguishes. Transient errors are absorbed within
/// the tick that produced them; validation errors surface to the caller.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Timeout or network failure; retry next tick.
    #[error("entry store unavailable: {0}")]
    Transient(String),
    /// The store rejected the request (invalid enum, empty body).
    #[error("validation: {0}")]
    Validation(String),
    /// Unknown project or entry path.
    #[error("not found: {0}")]
    NotFound(String),
    /// Claim refused; another runner holds the task.
    #[error("claimed by {claimed_by}")]
    Claimed { claimed_by: String },
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
    #[error("{0}")]
    Other(String),
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Transient(_))
    }
}

/// Fields accepted by an entry update. Empty updates are rejected by the
/// store; status updates are idempotent.
#[derive(Debug, Clone, Default, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<EntryStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub append: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

impl EntryUpdate {
    pub fn status(status: EntryStatus) -> Self {
        Self {
            status: Some(status),
            ..Default::default()
        }
    }

    pub fn note(note: impl Into<String>) -> Self {
        Self {
            note: Some(note.into()),
            ..Default::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.title.is_none() && self.append.is_none() && self.note.is_none()
    }
}

/// Backend dispatch. Either the HTTP entry API or the notebook on disk.
#[derive(Debug)]
pub enum EntryStore {
    Http(ApiClient),
    Local(LocalStore),
}

impl EntryStore {
    /// List all task entries of a project.
    pub async fn list(&self, project: &str) -> Result<Vec<Task>, StoreError> {
        match self {
            EntryStore::Http(client) => client.list_tasks(project).await,
            EntryStore::Local(store) => store.list(project),
        }
    }

    /// Read a single entry by project and path.
    pub async fn get(&self, project: &str, path: &str) -> Result<Task, StoreError> {
        match self {
            EntryStore::Http(client) => {
                let tasks = client.list_tasks(project).await?;
                tasks
                    .into_iter()
                    .find(|t| t.path == path)
                    .ok_or_else(|| StoreError::NotFound(path.to_string()))
            }
            EntryStore::Local(store) => store.get(path),
        }
    }

    /// Apply an update to an entry. Rejects empty updates locally to match
    /// the API's 400 behavior.
    pub async fn update(&self, path: &str, update: &EntryUpdate) -> Result<(), StoreError> {
        if update.is_empty() {
            return Err(StoreError::Validation("empty update".to_string()));
        }
        match self {
            EntryStore::Http(client) => client.update_entry(path, update).await,
            EntryStore::Local(store) => store.update(path, update),
        }
    }

    /// Convenience: idempotent status write.
    pub async fn update_status(&self, path: &str, status: EntryStatus) -> Result<(), StoreError> {
        self.update(path, &EntryUpdate::status(status)).await
    }

    /// Claim a task for this runner. `Ok(())` on success, `Claimed` if a
    /// peer holds it. The local backend has no peers and always succeeds.
    pub async fn claim(&self, project: &str, task_id: &str, runner_id: &str) -> Result<(), StoreError> {
        match self {
            EntryStore::Http(client) => client.claim(project, task_id, runner_id).await,
            EntryStore::Local(_) => Ok(()),
        }
    }

    /// Release a previously claimed task.
    pub async fn release(&self, project: &str, task_id: &str, runner_id: &str) -> Result<(), StoreError> {
        match self {
            EntryStore::Http(client) => client.release(project, task_id, runner_id).await,
            EntryStore::Local(_) => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_update_detection() {
        assert!(EntryUpdate::default().is_empty());
        assert!(!EntryUpdate::status(EntryStatus::Completed).is_empty());
        assert!(!EntryUpdate::note("done").is_empty());
    }

    #[test]
    fn test_update_serializes_only_set_fields() {
        let update = EntryUpdate::status(EntryStatus::Cancelled);
        let json = serde_json::to_string(&update).unwrap();
        assert_eq!(json, r#"{"status":"cancelled"}"#);
    }

    #[test]
    fn test_transient_classification() {
        assert!(StoreError::Transient("timeout".into()).is_transient());
        assert!(!StoreError::NotFound("x".into()).is_transient());
        assert!(!StoreError::Validation("x".into()).is_transient());
    }

    #[tokio::test]
    async fn test_store_rejects_empty_update() {
        let tmp = tempfile::tempdir().unwrap();
        let store = EntryStore::Local(LocalStore::new(tmp.path().to_path_buf()));
        let err = store
            .update("projects/demo/task/a1b2c3d4.md", &EntryUpdate::default())
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::Validation(_)));
    }
}
