//! HTTP client for the entry API.
//!
//! Only the JSON shapes on the wire are normative; the server side lives in
//! the notebook service. Every call carries a timeout so the runner loop
//! never blocks a tick on a slow store.

use std::time::Duration;

use serde::Deserialize;

use crate::entry_store::{EntryUpdate, StoreError};
use crate::types::{GraphStats, Task};

/// Response of `GET /api/v1/tasks/{project}`.
#[derive(Debug, Deserialize)]
pub struct TaskListResponse {
    pub tasks: Vec<Task>,
    #[serde(default)]
    pub stats: Option<ListStats>,
}

/// Store-side counts; advisory only, the resolver recomputes them.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct ListStats {
    #[serde(default)]
    pub total: usize,
    #[serde(default)]
    pub ready: usize,
    #[serde(default)]
    pub waiting: usize,
    #[serde(default)]
    pub blocked: usize,
}

impl From<ListStats> for GraphStats {
    fn from(stats: ListStats) -> Self {
        GraphStats {
            total: stats.total,
            ready: stats.ready,
            waiting: stats.waiting,
            blocked: stats.blocked,
            ..Default::default()
        }
    }
}

#[derive(Debug, Deserialize)]
struct ClaimRejection {
    #[serde(rename = "claimedBy")]
    claimed_by: String,
}

#[derive(Debug, Deserialize)]
struct ApiError {
    #[serde(default)]
    error: String,
}

/// Thin typed wrapper over the entry API endpoints.
#[derive(Debug, Clone)]
pub struct ApiClient {
    base_url: String,
    client: reqwest::Client,
}

impl ApiClient {
    /// Build a client with a per-request timeout (default 10s elsewhere).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, StoreError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Other(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    /// `GET /api/v1/tasks/{project}`.
    pub async fn list_tasks(&self, project: &str) -> Result<Vec<Task>, StoreError> {
        let url = self.url(&format!("api/v1/tasks/{project}"));
        let response = self.client.get(&url).send().await.map_err(to_transient)?;
        match response.status().as_u16() {
            200 => {
                let body: TaskListResponse =
                    response.json().await.map_err(|e| StoreError::Other(e.to_string()))?;
                Ok(body.tasks)
            }
            404 => Err(StoreError::NotFound(project.to_string())),
            503 => Err(StoreError::Transient("store unavailable (503)".to_string())),
            code => Err(StoreError::Other(format!("unexpected status {code} from {url}"))),
        }
    }

    /// `PATCH /api/v1/entries/{path}`. Idempotent for status updates.
    pub async fn update_entry(&self, path: &str, update: &EntryUpdate) -> Result<(), StoreError> {
        let url = self.url(&format!("api/v1/entries/{path}"));
        let response = self
            .client
            .patch(&url)
            .json(update)
            .send()
            .await
            .map_err(to_transient)?;
        match response.status().as_u16() {
            200 | 204 => Ok(()),
            400 => {
                let detail = response
                    .json::<ApiError>()
                    .await
                    .map(|e| e.error)
                    .unwrap_or_default();
                Err(StoreError::Validation(detail))
            }
            404 => Err(StoreError::NotFound(path.to_string())),
            503 => Err(StoreError::Transient("store unavailable (503)".to_string())),
            code => Err(StoreError::Other(format!("unexpected status {code} from {url}"))),
        }
    }

    /// `POST /api/v1/tasks/{project}/{taskId}/claim`.
    pub async fn claim(&self, project: &str, task_id: &str, runner_id: &str) -> Result<(), StoreError> {
        let url = self.url(&format!("api/v1/tasks/{project}/{task_id}/claim"));
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "runnerId": runner_id }))
            .send()
            .await
            .map_err(to_transient)?;
        match response.status().as_u16() {
            200 => Ok(()),
            404 => Err(StoreError::NotFound(task_id.to_string())),
            409 => {
                let claimed_by = response
                    .json::<ClaimRejection>()
                    .await
                    .map(|r| r.claimed_by)
                    .unwrap_or_else(|_| "unknown".to_string());
                Err(StoreError::Claimed { claimed_by })
            }
            code => Err(StoreError::Other(format!("unexpected status {code} from {url}"))),
        }
    }

    /// `POST /api/v1/tasks/{project}/{taskId}/release`.
    pub async fn release(&self, project: &str, task_id: &str, runner_id: &str) -> Result<(), StoreError> {
        let url = self.url(&format!("api/v1/tasks/{project}/{task_id}/release"));
        let response = self
            .client
            .post(&url)
            .json(&serde_json::json!({ "runnerId": runner_id }))
            .send()
            .await
            .map_err(to_transient)?;
        match response.status().as_u16() {
            200 | 204 => Ok(()),
            404 => Err(StoreError::NotFound(task_id.to_string())),
            code => Err(StoreError::Other(format!("unexpected status {code} from {url}"))),
        }
    }
}

fn to_transient(err: reqwest::Error) -> StoreError {
    StoreError::Transient(err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_url_joins_without_double_slash() {
        let client = ApiClient::new("http://127.0.0.1:7777/", Duration::from_secs(10)).unwrap();
        assert_eq!(
            client.url("api/v1/tasks/demo"),
            "http://127.0.0.1:7777/api/v1/tasks/demo"
        );
        assert_eq!(
            client.url("/api/v1/entries/projects/demo/task/a1b2c3d4.md"),
            "http://127.0.0.1:7777/api/v1/entries/projects/demo/task/a1b2c3d4.md"
        );
    }

    #[test]
    fn test_list_response_parses_wire_shape() {
        let json = r#"{
            "tasks": [{
                "id": "a1b2c3d4",
                "path": "projects/demo/task/a1b2c3d4.md",
                "project": "demo",
                "title": "T",
                "status": "pending",
                "priority": "medium"
            }],
            "stats": {"total": 1, "ready": 1, "waiting": 0, "blocked": 0}
        }"#;
        let parsed: TaskListResponse = serde_json::from_str(json).unwrap();
        assert_eq!(parsed.tasks.len(), 1);
        assert_eq!(parsed.stats.unwrap().ready, 1);
    }

    #[test]
    fn test_list_response_without_stats() {
        let parsed: TaskListResponse = serde_json::from_str(r#"{"tasks": []}"#).unwrap();
        assert!(parsed.tasks.is_empty());
        assert!(parsed.stats.is_none());
    }
}
