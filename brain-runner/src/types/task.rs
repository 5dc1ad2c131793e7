use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use super::enums::{Classification, EntryStatus, Priority};

/// A task entry as persisted in the notebook (markdown + YAML frontmatter)
/// and as returned by the entry API. The `id` is the 8-char lowercase
/// alphanumeric filename stem; `path` is the stable key.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Task {
    pub id: String,
    pub path: String,
    pub project: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub status: EntryStatus,
    #[serde(default)]
    pub priority: Priority,
    #[serde(default)]
    pub feature_id: Option<String>,
    #[serde(default)]
    pub parent_id: Option<String>,
    #[serde(default)]
    pub depends_on: Vec<String>,
    #[serde(default)]
    pub workdir: Option<String>,
    #[serde(default)]
    pub worktree: Option<String>,
    #[serde(default)]
    pub git_remote: Option<String>,
    #[serde(default)]
    pub git_branch: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub created: Option<String>,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content: String,
}

impl Task {
    /// Whether this entry is the project root marker (legacy pause signal).
    pub fn is_project_root(&self) -> bool {
        self.tags.iter().any(|t| t == "root")
    }
}

/// Title of a related task, kept alongside the id for display.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EdgeRef {
    pub id: String,
    pub title: String,
}

/// A task enriched with everything the scheduler and the TUI need.
/// Derived per tick, never persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedTask {
    #[serde(flatten)]
    pub task: Task,
    pub classification: Classification,
    #[serde(default)]
    pub blocked_by: Vec<String>,
    #[serde(default)]
    pub blocked_by_reason: Option<String>,
    #[serde(default)]
    pub waiting_on: Vec<String>,
    #[serde(default)]
    pub unresolved_deps: Vec<String>,
    #[serde(default)]
    pub in_cycle: bool,
    #[serde(default)]
    pub resolved_workdir: Option<PathBuf>,
    /// Prerequisites of this task (dependency edges), with titles.
    #[serde(default)]
    pub dependencies: Vec<EdgeRef>,
    /// Tasks that depend on this one, with titles.
    #[serde(default)]
    pub dependents: Vec<EdgeRef>,
    /// Direct children (tasks whose parent_id points here), with titles.
    #[serde(default)]
    pub children: Vec<EdgeRef>,
}

impl ResolvedTask {
    pub fn id(&self) -> &str {
        &self.task.id
    }

    pub fn status(&self) -> EntryStatus {
        self.task.status
    }
}

/// Aggregate counts over a resolved graph.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphStats {
    pub total: usize,
    pub ready: usize,
    pub waiting: usize,
    pub blocked: usize,
    pub in_progress: usize,
    pub completed: usize,
}

/// Output of one resolver pass: ordered tasks plus derived stats.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedGraph {
    pub tasks: Vec<ResolvedTask>,
    pub stats: GraphStats,
}

impl ResolvedGraph {
    pub fn get(&self, id: &str) -> Option<&ResolvedTask> {
        self.tasks.iter().find(|t| t.task.id == id)
    }

    pub fn ready(&self) -> impl Iterator<Item = &ResolvedTask> {
        self.tasks
            .iter()
            .filter(|t| t.classification == Classification::Ready)
    }
}

/// Build a minimal task for tests and fixtures.
#[cfg(test)]
pub fn task_fixture(id: &str, project: &str, status: EntryStatus) -> Task {
    Task {
        id: id.to_string(),
        path: format!("projects/{project}/task/{id}.md"),
        project: project.to_string(),
        title: format!("Task {id}"),
        status,
        priority: Priority::Medium,
        feature_id: None,
        parent_id: None,
        depends_on: Vec::new(),
        workdir: None,
        worktree: None,
        git_remote: None,
        git_branch: None,
        tags: vec!["task".to_string()],
        created: None,
        content: String::new(),
    }
}
