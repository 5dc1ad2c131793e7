//! Filesystem entry store: reads task markdown straight from the notebook.
//!
//! Serves the no-server deployment and the test suite. Layout:
//! `<base>/projects/<project>/task/<id>.md`. Files with invalid ids or
//! broken frontmatter are skipped on list (warned), not fatal.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::warn;

use crate::entry_store::{EntryUpdate, StoreError};
use crate::frontmatter;
use crate::types::Task;

#[derive(Debug, Clone)]
pub struct LocalStore {
    base: PathBuf,
}

impl LocalStore {
    pub fn new(base: PathBuf) -> Self {
        Self { base }
    }

    pub fn base(&self) -> &Path {
        &self.base
    }

    /// Absolute path of an entry given its notebook-relative path.
    pub fn entry_path(&self, rel: &str) -> PathBuf {
        self.base.join(rel)
    }

    pub fn list(&self, project: &str) -> Result<Vec<Task>, StoreError> {
        let dir = crate::config::project_task_dir(&self.base, project);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(project.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        let mut tasks = Vec::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("md") {
                continue;
            }
            let id = match frontmatter::id_from_path(&path) {
                Ok(id) => id,
                Err(e) => {
                    warn!(path = %path.display(), "Skipping entry: {e}");
                    continue;
                }
            };
            let content = match fs::read_to_string(&path) {
                Ok(content) => content,
                Err(e) => {
                    warn!(path = %path.display(), "Skipping unreadable entry: {e}");
                    continue;
                }
            };
            match frontmatter::parse(&content) {
                Ok(parsed) => {
                    let rel = format!("projects/{project}/task/{id}.md");
                    tasks.push(frontmatter::to_task(&id, &rel, project, &parsed));
                }
                Err(e) => warn!(path = %path.display(), "Skipping malformed entry: {e}"),
            }
        }

        // Stable listing order regardless of directory iteration.
        tasks.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(tasks)
    }

    pub fn get(&self, rel: &str) -> Result<Task, StoreError> {
        let path = self.entry_path(rel);
        let content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(rel.to_string()));
            }
            Err(e) => return Err(e.into()),
        };
        let id = frontmatter::id_from_path(&path)
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        let project = project_from_rel(rel)
            .ok_or_else(|| StoreError::Validation(format!("path outside projects/: {rel}")))?;
        let parsed = frontmatter::parse(&content)
            .map_err(|e| StoreError::Validation(e.to_string()))?;
        Ok(frontmatter::to_task(&id, rel, &project, &parsed))
    }

    pub fn update(&self, rel: &str, update: &EntryUpdate) -> Result<(), StoreError> {
        let path = self.entry_path(rel);
        let mut content = match fs::read_to_string(&path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StoreError::NotFound(rel.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        if let Some(status) = update.status {
            content = frontmatter::set_status(&content, status)
                .map_err(|e| StoreError::Validation(e.to_string()))?;
        }
        if let Some(ref title) = update.title {
            let mut parsed = frontmatter::parse(&content)
                .map_err(|e| StoreError::Validation(e.to_string()))?;
            parsed.frontmatter.title = title.clone();
            content = frontmatter::render(&parsed)
                .map_err(|e| StoreError::Validation(e.to_string()))?;
        }
        if let Some(ref append) = update.append {
            let mut parsed = frontmatter::parse(&content)
                .map_err(|e| StoreError::Validation(e.to_string()))?;
            if !parsed.body.is_empty() && !parsed.body.ends_with('\n') {
                parsed.body.push('\n');
            }
            parsed.body.push_str(append);
            content = frontmatter::render(&parsed)
                .map_err(|e| StoreError::Validation(e.to_string()))?;
        }
        if let Some(ref note) = update.note {
            content = frontmatter::append_note(&content, note)
                .map_err(|e| StoreError::Validation(e.to_string()))?;
        }

        fs::write(&path, content)?;
        Ok(())
    }
}

/// Extract the project segment from `projects/<project>/...`.
fn project_from_rel(rel: &str) -> Option<String> {
    let mut parts = rel.split('/');
    if parts.next()? != "projects" {
        return None;
    }
    parts.next().map(|s| s.to_string())
}

#[cfg(test)]
pub mod fixtures {
    use std::path::Path;

    use crate::types::{EntryStatus, Priority};

    /// Write a task entry into a fixture notebook.
    #[allow(clippy::too_many_arguments)]
    pub fn write_task(
        base: &Path,
        project: &str,
        id: &str,
        status: EntryStatus,
        priority: Priority,
        depends_on: &[&str],
        feature_id: Option<&str>,
        workdir: Option<&str>,
    ) {
        let dir = crate::config::project_task_dir(base, project);
        std::fs::create_dir_all(&dir).unwrap();
        let mut fm = String::new();
        fm.push_str(&format!("title: Task {id}\n"));
        fm.push_str(&format!("status: {status}\n"));
        fm.push_str(&format!("priority: {priority}\n"));
        if !depends_on.is_empty() {
            fm.push_str("depends_on:\n");
            for dep in depends_on {
                fm.push_str(&format!("  - {dep}\n"));
            }
        }
        if let Some(feature) = feature_id {
            fm.push_str(&format!("feature_id: {feature}\n"));
        }
        if let Some(wd) = workdir {
            fm.push_str(&format!("workdir: {wd}\n"));
        }
        fm.push_str("tags:\n  - task\n");
        let content = format!("---\n{fm}---\n\nFixture body.\n");
        std::fs::write(dir.join(format!("{id}.md")), content).unwrap();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{EntryStatus, Priority};
    use super::fixtures::write_task;

    #[test]
    fn test_list_unknown_project_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(tmp.path().to_path_buf());
        assert!(matches!(
            store.list("ghost"),
            Err(StoreError::NotFound(_))
        ));
    }

    #[test]
    fn test_list_returns_sorted_tasks_and_skips_malformed() {
        let tmp = tempfile::tempdir().unwrap();
        write_task(
            tmp.path(),
            "demo",
            "bbbb2222",
            EntryStatus::Pending,
            Priority::Medium,
            &[],
            None,
            None,
        );
        write_task(
            tmp.path(),
            "demo",
            "aaaa1111",
            EntryStatus::Completed,
            Priority::High,
            &[],
            None,
            None,
        );
        // Malformed: no frontmatter. Invalid name: bad id.
        let dir = crate::config::project_task_dir(tmp.path(), "demo");
        std::fs::write(dir.join("cccc3333.md"), "no frontmatter here").unwrap();
        std::fs::write(dir.join("README.md"), "---\ntitle: x\n---\n").unwrap();

        let store = LocalStore::new(tmp.path().to_path_buf());
        let tasks = store.list("demo").unwrap();
        let ids: Vec<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        assert_eq!(ids, vec!["aaaa1111", "bbbb2222"]);
        assert_eq!(tasks[0].status, EntryStatus::Completed);
    }

    #[test]
    fn test_update_status_then_get_reads_it_back() {
        let tmp = tempfile::tempdir().unwrap();
        write_task(
            tmp.path(),
            "demo",
            "a1b2c3d4",
            EntryStatus::Pending,
            Priority::Medium,
            &[],
            None,
            None,
        );
        let store = LocalStore::new(tmp.path().to_path_buf());
        let rel = "projects/demo/task/a1b2c3d4.md";

        store
            .update(rel, &EntryUpdate::status(EntryStatus::InProgress))
            .unwrap();
        let task = store.get(rel).unwrap();
        assert_eq!(task.status, EntryStatus::InProgress);

        // Idempotent: same status again is fine.
        store
            .update(rel, &EntryUpdate::status(EntryStatus::InProgress))
            .unwrap();
        assert_eq!(store.get(rel).unwrap().status, EntryStatus::InProgress);
    }

    #[test]
    fn test_update_note_appends_to_body() {
        let tmp = tempfile::tempdir().unwrap();
        write_task(
            tmp.path(),
            "demo",
            "a1b2c3d4",
            EntryStatus::Pending,
            Priority::Medium,
            &[],
            None,
            None,
        );
        let store = LocalStore::new(tmp.path().to_path_buf());
        let rel = "projects/demo/task/a1b2c3d4.md";
        store
            .update(rel, &EntryUpdate::note("outcome: completed (exit 0)"))
            .unwrap();
        let task = store.get(rel).unwrap();
        assert!(task.content.contains("Fixture body."));
        assert!(task.content.contains("outcome: completed (exit 0)"));
    }

    #[test]
    fn test_update_unknown_path_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let store = LocalStore::new(tmp.path().to_path_buf());
        assert!(matches!(
            store.update(
                "projects/demo/task/a1b2c3d4.md",
                &EntryUpdate::status(EntryStatus::Completed)
            ),
            Err(StoreError::NotFound(_))
        ));
    }
}
