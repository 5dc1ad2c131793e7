use std::env;
use std::path::{Path, PathBuf};

/// Resolve the notebook root: `$BRAIN_DIR`, falling back to `~/brain`.
pub fn brain_dir() -> PathBuf {
    if let Ok(dir) = env::var("BRAIN_DIR") {
        if !dir.trim().is_empty() {
            return PathBuf::from(dir);
        }
    }
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("brain")
}

/// Runner config file inside the notebook.
pub fn runner_config_path(base: &Path) -> PathBuf {
    base.join("runner.yaml")
}

/// Notebook config (owned by the entry store; doctor checks its invariants).
pub fn notebook_config_path(base: &Path) -> PathBuf {
    base.join("config.toml")
}

/// Entry templates directory.
pub fn templates_dir(base: &Path) -> PathBuf {
    base.join("templates")
}

/// Task markdown directory for a project.
pub fn project_task_dir(base: &Path, project: &str) -> PathBuf {
    base.join("projects").join(project).join("task")
}

/// Notebook index database (opaque to the core).
pub fn database_path(base: &Path) -> PathBuf {
    base.join("brain.db")
}

/// Per-project structured log file.
pub fn project_log_path(base: &Path, project: &str) -> PathBuf {
    base.join("logs")
        .join("brain-runner")
        .join(project)
        .join("tui-logs.jsonl")
}

/// Pidfile for the background runner.
pub fn pidfile_path(base: &Path) -> PathBuf {
    base.join("runner.pid")
}

/// The user's home directory, honoring `$HOME` for workdir resolution.
pub fn home_dir() -> PathBuf {
    if let Ok(home) = env::var("HOME") {
        if !home.trim().is_empty() {
            return PathBuf::from(home);
        }
    }
    dirs::home_dir().unwrap_or_else(|| PathBuf::from("."))
}

/// The editor to launch for task editing: `$EDITOR`, then `$VISUAL`, then vi.
pub fn editor() -> String {
    env::var("EDITOR")
        .ok()
        .filter(|e| !e.trim().is_empty())
        .or_else(|| env::var("VISUAL").ok().filter(|e| !e.trim().is_empty()))
        .unwrap_or_else(|| "vi".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_under_base() {
        let base = Path::new("/notebook");
        assert_eq!(runner_config_path(base), Path::new("/notebook/runner.yaml"));
        assert_eq!(
            notebook_config_path(base),
            Path::new("/notebook/config.toml")
        );
        assert_eq!(templates_dir(base), Path::new("/notebook/templates"));
        assert_eq!(
            project_task_dir(base, "demo"),
            Path::new("/notebook/projects/demo/task")
        );
        assert_eq!(
            project_log_path(base, "demo"),
            Path::new("/notebook/logs/brain-runner/demo/tui-logs.jsonl")
        );
        assert_eq!(pidfile_path(base), Path::new("/notebook/runner.pid"));
        assert_eq!(database_path(base), Path::new("/notebook/brain.db"));
    }
}
