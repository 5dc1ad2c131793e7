use serde::{Deserialize, Serialize};

/// TUI options.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TuiConfig {
    #[serde(default = "default_true")]
    pub show_legend: bool,
    #[serde(default = "default_log_panel_lines")]
    pub log_panel_lines: u16,
    #[serde(default = "default_refresh_ms")]
    pub refresh_ms: u64,
}

impl Default for TuiConfig {
    fn default() -> Self {
        Self {
            show_legend: true,
            log_panel_lines: 8,
            refresh_ms: 250,
        }
    }
}

/// A project the runner polls, with an optional per-project concurrency cap.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProjectConfig {
    pub name: String,
    #[serde(default)]
    pub limit: Option<usize>,
}

/// Runner configuration, read from `$BRAIN_DIR/runner.yaml` with
/// environment overrides applied on top.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunnerConfig {
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,
    #[serde(default = "default_max_parallel")]
    pub max_parallel: usize,
    #[serde(default = "default_task_timeout")]
    pub task_timeout_secs: u64,
    #[serde(default = "default_cancel_grace")]
    pub cancel_grace_secs: u64,
    #[serde(default = "default_store_timeout")]
    pub store_timeout_secs: u64,
    #[serde(default = "default_memory_threshold")]
    pub memory_threshold_pct: u8,
    #[serde(default = "default_agent")]
    pub agent: String,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub default_workdir: Option<String>,
    #[serde(default)]
    pub api_url: Option<String>,
    #[serde(default)]
    pub api_port: Option<u16>,
    #[serde(default)]
    pub projects: Vec<ProjectConfig>,
    #[serde(default)]
    pub exclude: Vec<String>,
    #[serde(default)]
    pub claim_tasks: bool,
    /// When false, orphaned `in_progress` entries are left untouched at
    /// startup instead of being reset to pending.
    #[serde(default = "default_true")]
    pub resume: bool,
    #[serde(default = "default_log_buffer")]
    pub log_buffer: usize,
    #[serde(default)]
    pub tui: TuiConfig,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval(),
            max_parallel: default_max_parallel(),
            task_timeout_secs: default_task_timeout(),
            cancel_grace_secs: default_cancel_grace(),
            store_timeout_secs: default_store_timeout(),
            memory_threshold_pct: default_memory_threshold(),
            agent: default_agent(),
            model: None,
            default_workdir: None,
            api_url: None,
            api_port: None,
            projects: Vec::new(),
            exclude: Vec::new(),
            claim_tasks: false,
            resume: true,
            log_buffer: default_log_buffer(),
            tui: TuiConfig::default(),
        }
    }
}

impl RunnerConfig {
    /// Per-project limit, falling back to the global cap.
    pub fn limit_for(&self, project: &str) -> usize {
        self.projects
            .iter()
            .find(|p| p.name == project)
            .and_then(|p| p.limit)
            .unwrap_or(self.max_parallel)
            .min(self.max_parallel)
    }

    /// Base URL of the entry API, combining `api_url` and `api_port`.
    pub fn api_base(&self) -> Option<String> {
        let url = self.api_url.as_deref()?.trim_end_matches('/').to_string();
        match self.api_port {
            Some(port) => Some(format!("{url}:{port}")),
            None => Some(url),
        }
    }
}

fn default_true() -> bool {
    true
}

fn default_log_panel_lines() -> u16 {
    8
}

fn default_refresh_ms() -> u64 {
    250
}

fn default_poll_interval() -> u64 {
    2
}

fn default_max_parallel() -> usize {
    3
}

fn default_task_timeout() -> u64 {
    4 * 60 * 60
}

fn default_cancel_grace() -> u64 {
    30
}

fn default_store_timeout() -> u64 {
    10
}

fn default_memory_threshold() -> u8 {
    10
}

fn default_agent() -> String {
    "claude".to_string()
}

fn default_log_buffer() -> usize {
    500
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.poll_interval_secs, 2);
        assert_eq!(config.max_parallel, 3);
        assert_eq!(config.task_timeout_secs, 14400);
        assert_eq!(config.cancel_grace_secs, 30);
        assert_eq!(config.memory_threshold_pct, 10);
        assert_eq!(config.agent, "claude");
        assert_eq!(config.log_buffer, 500);
        assert!(!config.claim_tasks);
    }

    #[test]
    fn test_partial_yaml_fills_defaults() {
        let yaml = "max_parallel: 5\nprojects:\n  - name: demo\n    limit: 2\n  - name: other\n";
        let config: RunnerConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.max_parallel, 5);
        assert_eq!(config.poll_interval_secs, 2);
        assert_eq!(config.projects.len(), 2);
        assert_eq!(config.projects[0].limit, Some(2));
        assert_eq!(config.projects[1].limit, None);
    }

    #[test]
    fn test_limit_for_clamps_to_global_cap() {
        let config: RunnerConfig = serde_yaml::from_str(
            "max_parallel: 3\nprojects:\n  - name: small\n    limit: 1\n  - name: big\n    limit: 10\n",
        )
        .unwrap();
        assert_eq!(config.limit_for("small"), 1);
        assert_eq!(config.limit_for("big"), 3);
        assert_eq!(config.limit_for("unknown"), 3);
    }

    #[test]
    fn test_api_base_joins_port() {
        let mut config = RunnerConfig {
            api_url: Some("http://127.0.0.1/".to_string()),
            ..Default::default()
        };
        assert_eq!(config.api_base().as_deref(), Some("http://127.0.0.1"));
        config.api_port = Some(7777);
        assert_eq!(config.api_base().as_deref(), Some("http://127.0.0.1:7777"));
        config.api_url = None;
        assert!(config.api_base().is_none());
    }
}
