use std::collections::BTreeSet;

use serde::{Deserialize, Serialize};

use super::task::{GraphStats, ResolvedTask};

/// Global resource metrics sampled once per tick.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetrics {
    /// 1-minute load average, as a CPU pressure proxy.
    pub load_avg: f64,
    /// Reclaimable memory as a fraction of total, 0.0..=1.0.
    pub available_memory_frac: f64,
    /// Resident memory of the runner process, in MB.
    pub rss_mb: u64,
    /// Number of live agent child processes.
    pub agent_count: usize,
}

/// Per-project view published to the TUI on every tick.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSnapshot {
    pub project: String,
    pub tasks: Vec<ResolvedTask>,
    pub stats: GraphStats,
    pub paused: bool,
    /// Empty set means every feature is eligible.
    pub enabled_features: BTreeSet<String>,
    pub limit: Option<usize>,
    pub running: BTreeSet<String>,
    pub last_poll_at: Option<String>,
    pub last_error: Option<String>,
}

/// Immutable state of the whole runner, published over a watch channel.
/// The TUI renders snapshots and never shares mutable state with the loop.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunnerSnapshot {
    pub projects: Vec<ProjectSnapshot>,
    pub metrics: ResourceMetrics,
    pub global_cap: usize,
    pub total_running: usize,
    pub last_error: Option<String>,
    pub dry_run: bool,
    pub tick: u64,
}

impl RunnerSnapshot {
    pub fn project(&self, name: &str) -> Option<&ProjectSnapshot> {
        self.projects.iter().find(|p| p.project == name)
    }

    /// Aggregate stats across all projects.
    pub fn aggregate_stats(&self) -> GraphStats {
        let mut agg = GraphStats::default();
        for project in &self.projects {
            agg.total += project.stats.total;
            agg.ready += project.stats.ready;
            agg.waiting += project.stats.waiting;
            agg.blocked += project.stats.blocked;
            agg.in_progress += project.stats.in_progress;
            agg.completed += project.stats.completed;
        }
        agg
    }
}
