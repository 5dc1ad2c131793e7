//! Dispatch selection over a resolved graph.
//!
//! Stateless aside from its inputs: the runner loop owns the running set
//! and the project state; the scheduler only decides what (if anything)
//! runs next for one project.

use std::collections::BTreeSet;

use crate::memory::MemoryProvider;
use crate::types::{Classification, EntryStatus, ResolvedGraph, ResolvedTask};

/// Feature-whitelist sentinel matching tasks that carry no `feature_id`.
pub const UNGROUPED: &str = "__ungrouped__";

/// Everything `pick` consults besides the graph itself.
pub struct ScheduleContext<'a> {
    pub paused: bool,
    /// Empty set means all features are eligible.
    pub enabled_features: &'a BTreeSet<String>,
    /// Effective per-project limit (already clamped to the global cap).
    pub project_limit: usize,
    pub global_cap: usize,
    /// Tasks of this project currently running.
    pub project_running: usize,
    /// Tasks running across all projects.
    pub total_running: usize,
    /// Ids currently owned by the supervisor, to avoid double dispatch.
    pub running_ids: &'a BTreeSet<String>,
    pub memory: &'a dyn MemoryProvider,
    /// Minimum available-memory fraction, e.g. 0.10.
    pub memory_threshold: f64,
}

impl ScheduleContext<'_> {
    fn has_capacity(&self) -> bool {
        self.total_running < self.global_cap
            && self.project_running < self.project_limit.min(self.global_cap)
    }
}

/// Whether a task passes the feature whitelist.
pub fn feature_eligible(enabled: &BTreeSet<String>, feature_id: Option<&str>) -> bool {
    if enabled.is_empty() {
        return true;
    }
    match feature_id {
        Some(feature) => enabled.contains(feature),
        None => enabled.contains(UNGROUPED),
    }
}

/// Select the next dispatchable task of one project, or nothing.
pub fn pick<'a>(graph: &'a ResolvedGraph, ctx: &ScheduleContext<'_>) -> Option<&'a ResolvedTask> {
    if ctx.paused || !ctx.has_capacity() {
        return None;
    }
    if let Some(frac) = ctx.memory.available_fraction() {
        if frac < ctx.memory_threshold {
            return None;
        }
    }

    let mut candidates: Vec<&ResolvedTask> = graph
        .tasks
        .iter()
        .filter(|t| t.classification == Classification::Ready)
        .filter(|t| t.status() != EntryStatus::InProgress)
        .filter(|t| !ctx.running_ids.contains(t.id()))
        .filter(|t| feature_eligible(ctx.enabled_features, t.task.feature_id.as_deref()))
        .collect();

    candidates.sort_by(|a, b| {
        a.task
            .priority
            .cmp(&b.task.priority)
            .then_with(|| compare_created(a, b))
            .then_with(|| a.task.id.cmp(&b.task.id))
    });
    candidates.into_iter().next()
}

/// Earliest-created first; tasks without a timestamp sort last. RFC3339
/// strings compare lexicographically.
fn compare_created(a: &ResolvedTask, b: &ResolvedTask) -> std::cmp::Ordering {
    match (&a.task.created, &b.task.created) {
        (Some(x), Some(y)) => x.cmp(y),
        (Some(_), None) => std::cmp::Ordering::Less,
        (None, Some(_)) => std::cmp::Ordering::Greater,
        (None, None) => std::cmp::Ordering::Equal,
    }
}
