//! Graph resolver: classifies every task of a project as ready, waiting,
//! blocked, or completed, given the entries on disk.
//!
//! Pure and deterministic for a given input. Anomalies (missing deps,
//! cycles, missing workdirs) become fields on the resolved task, never
//! errors.

use std::collections::{HashMap, HashSet};
use std::path::{Path, PathBuf};

use crate::types::{
    Classification, EdgeRef, EntryStatus, GraphStats, ResolvedGraph, ResolvedTask, Task,
};

/// Inputs the resolver needs besides the tasks themselves.
#[derive(Debug, Clone, Default)]
pub struct ResolveOptions {
    /// Home directory used to resolve `worktree`/`workdir`.
    pub home: PathBuf,
    /// Fallback workdir when a task names none that exists.
    pub default_workdir: Option<PathBuf>,
}

/// Resolve a project's tasks into a classified, ordered graph.
pub fn resolve(tasks: &[Task], opts: &ResolveOptions) -> ResolvedGraph {
    let index: HashMap<&str, &Task> = tasks.iter().map(|t| (t.id.as_str(), t)).collect();
    let in_cycle = detect_cycles(tasks, &index);

    let mut resolved: Vec<ResolvedTask> = tasks
        .iter()
        .map(|task| classify(task, &index, &in_cycle, opts))
        .collect();

    attach_edges(&mut resolved, tasks);

    resolved.sort_by(|a, b| {
        a.task
            .priority
            .cmp(&b.task.priority)
            .then(a.task.status.order().cmp(&b.task.status.order()))
            .then(a.task.id.cmp(&b.task.id))
    });

    let stats = compute_stats(&resolved);
    ResolvedGraph {
        tasks: resolved,
        stats,
    }
}

/// Three-colour DFS over `depends_on ∪ parent_id`, restricted to
/// non-terminal tasks (edges through satisfied work are inert). Returns the
/// set of task ids that sit on a cycle.
fn detect_cycles<'a>(tasks: &'a [Task], index: &HashMap<&'a str, &'a Task>) -> HashSet<String> {
    #[derive(Clone, Copy, PartialEq)]
    enum Colour {
        White,
        Grey,
        Black,
    }

    fn live(id: &str, index: &HashMap<&str, &Task>) -> bool {
        index
            .get(id)
            .map(|t| !t.status.is_terminal())
            .unwrap_or(false)
    }

    fn edges<'a>(id: &str, index: &HashMap<&'a str, &'a Task>) -> Vec<&'a str> {
        let Some(task) = index.get(id) else {
            return Vec::new();
        };
        let mut out: Vec<&str> = task
            .depends_on
            .iter()
            .map(|d| d.as_str())
            .filter(|d| live(d, index))
            .collect();
        if let Some(parent) = task.parent_id.as_deref() {
            // Self-parenting is an authoring error, surfaced as a cycle.
            if live(parent, index) || parent == id {
                out.push(parent);
            }
        }
        out
    }

    fn visit<'a>(
        id: &'a str,
        index: &HashMap<&'a str, &'a Task>,
        colour: &mut HashMap<&'a str, Colour>,
        path: &mut Vec<&'a str>,
        flagged: &mut HashSet<String>,
    ) {
        colour.insert(id, Colour::Grey);
        path.push(id);
        for next in edges(id, index) {
            match colour.get(next).copied() {
                Some(Colour::White) => visit(next, index, colour, path, flagged),
                Some(Colour::Grey) => {
                    // Back edge: everything from `next` to the top of the
                    // path is on the cycle.
                    let start = path.iter().position(|p| *p == next).unwrap_or(0);
                    for member in &path[start..] {
                        flagged.insert((*member).to_string());
                    }
                }
                _ => {}
            }
        }
        path.pop();
        colour.insert(id, Colour::Black);
    }

    let mut colour: HashMap<&str, Colour> = tasks
        .iter()
        .map(|t| (t.id.as_str(), Colour::White))
        .collect();
    let mut flagged: HashSet<String> = HashSet::new();

    for task in tasks.iter().filter(|t| !t.status.is_terminal()) {
        if colour.get(task.id.as_str()).copied() == Some(Colour::White) {
            let mut path = Vec::new();
            visit(task.id.as_str(), index, &mut colour, &mut path, &mut flagged);
        }
    }
    flagged
}

fn classify(
    task: &Task,
    index: &HashMap<&str, &Task>,
    in_cycle: &HashSet<String>,
    opts: &ResolveOptions,
) -> ResolvedTask {
    let mut out = ResolvedTask {
        task: task.clone(),
        classification: Classification::Waiting,
        blocked_by: Vec::new(),
        blocked_by_reason: None,
        waiting_on: Vec::new(),
        unresolved_deps: Vec::new(),
        in_cycle: false,
        resolved_workdir: None,
        dependencies: Vec::new(),
        dependents: Vec::new(),
        children: Vec::new(),
    };

    if task.status.is_terminal() {
        out.classification = Classification::Completed;
        return out;
    }

    if in_cycle.contains(&task.id) {
        out.in_cycle = true;
        out.classification = Classification::Blocked;
        out.blocked_by_reason = Some("cycle".to_string());
        return out;
    }

    // Examine dependencies. Missing ids are external and satisfied.
    for dep in &task.depends_on {
        match index.get(dep.as_str()) {
            None => out.unresolved_deps.push(dep.clone()),
            Some(dep_task) => match dep_task.status {
                EntryStatus::Blocked | EntryStatus::Cancelled => out.blocked_by.push(dep.clone()),
                status if status.is_terminal() => {}
                _ => out.waiting_on.push(dep.clone()),
            },
        }
    }

    if !out.blocked_by.is_empty() {
        out.classification = Classification::Blocked;
        return out;
    }
    if task.status == EntryStatus::Draft {
        out.classification = Classification::Waiting;
        return out;
    }
    if !out.waiting_on.is_empty() {
        out.classification = Classification::Waiting;
        return out;
    }
    if task.status == EntryStatus::Blocked {
        out.classification = Classification::Blocked;
        out.blocked_by_reason = Some("manually blocked".to_string());
        return out;
    }

    // pending / active / in_progress with all deps satisfied.
    out.classification = Classification::Ready;
    out.resolved_workdir = resolve_workdir(task, opts);
    if out.resolved_workdir.is_none() && !default_workdir_exists(opts) {
        out.classification = Classification::Blocked;
        out.blocked_by_reason = Some("workdir not found".to_string());
    }
    out
}

/// First existing of `worktree`, `workdir`, each joined against home.
fn resolve_workdir(task: &Task, opts: &ResolveOptions) -> Option<PathBuf> {
    for candidate in [task.worktree.as_deref(), task.workdir.as_deref()] {
        let Some(raw) = candidate else { continue };
        let path = join_home(&opts.home, raw);
        if path.is_dir() {
            return Some(path);
        }
    }
    None
}

fn default_workdir_exists(opts: &ResolveOptions) -> bool {
    opts.default_workdir
        .as_deref()
        .map(Path::is_dir)
        .unwrap_or(false)
}

/// Join a configured path against home: absolute paths pass through,
/// `~/`-prefixed and bare relative paths are home-relative.
pub fn join_home(home: &Path, raw: &str) -> PathBuf {
    let trimmed = raw.trim();
    if let Some(rest) = trimmed.strip_prefix("~/") {
        return home.join(rest);
    }
    let path = Path::new(trimmed);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        home.join(path)
    }
}

/// Materialise dependency/dependent/child edges with titles for display.
fn attach_edges(resolved: &mut [ResolvedTask], tasks: &[Task]) {
    let titles: HashMap<&str, &str> = tasks
        .iter()
        .map(|t| (t.id.as_str(), t.title.as_str()))
        .collect();
    let edge = |id: &str| EdgeRef {
        id: id.to_string(),
        title: titles.get(id).copied().unwrap_or_default().to_string(),
    };

    let mut dependents: HashMap<&str, Vec<&str>> = HashMap::new();
    let mut children: HashMap<&str, Vec<&str>> = HashMap::new();
    for task in tasks {
        for dep in &task.depends_on {
            if titles.contains_key(dep.as_str()) {
                dependents.entry(dep.as_str()).or_default().push(&task.id);
            }
        }
        if let Some(parent) = task.parent_id.as_deref() {
            if titles.contains_key(parent) {
                children.entry(parent).or_default().push(&task.id);
            }
        }
    }

    for item in resolved.iter_mut() {
        item.dependencies = item
            .task
            .depends_on
            .iter()
            .filter(|d| titles.contains_key(d.as_str()))
            .map(|d| edge(d))
            .collect();
        item.dependents = dependents
            .get(item.task.id.as_str())
            .map(|ids| ids.iter().map(|id| edge(id)).collect())
            .unwrap_or_default();
        item.children = children
            .get(item.task.id.as_str())
            .map(|ids| ids.iter().map(|id| edge(id)).collect())
            .unwrap_or_default();
    }
}

fn compute_stats(resolved: &[ResolvedTask]) -> GraphStats {
    let mut stats = GraphStats {
        total: resolved.len(),
        ..Default::default()
    };
    for task in resolved {
        match task.classification {
            Classification::Ready => stats.ready += 1,
            Classification::Waiting => stats.waiting += 1,
            Classification::Blocked => stats.blocked += 1,
            Classification::Completed => stats.completed += 1,
        }
        if task.task.status == EntryStatus::InProgress {
            stats.in_progress += 1;
        }
    }
    stats
}
