//! Runner loop: polls each configured project, resolves, dispatches, and
//! serves the control channel that steers it.
//!
//! The loop is logically single-threaded: it owns all `ProjectState` and
//! mutates it only from its own task. Commands arriving between ticks are
//! applied synchronously; their effects show up in the next published
//! snapshot. The loop never blocks on the store: every poll is bounded by
//! a timeout and an abandoned poll retries next cycle.

use std::collections::{BTreeSet, HashSet};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, oneshot, watch};
use tracing::{info, warn};

use crate::entry_store::{EntryStore, StoreError};
use crate::log_stream::LogStream;
use crate::memory::MemoryProvider;
use crate::resolver::{resolve, ResolveOptions};
use crate::scheduler::{feature_eligible, pick, ScheduleContext};
use crate::supervisor::{Supervisor, TaskExit};
use crate::types::{
    Classification, EntryStatus, ProjectSnapshot, ResolvedGraph, ResourceMetrics, RunnerConfig,
    RunnerSnapshot,
};

/// Control commands the TUI (or CLI) sends to the loop. One tagged variant
/// per steering action; all fire-and-forget except where a reply channel is
/// attached.
#[derive(Debug)]
pub enum RunnerCommand {
    /// Force an out-of-band poll.
    Refresh,
    Pause(String),
    Resume(String),
    PauseAll,
    ResumeAll,
    EnableFeature { project: String, feature: String },
    DisableFeature { project: String, feature: String },
    /// Try to launch now, bypassing the feature filter but honouring
    /// pause, capacity, and the memory guard.
    ExecuteTask {
        task_id: String,
        reply: Option<oneshot::Sender<Result<(), String>>>,
    },
    CancelTask { task_id: String },
    UpdateStatus {
        task_id: String,
        path: String,
        status: EntryStatus,
    },
    SetProjectLimit { project: String, limit: Option<usize> },
    Shutdown,
}

/// Handle given to the TUI and CLI: a command sender plus the snapshot
/// watch.
#[derive(Clone)]
pub struct RunnerHandle {
    pub commands: mpsc::UnboundedSender<RunnerCommand>,
    pub snapshots: watch::Receiver<RunnerSnapshot>,
}

/// Per-project state owned by the loop.
struct ProjectState {
    name: String,
    paused: bool,
    /// Read-only pause signal from a blocked root entry (legacy clients).
    legacy_paused: bool,
    limit: Option<usize>,
    enabled_features: BTreeSet<String>,
    last_graph: Option<ResolvedGraph>,
    last_poll_at: Option<String>,
    last_error: Option<String>,
    /// `in_progress` orphans observed once; reconciled on second sighting.
    recovering: HashSet<String>,
}

impl ProjectState {
    fn new(name: String, limit: Option<usize>) -> Self {
        Self {
            name,
            paused: false,
            legacy_paused: false,
            limit,
            enabled_features: BTreeSet::new(),
            last_graph: None,
            last_poll_at: None,
            last_error: None,
            recovering: HashSet::new(),
        }
    }

    fn effectively_paused(&self) -> bool {
        self.paused || self.legacy_paused
    }
}

pub struct Runner {
    config: RunnerConfig,
    store: Arc<EntryStore>,
    supervisor: Arc<Supervisor>,
    logs: Arc<LogStream>,
    memory: Arc<dyn MemoryProvider>,
    resolve_opts: ResolveOptions,
    projects: Vec<ProjectState>,
    runner_id: String,
    dry_run: bool,
    global_error: Option<String>,
    tick: u64,
    snapshot_tx: watch::Sender<RunnerSnapshot>,
    cmd_rx: mpsc::UnboundedReceiver<RunnerCommand>,
    exit_rx: mpsc::UnboundedReceiver<TaskExit>,
}

impl Runner {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: RunnerConfig,
        store: Arc<EntryStore>,
        supervisor: Arc<Supervisor>,
        exit_rx: mpsc::UnboundedReceiver<TaskExit>,
        logs: Arc<LogStream>,
        memory: Arc<dyn MemoryProvider>,
        resolve_opts: ResolveOptions,
        dry_run: bool,
    ) -> (Self, RunnerHandle) {
        let (cmd_tx, cmd_rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(RunnerSnapshot::default());
        let projects = config
            .projects
            .iter()
            .map(|p| ProjectState::new(p.name.clone(), p.limit))
            .collect();
        let runner = Self {
            config,
            store,
            supervisor,
            logs,
            memory,
            resolve_opts,
            projects,
            runner_id: uuid::Uuid::new_v4().to_string(),
            dry_run,
            global_error: None,
            tick: 0,
            snapshot_tx,
            cmd_rx,
            exit_rx,
        };
        let handle = RunnerHandle {
            commands: cmd_tx,
            snapshots: snapshot_rx,
        };
        (runner, handle)
    }

    /// Drive the loop until shutdown.
    pub async fn run(mut self) {
        let mut interval = tokio::time::interval(Duration::from_secs(
            self.config.poll_interval_secs.max(1),
        ));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    self.tick_once().await;
                }
                Some(command) = self.cmd_rx.recv() => {
                    if matches!(command, RunnerCommand::Shutdown) {
                        info!("Runner shutting down");
                        break;
                    }
                    self.apply(command).await;
                    self.publish();
                }
                Some(exit) = self.exit_rx.recv() => {
                    self.on_exit(exit).await;
                    self.publish();
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Interrupt received, runner shutting down");
                    break;
                }
            }
        }
    }

    /// One full poll-resolve-dispatch pass over every project.
    async fn tick_once(&mut self) {
        self.tick += 1;
        for idx in 0..self.projects.len() {
            self.poll_project(idx).await;
            self.dispatch_project(idx).await;
        }
        self.publish();
    }

    async fn poll_project(&mut self, idx: usize) {
        let project = self.projects[idx].name.clone();
        let poll_timeout = Duration::from_secs(self.config.store_timeout_secs.max(1));

        let listed = tokio::time::timeout(poll_timeout, self.store.list(&project)).await;
        let tasks = match listed {
            Ok(Ok(tasks)) => tasks,
            Ok(Err(e)) => {
                // Transient: retain the last known graph and retry next tick.
                if e.is_transient() {
                    warn!(project = %project, "Poll failed (transient): {e}");
                } else {
                    warn!(project = %project, "Poll failed: {e}");
                }
                self.projects[idx].last_error = Some(e.to_string());
                return;
            }
            Err(_) => {
                warn!(project = %project, "Poll timed out, abandoning tick for this project");
                self.projects[idx].last_error = Some("store timeout".to_string());
                return;
            }
        };

        // Legacy pause marker: a blocked root entry pauses the project.
        let legacy_paused = tasks
            .iter()
            .any(|t| t.is_project_root() && t.status == EntryStatus::Blocked);

        let filtered: Vec<_> = tasks
            .into_iter()
            .filter(|t| !t.is_project_root())
            .filter(|t| !self.config.exclude.iter().any(|pat| t.path.contains(pat.as_str())))
            .collect();

        let graph = resolve(&filtered, &self.resolve_opts);

        self.reconcile_orphans(idx, &graph).await;
        self.cancel_manually_terminated(&graph);
        self.auto_exit_focus(idx, &graph);

        let state = &mut self.projects[idx];
        state.legacy_paused = legacy_paused;
        state.last_graph = Some(graph);
        state.last_poll_at =
            Some(chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true));
        state.last_error = None;
    }

    /// Crash recovery: a task persisted as `in_progress` with no live child
    /// is reset to `pending` after one full tick of observation.
    async fn reconcile_orphans(&mut self, idx: usize, graph: &ResolvedGraph) {
        if !self.config.resume {
            return;
        }
        let running = self.supervisor.running_ids();
        let orphans: Vec<(String, String)> = graph
            .tasks
            .iter()
            .filter(|t| t.status() == EntryStatus::InProgress && !running.contains(t.id()))
            .map(|t| (t.id().to_string(), t.task.path.clone()))
            .collect();

        let project = self.projects[idx].name.clone();
        let mut seen: HashSet<String> = HashSet::new();
        for (task_id, path) in orphans {
            seen.insert(task_id.clone());
            if self.projects[idx].recovering.contains(&task_id) {
                info!(project = %project, task_id = %task_id, "Reconciling orphaned in_progress task to pending");
                if let Err(e) = self.store.update_status(&path, EntryStatus::Pending).await {
                    warn!(task_id = %task_id, "Orphan reconciliation failed: {e}");
                } else {
                    self.logs.warn(
                        &project,
                        format!("Recovered orphaned task {task_id} to pending"),
                    );
                }
                self.projects[idx].recovering.remove(&task_id);
            } else {
                self.projects[idx].recovering.insert(task_id);
            }
        }
        self.projects[idx].recovering.retain(|id| seen.contains(id));
    }

    /// A user writing a terminal status onto a running task counts as a
    /// cancellation request for the in-flight process.
    fn cancel_manually_terminated(&self, graph: &ResolvedGraph) {
        let running = self.supervisor.running_ids();
        for task in &graph.tasks {
            if running.contains(task.id())
                && task.status().is_terminal()
                && task.status() != EntryStatus::Cancelled
            {
                info!(task_id = task.id(), "Terminal status set externally, cancelling process");
                self.supervisor.cancel(task.id());
            }
        }
    }

    /// Focus auto-exit: once no live task remains in the focused feature
    /// set, the whitelist is cleared.
    fn auto_exit_focus(&mut self, idx: usize, graph: &ResolvedGraph) {
        let state = &mut self.projects[idx];
        if state.enabled_features.is_empty() {
            return;
        }
        let any_live = graph.tasks.iter().any(|t| {
            feature_eligible(&state.enabled_features, t.task.feature_id.as_deref())
                && matches!(
                    t.status(),
                    EntryStatus::Pending | EntryStatus::Active | EntryStatus::InProgress
                )
        });
        if !any_live {
            info!(project = %state.name, "Focus complete, clearing feature whitelist");
            self.logs
                .info(&state.name, "Focus complete, all feature tasks settled");
            state.enabled_features.clear();
        }
    }

    /// At most one dispatch per project per tick keeps the loop responsive.
    async fn dispatch_project(&mut self, idx: usize) {
        let state = &self.projects[idx];
        let Some(ref graph) = state.last_graph else {
            return;
        };

        let project = state.name.clone();
        let running_ids = self.supervisor.running_ids();
        let ctx = ScheduleContext {
            paused: state.effectively_paused(),
            enabled_features: &state.enabled_features,
            project_limit: state.limit.unwrap_or(self.config.max_parallel),
            global_cap: self.config.max_parallel,
            project_running: self.supervisor.running_in(&project),
            total_running: self.supervisor.running_total(),
            running_ids: &running_ids,
            memory: self.memory.as_ref(),
            memory_threshold: f64::from(self.config.memory_threshold_pct) / 100.0,
        };

        let Some(chosen) = pick(graph, &ctx) else {
            return;
        };
        let chosen = chosen.clone();

        if self.dry_run {
            self.logs.info(
                &project,
                format!("[dry-run] would dispatch {} ({})", chosen.id(), chosen.task.title),
            );
            return;
        }

        if self.config.claim_tasks {
            match self.store.claim(&project, chosen.id(), &self.runner_id).await {
                Ok(()) => {}
                Err(StoreError::Claimed { claimed_by }) => {
                    info!(task_id = chosen.id(), claimed_by = %claimed_by, "Task claimed by peer, skipping");
                    return;
                }
                Err(e) => {
                    warn!(task_id = chosen.id(), "Claim failed: {e}");
                    self.projects[idx].last_error = Some(e.to_string());
                    return;
                }
            }
        }

        if let Err(e) = self.supervisor.launch(&chosen).await {
            warn!(task_id = chosen.id(), "Launch failed: {e}");
            self.logs
                .error(&project, format!("Launch of {} failed: {e}", chosen.id()));
            self.projects[idx].last_error = Some(e.to_string());
        }
    }

    async fn on_exit(&mut self, exit: TaskExit) {
        info!(
            task_id = exit.task_id,
            outcome = ?exit.outcome,
            "Task settled"
        );
        if let Some(ref err) = exit.write_back_error {
            self.global_error = Some(format!(
                "status write-back failed for {}: {err}",
                exit.task_id
            ));
        }
        if self.config.claim_tasks {
            if let Err(e) = self
                .store
                .release(&exit.project, &exit.task_id, &self.runner_id)
                .await
            {
                warn!(task_id = %exit.task_id, "Release failed: {e}");
            }
        }
    }

    /// Apply a control command. Commands re-derive the running set because
    /// they can arrive between ticks.
    async fn apply(&mut self, command: RunnerCommand) {
        match command {
            RunnerCommand::Refresh => self.tick_once().await,
            RunnerCommand::Pause(project) => {
                if let Some(state) = self.project_mut(&project) {
                    state.paused = true;
                }
            }
            RunnerCommand::Resume(project) => {
                if let Some(state) = self.project_mut(&project) {
                    state.paused = false;
                }
            }
            RunnerCommand::PauseAll => {
                for state in &mut self.projects {
                    state.paused = true;
                }
            }
            RunnerCommand::ResumeAll => {
                for state in &mut self.projects {
                    state.paused = false;
                }
            }
            RunnerCommand::EnableFeature { project, feature } => {
                if let Some(state) = self.project_mut(&project) {
                    state.enabled_features.insert(feature);
                }
            }
            RunnerCommand::DisableFeature { project, feature } => {
                if let Some(state) = self.project_mut(&project) {
                    state.enabled_features.remove(&feature);
                }
            }
            RunnerCommand::SetProjectLimit { project, limit } => {
                if let Some(state) = self.project_mut(&project) {
                    state.limit = limit;
                }
            }
            RunnerCommand::CancelTask { task_id } => {
                self.supervisor.cancel(&task_id);
            }
            RunnerCommand::UpdateStatus {
                task_id,
                path,
                status,
            } => {
                if let Err(e) = self.store.update_status(&path, status).await {
                    warn!(task_id = %task_id, "Status update failed: {e}");
                    self.global_error = Some(format!("update {task_id}: {e}"));
                } else if status.is_terminal()
                    && self.supervisor.running_ids().contains(&task_id)
                {
                    self.supervisor.cancel(&task_id);
                }
            }
            RunnerCommand::ExecuteTask { task_id, reply } => {
                let result = self.execute_task(&task_id).await;
                if let Err(ref reason) = result {
                    info!(task_id = %task_id, "Manual execute refused: {reason}");
                }
                if let Some(reply) = reply {
                    let _ = reply.send(result);
                }
            }
            RunnerCommand::Shutdown => {}
        }
    }

    /// Manual execute: bypasses the feature whitelist, honours pause,
    /// capacity, and the memory guard.
    async fn execute_task(&mut self, task_id: &str) -> Result<(), String> {
        let located = self.projects.iter().enumerate().find_map(|(idx, state)| {
            state
                .last_graph
                .as_ref()
                .and_then(|g| g.get(task_id))
                .map(|t| (idx, t.clone()))
        });
        let Some((idx, task)) = located else {
            return Err(format!("unknown task {task_id}"));
        };

        let state = &self.projects[idx];
        if state.effectively_paused() {
            return Err("paused".to_string());
        }
        if task.classification != Classification::Ready
            || task.status() == EntryStatus::InProgress
        {
            return Err("not ready".to_string());
        }
        if self.supervisor.running_ids().contains(task_id) {
            return Err("already running".to_string());
        }

        let project_limit = state
            .limit
            .unwrap_or(self.config.max_parallel)
            .min(self.config.max_parallel);
        if self.supervisor.running_total() >= self.config.max_parallel
            || self.supervisor.running_in(&state.name) >= project_limit
        {
            return Err("at capacity".to_string());
        }
        if let Some(frac) = self.memory.available_fraction() {
            if frac < f64::from(self.config.memory_threshold_pct) / 100.0 {
                return Err("memory low".to_string());
            }
        }

        self.supervisor
            .launch(&task)
            .await
            .map_err(|e| e.to_string())
    }

    fn project_mut(&mut self, name: &str) -> Option<&mut ProjectState> {
        self.projects.iter_mut().find(|p| p.name == name)
    }

    fn publish(&self) {
        let running = self.supervisor.running_ids();
        let projects = self
            .projects
            .iter()
            .map(|state| {
                let tasks = state
                    .last_graph
                    .as_ref()
                    .map(|g| g.tasks.clone())
                    .unwrap_or_default();
                let stats = state.last_graph.as_ref().map(|g| g.stats).unwrap_or_default();
                let project_running: BTreeSet<String> = tasks
                    .iter()
                    .filter(|t| running.contains(t.id()))
                    .map(|t| t.id().to_string())
                    .collect();
                ProjectSnapshot {
                    project: state.name.clone(),
                    tasks,
                    stats,
                    paused: state.effectively_paused(),
                    enabled_features: state.enabled_features.clone(),
                    limit: state.limit,
                    running: project_running,
                    last_poll_at: state.last_poll_at.clone(),
                    last_error: state.last_error.clone(),
                }
            })
            .collect();

        let snapshot = RunnerSnapshot {
            projects,
            metrics: self.sample_metrics(),
            global_cap: self.config.max_parallel,
            total_running: self.supervisor.running_total(),
            last_error: self.global_error.clone(),
            dry_run: self.dry_run,
            tick: self.tick,
        };
        let _ = self.snapshot_tx.send(snapshot);
    }

    fn sample_metrics(&self) -> ResourceMetrics {
        ResourceMetrics {
            load_avg: load_average().unwrap_or(0.0),
            available_memory_frac: self.memory.available_fraction().unwrap_or(0.0),
            rss_mb: resident_memory_mb().unwrap_or(0),
            agent_count: self.supervisor.running_total(),
        }
    }
}

/// 1-minute load average via libc.
fn load_average() -> Option<f64> {
    let mut loads = [0f64; 3];
    let written = unsafe { libc::getloadavg(loads.as_mut_ptr(), 3) };
    if written >= 1 {
        Some(loads[0])
    } else {
        None
    }
}

/// Resident set size of this process in MB (Linux; elsewhere unknown).
fn resident_memory_mb() -> Option<u64> {
    #[cfg(target_os = "linux")]
    {
        let status = std::fs::read_to_string("/proc/self/status").ok()?;
        let kb: u64 = status.lines().find_map(|line| {
            line.strip_prefix("VmRSS:")?
                .split_whitespace()
                .next()?
                .parse()
                .ok()
        })?;
        Some(kb / 1024)
    }
    #[cfg(not(target_os = "linux"))]
    {
        None
    }
}
