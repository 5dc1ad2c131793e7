//! Process supervisor: one child per running task.
//!
//! Owns the `pending → in_progress → {completed | blocked | cancelled}`
//! transition for every task it launches. Stdout and stderr are framed
//! line-by-line into the log stream; cancellation is soft first (SIGTERM)
//! and upgrades to SIGKILL after the grace period or on a second request.

use std::collections::{BTreeSet, HashMap};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{bail, Context, Result};
use regex::Regex;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{mpsc, oneshot};
use tracing::{error, info, warn};

use crate::entry_store::{EntryStore, EntryUpdate};
use crate::log_stream::{LogRecord, LogStream};
use crate::types::{EntryStatus, LogLevel, Outcome, ResolvedTask};

/// Supervisor tunables, resolved once from config.
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Agent CLI to spawn (e.g. `claude`).
    pub agent: String,
    pub model: Option<String>,
    pub task_timeout: Duration,
    pub cancel_grace: Duration,
    /// Fallback cwd when the task resolved none.
    pub default_workdir: Option<PathBuf>,
    /// Directory for per-task outcome files.
    pub outcome_dir: PathBuf,
}

/// Notification sent to the runner loop when a child finishes.
#[derive(Debug)]
pub struct TaskExit {
    pub task_id: String,
    pub project: String,
    pub path: String,
    pub outcome: Outcome,
    /// Set when the final status could not be persisted after a retry.
    pub write_back_error: Option<String>,
}

/// Book-keeping for one live child.
#[derive(Debug)]
struct RunningProcess {
    project: String,
    pid: u32,
    started_at: Instant,
    cancel_requested: bool,
    hard_killed: bool,
    waiters: Vec<oneshot::Sender<Outcome>>,
}

pub struct Supervisor {
    config: SupervisorConfig,
    store: Arc<EntryStore>,
    logs: Arc<LogStream>,
    running: Mutex<HashMap<String, RunningProcess>>,
    exit_tx: mpsc::UnboundedSender<TaskExit>,
}

impl Supervisor {
    pub fn new(
        config: SupervisorConfig,
        store: Arc<EntryStore>,
        logs: Arc<LogStream>,
    ) -> (Arc<Self>, mpsc::UnboundedReceiver<TaskExit>) {
        let (exit_tx, exit_rx) = mpsc::unbounded_channel();
        let supervisor = Arc::new(Self {
            config,
            store,
            logs,
            running: Mutex::new(HashMap::new()),
            exit_tx,
        });
        (supervisor, exit_rx)
    }

    /// Snapshot of currently running task ids.
    pub fn running_ids(&self) -> BTreeSet<String> {
        self.running
            .lock()
            .map(|map| map.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Running count for one project.
    pub fn running_in(&self, project: &str) -> usize {
        self.running
            .lock()
            .map(|map| map.values().filter(|p| p.project == project).count())
            .unwrap_or(0)
    }

    pub fn running_total(&self) -> usize {
        self.running.lock().map(|map| map.len()).unwrap_or(0)
    }

    /// Wait for a running task's outcome. `None` if the task is not running.
    pub fn await_task(&self, task_id: &str) -> Option<oneshot::Receiver<Outcome>> {
        let mut map = self.running.lock().ok()?;
        let process = map.get_mut(task_id)?;
        let (tx, rx) = oneshot::channel();
        process.waiters.push(tx);
        Some(rx)
    }

    /// Launch a task. Returns once the child has been accepted, not when it
    /// exits. Persists `in_progress` before spawning; a spawn failure rolls
    /// the status back to `pending`.
    pub async fn launch(self: &Arc<Self>, task: &ResolvedTask) -> Result<()> {
        let task_id = task.id().to_string();
        let project = task.task.project.clone();
        let path = task.task.path.clone();

        if self.running.lock().map(|m| m.contains_key(&task_id)).unwrap_or(false) {
            bail!("task {task_id} is already running");
        }

        // Re-read the entry: if the status moved out from under us between
        // resolve and dispatch, abort and let the next tick reconcile.
        let current = self.store.get(&project, &path).await?;
        if !matches!(current.status, EntryStatus::Pending | EntryStatus::Active) {
            bail!(
                "status of {task_id} changed to {} during launch",
                current.status
            );
        }

        let cwd = task
            .resolved_workdir
            .clone()
            .or_else(|| self.config.default_workdir.clone())
            .context("no workdir resolved and no default configured")?;

        self.store
            .update_status(&path, EntryStatus::InProgress)
            .await
            .context("failed to persist in_progress")?;

        std::fs::create_dir_all(&self.config.outcome_dir).ok();
        let outcome_file = self.config.outcome_dir.join(format!("{task_id}.outcome"));
        let _ = std::fs::remove_file(&outcome_file);

        let mut command = tokio::process::Command::new(&self.config.agent);
        command
            .arg(&path)
            .current_dir(&cwd)
            .env("BRAIN_TASK_ID", &task_id)
            .env("BRAIN_TASK_PATH", &path)
            .env("BRAIN_PROJECT", &project)
            .env("BRAIN_OUTCOME_FILE", &outcome_file)
            .stdin(std::process::Stdio::null())
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true);
        if let Some(ref model) = self.config.model {
            command.arg("--model").arg(model);
        }

        let mut child = match command.spawn() {
            Ok(child) => child,
            Err(e) => {
                // Roll back so the task stays eligible.
                if let Err(rollback) = self.store.update_status(&path, EntryStatus::Pending).await {
                    warn!(task_id = %task_id, "Rollback to pending failed: {rollback}");
                }
                self.logs.error(&project, format!("Failed to spawn agent for {task_id}: {e}"));
                return Err(e).context(format!("spawning agent '{}'", self.config.agent));
            }
        };

        let pid = child.id().context("spawned child has no pid")?;
        info!(task_id = %task_id, pid, cwd = %cwd.display(), "Agent launched");
        self.logs.publish(
            LogRecord::new(LogLevel::Info, format!("Agent launched (pid {pid})"))
                .with_task(&task_id)
                .with_project(&project),
        );

        if let Ok(mut map) = self.running.lock() {
            map.insert(
                task_id.clone(),
                RunningProcess {
                    project: project.clone(),
                    pid,
                    started_at: Instant::now(),
                    cancel_requested: false,
                    hard_killed: false,
                    waiters: Vec::new(),
                },
            );
        }

        // Stdio pumps: one per stream, preserving per-stream emission order.
        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let pump_out = stdout.map(|stream| {
            tokio::spawn(pump_lines(
                stream,
                LogLevel::Info,
                task_id.clone(),
                project.clone(),
                self.logs.clone(),
            ))
        });
        let pump_err = stderr.map(|stream| {
            tokio::spawn(pump_lines(
                stream,
                LogLevel::Warn,
                task_id.clone(),
                project.clone(),
                self.logs.clone(),
            ))
        });

        let supervisor = Arc::clone(self);
        tokio::spawn(async move {
            supervisor
                .monitor(task_id, project, path, child, outcome_file, pump_out, pump_err)
                .await;
        });

        Ok(())
    }

    /// Request cancellation. Idempotent; the first call sends SIGTERM and
    /// arms the grace timer, a second call before expiry hard-kills.
    pub fn cancel(self: &Arc<Self>, task_id: &str) {
        let (pid, escalate) = {
            let Ok(mut map) = self.running.lock() else { return };
            let Some(process) = map.get_mut(task_id) else {
                return; // not running: no-op
            };
            if process.hard_killed {
                return;
            }
            if process.cancel_requested {
                process.hard_killed = true;
                (process.pid, true)
            } else {
                process.cancel_requested = true;
                (process.pid, false)
            }
        };

        if escalate {
            warn!(task_id = %task_id, "Cancellation escalated to SIGKILL");
            signal(pid, libc::SIGKILL);
            return;
        }

        info!(task_id = %task_id, "Cancellation requested (SIGTERM)");
        signal(pid, libc::SIGTERM);

        // Grace timer: hard-kill if the process outlives the grace period.
        let supervisor = Arc::clone(self);
        let task_id = task_id.to_string();
        let grace = self.config.cancel_grace;
        tokio::spawn(async move {
            tokio::time::sleep(grace).await;
            let pid = {
                let Ok(mut map) = supervisor.running.lock() else { return };
                let Some(process) = map.get_mut(&task_id) else { return };
                if process.hard_killed {
                    return;
                }
                process.hard_killed = true;
                process.pid
            };
            warn!(task_id = %task_id, "Grace expired, sending SIGKILL");
            signal(pid, libc::SIGKILL);
        });
    }

    #[allow(clippy::too_many_arguments)]
    async fn monitor(
        self: Arc<Self>,
        task_id: String,
        project: String,
        path: String,
        mut child: tokio::process::Child,
        outcome_file: PathBuf,
        pump_out: Option<tokio::task::JoinHandle<()>>,
        pump_err: Option<tokio::task::JoinHandle<()>>,
    ) {
        let timed_out;
        let exit_status = match tokio::time::timeout(self.config.task_timeout, child.wait()).await
        {
            Ok(status) => {
                timed_out = false;
                status.ok()
            }
            Err(_) => {
                warn!(task_id = %task_id, "Task deadline elapsed, killing agent");
                timed_out = true;
                let _ = child.kill().await;
                child.wait().await.ok()
            }
        };

        // Drain remaining output before reporting the exit.
        if let Some(handle) = pump_out {
            let _ = handle.await;
        }
        if let Some(handle) = pump_err {
            let _ = handle.await;
        }

        let (cancel_requested, started_at) = {
            let map = self.running.lock().ok();
            map.as_ref()
                .and_then(|m| m.get(&task_id))
                .map(|p| (p.cancel_requested, p.started_at))
                .unwrap_or((false, Instant::now()))
        };

        let outcome = derive_outcome(
            exit_status,
            timed_out,
            cancel_requested,
            read_outcome_file(&outcome_file).as_deref(),
        );
        let elapsed = started_at.elapsed().as_secs();
        let _ = std::fs::remove_file(&outcome_file);

        let summary = match &outcome {
            Outcome::Completed => format!("Runner outcome: completed ({elapsed}s)"),
            Outcome::Blocked { reason } => format!("Runner outcome: blocked: {reason} ({elapsed}s)"),
            Outcome::Cancelled => format!("Runner outcome: cancelled ({elapsed}s)"),
        };
        self.logs.publish(
            LogRecord::new(
                match outcome {
                    Outcome::Completed => LogLevel::Info,
                    _ => LogLevel::Warn,
                },
                summary.clone(),
            )
            .with_task(&task_id)
            .with_project(&project),
        );

        let write_back_error = self.write_back(&path, &outcome, &summary).await;

        let waiters = {
            let mut map = self.running.lock().ok();
            map.as_mut()
                .and_then(|m| m.remove(&task_id))
                .map(|p| p.waiters)
                .unwrap_or_default()
        };
        for waiter in waiters {
            let _ = waiter.send(outcome.clone());
        }

        let _ = self.exit_tx.send(TaskExit {
            task_id,
            project,
            path,
            outcome,
            write_back_error,
        });
    }

    /// Persist the final status plus an outcome note, retrying once. On the
    /// second failure the process stays considered complete and the error
    /// surfaces at runner level.
    async fn write_back(&self, path: &str, outcome: &Outcome, note: &str) -> Option<String> {
        let update = EntryUpdate {
            status: Some(outcome.status()),
            note: Some(note.to_string()),
            ..Default::default()
        };
        for attempt in 0..2 {
            match self.store.update(path, &update).await {
                Ok(()) => return None,
                Err(e) if attempt == 0 => {
                    warn!(path = %path, "Status write-back failed, retrying: {e}");
                }
                Err(e) => {
                    error!(path = %path, "Status write-back failed twice: {e}");
                    return Some(e.to_string());
                }
            }
        }
        None
    }
}

/// Read one stream line-by-line into the log broadcast.
async fn pump_lines<R>(
    stream: R,
    level: LogLevel,
    task_id: String,
    project: String,
    logs: Arc<LogStream>,
) where
    R: tokio::io::AsyncRead + Unpin,
{
    let mut lines = BufReader::new(stream).lines();
    while let Ok(Some(line)) = lines.next_line().await {
        logs.publish(
            LogRecord::new(level, line)
                .with_task(&task_id)
                .with_project(&project),
        );
    }
}

fn signal(pid: u32, sig: i32) {
    unsafe {
        libc::kill(pid as i32, sig);
    }
}

fn read_outcome_file(path: &PathBuf) -> Option<String> {
    std::fs::read_to_string(path).ok()
}

/// Recognise the agent's "blocked" sentinel in its outcome file. Accepts
/// `STATUS: BLOCKED`, markdown-ish variants, and an optional reason after a
/// dash or colon.
pub fn parse_blocked_sentinel(content: &str) -> Option<String> {
    let pattern = Regex::new(
        r"(?m)^\s*(?:[-*]\s*)?(?:STATUS|Status|status)\s*:\s*`?BLOCKED`?\s*(?:[-—:]\s*(?P<reason>.+?))?\s*$",
    )
    .expect("sentinel regex is valid");
    let caps = pattern.captures(content)?;
    Some(
        caps.name("reason")
            .map(|m| m.as_str().trim().to_string())
            .filter(|s| !s.is_empty())
            .unwrap_or_else(|| "agent reported blocked".to_string()),
    )
}

fn derive_outcome(
    exit_status: Option<std::process::ExitStatus>,
    timed_out: bool,
    cancel_requested: bool,
    outcome_content: Option<&str>,
) -> Outcome {
    if cancel_requested {
        return Outcome::Cancelled;
    }
    if timed_out {
        return Outcome::Blocked {
            reason: "timeout".to_string(),
        };
    }
    if let Some(content) = outcome_content {
        if let Some(reason) = parse_blocked_sentinel(content) {
            return Outcome::Blocked { reason };
        }
    }
    match exit_status {
        Some(status) if status.success() => Outcome::Completed,
        Some(status) => match status.code() {
            Some(code) => Outcome::Blocked {
                reason: format!("exit code {code}"),
            },
            None => Outcome::Blocked {
                reason: "terminated by signal".to_string(),
            },
        },
        None => Outcome::Blocked {
            reason: "agent process lost".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::local_store::fixtures::write_task;
    use crate::local_store::LocalStore;
    use crate::resolver::{resolve, ResolveOptions};
    use crate::types::Priority;

    fn write_agent(dir: &std::path::Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        std::fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    struct Harness {
        _tmp: tempfile::TempDir,
        base: PathBuf,
        store: Arc<EntryStore>,
        logs: Arc<LogStream>,
    }

    impl Harness {
        fn new() -> Self {
            let tmp = tempfile::tempdir().unwrap();
            let base = tmp.path().to_path_buf();
            let store = Arc::new(EntryStore::Local(LocalStore::new(base.clone())));
            let logs = Arc::new(LogStream::new(None, 64, 100));
            Self {
                _tmp: tmp,
                base,
                store,
                logs,
            }
        }

        fn supervisor(
            &self,
            agent: PathBuf,
            timeout: Duration,
            grace: Duration,
        ) -> (Arc<Supervisor>, mpsc::UnboundedReceiver<TaskExit>) {
            Supervisor::new(
                SupervisorConfig {
                    agent: agent.to_string_lossy().to_string(),
                    model: None,
                    task_timeout: timeout,
                    cancel_grace: grace,
                    default_workdir: Some(self.base.clone()),
                    outcome_dir: self.base.join("outcomes"),
                },
                self.store.clone(),
                self.logs.clone(),
            )
        }

        fn resolved(&self, id: &str) -> ResolvedTask {
            write_task(
                &self.base,
                "demo",
                id,
                EntryStatus::Pending,
                Priority::Medium,
                &[],
                None,
                None,
            );
            let tasks = match self.store.as_ref() {
                EntryStore::Local(store) => store.list("demo").unwrap(),
                _ => unreachable!(),
            };
            let graph = resolve(
                &tasks,
                &ResolveOptions {
                    home: self.base.clone(),
                    default_workdir: Some(self.base.clone()),
                },
            );
            graph.get(id).unwrap().clone()
        }

        async fn status_of(&self, id: &str) -> EntryStatus {
            self.store
                .get("demo", &format!("projects/demo/task/{id}.md"))
                .await
                .unwrap()
                .status
        }
    }

    #[tokio::test]
    async fn test_exit_zero_completes_task() {
        let harness = Harness::new();
        let agent = write_agent(&harness.base, "ok.sh", "exit 0");
        let (supervisor, mut exits) =
            harness.supervisor(agent, Duration::from_secs(30), Duration::from_secs(30));
        let task = harness.resolved("a1b2c3d4");

        supervisor.launch(&task).await.unwrap();
        assert!(supervisor.running_ids().contains("a1b2c3d4"));

        let exit = exits.recv().await.unwrap();
        assert_eq!(exit.outcome, Outcome::Completed);
        assert!(exit.write_back_error.is_none());
        assert_eq!(harness.status_of("a1b2c3d4").await, EntryStatus::Completed);
        assert!(supervisor.running_ids().is_empty());

        // Outcome note persisted.
        let persisted = harness
            .store
            .get("demo", &exit.path)
            .await
            .unwrap();
        assert!(persisted.content.contains("Runner outcome: completed"));
    }

    #[tokio::test]
    async fn test_nonzero_exit_blocks_with_code() {
        let harness = Harness::new();
        let agent = write_agent(&harness.base, "fail.sh", "exit 3");
        let (supervisor, mut exits) =
            harness.supervisor(agent, Duration::from_secs(30), Duration::from_secs(30));
        let task = harness.resolved("a1b2c3d4");

        supervisor.launch(&task).await.unwrap();
        let exit = exits.recv().await.unwrap();
        assert_eq!(
            exit.outcome,
            Outcome::Blocked {
                reason: "exit code 3".to_string()
            }
        );
        assert_eq!(harness.status_of("a1b2c3d4").await, EntryStatus::Blocked);
    }

    #[tokio::test]
    async fn test_blocked_sentinel_in_outcome_file() {
        let harness = Harness::new();
        let agent = write_agent(
            &harness.base,
            "blocked.sh",
            "echo 'STATUS: BLOCKED - missing credentials' > \"$BRAIN_OUTCOME_FILE\"\nexit 0",
        );
        let (supervisor, mut exits) =
            harness.supervisor(agent, Duration::from_secs(30), Duration::from_secs(30));
        let task = harness.resolved("a1b2c3d4");

        supervisor.launch(&task).await.unwrap();
        let exit = exits.recv().await.unwrap();
        assert_eq!(
            exit.outcome,
            Outcome::Blocked {
                reason: "missing credentials".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_cancel_soft_then_status_cancelled() {
        let harness = Harness::new();
        let agent = write_agent(&harness.base, "slow.sh", "sleep 30");
        let (supervisor, mut exits) =
            harness.supervisor(agent, Duration::from_secs(60), Duration::from_secs(5));
        let task = harness.resolved("a1b2c3d4");

        supervisor.launch(&task).await.unwrap();
        supervisor.cancel("a1b2c3d4");
        // Idempotent second call on top of the first.
        supervisor.cancel("a1b2c3d4");

        let exit = tokio::time::timeout(Duration::from_secs(10), exits.recv())
            .await
            .expect("cancellation should settle within grace")
            .unwrap();
        assert_eq!(exit.outcome, Outcome::Cancelled);
        assert_eq!(harness.status_of("a1b2c3d4").await, EntryStatus::Cancelled);

        // After exit, cancelling again is a no-op.
        supervisor.cancel("a1b2c3d4");
    }

    #[tokio::test]
    async fn test_timeout_blocks_with_reason() {
        let harness = Harness::new();
        let agent = write_agent(&harness.base, "slow.sh", "sleep 30");
        let (supervisor, mut exits) =
            harness.supervisor(agent, Duration::from_millis(200), Duration::from_secs(5));
        let task = harness.resolved("a1b2c3d4");

        supervisor.launch(&task).await.unwrap();
        let exit = tokio::time::timeout(Duration::from_secs(10), exits.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            exit.outcome,
            Outcome::Blocked {
                reason: "timeout".to_string()
            }
        );
    }

    #[tokio::test]
    async fn test_launch_aborts_on_status_conflict() {
        let harness = Harness::new();
        let agent = write_agent(&harness.base, "ok.sh", "exit 0");
        let (supervisor, _exits) =
            harness.supervisor(agent, Duration::from_secs(30), Duration::from_secs(30));
        let task = harness.resolved("a1b2c3d4");

        // Another writer completed the task between resolve and dispatch.
        harness
            .store
            .update_status(&task.task.path, EntryStatus::Completed)
            .await
            .unwrap();

        assert!(supervisor.launch(&task).await.is_err());
        assert!(supervisor.running_ids().is_empty());
        assert_eq!(harness.status_of("a1b2c3d4").await, EntryStatus::Completed);
    }

    #[tokio::test]
    async fn test_spawn_failure_rolls_back_to_pending() {
        let harness = Harness::new();
        let missing = harness.base.join("no-such-agent");
        let (supervisor, _exits) =
            harness.supervisor(missing, Duration::from_secs(30), Duration::from_secs(30));
        let task = harness.resolved("a1b2c3d4");

        assert!(supervisor.launch(&task).await.is_err());
        assert_eq!(harness.status_of("a1b2c3d4").await, EntryStatus::Pending);
    }

    #[tokio::test]
    async fn test_stdout_order_preserved() {
        let harness = Harness::new();
        let agent = write_agent(
            &harness.base,
            "talker.sh",
            "for i in 1 2 3 4 5; do echo \"line $i\"; done",
        );
        let (supervisor, mut exits) =
            harness.supervisor(agent, Duration::from_secs(30), Duration::from_secs(30));
        let mut sub = harness.logs.subscribe();
        let task = harness.resolved("a1b2c3d4");

        supervisor.launch(&task).await.unwrap();
        exits.recv().await.unwrap();

        let mut seen = Vec::new();
        while let Some(record) = sub.try_recv() {
            if record.message.starts_with("line ") {
                seen.push(record.message);
            }
        }
        assert_eq!(seen, vec!["line 1", "line 2", "line 3", "line 4", "line 5"]);
    }

    #[tokio::test]
    async fn test_await_task_resolves_with_outcome() {
        let harness = Harness::new();
        let agent = write_agent(&harness.base, "ok.sh", "sleep 0.2; exit 0");
        let (supervisor, _exits) =
            harness.supervisor(agent, Duration::from_secs(30), Duration::from_secs(30));
        let task = harness.resolved("a1b2c3d4");

        supervisor.launch(&task).await.unwrap();
        let rx = supervisor.await_task("a1b2c3d4").expect("task is running");
        let outcome = rx.await.unwrap();
        assert_eq!(outcome, Outcome::Completed);
        assert!(supervisor.await_task("a1b2c3d4").is_none());
    }

    #[test]
    fn test_parse_blocked_sentinel_variants() {
        assert_eq!(
            parse_blocked_sentinel("STATUS: BLOCKED - waiting on API keys\n").as_deref(),
            Some("waiting on API keys")
        );
        assert_eq!(
            parse_blocked_sentinel("- Status: `BLOCKED`\n").as_deref(),
            Some("agent reported blocked")
        );
        assert_eq!(
            parse_blocked_sentinel("status: BLOCKED: upstream dep\n").as_deref(),
            Some("upstream dep")
        );
        assert!(parse_blocked_sentinel("STATUS: COMPLETE\n").is_none());
        assert!(parse_blocked_sentinel("all good\n").is_none());
    }

    #[test]
    fn test_derive_outcome_precedence() {
        use std::os::unix::process::ExitStatusExt;
        let ok = std::process::ExitStatus::from_raw(0);
        // Cancellation wins over everything.
        assert_eq!(derive_outcome(Some(ok), true, true, None), Outcome::Cancelled);
        // Timeout beats the sentinel.
        assert_eq!(
            derive_outcome(Some(ok), true, false, Some("STATUS: BLOCKED")),
            Outcome::Blocked {
                reason: "timeout".to_string()
            }
        );
        // Sentinel beats exit 0.
        assert!(matches!(
            derive_outcome(Some(ok), false, false, Some("STATUS: BLOCKED - x")),
            Outcome::Blocked { .. }
        ));
        assert_eq!(derive_outcome(Some(ok), false, false, None), Outcome::Completed);
    }
}
