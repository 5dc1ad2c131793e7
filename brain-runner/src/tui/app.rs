//! TUI application state: the latest runner snapshot, a cursor over its
//! tasks, and the command sender that steers the loop. All mutations of
//! runner state go through commands; the app itself only renders snapshots.

use std::collections::VecDeque;
use std::time::Instant;

use tokio::sync::oneshot;

use crate::log_stream::LogRecord;
use crate::runner::{RunnerCommand, RunnerHandle};
use crate::scheduler::UNGROUPED;
use crate::types::{EntryStatus, ResolvedTask, RunnerSnapshot};

pub struct App {
    pub snapshot: RunnerSnapshot,
    commands: tokio::sync::mpsc::UnboundedSender<RunnerCommand>,
    pub selected: usize,
    pub show_legend: bool,
    pub show_logs: bool,
    pub should_quit: bool,
    pub start_time: Instant,
    pub recent_logs: VecDeque<LogRecord>,
    pub log_max: usize,
    /// Transient one-line message (e.g. a refused manual execute).
    pub notice: Option<String>,
    notice_ttl: u8,
    pending_execute: Option<(String, oneshot::Receiver<Result<(), String>>)>,
}

impl App {
    pub fn new(handle: &RunnerHandle, show_legend: bool, log_max: usize) -> Self {
        Self {
            snapshot: handle.snapshots.borrow().clone(),
            commands: handle.commands.clone(),
            selected: 0,
            show_legend,
            show_logs: false,
            should_quit: false,
            start_time: Instant::now(),
            recent_logs: VecDeque::new(),
            log_max,
            notice: None,
            notice_ttl: 0,
            pending_execute: None,
        }
    }

    /// Replace the rendered snapshot with a fresh one.
    pub fn on_snapshot(&mut self, snapshot: RunnerSnapshot) {
        self.snapshot = snapshot;
        let total = self.task_count();
        if total > 0 && self.selected >= total {
            self.selected = total - 1;
        }
    }

    pub fn push_log(&mut self, record: LogRecord) {
        self.recent_logs.push_back(record);
        while self.recent_logs.len() > self.log_max {
            self.recent_logs.pop_front();
        }
    }

    /// Flattened (project index, task) rows in display order.
    pub fn rows(&self) -> Vec<(usize, &ResolvedTask)> {
        self.snapshot
            .projects
            .iter()
            .enumerate()
            .flat_map(|(idx, project)| project.tasks.iter().map(move |t| (idx, t)))
            .collect()
    }

    pub fn task_count(&self) -> usize {
        self.snapshot.projects.iter().map(|p| p.tasks.len()).sum()
    }

    pub fn selected_row(&self) -> Option<(usize, &ResolvedTask)> {
        self.rows().into_iter().nth(self.selected)
    }

    pub fn select_next(&mut self) {
        let total = self.task_count();
        if total > 0 {
            self.selected = (self.selected + 1) % total;
        }
    }

    pub fn select_prev(&mut self) {
        let total = self.task_count();
        if total > 0 {
            self.selected = (self.selected + total - 1) % total;
        }
    }

    /// Called every second: age out the notice, poll the pending execute
    /// reply so refusals surface without blocking the render loop.
    pub fn on_tick(&mut self) {
        if self.notice_ttl > 0 {
            self.notice_ttl -= 1;
            if self.notice_ttl == 0 {
                self.notice = None;
            }
        }
        if let Some((task_id, mut rx)) = self.pending_execute.take() {
            match rx.try_recv() {
                Ok(Ok(())) => self.set_notice(format!("Executing {task_id}")),
                Ok(Err(reason)) => self.set_notice(format!("Execute refused: {reason}")),
                Err(oneshot::error::TryRecvError::Empty) => {
                    self.pending_execute = Some((task_id, rx));
                }
                Err(oneshot::error::TryRecvError::Closed) => {}
            }
        }
    }

    fn set_notice(&mut self, message: String) {
        self.notice = Some(message);
        self.notice_ttl = 5;
    }

    fn send(&self, command: RunnerCommand) {
        let _ = self.commands.send(command);
    }

    pub fn refresh(&self) {
        self.send(RunnerCommand::Refresh);
    }

    /// Toggle pause of the selected task's project.
    pub fn toggle_pause(&mut self) {
        let Some((idx, _)) = self.selected_row() else { return };
        let project = &self.snapshot.projects[idx];
        let name = project.project.clone();
        if project.paused {
            self.send(RunnerCommand::Resume(name));
        } else {
            self.send(RunnerCommand::Pause(name));
        }
    }

    pub fn pause_all(&self) {
        self.send(RunnerCommand::PauseAll);
    }

    pub fn resume_all(&self) {
        self.send(RunnerCommand::ResumeAll);
    }

    /// Toggle focus on the selected task's feature. Tasks without a
    /// feature toggle the ungrouped sentinel.
    pub fn toggle_focus(&mut self) {
        let Some((idx, task)) = self.selected_row() else { return };
        let project = &self.snapshot.projects[idx];
        let name = project.project.clone();
        let feature = task
            .task
            .feature_id
            .clone()
            .unwrap_or_else(|| UNGROUPED.to_string());
        if project.enabled_features.contains(&feature) {
            self.send(RunnerCommand::DisableFeature {
                project: name,
                feature,
            });
        } else {
            self.send(RunnerCommand::EnableFeature {
                project: name,
                feature,
            });
        }
    }

    pub fn execute_selected(&mut self) {
        let Some((_, task)) = self.selected_row() else { return };
        let task_id = task.id().to_string();
        let (tx, rx) = oneshot::channel();
        self.send(RunnerCommand::ExecuteTask {
            task_id: task_id.clone(),
            reply: Some(tx),
        });
        self.pending_execute = Some((task_id, rx));
    }

    pub fn cancel_selected(&mut self) {
        let Some((_, task)) = self.selected_row() else { return };
        let task_id = task.id().to_string();
        self.send(RunnerCommand::CancelTask { task_id });
    }

    /// Mark the selected task blocked (administrative transition).
    pub fn block_selected(&mut self) {
        let Some((_, task)) = self.selected_row() else { return };
        self.send(RunnerCommand::UpdateStatus {
            task_id: task.id().to_string(),
            path: task.task.path.clone(),
            status: EntryStatus::Blocked,
        });
    }

    /// Adjust the selected project's limit by `delta`, clearing it at zero.
    pub fn adjust_limit(&mut self, delta: i64) {
        let Some((idx, _)) = self.selected_row() else { return };
        let project = &self.snapshot.projects[idx];
        let current = project.limit.unwrap_or(self.snapshot.global_cap) as i64;
        let next = current + delta;
        self.send(RunnerCommand::SetProjectLimit {
            project: project.project.clone(),
            limit: if next <= 0 { Some(0) } else { Some(next as usize) },
        });
    }

    pub fn quit(&mut self) {
        self.send(RunnerCommand::Shutdown);
        self.should_quit = true;
    }

    pub fn elapsed_ms(&self) -> u64 {
        self.start_time.elapsed().as_millis() as u64
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::task::task_fixture;
    use crate::types::{Classification, ProjectSnapshot};
    use tokio::sync::{mpsc, watch};

    fn make_handle() -> (RunnerHandle, mpsc::UnboundedReceiver<RunnerCommand>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let (_snap_tx, snap_rx) = watch::channel(RunnerSnapshot::default());
        (
            RunnerHandle {
                commands: tx,
                snapshots: snap_rx,
            },
            rx,
        )
    }

    fn resolved(id: &str, classification: Classification) -> ResolvedTask {
        ResolvedTask {
            task: task_fixture(id, "demo", EntryStatus::Pending),
            classification,
            blocked_by: Vec::new(),
            blocked_by_reason: None,
            waiting_on: Vec::new(),
            unresolved_deps: Vec::new(),
            in_cycle: false,
            resolved_workdir: None,
            dependencies: Vec::new(),
            dependents: Vec::new(),
            children: Vec::new(),
        }
    }

    fn snapshot_with(tasks: Vec<ResolvedTask>, paused: bool) -> RunnerSnapshot {
        RunnerSnapshot {
            projects: vec![ProjectSnapshot {
                project: "demo".to_string(),
                tasks,
                paused,
                ..Default::default()
            }],
            global_cap: 3,
            ..Default::default()
        }
    }

    #[test]
    fn test_selection_wraps() {
        let (handle, _rx) = make_handle();
        let mut app = App::new(&handle, true, 50);
        app.on_snapshot(snapshot_with(
            vec![
                resolved("aaaa1111", Classification::Ready),
                resolved("bbbb2222", Classification::Waiting),
            ],
            false,
        ));
        assert_eq!(app.selected_row().unwrap().1.id(), "aaaa1111");
        app.select_next();
        assert_eq!(app.selected_row().unwrap().1.id(), "bbbb2222");
        app.select_next();
        assert_eq!(app.selected_row().unwrap().1.id(), "aaaa1111");
        app.select_prev();
        assert_eq!(app.selected_row().unwrap().1.id(), "bbbb2222");
    }

    #[test]
    fn test_selection_clamps_on_shrinking_snapshot() {
        let (handle, _rx) = make_handle();
        let mut app = App::new(&handle, true, 50);
        app.on_snapshot(snapshot_with(
            vec![
                resolved("aaaa1111", Classification::Ready),
                resolved("bbbb2222", Classification::Ready),
            ],
            false,
        ));
        app.select_next();
        app.on_snapshot(snapshot_with(vec![resolved("aaaa1111", Classification::Ready)], false));
        assert_eq!(app.selected, 0);
    }

    #[test]
    fn test_toggle_pause_sends_matching_command() {
        let (handle, mut rx) = make_handle();
        let mut app = App::new(&handle, true, 50);
        app.on_snapshot(snapshot_with(vec![resolved("aaaa1111", Classification::Ready)], false));

        app.toggle_pause();
        assert!(matches!(rx.try_recv().unwrap(), RunnerCommand::Pause(p) if p == "demo"));

        app.on_snapshot(snapshot_with(vec![resolved("aaaa1111", Classification::Ready)], true));
        app.toggle_pause();
        assert!(matches!(rx.try_recv().unwrap(), RunnerCommand::Resume(p) if p == "demo"));
    }

    #[test]
    fn test_toggle_focus_uses_ungrouped_sentinel() {
        let (handle, mut rx) = make_handle();
        let mut app = App::new(&handle, true, 50);
        app.on_snapshot(snapshot_with(vec![resolved("aaaa1111", Classification::Ready)], false));

        app.toggle_focus();
        match rx.try_recv().unwrap() {
            RunnerCommand::EnableFeature { project, feature } => {
                assert_eq!(project, "demo");
                assert_eq!(feature, UNGROUPED);
            }
            other => panic!("unexpected command: {other:?}"),
        }
    }

    #[test]
    fn test_execute_refusal_becomes_notice() {
        let (handle, mut rx) = make_handle();
        let mut app = App::new(&handle, true, 50);
        app.on_snapshot(snapshot_with(vec![resolved("aaaa1111", Classification::Ready)], false));

        app.execute_selected();
        let reply = match rx.try_recv().unwrap() {
            RunnerCommand::ExecuteTask { reply, .. } => reply.unwrap(),
            other => panic!("unexpected command: {other:?}"),
        };
        reply.send(Err("at capacity".to_string())).unwrap();

        app.on_tick();
        assert_eq!(
            app.notice.as_deref(),
            Some("Execute refused: at capacity")
        );
    }

    #[test]
    fn test_log_ring_is_bounded() {
        let (handle, _rx) = make_handle();
        let mut app = App::new(&handle, true, 3);
        for i in 0..6 {
            app.push_log(LogRecord::new(
                crate::types::LogLevel::Info,
                format!("line {i}"),
            ));
        }
        assert_eq!(app.recent_logs.len(), 3);
        assert_eq!(app.recent_logs.front().unwrap().message, "line 3");
    }

    #[test]
    fn test_quit_sends_shutdown() {
        let (handle, mut rx) = make_handle();
        let mut app = App::new(&handle, true, 50);
        app.quit();
        assert!(app.should_quit);
        assert!(matches!(rx.try_recv().unwrap(), RunnerCommand::Shutdown));
    }
}
