//! Ratatui dashboard: draws runner snapshots and translates keystrokes
//! into runner commands. The runner never shares mutable state with this
//! loop; everything it renders arrived over the snapshot watch channel.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crossterm::event::{KeyCode, KeyEvent, KeyModifiers};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::Terminal;

use crate::log_stream::LogStream;
use crate::runner::RunnerHandle;
use crate::types::{LogLevel, TuiConfig};

use super::app::App;
use super::events::{EventHandler, TuiEvent};
use super::header::{Header, HEADER_HEIGHT};
use super::legend::{Legend, LEGEND_HEIGHT};
use super::task_tree::TaskTreeWidget;
use super::theme::{MUTED_COLOR, NORD0, NORD11, NORD13, TEXT_COLOR};

/// Run the dashboard until the user quits. Blocking; call from the main
/// thread while the runner drives itself on the async runtime.
pub fn run_dashboard(
    handle: RunnerHandle,
    logs: Arc<LogStream>,
    config: &TuiConfig,
    notebook_base: PathBuf,
    log_max: usize,
) -> anyhow::Result<()> {
    enable_raw_mode()?;
    let mut stdout = io::stdout();
    execute!(stdout, EnterAlternateScreen)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend)?;
    terminal.clear()?;

    let mut handle = handle;
    let mut app = App::new(&handle, config.show_legend, log_max);
    for record in logs.recent(log_max) {
        app.push_log(record);
    }
    let mut subscriber = logs.subscribe();
    let events = EventHandler::new();

    loop {
        // Pull the freshest snapshot and any new log lines before drawing.
        if handle.snapshots.has_changed().unwrap_or(false) {
            let snapshot = handle.snapshots.borrow_and_update().clone();
            app.on_snapshot(snapshot);
        }
        while let Some(record) = subscriber.try_recv() {
            app.push_log(record);
        }

        terminal.draw(|frame| render_dashboard(frame, &app, config))?;

        if app.should_quit {
            break;
        }

        if let Some(event) = events.next(Duration::from_millis(config.refresh_ms.max(50))) {
            match event {
                TuiEvent::Key(key) => handle_key_event(&mut app, key, &mut terminal, &notebook_base)?,
                TuiEvent::Tick => app.on_tick(),
            }
        }
    }

    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;
    terminal.show_cursor()?;
    Ok(())
}

fn handle_key_event(
    app: &mut App,
    key: KeyEvent,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    notebook_base: &Path,
) -> anyhow::Result<()> {
    match key.code {
        KeyCode::Char('q') => app.quit(),
        KeyCode::Char('c') if key.modifiers.contains(KeyModifiers::CONTROL) => app.quit(),
        KeyCode::Down | KeyCode::Char('j') => app.select_next(),
        KeyCode::Up | KeyCode::Char('k') => app.select_prev(),
        KeyCode::Char('p') => app.toggle_pause(),
        KeyCode::Char('P') => app.pause_all(),
        KeyCode::Char('R') => app.resume_all(),
        KeyCode::Char('f') => app.toggle_focus(),
        KeyCode::Char('x') => app.execute_selected(),
        KeyCode::Char('c') => app.cancel_selected(),
        KeyCode::Char('b') => app.block_selected(),
        KeyCode::Char('r') => app.refresh(),
        KeyCode::Char('l') => app.show_legend = !app.show_legend,
        KeyCode::Char('d') => app.show_logs = !app.show_logs,
        KeyCode::Char('+') | KeyCode::Char('=') => app.adjust_limit(1),
        KeyCode::Char('-') => app.adjust_limit(-1),
        KeyCode::Char('e') | KeyCode::Enter => edit_selected(app, terminal, notebook_base)?,
        _ => {}
    }
    Ok(())
}

/// Suspend the TUI, open the selected entry in `$EDITOR`, resume, and
/// force a refresh so edits show up immediately. No deadline: the editor
/// session is user-driven.
fn edit_selected(
    app: &mut App,
    terminal: &mut Terminal<CrosstermBackend<io::Stdout>>,
    notebook_base: &Path,
) -> anyhow::Result<()> {
    let Some((_, task)) = app.selected_row() else {
        return Ok(());
    };
    let path = notebook_base.join(&task.task.path);
    let before = std::fs::metadata(&path).and_then(|m| m.modified()).ok();

    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen)?;

    let editor = crate::config::editor();
    let status = std::process::Command::new(&editor).arg(&path).status();

    enable_raw_mode()?;
    execute!(io::stdout(), EnterAlternateScreen)?;
    terminal.clear()?;

    match status {
        Ok(status) if status.success() => {
            let after = std::fs::metadata(&path).and_then(|m| m.modified()).ok();
            if before == after {
                // Unchanged; nothing to announce.
                return Ok(());
            }
            app.refresh();
        }
        Ok(status) => {
            tracing::warn!(editor = %editor, "Editor exited with {status}");
        }
        Err(e) => {
            tracing::warn!(editor = %editor, "Failed to launch editor: {e}");
        }
    }
    Ok(())
}

fn render_dashboard(frame: &mut ratatui::Frame, app: &App, config: &TuiConfig) {
    let size = frame.area();

    let bg = ratatui::widgets::Block::default().style(Style::default().bg(NORD0));
    frame.render_widget(bg, size);

    let mut constraints = vec![
        Constraint::Length(HEADER_HEIGHT),
        Constraint::Min(5), // task tree
    ];
    if app.show_logs {
        constraints.push(Constraint::Length(config.log_panel_lines));
    }
    if app.notice.is_some() {
        constraints.push(Constraint::Length(1));
    }
    if app.show_legend {
        constraints.push(Constraint::Length(LEGEND_HEIGHT));
    }

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints(constraints)
        .split(size);
    let mut chunk_idx = 0;

    let disconnected = app
        .snapshot
        .projects
        .iter()
        .any(|p| p.last_error.is_some());
    let header = Header {
        stats: app.snapshot.aggregate_stats(),
        metrics: app.snapshot.metrics,
        global_cap: app.snapshot.global_cap,
        total_running: app.snapshot.total_running,
        elapsed_ms: app.elapsed_ms(),
        disconnected,
        last_error: app.snapshot.last_error.as_deref(),
    };
    frame.render_widget(header, chunks[chunk_idx]);
    chunk_idx += 1;

    let tree = TaskTreeWidget {
        projects: &app.snapshot.projects,
        selected: app.selected,
    };
    frame.render_widget(tree, chunks[chunk_idx]);
    chunk_idx += 1;

    if app.show_logs {
        render_log_panel(frame, chunks[chunk_idx], app, config.log_panel_lines as usize);
        chunk_idx += 1;
    }

    if let Some(ref notice) = app.notice {
        let line = Line::from(Span::styled(
            format!(" {notice}"),
            Style::default().fg(NORD13),
        ));
        frame.render_widget(line, chunks[chunk_idx]);
        chunk_idx += 1;
    }

    if app.show_legend {
        frame.render_widget(Legend, chunks[chunk_idx]);
    }
}

fn render_log_panel(frame: &mut ratatui::Frame, area: ratatui::layout::Rect, app: &App, lines: usize) {
    let records: Vec<&crate::log_stream::LogRecord> = app
        .recent_logs
        .iter()
        .rev()
        .take(lines)
        .collect::<Vec<_>>()
        .into_iter()
        .rev()
        .collect();

    for (i, record) in records.iter().enumerate() {
        if i as u16 >= area.height {
            break;
        }
        let color = match record.level {
            LogLevel::Error => NORD11,
            LogLevel::Warn => NORD13,
            LogLevel::Info => TEXT_COLOR,
            LogLevel::Debug => MUTED_COLOR,
        };
        let task = record
            .task_id
            .as_deref()
            .map(|id| format!("[{id}] "))
            .unwrap_or_default();
        let time = record
            .timestamp
            .split('T')
            .nth(1)
            .unwrap_or("")
            .trim_end_matches('Z');
        let line = Line::from(vec![
            Span::styled(format!(" {time} "), Style::default().fg(MUTED_COLOR)),
            Span::styled(task, Style::default().fg(MUTED_COLOR)),
            Span::styled(record.message.clone(), Style::default().fg(color)),
        ]);
        frame.render_widget(
            line,
            ratatui::layout::Rect::new(area.x, area.y + i as u16, area.width, 1),
        );
    }
}
