//! Project/task list widget: one section per project with pause and focus
//! indicators, one row per task colored by classification.

use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;

use crate::types::{ProjectSnapshot, ResolvedTask};

use super::theme::{
    classification_color, classification_icon, FOCUS_COLOR, HEADER_COLOR, MUTED_COLOR,
    PAUSED_COLOR, TEXT_COLOR,
};

pub struct TaskTreeWidget<'a> {
    pub projects: &'a [ProjectSnapshot],
    pub selected: usize,
}

impl TaskTreeWidget<'_> {
    fn project_header(project: &ProjectSnapshot) -> Line<'static> {
        let mut spans = vec![Span::styled(
            format!(" {} ", project.project),
            Style::default()
                .fg(HEADER_COLOR)
                .add_modifier(Modifier::BOLD),
        )];
        spans.push(Span::styled(
            format!(
                "({} ready, {} waiting, {} blocked, {} running)",
                project.stats.ready,
                project.stats.waiting,
                project.stats.blocked,
                project.running.len(),
            ),
            Style::default().fg(MUTED_COLOR),
        ));
        if project.paused {
            spans.push(Span::styled(
                "  ⏸ paused",
                Style::default().fg(PAUSED_COLOR),
            ));
        }
        if !project.enabled_features.is_empty() {
            let features: Vec<&str> = project
                .enabled_features
                .iter()
                .map(|f| f.as_str())
                .collect();
            spans.push(Span::styled(
                format!("  ◎ focus: {}", features.join(", ")),
                Style::default().fg(FOCUS_COLOR),
            ));
        }
        if let Some(limit) = project.limit {
            spans.push(Span::styled(
                format!("  limit {limit}"),
                Style::default().fg(MUTED_COLOR),
            ));
        }
        if let Some(ref error) = project.last_error {
            spans.push(Span::styled(
                format!("  ⚠ {error}"),
                Style::default().fg(PAUSED_COLOR),
            ));
        }
        Line::from(spans)
    }

    fn task_row(task: &ResolvedTask, running: bool, selected: bool) -> Line<'static> {
        let color = classification_color(task.classification, task.status());
        let icon = if running {
            "[⟳]"
        } else {
            classification_icon(task.classification, task.status())
        };

        let mut style = Style::default().fg(color);
        if selected {
            style = style.add_modifier(Modifier::REVERSED);
        }

        let mut detail = String::new();
        if task.in_cycle {
            detail.push_str("  ↻ cycle");
        } else if let Some(ref reason) = task.blocked_by_reason {
            detail.push_str(&format!("  ({reason})"));
        } else if !task.blocked_by.is_empty() {
            detail.push_str(&format!("  (blocked by {})", task.blocked_by.join(", ")));
        } else if !task.waiting_on.is_empty() {
            detail.push_str(&format!("  (waiting on {})", task.waiting_on.join(", ")));
        }
        let feature = task
            .task
            .feature_id
            .as_deref()
            .map(|f| format!(" #{f}"))
            .unwrap_or_default();

        Line::from(vec![
            Span::styled(format!("   {icon} "), style),
            Span::styled(
                format!("{} {}", task.id(), task.task.title),
                if selected {
                    style
                } else {
                    Style::default().fg(TEXT_COLOR)
                },
            ),
            Span::styled(feature, Style::default().fg(FOCUS_COLOR)),
            Span::styled(detail, Style::default().fg(MUTED_COLOR)),
        ])
    }
}

impl Widget for TaskTreeWidget<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let mut y = area.y;
        let mut row_index = 0usize;
        for project in self.projects {
            if y >= area.y + area.height {
                return;
            }
            buf.set_line(area.x, y, &Self::project_header(project), area.width);
            y += 1;

            for task in &project.tasks {
                if y >= area.y + area.height {
                    return;
                }
                let running = project.running.contains(task.id());
                let selected = row_index == self.selected;
                buf.set_line(
                    area.x,
                    y,
                    &Self::task_row(task, running, selected),
                    area.width,
                );
                y += 1;
                row_index += 1;
            }
        }
    }
}
