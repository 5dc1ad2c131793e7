use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::{Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;

use crate::types::{GraphStats, ResourceMetrics};

use super::theme::{HEADER_COLOR, MUTED_COLOR, NORD11, TEXT_COLOR};

/// Header widget height
pub const HEADER_HEIGHT: u16 = 2;

pub struct Header<'a> {
    pub stats: GraphStats,
    pub metrics: ResourceMetrics,
    pub global_cap: usize,
    pub total_running: usize,
    pub elapsed_ms: u64,
    pub disconnected: bool,
    pub last_error: Option<&'a str>,
}

impl Widget for Header<'_> {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let title = Line::from(vec![
            Span::styled(
                " brain-runner ",
                Style::default()
                    .fg(HEADER_COLOR)
                    .add_modifier(Modifier::BOLD),
            ),
            Span::styled(
                format!(
                    "agents {}/{}  ready {}  waiting {}  blocked {}  done {}",
                    self.total_running,
                    self.global_cap,
                    self.stats.ready,
                    self.stats.waiting,
                    self.stats.blocked,
                    self.stats.completed,
                ),
                Style::default().fg(TEXT_COLOR),
            ),
            Span::styled(
                format!("  up {}", format_duration(self.elapsed_ms)),
                Style::default().fg(MUTED_COLOR),
            ),
        ]);
        buf.set_line(area.x, area.y, &title, area.width);

        let mut spans = vec![Span::styled(
            format!(
                " load {:.2}  mem {:.0}%  rss {}MB",
                self.metrics.load_avg,
                self.metrics.available_memory_frac * 100.0,
                self.metrics.rss_mb,
            ),
            Style::default().fg(MUTED_COLOR),
        )];
        if self.disconnected {
            spans.push(Span::styled(
                "  ⚠ store unreachable",
                Style::default().fg(NORD11),
            ));
        }
        if let Some(error) = self.last_error {
            spans.push(Span::styled(
                format!("  {error}"),
                Style::default().fg(NORD11),
            ));
        }
        if area.height > 1 {
            buf.set_line(area.x, area.y + 1, &Line::from(spans), area.width);
        }
    }
}

/// Format elapsed milliseconds as a compact duration.
pub fn format_duration(ms: u64) -> String {
    let seconds = ms / 1000;
    let minutes = seconds / 60;
    let hours = minutes / 60;

    if hours > 0 {
        format!("{}h{}m", hours, minutes % 60)
    } else if minutes > 0 {
        format!("{}m{}s", minutes, seconds % 60)
    } else {
        format!("{seconds}s")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_duration() {
        assert_eq!(format_duration(5_000), "5s");
        assert_eq!(format_duration(65_000), "1m5s");
        assert_eq!(format_duration(3_665_000), "1h1m");
    }
}
