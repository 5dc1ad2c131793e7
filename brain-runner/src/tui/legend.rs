use ratatui::buffer::Buffer;
use ratatui::layout::Rect;
use ratatui::style::Style;
use ratatui::text::{Line, Span};
use ratatui::widgets::Widget;

use crate::types::{Classification, EntryStatus};

use super::theme::{classification_color, MUTED_COLOR, TEXT_COLOR};

pub struct Legend;

impl Widget for Legend {
    fn render(self, area: Rect, buf: &mut Buffer) {
        let items = [
            (Classification::Completed, EntryStatus::Completed, "[✓] Done"),
            (Classification::Ready, EntryStatus::Pending, "[→] Ready"),
            (Classification::Ready, EntryStatus::InProgress, "[⟳] Running"),
            (Classification::Waiting, EntryStatus::Pending, "[·] Waiting"),
            (Classification::Blocked, EntryStatus::Blocked, "[✗] Blocked"),
        ];

        let mut spans = vec![Span::styled("Legend: ", Style::default().fg(MUTED_COLOR))];
        for (i, (classification, status, label)) in items.iter().enumerate() {
            spans.push(Span::styled(
                *label,
                Style::default().fg(classification_color(*classification, *status)),
            ));
            if i < items.len() - 1 {
                spans.push(Span::styled("  ", Style::default().fg(TEXT_COLOR)));
            }
        }
        spans.push(Span::styled(
            "   p pause  f focus  x exec  c cancel  e edit  b block  r refresh  q quit",
            Style::default().fg(MUTED_COLOR),
        ));

        let line = Line::from(spans);
        buf.set_line(area.x + 1, area.y, &line, area.width.saturating_sub(1));
    }
}

/// Legend widget height
pub const LEGEND_HEIGHT: u16 = 1;
