use ratatui::style::Color;

// Nord Polar Night (dark backgrounds)
pub const NORD0: Color = Color::Rgb(46, 52, 64);
pub const NORD3: Color = Color::Rgb(76, 86, 106);

// Nord Snow Storm (light text)
pub const NORD4: Color = Color::Rgb(216, 222, 233);

// Nord Frost (accent)
pub const NORD8: Color = Color::Rgb(136, 192, 208);
pub const NORD9: Color = Color::Rgb(129, 161, 193);

// Nord Aurora (status indicators)
pub const NORD11: Color = Color::Rgb(191, 97, 106); // red
pub const NORD12: Color = Color::Rgb(208, 135, 112); // orange
pub const NORD13: Color = Color::Rgb(235, 203, 139); // yellow
pub const NORD14: Color = Color::Rgb(163, 190, 140); // green
pub const NORD15: Color = Color::Rgb(180, 142, 173); // purple

use crate::types::{Classification, EntryStatus};

pub fn classification_color(classification: Classification, status: EntryStatus) -> Color {
    match classification {
        Classification::Completed => NORD14,
        Classification::Ready if status == EntryStatus::InProgress => NORD13,
        Classification::Ready => NORD8,
        Classification::Waiting => NORD3,
        Classification::Blocked => NORD11,
    }
}

pub fn classification_icon(classification: Classification, status: EntryStatus) -> &'static str {
    match classification {
        Classification::Completed => "[✓]",
        Classification::Ready if status == EntryStatus::InProgress => "[⟳]",
        Classification::Ready => "[→]",
        Classification::Waiting => "[·]",
        Classification::Blocked => "[✗]",
    }
}

// Structure colors
pub const BORDER_COLOR: Color = NORD9;
pub const HEADER_COLOR: Color = NORD8;
pub const TEXT_COLOR: Color = NORD4;
pub const MUTED_COLOR: Color = NORD3;
pub const PAUSED_COLOR: Color = NORD12;
pub const FOCUS_COLOR: Color = NORD15;
