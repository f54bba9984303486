//! Color constants for the terminal user interface.

use ratatui::style::Color;

use crate::fields::{Priority, Status};

/// Used for destructive dialogs and critical priority
pub const DARK_RED: Color = Color::Rgb(114, 0, 0);
/// Used for review status and high priority
pub const GOLD: Color = Color::Rgb(255, 215, 0);
/// Header and status bar background
pub const SLATE: Color = Color::Rgb(40, 60, 90);

/// Foreground color for a status cell.
pub fn status_color(status: Status) -> Color {
    match status {
        Status::Todo => Color::White,
        Status::InProgress => Color::Cyan,
        Status::Review => GOLD,
        Status::Done => Color::DarkGray,
    }
}

/// Foreground color for a priority cell.
pub fn priority_color(priority: Option<Priority>) -> Color {
    match priority {
        None => Color::DarkGray,
        Some(Priority::Low) => Color::Green,
        Some(Priority::Medium) => Color::White,
        Some(Priority::High) => GOLD,
        Some(Priority::Critical) => Color::LightRed,
    }
}
