//! Shared styling utilities for terminal output.

use comfy_table::Color;
use console::Style;
use mirrorcheck_core::SyncStatus;

fn marked(symbol: &str, style: Style, msg: &str) -> String {
    format!("{} {}", style.apply_to(symbol), msg)
}

/// Green checkmark prefix.
pub fn success(msg: &str) -> String {
    marked("✓", Style::new().green(), msg)
}

/// Red cross prefix.
pub fn error(msg: &str) -> String {
    marked("✗", Style::new().red(), msg)
}

/// Yellow warning-sign prefix.
pub fn warn(msg: &str) -> String {
    marked("⚠", Style::new().yellow(), msg)
}

pub fn header(msg: &str) -> String {
    Style::new().bold().apply_to(msg).to_string()
}

pub fn dim(msg: &str) -> String {
    Style::new().dim().apply_to(msg).to_string()
}

/// Table colour for a status: green in sync, cyan one-sided, yellow when
/// one side moved on, red otherwise.
pub fn status_color(status: SyncStatus) -> Color {
    match status {
        SyncStatus::InSync => Color::Green,
        SyncStatus::NewInLeft | SyncStatus::NewInRight => Color::Cyan,
        SyncStatus::LeftAhead | SyncStatus::RightAhead => Color::Yellow,
        SyncStatus::Divergent | SyncStatus::NoCommonAncestor => Color::Red,
    }
}
