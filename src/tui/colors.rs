//! Semantic color constants for consistent TUI styling.

use ratatui::prelude::*;

// Semantic colors
pub const TAG_COLOR: Color = Color::Blue;
pub const GROUP_COLOR: Color = Color::Cyan;
pub const FOCUS_COLOR: Color = Color::Cyan;
pub const UNFOCUS_BORDER: Color = Color::DarkGray;
pub const INSENSITIVE_COLOR: Color = Color::DarkGray;
pub const HEADER_COLOR: Color = Color::White;
pub const HELP_TEXT: Color = Color::DarkGray;
pub const STATUS_BAR_BG: Color = Color::DarkGray;
pub const STATUS_BAR_FG: Color = Color::White;
pub const WARNING_COLOR: Color = Color::Yellow;

/// Create a styled span for a tag (blue with # prefix).
pub fn styled_tag(tag: &str) -> Span<'_> {
    Span::styled(format!("#{}", tag), Style::default().fg(TAG_COLOR))
}

/// Render an on/off settings indicator for the status bar.
pub fn setting_indicator(label: &str, on: bool) -> Span<'static> {
    let style = if on {
        Style::default().fg(FOCUS_COLOR)
    } else {
        Style::default().fg(HELP_TEXT)
    };
    Span::styled(format!("[{}{}]", if on { "✓" } else { " " }, label), style)
}
