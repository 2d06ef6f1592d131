// wi-views/src/common/colors.rs
use ratatui::style::{Color, Modifier, Style};

/// Get color for focus state
///
/// # Arguments
/// * `focused` - Whether the window currently has the focus
///
/// # Returns
/// Yellow if focused, DarkGray if not focused
pub fn focus_color(focused: bool) -> Color {
    if focused {
        Color::Yellow
    } else {
        Color::DarkGray
    }
}

/// Styles shared by the built-in views
#[derive(Debug, Clone, Copy)]
pub struct ColorPalette {
    /// Background strip behind the status elements
    pub status_bar: Style,
    /// Individual status elements
    pub status_item: Style,
    /// Alert text
    pub alert: Style,
    /// Command prompt line
    pub prompt: Style,
    /// Cursor cell of the command prompt
    pub cursor: Style,
    /// Plain text views
    pub text: Style,
}

/// Default color palette used across all views
pub const DEFAULT_PALETTE: ColorPalette = ColorPalette {
    status_bar: Style::new().fg(Color::Black).bg(Color::Gray),
    status_item: Style::new().fg(Color::Black).bg(Color::Gray),
    alert: Style::new()
        .fg(Color::Red)
        .bg(Color::Black)
        .add_modifier(Modifier::BOLD),
    prompt: Style::new().fg(Color::Green).bg(Color::Black),
    cursor: Style::new().fg(Color::Black).bg(Color::Green),
    text: Style::new(),
};
