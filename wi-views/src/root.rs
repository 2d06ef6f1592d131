// wi-views/src/root.rs
use ratatui::{buffer::Buffer, layout::Rect};
use wi_core::{KeyBindings, View};

use crate::common::{DEFAULT_PALETTE, fill_line};

/// Key bindings every editor starts with, installed on the root window.
pub const DEFAULT_KEY_BINDINGS: &[(&str, &str)] = &[
    ("Ctrl-c", "quit"),
    ("Ctrl-p", "command_show"),
    ("Ctrl-l", "editor_redraw"),
    ("F2", "window_log"),
];

/// View of the root window. Draws the background the other windows are
/// docked on and carries the default key bindings.
pub struct RootView;

impl RootView {
    pub fn new(_args: &[String]) -> Self {
        Self
    }
}

impl View for RootView {
    fn title(&self) -> &str {
        "Root"
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer) {
        fill_line(buf, area, "", DEFAULT_PALETTE.text);
    }

    fn key_bindings(&self) -> KeyBindings {
        let mut keys = KeyBindings::new();
        for (key, command) in DEFAULT_KEY_BINDINGS {
            keys.set(*key, *command);
        }
        keys
    }
}
