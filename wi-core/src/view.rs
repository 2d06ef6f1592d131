// wi-core/src/view.rs
use ratatui::{buffer::Buffer, layout::Rect};
use serde::{Deserialize, Serialize};

use crate::keybindings::{KeyBindings, KeyPress};
use crate::window::WindowId;

/// Content of a window. The window owns exactly one view and decides where
/// it goes; the view only draws itself into the area it is given.
pub trait View: Send {
    /// Short human readable name, used in logs and tree dumps
    fn title(&self) -> &str;

    /// Preferred size. An input to the layout solver, not a guarantee.
    fn natural_size(&self) -> Size {
        Size::UNBOUNDED
    }

    /// Called once the view is owned by window `window`
    fn on_attach(&mut self, _window: WindowId) {}

    /// Called by the layout pass with the size actually granted
    fn set_size(&mut self, _size: Size) {}

    /// Render into `area` of `buf`
    fn render(&mut self, area: Rect, buf: &mut Buffer);

    /// Handle a key that no binding claimed
    fn on_key(&mut self, _key: &KeyPress) -> EventResult {
        EventResult::Ignored
    }

    /// Disabled views never receive focus
    fn is_disabled(&self) -> bool {
        false
    }

    /// Bindings installed on the window when the view is attached
    fn key_bindings(&self) -> KeyBindings {
        KeyBindings::new()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    pub width: u16,
    pub height: u16,
}

impl Size {
    /// "As large as the parent allows"
    pub const UNBOUNDED: Size = Size {
        width: u16::MAX,
        height: u16::MAX,
    };

    pub const ZERO: Size = Size {
        width: 0,
        height: 0,
    };

    pub const fn new(width: u16, height: u16) -> Self {
        Self { width, height }
    }
}

impl From<Rect> for Size {
    fn from(rect: Rect) -> Self {
        Self::new(rect.width, rect.height)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventResult {
    Consumed, // Stop propagation, redraw
    Ignored,  // Nobody wanted it
    Close,    // Consumed, and the view asks for its window to close
}
