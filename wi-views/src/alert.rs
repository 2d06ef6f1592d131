// wi-views/src/alert.rs
use ratatui::{buffer::Buffer, layout::Rect};
use wi_core::{Size, View};

use crate::common::{DEFAULT_PALETTE, fill_line, text_width};

/// One line message shown in a floating window. The editor decides when it
/// goes away.
pub struct AlertView {
    message: String,
}

impl AlertView {
    pub fn new(args: &[String]) -> Self {
        Self {
            message: args.join(" "),
        }
    }
}

impl View for AlertView {
    fn title(&self) -> &str {
        &self.message
    }

    fn natural_size(&self) -> Size {
        // One cell of padding on each side.
        Size::new(text_width(&self.message).saturating_add(2), 1)
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer) {
        fill_line(buf, area, &format!(" {} ", self.message), DEFAULT_PALETTE.alert);
    }

    fn is_disabled(&self) -> bool {
        true
    }
}
