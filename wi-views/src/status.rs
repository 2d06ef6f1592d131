// wi-views/src/status.rs
//! The status bar: one disabled root strip with an element per child window.
use parking_lot::Mutex;
use ratatui::{buffer::Buffer, layout::Rect};
use std::sync::Arc;
use wi_core::{EventRegistry, Size, Subscription, View, WindowId};

use crate::common::{DEFAULT_PALETTE, fill_line, text_width};

pub const STATUS_ROOT_VIEW: &str = "status_root";
pub const STATUS_ACTIVE_WINDOW_VIEW: &str = "status_active_window";
pub const STATUS_LANGUAGE_VIEW: &str = "status_language";

/// Width given to each status element
const ELEMENT_WIDTH: u16 = 15;

/// Docked at the bottom of the root. Once attached it asks for its own
/// elements through the command queue, so a plugin can replace any of them.
pub struct StatusRoot {
    events: EventRegistry,
}

impl StatusRoot {
    pub fn new(events: EventRegistry, _args: &[String]) -> Self {
        Self { events }
    }
}

impl View for StatusRoot {
    fn title(&self) -> &str {
        "Status Root"
    }

    fn natural_size(&self) -> Size {
        Size::new(u16::MAX, 1)
    }

    fn on_attach(&mut self, window: WindowId) {
        let id = window.to_string();
        let line = |docking: &str, view: &str| {
            ["window_new", id.as_str(), docking, view]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        };
        self.events.trigger_commands(&vec![
            line("left", STATUS_ACTIVE_WINDOW_VIEW),
            line("right", STATUS_LANGUAGE_VIEW),
        ]);
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer) {
        fill_line(buf, area, "", DEFAULT_PALETTE.status_bar);
    }

    fn is_disabled(&self) -> bool {
        true
    }
}

/// A status element whose text is updated from a bus listener.
pub struct StatusItem {
    title: &'static str,
    text: Arc<Mutex<String>>,
    _subscription: Subscription,
}

impl StatusItem {
    /// Shows the id of the window that last took the focus.
    pub fn active_window(events: EventRegistry, _args: &[String]) -> Self {
        let text = Arc::new(Mutex::new(String::new()));
        let mut sub = events.subscription();
        let shown = text.clone();
        sub.push(events.register_view_activated(move |id| {
            *shown.lock() = format!("#{id}");
        }));
        Self {
            title: "Status Name",
            text,
            _subscription: sub,
        }
    }

    /// Shows the editor language, `args[0]` until the first change.
    pub fn language(events: EventRegistry, args: &[String]) -> Self {
        let initial = args.first().cloned().unwrap_or_else(|| "en".to_string());
        let text = Arc::new(Mutex::new(initial));
        let mut sub = events.subscription();
        let shown = text.clone();
        sub.push(events.register_editor_language(move |lang| {
            *shown.lock() = lang.clone();
        }));
        Self {
            title: "Status Language",
            text,
            _subscription: sub,
        }
    }

    pub fn text(&self) -> String {
        self.text.lock().clone()
    }
}

impl View for StatusItem {
    fn title(&self) -> &str {
        self.title
    }

    fn natural_size(&self) -> Size {
        Size::new(ELEMENT_WIDTH.max(text_width(&self.text.lock())), 1)
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer) {
        let text = self.text.lock().clone();
        fill_line(buf, area, &text, DEFAULT_PALETTE.status_item);
    }

    fn is_disabled(&self) -> bool {
        true
    }
}
