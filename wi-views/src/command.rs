// wi-views/src/command.rs
use crossterm::event::KeyCode;
use ratatui::{buffer::Buffer, layout::Rect};
use tracing::debug;
use wi_core::{EventRegistry, EventResult, KeyPress, Size, View};

use crate::common::{DEFAULT_PALETTE, fill_line, text_width};

const PROMPT: &str = ":";
const PROMPT_WIDTH: u16 = 30;

/// Single line command prompt. Enter posts the typed line to the command
/// queue and closes the window, Escape just closes it.
///
/// # Keyboard Shortcuts
/// - printable keys - insert at the cursor
/// - `Left`/`Right`/`Home`/`End` - move the cursor
/// - `Backspace`/`Delete` - remove a character
pub struct CommandPrompt {
    events: EventRegistry,
    line: Vec<char>,
    cursor: usize,
}

impl CommandPrompt {
    pub fn new(events: EventRegistry, args: &[String]) -> Self {
        let line: Vec<char> = args.join(" ").chars().collect();
        let cursor = line.len();
        Self {
            events,
            line,
            cursor,
        }
    }

    pub fn line(&self) -> String {
        self.line.iter().collect()
    }

    fn submit(&mut self) {
        let words: Vec<String> = self.line().split_whitespace().map(String::from).collect();
        if words.is_empty() {
            return;
        }
        debug!(command = %words.join(" "), "command prompt");
        self.events.trigger_commands(&vec![words]);
    }
}

impl View for CommandPrompt {
    fn title(&self) -> &str {
        "Command"
    }

    fn natural_size(&self) -> Size {
        Size::new(PROMPT_WIDTH, 1)
    }

    fn render(&mut self, area: Rect, buf: &mut Buffer) {
        if area.is_empty() {
            return;
        }
        let text = format!("{PROMPT}{}", self.line());
        fill_line(buf, area, &text, DEFAULT_PALETTE.prompt);

        let x = area.x.saturating_add(text_width(PROMPT)).saturating_add(self.cursor as u16);
        if x < area.right() {
            if let Some(cell) = buf.cell_mut((x, area.y)) {
                cell.set_style(DEFAULT_PALETTE.cursor);
            }
        }
    }

    fn on_key(&mut self, key: &KeyPress) -> EventResult {
        if key.is_meta() {
            return EventResult::Ignored;
        }
        match key.code {
            KeyCode::Char(c) => {
                self.line.insert(self.cursor, c);
                self.cursor += 1;
            }
            KeyCode::Backspace if self.cursor > 0 => {
                self.cursor -= 1;
                self.line.remove(self.cursor);
            }
            KeyCode::Delete if self.cursor < self.line.len() => {
                self.line.remove(self.cursor);
            }
            KeyCode::Left => self.cursor = self.cursor.saturating_sub(1),
            KeyCode::Right => self.cursor = (self.cursor + 1).min(self.line.len()),
            KeyCode::Home => self.cursor = 0,
            KeyCode::End => self.cursor = self.line.len(),
            KeyCode::Enter => {
                self.submit();
                return EventResult::Close;
            }
            KeyCode::Esc => return EventResult::Close,
            KeyCode::Backspace | KeyCode::Delete => {}
            _ => return EventResult::Ignored,
        }
        EventResult::Consumed
    }
}
