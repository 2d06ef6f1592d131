use ratatui::{buffer::Buffer, layout::Rect};
use std::io;

use crate::keybindings::KeyPress;
use crate::view::Size;

/// Input produced by the terminal backend, read by the control loop only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    Key(KeyPress),
    Resize(Size),
}

/// What the editor needs from a terminal: its size and a way to show a
/// finished frame. Input arrives separately as [`TerminalEvent`]s.
pub trait Terminal {
    fn size(&self) -> io::Result<Size>;
    fn blit(&mut self, frame: &Buffer) -> io::Result<()>;
}

/// Headless terminal keeping the last frame in memory.
#[derive(Debug)]
pub struct BufferTerminal {
    size: Size,
    last: Buffer,
    frames: usize,
}

impl BufferTerminal {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            last: Buffer::empty(Rect::new(0, 0, size.width, size.height)),
            frames: 0,
        }
    }

    pub fn set_size(&mut self, size: Size) {
        self.size = size;
    }

    pub fn last_frame(&self) -> &Buffer {
        &self.last
    }

    /// Frames blitted so far
    pub fn frames(&self) -> usize {
        self.frames
    }

    /// Text of row `y` of the last frame.
    pub fn line(&self, y: u16) -> String {
        let area = self.last.area;
        (area.left()..area.right())
            .filter_map(|x| self.last.cell((x, y)))
            .map(|c| c.symbol())
            .collect()
    }
}

impl Terminal for BufferTerminal {
    fn size(&self) -> io::Result<Size> {
        Ok(self.size)
    }

    fn blit(&mut self, frame: &Buffer) -> io::Result<()> {
        self.last = frame.clone();
        self.frames += 1;
        Ok(())
    }
}
