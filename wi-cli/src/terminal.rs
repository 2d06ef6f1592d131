// wi-cli/src/terminal.rs
use crossbeam::channel::{Receiver, unbounded};
use crossterm::{
    cursor::{Hide, Show},
    event::{self, Event as CEvent, KeyEventKind},
    execute,
    terminal::{EnterAlternateScreen, LeaveAlternateScreen, disable_raw_mode, enable_raw_mode},
};
use ratatui::{Terminal as RatatuiTerminal, backend::CrosstermBackend, buffer::Buffer};
use std::io::{self, Stdout};
use tracing::{debug, error};

use wi_core::{KeyPress, Size, Supervisor, Terminal, TerminalEvent};

/// The real terminal: raw mode, alternate screen, frames drawn through
/// ratatui so only changed cells are written.
pub struct CrosstermTerminal {
    terminal: RatatuiTerminal<CrosstermBackend<Stdout>>,
}

impl CrosstermTerminal {
    pub fn new() -> io::Result<Self> {
        enable_raw_mode()?;
        let mut stdout = io::stdout();
        execute!(stdout, EnterAlternateScreen, Hide)?;
        let terminal = RatatuiTerminal::new(CrosstermBackend::new(stdout))?;
        Ok(Self { terminal })
    }

    pub fn restore(&mut self) -> io::Result<()> {
        restore()?;
        self.terminal.show_cursor()
    }
}

impl Terminal for CrosstermTerminal {
    fn size(&self) -> io::Result<Size> {
        let size = self.terminal.size()?;
        Ok(Size::new(size.width, size.height))
    }

    fn blit(&mut self, frame: &Buffer) -> io::Result<()> {
        self.terminal.draw(|f| {
            let area = f.area().intersection(frame.area);
            let buf = f.buffer_mut();
            for y in area.top()..area.bottom() {
                for x in area.left()..area.right() {
                    if let (Some(dst), Some(src)) = (buf.cell_mut((x, y)), frame.cell((x, y))) {
                        *dst = src.clone();
                    }
                }
            }
        })?;
        Ok(())
    }
}

/// Leave raw mode and the alternate screen. Safe to call more than once,
/// and from the panic hook.
pub fn restore() -> io::Result<()> {
    disable_raw_mode()?;
    execute!(io::stdout(), LeaveAlternateScreen, Show)
}

/// Put the terminal back before the default hook prints the panic.
pub fn install_panic_hook() {
    let previous = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        let _ = restore();
        previous(info);
    }));
}

/// Read terminal input on its own thread. The channel closes when reading
/// fails.
pub fn spawn_input(supervisor: &Supervisor) -> io::Result<Receiver<TerminalEvent>> {
    let (tx, rx) = unbounded();
    supervisor.spawn_thread("terminal-input", move || {
        loop {
            let event = match event::read() {
                Ok(CEvent::Key(key)) if key.kind == KeyEventKind::Press => {
                    TerminalEvent::Key(KeyPress::from(key))
                }
                Ok(CEvent::Resize(width, height)) => TerminalEvent::Resize(Size::new(width, height)),
                Ok(other) => {
                    debug!(?other, "ignored terminal event");
                    continue;
                }
                Err(e) => {
                    error!(error = %e, "terminal input failed");
                    return;
                }
            };
            if tx.send(event).is_err() {
                return;
            }
        }
    })?;
    Ok(rx)
}
