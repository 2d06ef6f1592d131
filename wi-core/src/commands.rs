// wi-core/src/commands.rs
use ratatui::layout::Rect;

use crate::window::{DockingType, WindowError, WindowId};

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("empty command")]
    Empty,

    #[error("unknown command \"{0}\"")]
    Unknown(String),

    #[error("{command}: expected {expected} argument(s), got {got}")]
    Arity {
        command: &'static str,
        expected: &'static str,
        got: usize,
    },

    #[error("{command}: \"{value}\" is not a valid number")]
    InvalidNumber { command: &'static str, value: String },

    #[error("unknown view \"{0}\"")]
    UnknownView(String),

    #[error("no \"{0}\" view is registered")]
    MissingView(&'static str),

    #[error(transparent)]
    Window(#[from] WindowError),
}

/// A command the editor knows how to execute, parsed from a command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    WindowNew {
        parent: WindowId,
        docking: DockingType,
        view: String,
        args: Vec<String>,
    },
    WindowClose(WindowId),
    WindowSetDocking(WindowId, DockingType),
    WindowSetRect(WindowId, Rect),
    WindowActivate(WindowId),
    WindowLog,
    EditorRedraw,
    Alert(String),
    CommandShow,
    KeyBind { key: String, command: String },
    Quit,
}

impl Command {
    pub const NAMES: [&'static str; 11] = [
        "window_new",
        "window_close",
        "window_set_docking",
        "window_set_rect",
        "window_activate",
        "window_log",
        "editor_redraw",
        "alert",
        "command_show",
        "key_bind",
        "quit",
    ];

    /// Parse `name args...`.
    pub fn parse<S: AsRef<str>>(line: &[S]) -> Result<Self, CommandError> {
        let (name, args) = line.split_first().ok_or(CommandError::Empty)?;
        let args: Vec<&str> = args.iter().map(|s| s.as_ref()).collect();
        match name.as_ref() {
            "window_new" => {
                at_least("window_new", &args, 3)?;
                Ok(Command::WindowNew {
                    parent: args[0].parse()?,
                    docking: args[1].parse()?,
                    view: args[2].to_string(),
                    args: args[3..].iter().map(|s| s.to_string()).collect(),
                })
            }
            "window_close" => {
                exactly("window_close", &args, 1)?;
                Ok(Command::WindowClose(args[0].parse()?))
            }
            "window_set_docking" => {
                exactly("window_set_docking", &args, 2)?;
                Ok(Command::WindowSetDocking(args[0].parse()?, args[1].parse()?))
            }
            "window_set_rect" => {
                exactly("window_set_rect", &args, 5)?;
                let n = |s: &str| {
                    s.parse::<u16>().map_err(|_| CommandError::InvalidNumber {
                        command: "window_set_rect",
                        value: s.to_string(),
                    })
                };
                let rect = Rect::new(n(args[1])?, n(args[2])?, n(args[3])?, n(args[4])?);
                Ok(Command::WindowSetRect(args[0].parse()?, rect))
            }
            "window_activate" => {
                exactly("window_activate", &args, 1)?;
                Ok(Command::WindowActivate(args[0].parse()?))
            }
            "window_log" => {
                exactly("window_log", &args, 0)?;
                Ok(Command::WindowLog)
            }
            "editor_redraw" => {
                exactly("editor_redraw", &args, 0)?;
                Ok(Command::EditorRedraw)
            }
            "alert" => {
                at_least("alert", &args, 1)?;
                Ok(Command::Alert(args.join(" ")))
            }
            "command_show" => {
                exactly("command_show", &args, 0)?;
                Ok(Command::CommandShow)
            }
            "key_bind" => {
                at_least("key_bind", &args, 2)?;
                Ok(Command::KeyBind {
                    key: args[0].to_string(),
                    command: args[1..].join(" "),
                })
            }
            "quit" => {
                exactly("quit", &args, 0)?;
                Ok(Command::Quit)
            }
            other => Err(CommandError::Unknown(other.to_string())),
        }
    }

    /// Parse a whitespace separated command line, as stored in key bindings.
    pub fn parse_line(line: &str) -> Result<Self, CommandError> {
        let words: Vec<&str> = line.split_whitespace().collect();
        Self::parse(&words)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Command::WindowNew { .. } => "window_new",
            Command::WindowClose(_) => "window_close",
            Command::WindowSetDocking(..) => "window_set_docking",
            Command::WindowSetRect(..) => "window_set_rect",
            Command::WindowActivate(_) => "window_activate",
            Command::WindowLog => "window_log",
            Command::EditorRedraw => "editor_redraw",
            Command::Alert(_) => "alert",
            Command::CommandShow => "command_show",
            Command::KeyBind { .. } => "key_bind",
            Command::Quit => "quit",
        }
    }
}

fn exactly(command: &'static str, args: &[&str], n: usize) -> Result<(), CommandError> {
    if args.len() == n {
        return Ok(());
    }
    const COUNTS: [&str; 6] = ["0", "1", "2", "3", "4", "5"];
    Err(CommandError::Arity {
        command,
        expected: COUNTS.get(n).copied().unwrap_or("more"),
        got: args.len(),
    })
}

fn at_least(command: &'static str, args: &[&str], n: usize) -> Result<(), CommandError> {
    if args.len() >= n {
        return Ok(());
    }
    const COUNTS: [&str; 4] = ["0+", "1+", "2+", "3+"];
    Err(CommandError::Arity {
        command,
        expected: COUNTS.get(n).copied().unwrap_or("more"),
        got: args.len(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use slotmap::KeyData;

    fn id(raw: u64) -> WindowId {
        WindowId::from(KeyData::from_ffi(raw))
    }

    #[test]
    fn test_parse_window_new() {
        let root = id(1 << 32);
        let line = format!("window_new {root} left text hello world");
        let cmd = Command::parse_line(&line).unwrap();
        assert_eq!(
            cmd,
            Command::WindowNew {
                parent: root,
                docking: DockingType::Left,
                view: "text".to_string(),
                args: vec!["hello".to_string(), "world".to_string()],
            }
        );
        assert_eq!(cmd.name(), "window_new");
    }

    #[test]
    fn test_parse_set_rect() {
        let w = id((1 << 32) | 3);
        let text = w.to_string();
        let cmd = Command::parse(&["window_set_rect", text.as_str(), "1", "2", "30", "4"]).unwrap();
        assert_eq!(cmd, Command::WindowSetRect(w, Rect::new(1, 2, 30, 4)));

        let err = Command::parse_line(&format!("window_set_rect {w} 1 2 -3 4")).unwrap_err();
        assert_eq!(
            err,
            CommandError::InvalidNumber {
                command: "window_set_rect",
                value: "-3".to_string()
            }
        );
    }

    #[test]
    fn test_bad_input() {
        assert_eq!(Command::parse_line(""), Err(CommandError::Empty));
        assert_eq!(
            Command::parse_line("frobnicate"),
            Err(CommandError::Unknown("frobnicate".to_string()))
        );
        assert!(matches!(
            Command::parse_line("window_close"),
            Err(CommandError::Arity { command: "window_close", got: 0, .. })
        ));
        assert!(matches!(
            Command::parse_line("window_set_docking 4294967297 sideways"),
            Err(CommandError::Window(WindowError::InvalidDocking(_)))
        ));
        assert!(matches!(
            Command::parse_line("window_activate not-an-id"),
            Err(CommandError::Window(WindowError::UnknownWindow(_)))
        ));
    }

    #[test]
    fn test_key_bind_and_alert_join_args() {
        assert_eq!(
            Command::parse_line("key_bind Ctrl-t alert hello  there").unwrap(),
            Command::KeyBind {
                key: "Ctrl-t".to_string(),
                command: "alert hello there".to_string()
            }
        );
        assert_eq!(
            Command::parse_line("alert it works").unwrap(),
            Command::Alert("it works".to_string())
        );
    }

    #[test]
    fn test_every_name_parses_back() {
        for name in Command::NAMES {
            match Command::parse_line(name) {
                Ok(cmd) => assert_eq!(cmd.name(), name),
                Err(CommandError::Arity { command, .. }) => assert_eq!(command, name),
                Err(other) => panic!("{name}: {other}"),
            }
        }
    }
}
