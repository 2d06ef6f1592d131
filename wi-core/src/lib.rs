pub mod commands;
pub mod config;
pub mod editor;
pub mod event;
pub mod keybindings;
pub mod plugin;
pub mod registry;
pub mod rpc;
pub mod supervisor;
pub mod terminal;
pub mod view;
pub mod window;

pub use commands::{Command, CommandError};
pub use config::{ConfigError, ConfigFile, LogConfig, PluginsConfig};
pub use editor::Editor;
pub use event::{EnqueuedCommands, EventError, EventId, EventKind, EventRegistry, Subscription};
pub use keybindings::{KeyBindings, KeyPress};
pub use plugin::{Candidate, PluginError, PluginHost, PluginProcess, PluginStatus};
pub use registry::{ViewFactory, ViewRegistry};
pub use rpc::{EditorDetails, Host, PluginDetails, PluginHandler, RemoteEvent, RpcClient, RpcError};
pub use supervisor::{Fault, Supervisor};
pub use terminal::{BufferTerminal, Terminal, TerminalEvent};
pub use view::{EventResult, Size, View};
pub use window::{BorderType, DockingType, WindowError, WindowId, WindowTree};
