pub mod alert;
pub mod command;
pub mod common;
pub mod root;
pub mod status;
pub mod text;

pub use alert::AlertView;
pub use command::CommandPrompt;
pub use common::*;
pub use root::{DEFAULT_KEY_BINDINGS, RootView};
pub use status::{StatusItem, StatusRoot};
pub use text::TextView;

use wi_core::editor::{ALERT_VIEW, COMMAND_VIEW};
use wi_core::{EnqueuedCommands, ViewRegistry, WindowId, register_view, register_view_no_bus};

pub const TEXT_VIEW: &str = "text";

/// Register every built-in view factory.
pub fn register_default_views(registry: &mut ViewRegistry) {
    register_view_no_bus!(registry, ALERT_VIEW, AlertView);
    register_view!(registry, COMMAND_VIEW, CommandPrompt);
    register_view_no_bus!(registry, TEXT_VIEW, TextView);
    register_view!(registry, status::STATUS_ROOT_VIEW, StatusRoot);
    registry.register(
        status::STATUS_ACTIVE_WINDOW_VIEW,
        Box::new(|bus, args| Box::new(StatusItem::active_window(bus.clone(), args))),
    );
    registry.register(
        status::STATUS_LANGUAGE_VIEW,
        Box::new(|bus, args| Box::new(StatusItem::language(bus.clone(), args))),
    );
}

/// Commands run once at startup to build the default UI under `root`.
pub fn bootstrap_commands(root: WindowId) -> EnqueuedCommands {
    vec![vec![
        "window_new".to_string(),
        root.to_string(),
        "bottom".to_string(),
        status::STATUS_ROOT_VIEW.to_string(),
    ]]
}
