//! Sample out-of-process plugin: binds `Ctrl-t` to an alert and logs the
//! editor events it is sent.

use tracing::{debug, info};
use wi_plugin_sdk::{EditorDetails, Host, PluginDetails, PluginHandler, RemoteEvent, plugin_main};

/// Key the plugin claims globally.
const KEY: &str = "Ctrl-t";

#[derive(Default)]
struct Sample {
    language: String,
    events_seen: usize,
}

impl Sample {
    fn observe(&mut self, event: &RemoteEvent) {
        self.events_seen += 1;
        match event {
            RemoteEvent::EditorLanguage(language) => self.language = language.clone(),
            other => debug!(?other, "event"),
        }
    }

    fn greeting(&self) -> &'static str {
        match self.language.as_str() {
            "fr" => "Bonjour",
            _ => "Hello",
        }
    }
}

impl PluginHandler for Sample {
    fn get_info(&mut self, language: &str) -> PluginDetails {
        self.language = language.to_string();
        PluginDetails {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    fn init(&mut self, editor: &EditorDetails, host: &Host) -> Result<(), String> {
        info!(editor = %editor.id, version = %editor.version, "init");
        let line = ["key_bind", KEY, "alert", self.greeting(), "from", env!("CARGO_PKG_NAME")]
            .into_iter()
            .map(String::from)
            .collect();
        host.post_commands(vec![line]).map_err(|e| e.to_string())
    }

    fn on_event(&mut self, event: &RemoteEvent, _host: &Host) {
        self.observe(event);
    }

    fn quit(&mut self, code: i32) {
        info!(code, events = self.events_seen, "quit");
    }
}

plugin_main!(Sample::default());
