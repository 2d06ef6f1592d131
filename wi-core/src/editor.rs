// wi-core/src/editor.rs
use crossbeam::channel::{Receiver, unbounded};
use ratatui::{buffer::Buffer, layout::Rect};
use std::io;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::commands::{Command, CommandError};
use crate::event::{EnqueuedCommands, EventRegistry, Subscription};
use crate::keybindings::KeyPress;
use crate::registry::ViewRegistry;
use crate::terminal::Terminal;
use crate::view::{EventResult, Size, View};
use crate::window::{DockingType, WindowId, WindowTree};

/// How long an alert stays up when no key dismisses it.
pub const ALERT_TIMEOUT: Duration = Duration::from_secs(3);

/// View factory names the editor itself instantiates.
pub const ALERT_VIEW: &str = "alert";
pub const COMMAND_VIEW: &str = "command";

/// Executes commands against the window tree. Owned by the control loop;
/// anything else talks to it by posting `Commands` events.
pub struct Editor {
    tree: WindowTree,
    views: ViewRegistry,
    events: EventRegistry,
    queue: Receiver<EnqueuedCommands>,
    alert: Option<(WindowId, Instant)>,
    language: String,
    quitting: bool,
    _subscription: Subscription,
}

impl Editor {
    pub fn new(root_view: Box<dyn View>, views: ViewRegistry, events: EventRegistry, size: Size) -> Self {
        let (tx, queue) = unbounded();
        let mut subscription = events.subscription();
        subscription.push(events.register_commands(move |lines| {
            if tx.send(lines.clone()).is_err() {
                debug!("command queue is gone, dropping {} command(s)", lines.len());
            }
        }));
        let tree = WindowTree::new(root_view, size, events.clone());
        Self {
            tree,
            views,
            events,
            queue,
            alert: None,
            language: "en".to_string(),
            quitting: false,
            _subscription: subscription,
        }
    }

    pub fn tree(&self) -> &WindowTree {
        &self.tree
    }

    pub fn tree_mut(&mut self) -> &mut WindowTree {
        &mut self.tree
    }

    pub fn events(&self) -> &EventRegistry {
        &self.events
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn set_language(&mut self, language: &str) {
        if self.language != language {
            self.language = language.to_string();
            self.events.trigger_editor_language(&self.language);
            // Status views show the language.
            self.tree.mark_dirty();
        }
    }

    /// Receiving side of the command queue, for the control loop's select.
    pub fn queue(&self) -> Receiver<EnqueuedCommands> {
        self.queue.clone()
    }

    /// Enqueue command lines through the bus, like any other producer.
    pub fn post(&self, lines: EnqueuedCommands) {
        self.events.trigger_commands(&lines);
    }

    /// Run everything queued so far, in order. Returns how many command
    /// lines ran.
    pub fn drain(&mut self) -> usize {
        let mut count = 0;
        while let Ok(lines) = self.queue.try_recv() {
            count += lines.len();
            self.run_all(&lines);
        }
        count
    }

    pub fn run_all(&mut self, lines: &EnqueuedCommands) {
        for line in lines {
            self.run(line);
        }
    }

    /// Parse and execute one command line. Failures become an alert.
    pub fn run<S: AsRef<str>>(&mut self, line: &[S]) {
        if let Err(err) = Command::parse(line).and_then(|cmd| self.execute(cmd)) {
            warn!(error = %err, "command failed");
            self.alert(&err.to_string());
        }
    }

    pub fn execute(&mut self, cmd: Command) -> Result<(), CommandError> {
        debug!(command = cmd.name(), "execute");
        match cmd {
            Command::WindowNew {
                parent,
                docking,
                view,
                args,
            } => {
                let view = self
                    .views
                    .create(&view, &self.events, &args)
                    .ok_or(CommandError::UnknownView(view))?;
                let id = self.tree.new_child(parent, view, docking)?;
                // Disabled views (status bars) just don't take the focus.
                if self.tree.activate(id).is_err() {
                    debug!(window = %id, "new window not activated");
                }
            }
            Command::WindowClose(id) => {
                self.tree.close(id)?;
                if self.alert.is_some_and(|(alert, _)| !self.tree.contains(alert)) {
                    self.alert = None;
                }
            }
            Command::WindowSetDocking(id, docking) => self.tree.set_docking(id, docking)?,
            Command::WindowSetRect(id, rect) => {
                self.tree.fits_parent(id, rect)?;
                self.tree.set_rect(id, rect);
            }
            Command::WindowActivate(id) => self.tree.activate(id)?,
            Command::WindowLog => info!("window tree:\n{}", self.tree.dump()),
            Command::EditorRedraw => self.tree.mark_dirty(),
            Command::Alert(message) => self.alert(&message),
            Command::CommandShow => {
                let view = self
                    .views
                    .create(COMMAND_VIEW, &self.events, &[])
                    .ok_or(CommandError::MissingView(COMMAND_VIEW))?;
                let active = self.tree.active();
                let id = self.tree.new_child(active, view, DockingType::Floating)?;
                self.tree.activate(id)?;
            }
            Command::KeyBind { key, command } => self.tree.bind_global(&key, &command),
            Command::Quit => {
                info!("quit requested");
                self.quitting = true;
            }
        }
        Ok(())
    }

    /// Show `message` in a floating window until the next key or
    /// [`ALERT_TIMEOUT`].
    pub fn alert(&mut self, message: &str) {
        self.dismiss_alert();
        let Some(view) = self
            .views
            .create(ALERT_VIEW, &self.events, &[message.to_string()])
        else {
            warn!(message, "no alert view registered");
            return;
        };
        match self.tree.new_child(self.tree.root(), view, DockingType::Floating) {
            Ok(id) => self.alert = Some((id, Instant::now() + ALERT_TIMEOUT)),
            Err(err) => warn!(error = %err, "can't show alert"),
        }
    }

    pub fn alert_window(&self) -> Option<WindowId> {
        self.alert.map(|(id, _)| id)
    }

    fn dismiss_alert(&mut self) {
        if let Some((id, _)) = self.alert.take() {
            if self.tree.contains(id) {
                let _ = self.tree.close(id);
            }
        }
    }

    /// Expire the alert once its deadline passed.
    pub fn tick(&mut self, now: Instant) {
        if self.alert.is_some_and(|(_, deadline)| now >= deadline) {
            self.dismiss_alert();
        }
    }

    /// Bound keys run their command line; unbound Ctrl/Alt keys are reported;
    /// everything else goes to the active view.
    pub fn on_key(&mut self, key: KeyPress) {
        self.events.trigger_terminal_key_pressed(&key);
        self.dismiss_alert();

        if let Some(line) = self.tree.key_binding(&key) {
            let words: Vec<&str> = line.split_whitespace().collect();
            self.run(&words);
            return;
        }
        if key.is_meta() {
            self.alert(&format!("{key} is not mapped"));
            return;
        }
        if self.tree.handle_key(&key) == EventResult::Ignored {
            debug!(%key, "key ignored");
        }
    }

    pub fn on_resize(&mut self, size: Size) {
        self.tree.resize(size);
        self.events.trigger_terminal_resized(&size);
    }

    pub fn should_quit(&self) -> bool {
        self.quitting
    }

    /// Composite and hand the frame to `terminal` when something changed.
    pub fn render(&mut self, terminal: &mut dyn Terminal) -> io::Result<bool> {
        if !self.tree.take_dirty() {
            return Ok(false);
        }
        let size = terminal.size()?;
        let mut frame = Buffer::empty(Rect::new(0, 0, size.width, size.height));
        self.tree.draw(&mut frame);
        terminal.blit(&frame)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::terminal::BufferTerminal;
    use crossterm::event::{KeyCode, KeyModifiers};

    struct Label {
        text: String,
        disabled: bool,
    }

    impl Label {
        fn new(args: &[String]) -> Self {
            Self {
                text: args.join(" "),
                disabled: false,
            }
        }
    }

    impl View for Label {
        fn title(&self) -> &str {
            &self.text
        }

        fn natural_size(&self) -> Size {
            Size::new(self.text.len() as u16, 1)
        }

        fn render(&mut self, area: Rect, buf: &mut Buffer) {
            buf.set_stringn(area.x, area.y, &self.text, area.width as usize, ratatui::style::Style::default());
        }

        fn is_disabled(&self) -> bool {
            self.disabled
        }
    }

    struct Prompt {
        bus: EventRegistry,
        line: String,
    }

    impl View for Prompt {
        fn title(&self) -> &str {
            "command"
        }

        fn natural_size(&self) -> Size {
            Size::new(20, 1)
        }

        fn render(&mut self, _area: Rect, _buf: &mut Buffer) {}

        fn on_key(&mut self, key: &KeyPress) -> EventResult {
            match key.code {
                KeyCode::Char(c) => {
                    self.line.push(c);
                    EventResult::Consumed
                }
                KeyCode::Enter => {
                    let words = self.line.split_whitespace().map(String::from).collect();
                    self.bus.trigger_commands(&vec![words]);
                    EventResult::Close
                }
                _ => EventResult::Ignored,
            }
        }
    }

    fn editor() -> Editor {
        let mut views = ViewRegistry::new();
        crate::register_view_no_bus!(views, "label", Label);
        crate::register_view_no_bus!(views, ALERT_VIEW, Label);
        views.register(
            "status",
            Box::new(|_bus, args| {
                Box::new(Label {
                    text: args.join(" "),
                    disabled: true,
                })
            }),
        );
        views.register(
            COMMAND_VIEW,
            Box::new(|bus, _args| {
                Box::new(Prompt {
                    bus: bus.clone(),
                    line: String::new(),
                })
            }),
        );
        Editor::new(
            Box::new(Label::new(&[])),
            views,
            EventRegistry::new(),
            Size::new(40, 10),
        )
    }

    fn line(words: &str) -> Vec<String> {
        words.split_whitespace().map(String::from).collect()
    }

    #[test]
    fn test_window_new_creates_and_activates() {
        let mut editor = editor();
        let root = editor.tree().root();
        editor.post(vec![line(&format!("window_new {root} left label hi"))]);
        assert_eq!(editor.drain(), 1);

        let tree = editor.tree();
        let child = tree.active();
        assert_ne!(child, root);
        assert_eq!(tree.get(child).unwrap().title(), "hi");
        assert_eq!(tree.get(child).unwrap().rect(), Rect::new(0, 0, 2, 10));
    }

    #[test]
    fn test_disabled_window_is_created_but_not_focused() {
        let mut editor = editor();
        let root = editor.tree().root();
        editor.run(&line(&format!("window_new {root} bottom status ready")));
        assert_eq!(editor.tree().len(), 2);
        assert_eq!(editor.tree().active(), root);
    }

    #[test]
    fn test_errors_become_alerts() {
        let mut editor = editor();
        let root = editor.tree().root();
        editor.run(&line(&format!("window_new {root} sideways label x")));
        let alert = editor.alert_window().unwrap();
        assert_eq!(editor.tree().get(alert).unwrap().title(), "invalid docking \"sideways\"");

        // A new alert replaces the previous one.
        editor.run(&line("window_close 12345"));
        assert!(!editor.tree().contains(alert));
        assert_eq!(editor.tree().len(), 2);

        editor.run(&line(&format!("window_new {root} left nothing")));
        let alert = editor.alert_window().unwrap();
        assert_eq!(editor.tree().get(alert).unwrap().title(), "unknown view \"nothing\"");
    }

    #[test]
    fn test_alert_is_dismissed_by_key_or_timeout() {
        let mut editor = editor();
        editor.run(&line("alert hello"));
        let alert = editor.alert_window().unwrap();
        assert_eq!(editor.tree().get(alert).unwrap().docking(), DockingType::Floating);

        editor.on_key(KeyPress::char('x'));
        assert!(editor.alert_window().is_none());
        assert!(!editor.tree().contains(alert));

        editor.run(&line("alert again"));
        editor.tick(Instant::now());
        assert!(editor.alert_window().is_some());
        editor.tick(Instant::now() + ALERT_TIMEOUT + Duration::from_millis(1));
        assert!(editor.alert_window().is_none());
        assert_eq!(editor.tree().len(), 1);
    }

    #[test]
    fn test_unmapped_meta_key_alerts() {
        let mut editor = editor();
        editor.on_key(KeyPress::ctrl('z'));
        let alert = editor.alert_window().unwrap();
        assert_eq!(editor.tree().get(alert).unwrap().title(), "Ctrl-z is not mapped");
    }

    #[test]
    fn test_key_bind_and_quit() {
        let mut editor = editor();
        editor.run(&line("key_bind Ctrl-q quit"));
        assert!(!editor.should_quit());
        editor.on_key(KeyPress::ctrl('q'));
        assert!(editor.should_quit());
        assert!(editor.alert_window().is_none());
    }

    #[test]
    fn test_command_prompt_round_trip() {
        let mut editor = editor();
        editor.run(&line("command_show"));
        let prompt = editor.tree().active();
        assert_eq!(editor.tree().get(prompt).unwrap().title(), "command");

        for c in "quit".chars() {
            editor.on_key(KeyPress::char(c));
        }
        editor.on_key(KeyPress::new(KeyCode::Enter, KeyModifiers::NONE));
        assert!(!editor.tree().contains(prompt));
        assert!(!editor.should_quit());
        editor.drain();
        assert!(editor.should_quit());
    }

    #[test]
    fn test_set_rect_outside_is_a_command_error() {
        let mut editor = editor();
        let root = editor.tree().root();
        editor.run(&line(&format!("window_new {root} left label abc")));
        let child = editor.tree().active();
        let err = editor
            .execute(Command::WindowSetRect(child, Rect::new(35, 0, 10, 10)))
            .unwrap_err();
        assert!(matches!(err, CommandError::Window(_)));
        editor
            .execute(Command::WindowSetRect(child, Rect::new(0, 0, 3, 10)))
            .unwrap();
    }

    #[test]
    fn test_render_only_when_dirty() {
        let mut editor = editor();
        let root = editor.tree().root();
        let mut term = BufferTerminal::new(Size::new(40, 10));
        editor.run(&line(&format!("window_new {root} top label status")));

        assert!(editor.render(&mut term).unwrap());
        assert!(term.line(0).starts_with("status"));
        assert!(!editor.render(&mut term).unwrap());

        editor.run(&line("editor_redraw"));
        assert!(editor.render(&mut term).unwrap());
        assert_eq!(term.frames(), 2);
    }

    #[test]
    fn test_resize_and_language_events() {
        let mut editor = editor();
        let sizes = std::sync::Arc::new(parking_lot::Mutex::new(Vec::new()));
        let seen = sizes.clone();
        let _id = editor
            .events()
            .register_terminal_resized(move |size| seen.lock().push(*size));
        editor.on_resize(Size::new(100, 30));
        assert_eq!(*sizes.lock(), vec![Size::new(100, 30)]);
        assert_eq!(
            editor.tree().get(editor.tree().root()).unwrap().rect(),
            Rect::new(0, 0, 100, 30)
        );

        editor.set_language("fr");
        assert_eq!(editor.language(), "fr");
    }
}
