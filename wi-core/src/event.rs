// wi-core/src/event.rs
use parking_lot::Mutex;
use std::any::Any;
use std::fmt;
use std::sync::Arc;

use crate::keybindings::KeyPress;
use crate::view::Size;
use crate::window::WindowId;

/// Command lines queued for execution, each one a command name followed by
/// its arguments.
pub type EnqueuedCommands = Vec<Vec<String>>;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum EventError {
    #[error("trying to unregister a non existing event listener {0}")]
    UnknownListener(EventId),
}

/// One kind of event the registry knows about.
///
/// Implemented by the marker types in [`kinds`]; callers normally use the
/// generated `register_*` / `trigger_*` methods instead.
pub trait Event: 'static {
    const KIND: EventKind;
    type Args: Any + Send + Sync;
}

/// Identifies one registration. The kind lives in the top byte so that
/// `unregister` can go straight to the owning list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct EventId(u64);

impl EventId {
    const KIND_SHIFT: u32 = 56;
    const SEQ_MASK: u64 = (1 << Self::KIND_SHIFT) - 1;

    fn new(kind: EventKind, seq: u64) -> Self {
        Self(((kind as u64) << Self::KIND_SHIFT) | (seq & Self::SEQ_MASK))
    }

    /// Kind encoded in the id, `None` for a forged id.
    pub fn kind(self) -> Option<EventKind> {
        EventKind::from_index((self.0 >> Self::KIND_SHIFT) as usize)
    }

    pub fn sequence(self) -> u64 {
        self.0 & Self::SEQ_MASK
    }

    pub fn as_u64(self) -> u64 {
        self.0
    }

    pub fn from_u64(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for EventId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.kind() {
            Some(kind) => write!(f, "{:?}#{}", kind, self.sequence()),
            None => write!(f, "invalid#{:x}", self.0),
        }
    }
}

type Callback = Arc<dyn Fn(&dyn Any) + Send + Sync>;

struct Listeners {
    next_seq: u64,
    lists: [Vec<(EventId, Callback)>; EventKind::COUNT],
}

/// Typed pub/sub registry for the fixed set of editor events.
///
/// One mutex guards every per-kind list. A trigger copies the list under the
/// lock and runs the callbacks after releasing it, sequentially and in
/// registration order, on the triggering thread. A callback may therefore
/// register or unregister listeners itself; whether a listener added during a
/// trigger sees that same trigger is unspecified.
#[derive(Clone)]
pub struct EventRegistry {
    inner: Arc<Mutex<Listeners>>,
}

impl Default for EventRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl EventRegistry {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Listeners {
                next_seq: 0,
                lists: std::array::from_fn(|_| Vec::new()),
            })),
        }
    }

    /// Register a callback for event kind `E`.
    pub fn register<E: Event>(&self, callback: impl Fn(&E::Args) + Send + Sync + 'static) -> EventId {
        let callback: Callback = Arc::new(move |args: &dyn Any| {
            if let Some(args) = args.downcast_ref::<E::Args>() {
                callback(args);
            }
        });

        let mut listeners = self.inner.lock();
        let id = EventId::new(E::KIND, listeners.next_seq);
        listeners.next_seq += 1;
        listeners.lists[E::KIND as usize].push((id, callback));
        id
    }

    /// Invoke every callback currently registered for `E`.
    pub fn trigger<E: Event>(&self, args: &E::Args) {
        let callbacks: Vec<Callback> = {
            let listeners = self.inner.lock();
            listeners.lists[E::KIND as usize]
                .iter()
                .map(|(_, callback)| callback.clone())
                .collect()
        };

        for callback in callbacks {
            callback(args);
        }
    }

    /// Remove exactly one registration.
    pub fn unregister(&self, id: EventId) -> Result<(), EventError> {
        let kind = id.kind().ok_or(EventError::UnknownListener(id))?;
        let mut listeners = self.inner.lock();
        let list = &mut listeners.lists[kind as usize];
        let index = list
            .iter()
            .position(|(registered, _)| *registered == id)
            .ok_or(EventError::UnknownListener(id))?;
        list.remove(index);
        Ok(())
    }

    pub fn listener_count(&self, kind: EventKind) -> usize {
        self.inner.lock().lists[kind as usize].len()
    }

    /// Start an empty subscription group bound to this registry.
    pub fn subscription(&self) -> Subscription {
        Subscription {
            ids: Vec::new(),
            registry: self.clone(),
        }
    }
}

/// Owned group of registrations - dropping it unregisters them all
pub struct Subscription {
    ids: Vec<EventId>,
    registry: EventRegistry,
}

impl Subscription {
    pub fn push(&mut self, id: EventId) {
        self.ids.push(id);
    }

    pub fn ids(&self) -> &[EventId] {
        &self.ids
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }

    /// Unregister every listener of the group. All of them are attempted; the
    /// first failure is returned.
    pub fn cancel(mut self) -> Result<(), EventError> {
        self.release()
    }

    fn release(&mut self) -> Result<(), EventError> {
        let mut first = None;
        for id in self.ids.drain(..) {
            if let Err(e) = self.registry.unregister(id) {
                first.get_or_insert(e);
            }
        }
        first.map_or(Ok(()), Err)
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        let _ = self.release();
    }
}

macro_rules! events {
    ($( $(#[$meta:meta])* $kind:ident($args:ty) => $register:ident, $trigger:ident; )*) => {
        /// Closed set of event kinds.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        #[repr(u8)]
        pub enum EventKind {
            $( $(#[$meta])* $kind, )*
        }

        impl EventKind {
            pub const ALL: &'static [EventKind] = &[$(EventKind::$kind,)*];
            pub const COUNT: usize = Self::ALL.len();

            pub fn from_index(index: usize) -> Option<Self> {
                Self::ALL.get(index).copied()
            }
        }

        /// Marker types, one per event kind.
        pub mod kinds {
            #[allow(unused_imports)]
            use super::*;

            $(
                pub struct $kind;

                impl super::Event for $kind {
                    const KIND: super::EventKind = super::EventKind::$kind;
                    type Args = $args;
                }
            )*
        }

        impl EventRegistry {
            $(
                pub fn $register(&self, callback: impl Fn(&$args) + Send + Sync + 'static) -> EventId {
                    self.register::<kinds::$kind>(callback)
                }

                pub fn $trigger(&self, args: &$args) {
                    self.trigger::<kinds::$kind>(args)
                }
            )*
        }
    };
}

events! {
    /// Command lines posted for the control loop.
    Commands(EnqueuedCommands) => register_commands, trigger_commands;
    EditorLanguage(String) => register_editor_language, trigger_editor_language;
    TerminalKeyPressed(KeyPress) => register_terminal_key_pressed, trigger_terminal_key_pressed;
    TerminalResized(Size) => register_terminal_resized, trigger_terminal_resized;
    /// A window received keyboard focus.
    ViewActivated(WindowId) => register_view_activated, trigger_view_activated;
    WindowCreated(WindowId) => register_window_created, trigger_window_created;
    WindowClosed(WindowId) => register_window_closed, trigger_window_closed;
    WindowResized(WindowId) => register_window_resized, trigger_window_resized;
}
