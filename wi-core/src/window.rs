// wi-core/src/window.rs
use ratatui::{buffer::Buffer, layout::Rect};
use slotmap::{Key, KeyData, SlotMap, new_key_type};
use std::fmt;
use std::str::FromStr;
use tracing::debug;

use crate::event::EventRegistry;
use crate::keybindings::{KeyBindings, KeyPress};
use crate::view::{EventResult, Size, View};

new_key_type! {
    /// Opaque handle to a window. The text form is only used to name windows
    /// in commands; traversal never goes through it.
    pub struct WindowId;
}

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.data().as_ffi())
    }
}

impl FromStr for WindowId {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        s.parse::<u64>()
            .map(|raw| WindowId::from(KeyData::from_ffi(raw)))
            .map_err(|_| WindowError::UnknownWindow(s.to_string()))
    }
}

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("unknown window \"{0}\"")]
    UnknownWindow(String),

    #[error("invalid docking \"{0}\"")]
    InvalidDocking(String),

    #[error("invalid border \"{0}\"")]
    InvalidBorder(String),

    #[error("window {parent} already has a child docked {docking}")]
    DockingTaken { parent: WindowId, docking: DockingType },

    #[error("the root window can't be {0}")]
    RootWindow(&'static str),

    #[error("{rect:?} doesn't fit the parent's client area {client:?}")]
    OutOfBounds { rect: Rect, client: Rect },

    #[error("window {0} is disabled")]
    Disabled(WindowId),
}

/// Placement of a window inside its parent's remaining client area.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DockingType {
    Fill,
    Floating,
    Left,
    Right,
    Top,
    Bottom,
}

impl DockingType {
    pub const ALL: [DockingType; 6] = [
        DockingType::Fill,
        DockingType::Floating,
        DockingType::Left,
        DockingType::Right,
        DockingType::Top,
        DockingType::Bottom,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            DockingType::Fill => "fill",
            DockingType::Floating => "floating",
            DockingType::Left => "left",
            DockingType::Right => "right",
            DockingType::Top => "top",
            DockingType::Bottom => "bottom",
        }
    }
}

impl fmt::Display for DockingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DockingType {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|d| d.as_str() == s)
            .ok_or_else(|| WindowError::InvalidDocking(s.to_string()))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BorderType {
    None,
    Single,
    Double,
}

impl BorderType {
    pub const ALL: [BorderType; 3] = [BorderType::None, BorderType::Single, BorderType::Double];

    pub fn as_str(self) -> &'static str {
        match self {
            BorderType::None => "none",
            BorderType::Single => "single",
            BorderType::Double => "double",
        }
    }

    // horizontal, vertical, top-left, top-right, bottom-left, bottom-right
    fn glyphs(self) -> [&'static str; 6] {
        match self {
            BorderType::Single => ["─", "│", "┌", "┐", "└", "┘"],
            _ => ["═", "║", "╔", "╗", "╚", "╝"],
        }
    }
}

impl fmt::Display for BorderType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BorderType {
    type Err = WindowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|b| b.as_str() == s)
            .ok_or_else(|| WindowError::InvalidBorder(s.to_string()))
    }
}

/// The edges of a border actually drawn for the current rect.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrawnBorder {
    None,
    Left,
    Right,
    Top,
    Bottom,
    All,
}

/// Which edges a window docked `docking` draws at size `rect`. Below the
/// thresholds the border collapses instead of eating the whole window.
pub fn calculate_effective_border(rect: Rect, docking: DockingType) -> DrawnBorder {
    match docking {
        DockingType::Fill => DrawnBorder::None,
        DockingType::Floating if rect.width >= 5 && rect.height >= 3 => DrawnBorder::All,
        DockingType::Left if rect.width > 1 && rect.height > 0 => DrawnBorder::Right,
        DockingType::Right if rect.width > 1 && rect.height > 0 => DrawnBorder::Left,
        DockingType::Top if rect.height > 1 && rect.width > 0 => DrawnBorder::Bottom,
        DockingType::Bottom if rect.height > 1 && rect.width > 0 => DrawnBorder::Top,
        _ => DrawnBorder::None,
    }
}

fn rect_within(inner: Rect, outer: Rect) -> bool {
    inner.x >= outer.x
        && inner.y >= outer.y
        && inner.right() <= outer.right()
        && inner.bottom() <= outer.bottom()
}

// Amount a docked child takes along one axis: its natural size, one more
// cell for the border, never more than what is left.
fn allot(natural: u16, remaining: u16, bordered: bool) -> u16 {
    if natural >= remaining {
        remaining
    } else if bordered {
        natural + 1
    } else {
        natural
    }
}

fn floating_rect(natural: Size, bordered: bool, root: Rect) -> Rect {
    let extra = if bordered { 2 } else { 0 };
    let width = natural.width.saturating_add(extra).min(root.width);
    let height = natural.height.saturating_add(extra).min(root.height);
    Rect::new(
        root.width.saturating_sub(width).saturating_sub(1) / 2,
        root.height.saturating_sub(height).saturating_sub(1) / 2,
        width,
        height,
    )
}

fn fill(buf: &mut Buffer, area: Rect, symbol: &str) {
    for y in area.top()..area.bottom() {
        for x in area.left()..area.right() {
            if let Some(cell) = buf.cell_mut((x, y)) {
                cell.set_symbol(symbol);
            }
        }
    }
}

// Copy `src` into `frame` at `dest`, clipped to the frame.
fn blit(src: &Buffer, dest: Rect, frame: &mut Buffer) {
    let bounds = frame.area;
    for y in 0..dest.height {
        for x in 0..dest.width {
            let (Some(fx), Some(fy)) = (dest.x.checked_add(x), dest.y.checked_add(y)) else {
                continue;
            };
            if fx >= bounds.right() || fy >= bounds.bottom() || fx < bounds.x || fy < bounds.y {
                continue;
            }
            if let (Some(from), Some(to)) = (src.cell((x, y)), frame.cell_mut((fx, fy))) {
                *to = from.clone();
            }
        }
    }
}

/// One node of the tree. Owns its view and a backing buffer the size of its
/// rect, border included.
pub struct Window {
    parent: Option<WindowId>,
    children: Vec<WindowId>,
    seq: u32,
    next_child_seq: u32,
    docking: DockingType,
    border: BorderType,
    effective_border: DrawnBorder,
    // Relative to the parent's origin, screen absolute when floating.
    rect: Rect,
    // Both relative to this window's origin.
    client_area: Rect,
    view_rect: Rect,
    // Forces the next set_rect through even if the rect is unchanged.
    stale: bool,
    buffer: Buffer,
    view: Box<dyn View>,
    keys: KeyBindings,
}

impl Window {
    fn new(parent: Option<WindowId>, seq: u32, view: Box<dyn View>, docking: DockingType) -> Self {
        let border = if docking == DockingType::Floating {
            BorderType::Double
        } else {
            BorderType::None
        };
        let keys = view.key_bindings();
        Self {
            parent,
            children: Vec::new(),
            seq,
            next_child_seq: 0,
            docking,
            border,
            effective_border: DrawnBorder::None,
            rect: Rect::default(),
            client_area: Rect::default(),
            view_rect: Rect::default(),
            stale: true,
            buffer: Buffer::empty(Rect::default()),
            view,
            keys,
        }
    }

    pub fn parent(&self) -> Option<WindowId> {
        self.parent
    }

    pub fn children(&self) -> &[WindowId] {
        &self.children
    }

    pub fn docking(&self) -> DockingType {
        self.docking
    }

    pub fn border(&self) -> BorderType {
        self.border
    }

    pub fn effective_border(&self) -> DrawnBorder {
        self.effective_border
    }

    pub fn rect(&self) -> Rect {
        self.rect
    }

    pub fn client_area(&self) -> Rect {
        self.client_area
    }

    /// Part of the client area left to the view once children are placed
    pub fn view_rect(&self) -> Rect {
        self.view_rect
    }

    pub fn view(&self) -> &dyn View {
        self.view.as_ref()
    }

    pub fn title(&self) -> &str {
        self.view.title()
    }

    pub fn keys(&self) -> &KeyBindings {
        &self.keys
    }

    // Recompute the effective border and client area, then draw the border
    // into the backing buffer.
    fn update_border(&mut self) {
        self.effective_border = match self.border {
            BorderType::None => DrawnBorder::None,
            _ => calculate_effective_border(self.rect, self.docking),
        };
        let (w, h) = (self.rect.width, self.rect.height);
        let [horizontal, vertical, tl, tr, bl, br] = self.border.glyphs();
        let buf = &mut self.buffer;
        self.client_area = match self.effective_border {
            DrawnBorder::None => Rect::new(0, 0, w, h),
            DrawnBorder::Left => {
                fill(buf, Rect::new(0, 0, 1, h), vertical);
                Rect::new(1, 0, w - 1, h)
            }
            DrawnBorder::Right => {
                fill(buf, Rect::new(w - 1, 0, 1, h), vertical);
                Rect::new(0, 0, w - 1, h)
            }
            DrawnBorder::Top => {
                fill(buf, Rect::new(0, 0, w, 1), horizontal);
                Rect::new(0, 1, w, h - 1)
            }
            DrawnBorder::Bottom => {
                fill(buf, Rect::new(0, h - 1, w, 1), horizontal);
                Rect::new(0, 0, w, h - 1)
            }
            DrawnBorder::All => {
                fill(buf, Rect::new(0, 0, 1, 1), tl);
                fill(buf, Rect::new(w - 1, 0, 1, 1), tr);
                fill(buf, Rect::new(0, h - 1, 1, 1), bl);
                fill(buf, Rect::new(w - 1, h - 1, 1, 1), br);
                fill(buf, Rect::new(1, 0, w - 2, 1), horizontal);
                fill(buf, Rect::new(1, h - 1, w - 2, 1), horizontal);
                fill(buf, Rect::new(0, 1, 1, h - 2), vertical);
                fill(buf, Rect::new(w - 1, 1, 1, h - 2), vertical);
                Rect::new(1, 1, w - 2, h - 2)
            }
        };
    }
}

/// The window hierarchy. Only the control loop mutates it, so it carries no
/// locking of its own.
pub struct WindowTree {
    windows: SlotMap<WindowId, Window>,
    root: WindowId,
    active: WindowId,
    events: EventRegistry,
    dirty: bool,
}

impl WindowTree {
    /// Root window docked Fill, covering `size`
    pub fn new(root_view: Box<dyn View>, size: Size, events: EventRegistry) -> Self {
        let mut windows: SlotMap<WindowId, Window> = SlotMap::with_key();
        let root = windows.insert(Window::new(None, 0, root_view, DockingType::Fill));
        windows[root].view.on_attach(root);
        let mut tree = Self {
            windows,
            root,
            active: root,
            events,
            dirty: true,
        };
        tree.set_rect(root, Rect::new(0, 0, size.width, size.height));
        tree
    }

    pub fn root(&self) -> WindowId {
        self.root
    }

    pub fn active(&self) -> WindowId {
        self.active
    }

    pub fn get(&self, id: WindowId) -> Option<&Window> {
        self.windows.get(id)
    }

    pub fn contains(&self, id: WindowId) -> bool {
        self.windows.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.windows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.windows.is_empty()
    }

    /// Turn the text form of an id back into a live window.
    pub fn resolve(&self, text: &str) -> Result<WindowId, WindowError> {
        let id: WindowId = text.parse()?;
        if self.windows.contains_key(id) {
            Ok(id)
        } else {
            Err(WindowError::UnknownWindow(text.to_string()))
        }
    }

    fn window(&self, id: WindowId) -> Result<&Window, WindowError> {
        self.windows
            .get(id)
            .ok_or_else(|| WindowError::UnknownWindow(id.to_string()))
    }

    /// Whether the frame needs to be composited again. Clears the flag.
    pub fn take_dirty(&mut self) -> bool {
        std::mem::take(&mut self.dirty)
    }

    pub fn mark_dirty(&mut self) {
        self.dirty = true;
    }

    /// Append a child window. Left, Right, Top and Bottom are unique per
    /// parent; Fill and Floating may repeat.
    pub fn new_child(
        &mut self,
        parent: WindowId,
        view: Box<dyn View>,
        docking: DockingType,
    ) -> Result<WindowId, WindowError> {
        let p = self.window(parent)?;
        debug!(parent = %self.path(parent), view = view.title(), %docking, "new child window");
        if !matches!(docking, DockingType::Fill | DockingType::Floating)
            && p.children.iter().any(|c| self.windows[*c].docking == docking)
        {
            return Err(WindowError::DockingTaken { parent, docking });
        }

        let seq = self.windows[parent].next_child_seq;
        self.windows[parent].next_child_seq += 1;
        let child = self
            .windows
            .insert(Window::new(Some(parent), seq, view, docking));
        self.windows[parent].children.push(child);
        self.windows[child].view.on_attach(child);
        self.resize_children(parent);
        self.events.trigger_window_created(&child);
        Ok(child)
    }

    /// Destroy `id` and its whole subtree. Focus falls back to the parent
    /// when it was inside the subtree.
    pub fn close(&mut self, id: WindowId) -> Result<(), WindowError> {
        let parent = self
            .window(id)?
            .parent
            .ok_or(WindowError::RootWindow("closed"))?;

        let mut doomed = Vec::new();
        self.collect_subtree(id, &mut doomed);
        self.windows[parent].children.retain(|c| *c != id);
        for w in &doomed {
            self.windows.remove(*w);
        }
        debug!(window = %id, count = doomed.len(), "closed window subtree");

        let refocus = !self.windows.contains_key(self.active);
        if refocus {
            self.active = parent;
        }
        self.resize_children(parent);
        for w in &doomed {
            self.events.trigger_window_closed(w);
        }
        if refocus {
            self.events.trigger_view_activated(&parent);
        }
        Ok(())
    }

    // Post-order, children before their parent.
    fn collect_subtree(&self, id: WindowId, out: &mut Vec<WindowId>) {
        if let Some(window) = self.windows.get(id) {
            for child in &window.children {
                self.collect_subtree(*child, out);
            }
            out.push(id);
        }
    }

    /// Move a window. A rect equal to the current one leaves the buffer
    /// alone but still flows through the children, so floating descendants
    /// follow the root.
    ///
    /// # Panics
    ///
    /// When a docked window ends up outside its parent's client area. The
    /// layout is corrupt at that point; commands check with
    /// [`WindowTree::fits_parent`] first.
    pub fn set_rect(&mut self, id: WindowId, rect: Rect) {
        let Some(window) = self.windows.get(id) else {
            return;
        };
        let changed = window.rect != rect || window.stale;
        if changed {
            if let (Some(parent), true) = (window.parent, window.docking != DockingType::Floating) {
                let client = self.windows[parent].client_area;
                if !rect_within(rect, client) {
                    panic!(
                        "window {} ({}) at {:?} doesn't fit the client area {:?} of its parent",
                        self.path(id),
                        window.title(),
                        rect,
                        client
                    );
                }
            }
            let window = &mut self.windows[id];
            window.rect = rect;
            window.stale = false;
            window.buffer = Buffer::empty(Rect::new(0, 0, rect.width, rect.height));
            window.update_border();
        }
        self.resize_children(id);
        if changed {
            self.events.trigger_window_resized(&id);
        }
    }

    /// Check a requested rect against the containment rule without moving
    /// anything.
    pub fn fits_parent(&self, id: WindowId, rect: Rect) -> Result<(), WindowError> {
        let window = self.window(id)?;
        match window.parent {
            Some(parent) if window.docking != DockingType::Floating => {
                let client = self.windows[parent].client_area;
                if rect_within(rect, client) {
                    Ok(())
                } else {
                    Err(WindowError::OutOfBounds { rect, client })
                }
            }
            _ => Ok(()),
        }
    }

    /// Lay out the children of `id` inside its client area.
    fn resize_children(&mut self, id: WindowId) {
        let Some(window) = self.windows.get(id) else {
            return;
        };
        debug!(window = %self.path(id), "resize children");
        let mut remaining = window.client_area;
        let children = window.children.clone();
        let screen = self.windows[self.root].rect;
        let mut fills = Vec::new();

        for child in children {
            let c = &self.windows[child];
            let natural = c.view.natural_size();
            let bordered = c.border != BorderType::None;
            let rect = match c.docking {
                DockingType::Fill => {
                    fills.push(child);
                    continue;
                }
                DockingType::Floating => floating_rect(natural, bordered, screen),
                DockingType::Left => {
                    let width = allot(natural.width, remaining.width, bordered);
                    let r = Rect::new(remaining.x, remaining.y, width, remaining.height);
                    remaining.x += width;
                    remaining.width -= width;
                    r
                }
                DockingType::Right => {
                    let width = allot(natural.width, remaining.width, bordered);
                    remaining.width -= width;
                    Rect::new(remaining.right(), remaining.y, width, remaining.height)
                }
                DockingType::Top => {
                    let height = allot(natural.height, remaining.height, bordered);
                    let r = Rect::new(remaining.x, remaining.y, remaining.width, height);
                    remaining.y += height;
                    remaining.height -= height;
                    r
                }
                DockingType::Bottom => {
                    let height = allot(natural.height, remaining.height, bordered);
                    remaining.height -= height;
                    Rect::new(remaining.x, remaining.bottom(), remaining.width, height)
                }
            };
            self.set_rect(child, rect);
        }

        // Every Fill sibling gets valid geometry, only the first is drawn.
        for child in &fills {
            self.set_rect(*child, remaining);
        }

        let window = &mut self.windows[id];
        window.view_rect = if fills.is_empty() {
            remaining
        } else {
            Rect::default()
        };
        window.view.set_size(window.view_rect.into());
        self.dirty = true;
    }

    /// Re-dock a window among its siblings.
    pub fn set_docking(&mut self, id: WindowId, docking: DockingType) -> Result<(), WindowError> {
        let parent = self
            .window(id)?
            .parent
            .ok_or(WindowError::RootWindow("re-docked"))?;
        if self.windows[id].docking == docking {
            return Ok(());
        }
        if !matches!(docking, DockingType::Fill | DockingType::Floating)
            && self.windows[parent]
                .children
                .iter()
                .any(|c| *c != id && self.windows[*c].docking == docking)
        {
            return Err(WindowError::DockingTaken { parent, docking });
        }
        let window = &mut self.windows[id];
        window.docking = docking;
        window.stale = true;
        self.resize_children(parent);
        Ok(())
    }

    pub fn set_border(&mut self, id: WindowId, border: BorderType) -> Result<(), WindowError> {
        self.window(id)?;
        let window = &mut self.windows[id];
        if window.border == border {
            return Ok(());
        }
        window.border = border;
        window.stale = true;
        let (parent, rect) = (window.parent, window.rect);
        match parent {
            Some(parent) => self.resize_children(parent),
            None => self.set_rect(id, rect),
        }
        Ok(())
    }

    /// Give keyboard focus to `id`.
    pub fn activate(&mut self, id: WindowId) -> Result<(), WindowError> {
        if self.window(id)?.view.is_disabled() {
            return Err(WindowError::Disabled(id));
        }
        if self.active != id {
            self.active = id;
            self.dirty = true;
            self.events.trigger_view_activated(&id);
        }
        Ok(())
    }

    /// Resize the root to the terminal size.
    pub fn resize(&mut self, size: Size) {
        self.set_rect(self.root, Rect::new(0, 0, size.width, size.height));
    }

    pub fn bind(&mut self, id: WindowId, key: &str, command: &str) -> Result<(), WindowError> {
        self.window(id)?;
        self.windows[id].keys.set(key, command);
        Ok(())
    }

    /// A global binding is a plain binding on the root window.
    pub fn bind_global(&mut self, key: &str, command: &str) {
        self.windows[self.root].keys.set(key, command);
    }

    /// Find the command bound to `key`, starting at the active window and
    /// walking up to the root.
    pub fn key_binding(&self, key: &KeyPress) -> Option<String> {
        let name = key.to_string();
        let mut current = Some(self.active);
        while let Some(id) = current {
            let window = self.windows.get(id)?;
            if let Some(command) = window.keys.get(&name) {
                return Some(command.to_string());
            }
            current = window.parent;
        }
        None
    }

    /// Hand a key to the active view. A view answering `Close` has its
    /// window closed, unless it is the root.
    pub fn handle_key(&mut self, key: &KeyPress) -> EventResult {
        let active = self.active;
        let Some(window) = self.windows.get_mut(active) else {
            return EventResult::Ignored;
        };
        let result = window.view.on_key(key);
        match result {
            EventResult::Consumed => self.dirty = true,
            EventResult::Close => {
                if self.close(active).is_err() {
                    self.dirty = true;
                }
            }
            EventResult::Ignored => {}
        }
        result
    }

    /// Hierarchical `0:1:2` form, for logs only.
    pub fn path(&self, id: WindowId) -> String {
        let mut parts = Vec::new();
        let mut current = Some(id);
        while let Some(w) = current.and_then(|c| self.windows.get(c)) {
            parts.push(w.seq.to_string());
            current = w.parent;
        }
        parts.reverse();
        parts.join(":")
    }

    /// One line per window, children indented under their parent.
    pub fn dump(&self) -> String {
        let mut out = String::new();
        self.dump_into(self.root, 0, &mut out);
        out
    }

    fn dump_into(&self, id: WindowId, depth: usize, out: &mut String) {
        let Some(w) = self.windows.get(id) else {
            return;
        };
        let r = w.rect;
        out.push_str(&format!(
            "{:indent$}{} {} {} {},{} {}x{}{}\n",
            "",
            self.path(id),
            w.title(),
            w.docking,
            r.x,
            r.y,
            r.width,
            r.height,
            if id == self.active { " *" } else { "" },
            indent = depth * 2
        ));
        for child in &w.children {
            self.dump_into(*child, depth + 1, out);
        }
    }

    /// Composite the whole tree into `frame`. Floating windows go on top of
    /// the docked ones, at screen coordinates.
    pub fn draw(&mut self, frame: &mut Buffer) {
        let mut floating = Vec::new();
        self.draw_window(self.root, (0, 0), frame, &mut floating);
        let mut i = 0;
        while i < floating.len() {
            let id = floating[i];
            self.draw_window(id, (0, 0), frame, &mut floating);
            i += 1;
        }
        self.dirty = false;
    }

    fn draw_window(
        &mut self,
        id: WindowId,
        offset: (u16, u16),
        frame: &mut Buffer,
        floating: &mut Vec<WindowId>,
    ) {
        let Some(window) = self.windows.get_mut(id) else {
            return;
        };
        let (ox, oy) = if window.docking == DockingType::Floating {
            (0, 0)
        } else {
            offset
        };
        let dest = Rect::new(
            ox.saturating_add(window.rect.x),
            oy.saturating_add(window.rect.y),
            window.rect.width,
            window.rect.height,
        );

        let Window {
            view,
            buffer,
            view_rect,
            ..
        } = &mut *window;
        if view_rect.width != 0 && view_rect.height != 0 {
            for y in view_rect.top()..view_rect.bottom() {
                for x in view_rect.left()..view_rect.right() {
                    if let Some(cell) = buffer.cell_mut((x, y)) {
                        cell.reset();
                    }
                }
            }
            view.render(*view_rect, buffer);
        }
        blit(buffer, dest, frame);

        let children = window.children.clone();
        let mut fill_found = false;
        for child in children {
            match self.windows[child].docking {
                DockingType::Fill => {
                    // Later Fill siblings are hidden tabs, floating windows
                    // under them included.
                    if fill_found {
                        continue;
                    }
                    fill_found = true;
                }
                DockingType::Floating => {
                    floating.push(child);
                    continue;
                }
                _ => {}
            }
            self.draw_window(child, (dest.x, dest.y), frame, floating);
        }
    }
}
