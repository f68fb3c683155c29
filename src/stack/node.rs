//! Stack nodes and the slot arena that owns them
//!
//! A `StackNode` is one open (or cached) window instance. Nodes live in a
//! `NodeArena` owned by the manager; layer stacks refer to them by handle and
//! slot index. Slots freed by a close are reset field by field and kept in a
//! free pool for the next open.

use crate::window::{
    CoverBehavior, Renderable, Window, WindowEvent, WindowHandle, WindowOpenConfig,
};
use std::fmt;
use std::time::Instant;

/// Index of a node slot inside the arena.
pub type Slot = usize;

/// Independent lifecycle flags of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StateFlag {
    Paused,
    Hidden,
    Covered,
    Closing,
    Closed,
    Loading,
    Loaded,
}

impl StateFlag {
    pub const ALL: [StateFlag; 7] = [
        StateFlag::Paused,
        StateFlag::Hidden,
        StateFlag::Covered,
        StateFlag::Closing,
        StateFlag::Closed,
        StateFlag::Loading,
        StateFlag::Loaded,
    ];

    fn bit(self) -> u8 {
        match self {
            StateFlag::Paused => 1 << 0,
            StateFlag::Hidden => 1 << 1,
            StateFlag::Covered => 1 << 2,
            StateFlag::Closing => 1 << 3,
            StateFlag::Closed => 1 << 4,
            StateFlag::Loading => 1 << 5,
            StateFlag::Loaded => 1 << 6,
        }
    }
}

/// Set of co-occurring `StateFlag`s, e.g. `Hidden | Closed`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct NodeState(u8);

impl NodeState {
    pub const EMPTY: NodeState = NodeState(0);

    pub fn contains(self, flag: StateFlag) -> bool {
        self.0 & flag.bit() != 0
    }

    pub fn insert(&mut self, flag: StateFlag) {
        self.0 |= flag.bit();
    }

    pub fn remove(&mut self, flag: StateFlag) {
        self.0 &= !flag.bit();
    }

    pub fn is_empty(self) -> bool {
        self.0 == 0
    }

    pub fn is_paused(self) -> bool {
        self.contains(StateFlag::Paused)
    }

    pub fn is_hidden(self) -> bool {
        self.contains(StateFlag::Hidden)
    }

    pub fn is_covered(self) -> bool {
        self.contains(StateFlag::Covered)
    }

    pub fn is_closing(self) -> bool {
        self.contains(StateFlag::Closing)
    }

    pub fn is_closed(self) -> bool {
        self.contains(StateFlag::Closed)
    }

    pub fn is_loading(self) -> bool {
        self.contains(StateFlag::Loading)
    }

    pub fn is_loaded(self) -> bool {
        self.contains(StateFlag::Loaded)
    }

    pub fn iter(self) -> impl Iterator<Item = StateFlag> {
        StateFlag::ALL.into_iter().filter(move |flag| self.contains(*flag))
    }
}

impl fmt::Debug for NodeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.iter()).finish()
    }
}

/// One window instance tracked by the manager.
#[derive(Default)]
pub struct StackNode {
    id: Option<WindowHandle>,
    window_id: String,
    config: WindowOpenConfig,
    state: NodeState,
    window: Option<Box<dyn Window>>,
    renderable: Option<Box<dyn Renderable>>,
    expire_at: Option<Instant>,
    draw_order: i32,
}

impl fmt::Debug for StackNode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StackNode")
            .field("id", &self.id)
            .field("window_id", &self.window_id)
            .field("state", &self.state)
            .field("has_window", &self.window.is_some())
            .field("has_renderable", &self.renderable.is_some())
            .field("expire_at", &self.expire_at)
            .field("draw_order", &self.draw_order)
            .finish()
    }
}

impl StackNode {
    pub fn id(&self) -> Option<WindowHandle> {
        self.id
    }

    pub fn window_id(&self) -> &str {
        &self.window_id
    }

    pub fn config(&self) -> &WindowOpenConfig {
        &self.config
    }

    pub fn state(&self) -> NodeState {
        self.state
    }

    pub fn is_paused(&self) -> bool {
        self.state.is_paused()
    }

    pub fn is_hidden(&self) -> bool {
        self.state.is_hidden()
    }

    pub fn is_covered(&self) -> bool {
        self.state.is_covered()
    }

    pub fn is_closing(&self) -> bool {
        self.state.is_closing()
    }

    pub fn is_closed(&self) -> bool {
        self.state.is_closed()
    }

    pub fn is_loading(&self) -> bool {
        self.state.is_loading()
    }

    pub fn is_loaded(&self) -> bool {
        self.state.is_loaded()
    }

    pub fn has_renderable(&self) -> bool {
        self.renderable.is_some()
    }

    pub fn expire_at(&self) -> Option<Instant> {
        self.expire_at
    }

    /// In-layer draw order (position × layer spacing).
    pub fn draw_order(&self) -> i32 {
        self.draw_order
    }

    /// A slot nobody holds: no id, no window, no renderable, no flags.
    pub fn is_vacant(&self) -> bool {
        self.id.is_none()
            && self.window_id.is_empty()
            && self.state.is_empty()
            && self.window.is_none()
            && self.renderable.is_none()
            && self.expire_at.is_none()
            && self.draw_order == 0
    }

    pub(crate) fn initialize(
        &mut self,
        id: WindowHandle,
        config: WindowOpenConfig,
        window: Box<dyn Window>,
    ) {
        self.id = Some(id);
        self.window_id = config.window_id.clone();
        self.config = config;
        self.state = NodeState::EMPTY;
        self.window = Some(window);
        self.renderable = None;
        self.expire_at = None;
        self.draw_order = 0;
        self.state.insert(StateFlag::Loading);
    }

    /// Loading -> Loaded. The node stays hidden and paused until the first
    /// cover pass reveals it.
    pub(crate) fn attach_renderable(&mut self, mut renderable: Box<dyn Renderable>) {
        renderable.set_visible(false);
        renderable.set_interactable(false);
        self.renderable = Some(renderable);
        self.state.remove(StateFlag::Loading);
        self.state.insert(StateFlag::Loaded);
        self.state.insert(StateFlag::Hidden);
        self.state.insert(StateFlag::Paused);
    }

    /// Brings a cached, closed node back under a fresh handle.
    pub(crate) fn reopen(&mut self, id: WindowHandle, config: WindowOpenConfig) {
        self.id = Some(id);
        self.window_id = config.window_id.clone();
        self.config = config;
        self.expire_at = None;
        self.state.remove(StateFlag::Closed);
        self.state.remove(StateFlag::Covered);
        self.state.insert(StateFlag::Hidden);
        self.state.insert(StateFlag::Paused);
    }

    pub(crate) fn window_mut(&mut self) -> Option<&mut (dyn Window + 'static)> {
        self.window.as_deref_mut()
    }

    pub(crate) fn renderable_mut(&mut self) -> Option<&mut (dyn Renderable + 'static)> {
        self.renderable.as_deref_mut()
    }

    pub(crate) fn set_interactable(&mut self, interactable: bool) {
        if let Some(renderable) = self.renderable.as_deref_mut() {
            renderable.set_interactable(interactable);
        }
    }

    pub(crate) fn set_draw_order(&mut self, local: i32, global: i32) {
        self.draw_order = local;
        if let Some(renderable) = self.renderable.as_deref_mut() {
            renderable.set_draw_order(global);
        }
    }

    pub(crate) fn set_expire_at(&mut self, expire_at: Option<Instant>) {
        self.expire_at = expire_at;
    }

    pub(crate) fn begin_closing(&mut self) {
        self.state.insert(StateFlag::Closing);
    }

    /// Closing -> Closed|Paused|Hidden. Callers hide and pause first so the
    /// matching callbacks have already fired.
    pub(crate) fn mark_closed(&mut self) {
        self.state.remove(StateFlag::Closing);
        self.state.insert(StateFlag::Closed);
        self.state.insert(StateFlag::Paused);
        self.state.insert(StateFlag::Hidden);
    }

    pub(crate) fn set_covered(&mut self, covered: bool, events: &mut Vec<WindowEvent>) {
        if self.state.is_covered() == covered {
            return;
        }
        if covered {
            self.state.insert(StateFlag::Covered);
        } else {
            self.state.remove(StateFlag::Covered);
        }
        if !self.state.is_loaded() {
            return;
        }
        if let Some(window) = self.window.as_deref_mut() {
            if covered {
                window.on_covered();
            } else {
                window.on_uncovered();
            }
        }
        if let Some(id) = self.id {
            events.push(if covered {
                WindowEvent::Covered(id)
            } else {
                WindowEvent::Uncovered(id)
            });
        }
    }

    pub(crate) fn set_hidden(&mut self, hidden: bool, events: &mut Vec<WindowEvent>) {
        if self.state.is_hidden() == hidden {
            return;
        }
        if hidden {
            self.state.insert(StateFlag::Hidden);
        } else {
            self.state.remove(StateFlag::Hidden);
        }
        if !self.state.is_loaded() {
            return;
        }
        if let Some(renderable) = self.renderable.as_deref_mut() {
            renderable.set_visible(!hidden);
        }
        if let Some(window) = self.window.as_deref_mut() {
            if hidden {
                window.on_hide();
            } else {
                window.on_show();
            }
        }
        if let Some(id) = self.id {
            events.push(if hidden {
                WindowEvent::Hidden(id)
            } else {
                WindowEvent::Shown(id)
            });
        }
    }

    pub(crate) fn set_paused(&mut self, paused: bool, events: &mut Vec<WindowEvent>) {
        if self.state.is_paused() == paused {
            return;
        }
        if paused {
            self.state.insert(StateFlag::Paused);
        } else {
            self.state.remove(StateFlag::Paused);
        }
        if !self.state.is_loaded() {
            return;
        }
        if let Some(window) = self.window.as_deref_mut() {
            if paused {
                window.on_pause();
            } else {
                window.on_resume();
            }
        }
        if let Some(id) = self.id {
            events.push(if paused {
                WindowEvent::Paused(id)
            } else {
                WindowEvent::Resumed(id)
            });
        }
    }

    pub(crate) fn apply_behavior(&mut self, behavior: CoverBehavior, events: &mut Vec<WindowEvent>) {
        match behavior {
            CoverBehavior::Normal => {
                self.set_hidden(false, events);
                self.set_paused(false, events);
            }
            CoverBehavior::Pause => {
                self.set_hidden(false, events);
                self.set_paused(true, events);
            }
            CoverBehavior::Hide => {
                self.set_paused(true, events);
                self.set_hidden(true, events);
            }
        }
    }

    /// Drops the window object and renderable after `on_destroy`.
    pub(crate) fn destroy(&mut self) {
        if let Some(window) = self.window.as_deref_mut() {
            window.on_destroy();
        }
        self.window = None;
        self.renderable = None;
    }

    /// Clears every field so a pooled slot carries nothing into its next use.
    pub(crate) fn reset(&mut self) {
        self.id = None;
        self.window_id.clear();
        self.config = WindowOpenConfig::default();
        self.state = NodeState::EMPTY;
        self.window = None;
        self.renderable = None;
        self.expire_at = None;
        self.draw_order = 0;
    }
}

/// Slot storage for every node plus the free pool of recycled slots.
#[derive(Debug, Default)]
pub struct NodeArena {
    slots: Vec<StackNode>,
    free: Vec<Slot>,
}

impl NodeArena {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, slot: Slot) -> Option<&StackNode> {
        self.slots.get(slot)
    }

    pub(crate) fn get_mut(&mut self, slot: Slot) -> Option<&mut StackNode> {
        self.slots.get_mut(slot)
    }

    /// Total slots ever allocated.
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Slots waiting in the free pool.
    pub fn pool_len(&self) -> usize {
        self.free.len()
    }

    /// Takes a slot from the free pool, or grows the arena.
    pub(crate) fn acquire(&mut self) -> Slot {
        if let Some(slot) = self.free.pop() {
            return slot;
        }
        self.slots.push(StackNode::default());
        self.slots.len() - 1
    }

    /// Resets the slot and returns it to the free pool.
    pub(crate) fn release(&mut self, slot: Slot) {
        if let Some(node) = self.slots.get_mut(slot) {
            node.reset();
            if !self.free.contains(&slot) {
                self.free.push(slot);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::RefCell;
    use std::rc::Rc;

    #[derive(Default)]
    struct Trace(Rc<RefCell<Vec<&'static str>>>);

    impl Window for Trace {
        fn on_show(&mut self) {
            self.0.borrow_mut().push("show");
        }
        fn on_hide(&mut self) {
            self.0.borrow_mut().push("hide");
        }
        fn on_pause(&mut self) {
            self.0.borrow_mut().push("pause");
        }
        fn on_resume(&mut self) {
            self.0.borrow_mut().push("resume");
        }
        fn on_destroy(&mut self) {
            self.0.borrow_mut().push("destroy");
        }
    }

    struct Surface;
    impl Renderable for Surface {}

    fn loaded_node(log: &Rc<RefCell<Vec<&'static str>>>) -> StackNode {
        let mut node = StackNode::default();
        node.initialize(
            WindowHandle::new(7),
            WindowOpenConfig::new("inventory"),
            Box::new(Trace(log.clone())),
        );
        node.attach_renderable(Box::new(Surface));
        node
    }

    #[test]
    fn test_flags_co_occur() {
        let mut state = NodeState::EMPTY;
        state.insert(StateFlag::Hidden);
        state.insert(StateFlag::Closed);

        assert!(state.is_hidden());
        assert!(state.is_closed());
        assert!(!state.is_paused());

        state.remove(StateFlag::Hidden);
        assert!(!state.is_hidden());
        assert!(state.is_closed());
        assert_eq!(state.iter().collect::<Vec<_>>(), vec![StateFlag::Closed]);
    }

    #[test]
    fn test_loading_replaced_by_loaded() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut node = StackNode::default();
        node.initialize(
            WindowHandle::new(1),
            WindowOpenConfig::new("inventory"),
            Box::new(Trace(log.clone())),
        );
        assert!(node.is_loading());
        assert!(!node.is_loaded());

        node.attach_renderable(Box::new(Surface));
        assert!(!node.is_loading());
        assert!(node.is_loaded());
        assert!(node.is_hidden());
        assert!(node.is_paused());
    }

    #[test]
    fn test_setters_fire_only_on_change() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut node = loaded_node(&log);
        let mut events = Vec::new();

        node.apply_behavior(CoverBehavior::Normal, &mut events);
        node.apply_behavior(CoverBehavior::Normal, &mut events);
        assert_eq!(*log.borrow(), vec!["show", "resume"]);

        node.apply_behavior(CoverBehavior::Hide, &mut events);
        assert_eq!(*log.borrow(), vec!["show", "resume", "pause", "hide"]);
        assert_eq!(events.len(), 4);
    }

    #[test]
    fn test_reset_clears_every_field() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut node = loaded_node(&log);
        node.set_draw_order(40, 1040);
        node.set_expire_at(Some(Instant::now()));

        node.reset();
        assert!(node.is_vacant());
    }

    #[test]
    fn test_arena_reuses_released_slots() {
        let mut arena = NodeArena::new();
        let a = arena.acquire();
        let b = arena.acquire();
        assert_ne!(a, b);

        arena.release(a);
        arena.release(a);
        assert_eq!(arena.pool_len(), 1);
        assert_eq!(arena.acquire(), a);
        assert_eq!(arena.pool_len(), 0);
        assert_eq!(arena.capacity(), 2);
    }
}
