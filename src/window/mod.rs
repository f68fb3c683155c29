//! Window-facing types
//!
//! This module defines what the stack orchestrator knows about a window:
//! - `Window`: the logical window object and its lifecycle callbacks
//! - `WindowFactory`: resolves a window id into a concrete `Window`
//! - `Renderable`: opaque handle to the on-screen object produced by the loader
//! - `WindowEvent`: notifications emitted to manager listeners
//!
//! Rendering, input dispatch and scene instantiation live in the host; the
//! orchestrator only toggles visibility, interaction and draw order through
//! the `Renderable` handle.

pub mod open_config;

pub use open_config::{
    CachePolicy, CoverBehavior, DependencyMissingPolicy, OpenBehavior, OverflowPolicy, UiLayer,
    WindowAttr, WindowOpenConfig,
};

use std::fmt;

/// Arguments forwarded to `Window::on_open`.
pub type OpenArgs = serde_json::Value;

/// Process-unique handle of one open window instance.
///
/// Handles are never reused, so a handle that outlives its node is simply
/// stale and every operation on it is a no-op.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowHandle(u64);

impl WindowHandle {
    pub(crate) fn new(raw: u64) -> Self {
        Self(raw)
    }

    pub fn raw(self) -> u64 {
        self.0
    }
}

impl fmt::Display for WindowHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Lifecycle callbacks of a logical window.
///
/// The orchestrator invokes these at the transitions it owns; the
/// application observes them and never calls them directly. All callbacks
/// default to no-ops.
pub trait Window {
    /// Called once, when the window object is bound to a freshly loaded node
    fn on_create(&mut self) {}
    /// Called on every open, including reuse from the recycle cache
    fn on_open(&mut self, _args: &OpenArgs) {}
    /// Called before the open transition starts
    fn on_before_show(&mut self) {}
    fn on_show(&mut self) {}
    fn on_resume(&mut self) {}
    fn on_covered(&mut self) {}
    fn on_uncovered(&mut self) {}
    /// Per-frame update, only while not paused
    fn on_update(&mut self, _dt: f32) {}
    fn on_pause(&mut self) {}
    /// Called before the close transition starts
    fn on_before_hide(&mut self) {}
    fn on_hide(&mut self) {}
    /// Called once the close transition has completed
    fn on_close(&mut self) {}
    fn on_destroy(&mut self) {}
}

/// Window Class Resolver: window id to concrete window object.
pub trait WindowFactory {
    /// `None` when the id maps to no instantiable window type.
    fn create(&mut self, window_id: &str) -> Option<Box<dyn Window>>;
}

impl<F> WindowFactory for F
where
    F: FnMut(&str) -> Option<Box<dyn Window>>,
{
    fn create(&mut self, window_id: &str) -> Option<Box<dyn Window>> {
        self(window_id)
    }
}

/// Opaque on-screen object produced by the resource loader.
pub trait Renderable {
    fn set_draw_order(&mut self, _order: i32) {}
    fn set_interactable(&mut self, _interactable: bool) {}
    fn set_visible(&mut self, _visible: bool) {}
}

/// Notifications delivered to listeners registered on the manager.
#[derive(Debug, Clone, PartialEq)]
pub enum WindowEvent {
    Opened { handle: WindowHandle, window_id: String },
    OpenFailed { handle: Option<WindowHandle>, window_id: String, reason: String },
    Shown(WindowHandle),
    Hidden(WindowHandle),
    Paused(WindowHandle),
    Resumed(WindowHandle),
    Covered(WindowHandle),
    Uncovered(WindowHandle),
    Closed { handle: WindowHandle, window_id: String },
    Destroyed { window_id: String },
}
