//! # winstack
//!
//! Layered window-stack orchestration for modal and overlay interfaces.
//! Decides which open windows are visible, interactive and paused, and in
//! what draw order, under multi-instance limits, inter-window dependencies
//! and a recycle cache.
//!
//! ## Architecture
//!
//! - `window`: window-facing traits (`Window`, `WindowFactory`, `Renderable`),
//!   handles, events and per-open configuration
//! - `stack`: node storage (`NodeArena`) and per-layer ordering with the
//!   cover pass (`LayerStack`)
//! - `host`: collaborators supplied by the host (resource loader, animation
//!   player, dependency config resolver)
//! - `manager`: the `WindowManager` orchestrator
//! - `config`: TOML configuration
//! - `scenario`: headless scenario runner used by the CLI
//!
//! ## Usage
//!
//! ```rust,no_run
//! use winstack::{ResourceLoader, Renderable, StackConfig, Window, WindowManager, WindowOpenConfig};
//!
//! struct Surface;
//! impl Renderable for Surface {}
//!
//! struct Loader;
//! impl ResourceLoader for Loader {
//!     fn load(&mut self, _window_id: &str) -> Option<Box<dyn Renderable>> {
//!         Some(Box::new(Surface))
//!     }
//! }
//!
//! struct Inventory;
//! impl Window for Inventory {}
//!
//! fn main() -> anyhow::Result<()> {
//!     let factory = |_: &str| -> Option<Box<dyn Window>> { Some(Box::new(Inventory)) };
//!     let mut manager = WindowManager::new(&StackConfig::default(), Loader, factory)?;
//!     let handle = manager.open(WindowOpenConfig::new("inventory"), serde_json::Value::Null)?;
//!     manager.close(handle, true);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod error;
pub mod host;
pub mod manager;
pub mod scenario;
pub mod stack;
pub mod window;

// Re-export main types for easy access
pub use config::{StackConfig, WinstackConfig};
pub use error::OpenError;
pub use host::{
    AnimationPlayer, ConfigResolver, InstantTransitions, LoadCompleter, LoadTicket,
    ResourceLoader, TransitionDone, TransitionTicket, WindowCatalog,
};
pub use manager::WindowManager;
pub use scenario::{Report, Scenario, ScenarioRunner};
pub use stack::{LayerStack, NodeArena, NodeState, StackNode, StateFlag};
pub use window::{
    CachePolicy, CoverBehavior, DependencyMissingPolicy, OpenArgs, OpenBehavior, OverflowPolicy,
    Renderable, UiLayer, Window, WindowAttr, WindowEvent, WindowFactory, WindowHandle,
    WindowOpenConfig,
};

/// Version information for winstack
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DESCRIPTION: &str = env!("CARGO_PKG_DESCRIPTION");
pub const BUILD_DATE: &str = env!("WINSTACK_BUILD_DATE");
pub const GIT_COMMIT: &str = env!("WINSTACK_GIT_COMMIT");
