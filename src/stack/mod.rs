//! Node storage and per-layer ordering
//!
//! - `node`: `StackNode`, its `NodeState` flag set and the `NodeArena` pool
//! - `layer_stack`: `LayerStack`, draw-order assignment and the cover pass

pub mod layer_stack;
pub mod node;

pub use layer_stack::LayerStack;
pub use node::{NodeArena, NodeState, Slot, StackNode, StateFlag};
