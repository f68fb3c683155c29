//! Per-layer window ordering and cover propagation
//!
//! This module provides the `LayerStack` data structure: the bottom-to-top
//! order of the nodes in one `UiLayer`, their draw order, and the pass that
//! decides which of them are covered, paused or hidden.

use super::node::{NodeArena, Slot, StackNode};
use crate::window::{CoverBehavior, UiLayer, WindowEvent, WindowHandle};
use std::collections::HashMap;

/// Ordered nodes of a single layer.
///
/// Nodes are stored in bottom-to-top order, where index 0 is the bottom-most
/// node and the last index is the top-most one. Every mutation reassigns
/// draw orders and reruns the cover pass over the whole layer.
#[derive(Debug, Clone)]
pub struct LayerStack {
    layer: UiLayer,

    /// Draw order of position 0 in this layer
    base_order: i32,

    /// Draw-order distance between neighbours
    spacing: i32,

    /// Nodes ordered from bottom to top
    order: Vec<WindowHandle>,

    /// Fast lookup: handle → arena slot
    lookup: HashMap<WindowHandle, Slot>,

    /// Lifecycle notifications produced by cover passes, drained by the manager
    events: Vec<WindowEvent>,
}

impl LayerStack {
    pub fn new(layer: UiLayer, base_order: i32, spacing: i32) -> Self {
        Self {
            layer,
            base_order,
            spacing,
            order: Vec::new(),
            lookup: HashMap::new(),
            events: Vec::new(),
        }
    }

    pub fn layer(&self) -> UiLayer {
        self.layer
    }

    pub fn base_order(&self) -> i32 {
        self.base_order
    }

    /// Adds a node on top of the layer.
    ///
    /// A node already in the layer is moved to the top.
    pub(crate) fn push(&mut self, handle: WindowHandle, slot: Slot, nodes: &mut NodeArena) {
        if self.lookup.contains_key(&handle) {
            self.detach(handle);
        }

        self.order.push(handle);
        self.lookup.insert(handle, slot);
        self.reassign_draw_orders(nodes);
        self.refresh(nodes);
    }

    /// Removes a node from the layer.
    ///
    /// # Returns
    ///
    /// `true` if the node was in the layer
    pub(crate) fn remove(&mut self, handle: WindowHandle, nodes: &mut NodeArena) -> bool {
        if !self.detach(handle) {
            return false;
        }
        self.reassign_draw_orders(nodes);
        self.refresh(nodes);
        true
    }

    /// Places a node at `index` (0 = bottom). Out-of-range indices append on top.
    pub(crate) fn insert_at(
        &mut self,
        index: usize,
        handle: WindowHandle,
        slot: Slot,
        nodes: &mut NodeArena,
    ) {
        if self.lookup.contains_key(&handle) {
            self.detach(handle);
        }

        let index = index.min(self.order.len());
        self.order.insert(index, handle);
        self.lookup.insert(handle, slot);
        self.reassign_draw_orders(nodes);
        self.refresh(nodes);
    }

    /// Returns the top-most node.
    ///
    /// With `skip_exempt`, nodes flagged exempt from cover checks (overlays,
    /// marquees) are passed over.
    pub fn top(&self, skip_exempt: bool, nodes: &NodeArena) -> Option<WindowHandle> {
        if !skip_exempt {
            return self.order.last().copied();
        }
        self.order.iter().rev().copied().find(|handle| {
            self.node(*handle, nodes)
                .map(|node| !node.config().is_cover_exempt())
                .unwrap_or(false)
        })
    }

    /// Returns the bottom-most node.
    pub fn bottom(&self) -> Option<WindowHandle> {
        self.order.first().copied()
    }

    /// Returns the nodes in bottom-to-top order.
    pub fn all_nodes(&self) -> &[WindowHandle] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn contains(&self, handle: WindowHandle) -> bool {
        self.lookup.contains_key(&handle)
    }

    /// Arena slot of a node in this layer.
    pub fn slot_of(&self, handle: WindowHandle) -> Option<Slot> {
        self.lookup.get(&handle).copied()
    }

    /// Position 0 is the bottom-most node, `len() - 1` the top-most.
    pub fn position(&self, handle: WindowHandle) -> Option<usize> {
        if !self.lookup.contains_key(&handle) {
            return None;
        }
        self.order.iter().position(|h| *h == handle)
    }

    pub(crate) fn drain_events(&mut self) -> Vec<WindowEvent> {
        std::mem::take(&mut self.events)
    }

    /// Reruns the cover pass without changing membership.
    ///
    /// Needed when a node in the layer starts closing: it stops taking part
    /// and whatever it covered is re-evaluated.
    pub(crate) fn refresh(&mut self, nodes: &mut NodeArena) {
        let mut accumulated = CoverBehavior::Normal;
        let mut covered = false;

        for handle in self.order.iter().rev() {
            let Some(node) = self.lookup.get(handle).and_then(|slot| nodes.get_mut(*slot)) else {
                continue;
            };
            if node.is_closing() || node.is_closed() {
                continue;
            }

            if node.config().is_cover_exempt() {
                // Exempt nodes sit outside the pass; they always behave as uncovered
                node.set_covered(false, &mut self.events);
                node.apply_behavior(CoverBehavior::Normal, &mut self.events);
                continue;
            }

            node.set_covered(covered, &mut self.events);
            let effective = accumulated.max(node.config().when_covered);
            node.apply_behavior(effective, &mut self.events);

            accumulated = accumulated.max(node.config().open_behavior.imposed());
            covered = true;
        }
    }

    /// Removes a handle from both the order and the lookup without a pass.
    fn detach(&mut self, handle: WindowHandle) -> bool {
        if self.lookup.remove(&handle).is_none() {
            return false;
        }
        self.order.retain(|h| *h != handle);
        true
    }

    fn reassign_draw_orders(&mut self, nodes: &mut NodeArena) {
        for (i, handle) in self.order.iter().enumerate() {
            let local = i as i32 * self.spacing;
            if let Some(node) = self.lookup.get(handle).and_then(|slot| nodes.get_mut(*slot)) {
                node.set_draw_order(local, self.base_order + local);
            }
        }
    }

    fn node<'a>(&self, handle: WindowHandle, nodes: &'a NodeArena) -> Option<&'a StackNode> {
        self.lookup.get(&handle).and_then(|slot| nodes.get(*slot))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::window::{OpenBehavior, Renderable, Window, WindowAttr, WindowOpenConfig};
    use proptest::prelude::*;

    struct Blank;
    impl Window for Blank {}
    impl Renderable for Blank {}

    struct Fixture {
        nodes: NodeArena,
        stack: LayerStack,
        next: u64,
    }

    impl Fixture {
        fn new() -> Self {
            Self {
                nodes: NodeArena::new(),
                stack: LayerStack::new(UiLayer::Default, 1000, 20),
                next: 1,
            }
        }

        fn loaded(&mut self, config: WindowOpenConfig) -> (WindowHandle, Slot) {
            let handle = WindowHandle::new(self.next);
            self.next += 1;
            let slot = self.nodes.acquire();
            let node = self.nodes.get_mut(slot).unwrap();
            node.initialize(handle, config, Box::new(Blank));
            node.attach_renderable(Box::new(Blank));
            (handle, slot)
        }

        fn push(&mut self, config: WindowOpenConfig) -> WindowHandle {
            let (handle, slot) = self.loaded(config);
            self.stack.push(handle, slot, &mut self.nodes);
            handle
        }

        fn node(&self, handle: WindowHandle) -> &StackNode {
            self.nodes.get(self.stack.slot_of(handle).unwrap()).unwrap()
        }

        fn draw_orders(&self) -> Vec<i32> {
            self.stack
                .all_nodes()
                .iter()
                .map(|h| self.node(*h).draw_order())
                .collect()
        }
    }

    #[test]
    fn test_new_stack_is_empty() {
        let fx = Fixture::new();
        assert!(fx.stack.is_empty());
        assert_eq!(fx.stack.len(), 0);
        assert_eq!(fx.stack.top(false, &fx.nodes), None);
        assert_eq!(fx.stack.bottom(), None);
    }

    #[test]
    fn test_push_adds_to_top() {
        let mut fx = Fixture::new();
        let a = fx.push(WindowOpenConfig::new("a"));
        let b = fx.push(WindowOpenConfig::new("b"));
        let c = fx.push(WindowOpenConfig::new("c"));

        assert_eq!(fx.stack.len(), 3);
        assert_eq!(fx.stack.top(false, &fx.nodes), Some(c));
        assert_eq!(fx.stack.bottom(), Some(a));
        assert_eq!(fx.stack.all_nodes(), &[a, b, c]);
        assert_eq!(fx.draw_orders(), vec![0, 20, 40]);
    }

    #[test]
    fn test_push_existing_moves_to_top() {
        let mut fx = Fixture::new();
        let a = fx.push(WindowOpenConfig::new("a"));
        let b = fx.push(WindowOpenConfig::new("b"));

        let slot = fx.stack.slot_of(a).unwrap();
        fx.stack.push(a, slot, &mut fx.nodes);

        assert_eq!(fx.stack.all_nodes(), &[b, a]);
        assert_eq!(fx.stack.len(), 2);
    }

    #[test]
    fn test_remove_keeps_draw_order_contiguous() {
        let mut fx = Fixture::new();
        let a = fx.push(WindowOpenConfig::new("a"));
        let b = fx.push(WindowOpenConfig::new("b"));
        let c = fx.push(WindowOpenConfig::new("c"));

        assert!(fx.stack.remove(b, &mut fx.nodes));
        assert_eq!(fx.stack.all_nodes(), &[a, c]);
        assert_eq!(fx.draw_orders(), vec![0, 20]);
        assert!(!fx.stack.contains(b));
        assert!(!fx.stack.remove(b, &mut fx.nodes));
    }

    #[test]
    fn test_insert_at_clamps_index() {
        let mut fx = Fixture::new();
        let a = fx.push(WindowOpenConfig::new("a"));
        let b = fx.push(WindowOpenConfig::new("b"));

        let (c, slot) = fx.loaded(WindowOpenConfig::new("c"));
        fx.stack.insert_at(0, c, slot, &mut fx.nodes);
        assert_eq!(fx.stack.all_nodes(), &[c, a, b]);

        let (d, slot) = fx.loaded(WindowOpenConfig::new("d"));
        fx.stack.insert_at(99, d, slot, &mut fx.nodes);
        assert_eq!(fx.stack.all_nodes(), &[c, a, b, d]);
        assert_eq!(fx.draw_orders(), vec![0, 20, 40, 60]);
    }

    #[test]
    fn test_cover_propagation() {
        let mut fx = Fixture::new();
        let a = fx.push(WindowOpenConfig::new("a").with_open_behavior(OpenBehavior::KeepBelow));
        let b = fx.push(WindowOpenConfig::new("b").with_open_behavior(OpenBehavior::HideBelow));
        let c = fx.push(WindowOpenConfig::new("c"));

        let top = fx.node(c);
        assert!(!top.is_covered());
        assert!(!top.is_hidden());
        assert!(!top.is_paused());

        // B's own open behavior applies only to what lies beneath it
        let middle = fx.node(b);
        assert!(middle.is_covered());
        assert!(!middle.is_hidden());
        assert!(!middle.is_paused());

        let bottom = fx.node(a);
        assert!(bottom.is_covered());
        assert!(bottom.is_hidden());
        assert!(bottom.is_paused());
    }

    #[test]
    fn test_modal_pauses_but_keeps_visible() {
        let mut fx = Fixture::new();
        let a = fx.push(WindowOpenConfig::new("a"));
        let b = fx.push(WindowOpenConfig::new("b"));
        let _modal = fx.push(WindowOpenConfig::new("modal").with_open_behavior(OpenBehavior::PauseBelow));

        for handle in [a, b] {
            let node = fx.node(handle);
            assert!(node.is_paused());
            assert!(!node.is_hidden());
            assert!(node.is_covered());
        }
    }

    #[test]
    fn test_own_cover_behavior_applies_at_any_depth() {
        let mut fx = Fixture::new();
        let a = fx.push(WindowOpenConfig::new("a").with_cover(CoverBehavior::Pause));
        // Nothing above `a`, its own behavior still holds
        assert!(!fx.node(a).is_covered());
        assert!(fx.node(a).is_paused());
        assert!(!fx.node(a).is_hidden());

        let _b = fx.push(WindowOpenConfig::new("b"));
        assert!(fx.node(a).is_covered());
        assert!(fx.node(a).is_paused());
        assert!(!fx.node(a).is_hidden());
    }

    #[test]
    fn test_own_cover_behavior_is_stronger_than_accumulated() {
        let mut fx = Fixture::new();
        let a = fx.push(WindowOpenConfig::new("a").with_cover(CoverBehavior::Hide));
        assert!(fx.node(a).is_hidden());

        let _b = fx.push(WindowOpenConfig::new("b").with_open_behavior(OpenBehavior::PauseBelow));
        assert!(fx.node(a).is_hidden());
        assert!(fx.node(a).is_paused());
    }

    #[test]
    fn test_own_cover_behavior_applies_under_exempt_node() {
        let mut fx = Fixture::new();
        let a = fx.push(WindowOpenConfig::new("a").with_cover(CoverBehavior::Pause));
        let _marquee = fx.push(
            WindowOpenConfig::new("marquee").with_attr(WindowAttr::SKIP_COVER_CHECK),
        );
        assert!(!fx.node(a).is_covered());
        assert!(fx.node(a).is_paused());
    }

    #[test]
    fn test_exempt_nodes_neither_receive_nor_emit() {
        let mut fx = Fixture::new();
        let a = fx.push(WindowOpenConfig::new("a"));
        let overlay = fx.push(
            WindowOpenConfig::new("marquee")
                .with_attr(WindowAttr::SKIP_COVER_CHECK)
                .with_open_behavior(OpenBehavior::HideBelow),
        );
        // The overlay is top-most but does not cover `a`
        assert!(!fx.node(a).is_covered());
        assert!(!fx.node(a).is_hidden());

        let _c = fx.push(WindowOpenConfig::new("c").with_open_behavior(OpenBehavior::HideBelow));
        let node = fx.node(overlay);
        assert!(!node.is_covered());
        assert!(!node.is_hidden());
        assert!(!node.is_paused());
        assert!(fx.node(a).is_hidden());
    }

    #[test]
    fn test_top_skips_exempt() {
        let mut fx = Fixture::new();
        let a = fx.push(WindowOpenConfig::new("a"));
        let overlay = fx.push(WindowOpenConfig::new("marquee").with_attr(WindowAttr::SKIP_COVER_CHECK));

        assert_eq!(fx.stack.top(false, &fx.nodes), Some(overlay));
        assert_eq!(fx.stack.top(true, &fx.nodes), Some(a));
    }

    #[test]
    fn test_closing_nodes_do_not_propagate() {
        let mut fx = Fixture::new();
        let a = fx.push(WindowOpenConfig::new("a"));
        let b = fx.push(WindowOpenConfig::new("b").with_open_behavior(OpenBehavior::HideBelow));
        assert!(fx.node(a).is_hidden());

        let slot = fx.stack.slot_of(b).unwrap();
        fx.nodes.get_mut(slot).unwrap().begin_closing();
        fx.stack.refresh(&mut fx.nodes);

        let node = fx.node(a);
        assert!(!node.is_hidden());
        assert!(!node.is_covered());
    }

    #[test]
    fn test_pass_reports_transitions() {
        let mut fx = Fixture::new();
        let a = fx.push(WindowOpenConfig::new("a"));
        fx.stack.drain_events();

        let _b = fx.push(WindowOpenConfig::new("b").with_open_behavior(OpenBehavior::HideBelow));
        let events = fx.stack.drain_events();
        assert!(events.contains(&WindowEvent::Covered(a)));
        assert!(events.contains(&WindowEvent::Paused(a)));
        assert!(events.contains(&WindowEvent::Hidden(a)));
    }

    #[derive(Debug, Clone)]
    enum Op {
        Push,
        Remove(usize),
        Insert(usize),
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Push),
            (0usize..8).prop_map(Op::Remove),
            (0usize..8).prop_map(Op::Insert),
        ]
    }

    proptest! {
        #[test]
        fn prop_lookup_matches_order_and_draw_order_increases(ops in prop::collection::vec(op(), 0..40)) {
            let mut fx = Fixture::new();
            for op in ops {
                match op {
                    Op::Push => {
                        fx.push(WindowOpenConfig::new("w"));
                    }
                    Op::Remove(i) => {
                        if let Some(handle) = fx.stack.all_nodes().get(i).copied() {
                            fx.stack.remove(handle, &mut fx.nodes);
                        }
                    }
                    Op::Insert(i) => {
                        let (handle, slot) = fx.loaded(WindowOpenConfig::new("w"));
                        fx.stack.insert_at(i, handle, slot, &mut fx.nodes);
                    }
                }

                prop_assert_eq!(fx.stack.all_nodes().len(), fx.stack.lookup.len());
                for handle in fx.stack.all_nodes() {
                    prop_assert!(fx.stack.lookup.contains_key(handle));
                }
                let orders = fx.draw_orders();
                for pair in orders.windows(2) {
                    prop_assert!(pair[0] < pair[1]);
                }
            }
        }
    }
}
