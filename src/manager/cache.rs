//! Recycle cache for closed windows
//!
//! A closed node whose config asks for caching keeps its window object and
//! renderable and waits here, keyed by window id. The next open of that id
//! reuses the most recently cached node that is still valid. Anything else is
//! destroyed and its slot returns to the arena's free pool.

use super::WindowManager;
use crate::stack::Slot;
use crate::window::{CachePolicy, OpenArgs, WindowEvent, WindowHandle, WindowOpenConfig};
use log::debug;
use std::time::Instant;

impl WindowManager {
    /// Pops cached nodes for `window_id` until one is usable. Invalid or
    /// expired entries met on the way are destroyed.
    pub(super) fn take_cached(&mut self, window_id: &str) -> Option<Slot> {
        let now = Instant::now();
        loop {
            let slot = self.cache.get_mut(window_id)?.pop()?;
            let usable = self
                .nodes
                .get(slot)
                .map(|node| {
                    node.has_renderable()
                        && node.window_id() == window_id
                        && node.expire_at().map_or(true, |at| at > now)
                })
                .unwrap_or(false);

            if self.cache.get(window_id).map_or(false, Vec::is_empty) {
                self.cache.remove(window_id);
            }
            if usable {
                debug!("Reusing cached node for {}", window_id);
                return Some(slot);
            }
            debug!("Dropping stale cached node for {}", window_id);
            self.destroy_slot(slot);
        }
    }

    /// Brings a cached node back under a fresh handle. The window object is
    /// reused, so `on_create` does not fire again.
    pub(super) fn reopen_cached(
        &mut self,
        slot: Slot,
        config: WindowOpenConfig,
        args: OpenArgs,
    ) -> WindowHandle {
        let handle = self.allocate_handle();
        if let Some(node) = self.nodes.get_mut(slot) {
            node.reopen(handle, config);
        }
        self.live.insert(handle, slot);
        self.finish_open(handle, slot, &args, false);
        handle
    }

    /// Applies the node's cache policy after it closed.
    pub(super) fn retain_or_destroy(&mut self, slot: Slot) {
        let Some(node) = self.nodes.get_mut(slot) else {
            return;
        };
        let window_id = node.window_id().to_string();
        match node.config().cache_policy {
            CachePolicy::None => {
                self.destroy_slot(slot);
                return;
            }
            CachePolicy::Persistent => node.set_expire_at(None),
            CachePolicy::ExpireTime => {
                let expire_at = Instant::now() + node.config().expire_after();
                node.set_expire_at(Some(expire_at));
            }
        }
        debug!("Caching closed node for {}", window_id);
        self.cache.entry(window_id).or_default().push(slot);
    }

    /// Destroys a cached or closed node and returns its slot to the pool.
    fn destroy_slot(&mut self, slot: Slot) {
        let Some(node) = self.nodes.get_mut(slot) else {
            return;
        };
        let window_id = node.window_id().to_string();
        node.destroy();
        self.nodes.release(slot);
        self.emit(&WindowEvent::Destroyed { window_id });
    }

    /// Destroys every cached node whose expiry is at or before `now`.
    ///
    /// Returns the number of nodes destroyed. Persistent entries never expire.
    pub fn evict_expired(&mut self, now: Instant) -> usize {
        let mut expired = Vec::new();
        let nodes = &self.nodes;
        for slots in self.cache.values_mut() {
            slots.retain(|slot| {
                let keep = nodes
                    .get(*slot)
                    .and_then(|node| node.expire_at())
                    .map_or(true, |at| at > now);
                if !keep {
                    expired.push(*slot);
                }
                keep
            });
        }
        self.cache.retain(|_, slots| !slots.is_empty());

        let count = expired.len();
        for slot in expired {
            self.destroy_slot(slot);
        }
        if count > 0 {
            debug!("Evicted {} expired cached nodes", count);
        }
        count
    }

    /// Destroys all cached nodes of one window id.
    pub fn clear_cache(&mut self, window_id: &str) -> usize {
        let slots = self.cache.remove(window_id).unwrap_or_default();
        let count = slots.len();
        for slot in slots {
            self.destroy_slot(slot);
        }
        count
    }

    /// Destroys every cached node.
    pub fn clear_all_caches(&mut self) -> usize {
        let slots: Vec<Slot> = self.cache.drain().flat_map(|(_, slots)| slots).collect();
        let count = slots.len();
        for slot in slots {
            self.destroy_slot(slot);
        }
        count
    }

    pub fn cached_count(&self, window_id: &str) -> usize {
        self.cache.get(window_id).map_or(0, Vec::len)
    }
}
