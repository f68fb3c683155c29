//! Window stack orchestration
//!
//! `WindowManager` is the single owner of every node and index:
//! - handle → slot for live nodes (including in-flight loads)
//! - window id → registered handles in open order
//! - window id → recycle cache of closed-but-retained slots
//! - the free pool inside `NodeArena`
//!
//! Layer stacks only reorder handles and flip flags on the nodes they hold.
//! Asynchronous loads and transitions complete through a signal queue that
//! `pump` drains, so every index update happens on the caller's thread in one
//! piece.

mod cache;
mod policy;

use crate::config::StackConfig;
use crate::error::OpenError;
use crate::host::{
    AnimationPlayer, ConfigResolver, HostSignal, InstantTransitions, LoadCompleter, LoadTicket,
    ResourceLoader, TransitionDone, TransitionTicket,
};
use crate::stack::{LayerStack, NodeArena, Slot, StackNode};
use crate::window::{
    OpenArgs, UiLayer, WindowEvent, WindowFactory, WindowHandle, WindowOpenConfig,
};
use anyhow::Result;
use log::{debug, error, info, warn};
use std::collections::HashMap;
use tokio::sync::mpsc::{unbounded_channel, UnboundedReceiver, UnboundedSender};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LoadMode {
    Blocking,
    Async,
}

/// An open request waiting for its renderable.
struct PendingOpen {
    handle: WindowHandle,
    slot: Slot,
    args: OpenArgs,
    /// Dependencies opened for this request, closed again if the load fails
    dependencies: Vec<WindowHandle>,
}

#[derive(Debug, Clone, Copy)]
enum PendingTransition {
    Open(WindowHandle),
    Close(WindowHandle),
}

pub struct WindowManager {
    config: StackConfig,

    nodes: NodeArena,

    /// One stack per layer, created up front
    layers: HashMap<UiLayer, LayerStack>,

    /// Live nodes by handle, including nodes still loading
    live: HashMap<WindowHandle, Slot>,

    /// Registered (loaded) handles per window id, in open order
    instances: HashMap<String, Vec<WindowHandle>>,

    /// Closed nodes retained for reuse, per window id (last in, first out)
    cache: HashMap<String, Vec<Slot>>,

    loading: HashMap<LoadTicket, PendingOpen>,
    loading_by_handle: HashMap<WindowHandle, LoadTicket>,
    transitions: HashMap<TransitionTicket, PendingTransition>,

    next_handle: u64,
    next_ticket: u64,

    loader: Box<dyn ResourceLoader>,
    factory: Box<dyn WindowFactory>,
    animations: Box<dyn AnimationPlayer>,
    resolver: Option<Box<dyn ConfigResolver>>,

    signal_tx: UnboundedSender<HostSignal>,
    signal_rx: UnboundedReceiver<HostSignal>,

    /// Window ids whose dependencies are being opened, outermost first
    resolving: Vec<String>,

    listeners: Vec<Box<dyn Fn(&WindowEvent)>>,
}

impl WindowManager {
    /// Create a manager with one empty stack per layer.
    pub fn new<L, F>(config: &StackConfig, loader: L, factory: F) -> Result<Self>
    where
        L: ResourceLoader + 'static,
        F: WindowFactory + 'static,
    {
        config.validate()?;

        let layers = UiLayer::ALL
            .iter()
            .map(|layer| {
                let base = layer.index() as i32 * config.layer_order_interval;
                (*layer, LayerStack::new(*layer, base, config.in_layer_order_interval))
            })
            .collect();
        let (signal_tx, signal_rx) = unbounded_channel();

        Ok(Self {
            config: config.clone(),
            nodes: NodeArena::new(),
            layers,
            live: HashMap::new(),
            instances: HashMap::new(),
            cache: HashMap::new(),
            loading: HashMap::new(),
            loading_by_handle: HashMap::new(),
            transitions: HashMap::new(),
            next_handle: 1,
            next_ticket: 1,
            loader: Box::new(loader),
            factory: Box::new(factory),
            animations: Box::new(InstantTransitions),
            resolver: None,
            signal_tx,
            signal_rx,
            resolving: Vec::new(),
            listeners: Vec::new(),
        })
    }

    pub fn with_animation_player<A>(mut self, player: A) -> Self
    where
        A: AnimationPlayer + 'static,
    {
        self.animations = Box::new(player);
        self
    }

    pub fn with_config_resolver<R>(mut self, resolver: R) -> Self
    where
        R: ConfigResolver + 'static,
    {
        self.resolver = Some(Box::new(resolver));
        self
    }

    /// Add a listener for window lifecycle notifications
    pub fn add_event_listener<F>(&mut self, listener: F)
    where
        F: Fn(&WindowEvent) + 'static,
    {
        self.listeners.push(Box::new(listener));
    }

    /// Open a window, loading its resource synchronously.
    pub fn open(&mut self, config: WindowOpenConfig, args: OpenArgs) -> Result<WindowHandle, OpenError> {
        self.open_with(config, args, LoadMode::Blocking)
    }

    /// Open a window through the loader's asynchronous path.
    ///
    /// The returned handle is `Loading` until the loader completes and the
    /// next `pump` registers it; an `Opened` or `OpenFailed` event reports the
    /// outcome. Closing the handle before then cancels the load.
    pub fn open_async(
        &mut self,
        config: WindowOpenConfig,
        args: OpenArgs,
    ) -> Result<WindowHandle, OpenError> {
        self.open_with(config, args, LoadMode::Async)
    }

    fn open_with(
        &mut self,
        config: WindowOpenConfig,
        args: OpenArgs,
        mode: LoadMode,
    ) -> Result<WindowHandle, OpenError> {
        if config.window_id.is_empty() {
            return Err(OpenError::configuration("", "empty window id"));
        }
        if !self.layers.contains_key(&config.layer) {
            return Err(OpenError::configuration(
                &config.window_id,
                format!("no stack for layer {}", config.layer.as_str()),
            ));
        }

        self.precheck_instances(&config)?;
        let dependencies = self.resolve_dependencies(&config)?;

        let result = self.open_resolved(config, args, mode, &dependencies);
        if result.is_err() {
            self.roll_back_dependencies(&dependencies);
        }
        result
    }

    /// Second half of an open, once dependencies are in place.
    fn open_resolved(
        &mut self,
        config: WindowOpenConfig,
        args: OpenArgs,
        mode: LoadMode,
        dependencies: &[WindowHandle],
    ) -> Result<WindowHandle, OpenError> {
        self.enforce_instance_ceiling(&config)?;

        if let Some(slot) = self.take_cached(&config.window_id) {
            return Ok(self.reopen_cached(slot, config, args));
        }

        let window = self.factory.create(&config.window_id).ok_or_else(|| {
            OpenError::configuration(&config.window_id, "no window type registered")
        })?;

        let handle = self.allocate_handle();
        let slot = self.nodes.acquire();
        let window_id = config.window_id.clone();
        if let Some(node) = self.nodes.get_mut(slot) {
            node.initialize(handle, config, window);
        }
        self.live.insert(handle, slot);

        match mode {
            LoadMode::Blocking => match self.loader.load(&window_id) {
                Some(renderable) => {
                    if let Some(node) = self.nodes.get_mut(slot) {
                        node.attach_renderable(renderable);
                    }
                    self.finish_open(handle, slot, &args, true);
                    Ok(handle)
                }
                None => {
                    error!("Failed to load window resource: {}", window_id);
                    self.discard(handle, slot);
                    Err(OpenError::ResourceUnavailable { window_id })
                }
            },
            LoadMode::Async => {
                let ticket = LoadTicket(self.allocate_ticket());
                self.loading.insert(
                    ticket,
                    PendingOpen {
                        handle,
                        slot,
                        args,
                        dependencies: dependencies.to_vec(),
                    },
                );
                self.loading_by_handle.insert(handle, ticket);
                debug!("Loading window {} ({}) asynchronously", handle, window_id);

                let done = LoadCompleter::new(ticket, self.signal_tx.clone());
                self.loader.load_async(&window_id, done);
                self.pump();
                Ok(handle)
            }
        }
    }

    /// Registers a loaded node, pushes it onto its layer and starts the
    /// open transition.
    fn finish_open(&mut self, handle: WindowHandle, slot: Slot, args: &OpenArgs, fresh: bool) {
        let Some(node) = self.nodes.get_mut(slot) else {
            return;
        };
        if let Some(window) = node.window_mut() {
            if fresh {
                window.on_create();
            }
            window.on_open(args);
            window.on_before_show();
        }
        let window_id = node.window_id().to_string();
        let layer = node.config().layer;
        let animated = node.config().animated && self.config.animations;

        self.instances.entry(window_id.clone()).or_default().push(handle);
        if let Some(stack) = self.layers.get_mut(&layer) {
            stack.push(handle, slot, &mut self.nodes);
        }
        self.flush_layer_events(layer);
        info!("Opened window {} ({}) on layer {}", handle, window_id, layer.as_str());

        if !animated {
            self.complete_open(handle);
            return;
        }

        let ticket = TransitionTicket(self.allocate_ticket());
        let done = TransitionDone::new(ticket, self.signal_tx.clone());
        self.transitions.insert(ticket, PendingTransition::Open(handle));
        match self.nodes.get_mut(slot).and_then(StackNode::renderable_mut) {
            Some(renderable) => self.animations.play_open(renderable, done),
            None => done.complete(),
        }
        self.pump();
    }

    fn complete_open(&mut self, handle: WindowHandle) {
        let Some(node) = self.node_mut(handle) else {
            return;
        };
        if node.is_closing() || node.is_closed() {
            return;
        }
        node.set_interactable(true);
        let window_id = node.window_id().to_string();
        self.emit(&WindowEvent::Opened { handle, window_id });
    }

    /// Close one window instance.
    ///
    /// Stale handles are ignored. A handle whose load is still in flight is
    /// cancelled and released without any lifecycle callback.
    pub fn close(&mut self, handle: WindowHandle, with_animation: bool) {
        let Some(&slot) = self.live.get(&handle) else {
            debug!("Ignoring close of stale window {}", handle);
            return;
        };

        if let Some(ticket) = self.loading_by_handle.remove(&handle) {
            self.loading.remove(&ticket);
            self.loader.cancel(ticket);
            self.live.remove(&handle);
            self.nodes.release(slot);
            debug!("Cancelled loading window {}", handle);
            return;
        }

        let Some(node) = self.nodes.get_mut(slot) else {
            return;
        };
        if node.is_closing() || node.is_closed() {
            return;
        }

        let mut events = Vec::new();
        node.begin_closing();
        node.set_interactable(false);
        node.set_paused(true, &mut events);
        if let Some(window) = node.window_mut() {
            window.on_before_hide();
        }
        let layer = node.config().layer;

        // A pending open transition no longer matters
        self.transitions
            .retain(|_, pending| !matches!(pending, PendingTransition::Open(h) if *h == handle));

        if let Some(stack) = self.layers.get_mut(&layer) {
            stack.refresh(&mut self.nodes);
        }
        for event in &events {
            self.emit(event);
        }
        self.flush_layer_events(layer);

        if !(with_animation && self.config.animations) {
            self.finish_close(handle);
            return;
        }

        let ticket = TransitionTicket(self.allocate_ticket());
        let done = TransitionDone::new(ticket, self.signal_tx.clone());
        self.transitions.insert(ticket, PendingTransition::Close(handle));
        match self.nodes.get_mut(slot).and_then(StackNode::renderable_mut) {
            Some(renderable) => self.animations.play_close(renderable, done),
            None => done.complete(),
        }
        self.pump();
    }

    /// Close instances of a window id: all of them, or only the oldest.
    ///
    /// Instances still loading count; closing one cancels its load.
    pub fn close_window_id(&mut self, window_id: &str, close_all_instances: bool, with_animation: bool) {
        let handles = self.instances(window_id);
        if close_all_instances {
            for handle in handles {
                self.close(handle, with_animation);
            }
        } else if let Some(handle) = handles.first() {
            self.close(*handle, with_animation);
        }
    }

    /// Runs once the close transition completes: marks the node closed, takes
    /// it out of its layer and applies the cache policy.
    fn finish_close(&mut self, handle: WindowHandle) {
        let Some(&slot) = self.live.get(&handle) else {
            return;
        };
        let Some(node) = self.nodes.get_mut(slot) else {
            return;
        };
        if !node.is_closing() {
            return;
        }

        let mut events = Vec::new();
        node.set_hidden(true, &mut events);
        node.mark_closed();
        if let Some(window) = node.window_mut() {
            window.on_close();
        }
        let window_id = node.window_id().to_string();
        let layer = node.config().layer;

        self.live.remove(&handle);
        if let Some(handles) = self.instances.get_mut(&window_id) {
            handles.retain(|h| *h != handle);
            if handles.is_empty() {
                self.instances.remove(&window_id);
            }
        }
        if let Some(stack) = self.layers.get_mut(&layer) {
            stack.remove(handle, &mut self.nodes);
        }

        for event in &events {
            self.emit(event);
        }
        self.flush_layer_events(layer);
        info!("Closed window {} ({})", handle, window_id);
        self.emit(&WindowEvent::Closed {
            handle,
            window_id: window_id.clone(),
        });

        self.retain_or_destroy(slot);
    }

    /// Apply every pending load and transition completion.
    ///
    /// Returns the number of signals handled.
    pub fn pump(&mut self) -> usize {
        let mut handled = 0;
        while let Ok(signal) = self.signal_rx.try_recv() {
            handled += 1;
            match signal {
                HostSignal::Loaded { ticket, renderable } => self.on_load_finished(ticket, renderable),
                HostSignal::TransitionFinished { ticket } => self.on_transition_finished(ticket),
            }
        }
        handled
    }

    fn on_load_finished(
        &mut self,
        ticket: LoadTicket,
        renderable: Option<Box<dyn crate::window::Renderable>>,
    ) {
        let Some(pending) = self.loading.remove(&ticket) else {
            debug!("Ignoring completion of cancelled load {:?}", ticket);
            return;
        };
        self.loading_by_handle.remove(&pending.handle);

        if self.live.get(&pending.handle) != Some(&pending.slot) {
            debug!("Window {} was closed while loading", pending.handle);
            return;
        }

        match renderable {
            Some(renderable) => {
                if let Some(node) = self.nodes.get_mut(pending.slot) {
                    node.attach_renderable(renderable);
                }
                self.finish_open(pending.handle, pending.slot, &pending.args, true);
            }
            None => {
                let window_id = self
                    .nodes
                    .get(pending.slot)
                    .map(|node| node.window_id().to_string())
                    .unwrap_or_default();
                error!("Failed to load window resource async: {}", window_id);
                self.discard(pending.handle, pending.slot);
                self.roll_back_dependencies(&pending.dependencies);
                self.emit(&WindowEvent::OpenFailed {
                    handle: Some(pending.handle),
                    window_id,
                    reason: "resource unavailable".to_string(),
                });
            }
        }
    }

    fn on_transition_finished(&mut self, ticket: TransitionTicket) {
        match self.transitions.remove(&ticket) {
            Some(PendingTransition::Open(handle)) => self.complete_open(handle),
            Some(PendingTransition::Close(handle)) => self.finish_close(handle),
            None => debug!("Ignoring stale transition {:?}", ticket),
        }
    }

    /// Pumps pending completions, then updates every running window.
    pub fn update(&mut self, dt: f32) {
        self.pump();
        for layer in UiLayer::ALL {
            let Some(stack) = self.layers.get(&layer) else {
                continue;
            };
            for handle in stack.all_nodes() {
                let Some(node) = stack.slot_of(*handle).and_then(|slot| self.nodes.get_mut(slot)) else {
                    continue;
                };
                if !node.is_loaded() || node.is_paused() || node.is_closing() {
                    continue;
                }
                if let Some(window) = node.window_mut() {
                    window.on_update(dt);
                }
            }
        }
    }

    /// Close the topmost closable window, scanning System, Top, Popup and
    /// Default layers. Returns `true` if a window started closing.
    pub fn handle_back(&mut self) -> bool {
        for layer in UiLayer::BACK_KEY_ORDER {
            let Some(stack) = self.layers.get(&layer) else {
                continue;
            };
            let candidate = stack.all_nodes().iter().rev().copied().find(|handle| {
                stack
                    .slot_of(*handle)
                    .and_then(|slot| self.nodes.get(slot))
                    .map(|node| {
                        !node.config().is_cover_exempt() && !node.is_closing() && !node.is_closed()
                    })
                    .unwrap_or(false)
            });
            if let Some(handle) = candidate {
                debug!("Back key closes window {}", handle);
                self.close(handle, true);
                return true;
            }
        }
        false
    }

    /// Move a live window to `index` within its layer (0 = bottom).
    pub fn move_to_index(&mut self, handle: WindowHandle, index: usize) -> bool {
        let Some(&slot) = self.live.get(&handle) else {
            return false;
        };
        let Some(layer) = self.nodes.get(slot).map(|node| node.config().layer) else {
            return false;
        };
        let Some(stack) = self.layers.get_mut(&layer) else {
            return false;
        };
        if !stack.contains(handle) {
            return false;
        }
        stack.insert_at(index, handle, slot, &mut self.nodes);
        self.flush_layer_events(layer);
        true
    }

    /// Close every window without animation and drop all cached nodes.
    pub fn shutdown(&mut self) {
        let handles: Vec<WindowHandle> = self.live.keys().copied().collect();
        for handle in handles {
            self.close(handle, false);
            // Nodes already mid-transition finish closing now
            if self.live.contains_key(&handle) {
                self.finish_close(handle);
            }
        }
        self.transitions.clear();
        self.clear_all_caches();
        info!("Window manager shut down");
    }

    // === Queries ===

    /// Whether at least one instance of `window_id` is open or loading.
    pub fn is_open(&self, window_id: &str) -> bool {
        self.instance_count(window_id) > 0
    }

    /// Instances of `window_id` that count toward its ceiling.
    pub fn instance_count(&self, window_id: &str) -> usize {
        self.instances(window_id).len()
    }

    /// Instances of `window_id` in request order: open and not closing, or
    /// still loading.
    pub fn instances(&self, window_id: &str) -> Vec<WindowHandle> {
        let registered = self
            .instances
            .get(window_id)
            .into_iter()
            .flatten()
            .copied()
            .filter(|handle| {
                self.node(*handle)
                    .map_or(false, |node| !node.is_closing() && !node.is_closed())
            });
        let loading = self
            .loading_by_handle
            .keys()
            .copied()
            .filter(|handle| {
                self.node(*handle)
                    .map_or(false, |node| node.window_id() == window_id)
            });

        let mut handles: Vec<WindowHandle> = registered.chain(loading).collect();
        handles.sort();
        handles
    }

    /// Whether the handle still refers to a node (loading, open or closing).
    pub fn is_live(&self, handle: WindowHandle) -> bool {
        self.live.contains_key(&handle)
    }

    pub fn is_loading(&self, handle: WindowHandle) -> bool {
        self.loading_by_handle.contains_key(&handle)
    }

    pub fn live_count(&self) -> usize {
        self.live.len()
    }

    pub fn node(&self, handle: WindowHandle) -> Option<&StackNode> {
        self.live.get(&handle).and_then(|slot| self.nodes.get(*slot))
    }

    pub fn layer(&self, layer: UiLayer) -> Option<&LayerStack> {
        self.layers.get(&layer)
    }

    /// Top-most node of a layer, optionally skipping cover-exempt ones.
    pub fn top(&self, layer: UiLayer, skip_exempt: bool) -> Option<WindowHandle> {
        self.layers.get(&layer)?.top(skip_exempt, &self.nodes)
    }

    /// Draw order across all layers: layer base plus in-layer order.
    pub fn global_draw_order(&self, handle: WindowHandle) -> Option<i32> {
        let node = self.node(handle)?;
        let stack = self.layers.get(&node.config().layer)?;
        if !stack.contains(handle) {
            return None;
        }
        Some(stack.base_order() + node.draw_order())
    }

    pub fn nodes(&self) -> &NodeArena {
        &self.nodes
    }

    pub fn pool_len(&self) -> usize {
        self.nodes.pool_len()
    }

    pub fn config(&self) -> &StackConfig {
        &self.config
    }

    // === Internals ===

    fn node_mut(&mut self, handle: WindowHandle) -> Option<&mut StackNode> {
        let slot = *self.live.get(&handle)?;
        self.nodes.get_mut(slot)
    }

    fn allocate_handle(&mut self) -> WindowHandle {
        let handle = WindowHandle::new(self.next_handle);
        self.next_handle += 1;
        handle
    }

    fn allocate_ticket(&mut self) -> u64 {
        let ticket = self.next_ticket;
        self.next_ticket += 1;
        ticket
    }

    /// Closes, newest first and without animation, the dependencies an open
    /// brought up before it failed.
    fn roll_back_dependencies(&mut self, dependencies: &[WindowHandle]) {
        for handle in dependencies.iter().rev() {
            if self.live.contains_key(handle) {
                warn!("Closing dependency {} of a failed open", handle);
                self.close(*handle, false);
            }
        }
    }

    /// Drops a node that never became visible. No lifecycle callbacks fire.
    fn discard(&mut self, handle: WindowHandle, slot: Slot) {
        self.live.remove(&handle);
        self.nodes.release(slot);
    }

    fn flush_layer_events(&mut self, layer: UiLayer) {
        let events = match self.layers.get_mut(&layer) {
            Some(stack) => stack.drain_events(),
            None => return,
        };
        for event in &events {
            self.emit(event);
        }
    }

    fn emit(&self, event: &WindowEvent) {
        for listener in &self.listeners {
            listener(event);
        }
    }
}
