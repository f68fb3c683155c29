//! Interfaces the orchestrator consumes from its host
//!
//! - `ResourceLoader`: window id to renderable, blocking or asynchronous
//! - `AnimationPlayer`: open/close transitions
//! - `ConfigResolver`: window id to open config, used by dependency resolution
//!
//! Asynchronous completions never call back into the manager directly. A
//! `LoadCompleter` or `TransitionDone` posts a signal on the manager's queue,
//! and the manager applies it the next time it pumps. Both completers report
//! exactly once: dropping one without completing it reports failure (loads)
//! or completion (transitions).

use crate::window::{Renderable, WindowOpenConfig};
use log::debug;
use std::collections::HashMap;
use tokio::sync::mpsc::UnboundedSender;

/// Identifies one in-flight asynchronous load.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct LoadTicket(pub(crate) u64);

/// Identifies one in-flight open or close transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransitionTicket(pub(crate) u64);

/// Signals posted by host completions, applied by the manager's pump.
pub(crate) enum HostSignal {
    Loaded {
        ticket: LoadTicket,
        renderable: Option<Box<dyn Renderable>>,
    },
    TransitionFinished {
        ticket: TransitionTicket,
    },
}

/// One-shot completion handle for `ResourceLoader::load_async`.
pub struct LoadCompleter {
    ticket: LoadTicket,
    tx: Option<UnboundedSender<HostSignal>>,
}

impl LoadCompleter {
    pub(crate) fn new(ticket: LoadTicket, tx: UnboundedSender<HostSignal>) -> Self {
        Self { ticket, tx: Some(tx) }
    }

    pub fn ticket(&self) -> LoadTicket {
        self.ticket
    }

    /// Reports the load result; `None` fails the open.
    pub fn complete(mut self, renderable: Option<Box<dyn Renderable>>) {
        self.send(renderable);
    }

    fn send(&mut self, renderable: Option<Box<dyn Renderable>>) {
        if let Some(tx) = self.tx.take() {
            if tx
                .send(HostSignal::Loaded {
                    ticket: self.ticket,
                    renderable,
                })
                .is_err()
            {
                debug!("Load {:?} finished after its manager was dropped", self.ticket);
            }
        }
    }
}

impl Drop for LoadCompleter {
    fn drop(&mut self) {
        self.send(None);
    }
}

/// One-shot completion handle for `AnimationPlayer` transitions.
pub struct TransitionDone {
    ticket: TransitionTicket,
    tx: Option<UnboundedSender<HostSignal>>,
}

impl TransitionDone {
    pub(crate) fn new(ticket: TransitionTicket, tx: UnboundedSender<HostSignal>) -> Self {
        Self { ticket, tx: Some(tx) }
    }

    pub fn ticket(&self) -> TransitionTicket {
        self.ticket
    }

    pub fn complete(mut self) {
        self.send();
    }

    fn send(&mut self) {
        if let Some(tx) = self.tx.take() {
            let _ = tx.send(HostSignal::TransitionFinished { ticket: self.ticket });
        }
    }
}

impl Drop for TransitionDone {
    fn drop(&mut self) {
        self.send();
    }
}

/// Turns a window id into a renderable.
pub trait ResourceLoader {
    /// Blocking load; `None` when the resource does not exist.
    fn load(&mut self, window_id: &str) -> Option<Box<dyn Renderable>>;

    /// Non-blocking load. The default completes synchronously through `load`.
    fn load_async(&mut self, window_id: &str, done: LoadCompleter) {
        let renderable = self.load(window_id);
        done.complete(renderable);
    }

    /// Abandons an in-flight load. Its completion, if it still arrives, is ignored.
    fn cancel(&mut self, _ticket: LoadTicket) {}
}

/// Plays open/close transitions.
///
/// Implementations must eventually complete every `TransitionDone` exactly
/// once; completing it before returning is allowed.
pub trait AnimationPlayer {
    fn play_open(&mut self, target: &mut dyn Renderable, done: TransitionDone);
    fn play_close(&mut self, target: &mut dyn Renderable, done: TransitionDone);
}

/// Transitions that finish immediately.
#[derive(Debug, Clone, Copy, Default)]
pub struct InstantTransitions;

impl AnimationPlayer for InstantTransitions {
    fn play_open(&mut self, _target: &mut dyn Renderable, done: TransitionDone) {
        done.complete();
    }

    fn play_close(&mut self, _target: &mut dyn Renderable, done: TransitionDone) {
        done.complete();
    }
}

/// Dependency Config Resolver: window id to the config used to open it.
#[cfg_attr(test, mockall::automock)]
pub trait ConfigResolver {
    fn resolve(&self, window_id: &str) -> Option<WindowOpenConfig>;
}

impl<F> ConfigResolver for F
where
    F: Fn(&str) -> Option<WindowOpenConfig>,
{
    fn resolve(&self, window_id: &str) -> Option<WindowOpenConfig> {
        self(window_id)
    }
}

/// Window configs keyed by window id, usually loaded from the `[[windows]]`
/// section of the config file.
#[derive(Debug, Clone, Default)]
pub struct WindowCatalog {
    configs: HashMap<String, WindowOpenConfig>,
}

impl WindowCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Later entries win over earlier ones with the same id.
    pub fn from_configs<I>(configs: I) -> Self
    where
        I: IntoIterator<Item = WindowOpenConfig>,
    {
        let configs = configs
            .into_iter()
            .map(|config| (config.window_id.clone(), config))
            .collect();
        Self { configs }
    }

    pub fn insert(&mut self, config: WindowOpenConfig) -> Option<WindowOpenConfig> {
        self.configs.insert(config.window_id.clone(), config)
    }

    pub fn get(&self, window_id: &str) -> Option<&WindowOpenConfig> {
        self.configs.get(window_id)
    }

    pub fn len(&self) -> usize {
        self.configs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.configs.is_empty()
    }
}

impl ConfigResolver for WindowCatalog {
    fn resolve(&self, window_id: &str) -> Option<WindowOpenConfig> {
        self.configs.get(window_id).cloned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc::unbounded_channel;

    struct Surface;
    impl Renderable for Surface {}

    #[test]
    fn test_dropped_completer_reports_failure() {
        let (tx, mut rx) = unbounded_channel();
        drop(LoadCompleter::new(LoadTicket(3), tx));

        match rx.try_recv() {
            Ok(HostSignal::Loaded { ticket, renderable }) => {
                assert_eq!(ticket, LoadTicket(3));
                assert!(renderable.is_none());
            }
            _ => panic!("expected a failed load signal"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_completer_reports_once() {
        let (tx, mut rx) = unbounded_channel();
        LoadCompleter::new(LoadTicket(1), tx).complete(Some(Box::new(Surface)));

        assert!(matches!(
            rx.try_recv(),
            Ok(HostSignal::Loaded { renderable: Some(_), .. })
        ));
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_instant_transitions_complete_synchronously() {
        let (tx, mut rx) = unbounded_channel();
        let mut player = InstantTransitions;
        player.play_close(&mut Surface, TransitionDone::new(TransitionTicket(9), tx));

        assert!(matches!(
            rx.try_recv(),
            Ok(HostSignal::TransitionFinished { ticket }) if ticket == TransitionTicket(9)
        ));
    }

    #[test]
    fn test_catalog_resolves_by_id() {
        let catalog = WindowCatalog::from_configs(vec![
            WindowOpenConfig::new("hud"),
            WindowOpenConfig::new("shop"),
        ]);
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.resolve("shop").map(|c| c.window_id), Some("shop".to_string()));
        assert!(catalog.resolve("missing").is_none());
    }
}
