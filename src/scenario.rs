//! Headless scenario runner
//!
//! A scenario is a TOML list of steps (`open`, `close`, `close_all`, `back`,
//! `pump`, `update`, `evict`) replayed against a `WindowManager` wired to
//! in-memory collaborators. Asynchronous opens stay in flight until the next
//! `pump` step, so cancellation and ordering can be exercised from a file.
//!
//! ```toml
//! missing_resources = ["broken"]
//!
//! [[steps]]
//! op = "open"
//! window = "inventory"
//! alias = "inv"
//!
//! [[steps]]
//! op = "close"
//! target = "inv"
//! ```

use crate::config::WinstackConfig;
use crate::host::{LoadCompleter, ResourceLoader, WindowCatalog};
use crate::manager::WindowManager;
use crate::window::{OpenArgs, Renderable, UiLayer, Window, WindowHandle, WindowOpenConfig};
use anyhow::{Context, Result};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::fmt;
use std::fs;
use std::path::Path;
use std::rc::Rc;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scenario {
    /// Window ids whose resources fail to load
    #[serde(default)]
    pub missing_resources: Vec<String>,

    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    Open {
        window: String,
        /// Name later steps use to refer to this instance
        #[serde(default)]
        alias: Option<String>,
        #[serde(default, rename = "async")]
        load_async: bool,
        #[serde(default)]
        args: OpenArgs,
    },
    Close {
        /// An alias, or a window id (closes its oldest instance)
        target: String,
        #[serde(default = "default_animated")]
        animated: bool,
    },
    CloseAll {
        window: String,
        #[serde(default = "default_animated")]
        animated: bool,
    },
    Back,
    Pump,
    Update {
        dt: f32,
    },
    Evict {
        /// Seconds past now used as the eviction deadline
        #[serde(default)]
        after_secs: f64,
    },
}

fn default_animated() -> bool {
    true
}

impl Step {
    fn name(&self) -> &'static str {
        match self {
            Step::Open { .. } => "open",
            Step::Close { .. } => "close",
            Step::CloseAll { .. } => "close_all",
            Step::Back => "back",
            Step::Pump => "pump",
            Step::Update { .. } => "update",
            Step::Evict { .. } => "evict",
        }
    }
}

impl Scenario {
    /// Load a scenario from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read scenario file: {}", path.display()))?;
        Self::parse(&contents)
            .with_context(|| format!("Failed to parse scenario file: {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Self> {
        Ok(toml::from_str(contents)?)
    }
}

/// Window that only logs its lifecycle.
struct HeadlessWindow {
    window_id: String,
}

impl Window for HeadlessWindow {
    fn on_create(&mut self) {
        debug!("[{}] create", self.window_id);
    }

    fn on_open(&mut self, args: &OpenArgs) {
        debug!("[{}] open with {}", self.window_id, args);
    }

    fn on_close(&mut self) {
        debug!("[{}] close", self.window_id);
    }

    fn on_destroy(&mut self) {
        debug!("[{}] destroy", self.window_id);
    }
}

struct HeadlessSurface;

impl Renderable for HeadlessSurface {}

/// Loader that parks asynchronous loads until the runner releases them.
struct HeadlessLoader {
    missing: HashSet<String>,
    parked: Rc<RefCell<Vec<(String, LoadCompleter)>>>,
}

impl ResourceLoader for HeadlessLoader {
    fn load(&mut self, window_id: &str) -> Option<Box<dyn Renderable>> {
        if self.missing.contains(window_id) {
            return None;
        }
        Some(Box::new(HeadlessSurface))
    }

    fn load_async(&mut self, window_id: &str, done: LoadCompleter) {
        self.parked.borrow_mut().push((window_id.to_string(), done));
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    pub index: usize,
    pub op: &'static str,
    pub outcome: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WindowReport {
    pub handle: u64,
    pub window_id: String,
    pub draw_order: i32,
    pub state: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerReport {
    pub layer: &'static str,
    /// Bottom to top
    pub windows: Vec<WindowReport>,
}

/// Final state of a scenario run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    pub steps: Vec<StepReport>,
    pub layers: Vec<LayerReport>,
    pub cached: BTreeMap<String, usize>,
    pub pool: usize,
    pub events: usize,
}

impl fmt::Display for Report {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for step in &self.steps {
            writeln!(f, "{:>3} {:<9} {}", step.index, step.op, step.outcome)?;
        }
        for layer in &self.layers {
            writeln!(f, "[{}]", layer.layer)?;
            for window in layer.windows.iter().rev() {
                writeln!(
                    f,
                    "  #{:<4} {:<20} order={:<6} {}",
                    window.handle,
                    window.window_id,
                    window.draw_order,
                    window.state.join("|")
                )?;
            }
        }
        for (window_id, count) in &self.cached {
            writeln!(f, "cached {}: {}", window_id, count)?;
        }
        write!(f, "pool: {}  events: {}", self.pool, self.events)
    }
}

/// Replays scenario steps against a headless manager.
pub struct ScenarioRunner {
    manager: WindowManager,
    catalog: WindowCatalog,
    parked: Rc<RefCell<Vec<(String, LoadCompleter)>>>,
    missing: HashSet<String>,
    aliases: HashMap<String, WindowHandle>,
    events: Rc<RefCell<usize>>,
    window_ids: HashSet<String>,
}

impl ScenarioRunner {
    pub fn new(config: &WinstackConfig, scenario: &Scenario) -> Result<Self> {
        let parked = Rc::new(RefCell::new(Vec::new()));
        let missing: HashSet<String> = scenario.missing_resources.iter().cloned().collect();
        let loader = HeadlessLoader {
            missing: missing.clone(),
            parked: parked.clone(),
        };
        let factory = |window_id: &str| -> Option<Box<dyn Window>> {
            Some(Box::new(HeadlessWindow {
                window_id: window_id.to_string(),
            }))
        };

        let catalog = config.catalog();
        let mut manager = WindowManager::new(&config.stack, loader, factory)?
            .with_config_resolver(catalog.clone());

        let events = Rc::new(RefCell::new(0usize));
        let counter = events.clone();
        manager.add_event_listener(move |event| {
            *counter.borrow_mut() += 1;
            debug!("event: {:?}", event);
        });

        Ok(Self {
            manager,
            catalog,
            parked,
            missing,
            aliases: HashMap::new(),
            events,
            window_ids: HashSet::new(),
        })
    }

    pub fn manager(&self) -> &WindowManager {
        &self.manager
    }

    /// Run every step and report the final state.
    pub fn run(mut self, scenario: &Scenario) -> Report {
        let steps = scenario
            .steps
            .iter()
            .enumerate()
            .map(|(index, step)| StepReport {
                index,
                op: step.name(),
                outcome: self.apply(step),
            })
            .collect();
        info!("Scenario finished after {} steps", scenario.steps.len());
        self.report(steps)
    }

    /// Apply one step and describe what happened.
    pub fn apply(&mut self, step: &Step) -> String {
        match step {
            Step::Open {
                window,
                alias,
                load_async,
                args,
            } => {
                let config = self
                    .catalog
                    .get(window)
                    .cloned()
                    .unwrap_or_else(|| WindowOpenConfig::new(window.as_str()));
                self.window_ids.insert(window.clone());

                let result = if *load_async {
                    self.manager.open_async(config, args.clone())
                } else {
                    self.manager.open(config, args.clone())
                };
                match result {
                    Ok(handle) => {
                        if let Some(alias) = alias {
                            self.aliases.insert(alias.clone(), handle);
                        }
                        if self.manager.is_loading(handle) {
                            format!("{} loading as {}", window, handle)
                        } else {
                            format!("{} opened as {}", window, handle)
                        }
                    }
                    Err(e) => format!("{} failed: {}", window, e),
                }
            }
            Step::Close { target, animated } => match self.aliases.get(target).copied() {
                Some(handle) => {
                    self.manager.close(handle, *animated);
                    format!("closed {}", handle)
                }
                None => {
                    self.manager.close_window_id(target, false, *animated);
                    format!("closed oldest {}", target)
                }
            },
            Step::CloseAll { window, animated } => {
                let count = self.manager.instance_count(window);
                self.manager.close_window_id(window, true, *animated);
                format!("closed {} instances of {}", count, window)
            }
            Step::Back => {
                if self.manager.handle_back() {
                    "closed topmost window".to_string()
                } else {
                    "nothing to close".to_string()
                }
            }
            Step::Pump => {
                let parked: Vec<(String, LoadCompleter)> = self.parked.borrow_mut().drain(..).collect();
                let released = parked.len();
                for (window_id, done) in parked {
                    let surface: Option<Box<dyn Renderable>> = if self.missing.contains(&window_id) {
                        None
                    } else {
                        Some(Box::new(HeadlessSurface))
                    };
                    done.complete(surface);
                }
                let handled = self.manager.pump();
                format!("released {} loads, handled {} signals", released, handled)
            }
            Step::Update { dt } => {
                self.manager.update(*dt);
                format!("updated by {}s", dt)
            }
            Step::Evict { after_secs } => {
                let deadline = Duration::try_from_secs_f64(after_secs.max(0.0))
                    .ok()
                    .and_then(|after| Instant::now().checked_add(after));
                match deadline {
                    Some(deadline) => {
                        let evicted = self.manager.evict_expired(deadline);
                        format!("evicted {} cached nodes", evicted)
                    }
                    None => format!("evict failed: {}s is out of range", after_secs),
                }
            }
        }
    }

    /// Snapshot of every non-empty layer, plus cache and pool sizes.
    pub fn report(&self, steps: Vec<StepReport>) -> Report {
        let layers = UiLayer::ALL
            .iter()
            .filter_map(|layer| {
                let stack = self.manager.layer(*layer)?;
                if stack.is_empty() {
                    return None;
                }
                let windows = stack
                    .all_nodes()
                    .iter()
                    .filter_map(|handle| {
                        let node = self.manager.node(*handle)?;
                        Some(WindowReport {
                            handle: handle.raw(),
                            window_id: node.window_id().to_string(),
                            draw_order: self.manager.global_draw_order(*handle)?,
                            state: node
                                .state()
                                .iter()
                                .map(|flag| format!("{:?}", flag).to_lowercase())
                                .collect(),
                        })
                    })
                    .collect();
                Some(LayerReport {
                    layer: layer.as_str(),
                    windows,
                })
            })
            .collect();

        let cached = self
            .window_ids
            .iter()
            .map(|id| (id.clone(), self.manager.cached_count(id)))
            .filter(|(_, count)| *count > 0)
            .collect();

        Report {
            steps,
            layers,
            cached,
            pool: self.manager.pool_len(),
            events: *self.events.borrow(),
        }
    }
}
