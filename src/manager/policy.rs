//! Open-time policies: instance ceilings and dependency gating

use super::{LoadMode, WindowManager};
use crate::error::OpenError;
use crate::window::{
    DependencyMissingPolicy, OpenArgs, OverflowPolicy, WindowHandle, WindowOpenConfig,
};
use log::{debug, info, warn};

impl WindowManager {
    fn at_instance_ceiling(&self, config: &WindowOpenConfig) -> bool {
        config
            .instance_ceiling()
            .map_or(false, |max| self.instance_count(&config.window_id) >= max)
    }

    /// Fails early when a `Reject` ceiling is already reached, before any
    /// dependency is opened on the window's behalf.
    pub(super) fn precheck_instances(&self, config: &WindowOpenConfig) -> Result<(), OpenError> {
        if config.overflow_policy == OverflowPolicy::Reject && self.at_instance_ceiling(config) {
            info!(
                "Rejected opening {}: instance ceiling reached",
                config.window_id
            );
            return Err(OpenError::rejected(
                &config.window_id,
                "maximum number of instances reached",
            ));
        }
        Ok(())
    }

    /// Makes room for one more instance according to the overflow policy.
    pub(super) fn enforce_instance_ceiling(
        &mut self,
        config: &WindowOpenConfig,
    ) -> Result<(), OpenError> {
        // Bounded by the live instance count; every close below completes synchronously
        let mut attempts = self.instance_count(&config.window_id);
        while self.at_instance_ceiling(config) && attempts > 0 {
            attempts -= 1;
            let handles = self.instances(&config.window_id);
            let victim = match config.overflow_policy {
                OverflowPolicy::Reject => {
                    info!(
                        "Rejected opening {}: instance ceiling reached",
                        config.window_id
                    );
                    return Err(OpenError::rejected(
                        &config.window_id,
                        "maximum number of instances reached",
                    ));
                }
                OverflowPolicy::CloseOldest => handles.first().copied(),
                OverflowPolicy::CloseNewest => handles.last().copied(),
            };
            match victim {
                Some(handle) => {
                    debug!("Closing {} to make room for {}", handle, config.window_id);
                    self.close(handle, false);
                }
                None => break,
            }
        }
        Ok(())
    }

    /// Applies the dependency policy for every listed dependency that is not
    /// open.
    ///
    /// Dependency configs are all resolved before any dependency opens. If one
    /// of them then fails, the dependencies opened by this call are closed
    /// again and the whole request fails. Returns the handles opened here so
    /// the caller can close them if the window itself fails to open.
    pub(super) fn resolve_dependencies(
        &mut self,
        config: &WindowOpenConfig,
    ) -> Result<Vec<WindowHandle>, OpenError> {
        if config.dependencies.is_empty() {
            return Ok(Vec::new());
        }

        let missing: Vec<String> = config
            .dependencies
            .iter()
            .filter(|dependency| !self.is_open(dependency))
            .cloned()
            .collect();
        if missing.is_empty() {
            return Ok(Vec::new());
        }

        let targets = match config.dependency_missing_policy {
            DependencyMissingPolicy::OpenAnyway => {
                debug!(
                    "Opening {} without dependencies {:?}",
                    config.window_id, missing
                );
                return Ok(Vec::new());
            }
            DependencyMissingPolicy::NotOpen => {
                info!(
                    "Rejected opening {}: dependencies {:?} are not open",
                    config.window_id, missing
                );
                return Err(OpenError::rejected(
                    &config.window_id,
                    format!("missing dependencies: {}", missing.join(", ")),
                ));
            }
            DependencyMissingPolicy::OpenMissingDependency => missing,
            DependencyMissingPolicy::ReOpenAllDependencies => config.dependencies.clone(),
        };

        if self.resolving.iter().any(|id| *id == config.window_id) {
            warn!("Dependency cycle through {}", config.window_id);
            return Err(OpenError::configuration(
                &config.window_id,
                format!("dependency cycle: {} -> {}", self.resolving.join(" -> "), config.window_id),
            ));
        }

        let mut resolved = Vec::with_capacity(targets.len());
        for dependency in &targets {
            let dependency_config = self
                .resolver
                .as_ref()
                .and_then(|resolver| resolver.resolve(dependency))
                .ok_or_else(|| {
                    OpenError::configuration(
                        &config.window_id,
                        format!("no config for dependency {}", dependency),
                    )
                })?;
            resolved.push((dependency.clone(), dependency_config));
        }

        self.resolving.push(config.window_id.clone());
        let result = self.open_dependencies(config, resolved);
        self.resolving.pop();
        result
    }

    fn open_dependencies(
        &mut self,
        config: &WindowOpenConfig,
        resolved: Vec<(String, WindowOpenConfig)>,
    ) -> Result<Vec<WindowHandle>, OpenError> {
        let reopen = config.dependency_missing_policy == DependencyMissingPolicy::ReOpenAllDependencies;
        let mut opened: Vec<WindowHandle> = Vec::new();

        for (dependency, mut dependency_config) in resolved {
            if dependency_config.window_id.is_empty() {
                dependency_config.window_id = dependency.clone();
            }
            if reopen {
                self.close_window_id(&dependency, true, false);
            }

            match self.open_with(dependency_config, OpenArgs::Null, LoadMode::Blocking) {
                Ok(handle) => opened.push(handle),
                Err(source) => {
                    warn!(
                        "Dependency {} of {} failed to open: {}",
                        dependency, config.window_id, source
                    );
                    for handle in opened.into_iter().rev() {
                        self.close(handle, false);
                    }
                    return Err(OpenError::DependencyFailed {
                        window_id: config.window_id.clone(),
                        dependency,
                        source: Box::new(source),
                    });
                }
            }
        }
        Ok(opened)
    }
}
