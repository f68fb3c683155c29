//! Per-open configuration and the policy enums it carries
//!
//! A `WindowOpenConfig` is value data supplied with every open request and
//! copied into the node for its whole lifetime. Every field has a serde
//! default so window catalogs in TOML only spell out what differs.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Coarse visual buckets, each with its own independent stack.
///
/// Declaration order is the draw order of the layers themselves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UiLayer {
    Background = 0,
    /// Full-screen windows
    Default = 1,
    Popup = 2,
    /// Marquee and toast style windows
    Top = 3,
    /// Critical system prompts (disconnect, restart required)
    System = 4,
    Debug = 5,
}

impl UiLayer {
    pub const ALL: [UiLayer; 6] = [
        UiLayer::Background,
        UiLayer::Default,
        UiLayer::Popup,
        UiLayer::Top,
        UiLayer::System,
        UiLayer::Debug,
    ];

    /// Layers scanned by back-key handling, topmost first.
    pub const BACK_KEY_ORDER: [UiLayer; 4] =
        [UiLayer::System, UiLayer::Top, UiLayer::Popup, UiLayer::Default];

    pub fn index(self) -> usize {
        self as usize
    }

    pub fn as_str(self) -> &'static str {
        match self {
            UiLayer::Background => "background",
            UiLayer::Default => "default",
            UiLayer::Popup => "popup",
            UiLayer::Top => "top",
            UiLayer::System => "system",
            UiLayer::Debug => "debug",
        }
    }
}

impl Default for UiLayer {
    fn default() -> Self {
        UiLayer::Default
    }
}

/// How a node reacts to being covered by something above it.
///
/// Variants are ordered by strength: `Normal < Pause < Hide`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CoverBehavior {
    /// Stay visible and running
    Normal,
    /// Stay visible but stop updating
    Pause,
    /// Become invisible (implies paused)
    Hide,
}

impl Default for CoverBehavior {
    fn default() -> Self {
        CoverBehavior::Normal
    }
}

/// Effect a node imposes on every node beneath it in its layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OpenBehavior {
    KeepBelow,
    PauseBelow,
    HideBelow,
}

impl OpenBehavior {
    /// The cover behavior this open behavior forces onto lower nodes.
    pub fn imposed(self) -> CoverBehavior {
        match self {
            OpenBehavior::KeepBelow => CoverBehavior::Normal,
            OpenBehavior::PauseBelow => CoverBehavior::Pause,
            OpenBehavior::HideBelow => CoverBehavior::Hide,
        }
    }
}

impl Default for OpenBehavior {
    fn default() -> Self {
        OpenBehavior::KeepBelow
    }
}

/// Action taken when a window id is already at its instance ceiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OverflowPolicy {
    Reject,
    CloseOldest,
    CloseNewest,
}

impl Default for OverflowPolicy {
    fn default() -> Self {
        OverflowPolicy::CloseOldest
    }
}

/// Action taken when a listed dependency is not currently open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DependencyMissingPolicy {
    /// Ignore missing dependencies
    OpenAnyway,
    /// Refuse to open
    NotOpen,
    /// Open only the dependencies that are missing
    OpenMissingDependency,
    /// Close and reopen every listed dependency
    ReOpenAllDependencies,
}

impl Default for DependencyMissingPolicy {
    fn default() -> Self {
        DependencyMissingPolicy::OpenAnyway
    }
}

/// What happens to a node once its close transition completes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CachePolicy {
    /// Destroy and return the slot to the pool
    None,
    /// Retain in the recycle cache until `expire_secs` elapse
    ExpireTime,
    /// Retain in the recycle cache indefinitely
    Persistent,
}

impl Default for CachePolicy {
    fn default() -> Self {
        CachePolicy::None
    }
}

/// Window attribute flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowAttr {
    /// Neither receives nor emits cover effects (marquee, overlay)
    pub skip_cover_check: bool,
}

impl WindowAttr {
    pub const NONE: WindowAttr = WindowAttr { skip_cover_check: false };
    pub const SKIP_COVER_CHECK: WindowAttr = WindowAttr { skip_cover_check: true };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WindowOpenConfig {
    /// Logical window type; many live instances may share it
    pub window_id: String,

    pub allow_multi_instance: bool,

    /// Instance ceiling when multi-instance is allowed (0 = unlimited)
    pub max_instances: u32,

    pub overflow_policy: OverflowPolicy,

    /// Window ids that should be open before this one
    pub dependencies: Vec<String>,

    pub dependency_missing_policy: DependencyMissingPolicy,

    pub layer: UiLayer,

    pub attr: WindowAttr,

    pub when_covered: CoverBehavior,

    pub open_behavior: OpenBehavior,

    pub cache_policy: CachePolicy,

    /// Cache lifetime in seconds, only read under `CachePolicy::ExpireTime`
    pub expire_secs: f64,

    /// Play the open transition through the animation player
    pub animated: bool,
}

impl Default for WindowOpenConfig {
    fn default() -> Self {
        Self {
            window_id: String::new(),
            allow_multi_instance: false,
            max_instances: 1,
            overflow_policy: OverflowPolicy::CloseOldest,
            dependencies: Vec::new(),
            dependency_missing_policy: DependencyMissingPolicy::OpenAnyway,
            layer: UiLayer::Default,
            attr: WindowAttr::NONE,
            when_covered: CoverBehavior::Normal,
            open_behavior: OpenBehavior::KeepBelow,
            cache_policy: CachePolicy::None,
            expire_secs: 0.0,
            animated: true,
        }
    }
}

impl WindowOpenConfig {
    pub fn new(window_id: impl Into<String>) -> Self {
        Self {
            window_id: window_id.into(),
            ..Self::default()
        }
    }

    pub fn with_layer(mut self, layer: UiLayer) -> Self {
        self.layer = layer;
        self
    }

    pub fn with_multi_instance(mut self, max_instances: u32, overflow: OverflowPolicy) -> Self {
        self.allow_multi_instance = true;
        self.max_instances = max_instances;
        self.overflow_policy = overflow;
        self
    }

    pub fn with_overflow(mut self, overflow: OverflowPolicy) -> Self {
        self.overflow_policy = overflow;
        self
    }

    pub fn with_dependencies<I, S>(mut self, dependencies: I, policy: DependencyMissingPolicy) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = dependencies.into_iter().map(Into::into).collect();
        self.dependency_missing_policy = policy;
        self
    }

    pub fn with_cover(mut self, when_covered: CoverBehavior) -> Self {
        self.when_covered = when_covered;
        self
    }

    pub fn with_open_behavior(mut self, open_behavior: OpenBehavior) -> Self {
        self.open_behavior = open_behavior;
        self
    }

    pub fn with_cache(mut self, cache_policy: CachePolicy, expire_secs: f64) -> Self {
        self.cache_policy = cache_policy;
        self.expire_secs = expire_secs;
        self
    }

    pub fn with_attr(mut self, attr: WindowAttr) -> Self {
        self.attr = attr;
        self
    }

    pub fn with_animation(mut self, animated: bool) -> Self {
        self.animated = animated;
        self
    }

    /// Effective instance ceiling; `None` means unlimited.
    pub fn instance_ceiling(&self) -> Option<usize> {
        if !self.allow_multi_instance {
            Some(1)
        } else if self.max_instances == 0 {
            None
        } else {
            Some(self.max_instances as usize)
        }
    }

    pub fn is_cover_exempt(&self) -> bool {
        self.attr.skip_cover_check
    }

    /// Cache lifetime, clamped to zero for negative or non-finite values.
    pub fn expire_after(&self) -> Duration {
        if self.expire_secs.is_finite() && self.expire_secs > 0.0 {
            Duration::from_secs_f64(self.expire_secs)
        } else {
            Duration::ZERO
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_is_single_instance() {
        let config = WindowOpenConfig::new("main");
        assert_eq!(config.instance_ceiling(), Some(1));
        assert_eq!(config.overflow_policy, OverflowPolicy::CloseOldest);
        assert_eq!(config.layer, UiLayer::Default);
        assert!(!config.is_cover_exempt());
    }

    #[test]
    fn test_zero_max_instances_is_unlimited() {
        let config = WindowOpenConfig::new("toast").with_multi_instance(0, OverflowPolicy::Reject);
        assert_eq!(config.instance_ceiling(), None);

        let config = WindowOpenConfig::new("toast").with_multi_instance(3, OverflowPolicy::Reject);
        assert_eq!(config.instance_ceiling(), Some(3));
    }

    #[test]
    fn test_behavior_strength_order() {
        assert!(CoverBehavior::Normal < CoverBehavior::Pause);
        assert!(CoverBehavior::Pause < CoverBehavior::Hide);
        assert_eq!(OpenBehavior::KeepBelow.imposed(), CoverBehavior::Normal);
        assert_eq!(OpenBehavior::PauseBelow.imposed(), CoverBehavior::Pause);
        assert_eq!(OpenBehavior::HideBelow.imposed(), CoverBehavior::Hide);
    }

    #[test]
    fn test_expire_after_clamps_negative() {
        let config = WindowOpenConfig::new("a").with_cache(CachePolicy::ExpireTime, -3.0);
        assert_eq!(config.expire_after(), Duration::ZERO);

        let config = WindowOpenConfig::new("a").with_cache(CachePolicy::ExpireTime, 1.5);
        assert_eq!(config.expire_after(), Duration::from_millis(1500));
    }

    #[test]
    fn test_partial_toml_uses_defaults() {
        let config: WindowOpenConfig = toml::from_str(
            r#"
window_id = "shop"
layer = "popup"
open_behavior = "pause_below"
"#,
        )
        .unwrap();

        assert_eq!(config.window_id, "shop");
        assert_eq!(config.layer, UiLayer::Popup);
        assert_eq!(config.open_behavior, OpenBehavior::PauseBelow);
        assert_eq!(config.when_covered, CoverBehavior::Normal);
        assert!(config.animated);
    }
}
