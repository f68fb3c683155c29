//! Property-based tests for configuration module
//!
//! These tests use proptest to generate random configurations and verify
//! validation invariants and TOML round-trips.

use super::*;
use crate::window::{
    CachePolicy, CoverBehavior, DependencyMissingPolicy, OpenBehavior, OverflowPolicy, UiLayer,
};
use proptest::prelude::*;

prop_compose! {
    fn valid_stack_config()(
        in_layer_order_interval in 1i32..100,
        extra in 0i32..10_000,
        animations in any::<bool>(),
    ) -> StackConfig {
        StackConfig {
            layer_order_interval: in_layer_order_interval + extra,
            in_layer_order_interval,
            animations,
        }
    }
}

fn layer() -> impl Strategy<Value = UiLayer> {
    prop::sample::select(UiLayer::ALL.to_vec())
}

fn cover() -> impl Strategy<Value = CoverBehavior> {
    prop_oneof![
        Just(CoverBehavior::Normal),
        Just(CoverBehavior::Pause),
        Just(CoverBehavior::Hide),
    ]
}

fn open_behavior() -> impl Strategy<Value = OpenBehavior> {
    prop_oneof![
        Just(OpenBehavior::KeepBelow),
        Just(OpenBehavior::PauseBelow),
        Just(OpenBehavior::HideBelow),
    ]
}

fn overflow() -> impl Strategy<Value = OverflowPolicy> {
    prop_oneof![
        Just(OverflowPolicy::Reject),
        Just(OverflowPolicy::CloseOldest),
        Just(OverflowPolicy::CloseNewest),
    ]
}

prop_compose! {
    fn window_config(index: usize)(
        layer in layer(),
        when_covered in cover(),
        open_behavior in open_behavior(),
        multi in any::<bool>(),
        max_instances in 0u32..8,
        overflow in overflow(),
        persistent in any::<bool>(),
        animated in any::<bool>(),
    ) -> WindowOpenConfig {
        let mut config = WindowOpenConfig::new(format!("window_{}", index))
            .with_layer(layer)
            .with_cover(when_covered)
            .with_open_behavior(open_behavior)
            .with_overflow(overflow)
            .with_animation(animated);
        if multi {
            config = config.with_multi_instance(max_instances, overflow);
        }
        if persistent {
            config = config.with_cache(CachePolicy::Persistent, 0.0);
        }
        if index > 0 {
            config = config.with_dependencies(
                [format!("window_{}", index - 1)],
                DependencyMissingPolicy::OpenMissingDependency,
            );
        }
        config
    }
}

fn valid_config() -> impl Strategy<Value = WinstackConfig> {
    (valid_stack_config(), 0usize..6)
        .prop_flat_map(|(stack, count)| {
            let windows: Vec<_> = (0..count).map(window_config).collect();
            (Just(stack), windows)
        })
        .prop_map(|(stack, windows)| WinstackConfig {
            stack,
            general: GeneralConfig::default(),
            windows,
        })
}

proptest! {
    #[test]
    fn prop_generated_configs_validate(config in valid_config()) {
        prop_assert!(config.validate().is_ok());
    }

    #[test]
    fn prop_toml_roundtrip_preserves_config(config in valid_config()) {
        let text = toml::to_string_pretty(&config).unwrap();
        let parsed: WinstackConfig = toml::from_str(&text).unwrap();
        prop_assert_eq!(parsed, config);
    }

    #[test]
    fn prop_layer_interval_below_spacing_is_rejected(
        spacing in 2i32..1000,
        shortfall in 1i32..1000,
    ) {
        let stack = StackConfig {
            layer_order_interval: (spacing - shortfall).max(0).min(spacing - 1),
            in_layer_order_interval: spacing,
            animations: true,
        };
        prop_assert!(stack.validate().is_err());
    }

    #[test]
    fn prop_non_positive_spacing_is_rejected(spacing in -100i32..=0) {
        let stack = StackConfig {
            layer_order_interval: 1000,
            in_layer_order_interval: spacing,
            animations: true,
        };
        prop_assert!(stack.validate().is_err());
    }
}
