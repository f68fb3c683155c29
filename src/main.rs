//! # winstack - window stack scenario runner
//!
//! Replays a TOML scenario of open/close/back/pump steps against a headless
//! `WindowManager` and prints the resulting layer stacks.

use anyhow::{Context, Result};
use clap::Parser;
use log::{error, info};
use std::path::PathBuf;
use winstack::{Scenario, ScenarioRunner, WinstackConfig};

#[derive(Parser, Debug)]
#[command(name = "winstack")]
#[command(about = "Replay window-stack scenarios against the layered window orchestrator")]
#[command(version)]
struct Cli {
    /// Scenario file to run
    scenario: Option<PathBuf>,

    /// Path to configuration file
    #[arg(short, long, default_value = "~/.config/winstack/winstack.toml")]
    config: String,

    /// Enable debug logging
    #[arg(short, long)]
    debug: bool,

    /// Print the final report as JSON
    #[arg(long)]
    json: bool,

    /// Disable open/close transitions
    #[arg(long)]
    no_animations: bool,

    /// Write the default configuration to this path and exit
    #[arg(long, value_name = "PATH")]
    init_config: Option<PathBuf>,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // The config file may turn on debug logging, so read it before the logger starts
    let loaded = WinstackConfig::load(&cli.config);
    let debug = cli.debug || loaded.as_ref().map_or(false, |config| config.general.debug);

    // Initialize logging
    if debug {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug")).init();
    } else {
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    }

    info!(
        "winstack {} ({}, built {})",
        winstack::VERSION,
        winstack::GIT_COMMIT,
        winstack::BUILD_DATE
    );

    if let Some(path) = &cli.init_config {
        WinstackConfig::default().save(path)?;
        info!("Default configuration written to {}", path.display());
        return Ok(());
    }

    let mut config = match loaded {
        Ok(config) => {
            info!("Configuration loaded from: {}", cli.config);
            config
        }
        Err(e) => {
            error!("Failed to load configuration: {:#}", e);
            info!("Using default configuration");
            WinstackConfig::default()
        }
    };
    if cli.no_animations {
        config.stack.animations = false;
        info!("Transitions disabled via CLI flag");
    }

    let scenario_path = cli
        .scenario
        .as_ref()
        .context("No scenario given; pass a scenario file or --init-config")?;
    let scenario = Scenario::load(scenario_path)?;
    info!(
        "Running {} steps from {}",
        scenario.steps.len(),
        scenario_path.display()
    );

    let report = ScenarioRunner::new(&config, &scenario)?.run(&scenario);
    if cli.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else {
        println!("{}", report);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cli_parsing() {
        let cli = Cli::try_parse_from(["winstack", "demo.toml"]).unwrap();
        assert_eq!(cli.scenario, Some(PathBuf::from("demo.toml")));
        assert_eq!(cli.config, "~/.config/winstack/winstack.toml");
        assert!(!cli.debug);
        assert!(!cli.json);
        assert!(!cli.no_animations);
    }

    #[test]
    fn test_cli_flags() {
        let cli = Cli::try_parse_from([
            "winstack",
            "--debug",
            "--json",
            "--no-animations",
            "-c",
            "custom.toml",
            "demo.toml",
        ])
        .unwrap();
        assert!(cli.debug);
        assert!(cli.json);
        assert!(cli.no_animations);
        assert_eq!(cli.config, "custom.toml");
    }

    #[test]
    fn test_init_config_without_scenario() {
        let cli = Cli::try_parse_from(["winstack", "--init-config", "out.toml"]).unwrap();
        assert_eq!(cli.init_config, Some(PathBuf::from("out.toml")));
        assert!(cli.scenario.is_none());
    }
}
