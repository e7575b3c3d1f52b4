// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use skillforge_cortex::domain::config::{PracticeConfig, StorageBackend, CONFIG_PATH_ENV};

const MINIMAL_TEMPLATE: &str = include_str!("../../templates/config-minimal.yaml");

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate sample configuration
    Generate {
        /// Output path (default: ./skillforge-config.yaml)
        #[arg(short, long, default_value = "./skillforge-config.yaml")]
        output: PathBuf,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output } => generate(output).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = PracticeConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. {}: {}",
            CONFIG_PATH_ENV,
            std::env::var(CONFIG_PATH_ENV)
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./skillforge-config.yaml");
        println!("  4. ~/.skillforge/config.yaml");
        println!("  5. /etc/skillforge/config.yaml");
        println!();
    }

    let spec = &config.spec;

    println!("{}", "Current configuration:".bold());
    println!("  Name: {}", config.metadata.name);
    println!();

    println!("{}", "Storage:".bold());
    match spec.storage.backend {
        StorageBackend::InMemory => println!("  Backend: in-memory"),
        StorageBackend::Sled => {
            println!("  Backend: sled");
            println!("  Path: {}", spec.storage.resolved_path().display());
        }
    }
    println!();

    println!("{}", "Generation:".bold());
    if spec.generation.enabled {
        println!("  Endpoint: {}", spec.generation.endpoint);
        println!("  Model: {}", spec.generation.model);
        println!(
            "  Attempts: {} x {} calls (backoff {}ms)",
            spec.generation.max_attempts,
            spec.generation.max_retries_per_attempt,
            spec.generation.retry_delay_ms
        );
    } else {
        println!("  {}", "disabled (template drills only)".dimmed());
    }
    println!();

    println!("{}", "Drills:".bold());
    println!("  Per skill: {}", spec.drills.drills_per_skill);
    println!("  Target floor: {}", spec.drills.target_floor);
    if let Some(max_total) = spec.drills.max_total {
        println!("  Max per run: {}", max_total);
    }
    println!(
        "  Caps: {} per skill, {} per skill and type",
        spec.drills.max_per_skill, spec.drills.max_per_skill_type
    );
    let types: Vec<&str> = spec.drills.allowed_types.iter().map(|t| t.as_str()).collect();
    println!("  Types: {}", types.join(", "));
    println!("  Cooldown: {}s", spec.drills.cooldown_seconds);
    println!();

    println!("{}", "Retention:".bold());
    println!("  Decay rate: {}", spec.retention.decay_rate);
    println!("  Min weight: {}", spec.retention.min_weight);
    println!("  Max age: {} days", spec.retention.max_age_days);
    println!("  Archive: {}", spec.retention.retain_archive);
    println!("  Dedup threshold: {}", spec.dedup_threshold);
    println!("  Compression threshold: {}", spec.compression_threshold);
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = PracticeConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf) -> Result<()> {
    std::fs::write(&output, MINIMAL_TEMPLATE)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}
