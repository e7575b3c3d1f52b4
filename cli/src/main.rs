// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Skillforge Practice CLI
//!
//! The `skillforge` binary records learner mistakes as insights, keeps that
//! memory small and current, and turns weak skills into a queue of drills.
//!
//! ## Commands
//!
//! - `skillforge insights add|list|stats|touch|maintain|dedupe|compress` - Insight memory
//! - `skillforge drills generate|list|pending|complete|skip` - Drill queue
//! - `skillforge config show|validate|generate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;
use tracing::debug;

use skillforge_cli::commands::{self, ConfigCommand, DrillsCommand, InsightsCommand};

/// Skillforge - Personalized practice drills from your own mistakes
#[derive(Parser)]
#[command(name = "skillforge")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "SKILLFORGE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "SKILLFORGE_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Insight memory operations
    #[command(name = "insights")]
    Insights {
        #[command(subcommand)]
        command: InsightsCommand,
    },

    /// Drill queue operations
    #[command(name = "drills")]
    Drills {
        #[command(subcommand)]
        command: DrillsCommand,
    },

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    let dotenv = dotenvy::dotenv();

    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    if let Ok(path) = dotenv {
        debug!("Loaded environment from {:?}", path);
    }

    match cli.command {
        Some(Commands::Insights { command }) => {
            commands::insights::handle_command(command, cli.config).await
        }
        Some(Commands::Drills { command }) => {
            commands::drills::handle_command(command, cli.config).await
        }
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            // No command provided - show help
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
