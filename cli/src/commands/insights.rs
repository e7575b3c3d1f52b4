// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Insight memory commands
//!
//! Commands: add, list, stats, touch, maintain, dedupe, compress

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use uuid::Uuid;

use skillforge_cortex::{
    application::{RetentionOptions, RetentionScheduler},
    domain::{Insight, InsightId},
};

use crate::embedded::EmbeddedServices;

#[derive(Subcommand)]
pub enum InsightsCommand {
    /// Record a new insight
    Add {
        /// Observation about the mistake
        #[arg(long)]
        content: String,

        /// Skill the insight relates to (repeatable)
        #[arg(short, long = "skill", value_name = "SKILL_ID", required = true)]
        skills: Vec<String>,

        /// Where the observation came from
        #[arg(long, default_value = "cli")]
        source: String,
    },

    /// List stored insights
    List {
        /// Most recently seen N insights
        #[arg(long, value_name = "N", conflicts_with_all = ["top", "skill"])]
        recent: Option<usize>,

        /// Heaviest N insights
        #[arg(long, value_name = "N", conflicts_with = "skill")]
        top: Option<usize>,

        /// Only insights tagged with this skill
        #[arg(long, value_name = "SKILL_ID")]
        skill: Option<String>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show aggregate statistics
    Stats,

    /// Mark an insight as observed again
    Touch {
        /// Insight ID
        #[arg(value_name = "INSIGHT_ID")]
        id: Uuid,
    },

    /// Run decay, pruning and archival
    Maintain {
        /// Per-day weight multiplier (default: from config)
        #[arg(long)]
        decay_rate: Option<f64>,

        /// Prune insights lighter than this (default: from config)
        #[arg(long)]
        min_weight: Option<f64>,

        /// Archive insights unseen for longer than this (default: from config)
        #[arg(long)]
        max_age_days: Option<i64>,

        /// Keep running on the configured interval until Ctrl-C
        #[arg(long)]
        watch: bool,
    },

    /// Merge near-duplicate insights
    Dedupe {
        /// Similarity threshold (default: from config)
        #[arg(long)]
        threshold: Option<f64>,
    },

    /// Rewrite insights into atomic, non-overlapping observations
    Compress,
}

pub async fn handle_command(command: InsightsCommand, config_path: Option<PathBuf>) -> Result<()> {
    let services = EmbeddedServices::new(config_path).await?;

    let result = match command {
        InsightsCommand::Add {
            content,
            skills,
            source,
        } => add(&services, content, skills, source).await,
        InsightsCommand::List {
            recent,
            top,
            skill,
            json,
        } => list(&services, recent, top, skill, json).await,
        InsightsCommand::Stats => stats(&services).await,
        InsightsCommand::Touch { id } => touch(&services, id).await,
        InsightsCommand::Maintain {
            decay_rate,
            min_weight,
            max_age_days,
            watch,
        } => {
            if watch {
                watch_maintenance(&services).await
            } else {
                maintain(&services, decay_rate, min_weight, max_age_days).await
            }
        }
        InsightsCommand::Dedupe { threshold } => dedupe(&services, threshold).await,
        InsightsCommand::Compress => compress(&services).await,
    };

    services.shutdown().await?;
    result
}

async fn add(
    services: &EmbeddedServices,
    content: String,
    skills: Vec<String>,
    source: String,
) -> Result<()> {
    if content.trim().is_empty() {
        anyhow::bail!("Insight content cannot be empty");
    }

    let insight = Insight::new(content.trim(), skills, source);
    let id = services
        .insights()
        .add(&insight)
        .await
        .context("Failed to store insight")?;

    println!("{}", format!("✓ Insight recorded: {}", id).green());
    Ok(())
}

async fn list(
    services: &EmbeddedServices,
    recent: Option<usize>,
    top: Option<usize>,
    skill: Option<String>,
    json: bool,
) -> Result<()> {
    let store = services.insights();
    let insights = match (recent, top, skill) {
        (Some(n), _, _) => store.get_recent(n).await?,
        (_, Some(n), _) => store.get_top_by_weight(n).await?,
        (_, _, Some(skill)) => store.get_by_skill_id(&skill).await?,
        _ => store.get_all().await?,
    };

    if json {
        println!("{}", serde_json::to_string_pretty(&insights)?);
        return Ok(());
    }

    if insights.is_empty() {
        println!("{}", "No insights found".yellow());
        return Ok(());
    }

    println!("{} insights:", insights.len());
    for insight in insights {
        print_insight(&insight);
    }

    Ok(())
}

async fn stats(services: &EmbeddedServices) -> Result<()> {
    let stats = services.insights().get_stats().await?;

    println!("{}", "Insight memory:".bold());
    println!("  Count: {}", stats.count);
    println!("  Total weight: {:.3}", stats.total_weight);
    println!("  Mean frequency: {:.2}", stats.mean_frequency);

    if !stats.per_skill.is_empty() {
        println!();
        println!("{}", "Per skill:".bold());
        for (skill, count) in &stats.per_skill {
            println!("  {:<24} {}", skill, count);
        }
    }

    Ok(())
}

async fn touch(services: &EmbeddedServices, id: Uuid) -> Result<()> {
    let insight = services
        .insights()
        .increment_frequency(InsightId(id))
        .await
        .with_context(|| format!("Failed to touch insight {}", id))?;

    println!(
        "{}",
        format!(
            "✓ Insight {} seen {} times (weight {:.3})",
            insight.id, insight.frequency, insight.weight
        )
        .green()
    );
    Ok(())
}

async fn maintain(
    services: &EmbeddedServices,
    decay_rate: Option<f64>,
    min_weight: Option<f64>,
    max_age_days: Option<i64>,
) -> Result<()> {
    let defaults = RetentionOptions::from(&services.config().spec.retention);
    let options = RetentionOptions {
        decay_rate: decay_rate.unwrap_or(defaults.decay_rate),
        min_weight: min_weight.unwrap_or(defaults.min_weight),
        max_age_days: max_age_days.unwrap_or(defaults.max_age_days),
    };

    let report = services
        .retention_policy()
        .run_maintenance_cycle(options)
        .await
        .context("Insight maintenance failed")?;

    println!("{}", "✓ Maintenance cycle completed".green());
    println!("  Decayed: {}", report.decayed);
    println!("  Pruned: {}", report.pruned);
    println!("  Archived: {}", report.archived);
    println!("  Duration: {}ms", report.duration_ms);
    Ok(())
}

async fn watch_maintenance(services: &EmbeddedServices) -> Result<()> {
    let retention = services.config().spec.retention.clone();
    if !retention.enabled {
        println!("{}", "Insight retention is disabled in configuration".yellow());
        return Ok(());
    }

    let scheduler = Arc::new(RetentionScheduler::new(
        Arc::new(services.retention_policy()),
        retention.clone(),
    ));
    let shutdown = scheduler.shutdown_token();
    let handle = scheduler.start();

    println!(
        "Running maintenance every {}s. Press Ctrl-C to stop.",
        retention.interval_seconds
    );

    tokio::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl-C")?;
    shutdown.cancel();
    handle.await.context("Retention scheduler task failed")?;

    println!("{}", "✓ Maintenance stopped".green());
    Ok(())
}

async fn dedupe(services: &EmbeddedServices, threshold: Option<f64>) -> Result<()> {
    let threshold = threshold.unwrap_or(services.config().spec.dedup_threshold);
    if !(0.0..=1.0).contains(&threshold) {
        anyhow::bail!("Threshold must be within [0, 1], got {}", threshold);
    }

    let report = services
        .deduplicator()
        .deduplicate_store(threshold)
        .await
        .context("Insight de-duplication failed")?;

    println!(
        "{}",
        format!(
            "✓ Merged {} duplicate groups ({} insights remain)",
            report.merged, report.total
        )
        .green()
    );
    Ok(())
}

async fn compress(services: &EmbeddedServices) -> Result<()> {
    let report = services
        .compressor()
        .apply_compression()
        .await
        .context("Insight compression failed")?;

    let mode = if report.used_service {
        "generation service"
    } else {
        "local grouping"
    };
    println!("{}", format!("✓ Compression completed via {}", mode).green());
    println!("  Removed: {}", report.removed);
    println!("  Created: {}", report.created);
    println!("  Dropped: {}", report.dropped);
    println!("  Remaining: {}", report.total);
    Ok(())
}

fn print_insight(insight: &Insight) {
    println!(
        "  {} [{}] w={:.3} x{}",
        insight.id.to_string().dimmed(),
        insight.skill_ids.join(", ").cyan(),
        insight.weight,
        insight.frequency
    );
    println!("    {}", insight.content);
}
