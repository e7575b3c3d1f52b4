// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Drill queue commands
//!
//! Commands: generate, list, pending, complete, skip

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use uuid::Uuid;

use skillforge_cortex::{
    application::{DrillRun, GenerateError, RunOptions},
    domain::{Drill, DrillId, DrillOrigin, DrillStatus, DrillType, WeakSkill},
};

use crate::embedded::EmbeddedServices;

#[derive(Subcommand)]
pub enum DrillsCommand {
    /// Generate drills for weak skills
    Generate {
        /// Weak skill as `skill_id[:hint]` (repeatable; default: derived from insights)
        #[arg(short, long = "skill", value_name = "SKILL[:HINT]", value_parser = parse_weak_skill)]
        skills: Vec<WeakSkill>,

        /// Drills requested per skill (default: from config)
        #[arg(long, value_name = "N")]
        per_skill: Option<usize>,

        /// Upper bound on drills admitted by this run
        #[arg(long, value_name = "N")]
        max_total: Option<usize>,
    },

    /// List drills
    List {
        /// Only drills for this skill
        #[arg(long, value_name = "SKILL_ID")]
        skill: Option<String>,

        /// pending, completed or skipped
        #[arg(long)]
        status: Option<DrillStatus>,

        /// fill-in-blank, spot-bug, critique or muscle-memory
        #[arg(long = "type", value_name = "TYPE", value_parser = parse_drill_type)]
        drill_type: Option<DrillType>,

        /// Print as JSON
        #[arg(long)]
        json: bool,
    },

    /// Pending drills per skill
    Pending,

    /// Record the outcome of a drill
    Complete {
        /// Drill ID
        #[arg(value_name = "DRILL_ID")]
        id: Uuid,

        /// The answer was correct
        #[arg(long, conflicts_with = "incorrect")]
        correct: bool,

        /// The answer was wrong
        #[arg(long)]
        incorrect: bool,
    },

    /// Skip a drill
    Skip {
        /// Drill ID
        #[arg(value_name = "DRILL_ID")]
        id: Uuid,
    },
}

pub async fn handle_command(command: DrillsCommand, config_path: Option<PathBuf>) -> Result<()> {
    let services = EmbeddedServices::new(config_path).await?;

    let result = match command {
        DrillsCommand::Generate {
            skills,
            per_skill,
            max_total,
        } => generate(&services, skills, per_skill, max_total).await,
        DrillsCommand::List {
            skill,
            status,
            drill_type,
            json,
        } => list(&services, skill, status, drill_type, json).await,
        DrillsCommand::Pending => pending(&services).await,
        DrillsCommand::Complete {
            id,
            correct,
            incorrect,
        } => complete(&services, id, correct, incorrect).await,
        DrillsCommand::Skip { id } => skip(&services, id).await,
    };

    services.shutdown().await?;
    result
}

async fn generate(
    services: &EmbeddedServices,
    skills: Vec<WeakSkill>,
    per_skill: Option<usize>,
    max_total: Option<usize>,
) -> Result<()> {
    if per_skill == Some(0) {
        anyhow::bail!("--per-skill must be at least 1");
    }

    let options = RunOptions {
        drills_per_skill: per_skill,
        max_total,
    };

    let run = match services
        .drill_generator()
        .generate_from_weak_skills(skills, &options)
        .await
    {
        Ok(run) => run,
        Err(GenerateError::NoWeakSkills) => {
            println!(
                "{}",
                "No weak skills given and none could be derived from stored insights".yellow()
            );
            return Ok(());
        }
        Err(GenerateError::Cooldown { remaining }) => {
            println!(
                "{}",
                format!(
                    "Drill generation is cooling down; try again in {}s",
                    remaining.as_secs().max(1)
                )
                .yellow()
            );
            return Ok(());
        }
        Err(e) => return Err(e).context("Drill generation failed"),
    };

    print_run(&run);
    Ok(())
}

async fn list(
    services: &EmbeddedServices,
    skill: Option<String>,
    status: Option<DrillStatus>,
    drill_type: Option<DrillType>,
    json: bool,
) -> Result<()> {
    let store = services.drills();
    let mut drills = match (&skill, status) {
        (Some(skill), _) => store.get_by_skill_id(skill).await?,
        (None, Some(status)) => store.get_by_status(status).await?,
        (None, None) => match drill_type {
            Some(drill_type) => store.get_by_type(drill_type).await?,
            None => store.get_all().await?,
        },
    };

    drills.retain(|drill| {
        status.map_or(true, |s| drill.status == s)
            && drill_type.map_or(true, |t| drill.drill_type == t)
    });

    if json {
        println!("{}", serde_json::to_string_pretty(&drills)?);
        return Ok(());
    }

    if drills.is_empty() {
        println!("{}", "No drills found".yellow());
        return Ok(());
    }

    println!("{} drills:", drills.len());
    for drill in &drills {
        print_drill(drill);
    }

    Ok(())
}

async fn pending(services: &EmbeddedServices) -> Result<()> {
    let counts = services.drills().pending_counts().await?;

    if counts.is_empty() {
        println!("{}", "No pending drills".yellow());
        return Ok(());
    }

    println!("{}", "Pending drills:".bold());
    for (skill, count) in &counts {
        println!("  {:<24} {}", skill, count);
    }
    Ok(())
}

async fn complete(services: &EmbeddedServices, id: Uuid, correct: bool, incorrect: bool) -> Result<()> {
    if correct == incorrect {
        anyhow::bail!("Specify exactly one of --correct or --incorrect");
    }

    let drill = services
        .drills()
        .record_result(DrillId(id), correct)
        .await
        .with_context(|| format!("Failed to record result for drill {}", id))?;

    let outcome = if correct { "correct".green() } else { "incorrect".red() };
    println!("✓ Drill {} marked {}", drill.id, outcome);
    if let Some(answer) = &drill.answer {
        println!("  Answer: {}", answer);
    }
    if !drill.explanation.is_empty() {
        println!("  {}", drill.explanation.dimmed());
    }
    Ok(())
}

async fn skip(services: &EmbeddedServices, id: Uuid) -> Result<()> {
    let drill = services
        .drills()
        .skip(DrillId(id))
        .await
        .with_context(|| format!("Failed to skip drill {}", id))?;

    println!("{}", format!("✓ Drill {} skipped", drill.id).green());
    Ok(())
}

fn print_run(run: &DrillRun) {
    println!(
        "{}",
        format!(
            "✓ Admitted {} drills for {} skills (target {})",
            run.total(),
            run.skills.len(),
            run.target
        )
        .green()
    );
    println!("  Generated: {}", run.primary_saved);
    println!("  Supplement: {}", run.supplement_saved);
    println!("  Templates: {}", run.template_saved);

    let skipped = run.skipped_type + run.skipped_duplicate + run.skipped_skill_cap + run.skipped_type_cap;
    if skipped > 0 {
        println!(
            "  Skipped: {} (type {}, duplicate {}, skill cap {}, type cap {})",
            skipped,
            run.skipped_type,
            run.skipped_duplicate,
            run.skipped_skill_cap,
            run.skipped_type_cap
        );
    }

    for drill in &run.drills {
        print_drill(drill);
    }
}

fn print_drill(drill: &Drill) {
    let origin = match drill.origin {
        DrillOrigin::Generated => "",
        DrillOrigin::Template => " (template)",
    };
    println!(
        "  {} {} [{}] {}{}",
        drill.id.to_string().dimmed(),
        format_status(drill.status),
        drill.skill_id.cyan(),
        drill.drill_type.as_str(),
        origin.dimmed()
    );
    println!("    {}", drill.content);
}

fn format_status(status: DrillStatus) -> colored::ColoredString {
    match status {
        DrillStatus::Pending => "pending".yellow(),
        DrillStatus::Completed => "completed".green(),
        DrillStatus::Skipped => "skipped".dimmed(),
    }
}

fn parse_weak_skill(value: &str) -> Result<WeakSkill, String> {
    WeakSkill::parse(value).ok_or_else(|| format!("invalid weak skill '{}': expected SKILL[:HINT]", value))
}

fn parse_drill_type(value: &str) -> Result<DrillType, String> {
    DrillType::parse(value).ok_or_else(|| {
        let known: Vec<&str> = DrillType::ALL.iter().map(|t| t.as_str()).collect();
        format!("unknown drill type '{}': expected one of {}", value, known.join(", "))
    })
}
