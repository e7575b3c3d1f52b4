// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # DrillGenerator
//!
//! Turns weak skills into admitted drills.
//!
//! ## Run shape
//!
//! 1. Derive weak skills when none are supplied (skill tracker first, then
//!    the heaviest stored insights).
//! 2. Merge weak skills by id.
//! 3. Compute the target: `max(per_skill, min(skills * per_skill, floor))`,
//!    optionally capped by `max_total`.
//! 4. **Primary pass**: `per_skill` drills per weak skill.
//! 5. **Supplement pass**: skills with the fewest saved drills first, smaller
//!    batches and one attempt fewer.
//! 6. **Template fallback**: canned drills, round-robin over skills and
//!    types, until the target is met or nothing more can be admitted.
//!
//! Everything goes through [`DrillStore::save_drills`]. Generation failures
//! never surface; the caller only sees [`GenerateError`] when there is
//! nothing to work on, when the cooldown is active, or on storage errors.
//!
//! ## Per-skill attempts
//!
//! Each attempt calls the service with its own retry budget and exponential
//! backoff. Attempt results are never merged: an attempt replaces the best
//! result only when it yields strictly more valid drills.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

use crate::application::drill_store::{AdmissionCaps, DrillStore, SaveReport};
use crate::application::insight_store::InsightStore;
use crate::application::run_guard::Cooldown;
use crate::application::templates::template_drill;
use crate::domain::config::{DrillConfig, GenerationConfig};
use crate::domain::drill::{Drill, DrillType};
use crate::domain::events::{EventBus, PracticeEvent};
use crate::domain::generation::{
    DrillBatchPayload, GenerationError, GenerationOptions, GenerationService, JSON_MIME_TYPE,
};
use crate::domain::repository::RepositoryError;
use crate::domain::weak_skill::{merge_weak_skills, select_weak_signals, SkillSignalSource, WeakSkill};

/// Upper bound on template admission rounds per run
const MAX_TEMPLATE_ROUNDS: usize = 6;

/// How many heavy insights to scan per derived skill
const INSIGHTS_PER_DERIVED_SKILL: usize = 4;

#[derive(Debug, thiserror::Error)]
pub enum GenerateError {
    #[error("No weak skills to generate drills for")]
    NoWeakSkills,

    #[error("Drill generation is cooling down, try again in {remaining:?}")]
    Cooldown { remaining: Duration },

    #[error("Storage error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Defaults for every run of one generator
#[derive(Debug, Clone, PartialEq)]
pub struct GeneratorSettings {
    pub drills_per_skill: usize,
    pub target_floor: usize,
    pub max_total: Option<usize>,
    pub caps: AdmissionCaps,
    pub derive_limit: usize,
    pub max_attempts: u32,
    pub max_retries_per_attempt: u32,
    pub retry_delay: Duration,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub cooldown: Duration,
}

impl Default for GeneratorSettings {
    fn default() -> Self {
        Self::from_config(&DrillConfig::default(), &GenerationConfig::default())
    }
}

impl GeneratorSettings {
    pub fn from_config(drills: &DrillConfig, generation: &GenerationConfig) -> Self {
        Self {
            drills_per_skill: drills.drills_per_skill,
            target_floor: drills.target_floor,
            max_total: drills.max_total,
            caps: AdmissionCaps::from(drills),
            derive_limit: drills.derive_limit,
            max_attempts: generation.max_attempts,
            max_retries_per_attempt: generation.max_retries_per_attempt,
            retry_delay: Duration::from_millis(generation.retry_delay_ms),
            temperature: generation.temperature,
            max_output_tokens: generation.max_output_tokens,
            cooldown: Duration::from_secs(drills.cooldown_seconds),
        }
    }

    /// Options for a single skill request of `count` drills.
    pub fn skill_options(&self, count: usize) -> SkillGenerationOptions {
        SkillGenerationOptions {
            count,
            max_attempts: self.max_attempts,
            max_retries_per_attempt: self.max_retries_per_attempt,
            retry_delay: self.retry_delay,
            temperature: self.temperature,
            max_output_tokens: self.max_output_tokens,
            allowed_types: self.caps.allowed_types.clone(),
        }
    }
}

/// Per-call overrides of [`GeneratorSettings`]
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunOptions {
    pub drills_per_skill: Option<usize>,
    pub max_total: Option<usize>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SkillGenerationOptions {
    pub count: usize,
    pub max_attempts: u32,
    pub max_retries_per_attempt: u32,
    pub retry_delay: Duration,
    pub temperature: f32,
    pub max_output_tokens: u32,
    pub allowed_types: Vec<DrillType>,
}

impl Default for SkillGenerationOptions {
    fn default() -> Self {
        GeneratorSettings::default().skill_options(3)
    }
}

/// Outcome of one [`DrillGenerator::generate_from_weak_skills`] run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrillRun {
    /// Every drill admitted, in admission order
    pub drills: Vec<Drill>,
    pub target: usize,
    pub skills: Vec<String>,
    pub primary_saved: usize,
    pub supplement_saved: usize,
    pub template_saved: usize,
    pub skipped_type: usize,
    pub skipped_duplicate: usize,
    pub skipped_skill_cap: usize,
    pub skipped_type_cap: usize,
    pub duration_ms: u64,
}

impl DrillRun {
    pub fn total(&self) -> usize {
        self.drills.len()
    }

    fn absorb(&mut self, report: SaveReport) {
        self.skipped_type += report.skipped_type;
        self.skipped_duplicate += report.skipped_duplicate;
        self.skipped_skill_cap += report.skipped_skill_cap;
        self.skipped_type_cap += report.skipped_type_cap;
        self.drills.extend(report.drills);
    }
}

/// `max(per_skill, min(skills * per_skill, floor))`, then capped.
pub fn compute_target(skill_count: usize, per_skill: usize, floor: usize, max_total: Option<usize>) -> usize {
    let target = per_skill.max(skill_count.saturating_mul(per_skill).min(floor));
    match max_total {
        Some(cap) => target.min(cap),
        None => target,
    }
}

pub struct DrillGenerator {
    drills: DrillStore,
    insights: Option<InsightStore>,
    service: Option<Arc<dyn GenerationService>>,
    signals: Option<Arc<dyn SkillSignalSource>>,
    event_bus: Arc<dyn EventBus>,
    settings: GeneratorSettings,
    cooldown: Cooldown,
}

impl DrillGenerator {
    pub fn new(drills: DrillStore, event_bus: Arc<dyn EventBus>, settings: GeneratorSettings) -> Self {
        let cooldown = Cooldown::new(settings.cooldown);
        Self {
            drills,
            insights: None,
            service: None,
            signals: None,
            event_bus,
            settings,
            cooldown,
        }
    }

    pub fn with_service(mut self, service: Arc<dyn GenerationService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_signal_source(mut self, signals: Arc<dyn SkillSignalSource>) -> Self {
        self.signals = Some(signals);
        self
    }

    pub fn with_insight_store(mut self, insights: InsightStore) -> Self {
        self.insights = Some(insights);
        self
    }

    pub fn settings(&self) -> &GeneratorSettings {
        &self.settings
    }

    /// Best single-attempt result for one skill, at most `opts.count` drills.
    /// Returns an empty list when no service is configured or every attempt
    /// fails.
    pub async fn generate_drills_for_skill(&self, skill: &WeakSkill, opts: &SkillGenerationOptions) -> Vec<Drill> {
        let Some(service) = &self.service else {
            return Vec::new();
        };
        if opts.count == 0 {
            return Vec::new();
        }

        let generation_options = GenerationOptions {
            temperature: opts.temperature,
            max_retries: opts.max_retries_per_attempt,
            max_output_tokens: opts.max_output_tokens,
            response_mime_type: JSON_MIME_TYPE.to_string(),
        };
        let attempts = opts.max_attempts.max(1);
        let mut best: Vec<Drill> = Vec::new();

        for attempt in 1..=attempts {
            let prompt = build_drill_prompt(skill, opts.count, &opts.allowed_types, attempt);
            match request_batch(service.as_ref(), &prompt, &generation_options, opts).await {
                Ok(payload) => {
                    let mut valid: Vec<Drill> = payload
                        .drafts()
                        .into_iter()
                        .filter_map(|draft| draft.into_drill(&skill.skill_id))
                        .collect();
                    valid.truncate(opts.count);

                    let outcome = if valid.len() >= opts.count {
                        "full"
                    } else if valid.is_empty() {
                        "empty"
                    } else {
                        "partial"
                    };
                    metrics::counter!("skillforge_generation_attempts_total", "outcome" => outcome).increment(1);
                    debug!(skill_id = %skill.skill_id, attempt, valid = valid.len(), requested = opts.count, "Generation attempt finished");

                    if valid.len() > best.len() {
                        best = valid;
                    }
                }
                Err(e) => {
                    metrics::counter!("skillforge_generation_attempts_total", "outcome" => "error").increment(1);
                    warn!(skill_id = %skill.skill_id, attempt, attempts, "Generation attempt failed: {}", e);
                }
            }

            if best.len() >= opts.count {
                break;
            }
        }

        best
    }

    /// Generate, validate and admit drills for `weak_skills`. See the module
    /// docs for the pass structure.
    pub async fn generate_from_weak_skills(
        &self,
        weak_skills: Vec<WeakSkill>,
        opts: &RunOptions,
    ) -> Result<DrillRun, GenerateError> {
        let now = Utc::now();
        let persisted = self.drills.last_run_at().await?;
        if let Err(remaining) = self.cooldown.try_begin(persisted, now) {
            return Err(GenerateError::Cooldown { remaining });
        }
        self.drills.record_run_start(now).await?;
        let _permit = self.drills.run_guard().acquire().await;
        let started = Instant::now();

        let supplied = if weak_skills.is_empty() {
            self.derive_weak_skills().await?
        } else {
            weak_skills
        };
        let skills = merge_weak_skills(supplied);
        if skills.is_empty() {
            return Err(GenerateError::NoWeakSkills);
        }

        let per_skill = opts.drills_per_skill.unwrap_or(self.settings.drills_per_skill).max(1);
        let max_total = opts.max_total.or(self.settings.max_total);
        let target = compute_target(skills.len(), per_skill, self.settings.target_floor, max_total);
        let caps = &self.settings.caps;

        let mut run = DrillRun {
            target,
            skills: skills.iter().map(|s| s.skill_id.clone()).collect(),
            ..DrillRun::default()
        };
        let mut saved_per_skill: HashMap<String, usize> = HashMap::new();

        info!(skills = skills.len(), target, per_skill, "Starting drill generation run");

        // Primary pass
        for skill in &skills {
            if run.total() >= target {
                break;
            }
            let request = per_skill.min(target - run.total());
            let drills = self
                .generate_drills_for_skill(skill, &self.settings.skill_options(request))
                .await;
            if drills.is_empty() {
                continue;
            }
            let report = self.drills.save_drills(drills, caps).await?;
            *saved_per_skill.entry(skill.skill_id.clone()).or_insert(0) += report.saved;
            run.primary_saved += report.saved;
            run.absorb(report);
        }

        // Supplement pass, fewest-served skills first
        if run.total() < target && self.service.is_some() {
            let mut order: Vec<&WeakSkill> = skills.iter().collect();
            order.sort_by_key(|s| saved_per_skill.get(&s.skill_id).copied().unwrap_or(0));
            let batch = (per_skill / 2).max(1);

            for skill in order {
                if run.total() >= target {
                    break;
                }
                let mut skill_opts = self.settings.skill_options(batch.min(target - run.total()));
                skill_opts.max_attempts = self.settings.max_attempts.saturating_sub(1).max(1);

                let drills = self.generate_drills_for_skill(skill, &skill_opts).await;
                if drills.is_empty() {
                    continue;
                }
                let report = self.drills.save_drills(drills, caps).await?;
                *saved_per_skill.entry(skill.skill_id.clone()).or_insert(0) += report.saved;
                run.supplement_saved += report.saved;
                run.absorb(report);
            }
        }

        if run.total() < target {
            self.template_fallback(&skills, caps, &mut run).await?;
        }

        run.duration_ms = started.elapsed().as_millis() as u64;
        info!(
            saved = run.total(),
            target,
            primary = run.primary_saved,
            supplement = run.supplement_saved,
            templates = run.template_saved,
            "Drill generation run completed"
        );

        if let Err(e) = self
            .event_bus
            .publish(PracticeEvent::DrillRunCompleted {
                target,
                saved: run.total(),
                from_templates: run.template_saved,
                skills: skills.len(),
                duration_ms: run.duration_ms,
                timestamp: Utc::now(),
            })
            .await
        {
            warn!("Failed to publish drill run event: {}", e);
        }

        Ok(run)
    }

    /// Admit canned drills round-robin over skills and allowed types until
    /// the target is met, or a bounded number of rounds has passed.
    async fn template_fallback(
        &self,
        skills: &[WeakSkill],
        caps: &AdmissionCaps,
        run: &mut DrillRun,
    ) -> Result<(), GenerateError> {
        let types: Vec<DrillType> = DrillType::ALL.into_iter().filter(|t| caps.allows(*t)).collect();
        if types.is_empty() {
            return Ok(());
        }

        // Continue variant numbering after whatever the store already holds
        let mut variants: HashMap<(String, DrillType), usize> = HashMap::new();
        let wanted: HashSet<&str> = skills.iter().map(|s| s.skill_id.as_str()).collect();
        for drill in self.drills.get_all().await? {
            if wanted.contains(drill.skill_id.as_str()) {
                *variants.entry((drill.skill_id, drill.drill_type)).or_insert(0) += 1;
            }
        }

        for round in 0..MAX_TEMPLATE_ROUNDS {
            let remaining = run.target.saturating_sub(run.total());
            if remaining == 0 {
                break;
            }

            let mut candidates = Vec::with_capacity(remaining);
            for k in 0..remaining {
                let skill_index = k % skills.len();
                let skill = &skills[skill_index];
                let drill_type = types[(round + k / skills.len() + skill_index) % types.len()];
                let variant = variants.entry((skill.skill_id.clone(), drill_type)).or_insert(0);
                *variant += 1;
                if let Some(drill) = template_drill(drill_type, skill, *variant) {
                    candidates.push(drill);
                }
            }

            let report = self.drills.save_drills(candidates, caps).await?;
            debug!(round, saved = report.saved, skipped = report.skipped(), "Template round finished");
            run.template_saved += report.saved;
            run.absorb(report);
        }

        if run.total() < run.target {
            warn!(saved = run.total(), target = run.target, "Drill queues are full; target not reached");
        }
        Ok(())
    }

    /// Skill tracker signals first, then the heaviest stored insights.
    async fn derive_weak_skills(&self) -> Result<Vec<WeakSkill>, GenerateError> {
        let limit = self.settings.derive_limit.max(1);

        if let Some(signals) = &self.signals {
            let derived = select_weak_signals(signals.skill_signals().await?, limit);
            if !derived.is_empty() {
                debug!(count = derived.len(), "Derived weak skills from skill signals");
                return Ok(derived);
            }
        }

        let Some(insights) = &self.insights else {
            return Ok(Vec::new());
        };

        let mut derived: Vec<WeakSkill> = Vec::new();
        let mut seen_skills: Vec<String> = Vec::new();
        for insight in insights.get_top_by_weight(limit * INSIGHTS_PER_DERIVED_SKILL).await? {
            for skill_id in &insight.skill_ids {
                if !seen_skills.contains(skill_id) {
                    if seen_skills.len() >= limit {
                        continue;
                    }
                    seen_skills.push(skill_id.clone());
                }
                derived.push(WeakSkill::new(skill_id.clone(), insight.content.clone()));
            }
        }
        debug!(count = seen_skills.len(), "Derived weak skills from stored insights");
        Ok(derived)
    }
}

/// One service call wrapped in the attempt's retry budget. Decoding failures
/// count as transient and are retried like transport errors.
async fn request_batch(
    service: &dyn GenerationService,
    prompt: &str,
    options: &GenerationOptions,
    opts: &SkillGenerationOptions,
) -> Result<DrillBatchPayload, GenerationError> {
    let tries = opts.max_retries_per_attempt.max(1);
    let mut last_error = GenerationError::Unavailable;

    for retry in 0..tries {
        let result = service
            .generate(prompt, options)
            .await
            .and_then(DrillBatchPayload::from_response);
        match result {
            Ok(payload) => return Ok(payload),
            Err(e) => {
                debug!("Generation call failed (try {}/{}): {}", retry + 1, tries, e);
                last_error = e;
                if retry + 1 < tries {
                    let backoff = opts.retry_delay.saturating_mul(2_u32.saturating_pow(retry));
                    tokio::time::sleep(backoff).await;
                }
            }
        }
    }

    Err(last_error)
}

/// Prompt asking for `count` drills for one skill. Attempts after the first
/// carry a repair hint.
pub fn build_drill_prompt(skill: &WeakSkill, count: usize, allowed_types: &[DrillType], attempt: u32) -> String {
    let types = allowed_types.iter().map(DrillType::as_str).collect::<Vec<_>>().join(", ");
    let mut prompt = String::new();

    let _ = writeln!(
        prompt,
        "You write short practice drills for a programmer who keeps making mistakes with the skill \"{}\".",
        skill.skill_id
    );
    if !skill.insight.trim().is_empty() {
        let _ = writeln!(prompt, "Observed mistakes: {}", skill.insight.trim());
    }
    let _ = writeln!(prompt, "\nCreate exactly {} drills. Allowed types: {}.", count, types);
    prompt.push_str(
        "Rules:\n\
         - fill-in-blank and spot-bug drills must include a non-empty \"answer\".\n\
         - critique and muscle-memory drills must set \"answer\" to null.\n\
         - \"difficulty\" is one of easy, medium, hard.\n\
         - Each drill targets the observed mistakes, not the skill in general.\n\n\
         Respond with JSON only:\n\
         {\"drills\": [{\"type\": string, \"content\": string, \"answer\": string | null, \
         \"explanation\": string, \"difficulty\": string, \"test_cases\": array | null}]}\n",
    );

    if attempt > 1 {
        let _ = write!(
            prompt,
            "\nYour previous reply could not be used. Return exactly {} well-formed items in the \"drills\" \
             array, each with an allowed type and non-empty content, and nothing outside the JSON object.",
            count
        );
    }
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::weak_skill::SkillSignal;
    use crate::infrastructure::InMemoryDrillRepository;
    use async_trait::async_trait;
    use parking_lot::Mutex;
    use serde_json::{json, Value};
    use std::collections::VecDeque;

    struct NoopEventBus;

    #[async_trait]
    impl EventBus for NoopEventBus {
        async fn publish(&self, _event: PracticeEvent) -> anyhow::Result<()> {
            Ok(())
        }
    }

    /// Replies in order, then keeps failing.
    struct ScriptedService {
        replies: Mutex<VecDeque<Result<Value, GenerationError>>>,
        prompts: Mutex<Vec<String>>,
    }

    impl ScriptedService {
        fn new(replies: Vec<Result<Value, GenerationError>>) -> Self {
            Self {
                replies: Mutex::new(replies.into()),
                prompts: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl GenerationService for ScriptedService {
        async fn generate(&self, prompt: &str, _options: &GenerationOptions) -> Result<Value, GenerationError> {
            self.prompts.lock().push(prompt.to_string());
            self.replies.lock().pop_front().unwrap_or(Err(GenerationError::Unavailable))
        }
    }

    struct StaticSignals(Vec<SkillSignal>);

    #[async_trait]
    impl SkillSignalSource for StaticSignals {
        async fn skill_signals(&self) -> Result<Vec<SkillSignal>, RepositoryError> {
            Ok(self.0.clone())
        }
    }

    fn fast_settings() -> GeneratorSettings {
        GeneratorSettings {
            retry_delay: Duration::ZERO,
            cooldown: Duration::ZERO,
            ..GeneratorSettings::default()
        }
    }

    fn generator(service: Option<ScriptedService>) -> (DrillGenerator, DrillStore) {
        let store = DrillStore::new(Arc::new(InMemoryDrillRepository::new()));
        let mut generator = DrillGenerator::new(store.clone(), Arc::new(NoopEventBus), fast_settings());
        if let Some(service) = service {
            generator = generator.with_service(Arc::new(service));
        }
        (generator, store)
    }

    fn critique(content: &str) -> Value {
        json!({"type": "critique", "content": content, "answer": null, "difficulty": "medium"})
    }

    #[test]
    fn test_compute_target() {
        assert_eq!(compute_target(1, 3, 12, None), 3);
        assert_eq!(compute_target(2, 3, 12, None), 6);
        assert_eq!(compute_target(10, 3, 12, None), 12);
        assert_eq!(compute_target(10, 3, 12, Some(5)), 5);
        assert_eq!(compute_target(0, 3, 12, None), 3);
    }

    #[test]
    fn test_prompt_repair_hint_only_after_first_attempt() {
        let skill = WeakSkill::new("recursion", "missing base case");
        let first = build_drill_prompt(&skill, 3, &DrillType::ALL, 1);
        let second = build_drill_prompt(&skill, 3, &DrillType::ALL, 2);
        assert!(first.contains("missing base case"));
        assert!(first.contains("fill-in-blank, spot-bug, critique, muscle-memory"));
        assert!(!first.contains("previous reply"));
        assert!(second.contains("Return exactly 3 well-formed items"));
    }

    #[tokio::test]
    async fn test_larger_attempt_wins_without_merging() {
        let service = ScriptedService::new(vec![
            Ok(json!({"drills": [
                critique("a1"),
                critique("a2"),
                {"type": "spot-bug", "content": "missing answer"}
            ]})),
            Ok(json!({"drills": [critique("b1"), critique("b2"), critique("b3")]})),
        ]);
        let (generator, _) = generator(Some(service));
        let skill = WeakSkill::new("binary_search", "");

        let drills = generator
            .generate_drills_for_skill(&skill, &SkillGenerationOptions::default())
            .await;
        let contents: Vec<&str> = drills.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["b1", "b2", "b3"]);
        assert!(drills.iter().all(|d| d.skill_id == "binary_search"));
    }

    #[tokio::test]
    async fn test_smaller_later_attempt_does_not_replace() {
        let service = ScriptedService::new(vec![
            Ok(json!({"drills": [critique("a1"), critique("a2")]})),
            Ok(json!({"drills": [critique("b1")]})),
            Ok(json!({"drills": [critique("c1"), critique("c2")]})),
        ]);
        let (generator, _) = generator(Some(service));
        let drills = generator
            .generate_drills_for_skill(&WeakSkill::new("loops", ""), &SkillGenerationOptions::default())
            .await;
        let contents: Vec<&str> = drills.iter().map(|d| d.content.as_str()).collect();
        assert_eq!(contents, vec!["a1", "a2"]);
    }

    #[tokio::test]
    async fn test_retries_inside_attempt_then_truncates() {
        let service = ScriptedService::new(vec![
            Err(GenerationError::RateLimit),
            Ok(json!({"drills": [critique("1"), critique("2"), critique("3"), critique("4")]})),
        ]);
        let (generator, _) = generator(Some(service));
        let drills = generator
            .generate_drills_for_skill(&WeakSkill::new("loops", ""), &SkillGenerationOptions::default())
            .await;
        assert_eq!(drills.len(), 3);
    }

    #[tokio::test]
    async fn test_error_body_counts_as_failure() {
        let service = ScriptedService::new(vec![Ok(json!({"error": "overloaded"}))]);
        let (generator, _) = generator(Some(service));
        let drills = generator
            .generate_drills_for_skill(&WeakSkill::new("loops", ""), &SkillGenerationOptions::default())
            .await;
        assert!(drills.is_empty());
    }

    #[tokio::test]
    async fn test_failing_service_reaches_floor_with_templates() {
        let (generator, store) = generator(Some(ScriptedService::new(vec![])));
        let skills = ["arrays", "recursion", "hashing", "graphs"]
            .into_iter()
            .map(|s| WeakSkill::new(s, "keeps missing edge cases"))
            .collect();

        let run = generator.generate_from_weak_skills(skills, &RunOptions::default()).await.unwrap();
        assert_eq!(run.target, 12);
        assert_eq!(run.total(), 12);
        assert_eq!(run.template_saved, 12);
        assert_eq!(store.get_all().await.unwrap().len(), 12);
    }

    #[tokio::test]
    async fn test_supplement_fills_gap() {
        // primary: 1 valid for arrays (3 attempts), 3 valid for loops; supplement tops up arrays
        let service = ScriptedService::new(vec![
            Ok(json!({"drills": [critique("arr-1")]})),
            Ok(json!({"drills": []})),
            Ok(json!({"drills": []})),
            Ok(json!({"drills": [
                {"type": "fill-in-blank", "content": "for i in 0..___", "answer": "n"},
                critique("loop-2"),
                {"type": "muscle-memory", "content": "Type a while loop"}
            ]})),
            Ok(json!({"drills": [{"type": "spot-bug", "content": "arr[len]", "answer": "index out of bounds"}]})),
            Ok(json!({"drills": [critique("arr-3")]})),
        ]);
        let (generator, _) = generator(Some(service));
        let run = generator
            .generate_from_weak_skills(
                vec![WeakSkill::new("arrays", ""), WeakSkill::new("loops", "")],
                &RunOptions::default(),
            )
            .await
            .unwrap();

        assert_eq!(run.target, 6);
        assert_eq!(run.primary_saved, 4);
        assert_eq!(run.supplement_saved, 2);
        assert_eq!(run.template_saved, 0);
    }

    #[tokio::test]
    async fn test_no_weak_skills() {
        let (generator, _) = generator(None);
        let result = generator.generate_from_weak_skills(vec![], &RunOptions::default()).await;
        assert!(matches!(result, Err(GenerateError::NoWeakSkills)));
    }

    #[tokio::test]
    async fn test_derives_from_signals() {
        let (generator, _) = generator(None);
        let generator = generator.with_signal_source(Arc::new(StaticSignals(vec![
            SkillSignal { id: "strong".into(), mistakes: 0, score: 0.1, hint: None },
            SkillSignal { id: "weak".into(), mistakes: 4, score: 0.2, hint: None },
        ])));
        let run = generator.generate_from_weak_skills(vec![], &RunOptions::default()).await.unwrap();
        assert_eq!(run.skills, vec!["weak".to_string()]);
        assert_eq!(run.total(), 3);
    }

    #[tokio::test]
    async fn test_cooldown_fails_fast() {
        let store = DrillStore::new(Arc::new(InMemoryDrillRepository::new()));
        let settings = GeneratorSettings {
            cooldown: Duration::from_secs(60),
            ..fast_settings()
        };
        let generator = DrillGenerator::new(store, Arc::new(NoopEventBus), settings);

        generator
            .generate_from_weak_skills(vec![WeakSkill::new("io", "")], &RunOptions::default())
            .await
            .unwrap();
        let second = generator
            .generate_from_weak_skills(vec![WeakSkill::new("io", "")], &RunOptions::default())
            .await;
        assert!(matches!(second, Err(GenerateError::Cooldown { .. })));
    }

    #[tokio::test]
    async fn test_cooldown_is_shared_through_the_store() {
        let store = DrillStore::new(Arc::new(InMemoryDrillRepository::new()));
        let settings = GeneratorSettings {
            cooldown: Duration::from_secs(60),
            ..fast_settings()
        };
        let first = DrillGenerator::new(store.clone(), Arc::new(NoopEventBus), settings.clone());
        let second = DrillGenerator::new(store.clone(), Arc::new(NoopEventBus), settings);

        first
            .generate_from_weak_skills(vec![WeakSkill::new("io", "")], &RunOptions::default())
            .await
            .unwrap();
        assert!(store.last_run_at().await.unwrap().is_some());

        let blocked = second
            .generate_from_weak_skills(vec![WeakSkill::new("io", "")], &RunOptions::default())
            .await;
        match blocked {
            Err(GenerateError::Cooldown { remaining }) => assert!(remaining <= Duration::from_secs(60)),
            other => panic!("expected cooldown, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_repeated_runs_keep_templates_unique() {
        let (generator, store) = generator(None);
        for _ in 0..2 {
            let run = generator
                .generate_from_weak_skills(vec![WeakSkill::new("sql", "")], &RunOptions::default())
                .await
                .unwrap();
            assert_eq!(run.total(), 3);
        }
        let all = store.get_all().await.unwrap();
        let signatures: HashSet<String> = all.iter().map(|d| d.signature()).collect();
        assert_eq!(all.len(), 6);
        assert_eq!(signatures.len(), 6);
    }
}
