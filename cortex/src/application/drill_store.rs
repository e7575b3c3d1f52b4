// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # DrillStore
//!
//! Keyed persistence for drills plus the admission pipeline that guards the
//! per-skill practice queues.
//!
//! ## Admission
//!
//! [`DrillStore::save_drills`] builds an [`AdmissionLedger`] from a snapshot
//! of the store, then walks the candidates in order. Each candidate is
//! checked against, in this order:
//!
//! 1. the allowed drill types
//! 2. the signature of every drill ever stored, completed ones included
//! 3. `max_per_skill` pending drills of allowed types for its skill
//! 4. `max_per_skill_type` pending drills for its (skill, type)
//!
//! Admitted drills update the ledger immediately, so later candidates in the
//! same call see the new counts. The ledger lives for one call only.
//!
//! `save_drills` does not take the run guard; callers running a whole
//! generation pass hold it for the duration.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::debug;

use crate::application::run_guard::RunGuard;
use crate::domain::config::DrillConfig;
use crate::domain::drill::{Drill, DrillId, DrillStatus, DrillType};
use crate::domain::repository::{DrillRepository, RepositoryError};

/// Ceilings applied by the admission pipeline
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AdmissionCaps {
    pub max_per_skill: usize,
    pub max_per_skill_type: usize,
    pub allowed_types: Vec<DrillType>,
}

impl Default for AdmissionCaps {
    fn default() -> Self {
        Self {
            max_per_skill: 9,
            max_per_skill_type: 3,
            allowed_types: DrillType::ALL.to_vec(),
        }
    }
}

impl From<&DrillConfig> for AdmissionCaps {
    fn from(config: &DrillConfig) -> Self {
        Self {
            max_per_skill: config.max_per_skill,
            max_per_skill_type: config.max_per_skill_type,
            allowed_types: config.allowed_types.clone(),
        }
    }
}

impl AdmissionCaps {
    pub fn allows(&self, drill_type: DrillType) -> bool {
        self.allowed_types.contains(&drill_type)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    Type,
    Duplicate,
    SkillCap,
    TypeCap,
}

impl SkipReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            SkipReason::Type => "type",
            SkipReason::Duplicate => "duplicate",
            SkipReason::SkillCap => "skill_cap",
            SkipReason::TypeCap => "type_cap",
        }
    }
}

/// Run-scoped admission state: signatures seen and pending counts.
#[derive(Debug, Clone, Default)]
pub struct AdmissionLedger {
    signatures: HashSet<String>,
    per_skill: HashMap<String, usize>,
    per_skill_type: HashMap<(String, DrillType), usize>,
}

impl AdmissionLedger {
    pub fn from_snapshot(existing: &[Drill], caps: &AdmissionCaps) -> Self {
        let mut ledger = Self::default();
        for drill in existing {
            ledger.signatures.insert(drill.signature());
            if drill.is_pending() && caps.allows(drill.drill_type) {
                ledger.count(drill);
            }
        }
        ledger
    }

    fn count(&mut self, drill: &Drill) {
        *self.per_skill.entry(drill.skill_id.clone()).or_insert(0) += 1;
        *self
            .per_skill_type
            .entry((drill.skill_id.clone(), drill.drill_type))
            .or_insert(0) += 1;
    }

    pub fn pending_for_skill(&self, skill_id: &str) -> usize {
        self.per_skill.get(skill_id).copied().unwrap_or(0)
    }

    pub fn pending_for(&self, skill_id: &str, drill_type: DrillType) -> usize {
        self.per_skill_type
            .get(&(skill_id.to_string(), drill_type))
            .copied()
            .unwrap_or(0)
    }

    pub fn check(&self, drill: &Drill, caps: &AdmissionCaps) -> Result<(), SkipReason> {
        if !caps.allows(drill.drill_type) {
            return Err(SkipReason::Type);
        }
        if self.signatures.contains(&drill.signature()) {
            return Err(SkipReason::Duplicate);
        }
        if self.pending_for_skill(&drill.skill_id) >= caps.max_per_skill {
            return Err(SkipReason::SkillCap);
        }
        if self.pending_for(&drill.skill_id, drill.drill_type) >= caps.max_per_skill_type {
            return Err(SkipReason::TypeCap);
        }
        Ok(())
    }

    /// Account for an admitted drill.
    pub fn record(&mut self, drill: &Drill) {
        self.signatures.insert(drill.signature());
        self.count(drill);
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveReport {
    pub saved: usize,
    pub skipped_type: usize,
    pub skipped_duplicate: usize,
    pub skipped_skill_cap: usize,
    pub skipped_type_cap: usize,
    pub drills: Vec<Drill>,
}

impl SaveReport {
    pub fn skipped(&self) -> usize {
        self.skipped_type + self.skipped_duplicate + self.skipped_skill_cap + self.skipped_type_cap
    }

    fn note_skip(&mut self, reason: SkipReason) {
        match reason {
            SkipReason::Type => self.skipped_type += 1,
            SkipReason::Duplicate => self.skipped_duplicate += 1,
            SkipReason::SkillCap => self.skipped_skill_cap += 1,
            SkipReason::TypeCap => self.skipped_type_cap += 1,
        }
    }
}

#[derive(Clone)]
pub struct DrillStore {
    repo: Arc<dyn DrillRepository>,
    guard: RunGuard,
}

impl DrillStore {
    pub fn new(repo: Arc<dyn DrillRepository>) -> Self {
        Self {
            repo,
            guard: RunGuard::new(),
        }
    }

    pub fn run_guard(&self) -> &RunGuard {
        &self.guard
    }

    pub async fn last_run_at(&self) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        self.repo.last_run_at().await
    }

    pub async fn record_run_start(&self, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.repo.set_last_run_at(at).await
    }

    pub async fn add(&self, drill: &Drill) -> Result<DrillId, RepositoryError> {
        self.repo.add(drill).await?;
        Ok(drill.id)
    }

    pub async fn get_by_id(&self, id: DrillId) -> Result<Option<Drill>, RepositoryError> {
        self.repo.get_by_id(id).await
    }

    pub async fn update(&self, drill: &Drill) -> Result<(), RepositoryError> {
        self.repo.update(drill).await
    }

    pub async fn delete(&self, id: DrillId) -> Result<bool, RepositoryError> {
        self.repo.delete(id).await
    }

    pub async fn clear(&self) -> Result<(), RepositoryError> {
        self.repo.clear().await
    }

    pub async fn get_all(&self) -> Result<Vec<Drill>, RepositoryError> {
        self.repo.get_all().await
    }

    pub async fn get_by_skill_id(&self, skill_id: &str) -> Result<Vec<Drill>, RepositoryError> {
        self.repo.find_by_skill_id(skill_id).await
    }

    pub async fn get_by_type(&self, drill_type: DrillType) -> Result<Vec<Drill>, RepositoryError> {
        self.repo.find_by_type(drill_type).await
    }

    pub async fn get_by_status(&self, status: DrillStatus) -> Result<Vec<Drill>, RepositoryError> {
        self.repo.find_by_status(status).await
    }

    pub async fn get_pending(&self) -> Result<Vec<Drill>, RepositoryError> {
        self.repo.find_by_status(DrillStatus::Pending).await
    }

    /// Pending drills per skill, all types.
    pub async fn pending_counts(&self) -> Result<BTreeMap<String, usize>, RepositoryError> {
        let mut counts = BTreeMap::new();
        for drill in self.get_pending().await? {
            *counts.entry(drill.skill_id).or_insert(0) += 1;
        }
        Ok(counts)
    }

    /// Run `drills` through admission in order and persist the survivors.
    pub async fn save_drills(&self, drills: Vec<Drill>, caps: &AdmissionCaps) -> Result<SaveReport, RepositoryError> {
        let existing = self.repo.get_all().await?;
        let mut ledger = AdmissionLedger::from_snapshot(&existing, caps);
        let mut report = SaveReport::default();

        for drill in drills {
            if let Err(reason) = ledger.check(&drill, caps) {
                debug!(skill_id = %drill.skill_id, drill_type = %drill.drill_type, reason = reason.as_str(), "Drill not admitted");
                metrics::counter!("skillforge_drills_skipped_total", "reason" => reason.as_str()).increment(1);
                report.note_skip(reason);
                continue;
            }
            self.repo.add(&drill).await?;
            ledger.record(&drill);
            report.saved += 1;
            report.drills.push(drill);
        }

        metrics::counter!("skillforge_drills_saved_total").increment(report.saved as u64);
        Ok(report)
    }

    /// Close out a practice attempt.
    pub async fn record_result(&self, id: DrillId, correct: bool) -> Result<Drill, RepositoryError> {
        let mut drill = self.require(id).await?;
        drill.record_result(correct);
        self.repo.update(&drill).await?;
        Ok(drill)
    }

    pub async fn skip(&self, id: DrillId) -> Result<Drill, RepositoryError> {
        let mut drill = self.require(id).await?;
        drill.skip();
        self.repo.update(&drill).await?;
        Ok(drill)
    }

    async fn require(&self, id: DrillId) -> Result<Drill, RepositoryError> {
        self.repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))
    }
}
