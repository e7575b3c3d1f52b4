// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # InsightStore
//!
//! Keyed access to the learner's long-term mistake memory. Wraps an
//! [`InsightRepository`] with the queries and mutations the rest of the
//! pipeline needs: skill lookups, recency and weight rankings, frequency
//! bumps and time decay.
//!
//! Whole-store runs (dedup, compression, maintenance) take the store's
//! [`RunGuard`] so they never interleave. Single operations do not.

use chrono::Utc;
use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;
use tracing::debug;

use crate::application::run_guard::RunGuard;
use crate::domain::insight::{Insight, InsightId, InsightStats};
use crate::domain::repository::{InsightRepository, RepositoryError};

#[derive(Clone)]
pub struct InsightStore {
    repo: Arc<dyn InsightRepository>,
    guard: RunGuard,
}

impl InsightStore {
    pub fn new(repo: Arc<dyn InsightRepository>) -> Self {
        Self {
            repo,
            guard: RunGuard::new(),
        }
    }

    pub fn run_guard(&self) -> &RunGuard {
        &self.guard
    }

    pub async fn add(&self, insight: &Insight) -> Result<InsightId, RepositoryError> {
        self.repo.add(insight).await?;
        debug!(insight_id = %insight.id, skills = ?insight.skill_ids, "Stored insight");
        Ok(insight.id)
    }

    pub async fn get_by_id(&self, id: InsightId) -> Result<Option<Insight>, RepositoryError> {
        self.repo.get_by_id(id).await
    }

    pub async fn update(&self, insight: &Insight) -> Result<(), RepositoryError> {
        self.repo.update(insight).await
    }

    pub async fn delete(&self, id: InsightId) -> Result<bool, RepositoryError> {
        self.repo.delete(id).await
    }

    pub async fn clear(&self) -> Result<(), RepositoryError> {
        self.repo.clear().await
    }

    pub async fn get_all(&self) -> Result<Vec<Insight>, RepositoryError> {
        self.repo.get_all().await
    }

    pub async fn get_by_skill_id(&self, skill_id: &str) -> Result<Vec<Insight>, RepositoryError> {
        self.repo.find_by_skill_id(skill_id).await
    }

    /// Insights tagged with any of `skill_ids`, each reported once.
    pub async fn get_by_skill_ids(&self, skill_ids: &[String]) -> Result<Vec<Insight>, RepositoryError> {
        let wanted: HashSet<&str> = skill_ids.iter().map(String::as_str).collect();
        let all = self.repo.get_all().await?;
        Ok(all
            .into_iter()
            .filter(|i| i.skill_ids.iter().any(|s| wanted.contains(s.as_str())))
            .collect())
    }

    /// Newest first.
    pub async fn get_recent(&self, limit: usize) -> Result<Vec<Insight>, RepositoryError> {
        let mut all = self.repo.get_all().await?;
        all.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        all.truncate(limit);
        Ok(all)
    }

    /// Heaviest first; ties keep store order.
    pub async fn get_top_by_weight(&self, limit: usize) -> Result<Vec<Insight>, RepositoryError> {
        let mut all = self.repo.get_all().await?;
        all.sort_by(|a, b| b.weight.partial_cmp(&a.weight).unwrap_or(Ordering::Equal));
        all.truncate(limit);
        Ok(all)
    }

    /// Count another occurrence: frequency + 1 and `last_seen_at` = now.
    pub async fn increment_frequency(&self, id: InsightId) -> Result<Insight, RepositoryError> {
        let mut insight = self
            .repo
            .get_by_id(id)
            .await?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        insight.touch();
        self.repo.update(&insight).await?;
        Ok(insight)
    }

    /// Multiply each insight's weight by `decay_factor` once per whole day
    /// since it was last seen (or last decayed). Same-day insights are left
    /// alone. Returns how many insights changed.
    pub async fn apply_decay(&self, decay_factor: f64) -> Result<usize, RepositoryError> {
        let now = Utc::now();
        let mut touched = 0;
        for mut insight in self.repo.get_all().await? {
            if insight.apply_time_decay(decay_factor, now) {
                self.repo.update(&insight).await?;
                touched += 1;
            }
        }
        debug!(touched, decay_factor, "Applied insight decay");
        Ok(touched)
    }

    pub async fn get_stats(&self) -> Result<InsightStats, RepositoryError> {
        let all = self.repo.get_all().await?;
        Ok(InsightStats::from_insights(&all))
    }
}
