// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Insight retention - time decay, pruning and archival
//!
//! [`RetentionPolicy`] holds the three maintenance steps and the composed
//! cycle. [`RetentionScheduler`] runs that cycle on an interval in the
//! background until cancelled.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Keeps the insight memory small and current

use anyhow::Result;
use chrono::{DateTime, Duration as ChronoDuration, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::time::interval;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::application::insight_store::InsightStore;
use crate::domain::config::RetentionConfig;
use crate::domain::events::{EventBus, PracticeEvent};
use crate::domain::repository::{InsightRepository, RepositoryError};

/// Parameters for one maintenance cycle
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RetentionOptions {
    /// Per-day weight multiplier
    pub decay_rate: f64,

    /// Insights lighter than this are deleted
    pub min_weight: f64,

    /// Insights not seen for longer than this are archived
    pub max_age_days: i64,
}

impl Default for RetentionOptions {
    fn default() -> Self {
        Self {
            decay_rate: 0.95,
            min_weight: 0.1,
            max_age_days: 30,
        }
    }
}

impl From<&RetentionConfig> for RetentionOptions {
    fn from(config: &RetentionConfig) -> Self {
        Self {
            decay_rate: config.decay_rate,
            min_weight: config.min_weight,
            max_age_days: config.max_age_days,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MaintenanceReport {
    pub decayed: usize,
    pub pruned: usize,
    pub archived: usize,
    pub ran_at: DateTime<Utc>,
    pub duration_ms: u64,
}

pub struct RetentionPolicy {
    store: InsightStore,
    archive: Option<Arc<dyn InsightRepository>>,
    event_bus: Arc<dyn EventBus>,
}

impl RetentionPolicy {
    pub fn new(store: InsightStore, event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            store,
            archive: None,
            event_bus,
        }
    }

    /// Copy expired insights into `archive` before removing them from the
    /// live store.
    pub fn with_archive(mut self, archive: Arc<dyn InsightRepository>) -> Self {
        self.archive = Some(archive);
        self
    }

    pub async fn apply_decay(&self, decay_rate: f64) -> Result<usize> {
        let count = self.store.apply_decay(decay_rate).await?;
        if count > 0 {
            self.event_bus
                .publish(PracticeEvent::InsightsDecayed {
                    count,
                    decay_rate,
                    timestamp: Utc::now(),
                })
                .await?;
        }
        Ok(count)
    }

    /// Delete every insight with `weight < min_weight`.
    pub async fn prune_stale_insights(&self, min_weight: f64) -> Result<usize> {
        let mut pruned = 0;
        for insight in self.store.get_all().await? {
            if insight.weight >= min_weight {
                continue;
            }
            if self.store.delete(insight.id).await? {
                pruned += 1;
                self.event_bus
                    .publish(PracticeEvent::InsightPruned {
                        insight_id: insight.id,
                        final_weight: insight.weight,
                        timestamp: Utc::now(),
                    })
                    .await?;
            }
        }
        metrics::counter!("skillforge_insights_pruned_total").increment(pruned as u64);
        Ok(pruned)
    }

    /// Remove every insight whose `last_seen_at` is older than the cutoff.
    pub async fn archive_old_insights(&self, max_age_days: i64) -> Result<usize> {
        let now = Utc::now();
        let cutoff = now - ChronoDuration::days(max_age_days);
        let mut archived = 0;

        for insight in self.store.get_all().await? {
            if insight.last_seen_at >= cutoff {
                continue;
            }
            if let Some(archive) = &self.archive {
                match archive.add(&insight).await {
                    Err(RepositoryError::Conflict(_)) => archive.update(&insight).await?,
                    other => other?,
                }
            }
            if self.store.delete(insight.id).await? {
                archived += 1;
                self.event_bus
                    .publish(PracticeEvent::InsightArchived {
                        insight_id: insight.id,
                        age_days: insight.age_days(now),
                        retained: self.archive.is_some(),
                        timestamp: now,
                    })
                    .await?;
            }
        }
        metrics::counter!("skillforge_insights_archived_total").increment(archived as u64);
        Ok(archived)
    }

    /// Decay, then prune, then archive. Holds the store's run guard.
    pub async fn run_maintenance_cycle(&self, options: RetentionOptions) -> Result<MaintenanceReport> {
        let _permit = self.store.run_guard().acquire().await;
        let started = Instant::now();
        let ran_at = Utc::now();

        let decayed = self.apply_decay(options.decay_rate).await?;
        let pruned = self.prune_stale_insights(options.min_weight).await?;
        let archived = self.archive_old_insights(options.max_age_days).await?;
        let duration_ms = started.elapsed().as_millis() as u64;

        self.event_bus
            .publish(PracticeEvent::MaintenanceCompleted {
                decayed,
                pruned,
                archived,
                duration_ms,
                timestamp: Utc::now(),
            })
            .await?;

        Ok(MaintenanceReport {
            decayed,
            pruned,
            archived,
            ran_at,
            duration_ms,
        })
    }
}

/// Background maintenance loop
pub struct RetentionScheduler {
    policy: Arc<RetentionPolicy>,
    config: RetentionConfig,
    shutdown_token: CancellationToken,
}

impl RetentionScheduler {
    pub fn new(policy: Arc<RetentionPolicy>, config: RetentionConfig) -> Self {
        Self {
            policy,
            config,
            shutdown_token: CancellationToken::new(),
        }
    }

    pub fn shutdown_token(&self) -> CancellationToken {
        self.shutdown_token.clone()
    }

    pub fn start(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            self.run().await;
        })
    }

    async fn run(&self) {
        if !self.config.enabled {
            info!("Insight retention scheduler is disabled");
            return;
        }

        info!(
            interval_seconds = self.config.interval_seconds,
            decay_rate = self.config.decay_rate,
            min_weight = self.config.min_weight,
            max_age_days = self.config.max_age_days,
            "Starting insight retention scheduler"
        );

        let mut tick = interval(Duration::from_secs(self.config.interval_seconds.max(1)));

        loop {
            tokio::select! {
                _ = tick.tick() => {
                    debug!("Running insight maintenance cycle");
                    match self.run_cycle().await {
                        Ok(report) => info!(
                            decayed = report.decayed,
                            pruned = report.pruned,
                            archived = report.archived,
                            "Insight maintenance cycle completed"
                        ),
                        Err(e) => warn!("Insight maintenance cycle failed: {}", e),
                    }
                }
                _ = self.shutdown_token.cancelled() => {
                    info!("Shutdown signal received, stopping retention scheduler");
                    break;
                }
            }
        }

        info!("Insight retention scheduler stopped");
    }

    pub async fn run_cycle(&self) -> Result<MaintenanceReport> {
        self.policy
            .run_maintenance_cycle(RetentionOptions::from(&self.config))
            .await
    }
}
