// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # InsightDeduplicator
//!
//! Local, deterministic merge of near-duplicate insights already in the store.
//!
//! Grouping uses word-set Jaccard similarity (see [`calculate_similarity`])
//! in a single forward pass anchored on each group's *first* member. The
//! merged record keeps that anchor's content, so a deduplicated store has no
//! pair left above the threshold and a second pass merges nothing.
//! [`merge_insights`] still reports the *heaviest* member as the
//! representative and carries its weight. The compressor's local fallback
//! uses the first member and never reads weight.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::application::insight_store::InsightStore;
use crate::application::similarity::group_by_similarity;
use crate::domain::events::{EventBus, PracticeEvent};
use crate::domain::insight::{dedup_skills, Insight, InsightId};

pub use crate::application::similarity::calculate_similarity;

pub const DEFAULT_DEDUP_THRESHOLD: f64 = 0.6;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateGroup {
    pub ids: Vec<InsightId>,
    pub representative_content: String,
}

/// Result of folding a duplicate group into one record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergedInsight {
    pub representative_id: InsightId,
    pub content: String,
    pub skill_ids: Vec<String>,
    pub frequency: u32,
    pub weight: f64,
    pub last_seen_at: DateTime<Utc>,
    pub merged_count: usize,
}

impl MergedInsight {
    /// Overwrite `target`'s mutable fields, keeping its id and creation time.
    pub fn apply_to(&self, target: &mut Insight) {
        target.content = self.content.clone();
        target.skill_ids = self.skill_ids.clone();
        target.frequency = self.frequency;
        target.weight = self.weight;
        target.last_seen_at = self.last_seen_at;
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DedupReport {
    /// Groups merged
    pub merged: usize,
    /// Insights left in the store
    pub total: usize,
}

/// Groups of two or more insights at or above `threshold`.
pub fn find_duplicates(insights: &[Insight], threshold: f64) -> Vec<DuplicateGroup> {
    group_by_similarity(insights, threshold)
        .into_iter()
        .filter(|group| group.len() > 1)
        .map(|group| DuplicateGroup {
            ids: group.iter().map(|&i| insights[i].id).collect(),
            representative_content: insights[group[0]].content.clone(),
        })
        .collect()
}

/// Fold a group: anchor (first member) content, heaviest member as
/// representative, union of skills, summed frequency, max weight, seen now.
/// `None` for an empty group.
pub fn merge_insights(group: &[Insight]) -> Option<MergedInsight> {
    let anchor = group.first()?;
    let mut representative = anchor;
    for insight in &group[1..] {
        if insight.weight.partial_cmp(&representative.weight) == Some(Ordering::Greater) {
            representative = insight;
        }
    }

    let skill_ids = dedup_skills(group.iter().flat_map(|i| i.skill_ids.iter().cloned()).collect());
    let frequency = group.iter().fold(0u32, |acc, i| acc.saturating_add(i.frequency));
    let weight = group.iter().map(|i| i.weight).fold(f64::MIN, f64::max);

    Some(MergedInsight {
        representative_id: representative.id,
        content: anchor.content.clone(),
        skill_ids,
        frequency,
        weight,
        last_seen_at: Utc::now(),
        merged_count: group.len(),
    })
}

pub struct InsightDeduplicator {
    store: InsightStore,
    event_bus: Arc<dyn EventBus>,
}

impl InsightDeduplicator {
    pub fn new(store: InsightStore, event_bus: Arc<dyn EventBus>) -> Self {
        Self { store, event_bus }
    }

    /// Merge every duplicate group into its first member and delete the rest.
    pub async fn deduplicate_store(&self, threshold: f64) -> anyhow::Result<DedupReport> {
        let _permit = self.store.run_guard().acquire().await;

        let all = self.store.get_all().await?;
        let groups = find_duplicates(&all, threshold);
        let by_id: HashMap<InsightId, &Insight> = all.iter().map(|i| (i.id, i)).collect();

        for group in &groups {
            let members: Vec<Insight> = group
                .ids
                .iter()
                .filter_map(|id| by_id.get(id).map(|i| (*i).clone()))
                .collect();
            let Some(merged) = merge_insights(&members) else {
                continue;
            };

            let mut survivor = members[0].clone();
            merged.apply_to(&mut survivor);
            self.store.update(&survivor).await?;
            for member in &members[1..] {
                self.store.delete(member.id).await?;
            }

            self.event_bus
                .publish(PracticeEvent::InsightsMerged {
                    survivor_id: survivor.id,
                    merged_count: merged.merged_count,
                    timestamp: Utc::now(),
                })
                .await?;
        }

        let report = DedupReport {
            merged: groups.len(),
            total: self.store.get_all().await?.len(),
        };
        info!(merged = report.merged, total = report.total, threshold, "Deduplicated insight store");
        Ok(report)
    }
}
