// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # InsightCompressor
//!
//! Turns the raw insight list into short, reusable "atomic" insights.
//!
//! When a [`GenerationService`] is configured the raw list is enumerated into
//! a prompt and the service proposes merge groups and drops. Any service
//! error or off-schema reply falls back to [`InsightCompressor::local_compress`],
//! a forward Jaccard grouping at its own threshold (0.5) whose representative
//! is the first member. Weight is never read here.

use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashSet};
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::insight_store::InsightStore;
use crate::application::similarity::group_by_similarity;
use crate::domain::events::{EventBus, PracticeEvent};
use crate::domain::generation::{CompressionPayload, GenerationOptions, GenerationService};
use crate::domain::insight::{dedup_skills, Insight};

pub const DEFAULT_COMPRESSION_THRESHOLD: f64 = 0.5;
pub const COMPRESSION_SOURCE: &str = "compression";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AtomicInsight {
    pub content: String,
    pub skill_ids: Vec<String>,
    /// Indices into the compressed input
    pub merged_from: Vec<usize>,
    pub frequency: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompressionResult {
    pub atomic_insights: Vec<AtomicInsight>,
    pub dropped_indices: Vec<usize>,
    pub used_service: bool,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompressionReport {
    /// Raw insights deleted (merged away or dropped)
    pub removed: usize,
    /// Atomic insights inserted
    pub created: usize,
    pub dropped: usize,
    pub used_service: bool,
    /// Insights left in the store
    pub total: usize,
}

pub struct InsightCompressor {
    store: InsightStore,
    service: Option<Arc<dyn GenerationService>>,
    event_bus: Arc<dyn EventBus>,
    threshold: f64,
    options: GenerationOptions,
}

impl InsightCompressor {
    pub fn new(store: InsightStore, event_bus: Arc<dyn EventBus>) -> Self {
        Self {
            store,
            service: None,
            event_bus,
            threshold: DEFAULT_COMPRESSION_THRESHOLD,
            options: GenerationOptions {
                temperature: 0.2,
                ..GenerationOptions::default()
            },
        }
    }

    pub fn with_service(mut self, service: Arc<dyn GenerationService>) -> Self {
        self.service = Some(service);
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_options(mut self, options: GenerationOptions) -> Self {
        self.options = options;
        self
    }

    /// Service-backed compression with local fallback. Never fails.
    pub async fn compress(&self, insights: &[Insight]) -> CompressionResult {
        let Some(service) = &self.service else {
            return self.local_compress(insights);
        };

        let prompt = build_compression_prompt(insights);
        match service.generate(&prompt, &self.options).await {
            Ok(value) => match CompressionPayload::from_response(value)
                .map_err(|e| e.to_string())
                .and_then(|payload| accept_payload(payload, insights))
            {
                Ok(result) => return result,
                Err(reason) => warn!(reason = %reason, "Compression reply rejected, using local fallback"),
            },
            Err(e) => warn!(error = %e, "Compression service failed, using local fallback"),
        }
        self.local_compress(insights)
    }

    /// Deterministic fallback: one atomic insight per similarity group
    /// (singletons included) with the first member's content.
    pub fn local_compress(&self, insights: &[Insight]) -> CompressionResult {
        let atomic_insights = group_by_similarity(insights, self.threshold)
            .into_iter()
            .map(|group| AtomicInsight {
                content: insights[group[0]].content.clone(),
                skill_ids: union_skills(insights, &group),
                frequency: sum_frequency(insights, &group),
                merged_from: group,
            })
            .collect();

        CompressionResult {
            atomic_insights,
            dropped_indices: Vec::new(),
            used_service: false,
        }
    }

    /// Replace each multi-member group with one fresh insight and delete
    /// dropped insights. Singleton groups stay as they are.
    pub async fn apply_compression(&self) -> anyhow::Result<CompressionReport> {
        let _permit = self.store.run_guard().acquire().await;

        let all = self.store.get_all().await?;
        if all.is_empty() {
            return Ok(CompressionReport::default());
        }

        let result = self.compress(&all).await;
        let mut deleted: HashSet<usize> = HashSet::new();
        let mut created = 0;
        let mut dropped = 0;

        for atomic in result.atomic_insights.iter().filter(|a| a.merged_from.len() > 1) {
            for &index in &atomic.merged_from {
                if deleted.insert(index) {
                    self.store.delete(all[index].id).await?;
                }
            }
            let fresh = Insight::new(atomic.content.clone(), atomic.skill_ids.clone(), COMPRESSION_SOURCE)
                .with_frequency(atomic.frequency);
            self.store.add(&fresh).await?;
            created += 1;
        }

        for &index in &result.dropped_indices {
            if deleted.insert(index) {
                self.store.delete(all[index].id).await?;
                dropped += 1;
            }
        }

        let report = CompressionReport {
            removed: deleted.len(),
            created,
            dropped,
            used_service: result.used_service,
            total: self.store.get_all().await?.len(),
        };

        self.event_bus
            .publish(PracticeEvent::InsightsCompressed {
                removed: report.removed,
                created: report.created,
                used_service: report.used_service,
                timestamp: Utc::now(),
            })
            .await?;

        info!(
            removed = report.removed,
            created = report.created,
            dropped = report.dropped,
            used_service = report.used_service,
            "Compressed insight store"
        );
        Ok(report)
    }
}

fn union_skills(insights: &[Insight], group: &[usize]) -> Vec<String> {
    dedup_skills(group.iter().flat_map(|&i| insights[i].skill_ids.iter().cloned()).collect())
}

fn sum_frequency(insights: &[Insight], group: &[usize]) -> u32 {
    group.iter().fold(0u32, |acc, &i| acc.saturating_add(insights[i].frequency))
}

fn build_compression_prompt(insights: &[Insight]) -> String {
    let mut prompt = String::from(
        "You maintain a learner's long-term memory of programming mistakes.\n\
         Merge observations that describe the same underlying mistake into short, reusable \
         atomic insights, and drop observations that carry no actionable information.\n\n\
         Observations:\n",
    );
    for (index, insight) in insights.iter().enumerate() {
        let skills = if insight.skill_ids.is_empty() {
            "none".to_string()
        } else {
            insight.skill_ids.join(", ")
        };
        let _ = writeln!(
            prompt,
            "[{}] {} (skills: {}; frequency: {})",
            index, insight.content, skills, insight.frequency
        );
    }
    prompt.push_str(
        "\nRespond with JSON only, in this shape:\n\
         {\"atomicInsights\": [{\"content\": string, \"skillIds\": [string], \"mergedFrom\": [index], \
         \"frequency\": number}], \"droppedIndices\": [index]}\n\
         Every observation index must appear in exactly one mergedFrom list or in droppedIndices.",
    );
    prompt
}

/// Check the proposed groups against the input before trusting them.
fn accept_payload(payload: CompressionPayload, insights: &[Insight]) -> Result<CompressionResult, String> {
    let len = insights.len();
    if let Some(bad) = payload.dropped_indices.iter().find(|&&i| i >= len) {
        return Err(format!("dropped index {} out of range", bad));
    }

    let mut atomic_insights = Vec::with_capacity(payload.atomic_insights.len());
    for item in payload.atomic_insights {
        if item.content.trim().is_empty() || item.merged_from.is_empty() {
            return Err("atomic insight without content or sources".to_string());
        }
        if let Some(bad) = item.merged_from.iter().find(|&&i| i >= len) {
            return Err(format!("merged index {} out of range", bad));
        }
        let merged_from: Vec<usize> = item.merged_from.into_iter().collect::<BTreeSet<_>>().into_iter().collect();
        let skill_ids = if item.skill_ids.is_empty() {
            union_skills(insights, &merged_from)
        } else {
            dedup_skills(item.skill_ids)
        };
        let frequency = item
            .frequency
            .filter(|f| *f > 0)
            .unwrap_or_else(|| sum_frequency(insights, &merged_from));
        atomic_insights.push(AtomicInsight {
            content: item.content.trim().to_string(),
            skill_ids,
            merged_from,
            frequency,
        });
    }

    Ok(CompressionResult {
        atomic_insights,
        dropped_indices: payload.dropped_indices,
        used_service: true,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::generation::GenerationError;
    use crate::infrastructure::InMemoryInsightRepository;
    use async_trait::async_trait;
    use chrono::Duration;
    use serde_json::{json, Value};

    struct NoopEventBus;

    #[async_trait]
    impl EventBus for NoopEventBus {
        async fn publish(&self, _event: PracticeEvent) -> anyhow::Result<()> {
            Ok(())
        }
    }

    struct FixedService {
        reply: Result<Value, GenerationError>,
    }

    #[async_trait]
    impl GenerationService for FixedService {
        async fn generate(&self, _prompt: &str, _options: &GenerationOptions) -> Result<Value, GenerationError> {
            self.reply.clone()
        }
    }

    /// Three raw insights in a fixed store order; 0 and 1 are near-duplicates.
    async fn seeded_store() -> (InsightStore, Vec<Insight>) {
        let store = InsightStore::new(Arc::new(InMemoryInsightRepository::new()));
        let base = Utc::now() - Duration::minutes(5);
        let mut insights = vec![
            Insight::new("forgot empty array check", vec!["arrays".into()], "test").with_frequency(3),
            Insight::new("forgot the empty array check again", vec!["edge-cases".into()], "test").with_frequency(2),
            Insight::new("mutated shared state inside loop", vec!["state".into()], "test"),
        ];
        for (offset, insight) in insights.iter_mut().enumerate() {
            insight.created_at = base + Duration::seconds(offset as i64);
            store.add(insight).await.unwrap();
        }
        (store, insights)
    }

    #[tokio::test]
    async fn test_local_compress_groups_with_first_content() {
        let (store, insights) = seeded_store().await;
        let compressor = InsightCompressor::new(store, Arc::new(NoopEventBus));
        let result = compressor.local_compress(&insights);

        assert!(!result.used_service);
        assert_eq!(result.atomic_insights.len(), 2);
        let merged = &result.atomic_insights[0];
        assert_eq!(merged.merged_from, vec![0, 1]);
        assert_eq!(merged.content, "forgot empty array check");
        assert_eq!(merged.frequency, 5);
        assert_eq!(merged.skill_ids, vec!["arrays".to_string(), "edge-cases".to_string()]);
    }

    #[tokio::test]
    async fn test_apply_compression_local_leaves_singletons() {
        let (store, insights) = seeded_store().await;
        let compressor = InsightCompressor::new(store.clone(), Arc::new(NoopEventBus));

        let report = compressor.apply_compression().await.unwrap();
        assert_eq!(report.removed, 2);
        assert_eq!(report.created, 1);
        assert_eq!(report.total, 2);

        assert!(store.get_by_id(insights[2].id).await.unwrap().is_some());
        let all = store.get_all().await.unwrap();
        let fresh = all.iter().find(|i| i.source == COMPRESSION_SOURCE).unwrap();
        assert_eq!(fresh.frequency, 5);
        assert_eq!(fresh.weight, 1.0);
    }

    #[tokio::test]
    async fn test_apply_compression_with_service_drops() {
        let (store, insights) = seeded_store().await;
        let service = FixedService {
            reply: Ok(json!({
                "atomicInsights": [
                    {"content": "Check for empty arrays first", "skillIds": ["arrays"], "mergedFrom": [0, 1], "frequency": 5}
                ],
                "droppedIndices": [2]
            })),
        };
        let compressor =
            InsightCompressor::new(store.clone(), Arc::new(NoopEventBus)).with_service(Arc::new(service));

        let report = compressor.apply_compression().await.unwrap();
        assert!(report.used_service);
        assert_eq!((report.removed, report.created, report.dropped, report.total), (3, 1, 1, 1));
        assert!(store.get_by_id(insights[2].id).await.unwrap().is_none());
        assert_eq!(store.get_all().await.unwrap()[0].content, "Check for empty arrays first");
    }

    #[tokio::test]
    async fn test_repeated_source_indices_count_once() {
        let (store, insights) = seeded_store().await;
        let service = FixedService {
            reply: Ok(json!({
                "atomicInsights": [
                    {"content": "Check for empty arrays first", "mergedFrom": [0, 1, 0]},
                    {"content": "Keep loop state local", "mergedFrom": [2]}
                ],
                "droppedIndices": []
            })),
        };
        let compressor = InsightCompressor::new(store, Arc::new(NoopEventBus))
            .with_service(Arc::new(service))
            .with_options(GenerationOptions {
                temperature: 0.0,
                ..GenerationOptions::default()
            });

        let result = compressor.compress(&insights).await;
        assert!(result.used_service);
        let merged = &result.atomic_insights[0];
        assert_eq!(merged.merged_from, vec![0, 1]);
        assert_eq!(merged.frequency, 5);
        assert_eq!(merged.skill_ids, vec!["arrays".to_string(), "edge-cases".to_string()]);
    }

    #[tokio::test]
    async fn test_service_errors_fall_back_to_local() {
        let (store, insights) = seeded_store().await;
        for reply in [
            Err(GenerationError::Timeout),
            Ok(json!({"error": "quota"})),
            Ok(json!({"atomicInsights": [{"content": "x", "mergedFrom": [7]}]})),
            Ok(json!({"summary": "wrong shape"})),
        ] {
            let compressor = InsightCompressor::new(store.clone(), Arc::new(NoopEventBus))
                .with_service(Arc::new(FixedService { reply }));
            let result = compressor.compress(&insights).await;
            assert!(!result.used_service);
            assert_eq!(result.atomic_insights.len(), 2);
        }
    }

    #[test]
    fn test_prompt_enumerates_insights() {
        let insights = vec![Insight::new("off by one", vec!["loops".into()], "test").with_frequency(4)];
        let prompt = build_compression_prompt(&insights);
        assert!(prompt.contains("[0] off by one (skills: loops; frequency: 4)"));
        assert!(prompt.contains("droppedIndices"));
    }
}
