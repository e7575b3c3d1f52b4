// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Application services of the practice pipeline

pub mod compressor;
pub mod deduplicator;
pub mod drill_generator;
pub mod drill_store;
pub mod insight_store;
pub mod retention;
pub mod run_guard;
pub mod similarity;
pub mod templates;

pub use compressor::{CompressionReport, CompressionResult, InsightCompressor};
pub use deduplicator::{calculate_similarity, find_duplicates, merge_insights, DedupReport, InsightDeduplicator};
pub use drill_generator::{DrillGenerator, DrillRun, GenerateError, GeneratorSettings, RunOptions};
pub use drill_store::{AdmissionCaps, AdmissionLedger, DrillStore, SaveReport};
pub use insight_store::InsightStore;
pub use retention::{MaintenanceReport, RetentionOptions, RetentionPolicy, RetentionScheduler};
pub use run_guard::{Cooldown, RunGuard};
