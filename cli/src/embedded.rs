// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-process service wiring
//!
//! Builds the stores, maintenance services and drill generator from a
//! [`PracticeConfig`] and runs them directly inside the CLI process.

use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{debug, info};

use skillforge_cortex::{
    application::{
        DrillGenerator, DrillStore, GeneratorSettings, InsightCompressor, InsightDeduplicator,
        InsightStore, RetentionPolicy,
    },
    domain::{
        config::{PracticeConfig, StorageBackend},
        DrillRepository, EventBus, GenerationOptions, GenerationService, InsightRepository,
    },
    infrastructure::{
        open_database, InMemoryDrillRepository, InMemoryInsightRepository,
        OllamaGenerationService, SledDrillRepository, SledInsightRepository, TracingEventBus,
        INSIGHTS_ARCHIVE_TREE,
    },
};

pub struct EmbeddedServices {
    config: PracticeConfig,
    insights: InsightStore,
    drills: DrillStore,
    archive: Option<Arc<dyn InsightRepository>>,
    service: Option<Arc<dyn GenerationService>>,
    event_bus: Arc<dyn EventBus>,
    db: Option<sled::Db>,
}

impl EmbeddedServices {
    /// Load and validate configuration, then build services from it.
    pub async fn new(config_path: Option<PathBuf>) -> Result<Self> {
        let config =
            PracticeConfig::load_or_default(config_path).context("Failed to load configuration")?;

        config
            .validate()
            .context("Configuration validation failed")?;

        Self::from_config(config)
    }

    pub fn from_config(config: PracticeConfig) -> Result<Self> {
        let storage = &config.spec.storage;
        let retain_archive = config.spec.retention.retain_archive;

        let (insight_repo, drill_repo, archive, db): (
            Arc<dyn InsightRepository>,
            Arc<dyn DrillRepository>,
            Option<Arc<dyn InsightRepository>>,
            Option<sled::Db>,
        ) = match storage.backend {
            StorageBackend::InMemory => {
                debug!("Using in-memory practice storage");
                let archive: Option<Arc<dyn InsightRepository>> = if retain_archive {
                    Some(Arc::new(InMemoryInsightRepository::new()))
                } else {
                    None
                };
                (
                    Arc::new(InMemoryInsightRepository::new()),
                    Arc::new(InMemoryDrillRepository::new()),
                    archive,
                    None,
                )
            }
            StorageBackend::Sled => {
                let path = storage.resolved_path();
                info!("Opening practice database at {:?}", path);
                let db = open_database(&path)
                    .with_context(|| format!("Failed to open database at {:?}", path))?;
                let archive: Option<Arc<dyn InsightRepository>> = if retain_archive {
                    Some(Arc::new(SledInsightRepository::open_tree(&db, INSIGHTS_ARCHIVE_TREE)?))
                } else {
                    None
                };
                (
                    Arc::new(SledInsightRepository::open(&db)?),
                    Arc::new(SledDrillRepository::open(&db)?),
                    archive,
                    Some(db),
                )
            }
        };

        let service: Option<Arc<dyn GenerationService>> = if config.spec.generation.enabled {
            let ollama = OllamaGenerationService::from_config(&config.spec.generation)
                .context("Failed to initialize generation service")?;
            info!(model = ollama.model(), "Generation service enabled");
            Some(Arc::new(ollama))
        } else {
            debug!("Generation service disabled; drills come from templates");
            None
        };

        Ok(Self {
            insights: InsightStore::new(insight_repo),
            drills: DrillStore::new(drill_repo),
            archive,
            service,
            event_bus: Arc::new(TracingEventBus::with_default_capacity()),
            db,
            config,
        })
    }

    pub fn config(&self) -> &PracticeConfig {
        &self.config
    }

    pub fn insights(&self) -> &InsightStore {
        &self.insights
    }

    pub fn drills(&self) -> &DrillStore {
        &self.drills
    }

    pub fn retention_policy(&self) -> RetentionPolicy {
        let policy = RetentionPolicy::new(self.insights.clone(), self.event_bus.clone());
        match &self.archive {
            Some(archive) => policy.with_archive(archive.clone()),
            None => policy,
        }
    }

    pub fn deduplicator(&self) -> InsightDeduplicator {
        InsightDeduplicator::new(self.insights.clone(), self.event_bus.clone())
    }

    pub fn compressor(&self) -> InsightCompressor {
        let generation = &self.config.spec.generation;
        // Compression stays cooler than drill writing.
        let options = GenerationOptions {
            temperature: generation.temperature.min(0.2),
            max_retries: generation.max_retries_per_attempt,
            max_output_tokens: generation.max_output_tokens,
            ..GenerationOptions::default()
        };
        let compressor = InsightCompressor::new(self.insights.clone(), self.event_bus.clone())
            .with_threshold(self.config.spec.compression_threshold)
            .with_options(options);
        match &self.service {
            Some(service) => compressor.with_service(service.clone()),
            None => compressor,
        }
    }

    pub fn drill_generator(&self) -> DrillGenerator {
        let settings =
            GeneratorSettings::from_config(&self.config.spec.drills, &self.config.spec.generation);
        let generator = DrillGenerator::new(self.drills.clone(), self.event_bus.clone(), settings)
            .with_insight_store(self.insights.clone());
        match &self.service {
            Some(service) => generator.with_service(service.clone()),
            None => generator,
        }
    }

    /// Flush pending sled writes. No-op for in-memory storage.
    pub async fn shutdown(self) -> Result<()> {
        if let Some(db) = self.db {
            db.flush_async()
                .await
                .context("Failed to flush practice database")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use skillforge_cortex::application::{GenerateError, RunOptions};
    use skillforge_cortex::domain::{Insight, WeakSkill};

    fn sled_config(dir: &std::path::Path, retain_archive: bool) -> PracticeConfig {
        let mut config = PracticeConfig::default();
        config.spec.storage.path = Some(dir.join("data"));
        config.spec.retention.retain_archive = retain_archive;
        config
    }

    #[tokio::test]
    async fn test_sled_services_persist_between_instances() {
        let dir = tempfile::tempdir().unwrap();

        let services = EmbeddedServices::from_config(sled_config(dir.path(), false)).unwrap();
        services
            .insights()
            .add(&Insight::new("forgot the base case", vec!["recursion".into()], "test"))
            .await
            .unwrap();
        services.shutdown().await.unwrap();

        let services = EmbeddedServices::from_config(sled_config(dir.path(), false)).unwrap();
        assert_eq!(services.insights().get_all().await.unwrap().len(), 1);
        assert!(services.archive.is_none());
        services.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_cooldown_spans_instances_on_same_store() {
        let dir = tempfile::tempdir().unwrap();
        let skills = || vec![WeakSkill::new("recursion", "base cases")];

        let services = EmbeddedServices::from_config(sled_config(dir.path(), false)).unwrap();
        let run = services
            .drill_generator()
            .generate_from_weak_skills(skills(), &RunOptions::default())
            .await
            .unwrap();
        assert!(run.total() > 0);
        services.shutdown().await.unwrap();

        let services = EmbeddedServices::from_config(sled_config(dir.path(), false)).unwrap();
        let second = services
            .drill_generator()
            .generate_from_weak_skills(skills(), &RunOptions::default())
            .await;
        assert!(matches!(second, Err(GenerateError::Cooldown { .. })));
        services.shutdown().await.unwrap();
    }

    #[tokio::test]
    async fn test_in_memory_with_archive() {
        let mut config = PracticeConfig::default();
        config.spec.storage.backend = StorageBackend::InMemory;
        config.spec.retention.retain_archive = true;

        let services = EmbeddedServices::from_config(config).unwrap();
        assert!(services.archive.is_some());
        assert!(services.service.is_none());
        assert!(services.db.is_none());
        services.shutdown().await.unwrap();
    }
}
