// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Repository Interfaces
//!
//! Persistence contracts for the two aggregates of the practice pipeline.
//! Interfaces live in the domain layer; implementations live in
//! `crate::infrastructure` (in-memory for tests and ephemeral runs, sled for
//! the CLI).
//!
//! | Trait | Aggregate | Implementations |
//! |-------|-----------|----------------|
//! | `InsightRepository` | `Insight` | `InMemoryInsightRepository`, `SledInsightRepository` |
//! | `DrillRepository` | `Drill` | `InMemoryDrillRepository`, `SledDrillRepository` |
//!
//! `get_all` returns entities ordered by `created_at`, then id, so that
//! de-duplication passes iterate deterministically.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::domain::drill::{Drill, DrillId, DrillStatus, DrillType};
use crate::domain::insight::{Insight, InsightId};

#[async_trait]
pub trait InsightRepository: Send + Sync {
    /// Insert a new insight. Fails with `Conflict` if the id already exists.
    async fn add(&self, insight: &Insight) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: InsightId) -> Result<Option<Insight>, RepositoryError>;

    /// Replace an existing insight. Fails with `NotFound` if absent.
    async fn update(&self, insight: &Insight) -> Result<(), RepositoryError>;

    /// Remove an insight. Returns whether it existed.
    async fn delete(&self, id: InsightId) -> Result<bool, RepositoryError>;

    async fn clear(&self) -> Result<(), RepositoryError>;

    async fn get_all(&self) -> Result<Vec<Insight>, RepositoryError>;

    async fn find_by_skill_id(&self, skill_id: &str) -> Result<Vec<Insight>, RepositoryError>;
}

#[async_trait]
pub trait DrillRepository: Send + Sync {
    /// Insert a new drill. Fails with `Conflict` if the id already exists.
    async fn add(&self, drill: &Drill) -> Result<(), RepositoryError>;

    async fn get_by_id(&self, id: DrillId) -> Result<Option<Drill>, RepositoryError>;

    /// Replace an existing drill. Fails with `NotFound` if absent.
    async fn update(&self, drill: &Drill) -> Result<(), RepositoryError>;

    /// Remove a drill. Returns whether it existed.
    async fn delete(&self, id: DrillId) -> Result<bool, RepositoryError>;

    async fn clear(&self) -> Result<(), RepositoryError>;

    async fn get_all(&self) -> Result<Vec<Drill>, RepositoryError>;

    async fn find_by_skill_id(&self, skill_id: &str) -> Result<Vec<Drill>, RepositoryError>;

    async fn find_by_type(&self, drill_type: DrillType) -> Result<Vec<Drill>, RepositoryError>;

    async fn find_by_status(&self, status: DrillStatus) -> Result<Vec<Drill>, RepositoryError>;

    /// Start time of the most recent generation run, shared by every
    /// process that opens the same store.
    async fn last_run_at(&self) -> Result<Option<DateTime<Utc>>, RepositoryError>;

    async fn set_last_run_at(&self, at: DateTime<Utc>) -> Result<(), RepositoryError>;
}

/// Repository errors
#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Entity already exists: {0}")]
    Conflict(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<sled::Error> for RepositoryError {
    fn from(err: sled::Error) -> Self {
        RepositoryError::Database(err.to_string())
    }
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}
