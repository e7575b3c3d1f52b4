// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Sled Store
//!
//! Embedded persistence for insights and drills. Each aggregate lives in its
//! own `sled::Tree`, keyed by the UUID bytes of its id, with JSON values.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure Layer
//! - **Purpose:** Durable implementations of the domain repository traits

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;

use crate::domain::drill::{Drill, DrillId, DrillStatus, DrillType};
use crate::domain::insight::{Insight, InsightId};
use crate::domain::repository::{DrillRepository, InsightRepository, RepositoryError};
use crate::infrastructure::memory_store::{sort_drills, sort_insights};

pub const INSIGHTS_TREE: &str = "insights";
pub const INSIGHTS_ARCHIVE_TREE: &str = "insights_archive";
pub const DRILLS_TREE: &str = "drills";
pub const META_TREE: &str = "meta";

const LAST_RUN_KEY: &[u8] = b"drills.last_run";

/// Open (or create) the database directory.
pub fn open_database(path: impl AsRef<Path>) -> Result<sled::Db, RepositoryError> {
    Ok(sled::open(path)?)
}

/// JSON-encoded values in one sled tree.
#[derive(Clone)]
struct JsonTree {
    tree: sled::Tree,
}

impl JsonTree {
    fn open(db: &sled::Db, name: &str) -> Result<Self, RepositoryError> {
        Ok(Self { tree: db.open_tree(name)? })
    }

    fn insert_new<T: Serialize>(&self, key: &[u8], value: &T, label: String) -> Result<(), RepositoryError> {
        let bytes = serde_json::to_vec(value)?;
        self.tree
            .compare_and_swap(key, None::<&[u8]>, Some(bytes))?
            .map_err(|_| RepositoryError::Conflict(label))
    }

    fn put<T: Serialize>(&self, key: &[u8], value: &T) -> Result<(), RepositoryError> {
        self.tree.insert(key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn replace<T: Serialize>(&self, key: &[u8], value: &T, label: String) -> Result<(), RepositoryError> {
        if !self.tree.contains_key(key)? {
            return Err(RepositoryError::NotFound(label));
        }
        self.tree.insert(key, serde_json::to_vec(value)?)?;
        Ok(())
    }

    fn get<T: DeserializeOwned>(&self, key: &[u8]) -> Result<Option<T>, RepositoryError> {
        match self.tree.get(key)? {
            Some(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            None => Ok(None),
        }
    }

    fn remove(&self, key: &[u8]) -> Result<bool, RepositoryError> {
        Ok(self.tree.remove(key)?.is_some())
    }

    fn clear(&self) -> Result<(), RepositoryError> {
        self.tree.clear()?;
        Ok(())
    }

    fn values<T: DeserializeOwned>(&self) -> Result<Vec<T>, RepositoryError> {
        let mut out = Vec::new();
        for entry in self.tree.iter() {
            let (_, bytes) = entry?;
            out.push(serde_json::from_slice(&bytes)?);
        }
        Ok(out)
    }

    async fn flush(&self) -> Result<(), RepositoryError> {
        self.tree.flush_async().await?;
        Ok(())
    }
}

#[derive(Clone)]
pub struct SledInsightRepository {
    tree: JsonTree,
}

impl SledInsightRepository {
    pub fn open(db: &sled::Db) -> Result<Self, RepositoryError> {
        Self::open_tree(db, INSIGHTS_TREE)
    }

    /// Open a named tree, e.g. [`INSIGHTS_ARCHIVE_TREE`] for retained archives.
    pub fn open_tree(db: &sled::Db, name: &str) -> Result<Self, RepositoryError> {
        Ok(Self { tree: JsonTree::open(db, name)? })
    }

    pub async fn flush(&self) -> Result<(), RepositoryError> {
        self.tree.flush().await
    }
}

#[async_trait]
impl InsightRepository for SledInsightRepository {
    async fn add(&self, insight: &Insight) -> Result<(), RepositoryError> {
        self.tree.insert_new(insight.id.0.as_bytes(), insight, insight.id.to_string())
    }

    async fn get_by_id(&self, id: InsightId) -> Result<Option<Insight>, RepositoryError> {
        self.tree.get(id.0.as_bytes())
    }

    async fn update(&self, insight: &Insight) -> Result<(), RepositoryError> {
        self.tree.replace(insight.id.0.as_bytes(), insight, insight.id.to_string())
    }

    async fn delete(&self, id: InsightId) -> Result<bool, RepositoryError> {
        self.tree.remove(id.0.as_bytes())
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        self.tree.clear()
    }

    async fn get_all(&self) -> Result<Vec<Insight>, RepositoryError> {
        Ok(sort_insights(self.tree.values()?))
    }

    async fn find_by_skill_id(&self, skill_id: &str) -> Result<Vec<Insight>, RepositoryError> {
        let all: Vec<Insight> = self.tree.values()?;
        Ok(sort_insights(all.into_iter().filter(|i| i.has_skill(skill_id)).collect()))
    }
}

#[derive(Clone)]
pub struct SledDrillRepository {
    tree: JsonTree,
    meta: JsonTree,
}

impl SledDrillRepository {
    pub fn open(db: &sled::Db) -> Result<Self, RepositoryError> {
        Ok(Self {
            tree: JsonTree::open(db, DRILLS_TREE)?,
            meta: JsonTree::open(db, META_TREE)?,
        })
    }

    pub async fn flush(&self) -> Result<(), RepositoryError> {
        self.tree.flush().await?;
        self.meta.flush().await
    }

    fn filtered(&self, predicate: impl Fn(&Drill) -> bool) -> Result<Vec<Drill>, RepositoryError> {
        let all: Vec<Drill> = self.tree.values()?;
        Ok(sort_drills(all.into_iter().filter(|d| predicate(d)).collect()))
    }
}

#[async_trait]
impl DrillRepository for SledDrillRepository {
    async fn add(&self, drill: &Drill) -> Result<(), RepositoryError> {
        self.tree.insert_new(drill.id.0.as_bytes(), drill, drill.id.to_string())
    }

    async fn get_by_id(&self, id: DrillId) -> Result<Option<Drill>, RepositoryError> {
        self.tree.get(id.0.as_bytes())
    }

    async fn update(&self, drill: &Drill) -> Result<(), RepositoryError> {
        self.tree.replace(drill.id.0.as_bytes(), drill, drill.id.to_string())
    }

    async fn delete(&self, id: DrillId) -> Result<bool, RepositoryError> {
        self.tree.remove(id.0.as_bytes())
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        self.tree.clear()
    }

    async fn get_all(&self) -> Result<Vec<Drill>, RepositoryError> {
        self.filtered(|_| true)
    }

    async fn find_by_skill_id(&self, skill_id: &str) -> Result<Vec<Drill>, RepositoryError> {
        self.filtered(|d| d.skill_id == skill_id)
    }

    async fn find_by_type(&self, drill_type: DrillType) -> Result<Vec<Drill>, RepositoryError> {
        self.filtered(|d| d.drill_type == drill_type)
    }

    async fn find_by_status(&self, status: DrillStatus) -> Result<Vec<Drill>, RepositoryError> {
        self.filtered(|d| d.status == status)
    }

    async fn last_run_at(&self) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        self.meta.get(LAST_RUN_KEY)
    }

    async fn set_last_run_at(&self, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        self.meta.put(LAST_RUN_KEY, &at)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_insights_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let insight = Insight::new("forgot to close file", vec!["io".into()], "test");
        {
            let db = open_database(dir.path()).unwrap();
            let repo = SledInsightRepository::open(&db).unwrap();
            repo.add(&insight).await.unwrap();
            assert!(matches!(repo.add(&insight).await, Err(RepositoryError::Conflict(_))));
            repo.flush().await.unwrap();
        }

        let db = open_database(dir.path()).unwrap();
        let repo = SledInsightRepository::open(&db).unwrap();
        let loaded = repo.get_by_id(insight.id).await.unwrap().unwrap();
        assert_eq!(loaded, insight);
        assert_eq!(repo.find_by_skill_id("io").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_archive_tree_is_separate() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_database(dir.path()).unwrap();
        let live = SledInsightRepository::open(&db).unwrap();
        let archive = SledInsightRepository::open_tree(&db, INSIGHTS_ARCHIVE_TREE).unwrap();

        archive.add(&Insight::new("old", vec![], "test")).await.unwrap();
        assert!(live.get_all().await.unwrap().is_empty());
        assert_eq!(archive.get_all().await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_drill_update_and_status_lookup() {
        let dir = tempfile::tempdir().unwrap();
        let db = open_database(dir.path()).unwrap();
        let repo = SledDrillRepository::open(&db).unwrap();

        let mut drill = Drill::new(DrillType::FillInBlank, "hashing", "h(k) = k mod ___", Some("m".into()));
        assert!(matches!(repo.update(&drill).await, Err(RepositoryError::NotFound(_))));
        repo.add(&drill).await.unwrap();

        drill.skip();
        repo.update(&drill).await.unwrap();
        assert_eq!(repo.find_by_status(DrillStatus::Skipped).await.unwrap().len(), 1);
        assert!(repo.find_by_status(DrillStatus::Pending).await.unwrap().is_empty());

        assert!(repo.delete(drill.id).await.unwrap());
        assert!(repo.get_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_last_run_survives_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let started = Utc::now();
        {
            let db = open_database(dir.path()).unwrap();
            let repo = SledDrillRepository::open(&db).unwrap();
            assert!(repo.last_run_at().await.unwrap().is_none());
            repo.set_last_run_at(started).await.unwrap();
            repo.clear().await.unwrap();
            repo.flush().await.unwrap();
        }

        let db = open_database(dir.path()).unwrap();
        let repo = SledDrillRepository::open(&db).unwrap();
        assert_eq!(repo.last_run_at().await.unwrap(), Some(started));
    }
}
