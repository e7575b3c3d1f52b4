// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! In-memory repository implementations used by tests and ephemeral runs

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::domain::drill::{Drill, DrillId, DrillStatus, DrillType};
use crate::domain::insight::{Insight, InsightId};
use crate::domain::repository::{DrillRepository, InsightRepository, RepositoryError};

#[derive(Clone, Default)]
pub struct InMemoryInsightRepository {
    insights: Arc<RwLock<HashMap<InsightId, Insight>>>,
}

impl InMemoryInsightRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

pub(crate) fn sort_insights(mut insights: Vec<Insight>) -> Vec<Insight> {
    insights.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    insights
}

pub(crate) fn sort_drills(mut drills: Vec<Drill>) -> Vec<Drill> {
    drills.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
    drills
}

#[async_trait]
impl InsightRepository for InMemoryInsightRepository {
    async fn add(&self, insight: &Insight) -> Result<(), RepositoryError> {
        let mut insights = self.insights.write().await;
        if insights.contains_key(&insight.id) {
            return Err(RepositoryError::Conflict(insight.id.to_string()));
        }
        insights.insert(insight.id, insight.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: InsightId) -> Result<Option<Insight>, RepositoryError> {
        let insights = self.insights.read().await;
        Ok(insights.get(&id).cloned())
    }

    async fn update(&self, insight: &Insight) -> Result<(), RepositoryError> {
        let mut insights = self.insights.write().await;
        match insights.get_mut(&insight.id) {
            Some(existing) => {
                *existing = insight.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(insight.id.to_string())),
        }
    }

    async fn delete(&self, id: InsightId) -> Result<bool, RepositoryError> {
        let mut insights = self.insights.write().await;
        Ok(insights.remove(&id).is_some())
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        self.insights.write().await.clear();
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Insight>, RepositoryError> {
        let insights = self.insights.read().await;
        Ok(sort_insights(insights.values().cloned().collect()))
    }

    async fn find_by_skill_id(&self, skill_id: &str) -> Result<Vec<Insight>, RepositoryError> {
        let insights = self.insights.read().await;
        Ok(sort_insights(
            insights.values().filter(|i| i.has_skill(skill_id)).cloned().collect(),
        ))
    }
}

#[derive(Clone, Default)]
pub struct InMemoryDrillRepository {
    drills: Arc<RwLock<HashMap<DrillId, Drill>>>,
    last_run: Arc<RwLock<Option<DateTime<Utc>>>>,
}

impl InMemoryDrillRepository {
    pub fn new() -> Self {
        Self::default()
    }

    async fn filtered(&self, predicate: impl Fn(&Drill) -> bool) -> Vec<Drill> {
        let drills = self.drills.read().await;
        sort_drills(drills.values().filter(|d| predicate(d)).cloned().collect())
    }
}

#[async_trait]
impl DrillRepository for InMemoryDrillRepository {
    async fn add(&self, drill: &Drill) -> Result<(), RepositoryError> {
        let mut drills = self.drills.write().await;
        if drills.contains_key(&drill.id) {
            return Err(RepositoryError::Conflict(drill.id.to_string()));
        }
        drills.insert(drill.id, drill.clone());
        Ok(())
    }

    async fn get_by_id(&self, id: DrillId) -> Result<Option<Drill>, RepositoryError> {
        let drills = self.drills.read().await;
        Ok(drills.get(&id).cloned())
    }

    async fn update(&self, drill: &Drill) -> Result<(), RepositoryError> {
        let mut drills = self.drills.write().await;
        match drills.get_mut(&drill.id) {
            Some(existing) => {
                *existing = drill.clone();
                Ok(())
            }
            None => Err(RepositoryError::NotFound(drill.id.to_string())),
        }
    }

    async fn delete(&self, id: DrillId) -> Result<bool, RepositoryError> {
        let mut drills = self.drills.write().await;
        Ok(drills.remove(&id).is_some())
    }

    async fn clear(&self) -> Result<(), RepositoryError> {
        self.drills.write().await.clear();
        Ok(())
    }

    async fn get_all(&self) -> Result<Vec<Drill>, RepositoryError> {
        Ok(self.filtered(|_| true).await)
    }

    async fn find_by_skill_id(&self, skill_id: &str) -> Result<Vec<Drill>, RepositoryError> {
        Ok(self.filtered(|d| d.skill_id == skill_id).await)
    }

    async fn find_by_type(&self, drill_type: DrillType) -> Result<Vec<Drill>, RepositoryError> {
        Ok(self.filtered(|d| d.drill_type == drill_type).await)
    }

    async fn find_by_status(&self, status: DrillStatus) -> Result<Vec<Drill>, RepositoryError> {
        Ok(self.filtered(|d| d.status == status).await)
    }

    async fn last_run_at(&self) -> Result<Option<DateTime<Utc>>, RepositoryError> {
        Ok(*self.last_run.read().await)
    }

    async fn set_last_run_at(&self, at: DateTime<Utc>) -> Result<(), RepositoryError> {
        *self.last_run.write().await = Some(at);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[tokio::test]
    async fn test_insight_crud() {
        let repo = InMemoryInsightRepository::new();
        let mut insight = Insight::new("forgot null check", vec!["nulls".into()], "test");
        repo.add(&insight).await.unwrap();
        assert!(matches!(repo.add(&insight).await, Err(RepositoryError::Conflict(_))));

        insight.frequency = 4;
        repo.update(&insight).await.unwrap();
        assert_eq!(repo.get_by_id(insight.id).await.unwrap().unwrap().frequency, 4);

        assert_eq!(repo.find_by_skill_id("nulls").await.unwrap().len(), 1);
        assert!(repo.find_by_skill_id("other").await.unwrap().is_empty());

        assert!(repo.delete(insight.id).await.unwrap());
        assert!(!repo.delete(insight.id).await.unwrap());
        assert!(matches!(repo.update(&insight).await, Err(RepositoryError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_get_all_is_ordered_by_creation() {
        let repo = InMemoryInsightRepository::new();
        let mut older = Insight::new("older", vec![], "test");
        older.created_at = older.created_at - Duration::days(2);
        let newer = Insight::new("newer", vec![], "test");
        repo.add(&newer).await.unwrap();
        repo.add(&older).await.unwrap();

        let all = repo.get_all().await.unwrap();
        assert_eq!(all[0].content, "older");
        assert_eq!(all[1].content, "newer");
    }

    #[tokio::test]
    async fn test_drill_lookups() {
        let repo = InMemoryDrillRepository::new();
        let mut done = Drill::new(DrillType::Critique, "loops", "Critique this", None);
        done.record_result(false);
        let pending = Drill::new(DrillType::SpotBug, "loops", "Find it", Some("i <= n".into()));
        repo.add(&done).await.unwrap();
        repo.add(&pending).await.unwrap();

        assert_eq!(repo.find_by_skill_id("loops").await.unwrap().len(), 2);
        assert_eq!(repo.find_by_type(DrillType::SpotBug).await.unwrap().len(), 1);
        assert_eq!(repo.find_by_status(DrillStatus::Completed).await.unwrap()[0].id, done.id);

        repo.clear().await.unwrap();
        assert!(repo.get_all().await.unwrap().is_empty());
    }
}
