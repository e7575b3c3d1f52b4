// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Insight aggregate: an atomic observation about a learner mistake whose
//! relevance weight decays with time since it was last seen.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct InsightId(pub Uuid);

impl InsightId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for InsightId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for InsightId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Insight {
    pub id: InsightId,
    pub content: String,
    pub skill_ids: Vec<String>,
    pub frequency: u32,
    pub weight: f64,
    pub source: String,
    pub created_at: DateTime<Utc>,
    pub last_seen_at: DateTime<Utc>,
    /// Point in time up to which decay has already been applied.
    #[serde(default)]
    pub decayed_through: Option<DateTime<Utc>>,
}

impl Insight {
    pub fn new(content: impl Into<String>, skill_ids: Vec<String>, source: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: InsightId::new(),
            content: content.into(),
            skill_ids: dedup_skills(skill_ids),
            frequency: 1,
            weight: 1.0,
            source: source.into(),
            created_at: now,
            last_seen_at: now,
            decayed_through: None,
        }
    }

    pub fn with_frequency(mut self, frequency: u32) -> Self {
        self.frequency = frequency.max(1);
        self
    }

    /// Record another occurrence of the same observation.
    pub fn touch(&mut self) {
        self.frequency = self.frequency.saturating_add(1);
        self.last_seen_at = Utc::now();
    }

    /// Whole days that have not yet been accounted for by decay.
    pub fn undecayed_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.decay_anchor()).num_days()
    }

    fn decay_anchor(&self) -> DateTime<Utc> {
        match self.decayed_through {
            Some(decayed) if decayed > self.last_seen_at => decayed,
            _ => self.last_seen_at,
        }
    }

    /// Apply exponential decay for every whole day elapsed since the last
    /// observation (or the last decay). Returns false when nothing changed.
    pub fn apply_time_decay(&mut self, decay_factor: f64, now: DateTime<Utc>) -> bool {
        let days = self.undecayed_days(now);
        if days <= 0 {
            return false;
        }
        self.weight = (self.weight * decay_factor.powi(days as i32)).max(0.0);
        self.decayed_through = Some(self.decay_anchor() + chrono::Duration::days(days));
        true
    }

    pub fn has_skill(&self, skill_id: &str) -> bool {
        self.skill_ids.iter().any(|s| s == skill_id)
    }

    pub fn age_days(&self, now: DateTime<Utc>) -> i64 {
        (now - self.last_seen_at).num_days()
    }
}

/// Order-preserving skill set union.
pub fn dedup_skills(skills: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(skills.len());
    for skill in skills {
        if !skill.is_empty() && !out.contains(&skill) {
            out.push(skill);
        }
    }
    out
}

/// Aggregate view over the insight store.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InsightStats {
    pub count: usize,
    pub total_weight: f64,
    pub mean_frequency: f64,
    pub per_skill: BTreeMap<String, usize>,
}

impl InsightStats {
    pub fn from_insights(insights: &[Insight]) -> Self {
        let mut per_skill = BTreeMap::new();
        let mut total_weight = 0.0;
        let mut total_frequency: u64 = 0;
        for insight in insights {
            total_weight += insight.weight;
            total_frequency += u64::from(insight.frequency);
            for skill in &insight.skill_ids {
                *per_skill.entry(skill.clone()).or_insert(0) += 1;
            }
        }
        let count = insights.len();
        Self {
            count,
            total_weight,
            mean_frequency: if count == 0 { 0.0 } else { total_frequency as f64 / count as f64 },
            per_skill,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_new_insight_defaults() {
        let insight = Insight::new("off by one", vec!["loops".into(), "loops".into()], "analysis");
        assert_eq!(insight.frequency, 1);
        assert_eq!(insight.weight, 1.0);
        assert_eq!(insight.skill_ids, vec!["loops".to_string()]);
    }

    #[test]
    fn test_same_day_decay_is_noop() {
        let mut insight = Insight::new("x", vec![], "test");
        insight.last_seen_at = Utc::now() - Duration::hours(20);
        assert!(!insight.apply_time_decay(0.5, Utc::now()));
        assert_eq!(insight.weight, 1.0);
    }

    #[test]
    fn test_decay_counts_each_day_once() {
        let now = Utc::now();
        let mut insight = Insight::new("x", vec![], "test");
        insight.last_seen_at = now - Duration::days(3) - Duration::hours(1);

        assert!(insight.apply_time_decay(0.5, now));
        assert!((insight.weight - 0.125).abs() < 1e-9);

        // Re-running on the same day must not decay again
        assert!(!insight.apply_time_decay(0.5, now));
        assert!((insight.weight - 0.125).abs() < 1e-9);

        // One more day decays by exactly one factor
        assert!(insight.apply_time_decay(0.5, now + Duration::days(1)));
        assert!((insight.weight - 0.0625).abs() < 1e-9);
    }

    #[test]
    fn test_stats() {
        let a = Insight::new("a", vec!["s1".into()], "t").with_frequency(3);
        let b = Insight::new("b", vec!["s1".into(), "s2".into()], "t");
        let stats = InsightStats::from_insights(&[a, b]);
        assert_eq!(stats.count, 2);
        assert_eq!(stats.total_weight, 2.0);
        assert_eq!(stats.mean_frequency, 2.0);
        assert_eq!(stats.per_skill.get("s1"), Some(&2));
        assert_eq!(stats.per_skill.get("s2"), Some(&1));
    }
}
