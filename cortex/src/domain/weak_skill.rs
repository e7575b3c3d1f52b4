// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Weak-skill inputs for drill generation and the external skill-tracking
//! source they can be derived from.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::repository::RepositoryError;

/// A skill the learner struggles with, plus a free-text hint about why.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WeakSkill {
    pub skill_id: String,
    pub insight: String,
}

impl WeakSkill {
    pub fn new(skill_id: impl Into<String>, insight: impl Into<String>) -> Self {
        Self {
            skill_id: skill_id.into(),
            insight: insight.into(),
        }
    }

    /// Parse `skill_id[:hint]`.
    pub fn parse(spec: &str) -> Option<Self> {
        let (skill, hint) = match spec.split_once(':') {
            Some((skill, hint)) => (skill.trim(), hint.trim()),
            None => (spec.trim(), ""),
        };
        if skill.is_empty() {
            return None;
        }
        Some(Self::new(skill, hint))
    }
}

/// Collapse duplicate skill ids, keeping first-seen order and joining the
/// distinct non-empty observations for each skill.
pub fn merge_weak_skills(skills: Vec<WeakSkill>) -> Vec<WeakSkill> {
    let mut merged: Vec<(WeakSkill, Vec<String>)> = Vec::new();
    for skill in skills {
        let id = skill.skill_id.trim();
        if id.is_empty() {
            continue;
        }
        let observation = skill.insight.trim().to_string();
        match merged.iter_mut().find(|(existing, _)| existing.skill_id == id) {
            Some((_, observations)) => {
                if !observation.is_empty() && !observations.contains(&observation) {
                    observations.push(observation);
                }
            }
            None => {
                let observations = if observation.is_empty() { Vec::new() } else { vec![observation] };
                merged.push((WeakSkill::new(id, ""), observations));
            }
        }
    }
    merged
        .into_iter()
        .map(|(mut skill, observations)| {
            skill.insight = observations.join("; ");
            skill
        })
        .collect()
}

/// Per-skill (or per-pattern) mistake record from the skill tracker.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkillSignal {
    pub id: String,
    pub mistakes: u32,
    pub score: f64,
    #[serde(default)]
    pub hint: Option<String>,
}

/// External skill-tracking store consulted when no weak skills are supplied.
#[async_trait]
pub trait SkillSignalSource: Send + Sync {
    async fn skill_signals(&self) -> Result<Vec<SkillSignal>, RepositoryError>;
}

/// Lowest-scoring signals with at least one recorded mistake.
pub fn select_weak_signals(mut signals: Vec<SkillSignal>, limit: usize) -> Vec<WeakSkill> {
    signals.retain(|s| s.mistakes > 0 && !s.id.trim().is_empty());
    signals.sort_by(|a, b| {
        a.score
            .partial_cmp(&b.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then_with(|| b.mistakes.cmp(&a.mistakes))
    });
    signals
        .into_iter()
        .take(limit)
        .map(|signal| {
            let hint = signal
                .hint
                .filter(|h| !h.trim().is_empty())
                .unwrap_or_else(|| format!("{} recorded mistakes, score {:.2}", signal.mistakes, signal.score));
            WeakSkill::new(signal.id, hint)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_by_skill_id() {
        let merged = merge_weak_skills(vec![
            WeakSkill::new("recursion", "missing base case"),
            WeakSkill::new("arrays", "off by one"),
            WeakSkill::new("recursion", "stack overflow on large input"),
            WeakSkill::new("recursion", "missing base case"),
        ]);
        assert_eq!(merged.len(), 2);
        assert_eq!(merged[0].skill_id, "recursion");
        assert_eq!(merged[0].insight, "missing base case; stack overflow on large input");
        assert_eq!(merged[1].insight, "off by one");
    }

    #[test]
    fn test_parse_skill_spec() {
        assert_eq!(WeakSkill::parse("dp:memo key wrong"), Some(WeakSkill::new("dp", "memo key wrong")));
        assert_eq!(WeakSkill::parse("graphs"), Some(WeakSkill::new("graphs", "")));
        assert_eq!(WeakSkill::parse(" :x"), None);
    }

    #[test]
    fn test_select_weak_signals() {
        let signals = vec![
            SkillSignal { id: "a".into(), mistakes: 0, score: 0.1, hint: None },
            SkillSignal { id: "b".into(), mistakes: 2, score: 0.4, hint: None },
            SkillSignal { id: "c".into(), mistakes: 5, score: 0.2, hint: Some("null checks".into()) },
            SkillSignal { id: "d".into(), mistakes: 1, score: 0.9, hint: None },
        ];
        let weak = select_weak_signals(signals, 2);
        assert_eq!(weak.len(), 2);
        assert_eq!(weak[0], WeakSkill::new("c", "null checks"));
        assert_eq!(weak[1].skill_id, "b");
    }
}
