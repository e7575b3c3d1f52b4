// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Drill aggregate, the validation gate for generated drafts, and the
//! signature used to keep every admitted exercise unique.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct DrillId(pub Uuid);

impl DrillId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for DrillId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DrillId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum DrillType {
    FillInBlank,
    SpotBug,
    Critique,
    MuscleMemory,
}

impl DrillType {
    pub const ALL: [DrillType; 4] = [
        DrillType::FillInBlank,
        DrillType::SpotBug,
        DrillType::Critique,
        DrillType::MuscleMemory,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DrillType::FillInBlank => "fill-in-blank",
            DrillType::SpotBug => "spot-bug",
            DrillType::Critique => "critique",
            DrillType::MuscleMemory => "muscle-memory",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "fill-in-blank" => Some(DrillType::FillInBlank),
            "spot-bug" => Some(DrillType::SpotBug),
            "critique" => Some(DrillType::Critique),
            "muscle-memory" => Some(DrillType::MuscleMemory),
            _ => None,
        }
    }

    /// Types whose learner response is checked against a stored answer.
    pub fn requires_answer(&self) -> bool {
        matches!(self, DrillType::FillInBlank | DrillType::SpotBug)
    }
}

impl std::fmt::Display for DrillType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DrillType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s).ok_or_else(|| format!("unknown drill type: {}", s))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    /// Unknown or missing values fall back to medium.
    pub fn parse_lenient(value: Option<&str>) -> Self {
        match value.map(|v| v.trim().to_ascii_lowercase()).as_deref() {
            Some("easy") => Difficulty::Easy,
            Some("hard") => Difficulty::Hard,
            _ => Difficulty::Medium,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DrillStatus {
    #[default]
    Pending,
    Completed,
    Skipped,
}

impl std::str::FromStr for DrillStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim() {
            "pending" => Ok(DrillStatus::Pending),
            "completed" => Ok(DrillStatus::Completed),
            "skipped" => Ok(DrillStatus::Skipped),
            other => Err(format!("unknown drill status: {}", other)),
        }
    }
}

/// Where an admitted drill's content came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrillOrigin {
    #[default]
    Generated,
    Template,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drill {
    pub id: DrillId,
    #[serde(rename = "type")]
    pub drill_type: DrillType,
    pub skill_id: String,
    pub content: String,
    pub answer: Option<String>,
    pub explanation: String,
    pub difficulty: Difficulty,
    pub status: DrillStatus,
    pub correct: Option<bool>,
    pub attempts: u32,
    pub created_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub test_cases: Option<serde_json::Value>,
    #[serde(default)]
    pub origin: DrillOrigin,
}

impl Drill {
    pub fn new(
        drill_type: DrillType,
        skill_id: impl Into<String>,
        content: impl Into<String>,
        answer: Option<String>,
    ) -> Self {
        Self {
            id: DrillId::new(),
            drill_type,
            skill_id: skill_id.into(),
            content: content.into(),
            answer: if drill_type.requires_answer() { answer } else { None },
            explanation: String::new(),
            difficulty: Difficulty::default(),
            status: DrillStatus::Pending,
            correct: None,
            attempts: 0,
            created_at: Utc::now(),
            completed_at: None,
            test_cases: None,
            origin: DrillOrigin::Generated,
        }
    }

    pub fn with_explanation(mut self, explanation: impl Into<String>) -> Self {
        self.explanation = explanation.into();
        self
    }

    pub fn with_difficulty(mut self, difficulty: Difficulty) -> Self {
        self.difficulty = difficulty;
        self
    }

    pub fn with_origin(mut self, origin: DrillOrigin) -> Self {
        self.origin = origin;
        self
    }

    pub fn signature(&self) -> String {
        build_drill_signature(self.drill_type, &self.skill_id, &self.content, self.answer.as_deref())
    }

    pub fn is_pending(&self) -> bool {
        self.status == DrillStatus::Pending
    }

    /// Close out a practice attempt. `correct` is only ever set here.
    pub fn record_result(&mut self, correct: bool) {
        self.attempts = self.attempts.saturating_add(1);
        self.status = DrillStatus::Completed;
        self.correct = Some(correct);
        self.completed_at = Some(Utc::now());
    }

    pub fn skip(&mut self) {
        self.status = DrillStatus::Skipped;
    }
}

/// Unvalidated drill candidate as returned by the generation service.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DrillDraft {
    #[serde(rename = "type", default)]
    pub drill_type: Option<String>,
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub answer: Option<String>,
    #[serde(default)]
    pub explanation: Option<String>,
    #[serde(default)]
    pub difficulty: Option<String>,
    #[serde(default)]
    pub test_cases: Option<serde_json::Value>,
}

impl DrillDraft {
    /// Convert a draft that passed [`validate_drill`] into a pending drill
    /// for `skill_id`. Returns `None` for drafts that fail validation.
    pub fn into_drill(self, skill_id: &str) -> Option<Drill> {
        if !validate_drill(&self) {
            return None;
        }
        let drill_type = DrillType::parse(self.drill_type.as_deref()?)?;
        let mut drill = Drill::new(
            drill_type,
            skill_id,
            self.content.unwrap_or_default().trim().to_string(),
            self.answer.map(|a| a.trim().to_string()),
        )
        .with_explanation(self.explanation.unwrap_or_default())
        .with_difficulty(Difficulty::parse_lenient(self.difficulty.as_deref()));
        drill.test_cases = self.test_cases;
        Some(drill)
    }
}

/// The single gate every generated or templated drill passes before admission.
pub fn validate_drill(draft: &DrillDraft) -> bool {
    let Some(drill_type) = draft.drill_type.as_deref().and_then(DrillType::parse) else {
        return false;
    };
    if draft.content.as_deref().map(str::trim).unwrap_or_default().is_empty() {
        return false;
    }
    if drill_type.requires_answer() {
        return draft.answer.as_deref().is_some_and(|a| !a.trim().is_empty());
    }
    true
}

fn normalize_part(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ").to_lowercase()
}

/// Normalized (type, skill, content, answer) key. Whitespace runs and letter
/// case do not distinguish two drills.
pub fn build_drill_signature(
    drill_type: DrillType,
    skill_id: &str,
    content: &str,
    answer: Option<&str>,
) -> String {
    [
        normalize_part(drill_type.as_str()),
        normalize_part(skill_id),
        normalize_part(content),
        normalize_part(answer.unwrap_or_default()),
    ]
    .join("::")
}
