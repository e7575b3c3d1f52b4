// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Canned drills used when the generation service cannot fill the queue.
//!
//! Each template is parameterised by skill, hint and a variant number, so two
//! templates for the same (skill, type) never share a signature. Templates
//! go through the same draft validation as generated content.

use crate::domain::drill::{Drill, DrillDraft, DrillOrigin, DrillType};
use crate::domain::weak_skill::WeakSkill;

fn hint_clause(skill: &WeakSkill) -> String {
    if skill.insight.trim().is_empty() {
        String::new()
    } else {
        format!(" Recent trouble: {}.", skill.insight.trim().trim_end_matches('.'))
    }
}

/// Draft for one canned drill.
pub fn template_draft(drill_type: DrillType, skill: &WeakSkill, variant: usize) -> DrillDraft {
    let id = skill.skill_id.as_str();
    let hint = hint_clause(skill);
    let (content, answer, explanation) = match drill_type {
        DrillType::FillInBlank => (
            format!(
                "[{id} #{variant}] Fill in the blank: before trusting the result of code that uses {id}, \
                 always check the ___ cases.{hint}"
            ),
            Some("edge".to_string()),
            format!("Most {id} mistakes hide in empty, single-element and boundary inputs."),
        ),
        DrillType::SpotBug => (
            format!(
                "[{id} #{variant}] Spot the bug: a solution using {id} passes the happy-path test but \
                 fails on the smallest possible input. Name the most likely cause.{hint}"
            ),
            Some("missing boundary handling".to_string()),
            "Failures that only show on tiny inputs usually come from unchecked boundaries.".to_string(),
        ),
        DrillType::Critique => (
            format!(
                "[{id} #{variant}] Critique: take the last piece of code you wrote that relies on {id}. \
                 List two ways it could fail and how you would guard against each.{hint}"
            ),
            None,
            format!("Reviewing your own {id} code against failure modes builds the habit of checking it."),
        ),
        DrillType::MuscleMemory => (
            format!(
                "[{id} #{variant}] Muscle memory: from a blank editor, write the canonical {id} pattern \
                 three times without looking anything up.{hint}"
            ),
            None,
            format!("Repetition makes the correct {id} shape automatic."),
        ),
    };

    DrillDraft {
        drill_type: Some(drill_type.as_str().to_string()),
        content: Some(content),
        answer,
        explanation: Some(explanation),
        difficulty: Some("easy".to_string()),
        test_cases: None,
    }
}

/// Validated template drill, or `None` if the draft does not pass validation.
pub fn template_drill(drill_type: DrillType, skill: &WeakSkill, variant: usize) -> Option<Drill> {
    template_draft(drill_type, skill, variant)
        .into_drill(&skill.skill_id)
        .map(|drill| drill.with_origin(DrillOrigin::Template))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::drill::{validate_drill, Difficulty};

    #[test]
    fn test_every_type_validates() {
        let skill = WeakSkill::new("binary_search", "mid overflow");
        for drill_type in DrillType::ALL {
            assert!(validate_drill(&template_draft(drill_type, &skill, 1)));
            let drill = template_drill(drill_type, &skill, 1).unwrap();
            assert_eq!(drill.origin, DrillOrigin::Template);
            assert_eq!(drill.difficulty, Difficulty::Easy);
            assert_eq!(drill.answer.is_some(), drill_type.requires_answer());
        }
    }

    #[test]
    fn test_variants_have_distinct_signatures() {
        let skill = WeakSkill::new("hashing", "");
        let a = template_drill(DrillType::SpotBug, &skill, 1).unwrap();
        let b = template_drill(DrillType::SpotBug, &skill, 2).unwrap();
        assert_ne!(a.signature(), b.signature());
        assert!(!a.content.contains("Recent trouble"));
    }
}
