// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Word-set Jaccard similarity and the forward grouping pass built on it.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashSet;

use crate::domain::insight::Insight;

static PUNCTUATION: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^\w\s]").unwrap());

/// Lowercased words longer than two characters, punctuation removed.
fn tokenize(text: &str) -> HashSet<String> {
    let lowered = text.to_lowercase();
    PUNCTUATION
        .replace_all(&lowered, "")
        .split_whitespace()
        .filter(|w| w.chars().count() > 2)
        .map(str::to_string)
        .collect()
}

/// Jaccard similarity of the two word sets, in `[0, 1]`.
pub fn calculate_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let words_a = tokenize(a);
    let words_b = tokenize(b);
    let union = words_a.union(&words_b).count();
    if union == 0 {
        return 0.0;
    }
    let intersection = words_a.intersection(&words_b).count();
    intersection as f64 / union as f64
}

/// Single forward pass: each ungrouped insight claims every later ungrouped
/// insight at or above `threshold`. Returns index groups in store order,
/// singletons included.
pub(crate) fn group_by_similarity(insights: &[Insight], threshold: f64) -> Vec<Vec<usize>> {
    let mut grouped = vec![false; insights.len()];
    let mut groups = Vec::new();

    for i in 0..insights.len() {
        if grouped[i] {
            continue;
        }
        grouped[i] = true;
        let mut group = vec![i];
        for j in (i + 1)..insights.len() {
            if grouped[j] {
                continue;
            }
            if calculate_similarity(&insights[i].content, &insights[j].content) >= threshold {
                grouped[j] = true;
                group.push(j);
            }
        }
        groups.push(group);
    }
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_and_empty() {
        assert_eq!(calculate_similarity("", ""), 1.0);
        assert_eq!(calculate_similarity("same text", "same text"), 1.0);
        assert_eq!(calculate_similarity("something", ""), 0.0);
        assert_eq!(calculate_similarity("", "something"), 0.0);
    }

    #[test]
    fn test_ignores_case_punctuation_and_short_words() {
        assert_eq!(
            calculate_similarity("Forgot the EMPTY array check!", "forgot the empty array check"),
            1.0
        );
        // only short words on both sides
        assert_eq!(calculate_similarity("a b", "to be"), 0.0);
    }

    #[test]
    fn test_partial_overlap() {
        // {forgot, empty, array, check} vs {forgot, empty, list, check}
        let sim = calculate_similarity("forgot empty array check", "forgot empty list check");
        assert!((sim - 3.0 / 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_grouping_is_forward_only() {
        let insights: Vec<Insight> = [
            "missing null check on input",
            "unrelated recursion depth issue",
            "missing null check on user input",
        ]
        .iter()
        .map(|c| Insight::new(*c, vec![], "test"))
        .collect();

        let groups = group_by_similarity(&insights, 0.6);
        assert_eq!(groups, vec![vec![0, 2], vec![1]]);
    }
}
