// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Generation
//!
//! Domain interface for the external generation service used to draft
//! drills and compress insights.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Anti-corruption boundary between pipeline logic and the
//!   vendor API. Adapters live in `crate::infrastructure`.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::domain::drill::DrillDraft;

pub const JSON_MIME_TYPE: &str = "application/json";

/// Domain interface for generation providers.
///
/// Implementations return the decoded JSON body. A body of the form
/// `{"error": "..."}` must be reported as [`GenerationError::Service`].
#[async_trait]
pub trait GenerationService: Send + Sync {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Value, GenerationError>;
}

/// Options for a single generation request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Sampling temperature (0.0 = deterministic, 1.0 = creative)
    pub temperature: f32,

    /// Retries the caller is willing to spend on this request
    pub max_retries: u32,

    /// Maximum tokens to generate
    pub max_output_tokens: u32,

    /// Expected response encoding
    pub response_mime_type: String,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            temperature: 0.7,
            max_retries: 2,
            max_output_tokens: 2048,
            response_mime_type: JSON_MIME_TYPE.to_string(),
        }
    }
}

/// Errors that can occur while talking to the generation service
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum GenerationError {
    #[error("Generation service unavailable")]
    Unavailable,

    #[error("Network error: {0}")]
    Network(String),

    #[error("Rate limit exceeded")]
    RateLimit,

    #[error("Request timed out")]
    Timeout,

    #[error("Service error: {0}")]
    Service(String),

    #[error("Provider error: {0}")]
    Provider(String),

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// `{"drills": [...]}` response shape.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DrillBatchPayload {
    pub drills: Vec<Value>,
}

impl DrillBatchPayload {
    /// Decode a service response, treating `{"error": ...}` and any body
    /// without a `drills` array as errors rather than partial success.
    pub fn from_response(value: Value) -> Result<Self, GenerationError> {
        check_error_body(&value)?;
        serde_json::from_value(value).map_err(|e| GenerationError::MalformedResponse(e.to_string()))
    }

    /// Items that decode as drafts. Items with a foreign shape are dropped
    /// here and never reach validation.
    pub fn drafts(self) -> Vec<DrillDraft> {
        self.drills
            .into_iter()
            .filter_map(|item| serde_json::from_value::<DrillDraft>(item).ok())
            .collect()
    }
}

/// One compressed insight as proposed by the service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AtomicInsightPayload {
    pub content: String,
    #[serde(default)]
    pub skill_ids: Vec<String>,
    pub merged_from: Vec<usize>,
    #[serde(default)]
    pub frequency: Option<u32>,
}

/// `{"atomicInsights": [...], "droppedIndices": [...]}` response shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompressionPayload {
    pub atomic_insights: Vec<AtomicInsightPayload>,
    #[serde(default)]
    pub dropped_indices: Vec<usize>,
}

impl CompressionPayload {
    pub fn from_response(value: Value) -> Result<Self, GenerationError> {
        check_error_body(&value)?;
        serde_json::from_value(value).map_err(|e| GenerationError::MalformedResponse(e.to_string()))
    }
}

fn check_error_body(value: &Value) -> Result<(), GenerationError> {
    if !value.is_object() {
        return Err(GenerationError::MalformedResponse("expected a JSON object".to_string()));
    }
    if let Some(error) = value.get("error") {
        let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
        return Err(GenerationError::Service(message));
    }
    Ok(())
}

/// Pull a JSON document out of model output that may be wrapped in a
/// markdown code fence.
pub fn extract_json(text: &str) -> Option<String> {
    let start_marker = "```json";
    if let Some(start) = text.find(start_marker) {
        let content_start = start + start_marker.len();
        if let Some(end_offset) = text[content_start..].find("```") {
            let content_end = content_start + end_offset;
            return Some(text[content_start..content_end].trim().to_string());
        }
    }

    let generic_marker = "```";
    if let Some(start) = text.find(generic_marker) {
        let content_start = start + generic_marker.len();
        if let Some(end_offset) = text[content_start..].find("```") {
            let content_end = content_start + end_offset;
            return Some(text[content_start..content_end].trim().to_string());
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_error_body_is_error() {
        let err = DrillBatchPayload::from_response(json!({"error": "quota exhausted"})).unwrap_err();
        assert_eq!(err, GenerationError::Service("quota exhausted".to_string()));
    }

    #[test]
    fn test_missing_drills_is_malformed() {
        let err = DrillBatchPayload::from_response(json!({"items": []})).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
        let err = DrillBatchPayload::from_response(json!([1, 2])).unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[test]
    fn test_drafts_skip_foreign_items() {
        let payload = DrillBatchPayload::from_response(json!({
            "drills": [
                {"type": "critique", "content": "Review"},
                "not an object",
                {"type": "spot-bug", "content": "x", "answer": "y", "test_cases": [1]}
            ]
        }))
        .unwrap();
        let drafts = payload.drafts();
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[1].answer.as_deref(), Some("y"));
    }

    #[test]
    fn test_compression_payload() {
        let payload = CompressionPayload::from_response(json!({
            "atomicInsights": [{"content": "c", "skillIds": ["a"], "mergedFrom": [0, 1], "frequency": 3}],
            "droppedIndices": [2]
        }))
        .unwrap();
        assert_eq!(payload.atomic_insights[0].merged_from, vec![0, 1]);
        assert_eq!(payload.dropped_indices, vec![2]);
    }

    #[test]
    fn test_extract_json() {
        let text = "Here you go:\n```json\n{\"drills\": []}\n```";
        assert_eq!(extract_json(text).as_deref(), Some("{\"drills\": []}"));
        assert_eq!(extract_json("plain"), None);
    }
}
