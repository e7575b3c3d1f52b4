// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
// Ollama Generation Adapter
//
// Anti-Corruption Layer for local Ollama models. Requests JSON-mode output
// and hands the decoded document back to the pipeline.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::time::Duration;

use crate::domain::config::GenerationConfig;
use crate::domain::generation::{extract_json, GenerationError, GenerationOptions, GenerationService};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

pub struct OllamaGenerationService {
    client: reqwest::Client,
    endpoint: String,
    model: String,
}

#[derive(Serialize)]
struct OllamaRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    format: Option<&'static str>,
    options: OllamaOptions,
}

#[derive(Serialize)]
struct OllamaOptions {
    temperature: f32,
    num_predict: i32,
}

#[derive(Deserialize)]
struct OllamaResponse {
    response: String,
}

impl OllamaGenerationService {
    pub fn new(endpoint: impl Into<String>, model: impl Into<String>) -> Result<Self, GenerationError> {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| GenerationError::Provider(e.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
            model: model.into(),
        })
    }

    pub fn from_config(config: &GenerationConfig) -> Result<Self, GenerationError> {
        Self::new(config.endpoint.clone(), config.model.clone())
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.endpoint.trim_end_matches('/'), path)
    }

    pub async fn health_check(&self) -> Result<(), GenerationError> {
        let response = self
            .client
            .get(self.url("/api/tags"))
            .send()
            .await
            .map_err(map_transport_error)?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(GenerationError::Network(format!("HTTP {}", response.status())))
        }
    }
}

fn map_transport_error(e: reqwest::Error) -> GenerationError {
    if e.is_timeout() {
        GenerationError::Timeout
    } else if e.is_connect() {
        GenerationError::Unavailable
    } else {
        GenerationError::Network(e.to_string())
    }
}

/// Decode the model's text as JSON, tolerating a markdown fence around it.
fn decode_model_output(text: &str) -> Result<Value, GenerationError> {
    if let Ok(value) = serde_json::from_str::<Value>(text.trim()) {
        return Ok(value);
    }
    let fenced = extract_json(text)
        .ok_or_else(|| GenerationError::MalformedResponse("model output is not JSON".to_string()))?;
    serde_json::from_str(&fenced).map_err(|e| GenerationError::MalformedResponse(e.to_string()))
}

#[async_trait]
impl GenerationService for OllamaGenerationService {
    async fn generate(&self, prompt: &str, options: &GenerationOptions) -> Result<Value, GenerationError> {
        let format = options.response_mime_type.ends_with("json").then_some("json");
        let request = OllamaRequest {
            model: &self.model,
            prompt,
            stream: false,
            format,
            options: OllamaOptions {
                temperature: options.temperature,
                num_predict: options.max_output_tokens as i32,
            },
        };

        let response = self
            .client
            .post(self.url("/api/generate"))
            .json(&request)
            .send()
            .await
            .map_err(map_transport_error)?;

        let status = response.status();
        if !status.is_success() {
            let error_text = response.text().await.unwrap_or_default();
            return Err(match status.as_u16() {
                429 => GenerationError::RateLimit,
                503 => GenerationError::Unavailable,
                404 => GenerationError::Provider(format!("model not found: {}", self.model)),
                _ => GenerationError::Provider(format!("HTTP {}: {}", status, error_text)),
            });
        }

        let body: OllamaResponse = response
            .json()
            .await
            .map_err(|e| GenerationError::MalformedResponse(format!("Failed to parse response: {}", e)))?;

        let value = decode_model_output(&body.response)?;
        if let Some(error) = value.get("error") {
            let message = error.as_str().map(str::to_string).unwrap_or_else(|| error.to_string());
            return Err(GenerationError::Service(message));
        }
        Ok(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ollama_body(inner: &str) -> String {
        json!({ "model": "llama3.2", "response": inner, "done": true }).to_string()
    }

    #[tokio::test]
    async fn test_generate_decodes_json_mode_output() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/api/generate")
            .match_body(mockito::Matcher::PartialJson(json!({ "format": "json", "stream": false })))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(ollama_body(r#"{"drills": [{"type": "critique", "content": "Review this"}]}"#))
            .create_async()
            .await;

        let service = OllamaGenerationService::new(server.url(), "llama3.2").unwrap();
        let value = service.generate("prompt", &GenerationOptions::default()).await.unwrap();

        assert_eq!(value["drills"][0]["type"], "critique");
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_generate_accepts_fenced_output() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_body(ollama_body("```json\n{\"drills\": []}\n```"))
            .create_async()
            .await;

        let service = OllamaGenerationService::new(server.url(), "llama3.2").unwrap();
        let value = service.generate("prompt", &GenerationOptions::default()).await.unwrap();
        assert_eq!(value, json!({ "drills": [] }));
    }

    #[tokio::test]
    async fn test_error_document_and_status_mapping() {
        let mut server = mockito::Server::new_async().await;
        let _error_doc = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_body(ollama_body(r#"{"error": "model overloaded"}"#))
            .expect(1)
            .create_async()
            .await;

        let service = OllamaGenerationService::new(server.url(), "llama3.2").unwrap();
        let err = service.generate("prompt", &GenerationOptions::default()).await.unwrap_err();
        assert_eq!(err, GenerationError::Service("model overloaded".to_string()));

        let mut limited = mockito::Server::new_async().await;
        let _rate = limited
            .mock("POST", "/api/generate")
            .with_status(429)
            .create_async()
            .await;
        let service = OllamaGenerationService::new(limited.url(), "llama3.2").unwrap();
        let err = service.generate("prompt", &GenerationOptions::default()).await.unwrap_err();
        assert_eq!(err, GenerationError::RateLimit);
    }

    #[tokio::test]
    async fn test_non_json_output_is_malformed() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("POST", "/api/generate")
            .with_status(200)
            .with_body(ollama_body("Sorry, I cannot help with that."))
            .create_async()
            .await;

        let service = OllamaGenerationService::new(server.url(), "llama3.2").unwrap();
        let err = service.generate("prompt", &GenerationOptions::default()).await.unwrap_err();
        assert!(matches!(err, GenerationError::MalformedResponse(_)));
    }

    #[tokio::test]
    async fn test_health_check() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/api/tags")
            .with_status(200)
            .with_body(r#"{"models": []}"#)
            .create_async()
            .await;

        let service = OllamaGenerationService::new(format!("{}/", server.url()), "llama3.2").unwrap();
        service.health_check().await.unwrap();
    }
}
