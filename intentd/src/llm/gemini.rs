//! Gemini API backend
//!
//! Single-attempt transport to the `generateContent` REST endpoint. All
//! retry, rotation, and fallback behavior lives in
//! [`super::client::GenerationClient`]; this type makes exactly one call
//! and reports the provider's text or its rejection message.

use async_trait::async_trait;
use eyre::Context;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use crate::config::{GeminiConfig, SamplingConfig};

use super::client::TextGenerator;
use super::error::ProviderError;

/// Gemini REST API backend
pub struct GeminiBackend {
    base_url: String,
    http: Client,
}

impl GeminiBackend {
    /// Create a backend from configuration
    pub fn from_config(config: &GeminiConfig) -> eyre::Result<Self> {
        debug!(base_url = %config.base_url, timeout_ms = config.timeout_ms, "GeminiBackend::from_config: called");
        let http = Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            base_url: config.base_url.clone(),
            http,
        })
    }

    /// Build the request body for the `generateContent` endpoint
    fn build_request_body(prompt: &str, sampling: &SamplingConfig) -> serde_json::Value {
        serde_json::json!({
            "contents": [{
                "parts": [{ "text": prompt }]
            }],
            "generationConfig": {
                "temperature": sampling.temperature,
                "maxOutputTokens": sampling.max_output_tokens,
                "topP": sampling.top_p,
                "topK": sampling.top_k,
            }
        })
    }
}

#[async_trait]
impl TextGenerator for GeminiBackend {
    async fn generate_text(
        &self,
        model: &str,
        api_key: &str,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, ProviderError> {
        debug!(%model, prompt_len = prompt.len(), "generate_text: called");
        let url = format!("{}/models/{}:generateContent", self.base_url, model);
        let body = Self::build_request_body(prompt, sampling);

        let response = self
            .http
            .post(&url)
            .header("x-goog-api-key", api_key)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| ProviderError::new(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            debug!(status = status.as_u16(), "generate_text: provider rejected request");
            // Keep the status code in the message text; classification
            // pattern-matches on it
            return Err(ProviderError::new(format!("{} {}", status.as_u16(), text)));
        }

        debug!("generate_text: success");
        let api_response: GenerateContentResponse =
            response.json().await.map_err(|e| ProviderError::new(e.to_string()))?;

        api_response
            .first_text()
            .ok_or_else(|| ProviderError::new("empty response from model"))
    }
}

// Gemini API response types

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    #[serde(default)]
    content: CandidateContent,
}

#[derive(Debug, Default, Deserialize)]
struct CandidateContent {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    #[serde(default)]
    text: Option<String>,
}

impl GenerateContentResponse {
    /// Concatenated text of the first candidate's parts, if any
    fn first_text(&self) -> Option<String> {
        let candidate = self.candidates.first()?;
        let mut text = String::new();
        for part in &candidate.content.parts {
            if let Some(part_text) = &part.text {
                text.push_str(part_text);
            }
        }
        if text.is_empty() { None } else { Some(text) }
    }
}
