//! Resilient generation client
//!
//! Owns the reliability layer around one logical "generate structured
//! content from a prompt" request: model fallback, credential rotation,
//! bounded retry with backoff, and output recovery.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::{Config, RetryConfig, SamplingConfig};

use super::classify::{ErrorKind, classify};
use super::error::{GenerateError, ProviderError};
use super::gemini::GeminiBackend;
use super::keys::KeyRing;
use super::recover;

/// One raw text-generation attempt against the provider.
///
/// Implementations carry no retry or rotation logic - they make exactly one
/// call with the given model and credential and report the provider's
/// answer or its rejection text. [`GenerationClient`] layers the
/// reliability behavior on top.
#[async_trait]
pub trait TextGenerator: Send + Sync {
    async fn generate_text(
        &self,
        model: &str,
        api_key: &str,
        prompt: &str,
        sampling: &SamplingConfig,
    ) -> Result<String, ProviderError>;
}

/// A successfully generated structured result
#[derive(Debug, Clone)]
pub struct Generated {
    /// The decoded JSON payload
    pub value: Value,
    /// Which model candidate served the request
    pub model: String,
}

/// One classified failed attempt against a single model
#[derive(Debug)]
struct AttemptFailure {
    kind: ErrorKind,
    message: String,
}

/// Output-format directive appended to every prompt
const FORMAT_DIRECTIVE: &str = "\
CRITICAL INSTRUCTIONS:
1. Return ONLY valid JSON - no markdown, no explanations, no additional text
2. Ensure all JSON is properly formatted with correct commas and brackets
3. Do not include trailing commas in arrays or objects
4. Escape all special characters in strings
5. Start response with { and end with }

Your response must be parseable JSON. Begin your JSON response now:";

/// Wrap the caller's prompt with the system role and format directives
fn wrap_prompt(system_role: &str, prompt: &str) -> String {
    format!("{system_role}\n\n{prompt}\n\n{FORMAT_DIRECTIVE}")
}

/// Linear backoff for overload retries: 2s, 4s, 6s with the default step
fn overload_backoff(step_ms: u64, retry: u32) -> Duration {
    Duration::from_millis(step_ms * u64::from(retry))
}

/// Resilient generation client over an exchangeable provider backend
pub struct GenerationClient {
    backend: Arc<dyn TextGenerator>,
    keys: KeyRing,
    models: Vec<String>,
    sampling: SamplingConfig,
    retry: RetryConfig,
}

impl GenerationClient {
    pub fn new(
        backend: Arc<dyn TextGenerator>,
        keys: KeyRing,
        models: Vec<String>,
        sampling: SamplingConfig,
        retry: RetryConfig,
    ) -> Self {
        debug!(
            key_count = keys.len(),
            model_count = models.len(),
            "GenerationClient::new: called"
        );
        Self {
            backend,
            keys,
            models,
            sampling,
            retry,
        }
    }

    /// Build a client backed by the real Gemini API
    pub fn from_config(config: &Config) -> eyre::Result<Self> {
        let backend = GeminiBackend::from_config(&config.gemini)?;
        Ok(Self::new(
            Arc::new(backend),
            KeyRing::from_config(&config.gemini),
            config.gemini.models.clone(),
            config.sampling.clone(),
            config.retry.clone(),
        ))
    }

    /// Generate a structured JSON result for the given prompt.
    ///
    /// Model candidates are tried in declared order (cheapest first).
    /// Quota and overload failures fall through to the next candidate; any
    /// other provider failure aborts immediately. The first successful
    /// attempt's text goes through output recovery and is returned along
    /// with the model that served it.
    pub async fn generate(&self, prompt: &str, system_role: &str) -> Result<Generated, GenerateError> {
        debug!(prompt_len = prompt.len(), "generate: called");
        if self.keys.is_empty() {
            debug!("generate: credential pool is empty");
            return Err(GenerateError::NoCredentials);
        }

        let full_prompt = wrap_prompt(system_role, prompt);

        for model in &self.models {
            info!(%model, "generate: trying model candidate");
            match self.attempt_model(model, &full_prompt).await {
                Ok(text) => {
                    debug!(%model, text_len = text.len(), "generate: model produced text");
                    let value = recover::decode_lenient(&text)?;
                    return Ok(Generated {
                        value,
                        model: model.clone(),
                    });
                }
                Err(failure) if failure.kind.falls_through() => {
                    warn!(%model, kind = ?failure.kind, "generate: model unavailable, trying next candidate");
                    continue;
                }
                Err(failure) => {
                    debug!(%model, message = %failure.message, "generate: fatal provider error");
                    return Err(GenerateError::Provider(failure.message));
                }
            }
        }

        debug!("generate: every model candidate exhausted");
        Err(GenerateError::Exhausted)
    }

    /// Attempt one model, rotating credentials on quota errors and
    /// retrying transient failures with bounded backoff.
    ///
    /// An explicit loop with `retry_count` / `key_attempt` accumulators
    /// keeps the termination bound auditable.
    async fn attempt_model(&self, model: &str, prompt: &str) -> Result<String, AttemptFailure> {
        let mut retry_count: u32 = 0;
        let mut key_attempt: usize = 0;

        loop {
            let Some(key) = self.keys.next() else {
                return Err(AttemptFailure {
                    kind: ErrorKind::Other,
                    message: "no API credentials configured".to_string(),
                });
            };

            let err = match self.backend.generate_text(model, &key, prompt, &self.sampling).await {
                Ok(text) => return Ok(text),
                Err(e) => e,
            };

            let kind = classify(&err.message);
            debug!(%model, ?kind, retry_count, key_attempt, "attempt_model: provider attempt failed");

            match kind {
                ErrorKind::QuotaExceeded => {
                    if key_attempt + 1 < self.keys.len() {
                        key_attempt += 1;
                        retry_count = 0;
                        warn!(%model, key_attempt, "attempt_model: quota hit, rotating to next credential");
                        continue;
                    }
                    return Err(AttemptFailure {
                        kind,
                        message: err.message,
                    });
                }
                ErrorKind::Overloaded => {
                    if retry_count < self.retry.overload_retries {
                        retry_count += 1;
                        let delay = overload_backoff(self.retry.overload_backoff_ms, retry_count);
                        warn!(%model, retry_count, ?delay, "attempt_model: model overloaded, backing off");
                        sleep(delay).await;
                        continue;
                    }
                    return Err(AttemptFailure {
                        kind,
                        message: err.message,
                    });
                }
                ErrorKind::RateLimited => {
                    if retry_count < self.retry.rate_limit_retries {
                        retry_count += 1;
                        warn!(%model, retry_count, "attempt_model: rate limited, retrying after fixed delay");
                        sleep(Duration::from_millis(self.retry.rate_limit_delay_ms)).await;
                        continue;
                    }
                    // Retry budget spent; a generic retry signal is fatal
                    return Err(AttemptFailure {
                        kind: ErrorKind::Other,
                        message: err.message,
                    });
                }
                ErrorKind::Other => {
                    return Err(AttemptFailure {
                        kind,
                        message: err.message,
                    });
                }
            }
        }
    }
}


#[cfg(test)]
mod tests {
    use super::mock::MockBackend;
    use super::*;
    use serde_json::json;

    fn fast_retry() -> RetryConfig {
        RetryConfig {
            overload_backoff_ms: 1,
            rate_limit_delay_ms: 1,
            ..RetryConfig::default()
        }
    }

    fn client(backend: Arc<MockBackend>, keys: Vec<&str>, models: Vec<&str>) -> GenerationClient {
        GenerationClient::new(
            backend,
            KeyRing::new(keys.into_iter().map(String::from).collect()),
            models.into_iter().map(String::from).collect(),
            SamplingConfig::default(),
            fast_retry(),
        )
    }

    #[tokio::test]
    async fn test_success_returns_value_and_model() {
        let backend = Arc::new(MockBackend::scripted(vec![Ok("```json\n{\"goal\": \"learn\"}\n```".to_string())]));
        let client = client(backend.clone(), vec!["k1"], vec!["model-a", "model-b"]);

        let generated = client.generate("prompt", "system").await.unwrap();

        assert_eq!(generated.value, json!({"goal": "learn"}));
        assert_eq!(generated.model, "model-a");
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_empty_pool_fails_without_provider_call() {
        let backend = Arc::new(MockBackend::scripted(vec![]));
        let client = client(backend.clone(), vec![], vec!["model-a"]);

        let err = client.generate("prompt", "system").await.unwrap_err();

        assert!(matches!(err, GenerateError::NoCredentials));
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_quota_tries_every_model_once_in_order() {
        // One key: each model gets exactly one attempt before fallback
        let backend = Arc::new(MockBackend::always_fail("429 quota exceeded for project"));
        let client = client(backend.clone(), vec!["k1"], vec!["model-a", "model-b", "model-c"]);

        let err = client.generate("prompt", "system").await.unwrap_err();

        assert!(matches!(err, GenerateError::Exhausted));
        let models: Vec<String> = backend.calls().into_iter().map(|c| c.model).collect();
        assert_eq!(models, vec!["model-a", "model-b", "model-c"]);
    }

    #[tokio::test]
    async fn test_quota_rotates_all_keys_before_model_fallback() {
        let backend = Arc::new(MockBackend::always_fail("429 quota exceeded"));
        let client = client(backend.clone(), vec!["k1", "k2", "k3"], vec!["model-a", "model-b"]);

        let err = client.generate("prompt", "system").await.unwrap_err();

        assert!(matches!(err, GenerateError::Exhausted));
        let calls = backend.calls();
        // Three credential attempts per model, rotation continues across models
        assert_eq!(calls.len(), 6);
        assert!(calls[..3].iter().all(|c| c.model == "model-a"));
        assert!(calls[3..].iter().all(|c| c.model == "model-b"));
        let keys: Vec<String> = calls[..3].iter().map(|c| c.key.clone()).collect();
        assert_eq!(keys, vec!["k1", "k2", "k3"]);
    }

    #[tokio::test]
    async fn test_overload_retries_three_times_then_falls_through() {
        let backend = Arc::new(MockBackend::always_fail("503 the model is overloaded"));
        let client = client(backend.clone(), vec!["k1"], vec!["model-a", "model-b"]);

        let err = client.generate("prompt", "system").await.unwrap_err();

        assert!(matches!(err, GenerateError::Exhausted));
        // 1 attempt + 3 retries per model
        let calls = backend.calls();
        assert_eq!(calls.len(), 8);
        assert!(calls[..4].iter().all(|c| c.model == "model-a"));
        assert!(calls[4..].iter().all(|c| c.model == "model-b"));
    }

    #[tokio::test]
    async fn test_overload_backoff_schedule() {
        assert_eq!(overload_backoff(2000, 1), Duration::from_secs(2));
        assert_eq!(overload_backoff(2000, 2), Duration::from_secs(4));
        assert_eq!(overload_backoff(2000, 3), Duration::from_secs(6));
    }

    #[tokio::test]
    async fn test_rate_limit_retries_twice_then_aborts() {
        let backend = Arc::new(MockBackend::always_fail("resource busy, please retry"));
        let client = client(backend.clone(), vec!["k1"], vec!["model-a", "model-b"]);

        let err = client.generate("prompt", "system").await.unwrap_err();

        // Exhausting the generic retry budget is fatal: no model fallback
        assert!(matches!(err, GenerateError::Provider(_)));
        assert_eq!(backend.call_count(), 3);
        assert!(backend.calls().iter().all(|c| c.model == "model-a"));
    }

    #[tokio::test]
    async fn test_other_error_aborts_immediately() {
        let backend = Arc::new(MockBackend::always_fail("400 API key not valid"));
        let client = client(backend.clone(), vec!["k1"], vec!["model-a", "model-b"]);

        let err = client.generate("prompt", "system").await.unwrap_err();

        match err {
            GenerateError::Provider(message) => assert!(message.contains("API key not valid")),
            other => panic!("expected Provider, got {:?}", other),
        }
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_quota_then_success_on_next_model() {
        let backend = Arc::new(MockBackend::scripted(vec![
            Err(ProviderError::new("429 quota exceeded")),
            Ok("{\"ok\": true}".to_string()),
        ]));
        let client = client(backend.clone(), vec!["k1"], vec!["model-a", "model-b"]);

        let generated = client.generate("prompt", "system").await.unwrap();

        assert_eq!(generated.model, "model-b");
        assert_eq!(generated.value, json!({"ok": true}));
    }

    #[tokio::test]
    async fn test_unparseable_output_is_terminal() {
        let backend = Arc::new(MockBackend::scripted(vec![Ok("I cannot answer in JSON.".to_string())]));
        let client = client(backend.clone(), vec!["k1"], vec!["model-a", "model-b"]);

        let err = client.generate("prompt", "system").await.unwrap_err();

        assert!(matches!(err, GenerateError::Unparseable { .. }));
        // No model fallback for decode failures
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn test_wrapped_prompt_carries_system_role_and_directives() {
        let backend = Arc::new(MockBackend::scripted(vec![Ok("{}".to_string())]));
        let client = client(backend.clone(), vec!["k1"], vec!["model-a"]);

        client.generate("the user prompt", "the system role").await.unwrap();

        let calls = backend.calls();
        assert!(calls[0].prompt.starts_with("the system role"));
        assert!(calls[0].prompt.contains("the user prompt"));
        assert!(calls[0].prompt.contains("Return ONLY valid JSON"));
        assert!(calls[0].prompt.contains("Start response with {"));
    }
}
