//! HTTP request handlers
//!
//! Thin adapters between the JSON wire surface and the pipeline. Input
//! validation happens here, before any provider call; pipeline errors map
//! to status codes with quota exhaustion distinguished so the web client
//! can show a "try again later" message.

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, info};
use uuid::Uuid;

use crate::pipeline::{AnalysisRequest, PipelineError};

use super::AppState;

/// Request body shared by both analysis endpoints
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalyzeBody {
    /// The user's goal text
    #[serde(default)]
    pub input: String,

    /// Prior session entries (opaque JSON values)
    #[serde(default)]
    pub session_history: Vec<Value>,

    /// Answers collected after a clarification round
    #[serde(default)]
    pub clarification_answers: Option<Value>,
}

impl AnalyzeBody {
    fn into_request(self) -> AnalysisRequest {
        AnalysisRequest {
            input: self.input,
            session_history: self.session_history,
            clarification_answers: self.clarification_answers,
        }
    }
}

/// `POST /analyze` - run the full five-stage pipeline
pub async fn analyze(State(state): State<Arc<AppState>>, Json(body): Json<AnalyzeBody>) -> Response {
    let request_id = Uuid::new_v4();
    debug!(%request_id, input_len = body.input.len(), "analyze: called");

    if body.input.trim().is_empty() {
        debug!(%request_id, "analyze: rejecting blank input");
        return blank_input_response();
    }

    match state.pipeline.run_full(&body.into_request()).await {
        Ok(report) => {
            info!(%request_id, is_valid = report.metadata.is_valid, "analyze: pipeline complete");
            (StatusCode::OK, Json(report)).into_response()
        }
        Err(err) => {
            error!(%request_id, error = %err, "analyze: pipeline failed");
            pipeline_error_response(&err)
        }
    }
}

/// `POST /clarify` - run stages 1-3 as a cheap pre-check
pub async fn clarify(State(state): State<Arc<AppState>>, Json(body): Json<AnalyzeBody>) -> Response {
    let request_id = Uuid::new_v4();
    debug!(%request_id, input_len = body.input.len(), "clarify: called");

    if body.input.trim().is_empty() {
        debug!(%request_id, "clarify: rejecting blank input");
        return blank_input_response();
    }

    match state.pipeline.run_clarify(&body.into_request()).await {
        Ok(report) => {
            info!(%request_id, needs_clarification = report.needs_clarification, "clarify: pre-check complete");
            (
                StatusCode::OK,
                Json(json!({
                    "success": true,
                    "intent": report.intent,
                    "constraints": report.constraints,
                    "clarification": report.clarification,
                    "needs_clarification": report.needs_clarification,
                })),
            )
                .into_response()
        }
        Err(err) => {
            error!(%request_id, error = %err, "clarify: pipeline failed");
            pipeline_error_response(&err)
        }
    }
}

/// `GET /health` - liveness probe
pub async fn health() -> Response {
    (
        StatusCode::OK,
        Json(json!({
            "name": env!("CARGO_PKG_NAME"),
            "version": env!("CARGO_PKG_VERSION"),
            "status": "ok",
        })),
    )
        .into_response()
}

fn blank_input_response() -> Response {
    (
        StatusCode::BAD_REQUEST,
        Json(json!({
            "success": false,
            "error": "Input is required",
        })),
    )
        .into_response()
}

fn pipeline_error_response(err: &PipelineError) -> Response {
    if err.is_quota_exhaustion() {
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(json!({
                "success": false,
                "error": "API quota exceeded. Please try again later.",
                "errorType": "quota_exceeded",
            })),
        )
            .into_response();
    }

    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({
            "success": false,
            "error": err.to_string(),
        })),
    )
        .into_response()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{RetryConfig, SamplingConfig};
    use crate::llm::client::mock::MockBackend;
    use crate::llm::{GenerationClient, KeyRing};
    use crate::pipeline::Pipeline;
    use crate::prompts::PromptLoader;

    fn state_with(backend: Arc<MockBackend>) -> Arc<AppState> {
        let client = GenerationClient::new(
            backend,
            KeyRing::new(vec!["k1".to_string()]),
            vec!["model-a".to_string()],
            SamplingConfig::default(),
            RetryConfig {
                overload_backoff_ms: 1,
                rate_limit_delay_ms: 1,
                ..RetryConfig::default()
            },
        );
        Arc::new(AppState {
            pipeline: Pipeline::new(Arc::new(client), Arc::new(PromptLoader::embedded_only())),
        })
    }

    fn body(input: &str) -> AnalyzeBody {
        AnalyzeBody {
            input: input.to_string(),
            session_history: vec![],
            clarification_answers: None,
        }
    }

    async fn response_json(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn test_analyze_rejects_blank_input_without_provider_call() {
        let backend = Arc::new(MockBackend::scripted(vec![]));
        let state = state_with(backend.clone());

        for input in ["", "   ", "\n\t"] {
            let response = analyze(State(state.clone()), Json(body(input))).await;
            let (status, value) = response_json(response).await;

            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert!(!value["error"].as_str().unwrap().is_empty());
        }
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_clarify_rejects_blank_input_without_provider_call() {
        let backend = Arc::new(MockBackend::scripted(vec![]));
        let state = state_with(backend.clone());

        let response = clarify(State(state), Json(body("  "))).await;
        let (status, value) = response_json(response).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(!value["error"].as_str().unwrap().is_empty());
        assert_eq!(backend.call_count(), 0);
    }

    #[tokio::test]
    async fn test_analyze_quota_exhaustion_maps_to_429() {
        let backend = Arc::new(MockBackend::always_fail("429 quota exceeded"));
        let state = state_with(backend);

        let response = analyze(State(state), Json(body("plan my career switch"))).await;
        let (status, value) = response_json(response).await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(value["errorType"], "quota_exceeded");
        assert!(value["error"].as_str().unwrap().contains("try again later"));
    }

    #[tokio::test]
    async fn test_analyze_other_failure_maps_to_500() {
        let backend = Arc::new(MockBackend::always_fail("400 API key not valid"));
        let state = state_with(backend);

        let response = analyze(State(state), Json(body("plan my career switch"))).await;
        let (status, value) = response_json(response).await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert!(value["error"].as_str().unwrap().contains("API key not valid"));
        assert!(value.get("errorType").is_none());
    }

    #[tokio::test]
    async fn test_analyze_success_shape() {
        let stage = |v: Value| Ok(v.to_string());
        let backend = Arc::new(MockBackend::scripted(vec![
            stage(json!({"primary_intent": {"goal": "switch careers"}})),
            stage(json!({"time_constraint": {"value": "6 months"}})),
            stage(json!({"needs_clarification": false, "overall_confidence": 0.8})),
            stage(json!({"candidate_plans": [], "recommended_plan": "optimal"})),
            stage(json!({"is_valid": true, "safe_to_present": true})),
        ]));
        let state = state_with(backend);

        let response = analyze(State(state), Json(body("switch careers"))).await;
        let (status, value) = response_json(response).await;

        assert_eq!(status, StatusCode::OK);
        for key in ["intent", "constraints", "clarification", "plans", "validation", "metadata"] {
            assert!(value.get(key).is_some(), "missing response field: {}", key);
        }
        assert_eq!(value["metadata"]["total_stages"], 5);
        assert_eq!(value["metadata"]["needs_clarification"], false);
        assert_eq!(value["metadata"]["safe_to_present"], true);
    }

    #[tokio::test]
    async fn test_clarify_success_shape() {
        let stage = |v: Value| Ok(v.to_string());
        let backend = Arc::new(MockBackend::scripted(vec![
            stage(json!({"primary_intent": {"goal": "learn piano"}})),
            stage(json!({})),
            stage(json!({"needs_clarification": true, "clarification_questions": [{"question": "How much time?"}]})),
        ]));
        let state = state_with(backend);

        let response = clarify(State(state), Json(body("learn piano"))).await;
        let (status, value) = response_json(response).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["success"], true);
        assert_eq!(value["needs_clarification"], true);
        assert!(value["clarification"]["clarification_questions"].is_array());
    }

    #[tokio::test]
    async fn test_clarify_error_body_sets_success_false() {
        let backend = Arc::new(MockBackend::always_fail("429 quota exceeded"));
        let state = state_with(backend);

        let response = clarify(State(state), Json(body("learn piano"))).await;
        let (status, value) = response_json(response).await;

        assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(value["success"], false);
        assert_eq!(value["errorType"], "quota_exceeded");
    }

    #[tokio::test]
    async fn test_health() {
        let response = health().await;
        let (status, value) = response_json(response).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(value["status"], "ok");
        assert_eq!(value["name"], "intentd");
    }
}
