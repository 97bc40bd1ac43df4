//! Pipeline Orchestrator
//!
//! Sequences the generation stages, threading each stage's structured
//! output into the next stage's prompt. Stages run strictly in order -
//! every prompt depends on the previous stage's parsed result - and any
//! stage failure aborts the rest of the pipeline. Partial results are
//! never returned.

use std::sync::Arc;

use serde::Serialize;
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, info};

use crate::llm::{GenerateError, Generated, GenerationClient};
use crate::prompts::{PromptLoader, StageContext};

/// Number of stages in the full pipeline
const TOTAL_STAGES: u32 = 5;

/// Errors surfaced by a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Generate(#[from] GenerateError),

    #[error("prompt template error: {0}")]
    Template(String),
}

impl PipelineError {
    /// True when the caller should present a "quota exhausted, try later"
    /// message (HTTP 429) rather than a generic failure
    pub fn is_quota_exhaustion(&self) -> bool {
        matches!(self, PipelineError::Generate(e) if e.is_quota_exhaustion())
    }
}

/// One end-to-end analysis request
#[derive(Debug, Clone, Default)]
pub struct AnalysisRequest {
    /// The user's goal text
    pub input: String,
    /// Prior session entries supplied by the caller (opaque JSON)
    pub session_history: Vec<Value>,
    /// Answers collected after a clarification round, folded into the
    /// clarification and plan prompts
    pub clarification_answers: Option<Value>,
}

impl AnalysisRequest {
    pub fn new(input: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            ..Self::default()
        }
    }
}

/// Summary facts about a full pipeline run
#[derive(Debug, Clone, Serialize)]
pub struct ReportMetadata {
    /// How many stages ran
    pub total_stages: u32,
    /// Overall confidence reported by the clarification stage
    pub overall_confidence: f64,
    /// Whether the clarification stage asked for more information
    pub needs_clarification: bool,
    /// Whether the validation stage accepted the plan
    pub is_valid: bool,
    /// Whether the validation stage considers the plan presentable
    pub safe_to_present: bool,
    /// Which model candidate served each stage, in stage order
    pub models_used: Vec<String>,
    /// When the report was assembled (RFC 3339)
    pub generated_at: String,
}

/// Complete multi-section analysis from the full pipeline
#[derive(Debug, Clone, Serialize)]
pub struct AnalysisReport {
    pub intent: Value,
    pub constraints: Value,
    pub clarification: Value,
    pub plans: Value,
    pub validation: Value,
    pub metadata: ReportMetadata,
}

/// Result of the cheap clarification pre-check (stages 1-3 only)
#[derive(Debug, Clone, Serialize)]
pub struct ClarifyReport {
    pub intent: Value,
    pub constraints: Value,
    pub clarification: Value,
    pub needs_clarification: bool,
}

/// Orchestrates the staged prompt sequence over the generation client
pub struct Pipeline {
    client: Arc<GenerationClient>,
    prompts: Arc<PromptLoader>,
}

impl Pipeline {
    pub fn new(client: Arc<GenerationClient>, prompts: Arc<PromptLoader>) -> Self {
        Self { client, prompts }
    }

    /// Run stages 1-3 and report whether clarification is warranted,
    /// letting the caller collect answers before committing to the full
    /// pipeline.
    pub async fn run_clarify(&self, request: &AnalysisRequest) -> Result<ClarifyReport, PipelineError> {
        info!(input_len = request.input.len(), "run_clarify: called");
        let system = self.system_role()?;

        let intent = self
            .run_stage("intent", &StageContext::intent(&request.input, &request.session_history), &system)
            .await?;
        let constraints = self
            .run_stage("constraints", &StageContext::constraints(&request.input), &system)
            .await?;
        let clarification = self
            .run_stage(
                "clarification",
                &StageContext::clarification(
                    &request.input,
                    &intent.value,
                    &constraints.value,
                    request.clarification_answers.as_ref(),
                ),
                &system,
            )
            .await?;

        let needs_clarification = read_bool(&clarification.value, "needs_clarification");
        info!(needs_clarification, "run_clarify: complete");

        Ok(ClarifyReport {
            intent: intent.value,
            constraints: constraints.value,
            clarification: clarification.value,
            needs_clarification,
        })
    }

    /// Run the full five-stage pipeline and assemble the combined report
    pub async fn run_full(&self, request: &AnalysisRequest) -> Result<AnalysisReport, PipelineError> {
        info!(input_len = request.input.len(), "run_full: called");
        let system = self.system_role()?;
        let answers = request.clarification_answers.as_ref();

        let intent = self
            .run_stage("intent", &StageContext::intent(&request.input, &request.session_history), &system)
            .await?;
        let constraints = self
            .run_stage("constraints", &StageContext::constraints(&request.input), &system)
            .await?;
        let clarification = self
            .run_stage(
                "clarification",
                &StageContext::clarification(&request.input, &intent.value, &constraints.value, answers),
                &system,
            )
            .await?;

        // Stage 1's conflict list feeds the planner verbatim
        let conflicts = intent.value.get("conflicts").cloned().unwrap_or(Value::Array(vec![]));
        let plans = self
            .run_stage(
                "plans",
                &StageContext::plans(&request.input, &intent.value, &constraints.value, &conflicts, answers),
                &system,
            )
            .await?;
        let validation = self
            .run_stage(
                "validation",
                &StageContext::validation(&request.input, &plans.value, &constraints.value),
                &system,
            )
            .await?;

        let metadata = ReportMetadata {
            total_stages: TOTAL_STAGES,
            overall_confidence: clarification
                .value
                .get("overall_confidence")
                .and_then(Value::as_f64)
                .unwrap_or(0.0),
            needs_clarification: read_bool(&clarification.value, "needs_clarification"),
            is_valid: read_bool(&validation.value, "is_valid"),
            safe_to_present: read_bool(&validation.value, "safe_to_present"),
            models_used: vec![
                intent.model,
                constraints.model,
                clarification.model,
                plans.model,
                validation.model,
            ],
            generated_at: chrono::Utc::now().to_rfc3339(),
        };
        info!(
            is_valid = metadata.is_valid,
            safe_to_present = metadata.safe_to_present,
            "run_full: complete"
        );

        Ok(AnalysisReport {
            intent: intent.value,
            constraints: constraints.value,
            clarification: clarification.value,
            plans: plans.value,
            validation: validation.value,
            metadata,
        })
    }

    fn system_role(&self) -> Result<String, PipelineError> {
        self.prompts.system_role().map_err(|e| PipelineError::Template(e.to_string()))
    }

    /// Render one stage's prompt and run it through the generation client
    async fn run_stage(&self, name: &str, context: &StageContext, system: &str) -> Result<Generated, PipelineError> {
        info!(stage = name, "run_stage: called");
        let prompt = self
            .prompts
            .render(name, context)
            .map_err(|e| PipelineError::Template(e.to_string()))?;

        let generated = self.client.generate(&prompt, system).await?;
        debug!(stage = name, model = %generated.model, "run_stage: complete");
        Ok(generated)
    }
}

/// Read a boolean field defensively, treating anything missing or
/// non-boolean as false (the same falsy handling the web client applies)
fn read_bool(value: &Value, key: &str) -> bool {
    value.get(key).and_then(Value::as_bool).unwrap_or(false)
}
