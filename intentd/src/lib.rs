//! Intentd - goal analysis and action-plan service
//!
//! A thin orchestration layer over the Gemini API: each pipeline stage is a
//! templated prompt sent to the model, with the JSON-shaped text response
//! recovered, parsed, and threaded into the next stage. The interesting
//! part is the reliability layer around the model call - API-key rotation,
//! model fallback, bounded retry with backoff, and lenient output recovery.
//!
//! # Modules
//!
//! - [`llm`] - resilient generation client (rotation, fallback, recovery)
//! - [`pipeline`] - stage sequencing and report assembly
//! - [`prompts`] - `.pmt` template loading and field binding
//! - [`server`] - inbound HTTP surface (`/analyze`, `/clarify`)
//! - [`config`] - configuration types and loading
//! - [`cli`] - command-line interface

pub mod cli;
pub mod config;
pub mod llm;
pub mod pipeline;
pub mod prompts;
pub mod server;

// Re-export commonly used types
pub use config::{Config, GeminiConfig, RetryConfig, SamplingConfig, ServerConfig};
pub use llm::{GenerateError, Generated, GenerationClient, KeyRing, ProviderError, TextGenerator, create_client};
pub use pipeline::{AnalysisReport, AnalysisRequest, ClarifyReport, Pipeline, PipelineError, ReportMetadata};
pub use prompts::{PromptLoader, StageContext};
pub use server::{AppState, build_router};
