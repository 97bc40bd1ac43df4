//! Prompt Template System
//!
//! Loads and renders `.pmt` (prompt template) files for the pipeline
//! stages.
//!
//! Template loading chain:
//! 1. `{prompts.dir}/{name}.pmt` (user override, if configured)
//! 2. Embedded fallback in code
//!
//! Templates use Handlebars syntax. Prompt wording is configuration data;
//! the code only binds named fields into it.

pub mod embedded;
mod loader;

pub use loader::{PromptLoader, StageContext};
