//! Prompt Loader
//!
//! Loads prompt templates from an override directory or falls back to the
//! embedded defaults, and renders them with stage-specific context.

use std::path::PathBuf;

use eyre::{Result, eyre};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::embedded;

/// Named fields bound into a stage template.
///
/// Prior stage outputs travel as pre-serialized JSON strings; the templates
/// interpolate them raw (triple-brace). Fields a stage does not use are
/// simply absent and render as nothing.
#[derive(Debug, Clone, Serialize)]
pub struct StageContext {
    /// The user's goal text
    pub user_input: String,
    /// Serialized tail of the caller-supplied session history
    pub session_history: Option<String>,
    /// Serialized stage-1 output
    pub intent_json: Option<String>,
    /// Serialized stage-2 output
    pub constraints_json: Option<String>,
    /// Serialized conflict list from stage 1
    pub conflicts_json: Option<String>,
    /// Serialized stage-4 output
    pub plans_json: Option<String>,
    /// Serialized caller-supplied clarification answers
    pub answers_json: Option<String>,
}

/// How many trailing session-history entries are bound into the intent prompt
const HISTORY_TAIL: usize = 3;

impl StageContext {
    /// Context for the intent stage (user text + optional history tail)
    pub fn intent(user_input: &str, session_history: &[Value]) -> Self {
        let history = if session_history.is_empty() {
            None
        } else {
            let start = session_history.len().saturating_sub(HISTORY_TAIL);
            Some(Value::Array(session_history[start..].to_vec()).to_string())
        };
        Self {
            user_input: user_input.to_string(),
            session_history: history,
            intent_json: None,
            constraints_json: None,
            conflicts_json: None,
            plans_json: None,
            answers_json: None,
        }
    }

    /// Context for the constraints stage (user text only)
    pub fn constraints(user_input: &str) -> Self {
        Self::intent(user_input, &[])
    }

    /// Context for the clarification stage
    pub fn clarification(user_input: &str, intent: &Value, constraints: &Value, answers: Option<&Value>) -> Self {
        Self {
            intent_json: Some(intent.to_string()),
            constraints_json: Some(constraints.to_string()),
            answers_json: answers.map(Value::to_string),
            ..Self::intent(user_input, &[])
        }
    }

    /// Context for the plan stage; `conflicts` is stage 1's conflict list,
    /// carried verbatim
    pub fn plans(
        user_input: &str,
        intent: &Value,
        constraints: &Value,
        conflicts: &Value,
        answers: Option<&Value>,
    ) -> Self {
        Self {
            conflicts_json: Some(conflicts.to_string()),
            ..Self::clarification(user_input, intent, constraints, answers)
        }
    }

    /// Context for the validation stage
    pub fn validation(user_input: &str, plans: &Value, constraints: &Value) -> Self {
        Self {
            plans_json: Some(plans.to_string()),
            constraints_json: Some(constraints.to_string()),
            ..Self::intent(user_input, &[])
        }
    }
}

/// Loads and renders prompt templates
pub struct PromptLoader {
    /// Handlebars template engine
    hbs: Handlebars<'static>,
    /// Optional user override directory
    override_dir: Option<PathBuf>,
}

impl PromptLoader {
    /// Create a new prompt loader.
    ///
    /// Templates resolve from `{override_dir}/{name}.pmt` when the directory
    /// is configured and the file exists, otherwise from the embedded
    /// defaults.
    pub fn new(override_dir: Option<PathBuf>) -> Self {
        debug!(?override_dir, "PromptLoader::new: called");
        Self {
            hbs: Handlebars::new(),
            override_dir,
        }
    }

    /// Create a loader that only uses embedded prompts (for testing)
    pub fn embedded_only() -> Self {
        Self::new(None)
    }

    /// Load a template by name
    fn load_template(&self, name: &str) -> Result<String> {
        debug!(%name, "PromptLoader::load_template: called");
        if let Some(ref dir) = self.override_dir {
            let path = dir.join(format!("{}.pmt", name));
            if path.exists() {
                debug!(?path, "PromptLoader::load_template: found override");
                return std::fs::read_to_string(&path)
                    .map_err(|e| eyre!("Failed to read prompt override {}: {}", path.display(), e));
            }
        }

        if let Some(content) = embedded::get_embedded(name) {
            debug!(%name, "PromptLoader::load_template: using embedded");
            return Ok(content.to_string());
        }

        Err(eyre!("Prompt template not found: {}", name))
    }

    /// Render a stage template with the given context
    pub fn render(&self, template_name: &str, context: &StageContext) -> Result<String> {
        debug!(%template_name, "PromptLoader::render: called");
        let template = self.load_template(template_name)?;

        self.hbs
            .render_template(&template, context)
            .map_err(|e| eyre!("Failed to render template {}: {}", template_name, e))
    }

    /// The system role preamble (no variables to bind)
    pub fn system_role(&self) -> Result<String> {
        self.load_template("system-role")
    }
}
