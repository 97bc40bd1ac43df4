//! Embedded prompts
//!
//! These are compiled into the binary from .pmt files at build time.

use tracing::debug;

/// System role preamble shared by every stage
pub const SYSTEM_ROLE: &str = include_str!("../../prompts/system-role.pmt");

/// Stage 1: multi-intent decomposition
pub const INTENT: &str = include_str!("../../prompts/intent.pmt");

/// Stage 2: constraint extraction
pub const CONSTRAINTS: &str = include_str!("../../prompts/constraints.pmt");

/// Stage 3: clarification strategy
pub const CLARIFICATION: &str = include_str!("../../prompts/clarification.pmt");

/// Stage 4: multi-plan generation
pub const PLANS: &str = include_str!("../../prompts/plans.pmt");

/// Stage 5: guardrail validation
pub const VALIDATION: &str = include_str!("../../prompts/validation.pmt");

/// Get the embedded prompt by name
pub fn get_embedded(name: &str) -> Option<&'static str> {
    debug!(%name, "get_embedded: called");
    match name {
        "system-role" => Some(SYSTEM_ROLE),
        "intent" => Some(INTENT),
        "constraints" => Some(CONSTRAINTS),
        "clarification" => Some(CLARIFICATION),
        "plans" => Some(PLANS),
        "validation" => Some(VALIDATION),
        _ => {
            debug!("get_embedded: no match found");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_embedded_all_stages() {
        for name in ["system-role", "intent", "constraints", "clarification", "plans", "validation"] {
            assert!(get_embedded(name).is_some(), "missing embedded template: {}", name);
        }
    }

    #[test]
    fn test_clarification_carries_decision_rule() {
        let template = get_embedded("clarification").unwrap();
        assert!(template.contains("0.70"));
        assert!(template.contains("3 or more"));
        assert!(template.contains("needs_clarification"));
    }

    #[test]
    fn test_stage_templates_demand_json() {
        for name in ["intent", "constraints", "clarification", "plans", "validation"] {
            let template = get_embedded(name).unwrap();
            assert!(template.contains("Return ONLY valid JSON"), "{} must demand JSON output", name);
        }
    }

    #[test]
    fn test_get_embedded_unknown() {
        assert!(get_embedded("unknown-template").is_none());
    }
}
