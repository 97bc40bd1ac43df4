//! Output recovery: model text to structured JSON
//!
//! Model output is not guaranteed to be directly parseable. This module
//! applies a cascade of text-repair heuristics, stopping at the first one
//! that yields valid JSON:
//!
//! 1. strip markdown code fences (with or without a language tag)
//! 2. trim text before the first `{` and after the last `}`
//! 3. direct decode
//! 4. strip trailing commas before closing brackets, then decode
//! 5. additionally escape stray quotes before key colons, then decode
//!    (last resort; this can corrupt valid JSON and is only reached when
//!    everything above has already failed)
//! 6. decode the largest brace-balanced `{...}` substring
//!
//! If all attempts fail, the original decode error and a bounded prefix of
//! the offending text are surfaced for diagnostics.

use regex::Regex;
use serde_json::Value;
use tracing::debug;

use super::error::GenerateError;

/// How much of the offending text to carry in an unparseable error
const DIAGNOSTIC_PREFIX_CHARS: usize = 500;

/// Decode model output text into a JSON value, repairing where needed
pub fn decode_lenient(raw: &str) -> Result<Value, GenerateError> {
    debug!(raw_len = raw.len(), "decode_lenient: called");
    let cleaned = trim_to_braces(strip_code_fences(raw));

    let direct_err = match serde_json::from_str(cleaned) {
        Ok(value) => {
            debug!("decode_lenient: direct decode succeeded");
            return Ok(value);
        }
        Err(e) => e,
    };
    debug!(error = %direct_err, "decode_lenient: direct decode failed, trying repairs");

    let without_commas = strip_trailing_commas(cleaned);
    if let Ok(value) = serde_json::from_str(&without_commas) {
        debug!("decode_lenient: decoded after stripping trailing commas");
        return Ok(value);
    }

    let quotes_escaped = escape_stray_quotes(&without_commas);
    if let Ok(value) = serde_json::from_str(&quotes_escaped) {
        debug!("decode_lenient: decoded after escaping stray quotes");
        return Ok(value);
    }

    if let Some(candidate) = balanced_object(cleaned) {
        debug!(candidate_len = candidate.len(), "decode_lenient: trying balanced substring");
        if let Ok(value) = serde_json::from_str(candidate) {
            return Ok(value);
        }
    }

    debug!("decode_lenient: all repair attempts failed");
    Err(GenerateError::Unparseable {
        reason: direct_err.to_string(),
        prefix: cleaned.chars().take(DIAGNOSTIC_PREFIX_CHARS).collect(),
    })
}

/// Remove a leading/trailing markdown code fence if present
fn strip_code_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };

    // Drop the rest of the fence line (it may carry a language tag)
    let rest = match rest.find('\n') {
        Some(idx) => &rest[idx + 1..],
        None => rest,
    };

    let rest = rest.trim_end();
    rest.strip_suffix("```").unwrap_or(rest).trim()
}

/// Trim prose before the first `{` and after the last `}`
fn trim_to_braces(text: &str) -> &str {
    let Some(start) = text.find('{') else {
        return text;
    };
    match text.rfind('}') {
        Some(end) if end >= start => &text[start..=end],
        _ => &text[start..],
    }
}

/// Drop commas that directly precede a closing bracket or brace
fn strip_trailing_commas(text: &str) -> String {
    match Regex::new(r",(\s*[}\]])") {
        Ok(re) => re.replace_all(text, "$1").into_owned(),
        Err(_) => text.to_string(),
    }
}

/// Escape quotes that open an object key, mirroring the provider's most
/// common corruption. Not semantics-preserving on all inputs.
fn escape_stray_quotes(text: &str) -> String {
    match Regex::new(r#"([^\\])"([^"]*)":"#) {
        Ok(re) => re.replace_all(text, "${1}\\\"${2}\\\":").into_owned(),
        Err(_) => text.to_string(),
    }
}

/// Find the largest brace-balanced `{...}` substring, skipping braces
/// inside string literals
fn balanced_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let mut best: Option<(usize, usize)> = None;

    for start in 0..bytes.len() {
        if bytes[start] != b'{' {
            continue;
        }
        if let Some(end) = balanced_end(bytes, start) {
            let longer = best.is_none_or(|(s, e)| end - start > e - s);
            if longer {
                best = Some((start, end));
            }
        }
    }

    best.map(|(s, e)| &text[s..=e])
}

/// Walk from an opening brace to its matching close, honoring JSON string
/// escaping. Returns the index of the closing brace.
fn balanced_end(bytes: &[u8], start: usize) -> Option<usize> {
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (idx, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }

        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(idx);
                }
            }
            _ => {}
        }
    }

    None
}
