//! Strict JSON decoding of model output.

use crate::error::ServiceError;
use serde::de::DeserializeOwned;

/// Strip one surrounding Markdown code fence, with or without a `json` tag.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let Some(body) = rest.strip_suffix("```") else {
        return trimmed;
    };
    // Drop the info string ("json") on the opening fence line.
    match body.split_once('\n') {
        Some((info, inner)) if !info.trim().contains(char::is_whitespace) => inner.trim(),
        _ => body.trim(),
    }
}

/// Decode `text` as `T`, mapping any failure to `MalformedResponse`.
pub fn decode_json<T: DeserializeOwned>(text: &str) -> Result<T, ServiceError> {
    serde_json::from_str(strip_code_fence(text))
        .map_err(|e| ServiceError::malformed(format!("invalid JSON: {e}")))
}
