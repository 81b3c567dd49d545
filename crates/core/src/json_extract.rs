//! Extraction of the JSON object embedded in a free-text LLM response.
//!
//! Models routinely wrap their answer in prose or in a fenced code block, so
//! the object is located by searching for braces rather than parsing the
//! whole response.

use crate::types::Fields;

/// Errors from [`parse_json_object`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("Response contains no JSON object")]
    NoJsonObject,

    #[error("Response JSON is malformed: {0}")]
    InvalidJson(String),

    #[error("Response JSON is not an object")]
    NotAnObject,

    #[error("Response JSON is missing keys: {}", .0.join(", "))]
    MissingKeys(Vec<String>),
}

/// Locate the JSON object inside `text`.
///
/// A fenced code block containing `{` wins; otherwise the slice from the
/// first `{` to the last `}` is returned.
pub fn extract_json_object(text: &str) -> Option<&str> {
    let text = text.trim();

    if let Some(fence) = text.find("```") {
        let after_fence = &text[fence + 3..];
        if let Some(close) = after_fence.find("```") {
            let block = &after_fence[..close];
            if let (Some(start), Some(end)) = (block.find('{'), block.rfind('}')) {
                if start < end {
                    return Some(&block[start..=end]);
                }
            }
        }
    }

    let start = text.find('{')?;
    let end = text.rfind('}')?;
    (start < end).then(|| &text[start..=end])
}

/// Extract, parse and check the JSON object in an LLM response.
///
/// Every key in `required_keys` must be present and non-null.
pub fn parse_json_object(text: &str, required_keys: &[&str]) -> Result<Fields, ExtractError> {
    let raw = extract_json_object(text).ok_or(ExtractError::NoJsonObject)?;

    let value: serde_json::Value =
        serde_json::from_str(raw).map_err(|e| ExtractError::InvalidJson(e.to_string()))?;

    let serde_json::Value::Object(map) = value else {
        return Err(ExtractError::NotAnObject);
    };

    let missing: Vec<String> = required_keys
        .iter()
        .filter(|key| map.get(**key).map_or(true, |v| v.is_null()))
        .map(|key| key.to_string())
        .collect();

    if !missing.is_empty() {
        return Err(ExtractError::MissingKeys(missing));
    }

    Ok(map)
}
