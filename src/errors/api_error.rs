//! Structured error bodies returned by the synthesis service's REST API.
//!
//! 400 and 401 responses carry an [`ApiError`], 422 responses carry a
//! [`ValidationError`]. Both are decoded from the response body by
//! [`crate::core::http`] and surfaced through [`crate::ClientError`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Body of a 400/401 response.
///
/// ```json
/// {"detail": {"status": "invalid_api_key", "message": "Invalid API key"}}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiError {
    #[serde(default)]
    pub detail: ApiErrorDetail,
}

/// Inner detail of an [`ApiError`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ApiErrorDetail {
    /// Machine readable status, e.g. `invalid_api_key`
    #[serde(default)]
    pub status: String,

    /// Human readable message
    #[serde(default)]
    pub message: String,
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.detail.status.is_empty(), self.detail.message.is_empty()) {
            (false, false) => write!(f, "{}: {}", self.detail.status, self.detail.message),
            (true, false) => write!(f, "{}", self.detail.message),
            (false, true) => write!(f, "{}", self.detail.status),
            (true, true) => write!(f, "unknown API error"),
        }
    }
}

impl std::error::Error for ApiError {}

/// Body of a 422 response.
///
/// ```json
/// {"detail": [{"loc": ["body", "text"], "msg": "field required", "type": "value_error.missing"}]}
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationError {
    #[serde(default)]
    pub detail: Vec<ValidationErrorItem>,
}

/// One failed field in a [`ValidationError`].
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ValidationErrorItem {
    /// Path to the offending field. Entries may be strings or indices.
    #[serde(default)]
    pub loc: Vec<serde_json::Value>,

    #[serde(default)]
    pub msg: String,

    #[serde(rename = "type", default)]
    pub error_type: String,
}

impl ValidationErrorItem {
    /// Renders `loc` as a dotted path, e.g. `body.text`.
    pub fn location(&self) -> String {
        self.loc
            .iter()
            .map(|part| match part {
                serde_json::Value::String(s) => s.clone(),
                other => other.to_string(),
            })
            .collect::<Vec<_>>()
            .join(".")
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.detail.is_empty() {
            return write!(f, "validation failed");
        }
        let parts: Vec<String> = self
            .detail
            .iter()
            .map(|item| {
                let loc = item.location();
                if loc.is_empty() {
                    item.msg.clone()
                } else {
                    format!("{loc}: {}", item.msg)
                }
            })
            .collect();
        write!(f, "{}", parts.join("; "))
    }
}

impl std::error::Error for ValidationError {}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_deserialization() {
        let json = r#"{"detail": {"status": "invalid_api_key", "message": "Invalid API key"}}"#;
        let err: ApiError = serde_json::from_str(json).unwrap();

        assert_eq!(err.detail.status, "invalid_api_key");
        assert_eq!(err.detail.message, "Invalid API key");
        assert_eq!(err.to_string(), "invalid_api_key: Invalid API key");
    }

    #[test]
    fn test_api_error_display_fallbacks() {
        let only_message = ApiError {
            detail: ApiErrorDetail {
                status: String::new(),
                message: "quota exceeded".to_string(),
            },
        };
        assert_eq!(only_message.to_string(), "quota exceeded");
        assert_eq!(ApiError::default().to_string(), "unknown API error");
    }

    #[test]
    fn test_validation_error_display() {
        let json = r#"{"detail": [
            {"loc": ["body", "text"], "msg": "field required", "type": "value_error.missing"},
            {"loc": ["query", 0], "msg": "bad value", "type": "type_error"}
        ]}"#;
        let err: ValidationError = serde_json::from_str(json).unwrap();

        assert_eq!(err.detail.len(), 2);
        assert_eq!(err.detail[0].error_type, "value_error.missing");
        assert_eq!(
            err.to_string(),
            "body.text: field required; query.0: bad value"
        );
    }

    #[test]
    fn test_validation_error_empty() {
        let err: ValidationError = serde_json::from_str("{}").unwrap();
        assert_eq!(err.to_string(), "validation failed");
    }
}
