use serde::{Deserialize, Serialize};

/// Error body returned by the hosted backend.
///
/// The auth API and the row API disagree on field names, so every known
/// spelling is accepted and normalised through [`ErrorResponse::message`]
/// and [`ErrorResponse::code`].
///
/// Auth API: `{"code": 400, "error_code": "invalid_credentials", "msg": "..."}`
/// or `{"error": "invalid_grant", "error_description": "..."}`.
/// Row API: `{"code": "42501", "message": "...", "details": null, "hint": null}`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ErrorResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub msg: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Numeric on the auth API, textual on the row API.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<serde_json::Value>,
}

impl ErrorResponse {
    /// Human readable message, falling back to the error slug.
    pub fn message(&self) -> Option<String> {
        self.message
            .clone()
            .or_else(|| self.msg.clone())
            .or_else(|| self.error_description.clone())
            .or_else(|| self.error.clone())
            .filter(|m| !m.is_empty())
    }

    /// Machine readable code, preferring textual codes over HTTP-ish numbers.
    pub fn code(&self) -> Option<String> {
        if let Some(code) = self.error_code.clone().or_else(|| self.error.clone()) {
            return Some(code);
        }
        match &self.code {
            Some(serde_json::Value::String(s)) => Some(s.clone()),
            Some(serde_json::Value::Number(n)) => Some(n.to_string()),
            _ => None,
        }
    }
}
