use std::fmt;

use reqwest::StatusCode;
use thiserror::Error;

/// The `detail` field of an error payload, as the control plane sends it.
///
/// The server reports errors either as a single string, a list of strings, or
/// (for request validation) a list of objects carrying a `msg`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ErrorDetail {
    #[default]
    Missing,
    Message(String),
    Messages(Vec<String>),
}

impl ErrorDetail {
    /// Parse an error response body. Anything without a usable `detail` is `Missing`.
    pub fn from_body(body: &str) -> Self {
        let Ok(value) = serde_json::from_str::<serde_json::Value>(body) else {
            return Self::Missing;
        };

        match value.get("detail") {
            Some(serde_json::Value::String(s)) => Self::Message(s.clone()),
            Some(serde_json::Value::Array(items)) => {
                let messages: Vec<String> = items
                    .iter()
                    .filter_map(|item| match item {
                        serde_json::Value::String(s) => Some(s.clone()),
                        serde_json::Value::Object(obj) => obj
                            .get("msg")
                            .and_then(|m| m.as_str())
                            .map(str::to_string),
                        _ => None,
                    })
                    .collect();
                if messages.is_empty() {
                    Self::Missing
                } else {
                    Self::Messages(messages)
                }
            }
            _ => Self::Missing,
        }
    }

    /// Human-readable text: a single message verbatim, a list joined with ", ".
    pub fn text(&self) -> Option<String> {
        match self {
            Self::Missing => None,
            Self::Message(s) => Some(s.clone()),
            Self::Messages(items) => Some(items.join(", ")),
        }
    }
}

impl fmt::Display for ErrorDetail {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.text() {
            Some(text) => f.write_str(&text),
            None => f.write_str("no detail"),
        }
    }
}

/// HTTP client errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Unauthorized: {0}")]
    Unauthorized(ErrorDetail),

    #[error("Not found: {0}")]
    NotFound(ErrorDetail),

    #[error("Bad request: {0}")]
    BadRequest(ErrorDetail),

    #[error("Validation failed: {0}")]
    Validation(ErrorDetail),

    #[error("Server error {status}: {detail}")]
    Server { status: u16, detail: ErrorDetail },
}

impl ClientError {
    /// Classify a non-success response.
    pub fn from_status(status: StatusCode, body: &str) -> Self {
        let detail = ErrorDetail::from_body(body);
        match status {
            StatusCode::UNAUTHORIZED => Self::Unauthorized(detail),
            StatusCode::NOT_FOUND => Self::NotFound(detail),
            StatusCode::BAD_REQUEST => Self::BadRequest(detail),
            StatusCode::UNPROCESSABLE_ENTITY => Self::Validation(detail),
            _ => Self::Server {
                status: status.as_u16(),
                detail,
            },
        }
    }

    pub fn detail(&self) -> Option<&ErrorDetail> {
        match self {
            Self::Http(_) => None,
            Self::Unauthorized(d) | Self::NotFound(d) | Self::BadRequest(d) | Self::Validation(d) => {
                Some(d)
            }
            Self::Server { detail, .. } => Some(detail),
        }
    }

    /// The message shown to the user: the server's detail when it sent one,
    /// otherwise the caller's fallback for the action that failed.
    pub fn message(&self, fallback: &str) -> String {
        self.detail()
            .and_then(ErrorDetail::text)
            .unwrap_or_else(|| fallback.to_string())
    }

    pub fn is_unauthorized(&self) -> bool {
        matches!(self, Self::Unauthorized(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }

    /// Whether a read may be attempted again: transport failures and 5xx only.
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Http(e) => !e.is_decode() && !e.is_builder(),
            Self::Server { status, .. } => *status >= 500,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_string_detail_is_verbatim() {
        let err = ClientError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"detail": "Run is not queued"}"#,
        );
        assert_eq!(err.message("Trigger failed"), "Run is not queued");
    }

    #[test]
    fn test_list_detail_is_joined() {
        let err = ClientError::from_status(
            StatusCode::BAD_REQUEST,
            r#"{"detail": ["name is required", "repo_url is required"]}"#,
        );
        assert_eq!(
            err.message("Failed to create project"),
            "name is required, repo_url is required"
        );
    }

    #[test]
    fn test_validation_objects_use_msg() {
        let err = ClientError::from_status(
            StatusCode::UNPROCESSABLE_ENTITY,
            r#"{"detail": [{"loc": ["body", "suite_id"], "msg": "field required", "type": "value_error.missing"}]}"#,
        );
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(err.message("Failed to create run"), "field required");
    }

    #[test]
    fn test_missing_detail_uses_fallback() {
        let err = ClientError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "<html>oops</html>");
        assert_eq!(err.message("Failed to create run"), "Failed to create run");

        let err = ClientError::from_status(StatusCode::BAD_GATEWAY, r#"{"detail": 42}"#);
        assert_eq!(err.message("Login failed"), "Login failed");
    }

    #[test]
    fn test_status_classification() {
        assert!(ClientError::from_status(StatusCode::UNAUTHORIZED, "").is_unauthorized());
        assert!(ClientError::from_status(StatusCode::NOT_FOUND, "").is_not_found());
        assert!(ClientError::from_status(StatusCode::SERVICE_UNAVAILABLE, "").is_retryable());
        assert!(!ClientError::from_status(StatusCode::NOT_FOUND, "").is_retryable());
        assert!(!ClientError::from_status(StatusCode::UNAUTHORIZED, "").is_retryable());
    }
}
