use serde::Deserialize;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("Access denied: {0}")]
    AccessDenied(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Rate limited - please wait before retrying")]
    RateLimited,

    #[error("Server error ({status}): {message}")]
    ServerError { status: u16, message: String },

    #[error("Request rejected ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),
}

/// Maximum length for error response bodies in error messages
const MAX_ERROR_BODY_LENGTH: usize = 500;

/// Error bodies the identity service sends back. `msg` is the documented field.
#[derive(Debug, Deserialize)]
struct ErrorBody {
    msg: Option<String>,
    message: Option<String>,
    error: Option<serde_json::Value>,
}

impl ApiError {
    /// Truncate a response body to avoid logging excessive data
    fn truncate_body(body: &str) -> String {
        if body.len() <= MAX_ERROR_BODY_LENGTH {
            body.to_string()
        } else {
            let mut end = MAX_ERROR_BODY_LENGTH;
            while !body.is_char_boundary(end) {
                end -= 1;
            }
            format!("{}... (truncated, {} total bytes)", &body[..end], body.len())
        }
    }

    /// Human-readable message out of an error body.
    ///
    /// Prefers the JSON `msg` field, then `message`, then a string `error`,
    /// then the raw body, and finally the status reason phrase.
    pub fn server_message(status: reqwest::StatusCode, body: &str) -> String {
        if let Ok(parsed) = serde_json::from_str::<ErrorBody>(body) {
            let error_text = parsed.error.and_then(|e| match e {
                serde_json::Value::String(s) => Some(s),
                _ => None,
            });
            if let Some(msg) = parsed.msg.or(parsed.message).or(error_text) {
                if !msg.trim().is_empty() {
                    return msg;
                }
            }
        }
        let trimmed = body.trim();
        if !trimmed.is_empty() {
            return Self::truncate_body(trimmed);
        }
        status
            .canonical_reason()
            .map(str::to_string)
            .unwrap_or_else(|| format!("HTTP {}", status.as_u16()))
    }

    pub fn from_status(status: reqwest::StatusCode, body: &str) -> Self {
        let message = Self::server_message(status, body);
        match status.as_u16() {
            401 => ApiError::Unauthorized(message),
            403 => ApiError::AccessDenied(message),
            404 => ApiError::NotFound(message),
            429 => ApiError::RateLimited,
            code @ 500..=599 => ApiError::ServerError {
                status: code,
                message,
            },
            code => ApiError::Rejected {
                status: code,
                message,
            },
        }
    }

    /// Status code when the server answered at all.
    pub fn status(&self) -> Option<u16> {
        match self {
            ApiError::Unauthorized(_) => Some(401),
            ApiError::AccessDenied(_) => Some(403),
            ApiError::NotFound(_) => Some(404),
            ApiError::RateLimited => Some(429),
            ApiError::ServerError { status, .. } | ApiError::Rejected { status, .. } => {
                Some(*status)
            }
            ApiError::NetworkError(e) => e.status().map(|s| s.as_u16()),
            ApiError::InvalidResponse(_) => None,
        }
    }

    /// The message to show a user, without the variant prefix.
    pub fn user_message(&self) -> String {
        match self {
            ApiError::Unauthorized(m)
            | ApiError::AccessDenied(m)
            | ApiError::NotFound(m)
            | ApiError::ServerError { message: m, .. }
            | ApiError::Rejected { message: m, .. } => m.clone(),
            other => other.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_msg_field_preferred() {
        let err = ApiError::from_status(
            StatusCode::UNAUTHORIZED,
            r#"{"msg":"bad credentials","message":"ignored"}"#,
        );
        assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "bad credentials"));
        assert_eq!(err.user_message(), "bad credentials");
        assert_eq!(err.status(), Some(401));
    }

    #[test]
    fn test_falls_back_to_message_and_error() {
        assert_eq!(
            ApiError::server_message(StatusCode::BAD_REQUEST, r#"{"message":"duplicate email"}"#),
            "duplicate email"
        );
        assert_eq!(
            ApiError::server_message(StatusCode::BAD_REQUEST, r#"{"error":"nope"}"#),
            "nope"
        );
    }

    #[test]
    fn test_plain_text_and_empty_bodies() {
        assert_eq!(
            ApiError::server_message(StatusCode::BAD_GATEWAY, "upstream down\n"),
            "upstream down"
        );
        assert_eq!(
            ApiError::server_message(StatusCode::CONFLICT, ""),
            "Conflict"
        );
    }

    #[test]
    fn test_long_body_truncated() {
        let body = "x".repeat(MAX_ERROR_BODY_LENGTH + 10);
        let message = ApiError::server_message(StatusCode::BAD_REQUEST, &body);
        assert!(message.contains("truncated"));
        assert!(message.len() < body.len() + 40);
    }

    #[test]
    fn test_status_classification() {
        assert!(matches!(
            ApiError::from_status(StatusCode::TOO_MANY_REQUESTS, ""),
            ApiError::RateLimited
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::INTERNAL_SERVER_ERROR, "boom"),
            ApiError::ServerError { status: 500, .. }
        ));
        assert!(matches!(
            ApiError::from_status(StatusCode::CONFLICT, r#"{"msg":"taken"}"#),
            ApiError::Rejected { status: 409, .. }
        ));
    }
}
