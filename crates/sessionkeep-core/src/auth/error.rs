use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::credentials::StoreError;
use crate::api::ApiError;

/// Failure of a session operation.
#[derive(Error, Debug)]
pub enum AuthError {
    /// The identity service answered and said no.
    #[error("{msg}")]
    Rejected { status: u16, msg: String },

    /// The identity service could not be reached.
    #[error("Unable to reach the server: {0}")]
    Transport(String),

    #[error("Invalid response from server: {0}")]
    InvalidResponse(String),

    #[error("Credential store error: {0}")]
    Store(#[from] StoreError),

    /// A later login or logout committed first.
    #[error("Superseded by a newer session operation")]
    Superseded,
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::NetworkError(e) if e.is_decode() => {
                AuthError::InvalidResponse(e.to_string())
            }
            ApiError::NetworkError(e) => AuthError::Transport(e.to_string()),
            ApiError::InvalidResponse(msg) => AuthError::InvalidResponse(msg),
            other => AuthError::Rejected {
                status: other.status().unwrap_or(0),
                msg: other.user_message(),
            },
        }
    }
}

impl AuthError {
    /// Message suitable for direct display.
    pub fn message(&self) -> String {
        match self {
            AuthError::Rejected { msg, .. } => msg.clone(),
            AuthError::Transport(_) => {
                "Unable to connect to server. Check your internet connection.".to_string()
            }
            other => other.to_string(),
        }
    }

    pub fn is_rejected(&self) -> bool {
        matches!(self, AuthError::Rejected { .. })
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, AuthError::Transport(_))
    }

    pub fn to_failure(&self) -> AuthFailure {
        AuthFailure {
            error: true,
            msg: self.message(),
        }
    }
}

/// `{error: true, msg}` payload handed to UI code.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct AuthFailure {
    pub error: bool,
    pub msg: String,
}

impl From<&AuthError> for AuthFailure {
    fn from(err: &AuthError) -> Self {
        err.to_failure()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::StatusCode;

    #[test]
    fn test_rejection_keeps_server_message() {
        let body = r#"{"msg":"bad credentials"}"#;
        let api = ApiError::from_status(StatusCode::UNAUTHORIZED, body);
        let err = AuthError::from(api);
        assert!(err.is_rejected());
        assert!(matches!(err, AuthError::Rejected { status: 401, .. }));
        assert_eq!(
            err.to_failure(),
            AuthFailure {
                error: true,
                msg: "bad credentials".to_string()
            }
        );
    }

    #[test]
    fn test_server_error_is_rejection_with_status() {
        let body = r#"{"msg":"maintenance"}"#;
        let api = ApiError::from_status(StatusCode::SERVICE_UNAVAILABLE, body);
        let err = AuthError::from(api);
        assert!(matches!(
            err,
            AuthError::Rejected { status: 503, ref msg } if msg == "maintenance"
        ));
    }

    #[test]
    fn test_transport_message_is_friendly() {
        let err = AuthError::Transport("connection refused".to_string());
        assert!(err.is_transport());
        assert!(err.message().contains("Unable to connect"));
    }

    #[test]
    fn test_failure_serializes_as_error_msg_pair() {
        let failure = AuthError::Superseded.to_failure();
        let json = serde_json::to_value(&failure).unwrap();
        assert_eq!(json["error"], serde_json::json!(true));
        assert!(json["msg"].as_str().unwrap().contains("Superseded"));
    }
}
