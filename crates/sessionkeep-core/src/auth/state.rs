use std::fmt;

use serde::{Deserialize, Serialize};

/// A non-empty bearer credential.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Returns `None` for an empty or all-whitespace string.
    pub fn new(value: impl Into<String>) -> Option<Self> {
        let value = value.into();
        if value.trim().is_empty() {
            None
        } else {
            Some(Self(value))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Value for the `Authorization` header
    pub fn bearer(&self) -> String {
        format!("Bearer {}", self.0)
    }
}

// Keep tokens out of logs and panic messages.
impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Token(<{} chars>)", self.0.len())
    }
}

/// Where the session is in its lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionState {
    /// The credential store has not been consulted yet.
    #[default]
    Pending,
    Unauthenticated,
    Authenticated(Token),
}

impl SessionState {
    /// State for a value read back from the credential store.
    pub fn from_stored(value: Option<String>) -> Self {
        match value.and_then(Token::new) {
            Some(token) => SessionState::Authenticated(token),
            None => SessionState::Unauthenticated,
        }
    }

    pub fn is_pending(&self) -> bool {
        matches!(self, SessionState::Pending)
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, SessionState::Authenticated(_))
    }

    pub fn token(&self) -> Option<&Token> {
        match self {
            SessionState::Authenticated(token) => Some(token),
            _ => None,
        }
    }

    /// Three-valued view: `None` while pending.
    pub fn authenticated(&self) -> Option<bool> {
        match self {
            SessionState::Pending => None,
            SessionState::Unauthenticated => Some(false),
            SessionState::Authenticated(_) => Some(true),
        }
    }

    pub fn snapshot(&self) -> AuthSnapshot {
        AuthSnapshot {
            token: self.token().map(|t| t.as_str().to_string()),
            authenticated: self.authenticated(),
        }
    }

    /// Short label for logs
    pub fn label(&self) -> &'static str {
        match self {
            SessionState::Pending => "pending",
            SessionState::Unauthenticated => "unauthenticated",
            SessionState::Authenticated(_) => "authenticated",
        }
    }
}

/// Plain `{token, authenticated}` view handed to UI layers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS))]
#[cfg_attr(feature = "ts", ts(export))]
pub struct AuthSnapshot {
    pub token: Option<String>,
    pub authenticated: Option<bool>,
}

impl AuthSnapshot {
    /// False while the session is still being restored.
    pub fn is_ready(&self) -> bool {
        self.authenticated.is_some()
    }
}

impl From<&SessionState> for AuthSnapshot {
    fn from(state: &SessionState) -> Self {
        state.snapshot()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn all_states() -> Vec<SessionState> {
        vec![
            SessionState::Pending,
            SessionState::Unauthenticated,
            SessionState::from_stored(Some("abc123".to_string())),
        ]
    }

    #[test]
    fn test_token_rejects_empty() {
        assert!(Token::new("").is_none());
        assert!(Token::new("   ").is_none());
        assert_eq!(Token::new("abc").unwrap().as_str(), "abc");
    }

    #[test]
    fn test_token_debug_hides_value() {
        let token = Token::new("super-secret").unwrap();
        let printed = format!("{:?}", token);
        assert!(!printed.contains("super-secret"));
    }

    #[test]
    fn test_bearer_format() {
        assert_eq!(Token::new("abc123").unwrap().bearer(), "Bearer abc123");
    }

    #[test]
    fn test_from_stored() {
        assert_eq!(SessionState::from_stored(None), SessionState::Unauthenticated);
        assert_eq!(
            SessionState::from_stored(Some(String::new())),
            SessionState::Unauthenticated
        );
        assert!(SessionState::from_stored(Some("t".to_string())).is_authenticated());
    }

    #[test]
    fn test_default_is_pending() {
        let state = SessionState::default();
        assert!(state.is_pending());
        assert!(!state.snapshot().is_ready());
    }

    #[test]
    fn test_snapshot_authenticated_iff_token() {
        for state in all_states() {
            let snap = state.snapshot();
            let has_token = snap.token.as_deref().map(|t| !t.is_empty()).unwrap_or(false);
            assert_eq!(snap.authenticated == Some(true), has_token, "{:?}", state);
            if snap.authenticated == Some(false) {
                assert!(snap.token.is_none());
            }
        }
    }

    #[test]
    fn test_snapshot_serializes_three_valued_flag() {
        let json = serde_json::to_value(SessionState::Pending.snapshot()).unwrap();
        assert_eq!(json, serde_json::json!({ "token": null, "authenticated": null }));

        let json = serde_json::to_value(SessionState::from_stored(Some("t".into())).snapshot())
            .unwrap();
        assert_eq!(json, serde_json::json!({ "token": "t", "authenticated": true }));
    }
}
