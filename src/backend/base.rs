use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Client-facing auth endpoints, served by the proxy and called by `HttpAuthBackend`.
pub const REFRESH_PATH: &str = "/api/auth/token-refresh";
pub const LOGIN_PATH: &str = "/api/auth/login";
pub const LOGOUT_PATH: &str = "/api/auth/logout";

/// A freshly issued access token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenGrant {
    pub access_token: String,
    /// Lifetime in seconds.
    pub expires_in: i64,
}

/// Response envelope used by every auth endpoint: `{ "result": { ... } }`.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Envelope<T> {
    pub result: T,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BackendError {
    /// No HTTP response was received.
    #[error("network failure: {0}")]
    Network(String),
    #[error("backend answered with HTTP {0}")]
    Status(u16),
    #[error("backend response could not be read: {0}")]
    InvalidResponse(String),
}

impl BackendError {
    /// 401 and 403 mean the refresh credential is no longer any good.
    pub fn is_unauthorized(&self) -> bool {
        matches!(self, BackendError::Status(401) | BackendError::Status(403))
    }
}

/// The auth endpoints a client session talks to.
///
/// The refresh credential is ambient (an HTTP-only cookie); implementations
/// keep it to themselves and never hand it back.
#[async_trait::async_trait]
pub trait AuthBackend: Send + Sync {
    async fn refresh(&self) -> Result<TokenGrant, BackendError>;
    async fn login(&self, credentials: &Credentials) -> Result<TokenGrant, BackendError>;
    async fn logout(&self) -> Result<(), BackendError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_envelope_uses_camel_case() {
        let body = r#"{"result": {"accessToken": "abc", "expiresIn": 900}}"#;
        let parsed: Envelope<TokenGrant> = serde_json::from_str(body).unwrap();
        assert_eq!(
            parsed.result,
            TokenGrant {
                access_token: "abc".into(),
                expires_in: 900
            }
        );
    }

    #[test]
    fn test_only_401_and_403_are_unauthorized() {
        assert!(BackendError::Status(401).is_unauthorized());
        assert!(BackendError::Status(403).is_unauthorized());
        assert!(!BackendError::Status(500).is_unauthorized());
        assert!(!BackendError::Network("reset".into()).is_unauthorized());
    }
}
