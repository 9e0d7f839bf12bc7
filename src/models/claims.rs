//! Pure decoding of the identity carried in an access token.
//!
//! The client never holds the signing key, so the signature is not checked
//! here; the backend verifies every token it receives. What this module
//! guarantees is that `role` and `user` always come from the token itself
//! and never from anything persisted next to it.

use jsonwebtoken::{decode, DecodingKey, Validation};
use serde_json::{Map, Value};
use thiserror::Error;

use super::session::{Role, SessionUser};
use crate::utils::value::claim_to_string;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClaimsError {
    #[error("token is not a decodable JWT: {0}")]
    Undecodable(String),
    #[error("token carries no recognised role")]
    MissingRole,
    #[error("token carries no email or subject")]
    MissingEmail,
}

/// What the client is allowed to know about the bearer of a token.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenIdentity {
    pub role: Role,
    pub user: SessionUser,
    /// The token's own `exp` claim in seconds, if any. Informational only.
    pub exp: Option<i64>,
}

fn insecure_validation() -> Validation {
    let mut validation = Validation::default();
    validation.insecure_disable_signature_validation();
    validation.validate_exp = false;
    validation.validate_aud = false;
    validation.required_spec_claims.clear();
    validation
}

fn first_claim(claims: &Map<String, Value>, names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| claims.get(*name))
        .find_map(claim_to_string)
}

fn role_from_claims(claims: &Map<String, Value>) -> Option<Role> {
    if let Some(role) = claims.get("role").and_then(Value::as_str) {
        if let Ok(role) = role.parse() {
            return Some(role);
        }
    }
    if let Some(scope) = claims.get("scope").and_then(Value::as_str) {
        if let Some(role) = scope.split_whitespace().find_map(|s| s.parse().ok()) {
            return Some(role);
        }
    }
    claims
        .get("roles")
        .and_then(Value::as_array)
        .and_then(|roles| {
            roles
                .iter()
                .filter_map(Value::as_str)
                .find_map(|r| r.parse().ok())
        })
}

/// Decode role and user from an access token.
pub fn decode_identity(token: &str) -> Result<TokenIdentity, ClaimsError> {
    let data = decode::<Map<String, Value>>(
        token,
        &DecodingKey::from_secret(&[]),
        &insecure_validation(),
    )
    .map_err(|e| ClaimsError::Undecodable(e.to_string()))?;
    let claims = data.claims;

    let role = role_from_claims(&claims).ok_or(ClaimsError::MissingRole)?;
    let email = first_claim(&claims, &["email", "sub"]).ok_or(ClaimsError::MissingEmail)?;

    Ok(TokenIdentity {
        role,
        user: SessionUser {
            id: first_claim(&claims, &["userId", "uid", "id"]),
            email,
            name: first_claim(&claims, &["name", "fullName", "username"]),
        },
        exp: claims.get("exp").and_then(Value::as_i64),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{encode, EncodingKey, Header};
    use serde_json::json;

    fn sign(claims: Value) -> String {
        encode(
            &Header::default(),
            &claims,
            &EncodingKey::from_secret(b"backend-only-secret"),
        )
        .expect("Failed to create token")
    }

    #[test]
    fn test_decodes_scope_style_token() {
        let token = sign(json!({
            "sub": "ana@example.com",
            "scope": "ROLE_RECRUITER",
            "userId": 42,
            "fullName": "Ana Pop",
            "exp": 4102444800i64
        }));

        let identity = decode_identity(&token).expect("token should decode");
        assert_eq!(identity.role, Role::Recruiter);
        assert_eq!(identity.user.email, "ana@example.com");
        assert_eq!(identity.user.id.as_deref(), Some("42"));
        assert_eq!(identity.user.name.as_deref(), Some("Ana Pop"));
        assert_eq!(identity.exp, Some(4102444800));
    }

    #[test]
    fn test_explicit_role_and_email_win_over_fallbacks() {
        let token = sign(json!({
            "sub": "subject",
            "email": "bo@example.com",
            "role": "admin",
            "scope": "ROLE_CANDIDATE"
        }));

        let identity = decode_identity(&token).expect("token should decode");
        assert_eq!(identity.role, Role::Admin);
        assert_eq!(identity.user.email, "bo@example.com");
        assert_eq!(identity.user.id, None);
    }

    #[test]
    fn test_roles_array_is_last_resort() {
        let token = sign(json!({"sub": "c@example.com", "roles": ["user", "CANDIDATE"]}));
        assert_eq!(decode_identity(&token).unwrap().role, Role::Candidate);
    }

    #[test]
    fn test_expired_tokens_still_decode() {
        let token = sign(json!({"sub": "c@example.com", "role": "candidate", "exp": 1}));
        assert!(decode_identity(&token).is_ok());
    }

    #[test]
    fn test_garbage_is_undecodable() {
        assert!(matches!(
            decode_identity("not-a-jwt"),
            Err(ClaimsError::Undecodable(_))
        ));
        assert!(matches!(
            decode_identity("a.b.c"),
            Err(ClaimsError::Undecodable(_))
        ));
    }

    #[test]
    fn test_missing_role_or_email_is_rejected() {
        let no_role = sign(json!({"sub": "c@example.com", "scope": "read write"}));
        assert_eq!(decode_identity(&no_role), Err(ClaimsError::MissingRole));

        let no_email = sign(json!({"role": "candidate"}));
        assert_eq!(decode_identity(&no_email), Err(ClaimsError::MissingEmail));
    }
}
