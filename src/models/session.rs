use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Coarse user category carried in the access token.
#[derive(Serialize, Deserialize, JsonSchema, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Candidate,
    Recruiter,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Candidate => "candidate",
            Role::Recruiter => "recruiter",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    /// Accepts `candidate`, `CANDIDATE` and the backend's `ROLE_CANDIDATE` spelling.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let upper = trimmed.to_ascii_uppercase();
        let bare = upper.strip_prefix("ROLE_").unwrap_or(&upper);
        match bare {
            "CANDIDATE" => Ok(Role::Candidate),
            "RECRUITER" => Ok(Role::Recruiter),
            "ADMIN" => Ok(Role::Admin),
            _ => Err(format!("unknown role '{}'", trimmed)),
        }
    }
}

/// Display-only projection of the user decoded from the token.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct SessionUser {
    pub id: Option<String>,
    pub email: String,
    pub name: Option<String>,
}

/// The in-memory session of one client context.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq, Default)]
pub struct Session {
    pub access_token: Option<String>,
    /// Absolute expiry, epoch milliseconds.
    pub token_expires_at: Option<i64>,
    pub role: Option<Role>,
    pub user: Option<SessionUser>,
}

impl Session {
    /// True iff a token is present and has not expired at `now_ms`.
    pub fn is_authenticated_at(&self, now_ms: i64) -> bool {
        match (&self.access_token, self.token_expires_at) {
            (Some(_), Some(expires_at)) => expires_at > now_ms,
            _ => false,
        }
    }
}
