//! The persisted copy of the session and the rules for trusting it.

use tracing::{debug, warn};

use super::token_store::TokenStore;
use crate::backend::TokenGrant;
use crate::config::SessionConfig;
use crate::models::{decode_identity, ClaimsError, TokenIdentity};
use crate::store::{Storage, StorageError};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const TOKEN_EXPIRES_AT_KEY: &str = "token_expires_at";
pub const LEGACY_REFRESH_TOKEN_KEY: &str = "refresh_token";

/// Keys older clients wrote. Role and user info must never be trusted from
/// storage, and the refresh token must never be client-readable.
pub const LEGACY_KEYS: [&str; 3] = ["user_role", "user_info", LEGACY_REFRESH_TOKEN_KEY];

/// Keys whose change in another tab means this tab must re-read storage.
pub const WATCHED_KEYS: [&str; 3] = [
    ACCESS_TOKEN_KEY,
    TOKEN_EXPIRES_AT_KEY,
    LEGACY_REFRESH_TOKEN_KEY,
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PersistedToken {
    pub access_token: String,
    pub expires_at: i64,
}

/// How expiry instants are computed from a grant's `expires_in`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExpiryPolicy {
    pub short_lived_threshold_secs: i64,
    pub short_lived_buffer_ms: i64,
}

impl Default for ExpiryPolicy {
    fn default() -> Self {
        Self {
            short_lived_threshold_secs: 10,
            short_lived_buffer_ms: 500,
        }
    }
}

impl ExpiryPolicy {
    pub fn from_config(config: &SessionConfig) -> Self {
        Self {
            short_lived_threshold_secs: config.short_lived_threshold_secs,
            short_lived_buffer_ms: config.short_lived_buffer_ms,
        }
    }

    /// `now + expires_in`, minus the buffer for tokens living
    /// `short_lived_threshold_secs` or less.
    pub fn expires_at(&self, now_ms: i64, expires_in_secs: i64) -> i64 {
        let lifetime_ms = expires_in_secs.saturating_mul(1000);
        let buffer = if expires_in_secs <= self.short_lived_threshold_secs {
            self.short_lived_buffer_ms
        } else {
            0
        };
        now_ms.saturating_add(lifetime_ms) - buffer
    }
}

/// Reads the persisted token. Anything incomplete or unparsable counts as absent.
pub fn read_token(storage: &dyn Storage) -> Result<Option<PersistedToken>, StorageError> {
    let Some(access_token) = storage.get(ACCESS_TOKEN_KEY)? else {
        return Ok(None);
    };
    let Some(raw_expiry) = storage.get(TOKEN_EXPIRES_AT_KEY)? else {
        return Ok(None);
    };
    match raw_expiry.trim().parse::<i64>() {
        Ok(expires_at) if !access_token.is_empty() => Ok(Some(PersistedToken {
            access_token,
            expires_at,
        })),
        Ok(_) => Ok(None),
        Err(_) => {
            debug!("Ignoring unparsable {} '{}'", TOKEN_EXPIRES_AT_KEY, raw_expiry);
            Ok(None)
        }
    }
}

/// Writes expiry first so another tab never pairs a new token with a stale expiry.
pub fn write_token(
    storage: &dyn Storage,
    access_token: &str,
    expires_at: i64,
) -> Result<(), StorageError> {
    storage.set(TOKEN_EXPIRES_AT_KEY, &expires_at.to_string())?;
    storage.set(ACCESS_TOKEN_KEY, access_token)
}

pub fn clear_token(storage: &dyn Storage) -> Result<(), StorageError> {
    storage.remove(ACCESS_TOKEN_KEY)?;
    storage.remove(TOKEN_EXPIRES_AT_KEY)
}

pub fn purge_legacy(storage: &dyn Storage) -> Result<(), StorageError> {
    for key in LEGACY_KEYS {
        storage.remove(key)?;
    }
    Ok(())
}

/// What a read of persisted storage concluded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RestoreOutcome {
    Restored,
    Missing,
    Expired,
    Undecodable,
}

/// Repopulate or clear `store` from `storage`.
///
/// A persisted token is trusted only if it is unexpired by the local clock
/// and decodes to a role and user. With `purge_invalid`, rejected tokens are
/// also removed from storage.
pub fn restore_from_storage(
    storage: &dyn Storage,
    store: &TokenStore,
    purge_invalid: bool,
) -> RestoreOutcome {
    let persisted = match read_token(storage) {
        Ok(persisted) => persisted,
        Err(e) => {
            warn!("Failed to read persisted session: {}", e);
            None
        }
    };
    let Some(persisted) = persisted else {
        store.clear();
        return RestoreOutcome::Missing;
    };

    let outcome = if persisted.expires_at <= store.now_ms() {
        RestoreOutcome::Expired
    } else {
        match decode_identity(&persisted.access_token) {
            Ok(identity) => {
                store.set_from_tokens(
                    persisted.access_token,
                    persisted.expires_at,
                    Some(identity.role),
                    Some(identity.user),
                );
                return RestoreOutcome::Restored;
            }
            Err(e) => {
                debug!("Distrusting persisted token: {}", e);
                RestoreOutcome::Undecodable
            }
        }
    };

    store.clear();
    if purge_invalid {
        if let Err(e) = clear_token(storage) {
            warn!("Failed to remove rejected persisted token: {}", e);
        }
    }
    outcome
}

/// Install a freshly issued token: decode it, persist it, then publish it to the store.
///
/// An undecodable token is never installed. A storage failure is logged and
/// the in-memory session is still set.
pub fn establish(
    storage: &dyn Storage,
    store: &TokenStore,
    policy: &ExpiryPolicy,
    grant: &TokenGrant,
) -> Result<TokenIdentity, ClaimsError> {
    let identity = decode_identity(&grant.access_token)?;
    let expires_at = policy.expires_at(store.now_ms(), grant.expires_in);

    if let Err(e) = write_token(storage, &grant.access_token, expires_at) {
        warn!("Failed to persist session token: {}", e);
    }
    store.set_from_tokens(
        grant.access_token.clone(),
        expires_at,
        Some(identity.role),
        Some(identity.user.clone()),
    );
    Ok(identity)
}

/// Remove the session from storage and memory.
pub fn teardown(storage: &dyn Storage, store: &TokenStore) {
    if let Err(e) = clear_token(storage) {
        warn!("Failed to clear persisted session: {}", e);
    }
    store.clear();
}
