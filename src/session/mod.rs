//! Client-side session synchronisation.
//!
//! One `SessionManager` per client context owns a `TokenStore` and the
//! coordinators that keep it honest:
//!
//! - `hydration`: optimistic restore from storage, then verification.
//! - `refresh`: single-flight token refresh.
//! - `sync`: follows writes made by other contexts sharing the storage.
//! - `guard`: turns session state into render/redirect decisions.

pub mod guard;
pub mod hydration;
pub mod manager;
pub mod persist;
pub mod refresh;
pub mod sync;
pub mod token_store;

#[cfg(test)]
pub(crate) mod test_support;

pub use guard::{GuardDecision, GuardMode, RouteGuard};
pub use hydration::{HydrationCoordinator, HydrationPhase, HydrationTask};
pub use manager::{SessionError, SessionManager};
pub use persist::{ExpiryPolicy, RestoreOutcome};
pub use refresh::{RefreshCoordinator, RefreshOutcome};
pub use sync::CrossTabSync;
pub use token_store::TokenStore;
