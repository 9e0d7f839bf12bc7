pub mod claims;
pub mod session;

pub use claims::{decode_identity, ClaimsError, TokenIdentity};
pub use session::{Role, Session, SessionUser};
