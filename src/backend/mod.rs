pub mod base;
pub mod http_backend;

pub use base::{
    AuthBackend, BackendError, Credentials, TokenGrant, LOGIN_PATH, LOGOUT_PATH, REFRESH_PATH,
};
pub use http_backend::HttpAuthBackend;
