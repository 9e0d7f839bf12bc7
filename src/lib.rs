//! Library exports for careermate-session, shared between the binary and tests.

pub mod backend;
pub mod config;
pub mod models;
pub mod routes;
pub mod session;
pub mod startup;
pub mod state;
pub mod store;
pub mod utils;
