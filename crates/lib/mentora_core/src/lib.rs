//! # mentora_core
//!
//! Core domain logic for Mentora: identities, sessions, bearer tokens and the
//! access-control decisions built on them.

pub mod auth;
pub mod clock;
pub mod config;
pub mod ids;
pub mod migrate;
pub mod models;
pub mod store;
pub mod users;

/// Returns the crate version.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
