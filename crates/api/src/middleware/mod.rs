//! Request extractors shared by handlers.
//!
//! - [`auth::Caller`] -- Authenticates the bearer token and reports whether
//!   the caller holds the privileged token.

pub mod auth;
