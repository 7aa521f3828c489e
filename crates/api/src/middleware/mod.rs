//! Request extractors shared by the handlers.
//!
//! - [`auth::AuthUser`] -- Extracts the session owner from a JWT Bearer token.

pub mod auth;
