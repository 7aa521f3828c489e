//! Request handlers.
//!
//! Handlers delegate persistence to the repositories in `manifest_db` and
//! map errors via [`AppError`](crate::error::AppError).

pub mod timer;
