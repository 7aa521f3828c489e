//! Row structs and DTOs.
//!
//! Each submodule contains:
//! - A `FromRow` + `Serialize` struct matching the database row
//! - Input structs consumed by the matching repository

pub mod focus_session;
pub mod timer_pause;
pub mod timer_stop;
