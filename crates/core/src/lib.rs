//! Domain rules for the focus timer.
//!
//! Everything in this crate is pure: no I/O, no clock reads. The API server
//! and the client-side reconciliation engine both build on these functions so
//! the two sides can never disagree about what "remaining time" means.

pub mod error;
pub mod focus_timer;
pub mod listing;
pub mod timer_events;
pub mod types;
