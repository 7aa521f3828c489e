//! Repository layer.
//!
//! Each repository is a zero-sized struct providing async methods that take a
//! `&PgPool` (or any `PgExecutor` for the log writes) as the first argument.

pub mod focus_session_repo;
pub mod timer_pause_repo;
pub mod timer_stop_repo;

pub use focus_session_repo::{FocusSessionRepo, Transition};
pub use timer_pause_repo::TimerPauseRepo;
pub use timer_stop_repo::TimerStopRepo;
