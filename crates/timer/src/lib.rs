//! Client-side focus timer.
//!
//! [`engine::FocusTimer`] owns the local countdown. It derives running or
//! paused state from the server's session timestamps on restore, drives a
//! 500 ms tick while running, and mirrors each user action to the timer API
//! without waiting for (or rolling back on) the server's answer.

pub mod api;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod history;

pub use api::{HttpTimerApi, TimerApi};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::TimerClientConfig;
pub use engine::{Completed, FocusTimer, TimerPhase, TimerSnapshot};
pub use error::{ClientError, EngineError};
