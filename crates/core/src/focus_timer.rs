//! Focus timer session rules.
//!
//! A session never stores an explicit status. Its phase is derived from two
//! nullable timestamps:
//!
//! | `end_at` | `target_end` | phase     |
//! |----------|--------------|-----------|
//! | null     | set          | running   |
//! | null     | null         | paused    |
//! | set      | any          | stopped   |
//!
//! Remaining time for a running session is `target_end - now`. For a paused
//! session it is reconstructed from the pause log with
//! [`remaining_at_pause`], which freezes the countdown at the instant the
//! open pause began.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::types::Timestamp;

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Milliseconds in one minute.
pub const MS_PER_MINUTE: i64 = 60_000;

/// Planned duration used for a focus session without `planned_minutes`.
pub const DEFAULT_FOCUS_MINUTES: i32 = 25;

/// Planned duration used for a break session without `planned_minutes`.
pub const DEFAULT_BREAK_MINUTES: i32 = 5;

/// Interval of the client-side countdown tick, in milliseconds.
pub const TICK_INTERVAL_MS: u64 = 500;

/// Maximum length of a session note, in characters.
pub const MAX_NOTE_LENGTH: usize = 5_000;

// ---------------------------------------------------------------------------
// Mode
// ---------------------------------------------------------------------------

/// Kind of timer run. Fixed for the lifetime of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TimerMode {
    #[default]
    Focus,
    Break,
}

impl TimerMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Focus => "focus",
            Self::Break => "break",
        }
    }

    /// Parse a stored or user-supplied mode string.
    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "focus" => Ok(Self::Focus),
            "break" => Ok(Self::Break),
            other => Err(CoreError::Validation(format!(
                "Invalid timer mode '{other}'. Expected 'focus' or 'break'"
            ))),
        }
    }

    /// Planned minutes assumed when a session has none recorded.
    pub fn default_minutes(&self) -> i32 {
        match self {
            Self::Focus => DEFAULT_FOCUS_MINUTES,
            Self::Break => DEFAULT_BREAK_MINUTES,
        }
    }
}

impl std::fmt::Display for TimerMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Phase discriminator
// ---------------------------------------------------------------------------

/// The three mutually exclusive phases of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SessionPhase {
    Running,
    Paused,
    Stopped,
}

impl SessionPhase {
    /// Derive the phase from the stored timestamps.
    pub fn of(end_at: Option<Timestamp>, target_end: Option<Timestamp>) -> Self {
        match (end_at, target_end) {
            (Some(_), _) => Self::Stopped,
            (None, Some(_)) => Self::Running,
            (None, None) => Self::Paused,
        }
    }

    /// Running or paused.
    pub fn is_active(&self) -> bool {
        !matches!(self, Self::Stopped)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Running => "running",
            Self::Paused => "paused",
            Self::Stopped => "stopped",
        }
    }
}

impl std::fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Time arithmetic
// ---------------------------------------------------------------------------

/// A pause interval as seen by the remaining-time computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PauseWindow {
    pub started_at: Timestamp,
    /// `None` while the pause is still open.
    pub ended_at: Option<Timestamp>,
}

/// Planned duration in milliseconds, falling back to the mode default.
pub fn planned_ms(planned_minutes: Option<i32>, mode: TimerMode) -> i64 {
    let minutes = planned_minutes.unwrap_or_else(|| mode.default_minutes());
    i64::from(minutes) * MS_PER_MINUTE
}

/// Milliseconds left until `target_end`, floored at zero.
pub fn remaining_until(target_end: Timestamp, now: Timestamp) -> i64 {
    (target_end - now).num_milliseconds().max(0)
}

/// The absolute end of a countdown that has `remaining_ms` left at `now`.
pub fn target_end_after(now: Timestamp, remaining_ms: i64) -> Timestamp {
    now + Duration::milliseconds(remaining_ms.max(0))
}

/// Remaining milliseconds of a paused session.
///
/// Sums the closed pause intervals, takes the start of the open one, and
/// subtracts the active time elapsed up to that start from the plan:
///
/// ```text
/// remaining = max(0, planned - max(0, open_start - session_start - completed_pauses))
/// ```
///
/// The result does not depend on how long the open pause has lasted. When no
/// pause is open the elapsed term is zero. If several pauses are open (only
/// possible with corrupt data) the latest one by start time wins.
pub fn remaining_at_pause(planned_ms: i64, session_start: Timestamp, pauses: &[PauseWindow]) -> i64 {
    let mut completed_ms: i64 = 0;
    let mut open_start: Option<Timestamp> = None;

    for pause in pauses {
        match pause.ended_at {
            Some(ended_at) => {
                completed_ms += (ended_at - pause.started_at).num_milliseconds().max(0);
            }
            None => {
                if open_start.map_or(true, |current| pause.started_at >= current) {
                    open_start = Some(pause.started_at);
                }
            }
        }
    }

    let active_ms = match open_start {
        Some(start) => ((start - session_start).num_milliseconds() - completed_ms).max(0),
        None => 0,
    };

    (planned_ms - active_ms).max(0)
}

/// Actual session length recorded at stop: wall-clock minutes between start
/// and stop, rounded half-up, never below one.
///
/// Paused time counts. A session paused for ten minutes and run for fifteen
/// records 25.
pub fn elapsed_duration_minutes(start_at: Timestamp, stopped_at: Timestamp) -> i32 {
    let ms = (stopped_at - start_at).num_milliseconds();
    let rounded = (ms + MS_PER_MINUTE / 2).div_euclid(MS_PER_MINUTE);
    i32::try_from(rounded.max(1)).unwrap_or(i32::MAX)
}

// ---------------------------------------------------------------------------
// Validation
// ---------------------------------------------------------------------------

/// Validate a planned or recorded duration in minutes.
pub fn validate_minutes(field: &str, minutes: i32) -> Result<(), CoreError> {
    if minutes <= 0 {
        return Err(CoreError::Validation(format!(
            "{field} must be a positive number of minutes, got {minutes}"
        )));
    }
    Ok(())
}

/// Validate note length.
pub fn validate_note(note: &str) -> Result<(), CoreError> {
    let len = note.chars().count();
    if len > MAX_NOTE_LENGTH {
        return Err(CoreError::Validation(format!(
            "Note exceeds {MAX_NOTE_LENGTH} characters ({len})"
        )));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::TimeZone;

    use super::*;

    fn t0() -> Timestamp {
        chrono::Utc.with_ymd_and_hms(2025, 3, 1, 9, 0, 0).unwrap()
    }

    fn mins(n: i64) -> Duration {
        Duration::minutes(n)
    }

    // -- TimerMode -----------------------------------------------------------

    #[test]
    fn mode_parse_accepts_known_values() {
        assert_eq!(TimerMode::parse("focus").unwrap(), TimerMode::Focus);
        assert_eq!(TimerMode::parse("break").unwrap(), TimerMode::Break);
    }

    #[test]
    fn mode_parse_rejects_unknown_value() {
        assert_matches!(TimerMode::parse("nap"), Err(CoreError::Validation(_)));
    }

    #[test]
    fn mode_serializes_lowercase() {
        assert_eq!(serde_json::to_value(TimerMode::Break).unwrap(), "break");
    }

    #[test]
    fn mode_defaults() {
        assert_eq!(TimerMode::default(), TimerMode::Focus);
        assert_eq!(TimerMode::Focus.default_minutes(), 25);
        assert_eq!(TimerMode::Break.default_minutes(), 5);
    }

    // -- SessionPhase --------------------------------------------------------

    #[test]
    fn phase_is_exclusive_for_every_combination() {
        let ts = Some(t0());
        assert_eq!(SessionPhase::of(None, ts), SessionPhase::Running);
        assert_eq!(SessionPhase::of(None, None), SessionPhase::Paused);
        assert_eq!(SessionPhase::of(ts, None), SessionPhase::Stopped);
        assert_eq!(SessionPhase::of(ts, ts), SessionPhase::Stopped);
    }

    #[test]
    fn stopped_is_not_active() {
        assert!(SessionPhase::Running.is_active());
        assert!(SessionPhase::Paused.is_active());
        assert!(!SessionPhase::Stopped.is_active());
    }

    // -- planned_ms ----------------------------------------------------------

    #[test]
    fn planned_ms_uses_explicit_minutes() {
        assert_eq!(planned_ms(Some(50), TimerMode::Focus), 3_000_000);
    }

    #[test]
    fn planned_ms_falls_back_per_mode() {
        assert_eq!(planned_ms(None, TimerMode::Focus), 1_500_000);
        assert_eq!(planned_ms(None, TimerMode::Break), 300_000);
    }

    // -- remaining_until / target_end_after ----------------------------------

    #[test]
    fn remaining_until_counts_down() {
        let end = t0() + mins(25);
        assert_eq!(remaining_until(end, t0()), 1_500_000);
        assert_eq!(remaining_until(end, t0() + mins(5)), 1_200_000);
    }

    #[test]
    fn remaining_until_floors_at_zero() {
        assert_eq!(remaining_until(t0(), t0() + mins(1)), 0);
    }

    #[test]
    fn target_end_after_adds_remaining() {
        let now = t0() + mins(8);
        assert_eq!(target_end_after(now, 1_200_000), t0() + mins(28));
        assert_eq!(target_end_after(now, -5), now);
    }

    // -- remaining_at_pause --------------------------------------------------

    #[test]
    fn remaining_frozen_at_first_pause() {
        let pauses = [PauseWindow { started_at: t0() + mins(5), ended_at: None }];
        assert_eq!(remaining_at_pause(1_500_000, t0(), &pauses), 1_200_000);
    }

    #[test]
    fn remaining_subtracts_completed_pauses() {
        // Ran 5, paused 3, ran 4 more, paused again: 9 active minutes.
        let pauses = [
            PauseWindow { started_at: t0() + mins(5), ended_at: Some(t0() + mins(8)) },
            PauseWindow { started_at: t0() + mins(12), ended_at: None },
        ];
        assert_eq!(remaining_at_pause(1_500_000, t0(), &pauses), 16 * 60_000);
    }

    #[test]
    fn remaining_without_open_pause_is_full_plan() {
        let pauses = [PauseWindow { started_at: t0() + mins(5), ended_at: Some(t0() + mins(6)) }];
        assert_eq!(remaining_at_pause(1_500_000, t0(), &pauses), 1_500_000);
        assert_eq!(remaining_at_pause(1_500_000, t0(), &[]), 1_500_000);
    }

    #[test]
    fn remaining_never_negative() {
        let pauses = [PauseWindow { started_at: t0() + mins(40), ended_at: None }];
        assert_eq!(remaining_at_pause(1_500_000, t0(), &pauses), 0);
    }

    #[test]
    fn remaining_ignores_open_pause_before_start() {
        let pauses = [PauseWindow { started_at: t0() - mins(1), ended_at: None }];
        assert_eq!(remaining_at_pause(1_500_000, t0(), &pauses), 1_500_000);
    }

    #[test]
    fn remaining_uses_latest_open_pause() {
        let pauses = [
            PauseWindow { started_at: t0() + mins(2), ended_at: None },
            PauseWindow { started_at: t0() + mins(4), ended_at: None },
        ];
        assert_eq!(remaining_at_pause(1_500_000, t0(), &pauses), 21 * 60_000);
    }

    #[test]
    fn remaining_reflects_revised_plan() {
        let pauses = [PauseWindow { started_at: t0() + mins(5), ended_at: None }];
        let revised = planned_ms(Some(30), TimerMode::Focus);
        assert_eq!(remaining_at_pause(revised, t0(), &pauses), 25 * 60_000);
    }

    // -- elapsed_duration_minutes --------------------------------------------

    #[test]
    fn duration_counts_paused_time() {
        // 10 minutes paused + 15 minutes active.
        assert_eq!(elapsed_duration_minutes(t0(), t0() + mins(25)), 25);
    }

    #[test]
    fn duration_rounds_half_up() {
        let start = t0();
        assert_eq!(elapsed_duration_minutes(start, start + Duration::seconds(89)), 1);
        assert_eq!(elapsed_duration_minutes(start, start + Duration::seconds(90)), 2);
        assert_eq!(elapsed_duration_minutes(start, start + mins(18)), 18);
    }

    #[test]
    fn duration_is_at_least_one_minute() {
        assert_eq!(elapsed_duration_minutes(t0(), t0()), 1);
        assert_eq!(elapsed_duration_minutes(t0(), t0() - mins(3)), 1);
    }

    // -- validation ----------------------------------------------------------

    #[test]
    fn minutes_must_be_positive() {
        assert!(validate_minutes("plannedMinutes", 1).is_ok());
        assert_matches!(validate_minutes("plannedMinutes", 0), Err(CoreError::Validation(_)));
        assert_matches!(validate_minutes("plannedMinutes", -5), Err(CoreError::Validation(_)));
    }

    #[test]
    fn note_length_is_capped() {
        assert!(validate_note("deep work on chapter 3").is_ok());
        let long = "x".repeat(MAX_NOTE_LENGTH + 1);
        assert_matches!(validate_note(&long), Err(CoreError::Validation(_)));
    }
}
