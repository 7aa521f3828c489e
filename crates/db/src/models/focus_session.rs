//! Focus session model.

use manifest_core::focus_timer::{SessionPhase, TimerMode};
use manifest_core::types::{DbId, RecordId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `focus_sessions` table.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct FocusSession {
    pub id: RecordId,
    pub user_id: DbId,
    pub mode: String,
    pub start_at: Timestamp,
    pub end_at: Option<Timestamp>,
    pub planned_minutes: Option<i32>,
    pub duration_minutes: Option<i32>,
    pub target_end: Option<Timestamp>,
    pub note: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

impl FocusSession {
    pub fn phase(&self) -> SessionPhase {
        SessionPhase::of(self.end_at, self.target_end)
    }

    /// The session's mode. The column is constrained to known values, so an
    /// unparseable value can only come from manual edits; treat it as focus.
    pub fn timer_mode(&self) -> TimerMode {
        TimerMode::parse(&self.mode).unwrap_or_default()
    }
}

/// Fully resolved input for inserting a session.
///
/// Defaults (start time, mode, target end) are applied by the caller.
#[derive(Debug, Clone)]
pub struct CreateFocusSession {
    pub mode: TimerMode,
    pub start_at: Timestamp,
    pub planned_minutes: Option<i32>,
    pub target_end: Option<Timestamp>,
    pub note: Option<String>,
    /// Only set when recording an already completed session.
    pub end_at: Option<Timestamp>,
    pub duration_minutes: Option<i32>,
}

/// Partial update of the user-editable fields.
#[derive(Debug, Clone, Default)]
pub struct UpdateFocusSession {
    /// `Some(None)` clears the note.
    pub note: Option<Option<String>>,
    pub planned_minutes: Option<i32>,
}

impl UpdateFocusSession {
    pub fn is_empty(&self) -> bool {
        self.note.is_none() && self.planned_minutes.is_none()
    }
}

/// Filters for listing a user's sessions.
#[derive(Debug, Clone, Default)]
pub struct FocusSessionFilter {
    pub mode: Option<TimerMode>,
    pub created_from: Option<Timestamp>,
    pub created_to: Option<Timestamp>,
}
