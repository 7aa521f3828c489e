//! Pause interval model.

use manifest_core::focus_timer::PauseWindow;
use manifest_core::timer_events::PauseEntry;
use manifest_core::types::{DbId, RecordId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `timer_pauses` table. `ended_at` is null while open.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TimerPause {
    pub id: RecordId,
    pub session_id: RecordId,
    pub user_id: DbId,
    pub started_at: Timestamp,
    pub ended_at: Option<Timestamp>,
    pub created_at: Timestamp,
}

impl TimerPause {
    pub fn is_open(&self) -> bool {
        self.ended_at.is_none()
    }

    pub fn window(&self) -> PauseWindow {
        PauseWindow {
            started_at: self.started_at,
            ended_at: self.ended_at,
        }
    }

    pub fn to_entry(&self) -> PauseEntry {
        PauseEntry {
            id: self.id,
            start_at: self.started_at,
            end_at: self.ended_at,
        }
    }
}
