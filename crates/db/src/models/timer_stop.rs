//! Stop event model.

use manifest_core::timer_events::StopEntry;
use manifest_core::types::{DbId, RecordId, Timestamp};
use serde::Serialize;
use sqlx::FromRow;

/// A row from the `timer_stops` table.
#[derive(Debug, Clone, Serialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct TimerStop {
    pub id: RecordId,
    pub session_id: RecordId,
    pub user_id: DbId,
    pub stopped_at: Timestamp,
    pub created_at: Timestamp,
}

impl TimerStop {
    pub fn to_entry(&self) -> StopEntry {
        StopEntry {
            id: self.id,
            stop_at: self.stopped_at,
        }
    }
}
