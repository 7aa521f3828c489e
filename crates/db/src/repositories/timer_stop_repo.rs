//! Repository for the `timer_stops` log.

use manifest_core::types::{DbId, RecordId, Timestamp};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::timer_stop::TimerStop;

/// Column list for `timer_stops` queries.
const COLUMNS: &str = "id, session_id, user_id, stopped_at, created_at";

/// Append and read operations on stop events.
pub struct TimerStopRepo;

impl TimerStopRepo {
    /// Append a stop event.
    pub async fn record<'e>(
        executor: impl PgExecutor<'e>,
        session_id: RecordId,
        user_id: DbId,
        stopped_at: Timestamp,
    ) -> Result<TimerStop, sqlx::Error> {
        let query = format!(
            "INSERT INTO timer_stops (id, session_id, user_id, stopped_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TimerStop>(&query)
            .bind(Uuid::new_v4())
            .bind(session_id)
            .bind(user_id)
            .bind(stopped_at)
            .fetch_one(executor)
            .await
    }

    /// All stops of several sessions, oldest first.
    pub async fn list_for_sessions(
        pool: &PgPool,
        session_ids: &[RecordId],
    ) -> Result<Vec<TimerStop>, sqlx::Error> {
        if session_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM timer_stops
             WHERE session_id = ANY($1)
             ORDER BY stopped_at ASC"
        );
        sqlx::query_as::<_, TimerStop>(&query)
            .bind(session_ids)
            .fetch_all(pool)
            .await
    }
}
