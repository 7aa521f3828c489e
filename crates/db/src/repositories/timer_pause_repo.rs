//! Repository for the `timer_pauses` log.
//!
//! Write methods accept any [`PgExecutor`] so they can run on the pool or
//! inside the session transitions in [`FocusSessionRepo`](super::FocusSessionRepo).

use manifest_core::types::{DbId, RecordId, Timestamp};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::timer_pause::TimerPause;

/// Column list for `timer_pauses` queries.
const COLUMNS: &str = "id, session_id, user_id, started_at, ended_at, created_at";

/// Append and close operations on pause intervals.
pub struct TimerPauseRepo;

impl TimerPauseRepo {
    /// Append an open pause interval starting at `started_at`.
    pub async fn open<'e>(
        executor: impl PgExecutor<'e>,
        session_id: RecordId,
        user_id: DbId,
        started_at: Timestamp,
    ) -> Result<TimerPause, sqlx::Error> {
        let query = format!(
            "INSERT INTO timer_pauses (id, session_id, user_id, started_at)
             VALUES ($1, $2, $3, $4)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TimerPause>(&query)
            .bind(Uuid::new_v4())
            .bind(session_id)
            .bind(user_id)
            .bind(started_at)
            .fetch_one(executor)
            .await
    }

    /// Close the most recently started open pause of a session.
    ///
    /// Returns `None` when no pause is open.
    pub async fn close_latest_open<'e>(
        executor: impl PgExecutor<'e>,
        session_id: RecordId,
        ended_at: Timestamp,
    ) -> Result<Option<TimerPause>, sqlx::Error> {
        let query = format!(
            "UPDATE timer_pauses SET ended_at = $2
             WHERE id = (
                 SELECT id FROM timer_pauses
                 WHERE session_id = $1 AND ended_at IS NULL
                 ORDER BY started_at DESC
                 LIMIT 1
             )
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, TimerPause>(&query)
            .bind(session_id)
            .bind(ended_at)
            .fetch_optional(executor)
            .await
    }

    /// Close every open pause of a session at `ended_at` (clamped so an
    /// interval never ends before it started). Returns the count closed.
    pub async fn close_all_open<'e>(
        executor: impl PgExecutor<'e>,
        session_id: RecordId,
        ended_at: Timestamp,
    ) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE timer_pauses SET ended_at = GREATEST(started_at, $2)
             WHERE session_id = $1 AND ended_at IS NULL",
        )
        .bind(session_id)
        .bind(ended_at)
        .execute(executor)
        .await?;
        Ok(result.rows_affected())
    }

    /// All pauses of one session, oldest first.
    pub async fn list_for_session<'e>(
        executor: impl PgExecutor<'e>,
        session_id: RecordId,
    ) -> Result<Vec<TimerPause>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM timer_pauses
             WHERE session_id = $1
             ORDER BY started_at ASC"
        );
        sqlx::query_as::<_, TimerPause>(&query)
            .bind(session_id)
            .fetch_all(executor)
            .await
    }

    /// All pauses of several sessions, oldest first.
    pub async fn list_for_sessions(
        pool: &PgPool,
        session_ids: &[RecordId],
    ) -> Result<Vec<TimerPause>, sqlx::Error> {
        if session_ids.is_empty() {
            return Ok(Vec::new());
        }
        let query = format!(
            "SELECT {COLUMNS} FROM timer_pauses
             WHERE session_id = ANY($1)
             ORDER BY started_at ASC"
        );
        sqlx::query_as::<_, TimerPause>(&query)
            .bind(session_ids)
            .fetch_all(pool)
            .await
    }
}
