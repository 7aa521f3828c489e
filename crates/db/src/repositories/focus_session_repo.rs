//! Repository for the `focus_sessions` table.
//!
//! Pause, resume, stop and field updates are state transitions: each runs in
//! one transaction that first locks the session row (`SELECT ... FOR UPDATE`,
//! scoped to the owner) and then writes the session and its logs. Two
//! concurrent transitions on the same session therefore serialize instead of
//! interleaving.

use manifest_core::focus_timer::{elapsed_duration_minutes, SessionPhase};
use manifest_core::types::{DbId, RecordId, Timestamp};
use sqlx::{PgExecutor, PgPool};
use uuid::Uuid;

use crate::models::focus_session::{
    CreateFocusSession, FocusSession, FocusSessionFilter, UpdateFocusSession,
};
use crate::models::timer_pause::TimerPause;
use crate::models::timer_stop::TimerStop;
use crate::repositories::{TimerPauseRepo, TimerStopRepo};

/// Column list for `focus_sessions` queries.
const COLUMNS: &str = "id, user_id, mode, start_at, end_at, planned_minutes, \
    duration_minutes, target_end, note, created_at, updated_at";

/// Result of a locked state transition.
#[derive(Debug)]
pub enum Transition<T> {
    /// The transition was written.
    Applied(T),
    /// No session with that id belongs to the user.
    NotFound,
    /// The session exists but its phase does not allow the transition.
    Rejected(SessionPhase),
}

/// Provides persistence and state transitions for focus sessions.
pub struct FocusSessionRepo;

impl FocusSessionRepo {
    /// Insert a new session for `user_id`, returning the created row.
    pub async fn create(
        pool: &PgPool,
        user_id: DbId,
        input: &CreateFocusSession,
    ) -> Result<FocusSession, sqlx::Error> {
        let query = format!(
            "INSERT INTO focus_sessions
                (id, user_id, mode, start_at, end_at, planned_minutes, duration_minutes, target_end, note)
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, FocusSession>(&query)
            .bind(Uuid::new_v4())
            .bind(user_id)
            .bind(input.mode.as_str())
            .bind(input.start_at)
            .bind(input.end_at)
            .bind(input.planned_minutes)
            .bind(input.duration_minutes)
            .bind(input.target_end)
            .bind(&input.note)
            .fetch_one(pool)
            .await
    }

    /// The user's most recently started session that has not been stopped.
    pub async fn find_active_for_user(
        pool: &PgPool,
        user_id: DbId,
    ) -> Result<Option<FocusSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM focus_sessions
             WHERE user_id = $1 AND end_at IS NULL
             ORDER BY start_at DESC
             LIMIT 1"
        );
        sqlx::query_as::<_, FocusSession>(&query)
            .bind(user_id)
            .fetch_optional(pool)
            .await
    }

    /// List a user's sessions, newest start first.
    pub async fn list_for_user(
        pool: &PgPool,
        user_id: DbId,
        filter: &FocusSessionFilter,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<FocusSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM focus_sessions
             WHERE user_id = $1
               AND ($2::TEXT IS NULL OR mode = $2)
               AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3)
               AND ($4::TIMESTAMPTZ IS NULL OR created_at <= $4)
             ORDER BY start_at DESC
             LIMIT $5 OFFSET $6"
        );
        sqlx::query_as::<_, FocusSession>(&query)
            .bind(user_id)
            .bind(filter.mode.map(|m| m.as_str()))
            .bind(filter.created_from)
            .bind(filter.created_to)
            .bind(limit)
            .bind(offset)
            .fetch_all(pool)
            .await
    }

    /// Count a user's sessions matching `filter`.
    pub async fn count_for_user(
        pool: &PgPool,
        user_id: DbId,
        filter: &FocusSessionFilter,
    ) -> Result<i64, sqlx::Error> {
        let row: (i64,) = sqlx::query_as(
            "SELECT COUNT(*) FROM focus_sessions
             WHERE user_id = $1
               AND ($2::TEXT IS NULL OR mode = $2)
               AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3)
               AND ($4::TIMESTAMPTZ IS NULL OR created_at <= $4)",
        )
        .bind(user_id)
        .bind(filter.mode.map(|m| m.as_str()))
        .bind(filter.created_from)
        .bind(filter.created_to)
        .fetch_one(pool)
        .await?;
        Ok(row.0)
    }

    /// Pause a running session: append an open pause and clear `target_end`.
    pub async fn pause(
        pool: &PgPool,
        user_id: DbId,
        id: RecordId,
        started_at: Timestamp,
    ) -> Result<Transition<TimerPause>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(session) = Self::lock_for_user(&mut *tx, id, user_id).await? else {
            return Ok(Transition::NotFound);
        };
        let phase = session.phase();
        if phase != SessionPhase::Running {
            return Ok(Transition::Rejected(phase));
        }

        let pause = TimerPauseRepo::open(&mut *tx, id, user_id, started_at).await?;

        sqlx::query("UPDATE focus_sessions SET target_end = NULL WHERE id = $1")
            .bind(id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Transition::Applied(pause))
    }

    /// Resume a session: close its latest open pause and, when given, write
    /// the new `target_end`. The caller computes `target_end`.
    pub async fn resume(
        pool: &PgPool,
        user_id: DbId,
        id: RecordId,
        ended_at: Timestamp,
        target_end: Option<Timestamp>,
    ) -> Result<Transition<FocusSession>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(session) = Self::lock_for_user(&mut *tx, id, user_id).await? else {
            return Ok(Transition::NotFound);
        };
        let phase = session.phase();
        if phase == SessionPhase::Stopped {
            return Ok(Transition::Rejected(phase));
        }

        let closed = TimerPauseRepo::close_latest_open(&mut *tx, id, ended_at).await?;
        if closed.is_none() {
            tracing::debug!(session_id = %id, "Resume found no open pause");
        }

        let query = format!(
            "UPDATE focus_sessions SET target_end = COALESCE($2, target_end)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, FocusSession>(&query)
            .bind(id)
            .bind(target_end)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Transition::Applied(updated))
    }

    /// Stop a session: append a stop event, close any open pause, and write
    /// `end_at` plus the wall-clock `duration_minutes`.
    ///
    /// Stopping an already stopped session is accepted and overwrites the
    /// previous end time and duration.
    pub async fn stop(
        pool: &PgPool,
        user_id: DbId,
        id: RecordId,
        stopped_at: Timestamp,
    ) -> Result<Transition<(FocusSession, TimerStop)>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(session) = Self::lock_for_user(&mut *tx, id, user_id).await? else {
            return Ok(Transition::NotFound);
        };
        if session.phase() == SessionPhase::Stopped {
            tracing::warn!(session_id = %id, "Stopping an already stopped session");
        }

        let stop = TimerStopRepo::record(&mut *tx, id, user_id, stopped_at).await?;
        TimerPauseRepo::close_all_open(&mut *tx, id, stopped_at).await?;

        let duration = elapsed_duration_minutes(session.start_at, stopped_at);
        let query = format!(
            "UPDATE focus_sessions SET end_at = $2, duration_minutes = $3
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, FocusSession>(&query)
            .bind(id)
            .bind(stopped_at)
            .bind(duration)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Transition::Applied((updated, stop)))
    }

    /// Merge the supplied editable fields into an active session.
    /// `target_end` is never touched.
    pub async fn update_fields(
        pool: &PgPool,
        user_id: DbId,
        id: RecordId,
        input: &UpdateFocusSession,
    ) -> Result<Transition<FocusSession>, sqlx::Error> {
        let mut tx = pool.begin().await?;

        let Some(session) = Self::lock_for_user(&mut *tx, id, user_id).await? else {
            return Ok(Transition::NotFound);
        };
        let phase = session.phase();
        if phase == SessionPhase::Stopped {
            return Ok(Transition::Rejected(phase));
        }

        let query = format!(
            "UPDATE focus_sessions SET
                note = CASE WHEN $2 THEN $3 ELSE note END,
                planned_minutes = COALESCE($4, planned_minutes)
             WHERE id = $1
             RETURNING {COLUMNS}"
        );
        let updated = sqlx::query_as::<_, FocusSession>(&query)
            .bind(id)
            .bind(input.note.is_some())
            .bind(input.note.clone().flatten())
            .bind(input.planned_minutes)
            .fetch_one(&mut *tx)
            .await?;

        tx.commit().await?;
        Ok(Transition::Applied(updated))
    }

    /// Lock a user's session row for the rest of the transaction.
    async fn lock_for_user<'e>(
        executor: impl PgExecutor<'e>,
        id: RecordId,
        user_id: DbId,
    ) -> Result<Option<FocusSession>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM focus_sessions
             WHERE id = $1 AND user_id = $2
             FOR UPDATE"
        );
        sqlx::query_as::<_, FocusSession>(&query)
            .bind(id)
            .bind(user_id)
            .fetch_optional(executor)
            .await
    }
}
