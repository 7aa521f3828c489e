//! Handlers for focus timer sessions.
//!
//! The server keeps no timer in memory. Each request reads or writes the
//! session row and its pause/stop logs; the client derives its countdown
//! from the returned timestamps.

use std::collections::HashMap;

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use serde::{Deserialize, Deserializer, Serialize};

use manifest_core::error::CoreError;
use manifest_core::focus_timer::{
    elapsed_duration_minutes, planned_ms, remaining_at_pause, target_end_after, validate_minutes,
    validate_note, SessionPhase, TimerMode,
};
use manifest_core::listing::{
    clamp_limit, clamp_page, created_range, page_offset, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT,
};
use manifest_core::timer_events::{PauseEntry, StopEntry};
use manifest_core::types::{DbId, RecordId, Timestamp};
use manifest_db::models::focus_session::{
    CreateFocusSession, FocusSession, FocusSessionFilter, UpdateFocusSession,
};
use manifest_db::models::timer_pause::TimerPause;
use manifest_db::models::timer_stop::TimerStop;
use manifest_db::repositories::{FocusSessionRepo, TimerPauseRepo, TimerStopRepo, Transition};

use crate::error::{AppError, AppResult};
use crate::middleware::auth::AuthUser;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSessionRequest {
    pub start_at: Option<Timestamp>,
    pub note: Option<String>,
    pub planned_minutes: Option<i32>,
    pub target_end: Option<Timestamp>,
    pub mode: Option<TimerMode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseSessionRequest {
    pub session_id: Option<String>,
    pub started_at: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResumeSessionRequest {
    pub session_id: Option<String>,
    pub ended_at: Option<Timestamp>,
    pub target_end: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopSessionRequest {
    pub session_id: Option<String>,
    pub stopped_at: Option<Timestamp>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateSessionRequest {
    pub session_id: Option<String>,
    /// Absent leaves the note alone; `null` clears it.
    #[serde(default, deserialize_with = "present")]
    pub note: Option<Option<String>>,
    /// `null` is treated as absent.
    pub planned_minutes: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordSessionRequest {
    pub start_at: Option<Timestamp>,
    pub end_at: Option<Timestamp>,
    pub duration_minutes: Option<i32>,
    pub note: Option<String>,
    pub mode: Option<TimerMode>,
}

/// Query parameters for `GET /timer`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListSessionsParams {
    pub mode: Option<String>,
    pub created_from: Option<String>,
    pub created_to: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

/// Distinguishes a field sent as `null` from a missing one.
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ---------------------------------------------------------------------------
// Response bodies
// ---------------------------------------------------------------------------

#[derive(Debug, Serialize)]
pub struct SessionResponse {
    pub session: FocusSession,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseBody {
    pub id: RecordId,
    pub session_id: RecordId,
    pub start_at: Timestamp,
    pub end_at: Option<Timestamp>,
}

impl From<TimerPause> for PauseBody {
    fn from(pause: TimerPause) -> Self {
        Self {
            id: pause.id,
            session_id: pause.session_id,
            start_at: pause.started_at,
            end_at: pause.ended_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PauseResponse {
    pub pause: PauseBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StopBody {
    pub id: RecordId,
    pub session_id: RecordId,
    pub stopped_at: Timestamp,
}

impl From<TimerStop> for StopBody {
    fn from(stop: TimerStop) -> Self {
        Self {
            id: stop.id,
            session_id: stop.session_id,
            stopped_at: stop.stopped_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct StopResponse {
    pub session: FocusSession,
    pub stop: StopBody,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EditableFields {
    pub id: RecordId,
    pub note: Option<String>,
    pub planned_minutes: Option<i32>,
}

#[derive(Debug, Serialize)]
pub struct UpdateResponse {
    pub session: EditableFields,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveResponse {
    pub session: Option<FocusSession>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remaining_ms: Option<i64>,
}

/// A session together with its pause and stop history.
#[derive(Debug, Serialize)]
pub struct SessionWithHistory {
    #[serde(flatten)]
    pub session: FocusSession,
    pub pauses: Vec<PauseEntry>,
    pub stops: Vec<StopEntry>,
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub sessions: Vec<SessionWithHistory>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Parse the required `sessionId` body field.
fn parse_session_id(raw: Option<&str>) -> AppResult<RecordId> {
    let raw = raw
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or_else(|| AppError::BadRequest("sessionId is required".into()))?;
    raw.parse::<RecordId>()
        .map_err(|_| AppError::BadRequest(format!("sessionId '{raw}' is not a valid id")))
}

/// Map a repository transition outcome onto the HTTP error taxonomy.
///
/// Sessions owned by someone else surface as `NotFound`, the same as
/// sessions that do not exist.
fn applied<T>(outcome: Transition<T>, id: RecordId, action: &str) -> AppResult<T> {
    match outcome {
        Transition::Applied(value) => Ok(value),
        Transition::NotFound => Err(AppError::Core(CoreError::NotFound {
            entity: "FocusSession",
            id: id.to_string(),
        })),
        Transition::Rejected(phase) => Err(AppError::Core(CoreError::Conflict(format!(
            "Cannot {action} a {phase} session"
        )))),
    }
}

fn validate_optional_note(note: Option<&str>) -> AppResult<()> {
    if let Some(note) = note {
        validate_note(note)?;
    }
    Ok(())
}

/// Remaining milliseconds for a paused session, or `None` when the pause
/// log cannot be read.
async fn paused_remaining_ms(state: &AppState, session: &FocusSession) -> Option<i64> {
    match TimerPauseRepo::list_for_session(&state.pool, session.id).await {
        Ok(pauses) => {
            let windows: Vec<_> = pauses.iter().map(TimerPause::window).collect();
            let planned = planned_ms(session.planned_minutes, session.timer_mode());
            Some(remaining_at_pause(planned, session.start_at, &windows))
        }
        Err(e) => {
            tracing::warn!(session_id = %session.id, error = %e, "Failed to read pause log");
            None
        }
    }
}

fn group_by_session<T>(
    rows: Vec<T>,
    session_id: impl Fn(&T) -> RecordId,
) -> HashMap<RecordId, Vec<T>> {
    let mut grouped: HashMap<RecordId, Vec<T>> = HashMap::new();
    for row in rows {
        grouped.entry(session_id(&row)).or_default().push(row);
    }
    grouped
}

// ---------------------------------------------------------------------------
// Handlers
// ---------------------------------------------------------------------------

/// POST /timer/start
///
/// Create a running session. `targetEnd` defaults to `startAt` plus the
/// planned (or mode default) minutes. An older active session is left as
/// it is.
pub async fn start_session(
    auth: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<StartSessionRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = body?;

    if let Some(minutes) = input.planned_minutes {
        validate_minutes("plannedMinutes", minutes)?;
    }
    validate_optional_note(input.note.as_deref())?;

    let mode = input.mode.unwrap_or_default();
    let start_at = input.start_at.unwrap_or_else(Utc::now);
    let target_end = input
        .target_end
        .unwrap_or_else(|| target_end_after(start_at, planned_ms(input.planned_minutes, mode)));

    let create = CreateFocusSession {
        mode,
        start_at,
        planned_minutes: input.planned_minutes,
        target_end: Some(target_end),
        note: input.note,
        end_at: None,
        duration_minutes: None,
    };
    let session = FocusSessionRepo::create(&state.pool, auth.user_id, &create).await?;

    tracing::info!(
        user_id = auth.user_id,
        session_id = %session.id,
        mode = %mode,
        "Focus session started",
    );

    Ok((StatusCode::CREATED, Json(SessionResponse { session })))
}

/// POST /timer/pause
///
/// Open a pause interval on a running session and clear its `targetEnd`.
pub async fn pause_session(
    auth: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<PauseSessionRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = body?;
    let id = parse_session_id(input.session_id.as_deref())?;
    let started_at = input.started_at.unwrap_or_else(Utc::now);

    let outcome = FocusSessionRepo::pause(&state.pool, auth.user_id, id, started_at).await?;
    let pause = applied(outcome, id, "pause")?;

    tracing::info!(user_id = auth.user_id, session_id = %id, "Focus session paused");

    Ok(Json(PauseResponse {
        pause: pause.into(),
    }))
}

/// POST /timer/resume
///
/// Close the latest open pause. `targetEnd` is written only when the client
/// sends it.
pub async fn resume_session(
    auth: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<ResumeSessionRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = body?;
    let id = parse_session_id(input.session_id.as_deref())?;
    let ended_at = input.ended_at.unwrap_or_else(Utc::now);

    let outcome =
        FocusSessionRepo::resume(&state.pool, auth.user_id, id, ended_at, input.target_end)
            .await?;
    let session = applied(outcome, id, "resume")?;

    tracing::info!(user_id = auth.user_id, session_id = %id, "Focus session resumed");

    Ok(Json(SessionResponse { session }))
}

/// POST /timer/stop
///
/// Finalize a session. A repeated stop overwrites the earlier end time.
pub async fn stop_session(
    auth: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<StopSessionRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = body?;
    let id = parse_session_id(input.session_id.as_deref())?;
    let stopped_at = input.stopped_at.unwrap_or_else(Utc::now);

    let outcome = FocusSessionRepo::stop(&state.pool, auth.user_id, id, stopped_at).await?;
    let (session, stop) = applied(outcome, id, "stop")?;

    tracing::info!(
        user_id = auth.user_id,
        session_id = %id,
        duration_minutes = session.duration_minutes,
        "Focus session stopped",
    );

    Ok(Json(StopResponse {
        session,
        stop: stop.into(),
    }))
}

/// POST /timer/update
///
/// Merge `note` and/or `plannedMinutes` into an active session.
pub async fn update_session(
    auth: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<UpdateSessionRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = body?;
    let id = parse_session_id(input.session_id.as_deref())?;

    let update = UpdateFocusSession {
        note: input.note,
        planned_minutes: input.planned_minutes,
    };
    if update.is_empty() {
        return Err(AppError::BadRequest(
            "At least one of note or plannedMinutes is required".into(),
        ));
    }
    if let Some(minutes) = update.planned_minutes {
        validate_minutes("plannedMinutes", minutes)?;
    }
    validate_optional_note(update.note.as_ref().and_then(|n| n.as_deref()))?;

    let outcome = FocusSessionRepo::update_fields(&state.pool, auth.user_id, id, &update).await?;
    let session = applied(outcome, id, "update")?;

    tracing::info!(user_id = auth.user_id, session_id = %id, "Focus session updated");

    Ok(Json(UpdateResponse {
        session: EditableFields {
            id: session.id,
            note: session.note,
            planned_minutes: session.planned_minutes,
        },
    }))
}

/// GET /timer/active
///
/// The caller's most recent active session. `remainingMs` accompanies a
/// paused session only.
pub async fn get_active_session(
    auth: AuthUser,
    State(state): State<AppState>,
) -> AppResult<impl IntoResponse> {
    let Some(session) = FocusSessionRepo::find_active_for_user(&state.pool, auth.user_id).await?
    else {
        return Ok(Json(ActiveResponse {
            session: None,
            remaining_ms: None,
        }));
    };

    match session.phase() {
        SessionPhase::Running => {
            if state.config.timer.auto_expire {
                if let Some(target_end) = session.target_end.filter(|t| *t <= Utc::now()) {
                    expire_session(&state, auth.user_id, session.id, target_end).await?;
                    return Ok(Json(ActiveResponse {
                        session: None,
                        remaining_ms: None,
                    }));
                }
            }
            Ok(Json(ActiveResponse {
                session: Some(session),
                remaining_ms: None,
            }))
        }
        SessionPhase::Paused => {
            let remaining_ms = paused_remaining_ms(&state, &session).await;
            Ok(Json(ActiveResponse {
                session: Some(session),
                remaining_ms,
            }))
        }
        // The active query filters on `end_at IS NULL`.
        SessionPhase::Stopped => Ok(Json(ActiveResponse {
            session: None,
            remaining_ms: None,
        })),
    }
}

/// Stop a running session whose countdown already ran out, at its target end.
async fn expire_session(
    state: &AppState,
    user_id: DbId,
    id: RecordId,
    target_end: Timestamp,
) -> AppResult<()> {
    let outcome = FocusSessionRepo::stop(&state.pool, user_id, id, target_end).await?;
    applied(outcome, id, "stop")?;
    tracing::info!(user_id, session_id = %id, %target_end, "Expired focus session stopped");
    Ok(())
}

/// GET /timer?mode=&createdFrom=&createdTo=&page=&limit=
///
/// Paginated history, newest first, each session with its pauses and stops.
pub async fn list_sessions(
    auth: AuthUser,
    State(state): State<AppState>,
    params: Result<Query<ListSessionsParams>, QueryRejection>,
) -> AppResult<impl IntoResponse> {
    let Query(params) = params?;

    let (created_from, created_to) =
        created_range(params.created_from.as_deref(), params.created_to.as_deref())?;
    let filter = FocusSessionFilter {
        // Unknown modes are ignored rather than rejected.
        mode: params.mode.as_deref().and_then(|m| TimerMode::parse(m).ok()),
        created_from,
        created_to,
    };
    let page = clamp_page(params.page);
    let limit = clamp_limit(params.limit, DEFAULT_PAGE_LIMIT, MAX_PAGE_LIMIT);

    let sessions = FocusSessionRepo::list_for_user(
        &state.pool,
        auth.user_id,
        &filter,
        limit,
        page_offset(page, limit),
    )
    .await?;
    let total = FocusSessionRepo::count_for_user(&state.pool, auth.user_id, &filter).await?;

    let ids: Vec<RecordId> = sessions.iter().map(|s| s.id).collect();

    let pauses = TimerPauseRepo::list_for_sessions(&state.pool, &ids)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(user_id = auth.user_id, error = %e, "Failed to read pause history");
            Vec::new()
        });
    let stops = TimerStopRepo::list_for_sessions(&state.pool, &ids)
        .await
        .unwrap_or_else(|e| {
            tracing::warn!(user_id = auth.user_id, error = %e, "Failed to read stop history");
            Vec::new()
        });

    let mut pauses = group_by_session(pauses, |p| p.session_id);
    let mut stops = group_by_session(stops, |s| s.session_id);

    let sessions = sessions
        .into_iter()
        .map(|session| {
            let pauses = pauses
                .remove(&session.id)
                .unwrap_or_default()
                .iter()
                .map(TimerPause::to_entry)
                .collect();
            let stops = stops
                .remove(&session.id)
                .unwrap_or_default()
                .iter()
                .map(TimerStop::to_entry)
                .collect();
            SessionWithHistory {
                session,
                pauses,
                stops,
            }
        })
        .collect();

    Ok(Json(ListResponse {
        sessions,
        page,
        limit,
        total,
    }))
}

/// POST /timer
///
/// Save an already completed session in one call. Missing times default to
/// now; a missing duration is derived from the two times.
pub async fn record_session(
    auth: AuthUser,
    State(state): State<AppState>,
    body: Result<Json<RecordSessionRequest>, JsonRejection>,
) -> AppResult<impl IntoResponse> {
    let Json(input) = body?;

    let now = Utc::now();
    let start_at = input.start_at.unwrap_or(now);
    let end_at = input.end_at.unwrap_or(now);
    if end_at < start_at {
        return Err(AppError::BadRequest("endAt must not be before startAt".into()));
    }
    if let Some(minutes) = input.duration_minutes {
        validate_minutes("durationMinutes", minutes)?;
    }
    validate_optional_note(input.note.as_deref())?;

    let duration_minutes = input
        .duration_minutes
        .unwrap_or_else(|| elapsed_duration_minutes(start_at, end_at));

    let create = CreateFocusSession {
        mode: input.mode.unwrap_or_default(),
        start_at,
        planned_minutes: None,
        target_end: None,
        note: input.note,
        end_at: Some(end_at),
        duration_minutes: Some(duration_minutes),
    };
    let session = FocusSessionRepo::create(&state.pool, auth.user_id, &create).await?;

    tracing::info!(
        user_id = auth.user_id,
        session_id = %session.id,
        duration_minutes,
        "Completed focus session recorded",
    );

    Ok((StatusCode::CREATED, Json(SessionResponse { session })))
}
