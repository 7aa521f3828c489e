//! HTTP-level integration tests for the `/timer` endpoints.
//!
//! Requests go straight to the router through `tower::ServiceExt::oneshot`.
//! Times are sent explicitly so the countdown arithmetic is deterministic.

mod common;

use axum::http::StatusCode;
use chrono::{DateTime, Duration, SubsecRound, Utc};
use common::{
    body_json, build_auto_expire_app, build_test_app, get, get_auth, post_json, post_json_auth,
    post_raw_auth,
};
use serde_json::{json, Value};
use sqlx::PgPool;

const OWNER: i64 = 7;
const STRANGER: i64 = 8;

fn ts(value: &Value) -> DateTime<Utc> {
    value
        .as_str()
        .expect("timestamp should be a string")
        .parse()
        .expect("timestamp should be RFC 3339")
}

fn minutes(n: i64) -> Duration {
    Duration::minutes(n)
}

/// Start a 25-minute focus session at `t0` and return its id.
async fn start_at(pool: &PgPool, t0: DateTime<Utc>) -> String {
    let response = post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/timer/start",
        json!({
            "plannedMinutes": 25,
            "mode": "focus",
            "startAt": t0.to_rfc3339(),
            "targetEnd": (t0 + minutes(25)).to_rfc3339(),
        }),
        OWNER,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    json["session"]["id"].as_str().unwrap().to_string()
}

// ---------------------------------------------------------------------------
// Test: Scenarios A-D, start -> pause -> resume -> stop
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn full_lifecycle_reconciles_remaining_time(pool: PgPool) {
    let t0 = Utc::now().trunc_subsecs(0) - minutes(8);

    // A: running, target end 25 minutes out.
    let id = start_at(&pool, t0).await;
    let json = body_json(get_auth(build_test_app(pool.clone()), "/api/v1/timer/active", OWNER).await).await;
    assert_eq!(json["session"]["id"], id);
    assert_eq!(ts(&json["session"]["targetEnd"]), t0 + minutes(25));
    assert!(json.get("remainingMs").is_none());

    // B: paused at T0+5m, 20 minutes left regardless of how long the pause lasts.
    let response = post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/timer/pause",
        json!({ "sessionId": id, "startedAt": (t0 + minutes(5)).to_rfc3339() }),
        OWNER,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["pause"]["sessionId"], id);
    assert_eq!(ts(&json["pause"]["startAt"]), t0 + minutes(5));
    assert!(json["pause"]["endAt"].is_null());

    let json = body_json(get_auth(build_test_app(pool.clone()), "/api/v1/timer/active", OWNER).await).await;
    assert!(json["session"]["targetEnd"].is_null());
    assert_eq!(json["remainingMs"], 1_200_000);

    // C: resumed at T0+8m with the client-computed target end.
    let resumed_at = t0 + minutes(8);
    let response = post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/timer/resume",
        json!({
            "sessionId": id,
            "endedAt": resumed_at.to_rfc3339(),
            "targetEnd": (resumed_at + minutes(20)).to_rfc3339(),
        }),
        OWNER,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(ts(&json["session"]["targetEnd"]), t0 + minutes(28));

    let json = body_json(get_auth(build_test_app(pool.clone()), "/api/v1/timer/active", OWNER).await).await;
    let remaining = (ts(&json["session"]["targetEnd"]) - resumed_at).num_milliseconds();
    assert_eq!(remaining, 1_200_000);

    // D: stopped 10 minutes after resuming; duration is wall-clock time.
    let response = post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/timer/stop",
        json!({ "sessionId": id, "stoppedAt": (t0 + minutes(18)).to_rfc3339() }),
        OWNER,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["session"]["durationMinutes"], 18);
    assert_eq!(ts(&json["stop"]["stoppedAt"]), t0 + minutes(18));
    assert_eq!(json["stop"]["sessionId"], id);

    let json = body_json(get_auth(build_test_app(pool), "/api/v1/timer/active", OWNER).await).await;
    assert!(json["session"].is_null());
}

// ---------------------------------------------------------------------------
// Test: start defaults
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn start_without_body_fields_defaults_to_focus_running(pool: PgPool) {
    let response =
        post_json_auth(build_test_app(pool), "/api/v1/timer/start", json!({}), OWNER).await;
    assert_eq!(response.status(), StatusCode::CREATED);

    let json = body_json(response).await;
    let session = &json["session"];
    assert_eq!(session["mode"], "focus");
    assert!(session["endAt"].is_null());
    let planned = ts(&session["targetEnd"]) - ts(&session["startAt"]);
    assert_eq!(planned, minutes(25));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn start_break_uses_break_default(pool: PgPool) {
    let response = post_json_auth(
        build_test_app(pool),
        "/api/v1/timer/start",
        json!({ "mode": "break" }),
        OWNER,
    )
    .await;
    let json = body_json(response).await;
    let planned = ts(&json["session"]["targetEnd"]) - ts(&json["session"]["startAt"]);
    assert_eq!(planned, minutes(5));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn start_rejects_non_positive_minutes(pool: PgPool) {
    let response = post_json_auth(
        build_test_app(pool),
        "/api/v1/timer/start",
        json!({ "plannedMinutes": 0 }),
        OWNER,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "VALIDATION_ERROR");
}

// ---------------------------------------------------------------------------
// Test: auth and input errors
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn requests_without_token_are_unauthorized(pool: PgPool) {
    let response = get(build_test_app(pool.clone()), "/api/v1/timer/active").await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let response = post_json(build_test_app(pool), "/api/v1/timer/start", json!({})).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    let json = body_json(response).await;
    assert_eq!(json["code"], "UNAUTHORIZED");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn missing_session_id_is_bad_request(pool: PgPool) {
    for uri in ["/api/v1/timer/pause", "/api/v1/timer/resume", "/api/v1/timer/stop"] {
        let response = post_json_auth(build_test_app(pool.clone()), uri, json!({}), OWNER).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
    }
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn malformed_json_is_bad_request(pool: PgPool) {
    let response = post_raw_auth(
        build_test_app(pool),
        "/api/v1/timer/pause",
        "{ not json".to_string(),
        OWNER,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn other_owners_session_is_not_found(pool: PgPool) {
    let id = start_at(&pool, Utc::now().trunc_subsecs(0)).await;

    let response = post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/timer/pause",
        json!({ "sessionId": id }),
        STRANGER,
    )
    .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let json = body_json(get_auth(build_test_app(pool), "/api/v1/timer/active", STRANGER).await).await;
    assert!(json["session"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn double_pause_is_conflict(pool: PgPool) {
    let id = start_at(&pool, Utc::now().trunc_subsecs(0)).await;

    let first = post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/timer/pause",
        json!({ "sessionId": id }),
        OWNER,
    )
    .await;
    assert_eq!(first.status(), StatusCode::OK);

    let second = post_json_auth(
        build_test_app(pool),
        "/api/v1/timer/pause",
        json!({ "sessionId": id }),
        OWNER,
    )
    .await;
    assert_eq!(second.status(), StatusCode::CONFLICT);
    let json = body_json(second).await;
    assert_eq!(json["error"], "Cannot pause a paused session");
}

// ---------------------------------------------------------------------------
// Test: update-fields
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_merges_fields_and_keeps_target_end(pool: PgPool) {
    let t0 = Utc::now().trunc_subsecs(0);
    let id = start_at(&pool, t0).await;

    let response = post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/timer/update",
        json!({ "sessionId": id, "note": "deep work" }),
        OWNER,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["session"]["note"], "deep work");
    assert_eq!(json["session"]["plannedMinutes"], 25);

    let json = body_json(get_auth(build_test_app(pool), "/api/v1/timer/active", OWNER).await).await;
    assert_eq!(ts(&json["session"]["targetEnd"]), t0 + minutes(25));
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_while_paused_changes_remaining(pool: PgPool) {
    let t0 = Utc::now().trunc_subsecs(0) - minutes(10);
    let id = start_at(&pool, t0).await;
    post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/timer/pause",
        json!({ "sessionId": id, "startedAt": (t0 + minutes(5)).to_rfc3339() }),
        OWNER,
    )
    .await;

    let response = post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/timer/update",
        json!({ "sessionId": id, "plannedMinutes": 30 }),
        OWNER,
    )
    .await;
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(get_auth(build_test_app(pool), "/api/v1/timer/active", OWNER).await).await;
    assert_eq!(json["remainingMs"], 1_500_000);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_without_fields_is_bad_request(pool: PgPool) {
    let id = start_at(&pool, Utc::now().trunc_subsecs(0)).await;

    let response = post_json_auth(
        build_test_app(pool),
        "/api/v1/timer/update",
        json!({ "sessionId": id, "plannedMinutes": null }),
        OWNER,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn update_after_stop_is_conflict(pool: PgPool) {
    let id = start_at(&pool, Utc::now().trunc_subsecs(0)).await;
    post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/timer/stop",
        json!({ "sessionId": id }),
        OWNER,
    )
    .await;

    let response = post_json_auth(
        build_test_app(pool),
        "/api/v1/timer/update",
        json!({ "sessionId": id, "note": "late" }),
        OWNER,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CONFLICT);
}

// ---------------------------------------------------------------------------
// Test: list with history
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_returns_sessions_with_history(pool: PgPool) {
    let t0 = Utc::now().trunc_subsecs(0) - minutes(30);
    let id = start_at(&pool, t0).await;
    for (uri, body) in [
        ("/api/v1/timer/pause", json!({ "sessionId": id, "startedAt": (t0 + minutes(5)).to_rfc3339() })),
        ("/api/v1/timer/resume", json!({ "sessionId": id, "endedAt": (t0 + minutes(8)).to_rfc3339() })),
        ("/api/v1/timer/stop", json!({ "sessionId": id, "stoppedAt": (t0 + minutes(20)).to_rfc3339() })),
    ] {
        let response = post_json_auth(build_test_app(pool.clone()), uri, body, OWNER).await;
        assert_eq!(response.status(), StatusCode::OK, "{uri}");
    }
    post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/timer/start",
        json!({ "mode": "break" }),
        OWNER,
    )
    .await;

    let json = body_json(get_auth(build_test_app(pool.clone()), "/api/v1/timer", OWNER).await).await;
    assert_eq!(json["total"], 2);
    assert_eq!(json["page"], 1);
    assert_eq!(json["limit"], 10);

    let sessions = json["sessions"].as_array().unwrap();
    // Newest start first: the break session started now.
    assert_eq!(sessions[0]["mode"], "break");
    let focus = &sessions[1];
    assert_eq!(focus["id"], id);
    assert_eq!(focus["pauses"].as_array().unwrap().len(), 1);
    assert_eq!(ts(&focus["pauses"][0]["startAt"]), t0 + minutes(5));
    assert_eq!(ts(&focus["pauses"][0]["endAt"]), t0 + minutes(8));
    assert_eq!(ts(&focus["stops"][0]["stopAt"]), t0 + minutes(20));

    let json = body_json(
        get_auth(build_test_app(pool), "/api/v1/timer?mode=focus&limit=500", OWNER).await,
    )
    .await;
    assert_eq!(json["total"], 1);
    assert_eq!(json["limit"], 100);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_rejects_malformed_date(pool: PgPool) {
    let response =
        get_auth(build_test_app(pool), "/api/v1/timer?createdFrom=03-01-2025", OWNER).await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn list_ignores_unknown_mode(pool: PgPool) {
    start_at(&pool, Utc::now().trunc_subsecs(0)).await;
    let json =
        body_json(get_auth(build_test_app(pool), "/api/v1/timer?mode=nap", OWNER).await).await;
    assert_eq!(json["total"], 1);
}

// ---------------------------------------------------------------------------
// Test: record completed session
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn record_creates_stopped_session_with_derived_duration(pool: PgPool) {
    let start = Utc::now().trunc_subsecs(0) - minutes(40);
    let response = post_json_auth(
        build_test_app(pool.clone()),
        "/api/v1/timer",
        json!({
            "startAt": start.to_rfc3339(),
            "endAt": (start + minutes(24) + Duration::seconds(40)).to_rfc3339(),
            "note": "offline",
        }),
        OWNER,
    )
    .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    let json = body_json(response).await;
    assert_eq!(json["session"]["durationMinutes"], 25);
    assert!(json["session"]["targetEnd"].is_null());

    let json = body_json(get_auth(build_test_app(pool), "/api/v1/timer/active", OWNER).await).await;
    assert!(json["session"].is_null());
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn record_rejects_end_before_start(pool: PgPool) {
    let start = Utc::now().trunc_subsecs(0);
    let response = post_json_auth(
        build_test_app(pool),
        "/api/v1/timer",
        json!({
            "startAt": start.to_rfc3339(),
            "endAt": (start - minutes(1)).to_rfc3339(),
        }),
        OWNER,
    )
    .await;
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Test: opt-in server-side expiry
// ---------------------------------------------------------------------------

#[sqlx::test(migrations = "../../db/migrations")]
async fn overdue_session_stays_active_by_default(pool: PgPool) {
    let t0 = Utc::now().trunc_subsecs(0) - minutes(60);
    let id = start_at(&pool, t0).await;

    let json = body_json(get_auth(build_test_app(pool), "/api/v1/timer/active", OWNER).await).await;
    assert_eq!(json["session"]["id"], id);
}

#[sqlx::test(migrations = "../../db/migrations")]
async fn auto_expire_stops_overdue_session_at_target_end(pool: PgPool) {
    let t0 = Utc::now().trunc_subsecs(0) - minutes(60);
    let id = start_at(&pool, t0).await;

    let json =
        body_json(get_auth(build_auto_expire_app(pool.clone()), "/api/v1/timer/active", OWNER).await)
            .await;
    assert!(json["session"].is_null());

    let json = body_json(get_auth(build_test_app(pool), "/api/v1/timer", OWNER).await).await;
    let session = &json["sessions"][0];
    assert_eq!(session["id"], id);
    assert_eq!(ts(&session["endAt"]), t0 + minutes(25));
    assert_eq!(session["durationMinutes"], 25);
    assert_eq!(session["stops"].as_array().unwrap().len(), 1);
}
