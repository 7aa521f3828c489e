pub mod health;
pub mod timer;

use axum::Router;

use crate::state::AppState;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /timer                 list sessions (GET), record completed session (POST)
/// /timer/start           start (POST)
/// /timer/pause           pause (POST)
/// /timer/resume          resume (POST)
/// /timer/stop            stop (POST)
/// /timer/update          update note / planned minutes (POST)
/// /timer/active          current active session (GET)
/// ```
///
/// Every route requires a Bearer token.
pub fn api_routes() -> Router<AppState> {
    Router::new().nest("/timer", timer::router())
}
