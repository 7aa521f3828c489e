//! Route definitions for focus timer sessions.

use axum::routing::{get, post};
use axum::Router;

use crate::handlers::timer;
use crate::state::AppState;

/// Routes mounted at `/timer`.
///
/// ```text
/// GET    /            list_sessions
/// POST   /            record_session
/// POST   /start       start_session
/// POST   /pause       pause_session
/// POST   /resume      resume_session
/// POST   /stop        stop_session
/// POST   /update      update_session
/// GET    /active      get_active_session
/// ```
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(timer::list_sessions).post(timer::record_session),
        )
        .route("/start", post(timer::start_session))
        .route("/pause", post(timer::pause_session))
        .route("/resume", post(timer::resume_session))
        .route("/stop", post(timer::stop_session))
        .route("/update", post(timer::update_session))
        .route("/active", get(timer::get_active_session))
}
