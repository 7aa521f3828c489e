//! Session history with per-session event timelines.

use manifest_core::timer_events::{build_timeline, PauseEntry, StopEntry, TimelineEvent};

use crate::api::{HistoryPage, HistoryRecord, SessionRecord};

/// A past or active session ready for display.
#[derive(Debug, Clone)]
pub struct SessionHistory {
    pub session: SessionRecord,
    pub pauses: Vec<PauseEntry>,
    pub stops: Vec<StopEntry>,
    /// Pause, resume and stop events in time order.
    pub timeline: Vec<TimelineEvent>,
}

impl From<HistoryRecord> for SessionHistory {
    fn from(record: HistoryRecord) -> Self {
        let timeline = build_timeline(&record.pauses, &record.stops);
        Self {
            session: record.session,
            pauses: record.pauses,
            stops: record.stops,
            timeline,
        }
    }
}

/// One page of history.
#[derive(Debug, Clone)]
pub struct HistoryView {
    pub sessions: Vec<SessionHistory>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

impl From<HistoryPage> for HistoryView {
    fn from(page: HistoryPage) -> Self {
        Self {
            sessions: page.sessions.into_iter().map(SessionHistory::from).collect(),
            page: page.page,
            limit: page.limit,
            total: page.total,
        }
    }
}
