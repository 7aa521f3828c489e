//! Session history entries and the merged event timeline.
//!
//! The list endpoint returns each session's pause and stop logs as
//! [`PauseEntry`] / [`StopEntry`]. [`build_timeline`] flattens them into one
//! chronological list of [`TimelineEvent`]s for display. It is a read-side
//! projection only and never feeds back into timer state.

use serde::{Deserialize, Serialize};

use crate::types::{RecordId, Timestamp};

/// One pause interval as exposed in session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PauseEntry {
    pub id: RecordId,
    pub start_at: Timestamp,
    pub end_at: Option<Timestamp>,
}

/// One stop event as exposed in session history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StopEntry {
    pub id: RecordId,
    pub stop_at: Timestamp,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimelineEventKind {
    Paused,
    Resumed,
    Stopped,
}

/// A single row of the history timeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TimelineEvent {
    /// `pause-<id>`, `resume-<id>` or `stop-<id>`.
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TimelineEventKind,
    pub at: Timestamp,
}

/// Merge pause and stop logs into one ascending timeline.
///
/// Each pause yields `Paused` at its start and, once closed, `Resumed` at its
/// end. Each stop yields `Stopped`. Events sharing a timestamp keep their
/// insertion order (pauses before stops).
pub fn build_timeline(pauses: &[PauseEntry], stops: &[StopEntry]) -> Vec<TimelineEvent> {
    let mut events = Vec::with_capacity(pauses.len() * 2 + stops.len());

    for pause in pauses {
        events.push(TimelineEvent {
            id: format!("pause-{}", pause.id),
            kind: TimelineEventKind::Paused,
            at: pause.start_at,
        });
        if let Some(end_at) = pause.end_at {
            events.push(TimelineEvent {
                id: format!("resume-{}", pause.id),
                kind: TimelineEventKind::Resumed,
                at: end_at,
            });
        }
    }

    for stop in stops {
        events.push(TimelineEvent {
            id: format!("stop-{}", stop.id),
            kind: TimelineEventKind::Stopped,
            at: stop.stop_at,
        });
    }

    events.sort_by_key(|event| event.at);
    events
}
