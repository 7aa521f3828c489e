//! The client-side timer state machine.
//!
//! ```text
//! Restoring ──restore──▶ Absent ◀──────────── stop / completion
//!                          │ start                    ▲
//!                          ▼                          │
//!                       Running ──pause──▶ Paused ────┘
//!                          ▲                  │
//!                          └──────resume──────┘
//! ```
//!
//! Every action updates local state first and then calls the timer API
//! without holding the state lock. A failed call is logged and the local
//! transition stands; the next [`FocusTimer::restore`] reconciles with the
//! server. Calls that need a session id are skipped when the optimistic
//! start never obtained one.

use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::Duration;

use manifest_core::focus_timer::{
    planned_ms, remaining_until, target_end_after, validate_minutes, validate_note, TimerMode,
    DEFAULT_BREAK_MINUTES, DEFAULT_FOCUS_MINUTES, MS_PER_MINUTE, TICK_INTERVAL_MS,
};
use manifest_core::types::{RecordId, Timestamp};
use tokio::sync::{broadcast, Mutex};
use tokio::task::JoinHandle;

use crate::api::{FieldUpdate, HistoryFilter, StartSession, TimerApi};
use crate::clock::Clock;
use crate::error::{ClientError, EngineError};
use crate::history::HistoryView;

/// Capacity of the completion broadcast channel.
const COMPLETION_CHANNEL_CAPACITY: usize = 16;

/// Where the local countdown stands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimerPhase {
    /// Waiting for the first [`FocusTimer::restore`].
    Restoring,
    Absent,
    Running {
        target_end: Timestamp,
        session_id: Option<RecordId>,
    },
    Paused {
        remaining_ms: i64,
        session_id: Option<RecordId>,
    },
}

impl TimerPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Restoring => "restoring",
            Self::Absent => "absent",
            Self::Running { .. } => "running",
            Self::Paused { .. } => "paused",
        }
    }

    pub fn session_id(&self) -> Option<RecordId> {
        match self {
            Self::Running { session_id, .. } | Self::Paused { session_id, .. } => *session_id,
            Self::Restoring | Self::Absent => None,
        }
    }

    pub fn is_active(&self) -> bool {
        matches!(self, Self::Running { .. } | Self::Paused { .. })
    }
}

/// Emitted once when a running countdown reaches zero.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Completed {
    pub session_id: Option<RecordId>,
    pub mode: TimerMode,
    pub at: Timestamp,
}

/// Point-in-time view of the engine for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TimerSnapshot {
    pub phase: TimerPhase,
    pub mode: TimerMode,
    pub note: Option<String>,
    /// Configured duration for the current mode.
    pub duration_minutes: i32,
    /// Milliseconds shown on the countdown.
    pub remaining_ms: i64,
}

struct EngineState {
    phase: TimerPhase,
    mode: TimerMode,
    note: Option<String>,
    focus_minutes: i32,
    break_minutes: i32,
    remaining_ms: i64,
    /// Bumped on every start and restore so late responses from an earlier
    /// run are ignored.
    run: u64,
}

impl EngineState {
    fn new() -> Self {
        Self {
            phase: TimerPhase::Restoring,
            mode: TimerMode::Focus,
            note: None,
            focus_minutes: DEFAULT_FOCUS_MINUTES,
            break_minutes: DEFAULT_BREAK_MINUTES,
            remaining_ms: planned_ms(Some(DEFAULT_FOCUS_MINUTES), TimerMode::Focus),
            run: 0,
        }
    }

    fn duration_minutes(&self) -> i32 {
        match self.mode {
            TimerMode::Focus => self.focus_minutes,
            TimerMode::Break => self.break_minutes,
        }
    }

    fn set_duration_minutes(&mut self, mode: TimerMode, minutes: i32) {
        match mode {
            TimerMode::Focus => self.focus_minutes = minutes,
            TimerMode::Break => self.break_minutes = minutes,
        }
    }

    fn full_duration_ms(&self) -> i64 {
        i64::from(self.duration_minutes()) * MS_PER_MINUTE
    }

    fn invalid(&self, action: &'static str) -> EngineError {
        EngineError::InvalidTransition {
            action,
            phase: self.phase.as_str(),
        }
    }

    fn snapshot(&self) -> TimerSnapshot {
        TimerSnapshot {
            phase: self.phase,
            mode: self.mode,
            note: self.note.clone(),
            duration_minutes: self.duration_minutes(),
            remaining_ms: self.remaining_ms,
        }
    }
}

enum TickOutcome {
    Continue,
    Finished,
}

struct Shared {
    api: Arc<dyn TimerApi>,
    clock: Arc<dyn Clock>,
    state: Mutex<EngineState>,
    /// Only replaced or aborted while `state` is locked.
    tick: StdMutex<Option<JoinHandle<()>>>,
    tick_interval: Duration,
    completed: broadcast::Sender<Completed>,
}

impl Shared {
    fn abort_tick(&self) {
        let handle = self
            .tick
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(handle) = handle {
            handle.abort();
        }
    }

    /// Forget the tick handle without aborting it. Used by the tick task
    /// itself when the countdown completes.
    fn release_tick(&self) {
        self.tick
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
    }

    fn spawn_tick(self: &Arc<Self>, run: u64) {
        self.abort_tick();
        let shared = Arc::clone(self);
        let handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(shared.tick_interval);
            loop {
                interval.tick().await;
                if let TickOutcome::Finished = shared.tick_once(Some(run)).await {
                    break;
                }
            }
        });
        *self.tick.lock().unwrap_or_else(PoisonError::into_inner) = Some(handle);
    }

    /// Recompute the remaining time. At zero, complete the run and stop the
    /// session on the server.
    async fn tick_once(&self, run: Option<u64>) -> TickOutcome {
        let (session_id, mode, now) = {
            let mut state = self.state.lock().await;
            if run.is_some_and(|r| r != state.run) {
                return TickOutcome::Finished;
            }
            let TimerPhase::Running {
                target_end,
                session_id,
            } = state.phase
            else {
                return TickOutcome::Finished;
            };

            let now = self.clock.now();
            state.remaining_ms = remaining_until(target_end, now);
            if state.remaining_ms > 0 {
                return TickOutcome::Continue;
            }

            self.release_tick();
            state.phase = TimerPhase::Absent;
            state.remaining_ms = state.full_duration_ms();
            (session_id, state.mode, now)
        };

        tracing::info!(session_id = ?session_id, mode = %mode, "Focus timer completed");
        // No receivers is fine.
        let _ = self.completed.send(Completed {
            session_id,
            mode,
            at: now,
        });

        if let Some(id) = session_id {
            if let Err(e) = self.api.stop(id, now).await {
                tracing::warn!(session_id = %id, error = %e, "Failed to stop completed session");
            }
        }
        TickOutcome::Finished
    }
}

/// A single focus timer for one owner.
///
/// Dropping the timer aborts its tick task.
pub struct FocusTimer {
    shared: Arc<Shared>,
}

impl FocusTimer {
    pub fn new(api: Arc<dyn TimerApi>, clock: Arc<dyn Clock>) -> Self {
        Self::with_tick_interval(api, clock, Duration::from_millis(TICK_INTERVAL_MS))
    }

    pub fn with_tick_interval(
        api: Arc<dyn TimerApi>,
        clock: Arc<dyn Clock>,
        tick_interval: Duration,
    ) -> Self {
        let (completed, _) = broadcast::channel(COMPLETION_CHANNEL_CAPACITY);
        Self {
            shared: Arc::new(Shared {
                api,
                clock,
                state: Mutex::new(EngineState::new()),
                tick: StdMutex::new(None),
                tick_interval,
                completed,
            }),
        }
    }

    /// Receive a [`Completed`] event each time a countdown reaches zero.
    pub fn subscribe(&self) -> broadcast::Receiver<Completed> {
        self.shared.completed.subscribe()
    }

    pub async fn snapshot(&self) -> TimerSnapshot {
        self.shared.state.lock().await.snapshot()
    }

    /// Rebuild local state from the server's active session.
    ///
    /// A running session resumes its countdown from `targetEnd`; a paused one
    /// takes the server's `remainingMs`, or the local value when the server
    /// could not compute it. A failed fetch on first mount leaves the timer
    /// absent; on a later restore the local state is kept as it is.
    pub async fn restore(&self) {
        let active = self.shared.api.active().await;

        let mut state = self.shared.state.lock().await;
        let active = match active {
            Ok(active) => active,
            Err(e) => {
                tracing::warn!(error = %e, phase = state.phase.as_str(), "Failed to fetch active session");
                if state.phase == TimerPhase::Restoring {
                    state.phase = TimerPhase::Absent;
                }
                return;
            }
        };

        self.shared.abort_tick();
        state.run += 1;
        let Some(session) = active.session else {
            state.phase = TimerPhase::Absent;
            state.remaining_ms = state.full_duration_ms();
            return;
        };

        state.mode = session.mode;
        state.note = session.note.clone();
        if let Some(minutes) = session.planned_minutes {
            state.set_duration_minutes(session.mode, minutes);
        }

        let now = self.shared.clock.now();
        match session.target_end {
            Some(target_end) => {
                state.phase = TimerPhase::Running {
                    target_end,
                    session_id: Some(session.id),
                };
                state.remaining_ms = remaining_until(target_end, now);
                self.shared.spawn_tick(state.run);
            }
            None => {
                let remaining_ms = active.remaining_ms.unwrap_or_else(|| {
                    tracing::debug!(session_id = %session.id, "No remainingMs from server, keeping local value");
                    if state.phase == TimerPhase::Restoring {
                        state.full_duration_ms()
                    } else {
                        state.remaining_ms
                    }
                });
                state.phase = TimerPhase::Paused {
                    remaining_ms,
                    session_id: Some(session.id),
                };
                state.remaining_ms = remaining_ms;
            }
        }

        tracing::info!(
            session_id = %session.id,
            phase = state.phase.as_str(),
            remaining_ms = state.remaining_ms,
            "Focus timer restored",
        );
    }

    /// Advance the countdown once. The tick task calls this every 500 ms
    /// while running.
    pub async fn tick(&self) {
        self.shared.tick_once(None).await;
    }

    /// Start a new countdown of the current mode's duration.
    pub async fn start(&self) -> Result<(), EngineError> {
        let (input, run) = {
            let mut state = self.shared.state.lock().await;
            if state.phase != TimerPhase::Absent {
                return Err(state.invalid("start"));
            }

            let now = self.shared.clock.now();
            let minutes = state.duration_minutes();
            let target_end = target_end_after(now, state.full_duration_ms());

            state.run += 1;
            state.phase = TimerPhase::Running {
                target_end,
                session_id: None,
            };
            state.remaining_ms = remaining_until(target_end, now);
            self.shared.spawn_tick(state.run);

            let input = StartSession {
                start_at: now,
                target_end,
                planned_minutes: minutes,
                mode: state.mode,
                note: state.note.clone(),
            };
            (input, state.run)
        };

        match self.shared.api.start(&input).await {
            Ok(session) => {
                let mut state = self.shared.state.lock().await;
                if state.run == run {
                    match &mut state.phase {
                        TimerPhase::Running { session_id, .. }
                        | TimerPhase::Paused { session_id, .. } => *session_id = Some(session.id),
                        TimerPhase::Restoring | TimerPhase::Absent => {}
                    }
                }
                tracing::info!(session_id = %session.id, mode = %input.mode, "Focus session started");
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to start session on server");
            }
        }
        Ok(())
    }

    /// Freeze the countdown.
    pub async fn pause(&self) -> Result<(), EngineError> {
        let (session_id, now) = {
            let mut state = self.shared.state.lock().await;
            let TimerPhase::Running {
                target_end,
                session_id,
            } = state.phase
            else {
                return Err(state.invalid("pause"));
            };

            let now = self.shared.clock.now();
            let remaining_ms = remaining_until(target_end, now);
            self.shared.abort_tick();
            state.phase = TimerPhase::Paused {
                remaining_ms,
                session_id,
            };
            state.remaining_ms = remaining_ms;
            (session_id, now)
        };

        match session_id {
            Some(id) => log_failure(self.shared.api.pause(id, now).await, "pause", id),
            None => tracing::debug!("No session id, skipping pause call"),
        }
        Ok(())
    }

    /// Continue a paused countdown from where it stopped.
    pub async fn resume(&self) -> Result<(), EngineError> {
        let (session_id, now, target_end) = {
            let mut state = self.shared.state.lock().await;
            let TimerPhase::Paused {
                remaining_ms,
                session_id,
            } = state.phase
            else {
                return Err(state.invalid("resume"));
            };

            let now = self.shared.clock.now();
            let target_end = target_end_after(now, remaining_ms);
            state.phase = TimerPhase::Running {
                target_end,
                session_id,
            };
            state.remaining_ms = remaining_until(target_end, now);
            self.shared.spawn_tick(state.run);
            (session_id, now, target_end)
        };

        match session_id {
            Some(id) => log_failure(
                self.shared.api.resume(id, now, target_end).await,
                "resume",
                id,
            ),
            None => tracing::debug!("No session id, skipping resume call"),
        }
        Ok(())
    }

    /// End the current run early.
    pub async fn stop(&self) -> Result<(), EngineError> {
        let (session_id, now) = {
            let mut state = self.shared.state.lock().await;
            if !state.phase.is_active() {
                return Err(state.invalid("stop"));
            }

            let session_id = state.phase.session_id();
            self.shared.abort_tick();
            state.phase = TimerPhase::Absent;
            state.remaining_ms = state.full_duration_ms();
            (session_id, self.shared.clock.now())
        };

        match session_id {
            Some(id) => log_failure(self.shared.api.stop(id, now).await, "stop", id),
            None => tracing::debug!("No session id, skipping stop call"),
        }
        Ok(())
    }

    /// Change the current mode's duration.
    ///
    /// While absent this only resets the display. While paused the new plan
    /// is sent to the server and the remaining time is re-read from it.
    /// Rejected while running.
    pub async fn set_duration(&self, minutes: i32) -> Result<(), EngineError> {
        validate_minutes("duration", minutes)?;

        let (session_id, run) = {
            let mut state = self.shared.state.lock().await;
            match state.phase {
                TimerPhase::Absent => {
                    let mode = state.mode;
                    state.set_duration_minutes(mode, minutes);
                    state.remaining_ms = state.full_duration_ms();
                    return Ok(());
                }
                TimerPhase::Paused { session_id, .. } => {
                    let mode = state.mode;
                    state.set_duration_minutes(mode, minutes);
                    (session_id, state.run)
                }
                TimerPhase::Restoring | TimerPhase::Running { .. } => {
                    return Err(state.invalid("change duration"));
                }
            }
        };

        let Some(id) = session_id else {
            tracing::debug!("No session id, skipping duration update");
            return Ok(());
        };

        let update = FieldUpdate {
            note: None,
            planned_minutes: Some(minutes),
        };
        if let Err(e) = self.shared.api.update(id, &update).await {
            tracing::warn!(session_id = %id, error = %e, "Failed to update planned minutes");
            return Ok(());
        }

        let remaining = match self.shared.api.active().await {
            Ok(active) => active
                .session
                .filter(|s| s.id == id)
                .and(active.remaining_ms),
            Err(e) => {
                tracing::warn!(session_id = %id, error = %e, "Failed to re-read active session");
                None
            }
        };

        if let Some(server_remaining) = remaining {
            let mut guard = self.shared.state.lock().await;
            let state = &mut *guard;
            if state.run == run {
                if let TimerPhase::Paused { remaining_ms, .. } = &mut state.phase {
                    *remaining_ms = server_remaining;
                    state.remaining_ms = server_remaining;
                }
            }
        }
        Ok(())
    }

    /// Replace the note. An active session gets the change on the server too.
    pub async fn set_note(&self, note: Option<String>) -> Result<(), EngineError> {
        if let Some(note) = &note {
            validate_note(note)?;
        }

        let session_id = {
            let mut state = self.shared.state.lock().await;
            state.note = note.clone();
            state.phase.session_id()
        };

        if let Some(id) = session_id {
            let update = FieldUpdate {
                note: Some(note),
                planned_minutes: None,
            };
            log_failure(self.shared.api.update(id, &update).await, "update note", id);
        }
        Ok(())
    }

    /// Switch between focus and break. Only while absent.
    pub async fn set_mode(&self, mode: TimerMode) -> Result<(), EngineError> {
        let mut state = self.shared.state.lock().await;
        if state.phase != TimerPhase::Absent {
            return Err(state.invalid("switch mode"));
        }
        state.mode = mode;
        state.remaining_ms = state.full_duration_ms();
        Ok(())
    }

    /// Fetch a page of past sessions with their event timelines.
    pub async fn history(&self, filter: &HistoryFilter) -> Result<HistoryView, ClientError> {
        let page = self.shared.api.history(filter).await?;
        Ok(HistoryView::from(page))
    }
}

impl Drop for FocusTimer {
    fn drop(&mut self) {
        self.shared.abort_tick();
    }
}

fn log_failure(result: Result<(), ClientError>, action: &str, session_id: RecordId) {
    if let Err(e) = result {
        tracing::warn!(%session_id, action, error = %e, "Timer API call failed");
    }
}
