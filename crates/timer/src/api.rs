//! REST client for the `/timer` endpoints.
//!
//! [`TimerApi`] is the seam the engine talks through; [`HttpTimerApi`] is the
//! [`reqwest`] implementation used against a real server.

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use manifest_core::focus_timer::TimerMode;
use manifest_core::timer_events::{PauseEntry, StopEntry};
use manifest_core::types::{RecordId, Timestamp};

use crate::config::TimerClientConfig;
use crate::error::ClientError;

// ---------------------------------------------------------------------------
// Wire types
// ---------------------------------------------------------------------------

/// A session as returned by the server.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: RecordId,
    pub mode: TimerMode,
    pub start_at: Timestamp,
    pub end_at: Option<Timestamp>,
    pub planned_minutes: Option<i32>,
    pub duration_minutes: Option<i32>,
    pub target_end: Option<Timestamp>,
    pub note: Option<String>,
}

/// Response of `GET /timer/active`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveSession {
    pub session: Option<SessionRecord>,
    /// Present only for a paused session.
    pub remaining_ms: Option<i64>,
}

/// Body of `POST /timer/start`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartSession {
    pub start_at: Timestamp,
    pub target_end: Timestamp,
    pub planned_minutes: i32,
    pub mode: TimerMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Editable fields for `POST /timer/update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldUpdate {
    /// `Some(None)` is sent as `null` and clears the note.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<Option<String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub planned_minutes: Option<i32>,
}

/// Query for `GET /timer`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HistoryFilter {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mode: Option<TimerMode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_from: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_to: Option<NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub limit: Option<i64>,
}

/// One row of `GET /timer`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryRecord {
    #[serde(flatten)]
    pub session: SessionRecord,
    #[serde(default)]
    pub pauses: Vec<PauseEntry>,
    #[serde(default)]
    pub stops: Vec<StopEntry>,
}

/// Response of `GET /timer`.
#[derive(Debug, Clone, Deserialize)]
pub struct HistoryPage {
    pub sessions: Vec<HistoryRecord>,
    pub page: i64,
    pub limit: i64,
    pub total: i64,
}

#[derive(Debug, Deserialize)]
struct SessionEnvelope {
    session: SessionRecord,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct PauseBody {
    session_id: RecordId,
    started_at: Timestamp,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ResumeBody {
    session_id: RecordId,
    ended_at: Timestamp,
    target_end: Timestamp,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct StopBody {
    session_id: RecordId,
    stopped_at: Timestamp,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct UpdateBody<'a> {
    session_id: RecordId,
    #[serde(flatten)]
    fields: &'a FieldUpdate,
}

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// The timer controller operations the engine depends on.
#[async_trait]
pub trait TimerApi: Send + Sync {
    async fn active(&self) -> Result<ActiveSession, ClientError>;

    async fn start(&self, input: &StartSession) -> Result<SessionRecord, ClientError>;

    async fn pause(&self, session_id: RecordId, started_at: Timestamp) -> Result<(), ClientError>;

    async fn resume(
        &self,
        session_id: RecordId,
        ended_at: Timestamp,
        target_end: Timestamp,
    ) -> Result<(), ClientError>;

    async fn stop(&self, session_id: RecordId, stopped_at: Timestamp) -> Result<(), ClientError>;

    async fn update(&self, session_id: RecordId, fields: &FieldUpdate) -> Result<(), ClientError>;

    async fn history(&self, filter: &HistoryFilter) -> Result<HistoryPage, ClientError>;
}

// ---------------------------------------------------------------------------
// HTTP implementation
// ---------------------------------------------------------------------------

/// HTTP client for the timer endpoints of one server.
pub struct HttpTimerApi {
    client: reqwest::Client,
    config: TimerClientConfig,
}

impl HttpTimerApi {
    pub fn new(config: TimerClientConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }

    /// Create an API client reusing an existing [`reqwest::Client`].
    pub fn with_client(client: reqwest::Client, config: TimerClientConfig) -> Self {
        Self { client, config }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/timer{}", self.config.base_url, path)
    }

    async fn post<B: Serialize + ?Sized>(
        &self,
        path: &str,
        body: &B,
    ) -> Result<reqwest::Response, ClientError> {
        let response = self
            .client
            .post(self.url(path))
            .bearer_auth(&self.config.token)
            .json(body)
            .send()
            .await?;
        Self::ensure_success(response).await
    }

    // ---- private helpers ----

    /// Turn a non-2xx response into [`ClientError::Api`].
    async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, ClientError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ClientError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    async fn parse_response<T: DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, ClientError> {
        Ok(response.json::<T>().await?)
    }
}

#[async_trait]
impl TimerApi for HttpTimerApi {
    async fn active(&self) -> Result<ActiveSession, ClientError> {
        let response = self
            .client
            .get(self.url("/active"))
            .bearer_auth(&self.config.token)
            .send()
            .await?;
        Self::parse_response(Self::ensure_success(response).await?).await
    }

    async fn start(&self, input: &StartSession) -> Result<SessionRecord, ClientError> {
        let response = self.post("/start", input).await?;
        let envelope: SessionEnvelope = Self::parse_response(response).await?;
        Ok(envelope.session)
    }

    async fn pause(&self, session_id: RecordId, started_at: Timestamp) -> Result<(), ClientError> {
        self.post("/pause", &PauseBody { session_id, started_at })
            .await
            .map(drop)
    }

    async fn resume(
        &self,
        session_id: RecordId,
        ended_at: Timestamp,
        target_end: Timestamp,
    ) -> Result<(), ClientError> {
        let body = ResumeBody {
            session_id,
            ended_at,
            target_end,
        };
        self.post("/resume", &body).await.map(drop)
    }

    async fn stop(&self, session_id: RecordId, stopped_at: Timestamp) -> Result<(), ClientError> {
        self.post("/stop", &StopBody { session_id, stopped_at })
            .await
            .map(drop)
    }

    async fn update(&self, session_id: RecordId, fields: &FieldUpdate) -> Result<(), ClientError> {
        self.post("/update", &UpdateBody { session_id, fields })
            .await
            .map(drop)
    }

    async fn history(&self, filter: &HistoryFilter) -> Result<HistoryPage, ClientError> {
        let response = self
            .client
            .get(self.url(""))
            .bearer_auth(&self.config.token)
            .query(filter)
            .send()
            .await?;
        Self::parse_response(Self::ensure_success(response).await?).await
    }
}
