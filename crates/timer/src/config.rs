/// Connection settings for the timer API.
#[derive(Debug, Clone)]
pub struct TimerClientConfig {
    /// API root including the version prefix, e.g. `http://localhost:3000/api/v1`.
    pub base_url: String,
    /// Bearer token identifying the session owner.
    pub token: String,
}

/// Default API root for local development.
const DEFAULT_BASE_URL: &str = "http://localhost:3000/api/v1";

impl TimerClientConfig {
    /// Load configuration from environment variables.
    ///
    /// | Env Var            | Required | Default                         |
    /// |--------------------|----------|---------------------------------|
    /// | `TIMER_API_URL`    | no       | `http://localhost:3000/api/v1`  |
    /// | `TIMER_API_TOKEN`  | **yes**  | --                              |
    ///
    /// # Panics
    ///
    /// Panics if `TIMER_API_TOKEN` is not set.
    pub fn from_env() -> Self {
        let base_url = std::env::var("TIMER_API_URL").unwrap_or_else(|_| DEFAULT_BASE_URL.into());
        let token =
            std::env::var("TIMER_API_TOKEN").expect("TIMER_API_TOKEN must be set in the environment");

        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }
}
