use manifest_core::error::CoreError;

/// Errors from the timer REST API layer.
#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The HTTP request itself failed (network, DNS, TLS, decoding).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The server returned a non-2xx status code.
    #[error("Timer API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },
}

/// Errors returned by [`FocusTimer`](crate::engine::FocusTimer) actions.
///
/// Network failures are never reported here; they are logged and the local
/// transition stands.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// The action is not available in the current phase.
    #[error("Cannot {action} while {phase}")]
    InvalidTransition {
        action: &'static str,
        phase: &'static str,
    },

    /// A user-supplied value was rejected before any state changed.
    #[error(transparent)]
    Invalid(#[from] CoreError),
}
