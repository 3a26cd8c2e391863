// ── Core error types ──
//
// User-facing errors from crowdly-core. Consumers never see raw HTTP
// status codes or JSON parse failures -- the `From<crowdly_api::Error>`
// impl translates transport-layer errors into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ──────────────────────────────────────────────
    #[error("Invalid email or password")]
    InvalidCredentials,

    #[error("Session expired -- please sign in again")]
    SessionExpired,

    #[error("Not signed in")]
    NotAuthenticated,

    // ── Connection ──────────────────────────────────────────────────
    #[error("Cannot reach the analytics backend: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Request timed out")]
    Timeout,

    // ── Data ────────────────────────────────────────────────────────
    #[error("No site selected")]
    NoSiteSelected,

    #[error("Site not found: {site_id}")]
    SiteNotFound { site_id: String },

    // ── API (wrapped, not exposed raw) ──────────────────────────────
    #[error("Backend error: {message}")]
    Api { message: String, status: Option<u16> },

    // ── Configuration ───────────────────────────────────────────────
    #[error("Configuration error: {message}")]
    Config { message: String },

    // ── Internal ────────────────────────────────────────────────────
    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether this error must force the session back to the login
    /// screen.
    pub fn is_session_expired(&self) -> bool {
        matches!(self, Self::SessionExpired)
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<crowdly_api::Error> for CoreError {
    fn from(err: crowdly_api::Error) -> Self {
        match err {
            crowdly_api::Error::InvalidCredentials => CoreError::InvalidCredentials,
            crowdly_api::Error::SessionExpired => CoreError::SessionExpired,
            crowdly_api::Error::Transport(ref e) => {
                if e.is_timeout() {
                    CoreError::Timeout
                } else if e.is_connect() {
                    CoreError::ConnectionFailed {
                        reason: e.to_string(),
                    }
                } else {
                    CoreError::Api {
                        message: e.to_string(),
                        status: e.status().map(|s| s.as_u16()),
                    }
                }
            }
            crowdly_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            crowdly_api::Error::Api { status, message } => CoreError::Api {
                message,
                status: Some(status),
            },
            crowdly_api::Error::WebSocketConnect(reason) => CoreError::ConnectionFailed {
                reason: format!("realtime channel: {reason}"),
            },
            crowdly_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}

impl From<crowdly_config::ConfigError> for CoreError {
    fn from(err: crowdly_config::ConfigError) -> Self {
        CoreError::Config {
            message: err.to_string(),
        }
    }
}
