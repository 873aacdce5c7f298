//! Error types for the Tuya monitor

use std::sync::Arc;

use reqwest::StatusCode;
use thiserror::Error;

/// Network-level failure: the request never produced a usable HTTP response.
#[derive(Error, Debug)]
pub enum TransportError {
    #[error("request timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
}

/// The vendor answered, but the response envelope was not a success.
#[derive(Error, Debug)]
pub enum EnvelopeError {
    #[error("unexpected HTTP status {status}: {body}")]
    Status { status: StatusCode, body: String },

    #[error("request rejected by vendor (code {code:?}): {msg}")]
    Rejected { code: Option<i64>, msg: String },

    #[error("response carried no result")]
    MissingResult,

    #[error("malformed response: {0}")]
    Decode(#[from] serde_json::Error),
}

/// Failure of a single vendor API call, before it is attributed to auth or fetch
#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

/// Failure to obtain or refresh an access token.
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("token request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("token request failed: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("no refresh token available")]
    MissingRefreshToken,

    #[error("vendor returned an unusable credential: {0}")]
    InvalidCredential(String),

    /// Shared by every caller that waited on the same rotation
    #[error("token refresh failed ({refresh}) and re-authentication failed ({reauth})")]
    Exhausted {
        refresh: Arc<AuthError>,
        reauth: Arc<AuthError>,
    },

    #[error("credential rotation was aborted: {0}")]
    Aborted(String),
}

impl From<ApiError> for AuthError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Transport(e) => AuthError::Transport(e),
            ApiError::Envelope(e) => AuthError::Envelope(e),
        }
    }
}

impl AuthError {
    /// Stable tag describing why authentication failed
    pub fn reason(&self) -> &'static str {
        match self {
            AuthError::Transport(TransportError::Timeout(_)) => "timeout",
            AuthError::Transport(TransportError::Request(_)) => "transport",
            AuthError::Envelope(EnvelopeError::Status { .. }) => "http_status",
            AuthError::Envelope(EnvelopeError::Rejected { .. }) => "rejected",
            AuthError::Envelope(EnvelopeError::MissingResult) => "missing_result",
            AuthError::Envelope(EnvelopeError::Decode(_)) => "decode",
            AuthError::MissingRefreshToken => "missing_refresh_token",
            AuthError::InvalidCredential(_) => "invalid_credential",
            AuthError::Exhausted { .. } => "exhausted",
            AuthError::Aborted(_) => "aborted",
        }
    }
}

/// Failure of one device poll cycle.
#[derive(Error, Debug)]
pub enum FetchError {
    #[error("authentication failed: {0}")]
    Auth(#[from] AuthError),

    #[error("device request failed: {0}")]
    Transport(#[from] TransportError),

    #[error("device request failed: {0}")]
    Envelope(#[from] EnvelopeError),

    #[error("device {0} is not configured for this account")]
    UnknownDevice(String),
}

impl From<ApiError> for FetchError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Transport(e) => FetchError::Transport(e),
            ApiError::Envelope(e) => FetchError::Envelope(e),
        }
    }
}

/// Process-level error type for the monitor
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("Authentication error: {0}")]
    AuthError(#[from] AuthError),

    #[error("Fetch error: {0}")]
    FetchError(#[from] FetchError),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),
}
