//! Error types for the OAuth gateway.

use thiserror::Error;

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Normalized errors across the web and device flows.
///
/// Protocol-level signals from GitHub (`authorization_pending`, `slow_down`,
/// `expired_token`, a declined exchange) are not errors; they are carried as
/// data by [`PollOutcome`](crate::github::PollOutcome) and
/// [`ExchangeOutcome`](crate::github::ExchangeOutcome). This enum covers
/// contract violations, configuration problems, and failures to obtain a
/// usable response at all.
#[derive(Debug, Error)]
pub enum AuthError {
    /// A required configuration value is missing or malformed.
    #[error("Configuration error: {0}")]
    Configuration(String),
    /// The device authorization could not be started (network failure,
    /// non-2xx status, or a body that does not parse).
    #[error("Device flow start failed: {0}")]
    DeviceStart(String),
    /// `poll` was called with an empty device code. Rejected before any
    /// network activity.
    #[error("device_code is required")]
    DeviceCodeRequired,
    /// `exchange_code` was called with an empty authorization code.
    /// Rejected before any network activity.
    #[error("authorization code is required")]
    CodeRequired,
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Network error: {0}")]
    Network(String),
    #[error("IO error: {0}")]
    Io(String),
}

impl From<reqwest::Error> for AuthError {
    fn from(error: reqwest::Error) -> Self {
        Self::Network(error.to_string())
    }
}

impl From<std::io::Error> for AuthError {
    fn from(error: std::io::Error) -> Self {
        Self::Io(error.to_string())
    }
}

impl From<url::ParseError> for AuthError {
    fn from(error: url::ParseError) -> Self {
        Self::InvalidResponse(error.to_string())
    }
}
