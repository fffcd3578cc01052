//! GitHub OAuth provider integration: device and web flows.

pub mod device;
pub mod identity;
pub mod token;
pub mod web;

pub use device::{DeviceAuthorization, DeviceFlow, DeviceFlowCoordinator, PollOutcome};
pub use identity::UserProfile;
pub use token::{Authorization, TokenPayload};
pub use web::{ExchangeOutcome, WebFlow};

use crate::error::Result;

/// Scope requested when the caller does not name one.
pub const DEFAULT_SCOPE: &str = "read:user user:email";

pub const DEFAULT_AUTHORIZE_URL: &str = "https://github.com/login/oauth/authorize";
pub const DEFAULT_DEVICE_CODE_URL: &str = "https://github.com/login/device/code";
pub const DEFAULT_ACCESS_TOKEN_URL: &str = "https://github.com/login/oauth/access_token";
pub const DEFAULT_USER_API_URL: &str = "https://api.github.com/user";

/// GitHub rejects API calls without a User-Agent.
pub(crate) const USER_AGENT: &str = concat!("octogate/", env!("CARGO_PKG_VERSION"));

/// HTTP client the facade and CLI share: 30 second overall timeout so a
/// stalled poll surfaces as a transport failure instead of hanging.
pub fn default_http_client() -> Result<reqwest::Client> {
    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;
    Ok(client)
}
