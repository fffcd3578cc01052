//! Device authorization grant: flow start and token polling.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthError, Result};
use crate::github::identity;
use crate::github::token::{Authorization, TokenEndpointResponse};
use crate::github::{DEFAULT_ACCESS_TOKEN_URL, DEFAULT_DEVICE_CODE_URL, DEFAULT_USER_API_URL};

const DEVICE_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:device_code";
const DEFAULT_INTERVAL_SECS: u64 = 5;

/// Verification handle GitHub issues when a device flow starts, passed
/// through to callers as the provider sent it. Fields beyond the standard
/// five ride along in `extra`.
///
/// `interval` is the polling cadence in seconds; it defaults to 5 when the
/// provider omits it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceAuthorization {
    pub device_code: String,
    pub user_code: String,
    pub verification_uri: String,
    pub expires_in: u64,
    #[serde(default = "default_interval")]
    pub interval: u64,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

fn default_interval() -> u64 {
    DEFAULT_INTERVAL_SECS
}

impl DeviceAuthorization {
    /// Polling cadence as a duration.
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.interval)
    }
}

/// Result of one poll of the token endpoint.
///
/// GitHub reports flow progress through `error` codes on 200 responses, so
/// every code is data here rather than an `Err`. Failing to obtain a
/// response at all is data too (`TransportError`), which lets callers tell
/// "provider unreachable" apart from "user has not finished yet".
#[derive(Debug, Clone)]
pub enum PollOutcome {
    /// The user approved; carries the token and a best-effort profile.
    Authorized(Authorization),
    /// `authorization_pending`: keep polling at the current cadence.
    Pending,
    /// `slow_down`: keep polling at a reduced cadence.
    SlowDown,
    /// `expired_token`: the device code is dead, a new flow is needed.
    Expired,
    /// `access_denied`: the user rejected the request.
    Denied,
    /// Any other protocol error code the provider returned.
    OtherError { code: String },
    /// No usable response: connect failure, timeout, non-2xx status, or a
    /// body that does not parse.
    TransportError { cause: String },
}

impl PollOutcome {
    /// Wire code for the protocol-signal variants.
    pub fn error_code(&self) -> Option<&str> {
        match self {
            Self::Pending => Some("authorization_pending"),
            Self::SlowDown => Some("slow_down"),
            Self::Expired => Some("expired_token"),
            Self::Denied => Some("access_denied"),
            Self::OtherError { code } => Some(code),
            Self::Authorized(_) | Self::TransportError { .. } => None,
        }
    }
}

/// Device-flow operations the polling client drives.
///
/// [`DeviceFlowCoordinator`] is the production implementation; tests inject
/// scripted ones.
#[async_trait]
pub trait DeviceFlow: Send + Sync {
    /// Begin a flow, yielding the verification handle to show the user.
    async fn start(&self, scope: &str) -> Result<DeviceAuthorization>;
    /// Ask the provider once whether the user has finished.
    async fn poll(&self, device_code: &str) -> Result<PollOutcome>;
}

/// Stateless driver for the GitHub device authorization grant.
///
/// Holds no per-flow state: callers keep the [`DeviceAuthorization`] and
/// hand its `device_code` back on every poll. Expiry is the provider's
/// call alone; polling past the advertised `expires_in` just yields
/// [`PollOutcome::Expired`] once GitHub says so.
///
/// # Example
/// ```no_run
/// use octogate::github::{DeviceFlowCoordinator, PollOutcome};
///
/// # async fn example() -> octogate::Result<()> {
/// let flow = DeviceFlowCoordinator::new("Iv1.example");
/// let authorization = flow.start("").await?;
/// println!(
///     "Visit {} and enter {}",
///     authorization.verification_uri, authorization.user_code
/// );
/// if let PollOutcome::Authorized(granted) = flow.poll(&authorization.device_code).await? {
///     println!("token: {}", granted.token.access_token);
/// }
/// # Ok(())
/// # }
/// ```
pub struct DeviceFlowCoordinator {
    client: reqwest::Client,
    client_id: String,
    default_scope: String,
    device_code_url: String,
    access_token_url: String,
    user_api_url: String,
}

impl DeviceFlowCoordinator {
    pub fn new(client_id: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            default_scope: super::DEFAULT_SCOPE.to_string(),
            device_code_url: DEFAULT_DEVICE_CODE_URL.to_string(),
            access_token_url: DEFAULT_ACCESS_TOKEN_URL.to_string(),
            user_api_url: DEFAULT_USER_API_URL.to_string(),
        }
    }

    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    pub fn with_default_scope(mut self, scope: impl Into<String>) -> Self {
        self.default_scope = scope.into();
        self
    }

    pub fn with_device_code_url(mut self, url: impl Into<String>) -> Self {
        self.device_code_url = url.into();
        self
    }

    pub fn with_access_token_url(mut self, url: impl Into<String>) -> Self {
        self.access_token_url = url.into();
        self
    }

    pub fn with_user_api_url(mut self, url: impl Into<String>) -> Self {
        self.user_api_url = url.into();
        self
    }

    /// Ask GitHub to begin a device flow.
    ///
    /// An empty `scope` falls back to the configured default. Network
    /// failures, non-2xx statuses and unparseable bodies all surface as
    /// [`AuthError::DeviceStart`].
    pub async fn start(&self, scope: &str) -> Result<DeviceAuthorization> {
        let scope = if scope.trim().is_empty() {
            self.default_scope.as_str()
        } else {
            scope
        };
        let resp = self
            .client
            .post(&self.device_code_url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&[("client_id", self.client_id.as_str()), ("scope", scope)])
            .send()
            .await
            .map_err(|error| AuthError::DeviceStart(error.to_string()))?;
        if !resp.status().is_success() {
            return Err(AuthError::DeviceStart(format!(
                "device code request failed with status {}",
                resp.status()
            )));
        }
        let authorization: DeviceAuthorization = resp
            .json()
            .await
            .map_err(|error| AuthError::DeviceStart(error.to_string()))?;
        tracing::debug!(
            user_code = %authorization.user_code,
            interval = authorization.interval,
            "device flow started"
        );
        Ok(authorization)
    }

    /// Poll the token endpoint once for `device_code`.
    ///
    /// An empty code is rejected before any network activity. Everything
    /// the provider can answer maps onto [`PollOutcome`]; the only `Err`
    /// this returns is the empty-code contract violation.
    pub async fn poll(&self, device_code: &str) -> Result<PollOutcome> {
        if device_code.trim().is_empty() {
            return Err(AuthError::DeviceCodeRequired);
        }
        let resp = match self
            .client
            .post(&self.access_token_url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("device_code", device_code),
                ("grant_type", DEVICE_GRANT_TYPE),
            ])
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(error) => {
                return Ok(PollOutcome::TransportError {
                    cause: error.to_string(),
                })
            }
        };
        if !resp.status().is_success() {
            return Ok(PollOutcome::TransportError {
                cause: format!("token request failed with status {}", resp.status()),
            });
        }
        let mut payload: TokenEndpointResponse = match resp.json().await {
            Ok(payload) => payload,
            Err(error) => {
                return Ok(PollOutcome::TransportError {
                    cause: error.to_string(),
                })
            }
        };

        if let Some(code) = payload.error.take() {
            return Ok(match code.as_str() {
                "authorization_pending" => PollOutcome::Pending,
                "slow_down" => PollOutcome::SlowDown,
                "expired_token" => PollOutcome::Expired,
                "access_denied" => PollOutcome::Denied,
                _ => PollOutcome::OtherError { code },
            });
        }
        match payload.into_token() {
            Some(token) => {
                let granted =
                    identity::complete_authorization(&self.client, &self.user_api_url, token).await;
                Ok(PollOutcome::Authorized(granted))
            }
            None => Ok(PollOutcome::TransportError {
                cause: "token response carries neither access_token nor error".to_string(),
            }),
        }
    }
}

#[async_trait]
impl DeviceFlow for DeviceFlowCoordinator {
    async fn start(&self, scope: &str) -> Result<DeviceAuthorization> {
        DeviceFlowCoordinator::start(self, scope).await
    }

    async fn poll(&self, device_code: &str) -> Result<PollOutcome> {
        DeviceFlowCoordinator::poll(self, device_code).await
    }
}
