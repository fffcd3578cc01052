//! Browser redirect flow: authorize URL and code exchange.

use serde_json::Value;
use url::Url;

use crate::error::{AuthError, Result};
use crate::github::identity;
use crate::github::token::{Authorization, TokenEndpointResponse};
use crate::github::{DEFAULT_ACCESS_TOKEN_URL, DEFAULT_AUTHORIZE_URL, DEFAULT_USER_API_URL};

/// Result of exchanging a callback code.
///
/// A declined exchange (bad, expired or reused code) is data so the caller
/// can pass the provider's verdict through; `Err` from
/// [`WebFlow::exchange_code`] means no usable response was obtained.
#[derive(Debug, Clone)]
pub enum ExchangeOutcome {
    Authorized(Authorization),
    Declined { error: String, details: Value },
}

/// Driver for the classic client-secret web flow.
pub struct WebFlow {
    client: reqwest::Client,
    client_id: String,
    client_secret: String,
    redirect_uri: String,
    default_scope: String,
    authorize_url: String,
    access_token_url: String,
    user_api_url: String,
}

impl WebFlow {
    pub fn new(
        client_id: impl Into<String>,
        client_secret: impl Into<String>,
        redirect_uri: impl Into<String>,
    ) -> Self {
        Self {
            client: reqwest::Client::new(),
            client_id: client_id.into(),
            client_secret: client_secret.into(),
            redirect_uri: redirect_uri.into(),
            default_scope: super::DEFAULT_SCOPE.to_string(),
            authorize_url: DEFAULT_AUTHORIZE_URL.to_string(),
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

    pub fn with_authorize_url(mut self, url: impl Into<String>) -> Self {
        self.authorize_url = url.into();
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

    /// Browser URL that begins the redirect flow, carrying `state` for CSRF
    /// validation on the way back.
    pub fn authorization_url(&self, state: &str) -> Result<String> {
        let mut url = Url::parse(&self.authorize_url)?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("client_id", &self.client_id);
            pairs.append_pair("redirect_uri", &self.redirect_uri);
            pairs.append_pair("scope", &self.default_scope);
            pairs.append_pair("state", state);
        }
        Ok(url.to_string())
    }

    /// Exchange a callback `code` for a token plus profile.
    ///
    /// An empty code is rejected before any network activity.
    pub async fn exchange_code(&self, code: &str) -> Result<ExchangeOutcome> {
        if code.trim().is_empty() {
            return Err(AuthError::CodeRequired);
        }
        let resp = self
            .client
            .post(&self.access_token_url)
            .header("Accept", "application/json")
            .header("Content-Type", "application/x-www-form-urlencoded")
            .form(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("code", code),
                ("redirect_uri", self.redirect_uri.as_str()),
            ])
            .send()
            .await?;
        if !resp.status().is_success() {
            return Err(AuthError::InvalidResponse(format!(
                "token exchange failed with status {}",
                resp.status()
            )));
        }
        let payload: TokenEndpointResponse = resp.json().await?;

        if let Some(error) = payload.error.clone() {
            tracing::debug!(error = %error, "code exchange declined");
            return Ok(ExchangeOutcome::Declined {
                error,
                details: payload.into_error_details(),
            });
        }
        match payload.into_token() {
            Some(token) => {
                let granted =
                    identity::complete_authorization(&self.client, &self.user_api_url, token).await;
                Ok(ExchangeOutcome::Authorized(granted))
            }
            None => Err(AuthError::InvalidResponse(
                "token response carries neither access_token nor error".to_string(),
            )),
        }
    }
}
