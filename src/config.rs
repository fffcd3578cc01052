//! Environment-driven configuration.

use std::net::SocketAddr;

use crate::error::{AuthError, Result};

/// Port the HTTP facade listens on when `PORT` is not set.
pub const DEFAULT_PORT: u16 = 3000;

/// Runtime configuration for the gateway.
///
/// Credentials are never baked in: `GITHUB_CLIENT_ID` must be present in the
/// environment (or a `.env` file). The client secret is optional because the
/// device flow does not use one; constructing the web flow without it fails
/// at startup instead.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub client_id: String,
    pub client_secret: Option<String>,
    pub redirect_uri: String,
    pub port: u16,
    pub default_scope: String,
}

impl AppConfig {
    /// Load from environment variables, reading `.env` first if present.
    pub fn from_env() -> Result<Self> {
        let _ = dotenvy::dotenv(); // load .env if present, ignore error
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    ///
    /// `from_env` delegates here; tests inject closures instead of mutating
    /// the process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let lookup = |key: &str| lookup(key).filter(|value| !value.is_empty());

        let client_id = lookup("GITHUB_CLIENT_ID")
            .ok_or_else(|| AuthError::Configuration("GITHUB_CLIENT_ID is not set".to_string()))?;
        let client_secret = lookup("GITHUB_CLIENT_SECRET");
        let port = match lookup("PORT") {
            Some(raw) => raw.parse::<u16>().map_err(|_| {
                AuthError::Configuration(format!("PORT is not a valid port number: {raw}"))
            })?,
            None => DEFAULT_PORT,
        };
        let redirect_uri = lookup("REDIRECT_URI")
            .unwrap_or_else(|| format!("http://localhost:{port}/callback"));
        let default_scope =
            lookup("OAUTH_SCOPE").unwrap_or_else(|| crate::github::DEFAULT_SCOPE.to_string());

        Ok(Self {
            client_id,
            client_secret,
            redirect_uri,
            port,
            default_scope,
        })
    }

    /// Address the HTTP facade binds to.
    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::from(([0, 0, 0, 0], self.port))
    }
}
