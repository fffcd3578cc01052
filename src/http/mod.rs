//! HTTP facade: shared state, router and server loop.

mod handlers;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tokio::net::TcpListener;

use crate::config::AppConfig;
use crate::csrf::StateStore;
use crate::error::{AuthError, Result};
use crate::github::{self, DeviceFlowCoordinator, WebFlow};

/// Shared state behind every route.
#[derive(Clone)]
pub struct AppState {
    pub device: Arc<DeviceFlowCoordinator>,
    pub web: Arc<WebFlow>,
    pub states: Arc<StateStore>,
}

impl AppState {
    /// Wire both flows up from configuration.
    ///
    /// The web flow cannot work without the client secret, so a missing one
    /// fails here at startup rather than on the first callback.
    pub fn from_config(config: &AppConfig) -> Result<Self> {
        let client_secret = config.client_secret.clone().ok_or_else(|| {
            AuthError::Configuration(
                "GITHUB_CLIENT_SECRET is not set (required for the web flow)".to_string(),
            )
        })?;
        let http = github::default_http_client()?;
        let device = DeviceFlowCoordinator::new(config.client_id.clone())
            .with_http_client(http.clone())
            .with_default_scope(config.default_scope.clone());
        let web = WebFlow::new(
            config.client_id.clone(),
            client_secret,
            config.redirect_uri.clone(),
        )
        .with_http_client(http)
        .with_default_scope(config.default_scope.clone());

        Ok(Self {
            device: Arc::new(device),
            web: Arc::new(web),
            states: Arc::new(StateStore::default()),
        })
    }
}

/// All gateway routes over the given state.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(handlers::index))
        .route("/login", get(handlers::login))
        .route("/callback", get(handlers::callback))
        .route("/exchange", post(handlers::exchange))
        .route("/device/start", post(handlers::device_start))
        .route("/device/poll", post(handlers::device_poll))
        .with_state(state)
}

/// Serve until ctrl-c.
pub async fn serve(state: AppState, addr: SocketAddr) -> Result<()> {
    let listener = TcpListener::bind(addr).await?;
    let addr = listener.local_addr()?;
    tracing::info!(%addr, "octogate listening");
    axum::serve(listener, router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
