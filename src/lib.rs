//! Octogate: a GitHub OAuth gateway.
//!
//! Implements both GitHub sign-in shapes: the browser redirect flow with
//! CSRF state tracking and server-side code exchange, and the device
//! authorization flow driven by an adaptive polling state machine. An HTTP
//! facade exposes the flows to frontends; a terminal login command drives
//! the device flow directly.
//!
//! # Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use octogate::github::DeviceFlowCoordinator;
//! use octogate::poll::{FlowOutcome, PollingClient};
//!
//! # async fn example() -> octogate::Result<()> {
//! let flow = Arc::new(DeviceFlowCoordinator::new("Iv1.example"));
//! let client = PollingClient::new(flow);
//! let handle = client.begin("").await?;
//! println!(
//!     "Visit {} and enter {}",
//!     handle.authorization().verification_uri,
//!     handle.authorization().user_code
//! );
//! if let FlowOutcome::Authorized(granted) = handle.wait().await {
//!     println!("token: {}", granted.token.access_token);
//! }
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod config;
pub mod csrf;
pub mod error;
pub mod github;
pub mod http;
pub mod poll;

pub use error::{AuthError, Result};
