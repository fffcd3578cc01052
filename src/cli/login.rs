//! Terminal login over the device flow.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::github::{self, DeviceFlowCoordinator};
use crate::poll::{FlowEvent, FlowOutcome, PollingClient};

/// Handle `octogate login [--scope <scope>]`.
pub async fn handle_login(scope: Option<String>) -> Result<(), Box<dyn std::error::Error>> {
    let config = AppConfig::from_env()?;
    let http = github::default_http_client()?;
    let coordinator = DeviceFlowCoordinator::new(config.client_id.clone())
        .with_http_client(http)
        .with_default_scope(config.default_scope.clone());

    let sink = Arc::new(|event: FlowEvent| {
        if let FlowEvent::SlowedDown { interval } = event {
            println!(
                "🐢 GitHub asked for a slower pace; polling every {}s now",
                interval.as_secs()
            );
        }
    });

    let client = PollingClient::new(Arc::new(coordinator)).with_event_sink(sink);
    let handle = client.begin(scope.as_deref().unwrap_or("")).await?;
    {
        let authorization = handle.authorization();
        println!("🔗 Visit: {}", authorization.verification_uri);
        println!("📋 Enter code: {}", authorization.user_code);
        println!("⏳ Waiting for authorization...");
    }

    match handle.wait().await {
        FlowOutcome::Authorized(granted) => {
            match &granted.user {
                Some(user) => println!("✅ Logged in as {}", user.login),
                None => println!("✅ Logged in (profile lookup failed, token still valid)"),
            }
            println!("   Token: {}", mask_token(&granted.token.access_token));
            Ok(())
        }
        FlowOutcome::Expired => {
            eprintln!("❌ Device code expired, please try again");
            std::process::exit(1);
        }
        FlowOutcome::Failed(failure) => {
            eprintln!("❌ {failure}");
            std::process::exit(1);
        }
        FlowOutcome::Canceled => {
            eprintln!("❌ Login canceled");
            std::process::exit(1);
        }
    }
}

/// Show enough of the token to confirm receipt without echoing a secret.
fn mask_token(token: &str) -> String {
    if token.len() <= 8 {
        return "********".to_string();
    }
    let mut end = 8;
    while end > 0 && !token.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &token[..end])
}
