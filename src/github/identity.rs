//! Authenticated-user lookup against the GitHub API.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::{AuthError, Result};
use crate::github::token::{Authorization, TokenPayload};

/// The fields of the GitHub user object the gateway names, with the rest of
/// the payload carried through untouched in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserProfile {
    pub login: String,
    pub avatar_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Fetch the profile belonging to an access token.
pub(crate) async fn fetch_user(
    client: &reqwest::Client,
    user_api_url: &str,
    access_token: &str,
) -> Result<UserProfile> {
    let resp = client
        .get(user_api_url)
        .header("Accept", "application/json")
        .header("Authorization", format!("token {access_token}"))
        .header("User-Agent", super::USER_AGENT)
        .send()
        .await?;
    if !resp.status().is_success() {
        return Err(AuthError::InvalidResponse(format!(
            "User lookup failed with status {}",
            resp.status()
        )));
    }
    Ok(resp.json().await?)
}

/// Attach the profile to a fresh grant.
///
/// A failed lookup does not void the token; it leaves `user` empty and
/// records the cause in `profile_error`.
pub(crate) async fn complete_authorization(
    client: &reqwest::Client,
    user_api_url: &str,
    token: TokenPayload,
) -> Authorization {
    match fetch_user(client, user_api_url, &token.access_token).await {
        Ok(user) => Authorization {
            token,
            user: Some(user),
            profile_error: None,
        },
        Err(error) => {
            tracing::warn!(error = %error, "token granted but profile fetch failed");
            Authorization {
                token,
                user: None,
                profile_error: Some(error.to_string()),
            }
        }
    }
}
