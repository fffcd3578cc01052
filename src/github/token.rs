//! Token-endpoint payloads shared by the device and web flows.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::github::identity::UserProfile;

/// A granted access token, passed through as GitHub sent it.
///
/// GitHub may attach fields beyond the standard three (`refresh_token` and
/// friends on apps with expiring tokens); those ride along in `extra`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenPayload {
    pub access_token: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// A completed authorization: the token plus the profile fetched with it.
///
/// `user` is `None` when the profile lookup failed after the token was
/// granted; the token is kept and `profile_error` records why the profile
/// is missing.
#[derive(Debug, Clone, Serialize)]
pub struct Authorization {
    pub token: TokenPayload,
    pub user: Option<UserProfile>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub profile_error: Option<String>,
}

/// Raw token-endpoint response.
///
/// GitHub answers 200 for grants and protocol signals alike, so the token
/// fields and the error fields coexist in one shape.
#[derive(Debug, Deserialize)]
pub(crate) struct TokenEndpointResponse {
    pub access_token: Option<String>,
    pub token_type: Option<String>,
    pub scope: Option<String>,
    pub error: Option<String>,
    pub error_description: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TokenEndpointResponse {
    /// The grant, when one is present.
    pub fn into_token(self) -> Option<TokenPayload> {
        let access_token = self.access_token?;
        Some(TokenPayload {
            access_token,
            token_type: self.token_type,
            scope: self.scope,
            extra: self.extra,
        })
    }

    /// Rebuild the provider's error body for pass-through display.
    pub fn into_error_details(self) -> Value {
        let mut details = Map::new();
        if let Some(error) = self.error {
            details.insert("error".to_string(), Value::String(error));
        }
        if let Some(description) = self.error_description {
            details.insert("error_description".to_string(), Value::String(description));
        }
        details.extend(self.extra);
        Value::Object(details)
    }
}
