//! Request handlers for the gateway routes.

use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Redirect, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::AuthError;
use crate::github::{Authorization, ExchangeOutcome, PollOutcome};

use super::AppState;

#[derive(Debug, Default, Deserialize)]
pub(super) struct DeviceStartRequest {
    #[serde(default)]
    scope: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct DevicePollRequest {
    #[serde(default)]
    device_code: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub(super) struct ExchangeRequest {
    #[serde(default)]
    code: Option<String>,
    #[serde(default)]
    state: Option<String>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CallbackQuery {
    code: Option<String>,
    state: Option<String>,
    error: Option<String>,
}

/// `GET /`: liveness banner.
pub(super) async fn index() -> Json<Value> {
    Json(json!({ "service": "octogate", "status": "ok" }))
}

/// `GET /login`: issue a state value and bounce the browser to GitHub.
pub(super) async fn login(State(state): State<AppState>) -> Response {
    let csrf = state.states.issue();
    match state.web.authorization_url(&csrf) {
        Ok(url) => Redirect::to(&url).into_response(),
        Err(error) => {
            tracing::warn!(error = %error, "authorize URL construction failed");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "login_failed")
        }
    }
}

/// `GET /callback`: validate the returned state, exchange the code
/// server-side and answer with the same JSON `/exchange` produces.
pub(super) async fn callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Response {
    // GitHub reports a user-declined web flow on the redirect itself.
    if let Some(error) = query.error {
        tracing::debug!(error = %error, "authorize redirect carried an error");
        return error_json(StatusCode::BAD_REQUEST, &error);
    }
    run_exchange(&state, query.code.as_deref(), query.state.as_deref()).await
}

/// `POST /exchange`: validate state and trade the code for a token.
pub(super) async fn exchange(State(state): State<AppState>, body: String) -> Response {
    let request: ExchangeRequest = parse_lenient(&body);
    run_exchange(&state, request.code.as_deref(), request.state.as_deref()).await
}

async fn run_exchange(state: &AppState, code: Option<&str>, csrf: Option<&str>) -> Response {
    let Some(code) = code.filter(|value| !value.trim().is_empty()) else {
        return error_json(StatusCode::BAD_REQUEST, "missing_code");
    };
    match csrf {
        Some(value) if state.states.consume(value) => {}
        _ => {
            tracing::warn!("callback state missing, unknown or expired");
            return error_json(StatusCode::BAD_REQUEST, "invalid_state");
        }
    }

    match state.web.exchange_code(code).await {
        Ok(ExchangeOutcome::Authorized(granted)) => authorized_response(granted),
        Ok(ExchangeOutcome::Declined { error, details }) => (
            StatusCode::BAD_REQUEST,
            Json(json!({ "error": error, "details": details })),
        )
            .into_response(),
        Err(AuthError::CodeRequired) => error_json(StatusCode::BAD_REQUEST, "missing_code"),
        Err(error) => {
            tracing::warn!(error = %error, "code exchange failed");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "exchange_failed")
        }
    }
}

/// `POST /device/start`: begin a device flow and pass GitHub's verification
/// payload through verbatim.
pub(super) async fn device_start(State(state): State<AppState>, body: String) -> Response {
    let request: DeviceStartRequest = parse_lenient(&body);
    let scope = request.scope.as_deref().unwrap_or("");
    match state.device.start(scope).await {
        Ok(authorization) => Json(authorization).into_response(),
        Err(error) => {
            tracing::warn!(error = %error, "device flow start failed");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "device_start_failed")
        }
    }
}

/// `POST /device/poll`: poll the token endpoint once on the caller's behalf.
pub(super) async fn device_poll(State(state): State<AppState>, body: String) -> Response {
    let request: DevicePollRequest = parse_lenient(&body);
    let device_code = request.device_code.as_deref().unwrap_or("");
    match state.device.poll(device_code).await {
        Ok(PollOutcome::Authorized(granted)) => authorized_response(granted),
        Ok(PollOutcome::TransportError { cause }) => {
            tracing::warn!(cause = %cause, "device flow poll failed");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "device_poll_failed")
        }
        // Pending, SlowDown, Expired, Denied and OtherError all carry a
        // wire code; they are progress reports, not HTTP failures.
        Ok(outcome) => {
            Json(json!({ "success": false, "data": { "error": outcome.error_code() } }))
                .into_response()
        }
        Err(AuthError::DeviceCodeRequired) => {
            error_json(StatusCode::BAD_REQUEST, "device_code_required")
        }
        Err(error) => {
            tracing::warn!(error = %error, "device flow poll failed");
            error_json(StatusCode::INTERNAL_SERVER_ERROR, "device_poll_failed")
        }
    }
}

/// The success shape `/exchange`, `/callback` and `/device/poll` share:
/// token data passed through verbatim, profile attached when the lookup
/// succeeded.
fn authorized_response(granted: Authorization) -> Response {
    let mut body = json!({
        "success": true,
        "tokenData": granted.token,
        "user": granted.user,
    });
    if let Some(cause) = granted.profile_error {
        body["profile_error"] = Value::String(cause);
    }
    Json(body).into_response()
}

fn error_json(status: StatusCode, code: &str) -> Response {
    (status, Json(json!({ "error": code }))).into_response()
}

/// Tolerate absent and malformed JSON bodies; the field checks in each
/// handler produce the meaningful 400s. `/device/start` in particular is
/// routinely called with no body at all.
fn parse_lenient<T: Default + for<'de> Deserialize<'de>>(body: &str) -> T {
    if body.trim().is_empty() {
        return T::default();
    }
    serde_json::from_str(body).unwrap_or_default()
}
