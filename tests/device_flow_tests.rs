//! Device flow coordinator tests against a mocked GitHub.

mod support;

use serde_json::json;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use octogate::github::{DeviceFlowCoordinator, PollOutcome};
use octogate::AuthError;

use support::{device_code_body, grant_body, user_body};

fn coordinator(server: &MockServer) -> DeviceFlowCoordinator {
    DeviceFlowCoordinator::new("iv1.test")
        .with_device_code_url(format!("{}/login/device/code", server.uri()))
        .with_access_token_url(format!("{}/login/oauth/access_token", server.uri()))
        .with_user_api_url(format!("{}/user", server.uri()))
}

#[tokio::test]
async fn start_sends_the_form_and_returns_the_verification_handle() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/device/code"))
        .and(header("accept", "application/json"))
        .and(body_string_contains("client_id=iv1.test"))
        .and(body_string_contains("scope=read%3Auser+user%3Aemail"))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_code_body()))
        .expect(1)
        .mount(&server)
        .await;

    let flow = coordinator(&server);
    let authorization = flow.start("").await.expect("start device flow");

    assert_eq!(authorization.device_code, "device-123");
    assert_eq!(authorization.user_code, "ABCD-EFGH");
    assert_eq!(
        authorization.verification_uri,
        "https://github.com/login/device"
    );
    assert_eq!(authorization.expires_in, 899);
    assert_eq!(authorization.interval, 5);
}

#[tokio::test]
async fn start_passes_an_explicit_scope_through() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/device/code"))
        .and(body_string_contains("scope=repo"))
        .respond_with(ResponseTemplate::new(200).set_body_json(device_code_body()))
        .expect(1)
        .mount(&server)
        .await;

    let flow = coordinator(&server);
    flow.start("repo").await.expect("start device flow");
}

#[tokio::test]
async fn start_defaults_the_interval_when_github_omits_it() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/device/code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "device_code": "device-123",
            "user_code": "ABCD-EFGH",
            "verification_uri": "https://github.com/login/device",
            "expires_in": 899
        })))
        .expect(1)
        .mount(&server)
        .await;

    let flow = coordinator(&server);
    let authorization = flow.start("").await.expect("start device flow");

    assert_eq!(authorization.interval, 5);
}

#[tokio::test]
async fn start_rejects_a_non_success_status() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/device/code"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let flow = coordinator(&server);
    let result = flow.start("").await;

    assert!(
        matches!(result, Err(AuthError::DeviceStart(message)) if message.contains("503"))
    );
}

#[tokio::test]
async fn start_rejects_a_body_that_does_not_parse() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/device/code"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<!doctype html>"))
        .expect(1)
        .mount(&server)
        .await;

    let flow = coordinator(&server);
    let result = flow.start("").await;

    assert!(matches!(result, Err(AuthError::DeviceStart(_))));
}

#[tokio::test]
async fn start_reports_an_unreachable_provider() {
    let flow = DeviceFlowCoordinator::new("iv1.test")
        .with_device_code_url("http://127.0.0.1:1/login/device/code");

    let result = flow.start("").await;

    assert!(matches!(result, Err(AuthError::DeviceStart(_))));
}

#[tokio::test]
async fn poll_sends_the_device_grant_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .and(header("accept", "application/json"))
        .and(body_string_contains("client_id=iv1.test"))
        .and(body_string_contains("device_code=device-123"))
        .and(body_string_contains(
            "grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Adevice_code",
        ))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": "authorization_pending"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let flow = coordinator(&server);
    let outcome = flow.poll("device-123").await.expect("poll");

    assert!(matches!(outcome, PollOutcome::Pending));
}

#[tokio::test]
async fn poll_maps_each_protocol_code_onto_an_outcome() {
    for (code, probe) in [
        ("authorization_pending", "pending"),
        ("slow_down", "slow_down"),
        ("expired_token", "expired"),
        ("access_denied", "denied"),
        ("incorrect_device_code", "other"),
    ] {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/login/oauth/access_token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "error": code })))
            .expect(1)
            .mount(&server)
            .await;

        let flow = coordinator(&server);
        let outcome = flow.poll("device-123").await.expect("poll");

        let matched = match (&outcome, probe) {
            (PollOutcome::Pending, "pending") => true,
            (PollOutcome::SlowDown, "slow_down") => true,
            (PollOutcome::Expired, "expired") => true,
            (PollOutcome::Denied, "denied") => true,
            (PollOutcome::OtherError { code: got }, "other") => got.as_str() == code,
            _ => false,
        };
        assert!(matched, "code {code} mapped to {outcome:?}");
    }
}

#[tokio::test]
async fn poll_authorized_fetches_the_profile_with_the_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .and(header("authorization", "token gho_123"))
        .and(header_exists("user-agent"))
        .respond_with(ResponseTemplate::new(200).set_body_json(user_body()))
        .expect(1)
        .mount(&server)
        .await;

    let flow = coordinator(&server);
    let outcome = flow.poll("device-123").await.expect("poll");

    let granted = match outcome {
        PollOutcome::Authorized(granted) => granted,
        other => panic!("expected authorized, got {other:?}"),
    };
    assert_eq!(granted.token.access_token, "gho_123");
    assert_eq!(granted.token.scope.as_deref(), Some("read:user,user:email"));
    let user = granted.user.expect("user profile");
    assert_eq!(user.login, "octocat");
    assert_eq!(user.id, Some(583231));
    assert!(granted.profile_error.is_none());
}

#[tokio::test]
async fn poll_keeps_the_token_when_the_profile_fetch_fails() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant_body()))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/user"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let flow = coordinator(&server);
    let outcome = flow.poll("device-123").await.expect("poll");

    let granted = match outcome {
        PollOutcome::Authorized(granted) => granted,
        other => panic!("expected authorized, got {other:?}"),
    };
    assert_eq!(granted.token.access_token, "gho_123");
    assert!(granted.user.is_none());
    assert!(granted
        .profile_error
        .expect("profile error")
        .contains("500"));
}

#[tokio::test]
async fn poll_turns_a_non_success_status_into_a_transport_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(502))
        .expect(1)
        .mount(&server)
        .await;

    let flow = coordinator(&server);
    let outcome = flow.poll("device-123").await.expect("poll");

    assert!(
        matches!(outcome, PollOutcome::TransportError { cause } if cause.contains("502"))
    );
}

#[tokio::test]
async fn poll_turns_an_unparseable_body_into_a_transport_outcome() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .expect(1)
        .mount(&server)
        .await;

    let flow = coordinator(&server);
    let outcome = flow.poll("device-123").await.expect("poll");

    assert!(matches!(outcome, PollOutcome::TransportError { .. }));
}

#[tokio::test]
async fn poll_rejects_a_body_with_neither_token_nor_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let flow = coordinator(&server);
    let outcome = flow.poll("device-123").await.expect("poll");

    assert!(
        matches!(outcome, PollOutcome::TransportError { cause } if cause.contains("neither"))
    );
}

#[tokio::test]
async fn poll_rejects_an_empty_device_code_before_any_request() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/login/oauth/access_token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(grant_body()))
        .expect(0)
        .mount(&server)
        .await;

    let flow = coordinator(&server);

    assert!(matches!(
        flow.poll("").await,
        Err(AuthError::DeviceCodeRequired)
    ));
    assert!(matches!(
        flow.poll("   ").await,
        Err(AuthError::DeviceCodeRequired)
    ));
}
