#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use tokio::time::{Duration, Instant};

use octogate::github::{
    Authorization, DeviceAuthorization, DeviceFlow, PollOutcome, TokenPayload, UserProfile,
};
use octogate::poll::{FlowEvent, FlowEventSink};
use octogate::{AuthError, Result};

/// One recorded call to [`ScriptedFlow::poll`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollRecord {
    pub device_code: String,
    pub offset: Duration,
}

/// Scripted [`DeviceFlow`] for driving the polling client without a server.
///
/// Each `start` hands out `dc-1`, `dc-2`, ... so polls can be attributed
/// to the flow that issued them. Poll answers come from a queue; once the
/// queue runs dry every further poll answers `authorization_pending`.
/// Offsets are measured on the tokio clock from construction.
pub struct ScriptedFlow {
    interval: u64,
    expires_in: u64,
    poll_delay: Option<Duration>,
    origin: Instant,
    starts: AtomicUsize,
    start_error: Mutex<Option<String>>,
    plan: Mutex<VecDeque<Result<PollOutcome>>>,
    polls: Mutex<Vec<PollRecord>>,
    in_flight: AtomicBool,
    overlapped: AtomicBool,
}

impl ScriptedFlow {
    pub fn new() -> Self {
        Self {
            interval: 5,
            expires_in: 900,
            poll_delay: None,
            origin: Instant::now(),
            starts: AtomicUsize::new(0),
            start_error: Mutex::new(None),
            plan: Mutex::new(VecDeque::new()),
            polls: Mutex::new(Vec::new()),
            in_flight: AtomicBool::new(false),
            overlapped: AtomicBool::new(false),
        }
    }

    pub fn with_interval(mut self, interval: u64) -> Self {
        self.interval = interval;
        self
    }

    pub fn with_expires_in(mut self, expires_in: u64) -> Self {
        self.expires_in = expires_in;
        self
    }

    /// Make each poll spend `delay` on the clock before answering.
    pub fn with_poll_delay(mut self, delay: Duration) -> Self {
        self.poll_delay = Some(delay);
        self
    }

    /// Make the next `start` fail with the given cause.
    pub fn fail_next_start(&self, cause: &str) {
        *self.start_error.lock().expect("start_error lock") = Some(cause.to_string());
    }

    pub fn enqueue(&self, outcome: PollOutcome) {
        self.plan.lock().expect("plan lock").push_back(Ok(outcome));
    }

    pub fn enqueue_error(&self, error: AuthError) {
        self.plan.lock().expect("plan lock").push_back(Err(error));
    }

    pub fn polls(&self) -> Vec<PollRecord> {
        self.polls.lock().expect("polls lock").clone()
    }

    pub fn poll_count(&self) -> usize {
        self.polls.lock().expect("polls lock").len()
    }

    pub fn offsets(&self) -> Vec<Duration> {
        self.polls().into_iter().map(|record| record.offset).collect()
    }

    pub fn poll_codes(&self) -> Vec<String> {
        self.polls()
            .into_iter()
            .map(|record| record.device_code)
            .collect()
    }

    /// Whether two polls were ever on the wire at the same time.
    pub fn overlapped(&self) -> bool {
        self.overlapped.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DeviceFlow for ScriptedFlow {
    async fn start(&self, _scope: &str) -> Result<DeviceAuthorization> {
        if let Some(cause) = self.start_error.lock().expect("start_error lock").take() {
            return Err(AuthError::DeviceStart(cause));
        }
        let n = self.starts.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(DeviceAuthorization {
            device_code: format!("dc-{n}"),
            user_code: "ABCD-1234".to_string(),
            verification_uri: "https://github.com/login/device".to_string(),
            expires_in: self.expires_in,
            interval: self.interval,
            extra: Map::new(),
        })
    }

    async fn poll(&self, device_code: &str) -> Result<PollOutcome> {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            self.overlapped.store(true, Ordering::SeqCst);
        }
        self.polls.lock().expect("polls lock").push(PollRecord {
            device_code: device_code.to_string(),
            offset: self.origin.elapsed(),
        });
        if let Some(delay) = self.poll_delay {
            tokio::time::sleep(delay).await;
        }
        let outcome = self
            .plan
            .lock()
            .expect("plan lock")
            .pop_front()
            .unwrap_or(Ok(PollOutcome::Pending));
        self.in_flight.store(false, Ordering::SeqCst);
        outcome
    }
}

/// Sink that appends every event to a shared vector.
pub fn event_recorder() -> (FlowEventSink, Arc<Mutex<Vec<FlowEvent>>>) {
    let events = Arc::new(Mutex::new(Vec::new()));
    let record = events.clone();
    let sink: FlowEventSink = Arc::new(move |event| {
        record.lock().expect("events lock").push(event);
    });
    (sink, events)
}

pub fn event_labels(events: &[FlowEvent]) -> Vec<&'static str> {
    events
        .iter()
        .map(|event| match event {
            FlowEvent::Started { .. } => "started",
            FlowEvent::PollSent => "poll_sent",
            FlowEvent::Pending => "pending",
            FlowEvent::SlowedDown { .. } => "slowed_down",
            FlowEvent::Finished { .. } => "finished",
        })
        .collect()
}

/// A completed authorization for scripting `PollOutcome::Authorized`.
pub fn granted(login: &str) -> Authorization {
    Authorization {
        token: TokenPayload {
            access_token: "gho_scripted".to_string(),
            token_type: Some("bearer".to_string()),
            scope: Some("read:user".to_string()),
            extra: Map::new(),
        },
        user: Some(UserProfile {
            login: login.to_string(),
            avatar_url: "https://avatars.githubusercontent.com/u/1?v=4".to_string(),
            id: Some(1),
            name: None,
            extra: Map::new(),
        }),
        profile_error: None,
    }
}

/// The verification payload GitHub answers `POST /login/device/code` with.
pub fn device_code_body() -> Value {
    json!({
        "device_code": "device-123",
        "user_code": "ABCD-EFGH",
        "verification_uri": "https://github.com/login/device",
        "expires_in": 899,
        "interval": 5
    })
}

/// A granted token as the access-token endpoint reports it.
pub fn grant_body() -> Value {
    json!({
        "access_token": "gho_123",
        "token_type": "bearer",
        "scope": "read:user,user:email"
    })
}

/// The user object behind `GET /user`, trimmed to the interesting fields.
pub fn user_body() -> Value {
    json!({
        "login": "octocat",
        "id": 583231,
        "avatar_url": "https://avatars.githubusercontent.com/u/583231?v=4",
        "name": "The Octocat"
    })
}
