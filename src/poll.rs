//! Device-flow polling state machine.
//!
//! One logical timer drives each flow: the first poll fires after a short
//! warm-up, later polls follow the provider's interval, and `slow_down`
//! stretches the interval in place. A generation counter guards every state
//! write and event, so a superseded or cancelled flow cannot poll again,
//! re-arm its timer, or publish stale transitions.

use std::sync::{Arc, Mutex};

use tokio::sync::oneshot;
use tokio::time::{self, Duration};

use crate::error::{AuthError, Result};
use crate::github::{Authorization, DeviceAuthorization, DeviceFlow, PollOutcome};

/// Callback used for observing flow transitions.
pub type FlowEventSink = Arc<dyn Fn(FlowEvent) + Send + Sync>;

/// Timing knobs for the polling loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Delay before the very first poll of a flow.
    pub warmup: Duration,
    /// How much each `slow_down` adds to the interval. The increase is
    /// monotonic; nothing ever shrinks the interval back.
    pub slow_down_step: Duration,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            warmup: Duration::from_millis(1000),
            slow_down_step: Duration::from_secs(5),
        }
    }
}

/// Where the machine currently stands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FlowState {
    Idle,
    /// The provider is being asked for a verification handle.
    Starting,
    /// A poll is scheduled; `interval` is the steady cadence.
    Waiting { interval: Duration },
    /// A poll is in flight. At most one ever is.
    Polling,
    Authorized,
    Expired,
    Failed,
}

impl FlowState {
    /// Terminal states stop the timer and re-enable [`PollingClient::begin`].
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Authorized | Self::Expired | Self::Failed)
    }
}

/// How a flow ended.
#[derive(Debug, Clone)]
pub enum FlowOutcome {
    Authorized(Authorization),
    Expired,
    Failed(FlowFailure),
    Canceled,
}

/// Why a flow failed.
#[derive(Debug, Clone, thiserror::Error)]
pub enum FlowFailure {
    #[error("Device flow start failed: {cause}")]
    StartFailed { cause: String },
    #[error("The user denied the authorization request")]
    Denied,
    #[error("Provider returned error code {code}")]
    Protocol { code: String },
    #[error("Transport failure: {cause}")]
    Transport { cause: String },
}

/// Transition notifications, emitted in order of occurrence.
#[derive(Debug, Clone)]
pub enum FlowEvent {
    /// The provider issued a verification handle; polling is scheduled.
    Started {
        user_code: String,
        verification_uri: String,
        interval: Duration,
    },
    /// A poll left for the token endpoint.
    PollSent,
    /// The provider answered `authorization_pending`.
    Pending,
    /// The provider answered `slow_down`; the new cadence applies from now.
    SlowedDown { interval: Duration },
    /// The flow reached a terminal outcome.
    Finished { outcome: FlowOutcome },
}

#[derive(Debug)]
struct Shared {
    generation: u64,
    state: FlowState,
    cancel: Option<oneshot::Sender<()>>,
}

/// Set the state for `generation`, refusing if a newer flow owns the
/// machine. Returns whether the write happened.
fn transition(shared: &Mutex<Shared>, generation: u64, state: FlowState, clear_cancel: bool) -> bool {
    let mut guard = shared.lock().unwrap();
    if guard.generation != generation {
        return false;
    }
    guard.state = state;
    if clear_cancel {
        guard.cancel = None;
    }
    true
}

/// Drives one device flow at a time over a [`DeviceFlow`] implementation.
///
/// # Example
/// ```no_run
/// use std::sync::Arc;
/// use octogate::github::DeviceFlowCoordinator;
/// use octogate::poll::{FlowOutcome, PollingClient};
///
/// # async fn example() -> octogate::Result<()> {
/// let flow = Arc::new(DeviceFlowCoordinator::new("Iv1.example"));
/// let client = PollingClient::new(flow);
/// let handle = client.begin("").await?;
/// let authorization = handle.authorization();
/// println!(
///     "Visit {} and enter {}",
///     authorization.verification_uri, authorization.user_code
/// );
/// match handle.wait().await {
///     FlowOutcome::Authorized(granted) => println!("token: {}", granted.token.access_token),
///     other => eprintln!("flow ended: {other:?}"),
/// }
/// # Ok(())
/// # }
/// ```
pub struct PollingClient {
    flow: Arc<dyn DeviceFlow>,
    policy: PollPolicy,
    event_sink: Option<FlowEventSink>,
    shared: Arc<Mutex<Shared>>,
}

impl PollingClient {
    pub fn new(flow: Arc<dyn DeviceFlow>) -> Self {
        Self {
            flow,
            policy: PollPolicy::default(),
            event_sink: None,
            shared: Arc::new(Mutex::new(Shared {
                generation: 0,
                state: FlowState::Idle,
                cancel: None,
            })),
        }
    }

    pub fn with_policy(mut self, policy: PollPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_event_sink(mut self, sink: FlowEventSink) -> Self {
        self.event_sink = Some(sink);
        self
    }

    /// Snapshot of the machine's current state.
    pub fn state(&self) -> FlowState {
        self.shared.lock().unwrap().state.clone()
    }

    /// Begin a device flow, superseding any active one.
    ///
    /// Returns once the provider has issued the verification handle; the
    /// polling loop runs on its own task from there. A start failure leaves
    /// the machine in [`FlowState::Failed`] and `begin` can be called again
    /// right away.
    pub async fn begin(&self, scope: &str) -> Result<FlowHandle> {
        let generation = {
            let mut shared = self.shared.lock().unwrap();
            shared.generation += 1;
            shared.state = FlowState::Starting;
            if let Some(tx) = shared.cancel.take() {
                let _ = tx.send(());
            }
            shared.generation
        };

        let authorization = match self.flow.start(scope).await {
            Ok(authorization) => authorization,
            Err(error) => {
                if transition(&self.shared, generation, FlowState::Failed, false) {
                    self.emit(FlowEvent::Finished {
                        outcome: FlowOutcome::Failed(FlowFailure::StartFailed {
                            cause: error.to_string(),
                        }),
                    });
                }
                return Err(error);
            }
        };

        let interval = authorization.poll_interval();
        let (cancel_tx, cancel_rx) = oneshot::channel();
        let (outcome_tx, outcome_rx) = oneshot::channel();

        {
            let mut shared = self.shared.lock().unwrap();
            if shared.generation != generation {
                // a newer begin() took over while the provider call was in flight
                drop(shared);
                let _ = outcome_tx.send(FlowOutcome::Canceled);
                return Ok(FlowHandle {
                    authorization,
                    generation,
                    shared: self.shared.clone(),
                    outcome_rx,
                });
            }
            shared.state = FlowState::Waiting { interval };
            shared.cancel = Some(cancel_tx);
        }
        self.emit(FlowEvent::Started {
            user_code: authorization.user_code.clone(),
            verification_uri: authorization.verification_uri.clone(),
            interval,
        });

        let worker = FlowWorker {
            flow: self.flow.clone(),
            policy: self.policy,
            event_sink: self.event_sink.clone(),
            shared: self.shared.clone(),
            generation,
        };
        let device_code = authorization.device_code.clone();
        tokio::spawn(async move {
            worker.run(device_code, interval, cancel_rx, outcome_tx).await;
        });

        Ok(FlowHandle {
            authorization,
            generation,
            shared: self.shared.clone(),
            outcome_rx,
        })
    }

    fn emit(&self, event: FlowEvent) {
        if let Some(sink) = &self.event_sink {
            (sink)(event);
        }
    }
}

/// Handle for an in-flight device flow.
#[derive(Debug)]
pub struct FlowHandle {
    authorization: DeviceAuthorization,
    generation: u64,
    shared: Arc<Mutex<Shared>>,
    outcome_rx: oneshot::Receiver<FlowOutcome>,
}

impl FlowHandle {
    /// Verification details to show the user.
    pub fn authorization(&self) -> &DeviceAuthorization {
        &self.authorization
    }

    /// Stop the flow.
    ///
    /// Returns `true` if this call ended it. The waiter resolves
    /// [`FlowOutcome::Canceled`] and no further poll leaves, even if a
    /// timer or an in-flight poll has yet to notice.
    pub fn cancel(&self) -> bool {
        let mut shared = self.shared.lock().unwrap();
        if shared.generation != self.generation || shared.state.is_terminal() {
            return false;
        }
        shared.generation += 1;
        shared.state = FlowState::Idle;
        if let Some(tx) = shared.cancel.take() {
            let _ = tx.send(());
        }
        true
    }

    /// Wait for the terminal outcome.
    pub async fn wait(self) -> FlowOutcome {
        self.outcome_rx.await.unwrap_or(FlowOutcome::Canceled)
    }
}

struct FlowWorker {
    flow: Arc<dyn DeviceFlow>,
    policy: PollPolicy,
    event_sink: Option<FlowEventSink>,
    shared: Arc<Mutex<Shared>>,
    generation: u64,
}

impl FlowWorker {
    async fn run(
        self,
        device_code: String,
        mut interval: Duration,
        mut cancel_rx: oneshot::Receiver<()>,
        outcome_tx: oneshot::Sender<FlowOutcome>,
    ) {
        let mut delay = self.policy.warmup;

        let outcome = loop {
            tokio::select! {
                _ = &mut cancel_rx => break FlowOutcome::Canceled,
                _ = time::sleep(delay) => {}
            }
            if !self.transition(FlowState::Polling) {
                break FlowOutcome::Canceled;
            }
            self.emit(FlowEvent::PollSent);

            let poll = tokio::select! {
                _ = &mut cancel_rx => break FlowOutcome::Canceled,
                poll = self.flow.poll(&device_code) => poll,
            };

            match poll {
                Ok(PollOutcome::Pending) => {
                    if !self.transition(FlowState::Waiting { interval }) {
                        break FlowOutcome::Canceled;
                    }
                    self.emit(FlowEvent::Pending);
                    delay = interval;
                }
                Ok(PollOutcome::SlowDown) => {
                    interval += self.policy.slow_down_step;
                    if !self.transition(FlowState::Waiting { interval }) {
                        break FlowOutcome::Canceled;
                    }
                    self.emit(FlowEvent::SlowedDown { interval });
                    delay = interval;
                }
                Ok(PollOutcome::Authorized(granted)) => break FlowOutcome::Authorized(granted),
                Ok(PollOutcome::Expired) => break FlowOutcome::Expired,
                Ok(PollOutcome::Denied) => break FlowOutcome::Failed(FlowFailure::Denied),
                Ok(PollOutcome::OtherError { code }) => {
                    break FlowOutcome::Failed(FlowFailure::Protocol { code })
                }
                Ok(PollOutcome::TransportError { cause }) => {
                    break FlowOutcome::Failed(FlowFailure::Transport { cause })
                }
                Err(AuthError::DeviceCodeRequired) => {
                    break FlowOutcome::Failed(FlowFailure::Protocol {
                        code: "device_code_required".to_string(),
                    })
                }
                Err(error) => {
                    break FlowOutcome::Failed(FlowFailure::Transport {
                        cause: error.to_string(),
                    })
                }
            }
        };

        self.finish(outcome, outcome_tx);
    }

    fn finish(&self, outcome: FlowOutcome, outcome_tx: oneshot::Sender<FlowOutcome>) {
        let state = match &outcome {
            FlowOutcome::Authorized(_) => Some(FlowState::Authorized),
            FlowOutcome::Expired => Some(FlowState::Expired),
            FlowOutcome::Failed(_) => Some(FlowState::Failed),
            // the canceller already moved the machine on
            FlowOutcome::Canceled => None,
        };
        let owned = match state {
            Some(state) => transition(&self.shared, self.generation, state, true),
            None => false,
        };
        if owned {
            tracing::debug!(outcome = ?outcome, "device flow finished");
            self.emit(FlowEvent::Finished {
                outcome: outcome.clone(),
            });
        }
        // A flow that lost ownership mid-poll must never leak its outcome.
        let _ = outcome_tx.send(if owned { outcome } else { FlowOutcome::Canceled });
    }

    fn transition(&self, state: FlowState) -> bool {
        transition(&self.shared, self.generation, state, false)
    }

    fn emit(&self, event: FlowEvent) {
        if let Some(sink) = &self.event_sink {
            (sink)(event);
        }
    }
}
