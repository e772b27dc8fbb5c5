//! Connection-resilience state machine.
//!
//! [`Machine`] owns every piece of connection state and is driven by a
//! single transition function, [`Machine::handle`]. It performs no I/O:
//! each transition returns the [`Effect`]s the driver must carry out
//! (open or close a session, arm a timer, invoke a callback).
//!
//! # Transitions
//!
//! | Input | Effect |
//! |-------|--------|
//! | `Start` | Open a session at the cursor (ignored while busy) |
//! | `OpenSucceeded` | Reset retries, report connected |
//! | `MessageReceived` | Report the count, if any |
//! | `ErrorOccurred` | Report the error; the close that follows reconnects |
//! | `Closed` (1006, endpoints left) | Advance cursor, reconnect after failover delay |
//! | `Closed` (other) | Counted retry with linear backoff, or give up |
//! | `TimerFired` | Reconnect, unless the timer is stale |
//! | `Stop` | Cancel timer, close session, go idle |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tracing::{debug, info, trace, warn};
use url::Url;

use crate::error::{Error, Result};
use crate::identifiers::{SessionId, TimerGeneration};
use crate::protocol::{CloseReason, parse_count};
use crate::transport::TransportEvent;

use super::options::RetryPolicy;
use super::state::{ConnectionState, Snapshot, Status};

// ============================================================================
// Input
// ============================================================================

/// Everything the machine reacts to.
#[derive(Debug, Clone, PartialEq)]
pub enum Input {
    /// Owner asked to connect.
    Start,
    /// Owner asked to disconnect.
    Stop,
    /// A session reported something.
    Transport {
        /// Session the event belongs to.
        session: SessionId,
        /// What happened.
        event: TransportEvent,
    },
    /// A reconnect timer expired.
    TimerFired(TimerGeneration),
}

// ============================================================================
// Effect
// ============================================================================

/// Side effects requested by a transition, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    /// Report a status change.
    Emit(Status),
    /// Report a received count.
    Value(f64),
    /// Open a new session.
    Open {
        /// Identity of the new session.
        session: SessionId,
        /// Endpoint to connect to.
        url: Url,
    },
    /// Close a session that is still live.
    Close(SessionId),
    /// Forget a session that has already closed.
    Release(SessionId),
    /// Arm the reconnect timer, replacing any previous one.
    Schedule {
        /// Generation the timer must report back.
        generation: TimerGeneration,
        /// Time until it fires.
        delay: Duration,
    },
    /// Disarm the reconnect timer.
    CancelTimer,
}

// ============================================================================
// Machine
// ============================================================================

/// The connection manager's state and transition function.
#[derive(Debug)]
pub struct Machine {
    endpoints: Vec<Url>,
    policy: RetryPolicy,
    state: ConnectionState,
    cursor: usize,
    retries: u32,
    session: Option<SessionId>,
    connecting: bool,
    timer: Option<TimerGeneration>,
    generation: TimerGeneration,
    gave_up: bool,
}

impl Machine {
    /// Creates an idle machine.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if `endpoints` is empty.
    pub fn new(endpoints: Vec<Url>, policy: RetryPolicy) -> Result<Self> {
        if endpoints.is_empty() {
            return Err(Error::config("At least one endpoint is required"));
        }

        Ok(Self {
            endpoints,
            policy,
            state: ConnectionState::Idle,
            cursor: 0,
            retries: 0,
            session: None,
            connecting: false,
            timer: None,
            generation: TimerGeneration::default(),
            gave_up: false,
        })
    }

    /// Applies one input and returns the resulting effects.
    pub fn handle(&mut self, input: Input) -> Vec<Effect> {
        let mut effects = Vec::new();

        match input {
            Input::Start => self.on_start(&mut effects),
            Input::Stop => self.on_stop(&mut effects),
            Input::Transport { session, event } => {
                if self.session != Some(session) {
                    trace!(%session, ?event, "Ignoring event from superseded session");
                    return effects;
                }
                self.on_transport(session, event, &mut effects);
            }
            Input::TimerFired(generation) => self.on_timer(generation, &mut effects),
        }

        effects
    }

    /// Returns the current lifecycle state.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.state
    }

    /// Returns the index of the targeted endpoint.
    #[inline]
    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// Returns the consecutive retry count.
    #[inline]
    #[must_use]
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Returns the active session, if any.
    #[inline]
    #[must_use]
    pub fn session(&self) -> Option<SessionId> {
        self.session
    }

    /// Returns a diagnostic snapshot.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        Snapshot {
            state: self.state,
            cursor: self.cursor,
            retries: self.retries,
            endpoint: self.endpoints[self.cursor].clone(),
        }
    }
}

// ============================================================================
// Machine - Transitions
// ============================================================================

impl Machine {
    fn on_start(&mut self, effects: &mut Vec<Effect>) {
        if self.connecting || self.session.is_some() || self.timer.is_some() {
            debug!(state = ?self.state, "Start ignored, connection already active");
            return;
        }

        if self.gave_up {
            debug!("Restarting after give-up with a fresh retry budget");
            self.gave_up = false;
            self.retries = 0;
        }

        self.connect(effects);
    }

    fn on_stop(&mut self, effects: &mut Vec<Effect>) {
        if self.timer.take().is_some() {
            effects.push(Effect::CancelTimer);
        }

        if let Some(session) = self.session.take() {
            debug!(%session, "Closing session on stop");
            effects.push(Effect::Close(session));
        }

        self.connecting = false;
        self.state = ConnectionState::Idle;
    }

    fn on_transport(&mut self, session: SessionId, event: TransportEvent, effects: &mut Vec<Effect>) {
        match event {
            TransportEvent::OpenSucceeded => {
                info!(%session, url = %self.endpoints[self.cursor], "Connected to count endpoint");
                self.connecting = false;
                self.retries = 0;
                self.emit(Status::Connected, effects);
            }

            TransportEvent::MessageReceived(text) => match parse_count(&text) {
                Ok(Some(count)) => effects.push(Effect::Value(count)),
                Ok(None) => trace!(%session, "Message without count"),
                Err(e) => warn!(%session, error = %e, "Error parsing message"),
            },

            TransportEvent::ErrorOccurred(message) => {
                warn!(%session, error = %message, "Transport error");
                self.connecting = false;
                self.emit(Status::Errored, effects);
            }

            TransportEvent::Closed(reason) => {
                info!(%session, %reason, "Connection closed");
                self.connecting = false;
                self.session = None;
                effects.push(Effect::Release(session));
                self.emit(Status::Disconnected, effects);
                self.after_close(&reason, effects);
            }
        }
    }

    fn on_timer(&mut self, generation: TimerGeneration, effects: &mut Vec<Effect>) {
        if self.timer != Some(generation) {
            trace!(%generation, "Ignoring stale timer");
            return;
        }

        self.timer = None;

        if self.connecting || self.session.is_some() {
            debug!("Timer fired while a session is active");
            return;
        }

        self.connect(effects);
    }
}

// ============================================================================
// Machine - Helpers
// ============================================================================

impl Machine {
    fn connect(&mut self, effects: &mut Vec<Effect>) {
        let session = SessionId::next();
        let url = self.endpoints[self.cursor].clone();

        debug!(%session, %url, "Attempting to connect");

        self.connecting = true;
        self.session = Some(session);
        self.emit(Status::Connecting, effects);
        effects.push(Effect::Open { session, url });
    }

    fn after_close(&mut self, reason: &CloseReason, effects: &mut Vec<Effect>) {
        if reason.is_abnormal() && self.cursor + 1 < self.endpoints.len() {
            self.cursor += 1;
            self.retries = 0;
            debug!(cursor = self.cursor, url = %self.endpoints[self.cursor], "Trying next endpoint");
            self.schedule(self.policy.failover_delay(), effects);
            return;
        }

        self.retry(effects);
    }

    fn retry(&mut self, effects: &mut Vec<Effect>) {
        if self.retries >= self.policy.max_attempts {
            warn!(attempts = self.retries, "Giving up on reconnecting");
            self.gave_up = true;
            self.emit(Status::GaveUp, effects);
            return;
        }

        self.retries += 1;
        let delay = self.policy.delay_for(self.retries);

        debug!(attempt = self.retries, delay_ms = delay.as_millis() as u64, "Scheduling reconnect");

        self.emit(
            Status::Retrying {
                attempt: self.retries,
                delay,
            },
            effects,
        );
        self.schedule(delay, effects);
    }

    fn schedule(&mut self, delay: Duration, effects: &mut Vec<Effect>) {
        self.generation = self.generation.next();
        self.timer = Some(self.generation);
        effects.push(Effect::Schedule {
            generation: self.generation,
            delay,
        });
    }

    fn emit(&mut self, status: Status, effects: &mut Vec<Effect>) {
        self.state = status.kind().into();
        effects.push(Effect::Emit(status));
    }
}

// ============================================================================
// Tests
// ============================================================================
