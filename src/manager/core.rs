//! Connection manager and its driver task.
//!
//! [`ConnectionManager`] is a cheap front for a driver task that owns the
//! [`Machine`]. `start` and `stop` only enqueue commands, so they never
//! block and never fail. The driver applies one input at a time and
//! carries out the resulting effects:
//!
//! - opens sessions through the [`Transport`]
//! - arms and aborts reconnect timers
//! - invokes the value and status handlers
//!
//! Dropping the manager stops it and ends the driver task.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, trace, warn};
use url::Url;

use crate::error::Result;
use crate::identifiers::{SessionId, TimerGeneration};
use crate::transport::{SessionEvents, SessionHandle, Transport, TransportEvent};

use super::builder::ConnectionManagerBuilder;
use super::machine::{Effect, Input, Machine};
use super::options::RetryPolicy;
use super::state::{ConnectionState, Snapshot, Status};

// ============================================================================
// Types
// ============================================================================

/// Value handler callback type.
///
/// Called once per inbound message that carries a numeric count.
pub type ValueHandler = Box<dyn Fn(f64) + Send + Sync>;

/// Status handler callback type.
///
/// Called on every status change.
pub type StatusHandler = Box<dyn Fn(&Status) + Send + Sync>;

/// Owner commands for the driver.
#[derive(Debug, Clone, Copy)]
enum Command {
    Start,
    Stop,
}

// ============================================================================
// ConnectionManager
// ============================================================================

/// Keeps a live count connection open.
///
/// # Example
///
/// ```no_run
/// use live_counter::{ConnectionManager, Result};
///
/// # async fn example() -> Result<()> {
/// let manager = ConnectionManager::builder()
///     .default_endpoints()
///     .on_value(|count| println!("count = {count}"))
///     .on_status(|status| println!("{status}"))
///     .build()?;
///
/// manager.start();
/// // ... later, at teardown
/// manager.stop();
/// # Ok(())
/// # }
/// ```
pub struct ConnectionManager {
    /// Channel to the driver task.
    command_tx: mpsc::UnboundedSender<Command>,
    /// Last state published by the driver.
    snapshot: Arc<Mutex<Snapshot>>,
}

impl fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("snapshot", &*self.snapshot.lock())
            .finish_non_exhaustive()
    }
}

impl ConnectionManager {
    /// Creates a new builder.
    #[inline]
    #[must_use]
    pub fn builder() -> ConnectionManagerBuilder {
        ConnectionManagerBuilder::new()
    }

    /// Creates the manager and spawns its driver task.
    ///
    /// Must be called from within a tokio runtime.
    pub(crate) fn spawn(
        endpoints: Vec<Url>,
        policy: RetryPolicy,
        transport: Arc<dyn Transport>,
        on_value: ValueHandler,
        on_status: StatusHandler,
    ) -> Result<Self> {
        let machine = Machine::new(endpoints, policy)?;
        let snapshot = Arc::new(Mutex::new(machine.snapshot()));

        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (session_tx, session_rx) = mpsc::unbounded_channel();
        let (timer_tx, timer_rx) = mpsc::unbounded_channel();

        let driver = Driver {
            machine,
            transport,
            on_value,
            on_status,
            session_tx,
            timer_tx,
            session: None,
            timer: None,
            snapshot: Arc::clone(&snapshot),
        };

        tokio::spawn(driver.run(command_rx, session_rx, timer_rx));

        Ok(Self {
            command_tx,
            snapshot,
        })
    }

    /// Connects to the current endpoint.
    ///
    /// No-op while a connect is in progress, a session is open, or a
    /// reconnect is already scheduled.
    pub fn start(&self) {
        self.send(Command::Start);
    }

    /// Cancels any scheduled reconnect and closes the session.
    ///
    /// Safe to call at any time, any number of times.
    pub fn stop(&self) {
        self.send(Command::Stop);
    }

    /// Returns the state as of the last processed event.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot.lock().clone()
    }

    /// Returns the lifecycle state as of the last processed event.
    #[inline]
    #[must_use]
    pub fn state(&self) -> ConnectionState {
        self.snapshot.lock().state
    }

    fn send(&self, command: Command) {
        if self.command_tx.send(command).is_err() {
            warn!(?command, "Connection manager driver is gone");
        }
    }
}

// ============================================================================
// Driver
// ============================================================================

/// Owns the machine and performs its effects.
struct Driver {
    machine: Machine,
    transport: Arc<dyn Transport>,
    on_value: ValueHandler,
    on_status: StatusHandler,
    session_tx: mpsc::UnboundedSender<(SessionId, TransportEvent)>,
    timer_tx: mpsc::UnboundedSender<TimerGeneration>,
    /// Handle of the live session, if any.
    session: Option<(SessionId, SessionHandle)>,
    /// Task of the armed timer, if any.
    timer: Option<JoinHandle<()>>,
    snapshot: Arc<Mutex<Snapshot>>,
}

impl Driver {
    /// Event loop: one input at a time until the manager is dropped.
    async fn run(
        mut self,
        mut command_rx: mpsc::UnboundedReceiver<Command>,
        mut session_rx: mpsc::UnboundedReceiver<(SessionId, TransportEvent)>,
        mut timer_rx: mpsc::UnboundedReceiver<TimerGeneration>,
    ) {
        loop {
            let input = tokio::select! {
                command = command_rx.recv() => match command {
                    Some(Command::Start) => Input::Start,
                    Some(Command::Stop) => Input::Stop,
                    None => {
                        debug!("Connection manager dropped");
                        break;
                    }
                },

                Some((session, event)) = session_rx.recv() => Input::Transport { session, event },

                Some(generation) = timer_rx.recv() => Input::TimerFired(generation),
            };

            self.dispatch(input);
        }

        self.dispatch(Input::Stop);
        debug!("Driver terminated");
    }

    fn dispatch(&mut self, input: Input) {
        trace!(?input, "Dispatching");

        for effect in self.machine.handle(input) {
            self.apply(effect);
        }

        *self.snapshot.lock() = self.machine.snapshot();
    }

    fn apply(&mut self, effect: Effect) {
        match effect {
            Effect::Emit(status) => (self.on_status)(&status),

            Effect::Value(count) => (self.on_value)(count),

            Effect::Open { session, url } => {
                let events = SessionEvents::new(session, self.session_tx.clone());
                let handle = self.transport.open(&url, events);
                if let Some((previous, _)) = self.session.replace((session, handle)) {
                    warn!(%previous, %session, "Replaced a live session handle");
                }
            }

            Effect::Close(session) => {
                if let Some((id, handle)) = self.session.take() {
                    debug_assert_eq!(id, session);
                    handle.close();
                }
            }

            Effect::Release(session) => {
                if self.session.as_ref().is_some_and(|(id, _)| *id == session) {
                    self.session = None;
                }
            }

            Effect::Schedule { generation, delay } => self.arm_timer(generation, delay),

            Effect::CancelTimer => {
                if let Some(task) = self.timer.take() {
                    task.abort();
                }
            }
        }
    }

    fn arm_timer(&mut self, generation: TimerGeneration, delay: Duration) {
        if let Some(task) = self.timer.take() {
            task.abort();
        }

        debug!(%generation, delay_ms = delay.as_millis() as u64, "Reconnect timer armed");

        let timer_tx = self.timer_tx.clone();
        self.timer = Some(tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let _ = timer_tx.send(generation);
        }));
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::oneshot;
    use tokio::time::Instant;

    use crate::protocol::{ABNORMAL_CLOSURE, CloseReason, NORMAL_CLOSURE};

    /// A session the test drives by hand.
    struct Opened {
        url: Url,
        events: SessionEvents,
        close_rx: oneshot::Receiver<()>,
        at: Instant,
    }

    /// Transport that hands every opened session to the test.
    struct ScriptedTransport {
        opens: mpsc::UnboundedSender<Opened>,
    }

    impl Transport for ScriptedTransport {
        fn open(&self, url: &Url, events: SessionEvents) -> SessionHandle {
            let (handle, close_rx) = SessionHandle::channel();
            let _ = self.opens.send(Opened {
                url: url.clone(),
                events,
                close_rx,
                at: Instant::now(),
            });
            handle
        }
    }

    struct Harness {
        manager: ConnectionManager,
        opens: mpsc::UnboundedReceiver<Opened>,
        statuses: mpsc::UnboundedReceiver<(Status, Instant)>,
        values: mpsc::UnboundedReceiver<f64>,
    }

    impl Harness {
        fn new(endpoints: &[&str]) -> Self {
            let (opens_tx, opens) = mpsc::unbounded_channel();
            let (status_tx, statuses) = mpsc::unbounded_channel();
            let (value_tx, values) = mpsc::unbounded_channel();

            let manager = ConnectionManager::builder()
                .endpoints(endpoints.iter().copied())
                .transport(ScriptedTransport { opens: opens_tx })
                .on_status(move |status| {
                    let _ = status_tx.send((*status, Instant::now()));
                })
                .on_value(move |count| {
                    let _ = value_tx.send(count);
                })
                .build()
                .expect("valid configuration");

            Self {
                manager,
                opens,
                statuses,
                values,
            }
        }

        async fn next_open(&mut self) -> Opened {
            self.opens.recv().await.expect("transport open")
        }

        async fn next_status(&mut self) -> Status {
            self.statuses.recv().await.expect("status").0
        }
    }

    /// Waits until the driver has processed everything queued so far.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    const ONE: &[&str] = &["ws://127.0.0.1:9000/ws/count"];
    const TWO: &[&str] = &["ws://127.0.0.1:9000/ws/count", "ws://127.0.0.1:9001/ws/count"];

    #[tokio::test(start_paused = true)]
    async fn test_connect_and_receive_values() {
        let mut h = Harness::new(ONE);
        h.manager.start();

        let session = h.next_open().await;
        assert_eq!(h.next_status().await, Status::Connecting);

        session.events.opened();
        assert_eq!(h.next_status().await, Status::Connected);

        session.events.message(r#"{"count": 41}"#);
        session.events.message("garbage");
        session.events.message(r#"{"hello": "world"}"#);
        session.events.message(r#"{"count": 42}"#);

        assert_eq!(h.values.recv().await, Some(41.0));
        assert_eq!(h.values.recv().await, Some(42.0));

        settle().await;
        assert_eq!(h.manager.state(), ConnectionState::Connected);
        assert!(h.statuses.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_twice_opens_one_session() {
        let mut h = Harness::new(ONE);
        h.manager.start();
        h.manager.start();

        let session = h.next_open().await;
        session.events.opened();
        h.manager.start();
        settle().await;

        assert!(h.opens.try_recv().is_err());
        assert_eq!(h.next_status().await, Status::Connecting);
        assert_eq!(h.next_status().await, Status::Connected);
        assert!(h.statuses.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_start_is_silent() {
        let mut h = Harness::new(ONE);
        h.manager.stop();
        h.manager.stop();
        settle().await;

        assert!(h.statuses.try_recv().is_err());
        assert!(h.opens.try_recv().is_err());
        assert_eq!(h.manager.state(), ConnectionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_closes_session_and_ignores_late_close() {
        let mut h = Harness::new(ONE);
        h.manager.start();

        let session = h.next_open().await;
        session.events.opened();
        assert_eq!(h.next_status().await, Status::Connecting);
        assert_eq!(h.next_status().await, Status::Connected);

        h.manager.stop();
        assert!(session.close_rx.await.is_ok());

        // The transport's close report arrives after the stop.
        session
            .events
            .closed(CloseReason::new(NORMAL_CLOSURE, "client shutdown"));
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(h.statuses.try_recv().is_err());
        assert!(h.opens.try_recv().is_err());
        assert_eq!(h.manager.state(), ConnectionState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_cancels_scheduled_reconnect() {
        let mut h = Harness::new(ONE);
        h.manager.start();

        let session = h.next_open().await;
        session.events.closed(CloseReason::new(NORMAL_CLOSURE, ""));
        assert_eq!(h.next_status().await, Status::Connecting);
        assert_eq!(h.next_status().await, Status::Disconnected);
        assert!(matches!(h.next_status().await, Status::Retrying { attempt: 1, .. }));

        h.manager.stop();
        tokio::time::sleep(Duration::from_secs(60)).await;

        assert!(h.opens.try_recv().is_err());
        assert!(h.statuses.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_abnormal_close_fails_over_after_one_second() {
        let mut h = Harness::new(TWO);
        h.manager.start();

        let first = h.next_open().await;
        assert_eq!(first.url.port(), Some(9000));
        first
            .events
            .closed(CloseReason::new(ABNORMAL_CLOSURE, ""));

        let second = h.next_open().await;
        assert_eq!(second.url.port(), Some(9001));
        assert_eq!((second.at - first.at).as_millis(), 1_000);

        settle().await;
        let snapshot = h.manager.snapshot();
        assert_eq!(snapshot.cursor, 1);
        assert_eq!(snapshot.retries, 0);

        let statuses: Vec<Status> = std::iter::from_fn(|| h.statuses.try_recv().ok())
            .map(|(status, _)| status)
            .collect();
        assert_eq!(
            statuses,
            vec![Status::Connecting, Status::Disconnected, Status::Connecting]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_gives_up_after_ten_retries() {
        let mut h = Harness::new(ONE);
        h.manager.start();

        let mut session = h.next_open().await;
        let mut gaps = Vec::new();

        for _ in 0..10 {
            session.events.closed(CloseReason::new(NORMAL_CLOSURE, ""));
            let next = h.next_open().await;
            gaps.push((next.at - session.at).as_millis() as u64);
            session = next;
        }

        session.events.closed(CloseReason::new(NORMAL_CLOSURE, ""));
        tokio::time::sleep(Duration::from_secs(300)).await;
        assert!(h.opens.try_recv().is_err());

        assert_eq!(
            gaps,
            vec![
                5_000, 10_000, 15_000, 20_000, 25_000, 30_000, 30_000, 30_000, 30_000, 30_000
            ]
        );

        let statuses: Vec<Status> = std::iter::from_fn(|| h.statuses.try_recv().ok())
            .map(|(status, _)| status)
            .collect();
        let retries: Vec<u32> = statuses
            .iter()
            .filter_map(|s| match s {
                Status::Retrying { attempt, .. } => Some(*attempt),
                _ => None,
            })
            .collect();
        assert_eq!(retries, (1..=10).collect::<Vec<_>>());
        assert_eq!(statuses.last(), Some(&Status::GaveUp));
        assert_eq!(h.manager.state(), ConnectionState::Disconnected);

        // An explicit start resumes.
        h.manager.start();
        let resumed = h.next_open().await;
        assert_eq!(resumed.url.port(), Some(9000));
    }

    #[tokio::test(start_paused = true)]
    async fn test_error_then_close_schedules_one_retry() {
        let mut h = Harness::new(ONE);
        h.manager.start();

        let session = h.next_open().await;
        session.events.opened();
        session.events.error("connection reset");
        session.events.closed(CloseReason::new(1011, "internal error"));

        tokio::time::sleep(Duration::from_secs(5)).await;
        let _second = h.next_open().await;
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert!(h.opens.try_recv().is_err());

        let statuses: Vec<Status> = std::iter::from_fn(|| h.statuses.try_recv().ok())
            .map(|(status, _)| status)
            .collect();
        assert_eq!(
            statuses,
            vec![
                Status::Connecting,
                Status::Connected,
                Status::Errored,
                Status::Disconnected,
                Status::Retrying {
                    attempt: 1,
                    delay: Duration::from_secs(5),
                },
                Status::Connecting,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_drop_closes_session() {
        let mut h = Harness::new(ONE);
        h.manager.start();

        let session = h.next_open().await;
        session.events.opened();
        drop(h.manager);

        assert!(session.close_rx.await.is_ok());
        settle().await;
        assert!(session.events.is_detached());
    }

    #[tokio::test(start_paused = true)]
    async fn test_debug_shows_snapshot() {
        let h = Harness::new(TWO);
        let debug = format!("{:?}", h.manager);
        assert!(debug.starts_with("ConnectionManager"));
        assert!(debug.contains("cursor: 0"));
        assert!(debug.contains("state: Idle"));
    }

    #[tokio::test]
    async fn test_websocket_failover_end_to_end() {
        use futures_util::{SinkExt, StreamExt};
        use tokio::net::TcpListener;
        use tokio_tungstenite::accept_async;
        use tokio_tungstenite::tungstenite::Message;

        let dead = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let dead_port = dead.local_addr().expect("addr").port();
        drop(dead);

        let live = TcpListener::bind("127.0.0.1:0").await.expect("bind");
        let live_port = live.local_addr().expect("addr").port();

        tokio::spawn(async move {
            let (stream, _) = live.accept().await.expect("accept");
            let mut ws = accept_async(stream).await.expect("handshake");
            for text in [r#"{"count": 10}"#, "oops", r#"{"count": 11, "extra": true}"#] {
                ws.send(Message::Text(text.into())).await.expect("send");
            }
            // Hold the connection open until the client leaves.
            while let Some(Ok(_)) = ws.next().await {}
        });

        let (status_tx, mut statuses) = mpsc::unbounded_channel();
        let (value_tx, mut values) = mpsc::unbounded_channel();

        let manager = ConnectionManager::builder()
            .endpoint(format!("ws://127.0.0.1:{dead_port}/ws/count"))
            .endpoint(format!("ws://127.0.0.1:{live_port}/ws/count"))
            .retry_policy(RetryPolicy::new().with_failover_delay(Duration::from_millis(10)))
            .on_status(move |status| {
                let _ = status_tx.send(*status);
            })
            .on_value(move |count| {
                let _ = value_tx.send(count);
            })
            .build()
            .expect("valid configuration");

        manager.start();

        let wait = Duration::from_secs(5);
        let first = tokio::time::timeout(wait, values.recv()).await.expect("first count");
        let second = tokio::time::timeout(wait, values.recv()).await.expect("second count");
        assert_eq!(first, Some(10.0));
        assert_eq!(second, Some(11.0));

        let seen: Vec<Status> = std::iter::from_fn(|| statuses.try_recv().ok()).collect();
        assert_eq!(seen.first(), Some(&Status::Connecting));
        assert!(seen.contains(&Status::Disconnected));
        assert_eq!(seen.last(), Some(&Status::Connected));
        assert!(!seen.iter().any(|s| matches!(s, Status::Retrying { .. })));

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.cursor, 1);
        assert_eq!(snapshot.retries, 0);
        assert_eq!(snapshot.state, ConnectionState::Connected);

        manager.stop();
    }
}
