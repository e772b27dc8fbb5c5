//! Transport seam: sessions, their events, and their handles.
//!
//! A [`Transport`] opens one session per connect attempt. The session
//! reports back through [`SessionEvents`] and is closed through its
//! [`SessionHandle`].
//!
//! # Contract
//!
//! - Every `open` ends with exactly one `closed` report, whether or not the
//!   session ever opened.
//! - `opened` is reported at most once, before any message.
//! - `error` may precede `closed` but never replaces it.

// ============================================================================
// Imports
// ============================================================================

use tokio::sync::{mpsc, oneshot};
use url::Url;

use crate::identifiers::SessionId;
use crate::protocol::CloseReason;

// ============================================================================
// TransportEvent
// ============================================================================

/// Something a session reports.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportEvent {
    /// The session is open.
    OpenSucceeded,
    /// A text frame arrived.
    MessageReceived(String),
    /// The transport hit an error. A `Closed` follows.
    ErrorOccurred(String),
    /// The session ended.
    Closed(CloseReason),
}

// ============================================================================
// Transport
// ============================================================================

/// Opens sessions to count endpoints.
///
/// Implementations must not block: start the work (typically with
/// `tokio::spawn`) and report progress through `events`.
pub trait Transport: Send + Sync + 'static {
    /// Starts a session to `url`.
    fn open(&self, url: &Url, events: SessionEvents) -> SessionHandle;
}

// ============================================================================
// SessionEvents
// ============================================================================

/// Reporter for one session's events.
///
/// Tags every event with the session's id so the manager can discard
/// events from sessions it no longer owns.
#[derive(Debug, Clone)]
pub struct SessionEvents {
    session: SessionId,
    tx: mpsc::UnboundedSender<(SessionId, TransportEvent)>,
}

impl SessionEvents {
    /// Creates a reporter for `session`.
    pub(crate) fn new(
        session: SessionId,
        tx: mpsc::UnboundedSender<(SessionId, TransportEvent)>,
    ) -> Self {
        Self { session, tx }
    }

    /// Returns the session this reporter belongs to.
    #[inline]
    #[must_use]
    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Reports that the session opened.
    pub fn opened(&self) {
        self.send(TransportEvent::OpenSucceeded);
    }

    /// Reports an inbound text frame.
    pub fn message(&self, text: impl Into<String>) {
        self.send(TransportEvent::MessageReceived(text.into()));
    }

    /// Reports a transport error.
    pub fn error(&self, message: impl Into<String>) {
        self.send(TransportEvent::ErrorOccurred(message.into()));
    }

    /// Reports that the session ended.
    pub fn closed(&self, reason: CloseReason) {
        self.send(TransportEvent::Closed(reason));
    }

    /// Returns `true` once the manager has gone away.
    #[inline]
    #[must_use]
    pub fn is_detached(&self) -> bool {
        self.tx.is_closed()
    }

    fn send(&self, event: TransportEvent) {
        // Manager dropped; nobody is listening.
        let _ = self.tx.send((self.session, event));
    }
}

// ============================================================================
// SessionHandle
// ============================================================================

/// Owner's handle on a session.
///
/// Closing or dropping the handle asks the session to shut down.
#[derive(Debug)]
pub struct SessionHandle {
    close_tx: Option<oneshot::Sender<()>>,
}

impl SessionHandle {
    /// Creates a handle and the receiver the session watches for close.
    #[must_use]
    pub fn channel() -> (Self, oneshot::Receiver<()>) {
        let (close_tx, close_rx) = oneshot::channel();
        (
            Self {
                close_tx: Some(close_tx),
            },
            close_rx,
        )
    }

    /// Creates a handle with nothing to signal.
    #[inline]
    #[must_use]
    pub fn detached() -> Self {
        Self { close_tx: None }
    }

    /// Asks the session to close.
    pub fn close(mut self) {
        if let Some(tx) = self.close_tx.take() {
            let _ = tx.send(());
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
