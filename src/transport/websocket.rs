//! WebSocket transport backed by `tokio-tungstenite`.
//!
//! Each session runs in its own tokio task:
//!
//! 1. Connect (TCP, TLS for `wss://`, WebSocket handshake) with a timeout
//! 2. Report `opened`, then forward text frames until the stream ends
//! 3. Report exactly one `closed`, classified by how the stream ended
//!
//! # Close Classification
//!
//! | How it ended | Reported close |
//! |--------------|----------------|
//! | Close frame with code | that code |
//! | Close frame without code | 1005 |
//! | Read error, stream end, connect failure | error + 1006 |
//! | Address the transport cannot use | rejected (no code) |
//! | Owner closed the handle | 1000 |

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use futures_util::{SinkExt, Stream, StreamExt};
use tokio::sync::oneshot;
use tokio::time::timeout;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Error as WsError;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::tungstenite::protocol::CloseFrame;
use tokio_tungstenite::tungstenite::protocol::frame::coding::CloseCode;
use tracing::{debug, error, info, trace};
use url::Url;

use crate::error::Error;
use crate::protocol::{CloseReason, NO_STATUS_RECEIVED, NORMAL_CLOSURE};

use super::session::{SessionEvents, SessionHandle, Transport};

// ============================================================================
// Constants
// ============================================================================

/// Default timeout for the connect and handshake phase.
const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(30);

/// How long to wait for the peer to end the stream after a close frame.
const CLOSE_HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

/// Reason sent in the close frame when the owner closes a session.
const CLIENT_CLOSE_REASON: &str = "client shutdown";

// ============================================================================
// WebSocketTransport
// ============================================================================

/// [`Transport`] that speaks WebSocket over TCP or TLS.
///
/// Sessions are spawned onto the current tokio runtime.
#[derive(Debug, Clone)]
pub struct WebSocketTransport {
    /// Limit on connect plus handshake.
    connect_timeout: Duration,
}

impl Default for WebSocketTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl WebSocketTransport {
    /// Creates a transport with the default 30s connect timeout.
    ///
    /// Installs the `ring` TLS provider as the process default if no
    /// provider has been installed yet.
    #[must_use]
    pub fn new() -> Self {
        // Already installed is fine.
        let _ = rustls::crypto::ring::default_provider().install_default();

        Self {
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
        }
    }

    /// Sets the connect timeout.
    #[inline]
    #[must_use]
    pub fn with_connect_timeout(mut self, connect_timeout: Duration) -> Self {
        self.connect_timeout = connect_timeout;
        self
    }

    /// Returns the connect timeout.
    #[inline]
    #[must_use]
    pub const fn connect_timeout(&self) -> Duration {
        self.connect_timeout
    }
}

impl Transport for WebSocketTransport {
    fn open(&self, url: &Url, events: SessionEvents) -> SessionHandle {
        let (handle, close_rx) = SessionHandle::channel();

        tokio::spawn(run_session(
            url.clone(),
            events,
            close_rx,
            self.connect_timeout,
        ));

        handle
    }
}

// ============================================================================
// Session Task
// ============================================================================

/// Drives one session from connect to close.
async fn run_session(
    url: Url,
    events: SessionEvents,
    mut close_rx: oneshot::Receiver<()>,
    connect_timeout: Duration,
) {
    let session = events.session();
    debug!(%session, %url, "Opening WebSocket");

    let connected = tokio::select! {
        result = timeout(connect_timeout, connect_async(url.as_str())) => result,
        _ = &mut close_rx => {
            debug!(%session, "Session closed before open");
            events.closed(CloseReason::new(NORMAL_CLOSURE, CLIENT_CLOSE_REASON));
            return;
        }
    };

    let ws_stream = match connected {
        Ok(Ok((ws_stream, _response))) => ws_stream,

        Ok(Err(WsError::Url(e))) => {
            debug!(%session, error = %e, "Endpoint rejected by transport");
            events.closed(CloseReason::rejected(e.to_string()));
            return;
        }

        Ok(Err(e)) => {
            let err = Error::from(e);
            error!(%session, error = %err, "WebSocket connect failed");
            report_failure(&events, &err);
            return;
        }

        Err(_) => {
            let err = Error::connection(format!(
                "connect timed out after {}ms",
                connect_timeout.as_millis()
            ));
            error!(%session, error = %err, "WebSocket connect failed");
            report_failure(&events, &err);
            return;
        }
    };

    info!(%session, %url, "WebSocket connection established");
    events.opened();

    let (mut ws_write, mut ws_read) = ws_stream.split();

    loop {
        tokio::select! {
            message = ws_read.next() => {
                match message {
                    Some(Ok(Message::Text(text))) => {
                        trace!(%session, len = text.len(), "Text frame received");
                        events.message(text.as_str());
                    }

                    Some(Ok(Message::Close(frame))) => {
                        let reason = close_reason(frame.as_ref());
                        debug!(%session, %reason, "WebSocket closed by remote");
                        events.closed(reason);
                        finish_close_handshake(&mut ws_read).await;
                        break;
                    }

                    Some(Err(e)) => {
                        let err = Error::from(e);
                        error!(%session, error = %err, "WebSocket error");
                        report_failure(&events, &err);
                        break;
                    }

                    None => {
                        debug!(%session, "WebSocket stream ended");
                        events.closed(CloseReason::abnormal("stream ended without close frame"));
                        break;
                    }

                    // Ignore Binary, Ping, Pong, Frame
                    Some(Ok(_)) => {}
                }
            }

            // Owner closed or dropped the handle.
            _ = &mut close_rx => {
                debug!(%session, "Closing WebSocket");
                let frame = CloseFrame {
                    code: CloseCode::Normal,
                    reason: CLIENT_CLOSE_REASON.into(),
                };
                let _ = ws_write.send(Message::Close(Some(frame))).await;
                let _ = ws_write.close().await;
                events.closed(CloseReason::new(NORMAL_CLOSURE, CLIENT_CLOSE_REASON));
                break;
            }
        }
    }

    debug!(%session, "Session task terminated");
}

/// Reads until the stream ends so the queued close reply is flushed.
async fn finish_close_handshake<S>(ws_read: &mut S)
where
    S: Stream<Item = Result<Message, WsError>> + Unpin,
{
    let drain = async { while let Some(Ok(_)) = ws_read.next().await {} };

    if timeout(CLOSE_HANDSHAKE_TIMEOUT, drain).await.is_err() {
        debug!("Peer did not end the stream after the close handshake");
    }
}

/// Reports a failure without a close handshake: error, then 1006.
fn report_failure(events: &SessionEvents, err: &Error) {
    events.error(err.to_string());
    events.closed(CloseReason::abnormal(err.to_string()));
}

/// Converts a received close frame into a [`CloseReason`].
fn close_reason(frame: Option<&CloseFrame>) -> CloseReason {
    match frame {
        Some(frame) => CloseReason::new(u16::from(frame.code), frame.reason.as_str()),
        None => CloseReason::new(NO_STATUS_RECEIVED, ""),
    }
}

// ============================================================================
// Tests
// ============================================================================
