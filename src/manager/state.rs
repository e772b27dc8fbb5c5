//! Connection state and status reports.
//!
//! [`Status`] is what the display collaborator receives. Each status maps
//! onto one of three [`StatusKind`]s and carries a short human-readable
//! message.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::time::Duration;

use url::Url;

// ============================================================================
// ConnectionState
// ============================================================================

/// Lifecycle state of the connection manager.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum ConnectionState {
    /// Not started, or stopped.
    #[default]
    Idle,
    /// Opening a session or waiting to retry.
    Connecting,
    /// Session open and receiving updates.
    Connected,
    /// Session lost; waiting to fail over, or given up.
    Disconnected,
}

impl From<StatusKind> for ConnectionState {
    fn from(kind: StatusKind) -> Self {
        match kind {
            StatusKind::Connecting => Self::Connecting,
            StatusKind::Connected => Self::Connected,
            StatusKind::Disconnected => Self::Disconnected,
        }
    }
}

// ============================================================================
// StatusKind
// ============================================================================

/// Coarse status category, suitable for styling a status indicator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StatusKind {
    /// A connect attempt is running or scheduled.
    Connecting,
    /// Live updates are flowing.
    Connected,
    /// No session is open.
    Disconnected,
}

impl StatusKind {
    /// Returns the lowercase name of the kind.
    #[inline]
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Disconnected => "disconnected",
        }
    }
}

impl fmt::Display for StatusKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// Status
// ============================================================================

/// A status change reported to the display collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status {
    /// A connect attempt started.
    Connecting,
    /// The session opened.
    Connected,
    /// The session closed.
    Disconnected,
    /// The transport reported an error; a close follows.
    Errored,
    /// A reconnect is scheduled.
    Retrying {
        /// 1-based retry number against the current endpoint.
        attempt: u32,
        /// Time until the reconnect.
        delay: Duration,
    },
    /// The retry budget is spent. Only an explicit start resumes.
    GaveUp,
}

impl Status {
    /// Returns the coarse kind of this status.
    #[must_use]
    pub const fn kind(&self) -> StatusKind {
        match self {
            Self::Connecting | Self::Retrying { .. } => StatusKind::Connecting,
            Self::Connected => StatusKind::Connected,
            Self::Disconnected | Self::Errored | Self::GaveUp => StatusKind::Disconnected,
        }
    }

    /// Returns the message to show the user.
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            Self::Connecting => "Connecting...".to_string(),
            Self::Connected => "Live updates".to_string(),
            Self::Disconnected => "Disconnected".to_string(),
            Self::Errored => "Connection error".to_string(),
            Self::Retrying { delay, .. } => {
                format!("Reconnecting in {}s...", delay.as_millis().div_ceil(1000))
            }
            Self::GaveUp => "Connection failed".to_string(),
        }
    }

    /// Returns `true` for the status that ends automatic reconnection.
    #[inline]
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        matches!(self, Self::GaveUp)
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind(), self.message())
    }
}

// ============================================================================
// Snapshot
// ============================================================================

/// Point-in-time view of the manager, for diagnostics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Current lifecycle state.
    pub state: ConnectionState,
    /// Index of the endpoint currently targeted.
    pub cursor: usize,
    /// Consecutive retries against the current endpoint.
    pub retries: u32,
    /// Endpoint currently targeted.
    pub endpoint: Url,
}

// ============================================================================
// Tests
// ============================================================================
