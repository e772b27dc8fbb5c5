//! Live counter - resilient push-update client for a live count display.
//!
//! This library keeps a WebSocket connection to a count endpoint alive and
//! hands every received count to a display collaborator.
//!
//! # Architecture
//!
//! The client is a single [`ConnectionManager`]:
//!
//! - **State machine**: one [`Machine`] value, one transition function,
//!   inputs in and effects out
//! - **Driver**: a tokio task that feeds the machine and performs effects
//! - **Transport**: one session task per connect attempt
//!
//! Key design principles:
//!
//! - At most one session and one reconnect timer exist at any time
//! - Abnormal closures move on to the next endpoint; other closures back off
//! - Nothing fails across `start`/`stop`; failures become status callbacks
//!
//! # Quick Start
//!
//! ```no_run
//! use live_counter::{ConnectionManager, Result};
//!
//! #[tokio::main]
//! async fn main() -> Result<()> {
//!     let manager = ConnectionManager::builder()
//!         .default_endpoints()
//!         .on_value(|count| println!("count: {count}"))
//!         .on_status(|status| println!("[{}] {}", status.kind(), status.message()))
//!         .build()?;
//!
//!     manager.start();
//!     tokio::signal::ctrl_c().await?;
//!     manager.stop();
//!
//!     Ok(())
//! }
//! ```
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | [`manager`] | [`ConnectionManager`], builder, policy, state machine |
//! | [`error`] | Error types and [`Result`] alias |
//! | [`identifiers`] | Type-safe ID wrappers |
//! | [`protocol`] | Count payloads and close codes |
//! | [`transport`] | WebSocket transport layer |

// ============================================================================
// Modules
// ============================================================================

/// Connection manager: lifecycle, retry policy and state machine.
///
/// Use [`ConnectionManager::builder()`] to create a configured manager.
pub mod manager;

/// Error types and result aliases.
///
/// Only configuration returns errors; a running manager reports through
/// status callbacks.
pub mod error;

/// Type-safe identifiers for sessions and timers.
pub mod identifiers;

/// Push protocol message types.
///
/// Count update parsing and close code classification.
pub mod protocol;

/// Transport layer.
///
/// The [`Transport`] seam and its WebSocket implementation.
pub mod transport;

// ============================================================================
// Re-exports
// ============================================================================

// Manager types
pub use manager::{
    ConnectionManager, ConnectionManagerBuilder, ConnectionState, DEFAULT_ENDPOINTS, Machine,
    RetryPolicy, Snapshot, Status, StatusKind,
};

// Error types
pub use error::{Error, Result};

// Identifier types
pub use identifiers::{SessionId, TimerGeneration};

// Protocol types
pub use protocol::CloseReason;

// Transport types
pub use transport::{SessionEvents, SessionHandle, Transport, TransportEvent, WebSocketTransport};
