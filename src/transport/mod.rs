//! Transport layer.
//!
//! This module opens sessions to count endpoints and reports what happens
//! on them back to the connection manager.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────┐    SessionEvents     ┌───────────────────┐
//! │ ConnectionManager │◄─────────────────────│  Session task     │
//! │   (driver task)   │                      │  (one per open)   │
//! │                   │─────────────────────►│                   │◄──── wss://endpoint
//! └───────────────────┘    SessionHandle     └───────────────────┘
//! ```
//!
//! # Session Lifecycle
//!
//! 1. `Transport::open` - Start a session, get a `SessionHandle`
//! 2. `SessionEvents::opened` - Handshake completed
//! 3. `SessionEvents::message` - One per text frame
//! 4. `SessionEvents::closed` - Exactly once, always last
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `session` | Transport trait, session events and handles |
//! | `websocket` | `tokio-tungstenite` implementation |

// ============================================================================
// Submodules
// ============================================================================

/// Transport trait, session events and handles.
pub mod session;

/// WebSocket transport.
pub mod websocket;

// ============================================================================
// Re-exports
// ============================================================================

pub use session::{SessionEvents, SessionHandle, Transport, TransportEvent};
pub use websocket::WebSocketTransport;
