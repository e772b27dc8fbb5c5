//! Push protocol message types.
//!
//! The remote endpoint pushes text frames carrying JSON objects. The only
//! recognized shape is a count update; anything else is ignored.
//!
//! # Protocol Overview
//!
//! | Message | Direction | Purpose |
//! |---------|-----------|---------|
//! | `{"count": <number>, ...}` | Remote → Local | New counter value |
//! | Close frame | Either | Session termination with a close code |
//!
//! # Modules
//!
//! | Module | Description |
//! |--------|-------------|
//! | `close` | Close codes and close classification |
//! | `payload` | Count update parsing |

// ============================================================================
// Submodules
// ============================================================================

/// Close codes and close classification.
pub mod close;

/// Count update parsing.
pub mod payload;

// ============================================================================
// Re-exports
// ============================================================================

pub use close::{ABNORMAL_CLOSURE, CloseReason, NORMAL_CLOSURE, NO_STATUS_RECEIVED};
pub use payload::{CountUpdate, parse_count};
