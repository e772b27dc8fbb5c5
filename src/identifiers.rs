//! Type-safe identifiers.
//!
//! Newtype wrappers that keep session identity and timer generations from
//! being confused with each other or with plain counters.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

// ============================================================================
// SessionId
// ============================================================================

/// Source of process-unique session identifiers.
static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one transport session.
///
/// Every connect attempt gets a fresh id. Events tagged with an id that is
/// no longer the active session are discarded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(u64);

impl SessionId {
    /// Allocates the next unused session id.
    #[inline]
    #[must_use]
    pub fn next() -> Self {
        Self(NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "session-{}", self.0)
    }
}

// ============================================================================
// TimerGeneration
// ============================================================================

/// Generation of a scheduled reconnect timer.
///
/// Bumped every time a timer is scheduled; a timer firing with an older
/// generation is stale.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TimerGeneration(u64);

impl TimerGeneration {
    /// Returns the generation after this one.
    #[inline]
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for TimerGeneration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "timer-{}", self.0)
    }
}

// ============================================================================
// Tests
// ============================================================================
