//! Close codes and close classification.
//!
//! Only one distinction matters to the connection manager: whether a
//! session ended with an abnormal closure (no close handshake received)
//! or any other way. Abnormal closures may move the manager on to the next
//! endpoint; every other closure is a counted retry.

// ============================================================================
// Imports
// ============================================================================

use std::fmt;

// ============================================================================
// Constants
// ============================================================================

/// Normal closure (RFC 6455 section 7.4.1).
pub const NORMAL_CLOSURE: u16 = 1000;

/// Close frame received without a status code.
pub const NO_STATUS_RECEIVED: u16 = 1005;

/// Connection dropped without a close frame.
pub const ABNORMAL_CLOSURE: u16 = 1006;

// ============================================================================
// CloseReason
// ============================================================================

/// Why a session ended.
///
/// `code` is `None` when the transport refused to even start the session
/// (for example an address it cannot handle). That case is treated like
/// any other non-abnormal close.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CloseReason {
    /// Close code, if one applies.
    pub code: Option<u16>,
    /// Human-readable reason, possibly empty.
    pub reason: String,
}

impl CloseReason {
    /// Creates a close reason with an explicit code.
    #[inline]
    #[must_use]
    pub fn new(code: u16, reason: impl Into<String>) -> Self {
        Self {
            code: Some(code),
            reason: reason.into(),
        }
    }

    /// Creates an abnormal closure (code 1006).
    #[inline]
    #[must_use]
    pub fn abnormal(reason: impl Into<String>) -> Self {
        Self::new(ABNORMAL_CLOSURE, reason)
    }

    /// Creates a close for a session the transport refused to construct.
    #[inline]
    #[must_use]
    pub fn rejected(reason: impl Into<String>) -> Self {
        Self {
            code: None,
            reason: reason.into(),
        }
    }

    /// Returns `true` if the session ended without a close handshake.
    #[inline]
    #[must_use]
    pub fn is_abnormal(&self) -> bool {
        self.code == Some(ABNORMAL_CLOSURE)
    }
}

impl fmt::Display for CloseReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.code, self.reason.is_empty()) {
            (Some(code), true) => write!(f, "code {code}"),
            (Some(code), false) => write!(f, "code {code}: {}", self.reason),
            (None, true) => f.write_str("rejected"),
            (None, false) => write!(f, "rejected: {}", self.reason),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_abnormal_is_abnormal() {
        assert!(CloseReason::abnormal("reset").is_abnormal());
        assert!(CloseReason::new(1006, "").is_abnormal());
    }

    #[test]
    fn test_other_codes_are_not_abnormal() {
        for code in [NORMAL_CLOSURE, 1001, NO_STATUS_RECEIVED, 1011, 4000] {
            assert!(!CloseReason::new(code, "").is_abnormal(), "code {code}");
        }
        assert!(!CloseReason::rejected("bad scheme").is_abnormal());
    }

    #[test]
    fn test_display() {
        assert_eq!(CloseReason::new(1000, "").to_string(), "code 1000");
        assert_eq!(
            CloseReason::new(1001, "going away").to_string(),
            "code 1001: going away"
        );
        assert_eq!(
            CloseReason::rejected("bad scheme").to_string(),
            "rejected: bad scheme"
        );
    }
}
