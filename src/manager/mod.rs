//! Connection manager module.
//!
//! This module keeps the live count connection alive: endpoint selection,
//! connect/retry/backoff, and close classification.
//!
//! # Components
//!
//! | Type | Description |
//! |------|-------------|
//! | [`ConnectionManager`] | Owner-facing handle with `start`/`stop` |
//! | [`ConnectionManagerBuilder`] | Fluent configuration builder |
//! | [`RetryPolicy`] | Backoff and failover timing |
//! | [`Machine`] | Pure state machine behind the manager |
//! | [`Status`] | Status reported to the display collaborator |
//!
//! # Example
//!
//! ```no_run
//! use live_counter::{ConnectionManager, Result};
//!
//! # async fn example() -> Result<()> {
//! let manager = ConnectionManager::builder()
//!     .default_endpoints()
//!     .on_value(|count| println!("{count}"))
//!     .on_status(|status| println!("{}", status.message()))
//!     .build()?;
//!
//! manager.start();
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Submodules
// ============================================================================

/// Fluent builder pattern for manager configuration.
pub mod builder;

/// Manager handle and driver task.
pub mod core;

/// State machine and its inputs and effects.
pub mod machine;

/// Retry policy and default endpoints.
pub mod options;

/// Connection state and status reports.
pub mod state;

// ============================================================================
// Re-exports
// ============================================================================

pub use builder::ConnectionManagerBuilder;
pub use self::core::{ConnectionManager, StatusHandler, ValueHandler};
pub use machine::{Effect, Input, Machine};
pub use options::{DEFAULT_ENDPOINTS, RetryPolicy};
pub use state::{ConnectionState, Snapshot, Status, StatusKind};
