//! Builder pattern for connection manager configuration.
//!
//! Provides a fluent API for configuring and creating [`ConnectionManager`]
//! instances.
//!
//! # Example
//!
//! ```no_run
//! use live_counter::{ConnectionManager, RetryPolicy};
//!
//! # async fn example() -> live_counter::Result<()> {
//! let manager = ConnectionManager::builder()
//!     .endpoint("wss://primary.example.com/ws/count")
//!     .endpoint("wss://backup.example.com/ws/count")
//!     .retry_policy(RetryPolicy::new().with_max_attempts(5))
//!     .on_value(|count| println!("{count}"))
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::fmt;
use std::sync::Arc;

use tracing::trace;
use url::Url;

use crate::error::{Error, Result};
use crate::transport::{Transport, WebSocketTransport};

use super::core::{ConnectionManager, StatusHandler, ValueHandler};
use super::options::{DEFAULT_ENDPOINTS, RetryPolicy};
use super::state::Status;

// ============================================================================
// ConnectionManagerBuilder
// ============================================================================

/// Builder for configuring a [`ConnectionManager`] instance.
///
/// Use [`ConnectionManager::builder()`] to create a new builder.
#[derive(Default)]
pub struct ConnectionManagerBuilder {
    /// Endpoints in the order they are tried.
    endpoints: Vec<String>,
    /// Backoff configuration.
    policy: RetryPolicy,
    /// Count callback.
    on_value: Option<ValueHandler>,
    /// Status callback.
    on_status: Option<StatusHandler>,
    /// Session factory; WebSocket when unset.
    transport: Option<Arc<dyn Transport>>,
}

impl fmt::Debug for ConnectionManagerBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionManagerBuilder")
            .field("endpoints", &self.endpoints)
            .field("policy", &self.policy)
            .field("on_value", &self.on_value.is_some())
            .field("on_status", &self.on_status.is_some())
            .field("transport", &self.transport.is_some())
            .finish()
    }
}

// ============================================================================
// ConnectionManagerBuilder Implementation
// ============================================================================

impl ConnectionManagerBuilder {
    /// Creates a new builder with no endpoints and the default policy.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an endpoint.
    ///
    /// # Arguments
    ///
    /// * `url` - `ws://` or `wss://` address
    #[inline]
    #[must_use]
    pub fn endpoint(mut self, url: impl Into<String>) -> Self {
        self.endpoints.push(url.into());
        self
    }

    /// Appends several endpoints, in order.
    #[inline]
    #[must_use]
    pub fn endpoints(mut self, urls: impl IntoIterator<Item = impl Into<String>>) -> Self {
        self.endpoints.extend(urls.into_iter().map(Into::into));
        self
    }

    /// Appends the production endpoints from [`DEFAULT_ENDPOINTS`].
    #[inline]
    #[must_use]
    pub fn default_endpoints(self) -> Self {
        self.endpoints(DEFAULT_ENDPOINTS.iter().copied())
    }

    /// Sets the retry policy.
    #[inline]
    #[must_use]
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.policy = policy;
        self
    }

    /// Sets the callback for received counts.
    #[inline]
    #[must_use]
    pub fn on_value(mut self, handler: impl Fn(f64) + Send + Sync + 'static) -> Self {
        self.on_value = Some(Box::new(handler));
        self
    }

    /// Sets the callback for status changes.
    #[inline]
    #[must_use]
    pub fn on_status(mut self, handler: impl Fn(&Status) + Send + Sync + 'static) -> Self {
        self.on_status = Some(Box::new(handler));
        self
    }

    /// Replaces the WebSocket transport.
    #[inline]
    #[must_use]
    pub fn transport(mut self, transport: impl Transport) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Builds the manager with validation and spawns its driver task.
    ///
    /// The manager starts idle; call [`ConnectionManager::start`] to
    /// connect. Must be called from within a tokio runtime.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no endpoint is set or the policy is invalid
    /// - [`Error::InvalidEndpoint`] if an endpoint is not a `ws`/`wss` URL
    pub fn build(self) -> Result<ConnectionManager> {
        let endpoints = self.validate_endpoints()?;
        self.policy.validate()?;

        let transport: Arc<dyn Transport> = match self.transport {
            Some(transport) => transport,
            None => Arc::new(WebSocketTransport::new()),
        };
        let on_value: ValueHandler = match self.on_value {
            Some(handler) => handler,
            None => Box::new(|count: f64| trace!(count, "Count received without a value handler")),
        };
        let on_status: StatusHandler = match self.on_status {
            Some(handler) => handler,
            None => Box::new(|status: &Status| trace!(%status, "Status without a status handler")),
        };

        ConnectionManager::spawn(endpoints, self.policy, transport, on_value, on_status)
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ConnectionManagerBuilder {
    /// Parses and checks every endpoint.
    fn validate_endpoints(&self) -> Result<Vec<Url>> {
        if self.endpoints.is_empty() {
            return Err(Error::config(
                "At least one endpoint is required. Use .endpoint() to add one.\n\
                 Example: ConnectionManager::builder().endpoint(\"wss://example.com/ws/count\")",
            ));
        }

        self.endpoints.iter().map(|raw| parse_endpoint(raw)).collect()
    }
}

/// Parses one endpoint, accepting only WebSocket schemes.
fn parse_endpoint(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::invalid_endpoint(raw, e.to_string()))?;

    match url.scheme() {
        "ws" | "wss" => {}
        other => {
            return Err(Error::invalid_endpoint(
                raw,
                format!("unsupported scheme '{other}', expected ws or wss"),
            ));
        }
    }

    if url.host_str().is_none() {
        return Err(Error::invalid_endpoint(raw, "missing host"));
    }

    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_creates_empty_builder() {
        let builder = ConnectionManagerBuilder::new();
        assert!(builder.endpoints.is_empty());
        assert!(builder.on_value.is_none());
        assert!(builder.transport.is_none());
        assert_eq!(builder.policy, RetryPolicy::default());
    }

    #[test]
    fn test_endpoints_keep_order() {
        let builder = ConnectionManagerBuilder::new()
            .endpoint("wss://a.example.com/ws")
            .endpoints(["wss://b.example.com/ws", "wss://c.example.com/ws"]);
        assert_eq!(
            builder.endpoints,
            vec![
                "wss://a.example.com/ws",
                "wss://b.example.com/ws",
                "wss://c.example.com/ws"
            ]
        );
    }

    #[test]
    fn test_default_endpoints() {
        let builder = ConnectionManagerBuilder::new().default_endpoints();
        assert_eq!(builder.endpoints, DEFAULT_ENDPOINTS);
    }

    #[test]
    fn test_build_fails_without_endpoints() {
        let err = ConnectionManagerBuilder::new().build().unwrap_err();
        assert!(err.is_config_error());
        assert!(err.to_string().contains("endpoint"));
    }

    #[test]
    fn test_build_fails_with_invalid_policy() {
        let err = ConnectionManagerBuilder::new()
            .endpoint("wss://example.com/ws/count")
            .retry_policy(RetryPolicy {
                base_interval_ms: 0,
                ..RetryPolicy::default()
            })
            .build()
            .unwrap_err();
        assert!(matches!(err, Error::Config { .. }));
    }

    #[test]
    fn test_parse_endpoint_accepts_ws_and_wss() {
        assert!(parse_endpoint("ws://127.0.0.1:8080/ws/count").is_ok());
        assert!(parse_endpoint("wss://api.opennotification.org/ws/count").is_ok());
    }

    #[test]
    fn test_parse_endpoint_rejects_other_schemes() {
        let err = parse_endpoint("https://example.com/ws").unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));
        assert!(err.to_string().contains("unsupported scheme 'https'"));
    }

    #[test]
    fn test_parse_endpoint_rejects_garbage() {
        let err = parse_endpoint("not a url").unwrap_err();
        assert!(matches!(err, Error::InvalidEndpoint { .. }));
    }

    #[test]
    fn test_build_fails_on_first_bad_endpoint() {
        let err = ConnectionManagerBuilder::new()
            .endpoint("wss://ok.example.com/ws")
            .endpoint("ftp://bad.example.com")
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("ftp://bad.example.com"));
    }

    #[tokio::test]
    async fn test_build_starts_idle() {
        let manager = ConnectionManagerBuilder::new()
            .endpoint("ws://127.0.0.1:9/ws/count")
            .build()
            .expect("valid configuration");

        let snapshot = manager.snapshot();
        assert_eq!(snapshot.state, crate::ConnectionState::Idle);
        assert_eq!(snapshot.cursor, 0);
        assert_eq!(snapshot.endpoint.as_str(), "ws://127.0.0.1:9/ws/count");
    }

    #[test]
    fn test_debug_hides_handlers() {
        let builder = ConnectionManagerBuilder::new().on_value(|_| {});
        let debug = format!("{builder:?}");
        assert!(debug.contains("on_value: true"));
    }
}
