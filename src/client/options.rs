//! Client configuration.
//!
//! # Example
//!
//! ```ignore
//! use std::time::Duration;
//! use gempyre_client::ClientOptions;
//!
//! let options = ClientOptions::new()
//!     .with_keepalive_interval(Duration::from_secs(5))
//!     .with_logging();
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default WebSocket endpoint path.
pub const DEFAULT_WS_PATH: &str = "/gempyre";

/// Default byte-fetch endpoint path.
pub const DEFAULT_DATA_PATH: &str = "/data";

/// Default keepalive cadence.
pub const DEFAULT_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(10);

/// Default re-check cadence for pending `load` subscriptions.
pub const DEFAULT_LOAD_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Default timeout for one payload fetch.
pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(30);

// ============================================================================
// ClientOptions
// ============================================================================

/// Tunables of a client connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientOptions {
    /// Path of the WebSocket endpoint on the host.
    pub ws_path: String,

    /// Path prefix of the byte-fetch endpoint on the host.
    pub data_path: String,

    /// Interval between keepalive messages.
    pub keepalive_interval: Duration,

    /// Interval between re-checks of pending `load` subscriptions.
    pub load_poll_interval: Duration,

    /// Timeout for one payload fetch.
    pub fetch_timeout: Duration,

    /// Mirror log records to the host from the start.
    pub logging: bool,
}

impl Default for ClientOptions {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// Constructors
// ============================================================================

impl ClientOptions {
    /// Creates options with the default endpoints and timings.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self {
            ws_path: DEFAULT_WS_PATH.to_string(),
            data_path: DEFAULT_DATA_PATH.to_string(),
            keepalive_interval: DEFAULT_KEEPALIVE_INTERVAL,
            load_poll_interval: DEFAULT_LOAD_POLL_INTERVAL,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            logging: false,
        }
    }
}

// ============================================================================
// Builder Methods
// ============================================================================

impl ClientOptions {
    /// Sets the WebSocket endpoint path.
    #[inline]
    #[must_use]
    pub fn with_ws_path(mut self, path: impl Into<String>) -> Self {
        self.ws_path = path.into();
        self
    }

    /// Sets the byte-fetch endpoint path prefix.
    #[inline]
    #[must_use]
    pub fn with_data_path(mut self, path: impl Into<String>) -> Self {
        self.data_path = path.into();
        self
    }

    /// Sets the keepalive interval.
    #[inline]
    #[must_use]
    pub fn with_keepalive_interval(mut self, interval: Duration) -> Self {
        self.keepalive_interval = interval;
        self
    }

    /// Sets the `load` re-check interval.
    #[inline]
    #[must_use]
    pub fn with_load_poll_interval(mut self, interval: Duration) -> Self {
        self.load_poll_interval = interval;
        self
    }

    /// Sets the payload fetch timeout.
    #[inline]
    #[must_use]
    pub fn with_fetch_timeout(mut self, timeout: Duration) -> Self {
        self.fetch_timeout = timeout;
        self
    }

    /// Enables log mirroring from the start.
    #[inline]
    #[must_use]
    pub fn with_logging(mut self) -> Self {
        self.logging = true;
        self
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientOptions {
    /// Validates the options.
    ///
    /// # Errors
    ///
    /// Returns an error message if a path is not absolute or an interval is zero.
    pub fn validate(&self) -> Result<(), String> {
        for (name, path) in [("ws_path", &self.ws_path), ("data_path", &self.data_path)] {
            if !path.starts_with('/') {
                return Err(format!("{name} must start with '/', got {path:?}"));
            }
        }
        for (name, interval) in [
            ("keepalive_interval", self.keepalive_interval),
            ("load_poll_interval", self.load_poll_interval),
            ("fetch_timeout", self.fetch_timeout),
        ] {
            if interval.is_zero() {
                return Err(format!("{name} must be greater than zero"));
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
