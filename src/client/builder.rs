//! Builder pattern for client configuration.
//!
//! # Example
//!
//! ```no_run
//! use gempyre_client::Client;
//!
//! # fn example() -> gempyre_client::Result<()> {
//! let client = Client::builder()
//!     .address("127.0.0.1:30000")
//!     .logging()
//!     .build()?;
//! # Ok(())
//! # }
//! ```

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use url::Url;

use crate::error::{Error, Result};

use super::core::Client;
use super::options::ClientOptions;

// ============================================================================
// ClientBuilder
// ============================================================================

/// Builder for configuring a [`Client`].
///
/// Use [`Client::builder()`] to create a new builder.
#[derive(Debug, Default, Clone)]
pub struct ClientBuilder {
    /// Host address as `host:port`.
    address: Option<String>,
    /// Connection tunables.
    options: ClientOptions,
}

// ============================================================================
// ClientBuilder Implementation
// ============================================================================

impl ClientBuilder {
    /// Creates a builder with default options and no address.
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the host address, e.g. `127.0.0.1:30000`.
    #[inline]
    #[must_use]
    pub fn address(mut self, address: impl Into<String>) -> Self {
        self.address = Some(address.into());
        self
    }

    /// Replaces all options.
    #[inline]
    #[must_use]
    pub fn options(mut self, options: ClientOptions) -> Self {
        self.options = options;
        self
    }

    /// Sets the keepalive interval.
    #[inline]
    #[must_use]
    pub fn keepalive_interval(mut self, interval: Duration) -> Self {
        self.options.keepalive_interval = interval;
        self
    }

    /// Enables log mirroring from the start.
    #[inline]
    #[must_use]
    pub fn logging(mut self) -> Self {
        self.options.logging = true;
        self
    }

    /// Builds the client with validation.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if no address is set or it is not `host:port`
    /// - [`Error::Config`] if the options are invalid
    pub fn build(self) -> Result<Client> {
        self.options.validate().map_err(Error::config)?;
        let address = self.validate_address()?;

        let ws_url = parse_url(&format!("ws://{address}{}", self.options.ws_path))?;
        let data_url = parse_url(&format!(
            "http://{address}{}/",
            self.options.data_path.trim_end_matches('/')
        ))?;

        Ok(Client::new(self.options, ws_url, data_url))
    }
}

// ============================================================================
// Validation
// ============================================================================

impl ClientBuilder {
    /// Validates the address configuration.
    fn validate_address(&self) -> Result<&str> {
        let address = self.address.as_deref().ok_or_else(|| {
            Error::config(
                "Host address is required. Use .address() to set it.\n\
                 Example: Client::builder().address(\"127.0.0.1:30000\")",
            )
        })?;

        if address.is_empty() || address.contains("://") || address.contains('/') {
            return Err(Error::config(format!(
                "Address must be host:port without scheme or path, got {address:?}"
            )));
        }

        Ok(address)
    }
}

fn parse_url(raw: &str) -> Result<Url> {
    let url = Url::parse(raw).map_err(|e| Error::config(format!("Invalid URL {raw}: {e}")))?;
    if url.host_str().is_none_or(str::is_empty) {
        return Err(Error::config(format!("URL {raw} has no host")));
    }
    Ok(url)
}

// ============================================================================
// Tests
// ============================================================================
