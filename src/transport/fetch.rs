//! HTTP byte-fetch channel.
//!
//! Payloads announced by `pull_json` / `pull_binary` are served by the host
//! at `GET <data_url>/<id>`. The fetched body is handed back to the session
//! as an [`Incoming`] unit, exactly as if it had arrived on the stream.

// ============================================================================
// Imports
// ============================================================================

use std::time::Duration;

use tracing::{debug, trace};
use url::Url;

use crate::client::{PullKind, PullRequest};
use crate::error::{Error, Result};
use crate::identifiers::PullId;
use crate::protocol::Incoming;

// ============================================================================
// Fetcher
// ============================================================================

/// Client for the host's payload endpoint. Cheap to clone.
#[derive(Debug, Clone)]
pub struct Fetcher {
    http: reqwest::Client,
    base: Url,
}

impl Fetcher {
    /// Creates a fetcher for payloads under `base`.
    ///
    /// `base` must end with `/` so ids are appended rather than replacing
    /// the last path segment.
    ///
    /// # Errors
    ///
    /// - [`Error::Config`] if `base` cannot carry a path
    /// - [`Error::Http`] if the HTTP client cannot be built
    pub fn new(base: Url, timeout: Duration) -> Result<Self> {
        if base.cannot_be_a_base() {
            return Err(Error::config(format!("{base} cannot be a base URL")));
        }
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, base })
    }

    /// Endpoint URL of a payload.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Config`] if the id does not form a valid URL.
    pub fn url_for(&self, id: &PullId) -> Result<Url> {
        self.base
            .join(&urlencoding::encode(id.as_str()))
            .map_err(|e| Error::config(format!("invalid payload url for {id}: {e}")))
    }

    /// Fetches a payload and decodes it according to its kind.
    ///
    /// # Errors
    ///
    /// - [`Error::Fetch`] if the request fails or the host answers non-2xx
    /// - [`Error::Fetch`] if a JSON payload does not parse
    pub async fn fetch(&self, request: &PullRequest) -> Result<Incoming> {
        let url = self.url_for(&request.id)?;
        debug!(id = %request.id, kind = ?request.kind, %url, "Fetching payload");

        let response = self
            .http
            .get(url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| Error::fetch(request.id.clone(), e.to_string()))?;

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::fetch(request.id.clone(), e.to_string()))?;
        trace!(id = %request.id, bytes = body.len(), "Payload received");

        match request.kind {
            PullKind::Binary => Ok(Incoming::Binary(body.to_vec())),
            PullKind::Json => serde_json::from_slice(&body)
                .map(Incoming::Json)
                .map_err(|e| Error::fetch(request.id.clone(), format!("invalid JSON: {e}"))),
        }
    }
}

// ============================================================================
// Tests
// ============================================================================
