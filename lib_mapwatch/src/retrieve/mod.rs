//! # Server Retrieval Module
//!
//! One fetch per endpoint per pass. This module defines the [`Fetcher`] seam the
//! aggregator fans out over, the error type a failed fetch reports, and the shared
//! logic that turns an [`Extraction`] into a [`ServerSnapshot`].
//!
//! ## Contained Modules:
//! - **`http_fetcher`**: the production fetcher, a plain HTTP GET built on `reqwest`
//!   with a bounded per-request timeout (behind the `retrieve` feature).

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

use crate::extract::Extraction;
use crate::snapshot::{ServerEndpoint, ServerSnapshot};

/// HTTP fetcher built on `reqwest`.
#[cfg(feature = "retrieve")]
pub mod http_fetcher;

#[cfg(feature = "retrieve")]
pub use http_fetcher::HttpFetcher;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
/// # Fetch Error
///
/// Why one server produced no snapshot. None of these abort a pass; the aggregator
/// logs them and carries on without that server.
pub enum FetchError {
    /// Connection, DNS, TLS or body read failure.
    #[error("Network error for {url}: {message}")]
    Network {
        /// The endpoint that failed.
        url: String,
        /// Human readable cause.
        message: String,
    },

    /// The request did not complete within the configured timeout.
    #[error("Request to {url} timed out after {after:?}")]
    Timeout {
        /// The endpoint that timed out.
        url: String,
        /// The timeout that was exceeded.
        after: Duration,
    },

    /// The server answered with a non-success status code.
    #[error("HTTP request to {url} failed with status: {status}")]
    Status {
        /// The endpoint that answered.
        url: String,
        /// The numeric HTTP status.
        status: u16,
    },
}

/// Performs a single status fetch for one endpoint.
///
/// The returned future must be `Send` so passes can run on any runtime worker.
pub trait Fetcher: Send + Sync {
    /// Fetches and parses the current state of `endpoint`.
    fn fetch(
        &self,
        endpoint: &ServerEndpoint,
    ) -> impl Future<Output = Result<ServerSnapshot, FetchError>> + Send;
}

/// Parses extracted player count text, falling back to zero.
///
/// Anything that is not a non-negative integer (empty, "N/A", negative, overflowing)
/// counts as an empty server rather than a failed fetch.
pub fn parse_player_count(text: &str) -> u32 {
    text.trim().parse().unwrap_or(0)
}

/// Builds a snapshot for `endpoint` from extracted fields.
pub fn snapshot_from_extraction(endpoint: &ServerEndpoint, extraction: Extraction) -> ServerSnapshot {
    ServerSnapshot {
        server: endpoint.clone(),
        player_count: parse_player_count(&extraction.player_count_text),
        active_map: extraction.active_map,
        image_ref: extraction.image_url,
    }
}
