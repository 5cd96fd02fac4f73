//! # Status Page Extraction
//!
//! The fetcher never interprets a response body itself; it hands the text to an
//! [`Extractor`] and builds a snapshot from whatever comes back. Extraction is
//! best-effort: a page that does not match simply yields empty fields, it never
//! produces an error.
//!
//! ## Contained Modules:
//! - **`patterns`**: a regex-driven extractor (behind the `extract` feature) whose
//!   three patterns can be overridden from configuration.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms, unused_qualifications)]

/// Regex-backed extractor with configurable patterns.
#[cfg(feature = "extract")]
pub mod patterns;

#[cfg(feature = "extract")]
pub use patterns::{ExtractorError, PatternSet, RegexExtractor};

/// The raw fields pulled out of one status page.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Extraction {
    /// Name of the active map, or empty when not found.
    pub active_map: String,
    /// Player count as it appeared on the page. Parsing happens in the fetcher.
    pub player_count_text: String,
    /// Map preview image URL, if present.
    pub image_url: Option<String>,
}

/// Turns a raw response body into snapshot fields.
///
/// Implementations must not fail; anything they cannot find is left empty.
pub trait Extractor: Send + Sync {
    /// Extracts the map, player count text and image URL from `raw_body`.
    fn extract(&self, raw_body: &str) -> Extraction;
}
