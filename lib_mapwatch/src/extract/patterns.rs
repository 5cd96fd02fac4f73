//! # Regex Extractor
//!
//! Scrapes a status page with three regular expressions, one per field. Each pattern
//! must contain a capture group; the first group that participates in the match is
//! used. Whitespace around captures is trimmed.
//!
//! The defaults target the common "Current Map: ... / Players: ..." layout of game
//! server status pages and an `<img id="map_image" src="...">` preview.

use regex::Regex;
use thiserror::Error;

use super::{Extraction, Extractor};

/// Default pattern for the active map name.
pub const DEFAULT_MAP_PATTERN: &str =
    r"(?is)current\s*map\s*:?\s*(?:<[^>]+>\s*)*([^<]+?)\s*<";
/// Default pattern for the player count.
pub const DEFAULT_PLAYERS_PATTERN: &str = r"(?is)players\s*:?\s*(?:<[^>]+>\s*)*([^<\s/]+)";
/// Default pattern for the map preview image.
pub const DEFAULT_IMAGE_PATTERN: &str =
    r#"(?is)<img[^>]*\bid\s*=\s*"map[_-]?image"[^>]*\bsrc\s*=\s*"([^"]+)""#;

#[derive(Debug, Error)]
/// # Extractor Error
///
/// Raised only while building a [`RegexExtractor`]; extraction itself never fails.
pub enum ExtractorError {
    /// One of the configured patterns is not a valid regular expression.
    #[error("Invalid {field} pattern: {source}")]
    InvalidPattern {
        /// Which field the pattern was for ("map", "players" or "image").
        field: &'static str,
        /// The underlying regex compile error.
        #[source]
        source: regex::Error,
    },

    /// A pattern compiled but has no capture group to extract from.
    #[error("The {0} pattern has no capture group")]
    MissingCaptureGroup(&'static str),
}

/// The source text of the three patterns, as read from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatternSet {
    /// Pattern whose first group captures the map name.
    pub map: String,
    /// Pattern whose first group captures the player count.
    pub players: String,
    /// Pattern whose first group captures the image URL.
    pub image: String,
}

impl Default for PatternSet {
    fn default() -> Self {
        Self {
            map: DEFAULT_MAP_PATTERN.to_string(),
            players: DEFAULT_PLAYERS_PATTERN.to_string(),
            image: DEFAULT_IMAGE_PATTERN.to_string(),
        }
    }
}

/// Extractor driven by a compiled [`PatternSet`].
#[derive(Debug, Clone)]
pub struct RegexExtractor {
    map: Regex,
    players: Regex,
    image: Regex,
}

impl RegexExtractor {
    /// Compiles the given patterns.
    pub fn new(patterns: &PatternSet) -> Result<Self, ExtractorError> {
        Ok(Self {
            map: compile("map", &patterns.map)?,
            players: compile("players", &patterns.players)?,
            image: compile("image", &patterns.image)?,
        })
    }

    fn capture(re: &Regex, haystack: &str) -> Option<String> {
        let caps = re.captures(haystack)?;
        caps.iter()
            .skip(1)
            .flatten()
            .next()
            .map(|m| m.as_str().trim().to_string())
    }
}

impl Default for RegexExtractor {
    fn default() -> Self {
        // The built-in patterns are covered by tests; failing here is a build defect.
        Self::new(&PatternSet::default()).expect("default extractor patterns must compile")
    }
}

impl Extractor for RegexExtractor {
    fn extract(&self, raw_body: &str) -> Extraction {
        Extraction {
            active_map: Self::capture(&self.map, raw_body).unwrap_or_default(),
            player_count_text: Self::capture(&self.players, raw_body).unwrap_or_default(),
            image_url: Self::capture(&self.image, raw_body).filter(|url| !url.is_empty()),
        }
    }
}

fn compile(field: &'static str, pattern: &str) -> Result<Regex, ExtractorError> {
    let re = Regex::new(pattern).map_err(|source| ExtractorError::InvalidPattern { field, source })?;
    if re.captures_len() < 2 {
        return Err(ExtractorError::MissingCaptureGroup(field));
    }
    Ok(re)
}
