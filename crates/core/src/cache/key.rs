//! Cache key derivation from resource locators.
//!
//! The flat strategy keeps keys human-readable and compatible with entries
//! written by earlier loaders: absolute locators contribute their path,
//! relative locators contribute themselves, and every `..` and `/` becomes `-`.
//! Two locators whose rewritten forms coincide share a key.
//!
//! The hashed strategy digests the normalized locator instead, so distinct
//! locators never share a key in practice.

use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

/// Separator substituted for `..` and `/` in flat keys.
const FLAT_SEPARATOR: &str = "-";

/// Schemes whose locators are treated as absolute.
const ABSOLUTE_SCHEMES: &[&str] = &["http://", "https://", "file://"];

/// Key under which an envelope is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CacheKey(String);

impl CacheKey {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for CacheKey {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// How locators are mapped to keys.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum KeyStrategy {
    /// Path rewriting, compatible with existing entries.
    #[default]
    Flat,
    /// SHA-256 of the normalized locator.
    Hashed,
}

impl KeyStrategy {
    pub fn derive(self, locator: &str) -> CacheKey {
        match self {
            KeyStrategy::Flat => derive_cache_key(locator),
            KeyStrategy::Hashed => derive_hashed_key(locator),
        }
    }
}

/// Derive a flat cache key from a locator.
pub fn derive_cache_key(locator: &str) -> CacheKey {
    let source = absolute_url(locator).map(|url| url.path().to_string());
    let source = source.as_deref().unwrap_or(locator);
    CacheKey(source.replace("..", FLAT_SEPARATOR).replace('/', FLAT_SEPARATOR))
}

/// Derive a hashed cache key from a locator.
pub fn derive_hashed_key(locator: &str) -> CacheKey {
    let normalized = match absolute_url(locator) {
        Some(mut url) => {
            url.set_fragment(None);
            url.to_string()
        }
        None => locator.trim().to_string(),
    };

    let mut hasher = Sha256::new();
    hasher.update(normalized.as_bytes());
    CacheKey(hex::encode(hasher.finalize()))
}

/// Parse a scheme-prefixed locator; `None` for relative or unparsable input.
fn absolute_url(locator: &str) -> Option<Url> {
    let lower = locator.trim_start().to_ascii_lowercase();
    if !ABSOLUTE_SCHEMES.iter().any(|scheme| lower.starts_with(scheme)) {
        return None;
    }
    Url::parse(locator.trim()).ok()
}
