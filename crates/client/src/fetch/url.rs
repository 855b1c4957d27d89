//! Locator resolution against the page's base URL.

use url::{ParseError, Url};

/// Error type for locator resolution failures.
#[derive(Debug, Clone, thiserror::Error)]
pub enum UrlError {
    #[error("empty locator")]
    Empty,

    #[error("unsupported scheme: {0}")]
    UnsupportedScheme(String),

    #[error("relative locator without a base URL: {0}")]
    NoBase(String),

    #[error("invalid URL: {0}")]
    InvalidUrl(String),
}

/// Resolve a locator as written in markup into an absolute URL.
///
/// Steps:
/// 1. Trim leading/trailing whitespace
/// 2. Absolute locators parse as-is; relative ones join onto `base`
/// 3. Only `http`, `https` and `file` schemes are accepted
/// 4. Remove fragment (#...)
/// 5. Keep query string intact (do not reorder)
pub fn resolve(locator: &str, base: Option<&Url>) -> Result<Url, UrlError> {
    let trimmed = locator.trim();

    if trimmed.is_empty() {
        return Err(UrlError::Empty);
    }

    let mut parsed = match Url::parse(trimmed) {
        Ok(url) => url,
        Err(ParseError::RelativeUrlWithoutBase) => {
            let base = base.ok_or_else(|| UrlError::NoBase(trimmed.to_string()))?;
            base.join(trimmed).map_err(|e| UrlError::InvalidUrl(e.to_string()))?
        }
        Err(e) => return Err(UrlError::InvalidUrl(e.to_string())),
    };

    match parsed.scheme() {
        "http" | "https" | "file" => {}
        scheme => return Err(UrlError::UnsupportedScheme(scheme.to_string())),
    }

    parsed.set_fragment(None);

    Ok(parsed)
}
