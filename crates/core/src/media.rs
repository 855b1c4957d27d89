//! Media type resolution for fetched resources.

/// Fallback when neither the network nor the extension table names a type.
pub const DEFAULT_MEDIA_TYPE: &str = "text/plain";

/// Extension suffix to media type, checked in order.
const EXTENSION_TABLE: &[(&str, &str)] = &[
    (".css", "text/css"),
    (".js", "application/javascript"),
    (".json", "application/json"),
    (".webmanifest", "application/manifest+json"),
    (".manifest", "application/manifest+json"),
    (".png", "image/png"),
    (".jpg", "image/jpeg"),
    (".jpeg", "image/jpeg"),
    (".webp", "image/webp"),
    (".ico", "image/x-icon"),
    (".svg", "image/svg+xml"),
];

/// Extensions whose resources are treated as icon images.
const IMAGE_EXTENSIONS: &[&str] = &[".jpg", ".jpeg", ".png", ".webp", ".ico", ".svg"];

/// Pick the media type for a resource.
///
/// A non-empty header value wins verbatim (parameters included). Otherwise the
/// locator's extension is looked up, and `text/plain` is the last resort.
pub fn resolve_media_type(header: Option<&str>, locator: &str) -> String {
    if let Some(value) = header.map(str::trim)
        && !value.is_empty()
    {
        return value.to_string();
    }

    media_type_for_extension(locator)
        .unwrap_or(DEFAULT_MEDIA_TYPE)
        .to_string()
}

/// Look up a media type by the locator's extension.
pub fn media_type_for_extension(locator: &str) -> Option<&'static str> {
    let path = strip_query(locator).to_ascii_lowercase();
    EXTENSION_TABLE
        .iter()
        .find(|(suffix, _)| path.ends_with(suffix))
        .map(|(_, mime)| *mime)
}

/// Whether the locator names an image by extension.
pub fn is_image_locator(locator: &str) -> bool {
    let path = strip_query(locator).to_ascii_lowercase();
    IMAGE_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn strip_query(locator: &str) -> &str {
    let end = locator.find(['?', '#']).unwrap_or(locator.len());
    &locator[..end]
}
