//! Envelope codec: the stored form of a cached resource.
//!
//! Text resources are stored as `{"text": ..., "type": ...}`, the shape older
//! loaders wrote, so their entries stay readable. Binary resources carry
//! base64 in a `bytes` field instead of `text`.

use base64::{Engine, engine::general_purpose::STANDARD};
use serde::{Deserialize, Serialize};

use crate::fetch::FetchMode;
use crate::media::DEFAULT_MEDIA_TYPE;

/// Stored value used when an envelope cannot be serialized.
pub const EMPTY_ENVELOPE: &str = "{}";

/// Resource body, kept as text or raw bytes depending on how it was fetched.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    Text(String),
    Bytes(Vec<u8>),
}

impl Content {
    /// Decode a response body according to the fetch mode.
    pub fn from_body(body: Vec<u8>, mode: FetchMode) -> Self {
        match mode {
            FetchMode::Text => match String::from_utf8(body) {
                Ok(text) => Content::Text(text),
                Err(e) => Content::Text(String::from_utf8_lossy(e.as_bytes()).into_owned()),
            },
            FetchMode::Binary => Content::Bytes(body),
        }
    }

    pub fn as_bytes(&self) -> &[u8] {
        match self {
            Content::Text(text) => text.as_bytes(),
            Content::Bytes(bytes) => bytes,
        }
    }

    pub fn len(&self) -> usize {
        self.as_bytes().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for Content {
    fn default() -> Self {
        Content::Text(String::new())
    }
}

/// Content plus media type, the unit stored per cache key.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ContentEnvelope {
    pub content: Content,
    /// `None` only for envelopes recovered from unreadable entries.
    pub media_type: Option<String>,
}

impl ContentEnvelope {
    pub fn new(content: Content, media_type: impl Into<String>) -> Self {
        Self { content, media_type: Some(media_type.into()) }
    }

    /// Envelope returned when a stored value cannot be parsed.
    pub fn degraded() -> Self {
        Self::default()
    }

    /// Whether this envelope came from a corrupted or foreign entry.
    pub fn is_degraded(&self) -> bool {
        self.media_type.as_deref().is_none_or(str::is_empty)
    }

    /// Media type to realize the content with.
    pub fn media_type(&self) -> &str {
        match self.media_type.as_deref() {
            Some(mime) if !mime.is_empty() => mime,
            _ => DEFAULT_MEDIA_TYPE,
        }
    }
}

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoredEnvelope {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    bytes: Option<String>,
    #[serde(default, rename = "type", skip_serializing_if = "Option::is_none")]
    media_type: Option<String>,
}

/// Serialize an envelope for storage.
///
/// Never fails; a serialization error yields [`EMPTY_ENVELOPE`].
pub fn encode(envelope: &ContentEnvelope) -> String {
    let stored = match &envelope.content {
        Content::Text(text) => StoredEnvelope {
            text: Some(text.clone()),
            bytes: None,
            media_type: envelope.media_type.clone(),
        },
        Content::Bytes(bytes) => StoredEnvelope {
            text: None,
            bytes: Some(STANDARD.encode(bytes)),
            media_type: envelope.media_type.clone(),
        },
    };

    serde_json::to_string(&stored).unwrap_or_else(|e| {
        tracing::warn!("failed to encode envelope: {}", e);
        EMPTY_ENVELOPE.to_string()
    })
}

/// Parse a stored value back into an envelope.
///
/// Never fails; unreadable input yields [`ContentEnvelope::degraded`].
pub fn decode(raw: &str) -> ContentEnvelope {
    let stored: StoredEnvelope = match serde_json::from_str(raw) {
        Ok(stored) => stored,
        Err(e) => {
            tracing::warn!("failed to decode envelope: {}", e);
            return ContentEnvelope::degraded();
        }
    };

    let content = match (stored.bytes, stored.text) {
        (Some(encoded), _) => match STANDARD.decode(encoded.as_bytes()) {
            Ok(bytes) => Content::Bytes(bytes),
            Err(e) => {
                tracing::warn!("failed to decode envelope bytes: {}", e);
                return ContentEnvelope::degraded();
            }
        },
        (None, text) => Content::Text(text.unwrap_or_default()),
    };

    ContentEnvelope { content, media_type: stored.media_type }
}
