//! Resource fetch client.
//!
//! ### Locators
//! - Relative locators resolve against the page's base URL
//! - Fragments removed, query string preserved
//!
//! ### Network
//! - One GET per call with default headers only
//! - Max redirects: 5
//! - Max body bytes: 5MB (configurable)
//! - Non-2xx statuses are returned, not raised; the loader decides
//!
//! ### Local files
//! - `file://` locators are read from disk when enabled and reported with the
//!   opaque success status

pub mod url;

use std::time::{Duration, Instant};

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{Client, Url, header};

use instapage_core::fetch::OPAQUE_SUCCESS;
use instapage_core::{AppConfig, Error, FetchMode, FetchedResource, ResourceFetcher};

pub use self::url::{UrlError, resolve};

/// Configuration for the fetch client.
#[derive(Debug, Clone)]
pub struct FetchConfig {
    /// User agent string (default: "instapage/0.1")
    pub user_agent: String,

    /// Maximum response body size in bytes (default: 5MB)
    pub max_bytes: usize,

    /// Request timeout (default: 20s)
    pub timeout: Duration,

    /// Maximum number of redirects to follow (default: 5)
    pub max_redirects: usize,

    /// Base URL for relative locators
    pub base_url: Option<Url>,

    /// Whether `file://` locators may be read (default: false)
    pub allow_local_files: bool,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            user_agent: "instapage/0.1".to_string(),
            max_bytes: 5 * 1024 * 1024,
            timeout: Duration::from_millis(20000),
            max_redirects: 5,
            base_url: None,
            allow_local_files: false,
        }
    }
}

impl From<&AppConfig> for FetchConfig {
    fn from(config: &AppConfig) -> Self {
        Self {
            user_agent: config.user_agent.clone(),
            max_bytes: config.max_bytes,
            timeout: config.timeout(),
            allow_local_files: config.allow_local_files,
            ..Default::default()
        }
    }
}

/// HTTP and local-file fetch client.
#[derive(Debug, Clone)]
pub struct FetchClient {
    http: Client,
    config: FetchConfig,
}

impl FetchClient {
    /// Create a new fetch client with the given configuration.
    pub fn new(config: FetchConfig) -> Result<Self, Error> {
        let http = Client::builder()
            .user_agent(&config.user_agent)
            .timeout(config.timeout)
            .redirect(reqwest::redirect::Policy::limited(config.max_redirects))
            .use_rustls_tls()
            .gzip(true)
            .brotli(true)
            .deflate(true)
            .build()
            .map_err(|e| Error::HttpError(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { http, config })
    }

    /// Same client, resolving relative locators against `base`.
    pub fn with_base_url(&self, base: Option<Url>) -> Self {
        Self { http: self.http.clone(), config: FetchConfig { base_url: base, ..self.config.clone() } }
    }

    /// Get reference to the configuration.
    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    /// Resolve a locator against the configured base URL.
    pub fn resolve(&self, locator: &str) -> Result<Url, Error> {
        resolve(locator, self.config.base_url.as_ref()).map_err(|e| Error::InvalidUrl(e.to_string()))
    }

    async fn fetch_http(&self, url: Url) -> Result<FetchedResource, Error> {
        let start = Instant::now();

        let response = self.http.get(url.as_str()).send().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{}: {}", url, e))
            } else {
                Error::HttpError(format!("network error: {}", e))
            }
        })?;

        let status = response.status();

        if let Some(len) = response.content_length()
            && len as usize > self.config.max_bytes
        {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }

        let content_type = response
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(|s| s.to_string());

        let body: Bytes = response.bytes().await.map_err(|e| {
            if e.is_timeout() {
                Error::FetchTimeout(format!("{}: {}", url, e))
            } else {
                Error::HttpError(format!("failed to read response: {}", e))
            }
        })?;

        self.check_size(body.len())?;

        tracing::debug!(
            "fetched {} -> {} in {}ms ({} bytes)",
            url,
            status.as_u16(),
            start.elapsed().as_millis(),
            body.len()
        );

        Ok(FetchedResource { status: status.as_u16(), content_type, body: body.to_vec() })
    }

    async fn fetch_file(&self, url: Url) -> Result<FetchedResource, Error> {
        if !self.config.allow_local_files {
            return Err(Error::LocalFile(format!("local files are disabled: {}", url)));
        }

        let path = url
            .to_file_path()
            .map_err(|_| Error::InvalidUrl(format!("not a local path: {}", url)))?;
        let body = tokio::fs::read(&path)
            .await
            .map_err(|e| Error::LocalFile(format!("{}: {}", path.display(), e)))?;

        self.check_size(body.len())?;
        tracing::debug!("read {} ({} bytes)", path.display(), body.len());

        Ok(FetchedResource { status: OPAQUE_SUCCESS, content_type: None, body })
    }

    fn check_size(&self, len: usize) -> Result<(), Error> {
        if len > self.config.max_bytes {
            return Err(Error::FetchTooLarge(format!("{} bytes exceeds {}", len, self.config.max_bytes)));
        }
        Ok(())
    }
}

#[async_trait]
impl ResourceFetcher for FetchClient {
    async fn fetch(&self, locator: &str, mode: FetchMode) -> Result<FetchedResource, Error> {
        let url = self.resolve(locator)?;
        tracing::debug!(?mode, "fetching {}", url);

        if url.scheme() == "file" { self.fetch_file(url).await } else { self.fetch_http(url).await }
    }
}
