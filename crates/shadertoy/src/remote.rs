use std::fmt;
use std::io::Read;
use std::time::Duration;

use reqwest::blocking::{Client, Response};
use reqwest::header::ETAG;
use reqwest::Url;
use tracing::debug;

use crate::error::CacheError;

/// Access to the Shadertoy service. `ShadertoyClient` talks HTTP; tests supply
/// in-memory implementations.
pub trait RemoteSource {
    /// Returns the raw API body for `shader_id`.
    fn fetch_descriptor(&self, shader_id: &str) -> Result<String, CacheError>;

    /// Opens a media resource by its site-relative path (`/media/a/tex.png`).
    fn open_media(&self, path: &str) -> Result<RemoteAsset, CacheError>;
}

/// An opened media download. Headers are available before the body is read so
/// the caller can decide to drop it unread.
pub struct RemoteAsset {
    pub url: String,
    pub content_length: Option<u64>,
    pub etag: Option<String>,
    pub body: Box<dyn Read>,
}

impl fmt::Debug for RemoteAsset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteAsset")
            .field("url", &self.url)
            .field("content_length", &self.content_length)
            .field("etag", &self.etag)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct ShadertoyConfig {
    pub api_key: String,
    pub api_base: Url,
    pub media_base: Url,
    pub timeout: Option<Duration>,
}

impl ShadertoyConfig {
    pub fn new(api_key: impl Into<String>) -> Result<Self, CacheError> {
        let api_key = api_key.into();
        if api_key.trim().is_empty() {
            return Err(CacheError::Precondition(
                "Shadertoy API key must not be empty".to_string(),
            ));
        }
        Ok(Self {
            api_key,
            api_base: parse_url("https://www.shadertoy.com/api/v1/")?,
            media_base: parse_url("https://www.shadertoy.com/")?,
            timeout: None,
        })
    }

    pub fn with_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.timeout = timeout;
        self
    }
}

fn parse_url(raw: &str) -> Result<Url, CacheError> {
    Url::parse(raw).map_err(|err| CacheError::Precondition(format!("invalid url '{raw}': {err}")))
}

#[derive(Debug, Clone)]
pub struct ShadertoyClient {
    http: Client,
    config: ShadertoyConfig,
}

impl ShadertoyClient {
    pub fn new(config: ShadertoyConfig) -> Result<Self, CacheError> {
        let mut builder =
            Client::builder().user_agent(concat!("toycache/", env!("CARGO_PKG_VERSION")));
        if let Some(timeout) = config.timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().map_err(|err| {
            CacheError::Precondition(format!("failed to construct HTTP client: {err}"))
        })?;
        Ok(Self { http, config })
    }

    fn descriptor_url(&self, shader_id: &str) -> Result<Url, CacheError> {
        let mut url = self.config.api_base.clone();
        url.path_segments_mut()
            .map_err(|_| CacheError::Precondition("invalid Shadertoy API base url".into()))?
            .pop_if_empty()
            .push("shaders")
            .push(shader_id);
        url.query_pairs_mut().append_pair("key", &self.config.api_key);
        Ok(url)
    }

    fn media_url(&self, path: &str) -> Result<Url, CacheError> {
        self.config
            .media_base
            .join(path.trim_start_matches('/'))
            .map_err(|err| CacheError::validation(format!("invalid media path '{path}': {err}")))
    }

    fn get(&self, url: &Url, endpoint: &str) -> Result<Response, CacheError> {
        let response = self
            .http
            .get(url.clone())
            .send()
            .map_err(|err| CacheError::transport(endpoint, err))?;
        let status = response.status();
        if !status.is_success() {
            return Err(CacheError::transport(endpoint, format!("HTTP status {status}")));
        }
        Ok(response)
    }
}

impl RemoteSource for ShadertoyClient {
    fn fetch_descriptor(&self, shader_id: &str) -> Result<String, CacheError> {
        let url = self.descriptor_url(shader_id)?;
        // The query carries the API key; keep it out of logs and errors.
        let endpoint = format!("{}shaders/{shader_id}", self.config.api_base);
        debug!(url = %endpoint, "requesting shader descriptor");
        let response = self.get(&url, &endpoint)?;
        response
            .text()
            .map_err(|err| CacheError::transport(endpoint, err))
    }

    fn open_media(&self, path: &str) -> Result<RemoteAsset, CacheError> {
        let url = self.media_url(path)?;
        debug!(%url, "requesting media");
        let response = self.get(&url, url.as_str())?;
        let etag = response
            .headers()
            .get(ETAG)
            .and_then(|value| value.to_str().ok())
            .map(str::to_owned);
        Ok(RemoteAsset {
            url: url.to_string(),
            content_length: response.content_length(),
            etag,
            body: Box::new(response),
        })
    }
}
