//! HTTP access shared by every registry, with an optional response cache
//!
//! Cached lookups never touch the network on a fresh hit, including hits on
//! a remembered "not found", so existence probes over many candidate names
//! stay cheap when repeated.

use std::sync::Arc;
use std::time::Duration;

use reqwest::{RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use tracing::{debug, warn};

use crate::cache::{CachedResponse, HttpCache};
use crate::config::{FetchConfig, HttpConfig, http_cache_path};
use crate::version::error::{DownloadError, RegistryError};

#[derive(Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    cache: Arc<HttpCache>,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig, cache: HttpCache) -> Result<Self, RegistryError> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.as_str())
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()?;

        Ok(Self {
            client,
            cache: Arc::new(cache),
        })
    }

    /// Builds a fetcher whose response cache follows `config.cache`
    pub fn from_config(config: &FetchConfig) -> Result<Self, DownloadError> {
        let cache = if config.cache.persistent {
            let db_path = http_cache_path();
            if let Some(parent) = db_path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let cache = HttpCache::new(&db_path, config.cache.ttl_ms)?;
            match cache.prune_expired() {
                Ok(pruned) if pruned > 0 => debug!("Pruned {} expired HTTP cache entries", pruned),
                Ok(_) => {}
                Err(e) => warn!("Failed to prune HTTP cache: {}", e),
            }
            cache
        } else {
            HttpCache::in_memory(config.cache.ttl_ms)?
        };

        Ok(Self::new(&config.http, cache)?)
    }

    /// Fetches `url` as text
    pub async fn get_text(&self, url: &str, use_cache: bool) -> Result<String, RegistryError> {
        let request = self.client.get(url);
        self.fetch_body(url, request, use_cache).await
    }

    /// Fetches `url` as text, logging and swallowing any failure
    pub async fn get_text_opt(&self, url: &str, use_cache: bool) -> Option<String> {
        self.get_text(url, use_cache)
            .await
            .inspect_err(|e| warn!("Failed to fetch {}: {}", url, e))
            .ok()
    }

    /// Fetches `url` and parses the body as JSON
    pub async fn get_json(
        &self,
        url: &str,
        use_cache: bool,
    ) -> Result<serde_json::Value, RegistryError> {
        self.get_json_as(url, use_cache).await
    }

    /// Fetches `url` and deserializes the JSON body into `T`
    pub async fn get_json_as<T: DeserializeOwned>(
        &self,
        url: &str,
        use_cache: bool,
    ) -> Result<T, RegistryError> {
        let request = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, "application/json");
        let body = self.fetch_body(url, request, use_cache).await?;
        parse_json(url, &body)
    }

    /// POSTs a JSON body and parses the JSON response
    pub async fn post_json(
        &self,
        url: &str,
        payload: &serde_json::Value,
        accept: &str,
        use_cache: bool,
    ) -> Result<serde_json::Value, RegistryError> {
        self.post_json_as(url, payload, accept, use_cache).await
    }

    /// POSTs a JSON body and deserializes the JSON response into `T`.
    ///
    /// The cache key covers both the URL and the request body.
    pub async fn post_json_as<T: DeserializeOwned>(
        &self,
        url: &str,
        payload: &serde_json::Value,
        accept: &str,
        use_cache: bool,
    ) -> Result<T, RegistryError> {
        let key = format!("POST {} {}", url, payload);
        let request = self
            .client
            .post(url)
            .header(reqwest::header::ACCEPT, accept)
            .json(payload);
        let body = self.fetch_body(&key, request, use_cache).await?;
        parse_json(url, &body)
    }

    /// Returns true when `url` answers with a success status and a JSON body.
    ///
    /// Never fails: every error is reported as "does not exist".
    pub async fn exists(&self, url: &str, use_cache: bool) -> bool {
        match self.get_json(url, use_cache).await {
            Ok(_) => true,
            Err(RegistryError::NotFound(_)) => false,
            Err(e) => {
                debug!("Existence probe for {} failed: {}", url, e);
                false
            }
        }
    }

    /// Downloads a binary artifact; artifacts are cached on disk, never here
    pub async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, RegistryError> {
        debug!("Downloading {}", url);
        let response = self.client.get(url).send().await?;
        let response = check_status(url, response)?;
        Ok(response.bytes().await?.to_vec())
    }

    async fn fetch_body(
        &self,
        key: &str,
        request: RequestBuilder,
        use_cache: bool,
    ) -> Result<String, RegistryError> {
        if use_cache && let Some(cached) = self.cached(key) {
            debug!("HTTP cache hit: {}", key);
            return if cached.is_success() {
                Ok(cached.body)
            } else {
                Err(RegistryError::NotFound(key.to_string()))
            };
        }

        let response = request.send().await?;
        let status = response.status();

        let response = match check_status(key, response) {
            Ok(response) => response,
            Err(RegistryError::NotFound(what)) => {
                if use_cache {
                    self.store(key, status, "");
                }
                return Err(RegistryError::NotFound(what));
            }
            Err(e) => return Err(e),
        };

        let body = response.text().await?;
        if use_cache {
            self.store(key, status, &body);
        }
        Ok(body)
    }

    fn cached(&self, key: &str) -> Option<CachedResponse> {
        self.cache
            .get(key)
            .inspect_err(|e| warn!("HTTP cache lookup failed for {}: {}", key, e))
            .ok()
            .flatten()
    }

    fn store(&self, key: &str, status: StatusCode, body: &str) {
        let _ = self
            .cache
            .put(key, status.as_u16(), body)
            .inspect_err(|e| warn!("Failed to cache response for {}: {}", key, e));
    }
}

/// Maps registry status codes onto [`RegistryError`]
fn check_status(what: &str, response: Response) -> Result<Response, RegistryError> {
    let status = response.status();

    // Registries answer 404, and some 410, for packages that don't exist
    if status == StatusCode::NOT_FOUND || status == StatusCode::GONE {
        return Err(RegistryError::NotFound(what.to_string()));
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get("retry-after")
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse().ok());
        return Err(RegistryError::RateLimited {
            retry_after_secs: retry_after,
        });
    }

    if !status.is_success() {
        warn!("Registry returned status {}: {}", status, what);
        return Err(RegistryError::InvalidResponse(format!(
            "Unexpected status: {}",
            status
        )));
    }

    Ok(response)
}

fn parse_json<T: DeserializeOwned>(url: &str, body: &str) -> Result<T, RegistryError> {
    serde_json::from_str(body).map_err(|e| {
        warn!("Failed to parse response from {}: {}", url, e);
        RegistryError::InvalidResponse(e.to_string())
    })
}

#[cfg(test)]
pub(crate) fn test_fetcher() -> HttpFetcher {
    HttpFetcher::new(
        &HttpConfig::default(),
        HttpCache::in_memory(crate::config::DEFAULT_CACHE_TTL_MS).unwrap(),
    )
    .unwrap()
}
