//! Registry manager trait: one implementation per package ecosystem

use std::path::PathBuf;
use std::sync::Arc;

#[cfg(test)]
use mockall::automock;
use reqwest::Url;

use crate::config::EndpointConfig;
use crate::http::HttpFetcher;
use crate::package::PackageIdentifier;
use crate::version::error::RegistryError;

/// Shared collaborators handed to every registry manager
#[derive(Clone)]
pub struct RegistryContext {
    pub http: HttpFetcher,
    pub endpoints: Arc<EndpointConfig>,
}

impl RegistryContext {
    pub fn new(http: HttpFetcher, endpoints: EndpointConfig) -> Self {
        Self {
            http,
            endpoints: Arc::new(endpoints),
        }
    }
}

/// Uniform access to one package registry
#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait RegistryManager: Send + Sync {
    /// Ecosystem tag handled by this manager (e.g. "npm")
    fn ecosystem(&self) -> &'static str;

    /// Lists every published version of the package, oldest first, newest last
    ///
    /// # Returns
    /// * `Ok(versions)` - De-duplicated versions; empty when the package doesn't exist
    /// * `Err(RegistryError)` - The registry was unreachable or answered garbage
    async fn enumerate_versions(
        &self,
        id: &PackageIdentifier,
        use_cache: bool,
    ) -> Result<Vec<String>, RegistryError>;

    /// Cheapest existence probe; any failure reads as "does not exist"
    async fn package_exists(&self, id: &PackageIdentifier, use_cache: bool) -> bool;

    /// Raw registry metadata document, or `None` when unavailable
    async fn get_metadata(&self, id: &PackageIdentifier, use_cache: bool) -> Option<String>;

    /// Downloads the exact version named by `id`
    ///
    /// # Arguments
    /// * `do_extract` - Unpack into the deterministic directory instead of saving the archive
    /// * `cached` - Reuse an existing target without any network call
    ///
    /// # Returns
    /// * `Ok(paths)` - Local paths produced; empty when `id` lacks a required field
    /// * `Err(RegistryError)` - Download or extraction failed
    async fn download_version(
        &self,
        id: &PackageIdentifier,
        do_extract: bool,
        cached: bool,
    ) -> Result<Vec<PathBuf>, RegistryError>;

    /// Human-followable registry page for the package; performs no I/O
    fn package_absolute_url(&self, id: &PackageIdentifier) -> Option<Url>;
}
