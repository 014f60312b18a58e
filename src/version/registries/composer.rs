//! Packagist (Composer) registry implementation

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::Deserialize;

use crate::http::HttpFetcher;
use crate::package::PackageIdentifier;
use crate::version::error::RegistryError;
use crate::version::registries::{
    cached_download, paths_or_empty, require_namespace, require_version, store_artifact,
    versions_or_empty,
};
use crate::version::registry::{RegistryContext, RegistryManager};

/// Response from `/p2/{vendor}/{package}.json`
#[derive(Debug, Deserialize)]
struct P2Response {
    #[serde(default)]
    packages: HashMap<String, Vec<P2Version>>,
}

#[derive(Debug, Deserialize)]
struct P2Version {
    version: String,
    dist: Option<P2Dist>,
}

#[derive(Debug, Deserialize)]
struct P2Dist {
    url: String,
}

/// Registry manager for Packagist; the namespace is the vendor
pub struct ComposerRegistry {
    http: HttpFetcher,
    base_url: String,
    destination: PathBuf,
}

impl ComposerRegistry {
    pub fn new(ctx: &RegistryContext, destination: &Path) -> Self {
        Self {
            http: ctx.http.clone(),
            base_url: ctx.endpoints.composer.clone(),
            destination: destination.to_path_buf(),
        }
    }

    fn p2_url(&self, vendor: &str, name: &str) -> String {
        format!("{}/p2/{}/{}.json", self.base_url, vendor, name)
    }

    async fn fetch_versions(
        &self,
        vendor: &str,
        name: &str,
        use_cache: bool,
    ) -> Result<Vec<P2Version>, RegistryError> {
        let mut response: P2Response = self
            .http
            .get_json_as(&self.p2_url(vendor, name), use_cache)
            .await?;
        let full_name = format!("{}/{}", vendor, name);
        response
            .packages
            .remove(&full_name)
            .ok_or(RegistryError::NotFound(full_name))
    }
}

#[async_trait::async_trait]
impl RegistryManager for ComposerRegistry {
    fn ecosystem(&self) -> &'static str {
        "composer"
    }

    async fn enumerate_versions(
        &self,
        id: &PackageIdentifier,
        use_cache: bool,
    ) -> Result<Vec<String>, RegistryError> {
        let Some(vendor) = require_namespace(id, "list versions of") else {
            return Ok(Vec::new());
        };

        let result = self
            .fetch_versions(vendor, &id.name, use_cache)
            .await
            .map(|versions| versions.into_iter().map(|v| v.version).collect());

        versions_or_empty(id, result)
    }

    async fn package_exists(&self, id: &PackageIdentifier, use_cache: bool) -> bool {
        match id.namespace() {
            Some(vendor) => self.http.exists(&self.p2_url(vendor, &id.name), use_cache).await,
            None => false,
        }
    }

    async fn get_metadata(&self, id: &PackageIdentifier, use_cache: bool) -> Option<String> {
        let vendor = require_namespace(id, "fetch metadata of")?;
        self.http
            .get_text_opt(&self.p2_url(vendor, &id.name), use_cache)
            .await
    }

    async fn download_version(
        &self,
        id: &PackageIdentifier,
        do_extract: bool,
        cached: bool,
    ) -> Result<Vec<PathBuf>, RegistryError> {
        let Some(vendor) = require_namespace(id, "download") else {
            return Ok(Vec::new());
        };
        let Some(version) = require_version(id) else {
            return Ok(Vec::new());
        };
        if let Some(path) = cached_download(&self.destination, id, ".zip", do_extract, cached) {
            return Ok(vec![path]);
        }

        let result = async {
            let versions = self.fetch_versions(vendor, &id.name, cached).await?;
            let entry = versions
                .into_iter()
                .find(|v| v.version == version)
                .ok_or_else(|| RegistryError::NotFound(format!("{} {}", id.full_name(), version)))?;
            let dist = entry.dist.ok_or_else(|| {
                RegistryError::InvalidResponse(format!("{} {} has no dist", id.full_name(), version))
            })?;

            let bytes = self.http.get_bytes(&dist.url).await?;
            store_artifact(&self.destination, id, bytes, ".zip", do_extract, cached).await
        }
        .await;

        paths_or_empty(id, result)
    }

    fn package_absolute_url(&self, id: &PackageIdentifier) -> Option<Url> {
        let vendor = id.namespace()?;
        let mut url = format!("https://packagist.org/packages/{}/{}", vendor, id.name);
        if let Some(version) = id.version() {
            url.push('#');
            url.push_str(version);
        }
        Url::parse(&url).ok()
    }
}
