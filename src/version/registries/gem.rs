//! RubyGems registry API implementation

use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::Deserialize;

use crate::http::HttpFetcher;
use crate::package::PackageIdentifier;
use crate::version::error::RegistryError;
use crate::version::registries::{
    cached_download, paths_or_empty, require_version, store_artifact, versions_or_empty,
};
use crate::version::registry::{RegistryContext, RegistryManager};

/// One entry of `/api/v1/versions/{name}.json`
#[derive(Debug, Deserialize)]
struct GemVersion {
    number: String,
}

pub struct GemRegistry {
    http: HttpFetcher,
    base_url: String,
    destination: PathBuf,
}

impl GemRegistry {
    pub fn new(ctx: &RegistryContext, destination: &Path) -> Self {
        Self {
            http: ctx.http.clone(),
            base_url: ctx.endpoints.gem.clone(),
            destination: destination.to_path_buf(),
        }
    }

    fn versions_url(&self, name: &str) -> String {
        format!("{}/api/v1/versions/{}.json", self.base_url, name)
    }

    fn gem_url(&self, name: &str) -> String {
        format!("{}/api/v1/gems/{}.json", self.base_url, name)
    }
}

#[async_trait::async_trait]
impl RegistryManager for GemRegistry {
    fn ecosystem(&self) -> &'static str {
        "gem"
    }

    async fn enumerate_versions(
        &self,
        id: &PackageIdentifier,
        use_cache: bool,
    ) -> Result<Vec<String>, RegistryError> {
        let result = self
            .http
            .get_json_as::<Vec<GemVersion>>(&self.versions_url(&id.name), use_cache)
            .await
            .map(|versions| versions.into_iter().map(|v| v.number).collect());

        versions_or_empty(id, result)
    }

    async fn package_exists(&self, id: &PackageIdentifier, use_cache: bool) -> bool {
        self.http.exists(&self.gem_url(&id.name), use_cache).await
    }

    async fn get_metadata(&self, id: &PackageIdentifier, use_cache: bool) -> Option<String> {
        self.http.get_text_opt(&self.gem_url(&id.name), use_cache).await
    }

    async fn download_version(
        &self,
        id: &PackageIdentifier,
        do_extract: bool,
        cached: bool,
    ) -> Result<Vec<PathBuf>, RegistryError> {
        let Some(version) = require_version(id) else {
            return Ok(Vec::new());
        };
        if let Some(path) = cached_download(&self.destination, id, ".gem", do_extract, cached) {
            return Ok(vec![path]);
        }

        // .gem files are plain tar archives of data.tar.gz and metadata.gz
        let url = format!("{}/downloads/{}-{}.gem", self.base_url, id.name, version);
        let result = async {
            let bytes = self.http.get_bytes(&url).await?;
            store_artifact(&self.destination, id, bytes, ".gem", do_extract, cached).await
        }
        .await;

        paths_or_empty(id, result)
    }

    fn package_absolute_url(&self, id: &PackageIdentifier) -> Option<Url> {
        let mut url = format!("https://rubygems.org/gems/{}", id.name);
        if let Some(version) = id.version() {
            url.push_str("/versions/");
            url.push_str(version);
        }
        Url::parse(&url).ok()
    }
}
