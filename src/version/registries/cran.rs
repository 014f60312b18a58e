//! CRAN implementation, with version listings from crandb

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use reqwest::Url;
use serde::Deserialize;
use tracing::debug;

use crate::http::HttpFetcher;
use crate::package::PackageIdentifier;
use crate::version::error::RegistryError;
use crate::version::registries::{
    cached_download, paths_or_empty, require_version, store_artifact, versions_or_empty,
};
use crate::version::registry::{RegistryContext, RegistryManager};

/// Response from crandb `/{name}/all`
#[derive(Debug, Deserialize)]
struct CranDbPackage {
    #[serde(default)]
    versions: IndexMap<String, serde_json::Value>,
}

pub struct CranRegistry {
    http: HttpFetcher,
    cran_url: String,
    crandb_url: String,
    destination: PathBuf,
}

impl CranRegistry {
    pub fn new(ctx: &RegistryContext, destination: &Path) -> Self {
        Self {
            http: ctx.http.clone(),
            cran_url: ctx.endpoints.cran.clone(),
            crandb_url: ctx.endpoints.crandb.clone(),
            destination: destination.to_path_buf(),
        }
    }

    fn crandb_url(&self, name: &str) -> String {
        format!("{}/{}/all", self.crandb_url, name)
    }

    /// Current releases live in `src/contrib`; superseded ones move to
    /// `src/contrib/Archive/{name}`.
    async fn fetch_source(&self, name: &str, version: &str) -> Result<Vec<u8>, RegistryError> {
        let file = format!("{}_{}.tar.gz", name, version);
        let current = format!("{}/src/contrib/{}", self.cran_url, file);
        match self.http.get_bytes(&current).await {
            Err(RegistryError::NotFound(_)) => {
                debug!("{} not in src/contrib, trying the archive", file);
                let archived = format!("{}/src/contrib/Archive/{}/{}", self.cran_url, name, file);
                self.http.get_bytes(&archived).await
            }
            other => other,
        }
    }
}

#[async_trait::async_trait]
impl RegistryManager for CranRegistry {
    fn ecosystem(&self) -> &'static str {
        "cran"
    }

    async fn enumerate_versions(
        &self,
        id: &PackageIdentifier,
        use_cache: bool,
    ) -> Result<Vec<String>, RegistryError> {
        let result = self
            .http
            .get_json_as::<CranDbPackage>(&self.crandb_url(&id.name), use_cache)
            .await
            .map(|package| package.versions.into_keys().collect());

        versions_or_empty(id, result)
    }

    async fn package_exists(&self, id: &PackageIdentifier, use_cache: bool) -> bool {
        let url = format!("{}/{}", self.crandb_url, id.name);
        self.http.exists(&url, use_cache).await
    }

    async fn get_metadata(&self, id: &PackageIdentifier, use_cache: bool) -> Option<String> {
        self.http
            .get_text_opt(&self.crandb_url(&id.name), use_cache)
            .await
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
        if let Some(path) = cached_download(&self.destination, id, ".tar.gz", do_extract, cached) {
            return Ok(vec![path]);
        }

        let result = async {
            let bytes = self.fetch_source(&id.name, version).await?;
            store_artifact(&self.destination, id, bytes, ".tar.gz", do_extract, cached).await
        }
        .await;

        paths_or_empty(id, result)
    }

    fn package_absolute_url(&self, id: &PackageIdentifier) -> Option<Url> {
        let url = format!("https://cran.r-project.org/package={}", id.name);
        Url::parse(&url).ok()
    }
}
