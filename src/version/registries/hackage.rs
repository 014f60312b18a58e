//! Hackage implementation

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

/// Response from `/package/{name}/preferred`
#[derive(Debug, Deserialize)]
struct PreferredVersions {
    #[serde(rename = "normal-version", default)]
    normal: Vec<String>,
    #[serde(rename = "deprecated-version", default)]
    deprecated: Vec<String>,
}

pub struct HackageRegistry {
    http: HttpFetcher,
    base_url: String,
    destination: PathBuf,
}

impl HackageRegistry {
    pub fn new(ctx: &RegistryContext, destination: &Path) -> Self {
        Self {
            http: ctx.http.clone(),
            base_url: ctx.endpoints.hackage.clone(),
            destination: destination.to_path_buf(),
        }
    }

    fn preferred_url(&self, name: &str) -> String {
        format!("{}/package/{}/preferred", self.base_url, name)
    }
}

#[async_trait::async_trait]
impl RegistryManager for HackageRegistry {
    fn ecosystem(&self) -> &'static str {
        "hackage"
    }

    async fn enumerate_versions(
        &self,
        id: &PackageIdentifier,
        use_cache: bool,
    ) -> Result<Vec<String>, RegistryError> {
        let result = self
            .http
            .get_json_as::<PreferredVersions>(&self.preferred_url(&id.name), use_cache)
            .await
            .map(|preferred| {
                preferred
                    .normal
                    .into_iter()
                    .chain(preferred.deprecated)
                    .collect()
            });

        versions_or_empty(id, result)
    }

    async fn package_exists(&self, id: &PackageIdentifier, use_cache: bool) -> bool {
        self.http
            .exists(&self.preferred_url(&id.name), use_cache)
            .await
    }

    /// The package's `.cabal` file, for the given version when there is one
    async fn get_metadata(&self, id: &PackageIdentifier, use_cache: bool) -> Option<String> {
        let url = match id.version() {
            Some(version) => format!(
                "{}/package/{}-{}/{}.cabal",
                self.base_url, id.name, version, id.name
            ),
            None => format!("{}/package/{}/{}.cabal", self.base_url, id.name, id.name),
        };
        self.http.get_text_opt(&url, use_cache).await
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

        let package = format!("{}-{}", id.name, version);
        let url = format!("{}/package/{}/{}.tar.gz", self.base_url, package, package);
        let result = async {
            let bytes = self.http.get_bytes(&url).await?;
            store_artifact(&self.destination, id, bytes, ".tar.gz", do_extract, cached).await
        }
        .await;

        paths_or_empty(id, result)
    }

    fn package_absolute_url(&self, id: &PackageIdentifier) -> Option<Url> {
        let url = match id.version() {
            Some(version) => format!("https://hackage.haskell.org/package/{}-{}", id.name, version),
            None => format!("https://hackage.haskell.org/package/{}", id.name),
        };
        Url::parse(&url).ok()
    }
}
