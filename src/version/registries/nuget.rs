//! NuGet v3 API implementation

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

/// Response from the flat container `index.json`
#[derive(Debug, Deserialize)]
struct FlatContainerIndex {
    #[serde(default)]
    versions: Vec<String>,
}

pub struct NuGetRegistry {
    http: HttpFetcher,
    base_url: String,
    destination: PathBuf,
}

impl NuGetRegistry {
    pub fn new(ctx: &RegistryContext, destination: &Path) -> Self {
        Self {
            http: ctx.http.clone(),
            base_url: ctx.endpoints.nuget.clone(),
            destination: destination.to_path_buf(),
        }
    }

    /// NuGet ids are case-insensitive; the flat container only serves lowercase
    fn lower_id(id: &PackageIdentifier) -> String {
        id.name.to_lowercase()
    }

    fn index_url(&self, id: &PackageIdentifier) -> String {
        format!(
            "{}/v3-flatcontainer/{}/index.json",
            self.base_url,
            Self::lower_id(id)
        )
    }

    fn registration_url(&self, id: &PackageIdentifier) -> String {
        format!(
            "{}/v3/registration5-semver1/{}/index.json",
            self.base_url,
            Self::lower_id(id)
        )
    }

    fn package_url(&self, id: &PackageIdentifier, version: &str) -> String {
        let lower_id = Self::lower_id(id);
        let lower_version = version.to_lowercase();
        format!(
            "{}/v3-flatcontainer/{}/{}/{}.{}.nupkg",
            self.base_url, lower_id, lower_version, lower_id, lower_version
        )
    }
}

#[async_trait::async_trait]
impl RegistryManager for NuGetRegistry {
    fn ecosystem(&self) -> &'static str {
        "nuget"
    }

    async fn enumerate_versions(
        &self,
        id: &PackageIdentifier,
        use_cache: bool,
    ) -> Result<Vec<String>, RegistryError> {
        let result = self
            .http
            .get_json_as::<FlatContainerIndex>(&self.index_url(id), use_cache)
            .await
            .map(|index| index.versions);

        versions_or_empty(id, result)
    }

    async fn package_exists(&self, id: &PackageIdentifier, use_cache: bool) -> bool {
        self.http.exists(&self.index_url(id), use_cache).await
    }

    async fn get_metadata(&self, id: &PackageIdentifier, use_cache: bool) -> Option<String> {
        self.http
            .get_text_opt(&self.registration_url(id), use_cache)
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
        if let Some(path) = cached_download(&self.destination, id, ".nupkg", do_extract, cached) {
            return Ok(vec![path]);
        }

        let result = async {
            let bytes = self.http.get_bytes(&self.package_url(id, version)).await?;
            store_artifact(&self.destination, id, bytes, ".nupkg", do_extract, cached).await
        }
        .await;

        paths_or_empty(id, result)
    }

    fn package_absolute_url(&self, id: &PackageIdentifier) -> Option<Url> {
        let mut url = format!("https://www.nuget.org/packages/{}", id.name);
        if let Some(version) = id.version() {
            url.push('/');
            url.push_str(version);
        }
        Url::parse(&url).ok()
    }
}
