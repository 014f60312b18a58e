//! npm registry API implementation

use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use reqwest::Url;
use serde::Deserialize;

use crate::http::HttpFetcher;
use crate::package::PackageIdentifier;
use crate::version::error::RegistryError;
use crate::version::registries::{
    cached_download, paths_or_empty, require_version, store_artifact, versions_or_empty,
};
use crate::version::registry::{RegistryContext, RegistryManager};

/// Public package pages
const WEB_URL: &str = "https://www.npmjs.com/package";

/// Response from npm registry API
#[derive(Debug, Deserialize)]
struct NpmPackageResponse {
    #[serde(default)]
    versions: IndexMap<String, serde_json::Value>,
}

/// Registry manager for the npm registry
pub struct NpmRegistry {
    http: HttpFetcher,
    base_url: String,
    destination: PathBuf,
}

impl NpmRegistry {
    pub fn new(ctx: &RegistryContext, destination: &Path) -> Self {
        Self {
            http: ctx.http.clone(),
            base_url: ctx.endpoints.npm.clone(),
            destination: destination.to_path_buf(),
        }
    }

    /// `@scope/name` for scoped packages, `name` otherwise
    fn package_name(id: &PackageIdentifier) -> String {
        match id.namespace() {
            Some(scope) if scope.starts_with('@') => format!("{}/{}", scope, id.name),
            Some(scope) => format!("@{}/{}", scope, id.name),
            None => id.name.clone(),
        }
    }

    /// Encode package name for URL (handles scoped packages)
    fn encode_package_name(package_name: &str) -> String {
        if package_name.starts_with('@') {
            // Scoped package: @scope/name -> @scope%2Fname
            package_name.replace('/', "%2F")
        } else {
            package_name.to_string()
        }
    }

    fn document_url(&self, id: &PackageIdentifier) -> String {
        format!(
            "{}/{}",
            self.base_url,
            Self::encode_package_name(&Self::package_name(id))
        )
    }

    /// https://registry.npmjs.org/@scope/name/-/name-1.0.0.tgz
    fn tarball_url(&self, id: &PackageIdentifier, version: &str) -> String {
        format!(
            "{}/{}/-/{}-{}.tgz",
            self.base_url,
            Self::package_name(id),
            id.name,
            version
        )
    }
}

#[async_trait::async_trait]
impl RegistryManager for NpmRegistry {
    fn ecosystem(&self) -> &'static str {
        "npm"
    }

    async fn enumerate_versions(
        &self,
        id: &PackageIdentifier,
        use_cache: bool,
    ) -> Result<Vec<String>, RegistryError> {
        let result = self
            .http
            .get_json_as::<NpmPackageResponse>(&self.document_url(id), use_cache)
            .await
            .map(|package| package.versions.into_keys().collect());

        versions_or_empty(id, result)
    }

    async fn package_exists(&self, id: &PackageIdentifier, use_cache: bool) -> bool {
        self.http.exists(&self.document_url(id), use_cache).await
    }

    async fn get_metadata(&self, id: &PackageIdentifier, use_cache: bool) -> Option<String> {
        self.http.get_text_opt(&self.document_url(id), use_cache).await
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
        if let Some(path) = cached_download(&self.destination, id, ".tgz", do_extract, cached) {
            return Ok(vec![path]);
        }

        let result = async {
            let bytes = self.http.get_bytes(&self.tarball_url(id, version)).await?;
            store_artifact(&self.destination, id, bytes, ".tgz", do_extract, cached).await
        }
        .await;

        paths_or_empty(id, result)
    }

    fn package_absolute_url(&self, id: &PackageIdentifier) -> Option<Url> {
        let mut url = format!("{}/{}", WEB_URL, Self::package_name(id));
        if let Some(version) = id.version() {
            url.push_str("/v/");
            url.push_str(version);
        }
        Url::parse(&url).ok()
    }
}
