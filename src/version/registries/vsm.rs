//! Visual Studio Marketplace gallery implementation

use std::path::{Path, PathBuf};

use reqwest::Url;
use serde::Deserialize;
use serde_json::json;
use tracing::warn;

use crate::http::HttpFetcher;
use crate::package::PackageIdentifier;
use crate::version::error::RegistryError;
use crate::version::registries::{
    cached_download, paths_or_empty, require_namespace, require_version, store_artifact,
    versions_or_empty,
};
use crate::version::registry::{RegistryContext, RegistryManager};

const QUERY_ACCEPT: &str = "application/json;api-version=3.0-preview.1";
/// Filter on `publisher.extension`
const FILTER_EXTENSION_NAME: u32 = 7;
/// IncludeVersions | IncludeFiles | IncludeAssetUri
const QUERY_FLAGS: u32 = 0x1 | 0x2 | 0x80;
const VSIX_ASSET_TYPE: &str = "Microsoft.VisualStudio.Services.VSIXPackage";

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<QueryResult>,
}

#[derive(Debug, Deserialize)]
struct QueryResult {
    #[serde(default)]
    extensions: Vec<Extension>,
}

#[derive(Debug, Deserialize)]
struct Extension {
    #[serde(default)]
    versions: Vec<ExtensionVersion>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtensionVersion {
    version: String,
    #[serde(default)]
    files: Vec<ExtensionFile>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExtensionFile {
    asset_type: String,
    source: String,
}

/// Registry manager for VS Code extensions; the namespace is the publisher
pub struct VsMarketplaceRegistry {
    http: HttpFetcher,
    base_url: String,
    destination: PathBuf,
}

impl VsMarketplaceRegistry {
    pub fn new(ctx: &RegistryContext, destination: &Path) -> Self {
        Self {
            http: ctx.http.clone(),
            base_url: ctx.endpoints.vsm.clone(),
            destination: destination.to_path_buf(),
        }
    }

    fn query_url(&self) -> String {
        format!("{}/_apis/public/gallery/extensionquery", self.base_url)
    }

    fn query_payload(publisher: &str, name: &str) -> serde_json::Value {
        json!({
            "filters": [{
                "criteria": [{
                    "filterType": FILTER_EXTENSION_NAME,
                    "value": format!("{}.{}", publisher, name),
                }],
            }],
            "flags": QUERY_FLAGS,
        })
    }

    /// Versions of the extension as returned by the gallery, newest first
    async fn query_versions(
        &self,
        publisher: &str,
        name: &str,
        use_cache: bool,
    ) -> Result<Vec<ExtensionVersion>, RegistryError> {
        let response: QueryResponse = self
            .http
            .post_json_as(
                &self.query_url(),
                &Self::query_payload(publisher, name),
                QUERY_ACCEPT,
                use_cache,
            )
            .await?;

        response
            .results
            .into_iter()
            .flat_map(|r| r.extensions)
            .next()
            .map(|extension| extension.versions)
            .ok_or_else(|| RegistryError::NotFound(format!("{}.{}", publisher, name)))
    }
}

#[async_trait::async_trait]
impl RegistryManager for VsMarketplaceRegistry {
    fn ecosystem(&self) -> &'static str {
        "vsm"
    }

    async fn enumerate_versions(
        &self,
        id: &PackageIdentifier,
        use_cache: bool,
    ) -> Result<Vec<String>, RegistryError> {
        let Some(publisher) = require_namespace(id, "list versions of") else {
            return Ok(Vec::new());
        };

        let result = self
            .query_versions(publisher, &id.name, use_cache)
            .await
            .map(|versions| versions.into_iter().map(|v| v.version).collect());

        versions_or_empty(id, result)
    }

    async fn package_exists(&self, id: &PackageIdentifier, use_cache: bool) -> bool {
        let Some(publisher) = id.namespace() else {
            return false;
        };
        self.query_versions(publisher, &id.name, use_cache)
            .await
            .is_ok()
    }

    async fn get_metadata(&self, id: &PackageIdentifier, use_cache: bool) -> Option<String> {
        let publisher = require_namespace(id, "fetch metadata of")?;
        let value = self
            .http
            .post_json(
                &self.query_url(),
                &Self::query_payload(publisher, &id.name),
                QUERY_ACCEPT,
                use_cache,
            )
            .await
            .inspect_err(|e| warn!("Failed to query {}: {}", id, e))
            .ok()?;
        Some(value.to_string())
    }

    async fn download_version(
        &self,
        id: &PackageIdentifier,
        do_extract: bool,
        cached: bool,
    ) -> Result<Vec<PathBuf>, RegistryError> {
        let Some(publisher) = require_namespace(id, "download") else {
            return Ok(Vec::new());
        };
        let Some(version) = require_version(id) else {
            return Ok(Vec::new());
        };
        if let Some(path) = cached_download(&self.destination, id, ".vsix", do_extract, cached) {
            return Ok(vec![path]);
        }

        let result = async {
            let vsix_url = self
                .query_versions(publisher, &id.name, cached)
                .await?
                .into_iter()
                .filter(|v| v.version == version)
                .flat_map(|v| v.files)
                .find(|f| f.asset_type == VSIX_ASSET_TYPE)
                .map(|f| f.source)
                .ok_or_else(|| RegistryError::NotFound(format!("VSIX of {}", id)))?;

            let bytes = self.http.get_bytes(&vsix_url).await?;
            store_artifact(&self.destination, id, bytes, ".vsix", do_extract, cached).await
        }
        .await;

        paths_or_empty(id, result)
    }

    fn package_absolute_url(&self, id: &PackageIdentifier) -> Option<Url> {
        let publisher = id.namespace()?;
        let url = format!(
            "https://marketplace.visualstudio.com/items?itemName={}.{}",
            publisher, id.name
        );
        Url::parse(&url).ok()
    }
}
