//! crates.io registry API implementation

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

/// Response from `/api/v1/crates/{name}`
#[derive(Debug, Deserialize)]
struct CrateResponse {
    #[serde(default)]
    versions: Vec<CrateVersion>,
}

#[derive(Debug, Deserialize)]
struct CrateVersion {
    num: String,
}

pub struct CargoRegistry {
    http: HttpFetcher,
    api_url: String,
    download_url: String,
    destination: PathBuf,
}

impl CargoRegistry {
    pub fn new(ctx: &RegistryContext, destination: &Path) -> Self {
        Self {
            http: ctx.http.clone(),
            api_url: ctx.endpoints.cargo.clone(),
            download_url: ctx.endpoints.cargo_download.clone(),
            destination: destination.to_path_buf(),
        }
    }

    fn crate_url(&self, name: &str) -> String {
        format!("{}/api/v1/crates/{}", self.api_url, name)
    }

    fn crate_file_url(&self, name: &str, version: &str) -> String {
        format!(
            "{}/crates/{}/{}-{}.crate",
            self.download_url, name, name, version
        )
    }
}

#[async_trait::async_trait]
impl RegistryManager for CargoRegistry {
    fn ecosystem(&self) -> &'static str {
        "cargo"
    }

    async fn enumerate_versions(
        &self,
        id: &PackageIdentifier,
        use_cache: bool,
    ) -> Result<Vec<String>, RegistryError> {
        let result = self
            .http
            .get_json_as::<CrateResponse>(&self.crate_url(&id.name), use_cache)
            .await
            .map(|krate| krate.versions.into_iter().map(|v| v.num).collect());

        versions_or_empty(id, result)
    }

    async fn package_exists(&self, id: &PackageIdentifier, use_cache: bool) -> bool {
        self.http.exists(&self.crate_url(&id.name), use_cache).await
    }

    async fn get_metadata(&self, id: &PackageIdentifier, use_cache: bool) -> Option<String> {
        self.http
            .get_text_opt(&self.crate_url(&id.name), use_cache)
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
        if let Some(path) = cached_download(&self.destination, id, ".crate", do_extract, cached) {
            return Ok(vec![path]);
        }

        let result = async {
            let bytes = self
                .http
                .get_bytes(&self.crate_file_url(&id.name, version))
                .await?;
            store_artifact(&self.destination, id, bytes, ".crate", do_extract, cached).await
        }
        .await;

        paths_or_empty(id, result)
    }

    fn package_absolute_url(&self, id: &PackageIdentifier) -> Option<Url> {
        let mut url = format!("https://crates.io/crates/{}", id.name);
        if let Some(version) = id.version() {
            url.push('/');
            url.push_str(version);
        }
        Url::parse(&url).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EndpointConfig;
    use crate::extract::fixtures;
    use crate::http::test_fetcher;
    use mockito::Server;
    use tempfile::TempDir;

    fn registry(server_url: &str, destination: &Path) -> CargoRegistry {
        let endpoints = EndpointConfig {
            cargo: server_url.to_string(),
            cargo_download: server_url.to_string(),
            ..EndpointConfig::default()
        };
        CargoRegistry::new(&RegistryContext::new(test_fetcher(), endpoints), destination)
    }

    #[tokio::test]
    async fn enumerate_versions_returns_version_numbers() {
        let mut server = Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();

        let mock = server
            .mock("GET", "/api/v1/crates/serde")
            .with_status(200)
            .with_body(
                r#"{
                    "crate": {"name": "serde"},
                    "versions": [
                        {"num": "1.0.200", "yanked": false},
                        {"num": "1.0.9", "yanked": false},
                        {"num": "1.0.100", "yanked": true}
                    ]
                }"#,
            )
            .create_async()
            .await;

        let registry = registry(&server.url(), temp_dir.path());
        let result = registry
            .enumerate_versions(&PackageIdentifier::new("cargo", "serde"), true)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result, vec!["1.0.9", "1.0.100", "1.0.200"]);
    }

    #[tokio::test]
    async fn package_exists_is_false_for_unknown_crate() {
        let mut server = Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();

        let mock = server
            .mock("GET", "/api/v1/crates/no-such-crate")
            .with_status(404)
            .create_async()
            .await;

        let registry = registry(&server.url(), temp_dir.path());

        assert!(
            !registry
                .package_exists(&PackageIdentifier::new("cargo", "no-such-crate"), false)
                .await
        );
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn download_version_extracts_crate_file() {
        let mut server = Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();

        let mock = server
            .mock("GET", "/crates/itoa/itoa-1.0.0.crate")
            .with_status(200)
            .with_body(fixtures::tar_gz(&[("itoa-1.0.0/Cargo.toml", "[package]")]))
            .create_async()
            .await;

        let registry = registry(&server.url(), temp_dir.path());
        let id = PackageIdentifier::new("cargo", "itoa").with_version("1.0.0");
        let paths = registry.download_version(&id, true, false).await.unwrap();

        mock.assert_async().await;
        assert!(paths[0].join("itoa-1.0.0/Cargo.toml").is_file());
    }

    #[tokio::test]
    async fn download_version_without_extraction_keeps_crate_file() {
        let mut server = Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();

        let mock = server
            .mock("GET", "/crates/itoa/itoa-1.0.0.crate")
            .with_status(200)
            .with_body("crate-bytes")
            .create_async()
            .await;

        let registry = registry(&server.url(), temp_dir.path());
        let id = PackageIdentifier::new("cargo", "itoa").with_version("1.0.0");
        let paths = registry.download_version(&id, false, false).await.unwrap();

        mock.assert_async().await;
        assert_eq!(paths, vec![temp_dir.path().join("cargo-itoa@1.0.0.crate")]);
    }
}
