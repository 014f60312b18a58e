//! MetaCPAN API implementation

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

/// Response from `/v1/release/versions/{distribution}`
#[derive(Debug, Deserialize)]
struct ReleaseVersions {
    #[serde(default)]
    releases: Vec<Release>,
}

#[derive(Debug, Deserialize)]
struct Release {
    version: String,
    download_url: Option<String>,
}

pub struct CpanRegistry {
    http: HttpFetcher,
    base_url: String,
    destination: PathBuf,
}

impl CpanRegistry {
    pub fn new(ctx: &RegistryContext, destination: &Path) -> Self {
        Self {
            http: ctx.http.clone(),
            base_url: ctx.endpoints.cpan.clone(),
            destination: destination.to_path_buf(),
        }
    }

    /// Module names map to distributions: `Moose::Util` -> `Moose-Util`
    fn distribution(id: &PackageIdentifier) -> String {
        id.name.replace("::", "-")
    }

    fn release_url(&self, id: &PackageIdentifier) -> String {
        format!("{}/v1/release/{}", self.base_url, Self::distribution(id))
    }

    async fn fetch_releases(
        &self,
        id: &PackageIdentifier,
        use_cache: bool,
    ) -> Result<Vec<Release>, RegistryError> {
        let url = format!(
            "{}/v1/release/versions/{}",
            self.base_url,
            Self::distribution(id)
        );
        let response: ReleaseVersions = self.http.get_json_as(&url, use_cache).await?;
        Ok(response.releases)
    }
}

#[async_trait::async_trait]
impl RegistryManager for CpanRegistry {
    fn ecosystem(&self) -> &'static str {
        "cpan"
    }

    async fn enumerate_versions(
        &self,
        id: &PackageIdentifier,
        use_cache: bool,
    ) -> Result<Vec<String>, RegistryError> {
        let result = self
            .fetch_releases(id, use_cache)
            .await
            .map(|releases| releases.into_iter().map(|r| r.version).collect());

        versions_or_empty(id, result)
    }

    async fn package_exists(&self, id: &PackageIdentifier, use_cache: bool) -> bool {
        self.http.exists(&self.release_url(id), use_cache).await
    }

    async fn get_metadata(&self, id: &PackageIdentifier, use_cache: bool) -> Option<String> {
        self.http.get_text_opt(&self.release_url(id), use_cache).await
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
            let download_url = self
                .fetch_releases(id, cached)
                .await?
                .into_iter()
                .find(|r| r.version == version)
                .and_then(|r| r.download_url)
                .ok_or_else(|| {
                    RegistryError::NotFound(format!("{} {}", Self::distribution(id), version))
                })?;

            let bytes = self.http.get_bytes(&download_url).await?;
            store_artifact(&self.destination, id, bytes, ".tar.gz", do_extract, cached).await
        }
        .await;

        paths_or_empty(id, result)
    }

    fn package_absolute_url(&self, id: &PackageIdentifier) -> Option<Url> {
        let url = format!("https://metacpan.org/dist/{}", Self::distribution(id));
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

    fn registry(server_url: &str, destination: &Path) -> CpanRegistry {
        let endpoints = EndpointConfig {
            cpan: server_url.to_string(),
            ..EndpointConfig::default()
        };
        CpanRegistry::new(&RegistryContext::new(test_fetcher(), endpoints), destination)
    }

    #[tokio::test]
    async fn enumerate_versions_maps_module_to_distribution() {
        let mut server = Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();

        let mock = server
            .mock("GET", "/v1/release/versions/Try-Tiny")
            .with_status(200)
            .with_body(
                r#"{"total": 2, "releases": [
                    {"version": "0.31", "download_url": "https://cpan.example/Try-Tiny-0.31.tar.gz"},
                    {"version": "0.30", "download_url": "https://cpan.example/Try-Tiny-0.30.tar.gz"}
                ]}"#,
            )
            .create_async()
            .await;

        let registry = registry(&server.url(), temp_dir.path());
        let result = registry
            .enumerate_versions(&PackageIdentifier::new("cpan", "Try::Tiny"), false)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result, vec!["0.30", "0.31"]);
    }

    #[tokio::test]
    async fn download_version_follows_download_url() {
        let mut server = Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();

        let releases = server
            .mock("GET", "/v1/release/versions/Try-Tiny")
            .with_status(200)
            .with_body(format!(
                r#"{{"releases": [{{"version": "0.31", "download_url": "{}/authors/Try-Tiny-0.31.tar.gz"}}]}}"#,
                server.url()
            ))
            .create_async()
            .await;
        let tarball = server
            .mock("GET", "/authors/Try-Tiny-0.31.tar.gz")
            .with_status(200)
            .with_body(fixtures::tar_gz(&[("Try-Tiny-0.31/META.json", "{}")]))
            .create_async()
            .await;

        let registry = registry(&server.url(), temp_dir.path());
        let id = PackageIdentifier::new("cpan", "Try::Tiny").with_version("0.31");
        let paths = registry.download_version(&id, true, false).await.unwrap();

        releases.assert_async().await;
        tarball.assert_async().await;
        assert!(paths[0].join("Try-Tiny-0.31/META.json").is_file());
    }

    #[tokio::test]
    async fn download_version_returns_empty_for_unknown_version() {
        let mut server = Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();

        let mock = server
            .mock("GET", "/v1/release/versions/Try-Tiny")
            .with_status(200)
            .with_body(r#"{"releases": []}"#)
            .create_async()
            .await;

        let registry = registry(&server.url(), temp_dir.path());
        let id = PackageIdentifier::new("cpan", "Try::Tiny").with_version("9.99");
        let paths = registry.download_version(&id, true, false).await.unwrap();

        mock.assert_async().await;
        assert!(paths.is_empty());
    }
}
