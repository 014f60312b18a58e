//! Go module proxy implementation

use std::path::{Path, PathBuf};

use reqwest::Url;

use crate::http::HttpFetcher;
use crate::package::PackageIdentifier;
use crate::version::error::RegistryError;
use crate::version::registries::{
    cached_download, paths_or_empty, require_version, store_artifact, versions_or_empty,
};
use crate::version::registry::{RegistryContext, RegistryManager};

/// Registry manager for the Go module proxy protocol.
///
/// The module path is `namespace/name`, e.g. `golang.org/x` + `text`.
pub struct GoProxyRegistry {
    http: HttpFetcher,
    base_url: String,
    destination: PathBuf,
}

impl GoProxyRegistry {
    pub fn new(ctx: &RegistryContext, destination: &Path) -> Self {
        Self {
            http: ctx.http.clone(),
            base_url: ctx.endpoints.golang.clone(),
            destination: destination.to_path_buf(),
        }
    }

    fn module_url(&self, id: &PackageIdentifier) -> String {
        format!("{}/{}", self.base_url, encode_module_path(&id.full_name()))
    }

    fn version_file_url(&self, id: &PackageIdentifier, version: &str, ext: &str) -> String {
        format!(
            "{}/@v/{}.{}",
            self.module_url(id),
            encode_module_path(version),
            ext
        )
    }
}

/// Encodes a Go module path for use in proxy URLs.
/// Uppercase letters are escaped as !{lowercase}.
fn encode_module_path(path: &str) -> String {
    let mut result = String::with_capacity(path.len());
    for c in path.chars() {
        if c.is_ascii_uppercase() {
            result.push('!');
            result.push(c.to_ascii_lowercase());
        } else {
            result.push(c);
        }
    }
    result
}

#[async_trait::async_trait]
impl RegistryManager for GoProxyRegistry {
    fn ecosystem(&self) -> &'static str {
        "golang"
    }

    async fn enumerate_versions(
        &self,
        id: &PackageIdentifier,
        use_cache: bool,
    ) -> Result<Vec<String>, RegistryError> {
        let url = format!("{}/@v/list", self.module_url(id));
        // One version per line
        let result = self.http.get_text(&url, use_cache).await.map(|body| {
            body.lines()
                .map(str::trim)
                .filter(|line| !line.is_empty())
                .map(str::to_string)
                .collect()
        });

        versions_or_empty(id, result)
    }

    async fn package_exists(&self, id: &PackageIdentifier, use_cache: bool) -> bool {
        let url = format!("{}/@latest", self.module_url(id));
        self.http.exists(&url, use_cache).await
    }

    /// `.info` of the requested version, or of `@latest` without one
    async fn get_metadata(&self, id: &PackageIdentifier, use_cache: bool) -> Option<String> {
        let url = match id.version() {
            Some(version) => self.version_file_url(id, version, "info"),
            None => format!("{}/@latest", self.module_url(id)),
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
        if let Some(path) = cached_download(&self.destination, id, ".zip", do_extract, cached) {
            return Ok(vec![path]);
        }

        let result = async {
            let bytes = self
                .http
                .get_bytes(&self.version_file_url(id, version, "zip"))
                .await?;
            store_artifact(&self.destination, id, bytes, ".zip", do_extract, cached).await
        }
        .await;

        paths_or_empty(id, result)
    }

    fn package_absolute_url(&self, id: &PackageIdentifier) -> Option<Url> {
        let mut url = format!("https://pkg.go.dev/{}", id.full_name());
        if let Some(version) = id.version() {
            url.push('@');
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
    use rstest::rstest;
    use tempfile::TempDir;

    fn registry(server_url: &str, destination: &Path) -> GoProxyRegistry {
        let endpoints = EndpointConfig {
            golang: server_url.to_string(),
            ..EndpointConfig::default()
        };
        GoProxyRegistry::new(&RegistryContext::new(test_fetcher(), endpoints), destination)
    }

    fn text_module() -> PackageIdentifier {
        PackageIdentifier::new("golang", "text").with_namespace("golang.org/x")
    }

    #[rstest]
    #[case("golang.org/x/text", "golang.org/x/text")]
    #[case("github.com/Azure/azure-sdk-for-go", "github.com/!azure/azure-sdk-for-go")]
    #[case("github.com/BurntSushi/toml", "github.com/!burnt!sushi/toml")]
    fn encode_module_path_escapes_uppercase(#[case] path: &str, #[case] expected: &str) {
        assert_eq!(encode_module_path(path), expected);
    }

    #[tokio::test]
    async fn enumerate_versions_returns_versions_from_proxy() {
        let mut server = Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();

        let mock = server
            .mock("GET", "/golang.org/x/text/@v/list")
            .with_status(200)
            .with_header("content-type", "text/plain")
            .with_body("v0.14.0\nv0.13.0\nv0.9.0\n")
            .create_async()
            .await;

        let registry = registry(&server.url(), temp_dir.path());
        let result = registry
            .enumerate_versions(&text_module(), false)
            .await
            .unwrap();

        mock.assert_async().await;
        assert_eq!(result, vec!["v0.9.0", "v0.13.0", "v0.14.0"]);
    }

    #[rstest]
    #[case(404)]
    #[case(410)]
    #[tokio::test]
    async fn enumerate_versions_returns_empty_for_missing_module(#[case] status: usize) {
        let mut server = Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();

        let mock = server
            .mock("GET", "/golang.org/x/text/@v/list")
            .with_status(status)
            .create_async()
            .await;

        let registry = registry(&server.url(), temp_dir.path());
        let result = registry
            .enumerate_versions(&text_module(), false)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn enumerate_versions_returns_empty_for_module_without_versions() {
        let mut server = Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();

        let mock = server
            .mock("GET", "/golang.org/x/text/@v/list")
            .with_status(200)
            .with_body("")
            .create_async()
            .await;

        let registry = registry(&server.url(), temp_dir.path());
        let result = registry
            .enumerate_versions(&text_module(), false)
            .await
            .unwrap();

        mock.assert_async().await;
        assert!(result.is_empty());
    }

    #[tokio::test]
    async fn download_version_extracts_module_zip() {
        let mut server = Server::new_async().await;
        let temp_dir = TempDir::new().unwrap();

        let mock = server
            .mock("GET", "/golang.org/x/text/@v/v0.14.0.zip")
            .with_status(200)
            .with_body(fixtures::zip(&[("golang.org/x/text@v0.14.0/go.mod", "module golang.org/x/text")]))
            .create_async()
            .await;

        let registry = registry(&server.url(), temp_dir.path());
        let id = text_module().with_version("v0.14.0");
        let paths = registry.download_version(&id, true, false).await.unwrap();

        mock.assert_async().await;
        assert_eq!(paths.len(), 1);
        assert!(paths[0].join("golang.org/x/text@v0.14.0/go.mod").is_file());
    }

    #[test]
    fn package_absolute_url_points_at_pkg_go_dev() {
        let temp_dir = TempDir::new().unwrap();
        let registry = registry("http://unused", temp_dir.path());

        assert_eq!(
            registry
                .package_absolute_url(&text_module().with_version("v0.14.0"))
                .unwrap()
                .as_str(),
            "https://pkg.go.dev/golang.org/x/text@v0.14.0"
        );
    }
}
